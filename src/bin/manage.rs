use std::env;
use std::fs::File;
use std::io::BufReader;

use anyhow::{bail, Context, Result};
use dotenvy::dotenv;
use tracing::{info, warn};
use tracing_subscriber::FmtSubscriber;
use tracing::Level;

use vcsourcing_api::{
    db::{create_pool, CompanyStore, PgStore},
    services::{importer, seed},
};

const USAGE: &str = "\
usage: manage <command> [options]

commands:
  seed-companies [--clear]              upsert the demo company catalog
  seed-user                             create the demo login
  seed-watchlist                        save the first companies for the demo login
  import-coresignal <file> [--clear]    import a Coresignal NDJSON export";

#[tokio::main]
async fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);

    let _ = dotenv();

    let args: Vec<String> = env::args().skip(1).collect();
    let Some(command) = args.first().map(String::as_str) else {
        eprintln!("{USAGE}");
        bail!("missing command");
    };
    let clear = args.iter().any(|a| a == "--clear");

    let database_url = env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
    let store = PgStore::new(create_pool(&database_url).await?);

    match command {
        "seed-companies" => {
            let summary = seed::seed_companies(&store, clear).await?;
            info!(
                "Seed complete. {} companies ({} new, {} updated)",
                summary.created + summary.updated,
                summary.created,
                summary.updated
            );
        }
        "seed-user" => match seed::seed_test_user(&store).await? {
            Some(user) => info!(
                "Created test user: email={} username={} password={}",
                user.email,
                user.username,
                seed::TEST_USER_PASSWORD
            ),
            None => warn!("User with email {} already exists", seed::TEST_USER_EMAIL),
        },
        "seed-watchlist" => {
            let added = seed::seed_watchlist(&store, &store, &store).await?;
            info!("Seeded {} watchlist entries", added);
        }
        "import-coresignal" => {
            let path = args
                .iter()
                .skip(1)
                .find(|a| !a.starts_with("--"))
                .context("import-coresignal requires a file path")?;
            import_coresignal(&store, path, clear).await?;
        }
        other => {
            eprintln!("{USAGE}");
            bail!("unknown command: {other}");
        }
    }

    Ok(())
}

async fn import_coresignal(store: &PgStore, path: &str, clear: bool) -> Result<()> {
    let file = File::open(path).with_context(|| format!("cannot open {path}"))?;

    let mut summary = importer::ImportSummary::default();
    let records = importer::parse_records(BufReader::new(file), &mut summary)?;

    for (line, error) in &summary.parse_errors {
        warn!(line, error = %error, "Skipping malformed JSON line");
    }

    if clear {
        let removed = store.delete_all().await?;
        warn!("Deleted {} existing companies", removed);
    }

    importer::import_records(store, &records, &mut summary).await?;

    info!(
        "Import complete: {} created, {} updated, {} skipped, {} malformed lines",
        summary.created,
        summary.updated,
        summary.skipped,
        summary.parse_errors.len()
    );
    Ok(())
}
