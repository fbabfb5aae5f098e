use rust_decimal::Decimal;

use crate::{
    db::{CompanyStore, UserStore, WatchlistStore},
    error::{AppError, AppResult},
    models::{NewCompany, User},
    services::auth::register_user,
};

pub const TEST_USER_EMAIL: &str = "test@example.com";
pub const TEST_USER_USERNAME: &str = "testuser";
pub const TEST_USER_PASSWORD: &str = "testpassword123";

/// Companies saved by `seed_watchlist`
const WATCHLIST_SEED_SIZE: usize = 3;

struct DemoCompany {
    name: &'static str,
    sector: &'static str,
    funding_round: &'static str,
    /// Whole dollars
    funding: i64,
    location: &'static str,
    num_employees: i32,
    founding_year: i32,
    growth_percentage: i32,
}

const fn demo(
    name: &'static str,
    sector: &'static str,
    funding_round: &'static str,
    funding: i64,
    location: &'static str,
    num_employees: i32,
    founding_year: i32,
    growth_percentage: i32,
) -> DemoCompany {
    DemoCompany {
        name,
        sector,
        funding_round,
        funding,
        location,
        num_employees,
        founding_year,
        growth_percentage,
    }
}

const DEMO_CATALOG: &[DemoCompany] = &[
    demo("Aurora Analytics", "Other", "Seed", 500_000, "San Francisco, CA", 8, 2021, 120),
    demo("BluePeak Robotics", "Other", "Series A", 4_500_000, "Boston, MA", 42, 2018, 60),
    demo("Cedar Health", "Other", "Series B", 18_000_000, "Austin, TX", 120, 2016, 35),
    demo("Dune Energy", "Other", "Seed", 750_000, "Denver, CO", 12, 2022, 200),
    demo("Echo Commerce", "Other", "Series C", 62_000_000, "New York, NY", 350, 2012, 18),
    demo("Fjord Security", "Other", "Series A", 3_000_000, "Seattle, WA", 30, 2019, 55),
    demo("Granite Supply", "Other", "Series B", 15_000_000, "Chicago, IL", 95, 2015, 12),
    demo("Helix Bio", "Other", "Series D", 120_000_000, "San Diego, CA", 820, 2010, 8),
    demo("Iris Mobility", "Other", "Seed", 300_000, "Palo Alto, CA", 6, 2023, 260),
    demo("Juno AI", "Other", "Series A", 5_200_000, "London, UK", 48, 2019, 72),
    demo("Kite Logistics", "Other", "Series B", 22_000_000, "Singapore", 210, 2014, 25),
    demo("Lumen CleanTech", "Other", "Series C", 48_000_000, "Berlin, Germany", 180, 2013, 30),
    demo("NovaPay", "Fintech", "Seed", 2_500_000, "New York, USA", 18, 2023, 80),
    demo("FlowBank", "Fintech", "Series A", 12_000_000, "London, UK", 55, 2021, 65),
    demo("InsightGrid AI", "AI/ML", "Seed", 5_000_000, "Toronto, Canada", 20, 2023, 85),
    demo("VectorMind", "AI/ML", "Series B", 30_000_000, "San Francisco, USA", 80, 2019, 60),
    demo("GreenFlux Energy", "Climate/Energy", "Seed", 3_500_000, "Copenhagen, Denmark", 16, 2022, 78),
    demo("SolarLoop", "Climate/Energy", "Series A", 11_000_000, "Austin, USA", 35, 2020, 52),
    demo("BrightCart", "Consumer", "Pre-Seed", 600_000, "Los Angeles, USA", 8, 2024, 88),
    demo("FleetSync", "Enterprise/B2B", "Series A", 13_000_000, "Chicago, USA", 50, 2020, 49),
    demo("EcoRoute", "Climate/Energy", "Seed", 2_300_000, "Stockholm, Sweden", 14, 2021, 74),
    demo("CareSync", "Healthcare/Bio", "Seed", 2_800_000, "Toronto, Canada", 17, 2022, 69),
    demo("ShopLoop", "Consumer", "Series A", 9_000_000, "Madrid, Spain", 32, 2020, 59),
    demo("TrustRail", "Other", "Seed", 3_100_000, "Zurich, Switzerland", 21, 2021, 64),
    demo("PixelHaven", "Other", "Pre-Seed", 450_000, "Sydney, Australia", 6, 2024, 87),
];

/// The demo catalog as insertable records
pub fn demo_companies() -> Vec<NewCompany> {
    DEMO_CATALOG
        .iter()
        .map(|c| NewCompany {
            name: c.name.to_string(),
            sector: c.sector.to_string(),
            funding_round: c.funding_round.to_string(),
            funding: Decimal::new(c.funding * 100, 2),
            location: c.location.to_string(),
            num_employees: c.num_employees,
            founding_year: c.founding_year,
            growth_percentage: Some(c.growth_percentage),
            description: String::new(),
        })
        .collect()
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SeedSummary {
    pub created: usize,
    pub updated: usize,
    pub removed: u64,
}

/// Upserts the demo catalog by name
///
/// With `clear`, companies whose names appear in the catalog are deleted first,
/// which also drops any watchlist entries pointing at them.
pub async fn seed_companies(store: &dyn CompanyStore, clear: bool) -> AppResult<SeedSummary> {
    let companies = demo_companies();
    let mut summary = SeedSummary::default();

    if clear {
        let names: Vec<String> = companies.iter().map(|c| c.name.clone()).collect();
        summary.removed = store.delete_by_names(&names).await?;
        tracing::warn!(removed = summary.removed, "Deleted existing demo companies");
    }

    for company in companies {
        let (_, created) = store.upsert_by_name(company).await?;
        if created {
            summary.created += 1;
        } else {
            summary.updated += 1;
        }
    }

    tracing::info!(
        created = summary.created,
        updated = summary.updated,
        "Seeded demo companies"
    );
    Ok(summary)
}

/// Creates the demo login unless an account with its email already exists
///
/// Returns `None` when the user was already present.
pub async fn seed_test_user(users: &dyn UserStore) -> AppResult<Option<User>> {
    if users.find_by_email(TEST_USER_EMAIL).await?.is_some() {
        tracing::warn!(email = TEST_USER_EMAIL, "Test user already exists");
        return Ok(None);
    }

    let user = register_user(users, TEST_USER_USERNAME, TEST_USER_EMAIL, TEST_USER_PASSWORD).await?;

    tracing::info!(user_id = user.id, "Created test user");
    Ok(Some(user))
}

/// Saves the first few catalog companies to the demo user's watchlist
///
/// Creates the demo user first if needed. Companies already saved are left alone.
/// Returns how many entries were added.
pub async fn seed_watchlist(
    users: &dyn UserStore,
    companies: &dyn CompanyStore,
    watchlist: &dyn WatchlistStore,
) -> AppResult<usize> {
    let user = match users.find_by_username(TEST_USER_USERNAME).await? {
        Some(user) => user,
        None => {
            register_user(users, TEST_USER_USERNAME, TEST_USER_EMAIL, TEST_USER_PASSWORD).await?
        }
    };

    let mut catalog = companies.list_all().await?;
    catalog.sort_by_key(|c| c.id);

    let mut added = 0;
    for company in catalog.iter().take(WATCHLIST_SEED_SIZE) {
        match watchlist.add(user.id, company.id).await {
            Ok(_) => added += 1,
            Err(AppError::Conflict(_)) => {}
            Err(e) => return Err(e),
        }
    }

    tracing::info!(user_id = user.id, added, "Seeded watchlist entries");
    Ok(added)
}
