use sqlx::{postgres::PgPoolOptions, PgPool, Postgres, QueryBuilder};

use crate::{
    db::{CompanyStore, UserStore, WatchlistStore},
    error::{AppError, AppResult},
    models::{
        Company, CompanyQuery, NewCompany, NewUser, Page, SortDirection, User, WatchlistEntry,
        PAGE_SIZE,
    },
};

const UNIQUE_VIOLATION: &str = "23505";
const FOREIGN_KEY_VIOLATION: &str = "23503";
/// Default name Postgres gives the inline `watchlist.user_id` reference
const WATCHLIST_USER_FKEY: &str = "watchlist_user_id_fkey";

const COMPANY_COLUMNS: &str = "id, name, sector, funding_round, funding, location, \
     num_employees, founding_year, growth_percentage, description";

/// Creates a PostgreSQL connection pool and brings the schema up to date
///
/// Establishes a pool of database connections for efficient reuse.
/// The pool automatically manages connection lifecycle and limits.
pub async fn create_pool(database_url: &str) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;
    tracing::info!("Database migrations applied");

    Ok(pool)
}

/// Store backed by PostgreSQL
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn is_violation(error: &sqlx::Error, code: &str) -> bool {
    matches!(error, sqlx::Error::Database(db) if db.code().as_deref() == Some(code))
}

/// Names the missing row behind a failed watchlist insert
fn watchlist_reference_error(constraint: Option<&str>, user_id: i64, company_id: i64) -> AppError {
    match constraint {
        Some(WATCHLIST_USER_FKEY) => AppError::NotFound(format!("User {} not found", user_id)),
        _ => AppError::NotFound(format!("Company {} not found", company_id)),
    }
}

/// Escapes LIKE wildcards so user input is matched literally
fn escape_like(term: &str) -> String {
    term.replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

/// Appends the WHERE clause for a catalog query, binding every user-supplied value
fn push_filters(builder: &mut QueryBuilder<'static, Postgres>, query: &CompanyQuery) {
    builder.push(" WHERE TRUE");

    if let Some(term) = query.search_term() {
        let pattern = format!("%{}%", escape_like(term));
        builder
            .push(" AND (name ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR location ILIKE ")
            .push_bind(pattern)
            .push(")");
    }

    if let Some(term) = query.location_term() {
        builder
            .push(" AND location ILIKE ")
            .push_bind(format!("%{}%", escape_like(term)));
    }

    if let Some(round) = query.funding_round_term() {
        builder
            .push(" AND funding_round = ")
            .push_bind(round.to_string());
    }

    if let Some(sector) = query.sector_term() {
        builder.push(" AND sector = ").push_bind(sector.to_string());
    }
}

/// Appends ORDER BY. Column names come from `SortField`, never from input.
fn push_ordering(builder: &mut QueryBuilder<'static, Postgres>, query: &CompanyQuery) {
    match query.sort_by {
        Some(field) => {
            // NULLS placement mirrors `Option` ordering used by the in-memory store
            let direction = match query.sort_dir {
                SortDirection::Asc => "ASC NULLS FIRST",
                SortDirection::Desc => "DESC NULLS LAST",
            };
            builder
                .push(" ORDER BY ")
                .push(field.column())
                .push(" ")
                .push(direction)
                .push(", id ASC");
        }
        None => {
            builder.push(" ORDER BY id ASC");
        }
    }
}

#[derive(sqlx::FromRow)]
struct UpsertedCompany {
    #[sqlx(flatten)]
    company: Company,
    inserted: bool,
}

#[async_trait::async_trait]
impl CompanyStore for PgStore {
    async fn list_all(&self) -> AppResult<Vec<Company>> {
        let companies = sqlx::query_as::<_, Company>(&format!(
            "SELECT {COMPANY_COLUMNS} FROM companies ORDER BY id"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(companies)
    }

    async fn get_by_id(&self, id: i64) -> AppResult<Option<Company>> {
        let company = sqlx::query_as::<_, Company>(&format!(
            "SELECT {COMPANY_COLUMNS} FROM companies WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(company)
    }

    async fn search(&self, query: &CompanyQuery) -> AppResult<Page<Company>> {
        let mut count_builder = QueryBuilder::new("SELECT COUNT(*) FROM companies");
        push_filters(&mut count_builder, query);
        let count: i64 = count_builder
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await?;

        let mut builder = QueryBuilder::new(format!("SELECT {COMPANY_COLUMNS} FROM companies"));
        push_filters(&mut builder, query);
        push_ordering(&mut builder, query);
        builder
            .push(" LIMIT ")
            .push_bind(PAGE_SIZE as i64)
            .push(" OFFSET ")
            .push_bind(i64::try_from(query.offset()).unwrap_or(i64::MAX));

        let results = builder
            .build_query_as::<Company>()
            .fetch_all(&self.pool)
            .await?;

        Ok(Page::new(results, count as usize, query.page()))
    }

    async fn upsert_by_name(&self, company: NewCompany) -> AppResult<(Company, bool)> {
        let row = sqlx::query_as::<_, UpsertedCompany>(&format!(
            r#"
            INSERT INTO companies (name, sector, funding_round, funding, location,
                                   num_employees, founding_year, growth_percentage, description)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (name) DO UPDATE SET
                sector = EXCLUDED.sector,
                funding_round = EXCLUDED.funding_round,
                funding = EXCLUDED.funding,
                location = EXCLUDED.location,
                num_employees = EXCLUDED.num_employees,
                founding_year = EXCLUDED.founding_year,
                growth_percentage = COALESCE(EXCLUDED.growth_percentage, companies.growth_percentage),
                description = EXCLUDED.description
            RETURNING {COMPANY_COLUMNS}, (xmax = 0) AS inserted
            "#
        ))
        .bind(&company.name)
        .bind(&company.sector)
        .bind(&company.funding_round)
        .bind(company.funding)
        .bind(&company.location)
        .bind(company.num_employees)
        .bind(company.founding_year)
        .bind(company.growth_percentage)
        .bind(&company.description)
        .fetch_one(&self.pool)
        .await?;

        Ok((row.company, row.inserted))
    }

    async fn delete_all(&self) -> AppResult<u64> {
        let result = sqlx::query("DELETE FROM companies")
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn delete_by_names(&self, names: &[String]) -> AppResult<u64> {
        let result = sqlx::query("DELETE FROM companies WHERE name = ANY($1)")
            .bind(names.to_vec())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}

#[async_trait::async_trait]
impl WatchlistStore for PgStore {
    async fn list_for_user(&self, user_id: i64) -> AppResult<Vec<Company>> {
        let companies = sqlx::query_as::<_, Company>(
            r#"
            SELECT c.id, c.name, c.sector, c.funding_round, c.funding, c.location,
                   c.num_employees, c.founding_year, c.growth_percentage, c.description
            FROM watchlist w
            JOIN companies c ON c.id = w.company_id
            WHERE w.user_id = $1
            ORDER BY w.created_at, w.id
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(companies)
    }

    async fn add(&self, user_id: i64, company_id: i64) -> AppResult<WatchlistEntry> {
        let inserted = sqlx::query_as::<_, WatchlistEntry>(
            r#"
            INSERT INTO watchlist (user_id, company_id)
            VALUES ($1, $2)
            ON CONFLICT (user_id, company_id) DO NOTHING
            RETURNING user_id, company_id, created_at
            "#,
        )
        .bind(user_id)
        .bind(company_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            if !is_violation(&e, FOREIGN_KEY_VIOLATION) {
                return AppError::Database(e);
            }
            let constraint = e.as_database_error().and_then(|db| db.constraint());
            watchlist_reference_error(constraint, user_id, company_id)
        })?;

        inserted.ok_or_else(|| {
            AppError::Conflict("Company is already in your watchlist".to_string())
        })
    }

    async fn remove(&self, user_id: i64, company_id: i64) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM watchlist WHERE user_id = $1 AND company_id = $2")
            .bind(user_id)
            .bind(company_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait::async_trait]
impl UserStore for PgStore {
    async fn find_by_id(&self, id: i64) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, username, email, password_hash FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, username, email, password_hash FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn find_by_username(&self, username: &str) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, username, email, password_hash FROM users WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn create(&self, user: NewUser) -> AppResult<User> {
        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (username, email, password_hash)
            VALUES ($1, $2, $3)
            RETURNING id, username, email, password_hash
            "#,
        )
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_violation(&e, UNIQUE_VIOLATION) {
                AppError::Conflict(
                    "A user with that email or username already exists".to_string(),
                )
            } else {
                AppError::Database(e)
            }
        })
    }
}
