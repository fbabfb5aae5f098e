//! Storage abstractions
//!
//! Handlers and services only ever see these traits. The PostgreSQL store backs
//! production; the in-memory store backs local development and tests.
use crate::{
    error::AppResult,
    models::{Company, CompanyQuery, NewCompany, NewUser, Page, User, WatchlistEntry},
    services::company_search,
};

/// Company catalog
#[async_trait::async_trait]
pub trait CompanyStore: Send + Sync {
    /// All companies, ordered by id
    async fn list_all(&self) -> AppResult<Vec<Company>>;

    async fn get_by_id(&self, id: i64) -> AppResult<Option<Company>>;

    /// Filtered, sorted, paginated listing
    ///
    /// Default implementation loads the whole catalog and filters it in memory.
    /// Stores backed by a query engine should override this.
    async fn search(&self, query: &CompanyQuery) -> AppResult<Page<Company>> {
        let companies = self.list_all().await?;
        Ok(company_search::search_in_memory(companies, query))
    }

    /// Creates the company, or updates the existing one with the same name.
    /// An update with no `growth_percentage` keeps the stored one. Returns the
    /// stored record and whether it was newly created.
    async fn upsert_by_name(&self, company: NewCompany) -> AppResult<(Company, bool)>;

    /// Deletes every company, returning how many were removed
    async fn delete_all(&self) -> AppResult<u64>;

    /// Deletes the companies with the given names, returning how many were removed
    async fn delete_by_names(&self, names: &[String]) -> AppResult<u64>;
}

/// Per-user saved companies
#[async_trait::async_trait]
pub trait WatchlistStore: Send + Sync {
    /// Full company records saved by the user, in the order they were saved
    async fn list_for_user(&self, user_id: i64) -> AppResult<Vec<Company>>;

    /// Saves a company for the user.
    ///
    /// Fails with `AppError::Conflict` if the pair already exists.
    async fn add(&self, user_id: i64, company_id: i64) -> AppResult<WatchlistEntry>;

    /// Removes a saved company, returning whether anything was removed
    async fn remove(&self, user_id: i64, company_id: i64) -> AppResult<bool>;
}

/// User accounts
#[async_trait::async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_id(&self, id: i64) -> AppResult<Option<User>>;

    async fn find_by_email(&self, email: &str) -> AppResult<Option<User>>;

    async fn find_by_username(&self, username: &str) -> AppResult<Option<User>>;

    /// Fails with `AppError::Conflict` if the email or username is taken
    async fn create(&self, user: NewUser) -> AppResult<User>;
}
