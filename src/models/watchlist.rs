use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A company saved by a user. Each (user, company) pair appears at most once.
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct WatchlistEntry {
    pub user_id: i64,
    pub company_id: i64,
    pub created_at: DateTime<Utc>,
}

/// Request body for saving a company
#[derive(Debug, Deserialize)]
pub struct AddToWatchlistRequest {
    pub company_id: i64,
}
