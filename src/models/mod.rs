use serde::{Deserialize, Serialize};

pub mod auth;
pub mod company;
pub mod user;
pub mod watchlist;

pub use auth::{
    AccessTokenResponse, AuthUser, Claims, LoginRequest, RefreshRequest, TokenPair, TokenType,
};
pub use company::{
    normalize_funding, Company, CompanyQuery, NewCompany, Page, SortDirection, SortField,
    PAGE_SIZE,
};
pub use user::{NewUser, User, UserProfileResponse};
pub use watchlist::{AddToWatchlistRequest, WatchlistEntry};

// ============================================================================
// Response envelopes
// ============================================================================

/// Unpaginated list response, `{"results": [...]}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultsResponse<T> {
    pub results: Vec<T>,
}

impl<T> From<Vec<T>> for ResultsResponse<T> {
    fn from(results: Vec<T>) -> Self {
        Self { results }
    }
}

/// LLM-generated overview of a single company
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanySummary {
    pub company_id: i64,
    pub summary: String,
    pub model: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

// ============================================================================
// Coresignal export types
// ============================================================================

/// One line of a Coresignal company export (NDJSON). Only the fields the importer
/// reads are declared; everything else in the record is ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CoresignalRecord {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub headquarters_city: Option<String>,
    #[serde(default)]
    pub headquarters_state: Option<String>,
    #[serde(default)]
    pub headquarters_new_address: Option<String>,
    #[serde(default)]
    pub industry: Option<String>,
    /// Expected to be a list of rounds, oldest first
    #[serde(default)]
    pub company_funding_rounds_collection: Option<serde_json::Value>,
    /// Usually a number, occasionally a string or null in exports
    #[serde(default)]
    pub employees_count: Option<serde_json::Value>,
    #[serde(default)]
    pub founded: Option<serde_json::Value>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CoresignalFundingRound {
    #[serde(default)]
    pub last_round_type: Option<String>,
    /// Human-formatted amount such as "US$ 45.0M"
    #[serde(default)]
    pub last_round_money_raised: Option<String>,
}
