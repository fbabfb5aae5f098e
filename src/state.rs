use std::sync::Arc;

use crate::{
    db::{CompanyStore, UserStore, WatchlistStore},
    services::{SummaryService, TokenService},
};

/// Shared application state injected into all route handlers
#[derive(Clone)]
pub struct AppState {
    pub companies: Arc<dyn CompanyStore>,
    pub watchlist: Arc<dyn WatchlistStore>,
    pub users: Arc<dyn UserStore>,
    pub tokens: TokenService,
    pub summaries: SummaryService,
}

impl AppState {
    /// Builds state where a single backend serves every table
    pub fn from_store<S>(store: S, tokens: TokenService, summaries: SummaryService) -> Self
    where
        S: CompanyStore + WatchlistStore + UserStore + 'static,
    {
        let store = Arc::new(store);
        Self {
            companies: store.clone(),
            watchlist: store.clone(),
            users: store,
            tokens,
            summaries,
        }
    }
}
