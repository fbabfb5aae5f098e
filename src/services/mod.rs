pub mod auth;
pub mod company_search;
pub mod importer;
pub mod llm;
pub mod recommendations;
pub mod seed;
pub mod summary;

pub use auth::TokenService;
pub use llm::{LlmProvider, OpenAiProvider};
pub use recommendations::{get_recommendations, RecommendationEngine};
pub use summary::SummaryService;
