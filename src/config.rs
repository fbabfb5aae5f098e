use serde::Deserialize;

/// Application configuration loaded from environment variables
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// PostgreSQL database connection URL. When unset the server runs on an
    /// in-memory store seeded with the demo catalog.
    #[serde(default)]
    pub database_url: Option<String>,

    /// Redis connection URL for the summary cache. Caching is off when unset.
    #[serde(default)]
    pub redis_url: Option<String>,

    /// Secret used to sign and verify JWTs (HS256)
    pub jwt_secret: String,

    /// Access token lifetime in seconds
    #[serde(default = "default_access_token_ttl")]
    pub access_token_ttl_secs: i64,

    /// Refresh token lifetime in seconds
    #[serde(default = "default_refresh_token_ttl")]
    pub refresh_token_ttl_secs: i64,

    /// OpenAI API key used for company summaries
    #[serde(default)]
    pub openai_api_key: String,

    /// OpenAI API base URL
    #[serde(default = "default_openai_api_url")]
    pub openai_api_url: String,

    /// Model used for company summaries
    #[serde(default = "default_llm_model")]
    pub llm_model: String,

    /// How long a generated summary stays cached, in seconds
    #[serde(default = "default_summary_cache_ttl")]
    pub summary_cache_ttl_secs: u64,

    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_access_token_ttl() -> i64 {
    300
}

fn default_refresh_token_ttl() -> i64 {
    86_400
}

fn default_openai_api_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_llm_model() -> String {
    "gpt-4.1-mini".to_string()
}

fn default_summary_cache_ttl() -> u64 {
    86_400
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8000
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        envy::from_env::<Config>().map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))
    }
}
