use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    /// Optional: when absent, /api/chat degrades to the NOT_CONFIGURED error path.
    pub openai_api_key: Option<String>,
    pub openai_base_url: String,
    pub openai_model: String,
    /// Optional: when absent, CRM sync is skipped (leads are still persisted locally).
    pub hubspot_token: Option<String>,
    pub hubspot_base_url: String,
    pub upload_dir: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            database_url: std::env::var("DATABASE_URL")
                .map_err(|_| anyhow::anyhow!("DATABASE_URL environment variable required"))
                .and_then(|url| {
                    if url.trim().is_empty() {
                        anyhow::bail!("DATABASE_URL cannot be empty");
                    }
                    if !url.starts_with("postgresql://") && !url.starts_with("postgres://") {
                        anyhow::bail!("DATABASE_URL must start with postgresql:// or postgres://");
                    }
                    Ok(url)
                })?,
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "5175".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number between 1-65535"))?,
            openai_api_key: std::env::var("OPENAI_API_KEY")
                .ok()
                .filter(|s| !s.trim().is_empty()),
            openai_base_url: std::env::var("OPENAI_BASE_URL")
                .unwrap_or_else(|_| "https://api.openai.com".to_string()),
            openai_model: std::env::var("OPENAI_MODEL")
                .unwrap_or_else(|_| "gpt-4o-mini".to_string()),
            hubspot_token: std::env::var("HUBSPOT_PRIVATE_APP_TOKEN")
                .ok()
                .filter(|s| !s.trim().is_empty()),
            hubspot_base_url: std::env::var("HUBSPOT_BASE_URL")
                .unwrap_or_else(|_| "https://api.hubapi.com".to_string())
                .trim_end_matches('/')
                .to_string(),
            upload_dir: std::env::var("UPLOAD_DIR").unwrap_or_else(|_| "uploads".to_string()),
        };

        if !config.openai_base_url.starts_with("http://")
            && !config.openai_base_url.starts_with("https://")
        {
            anyhow::bail!("OPENAI_BASE_URL must start with http:// or https://");
        }

        // Log successful configuration load (without sensitive values)
        tracing::info!("Configuration loaded successfully");
        tracing::debug!(
            "Database URL: {}...",
            &config.database_url[..20.min(config.database_url.len())]
        );
        tracing::debug!("OpenAI base URL: {}", config.openai_base_url);
        tracing::debug!("OpenAI model: {}", config.openai_model);
        if config.openai_api_key.is_none() {
            tracing::warn!("OPENAI_API_KEY is not set. AI assessment will not work.");
        }
        if config.hubspot_token.is_none() {
            tracing::warn!("HUBSPOT_PRIVATE_APP_TOKEN is not set. CRM sync is disabled.");
        }
        tracing::debug!("Upload dir: {}", config.upload_dir);
        tracing::debug!("Server port: {}", config.port);

        Ok(config)
    }
}
