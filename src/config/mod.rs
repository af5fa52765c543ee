use crate::error::ConfigError;

fn env_var(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingVar(key.to_string()))
}

fn env_var_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_var_parsed<T: std::str::FromStr>(key: &str, default: T) -> Result<T, ConfigError> {
    match std::env::var(key) {
        Ok(raw) => raw.parse::<T>().map_err(|_| ConfigError::Invalid {
            key: key.to_string(),
            message: "could not parse".to_string(),
        }),
        Err(_) => Ok(default),
    }
}

/// Process-wide configuration, read once from the environment at startup.
///
/// Unlike a desktop tool's `~/.config/app.toml`, every field here is sourced
/// from `std::env` because each of the four binaries is a long-running
/// server process that expects its configuration injected by the deployment
/// environment, not a local file it owns.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub queue_url: String,
    pub discord_bot_token: String,
    pub embedding_provider: String,
    pub embedding_api_key: Option<String>,
    pub embedding_model: String,
    pub embedding_dims: usize,
    pub model_api_key: Option<String>,
    pub health_port: u16,
    pub default_history_turns: u32,
    pub default_memory_top_k: usize,
    pub memory_similarity_floor: f32,
    pub chunk_delay_ms: u64,
    pub max_message_chars: usize,
    pub fingerprint_cache_capacity: usize,
    pub send_dedup_similarity_threshold: f32,
}

impl Config {
    /// Load configuration from environment variables, applying the system
    /// defaults (history depth 20, top-K 5, 750ms chunk delay, 2000-char
    /// platform limit).
    pub fn load() -> Result<Self, ConfigError> {
        Ok(Self {
            database_url: env_var("DATABASE_URL")?,
            queue_url: env_var_or("QUEUE_URL", "memory://local"),
            discord_bot_token: env_var("DISCORD_BOT_TOKEN")?,
            embedding_provider: env_var_or("EMBEDDING_PROVIDER", "openai"),
            embedding_api_key: std::env::var("EMBEDDING_API_KEY").ok(),
            embedding_model: env_var_or("EMBEDDING_MODEL", "text-embedding-3-small"),
            embedding_dims: env_var_parsed("EMBEDDING_DIMS", 1536usize)?,
            model_api_key: std::env::var("MODEL_API_KEY").ok(),
            health_port: env_var_parsed("HEALTH_PORT", 8080u16)?,
            default_history_turns: env_var_parsed("DEFAULT_HISTORY_TURNS", 20u32)?,
            default_memory_top_k: env_var_parsed("DEFAULT_MEMORY_TOP_K", 5usize)?,
            memory_similarity_floor: env_var_parsed("MEMORY_SIMILARITY_FLOOR", 0.15f32)?,
            chunk_delay_ms: env_var_parsed("CHUNK_DELAY_MS", 750u64)?,
            max_message_chars: env_var_parsed("MAX_MESSAGE_CHARS", 2000usize)?,
            fingerprint_cache_capacity: env_var_parsed("FINGERPRINT_CACHE_CAPACITY", 1000usize)?,
            send_dedup_similarity_threshold: env_var_parsed(
                "SEND_DEDUP_SIMILARITY_THRESHOLD",
                0.9f32,
            )?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_var_or_uses_default_when_unset() {
        assert_eq!(env_var_or("TZUROT_TEST_UNSET_VAR_XYZ", "fallback"), "fallback");
    }

    #[test]
    fn env_var_parsed_uses_default_when_unset() {
        let v: u32 = env_var_parsed("TZUROT_TEST_UNSET_VAR_ABC", 42).unwrap();
        assert_eq!(v, 42);
    }

    #[test]
    fn env_var_missing_returns_error() {
        let e = env_var("TZUROT_TEST_DEFINITELY_UNSET_VAR").unwrap_err();
        assert!(matches!(e, ConfigError::MissingVar(_)));
    }
}
