use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::env;
use tracing::{info, warn};

use crate::ai_providers::AiProviderKind;

// Import logging macros
use crate::{log_system_event, log_validation};

/// Complete application configuration loaded from environment variables
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub ai: AiConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

/// Database connection configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
}

/// AI provider configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AiConfig {
    pub api_key: String,
    pub base_url: Option<String>,
    pub provider: AiProviderKind,
    pub model: Option<String>,
    /// Language that word meanings are translated into.
    pub native_language: String,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
}

/// Logging system configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub file_enabled: bool,
    pub console_enabled: bool,
    pub log_directory: String,
}

impl Config {
    /// Load configuration from environment variables with sensible defaults
    pub fn from_env() -> Result<Self> {
        log_system_event!(config, "Loading application configuration from environment variables");

        let config = Config {
            database: DatabaseConfig::from_env()?,
            ai: AiConfig::from_env()?,
            server: ServerConfig::from_env()?,
            logging: LoggingConfig::from_env()?,
        };

        log_system_event!(config, "Configuration loaded successfully");
        config.log_configuration_summary();

        Ok(config)
    }

    /// Log a summary of loaded configuration (without sensitive data)
    fn log_configuration_summary(&self) {
        info!(
            database_url_masked = %mask_sensitive_data(&self.database.url),
            ai_provider = ?self.ai.provider,
            ai_model = ?self.ai.model,
            native_language = %self.ai.native_language,
            server_address = %format!("{}:{}", self.server.host, self.server.port),
            log_level = %self.logging.level,
            "Configuration summary"
        );
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        // Validate database URL format
        if !self.database.url.contains("sqlite:") && !self.database.url.contains("postgres://") {
            return Err(anyhow!("DATABASE_URL must start with 'sqlite:' or 'postgres://'"));
        }

        // Validate server port range
        if self.server.port == 0 {
            return Err(anyhow!("Server port must be greater than 0"));
        }

        // Validate AI API key presence
        if self.ai.api_key.is_empty() || self.ai.api_key == "your-api-key" {
            warn!("AI API key appears to be placeholder or empty - AI features may not work");
        }

        // Validate log level
        if !["trace", "debug", "info", "warn", "error"]
            .contains(&self.logging.level.to_lowercase().as_str())
        {
            warn!("Invalid log level '{}', using 'info' as fallback", self.logging.level);
        }

        log_validation!(success, "configuration", "Configuration validation completed successfully");
        Ok(())
    }
}

impl DatabaseConfig {
    fn from_env() -> Result<Self> {
        let url = env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite:vocab_trainer.db".to_string());

        Ok(DatabaseConfig { url })
    }
}

impl AiConfig {
    fn from_env() -> Result<Self> {
        let api_key = env::var("AI_API_KEY").unwrap_or_else(|_| "your-api-key".to_string());

        let base_url = env::var("AI_BASE_URL").ok();

        let provider_str = env::var("AI_PROVIDER").unwrap_or_else(|_| "openai".to_string());

        let provider = match provider_str.to_lowercase().as_str() {
            "gemini" | "google" => AiProviderKind::Gemini,
            "openai" | "chatgpt" | "gpt" => AiProviderKind::OpenAi,
            _ => {
                info!("Unknown AI provider '{}', defaulting to OpenAI", provider_str);
                AiProviderKind::OpenAi
            }
        };

        let model = env::var("AI_MODEL").ok();

        let native_language =
            env::var("NATIVE_LANGUAGE").unwrap_or_else(|_| "Vietnamese".to_string());

        Ok(AiConfig {
            api_key,
            base_url,
            provider,
            model,
            native_language,
        })
    }
}

impl ServerConfig {
    fn from_env() -> Result<Self> {
        let port_str = env::var("PORT").unwrap_or_else(|_| "3000".to_string());

        let port = port_str.parse::<u16>().map_err(|_| {
            anyhow!("Invalid PORT value: '{}'. Must be a number between 1-65535", port_str)
        })?;

        let host = env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());

        Ok(ServerConfig { port, host })
    }
}

impl LoggingConfig {
    fn from_env() -> Result<Self> {
        let level = env::var("RUST_LOG").unwrap_or_else(|_| "info,vocab_trainer=debug".to_string());

        let file_enabled = env::var("LOG_FILE_ENABLED")
            .unwrap_or_else(|_| "true".to_string())
            .parse::<bool>()
            .unwrap_or(true);

        let console_enabled = env::var("LOG_CONSOLE_ENABLED")
            .unwrap_or_else(|_| "true".to_string())
            .parse::<bool>()
            .unwrap_or(true);

        let log_directory = env::var("LOG_DIRECTORY").unwrap_or_else(|_| "logs".to_string());

        Ok(LoggingConfig {
            level,
            file_enabled,
            console_enabled,
            log_directory,
        })
    }
}

/// Mask sensitive data in configuration for safe logging
fn mask_sensitive_data(data: &str) -> String {
    if data.len() <= 8 {
        "*".repeat(data.len())
    } else {
        format!("{}***{}", &data[..4], &data[data.len() - 4..])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    #[test]
    fn test_mask_sensitive_data() {
        assert_eq!(mask_sensitive_data("short"), "*****");
        assert_eq!(mask_sensitive_data("sqlite:vocab_trainer.db"), "sqli***r.db");
        assert_eq!(mask_sensitive_data("sk-1234567890abcdef"), "sk-1***cdef");
    }

    #[test]
    fn test_database_config_defaults() {
        env::remove_var("DATABASE_URL");

        let config = DatabaseConfig::from_env().unwrap();
        assert_eq!(config.url, "sqlite:vocab_trainer.db");
    }

    #[test]
    fn test_server_config_defaults() {
        env::remove_var("PORT");
        env::remove_var("HOST");

        let config = ServerConfig::from_env().unwrap();
        assert_eq!(config.port, 3000);
        assert_eq!(config.host, "0.0.0.0");
    }

    #[test]
    fn test_ai_provider_parsing() {
        let test_cases = vec![
            ("openai", AiProviderKind::OpenAi),
            ("OpenAI", AiProviderKind::OpenAi),
            ("chatgpt", AiProviderKind::OpenAi),
            ("gpt", AiProviderKind::OpenAi),
            ("gemini", AiProviderKind::Gemini),
            ("Gemini", AiProviderKind::Gemini),
            ("google", AiProviderKind::Gemini),
            ("unknown", AiProviderKind::OpenAi), // defaults to OpenAI
        ];

        for (input, expected) in test_cases {
            env::set_var("AI_PROVIDER", input);
            let config = AiConfig::from_env().unwrap();
            assert_eq!(config.provider, expected, "Input '{}' should map to {:?}", input, expected);
        }

        env::remove_var("AI_PROVIDER");
    }

    #[test]
    fn test_config_validation() {
        let config = Config {
            database: DatabaseConfig {
                url: "sqlite:test.db".to_string(),
            },
            ai: AiConfig {
                api_key: "sk-valid-key".to_string(),
                base_url: None,
                provider: AiProviderKind::OpenAi,
                model: None,
                native_language: "Vietnamese".to_string(),
            },
            server: ServerConfig {
                port: 3000,
                host: "0.0.0.0".to_string(),
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                file_enabled: true,
                console_enabled: true,
                log_directory: "logs".to_string(),
            },
        };

        assert!(config.validate().is_ok());

        // Test invalid port
        let mut invalid_config = config.clone();
        invalid_config.server.port = 0;
        assert!(invalid_config.validate().is_err());
    }

    #[test]
    fn test_invalid_port_parsing() {
        env::set_var("PORT", "not-a-number");
        let result = ServerConfig::from_env();
        assert!(result.is_err());

        env::remove_var("PORT");
    }
}
