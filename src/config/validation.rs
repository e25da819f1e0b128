use crate::config::types::{Config, CrawlerConfig, IntakeConfig, UserAgentConfig};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_intake_config(&config.intake)?;

    if config.output.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database-path must not be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.tick_interval_secs < 10 {
        return Err(ConfigError::Validation(format!(
            "tick-interval-secs must be >= 10, got {}",
            config.tick_interval_secs
        )));
    }

    if config.max_concurrent_jobs < 1 || config.max_concurrent_jobs > 100 {
        return Err(ConfigError::Validation(format!(
            "max-concurrent-jobs must be between 1 and 100, got {}",
            config.max_concurrent_jobs
        )));
    }

    if config.default_crawl_delay_ms < 100 {
        return Err(ConfigError::Validation(format!(
            "default-crawl-delay-ms must be >= 100ms, got {}ms",
            config.default_crawl_delay_ms
        )));
    }

    if config.request_timeout_secs < 1 || config.request_timeout_secs > 300 {
        return Err(ConfigError::Validation(format!(
            "request-timeout-secs must be between 1 and 300, got {}",
            config.request_timeout_secs
        )));
    }

    if let Some(hours) = config.retry_backoff_hours {
        if hours < 1 {
            return Err(ConfigError::Validation(format!(
                "retry-backoff-hours must be >= 1, got {}",
                hours
            )));
        }
    }

    Ok(())
}

/// Validates user agent configuration
fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    if config.crawler_name.is_empty() {
        return Err(ConfigError::Validation(
            "crawler-name must not be empty".to_string(),
        ));
    }

    if config.crawler_version.is_empty() {
        return Err(ConfigError::Validation(
            "crawler-version must not be empty".to_string(),
        ));
    }

    if Url::parse(&config.contact_url).is_err() {
        return Err(ConfigError::Validation(format!(
            "contact-url is not a valid URL: {}",
            config.contact_url
        )));
    }

    if !config.contact_email.contains('@') {
        return Err(ConfigError::Validation(format!(
            "contact-email is not a valid email address: {}",
            config.contact_email
        )));
    }

    Ok(())
}

/// Validates the content-intake configuration
fn validate_intake_config(config: &IntakeConfig) -> Result<(), ConfigError> {
    if let Some(endpoint) = &config.endpoint {
        if Url::parse(endpoint).is_err() {
            return Err(ConfigError::Validation(format!(
                "intake endpoint is not a valid URL: {}",
                endpoint
            )));
        }
    }

    if config.timeout_secs < 1 || config.timeout_secs > 300 {
        return Err(ConfigError::Validation(format!(
            "intake timeout-secs must be between 1 and 300, got {}",
            config.timeout_secs
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::types::OutputConfig;

    fn create_valid_config() -> Config {
        Config {
            crawler: CrawlerConfig {
                tick_interval_secs: 900,
                max_concurrent_jobs: 5,
                default_crawl_delay_ms: 1000,
                request_timeout_secs: 10,
                recency_window_days: 0,
                retry_backoff_hours: None,
                next_crawl_jitter_secs: 0,
            },
            user_agent: UserAgentConfig {
                crawler_name: "ForagerBot".to_string(),
                crawler_version: "0.1".to_string(),
                contact_url: "https://example.com/bot".to_string(),
                contact_email: "crawler@example.com".to_string(),
            },
            intake: IntakeConfig {
                endpoint: Some("https://intake.example.com/items".to_string()),
                api_key: None,
                timeout_secs: 10,
            },
            output: OutputConfig {
                database_path: "./forager.db".to_string(),
            },
        }
    }

    #[test]
    fn test_valid_config_passes() {
        assert!(validate(&create_valid_config()).is_ok());
    }

    #[test]
    fn test_tick_interval_too_small() {
        let mut config = create_valid_config();
        config.crawler.tick_interval_secs = 5;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_zero_concurrent_jobs() {
        let mut config = create_valid_config();
        config.crawler.max_concurrent_jobs = 0;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_crawl_delay_too_small() {
        let mut config = create_valid_config();
        config.crawler.default_crawl_delay_ms = 50;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_invalid_contact_url() {
        let mut config = create_valid_config();
        config.user_agent.contact_url = "not a url".to_string();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_invalid_contact_email() {
        let mut config = create_valid_config();
        config.user_agent.contact_email = "no-at-sign".to_string();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_invalid_intake_endpoint() {
        let mut config = create_valid_config();
        config.intake.endpoint = Some("::bad::".to_string());
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_missing_intake_endpoint_allowed() {
        let mut config = create_valid_config();
        config.intake.endpoint = None;
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_empty_database_path() {
        let mut config = create_valid_config();
        config.output.database_path = String::new();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_zero_retry_backoff_rejected() {
        let mut config = create_valid_config();
        config.crawler.retry_backoff_hours = Some(0);
        assert!(validate(&config).is_err());
    }
}
