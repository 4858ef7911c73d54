use crate::config::types::{Config, CrawlerConfig, OutputConfig, UserAgentConfig};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_seeds(&config.seeds)?;
    validate_crawler_config(&config.crawler)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_output_config(&config.output)?;
    Ok(())
}

/// Validates the seed list: at least one entry, all absolute HTTP(S) URLs
fn validate_seeds(seeds: &[String]) -> Result<(), ConfigError> {
    if seeds.is_empty() {
        return Err(ConfigError::Validation(
            "at least one seed URL is required".to_string(),
        ));
    }

    for seed in seeds {
        let url = Url::parse(seed)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid seed URL '{}': {}", seed, e)))?;

        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(ConfigError::Validation(format!(
                "Seed URL '{}' must use http or https",
                seed
            )));
        }

        if url.host_str().is_none() {
            return Err(ConfigError::InvalidUrl(format!(
                "Seed URL '{}' has no host",
                seed
            )));
        }
    }

    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.max_concurrent_fetches < 1 || config.max_concurrent_fetches > 64 {
        return Err(ConfigError::Validation(format!(
            "max_concurrent_fetches must be between 1 and 64, got {}",
            config.max_concurrent_fetches
        )));
    }

    if config.max_pages < 1 {
        return Err(ConfigError::Validation(
            "max_pages must be >= 1".to_string(),
        ));
    }

    if config.request_timeout_ms == 0 {
        return Err(ConfigError::Validation(
            "request_timeout_ms must be > 0".to_string(),
        ));
    }

    if config.max_host_requests < 1 {
        return Err(ConfigError::Validation(format!(
            "max_host_requests must be >= 1, got {}",
            config.max_host_requests
        )));
    }

    if config.max_storage_failures < 1 {
        return Err(ConfigError::Validation(
            "max_storage_failures must be >= 1".to_string(),
        ));
    }

    for pattern in &config.allowed_hosts {
        validate_host_pattern(pattern)?;
    }

    Ok(())
}

/// Validates user agent configuration
fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    if config.crawler_name.is_empty() {
        return Err(ConfigError::Validation(
            "crawler_name cannot be empty".to_string(),
        ));
    }

    if !config
        .crawler_name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "crawler_name must contain only alphanumeric characters and hyphens, got '{}'",
            config.crawler_name
        )));
    }

    Url::parse(&config.contact_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid contact_url: {}", e)))?;

    validate_email(&config.contact_email)?;

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    let paths = [
        ("records_path", &config.records_path),
        ("content_dir", &config.content_dir),
        ("database_path", &config.database_path),
        ("index_dir", &config.index_dir),
        ("export_path", &config.export_path),
    ];

    for (name, path) in paths {
        if path.as_os_str().is_empty() {
            return Err(ConfigError::Validation(format!("{} cannot be empty", name)));
        }
    }

    Ok(())
}

/// Validates a host pattern (`example.com` or `*.example.com`)
fn validate_host_pattern(pattern: &str) -> Result<(), ConfigError> {
    let host = pattern.strip_prefix("*.").unwrap_or(pattern);

    if host.is_empty() {
        return Err(ConfigError::InvalidPattern(format!(
            "Host pattern '{}' is empty",
            pattern
        )));
    }

    if !host
        .chars()
        .all(|c| c.is_alphanumeric() || c == '.' || c == '-')
    {
        return Err(ConfigError::InvalidPattern(format!(
            "Host '{}' contains invalid characters",
            host
        )));
    }

    if host.starts_with('.')
        || host.ends_with('.')
        || host.starts_with('-')
        || host.ends_with('-')
        || host.contains("..")
    {
        return Err(ConfigError::InvalidPattern(format!(
            "Host '{}' is malformed",
            host
        )));
    }

    Ok(())
}

/// Basic email validation
fn validate_email(email: &str) -> Result<(), ConfigError> {
    let (local, domain) = email.split_once('@').ok_or_else(|| {
        ConfigError::Validation(format!("Invalid email format: '{}'", email))
    })?;

    if local.is_empty() || domain.is_empty() || domain.contains('@') {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    }

    if !domain.contains('.') {
        return Err(ConfigError::Validation(format!(
            "Invalid email domain: '{}'",
            email
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_host_pattern() {
        assert!(validate_host_pattern("example.com").is_ok());
        assert!(validate_host_pattern("*.example.com").is_ok());
        assert!(validate_host_pattern("localhost").is_ok());
        assert!(validate_host_pattern("127.0.0.1").is_ok());

        assert!(validate_host_pattern("").is_err());
        assert!(validate_host_pattern("*.").is_err());
        assert!(validate_host_pattern(".example.com").is_err());
        assert!(validate_host_pattern("example.com.").is_err());
        assert!(validate_host_pattern("exa mple.com").is_err());
    }

    #[test]
    fn test_validate_email() {
        assert!(validate_email("user@example.com").is_ok());
        assert!(validate_email("admin@sub.example.com").is_ok());

        assert!(validate_email("").is_err());
        assert!(validate_email("invalid").is_err());
        assert!(validate_email("@example.com").is_err());
        assert!(validate_email("user@").is_err());
        assert!(validate_email("user@domain").is_err());
        assert!(validate_email("a@b@c.com").is_err());
    }

    #[test]
    fn test_validate_seeds() {
        assert!(validate_seeds(&["https://example.com".to_string()]).is_ok());
        assert!(validate_seeds(&["http://127.0.0.1:8080/".to_string()]).is_ok());

        assert!(validate_seeds(&[]).is_err());
        assert!(validate_seeds(&["ftp://example.com/".to_string()]).is_err());
        assert!(validate_seeds(&["not a url".to_string()]).is_err());
    }

    #[test]
    fn test_validate_crawler_limits() {
        let mut config = CrawlerConfig::default();
        assert!(validate_crawler_config(&config).is_ok());

        config.max_concurrent_fetches = 0;
        assert!(validate_crawler_config(&config).is_err());

        config = CrawlerConfig {
            max_pages: 0,
            ..CrawlerConfig::default()
        };
        assert!(validate_crawler_config(&config).is_err());

        config = CrawlerConfig {
            allowed_hosts: vec!["*..bad".to_string()],
            ..CrawlerConfig::default()
        };
        assert!(validate_crawler_config(&config).is_err());
    }
}
