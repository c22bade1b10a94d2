use crate::config::types::{Config, CrawlerConfig, ProjectEntry, StorageConfig, UserAgentConfig};
use crate::project::MAX_THREADS;
use crate::url::{host_of, validate as is_valid_url};
use crate::ConfigError;
use std::collections::HashSet;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_storage_config(&config.storage)?;
    validate_projects(&config.projects)?;
    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    validate_thread_count(config.thread_count)?;
    validate_crawl_limit(config.crawl_limit)?;

    if config.fetch_timeout_secs < 1 {
        return Err(ConfigError::Validation(
            "fetch_timeout_secs must be >= 1".to_string(),
        ));
    }

    if config.robots_timeout_secs < 1 {
        return Err(ConfigError::Validation(
            "robots_timeout_secs must be >= 1".to_string(),
        ));
    }

    if config.dequeue_wait_ms < 10 || config.dequeue_wait_ms > 60_000 {
        return Err(ConfigError::Validation(format!(
            "dequeue_wait_ms must be between 10 and 60000, got {}",
            config.dequeue_wait_ms
        )));
    }

    Ok(())
}

fn validate_thread_count(thread_count: usize) -> Result<(), ConfigError> {
    if thread_count < 1 || thread_count > MAX_THREADS {
        return Err(ConfigError::Validation(format!(
            "thread_count must be between 1 and {}, got {}",
            MAX_THREADS, thread_count
        )));
    }
    Ok(())
}

fn validate_crawl_limit(crawl_limit: usize) -> Result<(), ConfigError> {
    if crawl_limit < 1 {
        return Err(ConfigError::Validation(format!(
            "crawl_limit must be >= 1, got {}",
            crawl_limit
        )));
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

fn validate_storage_config(config: &StorageConfig) -> Result<(), ConfigError> {
    if config.path.trim().is_empty() {
        return Err(ConfigError::Validation(
            "storage path cannot be empty".to_string(),
        ));
    }
    Ok(())
}

/// Validates project entries
///
/// Two seeds on the same host would share one project name, and so one frontier.
fn validate_projects(projects: &[ProjectEntry]) -> Result<(), ConfigError> {
    let mut names = HashSet::new();

    for entry in projects {
        if !is_valid_url(&entry.seed) {
            return Err(ConfigError::InvalidUrl(format!(
                "Seed URL '{}' must be an http(s) URL with a host",
                entry.seed
            )));
        }

        if let Some(name) = host_of(&entry.seed) {
            if !names.insert(name.clone()) {
                return Err(ConfigError::Validation(format!(
                    "More than one project is seeded on host '{}'",
                    name
                )));
            }
        }

        if let Some(hosts) = &entry.allowed_hosts {
            if hosts.is_empty() {
                return Err(ConfigError::Validation(format!(
                    "Project '{}' has an empty allowed-hosts list",
                    entry.seed
                )));
            }
            for host in hosts {
                validate_host_pattern(host)?;
            }
        }

        if let Some(thread_count) = entry.thread_count {
            validate_thread_count(thread_count)?;
        }

        if let Some(crawl_limit) = entry.crawl_limit {
            validate_crawl_limit(crawl_limit)?;
        }
    }

    Ok(())
}

/// Validates a host pattern (supports a leading `*.` wildcard)
fn validate_host_pattern(pattern: &str) -> Result<(), ConfigError> {
    let host = pattern.strip_prefix("*.").unwrap_or(pattern);

    if host.is_empty() {
        return Err(ConfigError::InvalidPattern(format!(
            "Host pattern '{}' cannot be empty",
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

    if host.starts_with('.') || host.ends_with('.') || host.starts_with('-') || host.ends_with('-')
    {
        return Err(ConfigError::InvalidPattern(format!(
            "Host '{}' cannot start or end with '.' or '-'",
            host
        )));
    }

    if host.contains("..") {
        return Err(ConfigError::InvalidPattern(format!(
            "Host '{}' cannot contain consecutive dots",
            host
        )));
    }

    Ok(())
}

/// Basic email validation
fn validate_email(email: &str) -> Result<(), ConfigError> {
    let (local, domain) = email
        .split_once('@')
        .ok_or_else(|| ConfigError::Validation(format!("Invalid email format: '{}'", email)))?;

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
