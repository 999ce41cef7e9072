use std::{env, time::Duration};

use chrono::{DateTime, TimeZone, Utc};

pub const DEFAULT_RECENT_AUTHORS_LIMIT: usize = 10;
pub const DEFAULT_RECENT_AUTHORS_TTL: Duration = Duration::from_secs(60);

/// Registration time assumed for accounts created before registration
/// timestamps were recorded (2008-01-15T00:00:00Z).
pub fn default_registration() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2008, 1, 15, 0, 0, 0)
        .single()
        .unwrap_or(DateTime::UNIX_EPOCH)
}

#[derive(Debug, Clone, PartialEq)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub wiki_id: String,
    pub wiki_language: String,
    pub recent_authors_limit: usize,
    pub recent_authors_ttl: Duration,
    pub default_registration: DateTime<Utc>,
    pub log_level: String,
    pub log_format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            wiki_id: "wiki".to_string(),
            wiki_language: "en".to_string(),
            recent_authors_limit: DEFAULT_RECENT_AUTHORS_LIMIT,
            recent_authors_ttl: DEFAULT_RECENT_AUTHORS_TTL,
            default_registration: default_registration(),
            log_level: "filter_vars=info".to_string(),
            log_format: LogFormat::Text,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(wiki_id) = env::var("FILTER_VARS_WIKI_ID") {
            config.wiki_id = wiki_id;
        }

        if let Ok(language) = env::var("FILTER_VARS_WIKI_LANGUAGE") {
            config.wiki_language = language;
        }

        if let Ok(limit_str) = env::var("FILTER_VARS_RECENT_AUTHORS_LIMIT") {
            match limit_str.parse::<usize>() {
                Ok(limit) if limit > 0 => config.recent_authors_limit = limit,
                _ => eprintln!(
                    "Warning: Invalid FILTER_VARS_RECENT_AUTHORS_LIMIT value '{}', using default {}",
                    limit_str, config.recent_authors_limit
                ),
            }
        }

        if let Ok(ttl_str) = env::var("FILTER_VARS_RECENT_AUTHORS_TTL_SECONDS") {
            if let Ok(ttl) = ttl_str.parse::<u64>() {
                config.recent_authors_ttl = Duration::from_secs(ttl);
            } else {
                eprintln!(
                    "Warning: Invalid FILTER_VARS_RECENT_AUTHORS_TTL_SECONDS value '{}', using default {:?}",
                    ttl_str, config.recent_authors_ttl
                );
            }
        }

        if let Ok(log_level) = env::var("RUST_LOG") {
            config.log_level = log_level;
        } else if let Ok(log_level) = env::var("FILTER_VARS_LOG_LEVEL") {
            config.log_level = log_level;
        }

        if let Ok(log_format) = env::var("FILTER_VARS_LOG_FORMAT") {
            config.log_format = match log_format.to_lowercase().as_str() {
                "text" | "plain" => LogFormat::Text,
                "json" => LogFormat::Json,
                _ => {
                    eprintln!(
                        "Warning: Invalid FILTER_VARS_LOG_FORMAT value '{}', using default text",
                        log_format
                    );
                    LogFormat::Text
                }
            };
        }

        config
    }
}
