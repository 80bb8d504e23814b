use pgfeatures::{DEFAULT_LIMIT, DEFAULT_MAX_LIMIT, Limits};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// The default collection cache time-to-live, in seconds.
pub const DEFAULT_CACHE_TTL: u64 = 300;

/// The default `Cache-Control` header value.
pub const DEFAULT_CACHE_CONTROL: &str = "public, max-age=3600";

/// Server settings.
///
/// # Examples
///
/// ```
/// use pgfeatures_server::Config;
///
/// let config: Config = serde_json::from_str(r#"{"max_limit": 100}"#).unwrap();
/// assert_eq!(config.default_limit, 10);
/// assert_eq!(config.limits().max, 100);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// The API title, used for search responses.
    pub title: String,

    /// The number of features returned when a request has no `limit`.
    pub default_limit: u64,

    /// Requests with a `limit` above this are rejected.
    pub max_limit: u64,

    /// How long collection descriptors are cached, in seconds.
    pub cache_ttl: u64,

    /// Turns the collection cache off.
    pub cache_disabled: bool,

    /// The `Cache-Control` header set on responses that do not have one.
    pub cache_control: Option<String>,

    /// Allowed CORS origins, `*` allows any.
    pub cors_origins: Vec<String>,
}

impl Config {
    /// Returns the page size limits for the request builder.
    pub fn limits(&self) -> Limits {
        Limits {
            default: self.default_limit,
            max: self.max_limit,
        }
    }

    /// Returns the collection cache time-to-live, or `None` if caching is off.
    pub fn cache_ttl(&self) -> Option<Duration> {
        (!self.cache_disabled && self.cache_ttl > 0).then(|| Duration::from_secs(self.cache_ttl))
    }
}

impl Default for Config {
    fn default() -> Config {
        Config {
            title: "pgfeatures".to_string(),
            default_limit: DEFAULT_LIMIT,
            max_limit: DEFAULT_MAX_LIMIT,
            cache_ttl: DEFAULT_CACHE_TTL,
            cache_disabled: false,
            cache_control: Some(DEFAULT_CACHE_CONTROL.to_string()),
            cors_origins: vec!["*".to_string()],
        }
    }
}
