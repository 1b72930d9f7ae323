//! Configuration validation utilities.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

/// Configuration error types.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    /// Failed to parse YAML configuration.
    #[error("failed to parse YAML config: {0}")]
    ParseError(#[from] serde_yaml::Error),

    /// Configuration validation failed.
    #[error("config validation error: {0}")]
    ValidationError(String),
}

/// Parse duration string using humantime.
///
/// Supports various formats: `30s`, `1m`, `5m30s`, `1h`, `2h30m`, `1d`, `100ms`, etc.
///
/// # Examples
///
/// ```
/// use rpmon::config::parse_duration;
///
/// assert_eq!(parse_duration("30s").unwrap().as_secs(), 30);
/// assert_eq!(parse_duration("1m").unwrap().as_secs(), 60);
/// assert_eq!(parse_duration("1h30m").unwrap().as_secs(), 5400);
/// ```
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("duration string is empty".to_string());
    }
    humantime::parse_duration(s).map_err(|e| e.to_string())
}

/// Parse the user supplied sampling interval and check it against `[min, max]`.
///
/// A bare number is taken as seconds (`"1"`, `"2.5"`); anything else must be
/// a humantime duration (`"500ms"`, `"1m"`).
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use rpmon::config::parse_sample_interval;
///
/// let min = Duration::from_secs(1);
/// let max = Duration::from_secs(3600);
/// assert_eq!(parse_sample_interval("2", min, max).unwrap(), Duration::from_secs(2));
/// assert!(parse_sample_interval("0.5", min, max).is_err());
/// ```
pub fn parse_sample_interval(
    s: &str,
    min: Duration,
    max: Duration,
) -> Result<Duration, ConfigError> {
    let s = s.trim();
    let interval = match s.parse::<f64>() {
        Ok(secs) if secs.is_finite() && secs > 0.0 => {
            Duration::try_from_secs_f64(secs).map_err(|_| {
                ConfigError::ValidationError(format!(
                    "invalid sample interval '{s}': must be between {:.0} and {:.0} seconds",
                    min.as_secs_f64(),
                    max.as_secs_f64(),
                ))
            })?
        }
        Ok(_) => {
            return Err(ConfigError::ValidationError(format!(
                "invalid sample interval '{s}': must be a positive number of seconds"
            )));
        }
        Err(_) => parse_duration(s).map_err(|e| {
            ConfigError::ValidationError(format!("invalid sample interval '{s}': {e}"))
        })?,
    };

    if interval < min || interval > max {
        return Err(ConfigError::ValidationError(format!(
            "invalid sample interval {:.3}s: must be between {:.0} and {:.0} seconds",
            interval.as_secs_f64(),
            min.as_secs_f64(),
            max.as_secs_f64(),
        )));
    }

    Ok(interval)
}

/// Device address given on the command line as `host:port`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    /// Hostname or IP address.
    pub host: String,
    /// Non-zero port.
    pub port: u16,
}

impl Target {
    /// Create a target from already-validated parts.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Parse `host:port`; IPv6 literals must be bracketed (`[::1]:161`).
    pub fn parse(s: &str) -> Result<Self, ConfigError> {
        let s = s.trim();
        let (host, port) = s.rsplit_once(':').ok_or_else(|| {
            ConfigError::ValidationError(format!("invalid target '{s}': expected host:port"))
        })?;

        let host = host
            .strip_prefix('[')
            .and_then(|h| h.strip_suffix(']'))
            .unwrap_or(host);
        if host.is_empty() || host.contains(char::is_whitespace) {
            return Err(ConfigError::ValidationError(format!(
                "invalid target '{s}': missing host"
            )));
        }
        if host.contains(':') && !s.starts_with('[') {
            return Err(ConfigError::ValidationError(format!(
                "invalid target '{s}': IPv6 hosts must be bracketed"
            )));
        }

        let port: u16 = port.parse().map_err(|_| {
            ConfigError::ValidationError(format!("invalid target '{s}': bad port '{port}'"))
        })?;
        if port == 0 {
            return Err(ConfigError::ValidationError(format!(
                "invalid target '{s}': port must be non-zero"
            )));
        }

        Ok(Self::new(host, port))
    }
}

impl FromStr for Target {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

/// Expand environment variables in a string.
/// Supports ${VAR} and ${VAR:-default} syntax.
pub fn expand_env_vars(input: &str) -> String {
    static ENV_VAR_REGEX: std::sync::OnceLock<regex::Regex> = std::sync::OnceLock::new();

    let regex = ENV_VAR_REGEX.get_or_init(|| {
        regex::Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)(?::-([^}]*))?\}")
            .expect("failed to compile env var regex")
    });

    regex
        .replace_all(input, |caps: &regex::Captures| {
            let var_name = &caps[1];
            let default_value = caps.get(2).map(|m| m.as_str()).unwrap_or("");
            std::env::var(var_name).unwrap_or_else(|_| default_value.to_string())
        })
        .into_owned()
}
