use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use resumatch_channel::ReconnectConfig;

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var} has an invalid value: {value:?}")]
    Invalid { var: &'static str, value: String },
}

/// Client configuration loaded from environment variables.
///
/// All fields have defaults suitable for a local development server.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// REST base URL (default: `http://localhost:5000/api`).
    pub api_url: String,
    /// Socket.IO base URL (default: `ws://localhost:5000`).
    pub channel_url: String,
    /// Stored credentials file (default: `.resumatch/credentials.json`).
    pub credentials_path: PathBuf,
    /// HTTP request timeout (default: 30 s).
    pub request_timeout: Duration,
    /// Push channel reconnect backoff (default: 1 s doubling to 30 s).
    pub reconnect: ReconnectConfig,
    pub log_format: LogFormat,
}

impl ClientConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                      | Default                       |
    /// |------------------------------|-------------------------------|
    /// | `RESUMATCH_API_URL`          | `http://localhost:5000/api`   |
    /// | `RESUMATCH_CHANNEL_URL`      | `ws://localhost:5000`         |
    /// | `RESUMATCH_CREDENTIALS_PATH` | `.resumatch/credentials.json` |
    /// | `REQUEST_TIMEOUT_SECS`       | `30`                          |
    /// | `RECONNECT_INITIAL_MS`       | `1000`                        |
    /// | `RECONNECT_MAX_MS`           | `30000`                       |
    /// | `LOG_FORMAT`                 | `pretty` (or `json`)          |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Same as [`from_env`](Self::from_env) with a custom variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let api_url = lookup("RESUMATCH_API_URL")
            .unwrap_or_else(|| "http://localhost:5000/api".into());
        let channel_url =
            lookup("RESUMATCH_CHANNEL_URL").unwrap_or_else(|| "ws://localhost:5000".into());
        let credentials_path = lookup("RESUMATCH_CREDENTIALS_PATH")
            .unwrap_or_else(|| ".resumatch/credentials.json".into())
            .into();

        let request_timeout_secs: u64 = parse_var(&lookup, "REQUEST_TIMEOUT_SECS", 30)?;
        let initial_ms: u64 = parse_var(&lookup, "RECONNECT_INITIAL_MS", 1000)?;
        let max_ms: u64 = parse_var(&lookup, "RECONNECT_MAX_MS", 30_000)?;

        let log_format = match lookup("LOG_FORMAT").as_deref() {
            None | Some("pretty") => LogFormat::Pretty,
            Some("json") => LogFormat::Json,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    var: "LOG_FORMAT",
                    value: other.to_string(),
                })
            }
        };

        Ok(Self {
            api_url,
            channel_url,
            credentials_path,
            request_timeout: Duration::from_secs(request_timeout_secs),
            reconnect: ReconnectConfig {
                initial_delay: Duration::from_millis(initial_ms),
                max_delay: Duration::from_millis(max_ms.max(initial_ms)),
                ..ReconnectConfig::default()
            },
            log_format,
        })
    }
}

fn parse_var<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(var) {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { var, value }),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use assert_matches::assert_matches;

    use super::*;

    fn config(vars: &[(&str, &str)]) -> Result<ClientConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ClientConfig::from_lookup(|var| vars.get(var).cloned())
    }

    #[test]
    fn defaults() {
        let config = config(&[]).unwrap();
        assert_eq!(config.api_url, "http://localhost:5000/api");
        assert_eq!(config.channel_url, "ws://localhost:5000");
        assert_eq!(config.credentials_path, PathBuf::from(".resumatch/credentials.json"));
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert_eq!(config.reconnect.initial_delay, Duration::from_secs(1));
        assert_eq!(config.reconnect.max_delay, Duration::from_secs(30));
        assert_eq!(config.log_format, LogFormat::Pretty);
    }

    #[test]
    fn overrides() {
        let config = config(&[
            ("RESUMATCH_API_URL", "https://match.example.com/api"),
            ("REQUEST_TIMEOUT_SECS", "5"),
            ("RECONNECT_INITIAL_MS", "250"),
            ("LOG_FORMAT", "json"),
        ])
        .unwrap();
        assert_eq!(config.api_url, "https://match.example.com/api");
        assert_eq!(config.request_timeout, Duration::from_secs(5));
        assert_eq!(config.reconnect.initial_delay, Duration::from_millis(250));
        assert_eq!(config.log_format, LogFormat::Json);
    }

    #[test]
    fn invalid_values_are_reported() {
        assert_matches!(
            config(&[("REQUEST_TIMEOUT_SECS", "soon")]),
            Err(ConfigError::Invalid { var: "REQUEST_TIMEOUT_SECS", .. })
        );
        assert_matches!(
            config(&[("LOG_FORMAT", "xml")]),
            Err(ConfigError::Invalid { var: "LOG_FORMAT", .. })
        );
    }
}
