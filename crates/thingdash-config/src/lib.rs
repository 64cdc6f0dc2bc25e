//! Configuration for the thingdash client.
//!
//! TOML file + environment variables, merged over built-in defaults.
//! The one load-bearing output is [`Config::ws_url`]: the websocket
//! endpoint, derived from the dashboard origin with each component
//! individually overridable.

use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── Config ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Dashboard origin (e.g., "https://things.example.net"). The
    /// websocket endpoint is derived from it unless overridden below.
    pub origin: String,

    /// Websocket scheme override ("ws" or "wss").
    pub protocol: Option<String>,

    /// Websocket host override.
    pub host: Option<String>,

    /// Websocket port override.
    pub port: Option<u16>,

    /// Websocket path on the origin.
    #[serde(default = "default_ws_path")]
    pub ws_path: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            origin: "http://localhost:8080".into(),
            protocol: None,
            host: None,
            port: None,
            ws_path: default_ws_path(),
        }
    }
}

fn default_ws_path() -> String {
    "/ws".into()
}

impl Config {
    /// Websocket endpoint. Scheme, host, and port fall back to the
    /// origin's, with the scheme mapped http → ws / https → wss.
    pub fn ws_url(&self) -> Result<Url, ConfigError> {
        let mut url: Url = self.origin.parse().map_err(|_| ConfigError::Validation {
            field: "origin".into(),
            reason: format!("invalid URL: {}", self.origin),
        })?;

        let scheme = match self.protocol.as_deref() {
            Some(explicit @ ("ws" | "wss")) => explicit,
            Some(other) => {
                return Err(ConfigError::Validation {
                    field: "protocol".into(),
                    reason: format!("expected 'ws' or 'wss', got '{other}'"),
                });
            }
            None => match url.scheme() {
                "http" | "ws" => "ws",
                "https" | "wss" => "wss",
                other => {
                    return Err(ConfigError::Validation {
                        field: "origin".into(),
                        reason: format!("expected http(s) or ws(s) scheme, got '{other}'"),
                    });
                }
            },
        };
        url.set_scheme(scheme)
            .map_err(|()| ConfigError::Validation {
                field: "origin".into(),
                reason: format!("cannot use websocket scheme on: {}", self.origin),
            })?;

        if let Some(host) = &self.host {
            url.set_host(Some(host)).map_err(|_| ConfigError::Validation {
                field: "host".into(),
                reason: format!("invalid host: {host}"),
            })?;
        }
        if let Some(port) = self.port {
            url.set_port(Some(port))
                .map_err(|()| ConfigError::Validation {
                    field: "port".into(),
                    reason: format!("cannot set port on: {}", self.origin),
                })?;
        }
        url.set_path(&self.ws_path);
        Ok(url)
    }
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("net", "thingdash", "thingdash").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("thingdash");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the config from defaults, a TOML file (the canonical path when
/// `path` is `None`) and `THINGDASH_`-prefixed environment variables,
/// in increasing precedence.
pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = path.map_or_else(config_path, Path::to_path_buf);

    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(&path))
        .merge(Env::prefixed("THINGDASH_"));

    let config: Config = figment.extract()?;
    Ok(config)
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn defaults_point_at_localhost() {
        let config = Config::default();
        assert_eq!(config.ws_url().unwrap().as_str(), "ws://localhost:8080/ws");
    }

    #[test]
    fn https_origin_derives_wss() {
        let config = Config {
            origin: "https://things.example.net".into(),
            ..Config::default()
        };
        assert_eq!(
            config.ws_url().unwrap().as_str(),
            "wss://things.example.net/ws"
        );
    }

    #[test]
    fn component_overrides_beat_origin_derivation() {
        let config = Config {
            origin: "http://things.example.net".into(),
            protocol: Some("wss".into()),
            host: Some("ws.example.net".into()),
            port: Some(9443),
            ws_path: "/dashboard/ws".into(),
        };
        assert_eq!(
            config.ws_url().unwrap().as_str(),
            "wss://ws.example.net:9443/dashboard/ws"
        );
    }

    #[test]
    fn rejects_non_websocket_protocol_override() {
        let config = Config {
            protocol: Some("https".into()),
            ..Config::default()
        };
        assert!(matches!(
            config.ws_url(),
            Err(ConfigError::Validation { .. })
        ));
    }

    #[test]
    fn rejects_non_http_origin_scheme() {
        let config = Config {
            origin: "ftp://example.net".into(),
            ..Config::default()
        };
        assert!(matches!(
            config.ws_url(),
            Err(ConfigError::Validation { .. })
        ));
    }

    #[test]
    fn toml_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "origin = \"https://greenhouse.local\"\nport = 8443\n",
        )
        .unwrap();

        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.origin, "https://greenhouse.local");
        assert_eq!(config.port, Some(8443));
        assert_eq!(config.ws_path, "/ws");
        assert_eq!(
            config.ws_url().unwrap().as_str(),
            "wss://greenhouse.local:8443/ws"
        );
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(Some(&dir.path().join("nope.toml"))).unwrap();
        assert_eq!(config.origin, "http://localhost:8080");
    }
}
