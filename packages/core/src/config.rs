//! Client configuration: endpoint, credentials, and environment loading.
//!
//! [`ClientConfig::from_env`] reads the standard variables:
//!
//! | Variable | Meaning |
//! |----------|---------|
//! | `PADDOCK_API_URI` | Endpoint, e.g. `https://fleet.example.com/api/` |
//! | `PADDOCK_API_KEY` | Access key id |
//! | `PADDOCK_API_SECRET` | Secret key |
//! | `PADDOCK_API_SSL_CA_FILE` | Optional PEM bundle for a private CA |

use std::env;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// API version requests are pinned to unless configured otherwise.
pub const DEFAULT_API_VERSION: &str = "2011-08-01";

pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    MissingVar(&'static str),
    #[error("invalid endpoint URI {uri:?}: {reason}")]
    InvalidUri { uri: String, reason: &'static str },
}

/// Access key id and secret key.
///
/// The secret is used to sign requests and is never transmitted. `Debug`
/// redacts it.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub access_key: String,
    secret_key: String,
}

impl Credentials {
    pub fn new(access_key: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            access_key: access_key.into(),
            secret_key: secret_key.into(),
        }
    }

    pub(crate) fn secret_key(&self) -> &str {
        &self.secret_key
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key", &self.access_key)
            .field("secret_key", &"<redacted>")
            .finish()
    }
}

/// Parsed endpoint URI.
///
/// The authority is kept verbatim: an explicit port stays in the signed
/// host string even when it is the scheme default, because the server
/// reconstructs the same string when checking the signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    scheme: String,
    authority: String,
    path: String,
}

impl Endpoint {
    /// Parse an `http`/`https` URI. The path defaults to `/`; query strings
    /// are rejected because every parameter must go through the signed body.
    pub fn parse(uri: &str) -> Result<Self, ConfigError> {
        let invalid = |reason: &'static str| ConfigError::InvalidUri {
            uri: uri.to_string(),
            reason,
        };
        let (scheme, rest) = uri.split_once("://").ok_or_else(|| invalid("missing scheme"))?;
        if scheme != "http" && scheme != "https" {
            return Err(invalid("scheme must be http or https"));
        }
        let (authority, path) = match rest.find('/') {
            Some(i) => (&rest[..i], &rest[i..]),
            None => (rest, "/"),
        };
        if authority.is_empty() {
            return Err(invalid("missing host"));
        }
        if rest.contains('?') || rest.contains('#') {
            return Err(invalid("query strings and fragments are not allowed"));
        }
        Ok(Self {
            scheme: scheme.to_string(),
            authority: authority.to_string(),
            path: path.to_string(),
        })
    }

    /// Verbatim `host[:port]`, as signed and sent in the `Host` header.
    pub fn host(&self) -> &str {
        &self.authority
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn url(&self) -> String {
        format!("{}://{}{}", self.scheme, self.authority, self.path)
    }
}

/// How 2xx bodies come back from [`Client::call`](crate::Client::call).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputMode {
    /// Parse the body as JSON.
    #[default]
    Decoded,
    /// Return the body text verbatim as a JSON string value.
    Raw,
}

/// Everything a [`Client`](crate::Client) needs.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub endpoint: Endpoint,
    pub credentials: Credentials,
    pub ssl_ca_file: Option<PathBuf>,
    pub api_version: String,
    pub output: OutputMode,
    pub connect_timeout: Duration,
    pub timeout: Duration,
}

impl ClientConfig {
    pub fn new(
        uri: &str,
        access_key: impl Into<String>,
        secret_key: impl Into<String>,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            endpoint: Endpoint::parse(uri)?,
            credentials: Credentials::new(access_key, secret_key),
            ssl_ca_file: None,
            api_version: DEFAULT_API_VERSION.to_string(),
            output: OutputMode::Decoded,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            timeout: DEFAULT_TIMEOUT,
        })
    }

    /// Build from `PADDOCK_API_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let uri = require_var("PADDOCK_API_URI")?;
        let access_key = require_var("PADDOCK_API_KEY")?;
        let secret_key = require_var("PADDOCK_API_SECRET")?;
        let mut config = Self::new(&uri, access_key, secret_key)?;
        config.ssl_ca_file = env::var_os("PADDOCK_API_SSL_CA_FILE").map(PathBuf::from);
        Ok(config)
    }
}

fn require_var(name: &'static str) -> Result<String, ConfigError> {
    env::var(name).map_err(|_| ConfigError::MissingVar(name))
}
