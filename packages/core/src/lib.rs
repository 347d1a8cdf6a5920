//! Typed client for the Paddock fleet-management HTTP API.
//!
//! This crate turns named actions with schema-described parameters into
//! canonically encoded, HMAC-signed POST requests, and turns server failure
//! payloads back into a typed error taxonomy. It is the foundation for the
//! `pdk` command-line client.
//!
//! # Crate layout
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`value`] | Caller-facing argument values: [`Value`], [`Arguments`] |
//! | [`schema`] | Action catalog: [`ParameterSpec`], [`ActionSchema`], [`Registry`] |
//! | [`encode`] | Schema-driven flattening of arguments into wire fields |
//! | [`sign`] | Canonical query construction and HMAC-SHA256 signing |
//! | [`client`] | The [`Client`] facade: dispatch, decode, error mapping |
//! | [`transport`] | The [`Transport`] seam and blocking HTTP implementation |
//! | [`config`] | [`ClientConfig`], endpoint parsing, environment loading |
//! | [`error`] | [`Error`] umbrella, [`ApiError`], and the [`ErrorRegistry`] |
//!
//! # Quick start
//!
//! ```rust,ignore
//! use paddock::{Arguments, Client, ClientConfig};
//!
//! let config = ClientConfig::new(
//!     "https://fleet.example.com/api/",
//!     "my-access-key",
//!     "my-secret-key",
//! )?;
//! let client = Client::new(&config)?;
//!
//! // Wire names and snake_case aliases both work.
//! let computers = client.call(
//!     "get_computers",
//!     Arguments::new().with("query", "tag:web").with("limit", 50),
//! )?;
//! println!("{computers:#}");
//! ```

pub mod client;
pub mod config;
pub mod encode;
pub mod error;
pub mod schema;
pub mod sign;
pub mod transport;
pub mod value;

pub use client::Client;
pub use config::{
    ClientConfig, ConfigError, Credentials, Endpoint, OutputMode, DEFAULT_API_VERSION,
};
pub use encode::EncodeError;
pub use error::{ApiError, Error, ErrorClass, ErrorKind, ErrorRegistry, MultiError};
pub use schema::{ActionSchema, ParameterKind, ParameterSpec, Registry, SchemaError};
pub use transport::{HttpResponse, HttpTransport, SignedRequest, Transport, TransportError};
pub use value::{Arguments, Value};
