//! The typed client facade.
//!
//! One [`Client::call`] is one action invocation: resolve the action in the
//! registry, encode and validate the arguments, merge the fixed
//! authentication fields, sign, POST, and decode. All argument problems
//! surface before anything touches the network.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;

use crate::config::{ClientConfig, Credentials, Endpoint, OutputMode};
use crate::encode;
use crate::error::{self, Error};
use crate::schema::Registry;
use crate::sign;
use crate::transport::{HttpTransport, SignedRequest, Transport};
use crate::value::{format_utc, Arguments};

/// A handle on one API endpoint with one set of credentials.
///
/// Credentials, endpoint, and the pinned API version are immutable for the
/// client's lifetime. The registry is shared read-only, so clients are cheap
/// to create and safe to use from multiple threads.
pub struct Client {
    endpoint: Endpoint,
    credentials: Credentials,
    registry: Arc<Registry>,
    api_version: String,
    output: OutputMode,
    transport: Box<dyn Transport>,
}

impl Client {
    /// Build a client with the production HTTP transport.
    pub fn new(config: &ClientConfig) -> Result<Self, Error> {
        let transport = HttpTransport::new(
            config.connect_timeout,
            config.timeout,
            config.ssl_ca_file.as_deref(),
        )?;
        Ok(Self::with_transport(config, Box::new(transport)))
    }

    /// Build a client from the `PADDOCK_API_*` environment.
    pub fn from_env() -> Result<Self, Error> {
        Self::new(&ClientConfig::from_env()?)
    }

    /// Build a client over any [`Transport`]. Tests use this to substitute
    /// a recording transport.
    pub fn with_transport(config: &ClientConfig, transport: Box<dyn Transport>) -> Self {
        Self {
            endpoint: config.endpoint.clone(),
            credentials: config.credentials.clone(),
            registry: Registry::builtin(),
            api_version: config.api_version.clone(),
            output: config.output,
            transport,
        }
    }

    /// Replace the action registry (custom or extended catalogs).
    pub fn with_registry(mut self, registry: Arc<Registry>) -> Self {
        self.registry = registry;
        self
    }

    pub fn api_version(&self) -> &str {
        &self.api_version
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Invoke an action by wire name or `snake_case` alias.
    ///
    /// On success returns the decoded JSON body, or the body as a JSON
    /// string when the action is declared `raw_output` (or the client is in
    /// [`OutputMode::Raw`]).
    ///
    /// # Errors
    ///
    /// Argument problems ([`EncodeError`](crate::EncodeError)) and unknown
    /// actions fail before any I/O. Server-side failures come back as
    /// [`Error::Api`], [`Error::Multi`], or [`Error::Http`] depending on
    /// what the response body held.
    pub fn call(&self, action: &str, args: Arguments) -> Result<serde_json::Value, Error> {
        let schema = self
            .registry
            .action(action, &self.api_version)
            .ok_or_else(|| Error::UnknownAction {
                name: action.to_string(),
                version: self.api_version.clone(),
            })?;
        let fields = encode::encode_call(schema, args)?;
        let raw = self.output == OutputMode::Raw || schema.raw_output;
        self.post(&schema.name, fields, raw)
    }

    /// Send caller-supplied fields verbatim, bypassing the schema.
    ///
    /// For actions missing from the loaded catalog. No validation, no
    /// default suppression; the fixed authentication fields still win on
    /// any name collision.
    pub fn call_arbitrary(
        &self,
        action: &str,
        params: &BTreeMap<String, String>,
    ) -> Result<serde_json::Value, Error> {
        self.post(action, params.clone(), self.output == OutputMode::Raw)
    }

    fn post(
        &self,
        action: &str,
        mut fields: BTreeMap<String, String>,
        raw: bool,
    ) -> Result<serde_json::Value, Error> {
        fields.insert("access_key_id".to_string(), self.credentials.access_key.clone());
        fields.insert("action".to_string(), action.to_string());
        fields.insert("signature_version".to_string(), "2".to_string());
        fields.insert("signature_method".to_string(), "HmacSHA256".to_string());
        fields.insert("timestamp".to_string(), format_utc(&Utc::now()));
        fields.insert("version".to_string(), self.api_version.clone());

        let body = sign::signed_body(
            &fields,
            self.endpoint.host(),
            self.endpoint.path(),
            self.credentials.secret_key(),
        );
        let request = SignedRequest {
            url: self.endpoint.url(),
            host: self.endpoint.host().to_string(),
            body,
        };
        let response = self.transport.post(&request)?;

        if !(200..300).contains(&response.status) {
            return Err(error::resolve_failure(
                response.status,
                &response.body,
                self.registry.errors(),
            ));
        }
        if raw {
            return Ok(serde_json::Value::String(response.body));
        }
        serde_json::from_str(&response.body).map_err(|_| Error::Http {
            status: response.status,
            body: response.body,
        })
    }
}
