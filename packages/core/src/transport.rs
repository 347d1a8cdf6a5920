//! HTTP transport seam.
//!
//! The client facade builds a [`SignedRequest`] and hands it to a
//! [`Transport`]; the production implementation wraps a blocking `reqwest`
//! client. Tests substitute a recording transport through the same trait.
//!
//! One POST per call, no retries. Every HTTP response, whatever its status,
//! comes back as an [`HttpResponse`]; only network-level failures (connect,
//! timeout, TLS) are [`TransportError`]s.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

/// A fully signed request, ready to POST.
#[derive(Debug, Clone, PartialEq)]
pub struct SignedRequest {
    /// Complete request URL.
    pub url: String,
    /// Verbatim `host[:port]` the body was signed against; sent as the
    /// `Host` header.
    pub host: String,
    /// Form-encoded body ending in the `signature` pair.
    pub body: String,
}

/// Status and body text of a response, for any status code.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to build HTTP client: {0}")]
    Build(reqwest::Error),
    #[error("failed to read CA bundle {path:?}: {source}")]
    CaRead {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid CA certificate in {path:?}: {reason}")]
    CaInvalid { path: PathBuf, reason: String },
    #[error("request failed: {0}")]
    Send(#[from] reqwest::Error),
}

/// Seam between the client facade and the network.
pub trait Transport: Send + Sync {
    fn post(&self, request: &SignedRequest) -> Result<HttpResponse, TransportError>;
}

/// Blocking production transport.
pub struct HttpTransport {
    client: reqwest::blocking::Client,
}

impl HttpTransport {
    /// Build the transport. `ca_file`, when set, names a PEM bundle added as
    /// an extra trust root (private CAs on self-hosted endpoints).
    pub fn new(
        connect_timeout: Duration,
        timeout: Duration,
        ca_file: Option<&Path>,
    ) -> Result<Self, TransportError> {
        let mut builder = reqwest::blocking::Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(timeout);
        if let Some(path) = ca_file {
            let pem = fs::read(path).map_err(|source| TransportError::CaRead {
                path: path.to_path_buf(),
                source,
            })?;
            let certificate = reqwest::Certificate::from_pem(&pem).map_err(|e| {
                TransportError::CaInvalid {
                    path: path.to_path_buf(),
                    reason: e.to_string(),
                }
            })?;
            builder = builder.add_root_certificate(certificate);
        }
        let client = builder.build().map_err(TransportError::Build)?;
        Ok(Self { client })
    }
}

impl Transport for HttpTransport {
    fn post(&self, request: &SignedRequest) -> Result<HttpResponse, TransportError> {
        let response = self
            .client
            .post(&request.url)
            .header(reqwest::header::HOST, request.host.as_str())
            .header(
                reqwest::header::CONTENT_TYPE,
                "application/x-www-form-urlencoded",
            )
            .body(request.body.clone())
            .send()?;
        let status = response.status().as_u16();
        let body = response.text()?;
        Ok(HttpResponse { status, body })
    }
}
