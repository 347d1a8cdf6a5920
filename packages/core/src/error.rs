//! Error taxonomy: the crate-wide [`Error`] umbrella, typed server errors,
//! and the registry that interns one class per declared error code.
//!
//! The action catalog declares error codes per action; the registry
//! normalizes each code (appending the `Error` suffix when absent) and keeps
//! exactly one [`ErrorClass`] per normalized name, however many actions
//! declare it. A handful of classes exist regardless of the catalog: the
//! authentication set and the multi-error envelope. Codes the registry has
//! never seen degrade to a plain [`ApiError`] with no class, so a server
//! that grows new codes never breaks the client.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Deserialize;
use thiserror::Error;

use crate::config::ConfigError;
use crate::encode::EncodeError;
use crate::transport::TransportError;

/// Classes present in every registry, whatever the catalog declares.
const AUTHENTICATION_CLASSES: [&str; 4] = [
    "UnauthorisedError",
    "SignatureDoesNotMatchError",
    "AuthFailureError",
    "InvalidCredentialsError",
];

/// Umbrella error for [`Client`](crate::Client) operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Argument validation or encoding failed; nothing was sent.
    #[error(transparent)]
    Encode(#[from] EncodeError),
    /// The action is not in the loaded catalog at the pinned API version.
    #[error("unknown action {name:?} at API version {version}")]
    UnknownAction { name: String, version: String },
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Transport(#[from] TransportError),
    /// Non-2xx response whose body was not a recognisable error payload.
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },
    /// A typed server-side failure.
    #[error(transparent)]
    Api(#[from] ApiError),
    /// Several server-side failures reported in one response.
    #[error(transparent)]
    Multi(#[from] MultiError),
}

/// How an [`ErrorClass`] is used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Ordinary action failure.
    Api,
    /// Credential or signature rejection.
    Authentication,
    /// Envelope for multiple sub-errors.
    Multi,
}

/// One interned class per normalized error code.
#[derive(Debug, PartialEq, Eq)]
pub struct ErrorClass {
    /// Normalized name, e.g. `UnknownComputerError`.
    pub name: String,
    pub kind: ErrorKind,
}

/// A typed failure decoded from a non-2xx response payload.
#[derive(Debug, Clone, Error)]
#[error("{code}: {message} (HTTP {http_status})")]
pub struct ApiError {
    pub http_status: u16,
    /// Wire code exactly as the server sent it.
    pub code: String,
    pub message: String,
    /// The response text this failure was decoded from, verbatim.
    pub body: String,
    /// The interned class for the normalized code; `None` when the code is
    /// not in the registry.
    pub class: Option<Arc<ErrorClass>>,
}

/// A batch failure decomposed into per-item [`ApiError`]s.
#[derive(Debug, Clone, Error)]
#[error("{message} (HTTP {http_status})")]
pub struct MultiError {
    pub http_status: u16,
    pub message: String,
    /// The response text this failure was decoded from, verbatim.
    pub body: String,
    pub errors: Vec<ApiError>,
}

/// Append-only, de-duplicating store of [`ErrorClass`]es.
#[derive(Debug)]
pub struct ErrorRegistry {
    classes: BTreeMap<String, Arc<ErrorClass>>,
}

impl ErrorRegistry {
    /// An empty registry holding only the always-present classes.
    pub fn new() -> Self {
        let mut registry = Self {
            classes: BTreeMap::new(),
        };
        for name in AUTHENTICATION_CLASSES {
            registry.insert(name, ErrorKind::Authentication);
        }
        registry.insert("MultiError", ErrorKind::Multi);
        registry
    }

    /// Normalize a wire code: append the `Error` suffix unless present.
    pub fn normalize(code: &str) -> String {
        if code.ends_with("Error") {
            code.to_string()
        } else {
            format!("{code}Error")
        }
    }

    /// Intern the class for `code`, creating it on first sight. Re-declaring
    /// a code returns the existing class; nothing is ever replaced.
    pub fn register(&mut self, code: &str) -> Arc<ErrorClass> {
        let name = Self::normalize(code);
        let class = self
            .classes
            .entry(name.clone())
            .or_insert_with(|| Arc::new(ErrorClass {
                name,
                kind: ErrorKind::Api,
            }));
        Arc::clone(class)
    }

    /// Look up the class for a wire code, normalizing first.
    pub fn lookup(&self, code: &str) -> Option<Arc<ErrorClass>> {
        self.classes.get(&Self::normalize(code)).map(Arc::clone)
    }

    /// Normalized names, in order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.classes.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    fn insert(&mut self, name: &str, kind: ErrorKind) {
        self.classes.entry(name.to_string()).or_insert_with(|| {
            Arc::new(ErrorClass {
                name: name.to_string(),
                kind,
            })
        });
    }
}

impl Default for ErrorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Response-payload resolution
// ---------------------------------------------------------------------------

/// Wire shape of a failure body: `{"error": ..., "message": ..., "errors": [...]}`.
#[derive(Debug, Deserialize)]
struct ErrorPayload {
    error: String,
    message: String,
    #[serde(default)]
    errors: Vec<ErrorPayload>,
}

/// Map a non-2xx response to the taxonomy.
///
/// A body that does not parse as an error payload becomes [`Error::Http`];
/// a payload with sub-errors becomes [`Error::Multi`] with every leaf
/// resolved through the registry; anything else becomes an [`Error::Api`]
/// whose class is the registry's entry for the code, if any. Typed failures
/// keep the response text verbatim alongside the parsed fields.
pub(crate) fn resolve_failure(status: u16, body: &str, registry: &ErrorRegistry) -> Error {
    let Ok(payload) = serde_json::from_str::<ErrorPayload>(body) else {
        return Error::Http {
            status,
            body: body.to_string(),
        };
    };
    if payload.errors.is_empty() {
        return Error::Api(resolve_one(status, body, &payload, registry));
    }
    let mut errors = Vec::new();
    flatten_into(status, body, &payload.errors, registry, &mut errors);
    Error::Multi(MultiError {
        http_status: status,
        message: payload.message,
        body: body.to_string(),
        errors,
    })
}

fn resolve_one(
    status: u16,
    body: &str,
    payload: &ErrorPayload,
    registry: &ErrorRegistry,
) -> ApiError {
    ApiError {
        http_status: status,
        code: payload.error.clone(),
        message: payload.message.clone(),
        body: body.to_string(),
        class: registry.lookup(&payload.error),
    }
}

/// Nested sub-error lists flatten into one list of leaves.
fn flatten_into(
    status: u16,
    body: &str,
    payloads: &[ErrorPayload],
    registry: &ErrorRegistry,
    out: &mut Vec<ApiError>,
) {
    for payload in payloads {
        if payload.errors.is_empty() {
            out.push(resolve_one(status, body, payload, registry));
        } else {
            flatten_into(status, body, &payload.errors, registry, out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_appends_the_suffix_once() {
        assert_eq!(ErrorRegistry::normalize("UnknownComputer"), "UnknownComputerError");
        assert_eq!(
            ErrorRegistry::normalize("UnknownAlertTypeError"),
            "UnknownAlertTypeError"
        );
    }

    #[test]
    fn register_interns_one_class_per_code() {
        let mut registry = ErrorRegistry::new();
        let first = registry.register("UnknownComputer");
        let again = registry.register("UnknownComputer");
        let suffixed = registry.register("UnknownComputerError");
        assert!(Arc::ptr_eq(&first, &again));
        assert!(Arc::ptr_eq(&first, &suffixed));
        assert_eq!(first.name, "UnknownComputerError");
        assert_eq!(first.kind, ErrorKind::Api);
    }

    #[test]
    fn fixed_classes_are_always_present() {
        let registry = ErrorRegistry::new();
        for code in ["Unauthorised", "SignatureDoesNotMatch", "AuthFailure", "InvalidCredentials"] {
            let class = registry.lookup(code).expect(code);
            assert_eq!(class.kind, ErrorKind::Authentication);
        }
        let multi = registry.lookup("MultiError").unwrap();
        assert_eq!(multi.kind, ErrorKind::Multi);
    }

    #[test]
    fn registering_a_fixed_class_keeps_its_kind() {
        let mut registry = ErrorRegistry::new();
        let class = registry.register("SignatureDoesNotMatch");
        assert_eq!(class.kind, ErrorKind::Authentication);
    }

    #[test]
    fn unknown_codes_lookup_as_none() {
        let registry = ErrorRegistry::new();
        assert!(registry.lookup("NeverDeclared").is_none());
    }

    #[test]
    fn single_error_payloads_resolve_through_the_registry() {
        let mut registry = ErrorRegistry::new();
        registry.register("UnknownComputer");

        let err = resolve_failure(
            404,
            r#"{"error": "UnknownComputer", "message": "no computer 5"}"#,
            &registry,
        );
        match err {
            Error::Api(api) => {
                assert_eq!(api.http_status, 404);
                assert_eq!(api.code, "UnknownComputer");
                assert_eq!(api.message, "no computer 5");
                assert_eq!(api.class.unwrap().name, "UnknownComputerError");
            }
            other => panic!("expected Error::Api, got {other:?}"),
        }
    }

    #[test]
    fn unknown_codes_degrade_to_a_classless_api_error() {
        let registry = ErrorRegistry::new();
        let err = resolve_failure(
            400,
            r#"{"error": "BrandNewFailure", "message": "?"}"#,
            &registry,
        );
        match err {
            Error::Api(api) => assert!(api.class.is_none()),
            other => panic!("expected Error::Api, got {other:?}"),
        }
    }

    #[test]
    fn multi_error_payloads_flatten_recursively() {
        let mut registry = ErrorRegistry::new();
        registry.register("UnknownComputer");

        let body = r#"{
            "error": "MultiError",
            "message": "2 of 3 failed",
            "errors": [
                {"error": "UnknownComputer", "message": "no computer 5"},
                {"error": "Nested", "message": "outer", "errors": [
                    {"error": "UnknownComputer", "message": "no computer 6"}
                ]}
            ]
        }"#;
        match resolve_failure(400, body, &registry) {
            Error::Multi(multi) => {
                assert_eq!(multi.message, "2 of 3 failed");
                assert_eq!(multi.errors.len(), 2);
                assert_eq!(multi.errors[0].message, "no computer 5");
                assert_eq!(multi.errors[1].message, "no computer 6");
                assert!(multi.errors.iter().all(|e| e.class.is_some()));
            }
            other => panic!("expected Error::Multi, got {other:?}"),
        }
    }

    #[test]
    fn resolved_errors_keep_the_raw_body() {
        let registry = ErrorRegistry::new();

        // Payload fields outside error/message survive on the typed error.
        let body = r#"{"error": "Throttled", "message": "slow down", "retry_after": 30}"#;
        match resolve_failure(429, body, &registry) {
            Error::Api(api) => assert_eq!(api.body, body),
            other => panic!("expected Error::Api, got {other:?}"),
        }

        let body = r#"{"error": "MultiError", "message": "1 of 2 failed", "errors": [
            {"error": "UnknownComputer", "message": "no computer 5"}
        ]}"#;
        match resolve_failure(400, body, &registry) {
            Error::Multi(multi) => {
                assert_eq!(multi.body, body);
                assert_eq!(multi.errors[0].body, body);
            }
            other => panic!("expected Error::Multi, got {other:?}"),
        }
    }

    #[test]
    fn unparseable_bodies_become_http_errors() {
        let registry = ErrorRegistry::new();
        let err = resolve_failure(502, "<html>bad gateway</html>", &registry);
        match err {
            Error::Http { status, body } => {
                assert_eq!(status, 502);
                assert!(body.contains("bad gateway"));
            }
            other => panic!("expected Error::Http, got {other:?}"),
        }

        // Parseable JSON that is not the error shape is still a plain HTTP error.
        let err = resolve_failure(500, r#"{"status": "down"}"#, &registry);
        assert!(matches!(err, Error::Http { status: 500, .. }));
    }
}
