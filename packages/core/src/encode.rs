//! Schema-driven parameter encoding.
//!
//! Turns the caller's named [`Value`]s into the flat `path → string` map the
//! wire format wants, walking the action's declared parameter list. Nesting
//! flattens into dotted paths: list items at `name.1`, `name.2`, … (1-indexed),
//! mapping entries at `name.<key>`, structure fields at `name.field`.
//!
//! Two policies shape the output:
//!
//! - **Default suppression**: an optional parameter that is omitted, or
//!   supplied exactly equal to its declared default, emits no key at all.
//!   The request only carries caller overrides.
//! - **Unknown names are hard failures**: any supplied argument the schema
//!   does not declare rejects the whole call before any I/O, so a typo never
//!   silently drops a field.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use thiserror::Error;

use crate::schema::{ActionSchema, ParameterKind, ParameterSpec};
use crate::value::{format_utc, matches_default, Arguments, Value};

/// Errors raised while validating and encoding arguments. Nothing has been
/// sent when one of these is returned.
#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("{action} is missing required parameter {name:?}")]
    MissingParameter { action: String, name: String },
    #[error("{action} does not take: {names}")]
    UnexpectedParameters { action: String, names: String },
    #[error("invalid value for {name:?}: {reason}")]
    InvalidParameter { name: String, reason: String },
    #[error("failed to read {path:?}: {source}")]
    FileRead {
        path: String,
        source: std::io::Error,
    },
}

/// Encode one call's arguments against the action schema.
///
/// Consumes `args` so that whatever the schema walk did not claim can be
/// reported as unexpected.
pub fn encode_call(
    schema: &ActionSchema,
    mut args: Arguments,
) -> Result<BTreeMap<String, String>, EncodeError> {
    let mut fields = BTreeMap::new();
    for spec in &schema.parameters {
        match args.take(&spec.name) {
            Some(value) => {
                if spec.optional
                    && spec
                        .default
                        .as_ref()
                        .is_some_and(|default| matches_default(&value, default))
                {
                    continue;
                }
                encode_parameter(spec, &spec.name, &value, &mut fields)?;
            }
            None if spec.optional => {}
            None => {
                return Err(EncodeError::MissingParameter {
                    action: schema.name.clone(),
                    name: spec.name.clone(),
                });
            }
        }
    }

    let leftover: Vec<&str> = args.names().collect();
    if !leftover.is_empty() {
        return Err(EncodeError::UnexpectedParameters {
            action: schema.name.clone(),
            names: leftover.join(", "),
        });
    }
    Ok(fields)
}

/// Encode one parameter at `path`, recursing into collections.
fn encode_parameter(
    spec: &ParameterSpec,
    path: &str,
    value: &Value,
    out: &mut BTreeMap<String, String>,
) -> Result<(), EncodeError> {
    match &spec.kind {
        ParameterKind::List { item } => encode_list(item, path, value, out),
        ParameterKind::Mapping { key, value: entry } => {
            encode_mapping(key, entry, path, value, out)
        }
        ParameterKind::Structure { fields } => encode_structure(fields, path, value, out),
        _ => {
            let encoded = encode_scalar(spec, path, value)?;
            out.insert(path.to_string(), encoded);
            Ok(())
        }
    }
}

/// Encode a scalar-kinded parameter to its single wire string.
///
/// Also used for mapping keys, which the schema loader restricts to scalar
/// specs.
fn encode_scalar(spec: &ParameterSpec, path: &str, value: &Value) -> Result<String, EncodeError> {
    match &spec.kind {
        ParameterKind::Integer => match value {
            Value::Int(v) => Ok(v.to_string()),
            Value::Str(s) => {
                if s.parse::<i64>().is_err() {
                    return Err(invalid(path, format!("{s:?} is not an integer")));
                }
                Ok(s.clone())
            }
            other => Err(invalid(
                path,
                format!("expected integer, got {}", other.kind_name()),
            )),
        },
        ParameterKind::Float => match value {
            Value::Float(v) => Ok(v.to_string()),
            Value::Int(v) => Ok(v.to_string()),
            Value::Str(s) => {
                if s.parse::<f64>().is_err() {
                    return Err(invalid(path, format!("{s:?} is not a number")));
                }
                Ok(s.clone())
            }
            other => Err(invalid(
                path,
                format!("expected float, got {}", other.kind_name()),
            )),
        },
        ParameterKind::Boolean => match value {
            Value::Bool(v) => Ok(if *v { "true" } else { "false" }.to_string()),
            Value::Str(s) if s == "true" || s == "false" => Ok(s.clone()),
            other => Err(invalid(
                path,
                format!("expected boolean, got {}", other.kind_name()),
            )),
        },
        ParameterKind::RawString => match value {
            Value::Str(s) => Ok(s.clone()),
            other => Err(invalid(
                path,
                format!("expected string, got {}", other.kind_name()),
            )),
        },
        ParameterKind::Enum { values } => match value {
            Value::Str(s) if values.contains(s) => Ok(s.clone()),
            Value::Str(s) => Err(invalid(
                path,
                format!("{s:?} is not one of: {}", values.join(", ")),
            )),
            other => Err(invalid(
                path,
                format!("expected enum value, got {}", other.kind_name()),
            )),
        },
        ParameterKind::Unicode => encode_text(path, value, false),
        ParameterKind::UnicodeLine | ParameterKind::UnicodeTitle => {
            encode_text(path, value, true)
        }
        ParameterKind::Date => match value {
            Value::Date(dt) => Ok(format_utc(dt)),
            // Pre-formatted wire timestamps pass through verbatim.
            Value::Str(s) => Ok(s.clone()),
            other => Err(invalid(
                path,
                format!("expected date, got {}", other.kind_name()),
            )),
        },
        ParameterKind::File => file_payload(path, value, true),
        ParameterKind::Data => file_payload(path, value, false),
        ParameterKind::List { .. }
        | ParameterKind::Mapping { .. }
        | ParameterKind::Structure { .. } => Err(invalid(
            path,
            format!("{} cannot be encoded as a scalar", spec.kind.label()),
        )),
    }
}

/// Free-text encoding shared by the `unicode` family. Dates are accepted
/// and formatted to the wire timestamp layout; the line/title variants
/// reject embedded newlines.
fn encode_text(path: &str, value: &Value, single_line: bool) -> Result<String, EncodeError> {
    let text = match value {
        Value::Str(s) => s.clone(),
        Value::Date(dt) => format_utc(dt),
        Value::Int(v) => v.to_string(),
        Value::Float(v) => v.to_string(),
        other => {
            return Err(invalid(
                path,
                format!("expected text, got {}", other.kind_name()),
            ));
        }
    };
    if single_line && text.contains('\n') {
        return Err(invalid(path, "embedded newlines are not allowed"));
    }
    Ok(text)
}

/// `file` emits `<basename>$$<base64 bytes>` so the server can recover the
/// original filename; `data` emits the base64 payload alone.
fn file_payload(path: &str, value: &Value, with_name: bool) -> Result<String, EncodeError> {
    let Value::Str(file_path) = value else {
        return Err(invalid(
            path,
            format!("expected a file path, got {}", value.kind_name()),
        ));
    };
    let bytes = fs::read(file_path).map_err(|source| EncodeError::FileRead {
        path: file_path.clone(),
        source,
    })?;
    let payload = BASE64.encode(&bytes);
    if with_name {
        let name = Path::new(file_path)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| invalid(path, format!("{file_path:?} has no file name")))?;
        Ok(format!("{name}$${payload}"))
    } else {
        Ok(payload)
    }
}

fn encode_list(
    item: &ParameterSpec,
    path: &str,
    value: &Value,
    out: &mut BTreeMap<String, String>,
) -> Result<(), EncodeError> {
    let items: Vec<Value> = match value {
        Value::List(items) => items.clone(),
        Value::Str(s) => split_escaped(s).into_iter().map(Value::Str).collect(),
        other => {
            return Err(invalid(
                path,
                format!("expected list, got {}", other.kind_name()),
            ));
        }
    };
    for (index, item_value) in items.iter().enumerate() {
        let child = format!("{path}.{}", index + 1);
        encode_parameter(item, &child, item_value, out)?;
    }
    Ok(())
}

fn encode_mapping(
    key_spec: &ParameterSpec,
    value_spec: &ParameterSpec,
    path: &str,
    value: &Value,
    out: &mut BTreeMap<String, String>,
) -> Result<(), EncodeError> {
    let pairs: Vec<(Value, Value)> = match value {
        Value::Map(pairs) => pairs.clone(),
        Value::Str(s) => {
            let mut parsed = Vec::new();
            for entry in split_escaped(s) {
                let Some((k, v)) = entry.split_once('=') else {
                    return Err(invalid(
                        path,
                        format!("{entry:?} is not a key=value pair"),
                    ));
                };
                parsed.push((Value::Str(k.to_string()), Value::Str(v.to_string())));
            }
            parsed
        }
        other => {
            return Err(invalid(
                path,
                format!("expected mapping, got {}", other.kind_name()),
            ));
        }
    };
    for (key, entry_value) in &pairs {
        let encoded_key = encode_scalar(key_spec, path, key)?;
        let child = format!("{path}.{encoded_key}");
        encode_parameter(value_spec, &child, entry_value, out)?;
    }
    Ok(())
}

fn encode_structure(
    fields: &[ParameterSpec],
    path: &str,
    value: &Value,
    out: &mut BTreeMap<String, String>,
) -> Result<(), EncodeError> {
    let Value::Struct(supplied) = value else {
        return Err(invalid(
            path,
            format!("expected structure, got {}", value.kind_name()),
        ));
    };
    let mut supplied = supplied.clone();
    for field in fields {
        let child = format!("{path}.{}", field.name);
        match supplied.remove(&field.name) {
            Some(field_value) => {
                if field.optional
                    && field
                        .default
                        .as_ref()
                        .is_some_and(|default| matches_default(&field_value, default))
                {
                    continue;
                }
                encode_parameter(field, &child, &field_value, out)?;
            }
            None if field.optional => {}
            None => return Err(invalid(&child, "required field is missing")),
        }
    }
    if !supplied.is_empty() {
        let names: Vec<String> = supplied.keys().map(|k| format!("{path}.{k}")).collect();
        return Err(invalid(
            path,
            format!("unknown fields: {}", names.join(", ")),
        ));
    }
    Ok(())
}

fn invalid(path: &str, reason: impl Into<String>) -> EncodeError {
    EncodeError::InvalidParameter {
        name: path.to_string(),
        reason: reason.into(),
    }
}

// ---------------------------------------------------------------------------
// Comma-escaped string form
// ---------------------------------------------------------------------------

/// Split a comma-separated value, honouring backslash escapes.
///
/// `\,` yields a literal comma and `\\` a literal backslash. Any other
/// escape sequence, and a trailing lone backslash, is preserved as typed.
pub fn split_escaped(input: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut chars = input.chars();
    while let Some(ch) = chars.next() {
        match ch {
            '\\' => match chars.next() {
                Some(',') => current.push(','),
                Some('\\') => current.push('\\'),
                Some(other) => {
                    current.push('\\');
                    current.push(other);
                }
                None => current.push('\\'),
            },
            ',' => parts.push(std::mem::take(&mut current)),
            _ => current.push(ch),
        }
    }
    parts.push(current);
    parts
}

/// Inverse of [`split_escaped`]: escape backslashes, then commas, and join
/// with commas. `split_escaped(&join_escaped(parts))` reconstructs `parts`
/// exactly, whatever they contain.
pub fn join_escaped<S: AsRef<str>>(parts: &[S]) -> String {
    parts
        .iter()
        .map(|part| part.as_ref().replace('\\', "\\\\").replace(',', "\\,"))
        .collect::<Vec<_>>()
        .join(",")
}
