//! Action schema: parameter descriptions, the per-version action table, and
//! the process-wide registry loaded from the embedded catalog.
//!
//! The catalog is a JSON array of action entries, each carrying the wire
//! name, the API version that introduced that shape, a doc line, the ordered
//! parameter list, and the error codes the action can return. The registry
//! indexes entries by name and version, builds `snake_case` aliases for
//! every wire name, and feeds every declared error code into the
//! [`ErrorRegistry`](crate::ErrorRegistry).
//!
//! Load-time validation rejects catalogs that could not be encoded
//! faithfully: required parameters with defaults, empty enums, non-scalar
//! mapping keys, unnamed structure fields.

use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::{Arc, LazyLock};

use serde::Deserialize;
use thiserror::Error;

use crate::error::ErrorRegistry;

const BUILTIN_CATALOG: &str = include_str!("../schema/actions.json");

static BUILTIN: LazyLock<Arc<Registry>> = LazyLock::new(|| {
    Arc::new(Registry::from_json(BUILTIN_CATALOG).expect("embedded action catalog is valid"))
});

/// Errors raised while loading a catalog.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("catalog is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("duplicate catalog entry for {name} version {version}")]
    DuplicateAction { name: String, version: String },
    #[error("invalid parameter {name:?} in {action}: {reason}")]
    InvalidSpec {
        action: String,
        name: String,
        reason: &'static str,
    },
}

/// The closed set of wire parameter types.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ParameterKind {
    Integer,
    Float,
    /// Octet string passed through untouched.
    RawString,
    Enum { values: Vec<String> },
    Unicode,
    /// Free text without embedded newlines.
    UnicodeLine,
    /// Display title, also newline-free.
    UnicodeTitle,
    /// Local file sent as `<basename>$$<base64>`.
    File,
    /// Local file sent as bare base64.
    Data,
    Boolean,
    Date,
    List { item: Box<ParameterSpec> },
    Mapping {
        key: Box<ParameterSpec>,
        value: Box<ParameterSpec>,
    },
    Structure { fields: Vec<ParameterSpec> },
}

impl ParameterKind {
    /// Wire-format type name, as written in the catalog.
    pub fn label(&self) -> &'static str {
        match self {
            ParameterKind::Integer => "integer",
            ParameterKind::Float => "float",
            ParameterKind::RawString => "raw_string",
            ParameterKind::Enum { .. } => "enum",
            ParameterKind::Unicode => "unicode",
            ParameterKind::UnicodeLine => "unicode_line",
            ParameterKind::UnicodeTitle => "unicode_title",
            ParameterKind::File => "file",
            ParameterKind::Data => "data",
            ParameterKind::Boolean => "boolean",
            ParameterKind::Date => "date",
            ParameterKind::List { .. } => "list",
            ParameterKind::Mapping { .. } => "mapping",
            ParameterKind::Structure { .. } => "structure",
        }
    }

    /// Whether the kind encodes to a single wire string. Mapping keys must
    /// be scalar.
    fn is_scalar(&self) -> bool {
        !matches!(
            self,
            ParameterKind::List { .. }
                | ParameterKind::Mapping { .. }
                | ParameterKind::Structure { .. }
        )
    }
}

/// One declared parameter (or nested item/key/value/field spec).
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ParameterSpec {
    /// Empty for anonymous nested specs (list items, mapping keys/values).
    #[serde(default)]
    pub name: String,
    #[serde(flatten)]
    pub kind: ParameterKind,
    #[serde(default)]
    pub optional: bool,
    /// Declared default, used for suppression. Only optional parameters may
    /// carry one.
    #[serde(default)]
    pub default: Option<serde_json::Value>,
    #[serde(default)]
    pub doc: String,
}

/// One action at one API version.
#[derive(Debug, Clone, Deserialize)]
pub struct ActionSchema {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub doc: String,
    #[serde(default)]
    pub parameters: Vec<ParameterSpec>,
    /// Error codes this action is declared to return.
    #[serde(default)]
    pub errors: Vec<String>,
    /// The 2xx body is literal text, not JSON.
    #[serde(default)]
    pub raw_output: bool,
}

/// The loaded catalog: action table, name aliases, and error taxonomy.
#[derive(Debug)]
pub struct Registry {
    /// Wire name → version → schema.
    actions: BTreeMap<String, BTreeMap<String, ActionSchema>>,
    /// `snake_case` alias → wire name.
    aliases: BTreeMap<String, String>,
    errors: ErrorRegistry,
}

impl Registry {
    /// The embedded catalog, parsed once per process and shared.
    pub fn builtin() -> Arc<Registry> {
        Arc::clone(&BUILTIN)
    }

    /// Load a catalog from its JSON source.
    pub fn from_json(src: &str) -> Result<Self, SchemaError> {
        let entries: Vec<ActionSchema> = serde_json::from_str(src)?;
        let mut registry = Registry {
            actions: BTreeMap::new(),
            aliases: BTreeMap::new(),
            errors: ErrorRegistry::new(),
        };
        for entry in entries {
            for spec in &entry.parameters {
                check_spec(&entry.name, spec)?;
            }
            for code in &entry.errors {
                registry.errors.register(code);
            }
            registry
                .aliases
                .insert(snake_case(&entry.name), entry.name.clone());
            let versions = registry.actions.entry(entry.name.clone()).or_default();
            if versions.contains_key(&entry.version) {
                return Err(SchemaError::DuplicateAction {
                    name: entry.name,
                    version: entry.version,
                });
            }
            versions.insert(entry.version.clone(), entry);
        }
        Ok(registry)
    }

    /// Resolve an action at the latest declared version that is not newer
    /// than `version`. Versions are ISO date strings, so lexicographic order
    /// is chronological order.
    ///
    /// `name` may be the wire name (`GetComputers`) or its `snake_case`
    /// alias (`get_computers`).
    pub fn action(&self, name: &str, version: &str) -> Option<&ActionSchema> {
        let wire = self.resolve_name(name)?;
        let versions = self.actions.get(wire)?;
        versions
            .range::<str, _>((Bound::Unbounded, Bound::Included(version)))
            .next_back()
            .map(|(_, schema)| schema)
    }

    /// Canonical wire name for either name form.
    pub fn resolve_name(&self, name: &str) -> Option<&str> {
        if let Some((wire, _)) = self.actions.get_key_value(name) {
            return Some(wire);
        }
        self.aliases.get(name).map(String::as_str)
    }

    /// Every action as resolved at `version`, in name order. Actions whose
    /// earliest declared version is newer than `version` are skipped.
    pub fn actions_at<'a>(&'a self, version: &'a str) -> impl Iterator<Item = &'a ActionSchema> {
        self.actions.values().filter_map(move |versions| {
            versions
                .range::<str, _>((Bound::Unbounded, Bound::Included(version)))
                .next_back()
                .map(|(_, schema)| schema)
        })
    }

    /// The error taxonomy built from the catalog's declared codes.
    pub fn errors(&self) -> &ErrorRegistry {
        &self.errors
    }
}

/// Convert a wire action name to its `snake_case` alias. Runs of capitals
/// stay together: `ImportGPGKey` becomes `import_gpg_key`.
fn snake_case(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let mut out = String::with_capacity(name.len() + 4);
    for (i, &c) in chars.iter().enumerate() {
        if c.is_ascii_uppercase() {
            let prev_is_lower = i > 0 && chars[i - 1].is_ascii_lowercase();
            let next_is_lower = i + 1 < chars.len() && chars[i + 1].is_ascii_lowercase();
            if i > 0 && (prev_is_lower || next_is_lower) {
                out.push('_');
            }
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

fn check_spec(action: &str, spec: &ParameterSpec) -> Result<(), SchemaError> {
    let fail = |reason: &'static str| SchemaError::InvalidSpec {
        action: action.to_string(),
        name: spec.name.clone(),
        reason,
    };
    if !spec.optional && spec.default.is_some() {
        return Err(fail("required parameter declares a default"));
    }
    match &spec.kind {
        ParameterKind::Enum { values } if values.is_empty() => {
            Err(fail("enum declares no values"))
        }
        ParameterKind::List { item } => check_spec(action, item),
        ParameterKind::Mapping { key, value } => {
            if !key.kind.is_scalar() {
                return Err(fail("mapping key must be a scalar type"));
            }
            check_spec(action, key)?;
            check_spec(action, value)
        }
        ParameterKind::Structure { fields } => {
            let mut seen = BTreeMap::new();
            for field in fields {
                if field.name.is_empty() {
                    return Err(fail("structure field without a name"));
                }
                if seen.insert(&field.name, ()).is_some() {
                    return Err(fail("structure declares a field twice"));
                }
                check_spec(action, field)?;
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_catalog_loads_and_indexes() {
        let registry = Registry::builtin();
        let schema = registry.action("GetComputers", "2011-08-01").unwrap();
        assert_eq!(schema.name, "GetComputers");
        assert!(schema.parameters.iter().any(|p| p.name == "query"));
        assert!(registry.errors().lookup("UnknownComputer").is_some());
    }

    #[test]
    fn snake_case_aliases_resolve() {
        let registry = Registry::builtin();
        assert_eq!(registry.resolve_name("get_computers"), Some("GetComputers"));
        assert_eq!(registry.resolve_name("import_gpg_key"), Some("ImportGPGKey"));
        assert_eq!(registry.resolve_name("GetComputers"), Some("GetComputers"));
        assert_eq!(registry.resolve_name("NoSuchAction"), None);
    }

    #[test]
    fn snake_case_keeps_capital_runs_together() {
        assert_eq!(snake_case("GetComputers"), "get_computers");
        assert_eq!(snake_case("ImportGPGKey"), "import_gpg_key");
        assert_eq!(snake_case("GetAPTSources"), "get_apt_sources");
        assert_eq!(snake_case("CreateAccessGroup"), "create_access_group");
    }

    #[test]
    fn versions_resolve_to_the_latest_not_newer_than_the_pin() {
        let registry = Registry::builtin();

        let old = registry.action("GetComputers", "2011-08-01").unwrap();
        assert!(!old.parameters.iter().any(|p| p.name == "with_annotations"));

        let newer = registry.action("GetComputers", "2013-11-04").unwrap();
        assert!(newer.parameters.iter().any(|p| p.name == "with_annotations"));

        // A pin after every declared version picks the newest.
        let pinned_ahead = registry.action("GetComputers", "2030-01-01").unwrap();
        assert_eq!(pinned_ahead.version, "2013-11-04");

        // A pin before the first declared version finds nothing.
        assert!(registry.action("GetComputers", "2010-01-01").is_none());
    }

    #[test]
    fn raw_output_actions_are_flagged() {
        let registry = Registry::builtin();
        assert!(registry.action("GetScriptCode", "2011-08-01").unwrap().raw_output);
        assert!(!registry.action("GetComputers", "2011-08-01").unwrap().raw_output);
    }

    #[test]
    fn catalog_error_codes_share_one_class() {
        // UnknownComputer is declared by several actions; the registry holds
        // a single interned class for it.
        let registry = Registry::builtin();
        let a = registry.errors().lookup("UnknownComputer").unwrap();
        let b = registry.errors().lookup("UnknownComputerError").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn required_parameters_cannot_declare_defaults() {
        let src = r#"[{
            "name": "X", "version": "2011-08-01",
            "parameters": [{"name": "a", "type": "integer", "default": 5}]
        }]"#;
        assert!(matches!(
            Registry::from_json(src),
            Err(SchemaError::InvalidSpec { .. })
        ));
    }

    #[test]
    fn empty_enums_are_rejected() {
        let src = r#"[{
            "name": "X", "version": "2011-08-01",
            "parameters": [{"name": "mode", "type": "enum", "values": []}]
        }]"#;
        assert!(matches!(
            Registry::from_json(src),
            Err(SchemaError::InvalidSpec { .. })
        ));
    }

    #[test]
    fn mapping_keys_must_be_scalar() {
        let src = r#"[{
            "name": "X", "version": "2011-08-01",
            "parameters": [{
                "name": "m", "type": "mapping",
                "key": {"type": "list", "item": {"type": "integer"}},
                "value": {"type": "unicode"}
            }]
        }]"#;
        assert!(matches!(
            Registry::from_json(src),
            Err(SchemaError::InvalidSpec { .. })
        ));
    }

    #[test]
    fn duplicate_entries_are_rejected() {
        let src = r#"[
            {"name": "X", "version": "2011-08-01"},
            {"name": "X", "version": "2011-08-01"}
        ]"#;
        assert!(matches!(
            Registry::from_json(src),
            Err(SchemaError::DuplicateAction { .. })
        ));
    }

    #[test]
    fn unknown_types_fail_to_parse() {
        let src = r#"[{
            "name": "X", "version": "2011-08-01",
            "parameters": [{"name": "a", "type": "quaternion"}]
        }]"#;
        assert!(matches!(Registry::from_json(src), Err(SchemaError::Parse(_))));
    }
}
