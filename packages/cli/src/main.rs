//! `pdk`, the command-line client for the Paddock fleet management API.
//!
//! Provides three subcommands:
//!
//! - **`actions`**: list the actions available at the pinned API version.
//! - **`describe`**: show one action's parameters and declared errors.
//! - **`call`**: invoke an action and print the response.
//!
//! `actions` and `describe` answer from the embedded catalog and work
//! offline. `call` needs the endpoint and credentials, normally supplied
//! through the environment:
//!
//! ```sh
//! export PADDOCK_API_URI=https://fleet.example.com/api/
//! export PADDOCK_API_KEY=my-access-key
//! export PADDOCK_API_SECRET=my-secret
//! pdk call GetComputers query=tag:web limit=5
//! ```

use std::io;
use std::path::PathBuf;
use std::process;

use clap::{Args, Parser, Subcommand};
use paddock::{
    Arguments, Client, ClientConfig, Error, OutputMode, ParameterKind, ParameterSpec, Registry,
    DEFAULT_API_VERSION,
};

/// Paddock fleet management CLI
///
/// Signs and dispatches management actions against a fleet endpoint.
#[derive(Parser)]
#[command(name = "pdk", version, about, long_about = None)]
struct Cli {
    #[command(flatten)]
    connection: Connection,

    #[command(subcommand)]
    command: Command,
}

/// Endpoint and credential settings, shared by every subcommand.
#[derive(Args)]
struct Connection {
    /// Root URI of the management API, e.g. https://fleet.example.com/api/.
    #[arg(long, env = "PADDOCK_API_URI", global = true, value_name = "URI")]
    uri: Option<String>,

    /// Access key id.
    #[arg(long, env = "PADDOCK_API_KEY", global = true, value_name = "KEY")]
    access_key: Option<String>,

    /// Secret key matching the access key.
    #[arg(
        long,
        env = "PADDOCK_API_SECRET",
        global = true,
        value_name = "KEY",
        hide_env_values = true
    )]
    secret_key: Option<String>,

    /// PEM bundle with an extra CA certificate to trust.
    #[arg(long, env = "PADDOCK_API_SSL_CA_FILE", global = true, value_name = "FILE")]
    ssl_ca_file: Option<PathBuf>,

    /// API version action shapes are pinned to.
    #[arg(
        long,
        env = "PADDOCK_API_VERSION",
        global = true,
        value_name = "DATE",
        default_value = DEFAULT_API_VERSION
    )]
    api_version: String,
}

#[derive(Subcommand)]
enum Command {
    /// List the actions available at the pinned API version.
    ///
    /// Prints one action per line with its summary. Works offline from the
    /// embedded catalog; no credentials needed.
    Actions {
        /// Only list actions whose name contains this text.
        #[arg(long, value_name = "TEXT")]
        contains: Option<String>,
    },

    /// Show an action's parameters and declared error codes.
    ///
    /// ACTION may be the wire name (GetComputers) or its snake_case alias
    /// (get_computers).
    Describe {
        /// Action name.
        action: String,
    },

    /// Invoke an action and print the response.
    ///
    /// Arguments are NAME=VALUE pairs, validated against the action's
    /// declared parameters before anything is sent. List and mapping
    /// parameters take the comma form (tags=a,b or computer_titles=1=web);
    /// a comma inside one item is escaped as \, . File-backed parameters
    /// take a local path.
    ///
    /// Examples:
    ///   pdk call GetComputers query=tag:web limit=5
    ///   pdk call AddTagsToComputers query=tag:web tags=prod,web
    ///   pdk call ImportGPGKey name=mirror material=./key.asc
    Call {
        /// Action name.
        action: String,

        /// Arguments as NAME=VALUE.
        #[arg(value_name = "NAME=VALUE")]
        args: Vec<String>,

        /// Print the response body exactly as received, without decoding.
        #[arg(long)]
        raw: bool,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pdk=warn".into()),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Actions { contains } => {
            list_actions(&cli.connection.api_version, contains.as_deref());
        }
        Command::Describe { action } => {
            describe_action(&cli.connection.api_version, &action);
        }
        Command::Call { action, args, raw } => {
            run_call(&cli.connection, &action, &args, raw);
        }
    }
}

fn list_actions(version: &str, contains: Option<&str>) {
    let registry = Registry::builtin();
    let needle = contains.map(str::to_lowercase);
    for schema in registry.actions_at(version) {
        if let Some(needle) = &needle {
            if !schema.name.to_lowercase().contains(needle) {
                continue;
            }
        }
        if schema.doc.is_empty() {
            println!("{}", schema.name);
        } else {
            println!("{:<28} {}", schema.name, schema.doc);
        }
    }
}

fn describe_action(version: &str, name: &str) {
    let registry = Registry::builtin();
    let Some(schema) = registry.action(name, version) else {
        fatal(&format!("unknown action {name:?} at API version {version}"));
    };

    println!("{} ({})", schema.name, schema.version);
    if !schema.doc.is_empty() {
        println!("{}", schema.doc);
    }
    if !schema.parameters.is_empty() {
        println!();
        println!("Parameters:");
        for spec in &schema.parameters {
            print_parameter(spec, 2);
        }
    }
    if !schema.errors.is_empty() {
        println!();
        println!("Errors: {}", schema.errors.join(", "));
    }
    if schema.raw_output {
        println!();
        println!("Returns plain text rather than JSON.");
    }
}

fn print_parameter(spec: &ParameterSpec, indent: usize) {
    let pad = " ".repeat(indent);
    let mut attrs = vec![kind_summary(&spec.kind)];
    if spec.optional {
        attrs.push("optional".to_string());
    }
    if let Some(default) = &spec.default {
        attrs.push(format!("default {default}"));
    }
    if spec.doc.is_empty() {
        println!("{pad}{} ({})", spec.name, attrs.join(", "));
    } else {
        println!("{pad}{} ({}): {}", spec.name, attrs.join(", "), spec.doc);
    }

    // Structure fields are listed indented under their parent, whether the
    // structure appears directly or as a list item.
    match &spec.kind {
        ParameterKind::Structure { fields } => {
            for field in fields {
                print_parameter(field, indent + 2);
            }
        }
        ParameterKind::List { item } => {
            if let ParameterKind::Structure { fields } = &item.kind {
                for field in fields {
                    print_parameter(field, indent + 2);
                }
            }
        }
        _ => {}
    }
}

fn kind_summary(kind: &ParameterKind) -> String {
    match kind {
        ParameterKind::List { item } => format!("list of {}", kind_summary(&item.kind)),
        ParameterKind::Mapping { key, value } => format!(
            "mapping of {} to {}",
            kind_summary(&key.kind),
            kind_summary(&value.kind)
        ),
        ParameterKind::Enum { values } => format!("one of {}", values.join("|")),
        other => other.label().to_string(),
    }
}

fn run_call(connection: &Connection, action: &str, raw_args: &[String], raw: bool) {
    let mut args = Arguments::new();
    for raw_arg in raw_args {
        let Some((name, value)) = raw_arg.split_once('=') else {
            fatal(&format!("invalid argument {raw_arg:?}: expected NAME=VALUE"));
        };
        args.set(name, value);
    }

    let client = connect(connection, raw);
    tracing::debug!(action, "dispatching");
    match client.call(action, args) {
        Ok(serde_json::Value::String(text)) => print!("{text}"),
        Ok(value) => println!("{}", serde_json::to_string_pretty(&value).unwrap()),
        Err(err) => {
            eprintln!("pdk: {err}");
            if let Error::Multi(multi) = &err {
                for leaf in &multi.errors {
                    eprintln!("pdk:   {leaf}");
                }
            }
            // Server-side and network failures exit 1; anything the caller
            // can fix locally exits 2.
            let code = match &err {
                Error::Api(_) | Error::Multi(_) | Error::Http { .. } | Error::Transport(_) => 1,
                _ => 2,
            };
            process::exit(code);
        }
    }
}

/// Build a client from the connection settings, or explain what is missing.
fn connect(connection: &Connection, raw: bool) -> Client {
    let uri = connection
        .uri
        .as_deref()
        .unwrap_or_else(|| fatal("no endpoint; pass --uri or set PADDOCK_API_URI"));
    let access_key = connection
        .access_key
        .as_deref()
        .unwrap_or_else(|| fatal("no access key; pass --access-key or set PADDOCK_API_KEY"));
    let secret_key = connection
        .secret_key
        .as_deref()
        .unwrap_or_else(|| fatal("no secret key; pass --secret-key or set PADDOCK_API_SECRET"));

    let mut config = ClientConfig::new(uri, access_key, secret_key)
        .unwrap_or_else(|e| fatal(&e.to_string()));
    config.ssl_ca_file = connection.ssl_ca_file.clone();
    config.api_version = connection.api_version.clone();
    if raw {
        config.output = OutputMode::Raw;
    }
    Client::new(&config).unwrap_or_else(|e| fatal(&e.to_string()))
}

/// Print an error message to stderr and exit with code 2.
fn fatal(msg: &str) -> ! {
    eprintln!("pdk: {}", msg);
    process::exit(2);
}
