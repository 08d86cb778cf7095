//! Engine and server configuration.
//!
//! `EngineConfig` is an immutable value handed to every component at construction;
//! nothing in the engine reads global state. `ServerConfig` collects the transport
//! and collaborator settings from the environment, with CLI flags layered on top
//! by the binaries.

use std::env;
use std::path::PathBuf;

/// Separator placed between a source name and a bare column name.
pub const NAMESPACE_CONNECTOR: &str = "__";
/// Prefix for generated derived column names (`dc1`, `dc2`, ...).
pub const DERIVED_COLUMN_PREFIX: &str = "dc";

/// Source layouts probed, in order, when inferring how a date column is written.
pub const KNOWN_DATE_LAYOUTS: &[&str] = &[
    "%Y-%m-%d",
    "%d/%m/%Y",
    "%m/%d/%Y",
    "%Y/%m/%d",
    "%d-%m-%Y",
    "%y/%m/%d",
    "%d-%b-%Y",
    "%Y.%m.%d",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%d/%m/%Y %H:%M:%S",
];

/// User-facing date tokens and the chrono strftime codes they translate to.
pub const DATE_TOKENS: &[(&str, &str)] = &[
    ("yyyy", "%Y"),
    ("yy", "%y"),
    ("mm", "%m"),
    ("dd", "%d"),
    ("hh", "%H"),
    ("mi", "%M"),
    ("ss", "%S"),
    ("mon", "%b"),
    ("month", "%B"),
    ("am/pm", "%p"),
];

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub connector: String,
    pub derived_prefix: String,
    pub known_layouts: Vec<String>,
    /// Token vocabulary sorted longest-token-first.
    pub date_tokens: Vec<(String, String)>,
    /// Run per-source load/derive/filter on scoped threads.
    pub parallel_sources: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let mut date_tokens: Vec<(String, String)> = DATE_TOKENS
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        // Stable sort keeps declaration order among equal lengths
        date_tokens.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
        Self {
            connector: NAMESPACE_CONNECTOR.to_string(),
            derived_prefix: DERIVED_COLUMN_PREFIX.to_string(),
            known_layouts: KNOWN_DATE_LAYOUTS.iter().map(|s| s.to_string()).collect(),
            date_tokens,
            parallel_sources: true,
        }
    }
}

impl EngineConfig {
    pub fn sequential() -> Self {
        Self { parallel_sources: false, ..Self::default() }
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub http_port: u16,
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub output_file: String,
    /// When true each request writes to its own `<stem>-<uuid>.<ext>` destination.
    pub unique_output: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_port: 8000,
            input_dir: PathBuf::from("data/input"),
            output_dir: PathBuf::from("data/output"),
            output_file: "processed_output.csv".to_string(),
            unique_output: false,
        }
    }
}

fn parse_bool_env(name: &str) -> Option<bool> {
    match env::var(name) {
        Ok(v) => match v.to_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Some(true),
            "0" | "false" | "no" | "off" => Some(false),
            _ => None,
        },
        Err(_) => None,
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            http_port: env::var("TABWEAVE_HTTP_PORT").ok().and_then(|v| v.parse::<u16>().ok()).unwrap_or(d.http_port),
            input_dir: env::var("TABWEAVE_INPUT_DIR").map(PathBuf::from).unwrap_or(d.input_dir),
            output_dir: env::var("TABWEAVE_OUTPUT_DIR").map(PathBuf::from).unwrap_or(d.output_dir),
            output_file: env::var("TABWEAVE_OUTPUT_FILE").unwrap_or(d.output_file),
            unique_output: parse_bool_env("TABWEAVE_UNIQUE_OUTPUT").unwrap_or(d.unique_output),
        }
    }

    pub fn output_path(&self) -> PathBuf {
        self.output_dir.join(&self.output_file)
    }
}
