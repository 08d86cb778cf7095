use std::env;
use std::path::PathBuf;

use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use tabweave::config::ServerConfig;

fn arg_value(args: &[String], flag: &str) -> Option<String> {
    let mut i = 0;
    while i < args.len() {
        if args[i] == flag && i + 1 < args.len() {
            return Some(args[i + 1].clone());
        }
        i += 1;
    }
    None
}

fn has_flag(args: &[String], flag: &str) -> bool {
    args.iter().any(|a| a == flag)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = env::args().collect();
    if has_flag(&args, "--help") || has_flag(&args, "-h") {
        println!("tabweave server\n\nUSAGE:\n  tabweave [--port N] [--input DIR] [--output FILE]\n\nOPTIONS:\n  --port N        HTTP port (env: TABWEAVE_HTTP_PORT, default 8000)\n  --input DIR     Folder holding input tables (env: TABWEAVE_INPUT_DIR, default data/input)\n  --output FILE   Output file; .parquet writes Parquet, anything else CSV\n                  (env: TABWEAVE_OUTPUT_DIR + TABWEAVE_OUTPUT_FILE, default data/output/processed_output.csv)\n");
        return Ok(());
    }

    // Init logging
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))?;
    fmt().with_env_filter(filter).init();

    // CLI arguments override environment
    let mut config = ServerConfig::from_env();
    if let Some(port) = arg_value(&args, "--port").and_then(|p| p.parse::<u16>().ok()) {
        config.http_port = port;
    }
    if let Some(dir) = arg_value(&args, "--input") {
        config.input_dir = PathBuf::from(dir);
    }
    if let Some(out) = arg_value(&args, "--output") {
        let out = PathBuf::from(out);
        if let Some(name) = out.file_name() {
            config.output_file = name.to_string_lossy().to_string();
        }
        config.output_dir = out.parent().map(PathBuf::from).unwrap_or_default();
    }

    let rust_log = env::var("RUST_LOG").unwrap_or_else(|_| "<unset>".to_string());
    info!(
        target: "tabweave",
        "tabweave starting: RUST_LOG='{}', http_port={}, input='{}', output='{}'",
        rust_log, config.http_port, config.input_dir.display(), config.output_path().display()
    );

    tabweave::server::run_with_config(config).await
}
