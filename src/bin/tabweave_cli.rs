//!
//! tabweave CLI binary
//! -------------------
//! Runs one request plan either locally against an input folder or remotely
//! against a running tabweave HTTP server, printing the JSON outcome.

use std::env;
use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use reqwest::Url;

use tabweave::config::{EngineConfig, ServerConfig};
use tabweave::server::exec::Pipeline;
use tabweave::server::plan::RequestPlan;
use tabweave::storage::FileStore;

fn print_usage(program: &str) {
    eprintln!(
        "Usage:\n  {program} <plan.json> [--input <dir>] [--output <file>] [--sequential]\n  {program} <plan.json> --server <url>\n  {program} -                       # reads the plan from stdin\n\nFlags:\n  --input <dir>     Folder holding input tables (default: TABWEAVE_INPUT_DIR or data/input)\n  --output <file>   Output file; .parquet writes Parquet, anything else CSV\n  --sequential      Prepare sources one after another instead of in parallel\n  --server <url>    POST the plan to <url>/process instead of running it locally\n  -h, --help        Show this help\n\nExamples:\n  {program} plan.json --input data/input --output out/result.csv\n  {program} plan.json --server http://127.0.0.1:8000"
    );
}

fn arg_value(args: &[String], flag: &str) -> Option<String> {
    args.iter().position(|a| a == flag).and_then(|i| args.get(i + 1)).cloned()
}

fn read_plan_text(path: &str) -> Result<String> {
    if path == "-" {
        let mut buf = String::new();
        io::stdin().read_to_string(&mut buf)?;
        return Ok(buf);
    }
    fs::read_to_string(path).with_context(|| format!("failed to read plan file '{}'", path))
}

/// `<base>/process`, keeping any path prefix on `base`.
fn process_url(base: &str) -> Result<Url> {
    let mut base = Url::parse(base).context("invalid server URL")?;
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    Ok(base.join("process")?)
}

async fn run_remote(base: &str, body: serde_json::Value) -> Result<serde_json::Value> {
    let url = process_url(base)?;
    let resp = reqwest::Client::new().post(url).json(&body).send().await?;
    let status = resp.status();
    let v: serde_json::Value = resp.json().await.unwrap_or(serde_json::json!({"status":"error","message":"non-JSON response"}));
    if !status.is_success() {
        return Err(anyhow!("HTTP {}: {}", status, v));
    }
    Ok(v)
}

fn run_local(args: &[String], plan: RequestPlan) -> Result<serde_json::Value> {
    let defaults = ServerConfig::from_env();
    let input: PathBuf = arg_value(args, "--input").map(PathBuf::from).unwrap_or(defaults.input_dir.clone());
    let output: PathBuf = arg_value(args, "--output").map(PathBuf::from).unwrap_or_else(|| defaults.output_path());
    let engine = if args.iter().any(|a| a == "--sequential") { EngineConfig::sequential() } else { EngineConfig::default() };
    let store = Arc::new(FileStore::new(input, output));
    let pipeline = Pipeline::new(engine, store.clone(), store);
    let out = pipeline.run(&plan)?;
    Ok(serde_json::json!({ "status": "ok", "message": out.destination, "rows": out.rows, "columns": out.columns }))
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .try_init();

    let args: Vec<String> = env::args().collect();
    let program = args.first().cloned().unwrap_or_else(|| "tabweave_cli".to_string());
    if args.len() < 2 || args.iter().any(|a| a == "-h" || a == "--help") {
        print_usage(&program);
        return Ok(());
    }

    let text = read_plan_text(&args[1])?;
    let body: serde_json::Value = serde_json::from_str(&text).context("plan is not valid JSON")?;

    let result = match arg_value(&args, "--server") {
        Some(base) => run_remote(&base, body).await?,
        None => {
            let plan: RequestPlan = serde_json::from_value(body).context("plan does not match the request model")?;
            let rest = args.clone();
            tokio::task::spawn_blocking(move || run_local(&rest, plan)).await??
        }
    };
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}
