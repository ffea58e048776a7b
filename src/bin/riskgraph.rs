//! riskgraph command-line driver
//!
//! Reads newline-delimited JSON resolver requests
//! (`{"field": "createReference", "args": {...}}`) from stdin or a file,
//! runs them against an in-memory store and prints one JSON response per
//! line. Blank lines and lines starting with `#` are skipped.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use tracing::{error, info, info_span};

use riskgraph::resolver::ResolverError;
use riskgraph::{
    telemetry, EntityService, GraphError, InMemoryTripleStore, Resolver, ResolverRequest,
    ResolverResponse, RiskgraphConfig, SchemaRegistry,
};

/// Command-line options
#[derive(Default)]
struct Options {
    /// TOML configuration file
    config: Option<PathBuf>,
    /// Request file; stdin when absent
    input: Option<PathBuf>,
}

fn print_help() {
    println!("riskgraph - object-graph persistence driver");
    println!();
    println!("USAGE:");
    println!("    riskgraph [OPTIONS] < requests.ndjson");
    println!();
    println!("OPTIONS:");
    println!("    -c, --config <FILE>       TOML configuration file");
    println!("    -i, --input <FILE>        Read requests from FILE instead of stdin");
    println!("    -h, --help                Print help information");
    println!();
    println!("ENVIRONMENT:");
    println!("    RISKGRAPH_DB_NAME, RISKGRAPH_PAGINATION_POLICY,");
    println!("    RISKGRAPH_LOG_LEVEL, RISKGRAPH_LOG_JSON, RUST_LOG");
}

/// `Ok(None)` means help was printed.
fn parse_args(args: &[String]) -> Result<Option<Options>, String> {
    let mut options = Options::default();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" | "-c" => {
                let value = args.get(i + 1).ok_or("--config requires a value")?;
                options.config = Some(PathBuf::from(value));
                i += 2;
            }
            "--input" | "-i" => {
                let value = args.get(i + 1).ok_or("--input requires a value")?;
                options.input = Some(PathBuf::from(value));
                i += 2;
            }
            "--help" | "-h" => {
                print_help();
                return Ok(None);
            }
            arg => return Err(format!("unknown argument: {arg}")),
        }
    }

    Ok(Some(options))
}

fn load_config(options: &Options) -> Result<RiskgraphConfig, GraphError> {
    let mut config = match &options.config {
        Some(path) => RiskgraphConfig::from_file(path)?,
        None => RiskgraphConfig::default(),
    };
    config.apply_env()?;
    Ok(config)
}

fn respond(resolver: &Resolver, line: &str) -> ResolverResponse {
    match ResolverRequest::from_json(line) {
        Ok(request) => resolver.execute(&request),
        Err(e) => ResolverResponse {
            data: BTreeMap::new(),
            errors: vec![ResolverError::from(&GraphError::from(e))],
        },
    }
}

fn run(options: &Options, config: &RiskgraphConfig) -> io::Result<usize> {
    let registry = SchemaRegistry::builtin()
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))?;
    let service = EntityService::new(
        Arc::new(registry),
        Arc::new(InMemoryTripleStore::new()),
        config,
    )
    .with_span(info_span!("riskgraph", db = %config.store.db_name));
    let resolver = Resolver::new(service);

    let reader: Box<dyn BufRead> = match &options.input {
        Some(path) => Box::new(BufReader::new(File::open(path)?)),
        None => Box::new(io::stdin().lock()),
    };
    let stdout = io::stdout();
    let mut out = stdout.lock();

    let mut handled = 0;
    for line in reader.lines() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let response = respond(&resolver, line);
        serde_json::to_writer(&mut out, &response)?;
        writeln!(out)?;
        handled += 1;
    }
    out.flush()?;
    Ok(handled)
}

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();
    let options = match parse_args(&args) {
        Ok(Some(options)) => options,
        Ok(None) => return ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("error: {message}");
            return ExitCode::FAILURE;
        }
    };

    let config = match load_config(&options) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::FAILURE;
        }
    };
    telemetry::init(&config.logging);

    match run(&options, &config) {
        Ok(handled) => {
            info!(requests = handled, "done");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "request stream failed");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
