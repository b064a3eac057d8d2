//! `slotplan`: resolve the output program of a project
//!
//! ```bash
//! slotplan service.yaml projects/book lowercase=yes --write
//! ```
//!
//! Prints the program as JSON on stdout. Logging goes to stderr and is
//! controlled by `SLOTPLAN_LOG` (default `info`).

use clap::Parser;
use slotplan_core::{EngineError, ParameterValues, Value};
use slotplan_engine::{load_engine, ProjectDir};
use std::process::ExitCode;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[clap(name = "slotplan")]
#[clap(about = "Resolve which output files a service run will produce")]
struct Args {
    /// Service definition (YAML)
    service: String,

    /// Project directory holding input/ and output/
    project: String,

    /// Parameter values as key=value
    #[clap(value_parser = parse_assignment)]
    parameters: Vec<(String, String)>,

    /// Write the metadata sidecars of the planned outputs
    #[clap(long)]
    write: bool,
}

fn parse_assignment(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected key=value, got `{}`", raw)),
    }
}

fn run(args: Args) -> Result<(), EngineError> {
    let engine = load_engine(&args.service)?;
    let project = ProjectDir::create(&args.project)?;
    let raw: ParameterValues = args
        .parameters
        .into_iter()
        .map(|(key, value)| (key, Value::text(value)))
        .collect();

    let resolution = project.resolve(&engine, &raw)?;
    for rejected in &resolution.rejected {
        warn!(filename = %rejected.filename, reason = %rejected.reason, "output rejected");
    }
    if args.write {
        project.write_outputs(&resolution)?;
    }
    info!(
        outputs = resolution.program.len(),
        profiles = ?resolution.program.matched_profiles(),
        "resolved program"
    );
    println!("{}", resolution.program.to_json()?);
    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_env("SLOTPLAN_LOG").unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    match run(Args::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{}", err);
            ExitCode::FAILURE
        }
    }
}
