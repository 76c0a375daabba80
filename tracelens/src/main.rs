//! # tracelens - Main Entry Point
//!
//! Loads one trace file, rebuilds the timeline model and prints the
//! requested reports as text or JSON. Logging goes to stderr through
//! `env_logger` (`RUST_LOG=info` shows the load diagnostics).

use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use std::io::{self, BufWriter, Write};
use std::time::Instant;

use tracelens::cli::{json_report, write_text_report, Args};
use tracelens::domain::QueryError;
use tracelens::query::TraceAnalysis;

// Exit codes
const EXIT_SUCCESS: i32 = 0;
const EXIT_ERROR: i32 = 1;
const EXIT_USAGE: i32 = 2;

fn main() {
    env_logger::init();
    std::process::exit(match run() {
        Ok(()) => EXIT_SUCCESS,
        Err(e) => {
            let code = exit_code_for(&e);
            eprintln!("error: {e:#}");
            code
        }
    });
}

fn exit_code_for(err: &anyhow::Error) -> i32 {
    if err.downcast_ref::<QueryError>().is_some() {
        EXIT_USAGE
    } else {
        EXIT_ERROR
    }
}

fn run() -> Result<()> {
    let args = Args::parse();
    let options = args.model_options();

    let started = Instant::now();
    let analysis = TraceAnalysis::load(&args.trace, &options)
        .with_context(|| format!("Failed to load trace {}", args.trace.display()))?;
    let model = analysis.model();
    info!(
        "Loaded {} in {:.1?}: {} events, {} tracks",
        args.trace.display(),
        started.elapsed(),
        model.store().events().len(),
        model.tracks().len()
    );
    let diagnostics = model.diagnostics();
    if diagnostics.total() > 0 {
        info!("{} tolerated anomalies", diagnostics.total());
        for (anomaly, count) in diagnostics.counts() {
            info!("  {anomaly}: {count}");
        }
    }

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    if !args.quiet && !args.json {
        writeln!(out, "tracelens v{}", env!("CARGO_PKG_VERSION"))?;
        writeln!(out, "trace: {}", args.trace.display())?;
        if !model.page_url().is_empty() {
            writeln!(out, "page: {}", model.page_url())?;
        }
        if model.is_generic_trace() {
            writeln!(out, "note: no page metadata, first thread taken as main")?;
        }
        writeln!(out)?;
    }
    if args.json {
        let report = json_report(&analysis, &args)?;
        serde_json::to_writer_pretty(&mut out, &report)?;
        writeln!(out)?;
    } else {
        write_text_report(&mut out, &analysis, &args)?;
    }
    out.flush()?;
    Ok(())
}
