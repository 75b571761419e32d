// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>

//! NodeFlow CLI
//!
//! Host front-end for the evaluation engine: loads a flow document, drives
//! `tick` / `evaluate`, and prints snapshots and deltas; or runs the
//! ahead-of-time generator over the same document.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use nodeflow_core::{FlowDoc, FlowEngine};

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    #[clap(subcommand)]
    cmd: Command,
}

#[derive(clap::Subcommand, Debug)]
enum Command {
    /// Load a flow and run a fixed number of tick/evaluate steps
    Run {
        /// Path to the flow document (JSON)
        flow: PathBuf,

        /// Number of tick/evaluate steps to drive
        #[clap(long, default_value_t = 10)]
        steps: u64,

        /// Milliseconds of simulated time per step
        #[clap(long, default_value_t = 100.0)]
        dt: f64,
    },
    /// Emit the standalone evaluation module for a flow
    Gen {
        /// Path to the flow document (JSON)
        flow: PathBuf,

        /// Output file; stdout when omitted
        #[clap(short, long)]
        output: Option<PathBuf>,
    },
}

fn load_doc(path: &PathBuf) -> Result<FlowDoc> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))
}

fn main() -> Result<()> {
    let args = Args::parse();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    match args.cmd {
        Command::Run { flow, steps, dt } => run(&flow, steps, dt),
        Command::Gen { flow, output } => gen(&flow, output.as_ref()),
    }
}

fn run(flow: &PathBuf, steps: u64, dt: f64) -> Result<()> {
    let doc = load_doc(flow)?;
    let mut engine = FlowEngine::new();
    engine
        .load(&doc)
        .with_context(|| format!("loading {}", flow.display()))?;
    info!(
        nodes = doc.nodes.len(),
        connections = doc.connections.len(),
        "flow loaded"
    );

    let mut watermark = engine.current_evaluation_generation();
    for step in 1..=steps {
        engine.tick(dt);
        engine.evaluate();

        let changes = engine.delta(watermark);
        watermark = engine.current_evaluation_generation();
        if changes.is_empty() {
            continue;
        }
        let graph = engine.graph().expect("graph is loaded");
        for (handle, value) in &changes {
            let port = graph.port(*handle);
            let node = graph.node(port.owner);
            println!("[{step}] {}:{} = {value}", node.id, port.id);
        }
    }

    let snapshot = engine.snapshot();
    println!(
        "{}",
        serde_json::to_string_pretty(&snapshot).context("serializing snapshot")?
    );
    Ok(())
}

fn gen(flow: &PathBuf, output: Option<&PathBuf>) -> Result<()> {
    let doc = load_doc(flow)?;
    let code = nodeflow_gen::generate(&doc)
        .with_context(|| format!("loading {}", flow.display()))?;
    match output {
        Some(path) => {
            std::fs::write(path, &code).with_context(|| format!("writing {}", path.display()))?;
            info!(path = %path.display(), "artifact written");
        }
        None => print!("{code}"),
    }
    Ok(())
}
