//! nclower CLI - lower permute operators in a graph file to backend `Permute` layers.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use nclower_core::{AxisEncoding, LowerOptions};
use nclower_passes::LoweringPipeline;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "nclower")]
#[command(about = "Lower axis permutations to backend Permute layers", long_about = None)]
#[command(version)]
struct Cli {
    /// Log at debug level (overrides RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Lower a graph file
    Lower {
        /// Path to the graph file
        #[arg(value_name = "GRAPH")]
        graph: PathBuf,

        /// Output file path (defaults to stdout)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Write explicit per-axis parameters for `Tensor.permute` instead of
        /// the enumeration code
        #[arg(long)]
        explicit_axes: bool,

        /// Exit with an error if any node could not be lowered
        #[arg(long)]
        deny_diagnostics: bool,
    },
    /// List the registered lowering passes
    Passes,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Lower {
            graph,
            output,
            explicit_axes,
            deny_diagnostics,
        } => {
            cmd_lower(graph, output, explicit_axes, deny_diagnostics)?;
        }
        Commands::Passes => {
            cmd_passes()?;
        }
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Parse, lower and write a graph.
fn cmd_lower(
    graph_path: PathBuf,
    output_path: Option<PathBuf>,
    explicit_axes: bool,
    deny_diagnostics: bool,
) -> Result<()> {
    let text = std::fs::read_to_string(&graph_path)
        .with_context(|| format!("Failed to read graph from {}", graph_path.display()))?;
    let mut graph = nclower_pattern::parse_graph(&text)
        .with_context(|| format!("Failed to parse graph {}", graph_path.display()))?;
    tracing::debug!(
        path = %graph_path.display(),
        num_nodes = graph.node_count(),
        num_tensors = graph.tensor_count(),
        "graph loaded"
    );

    let encoding = if explicit_axes {
        AxisEncoding::Explicit
    } else {
        AxisEncoding::Enumerated
    };
    let pipeline = LoweringPipeline::new(LowerOptions::new().with_axis_encoding(encoding));
    let report = pipeline.run(&mut graph).context("Lowering failed")?;

    // Diagnostics themselves are logged by the pipeline
    eprintln!(
        "Lowered {} node(s), {} no-op(s), {} rejected",
        report.lowered,
        report.noops,
        report.diagnostics.len()
    );

    let lowered =
        nclower_pattern::write_graph(&graph).context("Failed to serialize lowered graph")?;
    if let Some(path) = output_path {
        std::fs::write(&path, lowered)
            .with_context(|| format!("Failed to write graph to {}", path.display()))?;
    } else {
        print!("{}", lowered);
    }

    if deny_diagnostics && !report.is_clean() {
        let nodes: Vec<&str> = report
            .diagnostics
            .iter()
            .map(|d| d.node.as_str())
            .collect();
        anyhow::bail!(
            "{} node(s) could not be lowered: {}",
            nodes.len(),
            nodes.join(", ")
        );
    }

    Ok(())
}

/// Print the default passes in the order they run.
fn cmd_passes() -> Result<()> {
    let pipeline = LoweringPipeline::new(LowerOptions::new());

    println!("{:<8} {:<20} {:<12} NAME", "PRIORITY", "SOURCE", "TARGET");
    for pass in pipeline.registry().ordered() {
        let template = nclower_pattern::parse_template(pass.match_pattern())
            .with_context(|| format!("Invalid template for pass '{}'", pass.name_str()))?;
        let source = template
            .anchor()
            .map(|node| node.op_type.as_str())
            .unwrap_or("-");

        println!(
            "{:<8} {:<20} {:<12} {}",
            pass.priority(),
            source,
            pass.type_str(),
            pass.name_str()
        );
    }

    Ok(())
}
