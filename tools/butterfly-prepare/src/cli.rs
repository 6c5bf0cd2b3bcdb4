//! CLI commands for butterfly-prepare

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing::{info, warn};

use crate::components::ComponentAlgorithm;
use crate::config::PrepareConfig;
use crate::formats::QueryGraphFile;
use crate::prepare;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Parser)]
#[command(name = "butterfly-prepare")]
#[command(about = "Turn-restriction aware preprocessing of road networks", long_about = None)]
pub struct Cli {
    /// Log output format (filter with RUST_LOG)
    #[arg(long, value_enum, global = true, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    /// Worker threads for parallel sorts (default: all cores)
    #[arg(long, global = true)]
    pub threads: Option<usize>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Options shared by commands that read a `.osrm` graph
#[derive(Args, Debug)]
pub struct GraphInput {
    /// Node-based graph (.osrm)
    pub graph: PathBuf,

    /// Turn restrictions (default: <graph>.restrictions when present)
    #[arg(short, long)]
    pub restrictions: Option<PathBuf>,

    /// TOML config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Component algorithm
    #[arg(long, value_enum)]
    pub algorithm: Option<ComponentAlgorithm>,

    /// Components with fewer nodes are tiny
    #[arg(long)]
    pub tiny_threshold: Option<u32>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build a query graph snapshot (.hsgr) from a node-based graph
    Prepare {
        #[command(flatten)]
        input: GraphInput,

        /// Output snapshot (default: <graph> with .hsgr extension)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Keep degree-two nodes
        #[arg(long)]
        no_compress: bool,

        /// Drop edges in tiny components instead of flagging them
        #[arg(long)]
        prune: bool,

        /// Print the summary as JSON
        #[arg(long)]
        json: bool,
    },

    /// Label connected components and print a report
    Components {
        #[command(flatten)]
        input: GraphInput,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Load a query graph snapshot, verify it and print statistics
    Inspect {
        /// Query graph snapshot (.hsgr)
        snapshot: PathBuf,

        /// Print statistics as JSON
        #[arg(long)]
        json: bool,
    },
}

/// Statistics printed by `inspect`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SnapshotStats {
    pub nodes: u32,
    pub edges: u32,
    pub checksum: u32,
    pub forward_edges: u32,
    pub backward_edges: u32,
    pub shortcut_edges: u32,
    pub tiny_component_edges: u32,
    pub isolated_nodes: u32,
    pub max_out_degree: u32,
}

impl GraphInput {
    fn restrictions_path(&self) -> Option<PathBuf> {
        if self.restrictions.is_some() {
            return self.restrictions.clone();
        }
        let mut candidate = OsString::from(self.graph.as_os_str());
        candidate.push(".restrictions");
        let candidate = PathBuf::from(candidate);
        candidate.exists().then_some(candidate)
    }

    fn config(&self, threads: Option<usize>) -> Result<PrepareConfig> {
        let mut config = match &self.config {
            Some(path) => PrepareConfig::from_file(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?,
            None => PrepareConfig::default(),
        };
        if let Some(algorithm) = self.algorithm {
            config.component_algorithm = algorithm;
        }
        if let Some(threshold) = self.tiny_threshold {
            config.tiny_component_threshold = threshold;
        }
        if threads.is_some() {
            config.threads = threads;
        }
        config.validate()?;
        Ok(config)
    }
}

fn init_thread_pool(threads: Option<usize>) {
    let Some(threads) = threads else {
        return;
    };
    if let Err(err) = rayon::ThreadPoolBuilder::new().num_threads(threads).build_global() {
        warn!(threads, error = %err, "Could not size the thread pool");
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn inspect(path: &Path) -> Result<SnapshotStats> {
    let (graph, checksum) =
        QueryGraphFile::read(path).with_context(|| format!("Failed to read {}", path.display()))?;

    let mut stats = SnapshotStats {
        nodes: graph.number_of_nodes(),
        edges: graph.number_of_edges(),
        checksum,
        forward_edges: 0,
        backward_edges: 0,
        shortcut_edges: 0,
        tiny_component_edges: 0,
        isolated_nodes: 0,
        max_out_degree: 0,
    };
    for edge in graph.edge_array() {
        let flags = edge.data.flags;
        stats.forward_edges += flags.forward() as u32;
        stats.backward_edges += flags.backward() as u32;
        stats.shortcut_edges += flags.shortcut() as u32;
        stats.tiny_component_edges += flags.in_tiny_component() as u32;
    }
    for node in 0..graph.number_of_nodes() {
        let degree = graph.out_degree(node);
        stats.isolated_nodes += (degree == 0) as u32;
        stats.max_out_degree = stats.max_out_degree.max(degree);
    }
    Ok(stats)
}

impl Cli {
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Prepare {
                input,
                output,
                no_compress,
                prune,
                json,
            } => {
                let mut config = input.config(self.threads)?;
                if no_compress {
                    config.compress_degree_two = false;
                }
                if prune {
                    config.prune_tiny_components = true;
                }
                init_thread_pool(config.threads);

                let output = output.unwrap_or_else(|| input.graph.with_extension("hsgr"));
                let restrictions = input.restrictions_path();
                let summary = prepare::run(&config, &input.graph, restrictions.as_deref(), &output)
                    .with_context(|| format!("Failed to prepare {}", input.graph.display()))?;

                if json {
                    print_json(&summary)?;
                } else {
                    println!("Nodes:              {}", summary.nodes);
                    println!("Compressed nodes:   {}", summary.compressed_nodes);
                    println!("Components:         {}", summary.components.components);
                    println!("Tiny edges:         {}", summary.tiny_edges);
                    println!("Query edges:        {}", summary.query_edges);
                    println!("Network length:     {:.1} km", summary.network_km);
                    println!("Checksum:           0x{:08x}", summary.checksum);
                    println!("Total time:         {} ms", summary.timings.total_ms);
                    println!("Output:             {}", output.display());
                }
                Ok(())
            }
            Commands::Components { input, json } => {
                let config = input.config(self.threads)?;
                init_thread_pool(config.threads);

                let restrictions = input.restrictions_path();
                let report = prepare::component_report(&config, &input.graph, restrictions.as_deref())
                    .with_context(|| format!("Failed to label {}", input.graph.display()))?;

                if json {
                    print_json(&report)?;
                } else {
                    println!("Algorithm:          {}", report.algorithm);
                    println!("Nodes:              {}", report.nodes);
                    println!("Components:         {}", report.components);
                    println!("Size-one:           {}", report.size_one);
                    println!("Largest:            {}", report.largest);
                    println!(
                        "Tiny (< {}):         {}",
                        report.tiny_threshold, report.tiny_components
                    );
                }
                Ok(())
            }
            Commands::Inspect { snapshot, json } => {
                let stats = inspect(&snapshot)?;
                info!(path = %snapshot.display(), "Snapshot is consistent");
                if json {
                    print_json(&stats)?;
                } else {
                    println!("Nodes:              {}", stats.nodes);
                    println!("Edges:              {}", stats.edges);
                    println!("Checksum:           0x{:08x}", stats.checksum);
                    println!("Forward edges:      {}", stats.forward_edges);
                    println!("Backward edges:     {}", stats.backward_edges);
                    println!("Shortcuts:          {}", stats.shortcut_edges);
                    println!("Tiny-component:     {}", stats.tiny_component_edges);
                    println!("Isolated nodes:     {}", stats.isolated_nodes);
                    println!("Max out-degree:     {}", stats.max_out_degree);
                }
                Ok(())
            }
        }
    }
}
