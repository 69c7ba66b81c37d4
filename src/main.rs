//! Heapscope - sampled entry sizing and G1 region size recommendations
//!
//! Command-line front end for the analysis functions and the cluster runner,
//! operating on JSON cluster snapshots.
#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use heapscope::config::{Config, SamplingConfig};
use heapscope::functions::{
    AnalysisFunction, FunctionOutput, MaxSizeSummarizer, RegionSizeAnalyzer, TopNByteSizes,
};
use heapscope::profiler::{report, ClusterRunner, SamplingEngine};
use heapscope::sizing::DeepSizer;
use heapscope::storage::{ClusterSnapshot, MemoryStore};
use tracing::{debug, info};

/// Heapscope - find the largest cache entries and size G1 regions to fit them
#[derive(Parser, Debug)]
#[command(name = "heapscope")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Path to configuration file (TOML)
    #[arg(short = 'c', long = "config", value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Log level: trace, debug, info, warn, error (overrides config file)
    #[arg(
        short = 'l',
        long = "log-level",
        value_name = "LEVEL",
        env = "HEAPSCOPE_LOG_LEVEL",
        global = true
    )]
    loglevel: Option<String>,

    /// Output format for reports
    #[arg(
        short = 'f',
        long = "format",
        value_enum,
        default_value_t = OutputFormat::Text,
        global = true
    )]
    format: OutputFormat,

    /// Samples collected per partition (overrides config file)
    #[arg(
        long = "budget",
        value_name = "SAMPLES",
        env = "HEAPSCOPE_BUDGET",
        global = true
    )]
    budget: Option<u64>,

    /// Largest samples retained per partition (overrides config file)
    #[arg(long = "top-k", value_name = "K", env = "HEAPSCOPE_TOP_K", global = true)]
    top_k: Option<usize>,

    /// Use the quick sampling preset (applied before --budget)
    #[arg(long = "quick", action = ArgAction::SetTrue, global = true)]
    quick: bool,

    /// Dump effective configuration to stdout and exit
    #[arg(long = "dump-config", action = ArgAction::SetTrue, global = true)]
    dump_config: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Sample one partition and recommend a region size from it
    AnalyzeRegion {
        #[command(flatten)]
        source: SnapshotArgs,

        /// Partition path, e.g. /orders
        #[arg(short = 'p', long = "partition", value_name = "PATH")]
        partition: String,
    },

    /// Summarize the largest object of every partition on one member
    Summarize {
        #[command(flatten)]
        source: SnapshotArgs,
    },

    /// List the N largest entries of one partition (exhaustive)
    TopN {
        #[command(flatten)]
        source: SnapshotArgs,

        /// Partition path, e.g. /orders
        #[arg(short = 'p', long = "partition", value_name = "PATH")]
        partition: String,

        /// Number of entries to report (defaults to top_n.default_n)
        n: Option<String>,
    },

    /// Analyze every member of the snapshot concurrently and roll up
    Cluster {
        /// Cluster snapshot (JSON)
        #[arg(short = 's', long = "snapshot", value_name = "FILE")]
        snapshot: PathBuf,
    },
}

#[derive(clap::Args, Debug)]
struct SnapshotArgs {
    /// Cluster snapshot (JSON)
    #[arg(short = 's', long = "snapshot", value_name = "FILE")]
    snapshot: PathBuf,

    /// Member to analyze (defaults to the first member in the snapshot)
    #[arg(short = 'm', long = "member", value_name = "NAME")]
    member: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

impl Cli {
    /// Apply CLI argument overrides to the configuration
    fn apply_to_config(&self, config: &mut Config) -> Result<(), String> {
        if let Some(ref level) = self.loglevel {
            config.logging.level = level.clone();
        }
        if self.quick {
            config.sampling = SamplingConfig {
                prefer_bounded_fetch: config.sampling.prefer_bounded_fetch,
                ..SamplingConfig::quick()
            };
        }
        if let Some(budget) = self.budget {
            if budget == 0 {
                return Err("budget must be at least 1".to_string());
            }
            config.sampling.target_sample_budget = budget;
        }
        if let Some(top_k) = self.top_k {
            config.scan.top_k = top_k;
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
enum ConfigSource {
    Explicit(PathBuf),
    DefaultFile(PathBuf),
    Defaults,
}

impl ConfigSource {
    fn label(&self) -> String {
        match self {
            ConfigSource::Explicit(path) | ConfigSource::DefaultFile(path) => {
                path.display().to_string()
            }
            ConfigSource::Defaults => "built-in defaults".to_string(),
        }
    }
}

fn load_config(cli: &Cli) -> Result<(Config, ConfigSource), String> {
    if let Some(path) = &cli.config {
        if !path.exists() {
            return Err(format!("Configuration file not found: {}", path.display()));
        }
        let config = Config::from_file(path).map_err(|e| e.to_string())?;
        return Ok((config, ConfigSource::Explicit(path.clone())));
    }

    let default_path = PathBuf::from("heapscope.toml");
    if default_path.exists() {
        let config = Config::from_file(&default_path).map_err(|e| e.to_string())?;
        return Ok((config, ConfigSource::DefaultFile(default_path)));
    }

    Ok((Config::default(), ConfigSource::Defaults))
}

fn init_logging(config: &Config) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    // reports own stdout
    match config.logging.format {
        heapscope::config::LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        heapscope::config::LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().pretty().with_writer(std::io::stderr))
                .init();
        }
    }
}

fn load_snapshot(path: &Path) -> Result<ClusterSnapshot, String> {
    let snapshot = ClusterSnapshot::from_file(path).map_err(|e| e.to_string())?;
    debug!(path = %path.display(), members = snapshot.members.len(), "Snapshot loaded");
    Ok(snapshot)
}

fn load_member(args: &SnapshotArgs) -> Result<MemoryStore, String> {
    let snapshot = load_snapshot(&args.snapshot)?;
    let member = match &args.member {
        Some(name) => snapshot
            .members
            .into_iter()
            .find(|m| &m.name == name)
            .ok_or_else(|| format!("Member '{}' not found in snapshot", name))?,
        None => snapshot
            .members
            .into_iter()
            .next()
            .ok_or_else(|| "Snapshot contains no members".to_string())?,
    };
    Ok(member.into_store())
}

fn emit(output: &FunctionOutput, format: OutputFormat) -> ExitCode {
    let rendered = match format {
        OutputFormat::Text => Ok(output.to_text()),
        OutputFormat::Json => output.to_json().map(|json| json + "\n"),
    };
    match rendered {
        Ok(text) => print!("{}", text),
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    }
    if output.is_error() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

fn run_function<F>(
    function: F,
    source: &SnapshotArgs,
    args: Vec<String>,
    format: OutputFormat,
) -> ExitCode
where
    F: AnalysisFunction<MemoryStore>,
{
    let store = match load_member(source) {
        Ok(store) => store,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };
    info!(function = function.id(), "Executing function");
    emit(&function.execute(&store, &args), format)
}

fn cmd_cluster(snapshot: &Path, config: &Config, format: OutputFormat) -> ExitCode {
    let stores: Vec<Arc<MemoryStore>> = match load_snapshot(snapshot) {
        Ok(snapshot) => snapshot.into_stores().into_iter().map(Arc::new).collect(),
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let runner = ClusterRunner::new(
        Arc::new(DeepSizer::new()),
        SamplingEngine::new(config.sampling.clone()),
        config.scan.top_k,
    )
    .with_node_timeout(config.cluster.node_timeout());
    // timed-out members must not hold the process open
    let cluster = match runner.run_blocking(stores) {
        Ok(cluster) => cluster,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let rendered = match format {
        OutputFormat::Text => Ok(report::render_cluster(&cluster)),
        OutputFormat::Json => report::to_json(&cluster).map(|json| json + "\n"),
    };
    match rendered {
        Ok(text) => {
            print!("{}", text);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let (mut config, source) = match load_config(&cli) {
        Ok(result) => result,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    // Apply CLI argument overrides (includes environment variables via clap)
    if let Err(e) = cli.apply_to_config(&mut config) {
        eprintln!("Error: invalid argument: {}", e);
        return ExitCode::FAILURE;
    }

    if let Err(e) = config.validate() {
        eprintln!("Error: {}", e);
        return ExitCode::FAILURE;
    }

    // Dump effective configuration and exit
    if cli.dump_config {
        return match config.to_toml_string() {
            Ok(output) => {
                print!("{output}");
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("Error: {}", e);
                ExitCode::FAILURE
            }
        };
    }

    init_logging(&config);
    info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %source.label(),
        budget = config.sampling.target_sample_budget,
        top_k = config.scan.top_k,
        "Starting heapscope"
    );

    let sizer = Arc::new(DeepSizer::new());
    match &cli.command {
        Some(Commands::AnalyzeRegion { source, partition }) => run_function(
            RegionSizeAnalyzer::new(sizer, &config),
            source,
            vec![partition.clone()],
            cli.format,
        ),
        Some(Commands::Summarize { source }) => run_function(
            MaxSizeSummarizer::new(sizer, &config),
            source,
            Vec::new(),
            cli.format,
        ),
        Some(Commands::TopN {
            source,
            partition,
            n,
        }) => {
            let mut args = vec![partition.clone()];
            args.extend(n.clone());
            run_function(TopNByteSizes::new(sizer, &config), source, args, cli.format)
        }
        Some(Commands::Cluster { snapshot }) => cmd_cluster(snapshot, &config, cli.format),
        None => {
            eprintln!("No command given. Run 'heapscope --help' for usage.");
            ExitCode::FAILURE
        }
    }
}
