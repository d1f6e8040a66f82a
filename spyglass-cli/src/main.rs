//! Spyglass CLI
//!
//! Runs searches and tree snapshots against the live desktop, or against a
//! simulated one described in JSON, and prints the results as JSON.
//!
//! Usage from workspace root:
//!   cargo run --bin spyglass -- find --role Button --name OK
//!   cargo run --bin spyglass -- tree --window 132456 --max-depth 3
//!   cargo run --bin spyglass -- wait --contains "Save" --timeout-ms 10000
//!   cargo run --bin spyglass -- --desktop fixture.json resolve "4096:42.3:0.1"

use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use spyglass::platforms::memory::{DesktopSpec, MemoryDesktop};
use spyglass::services::MonitorLayout;
use spyglass::{
    ControlType, EngineConfig, FilterMode, Platform, Query, Rect, RootSelector, Spyglass,
    WindowHandle,
};
use std::env;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, Level};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "spyglass")]
#[command(about = "Find, wait for and snapshot desktop UI elements")]
struct Cli {
    /// Use a simulated desktop loaded from this JSON file instead of the live one
    #[arg(long, global = true, env = "SPYGLASS_DESKTOP")]
    desktop: Option<PathBuf>,

    /// Maximum elements visited by one walk
    #[arg(long, global = true, env = "SPYGLASS_SCAN_BUDGET")]
    scan_budget: Option<usize>,

    /// Result cap when a query sets no limit
    #[arg(long, global = true, env = "SPYGLASS_MAX_RESULTS")]
    max_results: Option<usize>,

    /// Force inline or post-hoc filtering for tree snapshots
    #[arg(long, global = true, env = "SPYGLASS_FILTER_MODE")]
    filter_mode: Option<FilterMode>,

    /// Never fetch subtrees in one bulk request
    #[arg(long, global = true)]
    no_bulk_cache: bool,

    /// Pretty-print the JSON output
    #[arg(long, global = true)]
    pretty: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Find elements matching a query
    Find(QueryArgs),
    /// Snapshot the subtree under a window, element or the desktop
    Tree(TreeArgs),
    /// Wait until an element matching the query appears
    Wait {
        #[command(flatten)]
        query: QueryArgs,
        /// Give up after this many milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,
    },
    /// Re-identify an element from an id printed by an earlier command
    Resolve {
        /// Element id
        id: String,
    },
}

#[derive(Args, Debug)]
struct QueryArgs {
    /// Exact name (case-insensitive)
    #[arg(long, conflicts_with_all = ["contains", "regex"])]
    name: Option<String>,
    /// Name substring (case-insensitive)
    #[arg(long, conflicts_with = "regex")]
    contains: Option<String>,
    /// Name regular expression (case-insensitive)
    #[arg(long)]
    regex: Option<String>,
    #[arg(long)]
    automation_id: Option<String>,
    /// Control type, e.g. Button or Edit
    #[arg(long, value_parser = parse_control_type)]
    role: Option<ControlType>,
    #[arg(long)]
    class_name: Option<String>,
    /// Search only under this window handle
    #[arg(long, conflicts_with = "within")]
    window: Option<i64>,
    /// Search only under this element id
    #[arg(long)]
    within: Option<String>,
    /// Only evaluate elements at exactly this depth below the scope
    #[arg(long)]
    depth: Option<usize>,
    #[arg(long)]
    max_depth: Option<usize>,
    /// Keep elements intersecting `x,y,width,height`
    #[arg(long)]
    region: Option<Rect>,
    /// Order matches by distance to this element id
    #[arg(long)]
    near: Option<String>,
    /// Order matches by area, largest first
    #[arg(long)]
    prominent: bool,
    /// Return only the n-th match (1-based)
    #[arg(long)]
    nth: Option<usize>,
    #[arg(long)]
    limit: Option<usize>,
}

#[derive(Args, Debug)]
struct TreeArgs {
    /// Root window handle; the desktop when neither this nor --element is set
    #[arg(long, conflicts_with = "element")]
    window: Option<i64>,
    /// Root element id
    #[arg(long)]
    element: Option<String>,
    #[arg(long)]
    max_depth: Option<usize>,
    /// Keep only these control types (comma separated)
    #[arg(long, value_delimiter = ',', value_parser = parse_control_type)]
    roles: Vec<ControlType>,
}

fn parse_control_type(raw: &str) -> Result<ControlType, String> {
    ControlType::parse(raw).ok_or_else(|| format!("unknown control type '{raw}'"))
}

impl QueryArgs {
    fn into_query(self) -> Query {
        let mut query = Query::new();
        if let Some(name) = self.name {
            query = query.name(name);
        }
        if let Some(fragment) = self.contains {
            query = query.name_contains(fragment);
        }
        if let Some(pattern) = self.regex {
            query = query.name_regex(pattern);
        }
        if let Some(id) = self.automation_id {
            query = query.automation_id(id);
        }
        if let Some(role) = self.role {
            query = query.control_type(role);
        }
        if let Some(class_name) = self.class_name {
            query = query.class_name(class_name);
        }
        if let Some(handle) = self.window {
            query = query.window(WindowHandle(handle));
        }
        if let Some(id) = self.within {
            query = query.within(id);
        }
        if let Some(depth) = self.depth {
            query = query.exact_depth(depth);
        }
        if let Some(depth) = self.max_depth {
            query = query.max_depth(depth);
        }
        if let Some(region) = self.region {
            query = query.region(region);
        }
        if let Some(id) = self.near {
            query = query.near(id);
        }
        if self.prominent {
            query = query.prominent();
        }
        if let Some(n) = self.nth {
            query = query.nth(n);
        }
        if let Some(limit) = self.limit {
            query = query.limit(limit);
        }
        query
    }
}

fn init_logging() {
    let log_level = env::var("LOG_LEVEL")
        .map(|level| match level.to_lowercase().as_str() {
            "error" => Level::ERROR,
            "warn" => Level::WARN,
            "info" => Level::INFO,
            "debug" => Level::DEBUG,
            "trace" => Level::TRACE,
            _ => Level::WARN,
        })
        .unwrap_or(Level::WARN);

    // stdout carries the JSON result only
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();
}

fn engine_config(cli: &Cli) -> EngineConfig {
    let mut config = EngineConfig::from_env();
    if let Some(budget) = cli.scan_budget {
        config.scan_budget = budget;
    }
    if let Some(max) = cli.max_results {
        config.max_results = max;
    }
    if let Some(mode) = cli.filter_mode {
        config.filter_mode = Some(mode);
    }
    if cli.no_bulk_cache {
        config.bulk_cache = false;
    }
    config
}

fn build_engine(cli: &Cli) -> Result<Spyglass> {
    let config = engine_config(cli);
    debug!("engine config: {:?}", config);
    let spyglass = match &cli.desktop {
        Some(path) => {
            let json = fs::read_to_string(path)
                .with_context(|| format!("failed to read desktop file {}", path.display()))?;
            let spec: DesktopSpec = serde_json::from_str(&json)
                .with_context(|| format!("invalid desktop file {}", path.display()))?;
            let desktop = MemoryDesktop::from_spec(&spec);
            let mut platform = Platform::in_memory(&desktop);
            if !spec.monitors.is_empty() {
                platform.coordinates = Arc::new(MonitorLayout::new(spec.monitors.clone()));
            }
            Spyglass::with_platform(platform, config)?
        }
        None => Spyglass::with_platform(spyglass::platforms::create_platform()?, config)?,
    };
    Ok(spyglass)
}

fn print_json<T: Serialize>(value: &T, pretty: bool) -> Result<()> {
    let out = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{out}");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    let spyglass = build_engine(&cli)?;
    let pretty = cli.pretty;

    match cli.command {
        Commands::Find(args) => {
            let query = args.into_query();
            let found = spyglass.find(&query).await?;
            print_json(&found, pretty)
        }
        Commands::Tree(args) => {
            let root = match (args.window, args.element) {
                (Some(handle), _) => RootSelector::Window(WindowHandle(handle)),
                (None, Some(id)) => RootSelector::Element(id),
                (None, None) => RootSelector::Desktop,
            };
            let tree = spyglass.get_tree(root, args.max_depth, args.roles).await?;
            print_json(&tree, pretty)
        }
        Commands::Wait { query, timeout_ms } => {
            let query = query.into_query();
            let waited = spyglass
                .wait_for(&query, timeout_ms.map(Duration::from_millis))
                .await
                .map_err(|e| match e.hint() {
                    Some(hint) => anyhow!("{e}\nhint: {hint}"),
                    None => anyhow!(e),
                })?;
            print_json(&waited, pretty)
        }
        Commands::Resolve { id } => {
            let resolved = spyglass.resolve(&id).await?;
            print_json(&resolved, pretty)
        }
    }
}
