//! `compgraph` command line: run one of the stock pipelines over JSON Lines files.
//!
//! Rows go to stdout (one JSON object per line) or to `--output`; logs go to stderr.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use compgraph::algorithms::{inverted_index_graph, pmi_graph, word_count_graph, yandex_maps_graph};
use compgraph::io::{ParsedLines, expand_glob, parse_json_row, write_jsonl};
use compgraph::operations::SortConfig;
use compgraph::operations::mappers::parse_timezone;
use compgraph::{Graph, Sources};
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, trace};

/// Run batch dataflow pipelines over JSON Lines inputs
#[derive(Parser)]
#[command(name = "compgraph")]
#[command(about = "compgraph - lazy batch dataflow pipelines over JSON Lines", long_about = None)]
#[command(version)]
struct Cli {
    /// Enable verbose output (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Spill sorted runs of this many rows to disk instead of sorting fully in memory
    #[arg(long, env = "COMPGRAPH_SORT_SPILL_ROWS", global = true)]
    sort_spill_rows: Option<usize>,

    /// Directory for sort spill files (system temp dir by default)
    #[arg(long, global = true)]
    spill_dir: Option<PathBuf>,

    /// Write rows here as JSON Lines instead of stdout (`.gz`/`.zst` compress)
    #[arg(short, long, global = true)]
    output: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Count word occurrences over `{text}` rows
    #[command(name = "word-count")]
    WordCount {
        /// Input file or glob pattern
        #[arg(short, long)]
        input: String,
        /// Order by `(count, text)` descending
        #[arg(long)]
        descending: bool,
    },
    /// Top-3 documents by tf-idf for every word of `{doc_id, text}` rows
    #[command(name = "inverted-index")]
    InvertedIndex {
        #[arg(short, long)]
        input: String,
    },
    /// Top-10 words by pointwise mutual information for every document
    Pmi {
        #[arg(short, long)]
        input: String,
    },
    /// Average speed per weekday and hour from travel times and edge lengths
    #[command(name = "yandex-maps")]
    YandexMaps {
        /// Travel-time rows `{edge_id, enter_time, leave_time}`
        #[arg(long)]
        times: String,
        /// Edge rows `{edge_id, start, end}`
        #[arg(long)]
        lengths: String,
        /// `UTC`, a fixed offset such as `+03:00`, or an IANA name such as `Europe/Moscow`
        #[arg(long, default_value = "UTC")]
        timezone: String,
    },
}

fn log_level(verbose: u8) -> &'static str {
    match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    }
}

fn init_logging(verbose: u8) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level(verbose)));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(verbose >= 2)
        .init();

    debug!("compgraph started with verbosity level: {verbose}");
    trace!("Full CLI args: {:?}", std::env::args().collect::<Vec<_>>());
}

/// Bind `name` to the JSON Lines files matching `pattern`, re-read on every run.
fn bind_jsonl(sources: Sources, name: &str, pattern: &str) -> Result<Sources> {
    let paths = expand_glob(pattern).with_context(|| format!("resolve input `{pattern}`"))?;
    anyhow::ensure!(!paths.is_empty(), "no input files match `{pattern}`");
    debug!(source = name, files = paths.len(), "binding JSON Lines source");
    let parser: compgraph::io::LineParser = Arc::new(parse_json_row);
    Ok(sources.bind(name, move || ParsedLines::new(paths.clone(), Arc::clone(&parser))))
}

fn emit(graph: &Graph, sources: &Sources, output: Option<&PathBuf>) -> Result<()> {
    let rows = graph.run(sources).context("start pipeline")?;
    if let Some(path) = output {
        let n = write_jsonl(path, rows).with_context(|| format!("write {}", path.display()))?;
        info!(rows = n, path = %path.display(), "pipeline finished");
        return Ok(());
    }
    let stdout = std::io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    let mut n = 0usize;
    for row in rows {
        let row = row.context("pipeline failed")?;
        writeln!(out, "{row}").context("write stdout")?;
        n += 1;
    }
    out.flush().context("flush stdout")?;
    info!(rows = n, "pipeline finished");
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut config = SortConfig::default();
    if let Some(rows) = cli.sort_spill_rows {
        config = config.with_spill_threshold(rows);
    }
    if let Some(dir) = &cli.spill_dir {
        config = config.with_spill_dir(dir);
    }

    let (graph, sources) = match &cli.command {
        Commands::WordCount { input, descending } => (
            word_count_graph("docs", *descending, &config),
            bind_jsonl(Sources::new(), "docs", input)?,
        ),
        Commands::InvertedIndex { input } => (
            inverted_index_graph("docs", &config),
            bind_jsonl(Sources::new(), "docs", input)?,
        ),
        Commands::Pmi { input } => (
            pmi_graph("docs", &config),
            bind_jsonl(Sources::new(), "docs", input)?,
        ),
        Commands::YandexMaps {
            times,
            lengths,
            timezone,
        } => {
            let tz = parse_timezone(timezone).context("--timezone")?;
            let sources = bind_jsonl(Sources::new(), "times", times)?;
            let sources = bind_jsonl(sources, "lengths", lengths)?;
            (yandex_maps_graph("times", "lengths", tz, &config), sources)
        }
    };
    debug!(plan = %graph.explain(), "pipeline plan");
    emit(&graph, &sources, cli.output.as_ref())
}
