use anyhow::{Context, Result};
use clap::Parser;
use rastro::builder::{BuildStats, GraphBuilder};
use rastro::cli::{Cli, OutputFormat};
use rastro::config::AnalysisConfig;
use rastro::critical_path::CriticalPath;
use rastro::critical_path_cache::CriticalPathCache;
use rastro::event::{read_events, TraceEvent};
use rastro::graph::ExecutionGraph;
use rastro::json_output::{JsonBuildSummary, JsonCriticalPath, JsonOutput};
use rastro::persistence;
use rastro::stats::PathStatistics;
use rastro::worker::{Worker, WorkerKind};
use regex::Regex;
use std::fs::File;
use std::io::{self, BufReader, Write};
use std::path::Path;
use std::sync::Arc;
use tracing::warn;
use tracing_subscriber::EnvFilter;

/// Initialize tracing subscriber for debug output
fn init_tracing(debug: bool) {
    if debug {
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::from_default_env().add_directive(tracing::Level::TRACE.into()),
            )
            .with_writer(std::io::stderr)
            .init();
    }
}

/// Read the event stream, skipping lines that do not parse
fn load_events(path: &Path) -> Result<Vec<TraceEvent>> {
    let file =
        File::open(path).with_context(|| format!("Failed to open events file {}", path.display()))?;
    let mut events = Vec::new();
    for (line, event) in read_events(BufReader::new(file)).enumerate() {
        match event {
            Ok(event) => events.push(event),
            Err(err) => warn!(line = line + 1, "skipping malformed event: {}", err),
        }
    }
    Ok(events)
}

fn build_graph(
    events: &[TraceEvent],
    config: &AnalysisConfig,
) -> Result<(Arc<ExecutionGraph>, BuildStats)> {
    let start = events.first().map_or(0, |e| e.timestamp);
    let end = events.iter().map(|e| e.timestamp).max().unwrap_or(start);

    let graph = Arc::new(ExecutionGraph::new(start));
    let mut builder = GraphBuilder::new(Arc::clone(&graph), config)?;
    for event in events {
        builder.handle_event(event);
    }
    let stats = builder
        .finish(end)
        .context("Failed to close the execution graph")?;
    Ok((graph, stats))
}

/// Workers whose critical path is requested
fn select_workers(graph: &ExecutionGraph, args: &Cli) -> Result<Vec<Worker>> {
    let name_filter = args
        .worker_name
        .as_deref()
        .map(Regex::new)
        .transpose()
        .context("Invalid --worker-name pattern")?;

    let mut selected: Vec<Worker> = graph
        .workers()
        .into_iter()
        .map(|(_, worker)| Worker::clone(&worker))
        .filter(|w| matches!(w.kind(), WorkerKind::Thread { tid } if tid > 0))
        .filter(|w| args.host.as_deref().map_or(true, |host| w.host() == host))
        .filter(|w| args.tids.is_empty() || args.tids.contains(&w.tid()))
        .filter(|w| name_filter.as_ref().map_or(true, |re| re.is_match(w.name())))
        .collect();
    selected.sort_by(|a, b| (a.host(), a.tid()).cmp(&(b.host(), b.tid())));

    for tid in &args.tids {
        if !selected.iter().any(|w| w.tid() == *tid) {
            warn!(tid, "no such thread in the trace");
        }
    }
    Ok(selected)
}

fn print_text<W: Write>(
    out: &mut W,
    worker: &Worker,
    path: &CriticalPath,
    summary: bool,
) -> io::Result<()> {
    writeln!(
        out,
        "Critical path of {}: {} ns in {} segments",
        worker,
        path.total_duration(),
        path.segments().len()
    )?;
    for segment in path.segments() {
        write!(
            out,
            "  [{:>20} .. {:>20}] {:>12} ns  {:<12} {}",
            segment.start,
            segment.end,
            segment.duration(),
            segment.state.label(),
            segment.worker
        )?;
        match &segment.qualifier {
            Some(qualifier) => writeln!(out, " ({})", qualifier)?,
            None => writeln!(out)?,
        }
    }
    if summary {
        writeln!(out)?;
        PathStatistics::from_path(path).write_summary(out)?;
    }
    writeln!(out)
}

fn main() -> Result<()> {
    let args = Cli::parse();

    // Initialize tracing if --debug flag is set
    init_tracing(args.debug);

    let config = match &args.config {
        Some(path) => AnalysisConfig::from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => AnalysisConfig::default(),
    };

    let (graph, build_stats) = match (&args.load, &args.events) {
        (Some(path), _) => {
            let graph = persistence::load(path, None)
                .with_context(|| format!("Failed to load graph {}", path.display()))?;
            (Arc::new(graph), None)
        }
        (None, Some(path)) => {
            let events = load_events(path)?;
            let (graph, stats) = build_graph(&events, &config)?;
            (graph, Some(stats))
        }
        (None, None) => anyhow::bail!("either --events or --load is required"),
    };

    if let Some(path) = &args.save {
        persistence::save(graph.as_ref(), path)
            .with_context(|| format!("Failed to save graph to {}", path.display()))?;
    }

    let workers = select_workers(&graph, &args)?;
    let interval = graph
        .end_time()
        .map_or(0, |end| end.saturating_sub(graph.start_time()));
    let summary = JsonBuildSummary {
        workers: graph.workers().len(),
        vertices: graph.vertex_count(),
        edges: graph.edge_count(),
        stats: build_stats,
    };

    let cache = CriticalPathCache::new(graph, config.analysis.cache_capacity);
    let results = cache.compute_many(&workers);

    let stdout = io::stdout();
    let mut out = stdout.lock();
    match args.format {
        OutputFormat::Json => {
            let mut output = JsonOutput::new(summary);
            for (worker, result) in workers.iter().zip(&results) {
                match result {
                    Ok(path) => {
                        let mut json = JsonCriticalPath::new(worker, path).with_coverage(path, interval);
                        if args.summary {
                            json = json.with_breakdown(&PathStatistics::from_path(path));
                        }
                        output.add_path(json);
                    }
                    Err(err) => output.add_unavailable(worker, err.to_string()),
                }
            }
            writeln!(out, "{}", output.to_json()?)?;
        }
        OutputFormat::Text => {
            if workers.is_empty() {
                writeln!(out, "No matching workers.")?;
            }
            for (worker, result) in workers.iter().zip(&results) {
                match result {
                    Ok(path) => print_text(&mut out, worker, path, args.summary)?,
                    Err(err) => writeln!(out, "Critical path of {} unavailable: {}\n", worker, err)?,
                }
            }
        }
    }

    Ok(())
}
