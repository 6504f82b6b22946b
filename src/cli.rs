//! CLI argument parsing for Rastro

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Output format for critical paths
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text format (default)
    Text,
    /// JSON format for machine parsing
    Json,
}

#[derive(Parser, Debug)]
#[command(name = "rastro")]
#[command(version)]
#[command(about = "Execution graph and critical path analysis for kernel traces", long_about = None)]
pub struct Cli {
    /// Kernel event stream, one JSON event per line
    #[arg(short = 'i', long = "events", value_name = "FILE", required_unless_present = "load")]
    pub events: Option<PathBuf>,

    /// Reopen a graph written with --save instead of building one
    #[arg(long = "load", value_name = "FILE", conflicts_with = "events")]
    pub load: Option<PathBuf>,

    /// Write the built graph to FILE
    #[arg(long = "save", value_name = "FILE")]
    pub save: Option<PathBuf>,

    /// Thread to analyse (may be repeated)
    #[arg(short = 't', long = "tid", value_name = "TID")]
    pub tids: Vec<i64>,

    /// Analyse threads whose name matches REGEX
    #[arg(short = 'n', long = "worker-name", value_name = "REGEX", conflicts_with = "tids")]
    pub worker_name: Option<String>,

    /// Restrict worker selection to one host
    #[arg(long = "host", value_name = "HOST")]
    pub host: Option<String>,

    /// Analysis configuration (TOML)
    #[arg(short = 'C', long = "config", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Output format (text or json)
    #[arg(long = "format", value_enum, default_value = "text")]
    pub format: OutputFormat,

    /// Show time breakdown per state and per worker
    #[arg(short = 'c', long = "summary")]
    pub summary: bool,

    /// Enable debug tracing output to stderr
    #[arg(long = "debug")]
    pub debug: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_events() {
        let cli = Cli::parse_from(["rastro", "--events", "trace.jsonl"]);
        assert_eq!(cli.events, Some(PathBuf::from("trace.jsonl")));
        assert!(cli.load.is_none());
        assert!(cli.tids.is_empty());
    }

    #[test]
    fn test_cli_requires_input() {
        assert!(Cli::try_parse_from(["rastro"]).is_err());
    }

    #[test]
    fn test_cli_load_instead_of_events() {
        let cli = Cli::parse_from(["rastro", "--load", "graph.bin"]);
        assert_eq!(cli.load, Some(PathBuf::from("graph.bin")));
        assert!(Cli::try_parse_from(["rastro", "--load", "g.bin", "--events", "t.jsonl"]).is_err());
    }

    #[test]
    fn test_cli_repeated_tids() {
        let cli = Cli::parse_from(["rastro", "-i", "t.jsonl", "-t", "42", "-t", "7"]);
        assert_eq!(cli.tids, vec![42, 7]);
    }

    #[test]
    fn test_cli_tid_conflicts_with_name() {
        let result = Cli::try_parse_from(["rastro", "-i", "t.jsonl", "-t", "1", "-n", "app"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_format_flag() {
        let cli = Cli::parse_from(["rastro", "-i", "t.jsonl", "--format", "json"]);
        assert_eq!(cli.format, OutputFormat::Json);
        let cli = Cli::parse_from(["rastro", "-i", "t.jsonl"]);
        assert_eq!(cli.format, OutputFormat::Text);
    }

    #[test]
    fn test_cli_summary_and_debug_default_false() {
        let cli = Cli::parse_from(["rastro", "-i", "t.jsonl"]);
        assert!(!cli.summary);
        assert!(!cli.debug);
        let cli = Cli::parse_from(["rastro", "-i", "t.jsonl", "-c", "--debug"]);
        assert!(cli.summary);
        assert!(cli.debug);
    }
}
