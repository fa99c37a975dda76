//! CLI command definitions

use clap::{Parser, Subcommand, ValueEnum};
use quorum_domain::SelectionRule;
use std::path::PathBuf;

/// Output format for command results
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable, colored where the terminal allows
    Text,
    /// JSON output
    Json,
}

/// Selection rule override
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RuleArg {
    /// FNV-1a over the sorted candidate ids
    Hashed,
    /// Lowest candidate id
    FirstById,
}

impl From<RuleArg> for SelectionRule {
    fn from(rule: RuleArg) -> Self {
        match rule {
            RuleArg::Hashed => SelectionRule::Hashed,
            RuleArg::FirstById => SelectionRule::FirstById,
        }
    }
}

/// CLI arguments for mesh-quorum
#[derive(Parser, Debug)]
#[command(name = "mesh-quorum")]
#[command(author, version, about = "Peer-replicated vote aggregation and quorum selection")]
#[command(long_about = r#"
mesh-quorum runs the rules every peer of the mesh applies identically:
the visibility guard on writes, last-write-wins vote aggregation and the
deterministic quorum selector.

Configuration files are loaded from (in priority order):
1. MESH_QUORUM_<SECTION>__<KEY>   Environment variables
2. --config <path>                Explicit config file
3. ./mesh-quorum.toml             Project-level config
4. ~/.config/mesh-quorum/config.toml   Global config

Example:
  mesh-quorum select candidates.json
  mesh-quorum check-write vh/aggregates/topics/t/syntheses/s/epochs/1/points/p '{"agree":1}'
  mesh-quorum simulate --peers 3 --drop-acks
  mesh-quorum queue list --queue ~/.local/share/mesh-quorum/intents.json
"#)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Verbosity level (-v = info, -vv = debug, -vvv = trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Write diagnostics to this file instead of stderr
    #[arg(long, value_name = "PATH", global = true)]
    pub log_file: Option<PathBuf>,

    /// Path to configuration file
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Disable loading of configuration files
    #[arg(long, global = true)]
    pub no_config: bool,

    /// Output format (`select` defaults to json, everything else to text)
    #[arg(short, long, value_enum, global = true)]
    pub output: Option<OutputFormat>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Select the canonical candidate from a JSON array of candidates
    Select {
        /// File holding the candidates (`-` for stdin)
        candidates: PathBuf,

        /// Override the configured selection rule
        #[arg(long, value_enum)]
        rule: Option<RuleArg>,
    },

    /// Check whether a payload may be written at a mesh path
    CheckWrite {
        /// Mesh path, `/`-separated
        path: String,

        /// Payload as JSON
        payload: String,
    },

    /// Print the FNV-1a 32-bit hash of a string
    Fnv {
        text: String,
    },

    /// Inspect or clear a file-backed intent queue
    Queue {
        #[command(subcommand)]
        action: QueueAction,

        /// Queue file (defaults to `queue.path` from config)
        #[arg(long, value_name = "PATH", global = true)]
        queue: Option<PathBuf>,
    },

    /// Replay a scripted vote sequence against an in-process mesh
    Simulate {
        /// JSON array of vote intents; a built-in two-voter script when omitted
        #[arg(long, value_name = "PATH")]
        script: Option<PathBuf>,

        /// Number of peers sharing the mesh; intents go to peers by voter
        #[arg(long, default_value_t = 2)]
        peers: usize,

        /// Store writes but never acknowledge them
        #[arg(long)]
        drop_acks: bool,

        /// Lose every write during the first replay pass
        #[arg(long)]
        lossy_first_pass: bool,

        /// Return nothing for directory reads, forcing per-voter enumeration
        #[arg(long)]
        shallow_reads: bool,

        /// Reach the remote peer only after this many milliseconds
        #[arg(long, value_name = "MS")]
        contact_after_ms: Option<u64>,
    },

    /// Show configuration sources and the resolved configuration
    Config,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueAction {
    /// List pending intents in replay order
    List,
    /// Remove every pending intent
    Clear,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_select_with_rule() {
        let cli = Cli::parse_from(["mesh-quorum", "select", "c.json", "--rule", "first-by-id"]);
        match cli.command {
            Command::Select { candidates, rule } => {
                assert_eq!(candidates, PathBuf::from("c.json"));
                assert_eq!(rule.map(SelectionRule::from), Some(SelectionRule::FirstById));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::parse_from(["mesh-quorum", "queue", "list", "--queue", "q.json", "-vv", "-o", "json"]);
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.output, Some(OutputFormat::Json));
        assert!(matches!(
            cli.command,
            Command::Queue { action: QueueAction::List, queue: Some(_) }
        ));
    }

    #[test]
    fn test_simulate_defaults() {
        let cli = Cli::parse_from(["mesh-quorum", "simulate"]);
        match cli.command {
            Command::Simulate { script, peers, drop_acks, contact_after_ms, .. } => {
                assert!(script.is_none());
                assert_eq!(peers, 2);
                assert!(!drop_acks);
                assert!(contact_after_ms.is_none());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
