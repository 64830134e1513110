use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};

use crate::config::CoursewatchConfig;
use crate::export::ReportFormat;

#[derive(Parser)]
#[command(name = "coursewatch")]
#[command(author = "coursewatch developers")]
#[command(version)]
#[command(about = "Reports meaningful changes between scraped LMS course snapshots")]
#[command(long_about = "coursewatch compares the structure of a course page (sections, activities, resources, files) against the previously stored snapshot and reports additions, removals, renames and description edits, with cosmetic noise filtered out.")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Configuration file (TOML)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Output format for reports
    #[arg(long, global = true, default_value = "text", help = "Output format")]
    pub output: ReportFormat,

    /// Enable verbose logging
    #[arg(short, long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    /// Disable colors in output
    #[arg(long, global = true, help = "Disable colored output")]
    pub no_color: bool,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Diff two snapshot files without touching the store
    Diff {
        /// Previous snapshot
        old: PathBuf,
        /// Current snapshot
        new: PathBuf,
        /// Produce a full inventory of NEW instead of a diff
        #[arg(long)]
        initial: bool,
        /// Show raw changes, skipping the significance filter
        #[arg(long)]
        no_filter: bool,
    },
    /// Check snapshot files against the store and record the results
    Check {
        /// Snapshot files produced by the scraper
        #[arg(required = true)]
        snapshots: Vec<PathBuf>,
        /// Store directory (overrides config)
        #[arg(long, value_name = "DIR")]
        store: Option<PathBuf>,
    },
    /// Check every snapshot file dropped into the inbox until interrupted
    Watch {
        /// Inbox directory (overrides config)
        #[arg(long, value_name = "DIR")]
        inbox: Option<PathBuf>,
        /// Store directory (overrides config)
        #[arg(long, value_name = "DIR")]
        store: Option<PathBuf>,
        /// Delete snapshot files from the inbox once checked
        #[arg(long)]
        consume: bool,
    },
    /// List the recorded change batches of a course
    History {
        course_id: String,
        /// Store directory (overrides config)
        #[arg(long, value_name = "DIR")]
        store: Option<PathBuf>,
    },
    /// Print the scan statistics recorded in the store
    Stats {
        /// Store directory (overrides config)
        #[arg(long, value_name = "DIR")]
        store: Option<PathBuf>,
        /// Start a fresh statistics record
        #[arg(long)]
        reset: bool,
    },
}

impl Cli {
    /// Load configuration and apply command-line overrides
    pub fn load_config(&self) -> anyhow::Result<CoursewatchConfig> {
        let mut config = CoursewatchConfig::load_or_default(self.config.as_deref())?;
        match &self.command {
            Command::Check { store, .. } | Command::History { store, .. } | Command::Stats { store, .. } => {
                if let Some(store) = store {
                    config.store.root = store.clone();
                }
            }
            Command::Watch { inbox, store, .. } => {
                if let Some(inbox) = inbox {
                    config.watch.inbox = inbox.clone();
                }
                if let Some(store) = store {
                    config.store.root = store.clone();
                }
            }
            Command::Diff { .. } => {}
        }
        Ok(config)
    }

    pub fn setup_logging(&self) {
        let level = if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        };

        // Reports go to stdout, logs to stderr
        tracing_subscriber::fmt()
            .with_max_level(level)
            .with_writer(std::io::stderr)
            .with_ansi(!self.no_color)
            .with_target(false)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .init();
    }

    pub fn validate(&self) -> Result<(), String> {
        if let Some(config) = &self.config {
            require_file(config)?;
        }

        match &self.command {
            Command::Diff { old, new, .. } => {
                require_file(old)?;
                require_file(new)?;
            }
            Command::Check { snapshots, .. } => {
                for snapshot in snapshots {
                    require_file(snapshot)?;
                }
            }
            Command::Watch { inbox: Some(inbox), .. } => {
                if inbox.exists() && !inbox.is_dir() {
                    return Err(format!("Inbox is not a directory: {}", inbox.display()));
                }
            }
            Command::History { course_id, .. } => {
                if course_id.trim().is_empty() {
                    return Err("Course id must not be empty".to_string());
                }
            }
            Command::Watch { inbox: None, .. } | Command::Stats { .. } => {}
        }

        Ok(())
    }
}

fn require_file(path: &Path) -> Result<(), String> {
    if !path.exists() {
        return Err(format!("Path does not exist: {}", path.display()));
    }

    if !path.is_file() {
        return Err(format!("Path is not a file: {}", path.display()));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_diff_command() {
        let cli = Cli::parse_from(["coursewatch", "diff", "old.json", "new.json", "--no-filter", "--output", "json"]);
        match cli.command {
            Command::Diff { old, new, initial, no_filter } => {
                assert_eq!(old, PathBuf::from("old.json"));
                assert_eq!(new, PathBuf::from("new.json"));
                assert!(!initial);
                assert!(no_filter);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(cli.output, ReportFormat::Json);
    }

    #[test]
    fn test_store_override() {
        let cli = Cli::parse_from(["coursewatch", "history", "19984", "--store", "/tmp/cw-store"]);
        let config = cli.load_config().unwrap();
        assert_eq!(config.store.root, PathBuf::from("/tmp/cw-store"));
    }

    #[test]
    fn test_parse_stats_command() {
        let cli = Cli::parse_from(["coursewatch", "stats", "--store", "/tmp/cw-store", "--reset"]);
        assert!(matches!(cli.command, Command::Stats { reset: true, .. }));
        assert!(cli.validate().is_ok());
        assert_eq!(cli.load_config().unwrap().store.root, PathBuf::from("/tmp/cw-store"));
    }

    #[test]
    fn test_validate_missing_snapshot() {
        let cli = Cli::parse_from(["coursewatch", "check", "/definitely/missing.json"]);
        assert!(cli.validate().is_err());
    }
}
