//! Entry-point arguments and run configuration
//!
//! Entry points take a configuration file path, a flag to emit a template
//! configuration and exit, and a verbosity counter that maps onto the log
//! level (see [`crate::logging`]).

use crate::error::{Error, Result};
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Command-line arguments shared by the toolkit's entry points
#[derive(Debug, Parser)]
#[command(name = "parwave", about = "Likelihood fitting over a pool of calculation workers")]
pub struct Cli {
    /// Path to the run configuration file
    pub config: Option<PathBuf>,

    /// Print a template configuration to stdout and exit
    #[arg(long)]
    pub template: bool,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

/// Run configuration, loaded from a JSON file
///
/// Missing keys fall back to their defaults so a minimal file only names
/// the data it cares about.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Settings {
    /// Event file to load (`.csv` or `.tsv`)
    pub data_file: PathBuf,

    /// Directory for parsed-table cache records
    pub cache_directory: PathBuf,

    /// Number of calculation workers
    pub workers: usize,

    /// Whether to show the heartbeat status line
    pub progress: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_file: PathBuf::from("events.csv"),
            cache_directory: PathBuf::from(".parwave-cache"),
            workers: num_cpus::get(),
            progress: true,
        }
    }
}

impl Settings {
    /// Load and validate settings from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        let settings: Settings = serde_json::from_str(&text)?;
        settings.validate()?;
        Ok(settings)
    }

    /// A template configuration, pretty-printed
    pub fn template() -> String {
        serde_json::to_string_pretty(&Settings::default()).unwrap_or_default()
    }

    /// Check invariants the pool relies on
    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(Error::InvalidConfig(
                "workers must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    #[test]
    fn test_template_parses_back() {
        let settings: Settings = serde_json::from_str(&Settings::template()).unwrap();
        assert!(settings.workers >= 1);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.json");
        let mut file = fs::File::create(&path).unwrap();
        write!(file, r#"{{ "data-file": "run7.tsv", "workers": 2 }}"#).unwrap();
        drop(file);

        let settings = Settings::load(&path).unwrap();
        assert_eq!(settings.data_file, PathBuf::from("run7.tsv"));
        assert_eq!(settings.workers, 2);
        assert!(settings.progress);
    }

    #[test]
    fn test_zero_workers_rejected() {
        let settings = Settings {
            workers: 0,
            ..Settings::default()
        };
        assert!(matches!(
            settings.validate(),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_cli_verbosity_counter() {
        let cli = Cli::parse_from(["parwave", "-vv", "run.json"]);
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.config, Some(PathBuf::from("run.json")));
        assert!(!cli.template);
    }
}
