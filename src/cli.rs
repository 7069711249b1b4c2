use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::filter::{EnvFilter, LevelFilter};

use crate::config::AutorunConfig;

#[derive(Debug, Parser)]
#[command(name = "autorun")]
#[command(version)]
#[command(about = "Run a command whenever files under a directory change")]
#[command(long_about = "autorun watches a directory tree and, once each burst of changes settles, \
runs the given command once. Every occurrence of the marker character (default '%') in the \
command is replaced by the path of the most recent change.")]
pub struct Cli {
    /// Directory to watch for changes
    #[arg(value_name = "PATH")]
    pub path: PathBuf,

    /// Command to run; the marker is replaced by the changed path
    #[arg(
        value_name = "COMMAND",
        required = true,
        num_args = 1..,
        trailing_var_arg = true,
        allow_hyphen_values = true
    )]
    pub command: Vec<String>,

    /// Only react to paths matching this glob (repeatable)
    #[arg(short, long = "include", value_name = "GLOB")]
    pub include: Vec<String>,

    /// Ignore paths matching this glob, even if included (repeatable)
    #[arg(short = 'x', long = "exclude", value_name = "GLOB")]
    pub exclude: Vec<String>,

    /// Seconds to let a burst of changes settle before running
    #[arg(short, long, value_name = "SECONDS")]
    pub quiet: Option<f64>,

    /// Character in the command that is replaced by the changed path
    #[arg(long, value_name = "CHAR")]
    pub marker: Option<char>,

    /// Show ignored changes and other debug output
    #[arg(short, long, visible_alias = "debug")]
    pub verbose: bool,

    /// Only show warnings and errors
    #[arg(short, long, conflicts_with = "verbose")]
    pub silent: bool,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,

    /// Only watch the top level of PATH
    #[arg(long)]
    pub non_recursive: bool,

    /// Load settings from a TOML file
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

impl Cli {
    pub fn setup_logging(&self) {
        let level = if self.verbose {
            LevelFilter::DEBUG
        } else if self.silent {
            LevelFilter::WARN
        } else {
            LevelFilter::INFO
        };

        let filter = EnvFilter::builder()
            .with_default_directive(level.into())
            .from_env_lossy();

        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_ansi(!self.no_color)
            .with_target(false)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .init();
    }

    pub fn validate(&self) -> Result<(), String> {
        if !self.path.exists() {
            return Err(format!("Path does not exist: {}", self.path.display()));
        }

        if !self.path.is_dir() {
            return Err(format!("Path is not a directory: {}", self.path.display()));
        }

        Ok(())
    }

    /// Layer command-line flags over `base`. Globs given here are appended to the base lists.
    pub fn apply_to(&self, mut base: AutorunConfig) -> AutorunConfig {
        if let Some(quiet) = self.quiet {
            base.quiet_secs = quiet;
        }
        if let Some(marker) = self.marker {
            base.marker = marker;
        }
        base.include.extend(self.include.iter().cloned());
        base.exclude.extend(self.exclude.iter().cloned());
        if self.non_recursive {
            base.recursive = false;
        }
        base
    }

    /// Defaults, then the config file, then the environment, then these flags.
    pub fn load_config(&self) -> Result<AutorunConfig> {
        let mut config = match &self.config {
            Some(file) => AutorunConfig::from_file(file)
                .with_context(|| format!("Failed to load config from {}", file.display()))?,
            None => AutorunConfig::default(),
        };
        config.apply_env();

        let config = self.apply_to(config);
        config.validate().context("Invalid configuration")?;
        Ok(config)
    }
}
