use anyhow::Context;
use clap::Args;
use std::fs::{File, OpenOptions};
use std::path::PathBuf;
use std::sync::Mutex;
use tracing_subscriber::fmt::writer::{BoxMakeWriter, MakeWriterExt};
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

/// Filter directives for the launcher, e.g. `K3S_LOG=k3s.data=debug`.
pub const LOG_ENV: &str = "K3S_LOG";

/// Logging flags shared by in-process commands.
#[derive(Args, Clone, Debug, Default, PartialEq, Eq)]
pub struct LogOptions {
    /// (logging) Turn on debug logs
    #[arg(long)]
    pub debug: bool,

    /// (logging) Log to file
    #[arg(long = "log", short = 'l', value_name = "FILE")]
    pub log_file: Option<PathBuf>,

    /// (logging) Log to standard error as well as file (if set)
    #[arg(long = "alsologtostderr")]
    pub also_log_to_stderr: bool,
}

impl LogOptions {
    /// `--debug` beats any environment directives; without either, `info`.
    pub fn filter_directives(&self, env_directives: Option<&str>) -> String {
        if self.debug {
            return "debug".to_string();
        }
        match env_directives.map(str::trim) {
            Some(directives) if !directives.is_empty() => directives.to_string(),
            _ => "info".to_string(),
        }
    }

    fn env_filter(&self) -> EnvFilter {
        let env_directives = pick_env_directives(
            std::env::var(LOG_ENV).ok(),
            std::env::var(EnvFilter::DEFAULT_ENV).ok(),
        );
        let directives = self.filter_directives(env_directives.as_deref());
        EnvFilter::try_new(&directives).unwrap_or_else(|_| EnvFilter::new("info"))
    }
}

/// `K3S_LOG` wins over `RUST_LOG` unless it is blank.
fn pick_env_directives(k3s_log: Option<String>, rust_log: Option<String>) -> Option<String> {
    let set = |value: &String| !value.trim().is_empty();
    k3s_log.filter(set).or_else(|| rust_log.filter(set))
}

/// Installs the global subscriber. Logs go to stderr unless `--log` names a file.
pub fn init(options: &LogOptions) -> anyhow::Result<()> {
    let writer = match &options.log_file {
        Some(path) => {
            let file = open_log_file(path)
                .with_context(|| format!("failed to open log file {}", path.display()))?;
            let file = Mutex::new(file);
            if options.also_log_to_stderr {
                BoxMakeWriter::new(file.and(std::io::stderr))
            } else {
                BoxMakeWriter::new(file)
            }
        }
        None => BoxMakeWriter::new(std::io::stderr),
    };

    let layer = tracing_subscriber::fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .with_target(false);

    tracing_subscriber::registry()
        .with(options.env_filter())
        .with(layer)
        .try_init()
        .context("failed to install tracing subscriber")
}

fn open_log_file(path: &std::path::Path) -> std::io::Result<File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    OpenOptions::new().create(true).append(true).open(path)
}
