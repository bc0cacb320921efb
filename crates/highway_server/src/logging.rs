//! Logging setup: `tracing-subscriber` with an env filter and a text or JSON
//! formatter writing to stdout, stderr or an append-only file.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

use crate::config::{LogConfig, LogFormat, LogOutput};

/// Flushes the log sink on teardown.
#[derive(Debug)]
pub struct LoggingGuard {
    sink: Sink,
}

#[derive(Debug)]
enum Sink {
    Stdout,
    Stderr,
    File(Arc<File>),
}

impl LoggingGuard {
    pub fn flush(&self) -> std::io::Result<()> {
        match &self.sink {
            Sink::Stdout => std::io::stdout().flush(),
            Sink::Stderr => std::io::stderr().flush(),
            Sink::File(f) => {
                let mut file: &File = f;
                file.flush()?;
                file.sync_data()
            }
        }
    }
}

fn open_sink(config: &LogConfig) -> Result<Sink> {
    Ok(match config.output {
        LogOutput::Stdout => Sink::Stdout,
        LogOutput::Stderr => Sink::Stderr,
        LogOutput::File => {
            let path = config
                .output_file
                .as_ref()
                .context("log.output = \"file\" requires log.output_file")?;
            if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
                std::fs::create_dir_all(dir)
                    .with_context(|| format!("Failed to create {}", dir.display()))?;
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open {}", path.display()))?;
            Sink::File(Arc::new(file))
        }
    })
}

/// `RUST_LOG` wins over the configured level when set.
pub fn env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
}

/// Install the global subscriber. If one is already installed (tests that
/// boot the app more than once) the existing one is kept.
pub fn init(config: &LogConfig) -> Result<LoggingGuard> {
    let sink = open_sink(config)?;
    let writer = match &sink {
        Sink::Stdout => BoxMakeWriter::new(std::io::stdout),
        Sink::Stderr => BoxMakeWriter::new(std::io::stderr),
        Sink::File(f) => BoxMakeWriter::new(Arc::clone(f)),
    };
    let ansi = matches!(sink, Sink::Stdout | Sink::Stderr);

    let layer = match config.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(false)
            .with_writer(writer)
            .boxed(),
        LogFormat::Text => fmt::layer().with_ansi(ansi).with_writer(writer).boxed(),
    };

    if tracing_subscriber::registry()
        .with(layer)
        .with(env_filter(&config.level))
        .try_init()
        .is_err()
    {
        tracing::debug!("Global subscriber already installed, keeping it");
    }
    Ok(LoggingGuard { sink })
}
