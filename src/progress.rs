//! Collection progress reporting.
//!
//! Progress is emitted on **stderr** so stdout remains parseable for scripts.
//! It is independent of `tracing` output: a reporter is chosen per run with
//! `--progress`, while log verbosity follows `RUST_LOG`.

use std::io::Write;

/// A single progress event during collection or building.
#[derive(Clone, Debug, PartialEq)]
pub enum ProgressEvent {
    /// Listing the catalog; the total is not known yet.
    Discovering,
    /// `n` of `total` texts fetched so far.
    Fetching { title: String, n: u64, total: u64 },
    /// `n` of `total` passages embedded.
    Embedding { n: u64, total: u64 },
}

pub trait ProgressReporter: Send + Sync {
    fn report(&self, event: ProgressEvent);
}

/// Human-friendly progress on stderr: "fetching  1,234 / 5,000 texts  Genesis".
pub struct StderrProgress;

impl ProgressReporter for StderrProgress {
    fn report(&self, event: ProgressEvent) {
        let line = match &event {
            ProgressEvent::Discovering => "catalog  discovering...\n".to_string(),
            ProgressEvent::Fetching { title, n, total } => format!(
                "fetching  {} / {} texts  {}\n",
                format_number(*n),
                format_number(*total),
                title
            ),
            ProgressEvent::Embedding { n, total } => format!(
                "embedding  {} / {} passages\n",
                format_number(*n),
                format_number(*total)
            ),
        };
        let mut err = std::io::stderr().lock();
        let _ = err.write_all(line.as_bytes());
        let _ = err.flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl ProgressReporter for JsonProgress {
    fn report(&self, event: ProgressEvent) {
        let obj = match &event {
            ProgressEvent::Discovering => serde_json::json!({
                "event": "progress",
                "phase": "discovering"
            }),
            ProgressEvent::Fetching { title, n, total } => serde_json::json!({
                "event": "progress",
                "phase": "fetching",
                "title": title,
                "n": n,
                "total": total
            }),
            ProgressEvent::Embedding { n, total } => serde_json::json!({
                "event": "progress",
                "phase": "embedding",
                "n": n,
                "total": total
            }),
        };
        if let Ok(line) = serde_json::to_string(&obj) {
            let mut err = std::io::stderr().lock();
            let _ = writeln!(err, "{}", line);
            let _ = err.flush();
        }
    }
}

pub struct NoProgress;

impl ProgressReporter for NoProgress {
    fn report(&self, _event: ProgressEvent) {}
}

fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + (s.len() - 1) / 3);
    for (i, c) in s.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result.chars().rev().collect()
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq, clap::ValueEnum)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    pub fn reporter(&self) -> Box<dyn ProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_number_comma() {
        assert_eq!(format_number(0), "0");
        assert_eq!(format_number(999), "999");
        assert_eq!(format_number(1000), "1,000");
        assert_eq!(format_number(1_234_567), "1,234,567");
    }
}
