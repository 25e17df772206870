//! Transfer output classification and rendering
//!
//! rsync's verbose output is filtered with a purely textual contract:
//!
//! - a line without a path separator is noise (headers, blank separators)
//!   and is dropped;
//! - a line containing all of [`SENT_MARKER`], [`RECEIVED_MARKER`] and
//!   [`THROUGHPUT_MARKER`] is the trailing totals line;
//! - every other surviving line names a transferred file or directory.
//!
//! File lines carry a status marker telling the initial run apart from
//! runs triggered by a change.

use std::fmt;

use colored::Colorize;

use crate::process::{RunEvent, RunStatus};
use crate::state::EditState;

pub const SENT_MARKER: &str = "sent";
pub const RECEIVED_MARKER: &str = "received";
pub const THROUGHPUT_MARKER: &str = "bytes/sec";
pub const PATH_SEPARATOR: char = '/';

/// What a surviving output line is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    /// Trailing totals line (bytes sent/received, throughput)
    Summary,
    /// A transferred file or directory
    File,
}

/// Classify one line of transfer output; `None` means discard.
pub fn classify(line: &str) -> Option<LineKind> {
    if line.is_empty() || !line.contains(PATH_SEPARATOR) {
        return None;
    }

    let is_summary = line.contains(SENT_MARKER)
        && line.contains(RECEIVED_MARKER)
        && line.contains(THROUGHPUT_MARKER);

    Some(if is_summary {
        LineKind::Summary
    } else {
        LineKind::File
    })
}

/// Split a raw output chunk into lines, without terminators
pub fn split_lines(chunk: &str) -> impl Iterator<Item = &str> {
    chunk.lines()
}

/// Prefix shown on file lines
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusMarker {
    /// Output of the initial run
    FirstRun,
    /// Output of a run triggered by a filesystem change
    ChangeTriggered,
}

impl StatusMarker {
    pub fn for_state(edit_state: &EditState) -> Self {
        if edit_state.is_edited() {
            Self::ChangeTriggered
        } else {
            Self::FirstRun
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Self::FirstRun => "✓",
            Self::ChangeTriggered => "✎",
        }
    }
}

impl fmt::Display for StatusMarker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FirstRun => write!(f, "{}", self.symbol().green()),
            Self::ChangeTriggered => write!(f, "{}", self.symbol().yellow()),
        }
    }
}

/// A line ready for the console
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderedLine {
    Summary(String),
    File { marker: StatusMarker, text: String },
    Error(String),
}

impl RenderedLine {
    /// Render `line` under the current edit state, or drop it
    pub fn from_output(line: &str, edit_state: &EditState) -> Option<Self> {
        match classify(line)? {
            LineKind::Summary => Some(Self::Summary(line.to_string())),
            LineKind::File => Some(Self::File {
                marker: StatusMarker::for_state(edit_state),
                text: line.to_string(),
            }),
        }
    }

    /// Text without any styling
    pub fn text(&self) -> &str {
        match self {
            Self::Summary(text) | Self::Error(text) => text,
            Self::File { text, .. } => text,
        }
    }
}

impl fmt::Display for RenderedLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Summary(text) => write!(f, "{}", text.blue()),
            Self::File { marker, text } => write!(f, "{} {}", marker, text),
            Self::Error(text) => write!(f, "{}", text.red()),
        }
    }
}

/// Where rendered lines end up
pub trait OutputSink: Send {
    fn emit(&mut self, line: RenderedLine);
}

/// Writes rendered lines to standard output
#[derive(Debug, Default, Clone, Copy)]
pub struct Console;

impl OutputSink for Console {
    fn emit(&mut self, line: RenderedLine) {
        println!("{}", line);
    }
}

/// Turns run events into console lines
#[derive(Debug)]
pub struct OutputPrinter<S> {
    sink: S,
    edit_state: EditState,
}

impl<S: OutputSink> OutputPrinter<S> {
    pub fn new(sink: S, edit_state: EditState) -> Self {
        Self { sink, edit_state }
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Render one event. Never fails: transfer errors become error lines.
    pub fn handle(&mut self, event: RunEvent) {
        match event {
            RunEvent::Output { chunk, .. } => {
                for line in split_lines(&chunk) {
                    if let Some(rendered) = RenderedLine::from_output(line, &self.edit_state) {
                        self.sink.emit(rendered);
                    }
                }
            }
            RunEvent::Diagnostic { chunk, .. } => {
                for line in split_lines(&chunk).filter(|l| !l.trim().is_empty()) {
                    self.sink.emit(RenderedLine::Error(line.to_string()));
                }
            }
            RunEvent::SpawnFailed { message, .. } => {
                self.sink.emit(RenderedLine::Error(message));
            }
            RunEvent::Finished { run, status } => match status {
                RunStatus::Success => tracing::debug!(%run, "Transfer completed"),
                RunStatus::Terminated => tracing::debug!(%run, "Transfer terminated"),
                RunStatus::Failed { code: Some(code) } => {
                    self.sink
                        .emit(RenderedLine::Error(format!("rsync exited with code {}", code)));
                }
                RunStatus::Failed { code: None } => {
                    self.sink
                        .emit(RenderedLine::Error("rsync was killed by a signal".to_string()));
                }
            },
        }
    }
}
