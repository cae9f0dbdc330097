//! Events pushed from running scripts to subscribers.

use bytes::Bytes;
use serde::{Serialize, Serializer};

/// Which output pipe a chunk was read from.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum StreamKind {
    /// Child standard output.
    Stdout,
    /// Child standard error.
    Stderr,
}

impl StreamKind {
    /// Wire name of the stream (`stdout` / `stderr`).
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Stdout => "stdout",
            Self::Stderr => "stderr",
        }
    }
}

/// One chunk of output, exactly as read from the OS pipe.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct OutputEvent {
    /// Script identifier the chunk belongs to.
    #[serde(rename = "script")]
    pub identifier: String,
    /// Run that produced the chunk.
    pub run: u64,
    /// Originating pipe.
    #[serde(rename = "type")]
    pub stream: StreamKind,
    /// Raw chunk bytes; serialised as lossy UTF-8 text.
    #[serde(rename = "data", serialize_with = "serialize_lossy")]
    pub payload: Bytes,
}

impl OutputEvent {
    /// Chunk payload decoded as (lossy) UTF-8.
    #[must_use]
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.payload).into_owned()
    }
}

/// Terminal event for a single run.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ExitEvent {
    /// Script identifier that exited.
    #[serde(rename = "script")]
    pub identifier: String,
    /// Run that exited.
    pub run: u64,
    /// Exit code; `None` when the process was terminated by a signal.
    pub code: Option<i32>,
}

/// Everything the broadcaster delivers.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum ScriptEvent {
    /// A stdout/stderr chunk.
    ScriptOutput(OutputEvent),
    /// The process exited; always the last event of its run.
    ScriptExit(ExitEvent),
}

impl ScriptEvent {
    /// Script identifier this event belongs to.
    #[must_use]
    pub fn identifier(&self) -> &str {
        match self {
            Self::ScriptOutput(ev) => &ev.identifier,
            Self::ScriptExit(ev) => &ev.identifier,
        }
    }

    /// Run this event belongs to.
    #[must_use]
    pub fn run(&self) -> u64 {
        match self {
            Self::ScriptOutput(ev) => ev.run,
            Self::ScriptExit(ev) => ev.run,
        }
    }
}

fn serialize_lossy<S>(payload: &Bytes, serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&String::from_utf8_lossy(payload))
}
