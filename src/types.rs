//! Shared value types: host handles, recorded patches, pass results and options
use crate::errors::ReconcilerError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Non-owning handle to a node living in a [`Host`](crate::host::Host).
///
/// Handles are issued by the host and only mean something to the host that
/// issued them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HostId(u64);

impl HostId {
    pub const fn new(raw: u64) -> Self {
        HostId(raw)
    }

    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for HostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node-{}", self.0)
    }
}

/// Which of the two sibling lists an anomaly was found in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListSide {
    Old,
    New,
}

impl fmt::Display for ListSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ListSide::Old => f.write_str("old"),
            ListSide::New => f.write_str("new"),
        }
    }
}

/// Patch action enum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PatchAction {
    Insert,
    Move,
    Remove,
    Replace,
    SetAttribute,
    RemoveAttribute,
    SetText,
}

impl PatchAction {
    pub const ALL: [PatchAction; 7] = [
        PatchAction::Insert,
        PatchAction::Move,
        PatchAction::Remove,
        PatchAction::Replace,
        PatchAction::SetAttribute,
        PatchAction::RemoveAttribute,
        PatchAction::SetText,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            PatchAction::Insert => "INSERT",
            PatchAction::Move => "MOVE",
            PatchAction::Remove => "REMOVE",
            PatchAction::Replace => "REPLACE",
            PatchAction::SetAttribute => "SET_ATTRIBUTE",
            PatchAction::RemoveAttribute => "REMOVE_ATTRIBUTE",
            PatchAction::SetText => "SET_TEXT",
        }
    }
}

impl fmt::Display for PatchAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One host mutation visible from the document root.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Patch {
    pub action: PatchAction,
    pub target: HostId,
    pub data: serde_json::Value,
}

/// Counters for the reconciler-level decisions taken during one pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileStats {
    /// Nodes patched in place (identity matched).
    pub patched: usize,
    /// Subtrees rendered fresh, counted once per subtree root.
    pub renders: usize,
    pub moves: usize,
    pub removals: usize,
    pub replacements: usize,
    pub attribute_writes: usize,
    pub attribute_removals: usize,
    pub text_writes: usize,
}

impl ReconcileStats {
    /// True when the pass left the host tree untouched.
    pub fn is_noop(&self) -> bool {
        ReconcileStats {
            patched: self.patched,
            ..ReconcileStats::default()
        } == *self
    }
}

/// A recoverable irregularity found during a pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Anomaly {
    /// Two siblings share a key; the later one was treated as unmatched.
    DuplicateKey { key: String, list: ListSide },
}

/// Complete reconciliation result
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReconciliationResult {
    pub stats: ReconcileStats,
    pub anomalies: Vec<Anomaly>,
}

/// What to do when a sibling list carries the same key twice.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DuplicateKeyPolicy {
    /// Log, record an [`Anomaly`] and treat the duplicate as a new node.
    #[default]
    Warn,
    /// Abort the pass with [`ReconcilerError::DuplicateKey`].
    Reject,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReconcileOptions {
    pub duplicate_keys: DuplicateKeyPolicy,
    /// Clear old children when a node switches between a children list,
    /// text content and no content at all.
    pub clear_stale_children: bool,
}

impl Default for ReconcileOptions {
    fn default() -> Self {
        ReconcileOptions {
            duplicate_keys: DuplicateKeyPolicy::Warn,
            clear_stale_children: true,
        }
    }
}

impl ReconcileOptions {
    pub fn from_json_str(s: &str) -> Result<Self, ReconcilerError> {
        Ok(serde_json::from_str(s)?)
    }
}
