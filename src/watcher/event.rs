//! Change events and the operation bitmask used to filter them.

use std::path::PathBuf;

use bitflags::bitflags;
use notify::EventKind;
use notify::event::{ModifyKind, RenameMode};

bitflags! {
    /// File system operation kinds.
    ///
    /// Handlers register with a combination of these, e.g.
    /// `Op::CREATE | Op::WRITE`. A handler fires for an event when its mask
    /// contains the event's operation.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Op: u32 {
        const CREATE = 1 << 0;
        const WRITE = 1 << 1;
        const REMOVE = 1 << 2;
        const RENAME = 1 << 3;
        const CHMOD = 1 << 4;
    }
}

impl Op {
    /// Translate a notify event kind into a single operation.
    ///
    /// A file moved into a watched directory counts as a creation, the old
    /// name as a rename. The paired `RenameMode::Both` summary repeats what
    /// the `From`/`To` halves already reported and is dropped, as are access
    /// events and unclassified kinds.
    pub fn from_kind(kind: &EventKind) -> Option<Self> {
        match kind {
            EventKind::Create(_) => Some(Op::CREATE),
            EventKind::Modify(ModifyKind::Name(RenameMode::To)) => Some(Op::CREATE),
            EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => None,
            EventKind::Modify(ModifyKind::Name(_)) => Some(Op::RENAME),
            EventKind::Modify(ModifyKind::Metadata(_)) => Some(Op::CHMOD),
            EventKind::Modify(_) => Some(Op::WRITE),
            EventKind::Remove(_) => Some(Op::REMOVE),
            EventKind::Access(_) | EventKind::Any | EventKind::Other => None,
        }
    }
}

/// A single (path, operation) notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub path: PathBuf,
    pub op: Op,
}

impl ChangeEvent {
    pub fn new(path: impl Into<PathBuf>, op: Op) -> Self {
        Self {
            path: path.into(),
            op,
        }
    }

    /// Synthetic creation event for a file found during startup replay.
    pub fn created(path: impl Into<PathBuf>) -> Self {
        Self::new(path, Op::CREATE)
    }

    /// Check whether a handler registered with `mask` should see this event.
    pub fn matches(&self, mask: Op) -> bool {
        mask.contains(self.op)
    }

    /// Split a notify event into one change event per affected path.
    pub fn from_notify(event: notify::Event) -> Vec<Self> {
        let Some(op) = Op::from_kind(&event.kind) else {
            return Vec::new();
        };

        event
            .paths
            .into_iter()
            .map(|path| Self::new(path, op))
            .collect()
    }
}
