//! Emission errors.

use std::fmt;
use std::path::PathBuf;

use weave_descriptor::CycleError;
use weave_ir::Name;

use crate::backend::{SlotHandle, SlotState};

/// A failure reported by an [`EmitBackend`](crate::EmitBackend) or
/// [`CodeGenerator`](crate::CodeGenerator).
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("a type named `{name}` is already declared in this module")]
    DuplicateName { name: Name },

    #[error("module `{module}` has no slot handles left")]
    SlotsExhausted { module: Name },

    #[error("slot {slot} was never declared")]
    UnknownSlot { slot: SlotHandle },

    #[error("cannot {operation} `{name}`: slot is {state}")]
    InvalidSlotState {
        name: Name,
        state: SlotState,
        operation: &'static str,
    },

    #[error("cannot finalize `{name}`: its base `{base}` was discarded")]
    DiscardedBase { name: Name, base: Name },

    #[error("flush of module `{module}` failed: {reason}")]
    FlushRejected { module: Name, reason: String },

    #[error("I/O error on `{}`: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode module: {0}")]
    Encode(#[source] bincode::Error),

    #[error("failed to decode module `{}`: {source}", path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: bincode::Error,
    },

    #[error("module `{}` has format version {found}, expected {expected}", path.display())]
    FormatVersion {
        path: PathBuf,
        found: u32,
        expected: u32,
    },
}

/// The emission phase a failure happened in.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Phase {
    Declare,
    Define,
    Finalize,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Declare => "declare",
            Self::Define => "define",
            Self::Finalize => "finalize",
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EmitError {
    #[error(transparent)]
    Cycle(#[from] CycleError),

    #[error("{phase} of `{type_name}` failed: {source}")]
    Backend {
        phase: Phase,
        type_name: Name,
        #[source]
        source: BackendError,
    },
}
