//! Engine errors.
//!
//! One enum per concern. Everything reaches the caller of the operation
//! that failed; only [`FlushError`] aggregates.

use std::fmt;

use weave_descriptor::{CycleError, ResolutionError};
use weave_emit::{BackendError, EmitError};
use weave_ir::Name;

fn join(names: &[Name]) -> String {
    names
        .iter()
        .map(Name::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

/// The requested type cannot be identified (or a loaded type's identity
/// cannot be read back).
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum IdentityError {
    #[error("requested type has an empty name")]
    EmptyName,

    #[error("cannot generate a subclass of interface `{0}`")]
    Interface(Name),

    #[error("cannot generate a subclass of sealed type `{0}`")]
    Sealed(Name),

    #[error("cannot generate a subclass of open generic type `{0}`")]
    OpenGeneric(Name),

    #[error("`{0}` carries no identity attribute")]
    NotAProxy(Name),

    #[error("identity attribute on `{ty}` is malformed: {reason}")]
    MalformedAttribute { ty: Name, reason: String },

    #[error("failed to encode the identity of `{ty}`: {reason}")]
    Encode { ty: Name, reason: String },
}

/// Misuse of a context pool. Logged at `error` level when raised.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum PoolError {
    #[error("context {context} belongs to pool {owner}, not to pool {pool}")]
    ForeignContext { context: usize, owner: u64, pool: u64 },

    #[error("context {context} was returned by a scope that did not borrow it")]
    CrossScopeReturn { context: usize },

    #[error("context {context} is not currently leased")]
    NotLeased { context: usize },

    #[error("cannot take every context while this thread holds context {context}")]
    DrainWhileHolding { context: usize },

    #[error("context pool is closed")]
    Closed,
}

/// Failure reported by a participant.
#[derive(Debug, thiserror::Error)]
pub enum ParticipantError {
    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    #[error("{0}")]
    Failed(String),
}

impl ParticipantError {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AssemblyError {
    #[error(transparent)]
    Identity(#[from] IdentityError),

    #[error("participant `{participant}` failed: {source}")]
    Participant {
        participant: Name,
        #[source]
        source: ParticipantError,
    },

    #[error("participant `{participant}` made an invalid change: {source}")]
    Resolution {
        participant: Name,
        #[source]
        source: ResolutionError,
    },

    #[error(transparent)]
    Cycle(#[from] CycleError),

    #[error("failed to generate a proxy for `{requested}` (participants: {}): {source}", join(.participants))]
    Backend {
        requested: Name,
        participants: Vec<Name>,
        #[source]
        source: EmitError,
    },

    #[error(transparent)]
    Pool(#[from] PoolError),

    #[error("no usable constructor ({signature}) on `{ty}`: {reason}")]
    ConstructorNotFound {
        ty: Name,
        signature: String,
        reason: &'static str,
    },

    #[error("`{requested}` was requested while a participant holds its context's state")]
    StateHeld { requested: Name },

    #[error("proxy `{name}` is missing from its emitted batch")]
    ProxyNotEmitted { name: Name },
}

impl AssemblyError {
    /// Attribute a participant failure, keeping resolution errors distinct.
    pub(crate) fn from_participant(participant: &Name, error: ParticipantError) -> Self {
        match error {
            ParticipantError::Resolution(source) => Self::Resolution {
                participant: participant.clone(),
                source,
            },
            source @ ParticipantError::Failed(_) => Self::Participant {
                participant: participant.clone(),
                source,
            },
        }
    }
}

/// One context's failed flush.
#[derive(Debug)]
pub struct ContextFlushFailure {
    pub context: usize,
    pub source: BackendError,
}

impl fmt::Display for ContextFlushFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "context {}: {}", self.context, self.source)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FlushError {
    #[error("{} context(s) failed to flush: {}", .failures.len(), describe(.failures))]
    Contexts { failures: Vec<ContextFlushFailure> },

    #[error(transparent)]
    Pool(#[from] PoolError),
}

fn describe(failures: &[ContextFlushFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("module was generated with participant configuration `{found}`, engine uses `{expected}`")]
    ConfigurationMismatch { expected: String, found: String },

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error(transparent)]
    Identity(#[from] IdentityError),

    #[error(transparent)]
    Pool(#[from] PoolError),
}
