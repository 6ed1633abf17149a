//! Errors raised while shaping or ordering descriptors.

use weave_ir::{MethodRef, MethodSig, Name};

use crate::method_table::MethodId;

/// A contributor asked for an override or implementation the inherited
/// method table does not permit.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ResolutionError {
    #[error("method `{method}` is not virtual and cannot be overridden")]
    NotVirtual { method: MethodRef },

    #[error("method `{method}` is final in the base type and cannot be overridden")]
    Final { method: MethodRef },

    #[error("method `{method}` is not part of the method table of `{ty}`")]
    MethodNotFound { ty: Name, method: MethodRef },

    #[error("interface `{interface}` is not implemented by `{ty}`; add it before implementing its methods")]
    InterfaceNotImplemented { ty: Name, interface: Name },

    #[error("interface `{interface}` is already implemented by `{ty}`")]
    InterfaceAlreadyImplemented { ty: Name, interface: Name },

    #[error(
        "cannot re-implement interface method `{interface_method}`: base implementation `{base}` is not accessible"
    )]
    CannotReimplement {
        interface_method: MethodRef,
        base: MethodRef,
    },

    #[error("`{root}` is already overridden by `{existing}` in `{ty}`")]
    AlreadyOverridden {
        ty: Name,
        root: MethodRef,
        existing: Name,
    },

    #[error("method `{sig}` is already declared on `{ty}`")]
    DuplicateMethod { ty: Name, sig: MethodSig },

    #[error("`{ty}` has no added method {id}")]
    UnknownMethod { ty: Name, id: MethodId },
}

/// The batch handed to the orderer contains a dependency cycle.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("dependency cycles among in-batch type descriptors are unsupported (involving {})", join(.types))]
pub struct CycleError {
    /// Every descriptor still unsorted when no independent one remained.
    pub types: Vec<Name>,
}

fn join(names: &[Name]) -> String {
    names
        .iter()
        .map(Name::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}
