//! The emission backend contract.
//!
//! A backend materializes types in three calls per type: reserve a slot
//! under a name, fill it, seal it. Slots of one batch are all declared
//! before any is filled, so a header or member may name any slot of the
//! batch regardless of the order they are filled in.

use std::fmt;
use std::path::PathBuf;

use weave_ir::{Access, AttributeSpec, Body, Name, TypeFlags};

use crate::error::BackendError;
use crate::generated::{EventImage, GeneratedType, MethodImage, OverrideImage, PropertyImage};

/// A reserved, not yet finalized type in a backend.
#[derive(Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord, Debug)]
#[repr(transparent)]
pub struct SlotHandle(u32);

impl SlotHandle {
    #[inline]
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Handle for the slot at `index`, or `None` past the last
    /// representable slot.
    pub fn from_index(index: usize) -> Option<Self> {
        u32::try_from(index).ok().map(Self)
    }
}

impl fmt::Display for SlotHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.0)
    }
}

/// Lifecycle of a slot inside a backend.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SlotState {
    Declared,
    Defined,
    Finalized,
    Discarded,
}

impl fmt::Display for SlotState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Declared => "declared",
            Self::Defined => "defined",
            Self::Finalized => "finalized",
            Self::Discarded => "discarded",
        })
    }
}

/// A type reference: a slot of the current batch, or an existing type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TypeRef {
    Slot(SlotHandle),
    External(Name),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TypeHeader {
    pub base: Option<TypeRef>,
    pub interfaces: Vec<TypeRef>,
    pub flags: TypeFlags,
}

/// One member handed to [`EmitBackend::define_member`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MemberSpec {
    Attribute(AttributeSpec),
    Field {
        name: Name,
        ty: TypeRef,
        access: Access,
        is_static: bool,
    },
    Constructor {
        params: Vec<Name>,
        access: Access,
        body: Body,
    },
    Method(MethodImage),
    Property(PropertyImage),
    Event(EventImage),
    ExplicitOverride(OverrideImage),
}

impl MemberSpec {
    /// Short kind name, for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Attribute(_) => "attribute",
            Self::Field { .. } => "field",
            Self::Constructor { .. } => "constructor",
            Self::Method(_) => "method",
            Self::Property(_) => "property",
            Self::Event(_) => "event",
            Self::ExplicitOverride(_) => "explicit override",
        }
    }
}

/// Target of staged emission.
pub trait EmitBackend {
    /// Reserve a slot for a type named `name`.
    fn declare_slot(&mut self, name: &Name) -> Result<SlotHandle, BackendError>;

    /// Set base, interfaces and flags. Must precede any member.
    fn define_header(&mut self, slot: SlotHandle, header: TypeHeader) -> Result<(), BackendError>;

    fn define_member(&mut self, slot: SlotHandle, member: MemberSpec) -> Result<(), BackendError>;

    /// Seal the slot and hand out the finished type.
    fn finalize(&mut self, slot: SlotHandle) -> Result<GeneratedType, BackendError>;

    /// Drop a slot in any state, finalized included. Never fails; unknown
    /// slots are ignored.
    fn discard(&mut self, slot: SlotHandle);
}

/// A backend that also owns durable output.
pub trait CodeGenerator: EmitBackend + Send {
    /// Whether anything was finalized since the last successful flush.
    fn has_unflushed(&self) -> bool;

    /// Persist everything finalized since the last flush. Returns where it
    /// went, or `None` when there was nothing new.
    fn flush(&mut self) -> Result<Option<PathBuf>, BackendError>;
}
