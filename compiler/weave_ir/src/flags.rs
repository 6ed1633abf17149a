//! Method and type attribute flags.
//!
//! These mirror the handful of modifiers the resolution algorithm cares
//! about. Everything else about a member (calling convention, custom
//! modifiers) is the backend's business.

use bitflags::bitflags;

bitflags! {
    /// Modifiers of a method definition.
    #[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
    #[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
    pub struct MethodFlags: u16 {
        /// Dispatched through a virtual slot.
        const VIRTUAL = 1 << 0;
        /// Virtual, but may not be overridden further (`sealed`).
        const FINAL = 1 << 1;
        /// Has no body; a concrete subtype must supply one.
        const ABSTRACT = 1 << 2;
        /// Not bound to an instance.
        const STATIC = 1 << 3;
        /// Introduces a fresh virtual slot instead of reusing the base's.
        const NEW_SLOT = 1 << 4;
        /// Accessor or other compiler-recognized method.
        const SPECIAL_NAME = 1 << 5;
    }
}

impl MethodFlags {
    /// Virtual and not final: the only state `get_or_add_override` accepts.
    #[inline]
    pub fn is_overridable(self) -> bool {
        self.contains(Self::VIRTUAL) && !self.contains(Self::FINAL)
    }
}

bitflags! {
    /// Modifiers of a type definition.
    #[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
    #[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
    pub struct TypeFlags: u16 {
        /// Cannot be subclassed.
        const SEALED = 1 << 0;
        /// Cannot be instantiated directly.
        const ABSTRACT = 1 << 1;
        /// An interface contract rather than a class.
        const INTERFACE = 1 << 2;
        /// An open generic definition (unbound type parameters).
        const GENERIC_DEFINITION = 1 << 3;
    }
}

/// Member accessibility.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub enum Access {
    #[default]
    Public,
    Protected,
    ProtectedInternal,
    Internal,
    Private,
}

impl Access {
    /// Whether a subclass generated outside the declaring unit can see
    /// (and therefore call or override) a member with this access.
    #[inline]
    pub const fn is_visible_to_subclass(self) -> bool {
        matches!(self, Self::Public | Self::Protected | Self::ProtectedInternal)
    }

    /// Whether the member is callable by arbitrary code.
    #[inline]
    pub const fn is_public(self) -> bool {
        matches!(self, Self::Public)
    }
}
