//! Method and constructor specifications.
//!
//! A [`MethodRef`] identifies a method definition by its declaring type and
//! signature; no type may declare two methods with the same signature, so
//! the pair is unique. [`MethodInfo`] adds the modifiers and the link to the
//! method's root definition that override resolution keys on.

use std::fmt;

use smallvec::SmallVec;

use crate::flags::{Access, MethodFlags};
use crate::name::Name;

/// Name plus parameter and return type names.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub struct MethodSig {
    pub name: Name,
    pub params: Vec<Name>,
    pub ret: Name,
}

impl MethodSig {
    pub fn new(
        name: impl Into<Name>,
        params: impl IntoIterator<Item = impl Into<Name>>,
        ret: impl Into<Name>,
    ) -> Self {
        Self {
            name: name.into(),
            params: params.into_iter().map(Into::into).collect(),
            ret: ret.into(),
        }
    }

    /// The same parameter and return types under a different name.
    #[must_use]
    pub fn renamed(&self, name: Name) -> Self {
        Self {
            name,
            params: self.params.clone(),
            ret: self.ret.clone(),
        }
    }

    /// Parameter and return types match, ignoring the name.
    pub fn same_shape(&self, other: &Self) -> bool {
        self.params == other.params && self.ret == other.ret
    }
}

impl fmt::Display for MethodSig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.name)?;
        for (i, param) in self.params.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{param}")?;
        }
        write!(f, ") -> {}", self.ret)
    }
}

/// Identity of one method definition.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub struct MethodRef {
    pub declaring: Name,
    pub sig: MethodSig,
}

impl MethodRef {
    pub fn new(declaring: impl Into<Name>, sig: MethodSig) -> Self {
        Self {
            declaring: declaring.into(),
            sig,
        }
    }

    #[inline]
    pub fn name(&self) -> &Name {
        &self.sig.name
    }
}

impl fmt::Display for MethodRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.declaring, self.sig)
    }
}

/// A method as seen on a requested type.
///
/// `root` is the topmost definition in the override chain. A method that
/// introduces its own slot (or is not virtual at all) is its own root.
#[derive(Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub struct MethodInfo {
    pub declaring: Name,
    pub sig: MethodSig,
    pub flags: MethodFlags,
    pub access: Access,
    pub root: MethodRef,
    /// Interface methods this method implements explicitly (method-impls).
    pub explicit_impls: SmallVec<[MethodRef; 1]>,
}

impl MethodInfo {
    /// A public, non-virtual instance method that is its own root.
    pub fn new(declaring: impl Into<Name>, sig: MethodSig) -> Self {
        let declaring = declaring.into();
        let root = MethodRef::new(declaring.clone(), sig.clone());
        Self {
            declaring,
            sig,
            flags: MethodFlags::empty(),
            access: Access::Public,
            root,
            explicit_impls: SmallVec::new(),
        }
    }

    /// A public virtual method introducing its own slot.
    pub fn virtual_method(declaring: impl Into<Name>, sig: MethodSig) -> Self {
        Self::new(declaring, sig).with_flags(MethodFlags::VIRTUAL)
    }

    /// A public abstract virtual method.
    pub fn abstract_method(declaring: impl Into<Name>, sig: MethodSig) -> Self {
        Self::new(declaring, sig).with_flags(MethodFlags::VIRTUAL | MethodFlags::ABSTRACT)
    }

    /// A method declared by an interface (always abstract and virtual).
    pub fn interface_method(interface: impl Into<Name>, sig: MethodSig) -> Self {
        Self::abstract_method(interface, sig)
    }

    #[must_use]
    pub fn with_flags(mut self, flags: MethodFlags) -> Self {
        self.flags = flags;
        self
    }

    #[must_use]
    pub fn with_access(mut self, access: Access) -> Self {
        self.access = access;
        self
    }

    /// Mark this method as an override whose root definition is `root`.
    #[must_use]
    pub fn overriding(mut self, root: MethodRef) -> Self {
        self.root = root;
        self
    }

    /// Mark this method as an explicit implementation of `interface_method`.
    #[must_use]
    pub fn implementing_explicitly(mut self, interface_method: MethodRef) -> Self {
        self.explicit_impls.push(interface_method);
        self
    }

    pub fn method_ref(&self) -> MethodRef {
        MethodRef::new(self.declaring.clone(), self.sig.clone())
    }

    #[inline]
    pub fn name(&self) -> &Name {
        &self.sig.name
    }

    #[inline]
    pub fn is_virtual(&self) -> bool {
        self.flags.contains(MethodFlags::VIRTUAL)
    }

    #[inline]
    pub fn is_final(&self) -> bool {
        self.flags.contains(MethodFlags::FINAL)
    }

    #[inline]
    pub fn is_abstract(&self) -> bool {
        self.flags.contains(MethodFlags::ABSTRACT)
    }

    #[inline]
    pub fn is_static(&self) -> bool {
        self.flags.contains(MethodFlags::STATIC)
    }

    /// Explicit implementations are private and only reachable through the
    /// interface, so nothing else can reuse them by name.
    #[inline]
    pub fn is_explicit_implementation(&self) -> bool {
        !self.explicit_impls.is_empty()
    }

    /// Whether this method is the root of its own override chain.
    pub fn is_root(&self) -> bool {
        self.root.declaring == self.declaring && self.root.sig == self.sig
    }
}

/// A constructor on a requested type.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub struct CtorInfo {
    pub params: Vec<Name>,
    pub access: Access,
}

impl CtorInfo {
    pub fn new(params: impl IntoIterator<Item = impl Into<Name>>, access: Access) -> Self {
        Self {
            params: params.into_iter().map(Into::into).collect(),
            access,
        }
    }

    /// A public parameterless constructor.
    pub fn default_public() -> Self {
        Self {
            params: Vec::new(),
            access: Access::Public,
        }
    }
}
