//! Requested type specifications.
//!
//! A [`TypeSpec`] is the flattened view of an existing type that the engine
//! generates a subclass of: its effective methods (most-derived per slot),
//! the interfaces it implements and which method implements each interface
//! method. Identity is by name; two specs with the same name describe the
//! same type.

use crate::flags::{Access, TypeFlags};
use crate::method::{CtorInfo, MethodInfo, MethodRef, MethodSig};
use crate::name::Name;

/// One entry of a type's interface map.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub struct InterfaceMapping {
    pub interface_method: MethodRef,
    pub implementation: MethodRef,
}

#[derive(Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub struct TypeSpec {
    pub name: Name,
    pub flags: TypeFlags,
    pub base: Option<Name>,
    /// Every implemented interface, including inherited ones.
    pub interfaces: Vec<Name>,
    /// Effective methods: the most-derived method for every virtual slot,
    /// plus all non-virtual methods.
    pub methods: Vec<MethodInfo>,
    pub interface_map: Vec<InterfaceMapping>,
    pub constructors: Vec<CtorInfo>,
}

impl TypeSpec {
    /// A class deriving from the root object type.
    pub fn class(name: impl Into<Name>) -> Self {
        Self {
            name: name.into(),
            flags: TypeFlags::empty(),
            base: Some(Name::new(Self::OBJECT)),
            interfaces: Vec::new(),
            methods: Vec::new(),
            interface_map: Vec::new(),
            constructors: vec![CtorInfo::default_public()],
        }
    }

    /// An interface; `methods` lists its abstract members.
    pub fn interface(name: impl Into<Name>) -> Self {
        Self {
            name: name.into(),
            flags: TypeFlags::INTERFACE | TypeFlags::ABSTRACT,
            base: None,
            interfaces: Vec::new(),
            methods: Vec::new(),
            interface_map: Vec::new(),
            constructors: Vec::new(),
        }
    }

    /// Name of the implicit root of every class hierarchy.
    pub const OBJECT: &'static str = "object";

    #[must_use]
    pub fn with_flags(mut self, flags: TypeFlags) -> Self {
        self.flags |= flags;
        self
    }

    #[must_use]
    pub fn with_base(mut self, base: impl Into<Name>) -> Self {
        self.base = Some(base.into());
        self
    }

    #[must_use]
    pub fn with_method(mut self, method: MethodInfo) -> Self {
        self.methods.push(method);
        self
    }

    /// Add an interface method declared by this interface.
    #[must_use]
    pub fn with_interface_method(self, sig: MethodSig) -> Self {
        let method = MethodInfo::interface_method(self.name.clone(), sig);
        self.with_method(method)
    }

    #[must_use]
    pub fn with_interface(mut self, interface: impl Into<Name>) -> Self {
        let interface = interface.into();
        if !self.interfaces.contains(&interface) {
            self.interfaces.push(interface);
        }
        self
    }

    /// Record that `implementation` implements `interface_method`.
    #[must_use]
    pub fn with_mapping(mut self, interface_method: MethodRef, implementation: MethodRef) -> Self {
        self = self.with_interface(interface_method.declaring.clone());
        self.interface_map.push(InterfaceMapping {
            interface_method,
            implementation,
        });
        self
    }

    /// Replace the constructor list.
    #[must_use]
    pub fn with_constructors(mut self, constructors: impl IntoIterator<Item = CtorInfo>) -> Self {
        self.constructors = constructors.into_iter().collect();
        self
    }

    #[inline]
    pub fn is_interface(&self) -> bool {
        self.flags.contains(TypeFlags::INTERFACE)
    }

    #[inline]
    pub fn is_sealed(&self) -> bool {
        self.flags.contains(TypeFlags::SEALED)
    }

    #[inline]
    pub fn is_abstract(&self) -> bool {
        self.flags.contains(TypeFlags::ABSTRACT)
    }

    #[inline]
    pub fn is_generic_definition(&self) -> bool {
        self.flags.contains(TypeFlags::GENERIC_DEFINITION)
    }

    pub fn implements(&self, interface: &Name) -> bool {
        self.interfaces.contains(interface)
    }

    /// Look up a method by its exact definition.
    pub fn find_method(&self, method: &MethodRef) -> Option<&MethodInfo> {
        self.methods
            .iter()
            .find(|m| m.declaring == method.declaring && m.sig == method.sig)
    }

    /// The effective method whose root definition is `root`.
    pub fn method_for_root(&self, root: &MethodRef) -> Option<&MethodInfo> {
        self.methods.iter().find(|m| &m.root == root)
    }

    /// The method implementing `interface_method`, per the interface map.
    pub fn implementation_of(&self, interface_method: &MethodRef) -> Option<&MethodInfo> {
        self.interface_map
            .iter()
            .find(|mapping| &mapping.interface_method == interface_method)
            .and_then(|mapping| self.find_method(&mapping.implementation))
    }

    /// Public instance methods matching `sig` exactly, as the runtime would
    /// pick for an interface newly added on a subclass.
    pub fn public_method_by_sig(&self, sig: &MethodSig) -> Option<&MethodInfo> {
        self.methods
            .iter()
            .find(|m| &m.sig == sig && m.access == Access::Public && !m.is_static())
    }

    /// Constructors a subclass can chain to.
    pub fn subclass_constructors(&self) -> impl Iterator<Item = &CtorInfo> {
        self.constructors
            .iter()
            .filter(|c| c.access.is_visible_to_subclass())
    }
}
