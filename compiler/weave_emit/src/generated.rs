//! Handles to finalized types.
//!
//! A [`TypeImage`] is what a backend finalized: every member with type
//! references resolved to names. [`GeneratedType`] wraps an image in a
//! cheaply clonable handle whose identity is its handle id, not its
//! content: two builds of the same image are two different types.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use weave_ir::{Access, AttributeSpec, Body, MethodFlags, MethodRef, MethodSig, Name, TypeFlags};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldImage {
    pub name: Name,
    pub ty: Name,
    pub access: Access,
    pub is_static: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CtorImage {
    pub params: Vec<Name>,
    pub access: Access,
    pub body: Body,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodImage {
    pub sig: MethodSig,
    pub flags: MethodFlags,
    pub access: Access,
    pub body: Option<Body>,
    /// The inherited method this one overrides through its slot.
    pub base_method: Option<MethodRef>,
    /// Interface methods this method implements, explicitly or by name.
    pub interface_methods: Vec<MethodRef>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyImage {
    pub name: Name,
    pub ty: Name,
    pub getter: Option<MethodSig>,
    pub setter: Option<MethodSig>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventImage {
    pub name: Name,
    pub handler: Name,
    pub add: MethodSig,
    pub remove: MethodSig,
}

/// A method-impl: `method` (declared on this type) overrides `overrides`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverrideImage {
    pub method: MethodSig,
    pub overrides: MethodRef,
}

/// The complete, resolved shape of one finalized type.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeImage {
    pub name: Name,
    pub base: Option<Name>,
    pub interfaces: Vec<Name>,
    pub flags: TypeFlags,
    pub attributes: Vec<AttributeSpec>,
    pub fields: Vec<FieldImage>,
    pub constructors: Vec<CtorImage>,
    pub methods: Vec<MethodImage>,
    pub properties: Vec<PropertyImage>,
    pub events: Vec<EventImage>,
    pub explicit_overrides: Vec<OverrideImage>,
}

impl TypeImage {
    pub fn new(name: impl Into<Name>) -> Self {
        Self {
            name: name.into(),
            base: None,
            interfaces: Vec::new(),
            flags: TypeFlags::empty(),
            attributes: Vec::new(),
            fields: Vec::new(),
            constructors: Vec::new(),
            methods: Vec::new(),
            properties: Vec::new(),
            events: Vec::new(),
            explicit_overrides: Vec::new(),
        }
    }

    #[inline]
    pub fn is_abstract(&self) -> bool {
        self.flags.contains(TypeFlags::ABSTRACT)
    }

    /// The first attribute of type `ty`.
    pub fn attribute(&self, ty: &str) -> Option<&AttributeSpec> {
        self.attributes.iter().find(|a| a.ty.as_str() == ty)
    }

    /// The first method named `name`.
    pub fn method(&self, name: &str) -> Option<&MethodImage> {
        self.methods.iter().find(|m| m.sig.name.as_str() == name)
    }

    /// The constructor taking exactly `params`.
    pub fn constructor(&self, params: &[Name]) -> Option<&CtorImage> {
        self.constructors.iter().find(|c| c.params == params)
    }
}

static NEXT_HANDLE: AtomicU64 = AtomicU64::new(1);

/// An immutable handle to a finalized type.
#[derive(Clone)]
pub struct GeneratedType {
    id: u64,
    image: Arc<TypeImage>,
}

impl GeneratedType {
    /// Wrap `image` in a handle with a fresh id.
    pub fn new(image: TypeImage) -> Self {
        Self {
            id: NEXT_HANDLE.fetch_add(1, Ordering::Relaxed),
            image: Arc::new(image),
        }
    }

    #[inline]
    pub fn id(&self) -> u64 {
        self.id
    }

    #[inline]
    pub fn name(&self) -> &Name {
        &self.image.name
    }

    #[inline]
    pub fn image(&self) -> &TypeImage {
        &self.image
    }

    #[inline]
    pub fn is_abstract(&self) -> bool {
        self.image.is_abstract()
    }
}

impl PartialEq for GeneratedType {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for GeneratedType {}

impl Hash for GeneratedType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for GeneratedType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GeneratedType({} #{})", self.image.name, self.id)
    }
}
