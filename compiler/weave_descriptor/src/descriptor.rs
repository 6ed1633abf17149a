//! The mutable plan for one generated type.
//!
//! A [`TypeDescriptor`] is owned by the assembly pipeline for the duration
//! of a single operation. Participants add members to it; the staged
//! emitter reads it back out. Override and implementation resolution live
//! in `resolution.rs`; this file holds the structural members and the
//! bookkeeping they share.

use std::sync::Arc;

use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;
use weave_ir::{
    Access, AttributeSpec, Body, MethodFlags, MethodRef, MethodSig, Name, TypeFlags, TypeSpec,
};

use crate::error::ResolutionError;
use crate::method_table::{MethodEntry, MethodId, MethodTable, MutableMethod};

/// A field declared by the descriptor.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldDef {
    pub name: Name,
    pub ty: Name,
    pub access: Access,
    pub is_static: bool,
}

/// A constructor declared by the descriptor.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CtorDef {
    pub params: Vec<Name>,
    pub access: Access,
    pub body: Body,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PropertyDef {
    pub name: Name,
    pub ty: Name,
    pub getter: Option<MethodId>,
    pub setter: Option<MethodId>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventDef {
    pub name: Name,
    pub handler: Name,
    pub add: MethodId,
    pub remove: MethodId,
}

/// Kind of a dependency edge between descriptors of one batch.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum EdgeKind {
    Base,
    Interface,
    Uses,
}

#[derive(Clone, Debug)]
pub struct TypeDescriptor {
    pub(crate) name: Name,
    pub(crate) flags: TypeFlags,
    pub(crate) base: Option<Name>,
    /// Flattened view of the base type, when the base is an existing type.
    pub(crate) base_spec: Option<Arc<TypeSpec>>,
    /// Interfaces added by this descriptor (inherited ones live on `base_spec`).
    pub(crate) interfaces: Vec<Name>,
    pub(crate) uses: Vec<Name>,
    pub(crate) fields: Vec<FieldDef>,
    pub(crate) constructors: Vec<CtorDef>,
    pub(crate) methods: MethodTable,
    pub(crate) properties: Vec<PropertyDef>,
    pub(crate) events: Vec<EventDef>,
    pub(crate) nested: Vec<Name>,
    pub(crate) attributes: Vec<AttributeSpec>,
    pub(crate) pending_abstract: FxHashSet<MethodRef>,
    /// Interface method -> the added method implementing it.
    pub(crate) implementations: FxHashMap<MethodRef, MethodId>,
}

impl TypeDescriptor {
    /// A descriptor for a new type deriving from an existing one.
    ///
    /// Every subclass-visible base constructor is mirrored as a constructor
    /// that forwards to it.
    pub fn subclass_of(base: Arc<TypeSpec>, name: impl Into<Name>) -> Self {
        let mut descriptor = Self::empty(name.into(), Some(base.name.clone()));
        descriptor.methods = MethodTable::from_inherited(&base.methods);
        descriptor.pending_abstract = base
            .methods
            .iter()
            .filter(|m| m.is_abstract())
            .map(|m| m.root.clone())
            .collect();
        descriptor.constructors = base
            .subclass_constructors()
            .map(|ctor| CtorDef {
                params: ctor.params.clone(),
                access: ctor.access,
                body: Body::CallBaseConstructor(ctor.params.clone()),
            })
            .collect();
        descriptor.base_spec = Some(base);
        descriptor
    }

    /// A descriptor whose base is only known by name, typically another
    /// descriptor in the same batch. Nothing is inherited into its table.
    pub fn with_base_name(name: impl Into<Name>, base: impl Into<Name>) -> Self {
        let mut descriptor = Self::empty(name.into(), Some(base.into()));
        descriptor.constructors.push(CtorDef {
            params: Vec::new(),
            access: Access::Public,
            body: Body::CallBaseConstructor(Vec::new()),
        });
        descriptor
    }

    fn empty(name: Name, base: Option<Name>) -> Self {
        Self {
            name,
            flags: TypeFlags::empty(),
            base,
            base_spec: None,
            interfaces: Vec::new(),
            uses: Vec::new(),
            fields: Vec::new(),
            constructors: Vec::new(),
            methods: MethodTable::default(),
            properties: Vec::new(),
            events: Vec::new(),
            nested: Vec::new(),
            attributes: Vec::new(),
            pending_abstract: FxHashSet::default(),
            implementations: FxHashMap::default(),
        }
    }

    // -- Accessors --

    pub fn name(&self) -> &Name {
        &self.name
    }

    pub fn base(&self) -> Option<&Name> {
        self.base.as_ref()
    }

    pub fn base_spec(&self) -> Option<&TypeSpec> {
        self.base_spec.as_deref()
    }

    /// Declared flags; `ABSTRACT` is added when methods are pending.
    pub fn flags(&self) -> TypeFlags {
        if self.is_abstract() {
            self.flags | TypeFlags::ABSTRACT
        } else {
            self.flags
        }
    }

    pub fn add_flags(&mut self, flags: TypeFlags) {
        self.flags |= flags;
    }

    pub fn interfaces(&self) -> &[Name] {
        &self.interfaces
    }

    pub fn uses_types(&self) -> &[Name] {
        &self.uses
    }

    pub fn fields(&self) -> &[FieldDef] {
        &self.fields
    }

    pub fn constructors(&self) -> &[CtorDef] {
        &self.constructors
    }

    pub fn properties(&self) -> &[PropertyDef] {
        &self.properties
    }

    pub fn events(&self) -> &[EventDef] {
        &self.events
    }

    pub fn nested_types(&self) -> &[Name] {
        &self.nested
    }

    pub fn attributes(&self) -> &[AttributeSpec] {
        &self.attributes
    }

    /// Whether the descriptor implements `interface`, through its base or directly.
    pub fn implements(&self, interface: &Name) -> bool {
        self.interfaces.contains(interface)
            || self
                .base_spec
                .as_ref()
                .is_some_and(|base| base.implements(interface))
    }

    /// Base, interface and uses-type edges, for dependency ordering.
    pub fn dependency_edges(&self) -> impl Iterator<Item = (EdgeKind, &Name)> {
        self.base
            .iter()
            .map(|b| (EdgeKind::Base, b))
            .chain(self.interfaces.iter().map(|i| (EdgeKind::Interface, i)))
            .chain(self.uses.iter().map(|u| (EdgeKind::Uses, u)))
    }

    // -- Methods table --

    /// An added method by id.
    pub fn method(&self, id: MethodId) -> Option<&MutableMethod> {
        self.methods.added(id)
    }

    /// Any arena slot by id, superseded ones included.
    pub fn method_entry(&self, id: MethodId) -> Option<&MethodEntry> {
        self.methods.get(id)
    }

    /// The effective method for a root definition.
    pub fn effective_method(&self, root: &MethodRef) -> Option<&MethodEntry> {
        self.methods.live(root).and_then(|id| self.methods.get(id))
    }

    /// Every live entry of the all-methods table, in arena order.
    pub fn all_methods(&self) -> Vec<(MethodId, &MethodEntry)> {
        self.methods.live_entries()
    }

    /// Methods declared by this descriptor, in the order they were added.
    pub fn added_methods(&self) -> impl Iterator<Item = (MethodId, &MutableMethod)> {
        self.methods.added_entries()
    }

    /// Root definitions (and interface methods) currently lacking a body.
    pub fn pending_abstract(&self) -> &FxHashSet<MethodRef> {
        &self.pending_abstract
    }

    /// Structurally abstract: some covered method has no body.
    pub fn is_abstract(&self) -> bool {
        !self.pending_abstract.is_empty()
    }

    // -- Structural members --

    pub fn add_field(&mut self, name: impl Into<Name>, ty: impl Into<Name>, access: Access) {
        self.fields.push(FieldDef {
            name: name.into(),
            ty: ty.into(),
            access,
            is_static: false,
        });
    }

    pub fn add_static_field(&mut self, name: impl Into<Name>, ty: impl Into<Name>, access: Access) {
        self.fields.push(FieldDef {
            name: name.into(),
            ty: ty.into(),
            access,
            is_static: true,
        });
    }

    pub fn add_constructor(&mut self, params: Vec<Name>, access: Access, body: Body) {
        self.constructors.push(CtorDef {
            params,
            access,
            body,
        });
    }

    /// Declare a brand-new method. Without a body it is abstract until one
    /// is supplied through [`set_body`](Self::set_body).
    pub fn add_method(
        &mut self,
        sig: MethodSig,
        flags: MethodFlags,
        access: Access,
        body: Option<Body>,
    ) -> Result<MethodId, ResolutionError> {
        self.ensure_not_declared(&sig)?;
        let root = MethodRef::new(self.name.clone(), sig.clone());
        let method = MutableMethod {
            declaring: self.name.clone(),
            sig,
            flags: flags - MethodFlags::ABSTRACT,
            access,
            root: root.clone(),
            base_method: None,
            explicit_base_definitions: SmallVec::new(),
            interface_methods: SmallVec::new(),
            previous_body: None,
            body,
        };
        Ok(self.insert_method(root, method))
    }

    /// Replace (or clear) a method's body.
    pub fn set_body(&mut self, id: MethodId, body: Option<Body>) -> Result<(), ResolutionError> {
        let name = self.name.clone();
        let method = self
            .methods
            .added_mut(id)
            .ok_or(ResolutionError::UnknownMethod { ty: name, id })?;
        method.body = body;
        self.refresh_abstractness(id);
        Ok(())
    }

    pub fn add_property(
        &mut self,
        name: impl Into<Name>,
        ty: impl Into<Name>,
        getter: Option<MethodId>,
        setter: Option<MethodId>,
    ) -> Result<(), ResolutionError> {
        for id in getter.iter().chain(setter.iter()) {
            self.require_added(*id)?;
        }
        self.properties.push(PropertyDef {
            name: name.into(),
            ty: ty.into(),
            getter,
            setter,
        });
        Ok(())
    }

    pub fn add_event(
        &mut self,
        name: impl Into<Name>,
        handler: impl Into<Name>,
        add: MethodId,
        remove: MethodId,
    ) -> Result<(), ResolutionError> {
        self.require_added(add)?;
        self.require_added(remove)?;
        self.events.push(EventDef {
            name: name.into(),
            handler: handler.into(),
            add,
            remove,
        });
        Ok(())
    }

    /// Implement an additional interface. Its methods still have to be
    /// provided through `get_or_add_implementation`.
    pub fn add_interface(&mut self, interface: impl Into<Name>) -> Result<(), ResolutionError> {
        let interface = interface.into();
        if self.implements(&interface) {
            return Err(ResolutionError::InterfaceAlreadyImplemented {
                ty: self.name.clone(),
                interface,
            });
        }
        self.interfaces.push(interface);
        Ok(())
    }

    /// Record that a nested type (emitted as its own descriptor) belongs here.
    pub fn add_nested_type(&mut self, name: impl Into<Name>) -> Name {
        let nested = self.name.qualify(&name.into());
        self.nested.push(nested.clone());
        nested
    }

    pub fn add_attribute(&mut self, attribute: AttributeSpec) {
        self.attributes.push(attribute);
    }

    /// Declare that this type must be emitted after `ty` when both are in
    /// the same batch.
    pub fn add_uses_type(&mut self, ty: impl Into<Name>) {
        let ty = ty.into();
        if !self.uses.contains(&ty) {
            self.uses.push(ty);
        }
    }

    // -- Shared bookkeeping --

    pub(crate) fn require_added(&self, id: MethodId) -> Result<&MutableMethod, ResolutionError> {
        self.methods.added(id).ok_or(ResolutionError::UnknownMethod {
            ty: self.name.clone(),
            id,
        })
    }

    pub(crate) fn ensure_not_declared(&self, sig: &MethodSig) -> Result<(), ResolutionError> {
        if self.methods.added_entries().any(|(_, m)| &m.sig == sig) {
            return Err(ResolutionError::DuplicateMethod {
                ty: self.name.clone(),
                sig: sig.clone(),
            });
        }
        Ok(())
    }

    /// Push a new added method, index it under `root` and refresh the
    /// pending-abstract set for it.
    pub(crate) fn insert_method(&mut self, root: MethodRef, method: MutableMethod) -> MethodId {
        let id = self.methods.push(MethodEntry::Added(method));
        if let Some(previous) = self.methods.index(root.clone(), id) {
            tracing::trace!(ty = %self.name, %root, ?previous, new = ?id, "superseded method slot");
        }
        self.refresh_abstractness(id);
        id
    }

    /// Recompute pending-abstract membership for every root `id` covers.
    ///
    /// Runs synchronously after every body change and every change to the
    /// roots a method covers; readers of `is_abstract` never re-derive.
    pub(crate) fn refresh_abstractness(&mut self, id: MethodId) {
        let Some(method) = self.methods.added(id) else {
            return;
        };
        let bodyless = method.is_abstract();
        for root in method.covered_roots() {
            if bodyless {
                self.pending_abstract.insert(root);
            } else {
                self.pending_abstract.remove(&root);
            }
        }
    }
}
