//! The all-methods table of a descriptor.
//!
//! Storage is an append-only arena of method slots plus a live index from
//! root definition to slot. Replacing the effective method of a root pushes
//! a new slot and repoints the index; the superseded slot stays in the arena
//! (so any `MethodId` captured earlier still resolves) but is no longer
//! reachable through the index.

use std::fmt;

use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use weave_ir::{Access, Body, MethodFlags, MethodInfo, MethodRef, MethodSig, Name};

/// Index of a slot in a descriptor's method arena.
#[derive(Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord, Debug)]
#[repr(transparent)]
pub struct MethodId(usize);

impl MethodId {
    /// Create an id from a raw arena index.
    #[inline]
    pub const fn from_raw(raw: usize) -> Self {
        Self(raw)
    }

    #[inline]
    pub const fn raw(self) -> usize {
        self.0
    }

    #[inline]
    const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for MethodId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A method declared by the descriptor itself.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MutableMethod {
    pub(crate) declaring: Name,
    pub(crate) sig: MethodSig,
    pub(crate) flags: MethodFlags,
    pub(crate) access: Access,
    /// Root definition this method is indexed under.
    pub(crate) root: MethodRef,
    /// The inherited method this one overrides, if any.
    pub(crate) base_method: Option<MethodRef>,
    /// Roots overridden through explicit method-impls, including explicit
    /// interface implementations.
    pub(crate) explicit_base_definitions: SmallVec<[MethodRef; 1]>,
    /// Every interface method this method implements, explicitly or not.
    pub(crate) interface_methods: SmallVec<[MethodRef; 1]>,
    pub(crate) previous_body: Option<Body>,
    pub(crate) body: Option<Body>,
}

impl MutableMethod {
    pub fn declaring(&self) -> &Name {
        &self.declaring
    }

    pub fn name(&self) -> &Name {
        &self.sig.name
    }

    pub fn sig(&self) -> &MethodSig {
        &self.sig
    }

    pub fn access(&self) -> Access {
        self.access
    }

    /// Declared modifiers, with `ABSTRACT` derived from the current body.
    pub fn flags(&self) -> MethodFlags {
        if self.body.is_none() {
            self.flags | MethodFlags::ABSTRACT
        } else {
            self.flags - MethodFlags::ABSTRACT
        }
    }

    pub fn root(&self) -> &MethodRef {
        &self.root
    }

    pub fn base_method(&self) -> Option<&MethodRef> {
        self.base_method.as_ref()
    }

    pub fn explicit_base_definitions(&self) -> &[MethodRef] {
        &self.explicit_base_definitions
    }

    pub fn interface_methods(&self) -> &[MethodRef] {
        &self.interface_methods
    }

    /// The body that was effective before this method existed.
    pub fn previous_body(&self) -> Option<&Body> {
        self.previous_body.as_ref()
    }

    pub fn body(&self) -> Option<&Body> {
        self.body.as_ref()
    }

    pub fn is_abstract(&self) -> bool {
        self.body.is_none()
    }

    pub fn method_ref(&self) -> MethodRef {
        MethodRef::new(self.declaring.clone(), self.sig.clone())
    }

    /// Every root definition whose abstractness this method decides.
    pub(crate) fn covered_roots(&self) -> Vec<MethodRef> {
        let mut roots = Vec::with_capacity(
            1 + self.explicit_base_definitions.len() + self.interface_methods.len(),
        );
        roots.push(self.root.clone());
        for root in self
            .explicit_base_definitions
            .iter()
            .chain(&self.interface_methods)
        {
            if !roots.contains(root) {
                roots.push(root.clone());
            }
        }
        roots
    }
}

/// One slot of the arena.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MethodEntry {
    Inherited(MethodInfo),
    Added(MutableMethod),
}

impl MethodEntry {
    pub fn sig(&self) -> &MethodSig {
        match self {
            Self::Inherited(info) => &info.sig,
            Self::Added(method) => &method.sig,
        }
    }

    pub fn as_added(&self) -> Option<&MutableMethod> {
        match self {
            Self::Added(method) => Some(method),
            Self::Inherited(_) => None,
        }
    }

    pub fn as_inherited(&self) -> Option<&MethodInfo> {
        match self {
            Self::Inherited(info) => Some(info),
            Self::Added(_) => None,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub(crate) struct MethodTable {
    slots: Vec<MethodEntry>,
    live: FxHashMap<MethodRef, MethodId>,
}

impl MethodTable {
    /// Seed the table with the inherited methods, keyed by root.
    pub(crate) fn from_inherited<'a>(methods: impl IntoIterator<Item = &'a MethodInfo>) -> Self {
        let mut table = Self::default();
        for method in methods {
            let id = table.push(MethodEntry::Inherited(method.clone()));
            table.index(method.root.clone(), id);
        }
        table
    }

    pub(crate) fn push(&mut self, entry: MethodEntry) -> MethodId {
        let id = MethodId(self.slots.len());
        self.slots.push(entry);
        id
    }

    /// Point `root` at `id`, returning the slot it used to point at.
    pub(crate) fn index(&mut self, root: MethodRef, id: MethodId) -> Option<MethodId> {
        self.live.insert(root, id)
    }

    pub(crate) fn live(&self, root: &MethodRef) -> Option<MethodId> {
        self.live.get(root).copied()
    }

    pub(crate) fn get(&self, id: MethodId) -> Option<&MethodEntry> {
        self.slots.get(id.index())
    }

    pub(crate) fn added(&self, id: MethodId) -> Option<&MutableMethod> {
        self.get(id).and_then(MethodEntry::as_added)
    }

    pub(crate) fn added_mut(&mut self, id: MethodId) -> Option<&mut MutableMethod> {
        match self.slots.get_mut(id.index()) {
            Some(MethodEntry::Added(method)) => Some(method),
            _ => None,
        }
    }

    /// Slots reachable through the live index, each once, in arena order.
    pub(crate) fn live_entries(&self) -> Vec<(MethodId, &MethodEntry)> {
        let mut ids: Vec<MethodId> = self.live.values().copied().collect();
        ids.sort_unstable();
        ids.dedup();
        ids.into_iter()
            .filter_map(|id| self.get(id).map(|entry| (id, entry)))
            .collect()
    }

    /// Every method the descriptor declares, in the order it was added.
    pub(crate) fn added_entries(&self) -> impl Iterator<Item = (MethodId, &MutableMethod)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, entry)| entry.as_added().map(|method| (MethodId(i), method)))
    }

    pub(crate) fn slot_count(&self) -> usize {
        self.slots.len()
    }
}
