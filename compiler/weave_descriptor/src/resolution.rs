//! Override and interface-implementation resolution.
//!
//! Both entry points are idempotent per root definition: asking twice for
//! the override of the same root (or the implementation of the same
//! interface method) returns the same [`MethodId`].
//!
//! Interface implementation resolves in this order:
//! 1. a virtual, visible, non-final base implementation is overridden;
//! 2. any other base implementation is *re-implemented*: a fresh private
//!    method with its own slot that calls the inherited one as its previous
//!    body (the inherited method stays reachable through direct calls);
//! 3. with no base implementation, a new public method is declared.

use smallvec::SmallVec;
use weave_ir::{Access, Body, MethodFlags, MethodInfo, MethodRef};

use crate::descriptor::TypeDescriptor;
use crate::error::ResolutionError;
use crate::method_table::{MethodEntry, MethodId, MutableMethod};

impl TypeDescriptor {
    /// The override of `base_method`'s root definition, creating it if needed.
    ///
    /// A new override starts out with the previous effective body (a
    /// non-virtual call to the inherited implementation, or nothing when the
    /// inherited method is abstract).
    pub fn get_or_add_override(&mut self, base_method: &MethodInfo) -> Result<MethodId, ResolutionError> {
        let root = base_method.root.clone();
        let current = match self.methods.live(&root).and_then(|id| self.methods.get(id).map(|e| (id, e))) {
            Some((id, MethodEntry::Added(_))) => return Ok(id),
            Some((_, MethodEntry::Inherited(info))) => info.clone(),
            None => {
                return Err(ResolutionError::MethodNotFound {
                    ty: self.name.clone(),
                    method: base_method.method_ref(),
                })
            }
        };

        if !base_method.is_virtual() || !current.is_virtual() {
            return Err(ResolutionError::NotVirtual {
                method: base_method.method_ref(),
            });
        }
        if base_method.is_final() || current.is_final() {
            return Err(ResolutionError::Final {
                method: current.method_ref(),
            });
        }

        let previous_body = (!current.is_abstract()).then(|| Body::CallBase(current.method_ref()));
        let method = MutableMethod {
            declaring: self.name.clone(),
            sig: current.sig.clone(),
            flags: (current.flags - MethodFlags::ABSTRACT - MethodFlags::NEW_SLOT) | MethodFlags::VIRTUAL,
            access: current.access,
            root: root.clone(),
            base_method: Some(current.method_ref()),
            explicit_base_definitions: SmallVec::new(),
            interface_methods: SmallVec::new(),
            body: previous_body.clone(),
            previous_body,
        };
        let id = self.insert_method(root, method);
        tracing::debug!(ty = %self.name, method = %current.sig, ?id, "added override");
        Ok(id)
    }

    /// The implementation of `interface_method`, creating it if needed.
    ///
    /// The interface must already be implemented by the base type or added
    /// through [`add_interface`](Self::add_interface).
    pub fn get_or_add_implementation(
        &mut self,
        interface_method: &MethodInfo,
    ) -> Result<MethodId, ResolutionError> {
        let key = interface_method.method_ref();
        let interface = &interface_method.declaring;
        if !self.implements(interface) {
            return Err(ResolutionError::InterfaceNotImplemented {
                ty: self.name.clone(),
                interface: interface.clone(),
            });
        }

        if let Some(&id) = self.implementations.get(&key) {
            return Ok(id);
        }
        if let Some(id) = self.added_implicit_implementation(interface_method) {
            self.mark_implementation(id, key);
            return Ok(id);
        }

        let base_impl = self.base_spec.as_ref().and_then(|base| {
            base.implementation_of(&key)
                .or_else(|| base.public_method_by_sig(&interface_method.sig))
                .cloned()
        });

        let id = match base_impl {
            Some(base) if base.flags.is_overridable() && base.access.is_visible_to_subclass() => {
                self.get_or_add_override(&base)?
            }
            Some(base) => {
                if !base.access.is_visible_to_subclass() && base.is_explicit_implementation() {
                    return Err(ResolutionError::CannotReimplement {
                        interface_method: key,
                        base: base.method_ref(),
                    });
                }
                self.add_reimplementation(interface_method, &base)?
            }
            None => self.add_fresh_implementation(interface_method)?,
        };

        self.mark_implementation(id, key);
        Ok(id)
    }

    /// Add an explicit override (method-impl) of `base_method`'s root to an
    /// added method.
    pub fn add_explicit_base_definition(
        &mut self,
        id: MethodId,
        base_method: &MethodInfo,
    ) -> Result<(), ResolutionError> {
        self.require_added(id)?;
        let root = base_method.root.clone();
        if !base_method.is_virtual() {
            return Err(ResolutionError::NotVirtual {
                method: base_method.method_ref(),
            });
        }
        match self.effective_method(&root) {
            Some(MethodEntry::Added(existing)) => {
                if self.methods.live(&root) == Some(id) {
                    return Ok(());
                }
                return Err(ResolutionError::AlreadyOverridden {
                    ty: self.name.clone(),
                    root,
                    existing: existing.name().clone(),
                });
            }
            Some(MethodEntry::Inherited(current)) if current.is_final() => {
                return Err(ResolutionError::Final {
                    method: current.method_ref(),
                });
            }
            Some(MethodEntry::Inherited(_)) => {}
            None => {
                return Err(ResolutionError::MethodNotFound {
                    ty: self.name.clone(),
                    method: base_method.method_ref(),
                })
            }
        }

        if let Some(method) = self.methods.added_mut(id) {
            method.explicit_base_definitions.push(root.clone());
        }
        self.methods.index(root, id);
        self.refresh_abstractness(id);
        Ok(())
    }

    /// A method the descriptor declared itself that already matches the
    /// interface method by name and signature.
    fn added_implicit_implementation(&self, interface_method: &MethodInfo) -> Option<MethodId> {
        self.methods.added_entries().find_map(|(id, method)| {
            let matches = method.sig == interface_method.sig
                && method.access == Access::Public
                && method.flags.contains(MethodFlags::VIRTUAL)
                && !method.flags.contains(MethodFlags::STATIC);
            matches.then_some(id)
        })
    }

    /// A new slot implementing `interface_method` explicitly, seeded with a
    /// call to the inherited implementation it replaces.
    fn add_reimplementation(
        &mut self,
        interface_method: &MethodInfo,
        base: &MethodInfo,
    ) -> Result<MethodId, ResolutionError> {
        let name = interface_method.declaring.qualify(interface_method.name());
        let sig = interface_method.sig.renamed(name);
        self.ensure_not_declared(&sig)?;

        let key = interface_method.method_ref();
        let root = MethodRef::new(self.name.clone(), sig.clone());
        let previous_body = Some(Body::CallBase(base.method_ref()));
        let mut explicit = SmallVec::new();
        explicit.push(key);
        let method = MutableMethod {
            declaring: self.name.clone(),
            sig,
            flags: MethodFlags::VIRTUAL | MethodFlags::FINAL | MethodFlags::NEW_SLOT,
            access: Access::Private,
            root: root.clone(),
            base_method: None,
            explicit_base_definitions: explicit,
            interface_methods: SmallVec::new(),
            body: previous_body.clone(),
            previous_body,
        };
        let id = self.insert_method(root, method);
        tracing::debug!(
            ty = %self.name,
            interface_method = %interface_method.method_ref(),
            base = %base.method_ref(),
            "re-implemented interface method"
        );
        Ok(id)
    }

    /// A new public method implementing `interface_method` by name, with no body yet.
    fn add_fresh_implementation(&mut self, interface_method: &MethodInfo) -> Result<MethodId, ResolutionError> {
        let sig = interface_method.sig.clone();
        self.ensure_not_declared(&sig)?;
        let root = MethodRef::new(self.name.clone(), sig.clone());
        let method = MutableMethod {
            declaring: self.name.clone(),
            sig,
            flags: MethodFlags::VIRTUAL | MethodFlags::NEW_SLOT,
            access: Access::Public,
            root: root.clone(),
            base_method: None,
            explicit_base_definitions: SmallVec::new(),
            interface_methods: SmallVec::new(),
            previous_body: None,
            body: None,
        };
        Ok(self.insert_method(root, method))
    }

    fn mark_implementation(&mut self, id: MethodId, interface_method: MethodRef) {
        if let Some(method) = self.methods.added_mut(id) {
            if !method.interface_methods.contains(&interface_method) {
                method.interface_methods.push(interface_method.clone());
            }
        }
        self.implementations.insert(interface_method, id);
        self.refresh_abstractness(id);
    }
}
