//! Staged emission of a descriptor batch.
//!
//! Emission of a batch happens in three passes, each over the whole
//! dependency-sorted batch before the next starts:
//!
//! 1. **Declare**: reserve a backend slot for every descriptor
//! 2. **Define**: write each header and all members; references to
//!    other descriptors of the batch resolve to their slots
//! 3. **Finalize**: seal every slot
//!
//! Declaring everything first is what lets a member of one type name a
//! type defined later in the same batch. Any failure after the first slot
//! is declared discards every slot of the batch.

use rustc_hash::FxHashMap;
use weave_descriptor::{sort, TypeDescriptor};
use weave_ir::Name;

use crate::backend::{EmitBackend, MemberSpec, SlotHandle, TypeHeader, TypeRef};
use crate::error::{BackendError, EmitError, Phase};
use crate::generated::{EventImage, GeneratedType, MethodImage, OverrideImage, PropertyImage};

/// Emit `descriptors` through `backend`. See [`StagedEmitter`].
pub fn emit<B: EmitBackend + ?Sized>(
    backend: &mut B,
    descriptors: Vec<TypeDescriptor>,
) -> Result<EmittedBatch, EmitError> {
    StagedEmitter::new(backend).emit(descriptors)
}

/// Finalized types of one batch, in emission order.
#[derive(Clone, Debug, Default)]
pub struct EmittedBatch {
    types: Vec<(Name, GeneratedType)>,
}

impl EmittedBatch {
    pub fn get(&self, name: &str) -> Option<&GeneratedType> {
        self.types
            .iter()
            .find(|(n, _)| n.as_str() == name)
            .map(|(_, ty)| ty)
    }

    pub fn iter(&self) -> impl Iterator<Item = &(Name, GeneratedType)> {
        self.types.iter()
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub fn into_vec(self) -> Vec<(Name, GeneratedType)> {
        self.types
    }
}

impl IntoIterator for EmittedBatch {
    type Item = (Name, GeneratedType);
    type IntoIter = std::vec::IntoIter<(Name, GeneratedType)>;

    fn into_iter(self) -> Self::IntoIter {
        self.types.into_iter()
    }
}

/// Drives one batch through a backend.
pub struct StagedEmitter<'b, B: EmitBackend + ?Sized> {
    backend: &'b mut B,
    /// Slots declared so far, parallel to the sorted batch.
    slots: Vec<SlotHandle>,
    by_name: FxHashMap<Name, SlotHandle>,
}

impl<'b, B: EmitBackend + ?Sized> StagedEmitter<'b, B> {
    pub fn new(backend: &'b mut B) -> Self {
        Self {
            backend,
            slots: Vec::new(),
            by_name: FxHashMap::default(),
        }
    }

    /// Sort, then declare, define and finalize the whole batch.
    ///
    /// A dependency cycle fails before anything is declared. Any later
    /// failure discards every slot declared for the batch.
    #[tracing::instrument(level = "debug", skip_all, fields(batch = descriptors.len()))]
    pub fn emit(mut self, descriptors: Vec<TypeDescriptor>) -> Result<EmittedBatch, EmitError> {
        let sorted = sort(descriptors).collect::<Result<Vec<_>, _>>()?;
        match self.run(&sorted) {
            Ok(batch) => Ok(batch),
            Err(err) => {
                self.discard_all();
                Err(err)
            }
        }
    }

    fn run(&mut self, sorted: &[TypeDescriptor]) -> Result<EmittedBatch, EmitError> {
        for descriptor in sorted {
            let slot = self
                .backend
                .declare_slot(descriptor.name())
                .map_err(|source| failure(Phase::Declare, descriptor, source))?;
            self.slots.push(slot);
            self.by_name.insert(descriptor.name().clone(), slot);
        }
        tracing::trace!(slots = self.slots.len(), "declared batch");

        let slots = self.slots.clone();
        for (descriptor, &slot) in sorted.iter().zip(&slots) {
            self.define(descriptor, slot)
                .map_err(|source| failure(Phase::Define, descriptor, source))?;
        }
        tracing::trace!("defined batch");

        let mut types = Vec::with_capacity(sorted.len());
        for (descriptor, &slot) in sorted.iter().zip(&slots) {
            let ty = self
                .backend
                .finalize(slot)
                .map_err(|source| failure(Phase::Finalize, descriptor, source))?;
            types.push((descriptor.name().clone(), ty));
        }
        tracing::debug!(types = types.len(), "finalized batch");
        Ok(EmittedBatch { types })
    }

    fn define(&mut self, descriptor: &TypeDescriptor, slot: SlotHandle) -> Result<(), BackendError> {
        let header = TypeHeader {
            base: descriptor.base().map(|base| self.resolve(base)),
            interfaces: descriptor
                .interfaces()
                .iter()
                .map(|i| self.resolve(i))
                .collect(),
            flags: descriptor.flags(),
        };
        self.backend.define_header(slot, header)?;
        for member in self.lower_members(descriptor) {
            self.backend.define_member(slot, member)?;
        }
        Ok(())
    }

    fn resolve(&self, name: &Name) -> TypeRef {
        match self.by_name.get(name) {
            Some(&slot) => TypeRef::Slot(slot),
            None => TypeRef::External(name.clone()),
        }
    }

    /// Every member of `descriptor`, in definition order: attributes,
    /// fields, constructors, methods, properties, events, then explicit
    /// overrides.
    fn lower_members(&self, descriptor: &TypeDescriptor) -> Vec<MemberSpec> {
        let mut members: Vec<MemberSpec> = descriptor
            .attributes()
            .iter()
            .cloned()
            .map(MemberSpec::Attribute)
            .collect();

        members.extend(descriptor.fields().iter().map(|field| MemberSpec::Field {
            name: field.name.clone(),
            ty: self.resolve(&field.ty),
            access: field.access,
            is_static: field.is_static,
        }));

        members.extend(
            descriptor
                .constructors()
                .iter()
                .map(|ctor| MemberSpec::Constructor {
                    params: ctor.params.clone(),
                    access: ctor.access,
                    body: ctor.body.clone(),
                }),
        );

        members.extend(descriptor.added_methods().map(|(_, method)| {
            MemberSpec::Method(MethodImage {
                sig: method.sig().clone(),
                flags: method.flags(),
                access: method.access(),
                body: method.body().cloned(),
                base_method: method.base_method().cloned(),
                interface_methods: method.interface_methods().to_vec(),
            })
        }));

        let sig_of = |id| descriptor.method(id).map(|m| m.sig().clone());
        members.extend(descriptor.properties().iter().map(|property| {
            MemberSpec::Property(PropertyImage {
                name: property.name.clone(),
                ty: property.ty.clone(),
                getter: property.getter.and_then(sig_of),
                setter: property.setter.and_then(sig_of),
            })
        }));

        members.extend(descriptor.events().iter().filter_map(|event| {
            Some(MemberSpec::Event(EventImage {
                name: event.name.clone(),
                handler: event.handler.clone(),
                add: sig_of(event.add)?,
                remove: sig_of(event.remove)?,
            }))
        }));

        for (_, method) in descriptor.added_methods() {
            members.extend(method.explicit_base_definitions().iter().map(|root| {
                MemberSpec::ExplicitOverride(OverrideImage {
                    method: method.sig().clone(),
                    overrides: root.clone(),
                })
            }));
        }

        members
    }

    fn discard_all(&mut self) {
        tracing::debug!(slots = self.slots.len(), "discarding failed batch");
        for slot in self.slots.drain(..).rev() {
            self.backend.discard(slot);
        }
        self.by_name.clear();
    }
}

fn failure(phase: Phase, descriptor: &TypeDescriptor, source: BackendError) -> EmitError {
    EmitError::Backend {
        phase,
        type_name: descriptor.name().clone(),
        source,
    }
}
