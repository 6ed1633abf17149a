//! In-memory reference backend.
//!
//! [`MemoryModule`] keeps every slot as a plain record and builds a
//! [`TypeImage`] on finalize. Flushing writes the images finalized since
//! the previous flush as one [`PersistedModule`] file.

use std::path::PathBuf;

use rustc_hash::FxHashMap;
use weave_ir::Name;

use crate::backend::{CodeGenerator, EmitBackend, MemberSpec, SlotHandle, SlotState, TypeHeader, TypeRef};
use crate::error::BackendError;
use crate::generated::{CtorImage, FieldImage, GeneratedType, TypeImage};
use crate::persist::PersistedModule;

#[derive(Debug)]
struct Slot {
    name: Name,
    state: SlotState,
    header: Option<TypeHeader>,
    members: Vec<MemberSpec>,
}

#[derive(Debug)]
pub struct MemoryModule {
    module_name: Name,
    output_dir: PathBuf,
    configuration_id: String,
    slots: Vec<Slot>,
    /// Declared, defined or finalized slots by name.
    live: FxHashMap<Name, SlotHandle>,
    /// Finalized since the last flush.
    unflushed: Vec<TypeImage>,
    flushes: u32,
    fail_on_flush: Option<String>,
}

impl MemoryModule {
    pub fn new(module_name: impl Into<Name>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            module_name: module_name.into(),
            output_dir: output_dir.into(),
            configuration_id: String::new(),
            slots: Vec::new(),
            live: FxHashMap::default(),
            unflushed: Vec::new(),
            flushes: 0,
            fail_on_flush: None,
        }
    }

    /// Stamp flushed modules with this participant configuration.
    #[must_use]
    pub fn with_configuration_id(mut self, id: impl Into<String>) -> Self {
        self.configuration_id = id.into();
        self
    }

    /// Make every flush fail with `reason`.
    #[must_use]
    pub fn with_fail_on_flush(mut self, reason: impl Into<String>) -> Self {
        self.fail_on_flush = Some(reason.into());
        self
    }

    pub fn module_name(&self) -> &Name {
        &self.module_name
    }

    pub fn slot_state(&self, slot: SlotHandle) -> Option<SlotState> {
        self.slots.get(slot.raw() as usize).map(|s| s.state)
    }

    /// Names of types finalized and not yet flushed.
    pub fn unflushed_names(&self) -> impl Iterator<Item = &Name> {
        self.unflushed.iter().map(|image| &image.name)
    }

    fn slot_mut(&mut self, slot: SlotHandle) -> Result<&mut Slot, BackendError> {
        self.slots
            .get_mut(slot.raw() as usize)
            .ok_or(BackendError::UnknownSlot { slot })
    }

    fn resolve(&self, ty: &TypeRef) -> Result<Name, BackendError> {
        match ty {
            TypeRef::External(name) => Ok(name.clone()),
            TypeRef::Slot(slot) => self
                .slots
                .get(slot.raw() as usize)
                .map(|s| s.name.clone())
                .ok_or(BackendError::UnknownSlot { slot: *slot }),
        }
    }

    fn build_image(&self, slot: &Slot, header: &TypeHeader) -> Result<TypeImage, BackendError> {
        let mut image = TypeImage::new(slot.name.clone());
        image.base = header.base.as_ref().map(|b| self.resolve(b)).transpose()?;
        image.interfaces = header
            .interfaces
            .iter()
            .map(|i| self.resolve(i))
            .collect::<Result<_, _>>()?;
        image.flags = header.flags;

        for member in &slot.members {
            match member.clone() {
                MemberSpec::Attribute(attribute) => image.attributes.push(attribute),
                MemberSpec::Field {
                    name,
                    ty,
                    access,
                    is_static,
                } => image.fields.push(FieldImage {
                    name,
                    ty: self.resolve(&ty)?,
                    access,
                    is_static,
                }),
                MemberSpec::Constructor {
                    params,
                    access,
                    body,
                } => image.constructors.push(CtorImage {
                    params,
                    access,
                    body,
                }),
                MemberSpec::Method(method) => image.methods.push(method),
                MemberSpec::Property(property) => image.properties.push(property),
                MemberSpec::Event(event) => image.events.push(event),
                MemberSpec::ExplicitOverride(imp) => image.explicit_overrides.push(imp),
            }
        }
        Ok(image)
    }
}

fn invalid(slot: &Slot, operation: &'static str) -> BackendError {
    BackendError::InvalidSlotState {
        name: slot.name.clone(),
        state: slot.state,
        operation,
    }
}

impl EmitBackend for MemoryModule {
    fn declare_slot(&mut self, name: &Name) -> Result<SlotHandle, BackendError> {
        if self.live.contains_key(name) {
            return Err(BackendError::DuplicateName { name: name.clone() });
        }
        let handle = SlotHandle::from_index(self.slots.len()).ok_or_else(|| BackendError::SlotsExhausted {
            module: self.module_name.clone(),
        })?;
        self.slots.push(Slot {
            name: name.clone(),
            state: SlotState::Declared,
            header: None,
            members: Vec::new(),
        });
        self.live.insert(name.clone(), handle);
        tracing::trace!(module = %self.module_name, %name, %handle, "declared slot");
        Ok(handle)
    }

    fn define_header(&mut self, slot: SlotHandle, header: TypeHeader) -> Result<(), BackendError> {
        let entry = self.slot_mut(slot)?;
        if entry.state != SlotState::Declared {
            return Err(invalid(entry, "define the header of"));
        }
        entry.header = Some(header);
        entry.state = SlotState::Defined;
        Ok(())
    }

    fn define_member(&mut self, slot: SlotHandle, member: MemberSpec) -> Result<(), BackendError> {
        let entry = self.slot_mut(slot)?;
        if entry.state != SlotState::Defined {
            return Err(invalid(entry, "add a member to"));
        }
        entry.members.push(member);
        Ok(())
    }

    fn finalize(&mut self, slot: SlotHandle) -> Result<GeneratedType, BackendError> {
        let index = slot.raw() as usize;
        let entry = self.slots.get(index).ok_or(BackendError::UnknownSlot { slot })?;
        let header = match (&entry.header, entry.state) {
            (Some(header), SlotState::Defined) => header,
            _ => return Err(invalid(entry, "finalize")),
        };
        if let Some(TypeRef::Slot(base)) = &header.base {
            if let Some(base_slot) = self.slots.get(base.raw() as usize) {
                if base_slot.state == SlotState::Discarded {
                    return Err(BackendError::DiscardedBase {
                        name: entry.name.clone(),
                        base: base_slot.name.clone(),
                    });
                }
            }
        }

        let image = self.build_image(entry, header)?;
        self.unflushed.push(image.clone());
        if let Some(entry) = self.slots.get_mut(index) {
            entry.state = SlotState::Finalized;
            entry.members.clear();
        }
        tracing::trace!(module = %self.module_name, name = %image.name, "finalized slot");
        Ok(GeneratedType::new(image))
    }

    fn discard(&mut self, slot: SlotHandle) {
        let Some(entry) = self.slots.get_mut(slot.raw() as usize) else {
            return;
        };
        let was_finalized = entry.state == SlotState::Finalized;
        entry.state = SlotState::Discarded;
        entry.header = None;
        entry.members.clear();
        let name = entry.name.clone();

        if self.live.get(&name) == Some(&slot) {
            self.live.remove(&name);
        }
        if was_finalized {
            self.unflushed.retain(|image| image.name != name);
        }
        tracing::trace!(module = %self.module_name, %name, "discarded slot");
    }
}

impl CodeGenerator for MemoryModule {
    fn has_unflushed(&self) -> bool {
        !self.unflushed.is_empty()
    }

    fn flush(&mut self) -> Result<Option<PathBuf>, BackendError> {
        if let Some(reason) = &self.fail_on_flush {
            return Err(BackendError::FlushRejected {
                module: self.module_name.clone(),
                reason: reason.clone(),
            });
        }
        if self.unflushed.is_empty() {
            return Ok(None);
        }

        let sequence = self.flushes + 1;
        let path = self
            .output_dir
            .join(format!("{}.{sequence}.weave", self.module_name));
        let module = PersistedModule::new(
            self.module_name.clone(),
            self.configuration_id.clone(),
            self.unflushed.clone(),
        );
        module.write(&path)?;

        self.flushes = sequence;
        let count = self.unflushed.len();
        self.unflushed.clear();
        tracing::debug!(module = %self.module_name, types = count, path = %path.display(), "flushed module");
        Ok(Some(path))
    }
}
