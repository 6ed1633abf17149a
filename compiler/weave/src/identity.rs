//! Cache identities of requested types.
//!
//! A [`CompositeIdentity`] is the requested type's name plus one
//! [`IdentityPart`] per registered participant, in registration order.
//! Participants without an identifier contribute [`IdentityPart::Absent`]
//! so that positions stay stable.
//!
//! Every generated proxy carries its identity as an attribute, so a type
//! read back from a flushed module can be put back under the same key.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use weave_emit::GeneratedType;
use weave_ir::{AttributeSpec, Name, TypeSpec};

use crate::error::IdentityError;
use crate::participant::Participant;

/// Attribute type stamped on every generated proxy.
pub const IDENTITY_ATTRIBUTE: &str = "weave.Identity";

/// One contributor's share of a cache key.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IdentityPart {
    Absent,
    Str(String),
    Int(i64),
    Bytes(Vec<u8>),
    List(Vec<IdentityPart>),
}

impl From<&str> for IdentityPart {
    fn from(value: &str) -> Self {
        Self::Str(value.to_owned())
    }
}

impl From<i64> for IdentityPart {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

/// Computes an identity part for a requested type.
pub trait TypeIdentifier: Send + Sync {
    fn identify(&self, requested: &TypeSpec) -> IdentityPart;
}

impl<F> TypeIdentifier for F
where
    F: Fn(&TypeSpec) -> IdentityPart + Send + Sync,
{
    fn identify(&self, requested: &TypeSpec) -> IdentityPart {
        self(requested)
    }
}

/// Cache key: requested type plus every participant's part.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CompositeIdentity {
    requested: Name,
    parts: Vec<IdentityPart>,
}

impl CompositeIdentity {
    pub fn new(requested: impl Into<Name>, parts: Vec<IdentityPart>) -> Self {
        Self {
            requested: requested.into(),
            parts,
        }
    }

    pub fn requested(&self) -> &Name {
        &self.requested
    }

    pub fn parts(&self) -> &[IdentityPart] {
        &self.parts
    }
}

impl fmt::Display for CompositeIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{:?}", self.requested, self.parts)
    }
}

pub struct IdentityProvider {
    participants: Arc<[Arc<dyn Participant>]>,
    configuration_id: String,
}

impl IdentityProvider {
    pub fn new(participants: Arc<[Arc<dyn Participant>]>) -> Self {
        let configuration_id = participants
            .iter()
            .map(|p| p.name().as_str())
            .collect::<Vec<_>>()
            .join(";");
        Self {
            participants,
            configuration_id,
        }
    }

    /// Identity of the participant set; flushed modules carry it.
    pub fn participant_configuration_id(&self) -> &str {
        &self.configuration_id
    }

    /// Compute the cache key for `requested`.
    ///
    /// Every identifier is consulted exactly once, in registration order.
    pub fn identify(&self, requested: &TypeSpec) -> Result<CompositeIdentity, IdentityError> {
        if requested.name.is_empty() {
            return Err(IdentityError::EmptyName);
        }
        if requested.is_interface() {
            return Err(IdentityError::Interface(requested.name.clone()));
        }
        if requested.is_sealed() {
            return Err(IdentityError::Sealed(requested.name.clone()));
        }
        if requested.is_generic_definition() {
            return Err(IdentityError::OpenGeneric(requested.name.clone()));
        }

        let parts = self
            .participants
            .iter()
            .map(|p| {
                p.identifier()
                    .map_or(IdentityPart::Absent, |id| id.identify(requested))
            })
            .collect();
        Ok(CompositeIdentity::new(requested.name.clone(), parts))
    }

    /// The attribute recording `identity` on its proxy.
    pub fn identity_attribute(&self, identity: &CompositeIdentity) -> Result<AttributeSpec, IdentityError> {
        let parts = serde_json::to_string(&identity.parts).map_err(|e| IdentityError::Encode {
            ty: identity.requested.clone(),
            reason: e.to_string(),
        })?;
        Ok(AttributeSpec::new(
            IDENTITY_ATTRIBUTE,
            [identity.requested.as_str().to_owned(), parts],
        ))
    }

    /// Read a proxy's identity back. Types without the identity attribute
    /// fail with [`IdentityError::NotAProxy`].
    pub fn extract_identity(&self, ty: &GeneratedType) -> Result<CompositeIdentity, IdentityError> {
        let attribute = ty
            .image()
            .attribute(IDENTITY_ATTRIBUTE)
            .ok_or_else(|| IdentityError::NotAProxy(ty.name().clone()))?;
        let malformed = |reason: String| IdentityError::MalformedAttribute {
            ty: ty.name().clone(),
            reason,
        };
        let [requested, parts] = attribute.args.as_slice() else {
            return Err(malformed(format!(
                "expected 2 arguments, found {}",
                attribute.args.len()
            )));
        };
        let parts: Vec<IdentityPart> = serde_json::from_str(parts).map_err(|e| malformed(e.to_string()))?;
        if parts.len() != self.participants.len() {
            return Err(malformed(format!(
                "expected {} identity parts, found {}",
                self.participants.len(),
                parts.len()
            )));
        }
        Ok(CompositeIdentity::new(requested.as_str(), parts))
    }
}
