//! Opaque method bodies.
//!
//! Body construction belongs to an expression layer this crate does not
//! model. The engine only needs to know whether a body exists, to seed an
//! override with a call to the implementation it replaces, and to carry
//! whatever the expression layer produced through to the backend.

use crate::method::MethodRef;
use crate::name::Name;

#[derive(Clone, PartialEq, Eq, Hash, Debug)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub enum Body {
    /// Non-virtual call to an inherited implementation, forwarding every argument.
    CallBase(MethodRef),
    /// Call to the base constructor taking these parameter types.
    CallBaseConstructor(Vec<Name>),
    /// Output of the expression layer, carried verbatim.
    Opaque(String),
    /// Bodies evaluated in order; the last one produces the result.
    Sequence(Vec<Body>),
}

impl Body {
    pub fn opaque(text: impl Into<String>) -> Self {
        Self::Opaque(text.into())
    }

    /// Run `before`, then `self`.
    #[must_use]
    pub fn preceded_by(self, before: Body) -> Self {
        match self {
            Self::Sequence(mut parts) => {
                parts.insert(0, before);
                Self::Sequence(parts)
            }
            other => Self::Sequence(vec![before, other]),
        }
    }

    /// Every inherited method this body calls non-virtually.
    pub fn base_calls(&self) -> Vec<&MethodRef> {
        let mut out = Vec::new();
        self.collect_base_calls(&mut out);
        out
    }

    fn collect_base_calls<'a>(&'a self, out: &mut Vec<&'a MethodRef>) {
        match self {
            Self::CallBase(target) => out.push(target),
            Self::Sequence(parts) => {
                for part in parts {
                    part.collect_base_calls(out);
                }
            }
            Self::CallBaseConstructor(_) | Self::Opaque(_) => {}
        }
    }
}

/// A custom attribute applied to a generated type or member.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
#[cfg_attr(feature = "cache", derive(serde::Serialize, serde::Deserialize))]
pub struct AttributeSpec {
    pub ty: Name,
    pub args: Vec<String>,
}

impl AttributeSpec {
    pub fn new(ty: impl Into<Name>, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            ty: ty.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }
}
