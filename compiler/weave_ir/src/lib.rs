//! Specifications shared by every layer of the weave engine.
//!
//! - [`Name`]: reference-counted names for types, members and participants
//! - [`TypeSpec`]: the flattened view of a type the engine derives from
//! - [`MethodInfo`]/[`MethodRef`]: method definitions and their identities
//! - [`Body`]: opaque method bodies produced by the expression layer
//!
//! Enable the `cache` feature to make every specification serializable;
//! persisted modules depend on it.

mod body;
mod flags;
mod method;
mod name;
mod type_spec;

pub use body::{AttributeSpec, Body};
pub use flags::{Access, MethodFlags, TypeFlags};
pub use method::{CtorInfo, MethodInfo, MethodRef, MethodSig};
pub use name::Name;
pub use type_spec::{InterfaceMapping, TypeSpec};
