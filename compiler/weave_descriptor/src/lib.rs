//! Mutable type descriptors for the weave engine.
//!
//! A [`TypeDescriptor`] is the plan for one generated type: participants
//! add fields, constructors and methods to it, ask for overrides of
//! inherited methods and for implementations of interface methods, and
//! the emitter reads the result back in [`sort`]ed dependency order.

mod descriptor;
mod error;
mod method_table;
mod order;
mod resolution;

pub use descriptor::{CtorDef, EdgeKind, EventDef, FieldDef, PropertyDef, TypeDescriptor};
pub use error::{CycleError, ResolutionError};
pub use method_table::{MethodEntry, MethodId, MutableMethod};
pub use order::{sort, DependencyOrder};
