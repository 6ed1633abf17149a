//! Dependency ordering of a batch of descriptors.
//!
//! A descriptor depends on every other in-batch descriptor named by its
//! base, interface or uses-type edges. Edges to types outside the batch
//! (or already yielded) are satisfied. A type naming itself as an
//! interface or uses-type is ignored; naming itself as its base is a cycle.

use std::iter::FusedIterator;

use crate::descriptor::{EdgeKind, TypeDescriptor};
use crate::error::CycleError;

/// Order `descriptors` so each one comes after its in-batch dependencies.
///
/// Nothing is computed up front; see [`DependencyOrder`].
pub fn sort(descriptors: impl IntoIterator<Item = TypeDescriptor>) -> DependencyOrder {
    DependencyOrder {
        remaining: descriptors.into_iter().collect(),
        failed: false,
    }
}

/// Lazy, single-pass topological order.
///
/// Each step yields the first remaining descriptor (in insertion order)
/// that is independent of the rest. When none is, the iterator yields one
/// [`CycleError`] and is exhausted from then on.
#[derive(Debug)]
pub struct DependencyOrder {
    remaining: Vec<TypeDescriptor>,
    failed: bool,
}

impl DependencyOrder {
    /// Descriptors not yet yielded.
    pub fn remaining(&self) -> usize {
        if self.failed {
            0
        } else {
            self.remaining.len()
        }
    }

    fn is_independent(&self, candidate: &TypeDescriptor) -> bool {
        candidate.dependency_edges().all(|(kind, target)| {
            if target == candidate.name() {
                return kind != EdgeKind::Base;
            }
            !self.remaining.iter().any(|other| other.name() == target)
        })
    }
}

impl Iterator for DependencyOrder {
    type Item = Result<TypeDescriptor, CycleError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.remaining.is_empty() {
            return None;
        }
        match self.remaining.iter().position(|d| self.is_independent(d)) {
            Some(pos) => {
                let next = self.remaining.remove(pos);
                tracing::trace!(ty = %next.name(), left = self.remaining.len(), "ordered descriptor");
                Some(Ok(next))
            }
            None => {
                self.failed = true;
                let types = self
                    .remaining
                    .drain(..)
                    .map(|d| d.name().clone())
                    .collect();
                Some(Err(CycleError { types }))
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.remaining();
        (usize::from(left > 0), Some(left))
    }
}

impl FusedIterator for DependencyOrder {}
