//! Flushing generated code and loading it back.
//!
//! Both operations run under the generation lock and drain the whole pool,
//! so no assembly can be in progress on any context while they run.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use weave_emit::{GeneratedType, PersistedModule};

use crate::cache::AssemblyCache;
use crate::error::{ContextFlushFailure, FlushError, IdentityError, LoadError};
use crate::identity::IdentityProvider;
use crate::participant::{LoadedTypes, Participant};
use crate::pool::ReusingPool;

/// Outcome of loading one flushed module.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// Proxies entered into the cache.
    pub loaded: usize,
    /// Proxies whose identity was already cached; dropped.
    pub duplicates: usize,
    /// Types without an identity.
    pub additional: usize,
}

pub struct CodeManager {
    participants: Arc<[Arc<dyn Participant>]>,
    identities: Arc<IdentityProvider>,
    cache: Arc<AssemblyCache>,
    pool: Arc<ReusingPool>,
}

impl CodeManager {
    pub fn new(
        participants: Arc<[Arc<dyn Participant>]>,
        identities: Arc<IdentityProvider>,
        cache: Arc<AssemblyCache>,
        pool: Arc<ReusingPool>,
    ) -> Self {
        Self {
            participants,
            identities,
            cache,
            pool,
        }
    }

    /// Persist the unflushed code of every context.
    ///
    /// Returns one entry per context, in context order: where its code
    /// went, or `None` when it had nothing new. Every context goes back to
    /// the pool even when some flushes fail; the failures are reported
    /// together.
    #[tracing::instrument(level = "debug", skip_all)]
    pub fn flush(&self) -> Result<Vec<Option<PathBuf>>, FlushError> {
        let _guard = self.cache.generation_lock();
        let mut handles = self.pool.borrow_all()?;
        handles.sort_by_key(|h| h.id());

        let mut locations = Vec::with_capacity(handles.len());
        let mut failures = Vec::new();
        for handle in &handles {
            let mut context = handle.lock();
            if !context.has_unflushed() {
                locations.push(None);
                continue;
            }
            match context.flush() {
                Ok(location) => {
                    tracing::debug!(context = handle.id(), ?location, "flushed context");
                    locations.push(location);
                }
                Err(source) => {
                    tracing::debug!(context = handle.id(), %source, "context flush failed");
                    locations.push(None);
                    failures.push(ContextFlushFailure {
                        context: handle.id(),
                        source,
                    });
                }
            }
        }

        self.pool.return_all(handles)?;
        if failures.is_empty() {
            Ok(locations)
        } else {
            Err(FlushError::Contexts { failures })
        }
    }

    /// Enter the proxies of a flushed module into the cache.
    ///
    /// All or nothing: a module with a malformed identity attribute is
    /// rejected before any of its proxies is cached.
    #[tracing::instrument(level = "debug", skip_all, fields(module = %module.module_name))]
    pub fn load_flushed_code(&self, module: PersistedModule) -> Result<LoadReport, LoadError> {
        let expected = self.identities.participant_configuration_id();
        if module.configuration_id != expected {
            return Err(LoadError::ConfigurationMismatch {
                expected: expected.to_owned(),
                found: module.configuration_id,
            });
        }

        let _guard = self.cache.generation_lock();
        // Read every identity before touching the cache, so a malformed
        // image leaves nothing behind.
        let mut proxies = Vec::new();
        let mut loaded = LoadedTypes::default();
        for image in module.types {
            let ty = GeneratedType::new(image);
            match self.identities.extract_identity(&ty) {
                Ok(identity) => proxies.push((identity, ty)),
                Err(IdentityError::NotAProxy(_)) => loaded.additional.push(ty),
                Err(err) => return Err(err.into()),
            }
        }
        let handles = self.pool.borrow_all()?;

        let mut report = LoadReport {
            additional: loaded.additional.len(),
            ..LoadReport::default()
        };
        for (identity, ty) in proxies {
            if self.cache.insert_if_absent(identity.clone(), ty.clone()) {
                report.loaded += 1;
                loaded.proxies.push((identity, ty));
            } else {
                tracing::warn!(%identity, ty = %ty.name(), "identity already cached; dropping loaded type");
                report.duplicates += 1;
            }
        }

        for handle in &handles {
            let mut context = handle.lock();
            for participant in self.participants.iter() {
                participant.rebuild_state(&loaded, context.state_mut());
            }
        }
        self.pool.return_all(handles)?;

        tracing::debug!(
            loaded = report.loaded,
            duplicates = report.duplicates,
            additional = report.additional,
            "loaded flushed code"
        );
        Ok(report)
    }

    /// Read a module written by a flush and load it.
    pub fn load_flushed_file(&self, path: &Path) -> Result<LoadReport, LoadError> {
        self.load_flushed_code(PersistedModule::read(path)?)
    }
}
