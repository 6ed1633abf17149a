//! On-disk format of a flushed [`MemoryModule`](crate::MemoryModule).
//!
//! ```text
//! <output_dir>/
//! ├── <module_name>.1.weave    # bincode-encoded PersistedModule
//! ├── <module_name>.2.weave
//! └── ...
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use weave_ir::Name;

use crate::error::BackendError;
use crate::generated::TypeImage;

/// Every type finalized by one module between two flushes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedModule {
    pub format_version: u32,
    /// Participant configuration the types were generated under.
    pub configuration_id: String,
    pub module_name: Name,
    pub types: Vec<TypeImage>,
}

impl PersistedModule {
    /// Bumped whenever the encoding of [`TypeImage`] changes.
    pub const FORMAT_VERSION: u32 = 1;

    pub fn new(module_name: Name, configuration_id: impl Into<String>, types: Vec<TypeImage>) -> Self {
        Self {
            format_version: Self::FORMAT_VERSION,
            configuration_id: configuration_id.into(),
            module_name,
            types,
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, BackendError> {
        bincode::serialize(self).map_err(BackendError::Encode)
    }

    /// Encode and write to `path`, creating parent directories.
    pub fn write(&self, path: &Path) -> Result<(), BackendError> {
        let bytes = self.encode()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| BackendError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        std::fs::write(path, bytes).map_err(|source| BackendError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Read a module, rejecting any other format version.
    pub fn read(path: &Path) -> Result<Self, BackendError> {
        let bytes = std::fs::read(path).map_err(|source| BackendError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let module: Self = bincode::deserialize(&bytes).map_err(|source| BackendError::Decode {
            path: path.to_path_buf(),
            source,
        })?;
        if module.format_version != Self::FORMAT_VERSION {
            return Err(BackendError::FormatVersion {
                path: path.to_path_buf(),
                found: module.format_version,
                expected: Self::FORMAT_VERSION,
            });
        }
        Ok(module)
    }
}
