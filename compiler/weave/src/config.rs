//! Engine configuration.

use std::num::NonZeroUsize;
use std::path::PathBuf;

/// Environment variable overriding [`EngineConfig::pool_size`].
pub const POOL_SIZE_VAR: &str = "WEAVE_POOL_SIZE";
/// Environment variable overriding [`EngineConfig::output_dir`].
pub const OUTPUT_DIR_VAR: &str = "WEAVE_OUTPUT_DIR";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EngineConfig {
    /// Number of generation contexts.
    pub pool_size: usize,
    /// Directory flushed modules are written to.
    pub output_dir: PathBuf,
    /// Base name of each context's module; the context index is appended.
    pub module_name: String,
    /// Name of generated proxies. `{requested}` is replaced with the
    /// requested type's name, `{n}` with a per-context counter.
    pub proxy_name_pattern: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            pool_size: default_pool_size(),
            output_dir: std::env::temp_dir().join("weave-out"),
            module_name: "weave.generated".to_string(),
            proxy_name_pattern: "{requested}_Proxy_{n}".to_string(),
        }
    }
}

fn default_pool_size() -> usize {
    std::thread::available_parallelism().map_or(1, NonZeroUsize::get)
}

impl EngineConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults overlaid with `WEAVE_POOL_SIZE` and `WEAVE_OUTPUT_DIR`.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(raw) = lookup(POOL_SIZE_VAR) {
            match raw.trim().parse::<usize>() {
                Ok(size) if size > 0 => config.pool_size = size,
                _ => tracing::warn!(
                    var = POOL_SIZE_VAR,
                    value = %raw,
                    default = config.pool_size,
                    "invalid pool size; using the default"
                ),
            }
        }
        if let Some(raw) = lookup(OUTPUT_DIR_VAR) {
            if raw.trim().is_empty() {
                tracing::warn!(var = OUTPUT_DIR_VAR, "empty output directory; using the default");
            } else {
                config.output_dir = PathBuf::from(raw);
            }
        }
        config
    }

    /// Set the number of contexts; zero is raised to one.
    #[must_use]
    pub fn with_pool_size(mut self, size: usize) -> Self {
        self.pool_size = size.max(1);
        self
    }

    #[must_use]
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    #[must_use]
    pub fn with_module_name(mut self, name: impl Into<String>) -> Self {
        self.module_name = name.into();
        self
    }

    #[must_use]
    pub fn with_proxy_name_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.proxy_name_pattern = pattern.into();
        self
    }
}
