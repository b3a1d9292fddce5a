/// Tuning knobs for an [`AssociationStore`](crate::AssociationStore).
///
/// # Examples
///
/// ```
/// use sovran_assoc::{AssociationStore, StoreConfig};
///
/// let config = StoreConfig::default()
///     .with_workers(4)
///     .with_thread_name("props-writer");
/// let store = AssociationStore::with_config(config);
/// assert_eq!(store.config().workers(), 4);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    workers: usize,
    thread_name: String,
    sweep_on_access: bool,
}

impl StoreConfig {
    pub const DEFAULT_WORKERS: usize = 2;
    pub const DEFAULT_THREAD_NAME: &'static str = "sovran-assoc-writer";

    /// Sets how many background threads apply non-atomic writes. Clamped to at least one.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Sets the name prefix of the background writer threads.
    pub fn with_thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }

    /// Controls whether `get` and `set` sweep stale entries first.
    ///
    /// With this off, stale entries linger until [`sweep`](crate::AssociationStore::sweep)
    /// is called explicitly. Reads are unaffected either way.
    pub fn with_sweep_on_access(mut self, enabled: bool) -> Self {
        self.sweep_on_access = enabled;
        self
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn thread_name(&self) -> &str {
        &self.thread_name
    }

    pub fn sweep_on_access(&self) -> bool {
        self.sweep_on_access
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            workers: Self::DEFAULT_WORKERS,
            thread_name: Self::DEFAULT_THREAD_NAME.to_string(),
            sweep_on_access: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = StoreConfig::default();
        assert_eq!(config.workers(), 2);
        assert_eq!(config.thread_name(), "sovran-assoc-writer");
        assert!(config.sweep_on_access());
    }

    #[test]
    fn test_workers_are_clamped() {
        assert_eq!(StoreConfig::default().with_workers(0).workers(), 1);
        assert_eq!(StoreConfig::default().with_workers(8).workers(), 8);
    }

    #[test]
    fn test_builder_chain() {
        let config = StoreConfig::default()
            .with_thread_name("writer")
            .with_sweep_on_access(false);
        assert_eq!(config.thread_name(), "writer");
        assert!(!config.sweep_on_access());
    }
}
