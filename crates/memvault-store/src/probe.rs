//! Backend capability probing.
//!
//! Backend selection is a strategy chosen at construction time, so tests and
//! tooling can force either path deterministically instead of sniffing the
//! environment inline.

use crate::options::StoreOptions;

/// Strategy deciding whether a durable backend can be constructed.
pub trait CapabilityProbe: Send + Sync {
    /// Report whether the durable backend is available for these options.
    fn durable_available(&self, options: &StoreOptions) -> bool;
}

/// Default probe: durable storage is available when the root directory
/// exists or can be created.
pub struct DiskProbe;

impl CapabilityProbe for DiskProbe {
    fn durable_available(&self, options: &StoreOptions) -> bool {
        std::fs::create_dir_all(&options.root).is_ok()
    }
}

/// Probe with a fixed answer.
pub struct StaticProbe(pub bool);

impl CapabilityProbe for StaticProbe {
    fn durable_available(&self, _options: &StoreOptions) -> bool {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::{CapabilityProbe, DiskProbe, StaticProbe};
    use crate::options::StoreOptions;
    use tempfile::tempdir;

    #[test]
    fn disk_probe_accepts_a_creatable_root() {
        let temp = tempdir().expect("tempdir");
        let options = StoreOptions::new(temp.path().join("nested/store"));
        assert!(DiskProbe.durable_available(&options));
    }

    #[test]
    fn static_probe_returns_its_answer() {
        let options = StoreOptions::new("/nonexistent");
        assert!(StaticProbe(true).durable_available(&options));
        assert!(!StaticProbe(false).durable_available(&options));
    }
}
