//! Database configuration

use std::time::Duration;
use typedkv_storage::StorageConfig;

/// Default pause between background reclamation passes
const DEFAULT_MAINTENANCE_INTERVAL: Duration = Duration::from_secs(60);

/// Background space reclamation settings
#[derive(Debug, Clone)]
pub struct MaintenanceConfig {
    /// Run the background worker at all
    pub enabled: bool,
    /// Pause between two passes
    pub interval: Duration,
    /// Discard ratio of the pass run while opening
    pub initial_discard_ratio: f32,
    /// Discard ratio of the recurring passes
    pub discard_ratio: f32,
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval: DEFAULT_MAINTENANCE_INTERVAL,
            initial_discard_ratio: 0.1,
            discard_ratio: 0.5,
        }
    }
}

impl MaintenanceConfig {
    /// Config with the background worker turned off
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Default::default()
        }
    }

    /// Set the pause between passes
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Set the discard ratio of recurring passes
    pub fn with_discard_ratio(mut self, ratio: f32) -> Self {
        self.discard_ratio = ratio;
        self
    }
}

/// Top-level configuration for [`Database`](crate::Database)
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Engine settings
    pub storage: StorageConfig,
    /// Background maintenance settings
    pub maintenance: MaintenanceConfig,
    /// Run a major compaction while opening
    pub compact_on_open: bool,
    /// Entries per write batch while loading a backup
    pub restore_batch_size: usize,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            storage: StorageConfig::default(),
            maintenance: MaintenanceConfig::default(),
            compact_on_open: true,
            restore_batch_size: 64,
        }
    }
}

impl DatabaseConfig {
    /// Set the engine settings
    pub fn with_storage(mut self, storage: StorageConfig) -> Self {
        self.storage = storage;
        self
    }

    /// Set the maintenance settings
    pub fn with_maintenance(mut self, maintenance: MaintenanceConfig) -> Self {
        self.maintenance = maintenance;
        self
    }

    /// Choose whether opening runs a major compaction
    pub fn with_compact_on_open(mut self, enabled: bool) -> Self {
        self.compact_on_open = enabled;
        self
    }

    /// Set how many entries a backup load writes per batch
    pub fn with_restore_batch_size(mut self, entries: usize) -> Self {
        self.restore_batch_size = entries.max(1);
        self
    }
}
