//! Engine-wide configuration (spec §6's environment/configuration table).

use std::time::Duration;

/// Write-path migration mode. `Disabled` bypasses the granular engine
/// entirely; any other value enables granular writes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MigrationMode {
    Disabled,
    DualWrite,
    ReadOnly,
    Full,
}

impl MigrationMode {
    pub fn is_enabled(self) -> bool {
        !matches!(self, MigrationMode::Disabled)
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EngineConfig {
    pub migration_mode: MigrationMode,
    /// A pending mutation older than this is dropped by the sweep (spec §4.5).
    pub pending_mutation_timeout: Duration,
    /// How often the sweep runs (spec §4.5, §5).
    pub pending_mutation_sweep_interval: Duration,
    /// Cycle-safety depth cap for descendants BFS (spec §4.9).
    pub descendants_bfs_cap: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            migration_mode: MigrationMode::Full,
            pending_mutation_timeout: Duration::from_secs(10),
            pending_mutation_sweep_interval: Duration::from_secs(5),
            descendants_bfs_cap: 20,
        }
    }
}
