//! Parameters structure for the agent shell

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::Deserialize;
use std::path::PathBuf;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for the agent shell.
///
/// The `counter_destroy` and `force_destroy_actor` fields accept the
/// misspelled keys found in legacy configuration files.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct Params {
    // ---- DATA COLLECTION ----

    /// Master switch for training-data collection.
    ///
    /// When enabled `debug_print` is forced off.
    pub save_data: bool,

    /// Enable verbose route debugging output.
    pub debug_print: bool,

    /// Stop counter value at or above which sampling is suppressed, so that
    /// long stalls do not fill the store with identical frames.
    pub max_stop_num: u64,

    /// Weather-change indicator echoed into each telemetry sample.
    pub weather_change: f32,

    /// Number of buffered samples that triggers a flush.
    pub num_per_flush: usize,

    /// Directory under which flush-episode stores are created.
    pub data_save: PathBuf,

    /// Route identifier, used in store directory names.
    pub route_id: u32,

    // ---- STALL RECOVERY ----

    /// Stop counter value above which a blocking actor is forcibly
    /// destroyed.
    #[serde(alias = "counter_destory")]
    pub counter_destroy: u64,

    /// Master switch for forced actor destruction.
    #[serde(alias = "force_destory_actor")]
    pub force_destroy_actor: bool,
}
