//! Agent shell module
//!
//! The shell adapts the harness lifecycle calls (`init`, `set_route`,
//! `sensors`, `proc`, `destroy`) into three concerns: forwarding control
//! from the external planner, sampling sensor frames for the training-data
//! collector, and recovering from stuck states.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod params;
mod state;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// Internal
pub use params::*;
pub use state::*;

use crate::collector::CollectorError;
use sim_if::world::{PlannerError, WorldError};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// A sample is taken every this many frames.
pub const SAMPLE_PERIOD_FRAMES: u64 = 5;

/// The weather-change hook fires every this many frames.
pub const WEATHER_PERIOD_FRAMES: u64 = 50;

/// Conversion factor between kilometers/hour and meters/second.
pub const KMH_PER_MS: f64 = 3.6;

/// Width of both declared cameras, pixels.
pub const CAMERA_WIDTH: u32 = 1024;

/// Height of both declared cameras, pixels.
pub const CAMERA_HEIGHT: u32 = 288;

/// Horizontal field of view of both declared cameras, degrees.
pub const CAMERA_FOV: f64 = 100.0;

/// Forward mounting offset of both cameras, meters.
pub const CAMERA_MOUNT_X: f64 = 1.5;

/// Vertical mounting offset of both cameras, meters.
pub const CAMERA_MOUNT_Z: f64 = 2.4;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Possible errors that can occur during agent operation.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("No route has been set, the harness must supply the global plan before the first step")]
    NoRoute,

    #[error("Missing reading for sensor `{0}`")]
    MissingSensor(&'static str),

    #[error("Reading for sensor `{0}` has an unexpected payload type")]
    WrongPayload(&'static str),

    #[error("World error: {0}")]
    WorldError(#[from] WorldError),

    #[error("Planner error: {0}")]
    PlannerError(#[from] PlannerError),

    #[error("Data collection error: {0}")]
    CollectorError(#[from] CollectorError),
}
