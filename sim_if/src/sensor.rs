//! # Sensor Interface Module
//!
//! Defines the static sensor descriptor table the agent declares to the
//! harness, and the per-step sensor frames the harness delivers back.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use ndarray::Array3;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Identifier of the forward RGB camera.
pub const RGB_CAMERA_ID: &str = "RGB";

/// Identifier of the forward semantic segmentation camera.
pub const SEM_CAMERA_ID: &str = "SEM";

/// Identifier of the ego vehicle speedometer.
pub const SPEEDOMETER_ID: &str = "EGO";

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Mounting transform of a sensor relative to the ego vehicle body.
#[derive(Debug, Serialize, Deserialize, Copy, Clone, Default)]
pub struct MountTransform {
    /// Forward offset, meters
    pub x: f64,

    /// Lateral offset, meters
    pub y: f64,

    /// Vertical offset, meters
    pub z: f64,

    /// Roll, degrees
    pub roll: f64,

    /// Pitch, degrees
    pub pitch: f64,

    /// Yaw, degrees
    pub yaw: f64,
}

/// Geometry of a camera sensor.
#[derive(Debug, Serialize, Deserialize, Copy, Clone)]
pub struct CameraGeometry {
    /// Mounting transform in the vehicle body frame
    pub mount: MountTransform,

    /// Image width in pixels
    pub width: u32,

    /// Image height in pixels
    pub height: u32,

    /// Horizontal field of view, degrees
    pub fov: f64,
}

/// A single sensor reading as delivered by the harness.
#[derive(Debug, Clone)]
pub struct SensorReading {
    /// Simulation frame the reading was captured on
    pub frame_id: u64,

    /// The reading itself
    pub frame: SensorFrame,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// A sensor the agent requests from the harness.
///
/// The agent's table is static: two forward cameras sharing one geometry and
/// a speedometer.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub enum SensorSpec {
    /// An RGB camera
    RgbCamera {
        id: String,
        geometry: CameraGeometry,
    },

    /// A semantic segmentation camera with per-pixel class tags
    SemanticCamera {
        id: String,
        geometry: CameraGeometry,
    },

    /// Ego vehicle speedometer
    Speedometer { id: String },
}

/// The payload of a single sensor reading.
#[derive(Debug, Clone)]
pub enum SensorFrame {
    /// Camera image in `H x W x C` layout. The harness delivers 4-channel
    /// (alpha-carrying) images; consumers truncate or index the channel
    /// axis as needed.
    Image(Array3<u8>),

    /// Ego vehicle speed, meters/second.
    Speed(f64),
}

// ------------------------------------------------------------------------------------------------
// TYPES
// ------------------------------------------------------------------------------------------------

/// All sensor readings for one step, keyed by sensor identifier.
pub type SensorData = HashMap<String, SensorReading>;

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl SensorSpec {
    /// The stable identifier used to look this sensor's readings up at each
    /// step.
    pub fn id(&self) -> &str {
        match self {
            SensorSpec::RgbCamera { id, .. } => id,
            SensorSpec::SemanticCamera { id, .. } => id,
            SensorSpec::Speedometer { id } => id,
        }
    }
}
