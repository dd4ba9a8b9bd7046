//! # Vehicle Control Command Module

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// A control command to be applied to the ego vehicle by the harness.
#[derive(Debug, Serialize, Deserialize, Copy, Clone, Default, PartialEq)]
pub struct VehicleControl {
    /// Steering demand, between -1 (full left) and +1 (full right).
    pub steer: f64,

    /// Throttle demand, between 0 and 1.
    pub throttle: f64,

    /// Brake demand, between 0 and 1.
    pub brake: f64,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl VehicleControl {
    /// The safe default command: no steer, no throttle, full brake.
    ///
    /// Returned by the agent on its very first step, before the planner has
    /// been initialised.
    pub fn full_brake() -> Self {
        VehicleControl {
            steer: 0.0,
            throttle: 0.0,
            brake: 1.0,
        }
    }
}
