//! # Simulator interface crate.
//!
//! Provides the types and trait seams between the expert agent and its
//! external collaborators: the leaderboard harness which delivers sensor
//! readings, the simulated world, and the basic-agent planner.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Vehicle control command definitions
pub mod control;

/// Global route plan handed over by the harness at setup
pub mod route;

/// Sensor descriptors and per-step sensor frames
pub mod sensor;

/// World, actor provider and planner trait seams
pub mod world;
