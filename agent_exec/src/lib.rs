//! # Expert agent library.
//!
//! This library allows other crates in the workspace to access items defined inside the agent
//! crate.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Agent shell - adapts the harness lifecycle calls into control output, data sampling and
/// stuck-actor recovery
pub mod agent;

/// Data collector - frame buffering and flushes into the embedded training-data store
pub mod collector;

/// Stall monitor - stuck-vehicle detection and forced actor recovery
pub mod stall;

/// Scripted world - in-process stand-in for the simulator and planner
#[cfg(feature = "sim")]
pub mod sim_world;
