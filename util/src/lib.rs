//! Utility library for the expert agent software

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

pub mod archive;
pub mod host;
pub mod logger;
pub mod module;
pub mod params;
pub mod session;
pub mod time;
