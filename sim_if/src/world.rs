//! # World and Planner Seams
//!
//! Trait seams onto the agent's external collaborators: the simulated world
//! (actor destruction, map queries, weather), the data-provider service
//! which hands out actor state, and the basic-agent planner which turns the
//! route into per-step control commands.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::control::VehicleControl;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Opaque identifier of an actor in the simulated world.
#[derive(Debug, Serialize, Deserialize, Copy, Clone, Hash, Eq, PartialEq)]
pub struct ActorId(pub u64);

/// A position in the world frame.
///
/// Units: meters
#[derive(Debug, Serialize, Deserialize, Copy, Clone, Default, PartialEq)]
pub struct Location {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// An orientation in the world frame.
///
/// Units: degrees
#[derive(Debug, Serialize, Deserialize, Copy, Clone, Default, PartialEq)]
pub struct Rotation {
    pub roll: f64,
    pub pitch: f64,
    pub yaw: f64,
}

/// A position and orientation pair in the world frame.
#[derive(Debug, Serialize, Deserialize, Copy, Clone, Default, PartialEq)]
pub struct Transform {
    pub location: Location,
    pub rotation: Rotation,
}

/// Actors the planner identified as blocking the ego vehicle on this step.
///
/// At most one of each kind is reported. All may be `None` when the road
/// ahead is clear.
#[derive(Debug, Copy, Clone, Default)]
pub struct Blockers {
    /// A blocking vehicle or static obstacle
    pub obstacle: Option<ActorId>,

    /// A red traffic light holding the ego vehicle
    pub traffic_light: Option<ActorId>,

    /// A pedestrian on the ego vehicle's path
    pub walker: Option<ActorId>,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Possible errors raised by the world or actor provider seams.
#[derive(Debug, Error)]
pub enum WorldError {
    #[error("No actor with id {0:?} exists in the world")]
    ActorNotFound(ActorId),

    #[error("No hero vehicle has been registered with the data provider")]
    NoHeroVehicle,

    #[error("No lane waypoint could be projected for location {0:?}")]
    NoWaypoint(Location),
}

/// Possible errors raised by the planner seam.
#[derive(Debug, Error)]
pub enum PlannerError {
    #[error("The planner has no route to follow")]
    NoRoute,

    #[error("Planner failure: {0}")]
    Internal(String),
}

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

/// Seam onto the simulated world.
pub trait World {
    /// Remove the given actor from the world.
    fn destroy_actor(&mut self, actor: ActorId) -> Result<(), WorldError>;

    /// Query whether the map waypoint at `location` lies within a junction.
    fn is_junction(&self, location: &Location) -> Result<bool, WorldError>;

    /// Weather-change hook, invoked by the agent on a fixed cadence during
    /// data collection. Implementations are free to ignore it.
    fn apply_weather(&mut self, indicator: f32);
}

/// Seam onto the data-provider service which owns actor state.
pub trait ActorProvider {
    /// Handle of the ego (hero) vehicle.
    fn hero_vehicle(&self) -> Result<ActorId, WorldError>;

    /// Current world-frame location of the given actor.
    fn location_of(&self, actor: ActorId) -> Result<Location, WorldError>;

    /// Current speed of the given actor.
    ///
    /// Units: kilometers/hour
    fn speed_kmh_of(&self, actor: ActorId) -> Result<f64, WorldError>;

    /// Project a world location onto the centre of the nearest lane.
    fn project_to_lane(&self, location: &Location) -> Result<Location, WorldError>;
}

/// Seam onto the basic-agent planner.
pub trait Planner {
    /// Hand the planner the route to follow, as lane-centre locations.
    fn set_route(&mut self, route: &[Location]) -> Result<(), PlannerError>;

    /// Execute one planning step, producing a control command and any
    /// actors currently blocking the ego vehicle.
    fn run_step(&mut self) -> Result<(VehicleControl, Blockers), PlannerError>;
}

/// Factory seam used by the agent to construct the planner lazily, once the
/// hero vehicle handle is available.
pub trait PlannerBuilder {
    fn build(&self, hero: ActorId, debug: bool) -> Result<Box<dyn Planner>, PlannerError>;
}
