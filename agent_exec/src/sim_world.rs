//! In-process scripted world
//!
//! A small kinematic stand-in for the simulator, the data provider and the
//! basic-agent planner, used by the demo runner and scenario tests. The road
//! runs along the +x axis with the lane centre at y = 0.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{debug, warn};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

// Internal
use sim_if::control::VehicleControl;
use sim_if::world::{
    ActorId, ActorProvider, Blockers, Location, Planner, PlannerBuilder, PlannerError, World,
    WorldError,
};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Half width of the single simulated lane.
///
/// Units: meters
pub const LANE_HALF_WIDTH_M: f64 = 2.0;

/// Actors closer ahead than this block the ego vehicle.
///
/// Units: meters
const BLOCK_RANGE_M: f64 = 10.0;

/// Top speed the scripted planner drives at.
///
/// Units: kilometers/hour
const CRUISE_SPEED_KMH: f64 = 40.0;

/// A route waypoint is considered reached within this distance.
///
/// Units: meters
const WAYPOINT_RADIUS_M: f64 = 3.0;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Kinds of actor the scripted world can hold.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum SimActorKind {
    Vehicle,
    Walker,
    TrafficLight,
}

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// An actor in the scripted world.
#[derive(Debug, Copy, Clone)]
pub struct SimActor {
    pub kind: SimActorKind,
    pub location: Location,
    pub speed_kmh: f64,
}

/// Inner world state shared between the seams.
struct SimState {
    actors: HashMap<ActorId, SimActor>,
    hero: Option<ActorId>,
    next_id: u64,
    junctions: Vec<(Location, f64)>,
    weather_indicator: f32,
}

/// Cloneable handle onto the scripted world.
///
/// One handle is passed to the agent as each of its collaborator seams, all
/// sharing the same single-threaded state.
#[derive(Clone)]
pub struct SimHandle {
    state: Rc<RefCell<SimState>>,
}

/// Scripted planner: follows the route at cruise speed and brakes for any
/// actor inside the block range.
pub struct SimPlanner {
    handle: SimHandle,
    route: Vec<Location>,
    next_waypoint: usize,
    debug: bool,
}

/// Builds [`SimPlanner`] instances over a shared world handle.
pub struct SimPlannerBuilder {
    handle: SimHandle,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl SimHandle {
    /// Create an empty world.
    pub fn new() -> Self {
        SimHandle {
            state: Rc::new(RefCell::new(SimState {
                actors: HashMap::new(),
                hero: None,
                next_id: 1,
                junctions: Vec::new(),
                weather_indicator: 0.0,
            })),
        }
    }

    /// Spawn the ego vehicle. There is exactly one, respawning replaces it.
    pub fn spawn_hero(&self, location: Location) -> ActorId {
        let id = self.spawn_actor(SimActorKind::Vehicle, location, 0.0);
        self.state.borrow_mut().hero = Some(id);
        id
    }

    /// Spawn an actor, returning its id.
    pub fn spawn_actor(&self, kind: SimActorKind, location: Location, speed_kmh: f64) -> ActorId {
        let mut state = self.state.borrow_mut();
        let id = ActorId(state.next_id);
        state.next_id += 1;
        state.actors.insert(
            id,
            SimActor {
                kind,
                location,
                speed_kmh,
            },
        );

        id
    }

    /// Mark a circular junction region on the map.
    pub fn add_junction(&self, centre: Location, radius_m: f64) {
        self.state.borrow_mut().junctions.push((centre, radius_m));
    }

    /// Apply a control command to the hero vehicle over one cycle.
    ///
    /// First-order speed response, motion along +x only.
    pub fn apply_control(&self, control: &VehicleControl, dt_s: f64) {
        let mut state = self.state.borrow_mut();

        let hero = match state.hero {
            Some(h) => h,
            None => {
                warn!("Cannot apply control, no hero vehicle spawned");
                return;
            }
        };

        if let Some(actor) = state.actors.get_mut(&hero) {
            let target_kmh = if control.brake > 0.0 {
                0.0
            } else {
                control.throttle * CRUISE_SPEED_KMH
            };

            actor.speed_kmh += (target_kmh - actor.speed_kmh) * (dt_s * 2.0).min(1.0);
            actor.location.x += actor.speed_kmh / 3.6 * dt_s;
        }
    }

    /// Current hero speed in meters/second, as a speedometer would report.
    pub fn hero_speed_ms(&self) -> f64 {
        let state = self.state.borrow();
        match state.hero.and_then(|h| state.actors.get(&h)) {
            Some(actor) => actor.speed_kmh / 3.6,
            None => 0.0,
        }
    }

    /// Number of actors currently in the world.
    pub fn actor_count(&self) -> usize {
        self.state.borrow().actors.len()
    }

    /// Last weather indicator applied through the world seam.
    pub fn weather_indicator(&self) -> f32 {
        self.state.borrow().weather_indicator
    }
}

impl World for SimHandle {
    fn destroy_actor(&mut self, actor: ActorId) -> Result<(), WorldError> {
        let mut state = self.state.borrow_mut();

        // The hero is not destroyable
        if state.hero == Some(actor) {
            return Err(WorldError::ActorNotFound(actor));
        }

        match state.actors.remove(&actor) {
            Some(_) => Ok(()),
            None => Err(WorldError::ActorNotFound(actor)),
        }
    }

    fn is_junction(&self, location: &Location) -> Result<bool, WorldError> {
        let state = self.state.borrow();

        Ok(state.junctions.iter().any(|(centre, radius)| {
            let dx = location.x - centre.x;
            let dy = location.y - centre.y;
            (dx * dx + dy * dy).sqrt() <= *radius
        }))
    }

    fn apply_weather(&mut self, indicator: f32) {
        self.state.borrow_mut().weather_indicator = indicator;
    }
}

impl ActorProvider for SimHandle {
    fn hero_vehicle(&self) -> Result<ActorId, WorldError> {
        self.state.borrow().hero.ok_or(WorldError::NoHeroVehicle)
    }

    fn location_of(&self, actor: ActorId) -> Result<Location, WorldError> {
        match self.state.borrow().actors.get(&actor) {
            Some(a) => Ok(a.location),
            None => Err(WorldError::ActorNotFound(actor)),
        }
    }

    fn speed_kmh_of(&self, actor: ActorId) -> Result<f64, WorldError> {
        match self.state.borrow().actors.get(&actor) {
            Some(a) => Ok(a.speed_kmh),
            None => Err(WorldError::ActorNotFound(actor)),
        }
    }

    fn project_to_lane(&self, location: &Location) -> Result<Location, WorldError> {
        // The single lane runs along the x axis
        Ok(Location {
            x: location.x,
            y: 0.0,
            z: location.z,
        })
    }
}

impl Planner for SimPlanner {
    fn set_route(&mut self, route: &[Location]) -> Result<(), PlannerError> {
        if route.is_empty() {
            return Err(PlannerError::NoRoute);
        }

        self.route = route.to_vec();
        self.next_waypoint = 0;

        Ok(())
    }

    fn run_step(&mut self) -> Result<(VehicleControl, Blockers), PlannerError> {
        if self.route.is_empty() {
            return Err(PlannerError::NoRoute);
        }

        let state = self.handle.state.borrow();

        let hero = state
            .hero
            .ok_or_else(|| PlannerError::Internal(String::from("no hero vehicle")))?;
        let hero_loc = state
            .actors
            .get(&hero)
            .ok_or_else(|| PlannerError::Internal(String::from("hero vehicle despawned")))?
            .location;

        // Advance the waypoint cursor past anything already reached
        while self.next_waypoint < self.route.len() {
            let wp = self.route[self.next_waypoint];
            if (wp.x - hero_loc.x).abs() > WAYPOINT_RADIUS_M {
                break;
            }
            self.next_waypoint += 1;
        }

        // Collect one blocking actor of each kind
        let mut blockers = Blockers::default();
        for (id, actor) in state.actors.iter() {
            if *id == hero {
                continue;
            }

            let dx = actor.location.x - hero_loc.x;
            let dy = actor.location.y - hero_loc.y;
            if dx < 0.0 || dx > BLOCK_RANGE_M || dy.abs() > LANE_HALF_WIDTH_M {
                continue;
            }

            match actor.kind {
                SimActorKind::Vehicle => blockers.obstacle = blockers.obstacle.or(Some(*id)),
                SimActorKind::Walker => blockers.walker = blockers.walker.or(Some(*id)),
                SimActorKind::TrafficLight => {
                    blockers.traffic_light = blockers.traffic_light.or(Some(*id))
                }
            }
        }

        let blocked = blockers.obstacle.is_some()
            || blockers.walker.is_some()
            || blockers.traffic_light.is_some();

        let control = if blocked || self.next_waypoint >= self.route.len() {
            VehicleControl::full_brake()
        } else {
            let wp = self.route[self.next_waypoint];
            VehicleControl {
                steer: ((wp.y - hero_loc.y) * 0.1).max(-1.0).min(1.0),
                throttle: 0.6,
                brake: 0.0,
            }
        };

        if self.debug {
            debug!(
                "Planner step: wp {}/{}, blocked: {}",
                self.next_waypoint,
                self.route.len(),
                blocked
            );
        }

        Ok((control, blockers))
    }
}

impl SimPlannerBuilder {
    pub fn new(handle: SimHandle) -> Self {
        SimPlannerBuilder { handle }
    }
}

impl PlannerBuilder for SimPlannerBuilder {
    fn build(&self, _hero: ActorId, debug: bool) -> Result<Box<dyn Planner>, PlannerError> {
        Ok(Box::new(SimPlanner {
            handle: self.handle.clone(),
            route: Vec::new(),
            next_waypoint: 0,
            debug,
        }))
    }
}

impl Default for SimHandle {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    fn loc(x: f64, y: f64) -> Location {
        Location { x, y, z: 0.0 }
    }

    #[test]
    fn test_planner_brakes_for_blocker() {
        let handle = SimHandle::new();
        let hero = handle.spawn_hero(loc(0.0, 0.0));
        let parked = handle.spawn_actor(SimActorKind::Vehicle, loc(5.0, 0.5), 0.0);

        let builder = SimPlannerBuilder::new(handle.clone());
        let mut planner = builder.build(hero, false).unwrap();
        planner.set_route(&[loc(50.0, 0.0)]).unwrap();

        let (control, blockers) = planner.run_step().unwrap();
        assert_eq!(control, VehicleControl::full_brake());
        assert_eq!(blockers.obstacle, Some(parked));

        // Once the blocker is gone the planner drives again
        let mut world = handle.clone();
        world.destroy_actor(parked).unwrap();

        let (control, blockers) = planner.run_step().unwrap();
        assert!(control.throttle > 0.0);
        assert!(blockers.obstacle.is_none());
    }

    #[test]
    fn test_blockers_respect_lane_and_range() {
        let handle = SimHandle::new();
        let hero = handle.spawn_hero(loc(0.0, 0.0));

        // Behind, off-lane, and out of range actors do not block
        handle.spawn_actor(SimActorKind::Vehicle, loc(-5.0, 0.0), 0.0);
        handle.spawn_actor(SimActorKind::Walker, loc(5.0, 4.0), 0.0);
        handle.spawn_actor(SimActorKind::Vehicle, loc(50.0, 0.0), 0.0);

        let builder = SimPlannerBuilder::new(handle.clone());
        let mut planner = builder.build(hero, false).unwrap();
        planner.set_route(&[loc(100.0, 0.0)]).unwrap();

        let (_, blockers) = planner.run_step().unwrap();
        assert!(blockers.obstacle.is_none());
        assert!(blockers.walker.is_none());
        assert!(blockers.traffic_light.is_none());
    }

    #[test]
    fn test_world_queries() {
        let mut handle = SimHandle::new();
        let hero = handle.spawn_hero(loc(0.0, 0.0));
        handle.add_junction(loc(90.0, 0.0), 15.0);

        assert!(!handle.is_junction(&loc(0.0, 0.0)).unwrap());
        assert!(handle.is_junction(&loc(80.0, 0.0)).unwrap());

        // Lane projection snaps to the lane centre
        let projected = handle.project_to_lane(&loc(10.0, 1.5)).unwrap();
        assert_eq!(projected, loc(10.0, 0.0));

        // The hero cannot be destroyed
        assert!(handle.destroy_actor(hero).is_err());

        // Weather indicator round-trips through the seam
        handle.apply_weather(0.5);
        assert_eq!(handle.weather_indicator(), 0.5);
    }
}
