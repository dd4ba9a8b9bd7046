//! Main agent-side executable entry point.
//!
//! # Architecture
//!
//! In a leaderboard deployment the external harness owns the agent's
//! lifecycle: it calls `init` once, hands over the global route plan, then
//! drives `proc` at its own cadence and finally calls `destroy`. This
//! executable reproduces that cadence against the in-process scripted world
//! so an episode can be run end to end without a simulator:
//!
//!     - Initialise the session, logger and agent
//!     - Build the scripted world, route and sensor geometry
//!     - Main loop:
//!         - Synthesise this cycle's sensor readings
//!         - Agent step processing
//!         - Apply the returned control to the world
//!         - Write archives
//!     - Teardown (final data flush)

// ---------------------------------------------------------------------------
// USE MODULES FROM LIBRARY
// ---------------------------------------------------------------------------

use agent_lib::agent::{ExpertAgent, StepInput};
use agent_lib::sim_world::{SimActorKind, SimHandle, SimPlannerBuilder};

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use color_eyre::{
    eyre::{eyre, WrapErr},
    Report,
};
use log::{debug, info, warn};
use ndarray::Array3;
use std::env;
use std::thread;
use std::time::{Duration, Instant};

// Internal
use sim_if::route::RoutePlan;
use sim_if::sensor::{
    SensorData, SensorFrame, SensorReading, SensorSpec, RGB_CAMERA_ID, SEM_CAMERA_ID,
    SPEEDOMETER_ID,
};
use sim_if::world::{Location, Rotation, Transform};
use util::{
    archive::Archived,
    logger::{logger_init, LevelFilter},
    module::State,
    session::Session,
};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Target period of one cycle.
const CYCLE_PERIOD_S: f64 = 0.05;

/// Number of cycles to run the episode for.
const NUM_CYCLES: u64 = 400;

/// Default parameter file, used when no path is given on the command line.
const DEFAULT_PARAMS_FILE: &str = "agent.toml";

/// Spacing of the demo route's waypoints.
///
/// Units: meters
const ROUTE_SPACING_M: f64 = 5.0;

/// Length of the demo route.
///
/// Units: meters
const ROUTE_LENGTH_M: f64 = 200.0;

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Executable main function, entry point.
fn main() -> Result<(), Report> {
    // ---- EARLY INITIALISATION ----

    // Initialise session
    let session = Session::new("agent_exec", "sessions").wrap_err("Failed to create the session")?;

    // Initialise logger
    logger_init(LevelFilter::Trace, &session).wrap_err("Failed to initialise logging")?;

    // Log information on this execution.
    info!("Expert Agent Executable\n");
    info!("Session directory: {:?}\n", session.session_root);

    // ---- PARAMETER FILE SELECTION ----

    // Collect all arguments
    let args: Vec<String> = env::args().collect();

    debug!("CLI arguments: {:?}", args);

    let params_file = match args.len() {
        1 => String::from(DEFAULT_PARAMS_FILE),
        2 => args[1].clone(),
        _ => {
            return Err(eyre!(
                "Expected either zero or one argument, found {}",
                args.len() - 1
            ))
        }
    };

    info!("Using parameter file \"{}\"", params_file);

    // ---- INITIALISE WORLD ----

    // The scripted world stands in for the simulator: a straight lane along
    // +x with a parked vehicle and a crossing walker on the route.
    let world = SimHandle::new();

    world.spawn_hero(Location::default());
    world.spawn_actor(
        SimActorKind::Vehicle,
        Location {
            x: 60.0,
            y: 0.5,
            z: 0.0,
        },
        0.0,
    );
    world.spawn_actor(
        SimActorKind::Walker,
        Location {
            x: 120.0,
            y: -0.5,
            z: 0.0,
        },
        0.0,
    );
    world.add_junction(
        Location {
            x: 90.0,
            y: 0.0,
            z: 0.0,
        },
        15.0,
    );

    info!("Scripted world initialised with {} actors", world.actor_count());

    // ---- INITIALISE AGENT ----

    let mut agent = ExpertAgent::new(
        Box::new(world.clone()),
        Box::new(world.clone()),
        Box::new(SimPlannerBuilder::new(world.clone())),
    );

    agent
        .init(params_file, &session)
        .wrap_err("Failed to initialise the agent")?;
    info!("Agent init complete");

    // Hand the route over, as the harness would after setup
    let num_points = (ROUTE_LENGTH_M / ROUTE_SPACING_M) as usize + 1;
    let route: Vec<Transform> = (0..num_points)
        .map(|i| Transform {
            location: Location {
                x: i as f64 * ROUTE_SPACING_M,
                y: 0.0,
                z: 0.0,
            },
            rotation: Rotation::default(),
        })
        .collect();
    agent.set_route(RoutePlan::new(route));

    // Camera geometry for synthesising frames comes from the agent's own
    // declared sensor table
    let (frame_height, frame_width) = camera_shape(&agent.sensors())
        .ok_or_else(|| eyre!("Agent declared no camera sensor"))?;

    info!("Agent initialisation complete\n");

    // ---- MAIN LOOP ----

    info!("Begining main loop\n");

    for cycle in 0..NUM_CYCLES {
        // Get cycle start time
        let cycle_start_instant = Instant::now();

        let timestamp = cycle as f64 * CYCLE_PERIOD_S;

        // ---- SENSOR SYNTHESIS ----

        let input = StepInput {
            sensors: synthesise_sensors(&world, frame_height, frame_width, cycle),
            timestamp,
        };

        // ---- AGENT PROCESSING ----

        let (control, report) = agent
            .proc(&input)
            .wrap_err_with(|| format!("Agent step {} failed", cycle))?;

        if let Some(actor) = report.destroyed_actor {
            info!("Cycle {}: stall recovery removed actor {:?}", cycle, actor);
        }

        // ---- WORLD UPDATE ----

        world.apply_control(&control, CYCLE_PERIOD_S);

        if cycle % 20 == 0 {
            info!(
                "Cycle {:3}: speed {:5.2} m/s, stop counter {:3}, {} samples buffered",
                cycle,
                world.hero_speed_ms(),
                report.stop_counter,
                report.buffered
            );
        }

        // ---- WRITE ARCHIVES ----

        if let Err(e) = agent.write() {
            warn!("Could not write agent archives: {}", e);
        }

        // ---- CYCLE MANAGEMENT ----

        let cycle_dur = Instant::now() - cycle_start_instant;

        match Duration::from_secs_f64(CYCLE_PERIOD_S).checked_sub(cycle_dur) {
            Some(d) => thread::sleep(d),
            None => warn!(
                "Cycle overran by {:.06} s",
                cycle_dur.as_secs_f64() - CYCLE_PERIOD_S
            ),
        }
    }

    // ---- SHUTDOWN ----

    agent.destroy().wrap_err("Failed to tear the agent down")?;

    info!("End of execution");

    Ok(())
}

/// Extract the (height, width) of the first declared camera.
fn camera_shape(sensors: &[SensorSpec]) -> Option<(usize, usize)> {
    sensors.iter().find_map(|s| match s {
        SensorSpec::RgbCamera { geometry, .. } | SensorSpec::SemanticCamera { geometry, .. } => {
            Some((geometry.height as usize, geometry.width as usize))
        }
        SensorSpec::Speedometer { .. } => None,
    })
}

/// Synthesise one cycle's sensor readings from the scripted world.
///
/// The camera images are flat 4-channel frames carrying the cycle number,
/// enough to exercise the collection path without a renderer.
fn synthesise_sensors(
    world: &SimHandle,
    frame_height: usize,
    frame_width: usize,
    cycle: u64,
) -> SensorData {
    let fill = (cycle % 256) as u8;

    let mut sensors = SensorData::new();
    sensors.insert(
        String::from(RGB_CAMERA_ID),
        SensorReading {
            frame_id: cycle,
            frame: SensorFrame::Image(Array3::from_elem((frame_height, frame_width, 4), fill)),
        },
    );
    sensors.insert(
        String::from(SEM_CAMERA_ID),
        SensorReading {
            frame_id: cycle,
            frame: SensorFrame::Image(Array3::from_elem((frame_height, frame_width, 4), fill)),
        },
    );
    sensors.insert(
        String::from(SPEEDOMETER_ID),
        SensorReading {
            frame_id: cycle,
            frame: SensorFrame::Speed(world.hero_speed_ms()),
        },
    );

    sensors
}
