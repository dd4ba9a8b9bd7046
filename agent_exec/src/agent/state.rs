//! Implementations for the agent shell state structure

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{info, trace};
use ndarray::Array3;
use serde::Serialize;

// Internal
use super::{
    AgentError, Params, CAMERA_FOV, CAMERA_HEIGHT, CAMERA_MOUNT_X, CAMERA_MOUNT_Z, CAMERA_WIDTH,
    KMH_PER_MS, SAMPLE_PERIOD_FRAMES, WEATHER_PERIOD_FRAMES,
};
use crate::collector::{DatasetWriter, FrameBuffer, Telemetry};
use crate::stall::StallMonitor;
use sim_if::control::VehicleControl;
use sim_if::route::RoutePlan;
use sim_if::sensor::{
    CameraGeometry, MountTransform, SensorData, SensorFrame, SensorReading, SensorSpec,
    RGB_CAMERA_ID, SEM_CAMERA_ID, SPEEDOMETER_ID,
};
use sim_if::world::{ActorId, ActorProvider, PlannerBuilder, World, WorldError};
use util::{
    archive::{Archived, Archiver},
    module::State,
    params,
    session::Session,
};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Expert agent shell state.
///
/// Owned by the harness for the whole episode. All counters and buffers live
/// here, there is no module-level state.
pub struct ExpertAgent {
    pub(crate) params: Params,

    // External collaborators
    world: Box<dyn World>,
    provider: Box<dyn ActorProvider>,
    planner_builder: Box<dyn PlannerBuilder>,

    /// Planner instance, `None` until the first step lazily initialises it
    planner: Option<Box<dyn sim_if::world::Planner>>,

    /// Global plan handed over by the harness before the first step
    route: Option<RoutePlan>,

    /// Hero vehicle handle, resolved together with the planner
    hero: Option<ActorId>,

    /// Number of active steps processed so far
    num_frames: u64,

    stall: StallMonitor,

    pub(crate) buffer: FrameBuffer,
    pub(crate) writer: DatasetWriter,

    pub(crate) report: StatusReport,
    arch_report: Archiver,
}

/// Input data for one agent step.
pub struct StepInput {
    /// All sensor readings for this step, keyed by sensor identifier
    pub sensors: SensorData,

    /// Simulation timestamp, seconds
    pub timestamp: f64,
}

/// Status report for one agent step.
#[derive(Clone, Copy, Default, Serialize, Debug)]
pub struct StatusReport {
    /// Stop counter value after this step
    pub stop_counter: u64,

    /// True if this step appended a sample to the frame buffer
    pub sampled: bool,

    /// True if this step flushed the frame buffer to a store
    pub flushed: bool,

    /// Number of samples buffered after this step
    pub buffered: usize,

    /// Actor destroyed by stall recovery on this step, if any
    pub destroyed_actor: Option<ActorId>,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl State for ExpertAgent {
    type InitData = String;
    type InitError = params::LoadError;

    type InputData = StepInput;
    type OutputData = VehicleControl;
    type StatusReport = StatusReport;
    type ProcError = AgentError;

    /// Initialise the agent shell.
    ///
    /// Expected init data is the path to the parameter file, as handed over
    /// by the harness. A parameter load failure is returned to the caller
    /// rather than swallowed: an agent without parameters cannot produce
    /// defined behaviour on later steps.
    fn init(&mut self, init_data: Self::InitData, session: &Session)
        -> Result<(), Self::InitError>
    {
        // Load the parameters
        self.params = params::load(&init_data)?;

        // Verbose debugging interferes with the collection cadence
        if self.params.save_data {
            self.params.debug_print = false;
        }

        self.writer = DatasetWriter::new(self.params.data_save.clone(), self.params.route_id);

        // Create the arch folder for the agent
        let mut arch_path = session.arch_root.clone();
        arch_path.push("agent");
        std::fs::create_dir_all(arch_path).unwrap();

        // Initialise the archivers
        self.arch_report = Archiver::from_path(session, "agent/status_report.csv").unwrap();

        Ok(())
    }

    /// Perform one step of navigation.
    fn proc(&mut self, input: &Self::InputData)
        -> Result<(Self::OutputData, Self::StatusReport), Self::ProcError>
    {
        // Clear the status report
        self.report = StatusReport::default();

        trace!("Agent step at t = {:.3} s", input.timestamp);

        // On the very first step the planner does not exist yet. Initialise
        // it and command a full stop, driving starts on the next step.
        let (control, blockers) = match self.planner.as_mut() {
            Some(planner) => planner.run_step()?,
            None => {
                self.init_planner()?;
                return Ok((VehicleControl::full_brake(), self.report));
            }
        };

        let rgb = image_reading(&input.sensors, RGB_CAMERA_ID)?;
        let sem = image_reading(&input.sensors, SEM_CAMERA_ID)?;
        let speed_ms = speed_reading(&input.sensors, SPEEDOMETER_ID)?;

        self.report.stop_counter = self.stall.update(speed_ms);

        if self.num_frames % SAMPLE_PERIOD_FRAMES == 0
            && self.stall.count() < self.params.max_stop_num
            && self.params.save_data
        {
            self.sample(rgb, sem)?;

            if !self.params.debug_print && self.num_frames % WEATHER_PERIOD_FRAMES == 0 {
                self.world.apply_weather(self.params.weather_change);
            }
        }

        self.report.buffered = self.buffer.len();
        self.num_frames += 1;

        if self.stall.count() > self.params.counter_destroy && self.params.force_destroy_actor {
            self.report.destroyed_actor =
                self.stall
                    .recover(self.world.as_mut(), &blockers, self.num_frames)?;
            self.report.stop_counter = self.stall.count();
        }

        Ok((control, self.report))
    }
}

impl Archived for ExpertAgent {
    fn write(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.arch_report.serialise(self.report)?;

        Ok(())
    }
}

impl ExpertAgent {
    /// Create a new agent shell over the given collaborators.
    ///
    /// The shell is not usable until `init` has loaded its parameters and
    /// `set_route` has stored the global plan.
    pub fn new(
        world: Box<dyn World>,
        provider: Box<dyn ActorProvider>,
        planner_builder: Box<dyn PlannerBuilder>,
    ) -> Self {
        ExpertAgent {
            params: Params::default(),
            world,
            provider,
            planner_builder,
            planner: None,
            route: None,
            hero: None,
            num_frames: 0,
            stall: StallMonitor::default(),
            buffer: FrameBuffer::default(),
            writer: DatasetWriter::default(),
            report: StatusReport::default(),
            arch_report: Archiver::default(),
        }
    }

    /// Store the global route plan.
    ///
    /// Must be called before the first step, the plan is immutable
    /// afterwards.
    pub fn set_route(&mut self, route: RoutePlan) {
        self.route = Some(route);
    }

    /// The agent's static sensor table.
    ///
    /// Two forward cameras sharing one geometry plus the ego speedometer.
    pub fn sensors(&self) -> Vec<SensorSpec> {
        let geometry = CameraGeometry {
            mount: MountTransform {
                x: CAMERA_MOUNT_X,
                z: CAMERA_MOUNT_Z,
                ..MountTransform::default()
            },
            width: CAMERA_WIDTH,
            height: CAMERA_HEIGHT,
            fov: CAMERA_FOV,
        };

        vec![
            SensorSpec::RgbCamera {
                id: String::from(RGB_CAMERA_ID),
                geometry,
            },
            SensorSpec::SemanticCamera {
                id: String::from(SEM_CAMERA_ID),
                geometry,
            },
            SensorSpec::Speedometer {
                id: String::from(SPEEDOMETER_ID),
            },
        ]
    }

    /// End the episode, flushing any samples still buffered.
    pub fn destroy(&mut self) -> Result<(), AgentError> {
        if self.buffer.is_empty() {
            return Ok(());
        }

        let store_path = self.writer.flush(&mut self.buffer)?;
        info!("Final flush written to {:?}", store_path);

        Ok(())
    }

    /// One-time planner initialisation, performed on the first step.
    ///
    /// Resolves the hero vehicle from the provider, projects the stored
    /// route onto lane-centre waypoints and hands it to a freshly built
    /// planner.
    fn init_planner(&mut self) -> Result<(), AgentError> {
        let route = self.route.as_ref().ok_or(AgentError::NoRoute)?;
        let hero = self.provider.hero_vehicle()?;

        let mut plan = Vec::with_capacity(route.len());
        for location in route.locations() {
            plan.push(self.provider.project_to_lane(location)?);
        }

        if self.params.debug_print {
            for (i, point) in plan.iter().enumerate() {
                trace!("Route point {}: {:?}", i, point);
            }
        }

        let mut planner = self
            .planner_builder
            .build(hero, self.params.debug_print)?;
        planner.set_route(&plan)?;

        self.hero = Some(hero);
        self.planner = Some(planner);

        info!("Planner initialised with {} route points", plan.len());

        Ok(())
    }

    /// Append one sample to the frame buffer, flushing a full buffer first.
    ///
    /// Telemetry comes from the provider rather than the speedometer input,
    /// converted to the store's meters/second unit.
    fn sample(&mut self, rgb: &Array3<u8>, sem: &Array3<u8>) -> Result<(), AgentError> {
        let hero = self.hero.ok_or(WorldError::NoHeroVehicle)?;

        let speed_ms = self.provider.speed_kmh_of(hero)? / KMH_PER_MS;
        let location = self.provider.location_of(hero)?;
        let at_junction = self.world.is_junction(&location)?;

        // Flush before appending so the buffer never grows beyond the
        // configured batch size
        if self.buffer.len() >= self.params.num_per_flush {
            let store_path = self.writer.flush(&mut self.buffer)?;
            info!("Flushed samples to {:?}", store_path);
            self.report.flushed = true;
        }

        self.buffer.push(
            rgb,
            sem,
            Telemetry {
                speed_ms: speed_ms as f32,
                at_junction,
                weather_change: self.params.weather_change,
            },
        )?;
        self.report.sampled = true;

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

/// Look an image reading up by sensor id.
fn image_reading<'a>(
    sensors: &'a SensorData,
    id: &'static str,
) -> Result<&'a Array3<u8>, AgentError> {
    match sensors.get(id) {
        Some(SensorReading {
            frame: SensorFrame::Image(image),
            ..
        }) => Ok(image),
        Some(_) => Err(AgentError::WrongPayload(id)),
        None => Err(AgentError::MissingSensor(id)),
    }
}

/// Look the speedometer reading up by sensor id.
fn speed_reading(sensors: &SensorData, id: &'static str) -> Result<f64, AgentError> {
    match sensors.get(id) {
        Some(SensorReading {
            frame: SensorFrame::Speed(speed_ms),
            ..
        }) => Ok(*speed_ms),
        Some(_) => Err(AgentError::WrongPayload(id)),
        None => Err(AgentError::MissingSensor(id)),
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use sim_if::world::{Blockers, Location, Planner, PlannerError, Transform};
    use std::cell::{Cell, RefCell};
    use std::collections::HashMap;
    use std::rc::Rc;

    // ---- MOCK COLLABORATORS ----

    /// World which records weather-change applications.
    #[derive(Clone, Default)]
    struct MockWorld {
        weather: Rc<RefCell<Vec<f32>>>,
    }

    impl World for MockWorld {
        fn destroy_actor(&mut self, _actor: ActorId) -> Result<(), WorldError> {
            Ok(())
        }

        fn is_junction(&self, _location: &Location) -> Result<bool, WorldError> {
            Ok(false)
        }

        fn apply_weather(&mut self, indicator: f32) {
            self.weather.borrow_mut().push(indicator);
        }
    }

    /// Provider with an externally scriptable hero speed.
    #[derive(Clone, Default)]
    struct MockProvider {
        speed_kmh: Rc<Cell<f64>>,
    }

    impl ActorProvider for MockProvider {
        fn hero_vehicle(&self) -> Result<ActorId, WorldError> {
            Ok(ActorId(1))
        }

        fn location_of(&self, _actor: ActorId) -> Result<Location, WorldError> {
            Ok(Location::default())
        }

        fn speed_kmh_of(&self, _actor: ActorId) -> Result<f64, WorldError> {
            Ok(self.speed_kmh.get())
        }

        fn project_to_lane(&self, location: &Location) -> Result<Location, WorldError> {
            Ok(*location)
        }
    }

    struct MockPlanner;

    impl Planner for MockPlanner {
        fn set_route(&mut self, _route: &[Location]) -> Result<(), PlannerError> {
            Ok(())
        }

        fn run_step(&mut self) -> Result<(VehicleControl, Blockers), PlannerError> {
            Ok((
                VehicleControl {
                    steer: 0.0,
                    throttle: 0.7,
                    brake: 0.0,
                },
                Blockers::default(),
            ))
        }
    }

    struct MockBuilder;

    impl PlannerBuilder for MockBuilder {
        fn build(
            &self,
            _hero: ActorId,
            _debug: bool,
        ) -> Result<Box<dyn Planner>, PlannerError> {
            Ok(Box::new(MockPlanner))
        }
    }

    // ---- HELPERS ----

    fn test_agent(world: MockWorld, provider: MockProvider, params: Params) -> ExpertAgent {
        let writer = DatasetWriter::new(params.data_save.clone(), params.route_id);

        let mut agent = ExpertAgent::new(
            Box::new(world),
            Box::new(provider),
            Box::new(MockBuilder),
        );
        agent.params = params;
        agent.writer = writer;

        agent.set_route(RoutePlan::new(vec![Transform::default(); 4]));

        agent
    }

    fn step_input(speed_ms: f64) -> StepInput {
        let mut sensors = SensorData::new();
        sensors.insert(
            String::from(RGB_CAMERA_ID),
            SensorReading {
                frame_id: 0,
                frame: SensorFrame::Image(Array3::zeros((4, 6, 4))),
            },
        );
        sensors.insert(
            String::from(SEM_CAMERA_ID),
            SensorReading {
                frame_id: 0,
                frame: SensorFrame::Image(Array3::zeros((4, 6, 4))),
            },
        );
        sensors.insert(
            String::from(SPEEDOMETER_ID),
            SensorReading {
                frame_id: 0,
                frame: SensorFrame::Speed(speed_ms),
            },
        );

        StepInput {
            sensors,
            timestamp: 0.0,
        }
    }

    // ---- TESTS ----

    #[test]
    fn test_first_step_brakes() {
        let mut agent = test_agent(
            MockWorld::default(),
            MockProvider::default(),
            Params::default(),
        );

        // Even an empty sensor map produces the braking default on the
        // first step
        let empty = StepInput {
            sensors: HashMap::new(),
            timestamp: 0.0,
        };
        let (control, _) = agent.proc(&empty).unwrap();

        assert_eq!(control, VehicleControl::full_brake());

        // The next step is planner-driven
        let (control, _) = agent.proc(&step_input(3.0)).unwrap();
        assert!(control.brake < 1.0);
        assert!(control.throttle > 0.0);
    }

    #[test]
    fn test_step_requires_route() {
        let mut agent = test_agent(
            MockWorld::default(),
            MockProvider::default(),
            Params::default(),
        );
        agent.route = None;

        let result = agent.proc(&step_input(3.0));
        assert!(matches!(result, Err(AgentError::NoRoute)));
    }

    #[test]
    fn test_stop_counter_follows_speed() {
        let mut agent = test_agent(
            MockWorld::default(),
            MockProvider::default(),
            Params::default(),
        );

        agent.proc(&step_input(0.0)).unwrap();

        let (_, report) = agent.proc(&step_input(0.3)).unwrap();
        assert_eq!(report.stop_counter, 1);
        let (_, report) = agent.proc(&step_input(0.49)).unwrap();
        assert_eq!(report.stop_counter, 2);
        let (_, report) = agent.proc(&step_input(0.5)).unwrap();
        assert_eq!(report.stop_counter, 0);
    }

    #[test]
    fn test_sampling_cadence_and_flush() {
        let out_dir = tempfile::tempdir().unwrap();
        let provider = MockProvider::default();

        let mut agent = test_agent(
            MockWorld::default(),
            provider.clone(),
            Params {
                save_data: true,
                max_stop_num: 10,
                num_per_flush: 2,
                data_save: out_dir.path().to_path_buf(),
                route_id: 3,
                ..Params::default()
            },
        );

        // First step initialises the planner only
        agent.proc(&step_input(5.0)).unwrap();

        // Eleven active steps cover frames 0..=10, of which 0, 5 and 10
        // qualify for sampling
        for frame in 0..11u64 {
            provider.speed_kmh.set(20.0 + frame as f64);
            let (_, report) = agent.proc(&step_input(5.0)).unwrap();

            assert_eq!(report.sampled, frame % 5 == 0);

            // The third sample finds a full buffer and flushes it before
            // appending
            assert_eq!(report.flushed, frame == 10);
        }

        assert_eq!(agent.buffer.len(), 1);

        // Exactly one store was written, holding the first two samples
        let stores: Vec<_> = std::fs::read_dir(out_dir.path())
            .unwrap()
            .map(|e| e.unwrap().path())
            .collect();
        assert_eq!(stores.len(), 1);

        let db = sled::open(&stores[0]).unwrap();
        assert_eq!(
            db.get(crate::collector::STORE_LEN_KEY).unwrap().unwrap().as_ref(),
            b"2"
        );
        assert_eq!(db.len(), 1 + 3 * 2);
    }

    #[test]
    fn test_sampling_disabled_without_save_data() {
        let mut agent = test_agent(
            MockWorld::default(),
            MockProvider::default(),
            Params::default(),
        );

        agent.proc(&step_input(5.0)).unwrap();
        for _ in 0..10 {
            let (_, report) = agent.proc(&step_input(5.0)).unwrap();
            assert!(!report.sampled);
        }

        assert!(agent.buffer.is_empty());
    }

    #[test]
    fn test_sampling_suppressed_while_stalled() {
        let out_dir = tempfile::tempdir().unwrap();

        let mut agent = test_agent(
            MockWorld::default(),
            MockProvider::default(),
            Params {
                save_data: true,
                max_stop_num: 2,
                num_per_flush: 100,
                data_save: out_dir.path().to_path_buf(),
                ..Params::default()
            },
        );

        // First step initialises the planner only
        agent.proc(&step_input(5.0)).unwrap();

        // Stationary for frames 0..=10: the counter passes max_stop_num
        // after frame 1, so only frame 0 is sampled
        for frame in 0..11u64 {
            let (_, report) = agent.proc(&step_input(0.0)).unwrap();
            assert_eq!(report.sampled, frame == 0);
        }
        assert_eq!(agent.buffer.len(), 1);

        // Once the vehicle moves again the counter resets and sampling
        // resumes on the next 5th-frame boundary (frame 15)
        for frame in 11..16u64 {
            let (_, report) = agent.proc(&step_input(5.0)).unwrap();
            assert_eq!(report.sampled, frame == 15);
        }
        assert_eq!(agent.buffer.len(), 2);
    }

    #[test]
    fn test_weather_hook_cadence() {
        let out_dir = tempfile::tempdir().unwrap();
        let world = MockWorld::default();

        let mut agent = test_agent(
            world.clone(),
            MockProvider::default(),
            Params {
                save_data: true,
                max_stop_num: 10,
                weather_change: 0.25,
                num_per_flush: 100,
                data_save: out_dir.path().to_path_buf(),
                ..Params::default()
            },
        );

        agent.proc(&step_input(5.0)).unwrap();
        for _ in 0..51u64 {
            agent.proc(&step_input(5.0)).unwrap();
        }

        // Of the sampled frames 0, 5, ..., 50 only 0 and 50 sit on the
        // 50-frame weather cadence
        assert_eq!(*world.weather.borrow(), vec![0.25, 0.25]);

        // With debug output on the hook is suppressed, sampling is not
        let world = MockWorld::default();
        let mut agent = test_agent(
            world.clone(),
            MockProvider::default(),
            Params {
                save_data: true,
                debug_print: true,
                max_stop_num: 10,
                weather_change: 0.25,
                num_per_flush: 100,
                data_save: out_dir.path().to_path_buf(),
                ..Params::default()
            },
        );

        agent.proc(&step_input(5.0)).unwrap();
        for _ in 0..51u64 {
            agent.proc(&step_input(5.0)).unwrap();
        }

        assert!(world.weather.borrow().is_empty());
        assert_eq!(agent.buffer.len(), 11);
    }

    #[test]
    fn test_destroy_flushes_remaining() {
        let out_dir = tempfile::tempdir().unwrap();
        let provider = MockProvider::default();

        let mut agent = test_agent(
            MockWorld::default(),
            provider,
            Params {
                save_data: true,
                max_stop_num: 10,
                num_per_flush: 100,
                data_save: out_dir.path().to_path_buf(),
                route_id: 1,
                ..Params::default()
            },
        );

        agent.proc(&step_input(5.0)).unwrap();
        let (_, report) = agent.proc(&step_input(5.0)).unwrap();
        assert!(report.sampled);
        assert_eq!(agent.buffer.len(), 1);

        agent.destroy().unwrap();
        assert!(agent.buffer.is_empty());

        let stores: Vec<_> = std::fs::read_dir(out_dir.path())
            .unwrap()
            .map(|e| e.unwrap().path())
            .collect();
        assert_eq!(stores.len(), 1);

        let db = sled::open(&stores[0]).unwrap();
        assert_eq!(
            db.get(crate::collector::STORE_LEN_KEY).unwrap().unwrap().as_ref(),
            b"1"
        );

        // A second destroy with nothing buffered writes nothing new
        agent.destroy().unwrap();
    }
}
