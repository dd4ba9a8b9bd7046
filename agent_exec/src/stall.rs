//! Stall monitoring and forced actor recovery
//!
//! The monitor counts consecutive steps on which the measured ego speed sits
//! below a fixed threshold. Once the agent decides the vehicle has been stuck
//! for too long, `recover` removes the single actor most likely to be the
//! cause.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::warn;

// Internal
use sim_if::world::{ActorId, Blockers, World, WorldError};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Speed below which the ego vehicle is considered stopped.
///
/// Units: meters/second
pub const STOP_SPEED_THRESHOLD_MS: f64 = 0.5;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Tracks how long the ego vehicle has been stopped.
#[derive(Debug, Default)]
pub struct StallMonitor {
    stop_counter: u64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl StallMonitor {
    /// Update the monitor with this step's measured speed, returning the new
    /// stop counter value.
    ///
    /// The counter increments while the speed stays below
    /// [`STOP_SPEED_THRESHOLD_MS`] and resets to zero the moment it recovers.
    pub fn update(&mut self, speed_ms: f64) -> u64 {
        if speed_ms < STOP_SPEED_THRESHOLD_MS {
            self.stop_counter += 1;
        } else {
            self.stop_counter = 0;
        }

        self.stop_counter
    }

    /// Current stop counter value.
    pub fn count(&self) -> u64 {
        self.stop_counter
    }

    /// Reset the stop counter to zero.
    pub fn reset(&mut self) {
        self.stop_counter = 0;
    }

    /// Forcibly remove the actor blocking the ego vehicle.
    ///
    /// At most one actor is destroyed per call, with a fixed priority:
    /// blocking obstacles first, then walkers. The stop counter is reset only
    /// when an actor was actually destroyed. A stall caused by a traffic
    /// light alone is left for the light to clear itself - see the note
    /// below.
    ///
    /// Returns the id of the destroyed actor, or `None` if no actor was
    /// removed.
    pub fn recover(
        &mut self,
        world: &mut dyn World,
        blockers: &Blockers,
        frame: u64,
    ) -> Result<Option<ActorId>, WorldError> {
        if let Some(obstacle) = blockers.obstacle {
            world.destroy_actor(obstacle)?;
            self.reset();
            warn!(
                "{}, ATTENTION: force destroying actor {:?}, stopping for a long time",
                frame, obstacle
            );
            Ok(Some(obstacle))
        } else if let Some(walker) = blockers.walker {
            world.destroy_actor(walker)?;
            self.reset();
            warn!(
                "{}, ATTENTION: force destroying actor {:?}, stopping for a long time",
                frame, walker
            );
            Ok(Some(walker))
        } else {
            // A held traffic light could be forced green here instead, but
            // that interferes with scenario scoring, so light-only stalls
            // stay unhandled.
            warn!("==========> warning!!!! No blocking actor identified for the stop!!!");
            Ok(None)
        }
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use sim_if::world::Location;

    /// World which records destroyed actor ids.
    #[derive(Default)]
    struct MockWorld {
        destroyed: Vec<ActorId>,
    }

    impl World for MockWorld {
        fn destroy_actor(&mut self, actor: ActorId) -> Result<(), WorldError> {
            self.destroyed.push(actor);
            Ok(())
        }

        fn is_junction(&self, _location: &Location) -> Result<bool, WorldError> {
            Ok(false)
        }

        fn apply_weather(&mut self, _indicator: f32) {}
    }

    #[test]
    fn test_counter_tracks_low_speed() {
        let mut monitor = StallMonitor::default();

        assert_eq!(monitor.update(0.0), 1);
        assert_eq!(monitor.update(0.49), 2);
        assert_eq!(monitor.update(0.2), 3);

        // At or above the threshold the counter resets
        assert_eq!(monitor.update(0.5), 0);

        assert_eq!(monitor.update(0.1), 1);
        assert_eq!(monitor.update(3.0), 0);
    }

    #[test]
    fn test_recover_prefers_obstacle() {
        let mut monitor = StallMonitor::default();
        let mut world = MockWorld::default();

        monitor.update(0.0);

        let blockers = Blockers {
            obstacle: Some(ActorId(3)),
            traffic_light: Some(ActorId(7)),
            walker: Some(ActorId(9)),
        };

        let destroyed = monitor.recover(&mut world, &blockers, 10).unwrap();

        assert_eq!(destroyed, Some(ActorId(3)));
        assert_eq!(world.destroyed, vec![ActorId(3)]);
        assert_eq!(monitor.count(), 0);
    }

    #[test]
    fn test_recover_falls_back_to_walker() {
        let mut monitor = StallMonitor::default();
        let mut world = MockWorld::default();

        monitor.update(0.0);

        let blockers = Blockers {
            obstacle: None,
            traffic_light: None,
            walker: Some(ActorId(4)),
        };

        let destroyed = monitor.recover(&mut world, &blockers, 10).unwrap();

        assert_eq!(destroyed, Some(ActorId(4)));
        assert_eq!(world.destroyed, vec![ActorId(4)]);
        assert_eq!(monitor.count(), 0);
    }

    #[test]
    fn test_recover_ignores_traffic_light() {
        let mut monitor = StallMonitor::default();
        let mut world = MockWorld::default();

        monitor.update(0.0);
        monitor.update(0.0);

        let blockers = Blockers {
            obstacle: None,
            traffic_light: Some(ActorId(7)),
            walker: None,
        };

        let destroyed = monitor.recover(&mut world, &blockers, 10).unwrap();

        // Light-only stalls are not recovered and the counter is untouched
        assert_eq!(destroyed, None);
        assert!(world.destroyed.is_empty());
        assert_eq!(monitor.count(), 2);
    }
}
