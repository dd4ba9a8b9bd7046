//! # Global Route Plan Module

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

use crate::world::{Location, Transform};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// The global route plan handed over by the harness at setup.
///
/// An ordered sequence of world-frame (position, orientation) pairs,
/// immutable once constructed.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct RoutePlan {
    points: Vec<Transform>,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl RoutePlan {
    /// Build a route plan from the harness's world-coordinate plan.
    pub fn new(points: Vec<Transform>) -> Self {
        RoutePlan { points }
    }

    /// Number of points in the plan.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// True if the plan contains no points.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Iterate over the plan's locations, dropping orientations.
    pub fn locations(&self) -> impl Iterator<Item = &Location> {
        self.points.iter().map(|t| &t.location)
    }
}
