//! Domain records.
//!
//! Every field has a default so that a freshly instantiated, empty record
//! decodes cleanly.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use super::identifier::Identifier;
use super::value::{Identifiable, StoreBacked};

fn unix_epoch() -> SystemTime {
    UNIX_EPOCH
}

/// Something reviews can be attached to.
pub trait Reviewable {
    fn reviews(&self) -> &[Identifier<Review>];
}

macro_rules! store_backed {
    ($ty:ident, $entity:literal) => {
        impl Identifiable for $ty {
            fn identifier(&self) -> Identifier<Self> {
                self.identifier
            }
        }

        impl StoreBacked for $ty {
            const ENTITY: &'static str = $entity;
        }
    };
}

/// An area of responsibility goals are set for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Role {
    pub identifier: Identifier<Role>,
    #[serde(default)]
    pub short_name: String,
    #[serde(default)]
    pub explanation: String,
    /// Whether any goal set refers to this role. Editing a referenced role
    /// affects those goal sets too.
    #[serde(default)]
    pub is_referenced: bool,
    #[serde(default)]
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Goal {
    pub identifier: Identifier<Goal>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub outcome_description: String,
    #[serde(default)]
    pub evaluation_metric_description: String,
    #[serde(default)]
    pub role_supported: Option<Identifier<Role>>,
    #[serde(default)]
    pub goals_supported: Vec<Identifier<Goal>>,
    #[serde(default)]
    pub reviews: Vec<Identifier<Review>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoalSet {
    pub identifier: Identifier<GoalSet>,
    #[serde(default)]
    pub goals: Vec<Identifier<Goal>>,
    #[serde(default)]
    pub roles: Vec<Identifier<Role>>,
    #[serde(default = "unix_epoch")]
    pub target_date: SystemTime,
    #[serde(default)]
    pub reviews: Vec<Identifier<Review>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    pub identifier: Identifier<Review>,
    #[serde(default = "unix_epoch")]
    pub date: SystemTime,
    #[serde(default)]
    pub review: String,
}

/// A planning horizon grouping goal sets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeScale {
    pub identifier: Identifier<TimeScale>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub goal_sets: Vec<Identifier<GoalSet>>,
}

store_backed!(Role, "Role");
store_backed!(Goal, "Goal");
store_backed!(GoalSet, "GoalSet");
store_backed!(Review, "Review");
store_backed!(TimeScale, "TimeScale");

impl Reviewable for Goal {
    fn reviews(&self) -> &[Identifier<Review>] {
        &self.reviews
    }
}

impl Reviewable for GoalSet {
    fn reviews(&self) -> &[Identifier<Review>] {
        &self.reviews
    }
}

/// Entity names of every domain record, for building a store schema.
pub const ENTITIES: [&str; 5] = [
    Role::ENTITY,
    Goal::ENTITY,
    GoalSet::ENTITY,
    Review::ENTITY,
    TimeScale::ENTITY,
];
