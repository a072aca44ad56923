//! Domain Model
//!
//! Typed records over the store, and the [`Model`] facade for reading them
//! as signals and writing them back, one at a time or in sessions.

mod facade;
mod identifier;
mod records;
mod session;
mod value;

pub use facade::Model;
pub use identifier::Identifier;
pub use records::{Goal, GoalSet, Review, Reviewable, Role, TimeScale, ENTITIES};
pub use session::UpdateSession;
pub use value::{Identifiable, StoreBacked, IDENTIFIER_FIELD};
