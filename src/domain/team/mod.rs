//! Team domain module
//!
//! A team (hub) is the workspace that owns deployment groups. The registry only
//! needs its identifier; membership and roles live elsewhere.

mod entity;
mod validation;

pub use entity::TeamId;
pub use validation::{validate_team_id, TeamValidationError};
