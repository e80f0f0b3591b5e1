//! CLI commands for position reconstruction and ladder planning.

pub mod plan;
pub mod positions;

pub use plan::{run_plan, PlanArgs};
pub use positions::{run_positions, PositionsArgs};
