//! Conductor System
//!
//! Validates and executes declared multi-step tool plans.

pub mod executor;
pub mod types;

pub use executor::PlanExecutor;
pub use types::{ArgValue, Plan, PlanReport, PlanStatus, PlanStep, StepOutcome, StepRef};
