mod engine;
mod types;

pub use engine::{MAX_ONE_TIME_MONTH, run_model};
pub use types::{
    BurnBreakdown, EngineError, InputState, LeverResult, LeverType, OneTimeCostItem, RunwayResult,
    Scenarios, StartupStage, ValidationStatus,
};
