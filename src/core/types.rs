use std::error::Error;
use std::fmt;

use serde::Serialize;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum StartupStage {
    IdeaPreRevenue,
    MvpBuilding,
    PilotUsers,
    EarlyRevenue,
}

impl StartupStage {
    /// Stages still working toward a validation milestone. Only these evaluate
    /// `validation_target_days`; later stages report `NotEvaluated`.
    pub fn has_validation_milestone(self) -> bool {
        matches!(
            self,
            StartupStage::IdeaPreRevenue | StartupStage::MvpBuilding
        )
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ValidationStatus {
    Achievable,
    AtRisk,
    NotAchievable,
    NotEvaluated,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum LeverType {
    ReduceFixed,
    ReduceVariable,
    DelayCost,
    CashInjection,
}

/// An irregular expense charged in full during the simulated month matching
/// `month_offset` (month 0 is the first simulated month).
#[derive(Debug, Clone, PartialEq)]
pub struct OneTimeCostItem {
    pub name: String,
    pub amount: f64,
    pub month_offset: u32,
}

/// Immutable financial snapshot supplied by the caller. The engine never
/// mutates it; every derived computation works on its own modified copy.
#[derive(Debug, Clone, PartialEq)]
pub struct InputState {
    pub stage: StartupStage,
    pub cash_in_bank: f64,
    pub fixed_monthly_costs: f64,
    pub variable_monthly_costs: f64,
    /// Safety margin in percentage points on top of recurring costs.
    pub buffer_percent: f64,
    /// Ordered by `month_offset`, non-decreasing.
    pub one_time_costs: Vec<OneTimeCostItem>,
    /// Days until the validation milestone must be reached; `None` skips
    /// classification.
    pub validation_target_days: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeverResult {
    #[serde(rename = "type")]
    pub kind: LeverType,
    pub description: String,
    /// New runway minus baseline runway, in whole months.
    pub runway_delta: i64,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Scenarios {
    pub conservative: u32,
    pub aggressive: u32,
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BurnBreakdown {
    /// Normalized recurring monthly burn, buffer included.
    pub gross_burn: f64,
    /// Sum of all scheduled one-time amounts, reachable or not.
    pub one_time_total: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunwayResult {
    /// Full months survivable before cash goes negative.
    pub runway_months: u32,
    pub monthly_burn_breakdown: BurnBreakdown,
    pub validation_status: ValidationStatus,
    pub scenarios: Scenarios,
    pub levers: Vec<LeverResult>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EngineError {
    /// Input violates a domain constraint (negative cash, costs or buffer,
    /// non-monotonic or far-future one-time offsets).
    InvalidInput(String),
    /// Recurring burn is zero and the one-time schedule never depletes the
    /// cash, so no finite month count exists.
    UnboundedRunway,
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::InvalidInput(msg) => write!(f, "invalid input: {msg}"),
            EngineError::UnboundedRunway => write!(
                f,
                "runway is unbounded: monthly burn is zero and cash never depletes"
            ),
        }
    }
}

impl Error for EngineError {}
