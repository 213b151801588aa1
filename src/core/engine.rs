use super::types::{
    BurnBreakdown, EngineError, InputState, LeverResult, LeverType, OneTimeCostItem, RunwayResult,
    Scenarios, ValidationStatus,
};

const SCENARIO_BUFFER_SHIFT: f64 = 5.0;
const REDUCE_FIXED_FACTOR: f64 = 0.9;
const REDUCE_VARIABLE_FACTOR: f64 = 0.8;
const CASH_INJECTION_MONTHS: f64 = 3.0;
const DAYS_PER_MONTH: u32 = 30;
const AT_RISK_GRACE_MONTHS: u32 = 1;

/// Latest month a one-time cost may be scheduled in (50 years out). Bounding
/// the schedule bounds the stepping loop and keeps the delay lever's
/// one-month shift free of overflow.
pub const MAX_ONE_TIME_MONTH: u32 = 600;

/// Runs the full runway model for one snapshot: baseline depletion, buffer
/// scenarios, lever evaluation and validation classification. Pure and
/// deterministic; the snapshot is never mutated.
pub fn run_model(inputs: &InputState) -> Result<RunwayResult, EngineError> {
    validate_inputs(inputs)?;

    let baseline_runway = simulate_runway(inputs)?;
    let scenarios = run_scenarios(inputs)?;
    let levers = evaluate_levers(inputs, baseline_runway)?;
    let validation_status = classify_validation(inputs, baseline_runway);

    Ok(RunwayResult {
        runway_months: baseline_runway,
        monthly_burn_breakdown: burn_breakdown(inputs),
        validation_status,
        scenarios,
        levers,
    })
}

fn invalid(msg: &str) -> EngineError {
    EngineError::InvalidInput(msg.to_string())
}

fn ensure_finite_non_negative(value: f64, field: &str) -> Result<(), EngineError> {
    if !value.is_finite() || value < 0.0 {
        return Err(EngineError::InvalidInput(format!(
            "{field} must be finite and >= 0"
        )));
    }
    Ok(())
}

fn validate_inputs(inputs: &InputState) -> Result<(), EngineError> {
    ensure_finite_non_negative(inputs.cash_in_bank, "cash_in_bank")?;
    ensure_finite_non_negative(inputs.fixed_monthly_costs, "fixed_monthly_costs")?;
    ensure_finite_non_negative(inputs.variable_monthly_costs, "variable_monthly_costs")?;

    if !inputs.buffer_percent.is_finite() || inputs.buffer_percent < 0.0 {
        return Err(invalid("buffer_percent must be finite and >= 0"));
    }

    let mut last_offset = 0u32;
    for (idx, item) in inputs.one_time_costs.iter().enumerate() {
        if !item.amount.is_finite() || item.amount < 0.0 {
            return Err(EngineError::InvalidInput(format!(
                "one_time_costs[{idx}] must have a finite amount >= 0"
            )));
        }
        if item.month_offset > MAX_ONE_TIME_MONTH {
            return Err(EngineError::InvalidInput(format!(
                "one_time_costs[{idx}] month_offset must be <= {MAX_ONE_TIME_MONTH}"
            )));
        }
        if item.month_offset < last_offset {
            return Err(invalid(
                "one_time_costs must be ordered by non-decreasing month_offset",
            ));
        }
        last_offset = item.month_offset;
    }

    if inputs.validation_target_days == Some(0) {
        return Err(invalid("validation_target_days must be >= 1 when present"));
    }

    Ok(())
}

fn normalized_monthly_burn(fixed: f64, variable: f64, buffer_percent: f64) -> f64 {
    (fixed + variable) * (1.0 + buffer_percent / 100.0)
}

fn simulate_runway(inputs: &InputState) -> Result<u32, EngineError> {
    let monthly_burn = normalized_monthly_burn(
        inputs.fixed_monthly_costs,
        inputs.variable_monthly_costs,
        inputs.buffer_percent,
    );
    simulate_depletion(inputs.cash_in_bank, monthly_burn, &inputs.one_time_costs)
}

/// Counts fully survivable months. A month whose cost would push the balance
/// below zero is not survived; a month that lands exactly on zero is.
fn simulate_depletion(
    cash_in_bank: f64,
    monthly_burn: f64,
    one_time_costs: &[OneTimeCostItem],
) -> Result<u32, EngineError> {
    if monthly_burn <= 0.0 {
        return depletion_month_from_schedule(cash_in_bank, one_time_costs);
    }

    let mut remaining = cash_in_bank;
    let mut month = 0u32;

    // Step month by month only while scheduled costs lie ahead.
    if let Some(last_scheduled) = one_time_costs.iter().map(|c| c.month_offset).max() {
        while month <= last_scheduled {
            let cost_this_month = monthly_burn + one_time_total_for_month(one_time_costs, month);
            if remaining - cost_this_month < 0.0 {
                return Ok(month);
            }
            remaining -= cost_this_month;
            month += 1;
        }
    }

    // Past the schedule every month costs the same, so the remaining full
    // months are a plain division. A balance that divides evenly still counts
    // the final month as survived.
    let whole_months = (remaining / monthly_burn).floor();
    Ok(month.saturating_add(whole_months as u32))
}

/// With no recurring burn only the scheduled costs can deplete the cash, so
/// the schedule is walked directly instead of stepping empty months. If the
/// schedule never exhausts the balance the runway has no finite month count.
fn depletion_month_from_schedule(
    cash_in_bank: f64,
    one_time_costs: &[OneTimeCostItem],
) -> Result<u32, EngineError> {
    let mut charged_months: Vec<u32> = one_time_costs.iter().map(|c| c.month_offset).collect();
    charged_months.sort_unstable();
    charged_months.dedup();

    let mut remaining = cash_in_bank;
    for month in charged_months {
        let cost_this_month = one_time_total_for_month(one_time_costs, month);
        if remaining - cost_this_month < 0.0 {
            return Ok(month);
        }
        remaining -= cost_this_month;
    }

    Err(EngineError::UnboundedRunway)
}

fn one_time_total_for_month(one_time_costs: &[OneTimeCostItem], month: u32) -> f64 {
    one_time_costs
        .iter()
        .filter(|item| item.month_offset == month)
        .map(|item| item.amount)
        .sum()
}

fn with_buffer(inputs: &InputState, buffer_percent: f64) -> InputState {
    InputState {
        buffer_percent,
        ..inputs.clone()
    }
}

/// Conservative stresses the buffer up by five points, aggressive relaxes it
/// by five with a floor at zero so the burn multiplier never shrinks below
/// the raw recurring costs.
fn run_scenarios(inputs: &InputState) -> Result<Scenarios, EngineError> {
    let conservative = simulate_runway(&with_buffer(
        inputs,
        inputs.buffer_percent + SCENARIO_BUFFER_SHIFT,
    ))?;
    let aggressive = simulate_runway(&with_buffer(
        inputs,
        (inputs.buffer_percent - SCENARIO_BUFFER_SHIFT).max(0.0),
    ))?;
    Ok(Scenarios {
        conservative,
        aggressive,
    })
}

/// A lever is a named pure transformation of the snapshot. Returning `None`
/// marks the lever as not applicable to this snapshot; adding a lever means
/// adding one transform here, the simulator is untouched.
type LeverTransform = fn(&InputState) -> Option<(String, InputState)>;

const LEVER_REGISTRY: &[(LeverType, LeverTransform)] = &[
    (LeverType::ReduceFixed, reduce_fixed_costs),
    (LeverType::ReduceVariable, reduce_variable_costs),
    (LeverType::DelayCost, delay_largest_one_time_cost),
    (LeverType::CashInjection, inject_bridge_cash),
];

fn evaluate_levers(
    inputs: &InputState,
    baseline_runway: u32,
) -> Result<Vec<LeverResult>, EngineError> {
    let mut levers = Vec::new();
    for (kind, transform) in LEVER_REGISTRY {
        let Some((description, adjusted)) = transform(inputs) else {
            continue;
        };
        let runway = simulate_runway(&adjusted)?;
        levers.push(LeverResult {
            kind: *kind,
            description,
            runway_delta: i64::from(runway) - i64::from(baseline_runway),
        });
    }
    Ok(levers)
}

fn reduce_fixed_costs(inputs: &InputState) -> Option<(String, InputState)> {
    if inputs.fixed_monthly_costs <= 0.0 {
        return None;
    }
    let adjusted = InputState {
        fixed_monthly_costs: inputs.fixed_monthly_costs * REDUCE_FIXED_FACTOR,
        ..inputs.clone()
    };
    Some(("Reduce fixed costs by 10%".to_string(), adjusted))
}

fn reduce_variable_costs(inputs: &InputState) -> Option<(String, InputState)> {
    if inputs.variable_monthly_costs <= 0.0 {
        return None;
    }
    let adjusted = InputState {
        variable_monthly_costs: inputs.variable_monthly_costs * REDUCE_VARIABLE_FACTOR,
        ..inputs.clone()
    };
    Some(("Reduce variable costs by 20%".to_string(), adjusted))
}

fn delay_largest_one_time_cost(inputs: &InputState) -> Option<(String, InputState)> {
    let (index, largest) = inputs
        .one_time_costs
        .iter()
        .enumerate()
        .max_by(|(_, a), (_, b)| a.amount.total_cmp(&b.amount))?;
    let description = format!("Delay {} by 1 month", largest.name);

    let mut one_time_costs = inputs.one_time_costs.clone();
    one_time_costs[index].month_offset += 1;
    let adjusted = InputState {
        one_time_costs,
        ..inputs.clone()
    };
    Some((description, adjusted))
}

fn inject_bridge_cash(inputs: &InputState) -> Option<(String, InputState)> {
    let recurring = inputs.fixed_monthly_costs + inputs.variable_monthly_costs;
    if recurring <= 0.0 {
        return None;
    }
    let injection = recurring * CASH_INJECTION_MONTHS;
    let adjusted = InputState {
        cash_in_bank: inputs.cash_in_bank + injection,
        ..inputs.clone()
    };
    Some((
        format!("Raise a bridge of {injection:.0} (three months of recurring costs)"),
        adjusted,
    ))
}

fn classify_validation(inputs: &InputState, runway_months: u32) -> ValidationStatus {
    let target_days = match inputs.validation_target_days {
        Some(days) if inputs.stage.has_validation_milestone() => days,
        _ => return ValidationStatus::NotEvaluated,
    };
    let target_months = target_days.div_ceil(DAYS_PER_MONTH);

    if runway_months < target_months {
        ValidationStatus::NotAchievable
    } else if runway_months <= target_months + AT_RISK_GRACE_MONTHS {
        ValidationStatus::AtRisk
    } else {
        ValidationStatus::Achievable
    }
}

fn burn_breakdown(inputs: &InputState) -> BurnBreakdown {
    BurnBreakdown {
        gross_burn: normalized_monthly_burn(
            inputs.fixed_monthly_costs,
            inputs.variable_monthly_costs,
            inputs.buffer_percent,
        ),
        one_time_total: inputs.one_time_costs.iter().map(|item| item.amount).sum(),
    }
}
