use axum::{
    Router,
    extract::{Json, Query},
    http::{StatusCode, header},
    response::{Html, IntoResponse, Response},
    routing::get,
};
use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use tokio::net::TcpListener;

use crate::core::{
    BurnBreakdown, EngineError, InputState, LeverResult, MAX_ONE_TIME_MONTH, OneTimeCostItem,
    RunwayResult, Scenarios, StartupStage, ValidationStatus, run_model,
};

const INDEX_HTML: &str = include_str!("../../web/index.html");
const STYLES_CSS: &str = include_str!("../../web/styles.css");
const APP_JS: &str = include_str!("../../web/app.js");

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum CliStartupStage {
    IdeaPreRevenue,
    MvpBuilding,
    PilotUsers,
    EarlyRevenue,
}

impl From<CliStartupStage> for StartupStage {
    fn from(value: CliStartupStage) -> Self {
        match value {
            CliStartupStage::IdeaPreRevenue => StartupStage::IdeaPreRevenue,
            CliStartupStage::MvpBuilding => StartupStage::MvpBuilding,
            CliStartupStage::PilotUsers => StartupStage::PilotUsers,
            CliStartupStage::EarlyRevenue => StartupStage::EarlyRevenue,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
enum ApiStartupStage {
    #[serde(alias = "ideaPreRevenue", alias = "idea_pre_revenue", alias = "idea")]
    IdeaPreRevenue,
    #[serde(alias = "mvpBuilding", alias = "mvp_building", alias = "mvp")]
    MvpBuilding,
    #[serde(alias = "pilotUsers", alias = "pilot_users", alias = "pilot")]
    PilotUsers,
    #[serde(alias = "earlyRevenue", alias = "early_revenue")]
    EarlyRevenue,
}

impl From<ApiStartupStage> for CliStartupStage {
    fn from(value: ApiStartupStage) -> Self {
        match value {
            ApiStartupStage::IdeaPreRevenue => CliStartupStage::IdeaPreRevenue,
            ApiStartupStage::MvpBuilding => CliStartupStage::MvpBuilding,
            ApiStartupStage::PilotUsers => CliStartupStage::PilotUsers,
            ApiStartupStage::EarlyRevenue => CliStartupStage::EarlyRevenue,
        }
    }
}

impl From<StartupStage> for ApiStartupStage {
    fn from(value: StartupStage) -> Self {
        match value {
            StartupStage::IdeaPreRevenue => ApiStartupStage::IdeaPreRevenue,
            StartupStage::MvpBuilding => ApiStartupStage::MvpBuilding,
            StartupStage::PilotUsers => ApiStartupStage::PilotUsers,
            StartupStage::EarlyRevenue => ApiStartupStage::EarlyRevenue,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OneTimeCostPayload {
    name: Option<String>,
    amount: f64,
    #[serde(alias = "month", alias = "month_offset")]
    month_offset: u32,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct RunwayPayload {
    stage: Option<ApiStartupStage>,
    #[serde(alias = "cash")]
    cash_in_bank: Option<f64>,
    #[serde(alias = "fixedCosts")]
    fixed_monthly_costs: Option<f64>,
    #[serde(alias = "variableCosts")]
    variable_monthly_costs: Option<f64>,
    #[serde(alias = "buffer")]
    buffer_percent: Option<f64>,
    one_time_costs: Option<Vec<OneTimeCostPayload>>,
    #[serde(alias = "validationDays")]
    validation_target_days: Option<u32>,
}

#[derive(Parser, Debug)]
#[command(
    name = "runway",
    about = "Startup runway simulator (monthly burn + safety buffer + one-time costs + what-if levers)"
)]
struct Cli {
    #[arg(
        long,
        value_enum,
        default_value_t = CliStartupStage::IdeaPreRevenue,
        help = "Startup stage; pre-traction stages evaluate the validation target"
    )]
    stage: CliStartupStage,
    #[arg(long, default_value_t = 0.0, help = "Liquid cash available today")]
    cash_in_bank: f64,
    #[arg(
        long,
        default_value_t = 0.0,
        help = "Recurring fixed monthly costs (rent, salaries, tools)"
    )]
    fixed_monthly_costs: f64,
    #[arg(
        long,
        default_value_t = 0.0,
        help = "Recurring variable monthly costs (usage-driven spend)"
    )]
    variable_monthly_costs: f64,
    #[arg(
        long,
        default_value_t = 0.0,
        help = "Safety buffer in percentage points added on top of recurring costs"
    )]
    buffer_percent: f64,
    #[arg(
        long = "one-time-cost",
        value_parser = parse_one_time_cost,
        help = "Scheduled one-time cost as NAME:AMOUNT:MONTH, repeatable"
    )]
    one_time_costs: Vec<OneTimeCostItem>,
    #[arg(
        long,
        help = "Days until the validation milestone must be reached, e.g. 30, 60, 90"
    )]
    validation_target_days: Option<u32>,
}

fn parse_one_time_cost(raw: &str) -> Result<OneTimeCostItem, String> {
    let mut parts = raw.rsplitn(3, ':');
    let month = parts.next().unwrap_or_default();
    let amount = parts.next().ok_or("expected NAME:AMOUNT:MONTH")?;
    let name = parts.next().ok_or("expected NAME:AMOUNT:MONTH")?;

    if name.is_empty() {
        return Err("one-time cost name must not be empty".to_string());
    }
    let amount: f64 = amount
        .parse()
        .map_err(|_| format!("invalid one-time cost amount '{amount}'"))?;
    let month_offset: u32 = month
        .parse()
        .map_err(|_| format!("invalid one-time cost month '{month}'"))?;

    Ok(OneTimeCostItem {
        name: name.to_string(),
        amount,
        month_offset,
    })
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RunwayResponse {
    stage: ApiStartupStage,
    monthly_burn: f64,
    runway_months: u32,
    validation_status: ValidationStatus,
    scenarios: Scenarios,
    levers: Vec<LeverResult>,
    monthly_burn_breakdown: BurnBreakdown,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

fn build_inputs(cli: Cli) -> Result<InputState, String> {
    if !cli.cash_in_bank.is_finite() || cli.cash_in_bank < 0.0 {
        return Err("--cash-in-bank must be >= 0".to_string());
    }
    if !cli.fixed_monthly_costs.is_finite() || cli.fixed_monthly_costs < 0.0 {
        return Err("--fixed-monthly-costs must be >= 0".to_string());
    }
    if !cli.variable_monthly_costs.is_finite() || cli.variable_monthly_costs < 0.0 {
        return Err("--variable-monthly-costs must be >= 0".to_string());
    }
    if !cli.buffer_percent.is_finite() || cli.buffer_percent < 0.0 {
        return Err("--buffer-percent must be >= 0".to_string());
    }
    if let Some(days) = cli.validation_target_days {
        if days == 0 {
            return Err("--validation-target-days must be >= 1".to_string());
        }
    }
    for item in &cli.one_time_costs {
        if !item.amount.is_finite() || item.amount < 0.0 {
            return Err(format!("one-time cost '{}' must have amount >= 0", item.name));
        }
        if item.month_offset > MAX_ONE_TIME_MONTH {
            return Err(format!(
                "one-time cost '{}' month must be <= {MAX_ONE_TIME_MONTH}",
                item.name
            ));
        }
    }

    // The engine expects the schedule ordered by month; callers may add costs
    // in any order.
    let mut one_time_costs = cli.one_time_costs;
    one_time_costs.sort_by_key(|item| item.month_offset);

    Ok(InputState {
        stage: cli.stage.into(),
        cash_in_bank: cli.cash_in_bank,
        fixed_monthly_costs: cli.fixed_monthly_costs,
        variable_monthly_costs: cli.variable_monthly_costs,
        buffer_percent: cli.buffer_percent,
        one_time_costs,
        validation_target_days: cli.validation_target_days,
    })
}

pub async fn run_http_server(port: u16) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let app = Router::new()
        .route("/", get(index_handler))
        .route("/index.html", get(index_handler))
        .route("/styles.css", get(styles_handler))
        .route("/app.js", get(app_js_handler))
        .route(
            "/api/runway",
            get(runway_get_handler).post(runway_post_handler),
        )
        .fallback(not_found_handler);

    let listener = TcpListener::bind(addr).await?;
    println!("Runway HTTP API listening on http://{addr}");
    println!("Local access: http://127.0.0.1:{port}/");

    axum::serve(listener, app).await
}

async fn index_handler() -> impl IntoResponse {
    with_cache_control(Html(INDEX_HTML))
}

async fn styles_handler() -> impl IntoResponse {
    with_cache_control((
        [(header::CONTENT_TYPE, "text/css; charset=utf-8")],
        STYLES_CSS,
    ))
}

async fn app_js_handler() -> impl IntoResponse {
    with_cache_control((
        [(
            header::CONTENT_TYPE,
            "application/javascript; charset=utf-8",
        )],
        APP_JS,
    ))
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

async fn runway_get_handler(Query(payload): Query<RunwayPayload>) -> Response {
    runway_handler_impl(payload).await
}

async fn runway_post_handler(Json(payload): Json<RunwayPayload>) -> Response {
    runway_handler_impl(payload).await
}

async fn runway_handler_impl(payload: RunwayPayload) -> Response {
    let inputs = match runway_request_from_payload(payload) {
        Ok(inputs) => inputs,
        Err(msg) => return error_response(StatusCode::BAD_REQUEST, &msg),
    };

    let result = match run_model(&inputs) {
        Ok(result) => result,
        Err(err @ EngineError::InvalidInput(_)) => {
            return error_response(StatusCode::BAD_REQUEST, &err.to_string());
        }
        Err(err @ EngineError::UnboundedRunway) => {
            return error_response(StatusCode::UNPROCESSABLE_ENTITY, &err.to_string());
        }
    };

    json_response(StatusCode::OK, build_runway_response(&inputs, result))
}

fn with_cache_control<R: IntoResponse>(response: R) -> Response {
    let mut response = response.into_response();
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        "no-store".parse().expect("valid header"),
    );
    response
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    let mut response = (status, Json(body)).into_response();
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        "no-store".parse().expect("valid header"),
    );
    response
}

fn error_response(status: StatusCode, msg: &str) -> Response {
    json_response(
        status,
        ErrorResponse {
            error: msg.to_string(),
        },
    )
}

#[cfg(test)]
fn runway_request_from_json(json: &str) -> Result<InputState, String> {
    let payload = serde_json::from_str::<RunwayPayload>(json)
        .map_err(|e| format!("Invalid API JSON payload: {e}"))?;
    runway_request_from_payload(payload)
}

fn runway_request_from_payload(payload: RunwayPayload) -> Result<InputState, String> {
    let mut cli = default_cli_for_api();

    if let Some(v) = payload.stage {
        cli.stage = v.into();
    }
    if let Some(v) = payload.cash_in_bank {
        cli.cash_in_bank = v;
    }
    if let Some(v) = payload.fixed_monthly_costs {
        cli.fixed_monthly_costs = v;
    }
    if let Some(v) = payload.variable_monthly_costs {
        cli.variable_monthly_costs = v;
    }
    if let Some(v) = payload.buffer_percent {
        cli.buffer_percent = v;
    }
    if let Some(items) = payload.one_time_costs {
        cli.one_time_costs = items
            .into_iter()
            .map(|item| OneTimeCostItem {
                name: item.name.unwrap_or_else(|| "One-time cost".to_string()),
                amount: item.amount,
                month_offset: item.month_offset,
            })
            .collect();
    }
    if let Some(v) = payload.validation_target_days {
        cli.validation_target_days = Some(v);
    }

    build_inputs(cli)
}

fn default_cli_for_api() -> Cli {
    Cli {
        stage: CliStartupStage::IdeaPreRevenue,
        cash_in_bank: 0.0,
        fixed_monthly_costs: 0.0,
        variable_monthly_costs: 0.0,
        buffer_percent: 0.0,
        one_time_costs: Vec::new(),
        validation_target_days: None,
    }
}

fn build_runway_response(inputs: &InputState, result: RunwayResult) -> RunwayResponse {
    RunwayResponse {
        stage: inputs.stage.into(),
        monthly_burn: result.monthly_burn_breakdown.gross_burn,
        runway_months: result.runway_months,
        validation_status: result.validation_status,
        scenarios: result.scenarios,
        levers: result.levers,
        monthly_burn_breakdown: result.monthly_burn_breakdown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::LeverType;

    const EPS: f64 = 1e-9;

    fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= EPS,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn empty_payload_resolves_to_defaults() {
        let inputs = runway_request_from_json("{}").expect("valid payload");
        assert_eq!(inputs.stage, StartupStage::IdeaPreRevenue);
        assert_approx(inputs.cash_in_bank, 0.0);
        assert_approx(inputs.fixed_monthly_costs, 0.0);
        assert_approx(inputs.buffer_percent, 0.0);
        assert!(inputs.one_time_costs.is_empty());
        assert_eq!(inputs.validation_target_days, None);
    }

    #[test]
    fn payload_field_aliases_are_accepted() {
        let inputs = runway_request_from_json(
            r#"{"cash": 24000, "fixedCosts": 2000, "variableCosts": 500, "buffer": 10, "validationDays": 90}"#,
        )
        .expect("valid payload");
        assert_approx(inputs.cash_in_bank, 24_000.0);
        assert_approx(inputs.fixed_monthly_costs, 2_000.0);
        assert_approx(inputs.variable_monthly_costs, 500.0);
        assert_approx(inputs.buffer_percent, 10.0);
        assert_eq!(inputs.validation_target_days, Some(90));
    }

    #[test]
    fn stage_accepts_kebab_and_camel_forms() {
        let kebab =
            runway_request_from_json(r#"{"stage": "mvp-building"}"#).expect("valid payload");
        assert_eq!(kebab.stage, StartupStage::MvpBuilding);

        let camel =
            runway_request_from_json(r#"{"stage": "earlyRevenue"}"#).expect("valid payload");
        assert_eq!(camel.stage, StartupStage::EarlyRevenue);

        let short = runway_request_from_json(r#"{"stage": "idea"}"#).expect("valid payload");
        assert_eq!(short.stage, StartupStage::IdeaPreRevenue);
    }

    #[test]
    fn one_time_costs_are_sorted_by_month() {
        let inputs = runway_request_from_json(
            r#"{
                "cashInBank": 24000,
                "fixedMonthlyCosts": 2000,
                "oneTimeCosts": [
                    {"name": "Audit", "amount": 1000, "monthOffset": 5},
                    {"amount": 4000, "month": 2}
                ]
            }"#,
        )
        .expect("valid payload");

        assert_eq!(inputs.one_time_costs.len(), 2);
        assert_eq!(inputs.one_time_costs[0].month_offset, 2);
        assert_eq!(inputs.one_time_costs[0].name, "One-time cost");
        assert_eq!(inputs.one_time_costs[1].month_offset, 5);
        assert_eq!(inputs.one_time_costs[1].name, "Audit");
    }

    #[test]
    fn negative_cash_is_rejected_at_the_boundary() {
        let err = runway_request_from_json(r#"{"cashInBank": -1}"#).expect_err("must fail");
        assert!(err.contains("--cash-in-bank"));
    }

    #[test]
    fn negative_buffer_is_rejected_at_the_boundary() {
        let err = runway_request_from_json(r#"{"bufferPercent": -5}"#).expect_err("must fail");
        assert!(err.contains("--buffer-percent"));
    }

    #[test]
    fn far_future_one_time_cost_is_rejected_at_the_boundary() {
        let err = runway_request_from_json(
            r#"{"oneTimeCosts": [{"name": "Far out", "amount": 100, "monthOffset": 4294967295}]}"#,
        )
        .expect_err("must fail");
        assert!(err.contains("month must be <="));
    }

    #[test]
    fn zero_validation_target_is_rejected_at_the_boundary() {
        let err =
            runway_request_from_json(r#"{"validationTargetDays": 0}"#).expect_err("must fail");
        assert!(err.contains("--validation-target-days"));
    }

    #[test]
    fn parse_one_time_cost_accepts_name_amount_month() {
        let item = parse_one_time_cost("Laptop:4000:2").expect("parses");
        assert_eq!(item.name, "Laptop");
        assert_approx(item.amount, 4_000.0);
        assert_eq!(item.month_offset, 2);

        // Names may themselves contain colons; only the last two fields are
        // numeric.
        let item = parse_one_time_cost("Conference: travel:1500:4").expect("parses");
        assert_eq!(item.name, "Conference: travel");
        assert_eq!(item.month_offset, 4);

        assert!(parse_one_time_cost("Laptop:4000").is_err());
        assert!(parse_one_time_cost("Laptop:abc:2").is_err());
        assert!(parse_one_time_cost(":4000:2").is_err());
    }

    #[test]
    fn full_request_produces_expected_runway() {
        let inputs = runway_request_from_json(
            r#"{"cashInBank": 24000, "fixedMonthlyCosts": 2000, "bufferPercent": 0}"#,
        )
        .expect("valid payload");
        let result = run_model(&inputs).expect("valid inputs");
        assert_eq!(result.runway_months, 12);
    }

    #[test]
    fn response_json_uses_camel_case_and_kebab_case_enums() {
        let inputs = runway_request_from_json(
            r#"{
                "stage": "idea",
                "cashInBank": 3000,
                "fixedMonthlyCosts": 1000,
                "validationTargetDays": 90
            }"#,
        )
        .expect("valid payload");
        let result = run_model(&inputs).expect("valid inputs");
        let response = build_runway_response(&inputs, result);

        let value = serde_json::to_value(&response).expect("serializable");
        assert_eq!(value["stage"], "idea-pre-revenue");
        assert_eq!(value["runwayMonths"], 3);
        assert_eq!(value["validationStatus"], "at-risk");
        assert!(value["scenarios"]["conservative"].is_u64());
        assert!(value["monthlyBurnBreakdown"]["grossBurn"].is_f64());

        let levers = value["levers"].as_array().expect("levers array");
        assert!(!levers.is_empty());
        for lever in levers {
            assert!(lever["type"].is_string());
            assert!(lever["runwayDelta"].is_i64());
        }
    }

    #[test]
    fn unbounded_runway_surfaces_as_engine_error() {
        let inputs = runway_request_from_json(r#"{"cashInBank": 1000}"#).expect("valid payload");
        assert_eq!(run_model(&inputs), Err(EngineError::UnboundedRunway));
    }

    #[test]
    fn lever_types_serialize_in_kebab_case() {
        let inputs = runway_request_from_json(
            r#"{
                "cashInBank": 9500,
                "fixedMonthlyCosts": 1000,
                "variableMonthlyCosts": 200,
                "oneTimeCosts": [{"name": "Laptop", "amount": 500, "monthOffset": 1}]
            }"#,
        )
        .expect("valid payload");
        let result = run_model(&inputs).expect("valid inputs");
        let value = serde_json::to_value(&result.levers).expect("serializable");

        let types: Vec<&str> = value
            .as_array()
            .expect("levers array")
            .iter()
            .map(|lever| lever["type"].as_str().expect("type string"))
            .collect();
        assert_eq!(
            types,
            vec![
                "reduce-fixed",
                "reduce-variable",
                "delay-cost",
                "cash-injection"
            ]
        );

        let kinds: Vec<LeverType> = result.levers.iter().map(|lever| lever.kind).collect();
        assert_eq!(
            kinds,
            vec![
                LeverType::ReduceFixed,
                LeverType::ReduceVariable,
                LeverType::DelayCost,
                LeverType::CashInjection
            ]
        );
    }
}
