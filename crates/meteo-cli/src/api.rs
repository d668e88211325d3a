//! Polygon, rule, timeline and render endpoints

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use meteo_core::{
    format_range_label, format_value, resolve, validate_rules, Color, ColorRule, Condition,
    Coordinate, DataSource, Direction, PolygonId, PolygonRecord, Resolution, RuleUpdate,
    TimeSelection, TimeWindow,
};
use meteo_refresh::RefreshOutcome;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use crate::{ApiError, ApiResult, AppState};

/// A polygon record with its display fields
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolygonView {
    #[serde(flatten)]
    pub record: PolygonRecord,
    pub label: String,
    pub variable_name: String,
    pub display_value: String,
}

impl PolygonView {
    pub fn new(record: &PolygonRecord) -> Self {
        let variable = record.data_source.variable();
        Self {
            record: record.clone(),
            label: record.id.short().to_string(),
            variable_name: variable
                .map(|v| v.display_name().to_string())
                .unwrap_or_else(|| record.data_source.to_string()),
            display_value: format_value(record.current_average, variable),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePolygon {
    pub id: Option<PolygonId>,
    pub vertices: Vec<Coordinate>,
    #[serde(default)]
    pub data_source: DataSource,
    #[serde(default)]
    pub rules: Vec<ColorRule>,
}

/// Fields of a rule to add; anything missing comes from the default rule
#[derive(Debug, Default, Deserialize)]
pub struct NewRule {
    pub condition: Option<Condition>,
    pub value: Option<f64>,
    pub color: Option<Color>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataSourceBody {
    pub data_source: DataSource,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveBody {
    pub active_polygon_id: Option<PolygonId>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineView {
    #[serde(flatten)]
    pub selection: TimeSelection,
    pub label: String,
    pub total_steps: u32,
    /// Absent when the selection lies in the future
    pub window: Option<TimeWindow>,
}

#[derive(Debug, Deserialize)]
pub struct StepBody {
    pub direction: Direction,
}

#[derive(Debug, Default, Deserialize)]
pub struct RefreshBody {
    pub id: Option<PolygonId>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RefreshReport {
    pub id: PolygonId,
    pub outcome: String,
    pub polygon: Option<PolygonView>,
}

fn not_found(id: &PolygonId) -> ApiError {
    ApiError::NotFound(format!("Polygon not found: {id}"))
}

pub async fn list_polygons(State(state): State<Arc<AppState>>) -> Json<Vec<PolygonView>> {
    state.count_request();
    let records = state.coordinator().list().await;
    Json(records.iter().map(|r| PolygonView::new(r)).collect())
}

pub async fn create_polygon(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreatePolygon>,
) -> ApiResult<(StatusCode, Json<PolygonView>)> {
    state.count_request();
    validate_rules(&body.rules)?;
    let coordinator = state.coordinator();
    let mut record = coordinator
        .create_polygon(body.id, body.vertices, body.data_source)
        .await?;
    if !body.rules.is_empty() {
        record = coordinator.set_rules(&record.id, body.rules).await?;
    }

    // Data arrives in the background; the polygon shows neutral until then
    let pending = coordinator.trigger(&record.id, state.timeline().await).await;
    state.persist().await;
    state.settle(vec![pending]);
    Ok((StatusCode::CREATED, Json(PolygonView::new(&record))))
}

pub async fn get_polygon(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<PolygonView>> {
    state.count_request();
    let id = PolygonId::new(id);
    let record = state
        .coordinator()
        .get(&id)
        .await
        .ok_or_else(|| not_found(&id))?;
    Ok(Json(PolygonView::new(&record)))
}

pub async fn delete_polygon(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    state.count_request();
    let id = PolygonId::new(id);
    state
        .coordinator()
        .delete_polygon(&id)
        .await
        .ok_or_else(|| not_found(&id))?;
    state.persist().await;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn replace_rules(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(rules): Json<Vec<ColorRule>>,
) -> ApiResult<Json<PolygonView>> {
    state.count_request();
    let record = state
        .coordinator()
        .set_rules(&PolygonId::new(id), rules)
        .await?;
    state.persist().await;
    Ok(Json(PolygonView::new(&record)))
}

pub async fn add_rule(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    body: Option<Json<NewRule>>,
) -> ApiResult<(StatusCode, Json<PolygonView>)> {
    state.count_request();
    let fields = body.map(|Json(b)| b).unwrap_or_default();
    let default = ColorRule::default();
    let rule = ColorRule::new(
        fields.condition.unwrap_or(default.condition),
        fields.value.unwrap_or(default.value),
        fields.color.unwrap_or(default.color),
    );
    let record = state
        .coordinator()
        .add_rule(&PolygonId::new(id), rule)
        .await?;
    state.persist().await;
    Ok((StatusCode::CREATED, Json(PolygonView::new(&record))))
}

pub async fn update_rule(
    State(state): State<Arc<AppState>>,
    Path((id, rule_id)): Path<(String, String)>,
    Json(update): Json<RuleUpdate>,
) -> ApiResult<Json<PolygonView>> {
    state.count_request();
    let record = state
        .coordinator()
        .update_rule(&PolygonId::new(id), &rule_id, update)
        .await?;
    state.persist().await;
    Ok(Json(PolygonView::new(&record)))
}

pub async fn remove_rule(
    State(state): State<Arc<AppState>>,
    Path((id, rule_id)): Path<(String, String)>,
) -> ApiResult<Json<PolygonView>> {
    state.count_request();
    let record = state
        .coordinator()
        .remove_rule(&PolygonId::new(id), &rule_id)
        .await?;
    state.persist().await;
    Ok(Json(PolygonView::new(&record)))
}

pub async fn set_data_source(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<DataSourceBody>,
) -> ApiResult<Json<PolygonView>> {
    state.count_request();
    let record = state
        .coordinator()
        .set_data_source(&PolygonId::new(id), body.data_source)
        .await?;
    state.persist().await;
    Ok(Json(PolygonView::new(&record)))
}

pub async fn get_active(State(state): State<Arc<AppState>>) -> Json<ActiveBody> {
    state.count_request();
    let store = state.coordinator().store().read().await;
    Json(ActiveBody {
        active_polygon_id: store.active().cloned(),
    })
}

pub async fn set_active(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ActiveBody>,
) -> ApiResult<Json<ActiveBody>> {
    state.count_request();
    state
        .coordinator()
        .set_active(body.active_polygon_id.clone())
        .await?;
    state.persist().await;
    Ok(Json(body))
}

async fn timeline_view(state: &AppState) -> TimelineView {
    let selection = state.timeline().await;
    let now = state.coordinator().now();
    TimelineView {
        selection,
        label: format_range_label(&selection, now),
        total_steps: selection.unit().total_steps(),
        window: match resolve(&selection, now) {
            Resolution::Window(window) => Some(window),
            Resolution::Future => None,
        },
    }
}

/// Store a new selection and re-fetch every polygon for it
async fn change_timeline(state: &Arc<AppState>, selection: TimeSelection) {
    state.set_timeline(selection).await;
    let started = state.coordinator().trigger_all(&selection).await;
    info!(
        unit = selection.unit().as_str(),
        range = ?selection.step_range(),
        polygons = started.len(),
        "Timeline changed"
    );
    state.persist().await;
    state.settle(started.into_iter().map(|(_, handle)| handle).collect());
}

pub async fn get_timeline(State(state): State<Arc<AppState>>) -> Json<TimelineView> {
    state.count_request();
    Json(timeline_view(&state).await)
}

pub async fn set_timeline(
    State(state): State<Arc<AppState>>,
    Json(selection): Json<TimeSelection>,
) -> Json<TimelineView> {
    state.count_request();
    change_timeline(&state, selection).await;
    Json(timeline_view(&state).await)
}

pub async fn step_timeline(
    State(state): State<Arc<AppState>>,
    Json(body): Json<StepBody>,
) -> Json<TimelineView> {
    state.count_request();
    let selection = state.timeline().await.step(body.direction);
    change_timeline(&state, selection).await;
    Json(timeline_view(&state).await)
}

/// Refresh one polygon (or all) for the current timeline and wait
pub async fn refresh(
    State(state): State<Arc<AppState>>,
    body: Option<Json<RefreshBody>>,
) -> ApiResult<Json<Vec<RefreshReport>>> {
    state.count_request();
    let body = body.map(|Json(b)| b).unwrap_or_default();
    let selection = state.timeline().await;
    let coordinator = state.coordinator();

    let outcomes: Vec<(PolygonId, RefreshOutcome)> = match body.id {
        Some(id) => {
            if coordinator.get(&id).await.is_none() {
                return Err(not_found(&id));
            }
            let outcome = coordinator.refresh(&id, &selection).await;
            vec![(id, outcome)]
        }
        None => coordinator.refresh_all(&selection).await,
    };

    let reports = outcomes
        .into_iter()
        .map(|(id, outcome)| {
            state.record_outcome(&outcome);
            RefreshReport {
                id,
                outcome: outcome.kind().to_string(),
                polygon: outcome.record().map(|r| PolygonView::new(r)),
            }
        })
        .collect();
    state.persist().await;
    Ok(Json(reports))
}

pub async fn render(State(state): State<Arc<AppState>>) -> ApiResult<impl IntoResponse> {
    state.count_request();
    let collection: Value = state.render().await?;
    Ok(Json(collection))
}
