use axum::{
    extract::{Json, State},
    response::Html,
    routing::{get, post},
    Router,
};
use boiler_protocol::relay::KasaPlug;
use chrono::Local;
use serde::Deserialize;
use tower_http::trace::TraceLayer;

use crate::runner::{ControllerState, JobRunner};

const STATUS_PAGE: &str = include_str!("../static/status.html");

#[derive(Clone)]
pub struct WebState {
    pub runner: JobRunner,
    pub plug: KasaPlug,
}

#[derive(Deserialize)]
pub struct PlugControlRequest {
    state: bool,
}

pub fn router(state: WebState) -> Router {
    Router::new()
        .route("/", get(serve_status_page))
        .route("/api/status", get(get_status))
        .route("/api/plug", post(control_plug))
        .route("/api/energy", get(get_energy))
        .route("/api/replan", post(replan))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn create_web_server(bind: &str, state: WebState) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(bind).await?;
    tracing::info!("web server on http://{}", listener.local_addr()?);
    axum::serve(listener, router(state)).await?;
    Ok(())
}

async fn serve_status_page() -> Html<&'static str> {
    Html(STATUS_PAGE)
}

async fn get_status(State(state): State<WebState>) -> Json<ControllerState> {
    let status = state.runner.state().read().await.clone();
    Json(status)
}

fn reply(result: anyhow::Result<serde_json::Value>) -> Json<serde_json::Value> {
    match result {
        Ok(data) => Json(serde_json::json!({ "success": true, "data": data })),
        Err(e) => Json(serde_json::json!({ "success": false, "error": format!("{e:#}") })),
    }
}

/// Manual override. The next scheduled directive still applies.
async fn control_plug(
    State(state): State<WebState>,
    Json(request): Json<PlugControlRequest>,
) -> Json<serde_json::Value> {
    let result = state.runner.switch(request.state).await;
    reply(result.map(|()| serde_json::json!({ "state": request.state })))
}

async fn get_energy(State(state): State<WebState>) -> Json<serde_json::Value> {
    let plug = state.plug.clone();
    let result = tokio::task::spawn_blocking(move || {
        let info = plug.sysinfo()?;
        let meter = plug.realtime()?;
        Ok::<_, anyhow::Error>(serde_json::json!({
            "alias": info.alias,
            "on": info.is_on(),
            "watts": meter.watts(),
            "watt_hours": meter.watt_hours(),
        }))
    })
    .await
    .map_err(anyhow::Error::from)
    .and_then(|r| r);
    reply(result)
}

/// Runs today's planning cycle again and schedules its directives.
async fn replan(State(state): State<WebState>) -> Json<serde_json::Value> {
    let plan = state.runner.plan(Local::now().date_naive()).await;
    reply(serde_json::to_value(plan).map_err(anyhow::Error::from))
}
