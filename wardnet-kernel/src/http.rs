/**
 * API REST WARDNET - Surface de requête du dashboard
 *
 * RÔLE :
 * Expose l'état de la flotte en lecture (appareils, résumé, topologie,
 * trafic, alertes) et la résolution d'alertes. Interface entre le
 * dashboard/CLI et le registre en mémoire.
 *
 * FONCTIONNEMENT :
 * - Serveur Axum, routes plates, sérialisation JSON automatique
 * - Erreurs HTTP standardisées : 404 sur appareil/alerte inconnu
 * - Les vues ajoutent stale/staleForSeconds pour l'affichage, calculés
 *   à la requête (jamais stockés)
 */

use crate::errors::FleetError;
use crate::fleet::SharedFleet;
use crate::health::{HealthTracker, KernelHealth};
use crate::models::{
    DeviceKind, DeviceState, DeviceStatus, FleetSummary, NetworkAlert, TopologyGraph, TrafficSample,
};
use crate::storage::SharedStore;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use time::format_description::well_known::Rfc3339;
use time::{Duration, OffsetDateTime};

#[derive(Clone)]
pub struct AppState {
    pub fleet: SharedFleet,
    pub store: SharedStore,
    pub health: HealthTracker,
    /// âge au-delà duquel un appareil est affiché "stale" (= timeout offline)
    pub stale_after: Duration,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DeviceView {
    device_id: String,
    name: String,
    #[serde(rename = "type")]
    kind: DeviceKind,
    location: String,
    ip: String,
    status: DeviceStatus,
    last_seen: String, // RFC3339 pour l'API
    stale: bool,
    stale_for_seconds: i64,
    bandwidth: f64,
    latency: f64,
    packet_loss: f64,
    uptime: u64,
}

fn to_view(d: &DeviceState, now: OffsetDateTime, stale_after: Duration) -> DeviceView {
    let age = now - d.last_seen;
    DeviceView {
        device_id: d.device_id.clone(),
        name: d.name.clone(),
        kind: d.kind,
        location: d.location.clone(),
        ip: d.ip.clone(),
        status: d.status,
        last_seen: d.last_seen.format(&Rfc3339).unwrap_or_default(),
        stale: age > stale_after,
        stale_for_seconds: age.whole_seconds().max(0),
        bandwidth: d.bandwidth_kbps,
        latency: d.latency_ms,
        packet_loss: d.packet_loss_pct,
        uptime: d.uptime_s,
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BandwidthView {
    device_id: String,
    device_name: String,
    bandwidth: f64,
    status: DeviceStatus,
}

/// Bilan de santé de la flotte (comptages par statut + agrégats).
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FleetHealthView {
    total: usize,
    online: usize,
    offline: usize,
    warning: usize,
    average_latency: f64,
    total_bandwidth: f64,
    timestamp: String,
}

#[derive(Debug, Deserialize)]
struct AlertsParams {
    unresolved: Option<bool>,
    limit: Option<usize>,
}

pub fn build_router(app_state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/system/health", get(get_system_health))
        .route("/devices", get(get_devices))
        .route("/devices/{id}", get(get_device))
        .route("/devices/{id}/traffic", get(get_device_traffic))
        .route("/topology", get(get_topology))
        .route("/summary", get(get_summary))
        .route("/fleet/health", get(get_fleet_health))
        .route("/bandwidth", get(get_bandwidth))
        .route("/alerts", get(get_alerts))
        .route("/alerts/{id}/resolve", post(resolve_alert))
        .with_state(app_state)
}

// GET /devices (liste, plus récemment vus d'abord)
async fn get_devices(State(app): State<AppState>) -> Json<Vec<DeviceView>> {
    let fleet = app.fleet.lock();
    let now = fleet.now();
    let list = fleet
        .devices()
        .iter()
        .map(|d| to_view(d, now, app.stale_after))
        .collect();
    Json(list)
}

// GET /devices/{id} (détail)
async fn get_device(
    State(app): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DeviceView>, StatusCode> {
    let fleet = app.fleet.lock();
    let Some(d) = fleet.device(&id) else { return Err(StatusCode::NOT_FOUND) };
    Ok(Json(to_view(&d, fleet.now(), app.stale_after)))
}

// GET /devices/{id}/traffic (échantillons récents, plus récents d'abord)
async fn get_device_traffic(
    State(app): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<TrafficSample>>, StatusCode> {
    match app.fleet.lock().traffic_for(&id) {
        Ok(samples) => Ok(Json(samples)),
        Err(FleetError::DeviceNotFound(_)) => Err(StatusCode::NOT_FOUND),
        Err(_) => Err(StatusCode::INTERNAL_SERVER_ERROR),
    }
}

// GET /topology (recalculée à chaque requête)
async fn get_topology(State(app): State<AppState>) -> Json<TopologyGraph> {
    Json(app.fleet.lock().topology())
}

// GET /summary (résumé de flotte courant)
async fn get_summary(State(app): State<AppState>) -> Json<FleetSummary> {
    Json(app.fleet.lock().summary())
}

// GET /fleet/health (comptages par statut)
async fn get_fleet_health(State(app): State<AppState>) -> Json<FleetHealthView> {
    let fleet = app.fleet.lock();
    let devices = fleet.devices();
    let summary = fleet.summary();
    let count = |s: DeviceStatus| devices.iter().filter(|d| d.status == s).count();

    Json(FleetHealthView {
        total: devices.len(),
        online: count(DeviceStatus::Online),
        offline: count(DeviceStatus::Offline),
        warning: count(DeviceStatus::Warning),
        average_latency: summary.average_latency_ms,
        total_bandwidth: summary.total_bandwidth_kbps,
        timestamp: fleet.now().format(&Rfc3339).unwrap_or_default(),
    })
}

// GET /bandwidth (usage par appareil)
async fn get_bandwidth(State(app): State<AppState>) -> Json<Vec<BandwidthView>> {
    let list = app
        .fleet
        .lock()
        .devices()
        .iter()
        .map(|d| BandwidthView {
            device_id: d.device_id.clone(),
            device_name: d.name.clone(),
            bandwidth: d.bandwidth_kbps,
            status: d.status,
        })
        .collect();
    Json(list)
}

// GET /alerts (par défaut : non résolues, 20 max, plus récentes d'abord)
async fn get_alerts(
    State(app): State<AppState>,
    Query(params): Query<AlertsParams>,
) -> Json<Vec<NetworkAlert>> {
    let unresolved_only = params.unresolved.unwrap_or(true);
    let limit = params.limit.unwrap_or(20);
    Json(app.fleet.lock().alerts(unresolved_only, limit))
}

// POST /alerts/{id}/resolve
async fn resolve_alert(
    State(app): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<NetworkAlert>, StatusCode> {
    let (alert, alerts_snapshot) = {
        let mut fleet = app.fleet.lock();
        let alert = match fleet.resolve_alert(&id) {
            Ok(a) => a,
            Err(FleetError::AlertNotFound(_)) => return Err(StatusCode::NOT_FOUND),
            Err(_) => return Err(StatusCode::INTERNAL_SERVER_ERROR),
        };
        let (_, alerts) = fleet.snapshot();
        (alert, alerts)
    };

    // persistance meilleure-effort, la réponse n'attend pas le disque
    let store = app.store.clone();
    tokio::spawn(async move {
        if let Err(e) = store.save_alerts(&alerts_snapshot).await {
            log::error!("[http] save alerts after resolve failed: {e}");
        }
    });

    Ok(Json(alert))
}

// GET /system/health (auto-diagnostic du kernel)
async fn get_system_health(State(app): State<AppState>) -> Json<KernelHealth> {
    Json(app.health.get_health(&app.fleet))
}
