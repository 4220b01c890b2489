/**
 * WARDNET KERNEL - Point d'entrée du serveur d'agrégation de flotte
 *
 * RÔLE : Orchestration des modules : config, registre de flotte,
 * ingestion MQTT, moniteur de liveness, persistance, API REST.
 *
 * ARCHITECTURE : Event-driven via MQTT + API REST + sweep périodique.
 * UTILITÉ : Source de vérité unique de l'état réseau pour le dashboard.
 */

mod alerts;
mod clock;
mod config;
mod errors;
mod fleet;
mod health;
mod http;
mod liveness;
mod models;
mod mqtt;
mod storage;
mod topology;

use crate::config::MqttConf;
use crate::fleet::FleetRegistry;
use crate::health::HealthTracker;
use crate::liveness::LivenessMonitor;
use crate::storage::{FleetStore, SharedStore};

use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // variables d'environnement depuis .env (si présent)
    dotenvy::dotenv().ok();
    env_logger::init();

    let cfg = config::load_config().await;

    // persistance
    std::fs::create_dir_all(&cfg.data_dir).unwrap_or_else(|e| {
        log::warn!("[kernel] failed to create data dir: {e}");
    });
    let store: SharedStore = Arc::new(FleetStore::new(&cfg.data_dir));

    // registre de flotte, restauré depuis le disque
    let mut registry = FleetRegistry::new(cfg.thresholds, clock::system_clock());
    let devices = store.load_devices().await.unwrap_or_else(|e| {
        log::error!("[kernel] failed to load devices: {e}");
        Default::default()
    });
    let alerts = store.load_alerts().await.unwrap_or_else(|e| {
        log::error!("[kernel] failed to load alerts: {e}");
        Default::default()
    });
    registry.restore(devices, alerts);
    let fleet = fleet::shared(registry);

    let health = HealthTracker::new();

    // client MQTT partagé : l'event loop vit dans la boucle d'ingestion,
    // les clones du client servent aux publications fleet
    let mqtt_cfg = cfg
        .mqtt
        .clone()
        .unwrap_or(MqttConf { host: "localhost".into(), port: 1883 });
    let (client, eventloop) = mqtt::connect(&mqtt_cfg, "wardnet-kernel");
    mqtt::spawn_telemetry_listener(
        fleet.clone(),
        store.clone(),
        client.clone(),
        eventloop,
        health.clone(),
    );

    // sweep périodique de liveness + diffusion du résumé
    LivenessMonitor::new(fleet.clone(), cfg.liveness).spawn(client, store.clone());

    // HTTP
    let app_state = http::AppState {
        fleet,
        store,
        health,
        stale_after: time::Duration::seconds(cfg.liveness.offline_timeout_seconds as i64),
    };
    let app = http::build_router(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], cfg.http_port));
    log::info!("[kernel] listening on http://{addr}");
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
