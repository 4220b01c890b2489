/**
 * INGESTION MQTT - Flux télémétrie entrant et republication fleet
 *
 * RÔLE :
 * Écoute les snapshots appareils et trafic publiés par les sondes,
 * les applique au registre de flotte, puis republie l'état fusionné et
 * les alertes sur les topics fleet pour les abonnés temps réel.
 *
 * FONCTIONNEMENT :
 * - Souscriptions : wardnet/telemetry/devices/#, wardnet/telemetry/traffic/#
 * - Payload invalide = drop + log, la boucle ne meurt jamais
 * - Publications et persistance en fire-and-forget : un broker ou un
 *   disque lent ne bloque pas l'ingestion de l'update suivant
 */

use crate::config::MqttConf;
use crate::fleet::SharedFleet;
use crate::health::HealthTracker;
use crate::models::{TelemetryUpdate, TrafficFrame};
use crate::storage::SharedStore;
use rumqttc::{AsyncClient, Event, EventLoop, Incoming, MqttOptions, QoS};
use serde::Serialize;
use std::time::Duration;
use tokio::task;

pub const TOPIC_TELEMETRY_DEVICES: &str = "wardnet/telemetry/devices/#";
pub const TOPIC_TELEMETRY_TRAFFIC: &str = "wardnet/telemetry/traffic/#";
const PREFIX_DEVICES: &str = "wardnet/telemetry/devices/";
const PREFIX_TRAFFIC: &str = "wardnet/telemetry/traffic/";

pub const TOPIC_FLEET_DEVICE: &str = "wardnet/fleet/device@v1";
pub const TOPIC_FLEET_ALERT: &str = "wardnet/fleet/alert@v1";
pub const TOPIC_FLEET_SUMMARY: &str = "wardnet/fleet/summary@v1";
pub const TOPIC_FLEET_TRAFFIC: &str = "wardnet/fleet/traffic@v1";

pub fn connect(cfg: &MqttConf, client_id: &str) -> (AsyncClient, EventLoop) {
    let mut opts = MqttOptions::new(client_id, &cfg.host, cfg.port);
    opts.set_keep_alive(Duration::from_secs(15));
    AsyncClient::new(opts, 64)
}

/// Publie un document JSON sans bloquer l'appelant; échec logué.
pub fn publish_json<T: Serialize>(client: &AsyncClient, topic: &'static str, value: &T) {
    let payload = match serde_json::to_string(value) {
        Ok(p) => p,
        Err(e) => {
            log::error!("[mqtt] serialize for {topic} failed: {e}");
            return;
        }
    };
    let client = client.clone();
    task::spawn(async move {
        if let Err(e) = client.publish(topic, QoS::AtLeastOnce, false, payload).await {
            log::error!("[mqtt] publish on {topic} failed: {e:?}");
        }
    });
}

/// Boucle d'ingestion : possède l'event loop du client partagé du kernel.
pub fn spawn_telemetry_listener(
    fleet: SharedFleet,
    store: SharedStore,
    client: AsyncClient,
    mut eventloop: EventLoop,
    health: HealthTracker,
) {
    task::spawn(async move {
        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(Incoming::ConnAck(_))) => {
                    health.mark_mqtt_connected();
                    // resouscrire après chaque (re)connexion
                    for topic in [TOPIC_TELEMETRY_DEVICES, TOPIC_TELEMETRY_TRAFFIC] {
                        if let Err(e) = client.subscribe(topic, QoS::AtLeastOnce).await {
                            log::error!("[mqtt] subscribe {topic} failed: {e:?}");
                        }
                    }
                    log::info!("[mqtt] connected, telemetry subscriptions active");
                }
                Ok(Event::Incoming(Incoming::Publish(p))) => {
                    if p.topic.starts_with(PREFIX_DEVICES) {
                        handle_device_payload(&fleet, &store, &client, &p.payload);
                    } else if p.topic.starts_with(PREFIX_TRAFFIC) {
                        handle_traffic_payload(&fleet, &client, &p.payload);
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    log::error!("[mqtt] connection error: {e:?}");
                    health.increment_reconnects();
                    tokio::time::sleep(Duration::from_secs(2)).await;
                }
            }
        }
    });
}

fn handle_device_payload(
    fleet: &SharedFleet,
    store: &SharedStore,
    client: &AsyncClient,
    payload: &[u8],
) {
    let update: TelemetryUpdate = match serde_json::from_slice(payload) {
        Ok(u) => u,
        Err(e) => {
            // télémétrie malformée : on droppe, on ne crashe pas l'agrégateur
            log::warn!("[mqtt] invalid device telemetry dropped: {e}");
            return;
        }
    };

    let device_id = update.device_id.clone();
    let (outcome, snapshot) = {
        let mut fleet = fleet.lock();
        match fleet.apply_update(update) {
            Ok(outcome) => {
                let snapshot = (outcome.newly_registered || !outcome.alerts.is_empty())
                    .then(|| fleet.snapshot());
                (outcome, snapshot)
            }
            Err(e) => {
                log::warn!("[mqtt] update for {device_id} rejected: {e}");
                return;
            }
        }
    };

    if outcome.newly_registered {
        log::info!("[fleet] registered device {}", outcome.device.device_id);
    }

    publish_json(client, TOPIC_FLEET_DEVICE, &outcome.device);
    for alert in &outcome.alerts {
        publish_json(client, TOPIC_FLEET_ALERT, alert);
    }

    // persistance hors verrou, meilleure-effort
    if let Some((devices, alerts)) = snapshot {
        let store = store.clone();
        let save_alerts = !outcome.alerts.is_empty();
        task::spawn(async move {
            if let Err(e) = store.save_devices(&devices).await {
                log::error!("[storage] save devices failed: {e}");
            }
            if save_alerts {
                if let Err(e) = store.save_alerts(&alerts).await {
                    log::error!("[storage] save alerts failed: {e}");
                }
            }
        });
    }
}

fn handle_traffic_payload(fleet: &SharedFleet, client: &AsyncClient, payload: &[u8]) {
    let frame: TrafficFrame = match serde_json::from_slice(payload) {
        Ok(f) => f,
        Err(e) => {
            log::warn!("[mqtt] invalid traffic frame dropped: {e}");
            return;
        }
    };

    let sample = match fleet.lock().record_traffic(frame) {
        Ok(sample) => sample,
        Err(e) => {
            log::warn!("[mqtt] traffic frame rejected: {e}");
            return;
        }
    };

    publish_json(client, TOPIC_FLEET_TRAFFIC, &sample);
}
