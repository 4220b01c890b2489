/**
 * WARDNET PROBE - Sonde de télémétrie simulée pour le réseau hospitalier
 *
 * RÔLE :
 * Joue une petite flotte d'appareils IoT (capteurs de chevet, gateways
 * d'étage, serveur central) et publie leurs snapshots d'état et de
 * trafic sur MQTT, là où une vraie sonde lirait le matériel.
 *
 * FONCTIONNEMENT :
 * - État appareil toutes les 5s (5% de chance de statut warning)
 * - Trafic toutes les 10s
 * - Métriques de base par type : un capteur est lent et étroit, un
 *   serveur rapide et large
 */

use rand::Rng;
use rumqttc::{AsyncClient, MqttOptions, QoS};
use serde::Serialize;
use tokio::time::{interval, Duration};

struct Device {
    device_id: &'static str,
    name: &'static str,
    kind: &'static str,
    location: &'static str,
}

const FLEET: &[Device] = &[
    Device { device_id: "sensor-001", name: "Heart Monitor Sensor", kind: "sensor", location: "Room 101" },
    Device { device_id: "sensor-002", name: "Temperature Sensor", kind: "sensor", location: "Room 102" },
    Device { device_id: "sensor-003", name: "BP Monitor Sensor", kind: "sensor", location: "Room 103" },
    Device { device_id: "gateway-001", name: "Main Gateway", kind: "gateway", location: "Floor 1" },
    Device { device_id: "gateway-002", name: "Backup Gateway", kind: "gateway", location: "Floor 2" },
    Device { device_id: "server-001", name: "Central Server", kind: "server", location: "Data Center" },
];

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DeviceTelemetry {
    device_id: &'static str,
    device_name: &'static str,
    device_type: &'static str,
    location: &'static str,
    ip_address: String,
    status: &'static str,
    bandwidth: f64,
    latency: f64,
    packet_loss: f64,
    uptime: u64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TrafficTelemetry {
    device_id: &'static str,
    bytes_in: u64,
    bytes_out: u64,
    packets_in: u64,
    packets_out: u64,
    bandwidth: f64,
    latency: f64,
}

fn random_ip() -> String {
    format!("192.168.1.{}", rand::thread_rng().gen_range(10..210))
}

/// Latence et bande passante de base selon le type d'appareil.
fn base_profile(kind: &str) -> (f64, f64) {
    match kind {
        "sensor" => (20.0, 100.0),
        "gateway" => (10.0, 1000.0),
        _ => (5.0, 10_000.0),
    }
}

fn device_telemetry(device: &Device, ip: String) -> DeviceTelemetry {
    let mut rng = rand::thread_rng();
    let (base_latency, base_bandwidth) = base_profile(device.kind);

    DeviceTelemetry {
        device_id: device.device_id,
        device_name: device.name,
        device_type: device.kind,
        location: device.location,
        ip_address: ip,
        status: if rng.gen_bool(0.05) { "warning" } else { "online" },
        bandwidth: (base_bandwidth + rng.gen_range(0.0..500.0)).floor(),
        latency: (base_latency + rng.gen_range(0.0..30.0)).floor(),
        packet_loss: (rng.gen_range(0.0f64..2.0) * 100.0).round() / 100.0,
        uptime: rng.gen_range(0..86_400 * 7),
    }
}

fn traffic_telemetry(device: &Device) -> TrafficTelemetry {
    let mut rng = rand::thread_rng();
    let base: u64 = match device.kind {
        "sensor" => 1_000,
        "gateway" => 50_000,
        _ => 500_000,
    };

    TrafficTelemetry {
        device_id: device.device_id,
        bytes_in: base + rng.gen_range(0..base / 2),
        bytes_out: base + rng.gen_range(0..base / 2),
        packets_in: rng.gen_range(0..1000),
        packets_out: rng.gen_range(0..1000),
        bandwidth: rng.gen_range(0.0f64..1000.0).floor(),
        latency: rng.gen_range(10.0f64..60.0).floor(),
    }
}

async fn publish<T: Serialize>(client: &AsyncClient, topic: String, value: &T) -> anyhow::Result<()> {
    let payload = serde_json::to_vec(value)?;
    client.publish(topic, QoS::AtLeastOnce, false, payload).await?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let host = std::env::var("WARDNET_MQTT_HOST").unwrap_or_else(|_| "localhost".into());
    let port: u16 = std::env::var("WARDNET_MQTT_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(1883);

    let mut opts = MqttOptions::new("wardnet-probe", &host, port);
    opts.set_keep_alive(Duration::from_secs(30));
    let (client, mut eventloop) = AsyncClient::new(opts, 64);

    // l'event loop doit tourner pour que les publications partent
    tokio::spawn(async move {
        loop {
            if let Err(e) = eventloop.poll().await {
                log::error!("[probe] MQTT loop error: {e:?}");
                tokio::time::sleep(Duration::from_secs(2)).await;
            }
        }
    });

    // une IP stable par appareil pour toute la session
    let ips: Vec<String> = FLEET.iter().map(|_| random_ip()).collect();
    log::info!("[probe] simulating {} devices towards {host}:{port}", FLEET.len());

    let mut device_tick = interval(Duration::from_secs(5));
    let mut traffic_tick = interval(Duration::from_secs(10));

    loop {
        tokio::select! {
            _ = device_tick.tick() => {
                for (device, ip) in FLEET.iter().zip(&ips) {
                    let snapshot = device_telemetry(device, ip.clone());
                    let topic = format!("wardnet/telemetry/devices/{}", device.device_id);
                    if let Err(e) = publish(&client, topic, &snapshot).await {
                        log::error!("[probe] device publish failed: {e}");
                    }
                }
                log::debug!("[probe] published device snapshots");
            }
            _ = traffic_tick.tick() => {
                for device in FLEET {
                    let sample = traffic_telemetry(device);
                    let topic = format!("wardnet/telemetry/traffic/{}", device.device_id);
                    if let Err(e) = publish(&client, topic, &sample).await {
                        log::error!("[probe] traffic publish failed: {e}");
                    }
                }
                log::debug!("[probe] published traffic samples");
            }
        }
    }
}
