use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use time::OffsetDateTime;

/// Type d'appareil suivi sur le réseau hospitalier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    #[default]
    Sensor,
    Gateway,
    Server,
}

/// Statut de liveness d'un appareil.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DeviceStatus {
    #[default]
    Online,
    Warning,
    Offline,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertType {
    Latency,
    Bandwidth,
    Connection,
    Security,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    Warning,
    Info,
}

/// État courant d'un appareil, une entrée par device_id.
/// Les champs télémétrie sont fusionnés en last-write-wins champ par champ.
/// Sérialisé tel quel vers la persistance et les topics fleet (camelCase,
/// timestamps RFC3339).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceState {
    pub device_id: String,
    pub name: String,
    pub kind: DeviceKind,
    pub location: String,
    pub ip: String,
    pub status: DeviceStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub last_seen: OffsetDateTime,
    pub bandwidth_kbps: f64,
    pub latency_ms: f64,
    pub packet_loss_pct: f64,
    pub uptime_s: u64,
}

impl DeviceState {
    /// Nouvel appareil avec valeurs par défaut, vu pour la première fois.
    pub fn fresh(device_id: &str, first_seen: OffsetDateTime) -> Self {
        Self {
            device_id: device_id.to_string(),
            name: String::new(),
            kind: DeviceKind::default(),
            location: String::new(),
            ip: String::new(),
            status: DeviceStatus::Online,
            last_seen: first_seen,
            bandwidth_kbps: 0.0,
            latency_ms: 0.0,
            packet_loss_pct: 0.0,
            uptime_s: 0,
        }
    }
}

// Message télémétrie entrant (contrat wardnet/telemetry/devices/#).
// Tous les champs sont optionnels sauf device_id : un champ omis
// conserve la valeur précédente côté registre.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryUpdate {
    pub device_id: String,
    pub device_name: Option<String>,
    pub device_type: Option<DeviceKind>,
    pub location: Option<String>,
    pub ip_address: Option<String>,
    pub status: Option<DeviceStatus>,
    pub bandwidth: Option<f64>,
    pub latency: Option<f64>,
    pub packet_loss: Option<f64>,
    pub uptime: Option<u64>,
}

// Message trafic entrant (contrat wardnet/telemetry/traffic/#).
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrafficFrame {
    pub device_id: String,
    pub bytes_in: Option<u64>,
    pub bytes_out: Option<u64>,
    pub packets_in: Option<u64>,
    pub packets_out: Option<u64>,
    pub bandwidth: Option<f64>,
    pub latency: Option<f64>,
}

/// Échantillon de trafic horodaté, conservé en anneau (50 par appareil).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrafficSample {
    pub device_id: String,
    pub bytes_in: u64,
    pub bytes_out: u64,
    pub packets_in: u64,
    pub packets_out: u64,
    pub bandwidth_kbps: f64,
    pub latency_ms: f64,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

/// Alerte réseau, append-only. Seul `resolved` est mutable après création.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkAlert {
    pub id: String,
    pub device_id: String,
    pub alert_type: AlertType,
    pub severity: Severity,
    pub message: String,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    pub resolved: bool,
}

/// Vue agrégée de la flotte, recalculée intégralement à chaque changement.
/// `alert_count` est DÉRIVÉ du nombre d'alertes non résolues (jamais un
/// compteur indépendant, qui finirait par dériver).
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FleetSummary {
    pub total_devices: usize,
    pub online_devices: usize,
    pub total_bandwidth_kbps: f64,
    pub average_latency_ms: f64,
    pub alert_count: usize,
}

/// Graphe de topologie dérivé, jamais persisté ni mis en cache.
#[derive(Debug, Clone, Serialize)]
pub struct TopologyGraph {
    pub nodes: Vec<TopologyNode>,
    pub links: Vec<TopologyLink>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TopologyNode {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: DeviceKind,
    pub status: DeviceStatus,
    pub ip: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TopologyLink {
    pub source: String,
    pub target: String,
}

pub type DevicesMap = HashMap<String, DeviceState>;
