/**
 * REGISTRE DE FLOTTE - Agrégation des métriques des appareils du réseau
 *
 * RÔLE :
 * Source de vérité en mémoire : un DeviceState par device_id, fusion
 * last-write-wins champ par champ, résumé de flotte recalculé à chaque
 * changement, journal d'alertes et anneaux de trafic récents.
 *
 * FONCTIONNEMENT :
 * - apply_update() : upsert + merge + recalcul + évaluation des seuils
 * - sweep_offline() : passe périodique de détection offline (liveness)
 * - Le tout derrière un unique Mutex (SharedFleet) : un update et un
 *   sweep ne peuvent jamais entrelacer un read-modify-write
 *
 * UTILITÉ DANS WARDNET :
 * 🎯 Dashboard : vues appareils/résumé/topologie servies par l'API
 * 🎯 Alerting : chaque update passe par les seuils avant publication
 * 🎯 Tests : horloge injectée, aucun appel direct à l'heure système
 */

use crate::alerts::AlertBook;
use crate::clock::SharedClock;
use crate::config::ThresholdsConf;
use crate::errors::FleetError;
use crate::models::{
    AlertType, DeviceState, DeviceStatus, DevicesMap, FleetSummary, NetworkAlert, Severity,
    TelemetryUpdate, TopologyGraph, TrafficFrame, TrafficSample,
};
use crate::topology::build_topology;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use time::Duration;

/// Profondeur de l'historique de trafic conservé par appareil.
const TRAFFIC_RING_CAPACITY: usize = 50;

/// Résultat d'un update télémétrie appliqué.
#[derive(Debug)]
pub struct UpdateOutcome {
    pub device: DeviceState,
    pub alerts: Vec<NetworkAlert>,
    pub newly_registered: bool,
}

/// Résultat d'un sweep de liveness. Le résumé est retourné à chaque
/// sweep, transitions ou pas : c'est le heartbeat du dashboard.
#[derive(Debug)]
pub struct SweepOutcome {
    pub went_offline: Vec<DeviceState>,
    pub alerts: Vec<NetworkAlert>,
    pub summary: FleetSummary,
}

pub struct FleetRegistry {
    devices: DevicesMap,
    traffic: HashMap<String, VecDeque<TrafficSample>>,
    alerts: AlertBook,
    summary: FleetSummary,
    thresholds: ThresholdsConf,
    clock: SharedClock,
}

impl FleetRegistry {
    pub fn new(thresholds: ThresholdsConf, clock: SharedClock) -> Self {
        Self {
            devices: HashMap::new(),
            traffic: HashMap::new(),
            alerts: AlertBook::new(),
            summary: FleetSummary::default(),
            thresholds,
            clock,
        }
    }

    /// Restaure l'état persisté au démarrage puis recalcule le résumé.
    pub fn restore(&mut self, devices: DevicesMap, alerts: Vec<NetworkAlert>) {
        self.devices = devices;
        self.alerts.restore(alerts);
        self.recompute_summary();
    }

    /// Applique un update télémétrie : upsert + fusion last-write-wins.
    /// `last_seen` est toujours rafraîchi; le statut repasse online sauf
    /// si l'update en fournit un explicitement (un update vaut preuve de
    /// vie). Les champs omis conservent leur valeur précédente.
    pub fn apply_update(&mut self, upd: TelemetryUpdate) -> Result<UpdateOutcome, FleetError> {
        if upd.device_id.trim().is_empty() {
            return Err(FleetError::Validation("empty deviceId".into()));
        }

        let now = self.clock.now();
        let newly_registered = !self.devices.contains_key(&upd.device_id);

        let state = self
            .devices
            .entry(upd.device_id.clone())
            .or_insert_with(|| DeviceState::fresh(&upd.device_id, now));

        if let Some(name) = upd.device_name {
            state.name = name;
        }
        if let Some(kind) = upd.device_type {
            state.kind = kind;
        }
        if let Some(location) = upd.location {
            state.location = location;
        }
        if let Some(ip) = upd.ip_address {
            state.ip = ip;
        }
        if let Some(bandwidth) = upd.bandwidth {
            state.bandwidth_kbps = bandwidth;
        }
        if let Some(latency) = upd.latency {
            state.latency_ms = latency;
        }
        if let Some(packet_loss) = upd.packet_loss {
            state.packet_loss_pct = packet_loss;
        }
        if let Some(uptime) = upd.uptime {
            state.uptime_s = uptime;
        }
        state.status = upd.status.unwrap_or(DeviceStatus::Online);
        state.last_seen = now;

        let device = state.clone();
        let alerts = self.alerts.evaluate(&device, &self.thresholds, now);
        self.recompute_summary();

        Ok(UpdateOutcome { device, alerts, newly_registered })
    }

    /// Enregistre un échantillon de trafic dans l'anneau de l'appareil.
    pub fn record_traffic(&mut self, frame: TrafficFrame) -> Result<TrafficSample, FleetError> {
        if frame.device_id.trim().is_empty() {
            return Err(FleetError::Validation("empty deviceId".into()));
        }

        let sample = TrafficSample {
            device_id: frame.device_id.clone(),
            bytes_in: frame.bytes_in.unwrap_or(0),
            bytes_out: frame.bytes_out.unwrap_or(0),
            packets_in: frame.packets_in.unwrap_or(0),
            packets_out: frame.packets_out.unwrap_or(0),
            bandwidth_kbps: frame.bandwidth.unwrap_or(0.0),
            latency_ms: frame.latency.unwrap_or(0.0),
            timestamp: self.clock.now(),
        };

        let ring = self.traffic.entry(frame.device_id).or_default();
        ring.push_front(sample.clone());
        ring.truncate(TRAFFIC_RING_CAPACITY);

        Ok(sample)
    }

    /// Passe de liveness : tout appareil non-offline sans update depuis
    /// plus de `timeout` bascule offline, avec exactement une alerte par
    /// transition. Les appareils ne sont jamais retirés de la carte, le
    /// résumé continue de les compter (seul le statut change).
    pub fn sweep_offline(&mut self, timeout: Duration) -> SweepOutcome {
        let now = self.clock.now();

        // identifier d'abord, marquer ensuite
        let stale: Vec<String> = self
            .devices
            .values()
            .filter(|d| d.status != DeviceStatus::Offline && now - d.last_seen > timeout)
            .map(|d| d.device_id.clone())
            .collect();

        let mut went_offline = Vec::new();
        let mut alerts = Vec::new();

        for device_id in stale {
            let snapshot = match self.devices.get_mut(&device_id) {
                Some(device) => {
                    device.status = DeviceStatus::Offline;
                    device.clone()
                }
                None => continue,
            };
            log::warn!("[fleet] device {} went offline", device_id);

            let label = if snapshot.name.is_empty() {
                snapshot.device_id.clone()
            } else {
                snapshot.name.clone()
            };
            alerts.push(self.alerts.raise(
                &device_id,
                AlertType::Connection,
                Severity::Critical,
                format!("Device {} went offline", label),
                now,
            ));
            went_offline.push(snapshot);
        }

        self.recompute_summary();

        SweepOutcome { went_offline, alerts, summary: self.summary.clone() }
    }

    /// Recalcul intégral du résumé (pli linéaire sur la carte, pas de
    /// raccourci incrémental à cette échelle).
    fn recompute_summary(&mut self) {
        let total = self.devices.len();
        let online = self
            .devices
            .values()
            .filter(|d| d.status == DeviceStatus::Online)
            .count();
        let total_bandwidth: f64 = self.devices.values().map(|d| d.bandwidth_kbps).sum();
        let average_latency = if total > 0 {
            self.devices.values().map(|d| d.latency_ms).sum::<f64>() / total as f64
        } else {
            0.0
        };

        self.summary = FleetSummary {
            total_devices: total,
            online_devices: online,
            total_bandwidth_kbps: total_bandwidth,
            average_latency_ms: average_latency,
            alert_count: self.alerts.unresolved_count(),
        };
    }

    /// Résout une alerte puis resynchronise le décompte dérivé du résumé.
    pub fn resolve_alert(&mut self, id: &str) -> Result<NetworkAlert, FleetError> {
        let alert = self.alerts.resolve(id)?;
        self.recompute_summary();
        Ok(alert)
    }

    /// Liste des appareils, plus récemment vus d'abord.
    pub fn devices(&self) -> Vec<DeviceState> {
        let mut list: Vec<DeviceState> = self.devices.values().cloned().collect();
        list.sort_by(|a, b| b.last_seen.cmp(&a.last_seen).then(a.device_id.cmp(&b.device_id)));
        list
    }

    pub fn device(&self, id: &str) -> Option<DeviceState> {
        self.devices.get(id).cloned()
    }

    pub fn summary(&self) -> FleetSummary {
        self.summary.clone()
    }

    pub fn alerts(&self, unresolved_only: bool, limit: usize) -> Vec<NetworkAlert> {
        self.alerts.recent(unresolved_only, limit)
    }

    /// Échantillons de trafic d'un appareil connu, plus récents d'abord.
    pub fn traffic_for(&self, device_id: &str) -> Result<Vec<TrafficSample>, FleetError> {
        if !self.devices.contains_key(device_id) {
            return Err(FleetError::DeviceNotFound(device_id.to_string()));
        }
        Ok(self
            .traffic
            .get(device_id)
            .map(|ring| ring.iter().cloned().collect())
            .unwrap_or_default())
    }

    /// Topologie dérivée à la demande. L'ordre est rendu déterministe en
    /// triant par device_id avant l'appariement round-robin.
    pub fn topology(&self) -> TopologyGraph {
        let mut list: Vec<DeviceState> = self.devices.values().cloned().collect();
        list.sort_by(|a, b| a.device_id.cmp(&b.device_id));
        build_topology(&list)
    }

    /// Instantané (carte + journal) pour la persistance.
    pub fn snapshot(&self) -> (DevicesMap, Vec<NetworkAlert>) {
        (self.devices.clone(), self.alerts.all().to_vec())
    }

    pub fn now(&self) -> time::OffsetDateTime {
        self.clock.now()
    }
}

pub type SharedFleet = Arc<Mutex<FleetRegistry>>;

pub fn shared(registry: FleetRegistry) -> SharedFleet {
    Arc::new(Mutex::new(registry))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::Clock;
    use time::macros::datetime;
    use time::OffsetDateTime;

    /// Horloge pilotée à la main pour dérouler les sweeps sans attendre.
    struct ManualClock(Mutex<OffsetDateTime>);

    impl ManualClock {
        fn starting_at(t: OffsetDateTime) -> Arc<Self> {
            Arc::new(Self(Mutex::new(t)))
        }

        fn advance(&self, d: Duration) {
            *self.0.lock() += d;
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> OffsetDateTime {
            *self.0.lock()
        }
    }

    fn registry_at(t: OffsetDateTime) -> (FleetRegistry, Arc<ManualClock>) {
        let clock = ManualClock::starting_at(t);
        (FleetRegistry::new(ThresholdsConf::default(), clock.clone()), clock)
    }

    fn update(device_id: &str) -> TelemetryUpdate {
        TelemetryUpdate {
            device_id: device_id.into(),
            device_name: None,
            device_type: None,
            location: None,
            ip_address: None,
            status: None,
            bandwidth: None,
            latency: None,
            packet_loss: None,
            uptime: None,
        }
    }

    const T0: OffsetDateTime = datetime!(2026-01-01 00:00 UTC);

    #[test]
    fn test_merge_is_last_write_wins_per_field() {
        let (mut fleet, clock) = registry_at(T0);

        let mut first = update("sensor-001");
        first.device_name = Some("Heart Monitor".into());
        first.latency = Some(50.0);
        fleet.apply_update(first).unwrap();

        clock.advance(Duration::seconds(5));
        let mut second = update("sensor-001");
        second.bandwidth = Some(120.0);
        let out = fleet.apply_update(second).unwrap();

        // champs omis conservés, champs fournis remplacés
        assert_eq!(out.device.name, "Heart Monitor");
        assert_eq!(out.device.latency_ms, 50.0);
        assert_eq!(out.device.bandwidth_kbps, 120.0);
        // last_seen toujours rafraîchi
        assert_eq!(out.device.last_seen, T0 + Duration::seconds(5));
        assert!(!out.newly_registered);
    }

    #[test]
    fn test_update_is_proof_of_liveness() {
        let (mut fleet, clock) = registry_at(T0);
        fleet.apply_update(update("sensor-001")).unwrap();

        clock.advance(Duration::seconds(61));
        fleet.sweep_offline(Duration::seconds(60));
        assert_eq!(fleet.device("sensor-001").unwrap().status, DeviceStatus::Offline);

        // un nouvel update suffit à repasser online
        let out = fleet.apply_update(update("sensor-001")).unwrap();
        assert_eq!(out.device.status, DeviceStatus::Online);
    }

    #[test]
    fn test_explicit_status_wins_over_forced_online() {
        let (mut fleet, _clock) = registry_at(T0);
        let mut upd = update("gateway-001");
        upd.status = Some(DeviceStatus::Warning);
        let out = fleet.apply_update(upd).unwrap();
        assert_eq!(out.device.status, DeviceStatus::Warning);
    }

    #[test]
    fn test_empty_device_id_is_rejected() {
        let (mut fleet, _clock) = registry_at(T0);
        assert!(matches!(
            fleet.apply_update(update("  ")),
            Err(FleetError::Validation(_))
        ));
        assert_eq!(fleet.summary().total_devices, 0);
    }

    #[test]
    fn test_summary_average_latency_zero_when_empty() {
        let (fleet, _clock) = registry_at(T0);
        let summary = fleet.summary();
        assert_eq!(summary.total_devices, 0);
        assert_eq!(summary.average_latency_ms, 0.0);
    }

    #[test]
    fn test_summary_folds_over_all_devices() {
        let (mut fleet, _clock) = registry_at(T0);

        let mut a = update("sensor-001");
        a.latency = Some(100.0);
        a.bandwidth = Some(300.0);
        fleet.apply_update(a).unwrap();

        let mut b = update("gateway-001");
        b.latency = Some(200.0);
        b.bandwidth = Some(700.0);
        fleet.apply_update(b).unwrap();

        let summary = fleet.summary();
        assert_eq!(summary.total_devices, 2);
        assert_eq!(summary.online_devices, 2);
        assert_eq!(summary.total_bandwidth_kbps, 1000.0);
        assert_eq!(summary.average_latency_ms, 150.0);
    }

    #[test]
    fn test_offline_devices_stay_counted() {
        let (mut fleet, clock) = registry_at(T0);
        fleet.apply_update(update("sensor-001")).unwrap();
        clock.advance(Duration::seconds(120));
        fleet.apply_update(update("sensor-002")).unwrap();

        let outcome = fleet.sweep_offline(Duration::seconds(60));
        assert_eq!(outcome.went_offline.len(), 1);

        // marqué offline mais jamais retiré de la carte
        let summary = fleet.summary();
        assert_eq!(summary.total_devices, 2);
        assert_eq!(summary.online_devices, 1);
    }

    #[test]
    fn test_sweep_offline_transition_fires_once() {
        let (mut fleet, clock) = registry_at(T0);
        let mut upd = update("sensor-001");
        upd.device_name = Some("Heart Monitor".into());
        fleet.apply_update(upd).unwrap();

        clock.advance(Duration::seconds(61));
        let first = fleet.sweep_offline(Duration::seconds(60));
        assert_eq!(first.went_offline.len(), 1);
        assert_eq!(first.alerts.len(), 1);
        assert_eq!(first.alerts[0].alert_type, AlertType::Connection);
        assert_eq!(first.alerts[0].severity, Severity::Critical);
        assert!(first.alerts[0].message.contains("Heart Monitor"));

        // re-sweep sans nouvel update : idempotent, aucune nouvelle alerte
        clock.advance(Duration::seconds(30));
        let second = fleet.sweep_offline(Duration::seconds(60));
        assert!(second.went_offline.is_empty());
        assert!(second.alerts.is_empty());
        assert_eq!(second.summary.alert_count, 1);
    }

    #[test]
    fn test_sweep_returns_summary_even_without_transitions() {
        let (mut fleet, _clock) = registry_at(T0);
        fleet.apply_update(update("sensor-001")).unwrap();

        let outcome = fleet.sweep_offline(Duration::seconds(60));
        assert!(outcome.went_offline.is_empty());
        assert_eq!(outcome.summary.total_devices, 1);
    }

    #[test]
    fn test_threshold_alerts_flow_into_summary() {
        let (mut fleet, _clock) = registry_at(T0);

        let mut upd = update("sensor-001");
        upd.latency = Some(250.0);
        upd.packet_loss = Some(6.0);
        let out = fleet.apply_update(upd).unwrap();

        assert_eq!(out.alerts.len(), 2);
        assert_eq!(fleet.summary().alert_count, 2);

        fleet.resolve_alert(&out.alerts[0].id).unwrap();
        assert_eq!(fleet.summary().alert_count, 1);
    }

    #[test]
    fn test_resolve_unknown_alert_is_not_found() {
        let (mut fleet, _clock) = registry_at(T0);
        assert!(matches!(
            fleet.resolve_alert("missing"),
            Err(FleetError::AlertNotFound(_))
        ));
    }

    #[test]
    fn test_traffic_ring_is_capped_newest_first() {
        let (mut fleet, clock) = registry_at(T0);
        fleet.apply_update(update("gateway-001")).unwrap();

        for i in 0..60u64 {
            clock.advance(Duration::seconds(1));
            let frame = TrafficFrame {
                device_id: "gateway-001".into(),
                bytes_in: Some(i),
                bytes_out: None,
                packets_in: None,
                packets_out: None,
                bandwidth: None,
                latency: None,
            };
            fleet.record_traffic(frame).unwrap();
        }

        let samples = fleet.traffic_for("gateway-001").unwrap();
        assert_eq!(samples.len(), 50);
        assert_eq!(samples[0].bytes_in, 59); // plus récent d'abord
        assert_eq!(samples[49].bytes_in, 10);
        assert!(matches!(
            fleet.traffic_for("unknown"),
            Err(FleetError::DeviceNotFound(_))
        ));
    }

    #[test]
    fn test_devices_listing_most_recent_first() {
        let (mut fleet, clock) = registry_at(T0);
        fleet.apply_update(update("sensor-001")).unwrap();
        clock.advance(Duration::seconds(10));
        fleet.apply_update(update("sensor-002")).unwrap();

        let list = fleet.devices();
        assert_eq!(list[0].device_id, "sensor-002");
        assert_eq!(list[1].device_id, "sensor-001");
    }
}
