/**
 * ALERTES RÉSEAU - Génération et cycle de vie des alertes de la flotte
 *
 * RÔLE :
 * Inspecte chaque état d'appareil fusionné et décide si une alerte doit
 * être créée (latence haute, perte de paquets). Conserve le journal
 * append-only des alertes et leur résolution.
 *
 * FONCTIONNEMENT :
 * - Deux règles indépendantes, qui peuvent se déclencher sur le même update
 * - Pas de fenêtre de suppression : chaque update qualifiant crée une alerte
 * - resolve() est la seule mutation autorisée, jamais de suppression
 */

use crate::config::ThresholdsConf;
use crate::errors::FleetError;
use crate::models::{AlertType, DeviceState, NetworkAlert, Severity};
use time::OffsetDateTime;
use uuid::Uuid;

/// Journal append-only des alertes réseau.
#[derive(Debug, Default)]
pub struct AlertBook {
    alerts: Vec<NetworkAlert>,
}

impl AlertBook {
    pub fn new() -> Self {
        Self { alerts: Vec::new() }
    }

    /// Restaure le journal depuis la persistance au démarrage.
    pub fn restore(&mut self, alerts: Vec<NetworkAlert>) {
        self.alerts = alerts;
    }

    /// Évalue les seuils sur un état fusionné. Retourne les alertes créées
    /// (0, 1 ou 2 : les règles sont indépendantes).
    pub fn evaluate(
        &mut self,
        state: &DeviceState,
        thresholds: &ThresholdsConf,
        now: OffsetDateTime,
    ) -> Vec<NetworkAlert> {
        let mut raised = Vec::new();

        if state.latency_ms > thresholds.latency_warning_ms {
            raised.push(self.raise(
                &state.device_id,
                AlertType::Latency,
                Severity::Warning,
                format!("High latency detected: {}ms", state.latency_ms),
                now,
            ));
        }

        if state.packet_loss_pct > thresholds.packet_loss_critical_pct {
            raised.push(self.raise(
                &state.device_id,
                AlertType::Connection,
                Severity::Critical,
                format!("Packet loss detected: {}%", state.packet_loss_pct),
                now,
            ));
        }

        raised
    }

    /// Crée et journalise une alerte.
    pub fn raise(
        &mut self,
        device_id: &str,
        alert_type: AlertType,
        severity: Severity,
        message: String,
        now: OffsetDateTime,
    ) -> NetworkAlert {
        let alert = NetworkAlert {
            id: Uuid::new_v4().to_string(),
            device_id: device_id.to_string(),
            alert_type,
            severity,
            message,
            timestamp: now,
            resolved: false,
        };
        log::warn!("[alerts] {}: {}", alert.device_id, alert.message);
        self.alerts.push(alert.clone());
        alert
    }

    /// Marque une alerte comme résolue. Résoudre deux fois est sans effet
    /// sur le décompte dérivé.
    pub fn resolve(&mut self, id: &str) -> Result<NetworkAlert, FleetError> {
        match self.alerts.iter_mut().find(|a| a.id == id) {
            Some(alert) => {
                alert.resolved = true;
                Ok(alert.clone())
            }
            None => Err(FleetError::AlertNotFound(id.to_string())),
        }
    }

    /// Nombre d'alertes non résolues. C'est la source de vérité du
    /// `alert_count` du résumé de flotte.
    pub fn unresolved_count(&self) -> usize {
        self.alerts.iter().filter(|a| !a.resolved).count()
    }

    /// Alertes les plus récentes d'abord, filtrées et bornées.
    pub fn recent(&self, unresolved_only: bool, limit: usize) -> Vec<NetworkAlert> {
        let mut out: Vec<NetworkAlert> = self
            .alerts
            .iter()
            .filter(|a| !unresolved_only || !a.resolved)
            .cloned()
            .collect();
        out.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        out.truncate(limit);
        out
    }

    /// Journal complet, pour la persistance.
    pub fn all(&self) -> &[NetworkAlert] {
        &self.alerts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn device_with(latency_ms: f64, packet_loss_pct: f64) -> DeviceState {
        let mut d = DeviceState::fresh("sensor-001", datetime!(2026-01-01 00:00 UTC));
        d.latency_ms = latency_ms;
        d.packet_loss_pct = packet_loss_pct;
        d
    }

    #[test]
    fn test_high_latency_raises_single_warning() {
        let mut book = AlertBook::new();
        let raised = book.evaluate(
            &device_with(250.0, 0.0),
            &ThresholdsConf::default(),
            datetime!(2026-01-01 00:00 UTC),
        );
        assert_eq!(raised.len(), 1);
        assert_eq!(raised[0].alert_type, AlertType::Latency);
        assert_eq!(raised[0].severity, Severity::Warning);
        assert!(raised[0].message.contains("250"));
        assert_eq!(book.unresolved_count(), 1);
    }

    #[test]
    fn test_nominal_latency_raises_nothing() {
        let mut book = AlertBook::new();
        let raised = book.evaluate(
            &device_with(150.0, 0.0),
            &ThresholdsConf::default(),
            datetime!(2026-01-01 00:00 UTC),
        );
        assert!(raised.is_empty());
        assert_eq!(book.unresolved_count(), 0);
    }

    #[test]
    fn test_both_rules_fire_independently() {
        let mut book = AlertBook::new();
        let raised = book.evaluate(
            &device_with(250.0, 6.0),
            &ThresholdsConf::default(),
            datetime!(2026-01-01 00:00 UTC),
        );
        assert_eq!(raised.len(), 2);
        assert_eq!(raised[0].alert_type, AlertType::Latency);
        assert_eq!(raised[1].alert_type, AlertType::Connection);
        assert_eq!(raised[1].severity, Severity::Critical);
        assert!(raised[1].message.contains("6%"));
    }

    #[test]
    fn test_resolve_decrements_derived_count() {
        let mut book = AlertBook::new();
        let raised = book.evaluate(
            &device_with(300.0, 0.0),
            &ThresholdsConf::default(),
            datetime!(2026-01-01 00:00 UTC),
        );
        assert_eq!(book.unresolved_count(), 1);

        let resolved = book.resolve(&raised[0].id).unwrap();
        assert!(resolved.resolved);
        assert_eq!(book.unresolved_count(), 0);

        // double résolution : pas d'effet, jamais négatif
        book.resolve(&raised[0].id).unwrap();
        assert_eq!(book.unresolved_count(), 0);
    }

    #[test]
    fn test_resolve_unknown_alert() {
        let mut book = AlertBook::new();
        assert!(matches!(
            book.resolve("nope"),
            Err(FleetError::AlertNotFound(_))
        ));
    }

    #[test]
    fn test_recent_filters_and_orders() {
        let mut book = AlertBook::new();
        let a = book.raise(
            "sensor-001",
            AlertType::Latency,
            Severity::Warning,
            "first".into(),
            datetime!(2026-01-01 00:00 UTC),
        );
        book.raise(
            "sensor-002",
            AlertType::Connection,
            Severity::Critical,
            "second".into(),
            datetime!(2026-01-01 00:01 UTC),
        );
        book.resolve(&a.id).unwrap();

        let unresolved = book.recent(true, 20);
        assert_eq!(unresolved.len(), 1);
        assert_eq!(unresolved[0].message, "second");

        let all = book.recent(false, 20);
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].message, "second"); // plus récent d'abord
    }
}
