use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::fs;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct KernelConfig {
    pub mqtt: Option<MqttConf>,
    #[serde(default)]
    pub thresholds: ThresholdsConf,
    #[serde(default)]
    pub liveness: LivenessConf,
    #[serde(default = "default_http_port")]
    pub http_port: u16,
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MqttConf {
    pub host: String,
    pub port: u16,
}

/// Seuils de génération d'alertes (valeurs du tableau de bord historique).
#[derive(Debug, Serialize, Deserialize, Clone, Copy)]
pub struct ThresholdsConf {
    #[serde(default = "default_latency_warning_ms")]
    pub latency_warning_ms: f64,
    #[serde(default = "default_packet_loss_critical_pct")]
    pub packet_loss_critical_pct: f64,
}

/// Cadence du sweep de liveness et fenêtre de timeout offline.
#[derive(Debug, Serialize, Deserialize, Clone, Copy)]
pub struct LivenessConf {
    #[serde(default = "default_sweep_seconds")]
    pub sweep_seconds: u64,
    #[serde(default = "default_offline_timeout_seconds")]
    pub offline_timeout_seconds: u64,
}

fn default_http_port() -> u16 { 8080 }
fn default_data_dir() -> String { "./data".into() }
fn default_latency_warning_ms() -> f64 { 200.0 }
fn default_packet_loss_critical_pct() -> f64 { 5.0 }
fn default_sweep_seconds() -> u64 { 30 }
fn default_offline_timeout_seconds() -> u64 { 60 }

impl Default for ThresholdsConf {
    fn default() -> Self {
        Self {
            latency_warning_ms: default_latency_warning_ms(),
            packet_loss_critical_pct: default_packet_loss_critical_pct(),
        }
    }
}

impl Default for LivenessConf {
    fn default() -> Self {
        Self {
            sweep_seconds: default_sweep_seconds(),
            offline_timeout_seconds: default_offline_timeout_seconds(),
        }
    }
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            mqtt: Some(MqttConf { host: "localhost".into(), port: 1883 }),
            thresholds: ThresholdsConf::default(),
            liveness: LivenessConf::default(),
            http_port: default_http_port(),
            data_dir: default_data_dir(),
        }
    }
}

pub async fn load_config() -> KernelConfig {
    let path = std::env::var("WARDNET_KERNEL_CONFIG").unwrap_or_else(|_| "wardnet.yaml".into());
    if Path::new(&path).exists() {
        let txt = fs::read_to_string(&path).await.unwrap_or_default();
        if txt.trim().is_empty() {
            return KernelConfig::default();
        }
        serde_yaml::from_str(&txt).unwrap_or_else(|e| {
            log::error!("[kernel] config invalide: {e}");
            KernelConfig::default()
        })
    } else {
        log::warn!("[kernel] pas de {path}, usage config par défaut");
        KernelConfig::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_dashboard_values() {
        let cfg = KernelConfig::default();
        assert_eq!(cfg.thresholds.latency_warning_ms, 200.0);
        assert_eq!(cfg.thresholds.packet_loss_critical_pct, 5.0);
        assert_eq!(cfg.liveness.sweep_seconds, 30);
        assert_eq!(cfg.liveness.offline_timeout_seconds, 60);
    }

    #[test]
    fn test_partial_yaml_fills_defaults() {
        let cfg: KernelConfig = serde_yaml::from_str(
            "mqtt:\n  host: broker.local\n  port: 1883\nliveness:\n  sweep_seconds: 5\n",
        )
        .unwrap();
        assert_eq!(cfg.liveness.sweep_seconds, 5);
        // les champs non fournis retombent sur les défauts
        assert_eq!(cfg.liveness.offline_timeout_seconds, 60);
        assert_eq!(cfg.thresholds.latency_warning_ms, 200.0);
        assert_eq!(cfg.http_port, 8080);
    }
}
