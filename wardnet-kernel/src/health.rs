use crate::fleet::SharedFleet;
use serde::Serialize;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Auto-diagnostic du kernel, exposé sur /system/health.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KernelHealth {
    pub uptime_seconds: u64,
    pub devices_tracked: u32,
    pub unresolved_alerts: u32,
    pub memory_usage_mb: f32,
    pub mqtt_status: String,
    pub mqtt_reconnects: u32,
}

#[derive(Clone)]
pub struct HealthTracker {
    start_time: Instant,
    mqtt_reconnects: Arc<AtomicU32>,
    mqtt_status: Arc<parking_lot::Mutex<String>>,
}

impl HealthTracker {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            mqtt_reconnects: Arc::new(AtomicU32::new(0)),
            mqtt_status: Arc::new(parking_lot::Mutex::new("connecting".to_string())),
        }
    }

    pub fn mark_mqtt_connected(&self) {
        *self.mqtt_status.lock() = "connected".to_string();
    }

    pub fn increment_reconnects(&self) {
        self.mqtt_reconnects.fetch_add(1, Ordering::Relaxed);
        *self.mqtt_status.lock() = "reconnecting".to_string();
    }

    pub fn get_health(&self, fleet: &SharedFleet) -> KernelHealth {
        let (devices, alerts) = {
            let fleet = fleet.lock();
            let summary = fleet.summary();
            (summary.total_devices as u32, summary.alert_count as u32)
        };

        KernelHealth {
            uptime_seconds: self.start_time.elapsed().as_secs(),
            devices_tracked: devices,
            unresolved_alerts: alerts,
            memory_usage_mb: get_memory_usage_mb(),
            mqtt_status: self.mqtt_status.lock().clone(),
            mqtt_reconnects: self.mqtt_reconnects.load(Ordering::Relaxed),
        }
    }
}

fn get_memory_usage_mb() -> f32 {
    // Approximation simple via /proc, suffisant pour un indicateur dashboard
    let pid = std::process::id();

    #[cfg(target_os = "linux")]
    {
        if let Ok(status) = std::fs::read_to_string(format!("/proc/{}/status", pid)) {
            for line in status.lines() {
                if line.starts_with("VmRSS:") {
                    if let Some(kb_str) = line.split_whitespace().nth(1) {
                        if let Ok(kb) = kb_str.parse::<u64>() {
                            return (kb as f32) / 1024.0;
                        }
                    }
                }
            }
        }
    }

    #[cfg(not(target_os = "linux"))]
    let _ = pid;

    0.0
}
