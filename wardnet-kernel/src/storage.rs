use crate::errors::FleetError;
use crate::models::{DevicesMap, NetworkAlert};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::fs;

/// Persistance JSON de la flotte : un fichier pour la carte des appareils,
/// un pour le journal d'alertes. Chargés au démarrage, réécrits sur
/// événement. Une écriture qui échoue est loguée et n'interrompt jamais
/// l'ingestion : la vue mémoire reste autoritaire.
pub struct FleetStore {
    devices_path: PathBuf,
    alerts_path: PathBuf,
}

impl FleetStore {
    pub fn new(data_dir: &str) -> Self {
        let dir = PathBuf::from(data_dir);
        Self {
            devices_path: dir.join("devices.json"),
            alerts_path: dir.join("alerts.json"),
        }
    }

    pub async fn load_devices(&self) -> Result<DevicesMap, FleetError> {
        if !self.devices_path.exists() {
            log::info!("[storage] no existing devices file, starting fresh");
            return Ok(DevicesMap::new());
        }
        let content = fs::read_to_string(&self.devices_path).await?;
        let devices: DevicesMap = serde_json::from_str(&content)?;
        log::info!("[storage] loaded {} devices from {:?}", devices.len(), self.devices_path);
        Ok(devices)
    }

    pub async fn save_devices(&self, devices: &DevicesMap) -> Result<(), FleetError> {
        let content = serde_json::to_string_pretty(devices)?;
        fs::write(&self.devices_path, content).await?;
        Ok(())
    }

    pub async fn load_alerts(&self) -> Result<Vec<NetworkAlert>, FleetError> {
        if !self.alerts_path.exists() {
            log::info!("[storage] no existing alerts file, starting fresh");
            return Ok(Vec::new());
        }
        let content = fs::read_to_string(&self.alerts_path).await?;
        let alerts: Vec<NetworkAlert> = serde_json::from_str(&content)?;
        log::info!("[storage] loaded {} alerts from {:?}", alerts.len(), self.alerts_path);
        Ok(alerts)
    }

    pub async fn save_alerts(&self, alerts: &[NetworkAlert]) -> Result<(), FleetError> {
        let content = serde_json::to_string_pretty(alerts)?;
        fs::write(&self.alerts_path, content).await?;
        Ok(())
    }
}

pub type SharedStore = Arc<FleetStore>;
