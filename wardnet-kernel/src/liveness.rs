/**
 * MONITEUR DE LIVENESS - Détection périodique des appareils silencieux
 *
 * RÔLE :
 * Tâche planifiée à période injectable qui balaye la flotte : tout
 * appareil sans update depuis plus que le timeout bascule offline, avec
 * exactement une alerte par transition. Le résumé recalculé est diffusé
 * à chaque sweep, transitions ou pas (heartbeat du dashboard).
 *
 * FONCTIONNEMENT :
 * - run_sweep() est synchrone : les tests déclenchent un sweep sans
 *   attendre le temps réel (horloge injectée dans le registre)
 * - Ingestion et sweep partagent le même Mutex de flotte, jamais l'heure
 * - Un échec de persistance ou de publication est logué, le sweep
 *   suivant repart normalement (domaines de panne indépendants)
 */

use crate::config::LivenessConf;
use crate::fleet::{SharedFleet, SweepOutcome};
use crate::mqtt::{self, TOPIC_FLEET_ALERT, TOPIC_FLEET_SUMMARY};
use crate::storage::SharedStore;
use rumqttc::AsyncClient;
use tokio::task;

pub struct LivenessMonitor {
    fleet: SharedFleet,
    period: std::time::Duration,
    timeout: time::Duration,
}

impl LivenessMonitor {
    pub fn new(fleet: SharedFleet, conf: LivenessConf) -> Self {
        Self {
            fleet,
            period: std::time::Duration::from_secs(conf.sweep_seconds),
            timeout: time::Duration::seconds(conf.offline_timeout_seconds as i64),
        }
    }

    /// Un passage de détection offline, exécutable tel quel dans un test.
    pub fn run_sweep(&self) -> SweepOutcome {
        self.fleet.lock().sweep_offline(self.timeout)
    }

    /// Boucle périodique, vivante jusqu'à l'arrêt du processus.
    pub fn spawn(self, client: AsyncClient, store: SharedStore) {
        log::info!(
            "[liveness] monitoring fleet (sweep {:?}, timeout {}s)",
            self.period,
            self.timeout.whole_seconds()
        );

        task::spawn(async move {
            let mut interval = tokio::time::interval(self.period);
            loop {
                interval.tick().await;

                let outcome = self.run_sweep();

                // diffusion du résumé à chaque sweep, même sans transition
                mqtt::publish_json(&client, TOPIC_FLEET_SUMMARY, &outcome.summary);
                for alert in &outcome.alerts {
                    mqtt::publish_json(&client, TOPIC_FLEET_ALERT, alert);
                }

                let (devices, alerts) = self.fleet.lock().snapshot();
                if let Err(e) = store.save_devices(&devices).await {
                    log::error!("[liveness] save devices failed: {e}");
                }
                if !outcome.alerts.is_empty() {
                    if let Err(e) = store.save_alerts(&alerts).await {
                        log::error!("[liveness] save alerts failed: {e}");
                    }
                }
            }
        });
    }
}
