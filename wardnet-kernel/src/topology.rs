use crate::models::{DeviceKind, DeviceState, TopologyGraph, TopologyLink, TopologyNode};

/// Construit le graphe de topologie depuis l'état courant de la flotte.
/// Fonction pure, recalculée à chaque requête, jamais mise en cache.
///
/// Appariement déterministe : chaque capteur est rattaché à
/// `gateways[index(capteur) mod nb_gateways]`, chaque gateway au premier
/// serveur de la liste. Zéro gateway => aucun lien capteur.
pub fn build_topology(devices: &[DeviceState]) -> TopologyGraph {
    let nodes = devices
        .iter()
        .map(|d| TopologyNode {
            id: d.device_id.clone(),
            name: d.name.clone(),
            kind: d.kind,
            status: d.status,
            ip: d.ip.clone(),
        })
        .collect();

    let sensors: Vec<&DeviceState> =
        devices.iter().filter(|d| d.kind == DeviceKind::Sensor).collect();
    let gateways: Vec<&DeviceState> =
        devices.iter().filter(|d| d.kind == DeviceKind::Gateway).collect();
    let servers: Vec<&DeviceState> =
        devices.iter().filter(|d| d.kind == DeviceKind::Server).collect();

    let mut links = Vec::new();

    if !gateways.is_empty() {
        for (idx, sensor) in sensors.iter().enumerate() {
            let gateway = gateways[idx % gateways.len()];
            links.push(TopologyLink {
                source: sensor.device_id.clone(),
                target: gateway.device_id.clone(),
            });
        }
    }

    if let Some(server) = servers.first() {
        for gateway in &gateways {
            links.push(TopologyLink {
                source: gateway.device_id.clone(),
                target: server.device_id.clone(),
            });
        }
    }

    TopologyGraph { nodes, links }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn device(id: &str, kind: DeviceKind) -> DeviceState {
        let mut d = DeviceState::fresh(id, datetime!(2026-01-01 00:00 UTC));
        d.kind = kind;
        d
    }

    #[test]
    fn test_round_robin_sensor_assignment() {
        // 3 capteurs, 2 gateways, 1 serveur => assignation [0, 1, 0]
        let devices = vec![
            device("sensor-001", DeviceKind::Sensor),
            device("sensor-002", DeviceKind::Sensor),
            device("sensor-003", DeviceKind::Sensor),
            device("gateway-001", DeviceKind::Gateway),
            device("gateway-002", DeviceKind::Gateway),
            device("server-001", DeviceKind::Server),
        ];

        let topo = build_topology(&devices);
        assert_eq!(topo.nodes.len(), 6);
        assert_eq!(topo.links.len(), 5);

        let link = |s: &str, t: &str| TopologyLink { source: s.into(), target: t.into() };
        assert_eq!(topo.links[0], link("sensor-001", "gateway-001"));
        assert_eq!(topo.links[1], link("sensor-002", "gateway-002"));
        assert_eq!(topo.links[2], link("sensor-003", "gateway-001"));
        assert_eq!(topo.links[3], link("gateway-001", "server-001"));
        assert_eq!(topo.links[4], link("gateway-002", "server-001"));
    }

    #[test]
    fn test_no_gateways_no_sensor_links() {
        let devices = vec![
            device("sensor-001", DeviceKind::Sensor),
            device("sensor-002", DeviceKind::Sensor),
            device("server-001", DeviceKind::Server),
        ];

        let topo = build_topology(&devices);
        assert_eq!(topo.nodes.len(), 3);
        assert!(topo.links.is_empty());
    }

    #[test]
    fn test_no_server_gateways_unlinked() {
        let devices = vec![
            device("sensor-001", DeviceKind::Sensor),
            device("gateway-001", DeviceKind::Gateway),
        ];

        let topo = build_topology(&devices);
        assert_eq!(topo.links.len(), 1);
        assert_eq!(topo.links[0].source, "sensor-001");
    }

    #[test]
    fn test_empty_fleet() {
        let topo = build_topology(&[]);
        assert!(topo.nodes.is_empty());
        assert!(topo.links.is_empty());
    }
}
