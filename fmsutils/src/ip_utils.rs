use get_if_addrs::get_if_addrs;
use std::collections::BTreeMap;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, UdpSocket};

/// Interface réseau candidate pour le multicast SSDP.
///
/// `get_if_addrs` retourne une entrée par adresse ; on regroupe ici par nom
/// d'interface, familles séparées.
#[derive(Debug, Clone)]
pub struct NetInterface {
    pub name: String,
    pub v4: Vec<Ipv4Addr>,
    pub v6: Vec<Ipv6Addr>,
}

impl NetInterface {
    /// Une interface sans adresse de la famille demandée ne peut pas porter
    /// d'instance SSDP pour cette famille.
    pub fn has_v4(&self) -> bool {
        !self.v4.is_empty()
    }

    pub fn has_v6(&self) -> bool {
        !self.v6.is_empty()
    }
}

/// Énumère les interfaces candidates au multicast.
///
/// Les interfaces loopback sont écartées d'office : elles ne participent pas
/// à la découverte sur le LAN. L'aptitude réelle au multicast n'est connue
/// qu'au moment du join ; l'appelant doit traiter un échec de join sur une
/// interface listée comme non fatal.
pub fn multicast_interfaces() -> Vec<NetInterface> {
    let mut grouped: BTreeMap<String, NetInterface> = BTreeMap::new();

    if let Ok(interfaces) = get_if_addrs() {
        for iface in interfaces {
            let ip = iface.ip();
            if ip.is_loopback() {
                continue;
            }
            let entry = grouped
                .entry(iface.name.clone())
                .or_insert_with(|| NetInterface {
                    name: iface.name.clone(),
                    v4: Vec::new(),
                    v6: Vec::new(),
                });
            match ip {
                IpAddr::V4(a) => entry.v4.push(a),
                IpAddr::V6(a) => entry.v6.push(a),
            }
        }
    }

    grouped.into_values().collect()
}

/// Devine l'IP locale principale.
///
/// On ouvre un socket UDP vers une adresse publique arbitraire ; aucune
/// donnée n'est émise, `connect` suffit à faire choisir une source au noyau.
pub fn guess_local_ip() -> IpAddr {
    match UdpSocket::bind("0.0.0.0:0") {
        Ok(socket) => {
            if socket.connect("8.8.8.8:80").is_ok() {
                if let Ok(local_addr) = socket.local_addr() {
                    return local_addr.ip();
                }
            }
            IpAddr::V4(Ipv4Addr::LOCALHOST)
        }
        Err(_) => IpAddr::V4(Ipv4Addr::LOCALHOST),
    }
}

/// Adresse source locale que le noyau choisirait pour joindre `peer`.
///
/// Sert à construire l'URL `LOCATION` des réponses SSDP : chaque pair doit
/// recevoir une URL pointant sur l'adresse locale qui lui fait face.
pub fn source_ip_for(peer: &SocketAddr) -> Option<IpAddr> {
    let bind_addr: SocketAddr = match peer {
        SocketAddr::V4(_) => "0.0.0.0:0".parse().ok()?,
        SocketAddr::V6(_) => "[::]:0".parse().ok()?,
    };
    let socket = UdpSocket::bind(bind_addr).ok()?;
    socket.connect(peer).ok()?;
    socket.local_addr().ok().map(|a| a.ip())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_multicast_interfaces_excludes_loopback() {
        for iface in multicast_interfaces() {
            assert!(iface.v4.iter().all(|a| !a.is_loopback()));
            assert!(iface.v6.iter().all(|a| !a.is_loopback()));
        }
    }

    #[test]
    fn test_source_ip_for_v4_peer() {
        let peer: SocketAddr = "127.0.0.1:1900".parse().unwrap();
        let ip = source_ip_for(&peer).expect("loopback peer must resolve");
        assert!(ip.is_ipv4());
    }
}
