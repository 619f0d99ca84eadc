//! Moteur SSDP : une instance par interface × famille d'adresse

use super::{
    SsdpAdvertised, MAX_AGE, MAX_MX_SECS, SSDP_GROUP_V4, SSDP_GROUP_V6_LINK_LOCAL,
    SSDP_GROUP_V6_SITE_LOCAL, SSDP_PORT,
};
use fmsutils::{source_ip_for, NetInterface};
use rand::Rng;
use socket2::{Domain, Protocol, Socket, Type};
use std::collections::HashMap;
use std::io::ErrorKind;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, UdpSocket};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Fabrique l'URL `LOCATION` pour une adresse locale donnée.
pub type LocationFn = Arc<dyn Fn(IpAddr) -> String + Send + Sync>;

/// Configuration du moteur SSDP
#[derive(Clone)]
pub struct SsdpConfig {
    pub advertised: SsdpAdvertised,
    /// Valeur de l'en-tête SERVER
    pub server: String,
    pub location: LocationFn,
    /// Période des NOTIFY ssdp:alive
    pub notify_interval: Duration,
}

/// Saveur d'instance : une par groupe multicast
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flavor {
    V4,
    V6LinkLocal,
    V6SiteLocal,
}

impl Flavor {
    fn group(&self) -> SocketAddr {
        match self {
            Flavor::V4 => SocketAddr::new(IpAddr::V4(SSDP_GROUP_V4), SSDP_PORT),
            Flavor::V6LinkLocal => {
                SocketAddr::new(IpAddr::V6(SSDP_GROUP_V6_LINK_LOCAL), SSDP_PORT)
            }
            Flavor::V6SiteLocal => {
                SocketAddr::new(IpAddr::V6(SSDP_GROUP_V6_SITE_LOCAL), SSDP_PORT)
            }
        }
    }

    fn host_header(&self) -> String {
        match self.group() {
            SocketAddr::V4(a) => format!("{}:{}", a.ip(), a.port()),
            SocketAddr::V6(a) => format!("[{}]:{}", a.ip(), a.port()),
        }
    }
}

/// Moteur SSDP : fan-out des instances, arrêt coordonné.
pub struct SsdpEngine {
    handles: Vec<JoinHandle<()>>,
}

impl SsdpEngine {
    /// Démarre une instance par (interface, saveur) éligible.
    ///
    /// Les interfaces sans adresse de la famille visée sont ignorées en
    /// silence. Un échec de bind/join sur une interface éligible est loggé
    /// puis isolé : les autres instances continuent.
    pub fn start(
        config: SsdpConfig,
        interfaces: Vec<NetInterface>,
        shutdown: CancellationToken,
    ) -> Self {
        let mut handles = Vec::new();
        for iface in interfaces {
            for flavor in [Flavor::V4, Flavor::V6LinkLocal, Flavor::V6SiteLocal] {
                let qualifies = match flavor {
                    Flavor::V4 => iface.has_v4(),
                    _ => iface.has_v6(),
                };
                if !qualifies {
                    continue;
                }
                let config = config.clone();
                let iface = iface.clone();
                let shutdown = shutdown.clone();
                handles.push(std::thread::spawn(move || {
                    instance_loop(config, iface, flavor, shutdown);
                }));
            }
        }
        Self { handles }
    }

    /// Attend la fin de toutes les instances (après annulation du token).
    pub fn wait(self) {
        for handle in self.handles {
            let _ = handle.join();
        }
    }
}

fn instance_loop(
    config: SsdpConfig,
    iface: NetInterface,
    flavor: Flavor,
    shutdown: CancellationToken,
) {
    let socket = match open_socket(&iface, flavor) {
        Ok(s) => Arc::new(s),
        Err(e) => {
            warn!(
                "ssdp: cannot listen on {} ({:?}): {}",
                iface.name, flavor, e
            );
            return;
        }
    };
    let local_ip = instance_local_ip(&iface, flavor);
    info!("ssdp: started on {} ({:?})", iface.name, flavor);

    // Première annonce immédiate, puis batches périodiques lissés
    send_alive_batch(&socket, &config, flavor, local_ip);
    let mut next_notify = Instant::now() + jittered(config.notify_interval);

    let mut buf = [0u8; 8192];
    while !shutdown.is_cancelled() {
        if Instant::now() >= next_notify {
            send_alive_batch(&socket, &config, flavor, local_ip);
            next_notify = Instant::now() + jittered(config.notify_interval);
        }
        match socket.recv_from(&mut buf) {
            Ok((n, src)) => {
                let data = String::from_utf8_lossy(&buf[..n]).into_owned();
                if data.starts_with("M-SEARCH") {
                    handle_msearch(&socket, &config, local_ip, &data, src, &shutdown);
                }
            }
            Err(e) if e.kind() == ErrorKind::WouldBlock || e.kind() == ErrorKind::TimedOut => {}
            Err(e) => {
                warn!("ssdp: read error on {}: {}", iface.name, e);
            }
        }
    }

    send_byebye_batch(&socket, &config, flavor);
    info!("ssdp: stopped on {} ({:?})", iface.name, flavor);
}

/// Délai périodique avec lissage aléatoire, pour étaler les annonces
/// entre pairs qui partagent la même horloge de démarrage.
fn jittered(interval: Duration) -> Duration {
    let jitter_ms = rand::rng().random_range(0..=interval.as_millis().max(1) as u64 / 4);
    interval + Duration::from_millis(jitter_ms)
}

fn instance_local_ip(iface: &NetInterface, flavor: Flavor) -> IpAddr {
    match flavor {
        Flavor::V4 => iface
            .v4
            .first()
            .copied()
            .map(IpAddr::V4)
            .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED)),
        Flavor::V6LinkLocal => iface
            .v6
            .iter()
            .find(|a| (a.segments()[0] & 0xffc0) == 0xfe80)
            .or_else(|| iface.v6.first())
            .copied()
            .map(IpAddr::V6)
            .unwrap_or(IpAddr::V6(Ipv6Addr::UNSPECIFIED)),
        Flavor::V6SiteLocal => iface
            .v6
            .iter()
            .find(|a| (a.segments()[0] & 0xffc0) != 0xfe80)
            .or_else(|| iface.v6.first())
            .copied()
            .map(IpAddr::V6)
            .unwrap_or(IpAddr::V6(Ipv6Addr::UNSPECIFIED)),
    }
}

fn open_socket(iface: &NetInterface, flavor: Flavor) -> std::io::Result<UdpSocket> {
    match flavor {
        Flavor::V4 => {
            let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
            socket.set_reuse_address(true)?;
            #[cfg(unix)]
            socket.set_reuse_port(true)?;
            let bind: SocketAddr = SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), SSDP_PORT);
            socket.bind(&bind.into())?;
            let socket: UdpSocket = socket.into();
            let local = iface.v4.first().copied().unwrap_or(Ipv4Addr::UNSPECIFIED);
            socket.join_multicast_v4(&SSDP_GROUP_V4, &local)?;
            socket.set_multicast_loop_v4(false)?;
            socket.set_read_timeout(Some(Duration::from_secs(1)))?;
            Ok(socket)
        }
        Flavor::V6LinkLocal | Flavor::V6SiteLocal => {
            let socket = Socket::new(Domain::IPV6, Type::DGRAM, Some(Protocol::UDP))?;
            socket.set_reuse_address(true)?;
            #[cfg(unix)]
            socket.set_reuse_port(true)?;
            socket.set_only_v6(true)?;
            let bind: SocketAddr = SocketAddr::new(IpAddr::V6(Ipv6Addr::UNSPECIFIED), SSDP_PORT);
            socket.bind(&bind.into())?;
            let socket: UdpSocket = socket.into();
            let index = ifindex(&iface.name).unwrap_or(0);
            let group = match flavor {
                Flavor::V6LinkLocal => SSDP_GROUP_V6_LINK_LOCAL,
                _ => SSDP_GROUP_V6_SITE_LOCAL,
            };
            socket.join_multicast_v6(&group, index)?;
            socket.set_read_timeout(Some(Duration::from_secs(1)))?;
            Ok(socket)
        }
    }
}

/// Index d'interface, lu depuis sysfs. 0 (choix du noyau) en secours.
fn ifindex(name: &str) -> Option<u32> {
    std::fs::read_to_string(format!("/sys/class/net/{}/ifindex", name))
        .ok()?
        .trim()
        .parse()
        .ok()
}

fn send_alive_batch(socket: &UdpSocket, config: &SsdpConfig, flavor: Flavor, local_ip: IpAddr) {
    let location = (config.location)(local_ip);
    for target in config.advertised.targets() {
        let msg = format!(
            "NOTIFY * HTTP/1.1\r\n\
             HOST: {}\r\n\
             CACHE-CONTROL: max-age={}\r\n\
             LOCATION: {}\r\n\
             NT: {}\r\n\
             NTS: ssdp:alive\r\n\
             SERVER: {}\r\n\
             USN: {}\r\n\
             \r\n",
            flavor.host_header(),
            MAX_AGE,
            location,
            target,
            config.server,
            config.advertised.usn(&target),
        );
        if let Err(e) = socket.send_to(msg.as_bytes(), flavor.group()) {
            debug!("ssdp: alive send failed for {}: {}", target, e);
        }
    }
}

fn send_byebye_batch(socket: &UdpSocket, config: &SsdpConfig, flavor: Flavor) {
    for target in config.advertised.targets() {
        let msg = format!(
            "NOTIFY * HTTP/1.1\r\n\
             HOST: {}\r\n\
             NT: {}\r\n\
             NTS: ssdp:byebye\r\n\
             USN: {}\r\n\
             \r\n",
            flavor.host_header(),
            target,
            config.advertised.usn(&target),
        );
        let _ = socket.send_to(msg.as_bytes(), flavor.group());
    }
}

/// Parse le bloc d'en-têtes d'un datagramme HTTP-over-UDP, clés en minuscules.
fn parse_headers(data: &str) -> HashMap<String, String> {
    let mut headers = HashMap::new();
    for line in data.lines().skip(1) {
        if let Some((key, value)) = line.split_once(':') {
            headers.insert(key.trim().to_lowercase(), value.trim().to_string());
        }
    }
    headers
}

fn handle_msearch(
    socket: &Arc<UdpSocket>,
    config: &SsdpConfig,
    local_ip: IpAddr,
    data: &str,
    src: SocketAddr,
    shutdown: &CancellationToken,
) {
    let headers = parse_headers(data);
    let man = headers.get("man").map(String::as_str).unwrap_or("");
    if man.trim_matches('"') != "ssdp:discover" {
        return;
    }
    let st = match headers.get("st") {
        Some(st) if !st.is_empty() => st.clone(),
        _ => return,
    };
    let matching = config.advertised.matching(&st);
    if matching.is_empty() {
        return;
    }
    let mx = headers
        .get("mx")
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(1)
        .min(MAX_MX_SECS);

    debug!("ssdp: M-SEARCH from {} for {}", src, st);

    // L'URL LOCATION doit pointer sur l'adresse locale faisant face au pair.
    let reply_ip = source_ip_for(&src).unwrap_or(local_ip);
    let location = (config.location)(reply_ip);
    let server = config.server.clone();
    let advertised = config.advertised.clone();
    let socket = Arc::clone(socket);
    let shutdown = shutdown.clone();

    // Chaque cible part avec son propre délai aléatoire borné par MX ;
    // un thread dédié évite de bloquer la boucle de réception.
    std::thread::spawn(move || {
        for target in matching {
            let delay = Duration::from_millis(rand::rng().random_range(0..=mx * 1000));
            std::thread::sleep(delay);
            if shutdown.is_cancelled() {
                return;
            }
            let date = chrono::Utc::now().format("%a, %d %b %Y %H:%M:%S GMT");
            let reply = format!(
                "HTTP/1.1 200 OK\r\n\
                 CACHE-CONTROL: max-age={}\r\n\
                 DATE: {}\r\n\
                 EXT:\r\n\
                 LOCATION: {}\r\n\
                 SERVER: {}\r\n\
                 ST: {}\r\n\
                 USN: {}\r\n\
                 \r\n",
                MAX_AGE,
                date,
                location,
                server,
                target,
                advertised.usn(&target),
            );
            if let Err(e) = socket.send_to(reply.as_bytes(), src) {
                debug!("ssdp: M-SEARCH reply to {} failed: {}", src, e);
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_msearch_headers() {
        let data = "M-SEARCH * HTTP/1.1\r\n\
                    HOST: 239.255.255.250:1900\r\n\
                    MAN: \"ssdp:discover\"\r\n\
                    ST: upnp:rootdevice\r\n\
                    MX: 2\r\n\r\n";
        let headers = parse_headers(data);
        assert_eq!(headers.get("st").unwrap(), "upnp:rootdevice");
        assert_eq!(headers.get("mx").unwrap(), "2");
        assert_eq!(headers.get("man").unwrap(), "\"ssdp:discover\"");
    }

    #[test]
    fn test_flavor_host_headers() {
        assert_eq!(Flavor::V4.host_header(), "239.255.255.250:1900");
        assert_eq!(Flavor::V6LinkLocal.host_header(), "[ff02::c]:1900");
        assert_eq!(Flavor::V6SiteLocal.host_header(), "[ff05::c]:1900");
    }

    #[test]
    fn test_jitter_stays_in_bounds() {
        let interval = Duration::from_secs(30);
        for _ in 0..32 {
            let d = jittered(interval);
            assert!(d >= interval);
            assert!(d <= interval + interval / 4);
        }
    }
}
