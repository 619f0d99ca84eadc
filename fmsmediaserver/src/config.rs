//! Configuration du serveur média
//!
//! La configuration est une structure explicite construite par l'appelant
//! (binaire, tests) et passée au serveur ; aucun état global mutable.

use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Préfixe CIDR de la liste blanche du plan de contrôle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct IpNet {
    pub addr: IpAddr,
    pub prefix_len: u8,
}

impl IpNet {
    /// Teste l'appartenance d'une adresse au préfixe.
    ///
    /// Les familles différentes ne se recouvrent jamais.
    pub fn contains(&self, ip: IpAddr) -> bool {
        match (self.addr, ip) {
            (IpAddr::V4(net), IpAddr::V4(ip)) => {
                let bits = 32u32.min(self.prefix_len as u32);
                if bits == 0 {
                    return true;
                }
                let mask = u32::MAX << (32 - bits);
                (u32::from(net) & mask) == (u32::from(ip) & mask)
            }
            (IpAddr::V6(net), IpAddr::V6(ip)) => {
                let bits = 128u32.min(self.prefix_len as u32);
                if bits == 0 {
                    return true;
                }
                let mask = u128::MAX << (128 - bits);
                (u128::from(net) & mask) == (u128::from(ip) & mask)
            }
            _ => false,
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("bad CIDR prefix: {0}")]
pub struct BadIpNet(String);

impl FromStr for IpNet {
    type Err = BadIpNet;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = || BadIpNet(s.to_string());
        let (addr_s, len_s) = s.split_once('/').ok_or_else(bad)?;
        let addr: IpAddr = addr_s.trim().parse().map_err(|_| bad())?;
        let prefix_len: u8 = len_s.trim().parse().map_err(|_| bad())?;
        let max = if addr.is_ipv4() { 32 } else { 128 };
        if prefix_len > max {
            return Err(bad());
        }
        Ok(Self { addr, prefix_len })
    }
}

impl TryFrom<String> for IpNet {
    type Error = BadIpNet;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<IpNet> for String {
    fn from(net: IpNet) -> Self {
        format!("{}/{}", net.addr, net.prefix_len)
    }
}

/// Configuration complète du serveur média.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaServerConfig {
    /// Racine du sous-arbre partagé ; tous les ObjectIDs s'y rapportent
    pub root_object_path: PathBuf,

    /// Nom affiché aux renderers ; vide = "<modèle>: <user> on <host>"
    pub friendly_name: String,

    /// Désactive le transcodage et les ressources associées
    pub no_transcode: bool,

    /// Expose uniquement cette clé de transcodage (plus le fichier brut)
    pub force_transcode_to: Option<String>,

    /// Désactive entièrement la sonde média
    pub no_probe: bool,

    /// Ignore fichiers et répertoires cachés
    pub ignore_hidden: bool,

    /// Ignore fichiers et répertoires illisibles
    pub ignore_unreadable: bool,

    /// Répertoires ignorés, par correspondance de segment `/<elem>/`
    pub ignore_paths: Vec<String>,

    /// Liste blanche CIDR du plan de contrôle SOAP ; vide = tout le monde
    pub allowed_ip_nets: Vec<IpNet>,

    /// Active les flux dynamiques décrits par fichiers `.dms.json`.
    ///
    /// Désactivé par défaut : un descripteur exécute des commandes
    /// arbitraires dans le contexte du serveur.
    pub allow_dynamic_streams: bool,

    /// Bloque chaque SUBSCRIBE jusqu'à déconnexion du pair
    pub stall_event_subscribe: bool,

    /// Période des annonces SSDP
    #[serde(with = "duration_secs")]
    pub notify_interval: Duration,

    /// Gabarit du chemin des logs de transcodage, `[tsname]` substitué.
    /// Vide = `$HOME/.fms/log/[tsname]`
    pub transcode_log_pattern: String,

    /// Journalise les en-têtes HTTP de chaque requête et réponse
    pub log_headers: bool,
}

impl Default for MediaServerConfig {
    fn default() -> Self {
        Self {
            root_object_path: PathBuf::from("."),
            friendly_name: String::new(),
            no_transcode: false,
            force_transcode_to: None,
            no_probe: false,
            ignore_hidden: false,
            ignore_unreadable: false,
            ignore_paths: Vec::new(),
            allowed_ip_nets: Vec::new(),
            allow_dynamic_streams: false,
            stall_event_subscribe: false,
            notify_interval: Duration::from_secs(30),
            transcode_log_pattern: String::new(),
            log_headers: false,
        }
    }
}

impl MediaServerConfig {
    /// Gabarit effectif des logs de transcodage.
    pub fn effective_transcode_log_pattern(&self) -> String {
        if !self.transcode_log_pattern.is_empty() {
            return self.transcode_log_pattern.clone();
        }
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        format!("{}/.fms/log/[tsname]", home)
    }

    /// Le pair est-il admis sur le plan de contrôle ?
    ///
    /// Les suffixes de zone IPv6 (`%zone`) sont retirés avant comparaison.
    pub fn allows_peer(&self, ip_text: &str) -> bool {
        let stripped = ip_text.split('%').next().unwrap_or(ip_text);
        let Ok(ip) = stripped.parse::<IpAddr>() else {
            return false;
        };
        if self.allowed_ip_nets.is_empty() {
            return true;
        }
        self.allowed_ip_nets.iter().any(|net| net.contains(ip))
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_secs(u64::deserialize(d)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ipnet_v4() {
        let net: IpNet = "10.0.0.0/8".parse().unwrap();
        assert!(net.contains("10.1.2.3".parse().unwrap()));
        assert!(!net.contains("192.0.2.5".parse().unwrap()));
        assert!(!net.contains("fe80::1".parse().unwrap()));
    }

    #[test]
    fn test_ipnet_v6() {
        let net: IpNet = "fe80::/10".parse().unwrap();
        assert!(net.contains("fe80::1".parse().unwrap()));
        assert!(!net.contains("2001:db8::1".parse().unwrap()));
    }

    #[test]
    fn test_ipnet_rejects_garbage() {
        assert!("10.0.0.0".parse::<IpNet>().is_err());
        assert!("10.0.0.0/33".parse::<IpNet>().is_err());
        assert!("foo/8".parse::<IpNet>().is_err());
    }

    #[test]
    fn test_allows_peer_strips_ipv6_zone() {
        let config = MediaServerConfig {
            allowed_ip_nets: vec!["fe80::/10".parse().unwrap()],
            ..Default::default()
        };
        assert!(config.allows_peer("fe80::1%eth0"));
        assert!(!config.allows_peer("2001:db8::1%eth0"));
    }

    #[test]
    fn test_empty_allowlist_admits_everyone() {
        let config = MediaServerConfig::default();
        assert!(config.allows_peer("192.0.2.5"));
    }

    #[test]
    fn test_denied_peer() {
        let config = MediaServerConfig {
            allowed_ip_nets: vec!["10.0.0.0/8".parse().unwrap()],
            ..Default::default()
        };
        assert!(!config.allows_peer("192.0.2.5"));
    }
}
