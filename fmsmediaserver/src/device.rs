//! Root device : identité, icônes, description XML
//!
//! L'état central du serveur média. Construit une fois au démarrage, puis
//! partagé en lecture seule par les handlers HTTP ; seul le cache de sondes
//! est mutable derrière son propre verrou.

use crate::config::MediaServerConfig;
use crate::services::{self, CONTROL_URL, SCPD_BASE};
use crate::{root_device_model_name, server_field};
use anyhow::Context;
use fmsprobe::{MemoryCache, Prober};
use fmsupnp::device::{build_device_description, DeviceDesc, IconDesc, ServiceDesc};
use sha1::{Digest, Sha1};
use std::sync::Arc;

/// Type du root device annoncé
pub const ROOT_DEVICE_TYPE: &str = "urn:schemas-upnp-org:device:MediaServer:1";

/// Chemin de la description du device
pub const ROOT_DESC_PATH: &str = "/rootDesc.xml";

/// Chemin de base des icônes de device
pub const DEVICE_ICON_PATH: &str = "/deviceIcon";

/// PNG 1x1 transparent, servi quand aucune icône n'est configurée et en
/// secours du générateur de vignettes.
const FALLBACK_ICON_PNG: &[u8] = &[
    0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44,
    0x52, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1F,
    0x15, 0xC4, 0x89, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x44, 0x41, 0x54, 0x78, 0x9C, 0x62, 0x00,
    0x01, 0x00, 0x00, 0x05, 0x00, 0x01, 0x0D, 0x0A, 0x2D, 0xB4, 0x00, 0x00, 0x00, 0x00, 0x49,
    0x45, 0x4E, 0x44, 0xAE, 0x42, 0x60, 0x82,
];

/// Icône du root device
#[derive(Debug, Clone)]
pub struct Icon {
    pub width: u32,
    pub height: u32,
    pub depth: u32,
    pub mimetype: String,
    pub bytes: Vec<u8>,
}

impl Icon {
    /// Icône de secours embarquée.
    pub fn fallback() -> Self {
        Self {
            width: 1,
            height: 1,
            depth: 8,
            mimetype: "image/png".to_string(),
            bytes: FALLBACK_ICON_PNG.to_vec(),
        }
    }
}

/// État partagé du serveur média.
pub struct MediaServer {
    pub config: MediaServerConfig,
    pub prober: Prober,
    pub friendly_name: String,
    /// UDN complet, préfixe "uuid:" inclus
    pub udn: String,
    pub icons: Vec<Icon>,
    pub root_desc_xml: String,
    pub server_field: String,
}

impl MediaServer {
    /// Construit le serveur : valide la racine, fige identité et description.
    pub fn new(config: MediaServerConfig) -> anyhow::Result<Self> {
        Self::with_icons(config, vec![Icon::fallback()])
    }

    pub fn with_icons(config: MediaServerConfig, icons: Vec<Icon>) -> anyhow::Result<Self> {
        let root = &config.root_object_path;
        let meta = std::fs::metadata(root)
            .with_context(|| format!("root object path {:?} is not accessible", root))?;
        anyhow::ensure!(meta.is_dir(), "root object path {:?} is not a directory", root);
        anyhow::ensure!(!icons.is_empty(), "at least one device icon is required");

        let friendly_name = if config.friendly_name.is_empty() {
            default_friendly_name()
        } else {
            config.friendly_name.clone()
        };
        let udn = make_device_udn(&friendly_name);

        let prober = if config.no_probe {
            Prober::disabled()
        } else {
            Prober::new(Arc::new(MemoryCache::new()))
        };

        let root_desc_xml = build_root_desc(&friendly_name, &udn, &icons);

        Ok(Self {
            config,
            prober,
            friendly_name,
            udn,
            icons,
            root_desc_xml,
            server_field: server_field(),
        })
    }

    /// Remplace la sonde (cache persistant externe, tests).
    pub fn with_prober(mut self, prober: Prober) -> Self {
        self.prober = prober;
        self
    }

    /// URL `LOCATION` des annonces SSDP pour une adresse locale donnée.
    pub fn location(&self, ip: std::net::IpAddr, http_port: u16) -> String {
        let host = match ip {
            std::net::IpAddr::V4(a) => format!("{}:{}", a, http_port),
            std::net::IpAddr::V6(a) => format!("[{}]:{}", a, http_port),
        };
        format!("http://{}{}", host, ROOT_DESC_PATH)
    }
}

fn build_root_desc(friendly_name: &str, udn: &str, icons: &[Icon]) -> String {
    let desc = DeviceDesc {
        device_type: ROOT_DEVICE_TYPE.to_string(),
        friendly_name: friendly_name.to_string(),
        manufacturer: "FSMedia project".to_string(),
        model_name: root_device_model_name(),
        model_description: "UPnP AV MediaServer over a filesystem subtree".to_string(),
        udn: udn.to_string(),
        icons: icons
            .iter()
            .enumerate()
            .map(|(i, icon)| IconDesc {
                mimetype: icon.mimetype.clone(),
                width: icon.width,
                height: icon.height,
                depth: icon.depth,
                url: format!("{}/{}", DEVICE_ICON_PATH, i),
            })
            .collect(),
        services: services::all()
            .iter()
            .map(|s| ServiceDesc {
                service_type: s.service_type.to_string(),
                service_id: s.service_id.to_string(),
                scpd_url: format!("{}/{}", SCPD_BASE, s.scpd_file),
                control_url: CONTROL_URL.to_string(),
                event_sub_url: s.event_sub_url.to_string(),
            })
            .collect(),
        presentation_url: "/".to_string(),
    };
    build_device_description(&desc)
}

/// UDN stable dérivé du friendly name.
///
/// Le hash du nom garantit la stabilité entre redémarrages tant que le nom
/// ne change pas.
pub fn make_device_udn(unique: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(unique.as_bytes());
    let digest = hasher.finalize();
    let h = hex::encode(&digest[..16]);
    format!(
        "uuid:{}-{}-{}-{}-{}",
        &h[0..8],
        &h[8..12],
        &h[12..16],
        &h[16..20],
        &h[20..32]
    )
}

/// Nom par défaut : "<modèle>: <user> on <host>".
pub fn default_friendly_name() -> String {
    let user = std::env::var("USER")
        .or_else(|_| std::env::var("LOGNAME"))
        .unwrap_or_else(|_| "nobody".to_string());
    let host = std::env::var("HOSTNAME")
        .ok()
        .or_else(|| {
            std::fs::read_to_string("/etc/hostname")
                .ok()
                .map(|s| s.trim().to_string())
        })
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "localhost".to_string());
    format!("{}: {} on {}", root_device_model_name(), user, host)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_udn_is_stable_and_well_formed() {
        let a = make_device_udn("FSMedia test");
        let b = make_device_udn("FSMedia test");
        assert_eq!(a, b);
        assert!(a.starts_with("uuid:"));
        assert_eq!(a.len(), "uuid:".len() + 36);
        assert_ne!(a, make_device_udn("other name"));
    }

    #[test]
    fn test_fallback_icon_is_png() {
        let icon = Icon::fallback();
        assert!(icon.bytes.starts_with(&[0x89, b'P', b'N', b'G']));
        assert_eq!(icon.mimetype, "image/png");
    }

    #[test]
    fn test_new_rejects_missing_root() {
        let config = MediaServerConfig {
            root_object_path: "/nonexistent/fsmedia/root".into(),
            ..Default::default()
        };
        assert!(MediaServer::new(config).is_err());
    }
}
