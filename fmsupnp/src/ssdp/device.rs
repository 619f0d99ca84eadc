//! Cibles d'annonce SSDP d'un root device

/// Ensemble des cibles annoncées pour un root device et ses services.
#[derive(Debug, Clone)]
pub struct SsdpAdvertised {
    /// UDN complet, préfixe "uuid:" inclus
    pub udn: String,

    /// URNs de device (ex: "urn:schemas-upnp-org:device:MediaServer:1")
    pub devices: Vec<String>,

    /// URNs de service
    pub services: Vec<String>,
}

impl SsdpAdvertised {
    /// Toutes les cibles NT/ST : rootdevice, uuid, devices, services.
    pub fn targets(&self) -> Vec<String> {
        let mut targets = vec!["upnp:rootdevice".to_string(), self.udn.clone()];
        targets.extend(self.devices.iter().cloned());
        targets.extend(self.services.iter().cloned());
        targets
    }

    /// USN composite pour une cible donnée.
    ///
    /// La cible `uuid:` s'annonce seule ; les autres sont suffixées à l'UDN.
    pub fn usn(&self, target: &str) -> String {
        if target.starts_with("uuid:") {
            target.to_string()
        } else {
            format!("{}::{}", self.udn, target)
        }
    }

    /// Cibles correspondant à un `ST` de M-SEARCH.
    pub fn matching(&self, st: &str) -> Vec<String> {
        if st == "ssdp:all" {
            self.targets()
        } else {
            self.targets().into_iter().filter(|t| t == st).collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn advertised() -> SsdpAdvertised {
        SsdpAdvertised {
            udn: "uuid:0000-1111".to_string(),
            devices: vec!["urn:schemas-upnp-org:device:MediaServer:1".to_string()],
            services: vec![
                "urn:schemas-upnp-org:service:ContentDirectory:1".to_string(),
                "urn:schemas-upnp-org:service:ConnectionManager:1".to_string(),
            ],
        }
    }

    #[test]
    fn test_targets_cover_root_uuid_device_services() {
        let targets = advertised().targets();
        assert_eq!(targets.len(), 5);
        assert!(targets.contains(&"upnp:rootdevice".to_string()));
        assert!(targets.contains(&"uuid:0000-1111".to_string()));
    }

    #[test]
    fn test_usn_forms() {
        let adv = advertised();
        assert_eq!(adv.usn("uuid:0000-1111"), "uuid:0000-1111");
        assert_eq!(
            adv.usn("upnp:rootdevice"),
            "uuid:0000-1111::upnp:rootdevice"
        );
    }

    #[test]
    fn test_matching_st() {
        let adv = advertised();
        assert_eq!(adv.matching("ssdp:all").len(), 5);
        assert_eq!(adv.matching("upnp:rootdevice").len(), 1);
        assert!(adv.matching("urn:other:service:Foo:1").is_empty());
    }
}
