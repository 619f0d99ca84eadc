//! # fmsdidl - DIDL-Lite
//!
//! Structures et sérialisation du format DIDL-Lite utilisé dans les réponses
//! ContentDirectory UPnP/DLNA.
//!
//! ## Fonctionnalités
//!
//! - ✅ Sérialisation XML via quick-xml/serde
//! - ✅ Containers et items avec ressources multiples
//! - ✅ Namespaces canoniques (dc, upnp, dlna, sec)
//! - ✅ Élagage des champs optionnels selon le paramètre `Filter` CDS

use serde::{Deserialize, Serialize};

/// Namespace par défaut de DIDL-Lite
pub const NS_DIDL: &str = "urn:schemas-upnp-org:metadata-1-0/DIDL-Lite/";
/// Namespace Dublin Core
pub const NS_DC: &str = "http://purl.org/dc/elements/1.1/";
/// Namespace UPnP
pub const NS_UPNP: &str = "urn:schemas-upnp-org:metadata-1-0/upnp/";
/// Namespace DLNA
pub const NS_DLNA: &str = "urn:schemas-dlna-org:metadata-1-0/";
/// Namespace Samsung (sous-titres)
pub const NS_SEC: &str = "http://www.sec.co.kr/";

/// Classes UPnP des objets exposés par le serveur
pub mod classes {
    pub const STORAGE_FOLDER: &str = "object.container.storageFolder";
    pub const VIDEO_ITEM: &str = "object.item.videoItem";
    pub const AUDIO_ITEM: &str = "object.item.audioItem";
    pub const IMAGE_ITEM: &str = "object.item.imageItem";
    pub const ITEM: &str = "object.item";
}

#[derive(Debug, thiserror::Error)]
pub enum DidlError {
    #[error("DIDL-Lite serialization failed: {0}")]
    Serialize(String),
}

/// Racine d'un document DIDL-Lite
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename = "DIDL-Lite")]
pub struct DidlLite {
    #[serde(rename = "@xmlns")]
    pub xmlns: String,

    #[serde(rename = "@xmlns:dc")]
    pub xmlns_dc: String,

    #[serde(rename = "@xmlns:upnp")]
    pub xmlns_upnp: String,

    #[serde(rename = "@xmlns:dlna")]
    pub xmlns_dlna: String,

    #[serde(rename = "@xmlns:sec", skip_serializing_if = "Option::is_none")]
    pub xmlns_sec: Option<String>,

    #[serde(rename = "container", default)]
    pub containers: Vec<Container>,

    #[serde(rename = "item", default)]
    pub items: Vec<Item>,
}

impl DidlLite {
    /// Document vide avec les namespaces canoniques.
    pub fn new() -> Self {
        Self {
            xmlns: NS_DIDL.to_string(),
            xmlns_dc: NS_DC.to_string(),
            xmlns_upnp: NS_UPNP.to_string(),
            xmlns_dlna: NS_DLNA.to_string(),
            xmlns_sec: Some(NS_SEC.to_string()),
            containers: Vec::new(),
            items: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.containers.len() + self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sérialise le document en XML.
    pub fn to_xml(&self) -> Result<String, DidlError> {
        quick_xml::se::to_string(self).map_err(|e| DidlError::Serialize(e.to_string()))
    }
}

impl Default for DidlLite {
    fn default() -> Self {
        Self::new()
    }
}

/// Container (répertoire)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Container {
    #[serde(rename = "@id")]
    pub id: String,

    #[serde(rename = "@parentID")]
    pub parent_id: String,

    #[serde(rename = "@restricted")]
    pub restricted: String,

    #[serde(rename = "@childCount", skip_serializing_if = "Option::is_none")]
    pub child_count: Option<String>,

    #[serde(rename = "dc:title", alias = "title")]
    pub title: String,

    #[serde(rename = "upnp:class", alias = "class")]
    pub class: String,
}

/// Item (fichier média ou flux dynamique)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Item {
    #[serde(rename = "@id")]
    pub id: String,

    #[serde(rename = "@parentID")]
    pub parent_id: String,

    #[serde(rename = "@restricted")]
    pub restricted: String,

    #[serde(rename = "dc:title", alias = "title")]
    pub title: String,

    #[serde(rename = "upnp:class", alias = "class")]
    pub class: String,

    #[serde(
        rename = "upnp:artist",
        alias = "artist",
        skip_serializing_if = "Option::is_none"
    )]
    pub artist: Option<String>,

    #[serde(
        rename = "upnp:album",
        alias = "album",
        skip_serializing_if = "Option::is_none"
    )]
    pub album: Option<String>,

    #[serde(
        rename = "upnp:genre",
        alias = "genre",
        skip_serializing_if = "Option::is_none"
    )]
    pub genre: Option<String>,

    #[serde(
        rename = "upnp:albumArtURI",
        alias = "albumArtURI",
        skip_serializing_if = "Option::is_none"
    )]
    pub album_art: Option<String>,

    #[serde(rename = "upnp:icon", alias = "icon", skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,

    #[serde(rename = "res", default)]
    pub res: Vec<Res>,
}

/// Ressource d'un item : une URL de lecture et ses attributs DLNA
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Res {
    #[serde(rename = "@protocolInfo")]
    pub protocol_info: String,

    #[serde(rename = "@size", skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,

    #[serde(rename = "@duration", skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,

    #[serde(rename = "@bitrate", skip_serializing_if = "Option::is_none")]
    pub bitrate: Option<String>,

    #[serde(rename = "@resolution", skip_serializing_if = "Option::is_none")]
    pub resolution: Option<String>,

    #[serde(rename = "@sampleFrequency", skip_serializing_if = "Option::is_none")]
    pub sample_frequency: Option<String>,

    #[serde(rename = "@nrAudioChannels", skip_serializing_if = "Option::is_none")]
    pub nr_audio_channels: Option<String>,

    #[serde(
        rename = "@sec:subtitleFileUri",
        skip_serializing_if = "Option::is_none"
    )]
    pub subtitle_file_uri: Option<String>,

    #[serde(rename = "$text")]
    pub url: String,
}

impl Res {
    pub fn new(protocol_info: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            protocol_info: protocol_info.into(),
            size: None,
            duration: None,
            bitrate: None,
            resolution: None,
            sample_frequency: None,
            nr_audio_channels: None,
            subtitle_file_uri: None,
            url: url.into(),
        }
    }
}

/// Filtre de propriétés CDS (`Filter` de l'action Browse/Search).
///
/// `*` retient tout ; sinon la liste séparée par des virgules énumère les
/// propriétés optionnelles à conserver. Les propriétés obligatoires (id,
/// parentID, dc:title, upnp:class, res) sont toujours émises.
#[derive(Debug, Clone)]
pub enum Filter {
    All,
    Props(Vec<String>),
}

impl Filter {
    pub fn parse(s: &str) -> Self {
        let s = s.trim();
        if s.is_empty() || s == "*" {
            Filter::All
        } else {
            Filter::Props(s.split(',').map(|p| p.trim().to_string()).collect())
        }
    }

    fn keeps(&self, prop: &str) -> bool {
        match self {
            Filter::All => true,
            Filter::Props(props) => props.iter().any(|p| p == prop),
        }
    }

    /// Élague les champs optionnels non listés d'un document DIDL-Lite.
    pub fn apply(&self, didl: &mut DidlLite) {
        if matches!(self, Filter::All) {
            return;
        }
        for container in &mut didl.containers {
            if !self.keeps("@childCount") && !self.keeps("childCount") {
                container.child_count = None;
            }
        }
        for item in &mut didl.items {
            if !self.keeps("upnp:artist") {
                item.artist = None;
            }
            if !self.keeps("upnp:album") {
                item.album = None;
            }
            if !self.keeps("upnp:genre") {
                item.genre = None;
            }
            if !self.keeps("upnp:albumArtURI") {
                item.album_art = None;
            }
            if !self.keeps("upnp:icon") {
                item.icon = None;
            }
            for res in &mut item.res {
                if !self.keeps("res@size") && !self.keeps("@size") {
                    res.size = None;
                }
                if !self.keeps("res@duration") && !self.keeps("@duration") {
                    res.duration = None;
                }
                if !self.keeps("res@resolution") && !self.keeps("@resolution") {
                    res.resolution = None;
                }
                if !self.keeps("res@bitrate") && !self.keeps("@bitrate") {
                    res.bitrate = None;
                }
                if !self.keeps("res@sampleFrequency") && !self.keeps("@sampleFrequency") {
                    res.sample_frequency = None;
                }
                if !self.keeps("res@nrAudioChannels") && !self.keeps("@nrAudioChannels") {
                    res.nr_audio_channels = None;
                }
                if !self.keeps("sec:subtitleFileUri")
                    && !self.keeps("res@sec:subtitleFileUri")
                {
                    res.subtitle_file_uri = None;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_item() -> Item {
        Item {
            id: "/a.mp4".to_string(),
            parent_id: "0".to_string(),
            restricted: "1".to_string(),
            title: "a.mp4".to_string(),
            class: classes::VIDEO_ITEM.to_string(),
            artist: Some("someone".to_string()),
            album: None,
            genre: None,
            album_art: None,
            icon: None,
            res: vec![Res {
                size: Some("1000".to_string()),
                sample_frequency: Some("44100".to_string()),
                nr_audio_channels: Some("2".to_string()),
                subtitle_file_uri: Some("http://host/subtitle?path=%2Fa.mp4".to_string()),
                ..Res::new("http-get:*:video/mp4:*", "http://host/res?path=%2Fa.mp4")
            }],
        }
    }

    #[test]
    fn test_serialize_item() {
        let mut didl = DidlLite::new();
        didl.items.push(sample_item());
        let xml = didl.to_xml().unwrap();

        assert!(xml.starts_with("<DIDL-Lite"));
        assert!(xml.contains(r#"xmlns="urn:schemas-upnp-org:metadata-1-0/DIDL-Lite/""#));
        assert!(xml.contains(r#"<item id="/a.mp4" parentID="0" restricted="1">"#));
        assert!(xml.contains("<dc:title>a.mp4</dc:title>"));
        assert!(xml.contains("<upnp:class>object.item.videoItem</upnp:class>"));
        assert!(xml.contains(r#"size="1000""#));
    }

    #[test]
    fn test_serialize_container() {
        let mut didl = DidlLite::new();
        didl.containers.push(Container {
            id: "/movies".to_string(),
            parent_id: "0".to_string(),
            restricted: "1".to_string(),
            child_count: Some("3".to_string()),
            title: "movies".to_string(),
            class: classes::STORAGE_FOLDER.to_string(),
        });
        let xml = didl.to_xml().unwrap();
        assert!(xml.contains(r#"childCount="3""#));
        assert!(xml.contains("<upnp:class>object.container.storageFolder</upnp:class>"));
    }

    #[test]
    fn test_filter_prunes_unlisted_fields() {
        let mut didl = DidlLite::new();
        didl.items.push(sample_item());

        Filter::parse("dc:title,res").apply(&mut didl);
        assert!(didl.items[0].artist.is_none());
        let res = &didl.items[0].res[0];
        assert!(res.size.is_none());
        assert!(res.sample_frequency.is_none());
        assert!(res.nr_audio_channels.is_none());
        assert!(res.subtitle_file_uri.is_none());
        assert_eq!(didl.items[0].title, "a.mp4");
    }

    #[test]
    fn test_filter_keeps_listed_res_attributes() {
        let mut didl = DidlLite::new();
        didl.items.push(sample_item());

        Filter::parse("dc:title,res,res@sampleFrequency,sec:subtitleFileUri").apply(&mut didl);
        let res = &didl.items[0].res[0];
        assert!(res.sample_frequency.is_some());
        assert!(res.subtitle_file_uri.is_some());
        assert!(res.nr_audio_channels.is_none());
        assert!(res.size.is_none());
    }

    #[test]
    fn test_filter_star_keeps_everything() {
        let mut didl = DidlLite::new();
        didl.items.push(sample_item());

        Filter::parse("*").apply(&mut didl);
        assert!(didl.items[0].artist.is_some());
        let res = &didl.items[0].res[0];
        assert!(res.size.is_some());
        assert!(res.sample_frequency.is_some());
        assert!(res.nr_audio_channels.is_some());
        assert!(res.subtitle_file_uri.is_some());
    }
}
