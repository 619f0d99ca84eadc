//! Flux dynamiques décrits par fichiers side-car
//!
//! Un fichier `<nom>.dms.json` sous la racine expose un item virtuel dont
//! chaque ressource lie une commande arbitraire à un type MIME. La facilité
//! est désactivée par défaut : l'écriture d'un descripteur équivaut à
//! l'exécution de commandes dans le contexte du serveur.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Suffixe réservé des descripteurs de flux dynamiques
pub const DYNAMIC_STREAM_SUFFIX: &str = ".dms.json";

/// Une ressource d'un flux dynamique
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DynamicResource {
    #[serde(rename = "Command")]
    pub command: String,

    #[serde(rename = "MimeType")]
    pub mime_type: String,

    #[serde(rename = "DlnaProfileName", default)]
    pub dlna_profile_name: String,

    #[serde(rename = "DlnaFlags", default)]
    pub dlna_flags: String,
}

/// Descripteur complet d'un item dynamique
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DynamicStream {
    #[serde(rename = "Resources")]
    pub resources: Vec<DynamicResource>,
}

#[derive(Debug, thiserror::Error)]
pub enum DynamicStreamError {
    #[error("cannot read dynamic stream descriptor: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed dynamic stream descriptor: {0}")]
    Parse(#[from] serde_json::Error),
}

impl DynamicStream {
    /// Charge un descripteur depuis son fichier side-car.
    pub async fn read(path: &Path) -> Result<Self, DynamicStreamError> {
        let data = tokio::fs::read(path).await?;
        Ok(serde_json::from_slice(&data)?)
    }
}

/// Le chemin porte-t-il le suffixe réservé ?
pub fn is_dynamic_stream_path(path: &Path) -> bool {
    path.to_string_lossy().ends_with(DYNAMIC_STREAM_SUFFIX)
}

/// Titre d'un item dynamique : nom de base sans le suffixe réservé.
pub fn dynamic_stream_title(path: &Path) -> String {
    let base = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    base.strip_suffix(DYNAMIC_STREAM_SUFFIX)
        .unwrap_or(&base)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_suffix_detection() {
        assert!(is_dynamic_stream_path(&PathBuf::from("/x/cam.dms.json")));
        assert!(!is_dynamic_stream_path(&PathBuf::from("/x/cam.json")));
    }

    #[test]
    fn test_title_strips_suffix() {
        assert_eq!(
            dynamic_stream_title(&PathBuf::from("/x/front door.dms.json")),
            "front door"
        );
    }

    #[test]
    fn test_descriptor_parsing() {
        let json = r#"{
            "Resources": [
                {
                    "Command": "ffmpeg -i rtsp://cam/stream -f mpegts pipe:1",
                    "MimeType": "video/mpeg",
                    "DlnaProfileName": "MPEG_PS_PAL"
                }
            ]
        }"#;
        let stream: DynamicStream = serde_json::from_str(json).unwrap();
        assert_eq!(stream.resources.len(), 1);
        assert_eq!(stream.resources[0].mime_type, "video/mpeg");
        assert!(stream.resources[0].dlna_flags.is_empty());
    }
}
