//! Déduction du type MIME et de la classe UPnP d'un fichier
//!
//! L'extension prime ; à défaut, reniflage des premiers octets du fichier.

use fmsdidl::classes;
use std::path::Path;

/// Type MIME d'un fichier média
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MimeType(pub String);

impl MimeType {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_image(&self) -> bool {
        self.0.starts_with("image/")
    }

    pub fn is_video(&self) -> bool {
        self.0.starts_with("video/")
    }

    pub fn is_audio(&self) -> bool {
        self.0.starts_with("audio/")
    }

    /// Classe UPnP correspondant à la famille MIME.
    pub fn upnp_class(&self) -> &'static str {
        if self.is_video() {
            classes::VIDEO_ITEM
        } else if self.is_audio() {
            classes::AUDIO_ITEM
        } else if self.is_image() {
            classes::IMAGE_ITEM
        } else {
            classes::ITEM
        }
    }
}

impl std::fmt::Display for MimeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Déduit le type MIME d'un chemin : extension d'abord, contenu ensuite.
pub fn mime_type_by_path(path: &Path) -> MimeType {
    if let Some(mime) = mime_guess::from_path(path).first() {
        return MimeType(mime.essence_str().to_string());
    }
    if let Ok(head) = read_head(path) {
        if let Some(mime) = sniff(&head) {
            return MimeType(mime.to_string());
        }
    }
    MimeType("application/octet-stream".to_string())
}

fn read_head(path: &Path) -> std::io::Result<Vec<u8>> {
    use std::io::Read;
    let mut file = std::fs::File::open(path)?;
    let mut buf = [0u8; 16];
    let n = file.read(&mut buf)?;
    Ok(buf[..n].to_vec())
}

/// Reniflage par nombres magiques des conteneurs usuels.
fn sniff(head: &[u8]) -> Option<&'static str> {
    if head.starts_with(&[0xFF, 0xD8, 0xFF]) {
        return Some("image/jpeg");
    }
    if head.starts_with(&[0x89, b'P', b'N', b'G']) {
        return Some("image/png");
    }
    if head.starts_with(b"GIF8") {
        return Some("image/gif");
    }
    if head.len() >= 12 && &head[4..8] == b"ftyp" {
        return Some("video/mp4");
    }
    if head.starts_with(&[0x1A, 0x45, 0xDF, 0xA3]) {
        // EBML : Matroska ou WebM, indiscernables sur 4 octets
        return Some("video/x-matroska");
    }
    if head.starts_with(b"OggS") {
        return Some("application/ogg");
    }
    if head.starts_with(b"fLaC") {
        return Some("audio/flac");
    }
    if head.starts_with(b"ID3") || head.starts_with(&[0xFF, 0xFB]) {
        return Some("audio/mpeg");
    }
    if head.starts_with(b"RIFF") && head.len() >= 12 && &head[8..12] == b"WAVE" {
        return Some("audio/wav");
    }
    if head.starts_with(b"RIFF") && head.len() >= 12 && &head[8..12] == b"AVI " {
        return Some("video/x-msvideo");
    }
    if head.starts_with(&[0x00, 0x00, 0x01, 0xBA]) {
        return Some("video/mpeg");
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_mime_by_extension() {
        assert_eq!(
            mime_type_by_path(&PathBuf::from("/x/a.mp4")).as_str(),
            "video/mp4"
        );
        assert_eq!(
            mime_type_by_path(&PathBuf::from("/x/a.jpg")).as_str(),
            "image/jpeg"
        );
        assert_eq!(
            mime_type_by_path(&PathBuf::from("/x/a.mp3")).as_str(),
            "audio/mpeg"
        );
    }

    #[test]
    fn test_sniff_magic_numbers() {
        assert_eq!(sniff(&[0xFF, 0xD8, 0xFF, 0xE0]), Some("image/jpeg"));
        assert_eq!(
            sniff(b"\x00\x00\x00\x20ftypisom....".as_slice()),
            Some("video/mp4")
        );
        assert_eq!(sniff(b"fLaC\0\0\0\x22"), Some("audio/flac"));
        assert_eq!(sniff(b"garbage"), None);
    }

    #[test]
    fn test_upnp_class_families() {
        assert_eq!(
            MimeType("video/mp4".to_string()).upnp_class(),
            fmsdidl::classes::VIDEO_ITEM
        );
        assert_eq!(
            MimeType("audio/flac".to_string()).upnp_class(),
            fmsdidl::classes::AUDIO_ITEM
        );
        assert_eq!(
            MimeType("image/png".to_string()).upnp_class(),
            fmsdidl::classes::IMAGE_ITEM
        );
        assert_eq!(
            MimeType("text/plain".to_string()).upnp_class(),
            fmsdidl::classes::ITEM
        );
    }
}
