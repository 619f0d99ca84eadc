//! Répertoire d'objets : projection du système de fichiers en objets CDS
//!
//! Les ObjectIDs sont des chemins relatifs à la racine partagée, normalisés
//! et toujours ancrés à `/` ; la racine elle-même porte l'ID réservé `"0"`.
//! Aucun arbre n'est maintenu en mémoire : chaque browse recalcule à la
//! demande, seules les sondes média sont mémoïsées.

use crate::device::MediaServer;
use crate::dynamic::{self, DynamicStream};
use crate::mime::mime_type_by_path;
use crate::transcode::{TranscodeSpec, TRANSCODES};
use fmsdidl::{classes, Container, Item, Res};
use fmsupnp::dlna::ContentFeatures;
use fmsupnp::UpnpError;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;
use url::form_urlencoded;

/// Chemin du streaming de ressources
pub const RES_PATH: &str = "/res";
/// Chemin des vignettes d'items
pub const ICON_PATH: &str = "/icon";
/// Chemin des sous-titres
pub const SUBTITLE_PATH: &str = "/subtitle";

/// ObjectID réservé de la racine
pub const ROOT_OBJECT_ID: &str = "0";

/// Un objet CDS : container ou item, dans l'ordre d'énumération.
#[derive(Debug, Clone)]
pub enum Entry {
    Container(Container),
    Item(Item),
}

impl Entry {
    pub fn title(&self) -> &str {
        match self {
            Entry::Container(c) => &c.title,
            Entry::Item(i) => &i.title,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Entry::Container(c) => &c.id,
            Entry::Item(i) => &i.id,
        }
    }

    pub fn class(&self) -> &str {
        match self {
            Entry::Container(c) => &c.class,
            Entry::Item(i) => &i.class,
        }
    }

    pub fn is_container(&self) -> bool {
        matches!(self, Entry::Container(_))
    }
}

/// Normalise un ObjectID : composants vides, `.` et `..` éliminés, ancrage
/// à `/`. Un `..` en excès s'arrête à la racine, jamais au-dessus.
pub fn normalize_id(id: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for comp in id.split('/') {
        match comp {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            c => parts.push(c),
        }
    }
    format!("/{}", parts.join("/"))
}

/// Joint un ObjectID à la racine sans jamais s'en échapper.
pub fn safe_join(root: &Path, id: &str) -> PathBuf {
    let normalized = normalize_id(id);
    let mut out = root.to_path_buf();
    for comp in normalized.split('/').filter(|c| !c.is_empty()) {
        out.push(comp);
    }
    out
}

/// Parent d'un ObjectID normalisé : `"-1"` pour la racine, `"0"` pour ses
/// enfants directs, le préfixe sinon.
pub fn parent_id(id: &str) -> String {
    if id == ROOT_OBJECT_ID {
        return "-1".to_string();
    }
    match id.rfind('/') {
        Some(0) => ROOT_OBJECT_ID.to_string(),
        Some(idx) => id[..idx].to_string(),
        None => "-1".to_string(),
    }
}

/// URL d'une ressource `/res` pour un host donné.
pub fn res_url(host: &str, id: &str, transcode: Option<&str>) -> String {
    let mut query = form_urlencoded::Serializer::new(String::new());
    query.append_pair("path", id);
    if let Some(key) = transcode {
        query.append_pair("transcode", key);
    }
    format!("http://{}{}?{}", host, RES_PATH, query.finish())
}

fn subtitle_url(host: &str, id: &str) -> String {
    let mut query = form_urlencoded::Serializer::new(String::new());
    query.append_pair("path", id);
    format!("http://{}{}?{}", host, SUBTITLE_PATH, query.finish())
}

fn icon_url(host: &str, id: &str) -> String {
    let mut query = form_urlencoded::Serializer::new(String::new());
    query.append_pair("path", id);
    query.append_pair("c", "png");
    format!("http://{}{}?{}", host, ICON_PATH, query.finish())
}

/// Durée au format DIDL `H:MM:SS.mmm`.
fn didl_duration(d: Duration) -> String {
    fmsupnp::dlna::format_npt_time(d)
}

impl MediaServer {
    /// Le chemin doit-il être caché aux clients ?
    pub fn is_ignored(&self, abs: &Path) -> bool {
        if self.config.ignore_hidden && self.is_hidden(abs) {
            debug!("{:?} ignored: hidden", abs);
            return true;
        }
        if self.config.ignore_unreadable && !is_readable(abs) {
            debug!("{:?} ignored: unreadable", abs);
            return true;
        }
        let text = abs.to_string_lossy();
        for element in &self.config.ignore_paths {
            if text.contains(&format!("/{}/", element)) {
                debug!("{:?} ignored: in ignore list", abs);
                return true;
            }
        }
        false
    }

    /// Un composant caché sous la racine suffit à cacher le chemin.
    fn is_hidden(&self, abs: &Path) -> bool {
        let root = &self.config.root_object_path;
        abs.strip_prefix(root)
            .map(|rel| {
                rel.components().any(|c| {
                    c.as_os_str()
                        .to_string_lossy()
                        .starts_with('.')
                })
            })
            .unwrap_or(false)
    }

    /// Métadonnées d'un objet par son ID.
    pub async fn browse_metadata(
        &self,
        id: &str,
        host: &str,
        user_agent: &str,
    ) -> Result<Entry, UpnpError> {
        debug!("browse metadata {} for {}", id, user_agent);
        if id == ROOT_OBJECT_ID {
            return Ok(self.root_entry());
        }
        let id = normalize_id(id);
        let abs = safe_join(&self.config.root_object_path, &id);
        if self.is_ignored(&abs) {
            return Err(UpnpError::no_such_object());
        }
        self.entry_for(&id, &abs, host)
            .await
            .ok_or_else(UpnpError::no_such_object)
    }

    /// Enfants directs d'un container, triés répertoires d'abord puis titre
    /// insensible à la casse.
    pub async fn browse_direct_children(
        &self,
        id: &str,
        host: &str,
        user_agent: &str,
    ) -> Result<Vec<Entry>, UpnpError> {
        debug!("browse children {} for {}", id, user_agent);
        let (id, abs) = if id == ROOT_OBJECT_ID {
            (
                ROOT_OBJECT_ID.to_string(),
                self.config.root_object_path.clone(),
            )
        } else {
            let id = normalize_id(id);
            let abs = safe_join(&self.config.root_object_path, &id);
            (id, abs)
        };
        if id != ROOT_OBJECT_ID && self.is_ignored(&abs) {
            return Err(UpnpError::no_such_object());
        }
        let meta = tokio::fs::metadata(&abs)
            .await
            .map_err(|_| UpnpError::no_such_object())?;
        if !meta.is_dir() {
            return Err(UpnpError::no_such_object());
        }

        let mut entries = Vec::new();
        let mut dir = tokio::fs::read_dir(&abs)
            .await
            .map_err(|_| UpnpError::no_such_object())?;
        while let Ok(Some(dirent)) = dir.next_entry().await {
            let name = dirent.file_name().to_string_lossy().into_owned();
            let child_id = if id == ROOT_OBJECT_ID {
                format!("/{}", name)
            } else {
                format!("{}/{}", id, name)
            };
            let child_abs = dirent.path();
            if self.is_ignored(&child_abs) {
                continue;
            }
            if let Some(entry) = self.entry_for(&child_id, &child_abs, host).await {
                entries.push(entry);
            }
        }

        entries.sort_by(|a, b| {
            b.is_container()
                .cmp(&a.is_container())
                .then_with(|| a.title().to_lowercase().cmp(&b.title().to_lowercase()))
        });
        Ok(entries)
    }

    /// L'objet racine, parent `-1`, titré du friendly name.
    pub fn root_entry(&self) -> Entry {
        Entry::Container(Container {
            id: ROOT_OBJECT_ID.to_string(),
            parent_id: "-1".to_string(),
            restricted: "1".to_string(),
            child_count: None,
            title: self.friendly_name.clone(),
            class: classes::STORAGE_FOLDER.to_string(),
        })
    }

    /// Construit l'objet CDS d'un chemin déjà validé. `None` pour les
    /// chemins qui n'existent pas ou ne produisent pas d'objet.
    pub async fn entry_for(&self, id: &str, abs: &Path, host: &str) -> Option<Entry> {
        let meta = tokio::fs::metadata(abs).await.ok()?;

        if meta.is_dir() {
            let child_count = count_children(abs).await;
            return Some(Entry::Container(Container {
                id: id.to_string(),
                parent_id: parent_id(id),
                restricted: "1".to_string(),
                child_count: child_count.map(|n| n.to_string()),
                title: file_title(abs),
                class: classes::STORAGE_FOLDER.to_string(),
            }));
        }
        if !meta.is_file() {
            return None;
        }

        if dynamic::is_dynamic_stream_path(abs) && self.config.allow_dynamic_streams {
            return self.dynamic_entry(id, abs, host).await;
        }

        let mime = mime_type_by_path(abs);
        let class = mime.upnp_class();

        let mut item = Item {
            id: id.to_string(),
            parent_id: parent_id(id),
            restricted: "1".to_string(),
            title: file_title(abs),
            class: class.to_string(),
            artist: None,
            album: None,
            genre: None,
            album_art: None,
            icon: None,
            res: Vec::new(),
        };

        let info = if mime.is_video() || mime.is_audio() {
            self.prober.probe(abs).await
        } else {
            None
        };
        let duration = info.as_ref().and_then(|i| i.duration()).map(didl_duration);
        let resolution = info.as_ref().and_then(|i| i.resolution());
        if let Some(info) = &info {
            item.artist = info.tag("artist").map(str::to_string);
            item.album = info.tag("album").map(str::to_string);
            item.genre = info.tag("genre").map(str::to_string);
        }
        if mime.is_video() || mime.is_image() {
            item.icon = Some(icon_url(host, id));
            item.album_art = item.icon.clone();
        }

        // Première ressource : le fichier brut
        let raw_features = ContentFeatures {
            support_range: true,
            ..Default::default()
        };
        let mut raw = Res::new(
            format!("http-get:*:{}:{}", mime, raw_features),
            res_url(host, id, None),
        );
        raw.size = Some(meta.len().to_string());
        raw.duration = duration.clone();
        raw.resolution = resolution.clone();
        if let Some(info) = &info {
            raw.sample_frequency = info.sample_frequency();
            raw.nr_audio_channels = info.audio_channels().map(|n| n.to_string());
        }
        let has_subtitle = mime.is_video() && sibling_srt(abs).is_some();
        if has_subtitle {
            raw.subtitle_file_uri = Some(subtitle_url(host, id));
        }
        item.res.push(raw);

        // Puis une ressource par transcodage exposé
        if mime.is_video() && !self.config.no_transcode {
            for (key, spec) in self.exposed_transcodes() {
                let features = ContentFeatures {
                    profile_name: spec.dlna_profile_name.map(str::to_string),
                    support_time_seek: true,
                    transcoded: true,
                    flags: spec.dlna_flags.map(str::to_string),
                    ..Default::default()
                };
                let mut res = Res::new(
                    format!("http-get:*:{}:{}", spec.mime_type, features),
                    res_url(host, id, Some(key)),
                );
                res.duration = duration.clone();
                res.resolution = resolution.clone();
                item.res.push(res);
            }
        }

        if has_subtitle {
            item.res
                .push(Res::new("http-get:*:text/srt:*", subtitle_url(host, id)));
        }

        Some(Entry::Item(item))
    }

    /// Transcodages effectivement exposés : toute la table, ou la seule clé
    /// forcée par la configuration.
    pub fn exposed_transcodes(&self) -> Vec<(&'static str, &'static TranscodeSpec)> {
        match &self.config.force_transcode_to {
            Some(forced) => TRANSCODES
                .iter()
                .filter(|(k, _)| **k == forced.as_str())
                .map(|(k, v)| (*k, v))
                .collect(),
            None => TRANSCODES.iter().map(|(k, v)| (*k, v)).collect(),
        }
    }

    async fn dynamic_entry(&self, id: &str, abs: &Path, host: &str) -> Option<Entry> {
        let descriptor = DynamicStream::read(abs).await.ok()?;
        let mut item = Item {
            id: id.to_string(),
            parent_id: parent_id(id),
            restricted: "1".to_string(),
            title: dynamic::dynamic_stream_title(abs),
            class: classes::VIDEO_ITEM.to_string(),
            artist: None,
            album: None,
            genre: None,
            album_art: None,
            icon: None,
            res: Vec::new(),
        };
        for (index, resource) in descriptor.resources.iter().enumerate() {
            let features = ContentFeatures {
                profile_name: Some(resource.dlna_profile_name.clone())
                    .filter(|s| !s.is_empty()),
                transcoded: true,
                flags: Some(resource.dlna_flags.clone()).filter(|s| !s.is_empty()),
                ..Default::default()
            };
            let mut query = form_urlencoded::Serializer::new(String::new());
            query.append_pair("path", id);
            query.append_pair("index", &index.to_string());
            item.res.push(Res::new(
                format!("http-get:*:{}:{}", resource.mime_type, features),
                format!("http://{}{}?{}", host, RES_PATH, query.finish()),
            ));
        }
        Some(Entry::Item(item))
    }
}

/// Titre d'un objet : son nom de base.
fn file_title(abs: &Path) -> String {
    if dynamic::is_dynamic_stream_path(abs) {
        return dynamic::dynamic_stream_title(abs);
    }
    abs.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Chemin du `.srt` jumeau d'un fichier vidéo, s'il existe.
pub fn sibling_srt(abs: &Path) -> Option<PathBuf> {
    let srt = abs.with_extension("srt");
    srt.is_file().then_some(srt)
}

fn is_readable(abs: &Path) -> bool {
    match std::fs::metadata(abs) {
        Ok(meta) if meta.is_dir() => std::fs::read_dir(abs).is_ok(),
        Ok(_) => std::fs::File::open(abs).is_ok(),
        Err(_) => false,
    }
}

async fn count_children(abs: &Path) -> Option<usize> {
    let mut dir = tokio::fs::read_dir(abs).await.ok()?;
    let mut count = 0;
    while let Ok(Some(_)) = dir.next_entry().await {
        count += 1;
    }
    Some(count)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_id() {
        assert_eq!(normalize_id("/a/b"), "/a/b");
        assert_eq!(normalize_id("a/b/"), "/a/b");
        assert_eq!(normalize_id("/a/../b"), "/b");
        assert_eq!(normalize_id("/../../etc/passwd"), "/etc/passwd");
        assert_eq!(normalize_id("//a//./b"), "/a/b");
        assert_eq!(normalize_id(""), "/");
    }

    #[test]
    fn test_safe_join_never_escapes() {
        let root = Path::new("/srv/media");
        for hostile in [
            "../../etc/passwd",
            "/..",
            "a/../../..",
            "./../..",
            "/a/b/../../../../root",
        ] {
            let joined = safe_join(root, hostile);
            assert!(
                joined.starts_with(root),
                "{} escaped to {:?}",
                hostile,
                joined
            );
        }
    }

    #[test]
    fn test_parent_id() {
        assert_eq!(parent_id("0"), "-1");
        assert_eq!(parent_id("/a.mp4"), "0");
        assert_eq!(parent_id("/a/b.mp4"), "/a");
        assert_eq!(parent_id("/a/b/c"), "/a/b");
    }

    #[test]
    fn test_res_url_round_trips_query() {
        let url = res_url("10.0.0.1:1338", "/dir/a file.mp4", Some("vp8"));
        assert!(url.starts_with("http://10.0.0.1:1338/res?"));

        let query = url.split_once('?').unwrap().1;
        let params: Vec<(String, String)> =
            form_urlencoded::parse(query.as_bytes()).into_owned().collect();
        assert!(params.contains(&("path".to_string(), "/dir/a file.mp4".to_string())));
        assert!(params.contains(&("transcode".to_string(), "vp8".to_string())));
    }

    #[test]
    fn test_res_url_encodes_leading_slash() {
        let url = res_url("host", "/a.mp4", None);
        assert!(url.ends_with("/res?path=%2Fa.mp4"));
    }
}
