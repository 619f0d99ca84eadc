//! # fmsprobe - Sonde média et cache de résultats
//!
//! Pilote le collaborateur externe `ffprobe` et mémoïse ses résultats par
//! clé `(chemin absolu, mtime en nanosecondes)`.
//!
//! ## Fonctionnalités
//!
//! - ✅ Lancement de `ffprobe` avec sortie JSON
//! - ✅ Cache enfichable (`ProbeCache`) : mémoire ou no-op
//! - ✅ Mémoïsation négative : un échec de sonde est un résultat légitime
//! - ✅ Extraction durée / résolution / tags artist-album-genre

use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use std::time::{Duration, UNIX_EPOCH};
use tokio::process::Command;
use tracing::debug;

/// Clé de cache : chemin absolu + mtime nanosecondes.
///
/// Le mtime fait partie de la clé pour invalider naturellement les entrées
/// quand le fichier change.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProbeKey {
    pub path: PathBuf,
    pub mtime_ns: u128,
}

/// Section `format` de la sortie ffprobe
#[derive(Debug, Clone, Deserialize, Default)]
pub struct FormatInfo {
    #[serde(default)]
    pub duration: Option<String>,
    #[serde(default)]
    pub bit_rate: Option<String>,
    #[serde(default)]
    pub tags: Option<HashMap<String, String>>,
}

/// Une entrée `streams` de la sortie ffprobe
#[derive(Debug, Clone, Deserialize, Default)]
pub struct StreamInfo {
    #[serde(default)]
    pub codec_type: Option<String>,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
    #[serde(default)]
    pub sample_rate: Option<String>,
    #[serde(default)]
    pub channels: Option<u32>,
    #[serde(default)]
    pub tags: Option<HashMap<String, String>>,
}

/// Métadonnées d'un fichier média telles que rapportées par la sonde
#[derive(Debug, Clone, Deserialize, Default)]
pub struct MediaInfo {
    #[serde(default)]
    pub format: FormatInfo,
    #[serde(default)]
    pub streams: Vec<StreamInfo>,
}

impl MediaInfo {
    /// Durée du média, si la section format en rapporte une.
    pub fn duration(&self) -> Option<Duration> {
        let secs: f64 = self.format.duration.as_deref()?.parse().ok()?;
        if secs.is_finite() && secs >= 0.0 {
            Some(Duration::from_secs_f64(secs))
        } else {
            None
        }
    }

    /// Résolution `LxH` du premier flux vidéo.
    pub fn resolution(&self) -> Option<String> {
        self.streams.iter().find_map(|s| {
            if s.codec_type.as_deref() == Some("video") {
                Some(format!("{}x{}", s.width?, s.height?))
            } else {
                None
            }
        })
    }

    /// Fréquence d'échantillonnage du premier flux audio.
    pub fn sample_frequency(&self) -> Option<String> {
        self.streams.iter().find_map(|s| {
            if s.codec_type.as_deref() == Some("audio") {
                s.sample_rate.clone()
            } else {
                None
            }
        })
    }

    /// Nombre de canaux du premier flux audio.
    pub fn audio_channels(&self) -> Option<u32> {
        self.streams.iter().find_map(|s| {
            if s.codec_type.as_deref() == Some("audio") {
                s.channels
            } else {
                None
            }
        })
    }

    /// Cherche un tag, section format d'abord puis chaque flux dans l'ordre.
    /// La première valeur trouvée gagne.
    pub fn tag(&self, name: &str) -> Option<&str> {
        fn find<'a>(tags: &'a Option<HashMap<String, String>>, name: &str) -> Option<&'a str> {
            tags.as_ref()?
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(name))
                .map(|(_, v)| v.as_str())
        }
        find(&self.format.tags, name)
            .or_else(|| self.streams.iter().find_map(|s| find(&s.tags, name)))
    }
}

/// Cache de sondes enfichable.
///
/// Le `Option` intérieur est le résultat mémoïsé : `None` signifie « la sonde
/// a déjà échoué pour cette clé », et doit être restitué tel quel sans
/// relancer le collaborateur.
pub trait ProbeCache: Send + Sync {
    fn get(&self, key: &ProbeKey) -> Option<Option<Arc<MediaInfo>>>;
    fn set(&self, key: ProbeKey, value: Option<Arc<MediaInfo>>);
}

/// Cache en mémoire, durée de vie du processus.
#[derive(Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<ProbeKey, Option<Arc<MediaInfo>>>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProbeCache for MemoryCache {
    fn get(&self, key: &ProbeKey) -> Option<Option<Arc<MediaInfo>>> {
        self.entries.read().unwrap().get(key).cloned()
    }

    fn set(&self, key: ProbeKey, value: Option<Arc<MediaInfo>>) {
        self.entries.write().unwrap().insert(key, value);
    }
}

/// Cache no-op : ne retient rien, chaque requête resonde.
pub struct NoopCache;

impl ProbeCache for NoopCache {
    fn get(&self, _key: &ProbeKey) -> Option<Option<Arc<MediaInfo>>> {
        None
    }

    fn set(&self, _key: ProbeKey, _value: Option<Arc<MediaInfo>>) {}
}

/// Pilote de sonde : binaire + cache.
#[derive(Clone)]
pub struct Prober {
    cache: Arc<dyn ProbeCache>,
    binary: String,
    enabled: bool,
}

impl Prober {
    pub fn new(cache: Arc<dyn ProbeCache>) -> Self {
        Self {
            cache,
            binary: "ffprobe".to_string(),
            enabled: true,
        }
    }

    /// Sonde désactivée : `probe` répond toujours `None` sans rien lancer.
    pub fn disabled() -> Self {
        Self {
            cache: Arc::new(NoopCache),
            binary: "ffprobe".to_string(),
            enabled: false,
        }
    }

    pub fn with_binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }

    /// Sonde `path`, en passant par le cache.
    ///
    /// Tout échec (binaire absent, sortie invalide, métadonnées malformées)
    /// est mémoïsé comme `None` : les erreurs transitoires ne doivent pas
    /// réapparaître à chaque browse.
    pub async fn probe(&self, path: &Path) -> Option<Arc<MediaInfo>> {
        if !self.enabled {
            return None;
        }
        let abs = tokio::fs::canonicalize(path).await.ok()?;
        let meta = tokio::fs::metadata(&abs).await.ok()?;
        let mtime_ns = meta
            .modified()
            .ok()?
            .duration_since(UNIX_EPOCH)
            .ok()?
            .as_nanos();
        let key = ProbeKey {
            path: abs.clone(),
            mtime_ns,
        };

        if let Some(cached) = self.cache.get(&key) {
            return cached;
        }

        let info = self.run(&abs).await;
        if info.is_none() {
            debug!("probe failed for {:?}, memoizing negative result", abs);
        }
        self.cache.set(key, info.clone());
        info
    }

    async fn run(&self, abs: &Path) -> Option<Arc<MediaInfo>> {
        let output = Command::new(&self.binary)
            .arg("-v")
            .arg("quiet")
            .arg("-print_format")
            .arg("json")
            .arg("-show_format")
            .arg("-show_streams")
            .arg(abs)
            .output()
            .await
            .ok()?;
        if !output.status.success() {
            return None;
        }
        serde_json::from_slice::<MediaInfo>(&output.stdout)
            .ok()
            .map(Arc::new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(path: &str) -> ProbeKey {
        ProbeKey {
            path: PathBuf::from(path),
            mtime_ns: 42,
        }
    }

    #[test]
    fn test_memory_cache_round_trip() {
        let cache = MemoryCache::new();
        let info = Arc::new(MediaInfo::default());

        assert!(cache.get(&key("/a")).is_none());
        cache.set(key("/a"), Some(info.clone()));
        assert!(cache.get(&key("/a")).unwrap().is_some());
    }

    #[test]
    fn test_memory_cache_keeps_negative_results() {
        let cache = MemoryCache::new();
        cache.set(key("/broken"), None);

        // Présent dans le cache, valeur mémoïsée « échec »
        let hit = cache.get(&key("/broken"));
        assert!(hit.is_some());
        assert!(hit.unwrap().is_none());
    }

    #[test]
    fn test_mtime_is_part_of_the_key() {
        let cache = MemoryCache::new();
        cache.set(key("/a"), None);
        let other = ProbeKey {
            path: PathBuf::from("/a"),
            mtime_ns: 43,
        };
        assert!(cache.get(&other).is_none());
    }

    #[test]
    fn test_media_info_extractors() {
        let json = r#"{
            "format": {"duration": "12.5", "tags": {"ARTIST": "someone"}},
            "streams": [
                {"codec_type": "video", "width": 1280, "height": 720},
                {"codec_type": "audio", "sample_rate": "44100", "channels": 2}
            ]
        }"#;
        let info: MediaInfo = serde_json::from_str(json).unwrap();

        assert_eq!(info.duration(), Some(Duration::from_secs_f64(12.5)));
        assert_eq!(info.resolution().as_deref(), Some("1280x720"));
        assert_eq!(info.sample_frequency().as_deref(), Some("44100"));
        assert_eq!(info.audio_channels(), Some(2));
        assert_eq!(info.tag("artist"), Some("someone"));
    }

    #[tokio::test]
    async fn test_disabled_prober_never_probes() {
        let prober = Prober::disabled();
        assert!(prober.probe(Path::new("/nonexistent")).await.is_none());
    }
}
