//! # Module DLNA - En-têtes et formats de temps
//!
//! Les quelques formats propres à DLNA au-dessus d'UPnP AV : la chaîne
//! `ContentFeatures` des attributs `protocolInfo`, et le temps NPT
//! (Normal Play Time) des en-têtes de seek temporel.

use std::fmt;
use std::time::Duration;

/// En-tête de demande de plage temporelle
pub const TIME_SEEK_RANGE_HEADER: &str = "TimeSeekRange.dlna.org";
/// En-tête de mode de transfert
pub const TRANSFER_MODE_HEADER: &str = "TransferMode.dlna.org";
/// En-tête de description du contenu
pub const CONTENT_FEATURES_HEADER: &str = "ContentFeatures.dlna.org";
/// En-tête de demande de description du contenu
pub const GET_CONTENT_FEATURES_HEADER: &str = "getContentFeatures.dlna.org";

/// Quadruplet `DLNA.ORG_*` d'un attribut `protocolInfo` ou d'un en-tête
/// `ContentFeatures.dlna.org`.
#[derive(Debug, Clone, Default)]
pub struct ContentFeatures {
    /// DLNA.ORG_PN
    pub profile_name: Option<String>,
    /// Seek temporel supporté (premier digit de DLNA.ORG_OP)
    pub support_time_seek: bool,
    /// Seek par octets supporté (second digit de DLNA.ORG_OP)
    pub support_range: bool,
    /// DLNA.ORG_CI : contenu transcodé
    pub transcoded: bool,
    /// DLNA.ORG_FLAGS
    pub flags: Option<String>,
}

impl fmt::Display for ContentFeatures {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if let Some(pn) = &self.profile_name {
            parts.push(format!("DLNA.ORG_PN={}", pn));
        }
        parts.push(format!(
            "DLNA.ORG_OP={}{}",
            u8::from(self.support_time_seek),
            u8::from(self.support_range)
        ));
        parts.push(format!("DLNA.ORG_CI={}", u8::from(self.transcoded)));
        if let Some(flags) = &self.flags {
            parts.push(format!("DLNA.ORG_FLAGS={}", flags));
        }
        write!(f, "{}", parts.join(";"))
    }
}

/// Erreur de parsing NPT
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum NptError {
    #[error("bad NPT time: {0}")]
    BadTime(String),

    #[error("bad NPT range: {0}")]
    BadRange(String),

    #[error("NPT range must start with npt=")]
    BadPrefix,
}

/// Parse un temps NPT : `S[.fff]` ou `H:MM:SS[.fff]`.
pub fn parse_npt_time(s: &str) -> Result<Duration, NptError> {
    let s = s.trim();
    if s.is_empty() {
        return Err(NptError::BadTime(s.to_string()));
    }
    let bad = || NptError::BadTime(s.to_string());

    if s.contains(':') {
        let fields: Vec<&str> = s.split(':').collect();
        if fields.len() != 3 {
            return Err(bad());
        }
        let hours: u64 = fields[0].parse().map_err(|_| bad())?;
        let minutes: u64 = fields[1].parse().map_err(|_| bad())?;
        let seconds: f64 = fields[2].parse().map_err(|_| bad())?;
        if minutes > 59 || !seconds.is_finite() || seconds < 0.0 || seconds >= 60.0 {
            return Err(bad());
        }
        Ok(Duration::from_secs_f64(
            (hours * 3600 + minutes * 60) as f64 + seconds,
        ))
    } else {
        let seconds: f64 = s.parse().map_err(|_| bad())?;
        if !seconds.is_finite() || seconds < 0.0 {
            return Err(bad());
        }
        Ok(Duration::from_secs_f64(seconds))
    }
}

/// Formate une durée en temps NPT `H:MM:SS.fff`.
pub fn format_npt_time(d: Duration) -> String {
    let millis = d.as_millis();
    let hours = millis / 3_600_000;
    let minutes = (millis % 3_600_000) / 60_000;
    let seconds = (millis % 60_000) as f64 / 1000.0;
    format!("{}:{:02}:{:06.3}", hours, minutes, seconds)
}

/// Plage temporelle NPT interprétée
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NptRange {
    pub start: Duration,
    /// Borne de fin exclue si absente (`npt=10-`)
    pub end: Option<Duration>,
}

impl NptRange {
    /// Durée couverte par la plage, `None` si ouverte à droite.
    pub fn length(&self) -> Option<Duration> {
        self.end.map(|e| e.saturating_sub(self.start))
    }
}

/// Parse la valeur d'un en-tête `TimeSeekRange.dlna.org`.
///
/// La valeur doit commencer par `npt=` puis `start-[end]`.
pub fn parse_npt_range(value: &str) -> Result<NptRange, NptError> {
    let rest = value
        .trim()
        .strip_prefix("npt=")
        .ok_or(NptError::BadPrefix)?;
    let (start_s, end_s) = rest
        .split_once('-')
        .ok_or_else(|| NptError::BadRange(value.to_string()))?;
    let start = parse_npt_time(start_s)?;
    let end = if end_s.trim().is_empty() {
        None
    } else {
        let end = parse_npt_time(end_s)?;
        if end < start {
            return Err(NptError::BadRange(value.to_string()));
        }
        Some(end)
    };
    Ok(NptRange { start, end })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_features_raw_file() {
        let cf = ContentFeatures {
            support_range: true,
            ..Default::default()
        };
        assert_eq!(cf.to_string(), "DLNA.ORG_OP=01;DLNA.ORG_CI=0");
    }

    #[test]
    fn test_content_features_transcode() {
        let cf = ContentFeatures {
            profile_name: Some("MPEG_PS_PAL".to_string()),
            support_time_seek: true,
            transcoded: true,
            flags: Some("01700000000000000000000000000000".to_string()),
            ..Default::default()
        };
        assert_eq!(
            cf.to_string(),
            "DLNA.ORG_PN=MPEG_PS_PAL;DLNA.ORG_OP=10;DLNA.ORG_CI=1;DLNA.ORG_FLAGS=01700000000000000000000000000000"
        );
    }

    #[test]
    fn test_parse_npt_time_seconds() {
        assert_eq!(
            parse_npt_time("10.5").unwrap(),
            Duration::from_secs_f64(10.5)
        );
        assert_eq!(parse_npt_time("0").unwrap(), Duration::ZERO);
    }

    #[test]
    fn test_parse_npt_time_colon_form() {
        assert_eq!(
            parse_npt_time("1:02:03.250").unwrap(),
            Duration::from_secs_f64(3723.25)
        );
        assert!(parse_npt_time("1:75:00").is_err());
        assert!(parse_npt_time("a:b:c").is_err());
    }

    #[test]
    fn test_npt_time_round_trip() {
        for s in ["0:00:10.000", "1:02:03.250", "25:59:59.999"] {
            let parsed = parse_npt_time(s).unwrap();
            assert_eq!(format_npt_time(parsed), s);
        }
    }

    #[test]
    fn test_parse_npt_range() {
        let r = parse_npt_range("npt=10.0-20.0").unwrap();
        assert_eq!(r.start, Duration::from_secs(10));
        assert_eq!(r.end, Some(Duration::from_secs(20)));
        assert_eq!(r.length(), Some(Duration::from_secs(10)));

        let open = parse_npt_range("npt=30-").unwrap();
        assert_eq!(open.start, Duration::from_secs(30));
        assert!(open.end.is_none());
        assert!(open.length().is_none());
    }

    #[test]
    fn test_parse_npt_range_rejects_garbage() {
        assert_eq!(parse_npt_range("10.0-20.0").unwrap_err(), NptError::BadPrefix);
        assert!(parse_npt_range("npt=20-10").is_err());
        assert!(parse_npt_range("npt=abc").is_err());
    }
}
