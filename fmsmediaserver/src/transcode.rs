//! Spécifications de transcodage et lancement des transcodeurs
//!
//! L'ensemble des transcodages est fixe pour la durée du processus. Chaque
//! entrée décrit un conteneur cible et la façon de lancer le collaborateur
//! externe qui l'écrit sur stdout.

use once_cell::sync::Lazy;
use std::collections::BTreeMap;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::{Child, ChildStdout, Command};

/// Façon de lancer le transcodeur
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Launcher {
    /// ffmpeg vers MPEG-PS (profil DLNA historique)
    MpegPs,
    /// ffmpeg vers WebM/VP8
    Vp8,
    /// ffmpeg vers MP4 fragmenté, profil Chromecast
    Chromecast,
    /// ffmpeg vers MP4 fragmenté, lecture navigateur
    Web,
    /// Commande arbitraire via `sh -c` (flux dynamiques)
    Exec,
}

/// Spécification d'un transcodage exposé par le serveur
#[derive(Debug, Clone)]
pub struct TranscodeSpec {
    pub mime_type: &'static str,
    pub dlna_profile_name: Option<&'static str>,
    pub dlna_flags: Option<&'static str>,
    pub launcher: Launcher,
}

/// Table des transcodages statiques, clé = paramètre `transcode` des URLs.
pub static TRANSCODES: Lazy<BTreeMap<&'static str, TranscodeSpec>> = Lazy::new(|| {
    BTreeMap::from([
        (
            "t",
            TranscodeSpec {
                mime_type: "video/mpeg",
                dlna_profile_name: Some("MPEG_PS_PAL"),
                dlna_flags: None,
                launcher: Launcher::MpegPs,
            },
        ),
        (
            "vp8",
            TranscodeSpec {
                mime_type: "video/webm",
                dlna_profile_name: None,
                dlna_flags: None,
                launcher: Launcher::Vp8,
            },
        ),
        (
            "chromecast",
            TranscodeSpec {
                mime_type: "video/mp4",
                dlna_profile_name: None,
                dlna_flags: None,
                launcher: Launcher::Chromecast,
            },
        ),
        (
            "web",
            TranscodeSpec {
                mime_type: "video/mp4",
                dlna_profile_name: None,
                dlna_flags: None,
                launcher: Launcher::Web,
            },
        ),
    ])
});

/// Flux de transcodage en cours : la sortie du processus et le processus.
///
/// Le `Child` est armé `kill_on_drop` : lâcher ce flux (fin de réponse,
/// déconnexion du client) termine le transcodeur.
pub struct TranscodeStream {
    pub stdout: ChildStdout,
    pub child: Child,
}

fn seconds_arg(d: Duration) -> String {
    format!("{:.3}", d.as_secs_f64())
}

/// Lance un transcodeur statique sur `input`.
///
/// `start` décale le point d'entrée, `length` borne la durée produite ;
/// `stderr` reçoit le journal du collaborateur.
pub fn launch(
    launcher: Launcher,
    input: &str,
    start: Duration,
    length: Option<Duration>,
    stderr: Option<std::fs::File>,
) -> std::io::Result<TranscodeStream> {
    let mut cmd = match launcher {
        Launcher::Exec => {
            let mut cmd = Command::new("sh");
            cmd.arg("-c").arg(input);
            cmd
        }
        _ => {
            let mut cmd = Command::new("ffmpeg");
            if start > Duration::ZERO {
                cmd.arg("-ss").arg(seconds_arg(start));
            }
            if let Some(length) = length.filter(|l| *l > Duration::ZERO) {
                cmd.arg("-t").arg(seconds_arg(length));
            }
            cmd.arg("-async").arg("1").arg("-i").arg(input);
            match launcher {
                Launcher::MpegPs => {
                    cmd.args([
                        "-c:v", "mpeg2video", "-qscale:v", "2", "-c:a", "mp2", "-b:a", "256k",
                        "-f", "mpeg",
                    ]);
                }
                Launcher::Vp8 => {
                    cmd.args([
                        "-c:v", "libvpx", "-crf", "10", "-b:v", "2M", "-c:a", "libvorbis", "-f",
                        "webm",
                    ]);
                }
                Launcher::Chromecast => {
                    cmd.args([
                        "-c:v", "libx264", "-preset", "ultrafast", "-c:a", "aac", "-movflags",
                        "frag_keyframe+empty_moov", "-f", "mp4",
                    ]);
                }
                Launcher::Web => {
                    cmd.args([
                        "-c:v", "libx264", "-preset", "ultrafast", "-profile:v", "baseline",
                        "-c:a", "aac", "-movflags", "frag_keyframe+empty_moov", "-f", "mp4",
                    ]);
                }
                Launcher::Exec => unreachable!(),
            }
            cmd.arg("pipe:1");
            cmd
        }
    };

    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(match stderr {
            Some(file) => Stdio::from(file),
            None => Stdio::null(),
        })
        .kill_on_drop(true);

    let mut child = cmd.spawn()?;
    let stdout = child
        .stdout
        .take()
        .expect("stdout was requested piped at spawn");
    Ok(TranscodeStream { stdout, child })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transcode_table_keys() {
        let keys: Vec<&str> = TRANSCODES.keys().copied().collect();
        assert_eq!(keys, vec!["chromecast", "t", "vp8", "web"]);
        assert_eq!(TRANSCODES["t"].mime_type, "video/mpeg");
        assert_eq!(TRANSCODES["t"].dlna_profile_name, Some("MPEG_PS_PAL"));
        assert_eq!(TRANSCODES["vp8"].mime_type, "video/webm");
    }

    #[test]
    fn test_seconds_arg_formatting() {
        assert_eq!(seconds_arg(Duration::from_secs(10)), "10.000");
        assert_eq!(seconds_arg(Duration::from_millis(1500)), "1.500");
    }
}
