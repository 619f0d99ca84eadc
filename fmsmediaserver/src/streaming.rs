//! Chemin de streaming : `/res`, `/subtitle`, `/icon`
//!
//! Trois régimes pour `/res` : fichier brut (avec plages d'octets),
//! transcodage statique (avec seek temporel DLNA), flux dynamique (commande
//! arbitraire, pas de seek). Le cycle de vie du transcodeur est lié au corps
//! de la réponse : lâcher le flux tue l'enfant.

use crate::device::MediaServer;
use crate::dynamic::{self, DynamicStream};
use crate::mime::{mime_type_by_path, MimeType};
use crate::objects::safe_join;
use crate::transcode::{self, Launcher, TRANSCODES};
use axum::body::Body;
use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, Method, StatusCode};
use axum::response::Response;
use fmsupnp::dlna::{self, ContentFeatures, NptRange};
use rand::Rng;
use std::collections::HashMap;
use std::io::SeekFrom;
use std::path::Path;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncSeekExt, ReadBuf};
use tokio::process::{Child, ChildStdout};
use tokio_util::io::ReaderStream;
use tracing::{debug, info, warn};

/// Réponse texte courte, pour les erreurs côté client.
fn plain(status: StatusCode, msg: &str) -> Response {
    Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, "text/plain; charset=utf-8")
        .body(Body::from(msg.to_string()))
        .expect("static response build cannot fail")
}

/// Corps d'un flux transcodé : la sortie du processus, et le processus
/// lui-même pour que sa destruction (kill_on_drop) suive celle du corps.
struct ChildReader {
    stdout: ChildStdout,
    _child: Child,
}

impl AsyncRead for ChildReader {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.get_mut().stdout).poll_read(cx, buf)
    }
}

/// GET|HEAD /res?path=…[&transcode=…][&index=…]
pub async fn res_handler(
    State(state): State<Arc<MediaServer>>,
    method: Method,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    let id = params.get("path").map(String::as_str).unwrap_or("");
    let file_path = safe_join(&state.config.root_object_path, id);
    if state.is_ignored(&file_path) {
        return plain(StatusCode::NOT_FOUND, "no such object");
    }

    if dynamic::is_dynamic_stream_path(&file_path) {
        if state.config.allow_dynamic_streams {
            return serve_dynamic_stream(&state, method, &headers, &file_path, &params).await;
        }
        return plain(StatusCode::NOT_FOUND, "dynamic streams are disabled");
    }

    let key = state
        .config
        .force_transcode_to
        .clone()
        .or_else(|| params.get("transcode").cloned())
        .unwrap_or_default();

    let mime = mime_type_by_path(&file_path);
    if key.is_empty() || mime.is_image() {
        return serve_raw(&method, &headers, &file_path, &mime).await;
    }
    if state.config.no_transcode {
        return plain(StatusCode::NOT_FOUND, "transcodes disabled");
    }
    let Some(spec) = TRANSCODES.get(key.as_str()) else {
        return plain(
            StatusCode::BAD_REQUEST,
            &format!("bad transcode spec key: {}", key),
        );
    };

    let input = file_path.to_string_lossy().into_owned();
    serve_dlna_transcode(
        &state,
        method,
        &headers,
        &input,
        spec.mime_type,
        spec.dlna_profile_name.map(str::to_string),
        spec.dlna_flags.map(str::to_string),
        spec.launcher,
        &key,
        false,
        Some(file_path.as_path()),
    )
    .await
}

/// Validateur fort d'un fichier servi brut.
fn file_etag(path: &Path, meta: &std::fs::Metadata, size: u64) -> String {
    let mtime_ns = meta
        .modified()
        .ok()
        .and_then(|m| m.duration_since(std::time::UNIX_EPOCH).ok())
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    use std::hash::{Hash, Hasher};
    path.hash(&mut hasher);
    mtime_ns.hash(&mut hasher);
    size.hash(&mut hasher);
    format!("\"{:016x}\"", hasher.finish())
}

/// Plage d'octets `bytes=a-b` / `bytes=a-` / `bytes=-n`, bornes incluses.
fn parse_byte_range(value: &str, size: u64) -> Option<(u64, u64)> {
    let spec = value.trim().strip_prefix("bytes=")?;
    let (start_s, end_s) = spec.split_once('-')?;
    if start_s.is_empty() {
        // Suffixe : les n derniers octets
        let n: u64 = end_s.trim().parse().ok()?;
        if n == 0 || size == 0 {
            return None;
        }
        return Some((size.saturating_sub(n), size - 1));
    }
    let start: u64 = start_s.trim().parse().ok()?;
    if start >= size {
        return None;
    }
    let end = if end_s.trim().is_empty() {
        size - 1
    } else {
        end_s.trim().parse::<u64>().ok()?.min(size - 1)
    };
    (start <= end).then_some((start, end))
}

/// Sert les octets du fichier lui-même, plages supportées.
async fn serve_raw(method: &Method, headers: &HeaderMap, path: &Path, mime: &MimeType) -> Response {
    let meta = match tokio::fs::metadata(path).await {
        Ok(m) if m.is_file() => m,
        _ => return plain(StatusCode::NOT_FOUND, "no such object"),
    };
    let size = meta.len();

    let range = headers
        .get(header::RANGE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| parse_byte_range(v, size));

    let basename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    // Validateur fort : (chemin, mtime, taille)
    let etag = file_etag(path, &meta, size);
    if let Some(candidate) = headers
        .get(header::IF_NONE_MATCH)
        .and_then(|v| v.to_str().ok())
    {
        if candidate == etag {
            return Response::builder()
                .status(StatusCode::NOT_MODIFIED)
                .header(header::ETAG, etag)
                .body(Body::empty())
                .expect("response build cannot fail");
        }
    }

    let mut builder = Response::builder()
        .header(header::CONTENT_TYPE, mime.as_str())
        .header(header::ACCEPT_RANGES, "bytes")
        .header(header::ETAG, etag)
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename={:?}", basename),
        );
    if let Ok(modified) = meta.modified() {
        let datetime: chrono::DateTime<chrono::Utc> = modified.into();
        builder = builder.header(
            header::LAST_MODIFIED,
            datetime.format("%a, %d %b %Y %H:%M:%S GMT").to_string(),
        );
    }

    let (status, start, len) = match range {
        Some((start, end)) => {
            builder = builder.header(
                header::CONTENT_RANGE,
                format!("bytes {}-{}/{}", start, end, size),
            );
            (StatusCode::PARTIAL_CONTENT, start, end - start + 1)
        }
        None => (StatusCode::OK, 0, size),
    };
    builder = builder
        .status(status)
        .header(header::CONTENT_LENGTH, len.to_string());

    if *method == Method::HEAD {
        return builder
            .body(Body::empty())
            .expect("response build cannot fail");
    }

    let mut file = match tokio::fs::File::open(path).await {
        Ok(f) => f,
        Err(e) => return plain(StatusCode::NOT_FOUND, &e.to_string()),
    };
    if start > 0 {
        if let Err(e) = file.seek(SeekFrom::Start(start)).await {
            return plain(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string());
        }
    }
    let limited = tokio::io::AsyncReadExt::take(file, len);
    builder
        .body(Body::from_stream(ReaderStream::new(limited)))
        .expect("response build cannot fail")
}

/// Interprète `TimeSeekRange.dlna.org` et fixe l'écho d'en-tête.
///
/// Retourne la plage et le code de réponse à utiliser, ou la réponse
/// d'erreur à renvoyer telle quelle.
fn handle_dlna_range(
    headers: &HeaderMap,
    dynamic_mode: bool,
) -> Result<(Option<NptRange>, StatusCode, Option<String>), Response> {
    if dynamic_mode {
        return Ok((None, StatusCode::OK, None));
    }
    let Some(raw) = headers
        .get(dlna::TIME_SEEK_RANGE_HEADER)
        .and_then(|v| v.to_str().ok())
    else {
        return Ok((None, StatusCode::OK, None));
    };
    let range = dlna::parse_npt_range(raw)
        .map_err(|e| plain(StatusCode::BAD_REQUEST, &e.to_string()))?;
    // Écho avec durée totale inconnue : un total exact déclenche des calculs
    // faux chez certains clients.
    Ok((
        Some(range),
        StatusCode::PARTIAL_CONTENT,
        Some(format!("{}/*", raw)),
    ))
}

/// Sert un flux transcodé avec les en-têtes DLNA attendus.
#[allow(clippy::too_many_arguments)]
async fn serve_dlna_transcode(
    state: &Arc<MediaServer>,
    method: Method,
    headers: &HeaderMap,
    input: &str,
    mime_type: &str,
    profile_name: Option<String>,
    flags: Option<String>,
    launcher: Launcher,
    tsname: &str,
    dynamic_mode: bool,
    probe_path: Option<&Path>,
) -> Response {
    let features = ContentFeatures {
        profile_name: profile_name.clone(),
        support_time_seek: !dynamic_mode,
        transcoded: true,
        flags: flags.clone(),
        ..Default::default()
    };

    let mut builder = Response::builder()
        .header(header::CONTENT_TYPE, mime_type)
        .header(dlna::TRANSFER_MODE_HEADER, "Streaming")
        .header(dlna::CONTENT_FEATURES_HEADER, features.to_string());

    let (range, status, echo) = match handle_dlna_range(headers, dynamic_mode) {
        Ok(parts) => parts,
        Err(response) => return response,
    };
    if let Some(echo) = echo {
        builder = builder.header(dlna::TIME_SEEK_RANGE_HEADER, echo);
    }
    builder = builder.status(status);

    // Les TV Samsung Frame sondent en HEAD ; lancer le transcodeur ici les
    // fait bufferiser sans fin. On s'arrête aux en-têtes.
    if method == Method::HEAD {
        return builder
            .body(Body::empty())
            .expect("response build cannot fail");
    }

    let log_ts_name = if dynamic_mode {
        tsname.to_string()
    } else {
        if let Some(path) = probe_path {
            if let Some(info) = state.prober.probe(path).await {
                if let Some(duration) = info.duration() {
                    let secs = format!("{:.6}", duration.as_secs_f64());
                    builder = builder
                        .header("content-duration", &secs)
                        .header("x-content-duration", &secs);
                }
            }
        }
        let base = Path::new(input)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        format!("{}/{}", tsname, base)
    };

    let stderr = open_transcode_log(state, &log_ts_name);
    let (start, length) = match range {
        Some(r) => (r.start, r.length()),
        None => (Duration::ZERO, None),
    };
    let stream = match transcode::launch(launcher, input, start, length, stderr) {
        Ok(stream) => stream,
        Err(e) => {
            warn!("transcoder launch failed for {}: {}", tsname, e);
            return plain(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string());
        }
    };

    let reader = ChildReader {
        stdout: stream.stdout,
        _child: stream.child,
    };
    builder
        .body(Body::from_stream(ReaderStream::new(reader)))
        .expect("response build cannot fail")
}

/// Ouvre le fichier de log du transcodeur ; tout échec est non fatal.
fn open_transcode_log(state: &Arc<MediaServer>, ts_name: &str) -> Option<std::fs::File> {
    let pattern = state.config.effective_transcode_log_pattern();
    if pattern.is_empty() {
        return None;
    }
    let path = pattern.replace("[tsname]", ts_name);
    if let Some(parent) = Path::new(&path).parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    match std::fs::File::create(&path) {
        Ok(file) => {
            info!("logging transcode to {:?}", path);
            Some(file)
        }
        Err(e) => {
            warn!("couldn't create transcode log file {:?}: {}", path, e);
            None
        }
    }
}

/// Sert un flux dynamique : la ressource d'index demandé du descripteur.
async fn serve_dynamic_stream(
    state: &Arc<MediaServer>,
    method: Method,
    headers: &HeaderMap,
    metadata_path: &Path,
    params: &HashMap<String, String>,
) -> Response {
    let descriptor = match DynamicStream::read(metadata_path).await {
        Ok(d) => d,
        Err(e) => return plain(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()),
    };
    let index: usize = match params.get("index").map(String::as_str).unwrap_or("0").parse() {
        Ok(i) => i,
        Err(_) => return plain(StatusCode::BAD_REQUEST, "bad stream index"),
    };
    let Some(resource) = descriptor.resources.get(index) else {
        return plain(
            StatusCode::BAD_REQUEST,
            &format!("invalid index {}, corresponding stream not found", index),
        );
    };
    let tsname = metadata_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    serve_dlna_transcode(
        state,
        method,
        headers,
        &resource.command,
        &resource.mime_type,
        Some(resource.dlna_profile_name.clone()).filter(|s| !s.is_empty()),
        Some(resource.dlna_flags.clone()).filter(|s| !s.is_empty()),
        Launcher::Exec,
        &tsname,
        true,
        None,
    )
    .await
}

/// GET /subtitle?path=… : le `.srt` jumeau du média.
pub async fn subtitle_handler(
    State(state): State<Arc<MediaServer>>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let id = params.get("path").map(String::as_str).unwrap_or("");
    let file_path = safe_join(&state.config.root_object_path, id);
    let srt_path = file_path.with_extension("srt");
    match tokio::fs::read(&srt_path).await {
        Ok(bytes) => Response::builder()
            .header(header::CONTENT_TYPE, "text/srt")
            .body(Body::from(bytes))
            .expect("response build cannot fail"),
        Err(_) => plain(StatusCode::NOT_FOUND, "no such subtitle"),
    }
}

/// GET /icon?path=…&c=png|jpg : vignette d'un item, via le générateur
/// externe ; l'icône du device en secours, jamais de 500.
pub async fn icon_handler(
    State(state): State<Arc<MediaServer>>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let id = params.get("path").map(String::as_str).unwrap_or("");
    let file_path = safe_join(&state.config.root_object_path, id);
    let format = match params.get("c").map(String::as_str) {
        Some("jpg") => "jpg",
        _ => "png",
    };

    let mut cmd = tokio::process::Command::new("ffmpegthumbnailer");
    if std::env::var_os("DMS_THUMBNAIL_FULLQUALITY").is_some() {
        cmd.args(["-s", "0", "-q", "10"]);
    }
    if std::env::var_os("DMS_THUMBNAIL_RANDOM").is_some() {
        let t = rand::rng().random_range(0..100);
        cmd.arg("-t").arg(t.to_string());
    }
    cmd.arg("-i")
        .arg(&file_path)
        .arg("-o")
        .arg("/dev/stdout")
        .arg("-c")
        .arg(format);

    match cmd.output().await {
        Ok(output) if output.status.success() && !output.stdout.is_empty() => {
            Response::builder()
                .header(header::CONTENT_TYPE, format!("image/{}", format))
                .body(Body::from(output.stdout))
                .expect("response build cannot fail")
        }
        _ => {
            debug!("thumbnailer failed for {:?}, serving device icon", file_path);
            let icon = &state.icons[0];
            Response::builder()
                .header(header::CONTENT_TYPE, icon.mimetype.clone())
                .body(Body::from(icon.bytes.clone()))
                .expect("response build cannot fail")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_byte_range_forms() {
        assert_eq!(parse_byte_range("bytes=0-499", 1000), Some((0, 499)));
        assert_eq!(parse_byte_range("bytes=500-", 1000), Some((500, 999)));
        assert_eq!(parse_byte_range("bytes=-200", 1000), Some((800, 999)));
        assert_eq!(parse_byte_range("bytes=0-9999", 1000), Some((0, 999)));
    }

    #[test]
    fn test_parse_byte_range_rejects_bad_input() {
        assert_eq!(parse_byte_range("bytes=1000-", 1000), None);
        assert_eq!(parse_byte_range("bytes=5-2", 1000), None);
        assert_eq!(parse_byte_range("items=0-1", 1000), None);
        assert_eq!(parse_byte_range("bytes=", 1000), None);
    }

    #[test]
    fn test_handle_dlna_range_echoes_with_unknown_total() {
        let mut headers = HeaderMap::new();
        headers.insert(
            dlna::TIME_SEEK_RANGE_HEADER,
            "npt=10.0-20.0".parse().unwrap(),
        );
        let (range, status, echo) = handle_dlna_range(&headers, false).unwrap();
        let range = range.unwrap();
        assert_eq!(range.start, Duration::from_secs(10));
        assert_eq!(range.length(), Some(Duration::from_secs(10)));
        assert_eq!(status, StatusCode::PARTIAL_CONTENT);
        assert_eq!(echo.as_deref(), Some("npt=10.0-20.0/*"));
    }

    #[test]
    fn test_handle_dlna_range_ignored_in_dynamic_mode() {
        let mut headers = HeaderMap::new();
        headers.insert(
            dlna::TIME_SEEK_RANGE_HEADER,
            "npt=10.0-20.0".parse().unwrap(),
        );
        let (range, status, echo) = handle_dlna_range(&headers, true).unwrap();
        assert!(range.is_none());
        assert_eq!(status, StatusCode::OK);
        assert!(echo.is_none());
    }

    #[test]
    fn test_handle_dlna_range_malformed_is_bad_request() {
        let mut headers = HeaderMap::new();
        headers.insert(dlna::TIME_SEEK_RANGE_HEADER, "seconds=10-20".parse().unwrap());
        let err = handle_dlna_range(&headers, false).unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_no_header_is_full_response() {
        let headers = HeaderMap::new();
        let (range, status, echo) = handle_dlna_range(&headers, false).unwrap();
        assert!(range.is_none());
        assert_eq!(status, StatusCode::OK);
        assert!(echo.is_none());
    }
}
