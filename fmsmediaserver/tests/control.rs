//! Tests d'intégration du plan de contrôle : dispatch SOAP de bout en bout

use fmsmediaserver::services::{dispatch, ActionContext};
use fmsmediaserver::{MediaServer, MediaServerConfig};
use fmsupnp::soap::{self, parse_soapaction_header};
use std::sync::Arc;
use tempfile::TempDir;

const CDS_URN: &str = "urn:schemas-upnp-org:service:ContentDirectory:1";

fn fixture() -> (TempDir, Arc<MediaServer>) {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("a.mp4"), vec![0u8; 1000]).unwrap();
    std::fs::write(dir.path().join("b.mp4"), vec![0u8; 500]).unwrap();
    std::fs::write(dir.path().join("notes.txt"), b"hello").unwrap();

    let config = MediaServerConfig {
        root_object_path: dir.path().to_path_buf(),
        friendly_name: "FSMedia test".to_string(),
        no_probe: true,
        ..Default::default()
    };
    (dir, Arc::new(MediaServer::new(config).unwrap()))
}

fn browse_envelope(object_id: &str, flag: &str, start: u32, count: u32) -> String {
    format!(
        r#"<?xml version="1.0"?>
<s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/">
  <s:Body>
    <u:Browse xmlns:u="{CDS_URN}">
      <ObjectID>{object_id}</ObjectID>
      <BrowseFlag>{flag}</BrowseFlag>
      <Filter>*</Filter>
      <StartingIndex>{start}</StartingIndex>
      <RequestedCount>{count}</RequestedCount>
      <SortCriteria></SortCriteria>
    </u:Browse>
  </s:Body>
</s:Envelope>"#
    )
}

async fn call(
    server: &Arc<MediaServer>,
    action_header: &str,
    body: &str,
) -> Result<Vec<(String, String)>, fmsupnp::UpnpError> {
    let header = parse_soapaction_header(action_header).unwrap();
    let action = soap::parse_soap_action(body.as_bytes()).unwrap();
    let ctx = ActionContext {
        state: server,
        host: "10.0.0.1:1338",
        user_agent: "test-renderer",
    };
    dispatch(&ctx, &header, &action).await
}

fn arg<'a>(args: &'a [(String, String)], name: &str) -> &'a str {
    &args.iter().find(|(k, _)| k == name).unwrap().1
}

#[tokio::test]
async fn test_browse_root_direct_children() {
    let (_dir, server) = fixture();
    let args = call(
        &server,
        &format!("\"{}#Browse\"", CDS_URN),
        &browse_envelope("0", "BrowseDirectChildren", 0, 0),
    )
    .await
    .unwrap();

    assert_eq!(arg(&args, "NumberReturned"), "3");
    assert_eq!(arg(&args, "TotalMatches"), "3");
    assert_eq!(arg(&args, "UpdateID"), "0");

    let didl = arg(&args, "Result");
    assert!(didl.contains(r#"id="/a.mp4""#));
    assert!(didl.contains(r#"parentID="0""#));
    assert!(didl.contains("object.item.videoItem"));
    assert!(didl.contains("/res?path=%2Fa.mp4"));
    // Le DIDL doit rester du XML bien formé
    assert!(xmltree::Element::parse(didl.as_bytes()).is_ok());
}

#[tokio::test]
async fn test_browse_paging_boundaries() {
    let (_dir, server) = fixture();

    // Fenêtre au-delà du total : page vide, total exact
    let args = call(
        &server,
        &format!("\"{}#Browse\"", CDS_URN),
        &browse_envelope("0", "BrowseDirectChildren", 10, 5),
    )
    .await
    .unwrap();
    assert_eq!(arg(&args, "NumberReturned"), "0");
    assert_eq!(arg(&args, "TotalMatches"), "3");

    // Fenêtre partielle
    let args = call(
        &server,
        &format!("\"{}#Browse\"", CDS_URN),
        &browse_envelope("0", "BrowseDirectChildren", 1, 1),
    )
    .await
    .unwrap();
    assert_eq!(arg(&args, "NumberReturned"), "1");
    assert_eq!(arg(&args, "TotalMatches"), "3");
}

#[tokio::test]
async fn test_search_audio_items_matches_nothing_here() {
    let (_dir, server) = fixture();
    let body = format!(
        r#"<?xml version="1.0"?>
<s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/">
  <s:Body>
    <u:Search xmlns:u="{CDS_URN}">
      <ContainerID>0</ContainerID>
      <SearchCriteria>upnp:class derivedfrom "object.item.audioItem"</SearchCriteria>
      <Filter>*</Filter>
      <StartingIndex>0</StartingIndex>
      <RequestedCount>0</RequestedCount>
      <SortCriteria></SortCriteria>
    </u:Search>
  </s:Body>
</s:Envelope>"#
    );
    let args = call(&server, &format!("\"{}#Search\"", CDS_URN), &body)
        .await
        .unwrap();
    assert_eq!(arg(&args, "NumberReturned"), "0");

    let body = body.replace("audioItem", "videoItem");
    let args = call(&server, &format!("\"{}#Search\"", CDS_URN), &body)
        .await
        .unwrap();
    assert_eq!(arg(&args, "NumberReturned"), "2");
}

#[tokio::test]
async fn test_capability_actions() {
    let (_dir, server) = fixture();
    let envelope = |action: &str| {
        format!(
            r#"<?xml version="1.0"?><s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/"><s:Body><u:{action} xmlns:u="{CDS_URN}"/></s:Body></s:Envelope>"#
        )
    };

    let args = call(
        &server,
        &format!("\"{}#GetSystemUpdateID\"", CDS_URN),
        &envelope("GetSystemUpdateID"),
    )
    .await
    .unwrap();
    assert_eq!(args, vec![("Id".to_string(), "0".to_string())]);

    let args = call(
        &server,
        &format!("\"{}#GetSortCapabilities\"", CDS_URN),
        &envelope("GetSortCapabilities"),
    )
    .await
    .unwrap();
    assert_eq!(arg(&args, "SortCaps"), "dc:title");

    let args = call(
        &server,
        &format!("\"{}#X_GetFeatureList\"", CDS_URN),
        &envelope("X_GetFeatureList"),
    )
    .await
    .unwrap();
    assert!(arg(&args, "FeatureList").contains("<Features"));
}

#[tokio::test]
async fn test_unknown_action_is_upnp_401() {
    let (_dir, server) = fixture();
    let body = format!(
        r#"<?xml version="1.0"?><s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/"><s:Body><u:CreateObject xmlns:u="{CDS_URN}"/></s:Body></s:Envelope>"#
    );
    let err = call(&server, &format!("\"{}#CreateObject\"", CDS_URN), &body)
        .await
        .unwrap_err();
    assert_eq!(err.code, 401);
}

#[tokio::test]
async fn test_unknown_service_is_upnp_401() {
    let (_dir, server) = fixture();
    let body = format!(
        r#"<?xml version="1.0"?><s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/"><s:Body><u:Play xmlns:u="urn:schemas-upnp-org:service:AVTransport:1"/></s:Body></s:Envelope>"#
    );
    let err = call(
        &server,
        "\"urn:schemas-upnp-org:service:AVTransport:1#Play\"",
        &body,
    )
    .await
    .unwrap_err();
    assert_eq!(err.code, 401);
}

#[tokio::test]
async fn test_control_response_has_no_encoded_quotes() {
    let (_dir, server) = fixture();
    let args = call(
        &server,
        &format!("\"{}#Browse\"", CDS_URN),
        &browse_envelope("0", "BrowseDirectChildren", 0, 0),
    )
    .await
    .unwrap();

    let envelope = fmsupnp::soap::build_soap_response(CDS_URN, "Browse", &args);
    // Compat Samsung Frame : jamais de guillemet encodé numériquement
    assert!(!envelope.contains("&#34;"));
    assert!(envelope.contains("<u:BrowseResponse"));
    assert!(envelope.contains("NumberReturned"));
}
