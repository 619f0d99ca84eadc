//! Service ConnectionManager:1
//!
//! Le minimum attendu par les renderers : l'annonce des protocolInfo source
//! et des valeurs de connexion fictives pour l'unique connexion "0".

use crate::transcode::TRANSCODES;
use fmsupnp::dlna::ContentFeatures;
use fmsupnp::soap::SoapAction;
use fmsupnp::UpnpError;

/// Union des protocolInfo annoncés : chaque transcodage plus la lecture
/// directe générique.
pub fn source_protocol_info() -> String {
    let mut protocols: Vec<String> = TRANSCODES
        .values()
        .map(|spec| {
            let features = ContentFeatures {
                profile_name: spec.dlna_profile_name.map(str::to_string),
                support_time_seek: true,
                transcoded: true,
                flags: spec.dlna_flags.map(str::to_string),
                ..Default::default()
            };
            format!("http-get:*:{}:{}", spec.mime_type, features)
        })
        .collect();
    protocols.push("http-get:*:*:*".to_string());
    protocols.dedup();
    protocols.join(",")
}

/// Traite une action ConnectionManager.
pub fn handle(
    action_name: &str,
    _action: &SoapAction,
) -> Result<Vec<(String, String)>, UpnpError> {
    match action_name {
        "GetProtocolInfo" => Ok(vec![
            ("Source".to_string(), source_protocol_info()),
            ("Sink".to_string(), String::new()),
        ]),
        "GetCurrentConnectionIDs" => {
            Ok(vec![("ConnectionIDs".to_string(), "0".to_string())])
        }
        "GetCurrentConnectionInfo" => Ok(vec![
            ("RcsID".to_string(), "-1".to_string()),
            ("AVTransportID".to_string(), "-1".to_string()),
            ("ProtocolInfo".to_string(), String::new()),
            ("PeerConnectionManager".to_string(), String::new()),
            ("PeerConnectionID".to_string(), "-1".to_string()),
            ("Direction".to_string(), "Output".to_string()),
            ("Status".to_string(), "OK".to_string()),
        ]),
        other => Err(UpnpError::invalid_action(format!(
            "Unknown ConnectionManager action: {}",
            other
        ))),
    }
}

/// SCPD du service ConnectionManager:1
pub const SCPD: &str = r#"<?xml version="1.0"?>
<scpd xmlns="urn:schemas-upnp-org:service-1-0">
  <specVersion><major>1</major><minor>0</minor></specVersion>
  <actionList>
    <action>
      <name>GetProtocolInfo</name>
      <argumentList>
        <argument><name>Source</name><direction>out</direction><relatedStateVariable>SourceProtocolInfo</relatedStateVariable></argument>
        <argument><name>Sink</name><direction>out</direction><relatedStateVariable>SinkProtocolInfo</relatedStateVariable></argument>
      </argumentList>
    </action>
    <action>
      <name>GetCurrentConnectionIDs</name>
      <argumentList>
        <argument><name>ConnectionIDs</name><direction>out</direction><relatedStateVariable>CurrentConnectionIDs</relatedStateVariable></argument>
      </argumentList>
    </action>
    <action>
      <name>GetCurrentConnectionInfo</name>
      <argumentList>
        <argument><name>ConnectionID</name><direction>in</direction><relatedStateVariable>A_ARG_TYPE_ConnectionID</relatedStateVariable></argument>
        <argument><name>RcsID</name><direction>out</direction><relatedStateVariable>A_ARG_TYPE_RcsID</relatedStateVariable></argument>
        <argument><name>AVTransportID</name><direction>out</direction><relatedStateVariable>A_ARG_TYPE_AVTransportID</relatedStateVariable></argument>
        <argument><name>ProtocolInfo</name><direction>out</direction><relatedStateVariable>A_ARG_TYPE_ProtocolInfo</relatedStateVariable></argument>
        <argument><name>PeerConnectionManager</name><direction>out</direction><relatedStateVariable>A_ARG_TYPE_ConnectionManager</relatedStateVariable></argument>
        <argument><name>PeerConnectionID</name><direction>out</direction><relatedStateVariable>A_ARG_TYPE_ConnectionID</relatedStateVariable></argument>
        <argument><name>Direction</name><direction>out</direction><relatedStateVariable>A_ARG_TYPE_Direction</relatedStateVariable></argument>
        <argument><name>Status</name><direction>out</direction><relatedStateVariable>A_ARG_TYPE_ConnectionStatus</relatedStateVariable></argument>
      </argumentList>
    </action>
  </actionList>
  <serviceStateTable>
    <stateVariable sendEvents="yes"><name>SourceProtocolInfo</name><dataType>string</dataType></stateVariable>
    <stateVariable sendEvents="yes"><name>SinkProtocolInfo</name><dataType>string</dataType></stateVariable>
    <stateVariable sendEvents="yes"><name>CurrentConnectionIDs</name><dataType>string</dataType></stateVariable>
    <stateVariable sendEvents="no"><name>A_ARG_TYPE_ConnectionStatus</name><dataType>string</dataType>
      <allowedValueList><allowedValue>OK</allowedValue><allowedValue>Unknown</allowedValue></allowedValueList>
    </stateVariable>
    <stateVariable sendEvents="no"><name>A_ARG_TYPE_ConnectionManager</name><dataType>string</dataType></stateVariable>
    <stateVariable sendEvents="no"><name>A_ARG_TYPE_Direction</name><dataType>string</dataType>
      <allowedValueList><allowedValue>Input</allowedValue><allowedValue>Output</allowedValue></allowedValueList>
    </stateVariable>
    <stateVariable sendEvents="no"><name>A_ARG_TYPE_ProtocolInfo</name><dataType>string</dataType></stateVariable>
    <stateVariable sendEvents="no"><name>A_ARG_TYPE_ConnectionID</name><dataType>i4</dataType></stateVariable>
    <stateVariable sendEvents="no"><name>A_ARG_TYPE_AVTransportID</name><dataType>i4</dataType></stateVariable>
    <stateVariable sendEvents="no"><name>A_ARG_TYPE_RcsID</name><dataType>i4</dataType></stateVariable>
  </serviceStateTable>
</scpd>
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use fmsupnp::soap::parse_soap_action;

    fn action(name: &str) -> SoapAction {
        let xml = format!(
            r#"<?xml version="1.0"?><s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/"><s:Body><u:{} xmlns:u="urn:schemas-upnp-org:service:ConnectionManager:1"/></s:Body></s:Envelope>"#,
            name
        );
        parse_soap_action(xml.as_bytes()).unwrap()
    }

    #[test]
    fn test_get_protocol_info() {
        let args = handle("GetProtocolInfo", &action("GetProtocolInfo")).unwrap();
        let source = &args.iter().find(|(k, _)| k == "Source").unwrap().1;
        assert!(source.contains("http-get:*:video/mpeg:"));
        assert!(source.contains("http-get:*:video/webm:"));
        assert!(source.ends_with("http-get:*:*:*"));
    }

    #[test]
    fn test_connection_ids() {
        let args = handle("GetCurrentConnectionIDs", &action("GetCurrentConnectionIDs")).unwrap();
        assert_eq!(args, vec![("ConnectionIDs".to_string(), "0".to_string())]);
    }

    #[test]
    fn test_unknown_action_is_401() {
        let err = handle("SetWhatever", &action("SetWhatever")).unwrap_err();
        assert_eq!(err.code, 401);
    }
}
