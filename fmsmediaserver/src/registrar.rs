//! Service X_MS_MediaReceiverRegistrar:1
//!
//! Stub Microsoft exigé par les clients Samsung et Xbox : tout le monde est
//! autorisé et validé, rien n'est enregistré.

use fmsupnp::soap::SoapAction;
use fmsupnp::UpnpError;

/// Traite une action MediaReceiverRegistrar.
pub fn handle(
    action_name: &str,
    _action: &SoapAction,
) -> Result<Vec<(String, String)>, UpnpError> {
    match action_name {
        "IsAuthorized" | "IsValidated" => {
            Ok(vec![("Result".to_string(), "1".to_string())])
        }
        "RegisterDevice" => Ok(vec![("RegistrationRespMsg".to_string(), String::new())]),
        other => Err(UpnpError::invalid_action(format!(
            "Unknown X_MS_MediaReceiverRegistrar action: {}",
            other
        ))),
    }
}

/// SCPD du service X_MS_MediaReceiverRegistrar:1
pub const SCPD: &str = r#"<?xml version="1.0"?>
<scpd xmlns="urn:schemas-upnp-org:service-1-0">
  <specVersion><major>1</major><minor>0</minor></specVersion>
  <actionList>
    <action>
      <name>IsAuthorized</name>
      <argumentList>
        <argument><name>DeviceID</name><direction>in</direction><relatedStateVariable>A_ARG_TYPE_DeviceID</relatedStateVariable></argument>
        <argument><name>Result</name><direction>out</direction><relatedStateVariable>A_ARG_TYPE_Result</relatedStateVariable></argument>
      </argumentList>
    </action>
    <action>
      <name>IsValidated</name>
      <argumentList>
        <argument><name>DeviceID</name><direction>in</direction><relatedStateVariable>A_ARG_TYPE_DeviceID</relatedStateVariable></argument>
        <argument><name>Result</name><direction>out</direction><relatedStateVariable>A_ARG_TYPE_Result</relatedStateVariable></argument>
      </argumentList>
    </action>
    <action>
      <name>RegisterDevice</name>
      <argumentList>
        <argument><name>RegistrationReqMsg</name><direction>in</direction><relatedStateVariable>A_ARG_TYPE_RegistrationReqMsg</relatedStateVariable></argument>
        <argument><name>RegistrationRespMsg</name><direction>out</direction><relatedStateVariable>A_ARG_TYPE_RegistrationRespMsg</relatedStateVariable></argument>
      </argumentList>
    </action>
  </actionList>
  <serviceStateTable>
    <stateVariable sendEvents="no"><name>A_ARG_TYPE_DeviceID</name><dataType>string</dataType></stateVariable>
    <stateVariable sendEvents="no"><name>A_ARG_TYPE_Result</name><dataType>int</dataType></stateVariable>
    <stateVariable sendEvents="no"><name>A_ARG_TYPE_RegistrationReqMsg</name><dataType>bin.base64</dataType></stateVariable>
    <stateVariable sendEvents="no"><name>A_ARG_TYPE_RegistrationRespMsg</name><dataType>bin.base64</dataType></stateVariable>
    <stateVariable sendEvents="yes"><name>AuthorizationGrantedUpdateID</name><dataType>ui4</dataType></stateVariable>
    <stateVariable sendEvents="yes"><name>AuthorizationDeniedUpdateID</name><dataType>ui4</dataType></stateVariable>
    <stateVariable sendEvents="yes"><name>ValidationSucceededUpdateID</name><dataType>ui4</dataType></stateVariable>
    <stateVariable sendEvents="yes"><name>ValidationRevokedUpdateID</name><dataType>ui4</dataType></stateVariable>
  </serviceStateTable>
</scpd>
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use fmsupnp::soap::parse_soap_action;

    fn action() -> SoapAction {
        let xml = r#"<?xml version="1.0"?><s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/"><s:Body><u:IsAuthorized xmlns:u="urn:microsoft.com:service:X_MS_MediaReceiverRegistrar:1"><DeviceID/></u:IsAuthorized></s:Body></s:Envelope>"#;
        parse_soap_action(xml.as_bytes()).unwrap()
    }

    #[test]
    fn test_everyone_is_authorized_and_validated() {
        for name in ["IsAuthorized", "IsValidated"] {
            let args = handle(name, &action()).unwrap();
            assert_eq!(args, vec![("Result".to_string(), "1".to_string())]);
        }
    }

    #[test]
    fn test_register_device_returns_empty_response() {
        let args = handle("RegisterDevice", &action()).unwrap();
        assert_eq!(args[0].0, "RegistrationRespMsg");
    }
}
