//! Parser SOAP pour actions UPnP

use std::collections::HashMap;
use std::io::BufReader;
use xmltree::Element;

/// Action UPnP extraite d'une enveloppe SOAP
#[derive(Debug, Clone)]
pub struct SoapAction {
    /// Nom de l'action (ex: "Browse")
    pub name: String,

    /// Namespace de l'action (URN du service)
    pub namespace: Option<String>,

    /// Arguments de l'action
    pub args: HashMap<String, String>,
}

impl SoapAction {
    /// Argument obligatoire, chaîne vide si absent.
    pub fn arg(&self, name: &str) -> &str {
        self.args.get(name).map(String::as_str).unwrap_or("")
    }

    /// Argument numérique, `default` si absent ou non parsable.
    pub fn arg_u32(&self, name: &str, default: u32) -> u32 {
        self.args
            .get(name)
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(default)
    }
}

/// En-tête HTTP `SOAPACTION`, `"<serviceURN>#<action>"` entre guillemets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SoapActionHeader {
    pub service_urn: String,
    pub action: String,
}

impl SoapActionHeader {
    /// Type de service extrait de l'URN, ex: "ContentDirectory" pour
    /// `urn:schemas-upnp-org:service:ContentDirectory:1`.
    pub fn service_type(&self) -> &str {
        self.service_urn
            .rsplit(':')
            .nth(1)
            .unwrap_or(&self.service_urn)
    }
}

/// Erreur de parsing SOAP
#[derive(Debug, thiserror::Error)]
pub enum SoapParseError {
    #[error("XML parse error: {0}")]
    XmlError(#[from] xmltree::ParseError),

    #[error("Missing SOAP Envelope")]
    MissingEnvelope,

    #[error("Missing SOAP Body")]
    MissingBody,

    #[error("No action found in SOAP Body")]
    NoAction,

    #[error("Malformed SOAPACTION header: {0}")]
    BadActionHeader(String),
}

/// Parse l'en-tête HTTP `SOAPACTION`.
pub fn parse_soapaction_header(value: &str) -> Result<SoapActionHeader, SoapParseError> {
    let trimmed = value.trim().trim_matches('"');
    let (urn, action) = trimmed
        .split_once('#')
        .ok_or_else(|| SoapParseError::BadActionHeader(value.to_string()))?;
    if urn.is_empty() || action.is_empty() {
        return Err(SoapParseError::BadActionHeader(value.to_string()));
    }
    Ok(SoapActionHeader {
        service_urn: urn.to_string(),
        action: action.to_string(),
    })
}

/// Parse une action SOAP à partir du corps XML d'une requête de contrôle.
pub fn parse_soap_action(xml: &[u8]) -> Result<SoapAction, SoapParseError> {
    let reader = BufReader::new(xml);
    let root = Element::parse(reader)?;

    if !root.name.ends_with("Envelope") {
        return Err(SoapParseError::MissingEnvelope);
    }

    let body = root
        .get_child("Body")
        .or_else(|| {
            root.children
                .iter()
                .find_map(|n| n.as_element().filter(|e| e.name.ends_with("Body")))
        })
        .ok_or(SoapParseError::MissingBody)?;

    // Le Body contient un unique élément enfant qui est l'action
    let action_elem = body
        .children
        .iter()
        .find_map(|n| n.as_element())
        .ok_or(SoapParseError::NoAction)?;

    let mut args = HashMap::new();
    for child in &action_elem.children {
        if let Some(elem) = child.as_element() {
            let value = elem.get_text().unwrap_or_default().to_string();
            args.insert(elem.name.clone(), value);
        }
    }

    Ok(SoapAction {
        name: action_elem.name.clone(),
        namespace: action_elem.namespace.clone(),
        args,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_browse_action() {
        let xml = r#"<?xml version="1.0"?>
<s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/">
  <s:Body>
    <u:Browse xmlns:u="urn:schemas-upnp-org:service:ContentDirectory:1">
      <ObjectID>0</ObjectID>
      <BrowseFlag>BrowseDirectChildren</BrowseFlag>
      <StartingIndex>0</StartingIndex>
      <RequestedCount>12</RequestedCount>
    </u:Browse>
  </s:Body>
</s:Envelope>"#;

        let action = parse_soap_action(xml.as_bytes()).unwrap();
        assert_eq!(action.name, "Browse");
        assert_eq!(
            action.namespace.as_deref(),
            Some("urn:schemas-upnp-org:service:ContentDirectory:1")
        );
        assert_eq!(action.arg("ObjectID"), "0");
        assert_eq!(action.arg_u32("RequestedCount", 0), 12);
        assert_eq!(action.arg_u32("MissingCount", 7), 7);
    }

    #[test]
    fn test_parse_action_no_args() {
        let xml = r#"<?xml version="1.0"?>
<s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/">
  <s:Body>
    <u:GetSystemUpdateID xmlns:u="urn:schemas-upnp-org:service:ContentDirectory:1"/>
  </s:Body>
</s:Envelope>"#;

        let action = parse_soap_action(xml.as_bytes()).unwrap();
        assert_eq!(action.name, "GetSystemUpdateID");
        assert!(action.args.is_empty());
    }

    #[test]
    fn test_parse_rejects_non_envelope() {
        let err = parse_soap_action(b"<foo/>").unwrap_err();
        assert!(matches!(err, SoapParseError::MissingEnvelope));
    }

    #[test]
    fn test_parse_soapaction_header() {
        let h = parse_soapaction_header(
            "\"urn:schemas-upnp-org:service:ContentDirectory:1#Browse\"",
        )
        .unwrap();
        assert_eq!(h.action, "Browse");
        assert_eq!(h.service_type(), "ContentDirectory");

        assert!(parse_soapaction_header("garbage").is_err());
    }
}
