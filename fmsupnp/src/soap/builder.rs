//! Construction de réponses SOAP et de faults

use crate::UpnpError;
use xmltree::{Element, EmitterConfig, XMLNode};

/// Sérialise un élément en fragment XML, sans déclaration de document.
fn emit_fragment(elem: &Element) -> String {
    let mut buf = Vec::new();
    let config = EmitterConfig::new().write_document_declaration(false);
    elem.write_with_config(&mut buf, config)
        .expect("XML emit of in-memory element cannot fail");
    String::from_utf8(buf).expect("xmltree emits valid UTF-8")
}

/// Enveloppe un fragment de Body dans une enveloppe SOAP 1.1 complète.
///
/// Le remplacement final de `&#34;` par un guillemet littéral est requis par
/// les TV Samsung Frame, qui n'affichent pas un répertoire dont le
/// `protocolInfo` contient des guillemets encodés.
pub fn wrap_envelope(body_xml: &str) -> String {
    let body = format!(
        r#"<?xml version="1.0" encoding="utf-8" standalone="yes"?><s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/" s:encodingStyle="http://schemas.xmlsoap.org/soap/encoding/"><s:Body>{}</s:Body></s:Envelope>"#,
        body_xml
    );
    body.replace("&#34;", "\"")
}

/// Construit une enveloppe de réponse d'action UPnP.
///
/// # Arguments
///
/// * `service_urn` - URN du service (ex: "urn:schemas-upnp-org:service:ContentDirectory:1")
/// * `action` - Nom de l'action (ex: "Browse")
/// * `args` - Arguments de sortie, dans l'ordre du SCPD
pub fn build_soap_response(service_urn: &str, action: &str, args: &[(String, String)]) -> String {
    let mut response = Element::new(&format!("u:{}Response", action));
    response
        .attributes
        .insert("xmlns:u".to_string(), service_urn.to_string());

    for (name, value) in args {
        let mut child = Element::new(name);
        child.children.push(XMLNode::Text(value.clone()));
        response.children.push(XMLNode::Element(child));
    }

    wrap_envelope(&emit_fragment(&response))
}

/// Construit une enveloppe SOAP Fault portant une erreur UPnP.
pub fn build_soap_fault(err: &UpnpError) -> String {
    let mut fault = Element::new("s:Fault");

    let mut faultcode = Element::new("faultcode");
    faultcode
        .children
        .push(XMLNode::Text("s:Client".to_string()));
    fault.children.push(XMLNode::Element(faultcode));

    let mut faultstring = Element::new("faultstring");
    faultstring
        .children
        .push(XMLNode::Text("UPnPError".to_string()));
    fault.children.push(XMLNode::Element(faultstring));

    let mut upnp_error = Element::new("UPnPError");
    upnp_error.attributes.insert(
        "xmlns".to_string(),
        "urn:schemas-upnp-org:control-1-0".to_string(),
    );

    let mut code = Element::new("errorCode");
    code.children.push(XMLNode::Text(err.code.to_string()));
    upnp_error.children.push(XMLNode::Element(code));

    let mut desc = Element::new("errorDescription");
    desc.children.push(XMLNode::Text(err.description.clone()));
    upnp_error.children.push(XMLNode::Element(desc));

    let mut detail = Element::new("detail");
    detail.children.push(XMLNode::Element(upnp_error));
    fault.children.push(XMLNode::Element(detail));

    wrap_envelope(&emit_fragment(&fault))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_response() {
        let xml = build_soap_response(
            "urn:schemas-upnp-org:service:ContentDirectory:1",
            "GetSystemUpdateID",
            &[("Id".to_string(), "0".to_string())],
        );

        assert!(xml.starts_with("<?xml version=\"1.0\""));
        assert!(xml.contains("<u:GetSystemUpdateIDResponse"));
        assert!(xml.contains("<Id>0</Id>"));
        assert!(xml.contains(r#"xmlns:s="http://schemas.xmlsoap.org/soap/envelope/""#));
    }

    #[test]
    fn test_response_escapes_markup_in_values() {
        let didl = r#"<DIDL-Lite><item id="/a.mp4"/></DIDL-Lite>"#;
        let xml = build_soap_response(
            "urn:schemas-upnp-org:service:ContentDirectory:1",
            "Browse",
            &[("Result".to_string(), didl.to_string())],
        );

        assert!(xml.contains("&lt;DIDL-Lite&gt;"));
        // Compat Samsung : aucun guillemet encodé ne doit subsister
        assert!(!xml.contains("&#34;"));
    }

    #[test]
    fn test_build_fault() {
        let xml = build_soap_fault(&UpnpError::invalid_action("Unknown action"));

        assert!(xml.contains("<s:Fault>"));
        assert!(xml.contains("<faultcode>s:Client</faultcode>"));
        assert!(xml.contains("<errorCode>401</errorCode>"));
        assert!(xml.contains("<errorDescription>Unknown action</errorDescription>"));
    }
}
