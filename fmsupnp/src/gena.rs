//! # Module GENA - Abonnements événementiels
//!
//! Le serveur n'implémente qu'un stub d'eventing : poignée de main SUBSCRIBE
//! et NOTIFY initial. Ce module porte les formats associés : liste d'URLs
//! `CALLBACK`, en-tête `TIMEOUT`, et property set XML.

use url::Url;
use xmltree::{Element, EmitterConfig, XMLNode};

/// Namespace des property sets GENA
pub const NS_EVENT: &str = "urn:schemas-upnp-org:event-1-0";

/// Parse un en-tête `CALLBACK` : URLs entre chevrons, `<url1><url2>…`.
///
/// Les entrées non parsables sont ignorées.
pub fn parse_callback_urls(value: &str) -> Vec<Url> {
    let mut urls = Vec::new();
    let mut rest = value;
    while let Some(start) = rest.find('<') {
        let Some(end_rel) = rest[start + 1..].find('>') else {
            break;
        };
        let candidate = &rest[start + 1..start + 1 + end_rel];
        if let Ok(url) = Url::parse(candidate) {
            urls.push(url);
        }
        rest = &rest[start + 1 + end_rel + 1..];
    }
    urls
}

/// Parse un en-tête `TIMEOUT: Second-<N>`.
pub fn parse_timeout(value: &str) -> Option<u32> {
    let rest = value.trim();
    let rest = rest
        .strip_prefix("Second-")
        .or_else(|| rest.strip_prefix("second-"))?;
    rest.trim().parse().ok()
}

/// Construit le corps XML d'un NOTIFY : un property set GENA.
pub fn build_property_set(properties: &[(&str, &str)]) -> String {
    let mut propertyset = Element::new("e:propertyset");
    propertyset
        .attributes
        .insert("xmlns:e".to_string(), NS_EVENT.to_string());

    for (name, value) in properties {
        let mut variable = Element::new(name);
        variable.children.push(XMLNode::Text((*value).to_string()));
        let mut property = Element::new("e:property");
        property.children.push(XMLNode::Element(variable));
        propertyset.children.push(XMLNode::Element(property));
    }

    let mut buf = Vec::new();
    let config = EmitterConfig::new().write_document_declaration(false);
    propertyset
        .write_with_config(&mut buf, config)
        .expect("XML emit of in-memory element cannot fail");
    format!(
        "<?xml version=\"1.0\"?>\n{}",
        String::from_utf8(buf).expect("xmltree emits valid UTF-8")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_callback_urls() {
        let urls = parse_callback_urls("<http://10.0.0.2:9000/cb><http://10.0.0.2:9001/cb2>");
        assert_eq!(urls.len(), 2);
        assert_eq!(urls[0].as_str(), "http://10.0.0.2:9000/cb");
        assert_eq!(urls[1].port(), Some(9001));
    }

    #[test]
    fn test_parse_callback_skips_garbage() {
        let urls = parse_callback_urls("<not a url><http://ok/cb>");
        assert_eq!(urls.len(), 1);
        assert_eq!(urls[0].host_str(), Some("ok"));
    }

    #[test]
    fn test_parse_timeout() {
        assert_eq!(parse_timeout("Second-1800"), Some(1800));
        assert_eq!(parse_timeout("second-300"), Some(300));
        assert_eq!(parse_timeout("infinite"), None);
    }

    #[test]
    fn test_build_property_set() {
        let xml = build_property_set(&[("SystemUpdateID", "0")]);
        assert!(xml.contains("e:propertyset"));
        assert!(xml.contains(r#"xmlns:e="urn:schemas-upnp-org:event-1-0""#));
        assert!(xml.contains("<SystemUpdateID>0</SystemUpdateID>"));
    }
}
