//! Assemblage XML de la description du root device
//!
//! Le document `/rootDesc.xml` est construit une fois au démarrage puis servi
//! tel quel. Les extensions vendor DLNA et Samsung sont incluses : certaines
//! TV refusent un MediaServer qui ne les annonce pas.

use xmltree::{Element, EmitterConfig, XMLNode};

/// Description d'un service dans la device description
#[derive(Debug, Clone)]
pub struct ServiceDesc {
    pub service_type: String,
    pub service_id: String,
    pub scpd_url: String,
    pub control_url: String,
    pub event_sub_url: String,
}

/// Description d'une icône de device
#[derive(Debug, Clone)]
pub struct IconDesc {
    pub mimetype: String,
    pub width: u32,
    pub height: u32,
    pub depth: u32,
    pub url: String,
}

/// Paramètres de la description du root device
#[derive(Debug, Clone)]
pub struct DeviceDesc {
    pub device_type: String,
    pub friendly_name: String,
    pub manufacturer: String,
    pub model_name: String,
    pub model_description: String,
    /// UDN complet, préfixe "uuid:" inclus
    pub udn: String,
    pub icons: Vec<IconDesc>,
    pub services: Vec<ServiceDesc>,
    pub presentation_url: String,
}

fn text_child(parent: &mut Element, name: &str, value: &str) {
    let mut child = Element::new(name);
    child.children.push(XMLNode::Text(value.to_string()));
    parent.children.push(XMLNode::Element(child));
}

/// Construit le document XML complet de description du device.
pub fn build_device_description(desc: &DeviceDesc) -> String {
    let mut root = Element::new("root");
    root.attributes.insert(
        "xmlns".to_string(),
        "urn:schemas-upnp-org:device-1-0".to_string(),
    );
    root.attributes.insert(
        "xmlns:dlna".to_string(),
        "urn:schemas-dlna-org:device-1-0".to_string(),
    );
    root.attributes
        .insert("xmlns:sec".to_string(), "http://www.sec.co.kr/dlna".to_string());

    let mut spec_version = Element::new("specVersion");
    text_child(&mut spec_version, "major", "1");
    text_child(&mut spec_version, "minor", "0");
    root.children.push(XMLNode::Element(spec_version));

    let mut device = Element::new("device");
    text_child(&mut device, "deviceType", &desc.device_type);
    text_child(&mut device, "friendlyName", &desc.friendly_name);
    text_child(&mut device, "manufacturer", &desc.manufacturer);
    text_child(&mut device, "modelDescription", &desc.model_description);
    text_child(&mut device, "modelName", &desc.model_name);
    text_child(&mut device, "UDN", &desc.udn);

    // Extensions vendor : capacités DLNA et Samsung
    device
        .children
        .push(XMLNode::Element(Element::new("dlna:X_DLNACAP")));
    text_child(&mut device, "dlna:X_DLNADOC", "DMS-1.50");
    text_child(&mut device, "dlna:X_DLNADOC", "M-DMS-1.50");
    text_child(
        &mut device,
        "sec:ProductCap",
        "smi,DCM10,getMediaInfo.sec,getCaptionInfo.sec",
    );
    text_child(
        &mut device,
        "sec:X_ProductCap",
        "smi,DCM10,getMediaInfo.sec,getCaptionInfo.sec",
    );

    if !desc.icons.is_empty() {
        let mut icon_list = Element::new("iconList");
        for icon in &desc.icons {
            let mut elem = Element::new("icon");
            text_child(&mut elem, "mimetype", &icon.mimetype);
            text_child(&mut elem, "width", &icon.width.to_string());
            text_child(&mut elem, "height", &icon.height.to_string());
            text_child(&mut elem, "depth", &icon.depth.to_string());
            text_child(&mut elem, "url", &icon.url);
            icon_list.children.push(XMLNode::Element(elem));
        }
        device.children.push(XMLNode::Element(icon_list));
    }

    let mut service_list = Element::new("serviceList");
    for service in &desc.services {
        let mut elem = Element::new("service");
        text_child(&mut elem, "serviceType", &service.service_type);
        text_child(&mut elem, "serviceId", &service.service_id);
        text_child(&mut elem, "SCPDURL", &service.scpd_url);
        text_child(&mut elem, "controlURL", &service.control_url);
        text_child(&mut elem, "eventSubURL", &service.event_sub_url);
        service_list.children.push(XMLNode::Element(elem));
    }
    device.children.push(XMLNode::Element(service_list));

    text_child(&mut device, "presentationURL", &desc.presentation_url);
    root.children.push(XMLNode::Element(device));

    let mut buf = Vec::new();
    let config = EmitterConfig::new()
        .write_document_declaration(false)
        .perform_indent(true)
        .indent_string("  ");
    root.write_with_config(&mut buf, config)
        .expect("XML emit of in-memory element cannot fail");
    format!(
        "<?xml version=\"1.0\"?>{}",
        String::from_utf8(buf).expect("xmltree emits valid UTF-8")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> DeviceDesc {
        DeviceDesc {
            device_type: "urn:schemas-upnp-org:device:MediaServer:1".to_string(),
            friendly_name: "FSMedia: test on host".to_string(),
            manufacturer: "FSMedia".to_string(),
            model_name: "fms 1".to_string(),
            model_description: "UPnP AV MediaServer".to_string(),
            udn: "uuid:0000-1111".to_string(),
            icons: vec![IconDesc {
                mimetype: "image/png".to_string(),
                width: 48,
                height: 48,
                depth: 8,
                url: "/deviceIcon/0".to_string(),
            }],
            services: vec![ServiceDesc {
                service_type: "urn:schemas-upnp-org:service:ContentDirectory:1".to_string(),
                service_id: "urn:upnp-org:serviceId:ContentDirectory".to_string(),
                scpd_url: "/scpd/ContentDirectory.xml".to_string(),
                control_url: "/ctl".to_string(),
                event_sub_url: "/evt/ContentDirectory".to_string(),
            }],
            presentation_url: "/".to_string(),
        }
    }

    #[test]
    fn test_device_description_structure() {
        let xml = build_device_description(&sample());

        assert!(xml.starts_with("<?xml version=\"1.0\"?>"));
        assert!(xml.contains("<deviceType>urn:schemas-upnp-org:device:MediaServer:1</deviceType>"));
        assert!(xml.contains("<UDN>uuid:0000-1111</UDN>"));
        assert!(xml.contains("<dlna:X_DLNADOC>DMS-1.50</dlna:X_DLNADOC>"));
        assert!(xml.contains("<sec:ProductCap>"));
        assert!(xml.contains("<SCPDURL>/scpd/ContentDirectory.xml</SCPDURL>"));
        assert!(xml.contains("<url>/deviceIcon/0</url>"));
        assert!(xml.contains("<presentationURL>/</presentationURL>"));

        // Le document doit rester parsable
        let parsed = xmltree::Element::parse(xml.as_bytes()).unwrap();
        assert_eq!(parsed.name, "root");
    }
}
