//! Best-effort summary of ONVIF `MetadataStream` documents.

use xmltree::{Element, XMLNode};

/// ONVIF schema namespace (`tt:` prefix).
pub const ONVIF_SCHEMA_NS: &str = "http://www.onvif.org/ver10/schema";

/// One object detected by the camera's analytics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectedObject {
    pub id: Option<String>,
    pub object_type: String,
}

/// The interesting bits of a scene description.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SceneSummary {
    /// `UtcTime` attribute of the first `tt:Frame` that has one.
    pub utc_time: Option<String>,
    /// Every `tt:Object` that carries a `tt:Type`.
    pub objects: Vec<DetectedObject>,
}

impl SceneSummary {
    /// Parses a complete XML document. Returns `None` if it isn't well-formed.
    pub fn parse(xml: &str) -> Option<Self> {
        let root = match Element::parse(xml.as_bytes()) {
            Ok(r) => r,
            Err(e) => {
                tracing::debug!(error = %e, "metadata XML parse error");
                return None;
            }
        };
        let mut summary = SceneSummary::default();
        walk(&root, &mut summary);
        Some(summary)
    }
}

fn is_onvif(e: &Element, name: &str) -> bool {
    e.name == name && e.namespace.as_deref() == Some(ONVIF_SCHEMA_NS)
}

fn walk(e: &Element, summary: &mut SceneSummary) {
    if is_onvif(e, "Frame") && summary.utc_time.is_none() {
        summary.utc_time = e.attributes.get("UtcTime").cloned();
    }
    if is_onvif(e, "Object") {
        if let Some(t) = find_descendant(e, "Type") {
            summary.objects.push(DetectedObject {
                id: e.attributes.get("ObjectId").cloned(),
                object_type: t.get_text().map(|t| t.trim().to_owned()).unwrap_or_default(),
            });
        }
    }
    for child in children(e) {
        walk(child, summary);
    }
}

fn children(e: &Element) -> impl Iterator<Item = &Element> {
    e.children.iter().filter_map(XMLNode::as_element)
}

fn find_descendant<'a>(e: &'a Element, name: &str) -> Option<&'a Element> {
    for child in children(e) {
        if is_onvif(child, name) {
            return Some(child);
        }
        if let Some(found) = find_descendant(child, name) {
            return Some(found);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn objects_and_time() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
        <tt:MetadataStream xmlns:tt="http://www.onvif.org/ver10/schema">
            <tt:VideoAnalytics>
                <tt:Frame UtcTime="2023-01-01T12:00:00.000Z">
                    <tt:Object ObjectId="1">
                        <tt:Appearance><tt:Class><tt:Type>Human</tt:Type></tt:Class></tt:Appearance>
                    </tt:Object>
                    <tt:Object ObjectId="2">
                        <tt:Type>Vehicle</tt:Type>
                    </tt:Object>
                    <tt:Object ObjectId="3"/>
                </tt:Frame>
            </tt:VideoAnalytics>
        </tt:MetadataStream>"#;
        let s = SceneSummary::parse(xml).unwrap();
        assert_eq!(s.utc_time.as_deref(), Some("2023-01-01T12:00:00.000Z"));
        assert_eq!(
            s.objects,
            vec![
                DetectedObject {
                    id: Some("1".into()),
                    object_type: "Human".into()
                },
                DetectedObject {
                    id: Some("2".into()),
                    object_type: "Vehicle".into()
                },
            ]
        );
    }

    #[test]
    fn empty_stream() {
        let xml = r#"<tt:MetadataStream xmlns:tt="http://www.onvif.org/ver10/schema"></tt:MetadataStream>"#;
        assert_eq!(SceneSummary::parse(xml), Some(SceneSummary::default()));
    }

    #[test]
    fn other_namespace_ignored() {
        let xml = r#"<x:Frame xmlns:x="urn:other" UtcTime="2023-01-01T00:00:00Z"/>"#;
        assert_eq!(SceneSummary::parse(xml).unwrap().utc_time, None);
    }

    #[test]
    fn not_well_formed() {
        assert_eq!(SceneSummary::parse("<invalid>xml<content>"), None);
    }
}
