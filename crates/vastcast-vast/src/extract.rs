//! Ad manifest extraction from VAST XML.
//!
//! Only three nodes are read: the first `AdTitle`, the first `MediaFile`
//! typed `video/mp4` with a non-empty URL, and the first `ClickThrough`.
//! Elements are matched by local name anywhere in the document, so inline
//! ads, wrappers carrying creatives and namespaced documents all work.
//! No bitrate comparison is done between media files.

use roxmltree::{Document, Node, ParsingOptions};
use tracing::debug;

use vastcast_models::{AdManifest, DEFAULT_AD_TITLE, MP4_MIME_TYPE};

use crate::error::{VastError, VastResult};

/// Extract the ad manifest from VAST XML text.
///
/// # Errors
/// - [`VastError::MalformedInput`] if the text is not well-formed XML
/// - [`VastError::NoSuitableMedia`] if no MP4 media file has a URL
/// - [`VastError::MissingClickthrough`] if no clickthrough has a URL
pub fn extract_manifest(xml: &str) -> VastResult<AdManifest> {
    let options = ParsingOptions {
        allow_dtd: true,
        ..ParsingOptions::default()
    };
    let doc = Document::parse_with_options(xml, options)
        .map_err(|e| VastError::malformed(e.to_string()))?;

    let title = first_element(&doc, "AdTitle")
        .and_then(trimmed_text)
        .unwrap_or_else(|| DEFAULT_AD_TITLE.to_string());

    let media_file_url = doc
        .descendants()
        .filter(|n| is_element(n, "MediaFile"))
        .filter(|n| n.attribute("type") == Some(MP4_MIME_TYPE))
        .find_map(trimmed_text)
        .ok_or(VastError::NoSuitableMedia)?;

    let raw_clickthrough_url = first_element(&doc, "ClickThrough")
        .and_then(trimmed_text)
        .ok_or(VastError::MissingClickthrough)?;

    debug!(
        title = %title,
        media_file_url = %media_file_url,
        "Extracted VAST manifest"
    );

    Ok(AdManifest::new(title, media_file_url, raw_clickthrough_url))
}

fn is_element(node: &Node<'_, '_>, name: &str) -> bool {
    node.is_element() && node.tag_name().name() == name
}

fn first_element<'a, 'input>(doc: &'a Document<'input>, name: &str) -> Option<Node<'a, 'input>> {
    doc.descendants().find(|n| is_element(n, name))
}

/// Concatenated direct text and CDATA content, trimmed; `None` when blank.
fn trimmed_text(node: Node<'_, '_>) -> Option<String> {
    let text: String = node
        .children()
        .filter(|child| child.is_text())
        .filter_map(|child| child.text())
        .collect();

    let text = text.trim();
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_VAST: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<VAST version="4.0">
  <Ad id="1">
    <InLine>
      <AdSystem>Test</AdSystem>
      <AdTitle><![CDATA[250415_OMD_The Home Depot_HD Home Awareness Q2'25]]></AdTitle>
      <Creatives>
        <Creative>
          <Linear>
            <MediaFiles>
              <MediaFile type="video/webm" delivery="progressive"><![CDATA[https://cdn.example/ad.webm]]></MediaFile>
              <MediaFile type="video/mp4" delivery="progressive"> </MediaFile>
              <MediaFile type="video/mp4" delivery="progressive" bitrate="500"><![CDATA[ https://cdn.example/ad_low.mp4 ]]></MediaFile>
              <MediaFile type="video/mp4" delivery="progressive" bitrate="4000"><![CDATA[https://cdn.example/ad_high.mp4]]></MediaFile>
            </MediaFiles>
            <VideoClicks>
              <ClickThrough><![CDATA[https://track.example/c?click=https%3A%2F%2Fwww.homedepot.com%2F]]></ClickThrough>
            </VideoClicks>
          </Linear>
        </Creative>
      </Creatives>
    </InLine>
  </Ad>
</VAST>"#;

    #[test]
    fn test_extracts_manifest() {
        let manifest = extract_manifest(SAMPLE_VAST).unwrap();
        assert_eq!(manifest.title, "250415_OMD_The Home Depot_HD Home Awareness Q2'25");
        assert_eq!(manifest.media_file_url, "https://cdn.example/ad_low.mp4");
        assert_eq!(
            manifest.raw_clickthrough_url,
            "https://track.example/c?click=https%3A%2F%2Fwww.homedepot.com%2F"
        );
    }

    #[test]
    fn test_missing_title_uses_default() {
        let xml = r#"<VAST><Ad><InLine>
            <MediaFile type="video/mp4">https://cdn.example/a.mp4</MediaFile>
            <ClickThrough>https://brand.example/</ClickThrough>
        </InLine></Ad></VAST>"#;
        let manifest = extract_manifest(xml).unwrap();
        assert_eq!(manifest.title, DEFAULT_AD_TITLE);
    }

    #[test]
    fn test_entity_escaped_clickthrough() {
        let xml = r#"<VAST><Ad><InLine><AdTitle>Spot</AdTitle>
            <MediaFile type="video/mp4">https://cdn.example/a.mp4</MediaFile>
            <ClickThrough>https://t.example/c?a=1&amp;u=https%3A%2F%2Fbrand.example</ClickThrough>
        </InLine></Ad></VAST>"#;
        let manifest = extract_manifest(xml).unwrap();
        assert_eq!(
            manifest.raw_clickthrough_url,
            "https://t.example/c?a=1&u=https%3A%2F%2Fbrand.example"
        );
    }

    #[test]
    fn test_malformed_xml() {
        let err = extract_manifest("<VAST><Ad></VAST>").unwrap_err();
        assert!(matches!(err, VastError::MalformedInput(_)));
    }

    #[test]
    fn test_not_xml_at_all() {
        let err = extract_manifest("https://example.com/vast.xml").unwrap_err();
        assert!(matches!(err, VastError::MalformedInput(_)));
    }

    #[test]
    fn test_no_mp4_media() {
        let xml = r#"<VAST><AdTitle>Spot</AdTitle>
            <MediaFile type="video/webm">https://cdn.example/a.webm</MediaFile>
            <ClickThrough>https://brand.example/</ClickThrough></VAST>"#;
        assert!(matches!(extract_manifest(xml), Err(VastError::NoSuitableMedia)));
    }

    #[test]
    fn test_missing_clickthrough() {
        let xml = r#"<VAST><AdTitle>Spot</AdTitle>
            <MediaFile type="video/mp4">https://cdn.example/a.mp4</MediaFile>
            <ClickThrough>   </ClickThrough></VAST>"#;
        assert!(matches!(extract_manifest(xml), Err(VastError::MissingClickthrough)));
    }

    #[test]
    fn test_namespaced_document() {
        let xml = r#"<v:VAST xmlns:v="http://www.iab.com/VAST"><v:AdTitle>Spot</v:AdTitle>
            <v:MediaFile type="video/mp4">https://cdn.example/a.mp4</v:MediaFile>
            <v:ClickThrough>https://brand.example/</v:ClickThrough></v:VAST>"#;
        let manifest = extract_manifest(xml).unwrap();
        assert_eq!(manifest.title, "Spot");
    }
}
