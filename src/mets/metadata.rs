//! Bibliographic metadata extraction from a METS/MODS document.

use serde::{Deserialize, Serialize};

use super::document::{MetsDocument, TitleParts};

/// Label shown when a document carries no usable title at all
pub const UNTITLED: &str = "Untitled document";

/// Rights holder information
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Attribution {
    pub owner: Option<String>,
    pub logo: Option<String>,
}

/// A related machine-readable rendition of the document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeeAlsoRef {
    pub url: String,
    pub format: Option<String>,
    pub profile: Option<String>,
}

/// Everything the extractor derives from the descriptive sections
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentMetadata {
    pub titles: Vec<String>,
    pub creators: Vec<String>,
    pub identifiers: Vec<(String, String)>,
    pub attribution: Attribution,
    pub thumbnail: Option<String>,
    pub language: Option<String>,
    pub genre: Option<String>,
    pub description: Option<String>,
    pub license: Option<String>,
    pub related: Option<String>,
    pub see_also: Vec<SeeAlsoRef>,
}

impl DocumentMetadata {
    /// Primary title, or the generic placeholder
    pub fn title(&self) -> &str {
        self.titles.first().map(String::as_str).unwrap_or(UNTITLED)
    }

    /// Human-readable label: `{creators}: {title}`
    pub fn label(&self) -> String {
        let title = self.title();
        if self.creators.is_empty() {
            title.to_string()
        } else {
            format!("{}: {}", self.creators.join("/"), title)
        }
    }
}

/// Extract bibliographic metadata. Missing optional fields never fail the
/// extraction; a document without a METS root is rejected earlier, by
/// [`MetsDocument::new`].
pub fn extract(doc: &MetsDocument<'_, '_>, source_url: Option<&str>) -> DocumentMetadata {
    let mut titles: Vec<String> = doc
        .title_infos()
        .iter()
        .filter_map(assemble_title)
        .collect();
    if titles.is_empty() {
        // Items that are part of a larger multi-volume work may only carry
        // the title of their host
        titles.extend(doc.host_title().as_ref().and_then(assemble_title));
    }
    if let Some(part) = doc.part_number() {
        titles = titles
            .into_iter()
            .map(|title| format!("{title} ({part})"))
            .collect();
    }

    let mut see_also = Vec::new();
    if let Some(url) = source_url {
        see_also.push(SeeAlsoRef {
            url: url.to_string(),
            format: Some("text/xml".to_string()),
            profile: Some("http://www.loc.gov/METS/".to_string()),
        });
    }
    if let Some(pdf) = doc.pdf_download_url() {
        see_also.push(SeeAlsoRef {
            url: pdf,
            format: Some("application/pdf".to_string()),
            profile: None,
        });
    }

    DocumentMetadata {
        titles,
        creators: doc.creators(),
        identifiers: doc.identifiers(),
        attribution: Attribution {
            owner: doc.rights_owner(),
            logo: doc.rights_owner_logo(),
        },
        thumbnail: find_thumbnail(doc),
        language: doc.language(),
        genre: doc.genre(),
        description: doc.description(),
        license: doc.license(),
        related: doc.presentation_url(),
        see_also,
    }
}

fn assemble_title(parts: &TitleParts) -> Option<String> {
    let mut title = parts.title.clone()?;
    if let Some(non_sort) = &parts.non_sort {
        title = format!("{} {}", non_sort.trim_end(), title);
    }
    if let Some(sub_title) = &parts.sub_title {
        title = format!("{title}. {sub_title}");
    }
    Some(title)
}

/// Representative thumbnail: first JPEG file reference, accepting the
/// nonstandard `image/jpg` spelling as a fallback
fn find_thumbnail(doc: &MetsDocument<'_, '_>) -> Option<String> {
    for mimetype in ["image/jpeg", "image/jpg"] {
        if let Some(url) = doc.file_urls_by_mimetype(mimetype).into_iter().next() {
            return Some(url);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mets::SAMPLE_METS;
    use roxmltree::Document;

    fn parse_and_extract(xml: &str) -> DocumentMetadata {
        let doc = Document::parse(xml).unwrap();
        let mets = MetsDocument::new(&doc).unwrap();
        extract(&mets, Some("http://example.org/doc.xml"))
    }

    #[test]
    fn extracts_full_metadata_set() {
        let meta = parse_and_extract(SAMPLE_METS);

        assert_eq!(meta.titles, vec!["Die Historische Drucke. Eine Auswahl"]);
        assert_eq!(meta.creators, vec!["Dilherr, Johann Michael"]);
        assert_eq!(
            meta.label(),
            "Dilherr, Johann Michael: Die Historische Drucke. Eine Auswahl"
        );
        assert_eq!(meta.attribution.owner.as_deref(), Some("Example Library"));
        assert_eq!(
            meta.attribution.logo.as_deref(),
            Some("http://library.example.org/logo.png")
        );
        assert_eq!(
            meta.thumbnail.as_deref(),
            Some("http://images.example.org/1.jpg")
        );
        assert_eq!(meta.language.as_deref(), Some("German"));
        assert_eq!(meta.genre.as_deref(), Some("monograph"));
        assert_eq!(meta.license.as_deref(), Some("pdm"));
        assert_eq!(
            meta.identifiers,
            vec![
                ("urn".to_string(), "urn:nbn:de:test-123".to_string()),
                (
                    "purl".to_string(),
                    "http://resolver.example.org/123".to_string()
                ),
            ]
        );
        assert_eq!(meta.see_also.len(), 2);
        assert_eq!(meta.see_also[0].url, "http://example.org/doc.xml");
        assert_eq!(meta.see_also[1].format.as_deref(), Some("application/pdf"));
    }

    #[test]
    fn missing_title_falls_back_to_placeholder() {
        let xml = r#"<mets:mets xmlns:mets="http://www.loc.gov/METS/"/>"#;
        let meta = parse_and_extract(xml);

        assert!(meta.titles.is_empty());
        assert_eq!(meta.title(), UNTITLED);
        assert_eq!(meta.label(), UNTITLED);
        assert!(meta.thumbnail.is_none());
    }

    #[test]
    fn host_title_used_when_item_has_none() {
        let xml = r#"<mets:mets xmlns:mets="http://www.loc.gov/METS/"
                                xmlns:mods="http://www.loc.gov/mods/v3">
          <mets:dmdSec ID="dmd001">
            <mets:mdWrap><mets:xmlData><mods:mods>
              <mods:relatedItem type="host">
                <mods:titleInfo><mods:title>Collected Works</mods:title></mods:titleInfo>
              </mods:relatedItem>
              <mods:part><mods:detail><mods:number>4</mods:number></mods:detail></mods:part>
            </mods:mods></mets:xmlData></mets:mdWrap>
          </mets:dmdSec>
        </mets:mets>"#;
        let meta = parse_and_extract(xml);

        assert_eq!(meta.titles, vec!["Collected Works (4)"]);
    }

    #[test]
    fn thumbnail_falls_back_to_jpg_spelling() {
        let xml = r#"<mets:mets xmlns:mets="http://www.loc.gov/METS/"
                                xmlns:xlink="http://www.w3.org/1999/xlink">
          <mets:fileSec><mets:fileGrp>
            <mets:file ID="f1" MIMETYPE="image/jpg">
              <mets:FLocat LOCTYPE="URL" xlink:href="http://x.test/a.jpg"/>
            </mets:file>
          </mets:fileGrp></mets:fileSec>
        </mets:mets>"#;
        let meta = parse_and_extract(xml);

        assert_eq!(meta.thumbnail.as_deref(), Some("http://x.test/a.jpg"));
    }
}
