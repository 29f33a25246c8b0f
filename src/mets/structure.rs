//! Structure resolution: the physical reading order and the logical table
//! of contents of a METS document.

use std::collections::HashMap;

use tracing::warn;
use uuid::Uuid;

use super::document::{FileEntry, MetsDocument};

/// MIME types accepted as page images (the nonstandard `image/jpg`
/// spelling occurs in the wild)
const PAGE_IMAGE_TYPES: [&str; 2] = ["image/jpeg", "image/jpg"];

/// One image rendition of a page. Pixel dimensions are filled in later by
/// the import worker when it can determine them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageImage {
    pub file_id: String,
    pub url: String,
    pub mimetype: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

/// A page of the document's linear reading sequence, with at least one
/// resolvable image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    pub physical_id: String,
    pub label: String,
    pub images: Vec<PageImage>,
}

impl Page {
    /// Stable image identity, derived from the primary image URL so that
    /// re-imports address the same image records
    pub fn image_id(&self) -> String {
        Uuid::new_v5(&Uuid::NAMESPACE_URL, self.images[0].url.as_bytes()).to_string()
    }

    /// Largest known pixel dimensions across this page's renditions
    pub fn max_dimensions(&self) -> Option<(u32, u32)> {
        self.images
            .iter()
            .filter_map(|img| Some((img.width?, img.height?)))
            .max_by_key(|(w, h)| u64::from(*w) * u64::from(*h))
    }

    /// Smallest known pixel dimensions, used for thumbnails
    pub fn min_dimensions(&self) -> Option<(u32, u32)> {
        self.images
            .iter()
            .filter_map(|img| Some((img.width?, img.height?)))
            .min_by_key(|(w, h)| u64::from(*w) * u64::from(*h))
    }
}

/// An entry of the logical table of contents
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TocEntry {
    pub logical_id: Option<String>,
    pub label: Option<String>,
    pub division_type: Option<String>,
    pub physical_ids: Vec<String>,
    pub children: Vec<TocEntry>,
}

/// Resolve the ordered page sequence.
///
/// Pages follow the declared reading order (`ORDER` attribute), not the
/// occurrence order in the file. A page whose file pointers resolve to no
/// usable image is dropped and logged as a fidelity loss, never an error.
pub fn resolve_pages(doc: &MetsDocument<'_, '_>) -> Vec<Page> {
    let files: HashMap<String, FileEntry> = doc
        .file_entries()
        .into_iter()
        .map(|f| (f.id.clone(), f))
        .collect();

    let mut entries = doc.physical_pages();
    entries.sort_by_key(|page| page.order.unwrap_or(i64::MAX));

    let mut pages = Vec::with_capacity(entries.len());
    for entry in entries {
        let images: Vec<PageImage> = entry
            .file_ids
            .iter()
            .filter_map(|file_id| files.get(file_id))
            .filter_map(|f| {
                let mimetype = f.mimetype.as_deref()?;
                if !PAGE_IMAGE_TYPES.contains(&mimetype) {
                    return None;
                }
                Some(PageImage {
                    file_id: f.id.clone(),
                    url: f.url.clone(),
                    mimetype: mimetype.to_string(),
                    width: None,
                    height: None,
                })
            })
            .collect();

        let label = entry
            .label
            .or(entry.order_label)
            .or_else(|| entry.order.map(|o| o.to_string()))
            .unwrap_or_else(|| "?".to_string());

        if images.is_empty() {
            warn!(
                physical_id = %entry.id,
                label = %label,
                "page has no resolvable image, dropping from sequence"
            );
            continue;
        }

        pages.push(Page {
            physical_id: entry.id,
            label,
            images,
        });
    }
    pages
}

/// Build the logical table of contents, attaching the physical page IDs
/// each division maps to via `structLink`.
pub fn toc_entries(doc: &MetsDocument<'_, '_>) -> Vec<TocEntry> {
    let mut links: HashMap<String, Vec<String>> = HashMap::new();
    for (logical_id, physical_id) in doc.struct_links() {
        links.entry(logical_id).or_default().push(physical_id);
    }

    doc.logical_divisions()
        .into_iter()
        .map(|div| to_toc_entry(div, &links))
        .collect()
}

fn to_toc_entry(
    division: super::document::LogicalDivision,
    links: &HashMap<String, Vec<String>>,
) -> TocEntry {
    let physical_ids = division
        .id
        .as_deref()
        .and_then(|id| links.get(id))
        .cloned()
        .unwrap_or_default();
    TocEntry {
        logical_id: division.id,
        label: division.label,
        division_type: division.division_type,
        physical_ids,
        children: division
            .children
            .into_iter()
            .map(|child| to_toc_entry(child, links))
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mets::SAMPLE_METS;
    use roxmltree::Document;

    #[test]
    fn pages_follow_declared_reading_order() {
        let doc = Document::parse(SAMPLE_METS).unwrap();
        let mets = MetsDocument::new(&doc).unwrap();

        let pages = resolve_pages(&mets);
        let ids: Vec<&str> = pages.iter().map(|p| p.physical_id.as_str()).collect();
        // phys4 points at a missing file and is dropped; the rest are
        // ordered by ORDER even though phys3 occurs first in the XML
        assert_eq!(ids, vec!["phys1", "phys2", "phys3"]);
    }

    #[test]
    fn page_labels_fall_back_through_attributes() {
        let doc = Document::parse(SAMPLE_METS).unwrap();
        let mets = MetsDocument::new(&doc).unwrap();

        let pages = resolve_pages(&mets);
        assert_eq!(pages[0].label, "Title page"); // LABEL
        assert_eq!(pages[1].label, "2"); // ORDER
        assert_eq!(pages[2].label, "3r"); // ORDERLABEL
    }

    #[test]
    fn non_image_pointers_are_ignored() {
        let doc = Document::parse(SAMPLE_METS).unwrap();
        let mets = MetsDocument::new(&doc).unwrap();

        let pages = resolve_pages(&mets);
        // phys1 points at img1 (jpeg) and tiff1 (tiff); only the jpeg counts
        assert_eq!(pages[0].images.len(), 1);
        assert_eq!(pages[0].images[0].file_id, "img1");
    }

    #[test]
    fn image_id_is_stable_across_resolutions() {
        let doc = Document::parse(SAMPLE_METS).unwrap();
        let mets = MetsDocument::new(&doc).unwrap();

        let first = resolve_pages(&mets);
        let second = resolve_pages(&mets);
        assert_eq!(first[0].image_id(), second[0].image_id());
        assert_ne!(first[0].image_id(), first[1].image_id());
    }

    #[test]
    fn dimensions_prefer_largest_and_smallest() {
        let mut page = Page {
            physical_id: "p1".into(),
            label: "1".into(),
            images: vec![
                PageImage {
                    file_id: "a".into(),
                    url: "http://x.test/a.jpg".into(),
                    mimetype: "image/jpeg".into(),
                    width: Some(400),
                    height: Some(600),
                },
                PageImage {
                    file_id: "b".into(),
                    url: "http://x.test/b.jpg".into(),
                    mimetype: "image/jpeg".into(),
                    width: Some(1200),
                    height: Some(1800),
                },
                PageImage {
                    file_id: "c".into(),
                    url: "http://x.test/c.jpg".into(),
                    mimetype: "image/jpeg".into(),
                    width: None,
                    height: None,
                },
            ],
        };
        assert_eq!(page.max_dimensions(), Some((1200, 1800)));
        assert_eq!(page.min_dimensions(), Some((400, 600)));

        page.images.truncate(0);
        page.images.push(PageImage {
            file_id: "c".into(),
            url: "http://x.test/c.jpg".into(),
            mimetype: "image/jpeg".into(),
            width: None,
            height: None,
        });
        assert_eq!(page.max_dimensions(), None);
    }

    #[test]
    fn toc_mirrors_nested_logical_structure() {
        let doc = Document::parse(SAMPLE_METS).unwrap();
        let mets = MetsDocument::new(&doc).unwrap();

        let toc = toc_entries(&mets);
        assert_eq!(toc.len(), 1);
        assert_eq!(toc[0].logical_id.as_deref(), Some("log1"));
        assert_eq!(toc[0].physical_ids, vec!["phys1"]);
        assert_eq!(toc[0].children.len(), 1);
        assert_eq!(toc[0].children[0].physical_ids, vec!["phys2", "phys3"]);
    }

    #[test]
    fn documents_without_struct_maps_yield_nothing() {
        let xml = r#"<mets:mets xmlns:mets="http://www.loc.gov/METS/"/>"#;
        let doc = Document::parse(xml).unwrap();
        let mets = MetsDocument::new(&doc).unwrap();

        assert!(resolve_pages(&mets).is_empty());
        assert!(toc_entries(&mets).is_empty());
    }
}
