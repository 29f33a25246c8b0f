//! Paginated IIIF collection views over the stored manifests.

use super::types::{Collection, CollectionManifest, ImageRef, PRESENTATION_CONTEXT};

/// The data needed to list one manifest inside a collection page
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionEntry {
    pub manifest_id: String,
    pub label: String,
    pub attribution: Option<String>,
    pub logo: Option<String>,
    pub thumbnail: Option<ImageRef>,
}

/// Build one view of a paginated collection.
///
/// With `page_num == None` the top view is produced, carrying only
/// `first`/`last` links. A numbered page lists its manifests and links
/// `next` iff a further non-empty page exists and `prev` when there is an
/// earlier one.
pub fn build_collection(
    page_num: Option<usize>,
    entries: &[CollectionEntry],
    total: usize,
    per_page: usize,
    label: &str,
    collection_id: &str,
    base_url: &str,
) -> Collection {
    let collection_url = format!("{base_url}/iiif/collection/{collection_id}");
    let page_count = total.div_ceil(per_page).max(1);

    let Some(page_num) = page_num else {
        return Collection {
            context: PRESENTATION_CONTEXT.to_string(),
            id: format!("{collection_url}/top"),
            resource_type: "sc:Collection".to_string(),
            label: label.to_string(),
            total,
            first: Some(format!("{collection_url}/p1")),
            last: Some(format!("{collection_url}/p{page_count}")),
            start_index: None,
            manifests: None,
            next: None,
            prev: None,
        };
    };

    let manifests = entries
        .iter()
        .map(|entry| CollectionManifest {
            id: format!("{base_url}/iiif/{}/manifest", entry.manifest_id),
            resource_type: "sc:Manifest".to_string(),
            label: entry.label.clone(),
            attribution: entry.attribution.clone(),
            logo: entry.logo.clone(),
            thumbnail: entry.thumbnail.clone(),
        })
        .collect();

    Collection {
        context: PRESENTATION_CONTEXT.to_string(),
        id: format!("{collection_url}/p{page_num}"),
        resource_type: "sc:Collection".to_string(),
        label: label.to_string(),
        total,
        first: None,
        last: None,
        start_index: Some((page_num - 1) * per_page),
        manifests: Some(manifests),
        next: (page_num < page_count).then(|| format!("{collection_url}/p{}", page_num + 1)),
        prev: (page_num > 1).then(|| format!("{collection_url}/p{}", page_num - 1)),
    }
}
