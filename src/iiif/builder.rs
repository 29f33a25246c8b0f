//! Builds the IIIF Presentation object graph from extracted metadata and
//! the resolved page sequence.

use serde_json::Value;
use tracing::warn;

use crate::mets::{DocumentMetadata, Page, TocEntry};

use super::types::{
    Annotation, Canvas, ImageInfo, ImageRef, ImageResource, ImageService, ImageSize, Manifest,
    MetadataEntry, Range, SeeAlso, Sequence, IMAGE_CONTEXT, IMAGE_PROFILE, IMAGE_PROTOCOL,
    PRESENTATION_CONTEXT,
};

/// Nominal canvas dimensions used when a page's pixel size is unknown
pub const DEFAULT_CANVAS_WIDTH: u32 = 1000;
pub const DEFAULT_CANVAS_HEIGHT: u32 = 1500;

/// Mapping from license shorthands found in METS rights sections to URIs
const LICENSE_MAP: [(&str, &str); 8] = [
    ("pdm", "http://creativecommons.org/licenses/publicdomain/"),
    ("cc0", "https://creativecommons.org/publicdomain/zero/1.0/"),
    ("cc-by", "http://creativecommons.org/licenses/by/4.0"),
    ("cc-by-sa", "http://creativecommons.org/licenses/by-sa/4.0"),
    ("cc-by-nd", "http://creativecommons.org/licenses/by-nd/4.0"),
    ("cc-by-nc", "http://creativecommons.org/licenses/by-nc/4.0"),
    ("cc-by-nc-sa", "http://creativecommons.org/licenses/by-nc-sa/4.0"),
    ("cc-by-nc-nd", "http://creativecommons.org/licenses/by-nc-nd/4.0"),
];

/// Build the manifest for one document.
///
/// Deterministic: identical inputs produce byte-identical JSON.
pub fn build_manifest(
    metadata: &DocumentMetadata,
    pages: &[Page],
    toc: &[TocEntry],
    manifest_id: &str,
    base_url: &str,
) -> Manifest {
    let manifest_base = format!("{base_url}/iiif/{manifest_id}");
    let image_base = format!("{base_url}/iiif/image");

    let canvases: Vec<Canvas> = pages
        .iter()
        .map(|page| build_canvas(page, &manifest_base, &image_base))
        .collect();

    let sequence = Sequence {
        id: format!("{manifest_base}/sequence/default"),
        resource_type: "sc:Sequence".to_string(),
        canvases,
    };

    let structures = build_ranges(toc, &sequence, &manifest_base);
    let thumbnail = sequence
        .canvases
        .first()
        .and_then(|canvas| canvas.thumbnail.clone());

    Manifest {
        context: PRESENTATION_CONTEXT.to_string(),
        id: format!("{manifest_base}/manifest"),
        resource_type: "sc:Manifest".to_string(),
        label: metadata.label(),
        metadata: display_metadata(metadata),
        description: metadata.description.clone(),
        attribution: metadata.attribution.owner.clone(),
        logo: metadata.attribution.logo.clone(),
        license: metadata
            .license
            .as_deref()
            .and_then(license_uri)
            .map(str::to_string),
        related: metadata.related.clone(),
        see_also: metadata
            .see_also
            .iter()
            .map(|s| SeeAlso {
                id: s.url.clone(),
                format: s.format.clone(),
                profile: s.profile.clone(),
            })
            .collect(),
        thumbnail,
        sequences: vec![sequence],
        structures,
    }
}

fn build_canvas(page: &Page, manifest_base: &str, image_base: &str) -> Canvas {
    let image_id = page.image_id();
    let (width, height) = page.max_dimensions().unwrap_or_else(|| {
        warn!(
            physical_id = %page.physical_id,
            "page dimensions unknown, using approximate nominal canvas size"
        );
        (DEFAULT_CANVAS_WIDTH, DEFAULT_CANVAS_HEIGHT)
    });

    let thumbnail = page.min_dimensions().map(|(w, h)| ImageRef {
        id: format!("{image_base}/{image_id}/full/{w},{h}/0/default.jpg"),
        resource_type: "dctypes:Image".to_string(),
        width: Some(w),
        height: Some(h),
    });

    let canvas_id = format!("{manifest_base}/canvas/{}", page.physical_id);
    Canvas {
        id: canvas_id.clone(),
        resource_type: "sc:Canvas".to_string(),
        label: page.label.clone(),
        width,
        height,
        thumbnail,
        images: vec![Annotation {
            id: format!("{manifest_base}/annotation/{}", page.physical_id),
            resource_type: "oa:Annotation".to_string(),
            motivation: "sc:painting".to_string(),
            resource: ImageResource {
                id: format!("{image_base}/{image_id}/full/full/0/default.jpg"),
                resource_type: "dctypes:Image".to_string(),
                format: "image/jpeg".to_string(),
                width,
                height,
                service: ImageService {
                    context: IMAGE_CONTEXT.to_string(),
                    id: format!("{image_base}/{image_id}"),
                    profile: IMAGE_PROFILE.to_string(),
                },
            },
            on: canvas_id,
        }],
    }
}

/// Ranges mirror the logical TOC. Entries without a label or without any
/// mapped page are skipped; an entry's range covers its own canvases plus
/// those of all descendants.
fn build_ranges(toc: &[TocEntry], sequence: &Sequence, manifest_base: &str) -> Vec<Range> {
    let mut ranges = Vec::new();
    collect_ranges(toc, sequence, manifest_base, &mut ranges);
    ranges
}

fn collect_ranges(
    entries: &[TocEntry],
    sequence: &Sequence,
    manifest_base: &str,
    out: &mut Vec<Range>,
) {
    for entry in entries {
        if let (Some(logical_id), Some(label)) = (&entry.logical_id, &entry.label) {
            let canvases = entry_canvases(entry, sequence, manifest_base);
            if !canvases.is_empty() {
                let ranges = entry
                    .children
                    .iter()
                    .filter_map(|child| {
                        let child_id = child.logical_id.as_deref()?;
                        child.label.as_ref()?;
                        if entry_canvases(child, sequence, manifest_base).is_empty() {
                            return None;
                        }
                        Some(format!("{manifest_base}/range/{child_id}"))
                    })
                    .collect();
                out.push(Range {
                    id: format!("{manifest_base}/range/{logical_id}"),
                    resource_type: "sc:Range".to_string(),
                    label: label.clone(),
                    canvases,
                    ranges,
                });
            }
        }
        collect_ranges(&entry.children, sequence, manifest_base, out);
    }
}

fn entry_canvases(entry: &TocEntry, sequence: &Sequence, manifest_base: &str) -> Vec<String> {
    let mut ids = Vec::new();
    for physical_id in &entry.physical_ids {
        let canvas_id = format!("{manifest_base}/canvas/{physical_id}");
        if sequence.canvases.iter().any(|c| c.id == canvas_id) {
            ids.push(canvas_id);
        } else {
            warn!(%physical_id, "no matching canvas for TOC entry page");
        }
    }
    for child in &entry.children {
        ids.extend(entry_canvases(child, sequence, manifest_base));
    }
    ids
}

fn display_metadata(metadata: &DocumentMetadata) -> Vec<MetadataEntry> {
    let mut entries = Vec::new();
    if !metadata.titles.is_empty() {
        entries.push(MetadataEntry {
            label: "Title".to_string(),
            value: string_or_list(&metadata.titles),
        });
    }
    if !metadata.creators.is_empty() {
        entries.push(MetadataEntry {
            label: "Creator".to_string(),
            value: string_or_list(&metadata.creators),
        });
    }
    if let Some(language) = &metadata.language {
        entries.push(MetadataEntry {
            label: "Language".to_string(),
            value: Value::String(language.clone()),
        });
    }
    if let Some(genre) = &metadata.genre {
        entries.push(MetadataEntry {
            label: "Genre".to_string(),
            value: Value::String(genre.clone()),
        });
    }
    for (id_type, value) in &metadata.identifiers {
        entries.push(MetadataEntry {
            label: format!("Identifier ({id_type})"),
            value: Value::String(value.clone()),
        });
    }
    entries
}

fn string_or_list(values: &[String]) -> Value {
    if values.len() == 1 {
        Value::String(values[0].clone())
    } else {
        Value::Array(values.iter().cloned().map(Value::String).collect())
    }
}

fn license_uri(shorthand: &str) -> Option<&'static str> {
    LICENSE_MAP
        .iter()
        .find(|(key, _)| *key == shorthand)
        .map(|(_, uri)| *uri)
}

/// Build the Image API descriptor for one page image record.
pub fn build_image_info(
    image_id: &str,
    sizes: &[(u32, u32)],
    base_url: &str,
) -> ImageInfo {
    let mut known: Vec<ImageSize> = sizes
        .iter()
        .map(|&(width, height)| ImageSize { width, height })
        .collect();
    known.sort_by_key(|s| (s.width, s.height));

    let (width, height) = known
        .last()
        .map(|s| (s.width, s.height))
        .unwrap_or((DEFAULT_CANVAS_WIDTH, DEFAULT_CANVAS_HEIGHT));

    ImageInfo {
        context: IMAGE_CONTEXT.to_string(),
        id: format!("{base_url}/iiif/image/{image_id}"),
        protocol: IMAGE_PROTOCOL.to_string(),
        profile: vec![IMAGE_PROFILE.to_string()],
        width,
        height,
        sizes: known,
    }
}
