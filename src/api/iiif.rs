//! IIIF endpoints: manifests and their sub-resources, the paginated
//! collection, image descriptors and the Image API pass-through.

use axum::{
    extract::{Path, State},
    response::{IntoResponse, Redirect},
    Json,
};

use super::error::ApiError;
use super::state::AppState;
use crate::iiif::{build_collection, CollectionEntry};
use crate::store::ManifestRecord;

fn strip_json_suffix(id: &str) -> &str {
    id.strip_suffix(".json").unwrap_or(id)
}

fn load_manifest(state: &AppState, manifest_id: &str) -> Result<ManifestRecord, ApiError> {
    state
        .repository
        .get_manifest(manifest_id)?
        .ok_or_else(|| ApiError::NotFound(format!("manifest {manifest_id}")))
}

/// GET /iiif/{manifest_id}/manifest[.json]
pub async fn manifest(
    State(state): State<AppState>,
    Path(manifest_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let record = load_manifest(&state, &manifest_id)?;
    Ok(Json(record.manifest))
}

/// GET /iiif/{manifest_id}/sequence/{sequence_id}
pub async fn sequence(
    State(state): State<AppState>,
    Path((manifest_id, sequence_id)): Path<(String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    let record = load_manifest(&state, &manifest_id)?;
    let sequence_id = strip_json_suffix(&sequence_id);
    let sequence = record
        .manifest
        .find_sequence(sequence_id)
        .ok_or_else(|| ApiError::NotFound(format!("sequence {sequence_id}")))?;
    Ok(Json(sequence.clone()))
}

/// GET /iiif/{manifest_id}/canvas/{canvas_id}
pub async fn canvas(
    State(state): State<AppState>,
    Path((manifest_id, canvas_id)): Path<(String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    let record = load_manifest(&state, &manifest_id)?;
    let canvas_id = strip_json_suffix(&canvas_id);
    let canvas = record
        .manifest
        .find_canvas(canvas_id)
        .ok_or_else(|| ApiError::NotFound(format!("canvas {canvas_id}")))?;
    Ok(Json(canvas.clone()))
}

/// GET /iiif/{manifest_id}/annotation/{annotation_id}
pub async fn annotation(
    State(state): State<AppState>,
    Path((manifest_id, annotation_id)): Path<(String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    let record = load_manifest(&state, &manifest_id)?;
    let annotation_id = strip_json_suffix(&annotation_id);
    let annotation = record
        .manifest
        .find_annotation(annotation_id)
        .ok_or_else(|| ApiError::NotFound(format!("annotation {annotation_id}")))?;
    Ok(Json(annotation.clone()))
}

/// GET /iiif/{manifest_id}/range/{range_id}
pub async fn range(
    State(state): State<AppState>,
    Path((manifest_id, range_id)): Path<(String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    let record = load_manifest(&state, &manifest_id)?;
    let range_id = strip_json_suffix(&range_id);
    let range = record
        .manifest
        .find_range(range_id)
        .ok_or_else(|| ApiError::NotFound(format!("range {range_id}")))?;
    Ok(Json(range.clone()))
}

fn collection_label(state: &AppState) -> String {
    format!(
        "All manifests available at {}",
        state.config.server.base_url
    )
}

fn collection_entry(record: &ManifestRecord) -> CollectionEntry {
    CollectionEntry {
        manifest_id: record.id.clone(),
        label: record.label.clone(),
        attribution: record.manifest.attribution.clone(),
        logo: record.manifest.logo.clone(),
        thumbnail: record.manifest.thumbnail.clone().or_else(|| {
            record
                .manifest
                .sequences
                .first()
                .and_then(|sequence| sequence.canvases.first())
                .and_then(|canvas| canvas.thumbnail.clone())
        }),
    }
}

/// GET /iiif/collection/{collection_id} — top view of the collection.
/// Only the `index` collection of all manifests exists.
pub async fn collection_top(
    State(state): State<AppState>,
    Path(collection_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    if collection_id != "index" {
        return Err(ApiError::NotFound(format!("collection {collection_id}")));
    }
    let total = state.repository.manifest_count()?;
    let collection = build_collection(
        None,
        &[],
        total,
        state.config.server.items_per_page,
        &collection_label(&state),
        &collection_id,
        &state.config.server.base_url,
    );
    Ok(Json(collection))
}

/// GET /iiif/collection/{collection_id}/p{n} — one collection page
pub async fn collection_page(
    State(state): State<AppState>,
    Path((collection_id, page_id)): Path<(String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    if collection_id != "index" {
        return Err(ApiError::NotFound(format!("collection {collection_id}")));
    }
    if page_id == "top" {
        return collection_top(State(state), Path(collection_id))
            .await
            .map(IntoResponse::into_response);
    }
    let page_num: usize = page_id
        .strip_prefix('p')
        .and_then(|n| n.parse().ok())
        .filter(|n| *n >= 1)
        .ok_or_else(|| ApiError::InvalidPayload(format!("invalid collection page: {page_id}")))?;

    let per_page = state.config.server.items_per_page;
    let (records, total) = state.repository.recent_manifests(page_num, per_page)?;
    let entries: Vec<CollectionEntry> = records.iter().map(collection_entry).collect();
    let collection = build_collection(
        Some(page_num),
        &entries,
        total,
        per_page,
        &collection_label(&state),
        &collection_id,
        &state.config.server.base_url,
    );
    Ok(Json(collection).into_response())
}

/// GET /iiif/image/{image_id}/info.json
pub async fn image_info(
    State(state): State<AppState>,
    Path(image_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let record = state
        .repository
        .get_image(&image_id)?
        .ok_or_else(|| ApiError::NotFound(format!("image {image_id}")))?;
    Ok(Json(record.info))
}

/// Validated subset of the Image API `size` parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeConstraint {
    Full,
    Width(u32),
    Height(u32),
    Exact(u32, u32),
}

impl SizeConstraint {
    /// Grammar: `full`/`max` (no resize), `w,` (width only), `,h` (height
    /// only), `w,h` (both). Anything else is a client error.
    pub fn parse(raw: &str) -> Result<Self, String> {
        fn positive(value: &str) -> Result<u32, String> {
            value
                .parse::<u32>()
                .ok()
                .filter(|v| *v > 0)
                .ok_or_else(|| format!("invalid size value: {value}"))
        }

        match raw {
            "full" | "max" => Ok(SizeConstraint::Full),
            _ => {
                if let Some(height) = raw.strip_prefix(',') {
                    Ok(SizeConstraint::Height(positive(height)?))
                } else if let Some(width) = raw.strip_suffix(',') {
                    Ok(SizeConstraint::Width(positive(width)?))
                } else if let Some((width, height)) = raw.split_once(',') {
                    Ok(SizeConstraint::Exact(positive(width)?, positive(height)?))
                } else {
                    Err(format!("invalid size: {raw}"))
                }
            }
        }
    }

    pub fn dimensions(self) -> (Option<u32>, Option<u32>) {
        match self {
            SizeConstraint::Full => (None, None),
            SizeConstraint::Width(w) => (Some(w), None),
            SizeConstraint::Height(h) => (None, Some(h)),
            SizeConstraint::Exact(w, h) => (Some(w), Some(h)),
        }
    }
}

/// GET /iiif/image/{image_id}/{region}/{size}/{rotation}/{quality}.{format}
///
/// Pass-through subset only: `region=full`, `rotation=0`, `quality` in
/// `default`/`native`. Anything outside the subset is `501`; a malformed
/// `size` is the client's error. Responds with a `303` redirect to the
/// stored backing image, or `501` when no stored file satisfies the
/// request.
pub async fn image_request(
    State(state): State<AppState>,
    Path((image_id, region, size, rotation, quality_format)): Path<(
        String,
        String,
        String,
        String,
        String,
    )>,
) -> Result<impl IntoResponse, ApiError> {
    if region != "full" {
        return Err(ApiError::NotImplemented(format!(
            "region must be 'full', got '{region}'"
        )));
    }
    if rotation != "0" {
        return Err(ApiError::NotImplemented(format!(
            "rotation must be '0', got '{rotation}'"
        )));
    }
    let (quality, format_ext) = quality_format
        .rsplit_once('.')
        .ok_or_else(|| ApiError::InvalidPayload("missing image format extension".to_string()))?;
    if !matches!(quality, "default" | "native") {
        return Err(ApiError::NotImplemented(format!(
            "quality must be 'default' or 'native', got '{quality}'"
        )));
    }
    let size = SizeConstraint::parse(&size).map_err(ApiError::InvalidPayload)?;

    let record = state
        .repository
        .get_image(&image_id)?
        .ok_or_else(|| ApiError::NotFound(format!("image {image_id}")))?;

    let format = mime_guess::from_ext(format_ext)
        .first()
        .filter(|m| m.type_() == mime::IMAGE)
        .map(|m| m.essence_str().to_string());
    let Some(format) = format else {
        return Err(ApiError::NotImplemented(format!(
            "unknown image format: {format_ext}"
        )));
    };

    let (width, height) = size.dimensions();
    let url = record
        .best_url(Some(format.as_str()), width, height)
        .ok_or_else(|| {
            ApiError::NotImplemented(format!(
                "no stored rendition satisfies format={format} width={width:?} height={height:?}"
            ))
        })?
        .to_string();

    Ok(Redirect::to(&url))
}

#[cfg(test)]
mod tests {
    use super::SizeConstraint;

    #[test]
    fn size_grammar_accepts_supported_forms() {
        assert_eq!(SizeConstraint::parse("full"), Ok(SizeConstraint::Full));
        assert_eq!(SizeConstraint::parse("max"), Ok(SizeConstraint::Full));
        assert_eq!(
            SizeConstraint::parse("300,"),
            Ok(SizeConstraint::Width(300))
        );
        assert_eq!(
            SizeConstraint::parse(",150"),
            Ok(SizeConstraint::Height(150))
        );
        assert_eq!(
            SizeConstraint::parse("300,150"),
            Ok(SizeConstraint::Exact(300, 150))
        );
    }

    #[test]
    fn size_grammar_rejects_malformed_values() {
        for raw in ["", ",", "abc", "abc,", ",abc", "300x150", "0,", ",0", "-3,"] {
            assert!(SizeConstraint::parse(raw).is_err(), "accepted {raw:?}");
        }
    }

    #[test]
    fn dimensions_mapping() {
        assert_eq!(SizeConstraint::Full.dimensions(), (None, None));
        assert_eq!(SizeConstraint::Width(300).dimensions(), (Some(300), None));
        assert_eq!(SizeConstraint::Height(150).dimensions(), (None, Some(150)));
        assert_eq!(
            SizeConstraint::Exact(300, 150).dimensions(),
            (Some(300), Some(150))
        );
    }
}
