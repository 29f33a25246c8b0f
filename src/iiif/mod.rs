//! IIIF Presentation API (2.x) object graph and builders.

pub mod builder;
pub mod collection;
pub mod types;

pub use builder::{build_image_info, build_manifest, DEFAULT_CANVAS_HEIGHT, DEFAULT_CANVAS_WIDTH};
pub use collection::{build_collection, CollectionEntry};
pub use types::{
    Annotation, Canvas, Collection, ImageInfo, ImageRef, Manifest, MetadataEntry, Range, Sequence,
};
