//! Typed records for one source annotation collection.
//!
//! COCO documents are deserialized into private schema structs and then
//! converted into these records, so the rest of the crate never touches
//! loosely typed JSON.

use serde::Serialize;
use std::fmt;

use super::bbox::ImageDims;
use super::convention::RawBox;
use super::ids::{AnnotationId, CategoryId, ImageId};

/// A named dataset partition, fixed when the source file is loaded.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Split {
    Train,
    Val,
}

impl Split {
    pub const ALL: [Split; 2] = [Split::Train, Split::Val];

    pub fn name(&self) -> &'static str {
        match self {
            Split::Train => "train",
            Split::Val => "val",
        }
    }

    /// File name of this split's manifest at the output root.
    pub fn manifest_name(&self) -> String {
        format!("{}.txt", self.name())
    }
}

impl fmt::Display for Split {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// All records of one source file.
#[derive(Clone, Debug, Default)]
pub struct Dataset {
    pub images: Vec<Image>,
    pub categories: Vec<Category>,
    pub annotations: Vec<Annotation>,
}

/// An image of a split.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Image {
    pub id: ImageId,
    /// Path of the image relative to the split's image directory.
    pub file_name: String,
    pub width: u32,
    pub height: u32,
    pub split: Split,
}

impl Image {
    pub fn new(
        id: impl Into<ImageId>,
        file_name: impl Into<String>,
        width: u32,
        height: u32,
        split: Split,
    ) -> Self {
        Self {
            id: id.into(),
            file_name: file_name.into(),
            width,
            height,
            split,
        }
    }

    pub fn dims(&self) -> ImageDims {
        ImageDims::new(self.width, self.height)
    }
}

/// A category (class label).
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supercategory: Option<String>,
}

impl Category {
    pub fn new(id: impl Into<CategoryId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            supercategory: None,
        }
    }
}

/// A source annotation. The box is kept exactly as the source spelled it;
/// repair happens later in [`crate::normalize`].
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Annotation {
    pub id: AnnotationId,
    pub image_id: ImageId,
    pub category_id: CategoryId,
    pub bbox: RawBox,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub iscrowd: bool,
}

impl Annotation {
    pub fn new(
        id: impl Into<AnnotationId>,
        image_id: impl Into<ImageId>,
        category_id: impl Into<CategoryId>,
        bbox: RawBox,
    ) -> Self {
        Self {
            id: id.into(),
            image_id: image_id.into(),
            category_id: category_id.into(),
            bbox,
            iscrowd: false,
        }
    }
}
