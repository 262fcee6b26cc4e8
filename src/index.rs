//! Annotation index over one or more split files.
//!
//! Loading validates every cross reference eagerly, so a conversion pass never
//! meets a dangling image or category id. All lookups are hash based.

use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use crate::error::CococonvError;
use crate::ir::io_coco_json::{from_coco_str, read_coco_json};
use crate::ir::{Annotation, Category, CategoryId, Dataset, Image, ImageId, Split};

/// Images and their annotations for one split, in source order.
#[derive(Clone, Debug)]
pub struct SplitIndex {
    split: Split,
    source: PathBuf,
    images: Vec<Image>,
    image_by_id: HashMap<ImageId, usize>,
    /// Parallel to `images`.
    annotations_by_image: Vec<Vec<Annotation>>,
}

impl SplitIndex {
    pub fn split(&self) -> Split {
        self.split
    }

    /// The file this split was loaded from.
    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn images(&self) -> &[Image] {
        &self.images
    }

    pub fn image(&self, id: ImageId) -> Option<&Image> {
        self.image_by_id.get(&id).map(|&idx| &self.images[idx])
    }

    /// Annotations of `id` in source order; empty for unknown ids.
    pub fn annotations_for(&self, id: ImageId) -> &[Annotation] {
        self.image_by_id
            .get(&id)
            .map(|&idx| self.annotations_by_image[idx].as_slice())
            .unwrap_or_default()
    }

    /// Each image paired with its (possibly empty) annotations.
    pub fn iter(&self) -> impl Iterator<Item = (&Image, &[Annotation])> {
        self.images
            .iter()
            .zip(self.annotations_by_image.iter().map(Vec::as_slice))
    }

    pub fn annotation_count(&self) -> usize {
        self.annotations_by_image.iter().map(Vec::len).sum()
    }
}

/// The loaded source collection.
#[derive(Clone, Debug, Default)]
pub struct AnnotationIndex {
    categories: Vec<Category>,
    category_by_id: HashMap<CategoryId, usize>,
    splits: Vec<SplitIndex>,
}

impl AnnotationIndex {
    /// Loads one COCO file per split.
    ///
    /// # Errors
    /// [`CococonvError::MalformedSource`] for missing collections, zero-sized
    /// images, duplicate ids, conflicting category names across files, or
    /// annotations that reference unknown images or categories.
    pub fn load(sources: &[(Split, PathBuf)]) -> Result<Self, CococonvError> {
        let mut index = Self::default();
        for (split, path) in sources {
            log::info!("loading {split} annotations from {}", path.display());
            let dataset = read_coco_json(path, *split)?;
            index.add_split(*split, path, dataset)?;
        }
        Ok(index)
    }

    /// Builds an index from in-memory JSON documents.
    pub fn from_sources(sources: &[(Split, &str)]) -> Result<Self, CococonvError> {
        let mut index = Self::default();
        for (split, json) in sources {
            let origin = PathBuf::from(format!("<{split}>"));
            let dataset = from_coco_str(json, *split, &origin)?;
            index.add_split(*split, &origin, dataset)?;
        }
        Ok(index)
    }

    /// Categories merged across all split files, in first-seen order.
    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    pub fn category(&self, id: CategoryId) -> Option<&Category> {
        self.category_by_id.get(&id).map(|&idx| &self.categories[idx])
    }

    /// Splits in load order.
    pub fn splits(&self) -> &[SplitIndex] {
        &self.splits
    }

    pub fn split(&self, split: Split) -> Option<&SplitIndex> {
        self.splits.iter().find(|s| s.split == split)
    }

    pub fn image_count(&self) -> usize {
        self.splits.iter().map(|s| s.images.len()).sum()
    }

    pub fn annotation_count(&self) -> usize {
        self.splits.iter().map(SplitIndex::annotation_count).sum()
    }

    fn add_split(
        &mut self,
        split: Split,
        path: &Path,
        dataset: Dataset,
    ) -> Result<(), CococonvError> {
        let malformed = |message: String| CococonvError::MalformedSource {
            path: path.to_path_buf(),
            message,
        };

        if self.split(split).is_some() {
            return Err(malformed(format!("split '{split}' was given more than once")));
        }

        let mut seen_here = HashSet::with_capacity(dataset.categories.len());
        for category in dataset.categories {
            if !seen_here.insert(category.id) {
                return Err(malformed(format!("duplicate category id {}", category.id)));
            }
            match self.category_by_id.entry(category.id) {
                Entry::Occupied(entry) => {
                    let existing = &self.categories[*entry.get()];
                    if existing.name != category.name {
                        return Err(malformed(format!(
                            "category {} is named '{}' here but '{}' in an earlier file",
                            category.id, category.name, existing.name
                        )));
                    }
                }
                Entry::Vacant(entry) => {
                    entry.insert(self.categories.len());
                    self.categories.push(category);
                }
            }
        }

        let mut image_by_id = HashMap::with_capacity(dataset.images.len());
        for (idx, image) in dataset.images.iter().enumerate() {
            if image.width == 0 || image.height == 0 {
                return Err(malformed(format!(
                    "image {} ('{}') has invalid dimensions {}x{}",
                    image.id, image.file_name, image.width, image.height
                )));
            }
            if image_by_id.insert(image.id, idx).is_some() {
                return Err(malformed(format!("duplicate image id {}", image.id)));
            }
        }

        let mut annotations_by_image = vec![Vec::new(); dataset.images.len()];
        for annotation in dataset.annotations {
            let Some(&image_idx) = image_by_id.get(&annotation.image_id) else {
                return Err(malformed(format!(
                    "annotation {} references unknown image {}",
                    annotation.id, annotation.image_id
                )));
            };
            if !self.category_by_id.contains_key(&annotation.category_id) {
                return Err(malformed(format!(
                    "annotation {} references unknown category {}",
                    annotation.id, annotation.category_id
                )));
            }
            annotations_by_image[image_idx].push(annotation);
        }

        log::debug!(
            "{split}: {} image(s), {} annotation(s)",
            dataset.images.len(),
            annotations_by_image.iter().map(Vec::len).sum::<usize>()
        );

        self.splits.push(SplitIndex {
            split,
            source: path.to_path_buf(),
            images: dataset.images,
            image_by_id,
            annotations_by_image,
        });
        Ok(())
    }
}
