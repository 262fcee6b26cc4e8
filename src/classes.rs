//! Class filtering and dense zero-based index remapping.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::error::CococonvError;
use crate::ir::{Category, CategoryId};

pub const CLASSES_TXT: &str = "classes.txt";

/// Source category ids mapped onto output class indices `0..len`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ClassMap {
    names: Vec<String>,
    index_by_category: HashMap<CategoryId, usize>,
}

impl ClassMap {
    /// Builds the mapping.
    ///
    /// Without an allow-list every category gets an index in source order.
    /// With one, indices follow the allow-list order and unlisted categories
    /// are filtered out; a repeated name keeps its first position.
    ///
    /// # Errors
    /// [`CococonvError::UnknownClass`] when the allow-list names a class that
    /// no category carries.
    pub fn build(
        categories: &[Category],
        allow_list: Option<&[String]>,
    ) -> Result<Self, CococonvError> {
        let Some(allow_list) = allow_list else {
            let mut map = Self::default();
            for category in categories {
                let index = match map.names.iter().position(|n| n == &category.name) {
                    Some(index) => index,
                    None => {
                        map.names.push(category.name.clone());
                        map.names.len() - 1
                    }
                };
                map.index_by_category.insert(category.id, index);
            }
            return Ok(map);
        };

        let mut names: Vec<String> = Vec::with_capacity(allow_list.len());
        for name in allow_list {
            if !names.contains(name) {
                names.push(name.clone());
            }
        }

        let mut index_by_category = HashMap::new();
        for (index, name) in names.iter().enumerate() {
            let mut found = false;
            for category in categories.iter().filter(|c| &c.name == name) {
                index_by_category.insert(category.id, index);
                found = true;
            }
            if !found {
                let known: Vec<&str> = categories.iter().map(|c| c.name.as_str()).collect();
                return Err(CococonvError::UnknownClass {
                    class: name.clone(),
                    message: format!(
                        "not among the source categories ({})",
                        known.join(", ")
                    ),
                });
            }
        }

        Ok(Self {
            names,
            index_by_category,
        })
    }

    pub fn is_allowed(&self, category_id: CategoryId) -> bool {
        self.index_by_category.contains_key(&category_id)
    }

    /// Output index of `category_id`, or `None` when it is filtered out.
    pub fn remap(&self, category_id: CategoryId) -> Option<usize> {
        self.index_by_category.get(&category_id).copied()
    }

    /// Output class names; position = output index.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// Writes `classes.txt` at `root`, one name per line.
pub fn write_classes_txt(root: &Path, names: &[String]) -> Result<(), CococonvError> {
    let mut text = names.join("\n");
    if !text.is_empty() {
        text.push('\n');
    }
    fs::write(root.join(CLASSES_TXT), text).map_err(CococonvError::Io)
}

/// Reads `classes.txt` from `root`, ignoring blank lines.
pub fn read_classes_txt(root: &Path) -> Result<Vec<String>, CococonvError> {
    let path = root.join(CLASSES_TXT);
    let content = fs::read_to_string(&path).map_err(CococonvError::Io)?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(ToOwned::to_owned)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn categories() -> Vec<Category> {
        vec![
            Category::new(1u64, "cat"),
            Category::new(2u64, "dog"),
            Category::new(3u64, "bird"),
        ]
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn allow_list_order_defines_indices() {
        let allow = names(&["cat", "dog"]);
        let map = ClassMap::build(&categories(), Some(&allow)).expect("build");

        assert_eq!(map.remap(CategoryId(1)), Some(0));
        assert_eq!(map.remap(CategoryId(2)), Some(1));
        assert_eq!(map.remap(CategoryId(3)), None);
        assert!(!map.is_allowed(CategoryId(3)));
        assert_eq!(map.names(), ["cat", "dog"]);
    }

    #[test]
    fn allow_list_may_reorder_and_repeat() {
        let allow = names(&["bird", "cat", "bird"]);
        let map = ClassMap::build(&categories(), Some(&allow)).expect("build");
        assert_eq!(map.names(), ["bird", "cat"]);
        assert_eq!(map.remap(CategoryId(3)), Some(0));
        assert_eq!(map.remap(CategoryId(1)), Some(1));
    }

    #[test]
    fn no_allow_list_keeps_source_order() {
        let cats = vec![
            Category::new(90u64, "zebra"),
            Category::new(4u64, "apple"),
        ];
        let map = ClassMap::build(&cats, None).expect("build");
        assert_eq!(map.names(), ["zebra", "apple"]);
        assert_eq!(map.remap(CategoryId(4)), Some(1));
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn unknown_allow_list_name_fails() {
        let allow = names(&["cat", "unicorn"]);
        let err = ClassMap::build(&categories(), Some(&allow)).unwrap_err();
        match err {
            CococonvError::UnknownClass { class, .. } => assert_eq!(class, "unicorn"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn identical_input_gives_identical_map() {
        let allow = names(&["dog", "cat"]);
        let first = ClassMap::build(&categories(), Some(&allow)).expect("build");
        let second = ClassMap::build(&categories(), Some(&allow)).expect("build");
        assert_eq!(first, second);
    }

    #[test]
    fn classes_txt_roundtrip() {
        let temp = tempfile::tempdir().expect("create temp dir");
        write_classes_txt(temp.path(), &names(&["cat", "traffic light"])).expect("write");
        assert_eq!(
            fs::read_to_string(temp.path().join(CLASSES_TXT)).expect("read"),
            "cat\ntraffic light\n"
        );
        assert_eq!(
            read_classes_txt(temp.path()).expect("read classes"),
            ["cat", "traffic light"]
        );
    }
}
