use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::id::ObjectId;

/// Non-owning cross-references from an object to at most one foreign object
/// per id space.
///
/// Optional subsystems use annotations to attach per-object metadata without
/// modifying the base type. The map is ordered so serialization is
/// deterministic.
#[derive(Clone, Default, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct AnnotationMap(BTreeMap<u8, ObjectId>);

impl AnnotationMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// The annotation for `space`, or `None` if the object carries none.
    pub fn get_annotation(&self, space: u8) -> Option<ObjectId> {
        self.0.get(&space).copied()
    }

    /// Attach `id` as the annotation for its own space, replacing any
    /// previous annotation in that space.
    pub fn set_annotation(&mut self, id: ObjectId) {
        self.0.insert(id.space, id);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_annotation_is_none() {
        let map = AnnotationMap::new();
        assert_eq!(map.get_annotation(3), None);
    }

    #[test]
    fn at_most_one_per_space() {
        let mut map = AnnotationMap::new();
        map.set_annotation(ObjectId::new(3, 1, 10));
        map.set_annotation(ObjectId::new(3, 2, 20));
        map.set_annotation(ObjectId::new(4, 1, 30));

        assert_eq!(map.len(), 2);
        assert_eq!(map.get_annotation(3), Some(ObjectId::new(3, 2, 20)));
        assert_eq!(map.get_annotation(4), Some(ObjectId::new(4, 1, 30)));
    }
}
