use crate::model::{AnnotatorId, LocalId};
use ahash::AHashMap;

/// One rewritten identifier: `creator` produced `original_id`, which another creator had already
/// used, so it is displayed as `display_id`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RemapEntry {
    pub original_id: LocalId,
    pub creator: AnnotatorId,
    pub display_id: String,
}

/// Insertion-ordered map from `(original id, creator)` to the disambiguated display id. The
/// composer fills it while walking the entities and reads it back when rewriting relation
/// endpoints.
#[derive(Debug, Clone, Default)]
pub struct IdRemap {
    entries: Vec<RemapEntry>,
    index: AHashMap<LocalId, AHashMap<AnnotatorId, usize>>,
}

impl IdRemap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a mapping. The first mapping recorded for a key wins; returns `false` when the key
    /// was already present.
    pub(crate) fn insert(
        &mut self,
        original_id: LocalId,
        creator: AnnotatorId,
        display_id: String,
    ) -> bool {
        let by_creator = self.index.entry(original_id.clone()).or_default();
        if by_creator.contains_key(&creator) {
            return false;
        }
        by_creator.insert(creator.clone(), self.entries.len());
        self.entries.push(RemapEntry {
            original_id,
            creator,
            display_id,
        });
        true
    }

    pub fn get(&self, original_id: &LocalId, creator: &AnnotatorId) -> Option<&str> {
        self.index
            .get(original_id)
            .and_then(|by_creator| by_creator.get(creator))
            .map(|i| self.entries[*i].display_id.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
    pub fn iter(&self) -> std::slice::Iter<'_, RemapEntry> {
        self.entries.iter()
    }
}

/// Two tables are equal when they hold the same mappings in the same order.
impl PartialEq for IdRemap {
    fn eq(&self, other: &Self) -> bool {
        self.entries == other.entries
    }
}
impl Eq for IdRemap {}
