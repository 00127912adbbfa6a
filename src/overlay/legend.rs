use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::fmt::Display;

/// Index of an annotator in the legend of a composed view. `0` is always the requesting user and
/// `-1` the prediction engine. Other annotators get dense positive slots in order of appearance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Slot(pub i32);

impl Slot {
    pub const USER: Slot = Slot(0);
    pub const PREDICTION: Slot = Slot(-1);

    pub fn is_user(&self) -> bool {
        *self == Self::USER
    }
    pub fn is_prediction(&self) -> bool {
        *self == Self::PREDICTION
    }
}

impl Default for Slot {
    fn default() -> Self {
        Self::USER
    }
}

impl Display for Slot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Name and color shown for one annotator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LegendEntry {
    pub name: String,
    pub color: String,
}

impl LegendEntry {
    pub fn new<S: Into<String>>(name: S, color: S) -> Self {
        LegendEntry {
            name: name.into(),
            color: color.into(),
        }
    }
}

impl Display for LegendEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name, self.color)
    }
}

/// Slot to legend entry mapping. Entries are kept in insertion order; the slots are few, so a
/// vector is enough.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Legend {
    entries: Vec<(Slot, LegendEntry)>,
}

impl Legend {
    pub(crate) fn new(user_entry: LegendEntry) -> Self {
        Legend {
            entries: vec![(Slot::USER, user_entry)],
        }
    }
    pub(crate) fn insert(&mut self, slot: Slot, entry: LegendEntry) {
        match self.entries.iter_mut().find(|(s, _)| *s == slot) {
            Some((_, existing)) => *existing = entry,
            None => self.entries.push((slot, entry)),
        }
    }
    pub fn get(&self, slot: Slot) -> Option<&LegendEntry> {
        self.entries
            .iter()
            .find(|(s, _)| *s == slot)
            .map(|(_, entry)| entry)
    }
    pub fn contains(&self, slot: Slot) -> bool {
        self.get(slot).is_some()
    }
    /// Number of slots in the legend, including the user and the prediction engine.
    pub fn len(&self) -> usize {
        self.entries.len()
    }
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
    pub fn iter(&self) -> impl Iterator<Item = (Slot, &LegendEntry)> {
        self.entries.iter().map(|(slot, entry)| (*slot, entry))
    }
    pub fn slots(&self) -> impl Iterator<Item = Slot> + '_ {
        self.entries.iter().map(|(slot, _)| *slot)
    }
}

/// Serialized as a map from slot to entry, e.g. `{"0": {"name": "You", "color": "#55AA55"}}`.
impl Serialize for Legend {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (slot, entry) in self.entries.iter() {
            map.serialize_entry(&slot.0.to_string(), entry)?;
        }
        map.end()
    }
}
