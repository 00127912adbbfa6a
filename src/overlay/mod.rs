/*!
Overlay composition. Several annotators annotate the same document independently; the composer
merges all their entities and relations into one view the annotation UI can draw.

Annotators often start from the same imported annotations, so two creators can hold an entity with
the same local id. The composer gives every entity a display id that is unique in the view
(`<id>_<n>` on collision), remembers the rewritten ids per creator and rewrites relation endpoints
accordingly. It also assigns each creator a legend slot.
*/
use crate::config::OverlayConfig;
use crate::model::{AnnotationSet, AnnotatorId, Entity, LocalId, Relation, Span, TypeRef};
use ahash::{AHashMap, AHashSet};
use itertools::Itertools;
use log::debug;
use serde::{Deserialize, Serialize};

mod legend;
mod remap;
mod submit;

pub use legend::{Legend, LegendEntry, Slot};
pub use remap::{IdRemap, RemapEntry};
pub use submit::{
    extract_own_annotations, prune_unrelated_entities, OwnAnnotations, SubmittedDenotation,
    SubmittedDocument, SubmittedRelation,
};

/// Type metadata of a displayed entity, plus its label. Serialized as the `obj` field.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AnnotationInfo {
    #[serde(flatten)]
    pub type_ref: TypeRef,
    #[serde(default)]
    pub label: Option<String>,
}

/// Type metadata of a displayed relation, plus its label. Serialized as the `pred` field.
pub type RelationInfo = AnnotationInfo;

/// An entity of the composed view.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DisplayEntity {
    /// Unique across all the creators of the view.
    pub id: String,
    #[serde(rename = "obj")]
    pub info: AnnotationInfo,
    pub span: Span,
    /// Id of the entity in its creator's own annotation set.
    #[serde(rename = "originalId")]
    pub original_id: LocalId,
    /// Legend slot of the creator.
    #[serde(rename = "userId")]
    pub slot: Slot,
    #[serde(skip)]
    pub creator: AnnotatorId,
}

/// A relation of the composed view, with endpoints expressed as display ids.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DisplayRelation {
    pub id: String,
    #[serde(rename = "subj")]
    pub subject: String,
    #[serde(rename = "obj")]
    pub object: String,
    #[serde(rename = "pred")]
    pub info: RelationInfo,
    #[serde(skip)]
    pub creator: AnnotatorId,
}

/// Result of `compose`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComposedView {
    pub denotations: Vec<DisplayEntity>,
    pub relations: Vec<DisplayRelation>,
    #[serde(rename = "users")]
    pub legend: Legend,
    #[serde(skip)]
    pub remap: IdRemap,
}

impl ComposedView {
    pub fn to_json(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::to_value(self)
    }
    pub fn entity(&self, display_id: &str) -> Option<&DisplayEntity> {
        self.denotations.iter().find(|e| e.id == display_id)
    }
}

/// Mutable state of one composition pass. It is owned by a single call of `compose`, which is why
/// concurrent compositions need no coordination.
struct CompositionState<'c> {
    config: &'c OverlayConfig,
    legend: Legend,
    slots: AHashMap<AnnotatorId, Slot>,
    /// First palette index: 2 when the prediction engine occupies slot -1, else 1.
    offset: usize,
    remap: IdRemap,
    previous_id: Option<LocalId>,
    suffix: usize,
    /// Every local id of the input. Suffixed ids never take one of these.
    local_ids: AHashSet<&'c str>,
    display_ids: AHashSet<String>,
    emitted: AHashMap<AnnotatorId, AHashSet<LocalId>>,
}

impl<'c> CompositionState<'c> {
    fn new(
        sets: &'c [AnnotationSet],
        requesting_user: &AnnotatorId,
        prediction: Option<&AnnotatorId>,
        config: &'c OverlayConfig,
    ) -> Self {
        let mut legend = Legend::new(config.user_entry.clone());
        let mut slots = AHashMap::default();
        slots.insert(requesting_user.clone(), Slot::USER);
        let offset = match prediction {
            Some(prediction_user) => {
                legend.insert(Slot::PREDICTION, config.prediction_entry.clone());
                slots.insert(prediction_user.clone(), Slot::PREDICTION);
                2
            }
            None => 1,
        };
        let local_ids = sets
            .iter()
            .flat_map(|s| s.entities.iter().map(|e| e.id.as_str()))
            .collect();
        CompositionState {
            config,
            legend,
            slots,
            offset,
            remap: IdRemap::new(),
            previous_id: None,
            suffix: 1,
            local_ids,
            display_ids: AHashSet::default(),
            emitted: AHashMap::default(),
        }
    }

    fn push_entity(&mut self, entity: &Entity, creator_name: &str) -> DisplayEntity {
        let display_id = self.display_id_for(entity);
        let slot = self.slot_for(&entity.creator, creator_name);
        self.display_ids.insert(display_id.clone());
        self.emitted
            .entry(entity.creator.clone())
            .or_default()
            .insert(entity.id.clone());
        DisplayEntity {
            id: display_id,
            info: AnnotationInfo {
                type_ref: entity.type_ref.clone(),
                label: entity.label.clone(),
            },
            span: entity.span,
            original_id: entity.id.clone(),
            slot,
            creator: entity.creator.clone(),
        }
    }

    fn display_id_for(&mut self, entity: &Entity) -> String {
        let is_collision = self.previous_id.as_ref() == Some(&entity.id);
        if !is_collision {
            self.suffix = 1;
            self.previous_id = Some(entity.id.clone());
            return entity.id.0.clone();
        }
        let mut candidate = format!("{}_{}", entity.id, self.suffix);
        self.suffix += 1;
        while self.local_ids.contains(candidate.as_str()) || self.display_ids.contains(&candidate) {
            candidate = format!("{}_{}", entity.id, self.suffix);
            self.suffix += 1;
        }
        let already_emitted = self
            .emitted
            .get(&entity.creator)
            .is_some_and(|ids| ids.contains(&entity.id));
        // A creator repeating its own id keeps its relations on the first occurrence.
        if !already_emitted {
            self.remap
                .insert(entity.id.clone(), entity.creator.clone(), candidate.clone());
        }
        candidate
    }

    fn slot_for(&mut self, creator: &AnnotatorId, creator_name: &str) -> Slot {
        if let Some(slot) = self.slots.get(creator) {
            return *slot;
        }
        let slot = Slot(self.legend.len() as i32);
        let color = self.config.color_for(self.legend.len() - self.offset);
        self.legend
            .insert(slot, LegendEntry::new(creator_name, color));
        self.slots.insert(creator.clone(), slot);
        slot
    }

    /// Display id of the entity `local_id` of `creator`, if that entity is part of the view.
    fn resolve(&self, local_id: &LocalId, creator: &AnnotatorId) -> Option<String> {
        if let Some(display_id) = self.remap.get(local_id, creator) {
            return Some(String::from(display_id));
        }
        let was_emitted = self
            .emitted
            .get(creator)
            .is_some_and(|ids| ids.contains(local_id));
        was_emitted.then(|| local_id.0.clone())
    }

    fn push_relation(&self, relation: &Relation) -> Option<DisplayRelation> {
        let subject = self.resolve(&relation.subject, &relation.creator)?;
        let object = self.resolve(&relation.object, &relation.creator)?;
        Some(DisplayRelation {
            id: relation.id.0.clone(),
            subject,
            object,
            info: RelationInfo {
                type_ref: relation.type_ref.clone(),
                label: relation.label.clone(),
            },
            creator: relation.creator.clone(),
        })
    }
}

/// Merges the annotation sets of several annotators of one document into a single view.
///
/// * `sets`: One annotation set per annotator. Their order is the creator-processing order used
///   to number colliding ids.
/// * `requesting_user`: Annotator shown in slot `0`.
/// * `prediction`: Prediction engine annotator, shown in slot `-1`. Ignored when it is the
///   requesting user.
/// * `config`: Legend names and colors.
///
/// The entities of every set must be sorted by local id (see `AnnotationSet::sort_entities`).
/// This is not checked: unsorted input still yields a view, but colliding ids are no longer
/// guaranteed to be detected.
///
/// Relations whose subject or object is not an entity of the view are dropped.
pub fn compose(
    sets: &[AnnotationSet],
    requesting_user: &AnnotatorId,
    prediction: Option<&AnnotatorId>,
    config: &OverlayConfig,
) -> ComposedView {
    let prediction = prediction.filter(|p| *p != requesting_user);
    let mut state = CompositionState::new(sets, requesting_user, prediction, config);

    let entity_count = sets.iter().map(|s| s.entities.len()).sum();
    let mut denotations = Vec::with_capacity(entity_count);
    let merged = sets
        .iter()
        .enumerate()
        .map(|(position, set)| set.entities.iter().map(move |e| (position, e)))
        .kmerge_by(|(pa, a), (pb, b)| (&a.id, pa) < (&b.id, pb));
    for (position, entity) in merged {
        denotations.push(state.push_entity(entity, &sets[position].annotator.name));
    }

    let mut relations = Vec::new();
    let mut dropped = 0;
    for relation in sets.iter().flat_map(|s| s.relations.iter()) {
        match state.push_relation(relation) {
            Some(display_relation) => relations.push(display_relation),
            None => {
                dropped += 1;
                debug!(
                    "event=relation_dropped module=overlay relation={} creator={} subject={} object={}",
                    relation.id, relation.creator, relation.subject, relation.object
                );
            }
        }
    }
    debug!(
        "event=compose module=overlay status=ok entities={} relations={} dropped_relations={} remapped_ids={} annotators={}",
        denotations.len(),
        relations.len(),
        dropped,
        state.remap.len(),
        state.legend.len()
    );

    ComposedView {
        denotations,
        relations,
        legend: state.legend,
        remap: state.remap,
    }
}
