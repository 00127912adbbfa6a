/**
The annotation UI posts the whole composed view back when the user saves. Only the user's own
annotations (slot `0`) are kept, and their display ids are turned back into the ids of the user's
annotation set.
*/
use super::{AnnotationInfo, RelationInfo, Slot};
use crate::model::{AnnotationSet, AnnotatorId, Entity, LocalId, Relation, Span};
use ahash::{AHashMap, AHashSet};
use log::debug;
use serde::{Deserialize, Serialize};

/// A denotation as posted by the annotation UI. Denotations created in the UI carry neither an
/// `originalId` nor a `userId`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmittedDenotation {
    pub id: String,
    #[serde(rename = "obj")]
    pub info: AnnotationInfo,
    pub span: Span,
    #[serde(rename = "originalId", default)]
    pub original_id: Option<LocalId>,
    #[serde(rename = "userId", default)]
    pub slot: Option<Slot>,
}

impl SubmittedDenotation {
    fn is_own(&self) -> bool {
        self.slot.unwrap_or_default().is_user()
    }
    fn local_id(&self) -> LocalId {
        match &self.original_id {
            Some(id) => id.clone(),
            None => LocalId::new(self.id.as_str()),
        }
    }
}

/// A relation as posted by the annotation UI, with endpoints given as display ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmittedRelation {
    pub id: String,
    #[serde(rename = "subj")]
    pub subject: String,
    #[serde(rename = "obj")]
    pub object: String,
    #[serde(rename = "pred")]
    pub info: RelationInfo,
}

/// Body of a save request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct SubmittedDocument {
    #[serde(default)]
    pub denotations: Vec<SubmittedDenotation>,
    #[serde(default)]
    pub relations: Vec<SubmittedRelation>,
}

/// The user's own annotations recovered from a submitted view.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OwnAnnotations {
    pub entities: Vec<Entity>,
    pub relations: Vec<Relation>,
}

/// Extracts the annotations of `owner` from a submitted view. Denotations of other slots are
/// ignored, ids are restored from `originalId`, and relations are kept only when both endpoints are
/// kept denotations.
pub fn extract_own_annotations(submitted: &SubmittedDocument, owner: &AnnotatorId) -> OwnAnnotations {
    let mut id_map: AHashMap<&str, LocalId> = AHashMap::default();
    let mut entities = Vec::with_capacity(submitted.denotations.len());
    for denotation in submitted.denotations.iter().filter(|d| d.is_own()) {
        let local_id = denotation.local_id();
        id_map.insert(denotation.id.as_str(), local_id.clone());
        entities.push(Entity {
            id: local_id,
            creator: owner.clone(),
            span: denotation.span,
            type_ref: denotation.info.type_ref.clone(),
            label: denotation.info.label.clone(),
        });
    }
    let mut relations = Vec::with_capacity(submitted.relations.len());
    for relation in submitted.relations.iter() {
        match (
            id_map.get(relation.subject.as_str()),
            id_map.get(relation.object.as_str()),
        ) {
            (Some(subject), Some(object)) => relations.push(Relation {
                id: LocalId::new(relation.id.as_str()),
                creator: owner.clone(),
                subject: subject.clone(),
                object: object.clone(),
                type_ref: relation.info.type_ref.clone(),
                label: relation.info.label.clone(),
            }),
            _ => debug!(
                "event=relation_skipped module=overlay relation={} subject={} object={}",
                relation.id, relation.subject, relation.object
            ),
        }
    }
    OwnAnnotations {
        entities,
        relations,
    }
}

/// Drops the entities that no relation of the set references. Used when only relations were
/// predicted on top of a copy of the user's entities.
pub fn prune_unrelated_entities(set: &AnnotationSet) -> AnnotationSet {
    let used: AHashSet<&LocalId> = set
        .relations
        .iter()
        .flat_map(|r| [&r.subject, &r.object])
        .collect();
    let entities = set
        .entities
        .iter()
        .filter(|e| used.contains(&e.id))
        .cloned()
        .collect();
    AnnotationSet {
        annotator: set.annotator.clone(),
        entities,
        relations: set.relations.clone(),
    }
}
