/**
Request-level operations of the annotation service: loading the composed view of a document,
comparing two annotators, saving what the annotation UI posts back and storing the output of the
prediction engine. Each operation fetches its
inputs through an `AnnotationStore`, then hands them to the composer or the evaluator.
*/
use crate::alignment::{evaluate_entities, AlignmentReport};
use crate::config::{OverlayConfig, ScoringConfig};
use crate::metrics::{scoring_report, ComputationError};
use crate::model::{AnnotationSet, Annotator, AnnotatorId, TypeRef};
use crate::overlay::{
    compose, extract_own_annotations, prune_unrelated_entities, DisplayEntity, DisplayRelation,
    Legend, OwnAnnotations, SubmittedDocument,
};
use crate::reporter::Reporter;
use crate::store::{AnnotationStore, StoreError, StoreResult};
use log::{error, info};
use serde::Serialize;
use std::error::Error;
use std::fmt::{Display, Formatter};

const PREDICTION_USER_SUFFIX: &str = "__predictor";

/// Annotator under which the predictions made for `user` are stored.
pub fn prediction_user_for(user: &AnnotatorId) -> AnnotatorId {
    AnnotatorId::new(format!("{user}{PREDICTION_USER_SUFFIX}"))
}

/// Prediction annotator to show next to `user`'s annotations. When predictions are hidden this is
/// `user` itself, which the composer ignores.
pub fn current_prediction_user(user: &AnnotatorId, show_predictions: bool) -> AnnotatorId {
    if show_predictions {
        prediction_user_for(user)
    } else {
        user.clone()
    }
}

/// Id of the user-document holding `user`'s annotations on `document_id`.
pub fn user_document_id(user: &AnnotatorId, document_id: &str) -> String {
    format!("{user}_{document_id}")
}

/// Type lists and legend sent along with a document view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ViewConfig {
    #[serde(rename = "entity types")]
    pub entity_types: Vec<TypeRef>,
    #[serde(rename = "relation types")]
    pub relation_types: Vec<TypeRef>,
    pub users: Legend,
}

/// A document with the composed annotations of every annotator visible to the requesting user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentView {
    pub text: Option<String>,
    pub denotations: Vec<DisplayEntity>,
    pub relations: Vec<DisplayRelation>,
    pub sourceid: String,
    pub config: ViewConfig,
}

impl DocumentView {
    pub fn to_json(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::to_value(self)
    }
}

/// Loads `document_id` as seen by `user`.
pub fn load_document<S: AnnotationStore + ?Sized>(
    store: &S,
    document_id: &str,
    user: &AnnotatorId,
    show_predictions: bool,
    config: &OverlayConfig,
) -> StoreResult<DocumentView> {
    let load = || -> StoreResult<DocumentView> {
        let prediction = current_prediction_user(user, show_predictions);
        let text = store.text(document_id)?;
        let mut sets = store.annotation_sets(document_id, user, Some(&prediction))?;
        sets.iter_mut().for_each(AnnotationSet::sort_entities);
        let view = compose(&sets, user, Some(&prediction), config);
        Ok(DocumentView {
            text,
            denotations: view.denotations,
            relations: view.relations,
            sourceid: String::from(document_id),
            config: ViewConfig {
                entity_types: store.entity_types(document_id)?,
                relation_types: store.relation_types(document_id)?,
                users: view.legend,
            },
        })
    };
    load()
        .inspect(|view| {
            info!(
                "event=load_document module=service status=ok document={document_id} user={user} denotations={} relations={} annotators={}",
                view.denotations.len(),
                view.relations.len(),
                view.config.users.len()
            )
        })
        .inspect_err(|err| {
            error!("event=load_document module=service status=error document={document_id} user={user} error={err}")
        })
}

/// Compares the entities of `predicted_user` against the ones of `gold_user` on `document_id`.
pub fn evaluate_annotators<S: AnnotationStore + ?Sized>(
    store: &S,
    document_id: &str,
    predicted_user: &AnnotatorId,
    gold_user: &AnnotatorId,
) -> StoreResult<AlignmentReport> {
    let predicted_entities = store.entities_for(document_id, predicted_user)?;
    let gold_entities = store.entities_for(document_id, gold_user)?;
    let report = evaluate_entities(&gold_entities, &predicted_entities);
    info!(
        "event=evaluate module=service status=ok document={document_id} predicted={predicted_user} gold={gold_user} matches={} misses={}",
        report.matches, report.misses
    );
    Ok(report)
}

/// Saves the annotations of `user` found in a view posted by the annotation UI. The user's whole
/// annotation set on the document is replaced.
pub fn save_document<S: AnnotationStore + ?Sized>(
    store: &mut S,
    document_id: &str,
    user: &Annotator,
    submitted: &SubmittedDocument,
) -> StoreResult<OwnAnnotations> {
    let own = extract_own_annotations(submitted, &user.id);
    let set = AnnotationSet::new(user.clone())
        .with_entities(own.entities.clone())
        .with_relations(own.relations.clone());
    store
        .replace_annotations(document_id, set, true)
        .inspect_err(|err| {
            error!("event=save_document module=service status=error document={document_id} user={} error={err}", user.id)
        })?;
    info!(
        "event=save_document module=service status=ok document={document_id} user={} entities={} relations={}",
        user.id,
        own.entities.len(),
        own.relations.len()
    );
    Ok(own)
}

/// Stores the output of the prediction engine for `user` and returns the document as `user` sees
/// it with the predictions shown. The predictions replace the previous ones and are hidden from
/// the other annotators.
///
/// With `relations_only`, the engine only predicted relations on top of a copy of the user's
/// entities: the entities no predicted relation uses are dropped.
pub fn store_predictions<S: AnnotationStore + ?Sized>(
    store: &mut S,
    document_id: &str,
    user: &AnnotatorId,
    predicted: &AnnotationSet,
    relations_only: bool,
    config: &OverlayConfig,
) -> StoreResult<DocumentView> {
    let predictor = prediction_user_for(user);
    let mut set = if relations_only {
        prune_unrelated_entities(predicted)
    } else {
        predicted.clone()
    };
    set.annotator.id = predictor.clone();
    set.entities
        .iter_mut()
        .for_each(|e| e.creator = predictor.clone());
    set.relations
        .iter_mut()
        .for_each(|r| r.creator = predictor.clone());
    let (entities, relations) = (set.entities.len(), set.relations.len());
    store
        .replace_annotations(document_id, set, false)
        .inspect_err(|err| {
            error!("event=store_predictions module=service status=error document={document_id} user={user} error={err}")
        })?;
    info!(
        "event=store_predictions module=service status=ok document={document_id} user={user} entities={entities} relations={relations} pruned={}",
        predicted.entities.len() - entities
    );
    load_document(&*store, document_id, user, true, config)
}

/// Service error for operations combining the store and the metrics.
#[derive(Debug)]
pub enum ServiceError {
    Store(StoreError),
    Scoring(ComputationError),
}

impl Display for ServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Store(err) => write!(f, "{err}"),
            Self::Scoring(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Store(err) => Some(err),
            Self::Scoring(err) => Some(err),
        }
    }
}

impl From<StoreError> for ServiceError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

impl From<ComputationError> for ServiceError {
    fn from(value: ComputationError) -> Self {
        Self::Scoring(value)
    }
}

/// Evaluates `predicted_user` against `gold_user` on every document of `document_ids` and scores
/// the whole corpus.
pub fn score_annotators<S: AnnotationStore + ?Sized>(
    store: &S,
    document_ids: &[&str],
    predicted_user: &AnnotatorId,
    gold_user: &AnnotatorId,
    config: &ScoringConfig,
) -> Result<Reporter, ServiceError> {
    let reports = document_ids
        .iter()
        .map(|document_id| evaluate_annotators(store, document_id, predicted_user, gold_user))
        .collect::<StoreResult<Vec<_>>>()?;
    Ok(scoring_report(&reports, config)?)
}
