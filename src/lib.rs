/*!
This library holds the core of a collaborative annotation service: several annotators mark
entities and relations on the same documents, and the library merges their work into one view and
measures how well two annotators agree.
# OVERLAY
The overlay composer merges the annotation sets of every annotator visible to the requesting user.
Annotators often share imported annotations, so the same local id can come from several creators.
Each entity of the view gets a unique display id, colliding ids being suffixed with `_1`, `_2`, ...
Relations are rewritten to point at the display ids of their own creator's entities. Every creator
gets a legend slot:
* `0`: the requesting user.
* `-1`: the prediction engine, when its annotations are displayed.
* `1`, `2`, ...: the other annotators, in order of appearance, colored from a cyclic palette.

# ALIGNMENT
The alignment evaluator compares the entities of an annotator (the predictions) to the entities of
another one (the gold standard). Each gold entity is compared to the predicted entities whose span
intersects its own:
* A match has the same start and the same end.
* A left-align has the same start only.
* A right-align has the same end only.
* An overlap shares neither bound.
* A gold entity intersecting no prediction is a miss.

Classifications whose types differ are also counted as wrong types. The counts of many documents
can be turned into precision, recall and f-score with `scoring_report`.

# Terminology
* An annotator is a human user or the prediction engine.
* A user-document is the annotation set of one annotator on one document.
* A local id is the id of an entity inside its creator's annotation set. It is not unique across
    creators.
*/

mod alignment;
mod config;
mod metrics;
mod model;
mod overlay;
mod reporter;
mod service;
mod store;

// The public api starts here
pub use model::{
    AnnotationSet, Annotator, AnnotatorId, Entity, LocalId, Relation, Span, TypeRef,
};

pub use overlay::{
    compose, extract_own_annotations, prune_unrelated_entities, AnnotationInfo, ComposedView,
    DisplayEntity, DisplayRelation, IdRemap, Legend, LegendEntry, OwnAnnotations, RelationInfo,
    RemapEntry, Slot, SubmittedDenotation, SubmittedDocument, SubmittedRelation,
};

pub use alignment::{
    evaluate, evaluate_entities, sort_by_start, AlignmentCategory, AlignmentReport,
    InconsistentReportError, ScoredEntity,
};

pub use metrics::{
    precision_recall_fscore_support, scoring_report, ComputationError, Criterion,
    DivByZeroStrat, PrecisionRecallFScoreTrueSum,
};

pub use reporter::{Average, OverallAverage, Reporter, ScoreRow};

pub use config::{
    OverlayConfig, OverlayConfigBuilder, ScoringConfig, ScoringConfigBuilder, DEFAULT_PALETTE,
};

pub use store::{AnnotationStore, InMemoryStore, StoreError, StoreResult, UserDocumentInfo};

pub use service::{
    current_prediction_user, evaluate_annotators, load_document, prediction_user_for,
    save_document, score_annotators, store_predictions, user_document_id, DocumentView,
    ServiceError, ViewConfig,
};
