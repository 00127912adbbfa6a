use annoview::{
    evaluate, load_document, save_document, score_annotators, scoring_report, sort_by_start,
    store_predictions, AlignmentReport, AnnotationSet, AnnotationStore, Annotator, AnnotatorId,
    Criterion, Entity, InMemoryStore, OverallAverage, OverlayConfig, OverlayConfigBuilder,
    Relation, ScoredEntity, ScoringConfig, Slot, Span, StoreError, SubmittedDocument, TypeRef,
};
use rstest::rstest;
use serde::Deserialize;
use serde_jsonlines::json_lines;
use std::collections::BTreeMap;

const ALIGNMENT_CASES: &str = "tests/data/alignment_cases.jsonl";
const STORE: &str = "tests/data/store.json";

#[derive(Deserialize)]
struct Case {
    name: String,
    gold: Vec<(usize, usize, String)>,
    predicted: Vec<(usize, usize, String)>,
    expected: serde_json::Value,
}

fn entities(spans: &[(usize, usize, String)]) -> Vec<ScoredEntity<'_>> {
    let mut entities: Vec<ScoredEntity> = spans
        .iter()
        .map(|(start, end, tag)| ScoredEntity::new(*start, *end, tag.as_str()))
        .collect();
    sort_by_start(&mut entities);
    entities
}

impl Case {
    fn report(&self) -> AlignmentReport {
        evaluate(&entities(&self.gold), &entities(&self.predicted))
    }
}

fn cases() -> BTreeMap<String, Case> {
    json_lines::<Case, _>(ALIGNMENT_CASES)
        .unwrap()
        .map(|c| c.unwrap())
        .map(|c| (c.name.clone(), c))
        .collect()
}

fn store() -> InMemoryStore {
    let json = std::fs::read_to_string(STORE).unwrap();
    InMemoryStore::from_json(&json).unwrap()
}

fn ids(view: &annoview::DocumentView) -> Vec<&str> {
    view.denotations.iter().map(|d| d.id.as_str()).collect()
}

#[test]
fn test_alignment_cases() {
    let cases = cases();
    assert!(cases.len() >= 9);
    for case in cases.values() {
        let actual = case.report().to_json().unwrap();
        assert_eq!(actual, case.expected, "case {}", case.name);
    }
}

#[test]
fn test_corpus_scoring() {
    let cases = cases();
    let reports: Vec<AlignmentReport> = ["exact_match", "exact_match_wrong_type", "mixed_document"]
        .iter()
        .map(|name| cases[*name].report())
        .collect();
    let total: AlignmentReport = reports.iter().sum();
    assert_eq!((total.matches, total.misses, total.support, total.predicted), (3, 1, 6, 5));

    let reporter = scoring_report(&reports, &ScoringConfig::default()).unwrap();
    assert_eq!(reporter.len(), 6);
    let strict = reporter.get(Criterion::Strict, OverallAverage::Micro).unwrap();
    assert!((strict.precision - 0.4).abs() < 1e-6);
    assert!((strict.recall - 1.0 / 3.0).abs() < 1e-6);
    assert_eq!(strict.support, 6);
    let span = reporter.get(Criterion::Span, OverallAverage::Micro).unwrap();
    assert!((span.precision - 0.6).abs() < 1e-6);
    assert!((span.recall - 0.5).abs() < 1e-6);
    assert!((span.fscore - 6.0 / 11.0).abs() < 1e-6);
}

#[test]
fn test_colliding_ids_across_annotators() {
    let view = load_document(
        &store(),
        "17",
        &AnnotatorId::from("alice"),
        false,
        &OverlayConfig::default(),
    )
    .unwrap();
    assert_eq!(ids(&view), vec!["5", "5_1", "6", "7"]);
    let bobs_five = &view.denotations[1];
    assert_eq!(bobs_five.original_id.as_str(), "5");
    assert_eq!(bobs_five.slot, Slot(1));
    let relations: Vec<_> = view
        .relations
        .iter()
        .map(|r| (r.id.as_str(), r.subject.as_str(), r.object.as_str()))
        .collect();
    assert_eq!(relations, vec![("r1", "5", "6"), ("r2", "5_1", "7")]);
    assert_eq!(view.denotations[3].info.label.as_deref(), Some("symptom"));
}

#[test]
fn test_predictions_take_slot_minus_one() {
    let view = load_document(
        &store(),
        "17",
        &AnnotatorId::from("alice"),
        true,
        &OverlayConfig::default(),
    )
    .unwrap();
    assert_eq!(ids(&view), vec!["5", "5_1", "5_2", "6", "7", "p2"]);
    let slots: Vec<Slot> = view.denotations.iter().map(|d| d.slot).collect();
    assert_eq!(
        slots,
        vec![Slot(0), Slot(-1), Slot(2), Slot(0), Slot(2), Slot(-1)]
    );
    let json = view.to_json().unwrap();
    assert_eq!(json["config"]["users"]["-1"]["name"], "Prediction Engine");
    assert_eq!(json["config"]["users"]["0"]["name"], "You");
    assert_eq!(json["config"]["users"]["2"]["color"], "blue");
    assert_eq!(json["denotations"][1]["originalId"], "5");
    assert_eq!(json["denotations"][1]["userId"], -1);
    assert_eq!(json["relations"][1]["subj"], "5_2");
}

#[rstest]
#[case("alice", vec!["alice", "bob"])]
#[case("bob", vec!["alice", "bob"])]
#[case("carol", vec!["alice", "bob", "carol"])]
fn test_hidden_annotations_are_only_seen_by_their_owner(
    #[case] user: &str,
    #[case] expected: Vec<&str>,
) {
    let store = store();
    let sets = store
        .annotation_sets("17", &AnnotatorId::from(user), None)
        .unwrap();
    let actual: Vec<&str> = sets.iter().map(|s| s.annotator.id.as_str()).collect();
    assert_eq!(actual, expected);
}

#[test]
fn test_showing_hidden_annotations() {
    let mut store = store();
    let carol = AnnotatorId::from("carol");
    store.set_visibility("17", &carol, true).unwrap();
    let config = OverlayConfigBuilder::new().palette(["red", "green"]).build();
    let view = load_document(&store, "17", &AnnotatorId::from("alice"), false, &config).unwrap();
    assert_eq!(ids(&view), vec!["5", "5_1", "5_2", "6", "7"]);
    let colors: Vec<&str> = view
        .config
        .users
        .iter()
        .map(|(_, entry)| entry.color.as_str())
        .collect();
    assert!(colors.contains(&"red") && colors.contains(&"green"));
    assert!(matches!(
        store.set_visibility("17", &AnnotatorId::from("dave"), true),
        Err(StoreError::DocumentNotFound(_))
    ));
}

#[test]
fn test_save_keeps_only_own_annotations() {
    let mut store = store();
    let bob = Annotator::new("bob", "Bob");
    let view = load_document(&store, "17", &bob.id, false, &OverlayConfig::default()).unwrap();
    let mut json = view.to_json().unwrap();
    // The UI sends back every denotation, whoever created it.
    json["denotations"][1]["obj"]["label"] = serde_json::Value::from("edited");
    let submitted: SubmittedDocument = serde_json::from_value(json).unwrap();
    let own = save_document(&mut store, "17", &bob, &submitted).unwrap();
    let own_ids: Vec<&str> = own.entities.iter().map(|e| e.id.as_str()).collect();
    assert_eq!(own_ids, vec!["5", "7"]);
    assert!(own.entities.iter().all(|e| e.creator == bob.id));
    assert_eq!(own.entities[0].label.as_deref(), Some("edited"));
    assert_eq!(
        (own.relations[0].subject.as_str(), own.relations[0].object.as_str()),
        ("5", "7")
    );
    let alice = store
        .entities_for("17", &AnnotatorId::from("alice"))
        .unwrap();
    assert_eq!(alice.len(), 2);
}

#[test]
fn test_score_predictions_against_their_user() {
    let store = store();
    let reporter = score_annotators(
        &store,
        &["17"],
        &AnnotatorId::from("alice__predictor"),
        &AnnotatorId::from("alice"),
        &ScoringConfig::default(),
    )
    .unwrap();
    let strict = reporter.get(Criterion::Strict, OverallAverage::Micro).unwrap();
    assert_eq!((strict.precision, strict.recall, strict.support), (0.5, 0.5, 2));
    let span = reporter.get(Criterion::Span, OverallAverage::Micro).unwrap();
    assert_eq!(span.precision, 0.5);
}

#[test]
fn test_relation_predictions_replace_the_hidden_prediction_set() {
    let mut store = store();
    let alice = AnnotatorId::from("alice");
    let drug = TypeRef::new("1", "T121", "Drug", "1", "Chemicals");
    let disease = TypeRef::new("2", "T047", "Disease", "3", "Disorders");
    let treats = TypeRef::new("9", "R1", "treats", "2", "Relations");
    // Relation prediction runs on a copy of alice's entities.
    let predicted = AnnotationSet::new(Annotator::new("engine", "Engine"))
        .with_entities(vec![
            Entity::new("5", "engine", Span::new(0, 7), drug),
            Entity::new("6", "engine", Span::new(15, 23), disease.clone()),
            Entity::new("7", "engine", Span::new(28, 33), disease),
        ])
        .with_relations(vec![Relation::new("pr", "engine", "5", "6", treats)]);
    let config = OverlayConfig::default();
    let returned = store_predictions(&mut store, "17", &alice, &predicted, true, &config).unwrap();
    let view = load_document(&store, "17", &alice, true, &config).unwrap();
    assert_eq!(returned, view);
    let predicted_ids: Vec<&str> = view
        .denotations
        .iter()
        .filter(|d| d.slot == Slot::PREDICTION)
        .map(|d| d.id.as_str())
        .collect();
    assert_eq!(predicted_ids, vec!["5_1", "6_1"]);
    let relation = view.relations.iter().find(|r| r.id == "pr").unwrap();
    assert_eq!((relation.subject.as_str(), relation.object.as_str()), ("5_1", "6_1"));
    let bob = load_document(&store, "17", &AnnotatorId::from("bob"), true, &config).unwrap();
    assert!(bob
        .denotations
        .iter()
        .all(|d| d.creator.as_str() != "alice__predictor"));
}
