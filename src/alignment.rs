/**
This module scores the entities of one annotator (the predictions) against the entities of another
one (the gold standard) using only the geometry of the spans. Each gold entity is compared to the
predicted entities overlapping it and each overlap is classified as a match, a left-align, a
right-align or an overlap. Gold entities without any overlapping prediction are misses.
*/
use crate::model::Entity;
use enum_iterator::{all, Sequence};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::Display;
use std::iter::Sum;
use std::ops::{Add, AddAssign};

/// An entity reduced to what the evaluator needs: its span and its type. `start` is inclusive and
/// `end` exclusive.
#[derive(Debug, Hash, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct ScoredEntity<'a> {
    pub start: usize,
    pub end: usize,
    pub tag: Cow<'a, str>,
}

impl<'a> ScoredEntity<'a> {
    pub fn new<T: Into<Cow<'a, str>>>(start: usize, end: usize, tag: T) -> Self {
        ScoredEntity {
            start,
            end,
            tag: tag.into(),
        }
    }
}

/// The type id of the entity is used as tag.
impl<'a> From<&'a Entity> for ScoredEntity<'a> {
    fn from(value: &'a Entity) -> Self {
        ScoredEntity {
            start: value.span.begin,
            end: value.span.end,
            tag: Cow::from(value.type_ref.id.as_str()),
        }
    }
}

impl<'a> Display for ScoredEntity<'a> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {}, {})", self.tag, self.start, self.end)
    }
}

/// Sorts entities by start. The sort is stable. `evaluate` expects both of its inputs in this
/// order.
pub fn sort_by_start(entities: &mut [ScoredEntity<'_>]) {
    entities.sort_by_key(|e| e.start);
}

/// How a predicted span relates to a gold span.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Sequence, Serialize, Deserialize,
)]
pub enum AlignmentCategory {
    /// Same start and same end.
    #[serde(rename = "matches")]
    Match,
    /// Same start, different end.
    #[serde(rename = "left-aligns")]
    LeftAlign,
    /// Different start, same end.
    #[serde(rename = "right-aligns")]
    RightAlign,
    /// Different start and different end, but the spans intersect.
    #[serde(rename = "overlaps")]
    Overlap,
    /// No predicted span intersects the gold span.
    #[serde(rename = "misses")]
    Miss,
}

impl AlignmentCategory {
    /// Classifies a candidate already known to intersect `gold`.
    fn classify(gold: &ScoredEntity, candidate: &ScoredEntity) -> Self {
        match (candidate.start == gold.start, candidate.end == gold.end) {
            (true, true) => Self::Match,
            (true, false) => Self::LeftAlign,
            (false, true) => Self::RightAlign,
            (false, false) => Self::Overlap,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Match => "matches",
            Self::LeftAlign => "left-aligns",
            Self::RightAlign => "right-aligns",
            Self::Overlap => "overlaps",
            Self::Miss => "misses",
        }
    }

    /// Every category, `Miss` included, in declaration order.
    pub fn all() -> impl Iterator<Item = AlignmentCategory> {
        all::<AlignmentCategory>()
    }
}

impl Display for AlignmentCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Category counts of an evaluation. A gold entity overlapping several predictions contributes
/// once per prediction; `wrong_type` counts, per category, the classifications whose predicted
/// type differs from the gold type, on top of the category counter.
///
/// `to_json` gives the flat counts only. Reading a report back requires the entity totals written
/// by `to_scoring_json`, since the scores are bounded by them.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "ReportRecord")]
pub struct AlignmentReport {
    pub matches: usize,
    #[serde(rename = "left-aligns")]
    pub left_aligns: usize,
    #[serde(rename = "right-aligns")]
    pub right_aligns: usize,
    pub overlaps: usize,
    pub misses: usize,
    #[serde(rename = "wrong-type", default)]
    pub wrong_type: BTreeMap<AlignmentCategory, usize>,
    /// Number of gold entities.
    #[serde(skip_serializing)]
    pub support: usize,
    /// Number of predicted entities.
    #[serde(skip_serializing)]
    pub predicted: usize,
}

/// Stored form of a report. The entity totals are mandatory.
#[derive(Deserialize)]
struct ReportRecord {
    matches: usize,
    #[serde(rename = "left-aligns")]
    left_aligns: usize,
    #[serde(rename = "right-aligns")]
    right_aligns: usize,
    overlaps: usize,
    misses: usize,
    #[serde(rename = "wrong-type", default)]
    wrong_type: BTreeMap<AlignmentCategory, usize>,
    support: usize,
    predicted: usize,
}

/// A stored report whose counts contradict each other.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InconsistentReportError(String);

impl Display for InconsistentReportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "inconsistent alignment report: {}", self.0)
    }
}

impl Error for InconsistentReportError {}

impl TryFrom<ReportRecord> for AlignmentReport {
    type Error = InconsistentReportError;

    fn try_from(record: ReportRecord) -> Result<Self, Self::Error> {
        let report = AlignmentReport {
            matches: record.matches,
            left_aligns: record.left_aligns,
            right_aligns: record.right_aligns,
            overlaps: record.overlaps,
            misses: record.misses,
            wrong_type: record.wrong_type,
            support: record.support,
            predicted: record.predicted,
        };
        if report.wrong_type_count(AlignmentCategory::Miss) > 0 {
            return Err(InconsistentReportError(String::from(
                "misses cannot have a wrong type",
            )));
        }
        for category in AlignmentCategory::all() {
            if report.wrong_type_count(category) > report.count(category) {
                return Err(InconsistentReportError(format!(
                    "{} wrong-type {} out of {}",
                    report.wrong_type_count(category),
                    category,
                    report.count(category)
                )));
            }
        }
        if report.misses > report.support {
            return Err(InconsistentReportError(format!(
                "{} misses out of {} gold entities",
                report.misses, report.support
            )));
        }
        Ok(report)
    }
}

impl AlignmentReport {
    pub fn count(&self, category: AlignmentCategory) -> usize {
        match category {
            AlignmentCategory::Match => self.matches,
            AlignmentCategory::LeftAlign => self.left_aligns,
            AlignmentCategory::RightAlign => self.right_aligns,
            AlignmentCategory::Overlap => self.overlaps,
            AlignmentCategory::Miss => self.misses,
        }
    }

    fn count_mut(&mut self, category: AlignmentCategory) -> &mut usize {
        match category {
            AlignmentCategory::Match => &mut self.matches,
            AlignmentCategory::LeftAlign => &mut self.left_aligns,
            AlignmentCategory::RightAlign => &mut self.right_aligns,
            AlignmentCategory::Overlap => &mut self.overlaps,
            AlignmentCategory::Miss => &mut self.misses,
        }
    }

    pub fn wrong_type_count(&self, category: AlignmentCategory) -> usize {
        self.wrong_type.get(&category).copied().unwrap_or(0)
    }

    /// Number of classifications other than misses.
    pub fn classified(&self) -> usize {
        self.matches + self.left_aligns + self.right_aligns + self.overlaps
    }

    /// Exact span matches whose type is also correct.
    pub fn typed_matches(&self) -> usize {
        self.matches
            .saturating_sub(self.wrong_type_count(AlignmentCategory::Match))
    }

    fn tally(&mut self, category: AlignmentCategory, wrong_type: bool) {
        *self.count_mut(category) += 1;
        if wrong_type {
            *self.wrong_type.entry(category).or_insert(0) += 1;
        }
    }

    pub fn to_json(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::to_value(self)
    }

    /// `to_json` plus the `support` and `predicted` totals. This is the form read back by
    /// deserialization.
    pub fn to_scoring_json(&self) -> serde_json::Result<serde_json::Value> {
        let mut value = self.to_json()?;
        if let serde_json::Value::Object(fields) = &mut value {
            fields.insert(String::from("support"), self.support.into());
            fields.insert(String::from("predicted"), self.predicted.into());
        }
        Ok(value)
    }
}

impl AddAssign<&AlignmentReport> for AlignmentReport {
    fn add_assign(&mut self, rhs: &AlignmentReport) {
        for category in AlignmentCategory::all() {
            *self.count_mut(category) += rhs.count(category);
        }
        for (category, count) in rhs.wrong_type.iter() {
            *self.wrong_type.entry(*category).or_insert(0) += count;
        }
        self.support += rhs.support;
        self.predicted += rhs.predicted;
    }
}

impl Add for AlignmentReport {
    type Output = AlignmentReport;
    fn add(mut self, rhs: Self) -> Self::Output {
        self += &rhs;
        self
    }
}

impl<'a> Sum<&'a AlignmentReport> for AlignmentReport {
    fn sum<I: Iterator<Item = &'a AlignmentReport>>(iter: I) -> Self {
        iter.fold(AlignmentReport::default(), |mut acc, r| {
            acc += r;
            acc
        })
    }
}

impl Display for AlignmentReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Category, Count, Wrong type")?;
        for category in AlignmentCategory::all() {
            writeln!(
                f,
                "{}, {}, {}",
                category,
                self.count(category),
                self.wrong_type_count(category)
            )?
        }
        Ok(())
    }
}

/// Walks the gold entities and reports, for each of them, every classified candidate or a single
/// miss. `visit` receives the index of the gold entity and either the candidate with its category
/// or `None` for a miss.
fn sweep<'p, 't, F>(gold: &[ScoredEntity<'_>], predicted: &'p [ScoredEntity<'t>], mut visit: F)
where
    F: FnMut(usize, Option<(&'p ScoredEntity<'t>, AlignmentCategory)>),
{
    let mut p = 0;
    for (index, entity) in gold.iter().enumerate() {
        if predicted.is_empty() {
            visit(index, None);
            continue;
        }
        // Never moves backward: both inputs are sorted by start.
        while predicted[p].end < entity.start && p < predicted.len() - 1 {
            p += 1;
        }
        let mut can_miss = true;
        for candidate in predicted[p..].iter() {
            if candidate.start > entity.end {
                break;
            }
            if candidate.end < entity.start {
                break;
            }
            can_miss = false;
            visit(
                index,
                Some((candidate, AlignmentCategory::classify(entity, candidate))),
            );
        }
        if can_miss {
            visit(index, None);
        }
    }
}

/// Scores `predicted` against `gold`.
///
/// * `gold`: Reference entities, sorted by start.
/// * `predicted`: Entities to score, sorted by start.
///
/// Unsorted inputs are a contract violation: the result is still computed but is meaningless. Use
/// `sort_by_start` first when the source does not guarantee the order.
///
/// Swapping `gold` and `predicted` does not give the same counts.
///
/// # Example
/// ```rust
/// use annoview::{evaluate, ScoredEntity};
///
/// let gold = vec![ScoredEntity::new(0, 10, "X")];
/// let predicted = vec![ScoredEntity::new(0, 6, "X"), ScoredEntity::new(7, 10, "X")];
/// let report = evaluate(&gold, &predicted);
/// assert_eq!((report.left_aligns, report.right_aligns, report.misses), (1, 1, 0));
/// ```
pub fn evaluate(gold: &[ScoredEntity<'_>], predicted: &[ScoredEntity<'_>]) -> AlignmentReport {
    let mut report = AlignmentReport {
        support: gold.len(),
        predicted: predicted.len(),
        ..Default::default()
    };
    sweep(gold, predicted, |index, outcome| match outcome {
        Some((candidate, category)) => {
            report.tally(category, candidate.tag != gold[index].tag);
        }
        None => report.tally(AlignmentCategory::Miss, false),
    });
    report
}

/// Evaluates two lists of entities in any order. The entities are sorted by start before calling
/// `evaluate`, which otherwise expects sorted inputs.
///
/// * `gold`: Reference entities
/// * `predicted`: Entities to score
///
/// # Example
/// ```rust
/// use annoview::{evaluate_entities, Entity, Span, TypeRef};
///
/// let drug = TypeRef::from_id("DRUG");
/// let gold = vec![
///     Entity::new("2", "alice", Span::new(10, 20), drug.clone()),
///     Entity::new("1", "alice", Span::new(0, 5), drug.clone()),
/// ];
/// let predicted = vec![Entity::new("1", "bob", Span::new(0, 5), drug)];
///
/// let report = evaluate_entities(&gold, &predicted);
/// assert_eq!((report.matches, report.misses), (1, 1));
/// assert_eq!(
///     serde_json::to_string(&report).unwrap(),
///     r#"{"matches":1,"left-aligns":0,"right-aligns":0,"overlaps":0,"misses":1,"wrong-type":{}}"#
/// );
/// ```
pub fn evaluate_entities(gold: &[Entity], predicted: &[Entity]) -> AlignmentReport {
    let mut gold: Vec<ScoredEntity> = gold.iter().map(ScoredEntity::from).collect();
    let mut predicted: Vec<ScoredEntity> = predicted.iter().map(ScoredEntity::from).collect();
    sort_by_start(&mut gold);
    sort_by_start(&mut predicted);
    evaluate(&gold, &predicted)
}

#[cfg(test)]
mod test {
    use super::*;
    use quickcheck::{QuickCheck, TestResult};
    use rstest::rstest;

    fn entities(spans: &[(usize, usize, &'static str)]) -> Vec<ScoredEntity<'static>> {
        spans
            .iter()
            .map(|(start, end, tag)| ScoredEntity::new(*start, *end, *tag))
            .collect()
    }

    fn counts(report: &AlignmentReport) -> [usize; 5] {
        [
            report.matches,
            report.left_aligns,
            report.right_aligns,
            report.overlaps,
            report.misses,
        ]
    }

    #[rstest]
    #[case(&[(0, 5, "DRUG")], &[(0, 5, "DRUG")], [1, 0, 0, 0, 0])]
    #[case(&[(10, 20, "X")], &[], [0, 0, 0, 0, 1])]
    #[case(&[(0, 10, "X")], &[(0, 6, "X"), (7, 10, "X")], [0, 1, 1, 0, 0])]
    #[case(&[(0, 10, "X")], &[(2, 8, "X")], [0, 0, 0, 1, 0])]
    #[case(&[(0, 10, "X")], &[(20, 30, "X")], [0, 0, 0, 0, 1])]
    #[case(&[], &[(0, 5, "X")], [0, 0, 0, 0, 0])]
    #[case(&[(0, 5, "X")], &[(5, 8, "X")], [0, 0, 0, 1, 0])]
    #[case(&[(3, 5, "X")], &[(0, 3, "X")], [0, 0, 0, 1, 0])]
    #[case(&[(0, 2, "X"), (10, 12, "X"), (20, 22, "X")], &[(0, 2, "X"), (20, 22, "X")], [2, 0, 0, 0, 1])]
    fn test_evaluate_counts(
        #[case] gold: &[(usize, usize, &'static str)],
        #[case] predicted: &[(usize, usize, &'static str)],
        #[case] expected: [usize; 5],
    ) {
        let report = evaluate(&entities(gold), &entities(predicted));
        assert_eq!(counts(&report), expected);
    }

    #[test]
    fn test_exact_match_same_type_has_no_wrong_type() {
        let report = evaluate(&entities(&[(0, 5, "DRUG")]), &entities(&[(0, 5, "DRUG")]));
        assert!(report.wrong_type.is_empty());
        assert_eq!(report.typed_matches(), 1);
    }

    #[test]
    fn test_exact_match_wrong_type() {
        let report = evaluate(&entities(&[(0, 5, "DRUG")]), &entities(&[(0, 5, "FOOD")]));
        assert_eq!(report.matches, 1);
        assert_eq!(
            report.wrong_type,
            BTreeMap::from([(AlignmentCategory::Match, 1)])
        );
        assert_eq!(report.typed_matches(), 0);
    }

    #[test]
    fn test_wrong_type_right_align_counts_in_both() {
        let report = evaluate(&entities(&[(0, 10, "A")]), &entities(&[(4, 10, "B")]));
        assert_eq!(report.right_aligns, 1);
        assert_eq!(report.wrong_type_count(AlignmentCategory::RightAlign), 1);
    }

    #[test]
    fn test_swapping_gold_and_predicted_is_asymmetric() {
        // (1, 2) hides the exact match of (5, 8) in one direction only.
        let a = entities(&[(5, 8, "X")]);
        let b = entities(&[(0, 20, "X"), (1, 2, "X"), (5, 8, "X")]);
        assert_eq!(counts(&evaluate(&a, &b)), [0, 0, 0, 1, 0]);
        assert_eq!(counts(&evaluate(&b, &a)), [1, 0, 0, 1, 1]);
        let a = entities(&[(0, 10, "X"), (20, 30, "X")]);
        let b = entities(&[(0, 6, "X")]);
        assert_ne!(counts(&evaluate(&a, &b)), counts(&evaluate(&b, &a)));
    }

    #[test]
    fn test_scan_stops_at_candidate_ending_before_gold() {
        // (1, 2) ends before the gold start and stops the scan before (5, 8) is seen.
        let gold = entities(&[(5, 8, "X")]);
        let predicted = entities(&[(0, 100, "X"), (1, 2, "X"), (5, 8, "X")]);
        let report = evaluate(&gold, &predicted);
        assert_eq!(counts(&report), [0, 0, 0, 1, 0]);
    }

    #[test]
    fn test_report_json_shape() {
        let report = evaluate(&entities(&[(0, 5, "DRUG")]), &entities(&[(0, 5, "FOOD")]));
        let json = report.to_json().unwrap();
        assert_eq!(json["matches"], 1);
        assert_eq!(json["left-aligns"], 0);
        assert_eq!(json["misses"], 0);
        assert_eq!(json["wrong-type"]["matches"], 1);
        assert!(json.get("support").is_none());
    }

    #[test]
    fn test_report_without_totals_cannot_be_read_back() {
        let report = evaluate(&entities(&[(0, 5, "DRUG")]), &entities(&[(0, 5, "DRUG")]));
        let read: Result<AlignmentReport, _> = serde_json::from_value(report.to_json().unwrap());
        assert!(read.is_err());
        let read: AlignmentReport =
            serde_json::from_value(report.to_scoring_json().unwrap()).unwrap();
        assert_eq!(read, report);
        assert_eq!((read.support, read.predicted), (1, 1));
        assert_eq!(read.to_json().unwrap(), report.to_json().unwrap());
    }

    #[rstest]
    #[case(r#"{"matches":0,"left-aligns":0,"right-aligns":0,"overlaps":0,"misses":0,"wrong-type":{"matches":1},"support":1,"predicted":1}"#)]
    #[case(r#"{"matches":0,"left-aligns":0,"right-aligns":0,"overlaps":0,"misses":1,"wrong-type":{"misses":1},"support":1,"predicted":0}"#)]
    #[case(r#"{"matches":0,"left-aligns":0,"right-aligns":0,"overlaps":0,"misses":3,"wrong-type":{},"support":2,"predicted":0}"#)]
    fn test_inconsistent_reports_are_rejected(#[case] json: &str) {
        let read: Result<AlignmentReport, _> = serde_json::from_str(json);
        let err = read.unwrap_err();
        assert!(err.to_string().contains("inconsistent alignment report"));
    }

    #[test]
    fn test_typed_matches_saturates() {
        let report = AlignmentReport {
            wrong_type: BTreeMap::from([(AlignmentCategory::Match, 1)]),
            ..Default::default()
        };
        assert_eq!(report.typed_matches(), 0);
    }

    #[test]
    fn test_reports_add_up() {
        let first = evaluate(&entities(&[(0, 5, "A")]), &entities(&[(0, 5, "B")]));
        let second = evaluate(&entities(&[(0, 5, "A"), (9, 12, "A")]), &entities(&[(0, 3, "A")]));
        let total: AlignmentReport = [first.clone(), second.clone()].iter().sum();
        assert_eq!(total, first + second);
        assert_eq!(counts(&total), [1, 1, 0, 0, 1]);
        assert_eq!((total.support, total.predicted), (3, 2));
        assert_eq!(total.wrong_type_count(AlignmentCategory::Match), 1);
    }

    #[test]
    fn test_from_entity_uses_type_id_as_tag() {
        use crate::model::{Span, TypeRef};
        let entity = Entity::new("1", "alice", Span::new(3, 9), TypeRef::new("7", "T1", "n", "g", "G"));
        let scored = ScoredEntity::from(&entity);
        assert_eq!(scored, ScoredEntity::new(3, 9, "7"));
    }

    fn build(raw: Vec<(u8, u8, bool)>) -> Vec<ScoredEntity<'static>> {
        let mut built: Vec<_> = raw
            .into_iter()
            .map(|(start, len, tag)| {
                let start = start as usize;
                ScoredEntity::new(start, start + (len % 16) as usize, if tag { "A" } else { "B" })
            })
            .collect();
        sort_by_start(&mut built);
        built
    }

    #[test]
    fn test_property_each_gold_is_classified_or_missed_once() {
        fn classified_or_missed(gold: Vec<(u8, u8, bool)>, predicted: Vec<(u8, u8, bool)>) -> TestResult {
            let gold = build(gold);
            let predicted = build(predicted);
            let mut classified = vec![0usize; gold.len()];
            let mut missed = vec![0usize; gold.len()];
            sweep(&gold, &predicted, |index, outcome| match outcome {
                Some(_) => classified[index] += 1,
                None => missed[index] += 1,
            });
            let exactly_one = classified
                .iter()
                .zip(missed.iter())
                .all(|(c, m)| (*c > 0 && *m == 0) || (*c == 0 && *m == 1));
            let report = evaluate(&gold, &predicted);
            let totals_agree = report.misses == missed.iter().sum::<usize>()
                && report.classified() == classified.iter().sum::<usize>();
            TestResult::from_bool(exactly_one && totals_agree)
        }
        QuickCheck::new().tests(2000).quickcheck(
            classified_or_missed as fn(Vec<(u8, u8, bool)>, Vec<(u8, u8, bool)>) -> TestResult,
        )
    }

    #[test]
    fn test_property_wrong_type_never_exceeds_category() {
        fn wrong_type_bounded(gold: Vec<(u8, u8, bool)>, predicted: Vec<(u8, u8, bool)>) -> bool {
            let report = evaluate(&build(gold), &build(predicted));
            AlignmentCategory::all().all(|c| report.wrong_type_count(c) <= report.count(c))
        }
        QuickCheck::new().tests(2000).quickcheck(
            wrong_type_bounded as fn(Vec<(u8, u8, bool)>, Vec<(u8, u8, bool)>) -> bool,
        )
    }

    #[test]
    fn test_property_evaluated_reports_read_back() {
        fn reads_back(gold: Vec<(u8, u8, bool)>, predicted: Vec<(u8, u8, bool)>) -> bool {
            let report = evaluate(&build(gold), &build(predicted));
            let json = report.to_scoring_json().unwrap();
            serde_json::from_value::<AlignmentReport>(json).ok() == Some(report)
        }
        QuickCheck::new().tests(500).quickcheck(
            reads_back as fn(Vec<(u8, u8, bool)>, Vec<(u8, u8, bool)>) -> bool,
        )
    }
}
