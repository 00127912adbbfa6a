/**
This modules gives a few tools to prettyprint the scores derived from alignment reports, one row
per scoring criterion and overall average.
*/
use crate::metrics::Criterion;
use enum_iterator::Sequence;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt::Display;
use std::str::FromStr;

/// The reporter holds the overall scores of a corpus of alignment reports. It can be used to
/// display the results as if they were collected into a dataframe. The reporter can be built with
/// the `scoring_report` function.
///
/// # Example
///
/// ```rust
/// use annoview::{evaluate, scoring_report, ScoredEntity, ScoringConfig};
///
/// let gold = vec![ScoredEntity::new(0, 5, "DRUG"), ScoredEntity::new(8, 12, "DRUG")];
/// let predicted = vec![ScoredEntity::new(0, 5, "DRUG")];
/// let reports = vec![evaluate(&gold, &predicted)];
///
/// let reporter = scoring_report(&reports, &ScoringConfig::default()).unwrap();
///
/// let expected_report =
/// "Criterion, Precision, Recall, Fscore, Support
/// Strict_Micro, 1, 0.5, 0.6666667, 2
/// Strict_Macro, 1, 0.5, 0.6666667, 2
/// Strict_Weighted, 1, 0.5, 0.6666667, 2
/// Span_Micro, 1, 0.5, 0.6666667, 2
/// Span_Macro, 1, 0.5, 0.6666667, 2
/// Span_Weighted, 1, 0.5, 0.6666667, 2\n";
///
/// assert_eq!(expected_report, reporter.to_string());
/// ```
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct Reporter {
    pub(crate) rows: BTreeSet<ScoreRow>,
}

impl Reporter {
    pub(crate) fn insert(&mut self, row: ScoreRow) -> bool {
        self.rows.insert(row)
    }
    pub fn get(&self, criterion: Criterion, average: OverallAverage) -> Option<&ScoreRow> {
        self.rows
            .iter()
            .find(|r| r.criterion == criterion && r.average == average)
    }
    pub fn rows(&self) -> impl Iterator<Item = &ScoreRow> {
        self.rows.iter()
    }
    pub fn len(&self) -> usize {
        self.rows.len()
    }
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// The Reporter struct acts as a dataframe when displayed.
impl Display for Reporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Criterion, Precision, Recall, Fscore, Support")?;
        for row in self.rows.iter() {
            writeln!(f, "{}", row)?
        }
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
/// Scores of one criterion under one overall average. Rows are compared on the criterion and the
/// average only.
pub struct ScoreRow {
    pub criterion: Criterion,
    pub average: OverallAverage,
    pub precision: f32,
    pub recall: f32,
    pub fscore: f32,
    /// Number of gold entities.
    pub support: usize,
}

impl ScoreRow {
    pub(crate) fn new(
        criterion: Criterion,
        average: OverallAverage,
        precision: f32,
        recall: f32,
        fscore: f32,
        support: usize,
    ) -> Self {
        ScoreRow {
            criterion,
            average,
            precision,
            recall,
            fscore,
            support,
        }
    }
}

impl PartialEq for ScoreRow {
    fn eq(&self, other: &Self) -> bool {
        self.criterion == other.criterion && self.average == other.average
    }
}
impl Eq for ScoreRow {}

impl PartialOrd for ScoreRow {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ScoreRow {
    fn cmp(&self, other: &Self) -> Ordering {
        self.criterion
            .cmp(&other.criterion)
            .then(self.average.cmp(&other.average))
    }
}

/// The ScoreRow struct acts as a line in a dataframe when displayed.
impl Display for ScoreRow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}_{}, {}, {}, {}, {}",
            self.criterion, self.average, self.precision, self.recall, self.fscore, self.support
        )
    }
}

/// Enumeration of the different types of averaging over documents. &str can be parsed to create
/// an `Average`.
#[derive(Debug, Hash, PartialEq, Eq, Copy, Clone, Serialize, Deserialize)]
pub enum Average {
    /// One score per document.
    None,
    /// Counts are summed over documents before dividing.
    Micro,
    /// Unweighted mean of the per-document scores.
    Macro,
    /// Mean of the per-document scores weighted by their gold support.
    Weighted,
}
impl Display for Average {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}
impl FromStr for Average {
    type Err = AverageParsingError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "none" => Ok(Average::None),
            "micro" => Ok(Average::Micro),
            "macro" => Ok(Average::Macro),
            "weighted" => Ok(Average::Weighted),
            _ => Err(AverageParsingError(String::from(s))),
        }
    }
}

#[derive(Debug, PartialEq, PartialOrd, Eq, Ord, Clone)]
pub struct AverageParsingError(String);
impl Display for AverageParsingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Impossible to parse the string ({}) into an Average",
            self.0
        )
    }
}
impl std::error::Error for AverageParsingError {}

/// Averages producing a single value, the ones shown by the reporter.
#[derive(
    Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Copy, Clone, Sequence, Serialize, Deserialize,
)]
pub enum OverallAverage {
    Micro,
    Macro,
    Weighted,
}

impl Display for OverallAverage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let str_content = match self {
            Self::Micro => "Micro",
            Self::Macro => "Macro",
            Self::Weighted => "Weighted",
        };
        write!(f, "{}", str_content)
    }
}

impl From<OverallAverage> for Average {
    fn from(value: OverallAverage) -> Self {
        match value {
            OverallAverage::Micro => Average::Micro,
            OverallAverage::Macro => Average::Macro,
            OverallAverage::Weighted => Average::Weighted,
        }
    }
}
