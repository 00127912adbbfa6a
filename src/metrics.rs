/**
This module computes the metrics (precision, recall, f-score, support) of a corpus of alignment
reports. Each report scores one document; the scores can be kept per document or averaged over
the corpus.
*/
use crate::alignment::{AlignmentCategory, AlignmentReport};
use crate::config::ScoringConfig;
use crate::reporter::{Average, OverallAverage, Reporter, ScoreRow};
use core::fmt;
use enum_iterator::{all, Sequence};
use log::warn;
use ndarray::{prelude::*, Data, Zip};
use ndarray_stats::{errors::MultiInputError, SummaryStatisticsExt};
use num::Num;
use serde::{Deserialize, Serialize};
use std::{
    error::Error,
    fmt::{Debug, Display},
    str::FromStr,
};

#[derive(Debug, Clone, PartialEq)]
pub struct ArrayNotUniqueOrEmpty(usize);

impl Display for ArrayNotUniqueOrEmpty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "This array contains more than one element or is empty. It has length: {} Cannot call `item` on it", self.0
        )
    }
}
impl Error for ArrayNotUniqueOrEmpty {}

trait ItemArrayExt<Output> {
    /// Returns the element out of the Array. Can return an error if the array is empty of if the
    /// array has a length superior to 1.
    fn item(&self) -> Result<Output, ArrayNotUniqueOrEmpty>;
}

impl<F: Clone, T: Data<Elem = F>> ItemArrayExt<F> for ArrayBase<T, Ix1> {
    fn item(&self) -> Result<F, ArrayNotUniqueOrEmpty> {
        match (self.len(), self.first()) {
            (1, Some(first)) => Ok(first.clone()),
            (n, _) => Err(ArrayNotUniqueOrEmpty(n)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
/// How do we handle cases with a division by zero? A document without any predicted entity has
/// no precision and a document without gold entity has no recall. The default strategy replaces
/// these scores by 0. `ReturnError` stops the computation; it can be useful if you believe there
/// should be no 0 in the denominator.
pub enum DivByZeroStrat {
    /// The score is `1` when its denominator is `0`
    ReplaceBy1,
    /// Returns an error
    ReturnError,
    /// The score is `0` when its denominator is `0`
    ReplaceBy0,
}
impl Default for DivByZeroStrat {
    fn default() -> Self {
        Self::ReplaceBy0
    }
}

#[derive(Debug)]
pub struct ParsingDivisionByZeroStrategyError<S: Debug + Display>(S);

impl<S: Debug + Display> Display for ParsingDivisionByZeroStrategyError<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Could not parse the {} into a a `DivisionByZeroStrategy`",
            self.0
        )
    }
}
impl<S: Debug + Display> Error for ParsingDivisionByZeroStrategyError<S> {}

impl FromStr for DivByZeroStrat {
    type Err = ParsingDivisionByZeroStrategyError<String>;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_ref() {
            "replaceby1" | "replacebyone" => Ok(DivByZeroStrat::ReplaceBy1),
            "replaceby0" | "replacebyzero" => Ok(DivByZeroStrat::ReplaceBy0),
            "returnerror" | "error" => Ok(DivByZeroStrat::ReturnError),
            _ => Err(ParsingDivisionByZeroStrategyError(String::from(s))),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DivisionByZeroError;

impl Display for DivisionByZeroError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Encountered division by zero")
    }
}

impl Error for DivisionByZeroError {}

/// What counts as a true positive.
#[derive(
    Debug, Hash, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Sequence, Serialize, Deserialize,
)]
pub enum Criterion {
    /// Exact span match with the correct type.
    Strict,
    /// Exact span match, whatever the type.
    Span,
}

impl Criterion {
    fn true_positives(&self, report: &AlignmentReport) -> usize {
        let tp = match self {
            Self::Strict => report.typed_matches(),
            Self::Span => report.count(AlignmentCategory::Match),
        };
        // Duplicate spans can match more than once.
        tp.min(report.support).min(report.predicted)
    }
}

impl Display for Criterion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

fn prf_divide<I: Debug + Num + Clone + Send + Sync + Copy, D: Dimension>(
    numerator: ArcArray<I, D>,
    denominator: ArrayViewMut<I, D>,
    parallel: bool,
    zero_division: DivByZeroStrat,
) -> Result<ArcArray<I, D>, DivisionByZeroError> {
    let (result, zero_mask) = if parallel {
        par_prf_divide_results_and_mask(numerator, denominator)
    } else {
        prf_divide_results_and_mask(numerator, denominator)
    };
    let zeros = zero_mask.iter().filter(|m| **m == I::zero()).count();
    if zeros == 0 {
        return Ok(result);
    }
    match zero_division {
        DivByZeroStrat::ReturnError => Err(DivisionByZeroError),
        DivByZeroStrat::ReplaceBy1 => {
            warn!("event=zero_division_replaced module=metrics count={zeros} value=1");
            Ok(fill_masked(result, &zero_mask, I::one(), parallel))
        }
        DivByZeroStrat::ReplaceBy0 => {
            warn!("event=zero_division_replaced module=metrics count={zeros} value=0");
            Ok(fill_masked(result, &zero_mask, I::zero(), parallel))
        }
    }
}

/// Computes the result and the mask of the non-zero denominators, in parallel when asked to.
/// Zero denominators are replaced by one before dividing.
///
/// * `numerator`: Numerator of the division
/// * `denominator`: Denominator of the division
fn par_prf_divide_results_and_mask<I: Debug + Num + Clone + Send + Sync, D: Dimension>(
    numerator: ArcArray<I, D>,
    mut denominator: ArrayViewMut<I, D>,
) -> (ArcArray<I, D>, Array<I, D>) {
    let zero_at_mask = Zip::from(&mut denominator).par_map_collect(|d| {
        if *d == I::zero() {
            I::zero()
        } else {
            I::one()
        }
    });
    denominator.par_mapv_inplace(|v| if v == I::zero() { I::one() } else { v });
    (numerator / denominator, zero_at_mask)
}

/// Synchronous version of `par_prf_divide_results_and_mask`.
fn prf_divide_results_and_mask<I: Debug + Num + Clone, D: Dimension>(
    numerator: ArcArray<I, D>,
    mut denominator: ArrayViewMut<I, D>,
) -> (ArcArray<I, D>, Array<I, D>) {
    let zero_at_mask =
        Zip::from(&mut denominator)
            .map_collect(|d| if *d == I::zero() { I::zero() } else { I::one() });
    denominator.mapv_inplace(|v| if v == I::zero() { I::one() } else { v });
    (numerator / denominator, zero_at_mask)
}

/// Sets `value` wherever the mask is zero.
fn fill_masked<I: Num + Copy + Send + Sync, D: Dimension>(
    mut array: ArcArray<I, D>,
    mask: &Array<I, D>,
    value: I,
    parallel: bool,
) -> ArcArray<I, D> {
    let zip = Zip::from(&mut array).and(mask);
    let fill = |r: &mut I, m: &I| {
        if *m == I::zero() {
            *r = value
        }
    };
    if parallel {
        zip.par_for_each(fill);
    } else {
        zip.for_each(fill);
    }
    array
}

/// Helper function to replace values from an array.
fn replace<Data: PartialEq + Copy, D: Dimension>(
    mut array: ArcArray<Data, D>,
    replaced: Data,
    new_value: Data,
) -> ArcArray<Data, D> {
    array.mapv_inplace(|v| if v == replaced { new_value } else { v });
    array
}

/// Helper function to replace values from an array in parallel.
fn par_replace<Data: PartialEq + Send + Sync + Copy, D: Dimension>(
    mut array: ArcArray<Data, D>,
    replaced: Data,
    new_value: Data,
) -> ArcArray<Data, D> {
    array.par_mapv_inplace(|v| if v == replaced { new_value } else { v });
    array
}

#[derive(Debug, Clone, PartialEq)]
/// Enum error encompassing the failures that could happen when computing the precison, recall,
/// f-score and the support.
pub enum ComputationError {
    BetaNotPositive,
    DivisionByZero(DivisionByZeroError),
    InputError(MultiInputError),
    EmptyOrNotUnique(ArrayNotUniqueOrEmpty),
    EmptyInput(String),
}
impl Display for ComputationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BetaNotPositive => write!(f, "Beta value is not positive"),
            Self::DivisionByZero(div_err) => std::fmt::Display::fmt(&div_err, f),
            Self::InputError(input_err) => std::fmt::Display::fmt(&input_err, f),
            Self::EmptyOrNotUnique(size_err) => std::fmt::Display::fmt(size_err, f),
            Self::EmptyInput(which) => write!(f, "Received an empty input {}", which),
        }
    }
}
impl Error for ComputationError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::DivisionByZero(err) => Some(err),
            Self::InputError(err) => Some(err),
            Self::EmptyOrNotUnique(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DivisionByZeroError> for ComputationError {
    fn from(value: DivisionByZeroError) -> Self {
        Self::DivisionByZero(value)
    }
}

impl From<MultiInputError> for ComputationError {
    fn from(value: MultiInputError) -> Self {
        Self::InputError(value)
    }
}

impl From<ArrayNotUniqueOrEmpty> for ComputationError {
    fn from(value: ArrayNotUniqueOrEmpty) -> Self {
        Self::EmptyOrNotUnique(value)
    }
}

/// Type alias for representing the output of the `precision_recall_fscore_support`. The first
/// array contains the precision, the second the recall, the third the f-score and the last one
/// the support.
pub type PrecisionRecallFScoreTrueSum = (Array1<f32>, Array1<f32>, Array1<f32>, Array1<usize>);

/// predicted sum, true positive sum and true sum
type ActualTPCorrect<T> = (Array1<T>, Array1<T>, Array1<T>);

fn extract_tp_actual_correct(
    reports: &[AlignmentReport],
    criterion: Criterion,
) -> ActualTPCorrect<usize> {
    let pred_sum = Array::from_iter(reports.iter().map(|r| r.predicted));
    let tp_sum = Array::from_iter(reports.iter().map(|r| criterion.true_positives(r)));
    let true_sum = Array::from_iter(reports.iter().map(|r| r.support));
    (pred_sum, tp_sum, true_sum)
}

/// Computes the precision, recall, fscore and support of a corpus of alignment reports, one
/// report per document.
///
/// * `reports`: One alignment report per document.
/// * `criterion`: What counts as a true positive.
/// * `beta`: Value of the `beta` parameter of the fscore. `beta=1` for F1 and `beta=0.5` for F0.5.
/// * `average`: How to combine the documents. `Average::None` keeps one entry per document.
/// * `zero_division`: What to do in case of division by zero.
/// * `parallel`: Can we use multiple cores for computations?
pub fn precision_recall_fscore_support(
    reports: &[AlignmentReport],
    criterion: Criterion,
    beta: f32,
    average: Average,
    zero_division: DivByZeroStrat,
    parallel: bool,
) -> Result<PrecisionRecallFScoreTrueSum, ComputationError> {
    if reports.is_empty() {
        return Err(ComputationError::EmptyInput(String::from("reports")));
    }
    if beta.is_sign_negative() {
        return Err(ComputationError::BetaNotPositive);
    };
    let (mut pred_sum, mut tp_sum, mut true_sum) = extract_tp_actual_correct(reports, criterion);
    let beta2 = beta.powi(2);
    if matches!(average, Average::Micro) {
        tp_sum = array![tp_sum.sum()];
        pred_sum = array![pred_sum.sum()];
        true_sum = array![true_sum.sum()];
    };
    let arc_tp_sum = tp_sum.mapv(|x| x as f32).to_shared();
    let precision = prf_divide(
        arc_tp_sum.clone(),
        pred_sum.mapv(|x| x as f32).view_mut(),
        parallel,
        zero_division,
    )?;
    let recall = prf_divide(
        arc_tp_sum,
        true_sum.mapv(|x| x as f32).view_mut(),
        parallel,
        zero_division,
    )?;
    let f_score: ArcArray<f32, Ix1> = if beta2.is_infinite() {
        recall.clone()
    } else {
        let denom = precision.clone() + recall.view();
        let denom_non_zero = if parallel {
            par_replace(denom, 0.0, 1.0)
        } else {
            replace(denom, 0.0, 1.0)
        };
        (beta2 + 1.0) * precision.clone() * recall.view() / denom_non_zero
    };
    match average {
        Average::Weighted => {
            let weights = true_sum;
            if weights.sum() == 0 {
                return match zero_division {
                    DivByZeroStrat::ReturnError => {
                        Err(ComputationError::DivisionByZero(DivisionByZeroError))
                    }
                    _ => Ok((array![0.0], array![0.0], array![0.0], array![0])),
                };
            };
            let float_weights = weights.mapv(|x| x as f32).into_shared();
            let final_precision = array![precision.weighted_mean(&float_weights)?];
            let final_recall = array![recall.weighted_mean(&float_weights)?];
            let final_f_score = array![f_score.weighted_mean(&float_weights)?];
            Ok((
                final_precision,
                final_recall,
                final_f_score,
                array![weights.sum()],
            ))
        }
        Average::None => Ok((
            precision.into_owned(),
            recall.into_owned(),
            f_score.into_owned(),
            true_sum,
        )),
        Average::Micro | Average::Macro => {
            let mean = |scores: &ArcArray<f32, Ix1>, name: &str| {
                scores
                    .mean()
                    .ok_or_else(|| ComputationError::EmptyInput(String::from(name)))
            };
            Ok((
                array![mean(&precision, "precision")?],
                array![mean(&recall, "recall")?],
                array![mean(&f_score, "fscore")?],
                array![true_sum.sum()],
            ))
        }
    }
}

/// Main entrypoint of the scoring side of the crate. Computes the strict and span scores of a
/// corpus of alignment reports under every overall average. The returned structure can be used to
/// prettyprint the results.
///
/// * `reports`: One alignment report per document.
/// * `config`: Beta, zero division strategy and parallelism.
pub fn scoring_report(
    reports: &[AlignmentReport],
    config: &ScoringConfig,
) -> Result<Reporter, ComputationError> {
    let mut reporter = Reporter::default();
    for criterion in all::<Criterion>() {
        for avg in all::<OverallAverage>() {
            let (p, r, f, s) = precision_recall_fscore_support(
                reports,
                criterion,
                config.beta,
                avg.into(),
                config.zero_division,
                config.parallel,
            )?;
            reporter.insert(ScoreRow::new(
                criterion,
                avg,
                p.item()?,
                r.item()?,
                f.item()?,
                s.item()?,
            ));
        }
    }
    Ok(reporter)
}
