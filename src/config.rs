/*
 * This modules contains the configuration structs of the crate. `OverlayConfig` drives the legend
 * of the composed view and `ScoringConfig` the metrics computed from alignment reports. Both
 * implement the default trait, can be deserialized from a host's configuration file and have a
 * builder.
*/
use crate::metrics::DivByZeroStrat;
use crate::overlay::LegendEntry;
use either::Either as LeftOrRight;
use serde::{Deserialize, Serialize};
use std::fmt::{Debug, Display};

/// Colors handed out to the other annotators, in order of appearance.
pub const DEFAULT_PALETTE: [&str; 7] = [
    "blue",
    "navy",
    "brown",
    "chocolate",
    "orange",
    "maroon",
    "turquoise",
];

pub(crate) const DEFAULT_USER_NAME: &str = "You";
pub(crate) const DEFAULT_USER_COLOR: &str = "#55AA55";
pub(crate) const DEFAULT_PREDICTION_NAME: &str = "Prediction Engine";
pub(crate) const DEFAULT_PREDICTION_COLOR: &str = "gray";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
/// Config struct used by the overlay composer. It describes how the legend of a composed view
/// looks like. It implements the default trait.
pub struct OverlayConfig {
    /// Cyclic palette used for the annotators other than the requesting user and the prediction
    /// engine. Should contain at least 7 colors to keep small groups visually distinct.
    pub palette: Vec<String>,
    /// Legend entry of slot `0`, the requesting user.
    pub user_entry: LegendEntry,
    /// Legend entry of slot `-1`, the prediction engine.
    pub prediction_entry: LegendEntry,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            palette: default_palette(),
            user_entry: LegendEntry::new(DEFAULT_USER_NAME, DEFAULT_USER_COLOR),
            prediction_entry: LegendEntry::new(DEFAULT_PREDICTION_NAME, DEFAULT_PREDICTION_COLOR),
        }
    }
}

impl OverlayConfig {
    pub fn new() -> Self {
        Self::default()
    }
    /// Color of the `index`-th annotator in order of appearance. The palette wraps around. An
    /// empty palette falls back on the default one.
    pub fn color_for(&self, index: usize) -> &str {
        if self.palette.is_empty() {
            DEFAULT_PALETTE[index % DEFAULT_PALETTE.len()]
        } else {
            &self.palette[index % self.palette.len()]
        }
    }
}

fn default_palette() -> Vec<String> {
    DEFAULT_PALETTE.iter().map(|c| String::from(*c)).collect()
}

impl Display for OverlayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let string = format!(
            "Palette: {:?}\n User legend entry: {}\n Prediction engine legend entry: {}",
            self.palette, self.user_entry, self.prediction_entry
        );
        write!(f, "{}", string)
    }
}

/// This builder can be used to build and customize an `OverlayConfig` structure.
pub struct OverlayConfigBuilder {
    palette: LeftOrRight<Vec<String>, [&'static str; 7]>,
    user_entry: Option<LegendEntry>,
    prediction_entry: Option<LegendEntry>,
}

impl Default for OverlayConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl OverlayConfigBuilder {
    pub fn new() -> Self {
        Self {
            palette: LeftOrRight::Right(DEFAULT_PALETTE),
            user_entry: None,
            prediction_entry: None,
        }
    }
    /// Replaces the palette. An empty palette is ignored.
    pub fn palette<S: Into<String>, I: IntoIterator<Item = S>>(mut self, palette: I) -> Self {
        let colors: Vec<String> = palette.into_iter().map(|c| c.into()).collect();
        if !colors.is_empty() {
            self.palette = LeftOrRight::Left(colors);
        }
        self
    }
    pub fn user_entry<S: Into<String>>(mut self, name: S, color: S) -> Self {
        self.user_entry = Some(LegendEntry::new(name, color));
        self
    }
    pub fn prediction_entry<S: Into<String>>(mut self, name: S, color: S) -> Self {
        self.prediction_entry = Some(LegendEntry::new(name, color));
        self
    }
    pub fn build(self) -> OverlayConfig {
        let defaults = OverlayConfig::default();
        OverlayConfig {
            palette: self
                .palette
                .either(|custom| custom, |d| d.iter().map(|c| String::from(*c)).collect()),
            user_entry: self.user_entry.unwrap_or(defaults.user_entry),
            prediction_entry: self.prediction_entry.unwrap_or(defaults.prediction_entry),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
/// Config struct used to simplify the inputs of the scoring functions. It implements the default
/// trait.
pub struct ScoringConfig {
    /// Value of the `beta` parameter of the fscore. `beta=1` for F1 and `beta=0.5` for F0.5.
    pub beta: f32,
    /// This parameter describe what to do when we encounter a division by zero when computing
    /// precision and recall. The most common solution is to replace the results by 0.
    pub zero_division: DivByZeroStrat,
    /// Can we use multiple cores to compute the metrics? Only worth it for large corpora.
    pub parallel: bool,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            beta: 1.0,
            zero_division: DivByZeroStrat::ReplaceBy0,
            parallel: false,
        }
    }
}

impl Display for ScoringConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let string = format!("Beta: {}\n Strategy when encountering a division by zero: {:?}\n Using parallel computations: {}", self.beta, self.zero_division, self.parallel);
        write!(f, "{}", string)
    }
}

/// This builder can be used to build and customize a `ScoringConfig` stucture.
pub struct ScoringConfigBuilder<ZeroDiv>
where
    ZeroDiv: Into<DivByZeroStrat>,
{
    beta: f32,
    zero_division: LeftOrRight<ZeroDiv, DivByZeroStrat>,
    parallel: bool,
}

impl Default for ScoringConfigBuilder<DivByZeroStrat> {
    fn default() -> Self {
        Self::new()
    }
}

impl<ZeroDiv> ScoringConfigBuilder<ZeroDiv>
where
    ZeroDiv: Into<DivByZeroStrat>,
{
    pub fn new() -> Self {
        Self {
            beta: 1.0,
            zero_division: LeftOrRight::Right(DivByZeroStrat::ReplaceBy0),
            parallel: false,
        }
    }
    pub fn beta(mut self, beta: f32) -> Self {
        self.beta = beta;
        self
    }
    pub fn division_by_zero(mut self, division_by_zero: ZeroDiv) -> Self {
        self.zero_division = LeftOrRight::Left(division_by_zero);
        self
    }
    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }
    pub fn build(self) -> ScoringConfig {
        ScoringConfig {
            beta: self.beta,
            zero_division: self.zero_division.either_into(),
            parallel: self.parallel,
        }
    }
}
