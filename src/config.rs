use serde::{Deserialize, Serialize};

/// Advisory performance mode; affects recommendation wording only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PerformanceMode {
    Fast,
    Balanced,
    Thorough,
}

/// Output formats downstream renderers may request. The engine itself
/// only produces the result aggregate; this travels along as advisory
/// configuration for the rendering layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    Json,
    Markdown,
    Sql,
    Diagram,
}

/// Configuration for a join analysis run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Maximum number of tables per run. The batch coordinator raises
    /// this on its inner analyzer.
    pub max_tables: usize,

    /// Minimum confidence for a join candidate to survive at the
    /// analyzer layer.
    pub confidence_threshold: f64,

    /// Minimum confidence for a "confirmed" foreign-key candidate at
    /// the detector layer. Candidates in [0.3, threshold) are still
    /// returned as suggestions.
    pub detector_threshold: f64,

    /// Enable the fuzzy (edit-distance) branch of name matching.
    pub enable_fuzzy_matching: bool,

    /// Enable semantic (synonym / pattern-family) name matching.
    pub enable_semantic_analysis: bool,

    /// Enable temporal join detection (off by default).
    pub enable_temporal_joins: bool,

    /// Advisory only.
    pub performance_mode: PerformanceMode,

    /// Formats downstream renderers should produce.
    pub output_formats: Vec<OutputFormat>,

    /// Row-sampling cap used when validating candidates against data.
    /// Values below MIN_SAMPLE_SIZE are clamped up.
    pub max_sample_size: usize,
}

pub const MIN_SAMPLE_SIZE: usize = 1000;
pub const DEFAULT_SAMPLE_SIZE: usize = 10_000;

impl Default for Config {
    fn default() -> Self {
        Self {
            max_tables: 10,
            confidence_threshold: 0.7,
            detector_threshold: 0.5,
            enable_fuzzy_matching: true,
            enable_semantic_analysis: true,
            enable_temporal_joins: false,
            performance_mode: PerformanceMode::Balanced,
            output_formats: vec![OutputFormat::Json],
            max_sample_size: DEFAULT_SAMPLE_SIZE,
        }
    }
}

impl Config {
    /// Effective sample cap after clamping to the floor.
    pub fn sample_size(&self) -> usize {
        self.max_sample_size.max(MIN_SAMPLE_SIZE)
    }
}
