//! Result types produced by a join analysis run. Everything here is
//! created fresh per invocation and never mutated after creation;
//! renderers consume these as read-only views (all serde-serializable).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Uniqueness relationship between two joined columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cardinality {
    OneToOne,
    OneToMany,
    ManyToOne,
    ManyToMany,
}

impl std::fmt::Display for Cardinality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Cardinality::OneToOne => "1:1",
            Cardinality::OneToMany => "1:N",
            Cardinality::ManyToOne => "N:1",
            Cardinality::ManyToMany => "N:M",
        };
        write!(f, "{}", s)
    }
}

/// A proposed (referencing column -> referenced column) relationship.
///
/// Invariant: `table != referenced_table`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForeignKeyCandidate {
    /// Referencing table.
    pub table: String,

    /// Referencing column.
    pub column: String,

    /// Referenced table.
    pub referenced_table: String,

    /// Referenced column.
    pub referenced_column: String,

    /// Fused confidence in [0, 1].
    pub confidence: f64,

    /// Sampled referencing rows whose value was found on the
    /// referenced side.
    pub matching_rows: usize,

    /// Sampled referencing rows examined.
    pub total_rows: usize,

    /// Sampled referencing rows whose value was NOT found on the
    /// referenced side.
    pub violations: usize,
}

/// How a dependency edge was surfaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeType {
    Fk,
    Inferred,
    BusinessRule,
}

/// One table in the dependency graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableNode {
    pub name: String,

    /// Topological level: roots sit at 0, every other node at
    /// max(parent levels) + 1.
    pub level: usize,

    /// Names of tables this table references.
    pub parents: Vec<String>,

    /// Names of tables referencing this table.
    pub children: Vec<String>,

    pub is_root: bool,
    pub is_leaf: bool,
}

/// One surfaced relationship in the dependency graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DependencyEdge {
    /// Referencing table.
    pub from: String,

    /// Referenced table.
    pub to: String,

    pub from_column: String,
    pub to_column: String,

    /// Column-name similarity behind this edge.
    pub similarity: f64,

    pub cardinality: Cardinality,

    /// Aggregate evidence strength (the candidate's confidence).
    pub strength: f64,

    pub edge_type: EdgeType,
}

/// Directed graph of tables connected by inferred relationships.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DependencyGraph {
    /// One node per analyzed table, keyed by table name.
    pub nodes: HashMap<String, TableNode>,

    pub edges: Vec<DependencyEdge>,

    /// Detected cycles, each listed as a table-name path.
    pub cycles: Vec<Vec<String>>,
}

/// How two columns should be joined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinStrategy {
    ExactMatch,
    SemanticMatch,
    PatternMatch,
    RangeOverlap,
    FuzzyMatch,
    StatisticalMatch,
}

/// Expected runtime class for executing a join.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PerformanceClass {
    Fast,
    Moderate,
    Slow,
}

/// Heuristic quality estimates attached to each join candidate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinQualityMetrics {
    /// Estimated fraction of rows lost under an inner join.
    pub estimated_data_loss: f64,

    /// Estimated row multiplication factor.
    pub duplication_factor: f64,

    /// How consistent the two sides look (0..1).
    pub consistency_score: f64,

    pub performance: PerformanceClass,

    /// Suggested index, if any.
    pub index_recommendation: Option<String>,
}

/// A concrete join proposal between two tables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinCandidate {
    pub left_table: String,
    pub right_table: String,
    pub left_column: String,
    pub right_column: String,

    pub strategy: JoinStrategy,

    /// Fused confidence in [0, 1].
    pub confidence: f64,

    pub cardinality: Cardinality,

    /// Rough output-row estimate for the join.
    pub estimated_rows: usize,

    pub quality: JoinQualityMetrics,
}

impl JoinCandidate {
    /// De-duplication key used when merging batched runs.
    pub fn dedup_key(&self) -> (String, String, String, String) {
        (
            self.left_table.clone(),
            self.left_column.clone(),
            self.right_table.clone(),
            self.right_column.clone(),
        )
    }
}

/// A named multi-table association inferred from naming conventions
/// rather than raw foreign-key evidence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusinessRule {
    /// Pattern name, e.g. "customer-order".
    pub name: String,

    pub description: String,

    /// Tables that matched the pattern.
    pub tables: Vec<String>,

    /// Derived from the strength of edges connecting the matched
    /// tables; base value when no edges connect them.
    pub confidence: f64,
}

impl BusinessRule {
    /// De-duplication key: name plus the sorted table set.
    pub fn dedup_key(&self) -> (String, Vec<String>) {
        let mut tables = self.tables.clone();
        tables.sort();
        (self.name.clone(), tables)
    }
}

/// Alignment strategy for a temporal join. Only `Exact` is selected
/// today; the other variants are published vocabulary for renderers
/// and future tolerance-based alignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemporalStrategy {
    Exact,
    Nearest,
    Range,
    SlidingWindow,
}

/// A proposed alignment between two date/time columns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemporalJoin {
    pub left_table: String,
    pub right_table: String,
    pub left_column: String,
    pub right_column: String,
    pub strategy: TemporalStrategy,
}

/// A candidate whose sampled data contained referential violations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokenRelationship {
    pub candidate: ForeignKeyCandidate,

    /// Generated cleanup suggestion.
    pub recommendation: String,
}

/// Referential-integrity partition of all foreign-key candidates.
/// Every input candidate lands in exactly one of the two lists.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IntegrityReport {
    pub valid_joins: Vec<ForeignKeyCandidate>,
    pub broken_relationships: Vec<BrokenRelationship>,
}

/// Dataset complexity classified by total row volume. Ordered so
/// merged runs can keep the worst class seen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplexityClass {
    Low,
    Medium,
    High,
}

/// Capacity analysis for the current dataset and a 10x projection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceAnalysis {
    pub total_rows: usize,
    pub total_size_bytes: u64,

    /// Row count at a 10x growth projection.
    pub projected_rows: usize,

    /// Size at a 10x growth projection.
    pub projected_size_bytes: u64,

    pub complexity: ComplexityClass,
}

/// Run-level counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisSummary {
    pub tables_analyzed: usize,
    pub foreign_keys_found: usize,
    pub join_candidates: usize,
    pub business_rules: usize,
    pub duration_ms: u64,
}

/// Complete, immutable output of one analysis run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinAnalysisResult {
    pub summary: AnalysisSummary,
    pub candidates: Vec<JoinCandidate>,
    pub graph: DependencyGraph,
    pub integrity: IntegrityReport,
    pub business_rules: Vec<BusinessRule>,
    pub temporal_joins: Vec<TemporalJoin>,
    pub recommendations: Vec<String>,
    pub performance: PerformanceAnalysis,
}
