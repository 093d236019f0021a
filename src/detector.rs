//! Relationship detection across profiled tables.
//!
//! Consumes the column matcher plus sampled row data and produces
//! data-validated foreign-key candidates, a dependency graph with
//! topological levels and cycle detection, business-pattern
//! inferences, temporal-join candidates, and an integrity report.
//!
//! Data loading failures degrade per table pair: the affected pair
//! falls back to semantic-only scoring instead of aborting the run.

use crate::column_matcher::ColumnMatcher;
use crate::config::Config;
use crate::error::Result;
use crate::ingestion::RowProvider;
use crate::model::{
    BrokenRelationship, BusinessRule, DependencyEdge, DependencyGraph, EdgeType,
    ForeignKeyCandidate, IntegrityReport, TableNode, TemporalJoin, TemporalStrategy,
};
use crate::schema::{CellValue, TableMeta};
use itertools::Itertools;
use std::collections::{HashMap, HashSet, VecDeque};
use tracing::{debug, warn};

/// Confidence fusion weights: naming, data overlap, referential
/// integrity, type compatibility, uniqueness.
const WEIGHT_SEMANTIC: f64 = 0.15;
const WEIGHT_OVERLAP: f64 = 0.35;
const WEIGHT_INTEGRITY: f64 = 0.25;
const WEIGHT_TYPE: f64 = 0.15;
const WEIGHT_UNIQUENESS: f64 = 0.10;

/// Candidates below this floor are dropped even as suggestions.
const SUGGESTION_FLOOR: f64 = 0.3;

/// Factor applied to the semantic score when data validation is
/// unavailable and the pair degrades to name-only evidence.
const FALLBACK_FACTOR: f64 = 0.6;

/// Base confidence for business patterns whose matched tables share no
/// dependency edge.
const BUSINESS_BASE_CONFIDENCE: f64 = 0.7;

/// Named multi-table naming conventions used to infer domain-level
/// associations beyond raw foreign-key evidence.
struct BusinessPattern {
    name: &'static str,
    description: &'static str,
    keywords: &'static [&'static str],
    min_matches: usize,
}

const BUSINESS_PATTERNS: &[BusinessPattern] = &[
    BusinessPattern {
        name: "customer-order",
        description: "Customers place orders",
        keywords: &["customer", "client", "user", "order", "purchase", "sale"],
        min_matches: 2,
    },
    BusinessPattern {
        name: "order-item-product",
        description: "Orders contain line items referencing products",
        keywords: &["order", "item", "line", "product", "sku"],
        min_matches: 2,
    },
    BusinessPattern {
        name: "user-profile",
        description: "Users have extended profile records",
        keywords: &["user", "account", "profile", "preference", "setting"],
        min_matches: 2,
    },
    BusinessPattern {
        name: "invoice-payment",
        description: "Invoices are settled by payments",
        keywords: &["invoice", "bill", "payment", "transaction"],
        min_matches: 2,
    },
    BusinessPattern {
        name: "employee-department",
        description: "Employees belong to departments",
        keywords: &["employee", "staff", "department", "team"],
        min_matches: 2,
    },
];

/// Name tokens that mark a column as temporal even when typed as text.
const TEMPORAL_TOKENS: &[&str] = &["date", "time", "timestamp", "_at", "created", "updated"];

/// Foreign-key detection split into confidence bands.
#[derive(Debug, Clone, Default)]
pub struct FkDetection {
    /// Candidates at or above the detector threshold.
    pub confirmed: Vec<ForeignKeyCandidate>,

    /// Lower-confidence candidates in [0.3, threshold).
    pub suggested: Vec<ForeignKeyCandidate>,
}

impl FkDetection {
    /// Confirmed plus suggested, sorted by descending confidence.
    pub fn all(&self) -> Vec<ForeignKeyCandidate> {
        let mut all: Vec<_> = self
            .confirmed
            .iter()
            .chain(self.suggested.iter())
            .cloned()
            .collect();
        all.sort_by(|a, b| b.confidence.partial_cmp(&a.confidence).unwrap());
        all
    }
}

/// Detects structural relationships between profiled tables using
/// sampled row data, degrading to name-only evidence when sampling
/// fails.
pub struct RelationshipDetector<P: RowProvider> {
    matcher: ColumnMatcher,
    row_provider: P,
    config: Config,
}

impl<P: RowProvider> RelationshipDetector<P> {
    pub fn new(row_provider: P, config: Config) -> Self {
        Self {
            matcher: ColumnMatcher::from_config(&config),
            row_provider,
            config,
        }
    }

    pub fn matcher_mut(&mut self) -> &mut ColumnMatcher {
        &mut self.matcher
    }

    /// Fixed-stride systematic sampling down to the configured cap.
    fn sample_rows(&self, rows: Vec<Vec<CellValue>>) -> Vec<Vec<CellValue>> {
        sample_rows(rows, self.config.sample_size())
    }

    fn load_sampled(
        &self,
        table: &TableMeta,
        cache: &mut HashMap<String, Option<Vec<Vec<CellValue>>>>,
    ) -> Option<Vec<Vec<CellValue>>> {
        if let Some(cached) = cache.get(&table.name) {
            return cached.clone();
        }
        let loaded = match self.row_provider.load_rows(table) {
            Ok(rows) => Some(self.sample_rows(rows)),
            Err(e) => {
                warn!(table = %table.name, error = %e, "row sampling failed, pair will degrade to semantic-only scoring");
                None
            }
        };
        cache.insert(table.name.clone(), loaded.clone());
        loaded
    }

    fn column_values(rows: &[Vec<CellValue>], idx: usize) -> Vec<&CellValue> {
        rows.iter().filter_map(|r| r.get(idx)).collect()
    }

    /// Data-validated foreign-key inference over every ordered table
    /// pair and column pair.
    pub fn infer_foreign_keys(&mut self, tables: &[TableMeta]) -> Result<FkDetection> {
        let mut detection = FkDetection::default();
        let mut cache: HashMap<String, Option<Vec<Vec<CellValue>>>> = HashMap::new();

        for table in tables {
            for referenced in tables {
                if table.name == referenced.name {
                    continue;
                }
                let rows = self.load_sampled(table, &mut cache);
                let ref_rows = self.load_sampled(referenced, &mut cache);

                for (col_idx, column) in table.columns.iter().enumerate() {
                    for (ref_idx, ref_column) in referenced.columns.iter().enumerate() {
                        let semantic =
                            self.matcher.semantic_similarity(&column.name, &ref_column.name);
                        // Cheap pre-filter before the data-driven check.
                        if semantic < 0.3
                            && !column.column_type.is_compatible_with(&ref_column.column_type)
                        {
                            continue;
                        }

                        let candidate = match (&rows, &ref_rows) {
                            (Some(rows), Some(ref_rows)) => self.validate_with_data(
                                table,
                                referenced,
                                col_idx,
                                ref_idx,
                                semantic,
                                rows,
                                ref_rows,
                            ),
                            // Degraded path: one or both sides failed to load.
                            _ => ForeignKeyCandidate {
                                table: table.name.clone(),
                                column: column.name.clone(),
                                referenced_table: referenced.name.clone(),
                                referenced_column: ref_column.name.clone(),
                                confidence: semantic * FALLBACK_FACTOR,
                                matching_rows: 0,
                                total_rows: 0,
                                violations: 0,
                            },
                        };

                        if candidate.confidence >= self.config.detector_threshold {
                            detection.confirmed.push(candidate);
                        } else if candidate.confidence >= SUGGESTION_FLOOR {
                            detection.suggested.push(candidate);
                        }
                    }
                }
            }
        }

        detection
            .confirmed
            .sort_by(|a, b| b.confidence.partial_cmp(&a.confidence).unwrap());
        detection
            .suggested
            .sort_by(|a, b| b.confidence.partial_cmp(&a.confidence).unwrap());
        Ok(detection)
    }

    #[allow(clippy::too_many_arguments)]
    fn validate_with_data(
        &self,
        table: &TableMeta,
        referenced: &TableMeta,
        col_idx: usize,
        ref_idx: usize,
        semantic: f64,
        rows: &[Vec<CellValue>],
        ref_rows: &[Vec<CellValue>],
    ) -> ForeignKeyCandidate {
        let column = &table.columns[col_idx];
        let ref_column = &referenced.columns[ref_idx];

        let values = Self::column_values(rows, col_idx);
        let ref_values = Self::column_values(ref_rows, ref_idx);

        let value_set: HashSet<String> =
            values.iter().filter_map(|v| v.normalized()).collect();
        let ref_set: HashSet<String> =
            ref_values.iter().filter_map(|v| v.normalized()).collect();

        let data_overlap = if value_set.is_empty() || ref_set.is_empty() {
            0.0
        } else {
            let intersection = value_set.intersection(&ref_set).count();
            intersection as f64 / value_set.len().max(ref_set.len()) as f64
        };

        let mut matching_rows = 0;
        let mut total_rows = 0;
        for value in &values {
            if let Some(normalized) = value.normalized() {
                total_rows += 1;
                if ref_set.contains(&normalized) {
                    matching_rows += 1;
                }
            }
        }
        let referential_integrity = if total_rows == 0 {
            0.0
        } else {
            matching_rows as f64 / total_rows as f64
        };

        let type_compatibility = if column.column_type == ref_column.column_type {
            1.0
        } else if column.column_type.is_compatible_with(&ref_column.column_type) {
            0.8
        } else {
            0.2
        };

        let uniqueness = column
            .distinct_ratio(table.row_count)
            .max(ref_column.distinct_ratio(referenced.row_count));
        let cardinality_ratio = column
            .distinct_ratio(table.row_count)
            .min(ref_column.distinct_ratio(referenced.row_count));

        let confidence = (WEIGHT_SEMANTIC * semantic
            + WEIGHT_OVERLAP * data_overlap
            + WEIGHT_INTEGRITY * referential_integrity
            + WEIGHT_TYPE * type_compatibility
            + WEIGHT_UNIQUENESS * uniqueness)
            .min(1.0);

        debug!(
            from = %format!("{}.{}", table.name, column.name),
            to = %format!("{}.{}", referenced.name, ref_column.name),
            semantic,
            data_overlap,
            referential_integrity,
            cardinality_ratio,
            confidence,
            "fk signals"
        );

        ForeignKeyCandidate {
            table: table.name.clone(),
            column: column.name.clone(),
            referenced_table: referenced.name.clone(),
            referenced_column: ref_column.name.clone(),
            confidence,
            matching_rows,
            total_rows,
            violations: total_rows - matching_rows,
        }
    }

    /// Build the dependency graph: one node per table, one edge per
    /// confirmed foreign key, levels by BFS from root tables.
    pub fn build_dependency_graph(
        &mut self,
        tables: &[TableMeta],
        foreign_keys: &[ForeignKeyCandidate],
    ) -> DependencyGraph {
        let mut graph = DependencyGraph::default();

        for table in tables {
            graph.nodes.insert(
                table.name.clone(),
                TableNode {
                    name: table.name.clone(),
                    level: 0,
                    parents: Vec::new(),
                    children: Vec::new(),
                    is_root: true,
                    is_leaf: true,
                },
            );
        }

        let by_name: HashMap<&str, &TableMeta> =
            tables.iter().map(|t| (t.name.as_str(), t)).collect();

        for fk in &dedupe_directions(foreign_keys) {
            let (table, referenced) =
                match (by_name.get(fk.table.as_str()), by_name.get(fk.referenced_table.as_str()))
                {
                    (Some(t), Some(r)) => (*t, *r),
                    _ => continue,
                };
            let similarity = self
                .matcher
                .semantic_similarity(&fk.column, &fk.referenced_column);
            let cardinality = self.matcher.detect_cardinality(
                referenced,
                table,
                &fk.referenced_column,
                &fk.column,
            );
            graph.edges.push(DependencyEdge {
                from: fk.table.clone(),
                to: fk.referenced_table.clone(),
                from_column: fk.column.clone(),
                to_column: fk.referenced_column.clone(),
                similarity,
                cardinality,
                strength: fk.confidence,
                edge_type: EdgeType::Fk,
            });

            // Referencing table depends on the referenced one: the
            // referenced table is its parent.
            if let Some(node) = graph.nodes.get_mut(&fk.table) {
                if !node.parents.contains(&fk.referenced_table) {
                    node.parents.push(fk.referenced_table.clone());
                }
                node.is_root = false;
            }
            if let Some(node) = graph.nodes.get_mut(&fk.referenced_table) {
                if !node.children.contains(&fk.table) {
                    node.children.push(fk.table.clone());
                }
                node.is_leaf = false;
            }
        }

        self.assign_levels(&mut graph);
        graph.cycles = detect_cycles(&graph);
        graph
    }

    /// BFS level propagation from roots: each child's level becomes
    /// max(current, parent level + 1). Re-enqueue only on raise so
    /// cyclic inputs terminate.
    fn assign_levels(&self, graph: &mut DependencyGraph) {
        let children_of: HashMap<String, Vec<String>> = graph
            .nodes
            .values()
            .map(|n| (n.name.clone(), n.children.clone()))
            .collect();

        let mut queue: VecDeque<String> = graph
            .nodes
            .values()
            .filter(|n| n.is_root)
            .map(|n| n.name.clone())
            .collect();

        while let Some(name) = queue.pop_front() {
            let level = graph.nodes[&name].level;
            for child in children_of.get(&name).into_iter().flatten() {
                let child_node = match graph.nodes.get_mut(child) {
                    Some(n) => n,
                    None => continue,
                };
                if child_node.level < level + 1 {
                    child_node.level = level + 1;
                    queue.push_back(child.clone());
                }
            }
        }
    }

    /// Match the business-pattern catalog against table names. The
    /// confidence is derived from the strength of dependency edges
    /// connecting the matched tables, with a base value when none do.
    pub fn infer_business_relationships(&self, graph: &DependencyGraph) -> Vec<BusinessRule> {
        let mut rules = Vec::new();
        for pattern in BUSINESS_PATTERNS {
            let mut matched: Vec<String> = Vec::new();
            let mut matched_keywords: HashSet<&str> = HashSet::new();
            for node in graph.nodes.values() {
                let lower = node.name.to_lowercase();
                for keyword in pattern.keywords {
                    if lower.contains(keyword) {
                        if !matched.contains(&node.name) {
                            matched.push(node.name.clone());
                        }
                        matched_keywords.insert(keyword);
                    }
                }
            }
            // Require distinct roles, not several tables hitting one keyword.
            if matched.len() < pattern.min_matches || matched_keywords.len() < 2 {
                continue;
            }
            matched.sort();

            let connecting: Vec<f64> = graph
                .edges
                .iter()
                .filter(|e| matched.contains(&e.from) && matched.contains(&e.to))
                .map(|e| e.strength)
                .collect();
            let confidence = if connecting.is_empty() {
                BUSINESS_BASE_CONFIDENCE
            } else {
                connecting.iter().sum::<f64>() / connecting.len() as f64
            };

            rules.push(BusinessRule {
                name: pattern.name.to_string(),
                description: pattern.description.to_string(),
                tables: matched,
                confidence,
            });
        }
        rules
    }

    /// Pair every temporal column across every unordered table pair.
    /// Alignment is always Exact; tolerance-based strategies are not
    /// selected yet.
    pub fn detect_temporal_relationships(&self, tables: &[TableMeta]) -> Vec<TemporalJoin> {
        let mut joins = Vec::new();
        for (left, right) in tables.iter().tuple_combinations() {
            for left_col in left.columns.iter().filter(|c| is_temporal_column(c)) {
                for right_col in right.columns.iter().filter(|c| is_temporal_column(c)) {
                    joins.push(TemporalJoin {
                        left_table: left.name.clone(),
                        right_table: right.name.clone(),
                        left_column: left_col.name.clone(),
                        right_column: right_col.name.clone(),
                        strategy: TemporalStrategy::Exact,
                    });
                }
            }
        }
        joins
    }

    /// Partition candidates into valid joins and broken relationships.
    /// Total and disjoint: every candidate lands in exactly one list.
    pub fn validate_integrity(&self, foreign_keys: &[ForeignKeyCandidate]) -> IntegrityReport {
        let mut report = IntegrityReport::default();
        for fk in foreign_keys {
            if fk.violations == 0 {
                report.valid_joins.push(fk.clone());
            } else {
                let recommendation = format!(
                    "{} of {} sampled values in {}.{} have no match in {}.{}; \
                     clean up orphaned rows or treat this join as partial",
                    fk.violations,
                    fk.total_rows,
                    fk.table,
                    fk.column,
                    fk.referenced_table,
                    fk.referenced_column
                );
                report.broken_relationships.push(BrokenRelationship {
                    candidate: fk.clone(),
                    recommendation,
                });
            }
        }
        report
    }
}

/// Fixed-stride systematic sampling down to `cap`. Keeps every
/// `stride`-th row starting from the first.
pub(crate) fn sample_rows(rows: Vec<Vec<CellValue>>, cap: usize) -> Vec<Vec<CellValue>> {
    if rows.len() <= cap {
        return rows;
    }
    let stride = rows.len().div_ceil(cap);
    rows.into_iter().step_by(stride).collect()
}

/// Collapse opposite-direction candidates over the same column pair,
/// keeping the more confident orientation. Both orientations can clear
/// the detector threshold; the graph and the exact-match candidates
/// want a single direction per relationship.
pub fn dedupe_directions(candidates: &[ForeignKeyCandidate]) -> Vec<ForeignKeyCandidate> {
    let mut kept: HashMap<(String, String, String, String), ForeignKeyCandidate> = HashMap::new();
    for candidate in candidates {
        let forward = (
            candidate.table.clone(),
            candidate.column.clone(),
            candidate.referenced_table.clone(),
            candidate.referenced_column.clone(),
        );
        let reverse = (
            candidate.referenced_table.clone(),
            candidate.referenced_column.clone(),
            candidate.table.clone(),
            candidate.column.clone(),
        );
        let key = forward.clone().min(reverse);
        match kept.get(&key) {
            Some(existing) if existing.confidence >= candidate.confidence => {}
            _ => {
                kept.insert(key, candidate.clone());
            }
        }
    }
    let mut result: Vec<_> = kept.into_values().collect();
    result.sort_by(|a, b| b.confidence.partial_cmp(&a.confidence).unwrap());
    result
}

fn is_temporal_column(column: &crate::schema::ColumnSchema) -> bool {
    if column.column_type.is_temporal() {
        return true;
    }
    let lower = column.name.to_lowercase();
    TEMPORAL_TOKENS.iter().any(|t| lower.contains(t))
}

/// Iterative DFS back-edge search over the dependency edges. Each
/// detected cycle is reported as the table-name path that closes it.
pub fn detect_cycles(graph: &DependencyGraph) -> Vec<Vec<String>> {
    let adjacency: HashMap<&str, Vec<&str>> = graph.edges.iter().fold(
        HashMap::new(),
        |mut acc, e| {
            acc.entry(e.from.as_str()).or_default().push(e.to.as_str());
            acc
        },
    );

    #[derive(Clone, Copy, PartialEq)]
    enum Color {
        White,
        Gray,
        Black,
    }

    let mut colors: HashMap<&str, Color> =
        graph.nodes.keys().map(|n| (n.as_str(), Color::White)).collect();
    let mut cycles = Vec::new();

    let mut names: Vec<&str> = graph.nodes.keys().map(|n| n.as_str()).collect();
    names.sort();

    for start in names {
        if colors[start] != Color::White {
            continue;
        }
        // Stack of (node, next-neighbor index); path mirrors the gray chain.
        let mut stack: Vec<(&str, usize)> = vec![(start, 0)];
        let mut path: Vec<&str> = vec![start];
        colors.insert(start, Color::Gray);

        loop {
            let (node, idx) = match stack.last_mut() {
                Some(frame) => {
                    let current = (frame.0, frame.1);
                    frame.1 += 1;
                    current
                }
                None => break,
            };
            let neighbors = adjacency.get(node).map(|v| v.as_slice()).unwrap_or(&[]);
            if idx >= neighbors.len() {
                colors.insert(node, Color::Black);
                stack.pop();
                path.pop();
                continue;
            }
            let next = neighbors[idx];
            match colors.get(next).copied().unwrap_or(Color::Black) {
                Color::Gray => {
                    // Back edge: slice the current path from the
                    // revisited node to close the cycle.
                    if let Some(pos) = path.iter().position(|n| *n == next) {
                        let mut cycle: Vec<String> =
                            path[pos..].iter().map(|s| s.to_string()).collect();
                        cycle.push(next.to_string());
                        cycles.push(cycle);
                    }
                }
                Color::White => {
                    colors.insert(next, Color::Gray);
                    stack.push((next, 0));
                    path.push(next);
                }
                Color::Black => {}
            }
        }
    }
    cycles
}
