//! Full-run orchestration: input validation, table profiling,
//! relationship detection, join-candidate materialization with quality
//! and performance estimates, and recommendation generation.

use crate::column_matcher::ColumnMatcher;
use crate::config::Config;
use crate::detector::{dedupe_directions, sample_rows, RelationshipDetector};
use crate::error::{JoinError, Result};
use crate::ingestion::{CsvProfiler, CsvRowProvider, RowProvider, TableProfiler};
use crate::model::{
    AnalysisSummary, Cardinality, ComplexityClass, DependencyGraph, ForeignKeyCandidate,
    IntegrityReport, JoinAnalysisResult, JoinCandidate, JoinQualityMetrics, JoinStrategy,
    PerformanceAnalysis, PerformanceClass,
};
use crate::schema::{ColumnSchema, TableMeta};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, warn};

const ALLOWED_EXTENSIONS: &[&str] = &["csv", "tsv", "txt"];

/// Row thresholds for the performance complexity classes.
const COMPLEXITY_MEDIUM_ROWS: usize = 100_000;
const COMPLEXITY_HIGH_ROWS: usize = 1_000_000;

/// Row threshold above which join candidates get an index suggestion.
const INDEX_SUGGESTION_ROWS: usize = 50_000;

/// Orchestrates a complete multi-table join analysis.
pub struct JoinAnalyzer<Pf, Rp> {
    profiler: Pf,
    row_provider: Rp,
    config: Config,
}

impl JoinAnalyzer<CsvProfiler, CsvRowProvider> {
    /// Analyzer wired to the default CSV collaborators.
    pub fn with_defaults(config: Config) -> Self {
        Self::new(CsvProfiler::new(), CsvRowProvider::new(), config)
    }
}

impl<Pf, Rp> JoinAnalyzer<Pf, Rp>
where
    Pf: TableProfiler,
    Rp: RowProvider + Clone,
{
    pub fn new(profiler: Pf, row_provider: Rp, config: Config) -> Self {
        Self {
            profiler,
            row_provider,
            config,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run the full pipeline against a set of input files.
    pub fn analyze_joins(&mut self, paths: &[PathBuf]) -> Result<JoinAnalysisResult> {
        let started = Instant::now();
        self.validate_input(paths)?;

        let tables = self.load_tables(paths)?;
        info!(tables = tables.len(), "starting join analysis");

        let mut detector =
            RelationshipDetector::new(self.row_provider.clone(), self.config.clone());
        let detection = detector.infer_foreign_keys(&tables)?;
        let graph = detector.build_dependency_graph(&tables, &detection.confirmed);
        let integrity = detector.validate_integrity(&detection.all());
        let business_rules = detector.infer_business_relationships(&graph);
        let temporal_joins = if self.config.enable_temporal_joins {
            detector.detect_temporal_relationships(&tables)
        } else {
            Vec::new()
        };

        let candidates =
            self.materialize_candidates(&tables, &detection.confirmed, detector.matcher_mut());
        let performance = performance_analysis(&tables);
        let recommendations =
            self.build_recommendations(&graph, &integrity, &candidates, &performance);

        let result = JoinAnalysisResult {
            summary: AnalysisSummary {
                tables_analyzed: tables.len(),
                foreign_keys_found: detection.confirmed.len(),
                join_candidates: candidates.len(),
                business_rules: business_rules.len(),
                duration_ms: started.elapsed().as_millis() as u64,
            },
            candidates,
            graph,
            integrity,
            business_rules,
            temporal_joins,
            recommendations,
            performance,
        };
        info!(
            candidates = result.summary.join_candidates,
            foreign_keys = result.summary.foreign_keys_found,
            duration_ms = result.summary.duration_ms,
            "join analysis complete"
        );
        Ok(result)
    }

    /// Validate one explicit column pair between two tables, or fall
    /// back to full two-table candidate generation.
    pub fn analyze_pairwise_join(
        &mut self,
        left_path: &Path,
        right_path: &Path,
        columns: Option<(&str, &str)>,
    ) -> Result<Vec<JoinCandidate>> {
        let left = self.profiler.profile_table(left_path)?;
        let right = self.profiler.profile_table(right_path)?;
        let mut matcher = ColumnMatcher::from_config(&self.config);

        if let Some((left_col, right_col)) = columns {
            let left_schema = left.column(left_col).ok_or_else(|| {
                JoinError::InvalidTable(format!("Column {} not found in {}", left_col, left.name))
            })?;
            let right_schema = right.column(right_col).ok_or_else(|| {
                JoinError::InvalidTable(format!(
                    "Column {} not found in {}",
                    right_col, right.name
                ))
            })?;
            if !left_schema
                .column_type
                .is_compatible_with(&right_schema.column_type)
            {
                return Err(JoinError::IncompatibleSchemas(format!(
                    "{}.{} ({:?}) cannot join {}.{} ({:?})",
                    left.name,
                    left_col,
                    left_schema.column_type,
                    right.name,
                    right_col,
                    right_schema.column_type
                )));
            }

            let candidate = self.column_pair_candidate(
                &left,
                &right,
                left_schema,
                right_schema,
                &mut matcher,
            )?;
            return Ok(vec![candidate]);
        }

        let candidates = self.semantic_sweep(&[left, right], &mut matcher);
        if candidates.is_empty() {
            return Err(JoinError::NoJoinCandidates(format!(
                "No column pair between {} and {} cleared the confidence threshold",
                left_path.display(),
                right_path.display()
            )));
        }
        Ok(candidates)
    }

    /// Full analysis filtered down to recommendations mentioning the
    /// caller-supplied context.
    pub fn get_join_recommendations(
        &mut self,
        paths: &[PathBuf],
        context: &str,
    ) -> Result<Vec<String>> {
        let result = self.analyze_joins(paths)?;
        let needle = context.to_lowercase();
        Ok(result
            .recommendations
            .into_iter()
            .filter(|r| needle.is_empty() || r.to_lowercase().contains(&needle))
            .collect())
    }

    fn validate_input(&self, paths: &[PathBuf]) -> Result<()> {
        if paths.is_empty() {
            return Err(JoinError::InvalidTable("No input files provided".into()));
        }
        if paths.len() > self.config.max_tables {
            return Err(JoinError::InvalidTable(format!(
                "{} tables exceed the configured maximum of {}",
                paths.len(),
                self.config.max_tables
            )));
        }
        for path in paths {
            let extension = path
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| e.to_lowercase())
                .unwrap_or_default();
            if !ALLOWED_EXTENSIONS.contains(&extension.as_str()) {
                return Err(JoinError::InvalidTable(format!(
                    "Unsupported file extension: {}",
                    path.display()
                )));
            }
        }
        Ok(())
    }

    /// Profile each input, continuing past per-file failures.
    fn load_tables(&self, paths: &[PathBuf]) -> Result<Vec<TableMeta>> {
        let mut tables = Vec::new();
        for path in paths {
            match self.profiler.profile_table(path) {
                Ok(table) => tables.push(table),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "skipping table that failed to profile");
                }
            }
        }
        if tables.is_empty() {
            return Err(JoinError::InvalidTable(
                "None of the input files could be profiled".into(),
            ));
        }
        Ok(tables)
    }

    /// Candidates are materialized two ways: one exact-match candidate
    /// per accepted foreign key, plus an exhaustive semantic sweep over
    /// all table/column pairs. The union is filtered by the confidence
    /// threshold and sorted descending.
    fn materialize_candidates(
        &self,
        tables: &[TableMeta],
        foreign_keys: &[ForeignKeyCandidate],
        matcher: &mut ColumnMatcher,
    ) -> Vec<JoinCandidate> {
        let mut candidates: Vec<JoinCandidate> = Vec::new();
        let mut seen: HashSet<(String, String, String, String)> = HashSet::new();

        // One exact-match candidate per accepted (deduped) FK edge.
        for fk in &dedupe_directions(foreign_keys) {
            let (left, right) = match (
                tables.iter().find(|t| t.name == fk.table),
                tables.iter().find(|t| t.name == fk.referenced_table),
            ) {
                (Some(l), Some(r)) => (l, r),
                _ => continue,
            };
            let cardinality =
                matcher.detect_cardinality(left, right, &fk.column, &fk.referenced_column);
            let violation_ratio = if fk.total_rows == 0 {
                0.0
            } else {
                fk.violations as f64 / fk.total_rows as f64
            };
            let candidate = JoinCandidate {
                left_table: fk.table.clone(),
                right_table: fk.referenced_table.clone(),
                left_column: fk.column.clone(),
                right_column: fk.referenced_column.clone(),
                strategy: JoinStrategy::ExactMatch,
                confidence: fk.confidence,
                cardinality,
                estimated_rows: estimate_rows(left, right, cardinality),
                quality: quality_metrics(
                    left,
                    right,
                    left.column(&fk.column),
                    right.column(&fk.referenced_column),
                    fk.confidence,
                    violation_ratio,
                    cardinality,
                ),
            };
            if seen.insert(candidate.dedup_key()) {
                candidates.push(candidate);
            }
        }

        for candidate in self.semantic_sweep(tables, matcher) {
            if seen.insert(candidate.dedup_key()) {
                candidates.push(candidate);
            }
        }

        candidates.retain(|c| c.confidence >= self.config.confidence_threshold);
        candidates.sort_by(|a, b| b.confidence.partial_cmp(&a.confidence).unwrap());
        candidates
    }

    /// Exhaustive name-similarity sweep over all table/column pairs.
    fn semantic_sweep(&self, tables: &[TableMeta], matcher: &mut ColumnMatcher) -> Vec<JoinCandidate> {
        let mut candidates = Vec::new();
        for (i, left) in tables.iter().enumerate() {
            for right in tables.iter().skip(i + 1) {
                for left_col in &left.columns {
                    for right_col in &right.columns {
                        let semantic =
                            matcher.semantic_similarity(&left_col.name, &right_col.name);
                        if semantic < self.config.confidence_threshold {
                            continue;
                        }
                        let cardinality = matcher.detect_cardinality(
                            left,
                            right,
                            &left_col.name,
                            &right_col.name,
                        );
                        candidates.push(JoinCandidate {
                            left_table: left.name.clone(),
                            right_table: right.name.clone(),
                            left_column: left_col.name.clone(),
                            right_column: right_col.name.clone(),
                            strategy: JoinStrategy::SemanticMatch,
                            confidence: semantic,
                            cardinality,
                            estimated_rows: estimate_rows(left, right, cardinality),
                            quality: quality_metrics(
                                left,
                                right,
                                Some(left_col),
                                Some(right_col),
                                semantic,
                                0.0,
                                cardinality,
                            ),
                        });
                    }
                }
            }
        }
        candidates.sort_by(|a, b| b.confidence.partial_cmp(&a.confidence).unwrap());
        candidates
    }

    /// Build one candidate for an explicitly requested column pair,
    /// using sampled data for the distribution signal.
    fn column_pair_candidate(
        &self,
        left: &TableMeta,
        right: &TableMeta,
        left_schema: &ColumnSchema,
        right_schema: &ColumnSchema,
        matcher: &mut ColumnMatcher,
    ) -> Result<JoinCandidate> {
        let left_idx = left.column_index(&left_schema.name).unwrap_or(0);
        let right_idx = right.column_index(&right_schema.name).unwrap_or(0);

        // Same sampling cap as the detector, so pairwise validation
        // stays bounded on large tables.
        let cap = self.config.sample_size();
        let left_values: Vec<_> = sample_rows(self.row_provider.load_rows(left)?, cap)
            .into_iter()
            .filter_map(|mut r| {
                if left_idx < r.len() {
                    Some(r.swap_remove(left_idx))
                } else {
                    None
                }
            })
            .collect();
        let right_values: Vec<_> = sample_rows(self.row_provider.load_rows(right)?, cap)
            .into_iter()
            .filter_map(|mut r| {
                if right_idx < r.len() {
                    Some(r.swap_remove(right_idx))
                } else {
                    None
                }
            })
            .collect();

        let distribution = matcher.distribution_similarity(&left_values, &right_values);
        let strategy = matcher.suggest_join_strategy(left_schema, right_schema, &distribution);
        let semantic = matcher.semantic_similarity(&left_schema.name, &right_schema.name);
        let confidence = ((semantic + distribution.overall) / 2.0).min(1.0);
        let cardinality =
            matcher.detect_cardinality(left, right, &left_schema.name, &right_schema.name);

        Ok(JoinCandidate {
            left_table: left.name.clone(),
            right_table: right.name.clone(),
            left_column: left_schema.name.clone(),
            right_column: right_schema.name.clone(),
            strategy,
            confidence,
            cardinality,
            estimated_rows: estimate_rows(left, right, cardinality),
            quality: quality_metrics(
                left,
                right,
                Some(left_schema),
                Some(right_schema),
                confidence,
                0.0,
                cardinality,
            ),
        })
    }

    fn build_recommendations(
        &self,
        graph: &DependencyGraph,
        integrity: &IntegrityReport,
        candidates: &[JoinCandidate],
        performance: &PerformanceAnalysis,
    ) -> Vec<String> {
        let mut recommendations = Vec::new();

        for candidate in candidates.iter().take(5) {
            recommendations.push(format!(
                "Join {}.{} with {}.{} ({:?}, cardinality {}, confidence {:.2})",
                candidate.left_table,
                candidate.left_column,
                candidate.right_table,
                candidate.right_column,
                candidate.strategy,
                candidate.cardinality,
                candidate.confidence
            ));
        }

        let mut roots: Vec<&str> = graph
            .nodes
            .values()
            .filter(|n| n.is_root && !n.is_leaf)
            .map(|n| n.name.as_str())
            .collect();
        roots.sort();
        for root in roots {
            recommendations.push(format!(
                "Table {} is a root of the dependency graph; start join chains from it",
                root
            ));
        }

        for broken in &integrity.broken_relationships {
            recommendations.push(broken.recommendation.clone());
        }

        for cycle in &graph.cycles {
            recommendations.push(format!(
                "Circular dependency detected: {}; break the cycle before chaining joins",
                cycle.join(" -> ")
            ));
        }

        if performance.complexity == ComplexityClass::High {
            recommendations.push(
                "High data volume: sample or pre-aggregate before executing wide joins".into(),
            );
        }

        if candidates.is_empty() {
            recommendations
                .push("No join candidates cleared the confidence threshold; consider lowering it".into());
        }

        recommendations
    }
}

fn estimate_rows(left: &TableMeta, right: &TableMeta, cardinality: Cardinality) -> usize {
    match cardinality {
        Cardinality::OneToOne => left.row_count.min(right.row_count),
        Cardinality::OneToMany | Cardinality::ManyToOne => left.row_count.max(right.row_count),
        Cardinality::ManyToMany => {
            // Worst-case blowup damped by the larger key space.
            let product = left.row_count.saturating_mul(right.row_count);
            let denominator = left
                .columns
                .iter()
                .chain(right.columns.iter())
                .map(|c| c.distinct_count)
                .max()
                .unwrap_or(1)
                .max(1);
            (product / denominator).max(left.row_count.max(right.row_count))
        }
    }
}

fn quality_metrics(
    left: &TableMeta,
    right: &TableMeta,
    left_col: Option<&ColumnSchema>,
    right_col: Option<&ColumnSchema>,
    confidence: f64,
    violation_ratio: f64,
    cardinality: Cardinality,
) -> JoinQualityMetrics {
    let estimated_data_loss = if violation_ratio > 0.0 {
        violation_ratio
    } else {
        ((1.0 - confidence) * 0.5).min(1.0)
    };

    let duplication_factor = match cardinality {
        Cardinality::OneToOne => 1.0,
        Cardinality::OneToMany | Cardinality::ManyToOne => {
            let parent_keys = right_col.map(|c| c.distinct_count).unwrap_or(1).max(1);
            (left.row_count.max(right.row_count) as f64 / parent_keys as f64).max(1.0)
        }
        Cardinality::ManyToMany => 2.0,
    };

    let type_consistency = match (left_col, right_col) {
        (Some(l), Some(r)) if l.column_type == r.column_type => 1.0,
        (Some(l), Some(r)) if l.column_type.is_compatible_with(&r.column_type) => 0.8,
        _ => 0.5,
    };
    let consistency_score = (confidence + type_consistency) / 2.0;

    let max_rows = left.row_count.max(right.row_count);
    let performance = if max_rows < 10_000 {
        PerformanceClass::Fast
    } else if max_rows < COMPLEXITY_MEDIUM_ROWS {
        PerformanceClass::Moderate
    } else {
        PerformanceClass::Slow
    };

    let index_recommendation = match right_col {
        Some(col) if !col.is_effectively_unique(right.row_count) => Some(format!(
            "Add an index on {}.{} to speed up lookups",
            right.name, col.name
        )),
        _ if max_rows > INDEX_SUGGESTION_ROWS => Some(format!(
            "Index the join keys of {} and {} before executing",
            left.name, right.name
        )),
        _ => None,
    };

    JoinQualityMetrics {
        estimated_data_loss,
        duplication_factor,
        consistency_score,
        performance,
        index_recommendation,
    }
}

fn performance_analysis(tables: &[TableMeta]) -> PerformanceAnalysis {
    let total_rows: usize = tables.iter().map(|t| t.row_count).sum();
    let total_size_bytes: u64 = tables.iter().map(|t| t.size_bytes).sum();
    let complexity = if total_rows < COMPLEXITY_MEDIUM_ROWS {
        ComplexityClass::Low
    } else if total_rows < COMPLEXITY_HIGH_ROWS {
        ComplexityClass::Medium
    } else {
        ComplexityClass::High
    };
    PerformanceAnalysis {
        total_rows,
        total_size_bytes,
        projected_rows: total_rows.saturating_mul(10),
        projected_size_bytes: total_size_bytes.saturating_mul(10),
        complexity,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{CellValue, ColumnType};
    use std::collections::HashMap;

    #[derive(Clone)]
    struct FakeProfiler(HashMap<String, TableMeta>);

    impl TableProfiler for FakeProfiler {
        fn profile_table(&self, path: &Path) -> Result<TableMeta> {
            let stem = path.file_stem().unwrap().to_str().unwrap();
            self.0
                .get(stem)
                .cloned()
                .ok_or_else(|| JoinError::InvalidTable(format!("unknown table {}", stem)))
        }
    }

    #[derive(Clone)]
    struct FakeRows(HashMap<String, Vec<Vec<CellValue>>>);

    impl RowProvider for FakeRows {
        fn load_rows(&self, table: &TableMeta) -> Result<Vec<Vec<CellValue>>> {
            self.0
                .get(&table.name)
                .cloned()
                .ok_or_else(|| JoinError::InvalidTable(format!("no rows for {}", table.name)))
        }
    }

    fn column(name: &str, column_type: ColumnType, unique: bool, distinct: usize) -> ColumnSchema {
        ColumnSchema {
            name: name.into(),
            column_type,
            nullable: false,
            unique,
            distinct_count: distinct,
            null_count: 0,
            patterns: vec![],
            examples: vec![],
        }
    }

    fn table(name: &str, columns: Vec<ColumnSchema>, rows: usize) -> TableMeta {
        TableMeta {
            path: PathBuf::from(format!("{}.csv", name)),
            name: name.into(),
            columns,
            row_count: rows,
            size_bytes: 1024,
            modified: chrono::Utc::now(),
        }
    }

    fn customers_orders_analyzer() -> JoinAnalyzer<FakeProfiler, FakeRows> {
        let customers = table(
            "customers",
            vec![
                column("customer_id", ColumnType::Integer, true, 4),
                column("email", ColumnType::Email, true, 4),
            ],
            4,
        );
        let orders = table(
            "orders",
            vec![
                column("order_id", ColumnType::Integer, true, 4),
                column("customer_id", ColumnType::Integer, false, 3),
                column("amount", ColumnType::Float, false, 4),
            ],
            4,
        );
        let mut profiles = HashMap::new();
        profiles.insert("customers".to_string(), customers);
        profiles.insert("orders".to_string(), orders);

        let mut rows = HashMap::new();
        rows.insert(
            "customers".to_string(),
            (1..=4)
                .map(|i| {
                    vec![
                        CellValue::Int(i),
                        CellValue::Text(format!("u{}@example.com", i)),
                    ]
                })
                .collect(),
        );
        rows.insert(
            "orders".to_string(),
            vec![
                vec![CellValue::Int(10), CellValue::Int(1), CellValue::Float(5.0)],
                vec![CellValue::Int(11), CellValue::Int(2), CellValue::Float(6.0)],
                vec![CellValue::Int(12), CellValue::Int(3), CellValue::Float(7.0)],
                vec![CellValue::Int(13), CellValue::Int(1), CellValue::Float(8.0)],
            ],
        );

        JoinAnalyzer::new(FakeProfiler(profiles), FakeRows(rows), Config::default())
    }

    fn paths(names: &[&str]) -> Vec<PathBuf> {
        names.iter().map(|n| PathBuf::from(format!("{}.csv", n))).collect()
    }

    #[test]
    fn test_empty_input_rejected() {
        let mut analyzer = customers_orders_analyzer();
        let err = analyzer.analyze_joins(&[]).unwrap_err();
        assert_eq!(err.code(), "INVALID_TABLE");
    }

    #[test]
    fn test_extension_allow_list() {
        let mut analyzer = customers_orders_analyzer();
        let err = analyzer
            .analyze_joins(&[PathBuf::from("data.parquet"), PathBuf::from("x.csv")])
            .unwrap_err();
        assert_eq!(err.code(), "INVALID_TABLE");
    }

    #[test]
    fn test_max_tables_enforced() {
        let mut analyzer = customers_orders_analyzer();
        let many: Vec<PathBuf> = (0..11).map(|i| PathBuf::from(format!("t{}.csv", i))).collect();
        let err = analyzer.analyze_joins(&many).unwrap_err();
        assert_eq!(err.code(), "INVALID_TABLE");
    }

    #[test]
    fn test_full_run_surfaces_customer_order_fk() {
        let mut analyzer = customers_orders_analyzer();
        let result = analyzer.analyze_joins(&paths(&["customers", "orders"])).unwrap();

        assert_eq!(result.summary.tables_analyzed, 2);
        assert!(result.summary.foreign_keys_found >= 1);

        let fk_candidate = result
            .candidates
            .iter()
            .find(|c| {
                c.left_column == "customer_id"
                    && c.right_column == "customer_id"
                    && c.strategy == JoinStrategy::ExactMatch
            })
            .expect("exact-match customer_id candidate missing");
        assert!(fk_candidate.confidence >= 0.6);

        // Graph invariants: one node per table, customers is the root.
        assert_eq!(result.graph.nodes.len(), 2);
        assert!(result.graph.nodes["customers"].is_root);
        assert_eq!(result.graph.nodes["customers"].level, 0);
        assert_eq!(result.graph.nodes["orders"].level, 1);

        // Candidates are sorted by descending confidence.
        for pair in result.candidates.windows(2) {
            assert!(pair[0].confidence >= pair[1].confidence);
        }

        // Temporal joins disabled by default.
        assert!(result.temporal_joins.is_empty());
    }

    #[test]
    fn test_failed_profile_is_skipped_with_partial_result() {
        let mut analyzer = customers_orders_analyzer();
        let result = analyzer
            .analyze_joins(&paths(&["customers", "orders", "ghost"]))
            .unwrap();
        assert_eq!(result.summary.tables_analyzed, 2);
    }

    #[test]
    fn test_pairwise_explicit_pair() {
        let mut analyzer = customers_orders_analyzer();
        let candidates = analyzer
            .analyze_pairwise_join(
                Path::new("customers.csv"),
                Path::new("orders.csv"),
                Some(("customer_id", "customer_id")),
            )
            .unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].cardinality, Cardinality::OneToMany);
    }

    #[test]
    fn test_pairwise_samples_large_tables() {
        let users = table(
            "users",
            vec![column("user_id", ColumnType::Integer, true, 25_000)],
            25_000,
        );
        let events = table(
            "events",
            vec![column("user_id", ColumnType::Integer, false, 5_000)],
            25_000,
        );
        let mut profiles = HashMap::new();
        profiles.insert("users".to_string(), users);
        profiles.insert("events".to_string(), events);
        let mut rows = HashMap::new();
        rows.insert(
            "users".to_string(),
            (0..25_000).map(|i| vec![CellValue::Int(i)]).collect(),
        );
        rows.insert(
            "events".to_string(),
            (0..25_000).map(|i| vec![CellValue::Int(i % 5_000)]).collect(),
        );

        // The pairwise path applies the same cap as the detector.
        let cap = Config::default().sample_size();
        let sampled = sample_rows((0..25_000).map(|i| vec![CellValue::Int(i)]).collect(), cap);
        assert!(sampled.len() <= cap);

        let mut analyzer =
            JoinAnalyzer::new(FakeProfiler(profiles), FakeRows(rows), Config::default());
        let candidates = analyzer
            .analyze_pairwise_join(
                Path::new("users.csv"),
                Path::new("events.csv"),
                Some(("user_id", "user_id")),
            )
            .unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].cardinality, Cardinality::OneToMany);
        assert!(candidates[0].confidence > 0.0 && candidates[0].confidence <= 1.0);
    }

    #[test]
    fn test_pairwise_incompatible_types() {
        let mut analyzer = customers_orders_analyzer();
        let err = analyzer
            .analyze_pairwise_join(
                Path::new("customers.csv"),
                Path::new("orders.csv"),
                Some(("email", "customer_id")),
            )
            .unwrap_err();
        assert_eq!(err.code(), "INCOMPATIBLE_SCHEMAS");
    }

    #[test]
    fn test_pairwise_missing_column() {
        let mut analyzer = customers_orders_analyzer();
        let err = analyzer
            .analyze_pairwise_join(
                Path::new("customers.csv"),
                Path::new("orders.csv"),
                Some(("missing_col", "customer_id")),
            )
            .unwrap_err();
        assert_eq!(err.code(), "INVALID_TABLE");
    }

    #[test]
    fn test_recommendations_filter_by_context() {
        let mut analyzer = customers_orders_analyzer();
        let filtered = analyzer
            .get_join_recommendations(&paths(&["customers", "orders"]), "customers")
            .unwrap();
        assert!(!filtered.is_empty());
        assert!(filtered.iter().all(|r| r.to_lowercase().contains("customers")));
    }
}
