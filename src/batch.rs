//! Scales the analyzer to many tables via fixed-size batching with
//! partial-failure isolation and cross-batch de-duplication.
//!
//! In batched mode the aggregated dependency graph and temporal joins
//! are intentionally left empty: stitching per-batch graphs together
//! is a documented simplification, not an oversight.

use crate::analyzer::JoinAnalyzer;
use crate::config::Config;
use crate::error::{JoinError, Result};
use crate::ingestion::{CsvProfiler, CsvRowProvider, RowProvider, TableProfiler};
use crate::model::{
    AnalysisSummary, BusinessRule, DependencyGraph, IntegrityReport, JoinAnalysisResult,
    JoinCandidate, PerformanceAnalysis,
};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::time::Instant;
use tracing::{debug, info, warn};

/// At or below this many files the coordinator delegates directly.
const DIRECT_LIMIT: usize = 10;

/// Fixed batch size beyond the direct limit.
const BATCH_SIZE: usize = 8;

/// Table cap handed to the inner analyzer in batched mode.
const BATCH_MAX_TABLES: usize = 50;

/// Runs the join analyzer over large file sets in fixed-size batches.
pub struct BatchCoordinator<Pf, Rp> {
    analyzer: JoinAnalyzer<Pf, Rp>,
    reclaim_hook: Option<Box<dyn FnMut() + Send>>,
}

impl BatchCoordinator<CsvProfiler, CsvRowProvider> {
    pub fn with_defaults(config: Config) -> Self {
        Self::new(CsvProfiler::new(), CsvRowProvider::new(), config)
    }
}

impl<Pf, Rp> BatchCoordinator<Pf, Rp>
where
    Pf: TableProfiler,
    Rp: RowProvider + Clone,
{
    pub fn new(profiler: Pf, row_provider: Rp, config: Config) -> Self {
        let config = Config {
            max_tables: config.max_tables.max(BATCH_MAX_TABLES),
            ..config
        };
        Self {
            analyzer: JoinAnalyzer::new(profiler, row_provider, config),
            reclaim_hook: None,
        }
    }

    /// Install a memory-reclamation hook that runs between batches.
    pub fn with_reclaim_hook(mut self, hook: impl FnMut() + Send + 'static) -> Self {
        self.reclaim_hook = Some(Box::new(hook));
        self
    }

    /// Analyze a file set, batching when it exceeds the direct limit.
    /// A failing batch is logged and skipped; the run returns partial
    /// results rather than failing entirely.
    pub fn analyze(&mut self, files: &[PathBuf]) -> Result<JoinAnalysisResult> {
        if files.len() < 2 {
            return Err(JoinError::InvalidTable(
                "Batch analysis requires at least 2 files".into(),
            ));
        }
        if files.len() <= DIRECT_LIMIT {
            return self.analyzer.analyze_joins(files);
        }

        let started = Instant::now();
        let batches = partition_batches(files);
        info!(files = files.len(), batches = batches.len(), "starting batched analysis");

        let mut results = Vec::new();
        for (index, batch) in batches.iter().enumerate() {
            match self.analyzer.analyze_joins(batch) {
                Ok(result) => results.push(result),
                Err(e) => {
                    warn!(batch = index, error = %e, "batch failed, skipping");
                }
            }
            if let Some(hook) = self.reclaim_hook.as_mut() {
                debug!(batch = index, "running memory reclamation hook");
                hook();
            }
        }

        if results.is_empty() {
            return Err(JoinError::InvalidTable(
                "Every batch failed during batched analysis".into(),
            ));
        }
        Ok(merge_results(results, started.elapsed().as_millis() as u64))
    }
}

/// Split files into fixed-size batches, prepending the prior batch's
/// last file to an undersized trailing batch so every batch has at
/// least two files.
fn partition_batches(files: &[PathBuf]) -> Vec<Vec<PathBuf>> {
    let mut batches: Vec<Vec<PathBuf>> = files
        .chunks(BATCH_SIZE)
        .map(|chunk| chunk.to_vec())
        .collect();
    let count = batches.len();
    if count > 1 && batches[count - 1].len() < 2 {
        if let Some(carry) = batches[count - 2].last().cloned() {
            batches[count - 1].insert(0, carry);
        }
    }
    batches
}

/// Merge per-batch results: candidates de-duplicated by their column
/// pair (keeping the higher confidence), business rules by name plus
/// sorted table set, everything re-sorted by confidence.
fn merge_results(results: Vec<JoinAnalysisResult>, duration_ms: u64) -> JoinAnalysisResult {
    let mut candidates: HashMap<(String, String, String, String), JoinCandidate> = HashMap::new();
    let mut rules: HashMap<(String, Vec<String>), BusinessRule> = HashMap::new();
    let mut integrity = IntegrityReport::default();
    let mut recommendations = Vec::new();
    let mut seen_recommendations = HashSet::new();
    let mut table_names: HashSet<String> = HashSet::new();
    let mut foreign_keys_found = 0;
    let mut total_rows = 0usize;
    let mut total_size = 0u64;
    let mut complexity = crate::model::ComplexityClass::Low;

    for result in results {
        for candidate in result.candidates {
            let key = candidate.dedup_key();
            match candidates.get(&key) {
                Some(existing) if existing.confidence >= candidate.confidence => {}
                _ => {
                    candidates.insert(key, candidate);
                }
            }
        }
        for rule in result.business_rules {
            rules.entry(rule.dedup_key()).or_insert(rule);
        }
        integrity.valid_joins.extend(result.integrity.valid_joins);
        integrity
            .broken_relationships
            .extend(result.integrity.broken_relationships);
        for recommendation in result.recommendations {
            if seen_recommendations.insert(recommendation.clone()) {
                recommendations.push(recommendation);
            }
        }
        table_names.extend(result.graph.nodes.keys().cloned());
        foreign_keys_found += result.summary.foreign_keys_found;
        total_rows += result.performance.total_rows;
        total_size += result.performance.total_size_bytes;
        complexity = complexity.max(result.performance.complexity);
    }

    let mut merged_candidates: Vec<JoinCandidate> = candidates.into_values().collect();
    merged_candidates.sort_by(|a, b| b.confidence.partial_cmp(&a.confidence).unwrap());
    let mut merged_rules: Vec<BusinessRule> = rules.into_values().collect();
    merged_rules.sort_by(|a, b| a.name.cmp(&b.name));

    JoinAnalysisResult {
        summary: AnalysisSummary {
            tables_analyzed: table_names.len(),
            foreign_keys_found,
            join_candidates: merged_candidates.len(),
            business_rules: merged_rules.len(),
            duration_ms,
        },
        candidates: merged_candidates,
        // Graph stitching across batches is out of scope for batched mode.
        graph: DependencyGraph::default(),
        integrity,
        business_rules: merged_rules,
        temporal_joins: Vec::new(),
        recommendations,
        performance: PerformanceAnalysis {
            total_rows,
            total_size_bytes: total_size,
            projected_rows: total_rows.saturating_mul(10),
            projected_size_bytes: total_size.saturating_mul(10),
            complexity,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use crate::model::{Cardinality, JoinQualityMetrics, JoinStrategy, PerformanceClass};
    use crate::schema::{CellValue, ColumnSchema, ColumnType, TableMeta};
    use std::path::Path;

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

    fn column(name: &str, unique: bool, distinct: usize) -> ColumnSchema {
        ColumnSchema {
            name: name.into(),
            column_type: ColumnType::Integer,
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
            size_bytes: 100,
            modified: chrono::Utc::now(),
        }
    }

    fn fixture() -> (FakeProfiler, FakeRows) {
        let mut profiles = HashMap::new();
        let mut rows = HashMap::new();

        profiles.insert(
            "customers".to_string(),
            table(
                "customers",
                vec![column("customer_id", true, 3)],
                3,
            ),
        );
        rows.insert(
            "customers".to_string(),
            vec![
                vec![CellValue::Int(1)],
                vec![CellValue::Int(2)],
                vec![CellValue::Int(3)],
            ],
        );

        profiles.insert(
            "orders".to_string(),
            table("orders", vec![column("customer_id", false, 2)], 3),
        );
        rows.insert(
            "orders".to_string(),
            vec![
                vec![CellValue::Int(1)],
                vec![CellValue::Int(2)],
                vec![CellValue::Int(1)],
            ],
        );

        // Filler tables with unrelated columns so larger runs batch.
        for i in 0..12 {
            let name = format!("metrics_{}", i);
            profiles.insert(
                name.clone(),
                table(&name, vec![column(&format!("reading_{}", i), true, 2)], 2),
            );
            rows.insert(
                name.clone(),
                vec![vec![CellValue::Int(10)], vec![CellValue::Int(20)]],
            );
        }

        (FakeProfiler(profiles), FakeRows(rows))
    }

    fn paths(names: &[&str]) -> Vec<PathBuf> {
        names
            .iter()
            .map(|n| PathBuf::from(format!("{}.csv", n)))
            .collect()
    }

    #[test]
    fn test_requires_two_files() {
        let (profiler, rows) = fixture();
        let mut coordinator = BatchCoordinator::new(profiler, rows, Config::default());
        let err = coordinator.analyze(&paths(&["customers"])).unwrap_err();
        assert_eq!(err.code(), "INVALID_TABLE");
    }

    #[test]
    fn test_small_runs_match_direct_analysis() {
        let (profiler, rows) = fixture();
        let files = paths(&["customers", "orders"]);

        let mut coordinator =
            BatchCoordinator::new(profiler.clone(), rows.clone(), Config::default());
        let batched = coordinator.analyze(&files).unwrap();

        let mut direct = JoinAnalyzer::new(profiler, rows, Config::default());
        let direct = direct.analyze_joins(&files).unwrap();

        let mut batched_keys: Vec<_> =
            batched.candidates.iter().map(|c| c.dedup_key()).collect();
        let mut direct_keys: Vec<_> = direct.candidates.iter().map(|c| c.dedup_key()).collect();
        batched_keys.sort();
        direct_keys.sort();
        assert_eq!(batched_keys, direct_keys);
        // Direct delegation keeps the dependency graph.
        assert_eq!(batched.graph.nodes.len(), 2);
    }

    #[test]
    fn test_batched_run_merges_and_drops_graph() {
        let (profiler, rows) = fixture();
        // 14 files: customers and orders land in the first batch of 8.
        let mut names = vec!["customers", "orders"];
        let fillers: Vec<String> = (0..12).map(|i| format!("metrics_{}", i)).collect();
        names.extend(fillers.iter().map(|s| s.as_str()));
        let files = paths(&names);

        let mut coordinator = BatchCoordinator::new(profiler, rows, Config::default());
        let result = coordinator.analyze(&files).unwrap();

        assert!(result
            .candidates
            .iter()
            .any(|c| c.left_column == "customer_id" && c.right_column == "customer_id"));
        assert!(result.graph.nodes.is_empty());
        assert!(result.temporal_joins.is_empty());
        assert_eq!(result.summary.tables_analyzed, 14);
    }

    #[test]
    fn test_failed_batch_is_skipped() {
        let (profiler, rows) = fixture();
        // Second batch is entirely unknown tables; its profile calls
        // all fail, the analyzer errors, and the batch is skipped.
        let mut names: Vec<String> = vec!["customers".into(), "orders".into()];
        names.extend((0..6).map(|i| format!("metrics_{}", i)));
        names.extend((0..8).map(|i| format!("ghost_{}", i)));
        let files: Vec<PathBuf> = names
            .iter()
            .map(|n| PathBuf::from(format!("{}.csv", n)))
            .collect();

        let mut coordinator = BatchCoordinator::new(profiler, rows, Config::default());
        let result = coordinator.analyze(&files).unwrap();
        assert_eq!(result.summary.tables_analyzed, 8);
    }

    #[test]
    fn test_reclaim_hook_runs_between_batches() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::Arc;

        let counter = Arc::new(AtomicUsize::new(0));
        let seen = counter.clone();
        let (profiler, rows) = fixture();
        let mut names = vec!["customers", "orders"];
        let fillers: Vec<String> = (0..12).map(|i| format!("metrics_{}", i)).collect();
        names.extend(fillers.iter().map(|s| s.as_str()));

        let mut coordinator = BatchCoordinator::new(profiler, rows, Config::default())
            .with_reclaim_hook(move || {
                seen.fetch_add(1, Ordering::SeqCst);
            });
        coordinator.analyze(&paths(&names)).unwrap();
        // 14 files: two batches, hook runs after each.
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_trailing_batch_padding() {
        let files: Vec<PathBuf> = (0..17).map(|i| PathBuf::from(format!("t{}.csv", i))).collect();
        let batches = partition_batches(&files);
        assert_eq!(batches.len(), 3);
        assert_eq!(batches[0].len(), 8);
        assert_eq!(batches[1].len(), 8);
        // Trailing singleton gets the prior batch's last file prepended.
        assert_eq!(batches[2].len(), 2);
        assert_eq!(batches[2][0], PathBuf::from("t15.csv"));
        assert_eq!(batches[2][1], PathBuf::from("t16.csv"));
    }

    #[test]
    fn test_cross_batch_candidate_dedup() {
        fn candidate(confidence: f64) -> JoinCandidate {
            JoinCandidate {
                left_table: "orders".into(),
                right_table: "customers".into(),
                left_column: "customer_id".into(),
                right_column: "customer_id".into(),
                strategy: JoinStrategy::ExactMatch,
                confidence,
                cardinality: Cardinality::ManyToOne,
                estimated_rows: 10,
                quality: JoinQualityMetrics {
                    estimated_data_loss: 0.0,
                    duplication_factor: 1.0,
                    consistency_score: 1.0,
                    performance: PerformanceClass::Fast,
                    index_recommendation: None,
                },
            }
        }

        fn result_with(candidate: JoinCandidate) -> JoinAnalysisResult {
            JoinAnalysisResult {
                summary: AnalysisSummary {
                    tables_analyzed: 2,
                    foreign_keys_found: 1,
                    join_candidates: 1,
                    business_rules: 0,
                    duration_ms: 0,
                },
                candidates: vec![candidate],
                graph: DependencyGraph::default(),
                integrity: IntegrityReport::default(),
                business_rules: vec![],
                temporal_joins: vec![],
                recommendations: vec![],
                performance: PerformanceAnalysis {
                    total_rows: 10,
                    total_size_bytes: 10,
                    projected_rows: 100,
                    projected_size_bytes: 100,
                    complexity: crate::model::ComplexityClass::Low,
                },
            }
        }

        let merged = merge_results(
            vec![result_with(candidate(0.8)), result_with(candidate(0.9))],
            0,
        );
        assert_eq!(merged.candidates.len(), 1);
        // The higher-confidence duplicate wins.
        assert!((merged.candidates[0].confidence - 0.9).abs() < 1e-9);
    }
}
