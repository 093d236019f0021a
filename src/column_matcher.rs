//! Pairwise column similarity scoring.
//!
//! Combines several heuristics into a single semantic score: exact and
//! cleaned-name equality, domain synonym groups, pattern families,
//! structural templates, and edit-distance fuzzy matching. Scores are
//! memoized per matcher instance; the cache is pure memoization, not
//! authoritative state, so dropping the matcher loses nothing.

use crate::config::Config;
use crate::model::{Cardinality, ForeignKeyCandidate, JoinStrategy};
use crate::schema::{CellValue, ColumnSchema, ColumnType, TableMeta};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use strsim::normalized_levenshtein;

/// Domain synonym groups: column names from the same group are
/// considered near-equivalent even with zero lexical overlap.
const SYNONYM_GROUPS: &[&[&str]] = &[
    &["customer", "client", "user", "account", "member", "buyer"],
    &["order", "purchase", "transaction", "sale"],
    &["product", "item", "sku", "article", "goods"],
    &["amount", "total", "price", "cost", "value", "sum"],
    &["quantity", "qty", "count", "num", "number"],
    &["date", "time", "timestamp", "created", "updated", "modified"],
    &["address", "location", "addr", "place"],
    &["phone", "telephone", "mobile", "cell", "tel"],
    &["email", "mail", "e_mail"],
    &["status", "state", "stage", "phase"],
    &["category", "type", "kind", "class", "group"],
    &["description", "desc", "comment", "note", "remarks"],
];

/// Pattern families: looser than synonym groups, a family hit means
/// both names belong to the same broad naming convention.
const PATTERN_FAMILIES: &[(&str, &[&str])] = &[
    ("id", &["id", "key", "pk", "fk", "identifier", "uid"]),
    ("name", &["name", "title", "label", "caption"]),
    ("email", &["email", "mail"]),
    ("phone", &["phone", "tel", "mobile", "fax"]),
    ("date", &["date", "time", "day", "month", "year", "at"]),
    ("address", &["address", "street", "city", "zip", "postal", "country"]),
    ("code", &["code", "abbr", "symbol", "ref"]),
    ("amount", &["amount", "price", "cost", "fee", "total", "balance"]),
    ("count", &["count", "qty", "quantity", "num"]),
    ("status", &["status", "state", "flag", "active", "enabled"]),
];

lazy_static! {
    /// Fixed value-shape regex set used for distributional profiling.
    static ref SHAPE_PATTERNS: Vec<(&'static str, Regex)> = vec![
        ("email", Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}$").unwrap()),
        ("phone", Regex::new(r"^\+?[0-9][0-9 ().-]{6,}$").unwrap()),
        (
            "uuid",
            Regex::new(
                r"^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$"
            )
            .unwrap()
        ),
        ("url", Regex::new(r"^https?://[^\s]+$").unwrap()),
        ("date_iso", Regex::new(r"^\d{4}-\d{2}-\d{2}").unwrap()),
        ("date_us", Regex::new(r"^\d{1,2}/\d{1,2}/\d{4}$").unwrap()),
    ];
    static ref TABLE_PREFIX: Regex = Regex::new(r"^(tbl_|table_|tb_|t_)").unwrap();
    static ref KEY_SUFFIX: Regex =
        Regex::new(r"(_id|_key|_fk|_pk|_number|_num|_code|_cd)$").unwrap();
    static ref BOOL_PREFIX: Regex = Regex::new(r"^(is_|has_|can_|should_)").unwrap();
    static ref SEPARATORS: Regex = Regex::new(r"[\s\-.]+").unwrap();
}

/// Strip naming decoration so `tbl_customer_id` and `customer` compare
/// on their shared stem.
pub fn clean_column_name(name: &str) -> String {
    let mut cleaned = name.trim().to_lowercase();
    cleaned = SEPARATORS.replace_all(&cleaned, "_").to_string();
    cleaned = TABLE_PREFIX.replace(&cleaned, "").to_string();
    cleaned = KEY_SUFFIX.replace(&cleaned, "").to_string();
    cleaned = BOOL_PREFIX.replace(&cleaned, "").to_string();
    cleaned.trim_matches('_').to_string()
}

/// Detect which of the fixed shape patterns a raw string value matches.
pub fn detect_shape_patterns(value: &str) -> Vec<&'static str> {
    SHAPE_PATTERNS
        .iter()
        .filter(|(_, re)| re.is_match(value))
        .map(|(name, _)| *name)
        .collect()
}

/// Per-side statistical profile of a column's sampled values.
#[derive(Debug, Clone)]
pub struct ValueProfile {
    pub non_null_count: usize,
    pub distinct_count: usize,
    pub len_min: usize,
    pub len_avg: f64,
    pub len_max: usize,
    pub numeric_min: Option<f64>,
    pub numeric_max: Option<f64>,
    pub numeric_mean: Option<f64>,
    pub patterns: HashSet<&'static str>,
    pub type_histogram: HashMap<&'static str, usize>,
    pub frequencies: HashMap<String, usize>,
}

impl ValueProfile {
    pub fn from_values(values: &[CellValue]) -> Self {
        let mut non_null_count = 0;
        let mut len_min = usize::MAX;
        let mut len_max = 0;
        let mut len_sum = 0usize;
        let mut numeric_min: Option<f64> = None;
        let mut numeric_max: Option<f64> = None;
        let mut numeric_sum = 0.0;
        let mut numeric_count = 0usize;
        let mut patterns = HashSet::new();
        let mut type_histogram: HashMap<&'static str, usize> = HashMap::new();
        let mut frequencies: HashMap<String, usize> = HashMap::new();

        for value in values {
            if value.is_null() {
                continue;
            }
            non_null_count += 1;
            *type_histogram.entry(value.type_name()).or_insert(0) += 1;

            let text = value.normalized().unwrap_or_default();
            len_min = len_min.min(text.len());
            len_max = len_max.max(text.len());
            len_sum += text.len();

            if let CellValue::Text(raw) = value {
                for p in detect_shape_patterns(raw.trim()) {
                    patterns.insert(p);
                }
            }
            if let CellValue::Date(_) = value {
                patterns.insert("date_iso");
            }

            let numeric = match value {
                CellValue::Int(i) => Some(*i as f64),
                CellValue::Float(f) => Some(*f),
                _ => None,
            };
            if let Some(n) = numeric {
                numeric_min = Some(numeric_min.map_or(n, |m| m.min(n)));
                numeric_max = Some(numeric_max.map_or(n, |m| m.max(n)));
                numeric_sum += n;
                numeric_count += 1;
            }

            *frequencies.entry(text).or_insert(0) += 1;
        }

        ValueProfile {
            non_null_count,
            distinct_count: frequencies.len(),
            len_min: if non_null_count == 0 { 0 } else { len_min },
            len_avg: if non_null_count == 0 {
                0.0
            } else {
                len_sum as f64 / non_null_count as f64
            },
            len_max,
            numeric_min,
            numeric_max,
            numeric_mean: if numeric_count == 0 {
                None
            } else {
                Some(numeric_sum / numeric_count as f64)
            },
            patterns,
            type_histogram,
            frequencies,
        }
    }

    fn uniqueness_ratio(&self) -> f64 {
        if self.non_null_count == 0 {
            0.0
        } else {
            self.distinct_count as f64 / self.non_null_count as f64
        }
    }
}

/// Component scores from distributional comparison of two value sets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DistributionSimilarity {
    pub overall: f64,
    pub statistical: f64,
    pub structural: f64,
    pub domain: f64,
    pub semantic: f64,
}

fn jaccard<T: std::hash::Hash + Eq>(a: &HashSet<T>, b: &HashSet<T>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count() as f64;
    let union = a.union(b).count() as f64;
    intersection / union
}

/// Context for the ordered join-strategy rule table.
pub struct StrategyContext<'a> {
    pub semantic: f64,
    pub distribution: &'a DistributionSimilarity,
    pub left: &'a ColumnSchema,
    pub right: &'a ColumnSchema,
}

/// First-match-wins strategy rules: new rules are data, not control
/// flow. Evaluated top to bottom; the trailing rule always applies.
const STRATEGY_RULES: &[(fn(&StrategyContext) -> bool, JoinStrategy)] = &[
    (
        |c| c.semantic >= 0.95 && c.distribution.overall >= 0.9,
        JoinStrategy::ExactMatch,
    ),
    (|c| c.semantic >= 0.8, JoinStrategy::SemanticMatch),
    (
        |c| c.left.patterns.iter().any(|p| c.right.patterns.contains(p)),
        JoinStrategy::PatternMatch,
    ),
    (
        |c| {
            (c.left.column_type.is_numeric() || c.left.column_type.is_temporal())
                && (c.right.column_type.is_numeric() || c.right.column_type.is_temporal())
        },
        JoinStrategy::RangeOverlap,
    ),
    (
        |c| {
            c.left.column_type == ColumnType::String && c.right.column_type == ColumnType::String
        },
        JoinStrategy::FuzzyMatch,
    ),
    (|_| true, JoinStrategy::StatisticalMatch),
];

/// Additive likelihood bonuses for heuristic FK scoring, applied on
/// top of a 0.5 base and clamped to 1.0.
struct LikelihoodContext<'a> {
    referencing: &'a ColumnSchema,
    referenced: &'a ColumnSchema,
    referencing_rows: usize,
    referenced_rows: usize,
    referenced_table: &'a str,
}

const LIKELIHOOD_RULES: &[(f64, fn(&LikelihoodContext) -> bool)] = &[
    // Non-unique column pointing at a unique one is the classic FK shape.
    (0.3, |c| {
        !c.referencing.is_effectively_unique(c.referencing_rows)
            && c.referenced.is_effectively_unique(c.referenced_rows)
    }),
    // Moderate distinct ratio: repeated references to a smaller key space.
    (0.2, |c| {
        let ratio = c.referencing.distinct_ratio(c.referencing_rows);
        ratio > 0.1 && ratio < 0.9
    }),
    (0.2, |c| c.referencing.column_type == c.referenced.column_type),
    // Name embeds the referenced table's name or the "id" token.
    (0.3, |c| {
        let name = c.referencing.name.to_lowercase();
        let table = c.referenced_table.to_lowercase();
        let stem = table.trim_end_matches('s');
        name.contains(stem) || name.contains("id")
    }),
];

/// Pairwise column semantic and distributional similarity scorer.
pub struct ColumnMatcher {
    /// Memo cache keyed by the lower-cased name pair.
    cache: HashMap<(String, String), f64>,
    fuzzy_enabled: bool,
    semantic_enabled: bool,
}

impl Default for ColumnMatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl ColumnMatcher {
    pub fn new() -> Self {
        Self {
            cache: HashMap::new(),
            fuzzy_enabled: true,
            semantic_enabled: true,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self {
            cache: HashMap::new(),
            fuzzy_enabled: config.enable_fuzzy_matching,
            semantic_enabled: config.enable_semantic_analysis,
        }
    }

    /// Semantic similarity of two column names in [0, 1]. Memoized.
    pub fn semantic_similarity(&mut self, a: &str, b: &str) -> f64 {
        let key = (a.to_lowercase(), b.to_lowercase());
        if let Some(&score) = self.cache.get(&key) {
            return score;
        }
        let score = self.score_names(&key.0, &key.1);
        // Symmetric, so remember both orientations.
        self.cache.insert((key.1.clone(), key.0.clone()), score);
        self.cache.insert(key, score);
        score
    }

    fn score_names(&self, a: &str, b: &str) -> f64 {
        if a == b {
            return 1.0;
        }

        let cleaned_a = clean_column_name(a);
        let cleaned_b = clean_column_name(b);
        if !cleaned_a.is_empty() && cleaned_a == cleaned_b {
            return 0.95;
        }

        let mut best: f64 = 0.0;
        if self.semantic_enabled {
            if in_same_synonym_group(&cleaned_a, &cleaned_b) {
                best = best.max(0.85);
            }
            if in_same_pattern_family(&cleaned_a, &cleaned_b) {
                best = best.max(0.8);
            }
        }
        best = best.max(structural_similarity(a, b));
        if self.fuzzy_enabled {
            best = best.max(fuzzy_similarity(&cleaned_a, &cleaned_b));
        }
        best
    }

    /// Distributional similarity of two sampled value sets.
    pub fn distribution_similarity(
        &self,
        values_a: &[CellValue],
        values_b: &[CellValue],
    ) -> DistributionSimilarity {
        let pa = ValueProfile::from_values(values_a);
        let pb = ValueProfile::from_values(values_b);

        let range_overlap = match (pa.numeric_min, pa.numeric_max, pb.numeric_min, pb.numeric_max)
        {
            (Some(min_a), Some(max_a), Some(min_b), Some(max_b)) => {
                let overlap = (max_a.min(max_b) - min_a.max(min_b)).max(0.0);
                let widest = (max_a - min_a).max(max_b - min_b);
                if widest > 0.0 {
                    overlap / widest
                } else if (min_a - min_b).abs() < f64::EPSILON {
                    1.0
                } else {
                    0.0
                }
            }
            _ => 0.0,
        };
        let length_similarity = if pa.len_avg.max(pb.len_avg) > 0.0 {
            pa.len_avg.min(pb.len_avg) / pa.len_avg.max(pb.len_avg)
        } else {
            0.0
        };
        let uniqueness_similarity = 1.0 - (pa.uniqueness_ratio() - pb.uniqueness_ratio()).abs();
        let statistical = (range_overlap + length_similarity + uniqueness_similarity) / 3.0;

        let types_a: HashSet<&str> = pa.type_histogram.keys().copied().collect();
        let types_b: HashSet<&str> = pb.type_histogram.keys().copied().collect();
        let structural = (jaccard(&types_a, &types_b) + jaccard(&pa.patterns, &pb.patterns)) / 2.0;

        let domain = jaccard(&pa.patterns, &pb.patterns);
        // Placeholder signal until value-level embeddings land.
        let semantic = domain * 0.5;

        let overall = (statistical + structural + domain + semantic) / 4.0;
        DistributionSimilarity {
            overall,
            statistical,
            structural,
            domain,
            semantic,
        }
    }

    /// Classify the cardinality of a potential join between two columns.
    /// ManyToMany whenever either column is absent from its schema.
    pub fn detect_cardinality(
        &self,
        table_a: &TableMeta,
        table_b: &TableMeta,
        col_a: &str,
        col_b: &str,
    ) -> Cardinality {
        let (a, b) = match (table_a.column(col_a), table_b.column(col_b)) {
            (Some(a), Some(b)) => (a, b),
            _ => return Cardinality::ManyToMany,
        };
        let a_unique = a.is_effectively_unique(table_a.row_count);
        let b_unique = b.is_effectively_unique(table_b.row_count);
        match (a_unique, b_unique) {
            (true, true) => Cardinality::OneToOne,
            (true, false) => Cardinality::OneToMany,
            (false, true) => Cardinality::ManyToOne,
            (false, false) => Cardinality::ManyToMany,
        }
    }

    /// Heuristic foreign-key inference from schemas alone (no row data).
    pub fn infer_foreign_keys(&mut self, tables: &[TableMeta]) -> Vec<ForeignKeyCandidate> {
        let mut candidates = Vec::new();
        for table in tables {
            for referenced in tables {
                if table.name == referenced.name {
                    continue;
                }
                for column in &table.columns {
                    for ref_column in &referenced.columns {
                        let semantic =
                            self.semantic_similarity(&column.name, &ref_column.name);
                        if semantic < 0.6 {
                            continue;
                        }
                        let ctx = LikelihoodContext {
                            referencing: column,
                            referenced: ref_column,
                            referencing_rows: table.row_count,
                            referenced_rows: referenced.row_count,
                            referenced_table: &referenced.name,
                        };
                        let likelihood = LIKELIHOOD_RULES
                            .iter()
                            .filter(|(_, applies)| applies(&ctx))
                            .map(|(bonus, _)| bonus)
                            .sum::<f64>()
                            + 0.5;
                        let confidence = semantic * likelihood.min(1.0);
                        if confidence < 0.6 {
                            continue;
                        }
                        candidates.push(ForeignKeyCandidate {
                            table: table.name.clone(),
                            column: column.name.clone(),
                            referenced_table: referenced.name.clone(),
                            referenced_column: ref_column.name.clone(),
                            confidence,
                            matching_rows: 0,
                            total_rows: table.row_count,
                            violations: 0,
                        });
                    }
                }
            }
        }
        candidates.sort_by(|a, b| b.confidence.partial_cmp(&a.confidence).unwrap());
        candidates
    }

    /// Pick a join strategy from the ordered rule table.
    pub fn suggest_join_strategy(
        &mut self,
        left: &ColumnSchema,
        right: &ColumnSchema,
        distribution: &DistributionSimilarity,
    ) -> JoinStrategy {
        let semantic = self.semantic_similarity(&left.name, &right.name);
        let ctx = StrategyContext {
            semantic,
            distribution,
            left,
            right,
        };
        STRATEGY_RULES
            .iter()
            .find(|(applies, _)| applies(&ctx))
            .map(|(_, strategy)| *strategy)
            .unwrap_or(JoinStrategy::StatisticalMatch)
    }
}

fn in_same_synonym_group(a: &str, b: &str) -> bool {
    SYNONYM_GROUPS.iter().any(|group| {
        let hit_a = group.iter().any(|s| a == *s || a.contains(s));
        let hit_b = group.iter().any(|s| b == *s || b.contains(s));
        hit_a && hit_b
    })
}

fn in_same_pattern_family(a: &str, b: &str) -> bool {
    PATTERN_FAMILIES.iter().any(|(_, members)| {
        let hit_a = members.iter().any(|s| a.contains(s));
        let hit_b = members.iter().any(|s| b.contains(s));
        hit_a && hit_b
    })
}

/// Letter/digit template of a name: "ab12" -> "LLDD".
fn char_template(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_alphabetic() {
                'L'
            } else if c.is_numeric() {
                'D'
            } else {
                '_'
            }
        })
        .collect()
}

fn structural_similarity(a: &str, b: &str) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    if char_template(a) == char_template(b) {
        return 0.7;
    }
    let prefix = a
        .chars()
        .zip(b.chars())
        .take_while(|(x, y)| x == y)
        .count();
    let suffix = a
        .chars()
        .rev()
        .zip(b.chars().rev())
        .take_while(|(x, y)| x == y)
        .count();
    let max_len = a.chars().count().max(b.chars().count());
    // Shared-affix fraction, scaled down so it never beats family hits.
    (((prefix + suffix) as f64 / max_len as f64) * 0.6).min(0.6)
}

/// Edit-distance similarity with a floor clamp that suppresses noisy
/// low matches between unrelated names.
fn fuzzy_similarity(a: &str, b: &str) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    (normalized_levenshtein(a, b) - 0.3).max(0.0)
}
