// src/assignment.rs

use std::cmp::Ordering;
use std::io::BufRead;
use std::path::Path;

use ahash::{AHashMap, AHashSet};

use crate::error::{EvalError, Result};
use crate::reader::{open_table, split_fields};
use crate::true_taxa::{TrueTaxonMap, STANDARD_RANKS};

pub const KMER_COUNT: &str = "kmer count";
pub const OVO_1_CUMULATIVE: &str = "OVO (1.00) read count cumulative";

/// Numeric columns describing the database or the raw k-mer hits rather than
/// the output of an assignment algorithm.
pub const METADATA_COLUMNS: [&str; 5] = [
    KMER_COUNT,
    "node id",
    "kmers in database",
    "kmer count cumulative",
    "normalized kmer count",
];

/// Map a legacy per-taxon column name onto its current spelling, e.g.
/// `OVO (1.000000) ratio: read count (accumulated)` -> `OVO (1.00) read count cumulative`
pub fn normalize_column_name(name: &str) -> String {
    name.replace("0000", "")
        .replace("ratio: ", "")
        .replace("(accumulated)", "cumulative")
}

/// Highest score first; NaN (a taxon without a score) sorts after every number.
pub fn descending_score(a: f64, b: f64) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => b.total_cmp(&a),
    }
}

/// One taxon of a per-taxon assignment table.
#[derive(Debug, Clone, PartialEq)]
pub struct AssignmentRow {
    pub label: String,
    pub rank: String,
    /// One value per entry of `AssignmentTable::columns`
    pub scores: Vec<f64>,
}

impl AssignmentRow {
    pub fn score(&self, column: usize) -> Result<f64> {
        self.scores.get(column).copied().ok_or_else(|| {
            EvalError::InvalidInput(format!(
                "row '{}' has no value for column {}",
                self.label, column
            ))
        })
    }
}

/// Per-taxon scores, one row per unique label.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AssignmentTable {
    pub columns: Vec<String>,
    pub rows: Vec<AssignmentRow>,
    /// Derived by [`classify`]; parallel to `rows`
    pub true_positive: Option<Vec<bool>>,
}

impl AssignmentTable {
    /// Create a table, rejecting duplicate labels and rows of the wrong width.
    pub fn new(columns: Vec<String>, rows: Vec<AssignmentRow>) -> Result<Self> {
        let mut seen = AHashSet::with_capacity(rows.len());
        for row in &rows {
            if row.scores.len() != columns.len() {
                return Err(EvalError::InvalidInput(format!(
                    "row '{}' has {} scores for {} columns",
                    row.label,
                    row.scores.len(),
                    columns.len()
                )));
            }
            if !seen.insert(row.label.as_str()) {
                return Err(EvalError::InvalidInput(format!(
                    "duplicate label '{}'",
                    row.label
                )));
            }
        }
        Ok(Self {
            columns,
            rows,
            true_positive: None,
        })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, column: &str) -> Result<usize> {
        self.columns
            .iter()
            .position(|c| c == column)
            .ok_or_else(|| EvalError::NotFound(format!("column '{column}'")))
    }

    pub fn row(&self, label: &str) -> Option<&AssignmentRow> {
        self.rows.iter().find(|r| r.label == label)
    }

    /// Columns produced by assignment algorithms, in table order.
    pub fn score_columns(&self) -> Vec<String> {
        self.columns
            .iter()
            .filter(|c| !METADATA_COLUMNS.contains(&c.as_str()))
            .cloned()
            .collect()
    }

    /// Rows whose rank is `rank`, in table order.
    pub fn rows_of_rank<'a>(
        &'a self,
        rank: &'a str,
    ) -> impl Iterator<Item = (usize, &'a AssignmentRow)> + 'a {
        self.rows
            .iter()
            .enumerate()
            .filter(move |(_, r)| r.rank == rank)
    }
}

/// Parses a per-taxon assignment table. The header names the columns; `label`
/// and `rank` are required and every other column must be numeric.
pub fn parse_assignment_table<R: BufRead>(reader: R) -> Result<AssignmentTable> {
    let mut lines = reader.lines();
    let header = match lines.next() {
        Some(line) => line?,
        None => return Err(EvalError::parse(1, "missing header")),
    };
    let header: Vec<String> = split_fields(&header)
        .into_iter()
        .map(|c| normalize_column_name(c.trim()))
        .collect();

    let label_idx = header
        .iter()
        .position(|c| c == "label")
        .ok_or_else(|| EvalError::parse(1, "missing 'label' column"))?;
    let rank_idx = header
        .iter()
        .position(|c| c == "rank")
        .ok_or_else(|| EvalError::parse(1, "missing 'rank' column"))?;
    let score_idx: Vec<usize> = (0..header.len())
        .filter(|&i| i != label_idx && i != rank_idx)
        .collect();
    let columns: Vec<String> = score_idx.iter().map(|&i| header[i].clone()).collect();

    let mut rows = Vec::new();
    let mut seen: AHashSet<String> = AHashSet::new();

    for (idx, line_result) in lines.enumerate() {
        let line = line_result?;
        let line_no = idx + 2;
        if line.trim().is_empty() {
            continue;
        }
        let parts = split_fields(&line);
        if parts.len() != header.len() {
            return Err(EvalError::parse(
                line_no,
                format!("expected {} fields, found {}", header.len(), parts.len()),
            ));
        }

        let label = parts[label_idx].trim().to_string();
        if !seen.insert(label.clone()) {
            return Err(EvalError::parse(line_no, format!("duplicate label '{label}'")));
        }

        let mut scores = Vec::with_capacity(score_idx.len());
        for &i in &score_idx {
            let value = parts[i].trim().parse::<f64>().map_err(|_| {
                EvalError::parse(
                    line_no,
                    format!("column '{}' is not numeric: '{}'", header[i], parts[i]),
                )
            })?;
            scores.push(value);
        }

        rows.push(AssignmentRow {
            label,
            rank: parts[rank_idx].trim().to_string(),
            scores,
        });
    }

    Ok(AssignmentTable {
        columns,
        rows,
        true_positive: None,
    })
}

pub fn read_assignment_table<P: AsRef<Path>>(path: P) -> Result<AssignmentTable> {
    let table = parse_assignment_table(open_table(path)?)?;
    log::info!(
        "Loaded per-taxon assignment with {} taxa and {} score columns",
        table.len(),
        table.columns.len()
    );
    Ok(table)
}

/// Keep taxa with enough k-mer hits and at least `ovo_threshold` reads
/// assigned by OVO (1.00), strongest k-mer count first.
pub fn filter_candidates(
    table: &AssignmentTable,
    rank: Option<&str>,
    kmer_threshold: f64,
    ovo_threshold: f64,
) -> Result<AssignmentTable> {
    let kmer_idx = table.column_index(KMER_COUNT)?;
    let ovo_idx = table.column_index(OVO_1_CUMULATIVE)?;

    let mut rows: Vec<(f64, AssignmentRow)> = Vec::new();
    for row in table.rows.iter().filter(|r| rank.map_or(true, |rank| r.rank == rank)) {
        let kmers = row.score(kmer_idx)?;
        if kmers >= kmer_threshold && row.score(ovo_idx)? >= ovo_threshold {
            rows.push((kmers, row.clone()));
        }
    }
    rows.sort_by(|a, b| descending_score(a.0, b.0));
    let rows = rows.into_iter().map(|(_, row)| row).collect();

    Ok(AssignmentTable {
        columns: table.columns.clone(),
        rows,
        true_positive: None,
    })
}

/// Attach the "true positive" column: a row is a true positive when its rank
/// is in `true_taxa` and its label belongs to that rank's set.
pub fn classify(table: &AssignmentTable, true_taxa: &TrueTaxonMap) -> AssignmentTable {
    let flags = table
        .rows
        .iter()
        .map(|r| true_taxa.is_true(&r.rank, &r.label))
        .collect();
    AssignmentTable {
        columns: table.columns.clone(),
        rows: table.rows.clone(),
        true_positive: Some(flags),
    }
}

/// Percentage of all `total_reads` that each score column assigns to the
/// true taxa of `rank`.
pub fn true_assigned_reads(
    table: &AssignmentTable,
    total_reads: u64,
    true_taxa: &TrueTaxonMap,
    rank: &str,
) -> Result<Vec<(String, f64)>> {
    if total_reads == 0 {
        return Err(EvalError::InvalidInput("total reads must be positive".to_string()));
    }

    let columns: Vec<(usize, &String)> = table
        .columns
        .iter()
        .enumerate()
        .filter(|(_, c)| !METADATA_COLUMNS.contains(&c.as_str()))
        .collect();

    let mut sums = vec![0.0f64; columns.len()];
    for (_, row) in table.rows_of_rank(rank) {
        if !true_taxa.is_true(rank, &row.label) {
            continue;
        }
        for (slot, &(idx, _)) in sums.iter_mut().zip(columns.iter()) {
            let value = row.score(idx)?;
            // missing scores count as no reads
            if !value.is_nan() {
                *slot += value;
            }
        }
    }

    Ok(columns
        .into_iter()
        .zip(sums)
        .map(|((_, name), sum)| (name.clone(), sum / total_reads as f64 * 100.0))
        .collect())
}

/// True assigned read percentages for every standard rank, keyed by column.
/// Each entry lists `(rank, percentage)` pairs in `STANDARD_RANKS` order.
pub fn true_assigned_per_rank(
    table: &AssignmentTable,
    total_reads: u64,
    true_taxa: &TrueTaxonMap,
) -> Result<Vec<(String, Vec<(&'static str, f64)>)>> {
    let mut per_column: Vec<(String, Vec<(&'static str, f64)>)> = table
        .score_columns()
        .into_iter()
        .map(|c| (c, Vec::with_capacity(STANDARD_RANKS.len())))
        .collect();
    let index: AHashMap<String, usize> = per_column
        .iter()
        .enumerate()
        .map(|(i, (c, _))| (c.clone(), i))
        .collect();

    for rank in STANDARD_RANKS {
        for (column, pct) in true_assigned_reads(table, total_reads, true_taxa, rank)? {
            if let Some(&i) = index.get(&column) {
                per_column[i].1.push((rank, pct));
            }
        }
    }
    Ok(per_column)
}
