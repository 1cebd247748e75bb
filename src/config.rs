// src/config.rs

use std::path::PathBuf;

use crate::true_taxa::STANDARD_RANKS;

/// Minimum k-mer count for a taxon to count as a candidate.
pub const DEFAULT_KMER_THRESHOLD: f64 = 1000.0;
/// Minimum reads assigned by OVO (1.00), cumulative over the clade.
pub const DEFAULT_OVO_THRESHOLD: f64 = 1.0;

/// Paths of the optional per-read inputs.
#[derive(Debug, Clone)]
pub struct PerReadInputs {
    pub kraken: PathBuf,
    pub raw: PathBuf,
    pub per_read: PathBuf,
}

/// Parameters of one evaluation run.
#[derive(Debug, Clone)]
pub struct EvalConfig {
    pub kmer_threshold: f64,
    pub ovo_threshold: f64,
    /// Apply the thresholds above before computing curves
    pub filter_candidates: bool,
    /// Empty means every algorithm column of the table
    pub score_columns: Vec<String>,
    pub ranks: Vec<String>,
    /// Total reads of the sample; enables true assigned read rates
    pub total_reads: Option<u64>,
    pub per_read_inputs: Option<PerReadInputs>,
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            kmer_threshold: DEFAULT_KMER_THRESHOLD,
            ovo_threshold: DEFAULT_OVO_THRESHOLD,
            filter_candidates: false,
            score_columns: Vec::new(),
            ranks: STANDARD_RANKS.iter().map(|r| r.to_string()).collect(),
            total_reads: None,
            per_read_inputs: None,
        }
    }
}
