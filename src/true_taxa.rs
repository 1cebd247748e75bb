// src/true_taxa.rs

use std::io::BufRead;
use std::path::Path;

use ahash::{AHashMap, AHashSet};

use crate::error::{EvalError, Result};
use crate::lineage::LineageTree;
use crate::reader::open_table;

/// The ranks evaluated against ground truth, from the top of the taxonomy down.
pub const STANDARD_RANKS: [&str; 8] = [
    "superkingdom",
    "kingdom",
    "phylum",
    "class",
    "order",
    "family",
    "genus",
    "species",
];

/// Labels known to be present in the sample, grouped by rank.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TrueTaxonMap {
    ranks: AHashMap<String, AHashSet<String>>,
}

impl TrueTaxonMap {
    /// A map without any rank; nothing classifies as a true positive.
    pub fn empty() -> Self {
        Self::default()
    }

    fn with_standard_ranks() -> Self {
        let ranks = STANDARD_RANKS
            .iter()
            .map(|r| (r.to_string(), AHashSet::new()))
            .collect();
        Self { ranks }
    }

    pub fn labels(&self, rank: &str) -> Option<&AHashSet<String>> {
        self.ranks.get(rank)
    }

    pub fn contains_rank(&self, rank: &str) -> bool {
        self.ranks.contains_key(rank)
    }

    pub fn is_true(&self, rank: &str, label: &str) -> bool {
        self.ranks
            .get(rank)
            .map(|labels| labels.contains(label))
            .unwrap_or(false)
    }

    /// Size of the true set at `rank`, the denominator of recall.
    pub fn true_count(&self, rank: &str) -> Option<usize> {
        self.ranks.get(rank).map(|labels| labels.len())
    }

    pub fn ranks(&self) -> impl Iterator<Item = &str> {
        self.ranks.keys().map(String::as_str)
    }
}

/// Collect, for every standard rank, the labels on the root paths of the
/// given species. Any species missing from the tree aborts the derivation.
pub fn derive_true_taxa<S: AsRef<str>>(tree: &LineageTree, species: &[S]) -> Result<TrueTaxonMap> {
    let mut true_taxa = TrueTaxonMap::with_standard_ranks();

    for s in species {
        let id = tree.id_of(s.as_ref())?;
        for node in tree.path_to_root(id)? {
            if let Some(labels) = true_taxa.ranks.get_mut(node.rank.as_str()) {
                labels.insert(node.label.clone());
            }
        }
    }

    log::info!(
        "Derived true taxa for {} species: {}",
        species.len(),
        STANDARD_RANKS
            .iter()
            .map(|r| format!("{}={}", r, true_taxa.true_count(r).unwrap_or(0)))
            .collect::<Vec<_>>()
            .join(", ")
    );
    Ok(true_taxa)
}

/// Parse a species list: one label per line, blank lines and `#` comments ignored.
pub fn parse_species_list<R: BufRead>(reader: R) -> Result<Vec<String>> {
    let mut species = Vec::new();
    for line in reader.lines() {
        let line = line?;
        let label = line.trim();
        if label.is_empty() || label.starts_with('#') {
            continue;
        }
        species.push(label.to_string());
    }
    if species.is_empty() {
        return Err(EvalError::InvalidInput("species list is empty".to_string()));
    }
    Ok(species)
}

pub fn read_species_list<P: AsRef<Path>>(path: P) -> Result<Vec<String>> {
    parse_species_list(open_table(path)?)
}
