// src/precision_recall.rs

use crate::assignment::{descending_score, AssignmentTable};
use crate::error::{EvalError, Result};
use crate::true_taxa::{TrueTaxonMap, STANDARD_RANKS};

/// One point of a precision/recall curve.
#[derive(Debug, Clone, PartialEq)]
pub struct PrecisionRecallRow {
    pub rank: String,
    pub column: String,
    /// Score of the last accepted candidate
    pub cutoff: f64,
    pub precision: f64,
    pub recall: f64,
}

/// A (rank, column) pair that could not be evaluated.
#[derive(Debug)]
pub struct PairFailure {
    pub rank: String,
    pub column: String,
    pub error: EvalError,
}

/// Curves for every evaluated (rank, column) pair, grouped in iteration order.
#[derive(Debug, Default)]
pub struct PrecisionRecallCurve {
    pub rows: Vec<PrecisionRecallRow>,
    pub failures: Vec<PairFailure>,
}

impl PrecisionRecallCurve {
    /// Rows of a single (rank, column) pair.
    pub fn pair<'a>(
        &'a self,
        rank: &'a str,
        column: &'a str,
    ) -> impl Iterator<Item = &'a PrecisionRecallRow> + 'a {
        self.rows
            .iter()
            .filter(move |r| r.rank == rank && r.column == column)
    }
}

/// Compute curves over the standard ranks for every column in `score_columns`.
pub fn compute<S: AsRef<str>>(
    table: &AssignmentTable,
    true_taxa: &TrueTaxonMap,
    score_columns: &[S],
) -> PrecisionRecallCurve {
    compute_for_ranks(table, true_taxa, &STANDARD_RANKS, score_columns)
}

/// Compute curves for each rank, then each column. A pair that fails is
/// logged and recorded in `failures`; the remaining pairs are unaffected.
pub fn compute_for_ranks<R: AsRef<str>, S: AsRef<str>>(
    table: &AssignmentTable,
    true_taxa: &TrueTaxonMap,
    ranks: &[R],
    score_columns: &[S],
) -> PrecisionRecallCurve {
    let mut curve = PrecisionRecallCurve::default();

    for rank in ranks {
        let rank = rank.as_ref();
        for column in score_columns {
            let column = column.as_ref();
            match pair_curve(table, true_taxa, rank, column) {
                Ok(rows) => {
                    log::debug!("{rank} / {column}: {} curve points", rows.len());
                    curve.rows.extend(rows);
                }
                Err(error) => {
                    log::warn!("Skipping precision/recall for {rank} / {column}: {error}");
                    curve.failures.push(PairFailure {
                        rank: rank.to_string(),
                        column: column.to_string(),
                        error,
                    });
                }
            }
        }
    }
    curve
}

/// Curve of a single (rank, column) pair, synthetic origin first.
pub fn pair_curve(
    table: &AssignmentTable,
    true_taxa: &TrueTaxonMap,
    rank: &str,
    column: &str,
) -> Result<Vec<PrecisionRecallRow>> {
    let labels = true_taxa
        .labels(rank)
        .ok_or_else(|| EvalError::invalid_rank(rank, "rank has no true-taxon set"))?;
    if labels.is_empty() {
        return Err(EvalError::invalid_rank(rank, "no true taxa at this rank"));
    }
    let col = table.column_index(column)?;
    let total_true = labels.len() as f64;

    // sort_by is stable: equal scores keep table order, unscored taxa go last
    let mut candidates = table
        .rows_of_rank(rank)
        .map(|(_, row)| Ok((row.score(col)?, row.label.as_str())))
        .collect::<Result<Vec<(f64, &str)>>>()?;
    candidates.sort_by(|a, b| descending_score(a.0, b.0));

    let mut rows = vec![PrecisionRecallRow {
        rank: rank.to_string(),
        column: column.to_string(),
        cutoff: 0.0,
        precision: 1.0,
        recall: 0.0,
    }];

    let true_hits = candidates
        .iter()
        .enumerate()
        .filter(|(_, (_, label))| labels.contains(*label));
    for (found, (original_rank, (score, _))) in true_hits.enumerate() {
        rows.push(PrecisionRecallRow {
            rank: rank.to_string(),
            column: column.to_string(),
            cutoff: *score,
            precision: (found + 1) as f64 / (original_rank + 1) as f64,
            recall: (found + 1) as f64 / total_true,
        });
    }

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assignment::tests::sample_table;
    use crate::assignment::AssignmentRow;
    use crate::lineage::tests::{record, sample_tree};
    use crate::lineage::LineageTree;
    use crate::true_taxa::derive_true_taxa;
    use assert_approx_eq::assert_approx_eq;

    fn row(label: &str, rank: &str, score: f64) -> AssignmentRow {
        AssignmentRow {
            label: label.to_string(),
            rank: rank.to_string(),
            scores: vec![score],
        }
    }

    /// Species A..D under one genus; the true species are A and C.
    fn abcd() -> (AssignmentTable, TrueTaxonMap) {
        let tree = LineageTree::build(vec![
            record(0, 1, "no rank", "root"),
            record(1, 2, "genus", "G"),
            record(2, 3, "species", "A"),
            record(2, 4, "species", "B"),
            record(2, 5, "species", "C"),
            record(2, 6, "species", "D"),
        ])
        .unwrap();
        let true_taxa = derive_true_taxa(&tree, &["A", "C"]).unwrap();
        let table = AssignmentTable::new(
            vec!["score".to_string()],
            vec![
                row("D", "species", 1.0),
                row("B", "species", 8.0),
                row("A", "species", 10.0),
                row("C", "species", 5.0),
            ],
        )
        .unwrap();
        (table, true_taxa)
    }

    #[test]
    fn test_scored_species_scenario() {
        let (table, true_taxa) = abcd();
        let rows = pair_curve(&table, &true_taxa, "species", "score").unwrap();
        assert_eq!(rows.len(), 3);

        assert_approx_eq!(rows[0].cutoff, 0.0);
        assert_approx_eq!(rows[0].precision, 1.0);
        assert_approx_eq!(rows[0].recall, 0.0);

        assert_approx_eq!(rows[1].cutoff, 10.0);
        assert_approx_eq!(rows[1].precision, 1.0);
        assert_approx_eq!(rows[1].recall, 0.5);

        assert_approx_eq!(rows[2].cutoff, 5.0);
        assert_approx_eq!(rows[2].precision, 2.0 / 3.0);
        assert_approx_eq!(rows[2].recall, 1.0);
    }

    #[test]
    fn test_ties_keep_table_order() {
        let tree = LineageTree::build(vec![
            record(0, 1, "no rank", "root"),
            record(1, 2, "species", "T"),
            record(1, 3, "species", "F"),
        ])
        .unwrap();
        let true_taxa = derive_true_taxa(&tree, &["T"]).unwrap();

        let false_first = AssignmentTable::new(
            vec!["score".to_string()],
            vec![row("F", "species", 4.0), row("T", "species", 4.0)],
        )
        .unwrap();
        let rows = pair_curve(&false_first, &true_taxa, "species", "score").unwrap();
        assert_approx_eq!(rows[1].precision, 0.5);

        let true_first = AssignmentTable::new(
            vec!["score".to_string()],
            vec![row("T", "species", 4.0), row("F", "species", 4.0)],
        )
        .unwrap();
        let rows = pair_curve(&true_first, &true_taxa, "species", "score").unwrap();
        assert_approx_eq!(rows[1].precision, 1.0);
    }

    #[test]
    fn test_recall_is_non_decreasing_and_ends_at_found_fraction() {
        let tree = sample_tree();
        // Three true species, one of which never appears in the table
        let tree = LineageTree::build(
            tree.nodes()
                .map(|n| record(n.parent.unwrap_or(0), n.id, &n.rank, &n.label))
                .chain(std::iter::once(record(7, 20, "species", "Escherichia albertii")))
                .collect::<Vec<_>>(),
        )
        .unwrap();
        let true_taxa = derive_true_taxa(
            &tree,
            &["Escherichia coli", "Salmonella enterica", "Escherichia albertii"],
        )
        .unwrap();
        let table = sample_table();
        let rows = pair_curve(&table, &true_taxa, "species", "kmer count").unwrap();

        assert_eq!(rows.len(), 3);
        for pair in rows.windows(2) {
            assert!(pair[1].recall >= pair[0].recall);
        }
        assert_approx_eq!(rows.last().unwrap().recall, 2.0 / 3.0);
        // E. coli (5000) first, then B. subtilis (3000), then S. enterica (2500)
        assert_approx_eq!(rows[1].precision, 1.0);
        assert_approx_eq!(rows[2].precision, 2.0 / 3.0);
    }

    #[test]
    fn test_compute_groups_pairs_and_isolates_failures() {
        let tree = sample_tree();
        let true_taxa = derive_true_taxa(&tree, &["Escherichia coli"]).unwrap();
        let table = sample_table();
        let columns = ["kmer count", "OVO (1.00) read count cumulative", "missing column"];
        let curve = compute(&table, &true_taxa, &columns);

        // kingdom has no true taxa, so every column fails there
        let kingdom: Vec<&PairFailure> = curve
            .failures
            .iter()
            .filter(|f| f.rank == "kingdom")
            .collect();
        assert_eq!(kingdom.len(), columns.len());
        assert!(kingdom
            .iter()
            .all(|f| matches!(f.error, EvalError::InvalidRank { .. })));

        // the unknown column fails on every rank that has true taxa
        let missing: Vec<&PairFailure> = curve
            .failures
            .iter()
            .filter(|f| f.column == "missing column" && f.rank != "kingdom")
            .collect();
        assert_eq!(missing.len(), STANDARD_RANKS.len() - 1);
        assert!(missing.iter().all(|f| matches!(f.error, EvalError::NotFound(_))));

        // species and genus still produce curves
        let species: Vec<&PrecisionRecallRow> = curve.pair("species", "kmer count").collect();
        assert_eq!(species.len(), 2);
        assert_approx_eq!(species[1].cutoff, 5000.0);
        assert_approx_eq!(species[1].recall, 1.0);

        // grouping follows rank order then column order, origin first
        let first = &curve.rows[0];
        assert_eq!((first.rank.as_str(), first.column.as_str()), ("superkingdom", "kmer count"));
        assert_approx_eq!(first.precision, 1.0);
        assert_approx_eq!(first.recall, 0.0);
        let mut seen: Vec<(&str, &str)> = Vec::new();
        for r in &curve.rows {
            let key = (r.rank.as_str(), r.column.as_str());
            if seen.last() != Some(&key) {
                assert!(!seen.contains(&key), "pair {key:?} is not contiguous");
                assert_approx_eq!(r.cutoff, 0.0);
                seen.push(key);
            }
        }
    }

    #[test]
    fn test_rank_missing_from_map_is_invalid() {
        let (table, _) = abcd();
        let err = pair_curve(&table, &TrueTaxonMap::empty(), "species", "score").unwrap_err();
        assert!(matches!(err, EvalError::InvalidRank { .. }));

        let curve = compute_for_ranks(&table, &TrueTaxonMap::empty(), &["clade"], &["score"]);
        assert!(curve.rows.is_empty());
        assert_eq!(curve.failures.len(), 1);
    }

    #[test]
    fn test_unscored_candidate_ranks_last() {
        let tree = LineageTree::build(vec![
            record(0, 1, "no rank", "root"),
            record(1, 2, "species", "T"),
            record(1, 3, "species", "F"),
        ])
        .unwrap();
        let true_taxa = derive_true_taxa(&tree, &["T"]).unwrap();
        let table = AssignmentTable::new(
            vec!["score".to_string()],
            vec![row("F", "species", f64::NAN), row("T", "species", 5.0)],
        )
        .unwrap();

        let rows = pair_curve(&table, &true_taxa, "species", "score").unwrap();
        assert_eq!(rows.len(), 2);
        assert_approx_eq!(rows[1].cutoff, 5.0);
        assert_approx_eq!(rows[1].precision, 1.0);
        assert_approx_eq!(rows[1].recall, 1.0);
    }

    #[test]
    fn test_short_row_fails_only_its_pair() {
        let (mut table, true_taxa) = abcd();
        table.rows[1].scores.clear();

        let err = pair_curve(&table, &true_taxa, "species", "score").unwrap_err();
        assert!(matches!(err, EvalError::InvalidInput(_)));

        let curve = compute_for_ranks(&table, &true_taxa, &["genus", "species"], &["score"]);
        assert_eq!(curve.failures.len(), 1);
        assert_eq!(curve.failures[0].rank, "species");
        assert_eq!(curve.pair("genus", "score").count(), 1);
    }
}
