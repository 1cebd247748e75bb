// src/lib.rs
pub mod assignment;
pub mod config;
pub mod error;
pub mod kraken;
pub mod lineage;
pub mod precision_recall;
pub mod reader;
pub mod true_taxa;
pub mod types;

use std::fmt::Write as FmtWrite;
use std::path::Path;
use std::sync::Arc;

use crate::assignment::{
    classify, filter_candidates, read_assignment_table, true_assigned_per_rank, AssignmentTable,
};
use crate::config::EvalConfig;
use crate::error::Result;
use crate::kraken::{load_assignments, serialize_assignments};
use crate::lineage::{read_lineage_file, LineageTree};
use crate::precision_recall::{compute_for_ranks, PrecisionRecallCurve};
use crate::true_taxa::{derive_true_taxa, TrueTaxonMap};
use crate::types::LoadedAssignments;

pub use crate::error::EvalError;

/// Per-column true assigned read percentages, `(rank, pct)` in rank order.
pub type TrueAssignedRates = Vec<(String, Vec<(&'static str, f64)>)>;

/// Everything one evaluation run produces. Text tables are generated on
/// demand for the plotting layer.
pub struct EvaluationResults {
    /// Shared, read-only taxonomy
    pub tree: Arc<LineageTree>,
    pub true_taxa: Arc<TrueTaxonMap>,

    /// Per-taxon table with the "true positive" column attached
    pub classified: AssignmentTable,

    pub curve: PrecisionRecallCurve,

    /// Present when the total read count of the sample is known
    pub true_assigned: Option<TrueAssignedRates>,

    /// Present when per-read inputs were configured
    pub per_read: Option<LoadedAssignments>,
}

impl EvaluationResults {
    /// Generate the classified per-taxon table as TSV
    pub fn get_classified_table(&self) -> String {
        let mut output = String::new();
        writeln!(
            output,
            "label\trank\t{}\ttrue positive",
            self.classified.columns.join("\t")
        )
        .unwrap();

        let flags = self.classified.true_positive.as_deref().unwrap_or(&[]);
        for (i, row) in self.classified.rows.iter().enumerate() {
            let scores: Vec<String> = row.scores.iter().map(|s| s.to_string()).collect();
            writeln!(
                output,
                "{}\t{}\t{}\t{}",
                row.label,
                row.rank,
                scores.join("\t"),
                flags.get(i).copied().unwrap_or(false)
            )
            .unwrap();
        }
        output
    }

    /// Generate the precision/recall curve as TSV
    pub fn get_precision_recall(&self) -> String {
        let mut output = String::new();
        output.push_str("rank\tcolumn\tcutoff\tprecision\trecall\n");
        for row in &self.curve.rows {
            writeln!(
                output,
                "{}\t{}\t{}\t{:.6}\t{:.6}",
                row.rank, row.column, row.cutoff, row.precision, row.recall
            )
            .unwrap();
        }
        output
    }

    /// Generate true assigned read percentages, one row per column and one
    /// field per rank
    pub fn get_true_assigned_per_rank(&self) -> Option<String> {
        let rates = self.true_assigned.as_ref()?;
        let mut output = String::new();

        let ranks: Vec<&str> = rates
            .first()
            .map(|(_, per_rank)| per_rank.iter().map(|(rank, _)| *rank).collect())
            .unwrap_or_default();
        writeln!(output, "label\t{}", ranks.join("\t")).unwrap();

        for (column, per_rank) in rates {
            let values: Vec<String> = per_rank.iter().map(|(_, pct)| format!("{pct:.4}")).collect();
            writeln!(output, "{}\t{}", column, values.join("\t")).unwrap();
        }
        Some(output)
    }

    /// Generate the normalized kraken assignments as TSV
    pub fn get_kraken_assignments(&self) -> Option<String> {
        let loaded = self.per_read.as_ref()?;
        let mut output = String::new();
        output.push_str("readId\tclassification\tsequence_length\tassignments\n");
        for read in &loaded.kraken {
            writeln!(
                output,
                "{}\t{}\t{}\t{}",
                read.read_id,
                read.classification,
                read.sequence_length,
                serialize_assignments(&read.assignments)
            )
            .unwrap();
        }
        Some(output)
    }
}

/// Runs one evaluation pass: taxonomy, ground truth, classification,
/// precision/recall and, when configured, read rates and per-read inputs.
pub fn evaluate<S: AsRef<str>>(
    lineage_path: impl AsRef<Path>,
    assignment_path: impl AsRef<Path>,
    species: &[S],
    config: &EvalConfig,
) -> Result<EvaluationResults> {
    // 1. Build the taxonomy
    let tree = Arc::new(read_lineage_file(lineage_path)?);

    // 2. Derive the true taxa per rank
    let true_taxa = Arc::new(derive_true_taxa(&tree, species)?);

    // 3. Load per-taxon scores
    let mut table = read_assignment_table(assignment_path)?;
    if config.filter_candidates {
        table = filter_candidates(&table, None, config.kmer_threshold, config.ovo_threshold)?;
        log::info!("{} taxa pass the candidate thresholds", table.len());
    }

    // 4. Attach the true positive column
    let classified = classify(&table, &true_taxa);

    // 5. Precision/recall per (rank, column)
    let columns = if config.score_columns.is_empty() {
        classified.score_columns()
    } else {
        config.score_columns.clone()
    };
    let curve = compute_for_ranks(&classified, &true_taxa, &config.ranks, &columns);
    if !curve.failures.is_empty() {
        log::warn!(
            "{} of {} rank/column pairs could not be evaluated",
            curve.failures.len(),
            config.ranks.len() * columns.len()
        );
    }

    // 6. True assigned read rates
    let true_assigned = match config.total_reads {
        Some(total_reads) => Some(true_assigned_per_rank(&classified, total_reads, &true_taxa)?),
        None => None,
    };

    // 7. Per-read inputs
    let per_read = match &config.per_read_inputs {
        Some(inputs) => Some(load_assignments(&inputs.kraken, &inputs.raw, &inputs.per_read)?),
        None => None,
    };

    Ok(EvaluationResults {
        tree,
        true_taxa,
        classified,
        curve,
        true_assigned,
        per_read,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assignment::tests::SAMPLE_TABLE;
    use crate::config::PerReadInputs;
    use std::fs;
    use std::path::PathBuf;

    const LINEAGE: &str = "parent id\tnode id\trank\tlabel\tkmers in database\n\
                           0\t1\tno rank\troot\t0\n\
                           1\t2\tsuperkingdom\tBacteria\t90000\n\
                           2\t3\tphylum\tProteobacteria\t50000\n\
                           3\t4\tclass\tGammaproteobacteria\t40000\n\
                           4\t5\torder\tEnterobacterales\t30000\n\
                           5\t6\tfamily\tEnterobacteriaceae\t20000\n\
                           6\t7\tgenus\tEscherichia\t9000\n\
                           7\t8\tspecies\tEscherichia coli\t6000\n\
                           6\t9\tgenus\tSalmonella\t8000\n\
                           9\t10\tspecies\tSalmonella enterica\t5000\n\
                           2\t15\tphylum\tFirmicutes\t30000\n\
                           15\t16\tclass\tBacilli\t20000\n\
                           16\t17\torder\tBacillales\t15000\n\
                           17\t18\tfamily\tBacillaceae\t10000\n\
                           18\t19\tgenus\tBacillus\t9000\n\
                           19\t13\tspecies\tBacillus subtilis\t4000\n\
                           18\t20\tgenus\tListeria\t3000\n\
                           20\t14\tspecies\tListeria innocua\t2000\n\
                           1\t11\tsuperkingdom\tArchaea\t10000\n\
                           11\t12\tclade\tDPANN group\t1000\n";

    fn fixture_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("taxeval_{}_{}", name, std::process::id()));
        fs::create_dir_all(&dir).expect("Could not create fixture dir");
        dir
    }

    #[test]
    fn test_evaluate_pipeline() {
        let dir = fixture_dir("pipeline");
        let lineage = dir.join("lineage.tsv");
        let assignment = dir.join("per_taxon.tsv");
        fs::write(&lineage, LINEAGE).unwrap();
        fs::write(&assignment, SAMPLE_TABLE).unwrap();

        let config = EvalConfig {
            total_reads: Some(100),
            ..EvalConfig::default()
        };
        let results = evaluate(
            &lineage,
            &assignment,
            &["Escherichia coli", "Salmonella enterica"],
            &config,
        )
        .expect("Evaluation failed");

        assert_eq!(results.tree.len(), 20);
        assert_eq!(results.true_taxa.true_count("species"), Some(2));

        let flags = results.classified.true_positive.as_ref().unwrap();
        assert_eq!(flags.iter().filter(|tp| **tp).count(), 4);

        // kingdom has no true taxa: one failure per algorithm column
        assert_eq!(results.curve.failures.len(), 2);

        let pr = results.get_precision_recall();
        assert!(pr.starts_with("rank\tcolumn\tcutoff\tprecision\trecall\n"));
        assert!(pr.contains("species\tOVO (1.00) read count cumulative\t0\t1.000000\t0.000000\n"));
        assert!(pr.contains("species\tOVO (1.00) read count cumulative\t40\t1.000000\t0.500000\n"));
        assert!(pr.contains("species\tOVO (1.00) read count cumulative\t25\t1.000000\t1.000000\n"));

        let classified = results.get_classified_table();
        assert!(classified.contains("Escherichia coli\tspecies\t8\t5000\t5000\t40\t30\ttrue\n"));
        assert!(classified.contains("DPANN group\tclade\t12\t4000\t4000\t3\t1\tfalse\n"));

        let rates = results.get_true_assigned_per_rank().unwrap();
        assert!(rates.starts_with("label\tsuperkingdom\tkingdom"));
        assert!(rates.contains("OVA (0.30) read count\t0.0000\t0.0000"));

        assert!(results.get_kraken_assignments().is_none());
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_evaluate_with_filter_and_per_read_inputs() {
        let dir = fixture_dir("per_read");
        let lineage = dir.join("lineage.tsv.gz");
        let assignment = dir.join("per_taxon.tsv");
        {
            use flate2::write::GzEncoder;
            use flate2::Compression;
            use std::io::Write;
            let file = fs::File::create(&lineage).unwrap();
            let mut enc = GzEncoder::new(file, Compression::default());
            enc.write_all(LINEAGE.as_bytes()).unwrap();
            enc.finish().unwrap();
        }
        fs::write(&assignment, SAMPLE_TABLE).unwrap();

        let kraken = dir.join("kraken.tsv");
        let raw = dir.join("raw.tsv");
        let per_read = dir.join("per_read.tsv");
        fs::write(&kraken, "C\tr1\t562\t150\t5:3 7:3 -:-  5:2\n").unwrap();
        fs::write(&raw, "readId\tassignment\nr1\t562\n").unwrap();
        fs::write(&per_read, "summary\nreadId\tassignments\nr1\tEscherichia coli (562)\n").unwrap();

        let config = EvalConfig {
            filter_candidates: true,
            score_columns: vec!["kmer count".to_string()],
            ranks: vec!["species".to_string()],
            per_read_inputs: Some(PerReadInputs {
                kraken,
                raw,
                per_read,
            }),
            ..EvalConfig::default()
        };
        let results = evaluate(&lineage, &assignment, &["Bacillus subtilis"], &config)
            .expect("Evaluation failed");

        // B. subtilis has no OVO reads and is filtered out
        assert!(results.classified.row("Bacillus subtilis").is_none());
        let species: Vec<_> = results.curve.pair("species", "kmer count").collect();
        assert_eq!(species.len(), 1);
        assert!(results.curve.failures.is_empty());

        let kraken_text = results.get_kraken_assignments().unwrap();
        assert_eq!(
            kraken_text,
            "readId\tclassification\tsequence_length\tassignments\nr1\t562\t150\t5:5 7:3\n"
        );
        assert!(results.get_true_assigned_per_rank().is_none());
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_evaluate_unknown_species_is_fatal() {
        let dir = fixture_dir("unknown");
        let lineage = dir.join("lineage.tsv");
        let assignment = dir.join("per_taxon.tsv");
        fs::write(&lineage, LINEAGE).unwrap();
        fs::write(&assignment, SAMPLE_TABLE).unwrap();

        let err = evaluate(&lineage, &assignment, &["Homo sapiens"], &EvalConfig::default())
            .err()
            .expect("unknown species must fail");
        assert!(matches!(err, EvalError::NotFound(_)));
        fs::remove_dir_all(&dir).ok();
    }
}
