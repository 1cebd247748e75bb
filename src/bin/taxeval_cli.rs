use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use taxeval_rs::config::{
    EvalConfig, PerReadInputs, DEFAULT_KMER_THRESHOLD, DEFAULT_OVO_THRESHOLD,
};
use taxeval_rs::evaluate;
use taxeval_rs::true_taxa::read_species_list;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Evaluate taxonomic read classification against known species",
    long_about = None
)]
struct Args {
    /// Lineage file (parent id, node id, rank, label, kmers in database)
    #[arg(short, long)]
    lineage: PathBuf,

    /// Per-taxon assignment table
    #[arg(short, long)]
    assignment: PathBuf,

    /// File listing the species known to be in the sample, one per line
    #[arg(short, long)]
    species: PathBuf,

    /// Directory for the output tables
    #[arg(short, long, default_value = ".")]
    output_dir: PathBuf,

    /// Score columns to evaluate (default: every algorithm column)
    #[arg(long, value_delimiter = ',')]
    columns: Vec<String>,

    /// Ranks to evaluate (default: the eight standard ranks)
    #[arg(long, value_delimiter = ',')]
    ranks: Vec<String>,

    /// Only evaluate taxa passing the k-mer and OVO thresholds
    #[arg(long)]
    filter: bool,

    #[arg(long, default_value_t = DEFAULT_KMER_THRESHOLD)]
    kmer_threshold: f64,

    #[arg(long, default_value_t = DEFAULT_OVO_THRESHOLD)]
    ovo_threshold: f64,

    /// Total reads of the sample, enables true assigned read rates
    #[arg(long)]
    total_reads: Option<u64>,

    /// Kraken per-read output
    #[arg(long, requires_all = ["raw", "per_read"])]
    kraken: Option<PathBuf>,

    /// Raw read assignment
    #[arg(long, requires = "kraken")]
    raw: Option<PathBuf>,

    /// Per-read assignment
    #[arg(long, requires = "kraken")]
    per_read: Option<PathBuf>,
}

impl Args {
    fn to_config(&self) -> EvalConfig {
        let mut config = EvalConfig {
            kmer_threshold: self.kmer_threshold,
            ovo_threshold: self.ovo_threshold,
            filter_candidates: self.filter,
            score_columns: self.columns.clone(),
            total_reads: self.total_reads,
            ..EvalConfig::default()
        };
        if !self.ranks.is_empty() {
            config.ranks = self.ranks.clone();
        }
        let per_read_paths = (&self.kraken, &self.raw, &self.per_read);
        if let (Some(kraken), Some(raw), Some(per_read)) = per_read_paths {
            config.per_read_inputs = Some(PerReadInputs {
                kraken: kraken.clone(),
                raw: raw.clone(),
                per_read: per_read.clone(),
            });
        }
        config
    }
}

fn spinner(color: &str, msg: &'static str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    let template = format!("{{spinner:.{color}}} {{msg}}");
    if let Ok(style) = ProgressStyle::default_spinner()
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"])
        .template(&template)
    {
        spinner.set_style(style);
    }
    spinner.set_message(msg);
    spinner
}

fn write_output(dir: &Path, name: &str, contents: &str) -> std::io::Result<()> {
    fs::write(dir.join(name), contents)
}

fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    // 1. Ground truth
    let spinner_species = spinner("blue", "Reading species list...");
    let species = read_species_list(&args.species)?;
    spinner_species.finish_with_message(format!("Found {} true species.", species.len()));

    // 2. Evaluation
    let spinner_eval = spinner("green", "Evaluating assignments...");
    let results = evaluate(&args.lineage, &args.assignment, &species, &args.to_config())?;
    spinner_eval.finish_with_message(format!(
        "Evaluated {} taxa, {} curve points, {} skipped pairs.",
        results.classified.len(),
        results.curve.rows.len(),
        results.curve.failures.len()
    ));
    for failure in &results.curve.failures {
        log::warn!("{} / {}: {}", failure.rank, failure.column, failure.error);
    }

    // 3. Outputs
    let spinner_out = spinner("yellow", "Writing output files...");
    fs::create_dir_all(&args.output_dir)?;
    write_output(&args.output_dir, "classified_taxa.tsv", &results.get_classified_table())?;
    write_output(&args.output_dir, "precision_recall.tsv", &results.get_precision_recall())?;
    if let Some(rates) = results.get_true_assigned_per_rank() {
        write_output(&args.output_dir, "true_assigned_per_rank.tsv", &rates)?;
    }
    if let Some(kraken) = results.get_kraken_assignments() {
        write_output(&args.output_dir, "kraken_assignments.tsv", &kraken)?;
    }
    spinner_out.finish_with_message("Output files created.");

    Ok(())
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e}");
            ExitCode::FAILURE
        }
    }
}
