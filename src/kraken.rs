// src/kraken.rs

use std::io::BufRead;
use std::path::Path;

use ahash::AHashMap;

use crate::error::{EvalError, Result};
use crate::reader::{open_table, split_fields};
use crate::types::{KrakenAssignment, LoadedAssignments, PerReadAssignment, RawAssignment};

/// Marks a k-mer without any database hit.
const UNASSIGNED: &str = "-:-";
/// Separates the two mates of a paired-end read.
const MATE_SEPARATOR: &str = "|:|";

/// Sum `taxon:count` pairs per taxon, highest count first. Taxa with equal
/// counts stay in order of first appearance.
pub fn aggregate_assignments(
    assignment_string: &str,
) -> std::result::Result<Vec<(u32, u64)>, String> {
    let mut totals: Vec<(u32, u64)> = Vec::new();
    let mut position: AHashMap<u32, usize> = AHashMap::new();

    for assignment in assignment_string.split_whitespace() {
        if assignment == UNASSIGNED || assignment == MATE_SEPARATOR {
            continue;
        }
        let (taxon, count) = assignment
            .split_once(':')
            .ok_or_else(|| format!("malformed assignment '{assignment}'"))?;
        let taxon: u32 = taxon
            .parse()
            .map_err(|_| format!("invalid taxon id in '{assignment}'"))?;
        let count: u64 = count
            .parse()
            .map_err(|_| format!("invalid count in '{assignment}'"))?;

        match position.get(&taxon) {
            Some(&i) => {
                totals[i].1 = totals[i]
                    .1
                    .checked_add(count)
                    .ok_or_else(|| format!("count overflow in '{assignment}'"))?;
            }
            None => {
                position.insert(taxon, totals.len());
                totals.push((taxon, count));
            }
        }
    }

    totals.sort_by(|a, b| b.1.cmp(&a.1));
    Ok(totals)
}

/// Render aggregated assignments back into `taxon:count` form.
pub fn serialize_assignments(assignments: &[(u32, u64)]) -> String {
    assignments
        .iter()
        .map(|(taxon, count)| format!("{taxon}:{count}"))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Parses kraken per-read output (no header):
/// ```text
/// <tag>\t<readId>\t<classification>\t<sequence_length>\t<assignments>
/// ```
pub fn parse_kraken_assignment<R: BufRead>(reader: R) -> Result<Vec<KrakenAssignment>> {
    let mut reads = Vec::new();
    for (idx, line_result) in reader.lines().enumerate() {
        let line = line_result?;
        let line_no = idx + 1;
        if line.trim().is_empty() {
            continue;
        }
        let parts = split_fields(&line);
        if parts.len() < 5 {
            return Err(EvalError::parse(
                line_no,
                format!("expected 5 fields, found {}", parts.len()),
            ));
        }
        let classification = parts[2].trim().parse::<u32>().map_err(|_| {
            EvalError::parse(line_no, format!("invalid classification '{}'", parts[2]))
        })?;
        let assignments =
            aggregate_assignments(parts[4]).map_err(|msg| EvalError::parse(line_no, msg))?;

        reads.push(KrakenAssignment {
            read_id: parts[1].to_string(),
            classification,
            sequence_length: parts[3].to_string(),
            assignments,
        });
    }
    Ok(reads)
}

/// Parses a raw assignment: a header row, then `<readId>\t<assignment>`.
pub fn parse_raw_assignment<R: BufRead>(reader: R) -> Result<Vec<RawAssignment>> {
    let mut reads = Vec::new();
    for (idx, line_result) in reader.lines().enumerate() {
        let line = line_result?;
        if idx == 0 || line.trim().is_empty() {
            continue;
        }
        let parts = split_fields(&line);
        if parts.len() < 2 {
            return Err(EvalError::parse(idx + 1, "expected read id and assignment"));
        }
        reads.push(RawAssignment {
            read_id: parts[0].to_string(),
            assignment: parts[1].to_string(),
        });
    }
    Ok(reads)
}

/// Taxon id from an assignment such as `Escherichia coli (562)`.
fn taxon_from_assignment(assignment: &str) -> Option<u32> {
    let last = assignment.split(' ').last()?;
    last.strip_prefix('(')?.strip_suffix(')')?.parse().ok()
}

/// Parses a per-read assignment: a summary line, a header row, then rows of
/// `<readId>\t<assignment ending in (taxonId)>`.
pub fn parse_per_read_assignment<R: BufRead>(reader: R) -> Result<Vec<PerReadAssignment>> {
    let mut reads = Vec::new();
    for (idx, line_result) in reader.lines().enumerate() {
        let line = line_result?;
        let line_no = idx + 1;
        if idx < 2 || line.trim().is_empty() {
            continue;
        }
        let parts = split_fields(&line);
        if parts.len() < 2 {
            return Err(EvalError::parse(line_no, "expected read id and assignment"));
        }
        let taxon_id = taxon_from_assignment(parts[1].trim()).ok_or_else(|| {
            EvalError::parse(line_no, format!("no taxon id in '{}'", parts[1]))
        })?;
        reads.push(PerReadAssignment {
            read_id: parts[0].to_string(),
            taxon_id,
        });
    }
    Ok(reads)
}

pub fn read_kraken_assignment<P: AsRef<Path>>(path: P) -> Result<Vec<KrakenAssignment>> {
    parse_kraken_assignment(open_table(path)?)
}

pub fn read_raw_assignment<P: AsRef<Path>>(path: P) -> Result<Vec<RawAssignment>> {
    parse_raw_assignment(open_table(path)?)
}

pub fn read_per_read_assignment<P: AsRef<Path>>(path: P) -> Result<Vec<PerReadAssignment>> {
    parse_per_read_assignment(open_table(path)?)
}

fn tag_load<T>(source_name: &'static str, result: Result<T>) -> Result<T> {
    result.map_err(|e| EvalError::Load {
        source_name,
        error: Box::new(e),
    })
}

/// Load the kraken output, raw assignment and per-read assignment concurrently.
/// Each loader owns its result; they are combined once all three finish.
pub fn load_assignments<P, Q, S>(
    kraken_path: P,
    raw_path: Q,
    per_read_path: S,
) -> Result<LoadedAssignments>
where
    P: AsRef<Path> + Sync,
    Q: AsRef<Path> + Sync,
    S: AsRef<Path> + Sync,
{
    let (kraken, (raw, per_read)) = rayon::join(
        || {
            log::info!("Start reading kraken assignment");
            read_kraken_assignment(&kraken_path)
        },
        || {
            rayon::join(
                || {
                    log::info!("Start reading raw assignment");
                    read_raw_assignment(&raw_path)
                },
                || {
                    log::info!("Start reading per read assignment");
                    read_per_read_assignment(&per_read_path)
                },
            )
        },
    );

    let loaded = LoadedAssignments {
        kraken: tag_load("kraken assignment", kraken)?,
        raw: tag_load("raw assignment", raw)?,
        per_read: tag_load("per read assignment", per_read)?,
    };
    log::info!(
        "Loaded {} kraken, {} raw and {} per read assignments",
        loaded.kraken.len(),
        loaded.raw.len(),
        loaded.per_read.len()
    );
    Ok(loaded)
}
