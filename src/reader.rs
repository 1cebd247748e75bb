use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use flate2::read::MultiGzDecoder;

use crate::error::Result;

/// Open a tab-separated input for line reading, decompressing `.gz` files.
pub fn open_table<P: AsRef<Path>>(path: P) -> Result<Box<dyn BufRead + Send>> {
    let path = path.as_ref();
    let f = File::open(path)?;

    let is_gz = path
        .extension()
        .map(|ext| ext == "gz")
        .unwrap_or(false);

    let reader: Box<dyn BufRead + Send> = if is_gz {
        Box::new(BufReader::new(MultiGzDecoder::new(f)))
    } else {
        Box::new(BufReader::new(f))
    };
    Ok(reader)
}

/// Split a line on tabs, dropping the trailing newline.
pub(crate) fn split_fields(line: &str) -> Vec<&str> {
    line.trim_end_matches(&['\n', '\r'][..]).split('\t').collect()
}
