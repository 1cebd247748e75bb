//src/types.rs

/// A structured representation of one kraken per-read output line, with the
/// k-mer hit list aggregated per taxon.
/// For example:
///  C  read_1  562  150  562:10 -:- 561:4 562:3
#[derive(Debug, Clone, PartialEq)]
pub struct KrakenAssignment {
    pub read_id: String,
    pub classification: u32,
    pub sequence_length: String,          // "148|150" for read pairs
    pub assignments: Vec<(u32, u64)>,      // (taxon, k-mer hits), most hits first
}

/// One read of a raw assignment table.
#[derive(Debug, Clone, PartialEq)]
pub struct RawAssignment {
    pub read_id: String,
    pub assignment: String,
}

/// One read of a per-read assignment table, reduced to the assigned taxon.
#[derive(Debug, Clone, PartialEq)]
pub struct PerReadAssignment {
    pub read_id: String,
    pub taxon_id: u32,
}

/// The three per-read inputs, assembled after every loader has finished.
#[derive(Debug, Clone, Default)]
pub struct LoadedAssignments {
    pub kraken: Vec<KrakenAssignment>,
    pub raw: Vec<RawAssignment>,
    pub per_read: Vec<PerReadAssignment>,
}
