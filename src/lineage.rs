//src/lineage.rs

use std::io::BufRead;
use std::path::Path;

use ahash::AHashMap;

use crate::error::{EvalError, Result};
use crate::reader::{open_table, split_fields};

/// One row of a lineage file:
/// ```text
/// <parent_id>\t<node_id>\t<rank>\t<label>\t<kmers_in_database>
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct LineageRecord {
    pub parent_id: u32,
    pub node_id: u32,
    pub rank: String,
    pub label: String,
    pub kmers_in_database: u64,
}

/// A taxon in the lineage tree. Parents own their children by id; the
/// `parent` field is a back-link used for traversal only.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: u32,
    pub label: String,
    pub rank: String,
    pub parent: Option<u32>,
    pub children: Vec<u32>,
    pub kmers_in_database: u64,
}

/// Rooted taxonomy stored as an arena keyed by node id.
#[derive(Debug, Clone)]
pub struct LineageTree {
    nodes: AHashMap<u32, Node>,
    /// Node ids in insertion order (parents before descendants)
    order: Vec<u32>,
    /// label -> id of the first node inserted with that label
    label_index: AHashMap<String, u32>,
    root: u32,
}

impl LineageTree {
    /// Build the tree from records in parent-before-child order.
    /// The first record is the root and its `parent_id` is ignored.
    pub fn build<I>(records: I) -> Result<Self>
    where
        I: IntoIterator<Item = LineageRecord>,
    {
        let mut records = records.into_iter();
        let first = records
            .next()
            .ok_or_else(|| EvalError::MalformedTree("no lineage records".to_string()))?;

        let root = first.node_id;
        let mut tree = LineageTree {
            nodes: AHashMap::new(),
            order: Vec::new(),
            label_index: AHashMap::new(),
            root,
        };
        tree.insert(first, None)?;

        for record in records {
            if !tree.nodes.contains_key(&record.parent_id) {
                return Err(EvalError::MalformedTree(format!(
                    "node {} references parent {} before it was defined",
                    record.node_id, record.parent_id
                )));
            }
            let parent_id = record.parent_id;
            let node_id = record.node_id;
            tree.insert(record, Some(parent_id))?;
            if let Some(parent) = tree.nodes.get_mut(&parent_id) {
                parent.children.push(node_id);
            }
        }

        Ok(tree)
    }

    fn insert(&mut self, record: LineageRecord, parent: Option<u32>) -> Result<()> {
        if self.nodes.contains_key(&record.node_id) {
            return Err(EvalError::MalformedTree(format!(
                "duplicate node id {}",
                record.node_id
            )));
        }
        self.label_index
            .entry(record.label.clone())
            .or_insert(record.node_id);
        self.order.push(record.node_id);
        self.nodes.insert(
            record.node_id,
            Node {
                id: record.node_id,
                label: record.label,
                rank: record.rank,
                parent,
                children: Vec::new(),
                kmers_in_database: record.kmers_in_database,
            },
        );
        Ok(())
    }

    pub fn root(&self) -> &Node {
        &self.nodes[&self.root]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// All nodes in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.order.iter().filter_map(move |id| self.nodes.get(id))
    }

    pub fn node(&self, id: u32) -> Result<&Node> {
        self.nodes
            .get(&id)
            .ok_or_else(|| EvalError::NotFound(format!("node id {id}")))
    }

    /// First node inserted with `label`. Duplicate labels are not rejected,
    /// later occurrences are only reachable by id.
    pub fn find_by_label(&self, label: &str) -> Result<&Node> {
        let id = self
            .label_index
            .get(label)
            .ok_or_else(|| EvalError::NotFound(format!("label '{label}'")))?;
        self.node(*id)
    }

    pub fn id_of(&self, label: &str) -> Result<u32> {
        self.find_by_label(label).map(|n| n.id)
    }

    pub fn rank_of(&self, id: u32) -> Result<&str> {
        self.node(id).map(|n| n.rank.as_str())
    }

    pub fn label_of(&self, id: u32) -> Result<&str> {
        self.node(id).map(|n| n.label.as_str())
    }

    pub fn children(&self, id: u32) -> Result<impl Iterator<Item = &Node>> {
        let node = self.node(id)?;
        Ok(node.children.iter().filter_map(move |c| self.nodes.get(c)))
    }

    /// Nodes from `id` up to and including the root.
    pub fn path_to_root(&self, id: u32) -> Result<Vec<&Node>> {
        let mut path = Vec::new();
        let mut current = Some(self.node(id)?);
        while let Some(node) = current {
            path.push(node);
            current = match node.parent {
                Some(p) => Some(self.node(p)?),
                None => None,
            };
        }
        Ok(path)
    }

    /// Number of edges between `id` and the root.
    pub fn depth(&self, id: u32) -> Result<usize> {
        Ok(self.path_to_root(id)?.len() - 1)
    }
}

/// Parses a lineage file from any reader. The first line is a header and
/// the first data row is the root.
pub fn parse_lineage<R: BufRead>(reader: R) -> Result<Vec<LineageRecord>> {
    let mut records = Vec::new();

    for (idx, line_result) in reader.lines().enumerate() {
        let line = line_result?;
        let line_no = idx + 1;
        if idx == 0 || line.trim().is_empty() {
            continue;
        }

        let parts = split_fields(&line);
        if parts.len() < 5 {
            return Err(EvalError::parse(
                line_no,
                format!("expected 5 fields, found {}", parts.len()),
            ));
        }

        // the root's parent column carries no meaning
        let parent_id = if records.is_empty() {
            parts[0].trim().parse::<u32>().unwrap_or(0)
        } else {
            parts[0]
                .trim()
                .parse::<u32>()
                .map_err(|_| {
                    EvalError::parse(line_no, format!("invalid parent id '{}'", parts[0]))
                })?
        };
        let node_id = parts[1]
            .trim()
            .parse::<u32>()
            .map_err(|_| EvalError::parse(line_no, format!("invalid node id '{}'", parts[1])))?;
        let kmers_in_database = parts[4]
            .trim()
            .parse::<u64>()
            .map_err(|_| EvalError::parse(line_no, format!("invalid k-mer count '{}'", parts[4])))?;

        records.push(LineageRecord {
            parent_id,
            node_id,
            rank: parts[2].trim().to_string(),
            label: parts[3].trim().to_string(),
            kmers_in_database,
        });
    }
    Ok(records)
}

/// Reads and builds the lineage tree stored at `filepath`.
pub fn read_lineage_file<P: AsRef<Path>>(filepath: P) -> Result<LineageTree> {
    let records = parse_lineage(open_table(filepath)?)?;
    let tree = LineageTree::build(records)?;
    log::info!("Loaded lineage tree with {} nodes", tree.len());
    Ok(tree)
}
