//! Tab-separated tree persistence.
//!
//! A finalized tree is flattened breadth-first into a row-oriented text
//! record: a header line, then one line per node with columns
//! `n leaf Attr Attr_val Node_wei Node_loss left right`. Internal nodes
//! print the external feature name (via a caller-supplied name map) and
//! their children's output indices; leaves print a `None` sentinel and zero
//! child indices. Numeric columns are written with three decimals.
//!
//! The reader reconstructs topology, split rules, instance counts, weights
//! and losses from the same layout. Gradient/hessian sums and split gains
//! are not part of the record and come back as zero.

use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use thiserror::Error;

use crate::repr::{NodeId, NodeSplit, SplitRule, Tree, TreeNode, TreeValidationError, ROOT};

/// Largest node count the tabular record represents.
///
/// Generous bound derived from the leaf budget (a full tree under the
/// historical 1000-leaf cap). Exceeding it is reported, never silently
/// truncated.
pub const MAX_PERSISTED_NODES: usize = 1999;

/// Header line of the persisted record.
pub const HEADER: &str = "n\tleaf\tAttr\tAttr_val\tNode_wei\tNode_loss\tleft\tright";

/// Feature/threshold sentinel printed for leaves.
const LEAF_SENTINEL: &str = "None";

/// Flag column values: internal nodes persist as 0, leaves as 1.
const FLAG_INTERNAL: u32 = 0;
const FLAG_LEAF: u32 = 1;

/// Persistence errors, for both directions.
#[derive(Debug, Error)]
pub enum PersistError {
    /// Destination or source could not be used.
    #[error(transparent)]
    Io(#[from] io::Error),

    /// The tree exceeds the representable node count.
    #[error("tree has {n_nodes} nodes, more than the representable {max}")]
    TooManyNodes { n_nodes: usize, max: usize },

    /// An internal node's feature has no entry in the name map.
    #[error("feature {feature} has no entry in the name map ({n_names} names)")]
    MissingFeatureName { feature: u32, n_names: usize },

    /// A record line could not be parsed.
    #[error("line {line}: {message}")]
    Parse { line: usize, message: String },

    /// A record names a feature absent from the name map.
    #[error("line {line}: unknown feature name {name:?}")]
    UnknownFeature { line: usize, name: String },

    /// The parsed record does not describe a well-formed tree.
    #[error("persisted record is not a well-formed tree: {0:?}")]
    InvalidStructure(TreeValidationError),
}

/// Write `tree` to `out` in the tabular layout.
///
/// # Errors
///
/// [`PersistError::TooManyNodes`] before anything is written if the tree
/// exceeds [`MAX_PERSISTED_NODES`]; [`PersistError::MissingFeatureName`] if
/// an internal node's feature is absent from `feature_names`; I/O errors
/// pass through.
pub fn write_tsv<W: Write>(
    tree: &Tree,
    mut out: W,
    feature_names: &[&str],
) -> Result<(), PersistError> {
    if tree.n_nodes() > MAX_PERSISTED_NODES {
        return Err(PersistError::TooManyNodes {
            n_nodes: tree.n_nodes(),
            max: MAX_PERSISTED_NODES,
        });
    }

    writeln!(out, "{HEADER}")?;

    // Breadth-first over a growable queue; a node's output index is its
    // queue position.
    let mut queue: Vec<NodeId> = vec![ROOT];
    let mut i = 0;
    while i < queue.len() {
        let node = tree.node(queue[i]);
        i += 1;

        match &node.split {
            Some(split) => {
                let feature = split.rule.feature;
                let name = feature_names.get(feature as usize).ok_or(
                    PersistError::MissingFeatureName {
                        feature,
                        n_names: feature_names.len(),
                    },
                )?;
                let left = queue.len();
                queue.push(split.left);
                let right = queue.len();
                queue.push(split.right);
                writeln!(
                    out,
                    "{}\t{}\t{}\t{:.3}\t{:.3}\t{:.3}\t{}\t{}",
                    node.n_instances,
                    FLAG_INTERNAL,
                    name,
                    split.rule.threshold,
                    node.weight,
                    node.loss,
                    left,
                    right
                )?;
            }
            None => {
                writeln!(
                    out,
                    "{}\t{}\t{s}\t{s}\t{:.3}\t{:.3}\t0\t0",
                    node.n_instances,
                    FLAG_LEAF,
                    node.weight,
                    node.loss,
                    s = LEAF_SENTINEL
                )?;
            }
        }
    }

    Ok(())
}

/// Write `tree` to a file at `path`.
///
/// # Errors
///
/// An unopenable destination is reported as [`PersistError::Io`]; see
/// [`write_tsv`] for the rest.
pub fn save<P: AsRef<Path>>(
    tree: &Tree,
    path: P,
    feature_names: &[&str],
) -> Result<(), PersistError> {
    let file = File::create(path)?;
    let mut out = BufWriter::new(file);
    write_tsv(tree, &mut out, feature_names)?;
    out.flush()?;
    Ok(())
}

/// Read a tree from the tabular layout.
///
/// `feature_names` must be the same map used when writing; feature columns
/// are resolved back to indices through it.
///
/// # Errors
///
/// [`PersistError::Parse`] for malformed lines,
/// [`PersistError::UnknownFeature`] for unmapped feature names,
/// [`PersistError::InvalidStructure`] if the record does not describe a
/// tree.
pub fn read_tsv<R: BufRead>(input: R, feature_names: &[&str]) -> Result<Tree, PersistError> {
    let mut lines = input.lines();

    let header = lines.next().transpose()?.unwrap_or_default();
    if header != HEADER {
        return Err(PersistError::Parse {
            line: 1,
            message: "missing or malformed header".into(),
        });
    }

    let mut nodes = Vec::new();
    for (i, line) in lines.enumerate() {
        let line_no = i + 2;
        let line = line?;
        if line.is_empty() {
            continue;
        }
        nodes.push(parse_record(&line, line_no, feature_names)?);
    }

    let tree_nodes: Vec<TreeNode> = nodes
        .iter()
        .map(|record| TreeNode {
            n_instances: record.n_instances,
            depth: 0,
            sum_grad: 0.0,
            sum_hess: 0.0,
            weight: record.weight,
            loss: record.loss,
            split: record.split.clone(),
        })
        .collect();

    let tree = Tree::from_nodes(tree_nodes);
    tree.validate().map_err(PersistError::InvalidStructure)?;

    // Depths are not persisted; rebuild them from the topology.
    let mut nodes = tree.nodes().to_vec();
    let mut stack = vec![(ROOT, 0u32)];
    while let Some((id, depth)) = stack.pop() {
        nodes[id as usize].depth = depth;
        if let Some(split) = &nodes[id as usize].split {
            stack.push((split.left, depth + 1));
            stack.push((split.right, depth + 1));
        }
    }

    Ok(Tree::from_nodes(nodes))
}

/// Read a tree from a file at `path`.
pub fn load<P: AsRef<Path>>(path: P, feature_names: &[&str]) -> Result<Tree, PersistError> {
    read_tsv(BufReader::new(File::open(path)?), feature_names)
}

struct Record {
    n_instances: u32,
    weight: f64,
    loss: f64,
    split: Option<NodeSplit>,
}

fn parse_record(line: &str, line_no: usize, feature_names: &[&str]) -> Result<Record, PersistError> {
    let parse_err = |message: String| PersistError::Parse {
        line: line_no,
        message,
    };

    let fields: Vec<&str> = line.split('\t').collect();
    if fields.len() != 8 {
        return Err(parse_err(format!("expected 8 columns, got {}", fields.len())));
    }

    let n_instances: u32 = fields[0]
        .parse()
        .map_err(|_| parse_err(format!("bad instance count {:?}", fields[0])))?;
    let flag: u32 = fields[1]
        .parse()
        .map_err(|_| parse_err(format!("bad leaf flag {:?}", fields[1])))?;
    let weight: f64 = fields[4]
        .parse()
        .map_err(|_| parse_err(format!("bad weight {:?}", fields[4])))?;
    let loss: f64 = fields[5]
        .parse()
        .map_err(|_| parse_err(format!("bad loss {:?}", fields[5])))?;

    let split = match flag {
        FLAG_LEAF => None,
        FLAG_INTERNAL => {
            let name = fields[2];
            let feature = feature_names
                .iter()
                .position(|&n| n == name)
                .ok_or_else(|| PersistError::UnknownFeature {
                    line: line_no,
                    name: name.to_string(),
                })? as u32;
            let threshold: f32 = fields[3]
                .parse()
                .map_err(|_| parse_err(format!("bad threshold {:?}", fields[3])))?;
            let left: NodeId = fields[6]
                .parse()
                .map_err(|_| parse_err(format!("bad left child {:?}", fields[6])))?;
            let right: NodeId = fields[7]
                .parse()
                .map_err(|_| parse_err(format!("bad right child {:?}", fields[7])))?;
            Some(NodeSplit {
                rule: SplitRule { feature, threshold },
                gain: 0.0,
                left,
                right,
            })
        }
        other => return Err(parse_err(format!("bad leaf flag {other}"))),
    };

    Ok(Record {
        n_instances,
        weight,
        loss,
        split,
    })
}
