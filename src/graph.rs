//! Graph model (C1): oriented node positions, the canonical-pair function,
//! the sequence graph itself, walk paths, and the sequence-graph text codec.
//!
//! Grounded on `AssembleByAlignment.cpp`'s `NodePos`/`canon`/`GfaGraph` usage
//! and, for Rust module texture, on `yvlaere-OLC_assembler`'s
//! `create_overlap_graph.rs` (struct shape, `add_edge`/`sort_edges` style).

use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path as FsPath;

use serde::{Deserialize, Serialize};

use crate::errors::{AssemblyError, Result};

/// An oriented endpoint of a node: `id` is the stable node identifier, `end`
/// is `true` for the forward endpoint and `false` for the reverse one.
/// Ordering is lexicographic on `(id, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodePos {
    pub id: usize,
    pub end: bool,
}

impl NodePos {
    pub fn new(id: usize, end: bool) -> Self {
        NodePos { id, end }
    }

    pub fn reverse(self) -> NodePos {
        NodePos { id: self.id, end: !self.end }
    }
}

impl fmt::Display for NodePos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.id, if self.end { '+' } else { '-' })
    }
}

/// Canonical key for an undirected-in-orientation edge between two oriented
/// endpoints. See SPEC_FULL.md §3.
pub fn canon(left: NodePos, right: NodePos) -> (NodePos, NodePos) {
    if left.id == right.id {
        if !left.end && !right.end {
            return (right.reverse(), left.reverse());
        }
        return (left, right);
    }
    if left < right {
        (left, right)
    } else {
        (right.reverse(), left.reverse())
    }
}

/// A read or walk over the graph, identified by name. Never mutated after
/// loading.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Path {
    pub name: String,
    pub position: Vec<NodePos>,
}

/// The sequence graph itself. Node sequences are stored forward-oriented;
/// edges are keyed by their oriented source endpoint.
#[derive(Debug, Clone, Default)]
pub struct GfaGraph {
    pub nodes: HashMap<usize, String>,
    pub edges: HashMap<NodePos, Vec<NodePos>>,
    pub edge_overlap: usize,
    pub varying_overlaps: HashMap<(NodePos, NodePos), usize>,
    pub tags: HashMap<usize, String>,
    pub edge_tags: HashMap<(NodePos, NodePos), String>,
}

impl GfaGraph {
    pub fn new(edge_overlap: usize) -> Self {
        GfaGraph {
            edge_overlap,
            ..Default::default()
        }
    }

    pub fn add_edge(&mut self, from: NodePos, to: NodePos) {
        let list = self.edges.entry(from).or_default();
        if !list.contains(&to) {
            list.push(to);
        }
    }

    pub fn remove_edge(&mut self, from: NodePos, to: NodePos) {
        if let Some(list) = self.edges.get_mut(&from) {
            if let Some(pos) = list.iter().position(|t| *t == to) {
                list.swap_remove(pos);
            }
        }
    }

    /// Ensure every edge `(u, v)` has its reverse `(v.reverse(), u.reverse())`
    /// present too, per the "doubly-sided edges" invariant. Mirrors the
    /// reference `graph.confirmDoublesidedEdges()` load-time pass.
    pub fn confirm_doublesided_edges(&mut self) {
        let missing: Vec<(NodePos, NodePos)> = self
            .edges
            .iter()
            .flat_map(|(&from, tos)| tos.iter().map(move |&to| (from, to)))
            .filter(|&(from, to)| {
                let rev_from = to.reverse();
                let rev_to = from.reverse();
                !self
                    .edges
                    .get(&rev_from)
                    .map(|list| list.contains(&rev_to))
                    .unwrap_or(false)
            })
            .collect();
        for (from, to) in missing {
            self.add_edge(to.reverse(), from.reverse());
        }
    }

    /// Reverse-complement-aware sequence lookup for an oriented node.
    pub fn oriented_sequence(&self, pos: NodePos) -> Option<String> {
        let seq = self.nodes.get(&pos.id)?;
        Some(if pos.end { seq.clone() } else { crate::utils::reverse_complement(seq) })
    }
}

/// Load the text sequence-graph format (§6): a header line giving the
/// default overlap, `S` segment lines, and `L` link lines.
pub fn load_graph(path: &FsPath) -> Result<GfaGraph> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let mut graph = GfaGraph::new(0);
    for line in reader.lines() {
        let line = line?;
        if line.is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split('\t').collect();
        match fields[0] {
            "H" => {
                graph.edge_overlap = fields.get(1).and_then(|v| v.parse().ok()).unwrap_or(0);
            }
            "S" => {
                if fields.len() < 3 {
                    return Err(AssemblyError::Invariant(format!(
                        "malformed segment line: {line}"
                    )));
                }
                let id: usize = fields[1]
                    .parse()
                    .map_err(|_| AssemblyError::Invariant(format!("bad node id: {line}")))?;
                graph.nodes.insert(id, fields[2].to_string());
                if fields.len() > 3 && !fields[3].is_empty() {
                    graph.tags.insert(id, fields[3].to_string());
                }
            }
            "L" => {
                if fields.len() < 6 {
                    return Err(AssemblyError::Invariant(format!("malformed link line: {line}")));
                }
                let from_id: usize = fields[1]
                    .parse()
                    .map_err(|_| AssemblyError::Invariant(format!("bad edge from-id: {line}")))?;
                let from_end = fields[2] == "+";
                let to_id: usize = fields[3]
                    .parse()
                    .map_err(|_| AssemblyError::Invariant(format!("bad edge to-id: {line}")))?;
                let to_end = fields[4] == "+";
                let overlap: usize = fields[5]
                    .parse()
                    .map_err(|_| AssemblyError::Invariant(format!("bad overlap: {line}")))?;
                let from = NodePos::new(from_id, from_end);
                let to = NodePos::new(to_id, to_end);
                graph.add_edge(from, to);
                if overlap != graph.edge_overlap {
                    graph.varying_overlaps.insert((from, to), overlap);
                }
                if fields.len() > 6 && !fields[6].is_empty() {
                    graph.edge_tags.insert((from, to), fields[6].to_string());
                }
            }
            other => {
                log::warn!("ignoring unrecognized graph line type {other:?}");
            }
        }
    }
    Ok(graph)
}

pub fn save_graph(graph: &GfaGraph, path: &FsPath) -> Result<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    writeln!(writer, "H\t{}", graph.edge_overlap)?;
    let mut node_ids: Vec<&usize> = graph.nodes.keys().collect();
    node_ids.sort_unstable();
    for id in node_ids {
        let seq = &graph.nodes[id];
        match graph.tags.get(id) {
            Some(tag) => writeln!(writer, "S\t{id}\t{seq}\t{tag}")?,
            None => writeln!(writer, "S\t{id}\t{seq}")?,
        }
    }
    let mut edge_keys: Vec<&NodePos> = graph.edges.keys().collect();
    edge_keys.sort_unstable();
    for from in edge_keys {
        for to in &graph.edges[from] {
            let overlap = graph
                .varying_overlaps
                .get(&(*from, *to))
                .copied()
                .unwrap_or(graph.edge_overlap);
            let from_c = if from.end { '+' } else { '-' };
            let to_c = if to.end { '+' } else { '-' };
            match graph.edge_tags.get(&(*from, *to)) {
                Some(tag) => writeln!(
                    writer,
                    "L\t{}\t{from_c}\t{}\t{to_c}\t{overlap}\t{tag}",
                    from.id, to.id
                )?,
                None => writeln!(writer, "L\t{}\t{from_c}\t{}\t{to_c}\t{overlap}", from.id, to.id)?,
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canon_is_symmetric_under_reverse() {
        let a = NodePos::new(1, true);
        let b = NodePos::new(2, false);
        assert_eq!(canon(a, b), canon(b.reverse(), a.reverse()));
    }

    #[test]
    fn canon_is_idempotent() {
        let a = NodePos::new(3, false);
        let b = NodePos::new(1, true);
        let (c1, c2) = canon(a, b);
        assert_eq!(canon(c1, c2), (c1, c2));
    }

    #[test]
    fn canon_same_node_both_reverse_flips() {
        let a = NodePos::new(5, false);
        let b = NodePos::new(5, false);
        assert_eq!(canon(a, b), (b.reverse(), a.reverse()));
    }

    #[test]
    fn doubly_sided_edges_get_mirrored() {
        let mut g = GfaGraph::new(5);
        g.nodes.insert(1, "ACGT".to_string());
        g.nodes.insert(2, "TTTT".to_string());
        g.add_edge(NodePos::new(1, true), NodePos::new(2, true));
        g.confirm_doublesided_edges();
        assert!(g.edges[&NodePos::new(2, false)].contains(&NodePos::new(1, false)));
    }
}
