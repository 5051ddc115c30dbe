//! Graph emitter and walk remapper (C7).
//!
//! Grounded on `AssembleByAlignment.cpp`'s `getGraph` (per-closure node
//! emission with synthetic tags) and `outputRemappedReads` (subpath
//! splitting on missing closures/edges).

use std::collections::HashMap;

use crate::closure::ClassOf;
use crate::closure_edges::{representative_nodes, EdgeCoverage};
use crate::graph::{canon, GfaGraph, NodePos, Path};

fn class_pos(entry: Option<(usize, bool)>) -> Option<NodePos> {
    entry.map(|(id, end)| NodePos::new(id, end))
}

/// Picks the canonical forward-oriented sequence for a doublestrand class:
/// the representative map already stores the `+`-normalized node for every
/// class id that occurred at all.
fn forward_sequence(
    ds_id: usize,
    representative: &HashMap<usize, NodePos>,
    original: &GfaGraph,
) -> Option<(String, NodePos)> {
    let &pos = representative.get(&ds_id)?;
    original.oriented_sequence(pos).map(|s| (s, pos))
}

/// `getGraph`: emits one node per surviving doublestrand class with synthetic
/// tags, and one link per surviving closure edge.
pub fn get_graph(
    original: &GfaGraph,
    paths: &[Path],
    class_of: &ClassOf,
    edge_overlaps: &HashMap<(NodePos, NodePos), usize>,
) -> GfaGraph {
    let representative = representative_nodes(paths, class_of);

    let mut coverage_count: HashMap<usize, usize> = HashMap::new();
    for per_step in class_of {
        for entry in per_step.iter().flatten() {
            *coverage_count.entry(entry.0).or_insert(0) += 1;
        }
    }

    let mut new_graph = GfaGraph::new(original.edge_overlap);
    let mut ds_ids: Vec<usize> = coverage_count.keys().copied().collect();
    ds_ids.sort_unstable();
    for ds_id in ds_ids {
        let Some((seq, rep_pos)) = forward_sequence(ds_id, &representative, original) else {
            continue;
        };
        let coverage = coverage_count[&ds_id];
        let trimmed_len = seq.len().saturating_sub(original.edge_overlap);
        new_graph.nodes.insert(ds_id, seq);
        new_graph.tags.insert(
            ds_id,
            format!(
                "LN:i:{}\tRC:i:{}\tkm:f:{}\toi:Z:{}",
                trimmed_len,
                trimmed_len * coverage,
                coverage,
                rep_pos
            ),
        );
    }

    for (&(class_u, class_v), &overlap) in edge_overlaps {
        new_graph.add_edge(class_u, class_v);
        if overlap != new_graph.edge_overlap {
            new_graph.varying_overlaps.insert((class_u, class_v), overlap);
        }
    }
    new_graph.confirm_doublesided_edges();
    log::info!(
        "emitted graph: {} nodes, {} edges",
        new_graph.nodes.len(),
        new_graph.edges.values().map(|v| v.len()).sum::<usize>()
    );
    new_graph
}

/// `outputRemappedReads`: translate each walk step by step; split into a new
/// subpath whenever a step's class was dropped, or two consecutive
/// translated steps lack a surviving closure edge.
pub fn remap_walks(paths: &[Path], class_of: &ClassOf, edge_coverage: &EdgeCoverage) -> Vec<Path> {
    let mut result = Vec::new();
    for (p, path) in paths.iter().enumerate() {
        let mut current: Vec<NodePos> = Vec::new();
        let mut subpath_idx = 0usize;
        let mut flush = |current: &mut Vec<NodePos>, subpath_idx: &mut usize, result: &mut Vec<Path>| {
            if !current.is_empty() {
                result.push(Path {
                    name: format!("{}_{}", path.name, subpath_idx),
                    position: std::mem::take(current),
                });
                *subpath_idx += 1;
            }
        };
        for s in 0..path.position.len() {
            match class_pos(class_of[p][s]) {
                None => flush(&mut current, &mut subpath_idx, &mut result),
                Some(pos) => {
                    if let Some(&prev) = current.last() {
                        if !edge_coverage.contains_key(&canon(prev, pos)) {
                            flush(&mut current, &mut subpath_idx, &mut result);
                        }
                    }
                    current.push(pos);
                }
            }
        }
        flush(&mut current, &mut subpath_idx, &mut result);
    }
    log::info!("remapped {} walks into {} subpaths", paths.len(), result.len());
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::NodePos;

    #[test]
    fn remap_walks_splits_on_missing_edge() {
        let path = Path {
            name: "r".to_string(),
            position: vec![NodePos::new(0, true), NodePos::new(1, true), NodePos::new(2, true)],
        };
        let class_of = vec![vec![Some((10, true)), Some((11, true)), Some((12, true))]];
        let mut edge_coverage = EdgeCoverage::new();
        edge_coverage.insert(canon(NodePos::new(10, true), NodePos::new(11, true)), 1);
        // no edge between 11 and 12: should split
        let result = remap_walks(&[path], &class_of, &edge_coverage);
        assert_eq!(result.len(), 2);
        assert_eq!(result[0].name, "r_0");
        assert_eq!(result[0].position.len(), 2);
        assert_eq!(result[1].name, "r_1");
        assert_eq!(result[1].position.len(), 1);
    }

    #[test]
    fn remap_walks_drops_steps_with_no_surviving_class() {
        let path = Path {
            name: "r".to_string(),
            position: vec![NodePos::new(0, true), NodePos::new(1, true), NodePos::new(2, true)],
        };
        let class_of = vec![vec![Some((10, true)), None, Some((12, true))]];
        let edge_coverage = EdgeCoverage::new();
        let result = remap_walks(&[path], &class_of, &edge_coverage);
        assert_eq!(result.len(), 2);
    }
}
