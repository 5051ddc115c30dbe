//! Closure edge builder (C6): primary adjacency, tip bridging, the two-pass
//! chimeric-edge filter, and overlap recovery.
//!
//! Grounded on `AssembleByAlignment.cpp`'s `getClosureEdges`, `bridgeTips`,
//! `removeChimericEdges`, `determineClosureOverlaps`.

use std::collections::{HashMap, HashSet};

use crate::closure::ClassOf;
use crate::graph::{canon, GfaGraph, NodePos, Path};
use crate::utils::longest_overlap;

pub type EdgeCoverage = HashMap<(NodePos, NodePos), usize>;

fn class_pos(entry: Option<(usize, bool)>) -> Option<NodePos> {
    entry.map(|(id, end)| NodePos::new(id, end))
}

/// `getClosureEdges`: walk each path's consecutive surviving steps, tallying
/// coverage per canonical closure-edge key.
pub fn primary_adjacency(paths: &[Path], class_of: &ClassOf) -> EdgeCoverage {
    let mut coverage = EdgeCoverage::new();
    for (p, path) in paths.iter().enumerate() {
        for j in 1..path.position.len() {
            let prev = class_pos(class_of[p][j - 1]);
            let cur = class_pos(class_of[p][j]);
            if let (Some(a), Some(b)) = (prev, cur) {
                *coverage.entry(canon(a, b)).or_insert(0) += 1;
            }
        }
    }
    log::info!("primary closure adjacency: {} edges", coverage.len());
    coverage
}

fn exits(coverage: &EdgeCoverage) -> HashSet<NodePos> {
    let mut set = HashSet::new();
    for &(u, v) in coverage.keys() {
        set.insert(u);
        set.insert(v.reverse());
    }
    set
}

/// `bridgeTips`: a position is a tip if no surviving edge leaves it in the
/// orientation being checked. Walking each path step by step, every
/// position whose *previous* step has no forward exit is an accumulating
/// gap start — never cleared, so a walk can carry more than one open gap
/// at once; every position whose *current* step has no reverse exit (i.e.
/// nothing leads into it) closes against every gap start accumulated so far
/// in that walk, provided at least `min_coverage` distinct walks support the
/// resulting bridge.
pub fn bridge_tips(
    paths: &[Path],
    class_of: &ClassOf,
    coverage: &mut EdgeCoverage,
    min_coverage: usize,
) {
    let has_edge = exits(coverage);
    let mut supporters: HashMap<(NodePos, NodePos), HashSet<usize>> = HashMap::new();

    for (p, path) in paths.iter().enumerate() {
        let mut gap_starts: Vec<usize> = Vec::new();
        for j in 1..path.position.len() {
            if let Some(prev_pos) = class_pos(class_of[p][j - 1]) {
                if !has_edge.contains(&prev_pos) {
                    gap_starts.push(j - 1);
                }
            }
            if let Some(cur_pos) = class_pos(class_of[p][j]) {
                if !has_edge.contains(&cur_pos.reverse()) {
                    for &start in &gap_starts {
                        if let Some(start_pos) = class_pos(class_of[p][start]) {
                            let key = canon(start_pos, cur_pos);
                            supporters.entry(key).or_default().insert(p);
                        }
                    }
                }
            }
        }
    }

    let mut bridged = 0;
    for (key, supporting_paths) in supporters {
        if supporting_paths.len() >= min_coverage {
            coverage.entry(key).or_insert_with(|| {
                bridged += 1;
                supporting_paths.len()
            });
        }
    }
    log::info!("tip bridging: added {bridged} bridge edges");
}

/// `removeChimericEdges`: drop an edge whose coverage is both `<=
/// max_removable_cov` and below `fraction` of the strongest edge at either
/// endpoint.
pub fn remove_chimeric_edges(coverage: &mut EdgeCoverage, max_removable_cov: usize, fraction: f64) {
    let mut max_out: HashMap<NodePos, usize> = HashMap::new();
    for (&(u, v), &cov) in coverage.iter() {
        let entry_u = max_out.entry(u).or_insert(0);
        *entry_u = (*entry_u).max(cov);
        let entry_v = max_out.entry(v.reverse()).or_insert(0);
        *entry_v = (*entry_v).max(cov);
    }

    let to_remove: Vec<(NodePos, NodePos)> = coverage
        .iter()
        .filter(|&(&(u, v), &cov)| {
            if cov > max_removable_cov {
                return false;
            }
            let mu = max_out.get(&u).copied().unwrap_or(0) as f64;
            let mv = max_out.get(&v.reverse()).copied().unwrap_or(0) as f64;
            (cov as f64) < fraction * mu || (cov as f64) < fraction * mv
        })
        .map(|(&k, _)| k)
        .collect();

    for key in &to_remove {
        coverage.remove(key);
    }
    log::info!(
        "chimeric filter (maxRemovableCov={max_removable_cov}, fraction={fraction}): removed {} edges",
        to_remove.len()
    );
}

/// `closureRepresentsNode`: maps each (unsigned) doublestrand class id to the
/// first original node observed with that class, normalized to the `+`
/// orientation. Shared with C7's node emission. Keying by unsigned id (rather
/// than the signed `(id, end)` pair) matters because `canon()` routinely
/// flips a closure-edge pair's orientation, so a lookup for either sign must
/// always resolve as long as the class occurred at all.
pub fn representative_nodes(paths: &[Path], class_of: &ClassOf) -> HashMap<usize, NodePos> {
    let mut representative: HashMap<usize, NodePos> = HashMap::new();
    for (p, path) in paths.iter().enumerate() {
        for (s, &orig) in path.position.iter().enumerate() {
            if let Some((id, sign)) = class_of[p][s] {
                let normalized = if sign { orig } else { orig.reverse() };
                representative.entry(id).or_insert(normalized);
            }
        }
    }
    representative
}

/// Looks up the oriented node representing a signed doublestrand class,
/// re-deriving the `-` orientation from the stored `+` one when needed.
pub fn represented_node(representative: &HashMap<usize, NodePos>, class: NodePos) -> Option<NodePos> {
    representative.get(&class.id).map(|&pos| if class.end { pos } else { pos.reverse() })
}

/// `determineClosureOverlaps`: for every surviving closure edge, recover an
/// overlap length in priority order: stored override, direct graph edge's
/// default overlap, or the longest suffix/prefix match between the
/// represented sequences.
pub fn determine_closure_overlaps(
    coverage: &EdgeCoverage,
    representative: &HashMap<usize, NodePos>,
    graph: &GfaGraph,
) -> HashMap<(NodePos, NodePos), usize> {
    let mut overlaps = HashMap::new();
    for &(class_u, class_v) in coverage.keys() {
        let rep_u = match represented_node(representative, class_u) {
            Some(r) => r,
            None => continue,
        };
        let rep_v = match represented_node(representative, class_v) {
            Some(r) => r,
            None => continue,
        };
        let overlap = if let Some(&o) = graph.varying_overlaps.get(&(rep_u, rep_v)) {
            o
        } else if graph.edges.get(&rep_u).map(|l| l.contains(&rep_v)).unwrap_or(false) {
            graph.edge_overlap
        } else {
            match (graph.oriented_sequence(rep_u), graph.oriented_sequence(rep_v)) {
                (Some(su), Some(sv)) => longest_overlap(&su, &sv, graph.edge_overlap),
                _ => 0,
            }
        };
        overlaps.insert((class_u, class_v), overlap);
    }
    overlaps
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::NodePos;

    fn path_with_classes(len: usize) -> (Path, Vec<Option<(usize, bool)>>) {
        let path = Path {
            name: "w".to_string(),
            position: (0..len).map(|i| NodePos::new(i, true)).collect(),
        };
        let classes = (0..len).map(|i| Some((i, true))).collect();
        (path, classes)
    }

    #[test]
    fn primary_adjacency_counts_consecutive_survivors() {
        let (path, classes) = path_with_classes(3);
        let class_of = vec![classes];
        let coverage = primary_adjacency(&[path], &class_of);
        assert_eq!(coverage.len(), 2);
        for v in coverage.values() {
            assert_eq!(*v, 1);
        }
    }

    #[test]
    fn chimeric_filter_drops_weak_low_coverage_edge() {
        let mut coverage = EdgeCoverage::new();
        let a = NodePos::new(0, true);
        let b = NodePos::new(1, true);
        let c = NodePos::new(2, true);
        let d = NodePos::new(3, true);
        coverage.insert(canon(a, b), 50);
        coverage.insert(canon(b, c), 1);
        // b's strongest out-edge coverage (not just the a-b edge, which only
        // registers against b's reverse orientation) must come from an edge
        // exiting b itself, since `maxOutEdgeCoverage` is tracked per oriented
        // endpoint, matching `removeChimericEdges` (AssembleByAlignment.cpp:955-960).
        coverage.insert(canon(b, d), 50);
        remove_chimeric_edges(&mut coverage, 5, 0.2);
        assert!(!coverage.contains_key(&canon(b, c)));
        assert!(coverage.contains_key(&canon(a, b)));
        assert!(coverage.contains_key(&canon(b, d)));
    }

    /// A walk visiting class 5 then class 2 (both only ever witnessed as
    /// `end=true`) produces the coverage key `((2,false),(5,false))` via
    /// `canon()`'s flip. The representative lookup for both signs of each
    /// class must still resolve.
    #[test]
    fn determine_closure_overlaps_resolves_flipped_canon_keys() {
        let path = Path {
            name: "w".to_string(),
            position: vec![NodePos::new(50, true), NodePos::new(20, true)],
        };
        let class_of = vec![vec![Some((5, true)), Some((2, true))]];
        let representative = representative_nodes(&[path], &class_of);

        let class5 = NodePos::new(5, true);
        let class2 = NodePos::new(2, true);
        let mut coverage = EdgeCoverage::new();
        coverage.insert(canon(class5, class2), 1);
        let (key_u, key_v) = *coverage.keys().next().unwrap();
        // canon() must have flipped this pair, since 2 < 5.
        assert_eq!((key_u, key_v), (NodePos::new(2, false), NodePos::new(5, false)));

        let graph = GfaGraph::new(0);
        let overlaps = determine_closure_overlaps(&coverage, &representative, &graph);
        assert!(overlaps.contains_key(&(key_u, key_v)));
    }

    /// `bridgeTips` (`AssembleByAlignment.cpp:975-1004`) accumulates every
    /// previously-seen exit-tip index without clearing it, so a walk with
    /// more than one tip run still bridges every accumulated start to a
    /// later entry-tip position, not just the nearest one.
    #[test]
    fn bridge_tips_bridges_every_accumulated_gap_start() {
        let (path, classes) = path_with_classes(5);
        let class_of = vec![classes];

        let p0 = NodePos::new(0, true);
        let p2 = NodePos::new(2, true);
        let mut coverage = EdgeCoverage::new();
        coverage.insert((p0, NodePos::new(100, true)), 1);
        coverage.insert((p2, NodePos::new(101, true)), 1);
        coverage.insert((p2.reverse(), NodePos::new(102, true)), 1);

        bridge_tips(&[path], &class_of, &mut coverage, 1);

        let p1 = NodePos::new(1, true);
        let p3 = NodePos::new(3, true);
        let p4 = NodePos::new(4, true);
        assert!(coverage.contains_key(&canon(p1, p3)));
        assert!(coverage.contains_key(&canon(p1, p4)));
        assert!(coverage.contains_key(&canon(p3, p4)));
    }
}
