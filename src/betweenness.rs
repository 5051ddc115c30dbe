//! Betweenness cut engine and worker pool (C4 + C10).
//!
//! Grounded on `AssembleByAlignment.cpp`'s `modBetweenness`/`addBetweenness`/
//! `reduceBetweenness`/`checkLocked`/`forbidOverlap`/`pickCutAlignments`. The
//! initial parallel betweenness pass uses raw `std::thread` + a
//! `Mutex`-protected shared counter with per-thread accumulator arrays summed
//! after join, matching the source's own concurrency pattern exactly (see
//! DESIGN.md for why this isn't a `rayon` parallel iterator).

use std::collections::{BinaryHeap, HashSet};
use std::path::Path as FsPath;
use std::sync::{Arc, Mutex};
use std::thread;

use crate::errors::Result;
use crate::filters::OverlapKey;
use crate::graph::Path;
use crate::overlaps::{stream_alignments, Alignment};

const SNAP_EPSILON: f64 = 0.01;
const DRIFT_TOLERANCE: f64 = 1.0;

fn snap(x: f64) -> f64 {
    if x > -SNAP_EPSILON && x < SNAP_EPSILON {
        0.0
    } else {
        x
    }
}

/// Dense node graph over path steps, with each undirected edge tagged by the
/// index into `alns` of the overlap that produced it.
pub struct NodeGraph {
    pub node_num: Vec<Vec<usize>>,
    pub num_nodes: usize,
    pub edges: Vec<Vec<(usize, usize)>>,
}

/// Streams `aln_file`, keeping only overlaps whose `(leftPath, rightPath)` is
/// in `allowed`, and builds the node-incidence graph over path steps.
pub fn build_node_graph(
    paths: &[Path],
    allowed: &HashSet<OverlapKey>,
    aln_file: &FsPath,
) -> Result<(NodeGraph, Vec<Alignment>)> {
    let mut node_num: Vec<Vec<usize>> = Vec::with_capacity(paths.len());
    let mut next_id = 0usize;
    for p in paths {
        let start = next_id;
        next_id += p.position.len();
        node_num.push((start..next_id).collect());
    }
    let num_nodes = next_id;

    let mut alns: Vec<Alignment> = Vec::new();
    stream_alignments(aln_file, |aln| {
        if allowed.contains(&(aln.left_path, aln.right_path)) {
            alns.push(aln.clone());
        }
    })?;

    let mut edges: Vec<Vec<(usize, usize)>> = vec![Vec::new(); num_nodes];
    for (idx, aln) in alns.iter().enumerate() {
        for pair in &aln.aligned_pairs {
            let a = node_num[aln.left_path][pair.left_index];
            let b = node_num[aln.right_path][pair.right_index];
            edges[a].push((b, idx));
            edges[b].push((a, idx));
        }
    }
    log::info!(
        "node graph: {} nodes, {} overlaps tagging edges",
        num_nodes,
        alns.len()
    );
    Ok((NodeGraph { node_num, num_nodes, edges }, alns))
}

/// BFS from `start` (skipping forbidden edges), then a backward juice pass
/// that adds `multiplier * contribution` into `betweenness[overlapIdx]` for
/// every edge on a shortest-path tree from `start`.
pub fn mod_betweenness(
    start: usize,
    multiplier: f64,
    edges: &[Vec<(usize, usize)>],
    forbidden: &[bool],
    betweenness: &mut [f64],
) {
    let mut explored: Vec<Option<usize>> = vec![None; edges.len()];
    let mut queue: Vec<usize> = vec![start];
    let mut depth: Vec<usize> = vec![0];
    let mut num_paths: Vec<u64> = vec![1];
    let mut parents: Vec<Vec<usize>> = vec![Vec::new()];
    let mut taken_edge: Vec<Vec<usize>> = vec![Vec::new()];
    explored[start] = Some(0);

    let mut i = 0;
    while i < queue.len() {
        let node = queue[i];
        let d = depth[i];
        for &(neighbor, overlap_idx) in &edges[node] {
            if forbidden[overlap_idx] {
                continue;
            }
            let j = match explored[neighbor] {
                Some(j) => j,
                None => {
                    let j = queue.len();
                    explored[neighbor] = Some(j);
                    queue.push(neighbor);
                    depth.push(d + 1);
                    num_paths.push(0);
                    parents.push(Vec::new());
                    taken_edge.push(Vec::new());
                    j
                }
            };
            if depth[j] == d + 1 {
                num_paths[j] += num_paths[i];
                parents[j].push(i);
                taken_edge[j].push(overlap_idx);
            }
        }
        i += 1;
    }

    let mut juice = vec![1.0f64; queue.len()];
    for i in (1..queue.len()).rev() {
        for (k, &p) in parents[i].iter().enumerate() {
            let overlap_idx = taken_edge[i][k];
            let contribution = juice[i] * num_paths[p] as f64 / num_paths[i] as f64;
            juice[p] += contribution;
            betweenness[overlap_idx] = snap(betweenness[overlap_idx] + contribution * multiplier);
        }
    }
}

pub fn add_betweenness(
    start: usize,
    edges: &[Vec<(usize, usize)>],
    forbidden: &[bool],
    betweenness: &mut [f64],
) {
    mod_betweenness(start, 1.0, edges, forbidden, betweenness);
}

pub fn reduce_betweenness(
    start: usize,
    edges: &[Vec<(usize, usize)>],
    forbidden: &[bool],
    betweenness: &mut [f64],
) {
    mod_betweenness(start, -1.0, edges, forbidden, betweenness);
}

/// Flood-fills the connected component containing `seed` over non-forbidden
/// edges, refusing to cross into already-locked territory. Returns `None`
/// if `seed` itself is locked.
fn component_of(
    seed: usize,
    edges: &[Vec<(usize, usize)>],
    forbidden: &[bool],
    locked: &[bool],
) -> Option<Vec<usize>> {
    if locked[seed] {
        return None;
    }
    let mut seen = vec![false; edges.len()];
    let mut stack = vec![seed];
    seen[seed] = true;
    let mut component = Vec::new();
    while let Some(node) = stack.pop() {
        component.push(node);
        for &(neighbor, overlap_idx) in &edges[node] {
            if forbidden[overlap_idx] || locked[neighbor] || seen[neighbor] {
                continue;
            }
            seen[neighbor] = true;
            stack.push(neighbor);
        }
    }
    Some(component)
}

/// `checkLocked`: if `seed`'s non-forbidden, non-locked connected component
/// has at most `max_group_size` nodes, locks every node in it.
fn check_locked(
    seed: usize,
    edges: &[Vec<(usize, usize)>],
    forbidden: &[bool],
    locked: &mut [bool],
    max_group_size: usize,
) {
    if let Some(component) = component_of(seed, edges, forbidden, locked) {
        if component.len() <= max_group_size {
            for node in component {
                locked[node] = true;
            }
        }
    }
}

/// Restricted flood-fill seeded from every left-hand node of the overlap
/// about to be forbidden, stopping at locked nodes, over the edge set that
/// still includes that overlap (it is reachable by definition).
fn affected_nodes(
    seeds: &[usize],
    edges: &[Vec<(usize, usize)>],
    forbidden: &[bool],
    locked: &[bool],
) -> Vec<usize> {
    let mut seen = vec![false; edges.len()];
    let mut result = Vec::new();
    for &seed in seeds {
        if locked[seed] || seen[seed] {
            continue;
        }
        let mut stack = vec![seed];
        seen[seed] = true;
        while let Some(node) = stack.pop() {
            result.push(node);
            for &(neighbor, overlap_idx) in &edges[node] {
                if forbidden[overlap_idx] || locked[neighbor] || seen[neighbor] {
                    continue;
                }
                seen[neighbor] = true;
                stack.push(neighbor);
            }
        }
    }
    result
}

struct PrioEntry {
    priority: f64,
    idx: usize,
}

impl PartialEq for PrioEntry {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority
    }
}
impl Eq for PrioEntry {}
impl PartialOrd for PrioEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for PrioEntry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.priority.total_cmp(&other.priority)
    }
}

fn priority_of(idx: usize, betweenness: &[f64], pair_count: &[usize]) -> f64 {
    betweenness[idx] / pair_count[idx].max(1) as f64
}

fn forbid_overlap(
    idx: usize,
    alns: &[Alignment],
    node_num: &[Vec<usize>],
    edges: &[Vec<(usize, usize)>],
    forbidden: &mut [bool],
    locked: &mut [bool],
    betweenness: &mut [f64],
    pair_count: &[usize],
    max_group_size: usize,
    pq: &mut BinaryHeap<PrioEntry>,
) {
    let aln = &alns[idx];
    let seeds: Vec<usize> = aln
        .aligned_pairs
        .iter()
        .map(|p| node_num[aln.left_path][p.left_index])
        .collect();
    let affected = affected_nodes(&seeds, edges, forbidden, locked);

    for &node in &affected {
        reduce_betweenness(node, edges, forbidden, betweenness);
    }
    forbidden[idx] = true;
    for &node in &affected {
        add_betweenness(node, edges, forbidden, betweenness);
    }
    for &node in &affected {
        if !locked[node] {
            check_locked(node, edges, forbidden, locked, max_group_size);
        }
    }

    let mut touched: HashSet<usize> = HashSet::new();
    for &node in &affected {
        for &(_, overlap_idx) in &edges[node] {
            touched.insert(overlap_idx);
        }
    }
    for overlap_idx in touched {
        if !forbidden[overlap_idx] {
            pq.push(PrioEntry {
                priority: priority_of(overlap_idx, betweenness, pair_count),
                idx: overlap_idx,
            });
        }
    }
}

/// `pickCutAlignments`: the full driver. Runs the initial full betweenness
/// pass across `num_threads` workers (shared `Mutex`-protected next-index
/// counter, per-thread accumulator arrays summed after join), then the
/// single-threaded iterative forbid loop driven by a max-priority queue.
pub fn pick_cut_alignments(
    paths: &[Path],
    allowed: &HashSet<OverlapKey>,
    aln_file: &FsPath,
    num_threads: usize,
    max_group_size: usize,
) -> Result<HashSet<OverlapKey>> {
    let (graph, alns) = build_node_graph(paths, allowed, aln_file)?;
    let pair_count: Vec<usize> = alns.iter().map(|a| a.aligned_pairs.len()).collect();
    let mut forbidden = vec![false; alns.len()];
    let mut locked = vec![false; graph.num_nodes];

    for node in 0..graph.num_nodes {
        if !locked[node] {
            check_locked(node, &graph.edges, &forbidden, &mut locked, max_group_size);
        }
    }

    let num_threads = num_threads.max(1);
    let next_index = Arc::new(Mutex::new(0usize));
    let edges = Arc::new(graph.edges);
    let locked_shared = Arc::new(locked.clone());
    let num_nodes = graph.num_nodes;
    let num_overlaps = alns.len();

    let mut handles = Vec::with_capacity(num_threads);
    for _ in 0..num_threads {
        let next_index = Arc::clone(&next_index);
        let edges = Arc::clone(&edges);
        let locked_shared = Arc::clone(&locked_shared);
        let forbidden_snapshot = forbidden.clone();
        handles.push(thread::spawn(move || {
            let mut local = vec![0.0f64; num_overlaps];
            loop {
                let idx = {
                    let mut guard = next_index.lock().unwrap();
                    if *guard >= num_nodes {
                        break;
                    }
                    let idx = *guard;
                    *guard += 1;
                    idx
                };
                if locked_shared[idx] {
                    continue;
                }
                add_betweenness(idx, &edges, &forbidden_snapshot, &mut local);
            }
            local
        }));
    }

    let mut betweenness = vec![0.0f64; alns.len()];
    for handle in handles {
        let local = handle.join().expect("betweenness worker panicked");
        for (acc, v) in betweenness.iter_mut().zip(local.into_iter()) {
            *acc = snap(*acc + v);
        }
    }

    let edges = Arc::try_unwrap(edges).unwrap_or_else(|e| (*e).clone());

    let mut pq: BinaryHeap<PrioEntry> = BinaryHeap::new();
    for idx in 0..alns.len() {
        if !forbidden[idx] {
            pq.push(PrioEntry {
                priority: priority_of(idx, &betweenness, &pair_count),
                idx,
            });
        }
    }

    while let Some(entry) = pq.pop() {
        if forbidden[entry.idx] {
            continue;
        }
        let current = priority_of(entry.idx, &betweenness, &pair_count);
        if (entry.priority - current).abs() > DRIFT_TOLERANCE {
            continue;
        }
        forbid_overlap(
            entry.idx,
            &alns,
            &graph.node_num,
            &edges,
            &mut forbidden,
            &mut locked,
            &mut betweenness,
            &pair_count,
            max_group_size,
            &mut pq,
        );
    }

    let result: HashSet<OverlapKey> = alns
        .iter()
        .enumerate()
        .filter(|(idx, _)| !forbidden[*idx])
        .map(|(_, aln)| (aln.left_path, aln.right_path))
        .collect();
    log::info!(
        "betweenness cut: kept {} of {} overlaps",
        result.len(),
        alns.len()
    );
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn betweenness_is_zero_on_isolated_node() {
        let edges: Vec<Vec<(usize, usize)>> = vec![Vec::new()];
        let forbidden = vec![false; 0];
        let mut betweenness: Vec<f64> = vec![];
        mod_betweenness(0, 1.0, &edges, &forbidden, &mut betweenness);
        assert!(betweenness.is_empty());
    }

    #[test]
    fn path_graph_betweenness_peaks_in_the_middle() {
        // 0 -(0)- 1 -(1)- 2, overlaps 0 and 1 tag each edge.
        let edges: Vec<Vec<(usize, usize)>> =
            vec![vec![(1, 0)], vec![(0, 0), (2, 1)], vec![(1, 1)]];
        let forbidden = vec![false, false];
        let mut betweenness = vec![0.0, 0.0];
        add_betweenness(0, &edges, &forbidden, &mut betweenness);
        add_betweenness(1, &edges, &forbidden, &mut betweenness);
        add_betweenness(2, &edges, &forbidden, &mut betweenness);
        assert!(betweenness[0] > 0.0);
        assert!(betweenness[1] > 0.0);
    }

    #[test]
    fn check_locked_locks_small_components() {
        let edges: Vec<Vec<(usize, usize)>> = vec![vec![(1, 0)], vec![(0, 0)]];
        let forbidden = vec![false];
        let mut locked = vec![false, false];
        check_locked(0, &edges, &forbidden, &mut locked, 2);
        assert!(locked[0] && locked[1]);
    }

    #[test]
    fn check_locked_leaves_oversized_components_unlocked() {
        let edges: Vec<Vec<(usize, usize)>> =
            vec![vec![(1, 0)], vec![(0, 0), (2, 1)], vec![(1, 1)]];
        let forbidden = vec![false, false];
        let mut locked = vec![false, false, false];
        check_locked(0, &edges, &forbidden, &mut locked, 2);
        assert!(!locked.iter().any(|&l| l));
    }
}
