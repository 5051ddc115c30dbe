//! Partial-order alignment resolver (C9).
//!
//! Grounded on `ResolveSmallTangles.cpp`'s `splitPathsPerComponent`,
//! `canResolve`, `align`, `resolve`, `updateGraph`,
//! `resolveComponentsAndReplacePaths`. Cross-checked against
//! `examples/other_examples/5cc85986_artefom-rdtfs__src-poa.rs.rs` for the
//! index-based DAG node / explicit topological order shape.

use std::collections::{HashMap, HashSet};

use crate::configs::TangleConfig;
use crate::graph::{canon, GfaGraph, NodePos, Path};
use crate::tangle::{ChainId, ResolvableComponent};

#[derive(Debug, Clone)]
pub struct Subpath {
    pub path: Vec<NodePos>,
}

/// `splitPathsPerComponent`: scans each walk for maximal runs of edges
/// belonging to the same component and emits each run (of at least two
/// nodes) as a `Subpath`.
pub fn split_paths_per_component(
    paths: &[Path],
    components: &[ResolvableComponent],
) -> HashMap<usize, Vec<Subpath>> {
    let mut edge_component: HashMap<(NodePos, NodePos), usize> = HashMap::new();
    for (idx, comp) in components.iter().enumerate() {
        for &e in &comp.edges {
            edge_component.insert(e, idx);
        }
    }

    let mut result: HashMap<usize, Vec<Subpath>> = HashMap::new();
    for path in paths {
        let steps = &path.position;
        let mut j = 1;
        while j < steps.len() {
            let comp = edge_component.get(&(steps[j - 1], steps[j])).copied();
            match comp {
                None => j += 1,
                Some(c) => {
                    let start = j - 1;
                    let mut end = j;
                    while end + 1 < steps.len()
                        && edge_component.get(&(steps[end], steps[end + 1])).copied() == Some(c)
                    {
                        end += 1;
                    }
                    let sub: Vec<NodePos> = steps[start..=end].to_vec();
                    if sub.len() >= 2 {
                        result.entry(c).or_default().push(Subpath { path: sub });
                    }
                    j = end + 1;
                }
            }
        }
    }
    result
}

fn is_safe(pos: NodePos, belongs: &HashMap<usize, ChainId>, safe_chains: &HashSet<ChainId>) -> bool {
    belongs.get(&pos.id).map(|c| safe_chains.contains(c)).unwrap_or(false)
}

/// `canResolve`: the four resolvability conditions from SPEC_FULL.md §4.8.
pub fn can_resolve(
    component: &ResolvableComponent,
    subpaths: &[Subpath],
    belongs: &HashMap<usize, ChainId>,
    safe_chains: &HashSet<ChainId>,
) -> bool {
    if subpaths.is_empty() {
        return false;
    }

    let is_safe_crossing = |sp: &Subpath| {
        is_safe(*sp.path.first().unwrap(), belongs, safe_chains)
            && is_safe(*sp.path.last().unwrap(), belongs, safe_chains)
    };
    let total_safe_crossing = subpaths.iter().filter(|sp| is_safe_crossing(sp)).count();
    if total_safe_crossing < subpaths.len() {
        return false;
    }

    let mut safe_crossing_touch: HashMap<usize, usize> = HashMap::new();
    for sp in subpaths.iter().filter(|sp| is_safe_crossing(sp)) {
        for pos in [*sp.path.first().unwrap(), *sp.path.last().unwrap()] {
            if is_safe(pos, belongs, safe_chains) {
                *safe_crossing_touch.entry(pos.id).or_insert(0) += 1;
            }
        }
    }
    for &(u, v) in &component.edges {
        if is_safe(u, belongs, safe_chains) && !safe_crossing_touch.contains_key(&u.id) {
            return false;
        }
        if is_safe(v, belongs, safe_chains) && !safe_crossing_touch.contains_key(&v.id) {
            return false;
        }
    }

    let mut crossing: HashMap<usize, usize> = HashMap::new();
    for sp in subpaths {
        for pos in [*sp.path.first().unwrap(), *sp.path.last().unwrap()] {
            if is_safe(pos, belongs, safe_chains) {
                *crossing.entry(pos.id).or_insert(0) += 1;
            }
        }
    }
    for (&node_id, &count) in &crossing {
        if safe_crossing_touch.get(&node_id).copied().unwrap_or(0) < count {
            return false;
        }
    }

    true
}

fn node_size(pos: NodePos, graph: &GfaGraph, edge_overlap: usize) -> i64 {
    let len = graph.nodes.get(&pos.id).map(|s| s.len()).unwrap_or(0);
    len.saturating_sub(edge_overlap).max(1) as i64
}

/// The POA DP: `match -> +max(lenA,lenB)`, `mismatch -> -max(lenA,lenB)`,
/// `deletion of a DAG node -> -len(DAGnode)`, `insertion of a path step ->
/// -len(pathnode)`. Returns the backtraced alignment as `(pathIndex,
/// nodeId)` pairs, starting with `(0, 0)` and ending at the DAG's last node.
fn align(
    path: &[NodePos],
    nodes: &HashMap<usize, NodePos>,
    order: &[usize],
    in_neighbors: &HashMap<usize, Vec<usize>>,
    graph: &GfaGraph,
    edge_overlap: usize,
) -> Vec<(usize, usize)> {
    let n = path.len();
    let first = order[0];
    let last = *order.last().unwrap();
    let mut score: HashMap<(usize, usize), f64> = HashMap::new();
    let mut backtrace: HashMap<(usize, usize), (usize, usize)> = HashMap::new();
    let empty: Vec<usize> = Vec::new();

    for &j in order {
        let node_pos = nodes[&j];
        let n_size = node_size(node_pos, graph, edge_overlap) as f64;
        for i in 0..n {
            if i == 0 && j == first {
                score.insert((0, j), n_size);
                continue;
            }
            if i == 0 {
                let mut best = f64::NEG_INFINITY;
                let mut best_bt = (0, first);
                for &nb in in_neighbors.get(&j).unwrap_or(&empty) {
                    if let Some(&s) = score.get(&(0, nb)) {
                        let cand = s - n_size;
                        if cand > best {
                            best = cand;
                            best_bt = (0, nb);
                        }
                    }
                }
                score.insert((0, j), best);
                backtrace.insert((0, j), best_bt);
                continue;
            }
            if j == first {
                let p_size = node_size(path[i], graph, edge_overlap) as f64;
                let prev = score[&(i - 1, j)];
                score.insert((i, j), prev - p_size);
                backtrace.insert((i, j), (i - 1, j));
                continue;
            }
            let p_size = node_size(path[i], graph, edge_overlap) as f64;
            let is_match = path[i] == node_pos;
            let match_size = p_size.max(n_size);
            let mut best = score[&(i - 1, j)] - p_size;
            let mut best_bt = (i - 1, j);
            for &nb in in_neighbors.get(&j).unwrap_or(&empty) {
                if let Some(&s_diag) = score.get(&(i - 1, nb)) {
                    let cand = if is_match { s_diag + match_size } else { s_diag - match_size };
                    if cand > best {
                        best = cand;
                        best_bt = (i - 1, nb);
                    }
                }
                if let Some(&s_del) = score.get(&(i, nb)) {
                    let cand = s_del - n_size;
                    if cand > best {
                        best = cand;
                        best_bt = (i, nb);
                    }
                }
            }
            score.insert((i, j), best);
            backtrace.insert((i, j), best_bt);
        }
    }

    let mut matches = Vec::new();
    let mut cur = (n - 1, last);
    while let Some(&bt) = backtrace.get(&cur) {
        let (i, j) = cur;
        if bt.0 != i && bt.1 != j && path[i] == nodes[&j] {
            matches.push(cur);
        }
        cur = bt;
    }
    matches.push((0, 0));
    matches.reverse();
    matches
}

/// Result of merging one `canon(first,last)` group of subpaths into a DAG.
struct ResolvedGroup {
    nodes: HashMap<usize, NodePos>,
    in_neighbors: HashMap<usize, Vec<usize>>,
    first_id: usize,
    last_id: usize,
}

fn resolve_group(
    group: &[Vec<NodePos>],
    graph: &GfaGraph,
    edge_overlap: usize,
    next_id: &mut usize,
) -> ResolvedGroup {
    let skeleton = &group[0];
    let mut nodes: HashMap<usize, NodePos> = HashMap::new();
    for (i, &pos) in skeleton.iter().enumerate() {
        nodes.insert(i, pos);
    }
    let mut order: Vec<usize> = (0..skeleton.len()).collect();
    let mut in_neighbors: HashMap<usize, Vec<usize>> = HashMap::new();
    for i in 1..skeleton.len() {
        in_neighbors.insert(i, vec![i - 1]);
    }
    let last_id = skeleton.len() - 1;
    *next_id = skeleton.len();

    for subpath in &group[1..] {
        let matches = align(subpath, &nodes, &order, &in_neighbors, graph, edge_overlap);
        for window in matches.windows(2) {
            let (prev_i, prev_j) = window[0];
            let (cur_i, cur_j) = window[1];
            let mut last_new: Option<usize> = None;
            for k in (prev_i + 1)..cur_i {
                let new_id = *next_id;
                *next_id += 1;
                nodes.insert(new_id, subpath[k]);
                let insert_at = order.iter().position(|&x| x == cur_j).unwrap();
                order.insert(insert_at, new_id);
                let from = last_new.unwrap_or(prev_j);
                in_neighbors.entry(new_id).or_default().push(from);
                last_new = Some(new_id);
            }
            let from = last_new.unwrap_or(prev_j);
            let entry = in_neighbors.entry(cur_j).or_default();
            if !entry.contains(&from) {
                entry.push(from);
            }
        }
    }

    ResolvedGroup { nodes, in_neighbors, first_id: 0, last_id }
}

/// `resolve`: groups safe-crossing subpaths by `canon(first,last)`, merges
/// each group into a POA DAG, and records every non-endpoint DAG node/edge
/// as new component structure (endpoint ids substituted for the real
/// safe-chain `NodePos`).
pub fn resolve(
    subpaths: &[Subpath],
    graph: &GfaGraph,
    edge_overlap: usize,
    next_node_id: &mut usize,
) -> (HashMap<usize, NodePos>, Vec<(NodePos, NodePos)>) {
    let mut groups: HashMap<(NodePos, NodePos), Vec<Vec<NodePos>>> = HashMap::new();
    for sp in subpaths {
        let first = *sp.path.first().unwrap();
        let last = *sp.path.last().unwrap();
        let key = canon(first, last);
        let oriented = if first == key.0 {
            sp.path.clone()
        } else {
            sp.path.iter().rev().map(|p| p.reverse()).collect()
        };
        groups.entry(key).or_default().push(oriented);
    }

    let mut new_nodes: HashMap<usize, NodePos> = HashMap::new();
    let mut new_edges: Vec<(NodePos, NodePos)> = Vec::new();

    for ((first_real, last_real), members) in groups {
        let mut local_next = 0usize;
        let resolved = resolve_group(&members, graph, edge_overlap, &mut local_next);

        let translate = |id: usize| -> NodePos {
            if id == resolved.first_id {
                first_real
            } else if id == resolved.last_id {
                last_real
            } else {
                NodePos::new(*next_node_id + id, true)
            }
        };

        for (&id, &pos) in &resolved.nodes {
            if id != resolved.first_id && id != resolved.last_id {
                new_nodes.insert(*next_node_id + id, pos);
            }
        }
        for (&to, froms) in &resolved.in_neighbors {
            for &from in froms {
                new_edges.push((translate(from), translate(to)));
            }
        }
        *next_node_id += local_next.max(resolved.nodes.len()) + 1;
    }

    (new_nodes, new_edges)
}

/// `updateGraph`: materializes new nodes/edges into the live graph and
/// deletes the resolved tangle's unsafe original nodes.
pub fn update_graph(
    graph: &mut GfaGraph,
    component: &ResolvableComponent,
    new_nodes: &HashMap<usize, NodePos>,
    new_edges: &[(NodePos, NodePos)],
) {
    for (&new_id, &orig_pos) in new_nodes {
        if let Some(seq) = graph.oriented_sequence(orig_pos) {
            graph.nodes.insert(new_id, seq);
        }
    }
    for &(from, to) in new_edges {
        graph.add_edge(from, to);
    }
    graph.confirm_doublesided_edges();
    for &id in &component.node_ids {
        graph.nodes.remove(&id);
    }
}

/// `resolveComponentsAndReplacePaths`: the driver. Skips components whose
/// total unsafe sequence length exceeds the oversize guard, and those that
/// fail `canResolve`; resolves the rest in place. Returns the set of
/// original node ids deleted by resolution, for walk remapping.
pub fn resolve_components_and_replace_paths(
    graph: &mut GfaGraph,
    paths: &[Path],
    components: Vec<ResolvableComponent>,
    belongs: &HashMap<usize, ChainId>,
    safe_chains: &HashSet<ChainId>,
    config: &TangleConfig,
) -> (usize, usize, usize, HashSet<usize>) {
    let mut next_node_id = graph.nodes.keys().copied().max().unwrap_or(0) + 1;
    let per_component = split_paths_per_component(paths, &components);

    let mut resolved = 0usize;
    let mut unresolvable = 0usize;
    let mut too_big = 0usize;
    let mut removed_ids = HashSet::new();

    for (idx, component) in components.into_iter().enumerate() {
        if component.edges.is_empty() {
            continue;
        }
        let total_unsafe: usize = component
            .node_ids
            .iter()
            .filter_map(|&id| graph.nodes.get(&id))
            .map(|s| s.len())
            .sum();
        if total_unsafe > config.oversize_guard_bp {
            too_big += 1;
            log::warn!("tangle {idx} skipped: {total_unsafe} bp exceeds oversize guard");
            continue;
        }
        let subpaths = per_component.get(&idx).cloned().unwrap_or_default();
        if !can_resolve(&component, &subpaths, belongs, safe_chains) {
            unresolvable += 1;
            log::warn!("tangle {idx} not resolvable from available read evidence");
            continue;
        }
        let (new_nodes, new_edges) = resolve(&subpaths, graph, graph.edge_overlap, &mut next_node_id);
        update_graph(graph, &component, &new_nodes, &new_edges);
        removed_ids.extend(component.node_ids.iter().copied());
        resolved += 1;
    }

    log::info!(
        "tangle resolution: {resolved} resolved, {unresolvable} unresolvable, {too_big} too large"
    );
    (resolved, unresolvable, too_big, removed_ids)
}

/// Translates walks after tangle resolution, the same way C7's `remap_walks`
/// translates them after closure building: a step whose node was deleted by
/// resolution has no surviving image, and two consecutive surviving steps
/// with no edge between them in the post-resolution graph force a split.
pub fn remap_resolved_walks(paths: &[Path], graph: &GfaGraph, removed_ids: &HashSet<usize>) -> Vec<Path> {
    let mut result = Vec::new();
    for path in paths {
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
        for &pos in &path.position {
            if removed_ids.contains(&pos.id) {
                flush(&mut current, &mut subpath_idx, &mut result);
                continue;
            }
            if let Some(&prev) = current.last() {
                let has_edge = graph.edges.get(&prev).map(|list| list.contains(&pos)).unwrap_or(false);
                if !has_edge {
                    flush(&mut current, &mut subpath_idx, &mut result);
                }
            }
            current.push(pos);
        }
        flush(&mut current, &mut subpath_idx, &mut result);
    }
    log::info!("remapped {} walks into {} subpaths after resolution", paths.len(), result.len());
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn can_resolve_rejects_empty_subpaths() {
        let component = ResolvableComponent { node_ids: HashSet::new(), edges: HashSet::new() };
        let belongs = HashMap::new();
        let safe = HashSet::new();
        assert!(!can_resolve(&component, &[], &belongs, &safe));
    }

    #[test]
    fn split_paths_per_component_requires_two_nodes() {
        let comp = ResolvableComponent {
            node_ids: HashSet::new(),
            edges: [(NodePos::new(1, true), NodePos::new(2, true))].into_iter().collect(),
        };
        let path = Path {
            name: "r".to_string(),
            position: vec![NodePos::new(1, true), NodePos::new(2, true), NodePos::new(3, true)],
        };
        let result = split_paths_per_component(&[path], &[comp]);
        assert_eq!(result.get(&0).map(|v| v.len()), Some(1));
        assert_eq!(result[&0][0].path.len(), 2);
    }
}
