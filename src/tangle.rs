//! Tangle component finder (C8): safe-chain detection and the unsafe-edge
//! union-find that carves out resolvable tangles.
//!
//! Grounded on `ResolveSmallTangles.cpp`'s `getSafeChains`, `getChainBelongers`,
//! `getComponents`.

use std::collections::{HashMap, HashSet};

use crate::graph::{GfaGraph, NodePos};

pub type ChainId = String;
type EdgeKey = (NodePos, NodePos);

fn tag_value<'a>(blob: &'a str, key: &str) -> Option<&'a str> {
    blob.split('\t').find_map(|f| f.strip_prefix(key))
}

/// A chain is safe if its total `LN:i:` length (summed over every node
/// tagged with that `bc:Z:` chain id) reaches `safe_chain_size`.
pub fn get_safe_chains(graph: &GfaGraph, safe_chain_size: usize) -> HashSet<ChainId> {
    let mut chain_size: HashMap<ChainId, usize> = HashMap::new();
    for blob in graph.tags.values() {
        if let (Some(chain), Some(ln)) = (tag_value(blob, "bc:Z:"), tag_value(blob, "LN:i:")) {
            if let Ok(len) = ln.parse::<usize>() {
                *chain_size.entry(chain.to_string()).or_insert(0) += len;
            }
        }
    }
    chain_size
        .into_iter()
        .filter(|&(_, size)| size >= safe_chain_size)
        .map(|(chain, _)| chain)
        .collect()
}

pub fn get_chain_belongers(graph: &GfaGraph) -> HashMap<usize, ChainId> {
    graph
        .tags
        .iter()
        .filter_map(|(&id, blob)| tag_value(blob, "bc:Z:").map(|c| (id, c.to_string())))
        .collect()
}

fn is_unsafe(node_id: usize, belongs: &HashMap<usize, ChainId>, safe_chains: &HashSet<ChainId>) -> bool {
    match belongs.get(&node_id) {
        Some(chain) => !safe_chains.contains(chain),
        None => true,
    }
}

struct EdgeUnionFind {
    parent: HashMap<EdgeKey, EdgeKey>,
}

impl EdgeUnionFind {
    fn new() -> Self {
        EdgeUnionFind { parent: HashMap::new() }
    }

    fn find(&mut self, key: EdgeKey) -> EdgeKey {
        let parent = *self.parent.entry(key).or_insert(key);
        if parent == key {
            return key;
        }
        let root = self.find(parent);
        self.parent.insert(key, root);
        root
    }

    fn union(&mut self, a: EdgeKey, b: EdgeKey) {
        let ra = self.find(a);
        let rb = self.find(b);
        if ra != rb {
            self.parent.insert(ra, rb);
        }
    }
}

pub struct ResolvableComponent {
    pub node_ids: HashSet<usize>,
    pub edges: HashSet<EdgeKey>,
}

/// Unions `from`'s outgoing edges together against the shared `anchor` key
/// (stopping at a same-safe-chain boundary) and each with its
/// orientation-reversed twin, whose tail is `twin_tail`.
fn process_source(
    anchor: EdgeKey,
    from: NodePos,
    twin_tail: NodePos,
    graph: &GfaGraph,
    belongs: &HashMap<usize, ChainId>,
    safe_chains: &HashSet<ChainId>,
    uf: &mut EdgeUnionFind,
) {
    let Some(targets) = graph.edges.get(&from) else { return };
    for &target in targets {
        if let (Some(fc), Some(tc)) = (belongs.get(&from.id), belongs.get(&target.id)) {
            if fc == tc && safe_chains.contains(fc) {
                break;
            }
        }
        let key_here = (from, target);
        let reverse_key_here = (target.reverse(), twin_tail);
        uf.union(anchor, key_here);
        uf.union(key_here, reverse_key_here);
    }
}

/// `getComponents`: for every original edge, union it with the first
/// outgoing edge of its source and with its orientation-reversed twin,
/// breaking at same-safe-chain boundaries; additionally, for every unsafe
/// source node, repeat the same unioning from its opposite orientation,
/// reusing the forward pass's anchor key so both directions land in one
/// equivalence class.
pub fn get_components(
    graph: &GfaGraph,
    belongs: &HashMap<usize, ChainId>,
    safe_chains: &HashSet<ChainId>,
) -> Vec<ResolvableComponent> {
    let mut uf = EdgeUnionFind::new();
    let sources: Vec<NodePos> = graph.edges.keys().copied().collect();
    for &u in &sources {
        let Some(targets) = graph.edges.get(&u) else { continue };
        if targets.is_empty() {
            continue;
        }
        let first_key = (u, targets[0]);
        process_source(first_key, u, u.reverse(), graph, belongs, safe_chains, &mut uf);
        if is_unsafe(u.id, belongs, safe_chains) && graph.edges.contains_key(&u.reverse()) {
            process_source(first_key, u.reverse(), u, graph, belongs, safe_chains, &mut uf);
        }
    }

    let mut groups: HashMap<EdgeKey, Vec<EdgeKey>> = HashMap::new();
    for &u in &sources {
        for &target in &graph.edges[&u] {
            let key = (u, target);
            let root = uf.find(key);
            groups.entry(root).or_default().push(key);
        }
    }

    let mut components = Vec::new();
    for (_, edges) in groups {
        if edges.is_empty() {
            continue;
        }
        let mut node_ids = HashSet::new();
        for &(u, v) in &edges {
            if is_unsafe(u.id, belongs, safe_chains) {
                node_ids.insert(u.id);
            }
            if is_unsafe(v.id, belongs, safe_chains) {
                node_ids.insert(v.id);
            }
        }
        components.push(ResolvableComponent {
            node_ids,
            edges: edges.into_iter().collect(),
        });
    }
    log::info!("tangle finder: {} candidate components", components.len());
    components
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph_with_tangle() -> GfaGraph {
        let mut g = GfaGraph::new(0);
        // safe chain node 1 (chain "A", long) -> unsafe node 2 -> safe chain node 3 (chain "B", long)
        g.tags.insert(1, "LN:i:10000\tbc:Z:A".to_string());
        g.tags.insert(3, "LN:i:10000\tbc:Z:B".to_string());
        g.add_edge(NodePos::new(1, true), NodePos::new(2, true));
        g.add_edge(NodePos::new(2, true), NodePos::new(3, true));
        g.confirm_doublesided_edges();
        g
    }

    #[test]
    fn safe_chains_reach_the_size_threshold() {
        let g = graph_with_tangle();
        let safe = get_safe_chains(&g, 5000);
        assert!(safe.contains("A"));
        assert!(safe.contains("B"));
    }

    #[test]
    fn components_collect_unsafe_nodes_between_safe_chains() {
        let g = graph_with_tangle();
        let safe = get_safe_chains(&g, 5000);
        let belongs = get_chain_belongers(&g);
        let components = get_components(&g, &belongs, &safe);
        assert!(components.iter().any(|c| c.node_ids.contains(&2)));
    }

    /// An unsafe node with edges leaving in both orientations must land its
    /// forward- and reverse-direction out-edges in one component, since the
    /// reverse pass reuses the forward pass's anchor key.
    #[test]
    fn unsafe_node_merges_both_orientations_into_one_component() {
        let mut g = GfaGraph::new(0);
        g.tags.insert(1, "LN:i:10000\tbc:Z:A".to_string());
        g.tags.insert(3, "LN:i:10000\tbc:Z:B".to_string());
        g.add_edge(NodePos::new(1, true), NodePos::new(2, true));
        g.add_edge(NodePos::new(2, true), NodePos::new(3, true));
        g.add_edge(NodePos::new(2, false), NodePos::new(4, true));
        g.confirm_doublesided_edges();

        let safe = get_safe_chains(&g, 5000);
        let belongs = get_chain_belongers(&g);
        let components = get_components(&g, &belongs, &safe);

        assert_eq!(components.len(), 1);
        let total_edges: usize = components.iter().map(|c| c.edges.len()).sum();
        assert_eq!(total_edges, 6);
    }
}
