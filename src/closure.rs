//! Closure builder (C5): union-find over oriented path positions, dense
//! class numbering, doublestrand merge, coverage filter.
//!
//! Grounded on `AssembleByAlignment.cpp`'s `getTransitiveClosures`,
//! `mergeDoublestrandClosures`, `removeOutsideCoverageClosures`.

use std::collections::{HashMap, HashSet};
use std::path::Path as FsPath;

use crate::errors::{bail_invariant, Result};
use crate::filters::OverlapKey;
use crate::graph::Path;
use crate::overlaps::stream_alignments;
use crate::union_find::{OrientedStep, OrientedUnionFind};

/// Per-step doublestrand class assignment: `Some((id, orientation))` if the
/// step's class survived the coverage filter, `None` if it was dropped.
pub type ClassOf = Vec<Vec<Option<(usize, bool)>>>;

/// Runs C2 over every selected overlap's aligned pairs, unioning both the
/// oriented pair and its strand-flipped twin.
fn build_union_find(
    paths: &[Path],
    allowed: &HashSet<OverlapKey>,
    aln_file: &FsPath,
) -> Result<OrientedUnionFind> {
    let lengths: Vec<usize> = paths.iter().map(|p| p.position.len()).collect();
    let mut uf = OrientedUnionFind::new(&lengths);
    stream_alignments(aln_file, |aln| {
        if !allowed.contains(&(aln.left_path, aln.right_path)) {
            return;
        }
        for pair in &aln.aligned_pairs {
            let l_fwd = OrientedStep::new(aln.left_path, pair.left_index, !pair.left_reverse);
            let r_fwd = OrientedStep::new(aln.right_path, pair.right_index, !pair.right_reverse);
            uf.union(l_fwd, r_fwd);
            let l_rev = OrientedStep::new(aln.left_path, pair.left_index, pair.left_reverse);
            let r_rev = OrientedStep::new(aln.right_path, pair.right_index, pair.right_reverse);
            uf.union(l_rev, r_rev);
        }
    })?;
    Ok(uf)
}

/// Dense single-strand class ids, numbered strictly from 1 in path/step/
/// strand visitation order. Returns `per_step[p][s] = [forwardId, reverseId]`.
fn assign_single_strand_ids(
    uf: &mut OrientedUnionFind,
    paths: &[Path],
) -> Vec<Vec<[usize; 2]>> {
    let mut class_of_root: HashMap<OrientedStep, usize> = HashMap::new();
    let mut next_id = 1usize;
    let mut result = Vec::with_capacity(paths.len());
    for (p, path) in paths.iter().enumerate() {
        let mut per_step = Vec::with_capacity(path.position.len());
        for s in 0..path.position.len() {
            let fw_root = uf.find(OrientedStep::new(p, s, true));
            let fw_id = *class_of_root.entry(fw_root).or_insert_with(|| {
                let id = next_id;
                next_id += 1;
                id
            });
            let bw_root = uf.find(OrientedStep::new(p, s, false));
            let bw_id = *class_of_root.entry(bw_root).or_insert_with(|| {
                let id = next_id;
                next_id += 1;
                id
            });
            per_step.push([fw_id, bw_id]);
        }
        result.push(per_step);
    }
    result
}

/// Builds the doublestrand (`fwSet`, `bwSet`) mapping, coverage-filters it,
/// and returns the per-step class assignment.
pub fn closures(
    paths: &[Path],
    allowed: &HashSet<OverlapKey>,
    aln_file: &FsPath,
    min_coverage: usize,
    max_coverage: usize,
) -> Result<ClassOf> {
    let mut uf = build_union_find(paths, allowed, aln_file)?;
    let single_strand = assign_single_strand_ids(&mut uf, paths);

    let mut mapping: HashMap<usize, (usize, bool)> = HashMap::new();
    let mut next_ds = 1usize;
    for per_step in &single_strand {
        for &[fw, bw] in per_step {
            if mapping.contains_key(&fw) {
                continue;
            }
            if fw == bw {
                bail_invariant!(
                    "doublestrand self-merge: single-strand class {} maps to itself on both strands",
                    fw
                );
            }
            let id = next_ds;
            next_ds += 1;
            mapping.insert(fw, (id, true));
            mapping.insert(bw, (id, false));
        }
    }

    let mut coverage: HashMap<usize, usize> = HashMap::new();
    for per_step in &single_strand {
        for &[fw, _] in per_step {
            let ds = mapping[&fw].0;
            *coverage.entry(ds).or_insert(0) += 1;
        }
    }
    let valid: HashSet<usize> = coverage
        .iter()
        .filter(|&(_, &c)| c >= min_coverage && c <= max_coverage)
        .map(|(&id, _)| id)
        .collect();

    log::info!(
        "closures: {} single-strand classes, {} doublestrand, {} survive coverage [{},{}]",
        next_id_bound(&single_strand),
        next_ds - 1,
        valid.len(),
        min_coverage,
        max_coverage
    );

    let class_of: ClassOf = single_strand
        .iter()
        .map(|per_step| {
            per_step
                .iter()
                .map(|&[fw, _]| {
                    let ds = mapping[&fw];
                    if valid.contains(&ds.0) {
                        Some(ds)
                    } else {
                        None
                    }
                })
                .collect()
        })
        .collect();
    Ok(class_of)
}

fn next_id_bound(single_strand: &[Vec<[usize; 2]>]) -> usize {
    single_strand
        .iter()
        .flatten()
        .flat_map(|pair| pair.iter().copied())
        .max()
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::NodePos;
    use crate::overlaps::{write_alignments, AlignedPair, Alignment};
    use std::env::temp_dir;

    fn path_of(len: usize) -> Path {
        Path {
            name: "p".to_string(),
            position: (0..len).map(|i| NodePos::new(i, true)).collect(),
        }
    }

    #[test]
    fn linear_merge_produces_one_class_per_aligned_step() {
        let paths = vec![path_of(2), path_of(2)];
        let aln = Alignment {
            left_path: 0,
            right_path: 1,
            left_start: 0,
            left_end: 1,
            right_start: 0,
            right_end: 1,
            aligned_pairs: vec![
                AlignedPair { left_index: 0, left_reverse: false, right_index: 0, right_reverse: false },
                AlignedPair { left_index: 1, left_reverse: false, right_index: 1, right_reverse: false },
            ],
            alignment_length: 2,
            alignment_identity: 1.0,
        };
        let path = temp_dir().join("tangleweave_test_closure_linear.bin");
        write_alignments(&path, &[aln]).unwrap();
        let mut allowed = HashSet::new();
        allowed.insert((0usize, 1usize));
        let result = closures(&paths, &allowed, &path, 1, 100).unwrap();
        assert_eq!(result[0][0], result[1][0]);
        assert_eq!(result[0][1], result[1][1]);
        assert_ne!(result[0][0], result[0][1]);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn coverage_filter_drops_rare_classes() {
        let paths = vec![path_of(1), path_of(1)];
        let path = temp_dir().join("tangleweave_test_closure_coverage.bin");
        write_alignments(&path, &[]).unwrap();
        let allowed = HashSet::new();
        let result = closures(&paths, &allowed, &path, 2, 100).unwrap();
        // each path step is its own singleton class with coverage 1, below min 2
        assert!(result[0][0].is_none());
        assert!(result[1][0].is_none());
        let _ = std::fs::remove_file(&path);
    }
}
