//! Overlap pre-filters (C3).
//!
//! Every filter below is grounded directly on the function of the same name
//! in `AssembleByAlignment.cpp`; see SPEC_FULL.md §4.2 and §10.5 for why all
//! six are exposed as independently callable operations even though the
//! reference pipeline's default `main()` only chains a subset of them.

use std::collections::HashSet;
use std::path::Path as FsPath;

use crate::errors::Result;
use crate::graph::Path;
use crate::overlaps::{stream_alignments, Alignment};

pub type OverlapKey = (usize, usize);

/// `doubleAlignments`: emit each overlap alongside an orientation-flipped
/// copy (every aligned pair's `leftReverse`/`rightReverse` negated).
pub fn double_alignments(alns: &[Alignment]) -> Vec<Alignment> {
    let mut result = Vec::with_capacity(alns.len() * 2);
    for aln in alns {
        result.push(aln.clone());
        let mut flipped = aln.clone();
        for pair in flipped.aligned_pairs.iter_mut() {
            pair.left_reverse = !pair.left_reverse;
            pair.right_reverse = !pair.right_reverse;
        }
        result.push(flipped);
    }
    log::info!("{} alignments after doubling", result.len());
    result
}

/// `removeContained`. Mirrors the source's `continuousEnd`-array check
/// exactly, including the two sites that test `leftEnd`/`rightEnd` against
/// the index one step before the range's start rather than purely the
/// contiguous-reach array (SPEC_FULL.md §9 open question (c) — kept for test
/// compatibility with the reference behavior, flagged there as suspect).
pub fn remove_contained(paths: &[Path], original: &[Alignment]) -> Vec<Alignment> {
    let mut continuous_end: Vec<Vec<usize>> =
        paths.iter().map(|p| vec![0usize; p.position.len()]).collect();
    for aln in original {
        for i in aln.left_start..=aln.left_end {
            continuous_end[aln.left_path][i] = continuous_end[aln.left_path][i].max(aln.left_end);
        }
        for i in aln.right_start..=aln.right_end {
            continuous_end[aln.right_path][i] =
                continuous_end[aln.right_path][i].max(aln.right_end);
        }
    }
    let mut result = Vec::new();
    for aln in original {
        if continuous_end[aln.left_path][aln.left_start] > aln.left_end {
            continue;
        }
        if aln.left_start > 0 && continuous_end[aln.left_path][aln.left_start - 1] >= aln.left_end
        {
            continue;
        }
        if continuous_end[aln.right_path][aln.right_start] > aln.right_end {
            continue;
        }
        if aln.right_start > 0
            && continuous_end[aln.right_path][aln.right_start - 1] >= aln.right_end
        {
            continue;
        }
        result.push(aln.clone());
    }
    log::info!("{} alignments after removing contained", result.len());
    result
}

fn overall_right_reverse(aln: &Alignment) -> bool {
    aln.aligned_pairs.first().map(|p| p.right_reverse).unwrap_or(false)
}

/// `removeNonDovetails`.
pub fn remove_non_dovetails(paths: &[Path], alns: &[Alignment]) -> Vec<Alignment> {
    let mut result = Vec::new();
    for aln in alns {
        if aln.left_start == 0 {
            continue;
        }
        if aln.left_end != paths[aln.left_path].position.len() - 1 {
            continue;
        }
        if overall_right_reverse(aln) {
            if aln.right_start == 0 {
                continue;
            }
            if aln.right_end != paths[aln.right_path].position.len() - 1 {
                continue;
            }
        } else {
            if aln.right_start != 0 {
                continue;
            }
            if aln.right_end == paths[aln.right_path].position.len() - 1 {
                continue;
            }
        }
        result.push(aln.clone());
    }
    log::info!("{} alignments after removing non-dovetails", result.len());
    result
}

/// `removeHighCoverageAlignments`.
pub fn remove_high_coverage(paths: &[Path], alns: &[Alignment], max_coverage: usize) -> Vec<Alignment> {
    let mut alns_per_read: Vec<Vec<usize>> = vec![Vec::new(); paths.len()];
    let mut valid = vec![true; alns.len()];
    for (i, aln) in alns.iter().enumerate() {
        alns_per_read[aln.left_path].push(i);
        alns_per_read[aln.right_path].push(i);
    }
    for (p, indices) in alns_per_read.iter().enumerate() {
        let len = paths[p].position.len();
        let mut start_count = vec![0usize; len];
        let mut end_count = vec![0usize; len];
        for &idx in indices {
            let aln = &alns[idx];
            if aln.left_path == p {
                start_count[aln.left_start] += 1;
                end_count[aln.left_end] += 1;
            } else {
                start_count[aln.right_start] += 1;
                end_count[aln.right_end] += 1;
            }
        }
        let mut coverage = vec![0usize; len];
        coverage[0] = start_count[0];
        for j in 1..len {
            coverage[j] = coverage[j - 1] + start_count[j] - end_count[j - 1];
        }
        for &idx in indices {
            let aln = &alns[idx];
            let (start, end) = if aln.left_path == p {
                (aln.left_start, aln.left_end)
            } else {
                (aln.right_start, aln.right_end)
            };
            let ok = (start..=end).any(|j| coverage[j] <= max_coverage);
            if !ok {
                valid[idx] = false;
            }
        }
    }
    let result: Vec<Alignment> = alns
        .iter()
        .zip(valid.iter())
        .filter(|(_, &v)| v)
        .map(|(a, _)| a.clone())
        .collect();
    log::info!("{} after removing high coverage alignments", result.len());
    result
}

/// `pickLowestErrorPerRead`: per path, cap at `max_num` overlaps retaining
/// those with the highest identity; an overlap survives if kept by either
/// incident path (may appear twice in the result, matching the source).
pub fn pick_lowest_error_per_read(
    paths: &[Path],
    alns: &[Alignment],
    max_num: usize,
) -> Vec<Alignment> {
    let mut per_read: Vec<Vec<Alignment>> = vec![Vec::new(); paths.len()];
    for aln in alns {
        per_read[aln.left_path].push(aln.clone());
        per_read[aln.right_path].push(aln.clone());
    }
    let mut result = Vec::new();
    for bucket in per_read.iter_mut() {
        if bucket.len() > max_num {
            bucket.sort_by(|a, b| a.alignment_identity.partial_cmp(&b.alignment_identity).unwrap());
            let start = bucket.len() - max_num;
            result.extend(bucket[start..].iter().cloned());
        } else {
            result.extend(bucket.iter().cloned());
        }
    }
    log::info!("{} alignments after picking lowest error", result.len());
    result
}

fn by_match_length(alns: &[Alignment], a: usize, b: usize) -> std::cmp::Ordering {
    alns[a].alignment_length.cmp(&alns[b].alignment_length)
}

fn by_quality(alns: &[Alignment], a: usize, b: usize) -> std::cmp::Ordering {
    alns[a]
        .alignment_identity
        .partial_cmp(&alns[b].alignment_identity)
        .unwrap_or(std::cmp::Ordering::Equal)
}

/// `pickLongestPerRead`: streams the overlap file directly (overlap records
/// are far larger than the path-pair keys this returns, so `alignedPairs` is
/// dropped immediately after streaming, matching the source's own
/// `std::swap` to discard it early).
pub fn pick_longest_per_read(
    paths: &[Path],
    aln_file: &FsPath,
    max_num: usize,
) -> Result<HashSet<OverlapKey>> {
    let mut alns: Vec<Alignment> = Vec::new();
    stream_alignments(aln_file, |aln| {
        let mut a = aln.clone();
        a.aligned_pairs.clear();
        alns.push(a);
    })?;

    let mut left_per_read: Vec<Vec<usize>> = vec![Vec::new(); paths.len()];
    let mut right_per_read: Vec<Vec<usize>> = vec![Vec::new(); paths.len()];
    let mut picked = vec![0u8; alns.len()];
    for (i, aln) in alns.iter().enumerate() {
        if aln.left_start == 0 {
            left_per_read[aln.left_path].push(i);
        }
        if aln.left_end == paths[aln.left_path].position.len() - 1 {
            right_per_read[aln.left_path].push(i);
        }
        if aln.right_start == 0 {
            left_per_read[aln.right_path].push(i);
        }
        if aln.right_end == paths[aln.right_path].position.len() - 1 {
            right_per_read[aln.right_path].push(i);
        }
    }

    let top_k = |list: &[usize], k: usize| -> Vec<usize> {
        let start = list.len().saturating_sub(k);
        list[start..].to_vec()
    };

    for i in 0..paths.len() {
        left_per_read[i].sort_by(|&a, &b| by_match_length(&alns, a, b));
        right_per_read[i].sort_by(|&a, &b| by_match_length(&alns, a, b));
        let mut picked_here: HashSet<usize> = HashSet::new();
        picked_here.extend(top_k(&left_per_read[i], max_num));
        picked_here.extend(top_k(&right_per_read[i], max_num));
        for idx in &picked_here {
            picked[*idx] += 1;
        }

        left_per_read[i].sort_by(|&a, &b| by_quality(&alns, a, b));
        right_per_read[i].sort_by(|&a, &b| by_quality(&alns, a, b));
        picked_here.clear();
        picked_here.extend(top_k(&left_per_read[i], max_num));
        picked_here.extend(top_k(&right_per_read[i], max_num));
        for idx in &picked_here {
            picked[*idx] += 1;
        }
    }

    let mut result: HashSet<OverlapKey> = HashSet::new();
    for (i, aln) in alns.iter().enumerate() {
        if picked[i] == 4 {
            result.insert((aln.left_path, aln.right_path));
        }
    }
    log::info!("{} alignments after picking longest", result.len());

    let mut check_stack: Vec<usize> = Vec::new();
    for i in 0..paths.len() {
        let count_left = left_per_read[i]
            .iter()
            .filter(|&&j| result.contains(&(alns[j].left_path, alns[j].right_path)))
            .count();
        let count_right = right_per_read[i]
            .iter()
            .filter(|&&j| result.contains(&(alns[j].left_path, alns[j].right_path)))
            .count();
        if count_left != count_right {
            check_stack.push(i);
        }
    }
    while let Some(i) = check_stack.pop() {
        let mut count_left = 0usize;
        let mut count_right = 0usize;
        let mut last_left = 0usize;
        let mut last_right = 0usize;
        for (j, &idx) in left_per_read[i].iter().enumerate() {
            if result.contains(&(alns[idx].left_path, alns[idx].right_path)) {
                last_left = j;
                count_left += 1;
            }
        }
        for (j, &idx) in right_per_read[i].iter().enumerate() {
            if result.contains(&(alns[idx].left_path, alns[idx].right_path)) {
                last_right = j;
                count_right += 1;
            }
        }
        let mut j = last_right;
        while j > 0 && (count_right as f64) > (count_left as f64) * 1.2 {
            let idx = right_per_read[i][j];
            let key = (alns[idx].left_path, alns[idx].right_path);
            if result.remove(&key) {
                count_right -= 1;
                check_stack.push(key.0);
                check_stack.push(key.1);
            }
            j -= 1;
        }
        let mut j = last_left;
        while j > 0 && (count_left as f64) > (count_right as f64) * 1.2 {
            let idx = left_per_read[i][j];
            let key = (alns[idx].left_path, alns[idx].right_path);
            if result.remove(&key) {
                count_left -= 1;
                check_stack.push(key.0);
                check_stack.push(key.1);
            }
            j -= 1;
        }
    }
    log::info!("{} alignments after converging sides", result.len());
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::overlaps::AlignedPair;

    fn path_of(len: usize) -> Path {
        Path {
            name: "p".to_string(),
            position: vec![crate::graph::NodePos::new(0, true); len],
        }
    }

    fn aln(left_path: usize, right_path: usize, ls: usize, le: usize, rs: usize, re: usize) -> Alignment {
        Alignment {
            left_path,
            right_path,
            left_start: ls,
            left_end: le,
            right_start: rs,
            right_end: re,
            aligned_pairs: vec![AlignedPair {
                left_index: ls,
                left_reverse: false,
                right_index: rs,
                right_reverse: false,
            }],
            alignment_length: le - ls + 1,
            alignment_identity: 0.9,
        }
    }

    #[test]
    fn double_alignments_flips_orientation_and_doubles_count() {
        let alns = vec![aln(0, 1, 0, 2, 0, 2)];
        let doubled = double_alignments(&alns);
        assert_eq!(doubled.len(), 2);
        assert!(!doubled[0].aligned_pairs[0].left_reverse);
        assert!(doubled[1].aligned_pairs[0].left_reverse);
    }

    #[test]
    fn remove_contained_drops_subset_ranges() {
        let paths = vec![path_of(5), path_of(5)];
        let big = aln(0, 1, 0, 4, 0, 4);
        let contained = aln(0, 1, 1, 2, 1, 2);
        let result = remove_contained(&paths, &[big.clone(), contained]);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].left_start, 0);
    }

    #[test]
    fn remove_non_dovetails_requires_extremity_touch() {
        let paths = vec![path_of(3), path_of(3)];
        // touches end of left path, start of right path: dovetail, kept
        let good = aln(0, 1, 1, 2, 0, 1);
        let result = remove_non_dovetails(&paths, &[good]);
        assert_eq!(result.len(), 1);
    }
}
