//! Small shared helpers.
//!
//! `reverse_complement` is grounded on `compress_graph.rs`'s function of the
//! same name, generalized from a unitig-assembly helper into the general
//! full-sequence RC used throughout closure emission and overlap recovery.

/// Reverse complement for ASCII DNA sequences (A,C,G,T,N, case-preserving).
pub fn reverse_complement(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.as_bytes().iter().rev() {
        let rc = match *c as char {
            'A' => 'T',
            'C' => 'G',
            'G' => 'C',
            'T' => 'A',
            'a' => 't',
            'c' => 'g',
            'g' => 'c',
            't' => 'a',
            'N' => 'N',
            'n' => 'n',
            other => other,
        };
        out.push(rc);
    }
    out
}

/// Longest suffix-of-`left`/prefix-of-`right` match up to `max_overlap`
/// bases. Mirrors `getLongestOverlap` in the reference implementation.
pub fn longest_overlap(left: &str, right: &str, max_overlap: usize) -> usize {
    let max_overlap = max_overlap.min(left.len()).min(right.len());
    for i in (1..=max_overlap).rev() {
        if left[left.len() - i..] == right[..i] {
            return i;
        }
    }
    0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rc_round_trips() {
        assert_eq!(reverse_complement("ACGTN"), "NACGT");
        assert_eq!(reverse_complement(&reverse_complement("ACGTACGT")), "ACGTACGT");
    }

    #[test]
    fn longest_overlap_finds_suffix_prefix() {
        assert_eq!(longest_overlap("AAACGT", "CGTTTT", 6), 3);
        assert_eq!(longest_overlap("AAAAAA", "TTTTTT", 6), 0);
    }
}
