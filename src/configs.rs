//! Per-stage configuration structs (§10.3).
//!
//! One struct per pipeline stage that has tunables, each carrying the
//! reference implementation's own hard-coded numeric defaults as a `Default`
//! impl, populated the rest of the way from parsed CLI args via the
//! `From<&XArgs>` impls in `cli.rs`.

/// C3 overlap pre-filters. `max_num` bounds both the lowest-error-per-read
/// cap and each of `pickLongestPerRead`'s four top-k sets; the reference
/// implementation hard-codes the same cap for both uses.
#[derive(Debug, Clone, Copy)]
pub struct OverlapFilterConfig {
    pub max_num: usize,
    pub max_coverage: usize,
}

impl Default for OverlapFilterConfig {
    fn default() -> Self {
        OverlapFilterConfig {
            max_num: 10,
            max_coverage: 10_000,
        }
    }
}

/// C4 betweenness cut engine. `num_threads` and `max_group_size` are always
/// supplied by the `assemble` CLI's required positional args; the `Default`
/// exists for library callers and tests.
#[derive(Debug, Clone, Copy)]
pub struct BetweennessConfig {
    pub num_threads: usize,
    pub max_group_size: usize,
}

impl Default for BetweennessConfig {
    fn default() -> Self {
        BetweennessConfig {
            num_threads: 4,
            max_group_size: 50,
        }
    }
}

/// C5 closure builder coverage filter.
#[derive(Debug, Clone, Copy)]
pub struct ClosureConfig {
    pub min_coverage: usize,
    pub max_coverage: usize,
}

impl Default for ClosureConfig {
    fn default() -> Self {
        ClosureConfig {
            min_coverage: 3,
            max_coverage: 10_000,
        }
    }
}

/// C6 closure edge builder: tip bridging threshold and the two chimeric-edge
/// filter passes, run in order.
#[derive(Debug, Clone)]
pub struct ClosureEdgeConfig {
    pub tip_bridge_min_coverage: usize,
    pub chimeric_passes: Vec<(usize, f64)>,
}

impl Default for ClosureEdgeConfig {
    fn default() -> Self {
        ClosureEdgeConfig {
            tip_bridge_min_coverage: 3,
            chimeric_passes: vec![(5, 0.2), (10, 0.1)],
        }
    }
}

/// C8/C9 tangle finder and resolver. `safe_chain_size` is always supplied by
/// the `resolve` CLI's required positional arg.
#[derive(Debug, Clone, Copy)]
pub struct TangleConfig {
    pub safe_chain_size: usize,
    pub oversize_guard_bp: usize,
}

impl Default for TangleConfig {
    fn default() -> Self {
        TangleConfig {
            safe_chain_size: 5000,
            oversize_guard_bp: 5000,
        }
    }
}
