//! Command-line surface (§6): two entry points, `assemble` and `resolve`,
//! both taking their arguments positionally per the reference executables'
//! own argv contract. No verbosity flag is added; diagnostic output follows
//! `RUST_LOG` (§10.1).

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "tangleweave",
    version = "0.1.0",
    about = "Sequence-graph closure builder and small-tangle resolver"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build closures from a string graph, a walk set, and an overlap stream
    Assemble(AssembleArgs),

    /// Resolve small tangles bounded by safe chains
    Resolve(ResolveArgs),
}

#[derive(Args)]
pub struct AssembleArgs {
    /// Input sequence graph
    pub graph_in: String,

    /// Input walk set
    pub walks_in: String,

    /// Input overlap stream
    pub overlaps_in: String,

    /// Output sequence graph
    pub graph_out: String,

    /// Output walk set
    pub walks_out: String,

    /// Worker count for the initial betweenness pass
    pub num_threads: usize,

    /// Maximum connected-component size the betweenness cut must reach
    pub max_group_size: usize,
}

#[derive(Args)]
pub struct ResolveArgs {
    /// Input sequence graph
    pub graph_in: String,

    /// Input walk set
    pub walks_in: String,

    /// Minimum total chain length to treat a chain as safe
    pub safe_chain_size: usize,

    /// Output sequence graph
    pub graph_out: String,

    /// Output walk set
    pub walks_out: String,
}

impl From<&AssembleArgs> for crate::configs::BetweennessConfig {
    fn from(args: &AssembleArgs) -> Self {
        Self {
            num_threads: args.num_threads.max(1),
            max_group_size: args.max_group_size,
        }
    }
}

impl From<&ResolveArgs> for crate::configs::TangleConfig {
    fn from(args: &ResolveArgs) -> Self {
        Self {
            safe_chain_size: args.safe_chain_size,
            ..Default::default()
        }
    }
}
