//! Orchestrator (C10): wires the `assemble` and `resolve` entry points
//! together from the component modules. Mirrors the reference executables'
//! own `main()` shape — sequential stages, a progress line per stage,
//! `Result<(), Box<dyn std::error::Error>>` at the boundary.

mod betweenness;
mod cli;
mod closure;
mod closure_edges;
mod configs;
mod emit;
mod errors;
mod filters;
mod graph;
mod overlaps;
mod poa;
mod tangle;
mod union_find;
mod utils;
mod walks;

use std::path::Path as FsPath;

use clap::Parser;
use cli::{Cli, Commands};

use configs::{BetweennessConfig, ClosureConfig, ClosureEdgeConfig, OverlapFilterConfig, TangleConfig};

fn run_assemble(args: &cli::AssembleArgs) -> Result<(), Box<dyn std::error::Error>> {
    let overlap_config = OverlapFilterConfig::default();
    let betweenness_config = BetweennessConfig::from(args);
    let closure_config = ClosureConfig::default();
    let edge_config = ClosureEdgeConfig::default();

    let graph_in = FsPath::new(&args.graph_in);
    let walks_in = FsPath::new(&args.walks_in);
    let overlaps_in = FsPath::new(&args.overlaps_in);

    let mut original_graph = graph::load_graph(graph_in)?;
    original_graph.confirm_doublesided_edges();
    let paths = walks::load_walks(walks_in)?;
    log::info!(
        "loaded graph with {} nodes, {} walks",
        original_graph.nodes.len(),
        paths.len()
    );

    let longest = filters::pick_longest_per_read(&paths, overlaps_in, overlap_config.max_num)?;
    let allowed = betweenness::pick_cut_alignments(
        &paths,
        &longest,
        overlaps_in,
        betweenness_config.num_threads,
        betweenness_config.max_group_size,
    )?;

    let class_of = closure::closures(
        &paths,
        &allowed,
        overlaps_in,
        closure_config.min_coverage,
        closure_config.max_coverage,
    )?;

    let mut coverage = closure_edges::primary_adjacency(&paths, &class_of);
    closure_edges::bridge_tips(&paths, &class_of, &mut coverage, edge_config.tip_bridge_min_coverage);
    for &(max_removable_cov, fraction) in &edge_config.chimeric_passes {
        closure_edges::remove_chimeric_edges(&mut coverage, max_removable_cov, fraction);
    }

    let representative = closure_edges::representative_nodes(&paths, &class_of);
    let edge_overlaps = closure_edges::determine_closure_overlaps(&coverage, &representative, &original_graph);

    let new_graph = emit::get_graph(&original_graph, &paths, &class_of, &edge_overlaps);
    let new_paths = emit::remap_walks(&paths, &class_of, &coverage);

    graph::save_graph(&new_graph, FsPath::new(&args.graph_out))?;
    walks::save_walks(&new_paths, FsPath::new(&args.walks_out))?;
    log::info!(
        "assemble complete: {} nodes, {} walks written",
        new_graph.nodes.len(),
        new_paths.len()
    );
    Ok(())
}

fn run_resolve(args: &cli::ResolveArgs) -> Result<(), Box<dyn std::error::Error>> {
    let tangle_config = TangleConfig::from(args);

    let graph_in = FsPath::new(&args.graph_in);
    let walks_in = FsPath::new(&args.walks_in);

    let mut graph = graph::load_graph(graph_in)?;
    graph.confirm_doublesided_edges();
    let paths = walks::load_walks(walks_in)?;
    log::info!(
        "loaded graph with {} nodes, {} walks",
        graph.nodes.len(),
        paths.len()
    );

    let safe_chains = tangle::get_safe_chains(&graph, tangle_config.safe_chain_size);
    let belongs = tangle::get_chain_belongers(&graph);
    let components = tangle::get_components(&graph, &belongs, &safe_chains);

    let (resolved, unresolvable, too_big, removed_ids) = poa::resolve_components_and_replace_paths(
        &mut graph,
        &paths,
        components,
        &belongs,
        &safe_chains,
        &tangle_config,
    );
    log::info!("tangles: {resolved} resolved, {unresolvable} unresolvable, {too_big} too large");

    let new_paths = poa::remap_resolved_walks(&paths, &graph, &removed_ids);

    graph::save_graph(&graph, FsPath::new(&args.graph_out))?;
    walks::save_walks(&new_paths, FsPath::new(&args.walks_out))?;
    log::info!(
        "resolve complete: {} nodes, {} walks written",
        graph.nodes.len(),
        new_paths.len()
    );
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let cli = Cli::parse();

    let result = match &cli.command {
        Commands::Assemble(args) => run_assemble(args),
        Commands::Resolve(args) => run_resolve(args),
    };

    if let Err(err) = &result {
        log::error!("{err}");
    }
    result
}
