//! Offline tool for inspecting the adaptive block size limit.
//!
//! Dumps network parameters, replays block size histories through the chain
//! tracker and projects lookahead limits from a given state.  Nothing here
//! touches a node's data directory.

mod args;
mod cmd;

use std::{io, process};

use tracing_subscriber::{EnvFilter, fmt};

fn main() {
    fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let args: args::Args = argh::from_env();
    if let Err(e) = run(args) {
        eprintln!("ERROR\n{e:?}");
        process::exit(1);
    }
}

fn run(args: args::Args) -> anyhow::Result<()> {
    let params = args::resolve_network_params(&args)?;
    cmd::exec_subc(args.subc, &params)
}
