//! Command line arguments for the `abla-tool` binary.

use std::path::PathBuf;

use abla_params::{ActivationRule, NetworkKind, NetworkParams};
use argh::FromArgs;
use tracing::*;

/// Args.
#[derive(FromArgs)]
pub(crate) struct Args {
    #[argh(
        option,
        description = "preset network name [mainnet, testnet3, testnet4, scalenet, chipnet, regtest] (default mainnet)",
        short = 'n'
    )]
    pub(crate) network: Option<String>,

    #[argh(
        option,
        description = "network params file, .json or .toml (overrides --network)",
        short = 'p'
    )]
    pub(crate) params_file: Option<PathBuf>,

    #[argh(
        option,
        description = "activation rule override, \"height:N\" or \"mtp:T\"",
        short = 'a'
    )]
    pub(crate) activation: Option<String>,

    #[argh(subcommand)]
    pub(crate) subc: Subcommand,
}

#[derive(FromArgs, PartialEq, Debug)]
#[argh(subcommand)]
pub(crate) enum Subcommand {
    Params(SubcParams),
    Replay(SubcReplay),
    Lookahead(SubcLookahead),
}

/// Print the resolved network parameters.
#[derive(FromArgs, PartialEq, Debug)]
#[argh(
    subcommand,
    name = "params",
    description = "prints the network params and the derived config"
)]
pub(crate) struct SubcParams {
    #[argh(
        option,
        description = "output format [json, toml] (default json)",
        short = 'f'
    )]
    pub(crate) format: Option<String>,

    #[argh(option, description = "output file path (default stdout)", short = 'o')]
    pub(crate) output: Option<PathBuf>,
}

#[derive(FromArgs, PartialEq, Debug)]
#[argh(
    subcommand,
    name = "replay",
    description = "replays a block size history and prints each block's state as a JSON line"
)]
pub(crate) struct SubcReplay {
    #[argh(
        positional,
        description = "history file, one \"size [time]\" per line (default: --sizes)"
    )]
    pub(crate) input: Option<PathBuf>,

    #[argh(option, description = "comma separated block sizes", short = 's')]
    pub(crate) sizes: Option<String>,

    #[argh(
        option,
        description = "genesis timestamp for blocks without one (default 0)"
    )]
    pub(crate) start_time: Option<u64>,

    #[argh(
        option,
        description = "seconds between blocks without a timestamp (default 600)"
    )]
    pub(crate) spacing: Option<u64>,

    #[argh(
        option,
        description = "configured block size floor (default the network's default block size)"
    )]
    pub(crate) floor: Option<u64>,
}

#[derive(FromArgs, PartialEq, Debug)]
#[argh(
    subcommand,
    name = "lookahead",
    description = "projects the worst-case limit some blocks ahead of a state"
)]
pub(crate) struct SubcLookahead {
    #[argh(
        option,
        description = "starting state as \"blocksize,epsilon,beta\" (default the initial state)"
    )]
    pub(crate) state: Option<String>,

    #[argh(
        option,
        description = "number of blocks to look ahead (default 2048)",
        short = 'c'
    )]
    pub(crate) count: Option<usize>,

    #[argh(switch, description = "do not cap limits at 2 GB")]
    pub(crate) uncapped: bool,
}

/// Resolves the network params from a params file or a preset, applying the
/// activation override.
pub(crate) fn resolve_network_params(args: &Args) -> anyhow::Result<NetworkParams> {
    let mut params = match (&args.params_file, &args.network) {
        (Some(path), _) => NetworkParams::load(path)?,
        (None, Some(name)) => NetworkParams::preset(name.parse::<NetworkKind>()?),
        (None, None) => NetworkParams::preset(NetworkKind::Mainnet),
    };

    if let Some(rule) = &args.activation {
        let rule: ActivationRule = rule.parse()?;
        info!(%rule, "overriding activation rule");
        params.activation = rule;
    }

    Ok(params)
}
