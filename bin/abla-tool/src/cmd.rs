//! Subcommand implementations.

use std::{fs, path::Path};

use abla_chain::{AblaChainTracker, BlockId, HeaderEntry, MemAblaStateDb};
use abla_msg_limits::LOOKAHEAD_BLOCKS;
use abla_params::{AblaConfig, NetworkParams};
use abla_state::{AblaState, AblaStateView};
use anyhow::{Context, bail};
use serde::Serialize;
use tracing::*;

use crate::args::{SubcLookahead, SubcParams, SubcReplay, Subcommand};

const DEFAULT_SPACING: u64 = 600;

pub(crate) fn exec_subc(cmd: Subcommand, params: &NetworkParams) -> anyhow::Result<()> {
    match cmd {
        Subcommand::Params(subc) => exec_params(subc, params),
        Subcommand::Replay(subc) => exec_replay(subc, params),
        Subcommand::Lookahead(subc) => exec_lookahead(subc, params),
    }
}

#[derive(Serialize)]
struct ParamsDump<'a> {
    params: &'a NetworkParams,
    config: &'a AblaConfig,
    initial_block_size_limit: u64,
}

fn exec_params(cmd: SubcParams, params: &NetworkParams) -> anyhow::Result<()> {
    let config = params.abla_config()?;

    let out = match cmd.format.as_deref().unwrap_or("json") {
        "json" => serde_json::to_string_pretty(&ParamsDump {
            params,
            config: &config,
            initial_block_size_limit: config.initial_block_size_limit(),
        })?,
        "toml" => params.to_toml_string()?,
        f => bail!("unsupported format: {f}"),
    };

    match cmd.output {
        Some(path) => {
            fs::write(&path, out + "\n")
                .with_context(|| format!("writing {}", path.display()))?;
            info!(path = %path.display(), "wrote params");
        }
        None => println!("{out}"),
    }
    Ok(())
}

/// One block of a replayed history.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
struct HistoryEntry {
    size: u64,
    time: Option<u64>,
}

/// Parses a history file.  Blank lines and lines starting with `#` are
/// skipped.
fn parse_history(input: &str) -> anyhow::Result<Vec<HistoryEntry>> {
    let mut out = Vec::new();
    for (lineno, line) in input.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let mut fields = line.split_whitespace();
        let parse = |s: &str| {
            s.parse::<u64>()
                .with_context(|| format!("line {}: bad number {s:?}", lineno + 1))
        };
        let size = match fields.next() {
            Some(s) => parse(s)?,
            None => continue,
        };
        let time = fields.next().map(parse).transpose()?;
        if fields.next().is_some() {
            bail!("line {}: trailing fields", lineno + 1);
        }
        out.push(HistoryEntry { size, time });
    }
    Ok(out)
}

fn parse_size_list(input: &str) -> anyhow::Result<Vec<HistoryEntry>> {
    input
        .split(',')
        .map(|s| {
            let size = s
                .trim()
                .parse()
                .with_context(|| format!("bad block size {s:?}"))?;
            Ok(HistoryEntry { size, time: None })
        })
        .collect()
}

fn load_history(cmd: &SubcReplay) -> anyhow::Result<Vec<HistoryEntry>> {
    match (&cmd.input, &cmd.sizes) {
        (Some(_), Some(_)) => bail!("pass either a history file or --sizes, not both"),
        (Some(path), None) => read_history_file(path),
        (None, Some(sizes)) => parse_size_list(sizes),
        (None, None) => bail!("no history given"),
    }
}

fn read_history_file(path: &Path) -> anyhow::Result<Vec<HistoryEntry>> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    parse_history(&contents)
}

#[derive(Serialize)]
struct ReplayRow {
    height: u64,
    time: u64,
    size: u64,

    /// Limit for the following block, after applying the floor.
    next_limit: u64,

    /// Block template size for the following block.
    template_size: u64,

    #[serde(skip_serializing_if = "Option::is_none")]
    abla: Option<AblaStateView>,
}

fn exec_replay(cmd: SubcReplay, params: &NetworkParams) -> anyhow::Result<()> {
    let config = params.abla_config()?;
    let history = load_history(&cmd)?;
    let floor = cmd.floor.unwrap_or(params.default_block_size);
    let spacing = cmd.spacing.unwrap_or(DEFAULT_SPACING);

    let mut tracker = AblaChainTracker::new(config, params.activation, MemAblaStateDb::new());
    let mut time = cmd.start_time.unwrap_or_default();
    let mut prev: Option<HeaderEntry> = None;

    for (height, block) in history.iter().enumerate() {
        if let Some(t) = block.time {
            time = t;
        } else if prev.is_some() {
            time = match time.checked_add(spacing) {
                Some(t) => t,
                None => bail!("block {height}: timestamp overflows u64"),
            };
        }

        let id = BlockId::from_u64(height as u64);
        let entry = match &prev {
            Some(parent) => HeaderEntry::child_of(parent, id, time, block.size),
            None => HeaderEntry::genesis(id, time, block.size),
        };
        tracker.add_header(entry)?;
        tracker.connect_block(id)?;

        let next_limit = tracker.next_block_size_limit(floor)?;
        let row = ReplayRow {
            height: height as u64,
            time,
            size: block.size,
            next_limit,
            template_size: params.generated_block_size(next_limit),
            abla: tracker.view_for(&id, floor)?,
        };
        println!("{}", serde_json::to_string(&row)?);
        prev = Some(entry);
    }

    let activation = tracker
        .activation_block()?
        .and_then(|id| tracker.index().get(&id).map(HeaderEntry::height));
    info!(
        blocks = history.len(),
        activation_height = ?activation,
        "replay finished"
    );
    Ok(())
}

/// Parses `blocksize,epsilon,beta`.
fn parse_state(s: &str) -> anyhow::Result<AblaState> {
    let fields = s
        .split(',')
        .map(|f| f.trim().parse::<u64>())
        .collect::<Result<Vec<_>, _>>()
        .with_context(|| format!("bad state {s:?}"))?;
    match fields[..] {
        [size, epsilon, beta] => Ok(AblaState::new(size, epsilon, beta)),
        _ => bail!("state needs three fields, got {}", fields.len()),
    }
}

#[derive(Serialize)]
struct LookaheadOutput {
    state: AblaState,
    count: usize,
    limit: u64,
    max_block_message_size: u64,
}

fn exec_lookahead(cmd: SubcLookahead, params: &NetworkParams) -> anyhow::Result<()> {
    let config = params.abla_config()?;
    let state = match &cmd.state {
        Some(s) => parse_state(s)?,
        None => AblaState::initial(&config, 0),
    };
    state
        .validate(&config)
        .with_context(|| format!("{state} is not valid for {config}"))?;

    let count = cmd.count.unwrap_or(LOOKAHEAD_BLOCKS);
    let limit = state.calc_lookahead_block_size_limit_with(&config, count, cmd.uncapped);
    let out = LookaheadOutput {
        state,
        count,
        limit,
        max_block_message_size: limit.saturating_mul(2),
    };
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use abla_params::{ActivationRule, NetworkKind};

    use super::*;

    #[test]
    fn test_parse_history() {
        let input = "# size time\n100 5\n\n200\n  300   7  \n";
        let got = parse_history(input).unwrap();
        assert_eq!(
            got,
            vec![
                HistoryEntry {
                    size: 100,
                    time: Some(5)
                },
                HistoryEntry {
                    size: 200,
                    time: None
                },
                HistoryEntry {
                    size: 300,
                    time: Some(7)
                },
            ]
        );

        assert!(parse_history("1 2 3").is_err());
        assert!(parse_history("abc").is_err());
    }

    #[test]
    fn test_parse_size_list() {
        let got = parse_size_list("1, 2,3").unwrap();
        assert_eq!(got.iter().map(|e| e.size).collect::<Vec<_>>(), vec![1, 2, 3]);
        assert!(parse_size_list("1,,2").is_err());
    }

    #[test]
    fn test_read_history_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "1000 1\n2000 2").unwrap();
        let got = read_history_file(file.path()).unwrap();
        assert_eq!(got.len(), 2);
        assert_eq!(got[1].time, Some(2));
    }

    #[test]
    fn test_parse_state() {
        assert_eq!(
            parse_state("1,16000000, 16000000").unwrap(),
            AblaState::new(1, 16_000_000, 16_000_000)
        );
        assert!(parse_state("1,2").is_err());
        assert!(parse_state("1,2,x").is_err());
    }

    #[test]
    fn test_replay_and_lookahead_run() {
        let mut params = NetworkParams::preset(NetworkKind::Regtest);
        params.activation = ActivationRule::Height { height: 1 };

        let replay = SubcReplay {
            input: None,
            sizes: Some("0,1000000,2000000".to_owned()),
            start_time: None,
            spacing: None,
            floor: None,
        };
        exec_replay(replay, &params).unwrap();

        let lookahead = SubcLookahead {
            state: Some("0,1,1".to_owned()),
            count: Some(10),
            uncapped: false,
        };
        assert!(exec_lookahead(lookahead, &params).is_err());
    }

    #[test]
    fn test_replay_rejects_time_overflow() {
        let params = NetworkParams::preset(NetworkKind::Regtest);
        let replay = SubcReplay {
            input: None,
            sizes: Some("1,2".to_owned()),
            start_time: Some(u64::MAX - 5),
            spacing: Some(10),
            floor: None,
        };
        let err = exec_replay(replay, &params).unwrap_err();
        assert!(err.to_string().contains("overflows"), "{err}");
    }
}
