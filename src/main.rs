use std::thread;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, ValueEnum};
use tag_arena::link::{channel_pair, NullLink, PolicyLink};
use tag_arena::metrics::SessionSummary;
use tag_arena::policy::{Policy, PursuitPolicy, RandomPolicy};
use tag_arena::{Session, SessionConfig};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "tag-arena")]
#[command(about = "Headless seeker/hider arena driven by an in-process policy")]
struct Cli {
    /// Rounds to play (overrides SELF_PLAY_ROUNDS)
    #[arg(long)]
    rounds: Option<u32>,
    /// RNG seed for spawns and fallback controllers (overrides AI_SEED)
    #[arg(long)]
    seed: Option<u64>,
    /// Policy answering observation requests
    #[arg(long, value_enum, default_value_t = CliPolicy::Pursuit)]
    policy: CliPolicy,
    /// Run without a policy endpoint; every agent uses the fallback controller
    #[arg(long)]
    offline: bool,
    /// Emit transitions to the policy endpoint
    #[arg(long)]
    training: bool,
    /// Stop after this many physics ticks even if rounds remain
    #[arg(long, default_value_t = 1_000_000)]
    max_ticks: u64,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum CliPolicy {
    Random,
    Pursuit,
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let mut config = SessionConfig::from_env().context("invalid arena configuration")?;
    if let Some(rounds) = cli.rounds {
        config.rounds = rounds;
    }
    if let Some(seed) = cli.seed {
        config.seed = seed;
    }
    if cli.training {
        config.training_mode = true;
    }
    if cli.offline {
        config.policy_enabled = false;
    }

    let summary = if cli.offline {
        run(config, NullLink::new(), cli.max_ticks)?
    } else {
        let (link, endpoint) = channel_pair();
        let mut policy: Box<dyn Policy> = match cli.policy {
            CliPolicy::Random => Box::new(RandomPolicy::new(config.seed, 0.05)),
            CliPolicy::Pursuit => Box::new(PursuitPolicy::new()),
        };
        let server = thread::spawn(move || endpoint.serve(policy.as_mut()));
        let summary = run(config, link, cli.max_ticks)?;
        let stats = server
            .join()
            .map_err(|_| anyhow!("policy thread panicked"))?;
        info!(
            requests = stats.requests,
            transitions = stats.transitions,
            "Policy endpoint closed"
        );
        summary
    };

    println!("{summary}");
    Ok(())
}

/// Plays the configured number of rounds. The link is dropped on return,
/// which lets a channel endpoint shut down.
fn run<L: PolicyLink>(config: SessionConfig, link: L, max_ticks: u64) -> Result<SessionSummary> {
    let rounds = config.rounds;
    let mut session = Session::new(config, link)?;
    let finished = session.run(rounds, max_ticks);
    if finished.len() < rounds as usize {
        tracing::warn!(
            finished = finished.len(),
            requested = rounds,
            "Tick budget exhausted before all rounds finished"
        );
    }
    Ok(SessionSummary::from_rounds(&finished))
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}
