//! Hex Marches - headless runner
//!
//! Sets up the opening board, keeps every idle caravan trading with the
//! farthest market it can find, and ends turns for a number of rounds,
//! printing what each sweep did.

use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use hex_marches::campaign::{hex_distance, TurnEvent};
use hex_marches::core::error::Result;
use hex_marches::core::types::{CellId, PlayerId};
use hex_marches::core::{set_rules, RulesConfig, SimRng};
use hex_marches::world::MerchantPhase;
use hex_marches::{apply_action, Action, Outcome, WorldModel};

/// Hex Marches - run the turn sweep headless
#[derive(Parser, Debug)]
#[command(name = "hex-marches")]
#[command(about = "Run a hex-grid strategy game without a presentation layer")]
struct Args {
    /// Grid height (overrides the rules file)
    #[arg(long)]
    rows: Option<i32>,

    /// Grid width (overrides the rules file)
    #[arg(long)]
    cols: Option<i32>,

    /// Rounds to play
    #[arg(long, default_value_t = 20)]
    rounds: u32,

    /// Random seed for reproducible runs
    #[arg(long)]
    seed: Option<u64>,

    /// TOML file overriding the default rules
    #[arg(long)]
    rules: Option<PathBuf>,

    /// Print events as JSON lines
    #[arg(long, default_value_t = false)]
    json: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("hex_marches=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let mut rules = match &args.rules {
        Some(path) => RulesConfig::load(path)?,
        None => RulesConfig::default(),
    };
    if let Some(rows) = args.rows {
        rules.rows = rows;
    }
    if let Some(cols) = args.cols {
        rules.cols = cols;
    }
    rules
        .validate()
        .map_err(hex_marches::core::ConfigError::Invalid)?;

    let mut world = WorldModel::initial(&rules);
    if set_rules(rules).is_err() {
        tracing::warn!("rules were already initialised; keeping the existing set");
    }

    let mut rng = match args.seed {
        Some(seed) => SimRng::seeded(seed),
        None => SimRng::from_entropy(),
    };

    tracing::info!(rows = world.rows, cols = world.cols, rounds = args.rounds, "game starting");

    for _ in 0..args.rounds {
        for _ in 0..2 {
            let actor = world.current_player;
            world = dispatch_idle_caravans(world, actor, &mut rng);

            let report = apply_action(&world, actor, &Action::EndTurn, &mut rng)?;
            if let Outcome::TurnEnded(events) = &report.outcome {
                print_events(report.world.turn, events, args.json)?;
            }
            world = report.world;
        }
    }

    if let Err(violation) = world.check_invariants() {
        tracing::warn!(%violation, "world invariant broken");
    }

    for player in &world.players {
        println!(
            "{}: {} gold, fear {:.0}, justice {:.0}",
            player.name, player.gold, player.reputation.fear, player.reputation.justice
        );
    }
    Ok(())
}

/// Send each idle caravan of `actor` to the farthest castle or completed fort
fn dispatch_idle_caravans(mut world: WorldModel, actor: PlayerId, rng: &mut SimRng) -> WorldModel {
    let idle: Vec<CellId> = world
        .cells
        .iter()
        .filter(|c| {
            c.merchant()
                .is_some_and(|m| m.owner == actor && m.phase == MerchantPhase::Idle)
        })
        .map(|c| c.id)
        .collect();

    for at in idle {
        let markets = world.cells_where(|c| c.is_trade_post() && c.id != at);
        let Some(destination) = markets.into_iter().max_by_key(|m| hex_distance(at, *m)) else {
            continue;
        };
        let action = Action::DispatchMerchant {
            merchant: at,
            destination,
        };
        match apply_action(&world, actor, &action, rng) {
            Ok(report) => world = report.world,
            Err(e) => tracing::warn!(%at, %destination, "dispatch refused: {}", e),
        }
    }
    world
}

fn print_events(turn: u32, events: &[TurnEvent], json: bool) -> Result<()> {
    for event in events {
        if json {
            println!("{}", serde_json::to_string(event)?);
        } else {
            println!("[round {}] {:?}", turn, event);
        }
    }
    Ok(())
}
