//! Demo binary: seeds a small catalog, runs a scripted economy session and
//! one accrual sweep, printing JSON receipts along the way.
//!
//! The real deployment drives the engine from a messaging front-end; this
//! binary exists to exercise the full operation surface end to end.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use cardbank::{
    AccrualSweep, ConfigLoader, EconomyEngine, ItemDefinition, ItemId, ManualClock, PlayerId,
    Rarity, StaticCatalog, TradeLeg,
};

#[derive(Parser, Debug)]
#[command(name = "cardbank", about = "Economy ledger and settlement engine demo")]
struct Args {
    /// Optional TOML config file (defaults + CARDBANK_* env otherwise).
    #[arg(short, long)]
    config: Option<String>,

    /// Seed for deterministic pack draws.
    #[arg(long, default_value_t = 2024)]
    seed: u64,

    /// Simulated hours between the pack opening and settlement.
    #[arg(long, default_value_t = 2)]
    hours: i64,
}

fn demo_catalog() -> Vec<ItemDefinition> {
    let card = |id: u64, name: &str, rarity: Rarity| ItemDefinition {
        id: ItemId(id),
        name: name.to_string(),
        rarity,
    };
    vec![
        card(1, "Meadow Sprout", Rarity::Common),
        card(2, "River Otter", Rarity::Common),
        card(3, "Storm Raven", Rarity::Rare),
        card(4, "Gloom Warden", Rarity::Epic),
        card(5, "Ember Dragon", Rarity::Legendary),
    ]
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let mut loader = ConfigLoader::new();
    if let Some(path) = &args.config {
        loader = loader.with_path(path);
    }
    let config = loader.load()?;
    info!(?config, "configuration loaded");

    // A manual clock lets the demo fast-forward instead of sleeping.
    let clock = Arc::new(ManualClock::new(1_700_000_000));
    let catalog = StaticCatalog::with_items(config.income.clone(), demo_catalog());
    let sweep_interval = Duration::from_secs(config.sweep.interval_secs);
    let engine = Arc::new(EconomyEngine::with_rng_seed(
        config,
        catalog,
        clock.clone(),
        args.seed,
    ));

    let alice = PlayerId::from("alice");
    let bob = PlayerId::from("bob");

    // Both players open their free pack.
    let grant = engine.open_pack(&alice, None)?;
    println!("alice's pack: {}", serde_json::to_string_pretty(&grant)?);
    let grant = engine.open_pack(&bob, None)?;
    println!("bob's pack: {}", serde_json::to_string_pretty(&grant)?);

    // A rejected second open, for the receipt.
    clock.advance(600);
    if let Err(err) = engine.open_pack(&alice, None) {
        println!("alice retries too early: {}", err);
    }

    // Let passive income accumulate, then settle via the sweep path.
    clock.advance(args.hours * 3600);
    let report = AccrualSweep::new(engine.clone()).run_once();
    println!("sweep report: {}", serde_json::to_string_pretty(&report)?);

    // Marketplace: alice lists her first card, bob buys it.
    let profile = engine.profile(&alice)?;
    if let (Some(line), Ok(buyer)) = (profile.holdings.first(), engine.profile(&bob)) {
        let price = buyer.balance.max(1);
        let listing = engine.list(&alice, line.item, 1, price)?;
        println!("listing: {}", serde_json::to_string_pretty(&listing)?);
        match engine.buy(&bob, listing.id) {
            Ok(outcome) => println!("purchase: {}", serde_json::to_string_pretty(&outcome)?),
            Err(err) => println!("bob could not buy: {}", err),
        }
    }

    // A trade: bob offers his first card for nothing in return (a gift).
    let bob_profile = engine.profile(&bob)?;
    if let Some(line) = bob_profile.holdings.first() {
        let trade = engine.propose(&bob, &alice, vec![TradeLeg::new(line.item, 1)], vec![])?;
        let outcome = engine.accept(&alice, trade.id)?;
        println!("trade: {}", serde_json::to_string_pretty(&outcome)?);
    }

    for player in [&alice, &bob] {
        let profile = engine.profile(player)?;
        println!("final {}: {}", player, serde_json::to_string_pretty(&profile)?);
    }

    // Show the background sweep spin up and shut down cleanly.
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async {
        let (handle, shutdown) = AccrualSweep::new(engine.clone()).spawn(sweep_interval);
        shutdown.send(true).ok();
        handle.await.ok();
    });

    Ok(())
}
