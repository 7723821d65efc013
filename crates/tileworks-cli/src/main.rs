use std::cell::Cell;
use std::path::PathBuf;
use std::rc::Rc;

use anyhow::{Context, Result};
use clap::Parser;
use tileworks_core::colony::Colony;
use tileworks_core::economy::Treasury;
use tileworks_core::event::{Event, EventKind};
use tileworks_core::fixed::{Fixed64, fixed64_to_f64};
use tileworks_core::query::ColonySummary;
use tileworks_data::{GameData, load_game_data};
use tracing_subscriber::EnvFilter;

// ---------------------------------------------------------------------------
// CLI definition
// ---------------------------------------------------------------------------

#[derive(Parser)]
#[command(name = "tileworks", about = "Headless Tileworks colony runner")]
struct Cli {
    /// Directory holding resources, buildings, colony and map files.
    #[arg(long, default_value = "./crates/tileworks-cli/data")]
    data: PathBuf,
    #[arg(long, default_value_t = 600)]
    ticks: u64,
    /// Seconds per tick.
    #[arg(long, default_value_t = 0.1)]
    dt: f64,
    /// Log a summary every N ticks (0 = only at the end).
    #[arg(long, default_value_t = 100)]
    report_every: u64,
    /// Starting treasury funds.
    #[arg(long, default_value_t = 1_000)]
    funds: i64,
}

// ---------------------------------------------------------------------------
// Run loop
// ---------------------------------------------------------------------------

fn build_colony(data: &GameData, funds: i64) -> Colony {
    let mut colony = Colony::new(
        &data.catalog,
        data.config.clone(),
        &data.terrain,
        Box::new(Treasury::new(funds)),
    );
    for placement in &data.placements {
        if let Some(def) = data.building(&placement.building) {
            let id = colony.place_unit(def, placement.position);
            tracing::debug!(
                building = %placement.building,
                x = placement.position.x,
                y = placement.position.y,
                ?id,
                "placed building"
            );
        }
    }
    colony
}

fn report(colony: &Colony, summary: &ColonySummary, cycles: u64) {
    let stock = summary
        .stock
        .iter()
        .filter(|(_, qty)| *qty > 0)
        .map(|(r, qty)| format!("{}={qty}", colony.catalog().name(*r)))
        .collect::<Vec<_>>()
        .join(" ");
    tracing::info!(
        tick = summary.tick,
        elapsed = fixed64_to_f64(summary.elapsed),
        funds = summary.funds,
        volume = fixed64_to_f64(summary.current_volume),
        capacity = fixed64_to_f64(summary.total_capacity),
        workers = summary.worker_count,
        unemployed = summary.unemployed,
        satisfaction = fixed64_to_f64(summary.satisfaction),
        producing = summary.producing,
        units = summary.units,
        cycles,
        %stock,
        "colony"
    );
}

fn run(cli: &Cli) -> Result<()> {
    let data = load_game_data(&cli.data)
        .with_context(|| format!("loading game data from {}", cli.data.display()))?;
    let dt = Fixed64::checked_from_num(cli.dt)
        .filter(|dt| *dt >= Fixed64::ZERO)
        .with_context(|| format!("invalid --dt {}", cli.dt))?;

    let mut colony = build_colony(&data, cli.funds);

    let cycles = Rc::new(Cell::new(0u64));
    let counter = Rc::clone(&cycles);
    colony.on_event(
        EventKind::CycleCompleted,
        Box::new(move |event| {
            if let Event::CycleCompleted { quantity, .. } = event {
                counter.set(counter.get() + u64::from(*quantity));
            }
        }),
    );

    for _ in 0..cli.ticks {
        if !colony.step(dt) {
            tracing::warn!(tick = colony.tick(), "colony halted");
            break;
        }
        if cli.report_every > 0 && colony.tick() % cli.report_every == 0 {
            report(&colony, &colony.summary(), cycles.get());
        }
    }

    report(&colony, &colony.summary(), cycles.get());
    for snap in colony.snapshots() {
        tracing::info!(
            name = %snap.name,
            state = ?snap.state,
            efficiency = fixed64_to_f64(snap.efficiency),
            progress = fixed64_to_f64(snap.progress),
            workers = snap.workers,
            maintenance = snap.maintenance,
            output_blocked = snap.output_blocked,
            "unit"
        );
    }
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();
    run(&cli)
}
