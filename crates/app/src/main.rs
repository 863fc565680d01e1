mod console;
mod snapshot;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use bevy::app::ScheduleRunnerPlugin;
use bevy::log::LogPlugin;
use bevy::prelude::*;
use clap::Parser;

use grid::{GridPlugin, GridSettings, LastReconcileReport, ReconcileRequest};
use save::FileCellStore;
use snapshot::IslandSnapshot;

#[derive(Parser, Debug)]
#[command(name = "island_selector")]
#[command(about = "Island grid registry server")]
#[command(version)]
struct Cli {
    /// Grid settings (JSON). Defaults are used when the file is missing.
    #[arg(long, default_value = "config/grid.json")]
    config: PathBuf,

    /// Island snapshot exported by the world subsystem.
    #[arg(long, default_value = "config/islands.json")]
    islands: PathBuf,

    /// Cell store file.
    #[arg(long, default_value = "data/cells.bin")]
    store: PathBuf,

    /// Load, reconcile, save, print the report and exit.
    #[arg(long, conflicts_with = "console")]
    once: bool,

    /// Read JSON admin commands from stdin.
    #[arg(long)]
    console: bool,

    /// Seconds between reconciliation passes in server mode (0 disables).
    #[arg(long, default_value_t = 300)]
    reconcile_every: u64,

    /// Server ticks per second.
    #[arg(long, default_value_t = 20)]
    tps: u32,
}

/// Repeating timer that sends `ReconcileRequest` in server mode.
#[derive(Resource)]
struct ReconcileTimer(Timer);

fn periodic_reconcile(
    time: Res<Time>,
    mut timer: ResMut<ReconcileTimer>,
    mut requests: EventWriter<ReconcileRequest>,
) {
    if timer.0.tick(time.delta()).just_finished() {
        requests.send(ReconcileRequest);
    }
}

fn main() -> AppExit {
    let cli = Cli::parse();

    let mut app = App::new();
    app.add_plugins((
        MinimalPlugins.set(ScheduleRunnerPlugin::run_loop(Duration::from_secs_f64(
            1.0 / f64::from(cli.tps.max(1)),
        ))),
        LogPlugin::default(),
    ));

    let settings = GridSettings::load_or_default(&cli.config);

    let source = match IslandSnapshot::load(&cli.islands) {
        Ok(snapshot) => snapshot.into_source(),
        Err(e) => {
            error!("{e}");
            return AppExit::error();
        }
    };

    let store = match FileCellStore::open(&cli.store) {
        Ok(store) => store,
        Err(e) => {
            error!("Cannot open cell store {}: {e}", cli.store.display());
            return AppExit::error();
        }
    };

    app.add_plugins(GridPlugin::new(settings, Arc::new(store)).with_source(Arc::new(source)));

    if cli.once {
        // Startup runs load + reconcile; the exit frame saves and flushes.
        app.update();
        app.world_mut().send_event(AppExit::Success);
        app.update();
        if let Some(report) = &app.world().resource::<LastReconcileReport>().report {
            match serde_json::to_string_pretty(report) {
                Ok(json) => println!("{json}"),
                Err(e) => error!("Failed to encode reconcile report: {e}"),
            }
        }
        return AppExit::Success;
    }

    if cli.console {
        app.update();
        console::run_console(&mut app);
        app.world_mut().send_event(AppExit::Success);
        app.update();
        return AppExit::Success;
    }

    if cli.reconcile_every > 0 {
        app.insert_resource(ReconcileTimer(Timer::new(
            Duration::from_secs(cli.reconcile_every),
            TimerMode::Repeating,
        )));
        app.add_systems(Update, periodic_reconcile);
    }
    info!("Island grid server running at {} tps", cli.tps.max(1));
    app.run()
}
