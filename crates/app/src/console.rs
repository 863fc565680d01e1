//! Headless admin console: a blocking loop that reads JSON commands from
//! stdin and writes one JSON response per line to stdout.
//!
//! Each input line is an object with a `"cmd"` discriminator, e.g.
//! `{"cmd":"reserve","x":3,"z":-2,"blocked":true}`. The app is updated once
//! after every command so queued store writes keep draining. Logs go to
//! stderr and never mix with the protocol.

use std::io::{BufRead, Write};

use bevy::prelude::*;
use grid::{
    CellStatus, Direction, GridBounds, GridCoordinate, GridRegistry, LastReconcileReport,
    ReconcileReport, ReconcileRequest, MAX_NEIGHBORHOOD_RADIUS,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum ConsoleCommand {
    Status { x: i32, z: i32 },
    Neighborhood { x: i32, z: i32, radius: i32 },
    Reserve { x: i32, z: i32, #[serde(default)] blocked: bool },
    Unreserve { x: i32, z: i32 },
    SetPrice { x: i32, z: i32, price: f64 },
    FindOwner { owner: Uuid },
    FindIsland { island_id: String },
    Expand { direction: String, amount: i32 },
    Shrink { direction: String, amount: i32 },
    Reconcile,
    Summary,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConsoleResponse {
    Ready,
    Cell {
        coordinate: GridCoordinate,
        status: CellStatus,
        owner_name: Option<String>,
        island_id: Option<String>,
        purchase_price: f64,
    },
    /// Row-major, north to south.
    Neighborhood { center: GridCoordinate, rows: Vec<Vec<CellStatus>> },
    Location { coordinate: Option<GridCoordinate> },
    Bounds { bounds: GridBounds },
    Report { report: ReconcileReport },
    Summary {
        bounds: GridBounds,
        tracked: usize,
        occupied: usize,
        reserved: usize,
        pending_writes: usize,
    },
    Goodbye,
    Error { message: String },
}

pub fn run_console(app: &mut App) {
    let stdin = std::io::stdin();
    let mut stdout = std::io::stdout().lock();

    write_response(&mut stdout, &ConsoleResponse::Ready);
    info!("Admin console ready, waiting for commands on stdin");

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(l) => l,
            Err(e) => {
                error!("stdin read error: {e}");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let response = match serde_json::from_str::<ConsoleCommand>(&line) {
            Ok(cmd) => process_command(cmd, app),
            Err(e) => ConsoleResponse::Error {
                message: format!("Parse error: {e}"),
            },
        };
        let done = response == ConsoleResponse::Goodbye;
        write_response(&mut stdout, &response);
        if done {
            break;
        }
    }
    info!("Admin console shutting down");
}

fn write_response(out: &mut impl Write, response: &ConsoleResponse) {
    match serde_json::to_string(response) {
        Ok(json) => {
            let _ = writeln!(out, "{json}");
            let _ = out.flush();
        }
        Err(e) => error!("Failed to encode console response: {e}"),
    }
}

fn parse_direction(text: &str) -> Result<Direction, ConsoleResponse> {
    Direction::parse(text).ok_or_else(|| ConsoleResponse::Error {
        message: format!("unknown direction '{text}'"),
    })
}

fn cell_response(registry: &GridRegistry, coord: GridCoordinate) -> ConsoleResponse {
    let cell = registry.cell(coord);
    ConsoleResponse::Cell {
        coordinate: coord,
        status: registry.status(coord),
        owner_name: cell.and_then(|c| c.owner_name()).map(str::to_string),
        island_id: cell.and_then(|c| c.island_id()).map(str::to_string),
        purchase_price: cell.map_or(0.0, |c| c.purchase_price()),
    }
}

pub fn process_command(cmd: ConsoleCommand, app: &mut App) -> ConsoleResponse {
    let response = match cmd {
        ConsoleCommand::Reconcile => {
            app.world_mut().send_event(ReconcileRequest);
            app.update();
            let report = app
                .world()
                .resource::<LastReconcileReport>()
                .report
                .clone()
                .unwrap_or_default();
            return ConsoleResponse::Report { report };
        }
        ConsoleCommand::Quit => return ConsoleResponse::Goodbye,
        cmd => apply(cmd, &mut app.world_mut().resource_mut::<GridRegistry>()),
    };
    app.update();
    response
}

fn apply(cmd: ConsoleCommand, registry: &mut GridRegistry) -> ConsoleResponse {
    match cmd {
        ConsoleCommand::Status { x, z } => cell_response(registry, GridCoordinate::new(x, z)),
        ConsoleCommand::Neighborhood { x, z, radius } => {
            let side = (0..=MAX_NEIGHBORHOOD_RADIUS)
                .contains(&radius)
                .then(|| radius.checked_mul(2)?.checked_add(1))
                .flatten()
                .and_then(|side| usize::try_from(side).ok());
            let Some(side) = side else {
                return ConsoleResponse::Error {
                    message: format!(
                        "radius must be between 0 and {MAX_NEIGHBORHOOD_RADIUS}, got {radius}"
                    ),
                };
            };
            let center = GridCoordinate::new(x, z);
            let rows = registry
                .neighborhood(center, radius)
                .chunks(side)
                .map(|row| row.iter().map(|(_, status)| *status).collect())
                .collect();
            ConsoleResponse::Neighborhood { center, rows }
        }
        ConsoleCommand::Reserve { x, z, blocked } => {
            let coord = GridCoordinate::new(x, z);
            registry.reserve(coord, blocked);
            cell_response(registry, coord)
        }
        ConsoleCommand::Unreserve { x, z } => {
            let coord = GridCoordinate::new(x, z);
            registry.unreserve(coord);
            cell_response(registry, coord)
        }
        ConsoleCommand::SetPrice { x, z, price } => {
            let coord = GridCoordinate::new(x, z);
            registry.set_purchase_price(coord, price);
            cell_response(registry, coord)
        }
        ConsoleCommand::FindOwner { owner } => ConsoleResponse::Location {
            coordinate: registry.find_coordinate_for_owner(owner),
        },
        ConsoleCommand::FindIsland { island_id } => ConsoleResponse::Location {
            coordinate: registry.find_coordinate_for_island(&island_id),
        },
        ConsoleCommand::Expand { direction, amount } => {
            resize(registry, &direction, amount, GridRegistry::expand)
        }
        ConsoleCommand::Shrink { direction, amount } => {
            resize(registry, &direction, amount, GridRegistry::shrink)
        }
        ConsoleCommand::Summary => ConsoleResponse::Summary {
            bounds: registry.bounds(),
            tracked: registry.total_tracked(),
            occupied: registry.occupied_count(),
            reserved: registry.reserved_count(),
            pending_writes: registry.pending_persistence(),
        },
        ConsoleCommand::Reconcile | ConsoleCommand::Quit => ConsoleResponse::Error {
            message: "handled by the app loop".to_string(),
        },
    }
}

fn resize(
    registry: &mut GridRegistry,
    direction: &str,
    amount: i32,
    op: fn(&mut GridRegistry, Direction, i32) -> Result<GridBounds, grid::BoundsError>,
) -> ConsoleResponse {
    let direction = match parse_direction(direction) {
        Ok(d) => d,
        Err(response) => return response,
    };
    match op(registry, direction, amount) {
        Ok(bounds) => ConsoleResponse::Bounds { bounds },
        Err(e) => ConsoleResponse::Error {
            message: e.to_string(),
        },
    }
}
