//! Matrix engine scenario runner
//!
//! Reads a JSON scenario (a config plus an ordered member list), replays
//! the registrations through the engine, and prints placements, closed
//! cycles, credits, and pool totals.
//!
//! Usage:
//!
//! ```text
//! matrix-engine scenario.json
//! matrix-engine < scenario.json
//! ```
//!
//! Scenario format:
//!
//! ```json
//! {
//!   "config": { "max_search_depth": 6 },
//!   "members": [
//!     { "id": "ROOT", "name": "Root" },
//!     { "id": "M1", "name": "First", "sponsor": "ROOT" }
//!   ]
//! }
//! ```

use std::fs;
use std::io::Read;
use std::process::ExitCode;

use serde::Deserialize;

use matrix_engine_core_rs::{
    EngineConfig, MatrixEngine, PoolType, RegistrationReport, SharedNotifier, SharedWallet,
};

#[derive(Debug, Deserialize)]
struct Scenario {
    #[serde(default)]
    config: EngineConfig,
    members: Vec<MemberEntry>,
}

#[derive(Debug, Deserialize)]
struct MemberEntry {
    id: String,
    name: String,
    #[serde(default)]
    sponsor: Option<String>,
}

fn read_scenario() -> Result<Scenario, String> {
    let mut args = std::env::args().skip(1);
    let raw = match args.next() {
        Some(path) => {
            fs::read_to_string(&path).map_err(|e| format!("cannot read {}: {}", path, e))?
        }
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .map_err(|e| format!("cannot read stdin: {}", e))?;
            buf
        }
    };
    serde_json::from_str(&raw).map_err(|e| format!("invalid scenario JSON: {}", e))
}

fn cents(amount: i64) -> String {
    format!("{}.{:02}", amount / 100, (amount % 100).abs())
}

fn print_report(report: &RegistrationReport) {
    match &report.slot {
        Some(slot) => {
            let tag = if report.spillover { " (spillover)" } else { "" };
            println!(
                "  {} -> slot {} under {} at level {}{}",
                report.member_id,
                slot.position(),
                slot.upline_id(),
                slot.level(),
                tag
            );
        }
        None => println!("  {} -> root (not placed)", report.member_id),
    }

    if let Some(cycle) = &report.closed_cycle {
        println!(
            "  CYCLE CLOSED: {} generation {} base {} payout {}",
            cycle.member_id(),
            cycle.generation(),
            cents(cycle.base_value()),
            cents(cycle.breakdown().total())
        );
    }
    if report.failed_payout_legs > 0 {
        println!(
            "  WARNING: {} payout leg(s) failed, manual reconciliation needed",
            report.failed_payout_legs
        );
    }
}

fn run() -> Result<(), String> {
    let scenario = read_scenario()?;

    let wallet = SharedWallet::new();
    let notifier = SharedNotifier::new();
    let mut engine = MatrixEngine::new(
        scenario.config,
        Box::new(wallet.clone()),
        Box::new(notifier.clone()),
    )
    .map_err(|e| e.to_string())?;

    println!("Registering {} members:", scenario.members.len());
    for entry in &scenario.members {
        let report = engine
            .register_member(&entry.id, &entry.name, entry.sponsor.as_deref())
            .map_err(|e| format!("registration of {} failed: {}", entry.id, e))?;
        print_report(&report);
    }

    println!();
    println!("Closed cycles: {}", engine.closed_cycles().len());
    println!("Events logged: {}", engine.events().len());

    let credits = wallet.credits();
    if !credits.is_empty() {
        println!();
        println!("Wallet credits:");
        for credit in &credits {
            println!(
                "  {} +{} ({})",
                credit.member_id,
                cents(credit.amount),
                credit.reason
            );
        }
    }

    println!();
    println!(
        "Fidelity pool: {}",
        cents(wallet.pool_total(PoolType::Fidelity))
    );
    println!(
        "Top-rank pool: {}",
        cents(wallet.pool_total(PoolType::TopRank))
    );

    Ok(())
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(msg) => {
            eprintln!("error: {}", msg);
            ExitCode::FAILURE
        }
    }
}
