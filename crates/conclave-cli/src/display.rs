//! Terminal rendering helpers

use colored::*;

use conclave_pipeline::{ConclaveCore, StatusReport};
use conclave_types::{Event, EventId};

/// Print one appended event with its hash prefix.
pub async fn event_line(core: &ConclaveCore, event_id: &EventId) {
    if let Some(event) = core.ledger().get(event_id).await {
        println!("  {}", transcript_line(&event));
    }
}

/// One transcript line: time, kind, actor, summary, hash prefix.
pub fn transcript_line(event: &Event) -> String {
    format!(
        "{} {:<22} {} {} [{}]",
        event.timestamp.to_datetime().format("%H:%M:%S%.3f"),
        event.kind().to_string().cyan(),
        short(&event.actor_id.to_string()).dimmed(),
        event.summary(),
        short(&event.chain_hash.0).dimmed(),
    )
}

/// Render the status snapshot.
pub fn status_table(report: &StatusReport) {
    let halted = if report.halted {
        format!(
            "HALTED{}",
            report
                .halt_reason
                .as_deref()
                .map(|r| format!(" — {}", r))
                .unwrap_or_default()
        )
        .red()
        .bold()
    } else if report.ceased {
        "CEASED".red().bold()
    } else {
        "operating".green()
    };
    println!("{:<22} {}", "state".bold(), halted);

    match (&report.open_cycle, report.cycle_number, report.cycle_state) {
        (Some(cycle), Some(number), Some(state)) => {
            println!("{:<22} {} (cycle {})", "open cycle".bold(), cycle, number);
            println!(
                "{:<22} {:?} with {} seats",
                "cycle state".bold(),
                state,
                report.roster_size
            );
        }
        _ => println!("{:<22} none", "open cycle".bold()),
    }

    println!(
        "{:<22} {}",
        "unresolved breaches".bold(),
        report.unresolved_breaches
    );
    println!("{:<22} {}", "open overrides".bold(), report.open_overrides);
    println!("{:<22} {}", "events on chain".bold(), report.event_count);
}

fn short(s: &str) -> &str {
    &s[..12.min(s.len())]
}
