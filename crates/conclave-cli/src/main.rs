//! Conclave CLI - operator interface for the witnessed deliberation core
//!
//! Commands mirror the operator rituals:
//!
//! ```bash
//! # Open a cycle and take the roll
//! conclave cycle open
//! conclave roll-call
//!
//! # Propose, vote, resolve
//! conclave motion propose "adopt the intake schedule" --supporters 2
//! conclave vote cast yea
//!
//! # Overrides and halts are explicit, witnessed, and loud
//! conclave override invoke emergency 72
//! conclave halt declare "operator stop for audit"
//!
//! # Verify the whole log
//! conclave verify
//! ```
//!
//! Exit codes: 0 success, 2 halted, 3 stale chain, 4 identity conflict,
//! 5 integrity failure.
//!
//! With `STORE_DSN=memory:` (the default) each invocation runs against a
//! fresh in-process core; commands perform the minimal ritual prelude
//! they need, so every path above is exercisable from a cold start.

use clap::{Parser, Subcommand};
use colored::*;

mod commands;
mod display;

use conclave_types::{ConclaveConfig, ConclaveError};

/// Operator CLI for the Conclave witnessed deliberation core
#[derive(Parser)]
#[command(name = "conclave")]
#[command(author = "Conclave Contributors")]
#[command(version)]
#[command(about = "Witnessed deliberation: an append-only, co-signed governance log", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Number of archons to seat in the session roster
    #[arg(long, default_value = "7", global = true)]
    archons: usize,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Cycle boundary rituals
    Cycle {
        #[command(subcommand)]
        action: CycleCommands,
    },

    /// Complete the roll call for the open cycle
    RollCall,

    /// Motion lifecycle
    Motion {
        #[command(subcommand)]
        action: MotionCommands,
    },

    /// Voting
    Vote {
        #[command(subcommand)]
        action: VoteCommands,
    },

    /// Override ritual
    Override {
        #[command(subcommand)]
        action: OverrideCommands,
    },

    /// Halt declaration
    Halt {
        #[command(subcommand)]
        action: HaltCommands,
    },

    /// Recompute every chain hash and signature
    Verify {
        /// Restrict the audit listing to events from this id onward
        #[arg(long)]
        from: Option<String>,
    },

    /// Show halt state, open cycle, and ledger counters
    Status,

    /// Print the verified transcript
    Transcript,

    /// Run a complete clean cycle end to end
    Demo,
}

#[derive(Subcommand)]
enum CycleCommands {
    /// Open a cycle (the cost snapshot follows immediately)
    Open,
    /// Close the open cycle
    Close {
        /// Breach ids to carry forward explicitly
        #[arg(long)]
        carry: Vec<String>,
    },
}

#[derive(Subcommand)]
enum MotionCommands {
    /// Propose a motion in the open cycle
    Propose {
        /// Motion text
        text: String,
        /// Number of roster seats supporting at proposal time
        #[arg(long, default_value = "1")]
        supporters: usize,
        /// Propose a continuation motion instead of an ordinary one
        #[arg(long)]
        continuation: bool,
    },
}

#[derive(Subcommand)]
enum VoteCommands {
    /// Cast the roster's votes on a freshly proposed motion
    Cast {
        /// Choice for the non-supporting seats: yea, nay, abstain, present
        choice: String,
        /// Optional justification text
        #[arg(long)]
        justification: Option<String>,
    },
}

#[derive(Subcommand)]
enum OverrideCommands {
    /// Invoke an override with an explicit scope and time limit
    Invoke {
        /// Scope of the override
        scope: String,
        /// Time limit in hours
        duration: u64,
        /// Verbatim declaration text
        #[arg(long, default_value = "operator override invoked from the command line")]
        declaration: String,
    },
    /// Invoke and immediately conclude an override
    Conclude {
        /// Scope of the override
        #[arg(default_value = "emergency")]
        scope: String,
        /// Conclusion summary
        #[arg(long, default_value = "scope exercised and released")]
        summary: String,
    },
}

#[derive(Subcommand)]
enum HaltCommands {
    /// Declare a halt with a reason
    Declare {
        /// Why the core must stop
        reason: String,
    },
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    let config = ConclaveConfig::from_env();

    let result = run(cli, config).await;
    match result {
        Ok(()) => std::process::exit(0),
        Err(error) => {
            eprintln!("{} {}", "error:".red().bold(), error);
            std::process::exit(error.exit_code());
        }
    }
}

async fn run(cli: Cli, config: ConclaveConfig) -> Result<(), ConclaveError> {
    let session = commands::Session::start(config, cli.archons).await?;

    match cli.command {
        Commands::Cycle { action } => match action {
            CycleCommands::Open => commands::cycle_open(&session).await,
            CycleCommands::Close { carry } => commands::cycle_close(&session, carry).await,
        },
        Commands::RollCall => commands::roll_call(&session).await,
        Commands::Motion { action } => match action {
            MotionCommands::Propose {
                text,
                supporters,
                continuation,
            } => commands::motion_propose(&session, &text, supporters, continuation).await,
        },
        Commands::Vote { action } => match action {
            VoteCommands::Cast {
                choice,
                justification,
            } => commands::vote_cast(&session, &choice, justification).await,
        },
        Commands::Override { action } => match action {
            OverrideCommands::Invoke {
                scope,
                duration,
                declaration,
            } => commands::override_invoke(&session, &scope, duration, &declaration).await,
            OverrideCommands::Conclude { scope, summary } => {
                commands::override_conclude(&session, &scope, summary).await
            }
        },
        Commands::Halt { action } => match action {
            HaltCommands::Declare { reason } => commands::halt_declare(&session, &reason).await,
        },
        Commands::Verify { from } => commands::verify(&session, from).await,
        Commands::Status => commands::status(&session).await,
        Commands::Transcript => commands::transcript(&session).await,
        Commands::Demo => commands::demo(&session).await,
    }
}
