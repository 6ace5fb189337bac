pub mod commands;

use clap::{ArgGroup, Parser, Subcommand};
use std::process::ExitCode;

use commands::{feedback::FeedbackArgs, matching::MatchArgs};

#[derive(Debug, Parser)]
#[command(
    name = "procura",
    about = "Procura operator CLI",
    long_about = "Operate the supplier matching engine: migrations, seed data, matching runs, stored recommendations, match outcomes and config inspection.",
    after_help = "Examples:\n  procura seed\n  procura match --rfq rfq-seed-iot-boards --limit 3\n  procura feedback --rfq rfq-seed-iot-boards --supplier sup-seed-arcadia --success --buyer 5"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Load the marketplace seed dataset (idempotent)")]
    Seed,
    #[command(about = "Score suppliers for an RFQ and store the recommendations")]
    Match {
        #[arg(long = "rfq", help = "RFQ identifier")]
        rfq_id: String,
        #[arg(long, help = "Maximum recommendations to return (default from config)")]
        limit: Option<usize>,
        #[arg(long, help = "Skip the history-driven strategies")]
        basic: bool,
    },
    #[command(about = "List stored recommendations for an RFQ with supplier details")]
    Recommendations {
        #[arg(long = "rfq", help = "RFQ identifier")]
        rfq_id: String,
        #[arg(long, help = "Maximum rows to return [default: 10]")]
        limit: Option<usize>,
    },
    #[command(about = "Record the outcome of an RFQ/supplier match")]
    #[command(group(ArgGroup::new("outcome").required(true).args(["success", "failure"])))]
    Feedback {
        #[arg(long = "rfq", help = "RFQ identifier")]
        rfq_id: String,
        #[arg(long = "supplier", help = "Supplier identifier")]
        supplier_id: String,
        #[arg(long)]
        success: bool,
        #[arg(long)]
        failure: bool,
        #[arg(long = "buyer", help = "Buyer's rating of the supplier, 1-5")]
        buyer_rating: Option<u8>,
        #[arg(long = "supplier-rating", help = "Supplier's rating of the buyer, 1-5")]
        supplier_rating: Option<u8>,
        #[arg(long)]
        notes: Option<String>,
    },
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Seed => commands::seed::run(),
        Command::Match { rfq_id, limit, basic } => {
            commands::matching::run(MatchArgs { rfq_id, limit, basic })
        }
        Command::Recommendations { rfq_id, limit } => commands::recommendations::run(rfq_id, limit),
        Command::Feedback {
            rfq_id,
            supplier_id,
            success,
            failure: _,
            buyer_rating,
            supplier_rating,
            notes,
        } => commands::feedback::run(FeedbackArgs {
            rfq_id,
            supplier_id,
            success,
            buyer_rating,
            supplier_rating,
            notes,
        }),
        Command::Config => commands::config::run(),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
