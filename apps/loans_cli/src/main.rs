use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use loans_client::{
    config::normalize_base_url, load_settings, ClassifiedError, HttpLoanRepository,
    QueryCoordinator,
};
use shared::domain::{LoanId, LoanStatus, LoanTerms, StatusFilter, TypeFilter};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(about = "Query the loans API")]
struct Args {
    /// Overrides the API base URL from loans.toml / environment.
    #[arg(long)]
    server_url: Option<String>,
    /// Print JSON instead of a table.
    #[arg(long)]
    json: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List loans matching the given filters.
    List {
        #[arg(long = "type", value_enum, default_value_t = TypeArg::All)]
        loan_type: TypeArg,
        #[arg(long, value_enum, default_value_t = StatusArg::Active)]
        status: StatusArg,
        #[arg(long)]
        search: Option<String>,
    },
    /// Show one loan with its repayment terms.
    Detail { loan_id: String },
    /// Show the payment schedule of a loan.
    Payments { loan_id: String },
    /// Show dashboard totals for active loans.
    Summary,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum TypeArg {
    All,
    Checks,
    StandingOrder,
}

impl From<TypeArg> for TypeFilter {
    fn from(value: TypeArg) -> Self {
        match value {
            TypeArg::All => TypeFilter::All,
            TypeArg::Checks => TypeFilter::Checks,
            TypeArg::StandingOrder => TypeFilter::StandingOrder,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum StatusArg {
    All,
    Pending,
    Active,
    Paid,
    Rejected,
}

impl From<StatusArg> for StatusFilter {
    fn from(value: StatusArg) -> Self {
        match value {
            StatusArg::All => StatusFilter::All,
            StatusArg::Pending => StatusFilter::Only(LoanStatus::Pending),
            StatusArg::Active => StatusFilter::Only(LoanStatus::Active),
            StatusArg::Paid => StatusFilter::Only(LoanStatus::Paid),
            StatusArg::Rejected => StatusFilter::Only(LoanStatus::Rejected),
        }
    }
}

fn failure_message(err: &ClassifiedError) -> String {
    if err.is_transient() {
        format!("{} ({:?}, safe to retry)", err.message(), err.kind())
    } else {
        format!("{} ({:?})", err.message(), err.kind())
    }
}

fn failed(err: ClassifiedError) -> anyhow::Error {
    anyhow::anyhow!(failure_message(&err))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();
    let args = Args::parse();

    let mut settings = load_settings();
    if let Some(server_url) = &args.server_url {
        settings.api_base_url = normalize_base_url(server_url);
    }
    info!(api_base_url = %settings.api_base_url, "loans_cli: starting");

    let repository = Arc::new(HttpLoanRepository::new(
        &settings.api_base_url,
        settings.request_timeout(),
    )?);
    let coordinator =
        QueryCoordinator::with_search_debounce(repository, settings.search_debounce());

    match args.command {
        Command::List {
            loan_type,
            status,
            search,
        } => {
            let filters = coordinator.filters();
            filters.set_type(loan_type.into());
            filters.set_status(status.into());
            if let Some(search) = search {
                filters.set_search(search);
            }

            coordinator.fetch().await;
            let state = coordinator.state();
            if let Some(err) = state.error {
                return Err(failed(err));
            }
            let aggregates = coordinator.aggregates();

            if args.json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&serde_json::json!({
                        "records": state.records,
                        "aggregates": aggregates,
                    }))?
                );
                return Ok(());
            }

            if state.records.is_empty() {
                println!("No loans found.");
            }
            for record in &state.records {
                let trustee = record
                    .trustee
                    .as_ref()
                    .map(|trustee| trustee.name.as_str())
                    .unwrap_or("-");
                println!(
                    "{:<38} {:<15} {:<9} {:>12}  {} ({})  trustee: {}",
                    record.id,
                    record.loan_type.label(),
                    record.status.as_query_value(),
                    record.amount,
                    record.borrower.name,
                    record.borrower.phone,
                    trustee
                );
            }
            println!();
            println!("Filters: {}", aggregates.filter_summary);
            for (loan_type, count) in &aggregates.counts_by_type {
                println!("{}: {count}", loan_type.label());
            }
            println!("Total amount: {}", aggregates.total_amount);
        }
        Command::Detail { loan_id } => {
            let detail = coordinator
                .fetch_detail(&LoanId::new(loan_id))
                .await
                .map_err(failed)?;
            if args.json {
                println!("{}", serde_json::to_string_pretty(&detail)?);
                return Ok(());
            }
            let record = &detail.record;
            println!("Loan {} ({})", record.id, record.loan_type.label());
            println!("Status: {}", record.status.as_query_value());
            println!("Amount: {}", record.amount);
            if let Some(start_date) = record.start_date {
                println!("Start date: {start_date}");
            }
            println!(
                "Borrower: {} {} {}",
                record.borrower.name,
                record.borrower.phone,
                record.borrower.email.as_deref().unwrap_or("")
            );
            if let Some(trustee) = &record.trustee {
                println!(
                    "Trustee: {} {}",
                    trustee.name,
                    trustee.community.as_deref().unwrap_or("")
                );
            }
            match &detail.terms {
                LoanTerms::Checks {
                    num_payments,
                    check_details,
                    predefined_schedule,
                } => {
                    println!("Payments: {num_payments} (predefined schedule: {predefined_schedule})");
                    if let Some(check_details) = check_details {
                        println!("Checks: {check_details}");
                    }
                }
                LoanTerms::StandingOrder {
                    monthly_amount,
                    charge_day,
                    stop_date,
                } => {
                    println!("Monthly amount: {monthly_amount}, charged on day {charge_day}");
                    if let Some(stop_date) = stop_date {
                        println!("Stops on: {stop_date}");
                    }
                }
            }
        }
        Command::Payments { loan_id } => {
            let schedule = coordinator
                .fetch_payments(&LoanId::new(loan_id))
                .await
                .map_err(failed)?;
            if args.json {
                println!("{}", serde_json::to_string_pretty(&schedule)?);
                return Ok(());
            }
            for payment in &schedule.payments {
                println!(
                    "{}  {:>10}  paid {:>10}  {:?}",
                    payment.due_date, payment.amount_due, payment.amount_paid, payment.status
                );
            }
            let summary = &schedule.summary;
            println!(
                "Paid {}/{} payments, {} of {} (outstanding {})",
                summary.paid_payments,
                summary.total_payments,
                summary.paid_amount,
                summary.total_amount,
                summary.outstanding_amount()
            );
        }
        Command::Summary => {
            let summary = coordinator
                .fetch_dashboard_summary()
                .await
                .map_err(failed)?;
            if args.json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
                return Ok(());
            }
            println!("Active loans: {}", summary.active_loans_count);
            println!("Total active amount: {}", summary.total_active_amount);
        }
    }

    Ok(())
}
