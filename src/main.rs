use std::fs::File;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cashier::guard::{Access, LOGIN_PATH, RouteGuard};
use cashier::ledger::{FeeBreakdown, pending_total, remaining_balance};
use cashier::listing::{
    RefreshTrigger, filter_payments, filter_transactions, format_currency, load_payments,
    load_transactions, semester_label,
};
use cashier::report::{Dashboard, export_csv, format_timestamp, timeline};
use cashier::{
    CashierClient, CashierError, Config, ConsoleNotifier, ExpiryWatcher, FileStorage, FlowState,
    Notice, Notifier, PaymentMethod, PollOutcome, QrPayload, SessionContext, StatusPoller,
    TransactionDraft, TransactionFlow,
};

#[derive(Parser, Debug)]
#[command(name = "cashier")]
#[command(about = "Cashier desk client for the school payment system")]
struct Cli {
    /// Backend URL including the API prefix
    #[arg(long, global = true, env = "CASHIER_API_URL")]
    api_url: Option<String>,

    /// Directory holding the stored session
    #[arg(long, global = true, env = "CASHIER_STATE_DIR")]
    state_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sign in as a staff member
    Login {
        #[arg(short, long)]
        username: String,
        #[arg(short, long, env = "CASHIER_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// End the current session
    Logout,
    #[command(flatten)]
    Desk(DeskCommand),
}

/// Commands that run behind the route guard
#[derive(Subcommand, Debug)]
enum DeskCommand {
    /// Show the stored session
    Whoami,
    /// Today's totals and the most recent transactions
    Dashboard {
        /// Write recent transactions to a CSV file
        #[arg(long)]
        export: Option<PathBuf>,
    },
    /// List payments
    Payments {
        #[arg(long)]
        search: Option<String>,
    },
    /// Fee breakdown and transactions of one payment
    Payment { id: String },
    /// List transactions
    Transactions {
        #[arg(long)]
        search: Option<String>,
    },
    /// Record a transaction
    Pay {
        #[arg(long)]
        student: String,
        #[arg(long)]
        payment: String,
        #[arg(long)]
        amount: Decimal,
        #[arg(long)]
        method: PaymentMethod,
        /// For QR payments: wait this long, then check the gateway status once
        #[arg(long)]
        wait_secs: Option<u64>,
    },
    /// Check the gateway status of a transaction
    Status { id: String },
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cashier=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let mut config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };
    if let Some(api_url) = cli.api_url {
        config.api_url = api_url;
    }
    if let Some(state_dir) = cli.state_dir {
        config.state_dir = state_dir;
    }

    match run(cli.command, &config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::debug!(code = ?e.code(), "Command failed: {}", e);
            if e.is_session_fatal() {
                eprintln!("Redirecting to {}", LOGIN_PATH);
            } else if !matches!(e, CashierError::Validation(_)) {
                eprintln!("{}", e);
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Command, config: &Config) -> cashier::Result<()> {
    let storage = FileStorage::open(&config.state_dir)?;
    let session = Arc::new(SessionContext::new(Arc::new(storage)));
    let client = Arc::new(CashierClient::new(session.clone(), config.client_options())?);
    let notifier: Arc<dyn Notifier> = Arc::new(ConsoleNotifier);

    match command {
        Command::Login { username, password } => {
            login(&client, notifier.as_ref(), &username, &password).await
        }
        Command::Logout => {
            if session.logout() {
                notifier.notify(Notice::info("Logged out"));
            }
            println!("{}", LOGIN_PATH);
            Ok(())
        }
        Command::Desk(command) => {
            let guard = RouteGuard::new(
                session.clone(),
                notifier.clone(),
                config.required_role.as_str(),
            );
            let access = guard.check()?;

            let _interceptor = client.install_session_interceptor(notifier.clone());
            let _watcher = ExpiryWatcher::spawn(session, notifier.clone());

            desk(command, access, &client, notifier, config).await
        }
    }
}

async fn desk(
    command: DeskCommand,
    access: Access,
    client: &Arc<CashierClient>,
    notifier: Arc<dyn Notifier>,
    config: &Config,
) -> cashier::Result<()> {
    match command {
        DeskCommand::Whoami => {
            let expires = chrono::DateTime::from_timestamp(access.claims.exp, 0);
            println!("role:    {}", access.role);
            println!("staff:   {}", access.claims.sub.as_deref().unwrap_or("unknown"));
            println!("expires: {}", format_timestamp(expires));
            Ok(())
        }
        DeskCommand::Dashboard { export } => dashboard(client, config.recent_limit, export).await,
        DeskCommand::Payments { search } => {
            let payments = load_payments(client).await?;
            for p in filter_payments(&payments, search.as_deref().unwrap_or("")) {
                println!(
                    "{}  {:<24} {:<10} {:<14} {:>14}  {}",
                    p.id,
                    p.student_name(),
                    p.school_year.as_deref().unwrap_or("-"),
                    semester_label(p.semester()),
                    format_currency(remaining_balance(p)),
                    p.status
                );
            }
            Ok(())
        }
        DeskCommand::Payment { id } => payment_detail(client, &id).await,
        DeskCommand::Transactions { search } => {
            let transactions = load_transactions(client).await?;
            for t in filter_transactions(&transactions, search.as_deref().unwrap_or("")) {
                println!(
                    "{}  {:<16} {:<24} {:<7} {:>12}  {:<19}  {:<9}  {}",
                    t.id,
                    t.transaction_ref.as_deref().unwrap_or("-"),
                    t.student_name(),
                    t.payment_method,
                    format_currency(t.amount_paid),
                    t.status,
                    t.payment_status().map_or("N/A", |s| s.as_str()),
                    format_timestamp(t.created_at)
                );
            }
            Ok(())
        }
        DeskCommand::Pay {
            student,
            payment,
            amount,
            method,
            wait_secs,
        } => {
            let mut flow = TransactionFlow::new(client.clone(), notifier, RefreshTrigger::new());
            let draft = flow.prepare(&student, &payment, amount, method).await?;
            pay(&mut flow, &draft, wait_secs).await
        }
        DeskCommand::Status { id } => {
            let poller = StatusPoller::new(client.clone(), notifier, RefreshTrigger::new());
            poller.check(&id).await.map(|_| ())
        }
    }
}

async fn login(
    client: &CashierClient,
    notifier: &dyn Notifier,
    username: &str,
    password: &str,
) -> cashier::Result<()> {
    match client.login(username, password).await {
        Ok(staff) => {
            notifier.notify(Notice::success("Login successful!"));
            println!(
                "Signed in as {} ({})",
                staff.full_name.or(staff.username).unwrap_or_default(),
                staff.role
            );
            Ok(())
        }
        Err(e) => {
            notifier.notify(Notice::error(e.login_notice_text()));
            Err(e)
        }
    }
}

async fn dashboard(
    client: &CashierClient,
    limit: usize,
    export: Option<PathBuf>,
) -> cashier::Result<()> {
    let dashboard = Dashboard::load(client, limit).await?;
    let summary = &dashboard.summary;

    println!("Transactions today:  {}", summary.transactions_today);
    println!("Amount collected:    {}", format_currency(summary.amount_collected));
    println!("Pending payments:    {}", summary.pending_payments);
    println!("Completed payments:  {}", summary.completed_payments);
    println!();
    for t in &dashboard.recent {
        println!(
            "{:<24} {:<7} {:>12}  {}",
            t.student_name(),
            t.payment_method,
            format_currency(t.amount_paid),
            t.status
        );
    }

    if let Some(path) = export {
        if dashboard.recent.is_empty() {
            tracing::info!("No transactions to export");
            return Ok(());
        }
        let file = File::create(&path).map_err(|e| {
            CashierError::config(format!("cannot create {}: {}", path.display(), e))
        })?;
        let written = export_csv(&dashboard.recent, file)?;
        tracing::info!(path = %path.display(), rows = written, "Exported transactions");
    }
    Ok(())
}

async fn payment_detail(client: &CashierClient, id: &str) -> cashier::Result<()> {
    let payment = client.payment(id).await?;
    let fees = FeeBreakdown::for_payment(&payment);

    println!(
        "{} - {} {}",
        payment.student_name(),
        payment.school_year.as_deref().unwrap_or("-"),
        semester_label(payment.semester())
    );
    println!("Status:           {}", fees.status_label());
    println!("Tuition fee:      {}", format_currency(fees.tuition_fee));
    for (name, amount) in &payment.misc_fees {
        println!("  {:<15} {}", name, format_currency(*amount));
    }
    println!(
        "Discount ({}%):   -{}",
        fees.discount_percent(),
        format_currency(fees.discount_amount)
    );
    println!("Total fees:       {}", format_currency(fees.total_fees));
    println!("Total paid:       {}", format_currency(fees.total_paid));
    println!("Balance:          {}", format_currency(fees.balance));
    let pending = pending_total(&payment);
    if !pending.is_zero() {
        println!("Unverified:       {}", format_currency(pending));
    }

    for txn in &payment.transactions {
        println!();
        println!(
            "{} {} {}",
            txn.transaction_ref.as_deref().unwrap_or(&txn.id),
            format_currency(txn.amount_paid),
            txn.payment_method
        );
        for event in timeline(txn) {
            println!(
                "  {:<22} {:<19}  {}",
                event.label,
                format_timestamp(event.at),
                event.detail
            );
        }
    }
    Ok(())
}

async fn pay(
    flow: &mut TransactionFlow,
    draft: &TransactionDraft,
    wait_secs: Option<u64>,
) -> cashier::Result<()> {
    match flow.submit(draft).await? {
        FlowState::QrPending { transaction_id, qr } => {
            match qr {
                QrPayload::Image(data_url) => println!("QR image: {}", data_url),
                QrPayload::Raw(payload) => println!("QR payload: {}", payload),
            }
            println!("Transaction: {}", transaction_id);
        }
        _ => {
            if let Some(id) = flow.transaction_id() {
                println!("Transaction: {}", id);
            }
            return Ok(());
        }
    }

    match wait_secs {
        Some(secs) => {
            tokio::time::sleep(Duration::from_secs(secs)).await;
            if let PollOutcome::Pending(_) = flow.check_status().await? {
                println!("Not settled yet; check again with `cashier status <id>`");
            }
        }
        None => println!("Check it with `cashier status <id>` once the payer has scanned the code"),
    }
    Ok(())
}
