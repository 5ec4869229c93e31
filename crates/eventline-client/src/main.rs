//! Command-line recording client.
//!
//! Every invocation opens a session over the local state directory, so
//! sequence numbers and the journal carry over between runs.
//!
//! ```text
//! eventline-client log "Play clicked" --type ui    # record one event
//! eventline-client run --type anim < events.txt   # one event per line, then close
//! eventline-client close                          # flush batch, print comparison
//! eventline-client clear                          # new epoch, wipe server logs
//! ```

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use eventline_client::{Alignment, BatchOutcome, ClientConfig, ClientError, CloseReport, Session};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Record events locally and deliver them to an Eventline server.
#[derive(Debug, Parser)]
#[command(name = "eventline-client", version)]
struct Cli {
    /// How the comparison table pairs server and local rows.
    #[arg(long, value_enum, default_value_t = AlignArg::Position, global = true)]
    align: AlignArg,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Record one event and send it on the instant channel.
    Log {
        /// Event message.
        message: String,
        /// Event type.
        #[arg(long = "type")]
        event_type: Option<String>,
    },
    /// Record each stdin line as an event, then close the session.
    Run {
        /// Event type applied to every line.
        #[arg(long = "type")]
        event_type: Option<String>,
    },
    /// Flush pending events as a batch and print the comparison table.
    Close,
    /// Reset local state and wipe the server logs.
    Clear,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum AlignArg {
    /// Pair rows by position.
    Position,
    /// Pair rows by sequence number.
    Seq,
}

impl From<AlignArg> for Alignment {
    fn from(arg: AlignArg) -> Self {
        match arg {
            AlignArg::Position => Self::Position,
            AlignArg::Seq => Self::Sequence,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = ClientConfig::from_env().context("loading client configuration")?;
    info!(
        server_url = config.server_url,
        state_dir = %config.state_dir.display(),
        "configuration loaded"
    );

    let mut session = Session::open(&config)
        .await
        .context("opening session")?
        .with_alignment(cli.align.into());

    match cli.command {
        Command::Log {
            message,
            event_type,
        } => {
            let logged = session
                .log_event(event_type.as_deref(), &message, None)
                .await
                .context("logging event")?;
            match logged.delivery.outcome().await {
                Ok(record) => println!("#{} stored as {}", logged.entry.seq, record.id),
                Err(e) => {
                    warn!(error = %e, "instant delivery failed");
                    println!("#{} recorded locally", logged.entry.seq);
                }
            }
        }
        Command::Run { event_type } => {
            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            while let Some(line) = lines.next_line().await.context("reading stdin")? {
                let logged = match session.log_event(event_type.as_deref(), &line, None).await {
                    Ok(logged) => logged,
                    Err(ClientError::EmptyMessage) => continue,
                    Err(e) => return Err(e).context("logging event"),
                };
                tokio::spawn(async move {
                    if let Err(e) = logged.delivery.outcome().await {
                        warn!(seq = logged.entry.seq, error = %e, "instant delivery failed");
                    }
                });
            }
            print_report(&session.close().await);
        }
        Command::Close => print_report(&session.close().await),
        Command::Clear => {
            session.clear().await.context("clearing events")?;
            println!("cleared");
        }
    }

    Ok(())
}

fn print_report(report: &CloseReport) {
    match &report.batch {
        BatchOutcome::NothingPending => info!("no events pending for batch"),
        BatchOutcome::Sent {
            batch_id,
            batches,
            stored,
            through_seq,
        } => info!(%batch_id, batches, stored, through_seq, "batch delivered"),
        BatchOutcome::Failed(e) => warn!(error = %e, "batch not delivered, will retry on next close"),
    }
    print!("{}", report.view);
}
