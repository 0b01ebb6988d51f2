use anyhow::{bail, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use rollcall_capture::{EncodedImage, FrameSource, ImageFileSource};
use rollcall_client::{
    AttendanceDesk, AttendanceSink, FallbackBackend, HttpBackend, MarkOutcome, RecognitionBackend,
    SimulatedBackend, SyncStatus, VerificationResult,
};
use rollcall_core::classifier::alternation_violations;
use rollcall_core::export::{export_file_name, format_confidence, to_csv};
use rollcall_core::report::{self, DailyStats};
use rollcall_core::{AttendanceType, Clock, IdentityDraft, SystemClock};
use rollcall_store::{LedgerStore, SqliteKv};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

mod config;

use config::{Config, FallbackMode};

#[derive(Parser)]
#[command(name = "rollcall", about = "Face-recognition attendance")]
struct Cli {
    /// TOML configuration file (default: $ROLLCALL_CONFIG)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Register a new face
    Register {
        #[arg(long)]
        first_name: String,
        #[arg(long)]
        last_name: String,
        #[arg(long, default_value = "")]
        date_of_birth: String,
        #[arg(long, default_value = "")]
        phone_number: String,
        /// Captured still (any format the image crate reads)
        #[arg(short, long)]
        image: PathBuf,
    },
    /// Mark attendance for the face in the captured still
    Mark {
        #[arg(short, long)]
        image: PathBuf,
    },
    /// Identify the face in the captured still without recording attendance
    Verify {
        #[arg(short, long)]
        image: PathBuf,
    },
    /// List attendance records, newest first
    Records {
        /// checkin or checkout
        #[arg(long)]
        status: Option<AttendanceType>,
        /// YYYY-MM-DD
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Delete one attendance record
    Remove { id: String },
    /// Write all records to a CSV file
    Export {
        /// Output path (default: attendance_records_<today>.csv)
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Show today's counters
    Stats,
    /// List registered faces
    Identities,
    /// Delete a registered face from the local list
    Forget { face_id: String },
    /// Report records that break check-in/check-out alternation
    Check,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;
    tracing::debug!(?config, "configuration loaded");

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let store = open_store(&config)?;

    match cli.command {
        Commands::Register {
            first_name,
            last_name,
            date_of_birth,
            phone_number,
            image,
        } => {
            let image = capture(&image)?;
            let draft = IdentityDraft {
                first_name,
                last_name,
                date_of_birth,
                phone_number,
            };
            let desk = build_desk(&config, store, clock)?;
            println!("Registering {}...", draft.full_name());
            let result = desk.register(&draft, &image).await?;
            match (result.success, result.face_id) {
                (true, Some(face_id)) => {
                    println!("Face registered successfully! Face ID: {face_id}")
                }
                _ => bail!(
                    "Registration failed: {}",
                    result.error.as_deref().unwrap_or("unknown error")
                ),
            }
        }
        Commands::Mark { image } => {
            let image = capture(&image)?;
            let desk = build_desk(&config, store, clock)?;
            println!("Verifying face...");
            match desk.mark(&image).await? {
                MarkOutcome::Marked { record, sync } => {
                    println!(
                        "{} recorded for {} at {} (confidence {})",
                        record.kind.label(),
                        record.person.full_name(),
                        record.time,
                        format_confidence(record.confidence)
                    );
                    if let SyncStatus::Failed(reason) = sync {
                        println!("Saved locally; backend sync failed: {reason}");
                    }
                }
                MarkOutcome::NotRecognized {
                    confidence,
                    message,
                } => {
                    println!("{message} (confidence {})", format_confidence(confidence));
                }
                MarkOutcome::Unavailable { message } => bail!("{message}"),
            }
        }
        Commands::Verify { image } => {
            let image = capture(&image)?;
            let desk = build_desk(&config, store, clock)?;
            println!("Verifying face...");
            let result = desk.verify(&image).await;
            if !result.success {
                bail!(
                    "Verification failed: {}",
                    result.message.as_deref().unwrap_or("unknown error")
                );
            }
            print_verification(&result);
        }
        Commands::Records { status, date } => {
            let records = store.list_all();
            let shown = report::filter(&records, status, date);
            if shown.is_empty() {
                println!("No attendance records found");
            }
            for r in shown {
                println!(
                    "{}  {} {}  {:<9}  {:>6}  {:<24}  {}",
                    r.id,
                    r.date,
                    r.time,
                    r.kind.label(),
                    format_confidence(r.confidence),
                    r.person.full_name(),
                    r.face_id
                );
            }
        }
        Commands::Remove { id } => {
            if store.remove(&id)? {
                println!("Removed record {id}");
            } else {
                println!("No record with id {id}");
            }
        }
        Commands::Export { out } => {
            let records = store.list_all();
            if records.is_empty() {
                println!("No attendance records to export.");
                return Ok(());
            }
            let path = match out {
                Some(path) => path,
                None => PathBuf::from(export_file_name(clock.today())),
            };
            std::fs::write(&path, to_csv(&records)?)?;
            tracing::info!(path = %path.display(), count = records.len(), "ledger exported");
            println!("Exported {} records to {}", records.len(), path.display());
        }
        Commands::Stats => {
            let stats = DailyStats::compute(&store.list_all(), clock.today());
            println!("Check-ins today:      {}", stats.checkins_today);
            println!("Currently checked in: {}", stats.currently_checked_in);
            println!("Total records:        {}", stats.total_records);
        }
        Commands::Identities => {
            let faces = store.list_identities();
            if faces.is_empty() {
                println!("No faces registered");
            }
            for f in faces {
                println!(
                    "{}  {} {}  registered {}",
                    f.face_id,
                    f.first_name,
                    f.last_name,
                    f.registered_at.format("%Y-%m-%d %H:%M:%S")
                );
            }
        }
        Commands::Forget { face_id } => {
            if store.remove_identity(&face_id)? {
                println!("Forgot face {face_id}");
            } else {
                println!("No registered face {face_id}");
            }
        }
        Commands::Check => {
            let violations = alternation_violations(&store.list_all());
            if violations.is_empty() {
                println!("Ledger is consistent");
                return Ok(());
            }
            for v in &violations {
                println!(
                    "{}  {} on {}: expected {}, found {}",
                    v.record_id, v.face_id, v.date, v.expected, v.found
                );
            }
            bail!(
                "{} record(s) break check-in/check-out alternation",
                violations.len()
            );
        }
    }

    Ok(())
}

fn print_verification(result: &VerificationResult) {
    let confidence = format_confidence(result.confidence);
    if !result.matched {
        let message = result.message.as_deref().unwrap_or("No match found");
        println!("Face not recognized");
        println!("  Confidence: {confidence}");
        println!("  Message:    {message}");
        return;
    }

    let person = result.person.clone().unwrap_or_default();
    let or_unknown = |s: &str| {
        if s.is_empty() {
            "Unknown".to_string()
        } else {
            s.to_string()
        }
    };
    let face_id = result.face_id.as_deref().unwrap_or("N/A");
    println!("Face verified");
    println!("  Confidence:    {confidence}");
    println!("  Face ID:       {face_id}");
    println!("  Name:          {}", person.full_name().trim());
    println!("  Date of birth: {}", or_unknown(&person.date_of_birth));
    println!("  Phone:         {}", or_unknown(&person.phone_number));
    if let Some(message) = &result.message {
        println!("  {message}");
    }
}

fn open_store(config: &Config) -> Result<Arc<LedgerStore>> {
    let kv = SqliteKv::open(&config.db_path)?;
    let store = LedgerStore::open(Box::new(kv), Some(config.storage_quota_bytes))?;
    tracing::debug!(path = %config.db_path.display(), "ledger opened");
    Ok(Arc::new(store))
}

fn capture(path: &Path) -> Result<EncodedImage> {
    let mut source = ImageFileSource::new(path);
    let frame = source.capture()?;
    Ok(frame.encode_jpeg()?)
}

fn build_desk(
    config: &Config,
    store: Arc<LedgerStore>,
    clock: Arc<dyn Clock>,
) -> Result<AttendanceDesk> {
    let http = Arc::new(HttpBackend::new(
        config.api_url.as_str(),
        Duration::from_secs(config.request_timeout_secs),
    )?);

    let backend: Arc<dyn RecognitionBackend> = match config.fallback {
        FallbackMode::Simulate => {
            let mut sim = SimulatedBackend::new(store.clone(), clock.clone());
            if let Some(ms) = config.simulated_delay_ms {
                sim = sim.with_delay(Duration::from_millis(ms));
            }
            Arc::new(FallbackBackend::new(http.clone(), Arc::new(sim)))
        }
        FallbackMode::None => http.clone(),
    };
    let sink: Option<Arc<dyn AttendanceSink>> = if config.sync { Some(http) } else { None };

    Ok(AttendanceDesk::new(store, backend, sink, clock))
}
