use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing_subscriber::EnvFilter;

use noshow_predictor::classifiers::default_menu;
use noshow_predictor::config::PipelineConfig;
use noshow_predictor::models::PredictionRequest;
use noshow_predictor::pipeline::{self, TrainedState};
use noshow_predictor::predictor::{predict_with, ModelStore};
use noshow_predictor::server::{self, AppState};
use noshow_predictor::{db, generator, report, table};

#[derive(Parser)]
#[command(name = "noshow-predictor")]
#[command(about = "Medical appointment no-show predictor", long_about = None)]
struct Cli {
    /// JSON pipeline configuration
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct DataArgs {
    /// Number of synthetic appointments
    #[arg(long)]
    count: Option<usize>,
    #[arg(long)]
    seed: Option<u64>,
}

#[derive(Args)]
struct SourceArgs {
    /// Train on an appointment CSV instead of synthetic data
    #[arg(long, conflicts_with = "from_db")]
    csv: Option<PathBuf>,
    /// Train on appointments stored in Postgres
    #[arg(long)]
    from_db: bool,
    #[command(flatten)]
    data: DataArgs,
}

#[derive(Subcommand)]
enum Commands {
    /// Write synthetic appointments to a CSV file
    Generate {
        #[arg(long, default_value_t = 10_000)]
        count: usize,
        #[arg(long, default_value_t = 42)]
        seed: u64,
        #[arg(long, default_value = "synthetic_data.csv")]
        out: PathBuf,
    },
    /// Train the model menu and print the comparison
    Train {
        #[command(flatten)]
        source: SourceArgs,
    },
    /// Train, then score one appointment
    Predict {
        #[command(flatten)]
        source: SourceArgs,
        #[arg(long)]
        age: u8,
        #[arg(long)]
        gender: String,
        #[arg(long, default_value_t = 0)]
        scholarship: u8,
        #[arg(long, default_value_t = 0)]
        hypertension: u8,
        #[arg(long, default_value_t = 0)]
        diabetes: u8,
        #[arg(long, default_value_t = 0)]
        alcoholism: u8,
        #[arg(long, default_value_t = 0)]
        handicap: u8,
        #[arg(long)]
        sms_received: u8,
        #[arg(long)]
        days_between: u32,
        /// 0 = Monday
        #[arg(long)]
        scheduled_weekday: u8,
        /// 0 = Monday
        #[arg(long)]
        appointment_weekday: u8,
    },
    /// Train and write a markdown model report
    Report {
        #[command(flatten)]
        source: SourceArgs,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
    /// Train at startup, then serve the dashboard and JSON API
    Serve {
        #[command(flatten)]
        data: DataArgs,
        #[arg(long, default_value = "127.0.0.1:5000")]
        addr: SocketAddr,
    },
    /// Create or upgrade the database schema
    InitDb,
    /// Insert synthetic appointments into Postgres
    Seed {
        #[arg(long, default_value_t = 10_000)]
        count: usize,
        #[arg(long, default_value_t = 42)]
        seed: u64,
    },
    /// Import appointments from a CSV file
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
}

async fn connect() -> anyhow::Result<PgPool> {
    let database_url = std::env::var("DATABASE_URL")
        .context("DATABASE_URL must be set to a production Postgres instance")?;

    PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .context("failed to connect to Postgres")
}

fn apply_overrides(mut config: PipelineConfig, data: &DataArgs) -> PipelineConfig {
    if let Some(count) = data.count {
        config.records = count;
    }
    if let Some(seed) = data.seed {
        config.seed = seed;
    }
    config
}

async fn train(config: &PipelineConfig, source: &SourceArgs) -> anyhow::Result<TrainedState> {
    let config = apply_overrides(config.clone(), &source.data);
    let menu = default_menu(config.seed);

    let state = if let Some(path) = &source.csv {
        let records = table::read_csv(path)
            .with_context(|| format!("failed to load {}", path.display()))?;
        pipeline::train_on_records(records, &config, menu)?
    } else if source.from_db {
        let pool = connect().await?;
        let records = db::fetch_appointments(&pool).await?;
        pipeline::train_on_records(records, &config, menu)?
    } else {
        pipeline::train_synthetic(&config, menu)?
    };
    Ok(state)
}

fn print_performance(state: &TrainedState) {
    println!("Model performance on {} held-out appointments:", state.test_rows);
    for result in &state.outcome.results {
        let m = &result.metrics;
        println!(
            "- {:<20} accuracy {:.3}  precision {:.3}  recall {:.3}  f1 {:.3}  roc-auc {:.3}",
            result.name, m.accuracy, m.precision, m.recall, m.f1, m.roc_auc
        );
    }
    let best = state.outcome.best();
    println!("Best model: {} (ROC-AUC {:.3})", best.name, best.metrics.roc_auc);

    match state.ranked_importance() {
        Some(ranked) => {
            println!("Top features:");
            for (feature, importance) in ranked.iter().take(5) {
                println!("- {feature}: {importance:.4}");
            }
        }
        None => println!("Feature importance not available for {}.", best.name),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = PipelineConfig::load(cli.config.as_deref()).context("failed to load config")?;

    match cli.command {
        Commands::Generate { count, seed, out } => {
            let records = generator::generate(count, seed)?;
            table::write_csv(&out, &records)?;
            let summary = generator::summarize(&records);
            println!(
                "Wrote {} appointments to {} (no-show rate {:.1}%).",
                summary.count,
                out.display(),
                summary.no_show_rate * 100.0
            );
        }
        Commands::Train { source } => {
            let state = train(&config, &source).await?;
            print_performance(&state);
        }
        Commands::Predict {
            source,
            age,
            gender,
            scholarship,
            hypertension,
            diabetes,
            alcoholism,
            handicap,
            sms_received,
            days_between,
            scheduled_weekday,
            appointment_weekday,
        } => {
            let state = train(&config, &source).await?;
            let request = PredictionRequest {
                age: Some(age),
                gender: Some(gender),
                scholarship: Some(scholarship),
                hypertension: Some(hypertension),
                diabetes: Some(diabetes),
                alcoholism: Some(alcoholism),
                handicap: Some(handicap),
                sms_received: Some(sms_received),
                days_between: Some(days_between),
                scheduled_weekday: Some(scheduled_weekday),
                appointment_weekday: Some(appointment_weekday),
            };
            let prediction = predict_with(&state, &request)?;
            println!(
                "{}: no-show probability {:.1}% ({:?} risk, predicted {}).",
                state.outcome.best().name,
                prediction.no_show_probability * 100.0,
                prediction.risk_level,
                if prediction.prediction == 1 { "no-show" } else { "show" }
            );
        }
        Commands::Report { source, out } => {
            let state = train(&config, &source).await?;
            std::fs::write(&out, report::build_report(&state))?;
            println!("Report written to {}.", out.display());
        }
        Commands::Serve { data, addr } => {
            let config = apply_overrides(config, &data);
            let menu = default_menu(config.seed);
            let startup = config.clone();
            let trained =
                tokio::task::spawn_blocking(move || pipeline::train_synthetic(&startup, menu))
                    .await??;
            print_performance(&trained);

            let store = ModelStore::new();
            store.replace(trained)?;
            let state = Arc::new(AppState::new(store, config, default_menu));
            println!("Dashboard at http://{addr}/");
            server::serve(addr, state).await?;
        }
        Commands::InitDb => {
            let pool = connect().await?;
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed { count, seed } => {
            let pool = connect().await?;
            let inserted = db::seed(&pool, count, seed).await?;
            println!("Inserted {inserted} synthetic appointments.");
        }
        Commands::Import { csv } => {
            let pool = connect().await?;
            let inserted = db::import_csv(&pool, &csv).await?;
            println!("Inserted {inserted} appointments from {}.", csv.display());
        }
    }

    Ok(())
}
