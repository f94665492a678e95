//! watchpay command line
//!
//! Usage:
//!   watchpay init                         - Create the schema
//!   watchpay stage|section|subject ...    - Manage reference data
//!   watchpay period ...                   - Manage financial periods
//!   watchpay revenue set ...              - Record section orders and revenue
//!   watchpay stats import <file>          - Import monthly watch statistics
//!   watchpay assign match <file>          - Auto-match libraries to assignments
//!   watchpay calculate -p <id> -s <id>    - Calculate and store payments
//!   watchpay classify <name>...           - Classify library names offline

use std::{collections::BTreeSet, path::PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use watchpay::{LibraryRef, WatchStat};
use watchpay_store::{
    AssignmentUpdate, CalculationRequest, NewAssignment, NewPeriod, NewSection, NewStage,
    NewSubject, PeriodUpdate, RevenueInput, StageUpdate, Store,
};

mod config;

#[derive(Parser)]
#[command(name = "watchpay")]
#[command(about = "Watch-time based teacher payment calculation")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create missing tables and indexes
    Init,

    /// Manage stages
    Stage {
        #[command(subcommand)]
        action: StageCommands,
    },

    /// Manage sections
    Section {
        #[command(subcommand)]
        action: SectionCommands,
    },

    /// Manage subjects
    Subject {
        #[command(subcommand)]
        action: SubjectCommands,
    },

    /// Manage financial periods
    Period {
        #[command(subcommand)]
        action: PeriodCommands,
    },

    /// Record section orders and revenue
    Revenue {
        #[command(subcommand)]
        action: RevenueCommands,
    },

    /// Historical watch statistics
    Stats {
        #[command(subcommand)]
        action: StatsCommands,
    },

    /// Manage teacher assignments
    Assign {
        #[command(subcommand)]
        action: AssignCommands,
    },

    /// Calculate and store payments for a period and stage
    Calculate {
        #[arg(short, long)]
        period_id: i32,
        #[arg(short, long)]
        stage_id: i32,
        /// Library ids to leave out of the run
        #[arg(short, long, value_delimiter = ',')]
        exclude: Vec<i64>,
    },

    /// Stored payments of a period
    Payments {
        #[arg(short, long)]
        period_id: i32,
    },

    /// Per-library totals of stored payments
    Summary {
        #[arg(short, long)]
        period_id: i32,
        #[arg(short, long)]
        stage_id: i32,
    },

    /// Sections, revenues, assignments and payments of a period and stage
    Overview {
        #[arg(short, long)]
        period_id: i32,
        #[arg(short, long)]
        stage_id: i32,
    },

    /// Classify library names without touching the database
    Classify {
        /// Library display names
        #[arg(required = true)]
        names: Vec<String>,
    },

    /// Print the JSON schema of an input or output document
    Schema {
        #[arg(value_enum)]
        document: SchemaDocument,
    },
}

#[derive(Subcommand)]
enum StageCommands {
    Create {
        #[arg(short, long)]
        code: String,
        #[arg(short, long)]
        name: String,
        #[arg(short, long, default_value = "0")]
        order: i32,
    },
    List,
    Update {
        id: i32,
        #[arg(short, long)]
        code: Option<String>,
        #[arg(short, long)]
        name: Option<String>,
        #[arg(short, long)]
        order: Option<i32>,
    },
    /// Delete a stage with its sections, assignments, revenues and payments
    Delete { id: i32 },
}

#[derive(Subcommand)]
enum SectionCommands {
    Create {
        #[arg(short, long)]
        stage_id: i32,
        #[arg(short, long)]
        code: String,
        #[arg(short, long)]
        name: String,
    },
    List {
        #[arg(short, long)]
        stage_id: Option<i32>,
    },
    Delete { id: i32 },
}

#[derive(Subcommand)]
enum SubjectCommands {
    Create {
        #[arg(short, long)]
        code: String,
        #[arg(short, long)]
        name: String,
        /// Taught identically across every section of a stage
        #[arg(long)]
        common: bool,
    },
    List,
    /// Flag subjects as common (or section-specific with --specific)
    SetCommon {
        #[arg(value_delimiter = ',', required = true)]
        codes: Vec<String>,
        #[arg(long)]
        specific: bool,
    },
    Delete { id: i32 },
}

#[derive(Subcommand)]
enum PeriodCommands {
    Create {
        #[arg(short, long)]
        name: String,
        #[arg(short, long)]
        year: i32,
        /// Months as YYYY-MM, comma separated
        #[arg(short, long, value_delimiter = ',')]
        months: Vec<String>,
        #[arg(long)]
        notes: Option<String>,
    },
    List,
    Update {
        id: i32,
        #[arg(short, long)]
        name: Option<String>,
        #[arg(short, long)]
        year: Option<i32>,
        #[arg(short, long, value_delimiter = ',')]
        months: Option<Vec<String>>,
        #[arg(long)]
        notes: Option<String>,
    },
    /// Delete a period with its revenues and payments
    Delete { id: i32 },
}

#[derive(Subcommand)]
enum RevenueCommands {
    Set {
        #[arg(short, long)]
        period_id: i32,
        #[arg(short, long)]
        stage_id: i32,
        #[arg(long)]
        section_id: i32,
        #[arg(short, long)]
        orders: i64,
        /// Section revenue in EGP
        #[arg(short, long)]
        revenue: f64,
    },
    List {
        #[arg(short, long)]
        period_id: i32,
        #[arg(short, long)]
        stage_id: i32,
    },
}

#[derive(Subcommand)]
enum StatsCommands {
    /// Import a JSON array of monthly statistics
    Import { file: PathBuf },
    Show { library_id: i64 },
}

#[derive(Subcommand)]
enum AssignCommands {
    Create {
        #[arg(short, long)]
        library_id: i64,
        #[arg(short = 'n', long)]
        library_name: String,
        #[arg(long)]
        stage_id: i32,
        #[arg(long)]
        section_id: Option<i32>,
        #[arg(long)]
        subject_id: i32,
        #[arg(short, long, default_value = "0")]
        tax_rate: f64,
        #[arg(short, long, default_value = "1")]
        revenue_percentage: f64,
    },
    List {
        #[arg(short, long)]
        stage_id: Option<i32>,
    },
    /// Change tax rate, revenue percentage or section
    Update {
        id: i32,
        #[arg(short, long)]
        tax_rate: Option<f64>,
        #[arg(short, long)]
        revenue_percentage: Option<f64>,
        #[arg(long, conflicts_with = "no_section")]
        section_id: Option<i32>,
        #[arg(long)]
        no_section: bool,
    },
    Delete { id: i32 },
    /// Match a JSON array of {"id", "name"} libraries to assignments
    Match {
        file: PathBuf,
        /// Report without creating assignments
        #[arg(long)]
        dry_run: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum SchemaDocument {
    CalculationInput,
    CalculationOutcome,
    CalculationRequest,
    WatchStats,
    Libraries,
    MatchReport,
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn read_json<T: serde::de::DeserializeOwned>(file: &PathBuf) -> anyhow::Result<T> {
    let raw = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read {}", file.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("failed to parse {}", file.display()))
}

fn schema_for(document: SchemaDocument) -> schemars::Schema {
    match document {
        SchemaDocument::CalculationInput => schemars::schema_for!(watchpay::CalculationInput),
        SchemaDocument::CalculationOutcome => schemars::schema_for!(watchpay::CalculationOutcome),
        SchemaDocument::CalculationRequest => schemars::schema_for!(CalculationRequest),
        SchemaDocument::WatchStats => schemars::schema_for!(Vec<WatchStat>),
        SchemaDocument::Libraries => schemars::schema_for!(Vec<LibraryRef>),
        SchemaDocument::MatchReport => schemars::schema_for!(watchpay::MatchReport),
    }
}

async fn open_store() -> anyhow::Result<Store> {
    let config = config::Config::from_env()?;
    tracing::info!(
        "Loaded configuration: max_connections={}, bootstrap_schema={}",
        config.max_connections,
        config.bootstrap_schema
    );
    Ok(Store::connect(&config.store_config()).await?)
}

async fn run(command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Classify { names } => {
            let classified: Vec<_> = names
                .iter()
                .map(|name| {
                    serde_json::json!({
                        "name": name,
                        "classification": watchpay::classify(name),
                    })
                })
                .collect();
            print_json(&classified)
        }
        Commands::Schema { document } => print_json(&schema_for(document)),
        command => run_with_store(open_store().await?, command).await,
    }
}

async fn run_with_store(store: Store, command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Init => {
            watchpay_store::schema::bootstrap(store.db()).await?;
            println!("Schema ready");
            Ok(())
        }
        Commands::Stage { action } => match action {
            StageCommands::Create { code, name, order } => print_json(
                &store
                    .create_stage(NewStage {
                        code,
                        name,
                        display_order: order,
                    })
                    .await?,
            ),
            StageCommands::List => print_json(&store.list_stages().await?),
            StageCommands::Update {
                id,
                code,
                name,
                order,
            } => print_json(
                &store
                    .update_stage(
                        id,
                        StageUpdate {
                            code,
                            name,
                            display_order: order,
                        },
                    )
                    .await?,
            ),
            StageCommands::Delete { id } => {
                store.delete_stage(id).await?;
                println!("Deleted stage {}", id);
                Ok(())
            }
        },
        Commands::Section { action } => match action {
            SectionCommands::Create {
                stage_id,
                code,
                name,
            } => print_json(
                &store
                    .create_section(NewSection {
                        stage_id,
                        code,
                        name,
                    })
                    .await?,
            ),
            SectionCommands::List { stage_id } => print_json(&store.list_sections(stage_id).await?),
            SectionCommands::Delete { id } => {
                store.delete_section(id).await?;
                println!("Deleted section {}", id);
                Ok(())
            }
        },
        Commands::Subject { action } => match action {
            SubjectCommands::Create { code, name, common } => print_json(
                &store
                    .create_subject(NewSubject {
                        code,
                        name,
                        is_common: common,
                    })
                    .await?,
            ),
            SubjectCommands::List => print_json(&store.list_subjects().await?),
            SubjectCommands::SetCommon { codes, specific } => {
                let updated = store.set_subjects_common(&codes, !specific).await?;
                println!("Updated {} subjects", updated);
                Ok(())
            }
            SubjectCommands::Delete { id } => {
                store.delete_subject(id).await?;
                println!("Deleted subject {}", id);
                Ok(())
            }
        },
        Commands::Period { action } => match action {
            PeriodCommands::Create {
                name,
                year,
                months,
                notes,
            } => print_json(
                &store
                    .create_period(NewPeriod {
                        name,
                        year,
                        months,
                        notes,
                    })
                    .await?,
            ),
            PeriodCommands::List => print_json(&store.list_periods().await?),
            PeriodCommands::Update {
                id,
                name,
                year,
                months,
                notes,
            } => print_json(
                &store
                    .update_period(
                        id,
                        PeriodUpdate {
                            name,
                            year,
                            months,
                            notes,
                        },
                    )
                    .await?,
            ),
            PeriodCommands::Delete { id } => {
                store.delete_period(id).await?;
                println!("Deleted period {}", id);
                Ok(())
            }
        },
        Commands::Revenue { action } => match action {
            RevenueCommands::Set {
                period_id,
                stage_id,
                section_id,
                orders,
                revenue,
            } => print_json(
                &store
                    .upsert_section_revenue(RevenueInput {
                        period_id,
                        stage_id,
                        section_id,
                        total_orders: orders,
                        total_revenue_egp: revenue,
                    })
                    .await?,
            ),
            RevenueCommands::List {
                period_id,
                stage_id,
            } => print_json(&store.list_section_revenues(period_id, stage_id).await?),
        },
        Commands::Stats { action } => match action {
            StatsCommands::Import { file } => {
                let stats: Vec<WatchStat> = read_json(&file)?;
                let imported = store.import_watch_stats(&stats).await?;
                println!("Imported {} statistics", imported);
                Ok(())
            }
            StatsCommands::Show { library_id } => {
                print_json(&store.list_watch_stats(library_id).await?)
            }
        },
        Commands::Assign { action } => match action {
            AssignCommands::Create {
                library_id,
                library_name,
                stage_id,
                section_id,
                subject_id,
                tax_rate,
                revenue_percentage,
            } => print_json(
                &store
                    .create_assignment(NewAssignment {
                        library_id,
                        library_name,
                        stage_id,
                        section_id,
                        subject_id,
                        tax_rate,
                        revenue_percentage,
                    })
                    .await?,
            ),
            AssignCommands::List { stage_id } => {
                print_json(&store.list_assignments(stage_id).await?)
            }
            AssignCommands::Update {
                id,
                tax_rate,
                revenue_percentage,
                section_id,
                no_section,
            } => {
                let section_id = if no_section {
                    Some(None)
                } else {
                    section_id.map(Some)
                };
                print_json(
                    &store
                        .update_assignment(
                            id,
                            AssignmentUpdate {
                                tax_rate,
                                revenue_percentage,
                                section_id,
                            },
                        )
                        .await?,
                )
            }
            AssignCommands::Delete { id } => {
                store.delete_assignment(id).await?;
                println!("Deleted assignment {}", id);
                Ok(())
            }
            AssignCommands::Match { file, dry_run } => {
                let libraries: Vec<LibraryRef> = read_json(&file)?;
                let report = if dry_run {
                    store.preview_match(&libraries).await?
                } else {
                    store.auto_match(&libraries).await?
                };
                print_json(&report)
            }
        },
        Commands::Calculate {
            period_id,
            stage_id,
            exclude,
        } => {
            let outcome = store
                .calculate(CalculationRequest {
                    period_id,
                    stage_id,
                    excluded_library_ids: exclude.into_iter().collect::<BTreeSet<_>>(),
                })
                .await?;
            print_json(&outcome)
        }
        Commands::Payments { period_id } => {
            print_json(&store.payments_for_period(period_id).await?)
        }
        Commands::Summary {
            period_id,
            stage_id,
        } => print_json(&store.period_summary(period_id, stage_id).await?),
        Commands::Overview {
            period_id,
            stage_id,
        } => print_json(&store.financial_overview(period_id, stage_id).await?),
        Commands::Classify { .. } | Commands::Schema { .. } => Ok(()),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    run(cli.command).await
}
