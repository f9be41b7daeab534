use anyhow::{Context, bail};
use chrono::SecondsFormat;
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use medpulse_core::config::{evaluation_delay_from_env_value, triage_keywords_from_env_value};
use medpulse_core::{
    ConsultationService, CoreConfig, DiagnosticAnalysis, DiagnosticSynthesizer, DietPlan,
    DietStatus, EvaluationHarness, EvaluationReport, Judge, RetrievedContext, TestCorpus, TriageResult,
    Vitals,
};
use medpulse_gemini::{GeminiClient, GeminiConfig, SearchClient, SearchConfig};

#[derive(Parser)]
#[command(name = "medpulse")]
#[command(about = "MedPulse clinical decision pipeline")]
struct Cli {
    /// Print machine-readable JSON instead of text
    #[arg(long, global = true)]
    json: bool,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify symptom urgency
    Triage {
        /// Free-text symptom description
        symptoms: String,
    },
    /// Suggest diagnoses for symptoms and vitals
    Analyse {
        /// Free-text symptom description
        symptoms: String,
        /// Ground the analysis on knowledge-base search results
        #[arg(long)]
        retrieve: bool,
        #[command(flatten)]
        vitals: VitalsArgs,
    },
    /// Generate a diet plan for a diagnosis
    Diet {
        diagnosis: String,
        /// Only print items that are limited or to be avoided
        #[arg(long)]
        restricted_only: bool,
    },
    /// Screen text for personal identifiers
    Redact { text: String },
    /// Check connectivity to the generative model
    Ping,
    /// Run the evaluation corpus through the synthesizer and judge
    Eval {
        /// Alternative corpus YAML file
        #[arg(long)]
        corpus: Option<PathBuf>,
    },
}

#[derive(Args, Default)]
struct VitalsArgs {
    /// Temperature in °C
    #[arg(long)]
    temperature: Option<String>,
    /// Pulse in bpm
    #[arg(long)]
    pulse: Option<String>,
    /// SpO2 in %
    #[arg(long)]
    spo2: Option<String>,
    #[arg(long)]
    bp_systolic: Option<String>,
    #[arg(long)]
    bp_diastolic: Option<String>,
    #[arg(long)]
    weight: Option<String>,
    #[arg(long)]
    height: Option<String>,
    #[arg(long)]
    sugar: Option<String>,
}

impl From<VitalsArgs> for Vitals {
    fn from(args: VitalsArgs) -> Self {
        Self {
            temperature: args.temperature.unwrap_or_default(),
            pulse: args.pulse.unwrap_or_default(),
            spo2: args.spo2.unwrap_or_default(),
            bp_systolic: args.bp_systolic.unwrap_or_default(),
            bp_diastolic: args.bp_diastolic.unwrap_or_default(),
            weight: args.weight.unwrap_or_default(),
            height: args.height.unwrap_or_default(),
            sugar: args.sugar.unwrap_or_default(),
        }
    }
}

#[derive(Serialize)]
struct AnalyseOutput {
    triage: TriageResult,
    analysis: DiagnosticAnalysis,
    #[serde(skip_serializing_if = "RetrievedContext::is_empty")]
    context: RetrievedContext,
}

/// Settings resolved once from the environment at startup.
struct Settings {
    core: CoreConfig,
    gemini: GeminiConfig,
}

impl Settings {
    fn from_env() -> anyhow::Result<Self> {
        let core = CoreConfig::new(
            triage_keywords_from_env_value(std::env::var("MEDPULSE_TRIAGE_KEYWORDS").ok()),
            evaluation_delay_from_env_value(std::env::var("MEDPULSE_EVAL_DELAY_MS").ok())?,
        )?;
        let api_key = std::env::var("API_KEY").context("API_KEY must be set")?;
        let gemini = GeminiConfig::new(api_key)?
            .with_base_url(std::env::var("MEDPULSE_GEMINI_BASE_URL").ok());
        Ok(Self { core, gemini })
    }
}

/// Search settings are only required when retrieval is requested.
fn search_config_from_env() -> anyhow::Result<SearchConfig> {
    let project = std::env::var("MEDPULSE_SEARCH_PROJECT")
        .context("MEDPULSE_SEARCH_PROJECT must be set for --retrieve")?;
    let engine = std::env::var("MEDPULSE_SEARCH_ENGINE")
        .context("MEDPULSE_SEARCH_ENGINE must be set for --retrieve")?;
    let token =
        std::env::var("GCP_ACCESS_TOKEN").context("GCP_ACCESS_TOKEN must be set for --retrieve")?;
    let mut cfg = SearchConfig::new(project, engine, token)?;
    if let Ok(location) = std::env::var("MEDPULSE_SEARCH_LOCATION") {
        cfg.location = location;
    }
    Ok(cfg)
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_triage(result: &TriageResult) {
    println!(
        "Triage: {} (confidence {:.2})",
        result.level, result.confidence
    );
    println!(
        "  scores: critical {:.3}, urgent {:.3}, routine {:.3}",
        result.scores.critical, result.scores.urgent, result.scores.routine
    );
    if result.is_degraded() {
        println!("  warning: embedding service unavailable, classification is a fallback");
    }
}

fn print_diet(plan: &DietPlan, restricted_only: bool) {
    for category in plan.categories() {
        let items: Vec<String> = category
            .items
            .iter()
            .filter(|item| !restricted_only || item.status != DietStatus::Allowed)
            .map(|item| format!("{} [{}]", item.name, item.status))
            .collect();
        if !items.is_empty() {
            println!("{}: {}", category.category, items.join(", "));
        }
    }
}

fn print_report(report: &EvaluationReport) {
    println!(
        "Run {} ({} to {})",
        report.run_id,
        report.started_at.to_rfc3339_opts(SecondsFormat::Secs, true),
        report.finished_at.to_rfc3339_opts(SecondsFormat::Secs, true)
    );
    for result in &report.results {
        println!(
            "#{:<3} {:<8} {:>3}  expected: {} | predicted: {}",
            result.case_id,
            result.case_type.to_string(),
            result.score,
            result.expected,
            result.predicted
        );
        println!("      {}", result.reasoning);
    }
    println!(
        "Average score: {:.1}  Pass rate: {:.1}%  Safety violations: {}",
        report.metrics.average_score, report.metrics.pass_rate, report.metrics.safety_violations
    );
}

/// Main entry point for the MedPulse command-line driver
///
/// Loads `.env`, installs logging, resolves configuration once and dispatches the subcommand.
///
/// # Environment Variables
/// - `API_KEY`: generative-language API key (required)
/// - `MEDPULSE_GEMINI_BASE_URL`: API base URL override
/// - `MEDPULSE_TRIAGE_KEYWORDS`: comma-separated high-risk phrases
/// - `MEDPULSE_EVAL_DELAY_MS`: wait between evaluation cases (default: 800)
/// - `MEDPULSE_SEARCH_PROJECT`, `MEDPULSE_SEARCH_ENGINE`, `MEDPULSE_SEARCH_LOCATION`,
///   `GCP_ACCESS_TOKEN`: knowledge-base search, used by `analyse --retrieve`
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("medpulse=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let Some(command) = cli.command else {
        println!("Use 'medpulse --help' for commands");
        return Ok(());
    };

    let settings = Settings::from_env()?;
    tracing::info!(
        "++ Using {} for generation, {} for embeddings",
        settings.gemini.generation_model(),
        settings.gemini.embedding_model()
    );
    let client = Arc::new(GeminiClient::new(settings.gemini)?);
    let mut service = ConsultationService::new(client.clone(), client.clone(), &settings.core);

    match command {
        Commands::Triage { symptoms } => {
            let result = service.triage(&symptoms).await;
            if cli.json {
                print_json(&result)?;
            } else {
                print_triage(&result);
            }
        }
        Commands::Analyse {
            symptoms,
            retrieve,
            vitals,
        } => {
            if retrieve {
                let search = SearchClient::new(search_config_from_env()?)?;
                service = service.with_retriever(Arc::new(search));
            }
            let vitals = Vitals::from(vitals);
            let triage = service.triage(&symptoms).await;
            let grounded = service.analyze_with_retrieval(&symptoms, &vitals).await;
            let output = AnalyseOutput {
                triage,
                analysis: grounded.analysis,
                context: grounded.context,
            };

            if cli.json {
                print_json(&output)?;
            } else {
                print_triage(&output.triage);
                if !output.context.is_empty() {
                    println!("Context: {} source(s)", output.context.snippets().len());
                    for snippet in output.context.snippets() {
                        println!("  - {}", snippet.title);
                    }
                }
                println!("Suggestions:");
                for (rank, suggestion) in output.analysis.diagnosis_suggestions.iter().enumerate() {
                    println!("  {}. {}", rank + 1, suggestion);
                }
                println!("Rationale: {}", output.analysis.rationale);
                println!("Treatment note: {}", output.analysis.suggested_treatment_note);
            }
        }
        Commands::Diet {
            diagnosis,
            restricted_only,
        } => {
            let plan = service.diet_plan(&diagnosis).await;
            if cli.json {
                print_json(&plan)?;
            } else {
                print_diet(&plan, restricted_only);
            }
        }
        Commands::Redact { text } => {
            let report = service.detect_pii(&text).await;
            if cli.json {
                print_json(&report)?;
            } else {
                println!("{}", report.redacted_text);
                if report.contains_pii {
                    println!("PII found: {}", report.identified_types.join(", "));
                }
            }
        }
        Commands::Ping => {
            let check = service.check_connection().await;
            if cli.json {
                print_json(&check)?;
            } else {
                println!("{}", check.message);
            }
            if !check.success {
                bail!("model connection failed");
            }
        }
        Commands::Eval { corpus } => {
            let corpus = match corpus {
                Some(path) => TestCorpus::load(&path)
                    .with_context(|| format!("failed to load corpus {}", path.display()))?,
                None => TestCorpus::standard()?,
            };
            let harness = EvaluationHarness::new(
                DiagnosticSynthesizer::new(client.clone()),
                Judge::new(client),
                corpus,
                &settings.core,
            );
            let report = harness.run_report().await;
            if cli.json {
                print_json(&report)?;
            } else {
                print_report(&report);
            }
        }
    }

    Ok(())
}
