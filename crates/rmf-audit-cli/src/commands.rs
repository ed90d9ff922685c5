use anyhow::{bail, Context};
use rmf_audit_core::{
    AuditConfig, AuditError, AuditService, Category, ConformityEvaluator, Evaluation,
    KeywordEvaluator, QuestionCatalog,
};
use rmf_audit_runtime::{AssistedEvaluator, LlmProvider, RuntimeConfig};
use serde::Serialize;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines, Stdin};

use crate::cli::{AssistArgs, Cli, Commands};
use crate::output::{self, print_one, print_out};
use crate::script::{self, AuditScript};

#[derive(Debug, Serialize)]
struct CategoryRow {
    category: Category,
    description: &'static str,
    questions: usize,
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let json = cli.json;
    let config = load_config(&cli)?;

    match &cli.command {
        Commands::Categories => {
            let catalog = load_catalog(&cli)?;
            let rows: Vec<CategoryRow> = catalog
                .categories()
                .into_iter()
                .map(|category| CategoryRow {
                    category,
                    description: category.description(),
                    questions: catalog.questions_for(category).len(),
                })
                .collect();
            print_out(json, &rows, |r| {
                format!("{}\t{} questions\t{}", r.category, r.questions, r.description)
            })?;
        }
        Commands::Questions { category } => {
            let catalog = load_catalog(&cli)?;
            let category: Category = category.parse()?;
            print_out(json, catalog.questions_for(category), output::question_row)?;
        }
        Commands::Validate => {
            let catalog = load_catalog(&cli)?;
            print_one(json, catalog.load_report().clone(), output::load_report)?;
        }
        Commands::Score {
            baseline,
            evidence,
            category,
            assist,
        } => {
            let evaluation = match Scorer::build(assist, &config)? {
                Scorer::Keyword(heuristic) => heuristic.evaluate(baseline, evidence),
                Scorer::Assisted(assisted) => {
                    let Some(category) = category else {
                        bail!("--assisted scoring needs --category");
                    };
                    let category: Category = category.parse()?;
                    assisted.evaluate(category, baseline, evidence).await
                }
            };
            print_one(json, evaluation, output::evaluation)?;
        }
        Commands::Interview { category, assist } => {
            let scorer = Scorer::build(assist, &config)?;
            let service = AuditService::new(load_catalog(&cli)?, config);
            interview(&service, &scorer, category, json).await?;
            scorer.log_usage();
        }
        Commands::Chat { conversation } => {
            let service = AuditService::new(load_catalog(&cli)?, config);
            chat(&service, conversation, json).await?;
        }
        Commands::Replay { script, assist } => {
            let scorer = Scorer::build(assist, &config)?;
            let service = AuditService::new(load_catalog(&cli)?, config);
            let script = AuditScript::from_path(script)?;
            let summaries = script::replay(&service, &scorer, &script).await?;
            scorer.log_usage();
            print_out(json, &summaries, output::summary)?;
        }
        Commands::Assess { script, assist } => {
            let scorer = Scorer::build(assist, &config)?;
            let service = AuditService::new(load_catalog(&cli)?, config);
            let script = AuditScript::from_path(script)?;
            script::replay(&service, &scorer, &script).await?;
            scorer.log_usage();
            print_one(json, service.assessment()?, output::assessment)?;
        }
    }

    Ok(())
}

/// Config file (if any), then threshold flags, then validation.
fn load_config(cli: &Cli) -> anyhow::Result<AuditConfig> {
    let mut config = match &cli.config {
        Some(path) => AuditConfig::from_path(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => AuditConfig::default(),
    };

    if let Some(full) = cli.full_threshold {
        config.scoring.full_threshold = full;
    }
    if let Some(partial) = cli.partial_threshold {
        config.scoring.partial_threshold = partial;
    }

    config.validate()?;
    Ok(config)
}

fn load_catalog(cli: &Cli) -> anyhow::Result<QuestionCatalog> {
    let catalog = QuestionCatalog::from_path(&cli.questionnaire)
        .map_err(AuditError::from)
        .with_context(|| format!("loading questionnaire {}", cli.questionnaire.display()))?;
    Ok(catalog)
}

/// How submitted evidence gets its verdict.
pub enum Scorer {
    Keyword(KeywordEvaluator),
    Assisted(AssistedEvaluator),
}

impl Scorer {
    fn build(assist: &AssistArgs, config: &AuditConfig) -> anyhow::Result<Self> {
        if !assist.assisted {
            return Ok(Scorer::Keyword(KeywordEvaluator::new(config.scoring.clone())));
        }

        let runtime = match &assist.runtime_config {
            Some(path) => RuntimeConfig::from_path(path)
                .with_context(|| format!("loading runtime config {}", path.display()))?,
            None => RuntimeConfig::default(),
        };
        let provider = assisted_provider(&runtime)?;
        tracing::info!(provider = provider.name(), model = %runtime.model, "Assisted evaluation enabled");

        Ok(Scorer::Assisted(AssistedEvaluator::new(
            provider,
            runtime,
            config.scoring.clone(),
        )))
    }

    /// Score and commit evidence for a session's pending question.
    pub async fn submit(
        &self,
        service: &AuditService,
        session_id: &str,
        evidence: &str,
    ) -> Result<Evaluation, AuditError> {
        match self {
            Scorer::Keyword(_) => service.submit_evidence(session_id, evidence),
            Scorer::Assisted(assisted) => assisted.submit(service, session_id, evidence).await,
        }
    }

    fn log_usage(&self) {
        if let Scorer::Assisted(assisted) = self {
            let usage = assisted.usage();
            tracing::info!(
                calls = usage.llm_calls,
                tokens = usage.total_tokens,
                cache_hits = usage.cache_hits,
                fallbacks = usage.fallbacks,
                "Assisted evaluation usage"
            );
        }
    }
}

#[cfg(feature = "assisted")]
fn assisted_provider(runtime: &RuntimeConfig) -> anyhow::Result<Arc<dyn LlmProvider>> {
    let provider =
        rmf_audit_runtime::AnthropicProvider::from_config(None, runtime.endpoint.as_deref())?;
    Ok(Arc::new(provider))
}

#[cfg(not(feature = "assisted"))]
fn assisted_provider(_runtime: &RuntimeConfig) -> anyhow::Result<Arc<dyn LlmProvider>> {
    bail!("--assisted needs a build with the `assisted` feature")
}

async fn prompt(label: &str, json: bool) -> anyhow::Result<()> {
    if !json {
        let mut stdout = tokio::io::stdout();
        stdout.write_all(label.as_bytes()).await?;
        stdout.flush().await?;
    }
    Ok(())
}

/// Next non-blank line; blank lines between answers are ignored.
async fn next_observation(
    lines: &mut Lines<BufReader<Stdin>>,
) -> anyhow::Result<Option<String>> {
    while let Some(line) = lines.next_line().await? {
        if !line.trim().is_empty() {
            return Ok(Some(line));
        }
    }
    Ok(None)
}

/// Walk one category's questions, reading observation and evidence lines
/// from stdin. Observations skip blank lines; the line after an observation
/// is always its evidence, so a blank evidence line submits no evidence.
/// End of input stops the interview early.
async fn interview(
    service: &AuditService,
    scorer: &Scorer,
    category: &str,
    json: bool,
) -> anyhow::Result<()> {
    let started = service.start_session_by_label(category)?;
    let id = started.session_id.clone();
    if !json {
        println!(
            "{} audit: {} questions ({})",
            started.category,
            started.total_questions,
            started.category.description()
        );
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(question) = service.current_question(&id)? {
        let progress = service.progress(&id)?;
        if !json {
            println!(
                "\n[{}/{}] {} ({})",
                progress.completed + 1,
                progress.total,
                question.sub_question,
                question.control_reference
            );
        }

        prompt("observation> ", json).await?;
        let Some(observation) = next_observation(&mut lines).await? else {
            break;
        };
        let baseline = service.record_observation(&id, &observation)?;
        if !json {
            println!("Baseline evidence: {}", baseline);
        }

        prompt("evidence> ", json).await?;
        let Some(evidence) = lines.next_line().await? else {
            break;
        };
        let evaluation = scorer.submit(service, &id, &evidence).await?;
        if !json {
            println!("{}", output::evaluation(&evaluation));
        }
    }

    if !json {
        println!();
    }
    print_one(json, service.summary(&id)?, output::summary)
}

/// One reply per input line; `--json` emits one JSON object per line.
async fn chat(service: &AuditService, conversation: &str, json: bool) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let reply = service.handle_message(conversation, &line);
        if json {
            println!("{}", serde_json::to_string(&reply)?);
        } else {
            println!("{}\n", output::reply(&reply));
        }
    }
    Ok(())
}
