//! CLI subcommand handlers.

use crate::progress::TerminalProgress;
use crate::{Commands, ConfigAction};
use dialoguer::Input;
use sleuth_core::config::{SearchBackend, SleuthConfig, config_exists, load_config};
use sleuth_core::error::SessionError;
use sleuth_core::providers::resolve_api_key;
use sleuth_core::research::{ResearchController, ResearchEngine, ResearchOutcome, ResearchPlan};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

/// Flags shared by every subcommand.
#[derive(Debug, Default)]
pub struct Options {
    pub model: Option<String>,
    pub quiet: bool,
}

/// Handle a CLI subcommand.
pub async fn handle_command(
    command: Commands,
    workspace: &Path,
    options: &Options,
) -> anyhow::Result<()> {
    match command {
        Commands::Research {
            topic,
            answers,
            output,
            json,
        } => handle_research(&topic, answers, output, json, workspace, options).await,
        Commands::Config { action } => handle_config(action, workspace),
        Commands::Doctor => handle_doctor(workspace),
    }
}

fn resolve_config(workspace: &Path, options: &Options) -> anyhow::Result<SleuthConfig> {
    let mut config = load_config(Some(workspace), None)?;
    if let Some(model) = &options.model {
        config.llm.model = model.clone();
    }
    for warning in config.validate() {
        warn!("{warning}");
    }
    Ok(config)
}

/// Default report file name for `topic`.
pub fn report_file_name(topic: &str) -> String {
    let slug: String = topic
        .trim()
        .chars()
        .map(|c| if c.is_whitespace() || matches!(c, '/' | '\\') { '_' } else { c })
        .collect();
    format!("research_report_{slug}.md")
}

fn collect_answers(questions: &[String], preset: Vec<String>) -> anyhow::Result<Vec<String>> {
    if !preset.is_empty() {
        return Ok(preset);
    }
    let mut answers = Vec::with_capacity(questions.len());
    for question in questions {
        let answer: String = Input::new()
            .with_prompt(question.as_str())
            .validate_with(|input: &String| -> Result<(), &str> {
                if input.trim().is_empty() {
                    Err("Please enter an answer")
                } else {
                    Ok(())
                }
            })
            .interact_text()?;
        answers.push(answer);
    }
    Ok(answers)
}

async fn handle_research(
    topic: &str,
    answers: Vec<String>,
    output: Option<PathBuf>,
    json: bool,
    workspace: &Path,
    options: &Options,
) -> anyhow::Result<()> {
    let config = resolve_config(workspace, options)?;
    let engine = ResearchEngine::from_config(&config)
        .map_err(|e| anyhow::anyhow!("Cannot start research: {}", e))?
        .with_callback(Arc::new(TerminalProgress::new(options.quiet || json)));
    let controller = Arc::new(ResearchController::new(Arc::new(engine)));

    let chatty = prints_progress(options, json);
    let questions = controller.start_session(topic).await?;
    if chatty {
        println!("\nClarifying questions:");
        for question in &questions {
            println!("  {question}");
        }
        println!();
    }

    let answers = collect_answers(&questions, answers)?;
    let plan = controller.submit_answers(answers).await?;
    if chatty {
        print!("{}", plan_summary(&plan));
    }

    let canceller = controller.clone();
    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling research");
            canceller.cancel();
        }
    });
    let result = controller.run_research().await;
    ctrl_c.abort();

    let outcome = match result {
        Ok(outcome) => outcome,
        Err(SessionError::Cancelled) => anyhow::bail!("Research cancelled"),
        Err(e) => return Err(e.into()),
    };

    let path = output.unwrap_or_else(|| workspace.join(report_file_name(topic)));
    std::fs::write(&path, &outcome.report)?;
    info!(path = %path.display(), "Report written");

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        print_summary(&outcome, &path, options.quiet);
    }
    Ok(())
}

/// With `--json`, stdout carries only the outcome document.
fn prints_progress(options: &Options, json: bool) -> bool {
    !options.quiet && !json
}

fn plan_summary(plan: &ResearchPlan) -> String {
    let mut out = format!("Goal: {}\nQueries:\n", plan.goal);
    for query in &plan.queries {
        out.push_str(&format!("  - {query}\n"));
    }
    out.push('\n');
    out
}

fn print_summary(outcome: &ResearchOutcome, path: &Path, quiet: bool) {
    println!("{}", outcome.report);
    if !quiet {
        println!(
            "\n{} results over {} supplemental round(s), ended: {:?}",
            outcome.collected.len(),
            outcome.round_count,
            outcome.termination
        );
        println!("Report saved to {}", path.display());
    }
}

fn handle_config(action: ConfigAction, workspace: &Path) -> anyhow::Result<()> {
    match action {
        ConfigAction::Init => {
            let config_dir = workspace.join(".sleuth");
            std::fs::create_dir_all(&config_dir)?;

            let config_path = config_dir.join("config.toml");
            if config_path.exists() {
                println!(
                    "Configuration file already exists at: {}",
                    config_path.display()
                );
                return Ok(());
            }

            let toml_str = toml::to_string_pretty(&SleuthConfig::default())?;
            std::fs::write(&config_path, &toml_str)?;
            println!(
                "Created default configuration at: {}",
                config_path.display()
            );
            Ok(())
        }
        ConfigAction::Show => {
            let config = load_config(Some(workspace), None)?;
            let toml_str = toml::to_string_pretty(&config)?;
            println!("{}", toml_str);
            Ok(())
        }
    }
}

/// Outcome of one doctor check.
#[derive(Debug, PartialEq)]
pub struct Check {
    pub name: &'static str,
    pub ok: bool,
    pub detail: String,
}

/// Run setup checks against a resolved configuration.
pub fn doctor_checks(config: &SleuthConfig, has_config_file: bool) -> Vec<Check> {
    let mut checks = vec![Check {
        name: "config file",
        ok: true,
        detail: if has_config_file {
            "found".into()
        } else {
            "none, using defaults".into()
        },
    }];

    let warnings = config.validate();
    checks.push(Check {
        name: "config values",
        ok: warnings.is_empty(),
        detail: if warnings.is_empty() {
            "valid".into()
        } else {
            warnings.join("; ")
        },
    });

    let key = resolve_api_key(&config.llm);
    checks.push(Check {
        name: "api key",
        ok: key.is_ok(),
        detail: match &key {
            Ok(_) => format!("available ({})", config.llm.api_key_env),
            Err(e) => e.to_string(),
        },
    });

    checks.push(Check {
        name: "search backend",
        ok: config.search.provider == SearchBackend::DuckDuckGo || key.is_ok(),
        detail: match config.search.provider {
            SearchBackend::OpenAi => "openai web search (uses the api key)".into(),
            SearchBackend::DuckDuckGo => "duckduckgo instant answers".into(),
        },
    });
    checks
}

fn handle_doctor(workspace: &Path) -> anyhow::Result<()> {
    let config = load_config(Some(workspace), None)?;
    let checks = doctor_checks(&config, config_exists(Some(workspace)));
    for check in &checks {
        let mark = if check.ok { "ok" } else { "FAIL" };
        println!("[{mark:>4}] {}: {}", check.name, check.detail);
    }
    if checks.iter().all(|c| c.ok) {
        println!("\nSetup looks good. Models: {} / {}", config.llm.model, config.llm.fast_model);
        Ok(())
    } else {
        anyhow::bail!("setup incomplete")
    }
}
