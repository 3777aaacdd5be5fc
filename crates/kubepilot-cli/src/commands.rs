//! Subcommand dispatch

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};

use kubepilot_core::ai::prompt::{diagnose_prompt, explain_prompt, ResourceScope};
use kubepilot_core::runtime::{RuntimeResolver, StdioLauncher};
use kubepilot_core::skills::SkillRegistry;
use kubepilot_core::tools::{cluster_tools, KubectlCluster};
use kubepilot_core::{paths, AiConfig, AiError, AiOrchestrator};

use crate::chat;
use crate::terminal::TerminalListener;
use crate::{Cli, Commands};

/// Orchestrator wired to kubectl and the stdio runtime
fn build_orchestrator(config: AiConfig, context: Option<String>) -> AiOrchestrator {
    let cluster = Arc::new(KubectlCluster::new().with_context(context));
    let orchestrator = AiOrchestrator::new(config, Arc::new(StdioLauncher::default()))
        .with_skills(SkillRegistry::new());
    orchestrator.set_tools(cluster_tools(cluster).all());
    orchestrator
}

fn load_config(cli: &Cli) -> Result<AiConfig> {
    let path = cli.config.clone().unwrap_or_else(paths::config_file);
    AiConfig::load(&path)
}

pub async fn run(cli: Cli) -> Result<ExitCode> {
    match &cli.command {
        Commands::Skills => {
            print_skills(&SkillRegistry::new());
            return Ok(ExitCode::SUCCESS);
        }
        Commands::InstallRuntime => {
            install_runtime().await?;
            return Ok(ExitCode::SUCCESS);
        }
        _ => {}
    }

    let mut config = load_config(&cli)?;
    if let Commands::Chat { skill, model, .. } = &cli.command {
        if let Some(model) = model {
            config.model = model.clone();
        }
        if let Some(skill) = skill {
            config.active_skill = skill.clone();
        }
    }
    let config = config.validate();

    let orchestrator = build_orchestrator(config, cli.context.clone());
    let listener = TerminalListener::new(false);

    let result = match cli.command {
        Commands::Chat { resource, .. } => {
            let scope = match resource.as_deref() {
                Some(raw) => Some(
                    ResourceScope::parse(raw)
                        .with_context(|| format!("invalid --resource {:?}, expected KIND/NAME or KIND/NAMESPACE/NAME", raw))?,
                ),
                None => None,
            };
            chat::run(&orchestrator, &listener, scope)
                .await
                .map(|_| ExitCode::SUCCESS)
        }
        Commands::Ask { prompt } => {
            ask(&orchestrator, &listener, &prompt.join(" ")).await
        }
        Commands::Diagnose {
            kind,
            name,
            namespace,
        } => ask(&orchestrator, &listener, &diagnose_prompt(&kind, &name, &namespace)).await,
        Commands::Explain {
            kind,
            name,
            namespace,
        } => ask(&orchestrator, &listener, &explain_prompt(&kind, &name, &namespace)).await,
        Commands::Models => list_models(&orchestrator).await.map(|_| ExitCode::SUCCESS),
        Commands::Skills | Commands::InstallRuntime => Ok(ExitCode::SUCCESS),
    };

    orchestrator.stop().await;
    result
}

async fn ask(
    orchestrator: &AiOrchestrator,
    listener: &TerminalListener,
    prompt: &str,
) -> Result<ExitCode> {
    match orchestrator.send(prompt, listener).await {
        Ok(()) => Ok(ExitCode::SUCCESS),
        // Disabled never reaches the listener
        Err(AiError::Disabled) => Err(AiError::Disabled.into()),
        Err(_) => Ok(ExitCode::FAILURE),
    }
}

async fn list_models(orchestrator: &AiOrchestrator) -> Result<()> {
    let active = orchestrator.active_model();
    for model in orchestrator.list_models().await? {
        let marker = if model.id == active { "*" } else { " " };
        println!("{} {:<28} {}", marker, model.id, model.label());
    }
    Ok(())
}

pub fn print_skills(registry: &SkillRegistry) {
    for skill in registry.all() {
        println!("{:<14} {}", skill.name, skill.description);
        println!("{:<14} tools: {}", "", skill.tool_names.join(", "));
    }
}

async fn install_runtime() -> Result<()> {
    let resolver = RuntimeResolver::new();
    println!("Resolving agent runtime {}...", resolver.version());
    let path = resolver.resolve().await?;
    println!("Agent runtime ready: {}", path.display());
    Ok(())
}
