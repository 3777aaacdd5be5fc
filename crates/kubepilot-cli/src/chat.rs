//! Interactive chat loop

use anyhow::Result;
use tokio::io::{AsyncBufReadExt, BufReader};

use kubepilot_core::ai::prompt::{chat_scope, contextual_prompt, ResourceScope};
use kubepilot_core::AiOrchestrator;

use crate::commands::print_skills;
use crate::terminal::TerminalListener;

/// A line of chat input
#[derive(Debug, PartialEq, Eq)]
enum Input<'a> {
    Prompt(&'a str),
    Skill(&'a str),
    Skills,
    Model(&'a str),
    Models,
    Reset,
    Help,
    Quit,
    Empty,
    Unknown(&'a str),
}

impl<'a> Input<'a> {
    fn parse(line: &'a str) -> Self {
        let line = line.trim();
        if line.is_empty() {
            return Input::Empty;
        }
        let Some(command) = line.strip_prefix('/') else {
            return Input::Prompt(line);
        };

        let (name, arg) = match command.split_once(char::is_whitespace) {
            Some((name, arg)) => (name, arg.trim()),
            None => (command, ""),
        };
        match (name, arg) {
            ("skill", "") | ("skills", _) => Input::Skills,
            // `/skill none` clears the skill
            ("skill", "none") => Input::Skill(""),
            ("skill", skill) => Input::Skill(skill),
            ("model", "") | ("models", _) => Input::Models,
            ("model", model) => Input::Model(model),
            ("reset", _) | ("new", _) => Input::Reset,
            ("help", _) | ("?", _) => Input::Help,
            ("quit", _) | ("exit", _) | ("q", _) => Input::Quit,
            (other, _) => Input::Unknown(other),
        }
    }
}

const HELP: &str = "\
/skill <name>   activate a skill (/skill none clears it)
/skills         list skills
/model <id>     switch model
/models         list available models
/reset          start a fresh session
/quit           leave";

pub async fn run(
    orchestrator: &AiOrchestrator,
    listener: &TerminalListener,
    scope: Option<ResourceScope>,
) -> Result<()> {
    println!(
        "kubepilot chat [{}] model={} skill={}  (/help for commands)",
        chat_scope(scope.as_ref()),
        orchestrator.active_model(),
        display_skill(&orchestrator.active_skill())
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        eprint!("> ");
        let Some(line) = lines.next_line().await? else {
            break;
        };

        match Input::parse(&line) {
            Input::Empty => {}
            Input::Quit => break,
            Input::Help => println!("{}", HELP),
            Input::Skills => print_skills(orchestrator.skills()),
            Input::Skill(name) => {
                if !name.is_empty() && orchestrator.skills().get(name).is_none() {
                    eprintln!("unknown skill: {}", name);
                    continue;
                }
                orchestrator.set_skill(name).await;
                println!(
                    "skill: {} ({} tools)",
                    display_skill(name),
                    orchestrator.active_tools().len()
                );
            }
            Input::Models => match orchestrator.list_models().await {
                Ok(models) => {
                    for model in models {
                        println!("  {:<28} {}", model.id, model.label());
                    }
                }
                Err(e) => eprintln!("error: {}", e),
            },
            Input::Model(model) => {
                orchestrator.set_model(model).await;
                println!("model: {}", model);
            }
            Input::Reset => {
                orchestrator.reset_session().await;
                println!("session reset");
            }
            Input::Unknown(command) => eprintln!("unknown command /{} (try /help)", command),
            Input::Prompt(text) => {
                let prompt = contextual_prompt(text, scope.as_ref());
                // Failures are shown by the listener; the loop goes on
                if let Err(e) = orchestrator.send(&prompt, listener).await {
                    tracing::debug!("Turn failed: {}", e);
                    if !e.is_retryable() {
                        eprintln!("error: {}", e);
                        break;
                    }
                }
            }
        }
    }
    Ok(())
}

fn display_skill(name: &str) -> &str {
    if name.is_empty() {
        "(all tools)"
    } else {
        name
    }
}
