use anyhow::Result;
use colored::Colorize;
use futures::StreamExt;
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

use judilibre_chat::LegalAssistant;
use judilibre_chat::config::Config;
use judilibre_chat::error::AssistantError;
use judilibre_chat::models::Role;
use judilibre_chat::session::Session;

#[tokio::main]
async fn main() -> Result<()> {
    // Logs on stderr so they never interleave with the streamed answer on stdout
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = Config::load();

    let assistant = match LegalAssistant::new(&config) {
        Ok(assistant) => assistant,
        Err(AssistantError::MissingApiKey) => {
            println!("{}", AssistantError::MissingApiKey.user_message().yellow());
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    println!(
        "{}",
        format!(
            "Chatbot Judilibre ({}). Posez votre question, /history pour l'historique, /quit pour quitter.",
            config.openai.model
        )
        .bold()
    );

    let mut session = Session::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("{} ", "vous>".green().bold());
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let question = line.trim();
        match question {
            "" => continue,
            "/quit" | "/exit" => break,
            "/history" => {
                print_history(&session);
                continue;
            }
            _ => {}
        }

        let mut answer = match assistant.ask(&mut session, question).await {
            Ok(answer) => answer,
            Err(e) => {
                tracing::error!("Turn aborted: {}", e);
                println!("{}", e.user_message().red());
                continue;
            }
        };

        print!("{} ", "assistant>".blue().bold());
        while let Some(chunk) = answer.next().await {
            match chunk {
                Ok(text) => {
                    print!("{text}");
                    std::io::stdout().flush()?;
                }
                Err(e) => {
                    println!();
                    println!("{}", e.user_message().red());
                }
            }
        }
        println!();
        session.commit_answer(&answer);
    }

    tracing::info!("Session {} closed", session.id());
    Ok(())
}

fn print_history(session: &Session) {
    for turn in session.transcript() {
        let label = match turn.role {
            Role::User => "vous".green(),
            Role::Assistant => "assistant".blue(),
            Role::System => "system".dimmed(),
        };
        println!(
            "[{}] {}: {}",
            turn.created_at.format("%H:%M:%S"),
            label,
            turn.content
        );
    }
}
