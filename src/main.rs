use anyhow::Result;
use dialoguer::{Input, Password};
use std::sync::Arc;
use uuid::Uuid;

mod api;
mod auth;
mod config;
mod error;
mod models;

use api::{ChatApi, SessionApi};
use auth::{CredentialStore, RequestCoordinator};
use error::ApiError;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (for log level)
    let config = config::Config::load()?;
    config.validate()?;

    // Initialize logging with a configured level
    let log_level = config.log_level.to_lowercase();
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .init();

    tracing::info!("🚀 LexMedica client starting...");
    tracing::info!("API endpoint: {}", config.api_base_url);

    let store = Arc::new(CredentialStore::open(&config.credentials_file)?);
    let coordinator = Arc::new(RequestCoordinator::new(
        config.api_base_url.clone(),
        store,
        config.http_connect_timeout,
        config.http_request_timeout,
    )?);

    let session = SessionApi::new(coordinator.clone());
    let chat = ChatApi::new(coordinator.clone());

    // Surface session expiry as it happens; the chat loop below returns to
    // the login prompt on the matching error
    let mut expired = coordinator.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = expired.recv().await {
            tracing::warn!("Session expired: {}", event.reason);
        }
    });

    print_banner(&config);

    loop {
        if !coordinator.store().has_credentials() {
            login_prompt(&session).await?;
        }

        if !chat_loop(&session, &chat).await? {
            break;
        }
    }

    tracing::info!("👋 Goodbye");
    Ok(())
}

/// Prompt for credentials until a login succeeds
async fn login_prompt(session: &SessionApi) -> Result<()> {
    loop {
        let email: String = Input::new().with_prompt("Email").interact_text()?;
        let password: String = Password::new().with_prompt("Password").interact()?;

        match session.login(&email, &password).await {
            Ok(user) => {
                println!("Signed in as {}", user.email);
                return Ok(());
            }
            Err(ApiError::AuthError(msg)) => {
                eprintln!("{}", msg);
            }
            Err(e) => {
                eprintln!("Login failed: {}", e);
            }
        }
    }
}

/// Read-eval loop for one chat session
///
/// Returns false when the user asked to quit, true when control should go
/// back to the login prompt.
async fn chat_loop(session: &SessionApi, chat: &ChatApi) -> Result<bool> {
    let session_id = Uuid::new_v4();
    let prompt = session
        .current_user()
        .map(|u| u.email)
        .unwrap_or_else(|| "you".to_string());

    println!("New consultation started. /history, /logout, /quit");

    loop {
        let line: String = Input::new()
            .with_prompt(&prompt)
            .allow_empty(true)
            .interact_text()?;
        let line = line.trim();

        match line {
            "" => continue,
            "/quit" => return Ok(false),
            "/logout" => {
                session.logout().await?;
                return Ok(true);
            }
            "/history" => match chat.history(session_id).await {
                Ok(messages) => {
                    for message in messages {
                        println!(
                            "[{}] {:?}: {}",
                            message.created_at.format("%H:%M:%S"),
                            message.role,
                            message.content
                        );
                    }
                }
                Err(ApiError::SessionExpired(_)) => return Ok(true),
                Err(e) => eprintln!("Error: {}", e),
            },
            question => match chat.ask(session_id, question).await {
                Ok(answer) => {
                    println!();
                    println!("{}", answer.answer);
                    if !answer.sources.is_empty() {
                        println!();
                        println!("Sources:");
                        for source in &answer.sources {
                            match &source.url {
                                Some(url) => println!("  - {} ({})", source.title, url),
                                None => println!("  - {}", source.title),
                            }
                        }
                    }
                    println!();
                }
                Err(ApiError::SessionExpired(_)) => {
                    eprintln!("Your session has expired. Please sign in again.");
                    return Ok(true);
                }
                Err(e) => eprintln!("Error: {}", e),
            },
        }
    }
}

/// Print startup banner
fn print_banner(config: &config::Config) {
    println!();
    println!("  LexMedica — legal & medical Q&A");
    println!("  Version:   {}", env!("CARGO_PKG_VERSION"));
    println!("  API:       {}", config.api_base_url);
    println!("  Log level: {}", config.log_level);
    println!();
}
