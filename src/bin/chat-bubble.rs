//! Interactive terminal client for the chat-bubble agent API.
//!
//! # Usage
//!
//! ```bash
//! # Talk to a local server, signing in from the environment
//! CHAT_BUBBLE_AUTH_EMAIL=a@b.com CHAT_BUBBLE_AUTH_PASSWORD=secret1 chat-bubble
//!
//! # Point at another server and keep the session elsewhere
//! chat-bubble --base-url https://chat.example.com --credentials ./session.json
//!
//! # Disable colors (useful for piping output)
//! chat-bubble --no-color
//! ```
//!
//! # Commands
//!
//! While chatting, you can use slash commands:
//! - `/login <email> <password>` - Sign in
//! - `/register <email> <password>` - Create an account
//! - `/logout` - Sign out
//! - `/whoami` - Show the signed-in user
//! - `/clear` - Clear conversation history
//! - `/help` - Show available commands
//! - `/quit` - Exit the application

use std::sync::{Arc, Mutex};

use arrrg::CommandLine;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use chat_bubble::chat::{
    ChatArgs, ChatCommand, ChatConfig, ChatSession, PlainTextRenderer, Renderer, help_text,
    parse_command,
};
use chat_bubble::{AgentGateway, ApiClient, AuthGateway, CredentialStore, JsonFileStore};

/// Main entry point for the chat-bubble application.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let (args, _) = ChatArgs::from_command_line_relaxed("chat-bubble [OPTIONS]");
    let config = ChatConfig::from(args);
    let mut renderer = PlainTextRenderer::with_color(config.use_color);

    let store = CredentialStore::new(JsonFileStore::open(&config.credentials_path)?);
    let client = ApiClient::new(&config.client, store)?;
    let auth = AuthGateway::new(client.clone());
    let mut session = ChatSession::new(AgentGateway::new(client))
        .with_max_input_length(config.client.max_input_length);
    let mut rl = DefaultEditor::new()?;

    // The stream in flight, if any; Ctrl+C cancels it.
    let current: Arc<Mutex<Option<CancellationToken>>> = Arc::new(Mutex::new(None));
    let current_clone = Arc::clone(&current);
    ctrlc::set_handler(move || {
        let current = current_clone.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(cancel) = current.as_ref() {
            cancel.cancel();
        }
    })?;

    println!("Chat Bubble ({})", config.client.base_url);
    match auth.initialize(&config.client).await {
        Ok(Some(signed_in)) => renderer.print_info(&format!("Signed in as {}", signed_in.user.email)),
        Ok(None) => renderer.print_info("Not signed in. Use /login or /register."),
        Err(err) => renderer.print_error(&err.to_string()),
    }
    println!("Type /help for commands, /quit to exit\n");

    loop {
        let readline = rl.readline("You: ");

        match readline {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                let _ = rl.add_history_entry(line);

                // Check for slash commands
                if let Some(cmd) = parse_command(line) {
                    match cmd {
                        ChatCommand::Quit => {
                            println!("Goodbye!");
                            break;
                        }
                        ChatCommand::Clear => {
                            session.clear();
                            renderer.print_info("Conversation cleared.");
                        }
                        ChatCommand::Help => {
                            for line in help_text().lines() {
                                println!("    {}", line);
                            }
                        }
                        ChatCommand::Login { email, password } => {
                            match auth.login(&email, &password).await {
                                Ok(signed_in) => {
                                    session.clear_error();
                                    renderer.print_info(&format!(
                                        "Signed in as {}",
                                        signed_in.user.email
                                    ));
                                }
                                Err(err) => renderer.print_error(&err.to_string()),
                            }
                        }
                        ChatCommand::Register { email, password } => {
                            match auth.register(&email, &password).await {
                                Ok(signed_in) => {
                                    session.clear_error();
                                    renderer.print_info(&format!(
                                        "Registered and signed in as {}",
                                        signed_in.user.email
                                    ));
                                }
                                Err(err) => renderer.print_error(&err.to_string()),
                            }
                        }
                        ChatCommand::Logout => match auth.logout() {
                            Ok(()) => renderer.print_info("Signed out."),
                            Err(err) => renderer.print_error(&err.to_string()),
                        },
                        ChatCommand::WhoAmI => match auth.current_user() {
                            Some(user) => {
                                renderer.print_info(&format!("{} (id: {})", user.email, user.id))
                            }
                            None => renderer.print_info("Not signed in."),
                        },
                        ChatCommand::Invalid(message) => {
                            renderer.print_error(&message);
                        }
                    }
                    continue;
                }

                // Regular message - stream the reply
                let cancel = CancellationToken::new();
                *current.lock().unwrap_or_else(|e| e.into_inner()) = Some(cancel.clone());
                let result = session.send_message(line, &mut renderer, &cancel).await;
                *current.lock().unwrap_or_else(|e| e.into_inner()) = None;
                if let Err(err) = result
                    && !err.is_authentication()
                {
                    // Auth rejections were already reported by the session.
                    renderer.print_error(&err.to_string());
                }
            }
            Err(ReadlineError::Interrupted) => {
                // Ctrl+C at prompt - soft interrupt
                println!();
                continue;
            }
            Err(ReadlineError::Eof) => {
                // Ctrl+D - exit
                println!("\nGoodbye!");
                break;
            }
            Err(err) => {
                renderer.print_error(&format!("Input error: {}", err));
                break;
            }
        }
    }

    Ok(())
}
