//! Slash command parsing for the chat application.
//!
//! This module handles parsing of special commands that start with `/`,
//! allowing users to manage their session without sending messages
//! to the agent.

/// A parsed chat command.
///
/// These commands control the chat session and are not sent to the agent.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatCommand {
    /// Sign in with an existing account.
    Login {
        /// Account email.
        email: String,
        /// Account password.
        password: String,
    },

    /// Create an account and sign in.
    Register {
        /// Account email.
        email: String,
        /// Account password.
        password: String,
    },

    /// Forget the stored session.
    Logout,

    /// Show the signed-in user.
    WhoAmI,

    /// Clear the conversation history.
    Clear,

    /// Display help information.
    Help,

    /// Exit the chat application.
    Quit,

    /// Report a parsing error back to the caller.
    Invalid(String),
}

/// Parses user input for slash commands.
///
/// Returns `Some(ChatCommand)` if the input is a valid command,
/// or `None` if it should be treated as a regular message.
///
/// # Examples
///
/// ```
/// # use chat_bubble::chat::parse_command;
/// assert!(parse_command("/quit").is_some());
/// assert!(parse_command("/login a@b.com secret1").is_some());
/// assert!(parse_command("Hello there!").is_none());
/// ```
pub fn parse_command(input: &str) -> Option<ChatCommand> {
    let input = input.trim();

    let rest = input.strip_prefix('/')?;
    let mut parts = rest.splitn(2, ' ');
    let command = parts.next()?.to_lowercase();
    let argument = parts.next().map(|s| s.trim()).filter(|s| !s.is_empty());

    let result = match command.as_str() {
        "login" => match parse_email_password(argument) {
            Some((email, password)) => ChatCommand::Login { email, password },
            None => ChatCommand::Invalid("/login requires <email> <password>".to_string()),
        },
        "register" => match parse_email_password(argument) {
            Some((email, password)) => ChatCommand::Register { email, password },
            None => ChatCommand::Invalid("/register requires <email> <password>".to_string()),
        },
        "logout" => ChatCommand::Logout,
        "whoami" | "me" => ChatCommand::WhoAmI,
        "clear" => ChatCommand::Clear,
        "help" | "?" => ChatCommand::Help,
        "quit" | "exit" | "q" => ChatCommand::Quit,
        _ => ChatCommand::Invalid(format!("Unknown command: /{}", command)),
    };

    Some(result)
}

fn parse_email_password(argument: Option<&str>) -> Option<(String, String)> {
    let mut words = argument?.split_whitespace();
    let email = words.next()?;
    let password = words.next()?;
    if words.next().is_some() {
        return None;
    }
    Some((email.to_string(), password.to_string()))
}

/// Returns help text describing available commands.
pub fn help_text() -> &'static str {
    r#"Available commands:
  /login <email> <password>     Sign in
  /register <email> <password>  Create an account and sign in
  /logout                       Sign out and forget the stored session
  /whoami                       Show the signed-in user
  /clear                        Clear conversation history
  /help                         Show this help message
  /quit                         Exit the chat
Press Ctrl+C while a reply is streaming to stop it."#
}
