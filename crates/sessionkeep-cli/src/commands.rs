use std::io::{self, Write};

use anyhow::Result;
use tracing::debug;

use sessionkeep_core::{AuthError, CredentialStore, SessionController, SessionState};

/// Pre-fills the email prompt
const ENV_EMAIL: &str = "SESSIONKEEP_EMAIL";

/// Pre-fills the password prompt
const ENV_PASSWORD: &str = "SESSIONKEEP_PASSWORD";

const USAGE: &str = "usage: sessionkeep <status|login|register|logout|get PATH>";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Status,
    Login,
    Register,
    Logout,
    Get(String),
}

impl Command {
    /// Parse arguments (program name already stripped). No arguments means `status`.
    pub fn parse(args: &[String]) -> Result<Self, &'static str> {
        match args {
            [] => Ok(Command::Status),
            [cmd] if cmd == "status" => Ok(Command::Status),
            [cmd] if cmd == "login" => Ok(Command::Login),
            [cmd] if cmd == "register" => Ok(Command::Register),
            [cmd] if cmd == "logout" => Ok(Command::Logout),
            [cmd, path] if cmd == "get" => Ok(Command::Get(path.clone())),
            _ => Err(USAGE),
        }
    }
}

/// Run a command, returning the process exit code.
pub async fn run<S>(controller: &SessionController<S>, command: Command) -> Result<i32>
where
    S: CredentialStore + 'static,
{
    match command {
        Command::Status => {
            println!("{}", describe(&controller.state()));
            Ok(0)
        }
        Command::Login => {
            let (email, password) = prompt_credentials()?;
            println!("\nAuthenticating...");
            match controller.login(&email, &password).await {
                Ok(()) => {
                    println!("Login successful!");
                    Ok(0)
                }
                Err(e) => Ok(report(&e)),
            }
        }
        Command::Register => {
            let (email, password) = prompt_credentials()?;
            match controller.register(&email, &password).await {
                Ok(body) => {
                    debug!(%body, "Registration response");
                    println!("Account created. Run `sessionkeep login` to sign in.");
                    Ok(0)
                }
                Err(e) => Ok(report(&e)),
            }
        }
        Command::Logout => match controller.logout().await {
            Ok(()) => {
                println!("Logged out.");
                Ok(0)
            }
            Err(e) => {
                // The session is cleared either way
                println!("Logged out.");
                Ok(report(&e))
            }
        },
        Command::Get(path) => {
            if !controller.session().is_authenticated() {
                eprintln!("Not logged in; sending request without credentials.");
            }
            let body: serde_json::Value = controller.api().get_json(&path).await?;
            println!("{}", serde_json::to_string_pretty(&body)?);
            Ok(0)
        }
    }
}

fn describe(state: &SessionState) -> &'static str {
    match state {
        SessionState::Pending => "Session not restored yet",
        SessionState::Unauthenticated => "Not logged in",
        SessionState::Authenticated(_) => "Logged in",
    }
}

fn report(err: &AuthError) -> i32 {
    eprintln!("Error: {}", err.message());
    1
}

fn prompt_credentials() -> Result<(String, String)> {
    let email = match std::env::var(ENV_EMAIL).ok().filter(|v| !v.is_empty()) {
        Some(email) => email,
        None => prompt_email()?,
    };
    let password = match std::env::var(ENV_PASSWORD).ok().filter(|v| !v.is_empty()) {
        Some(password) => password,
        None => rpassword::prompt_password("Password: ")?,
    };
    if email.is_empty() || password.is_empty() {
        return Err(anyhow::anyhow!("Email and password required"));
    }
    Ok((email, password))
}

fn prompt_email() -> Result<String> {
    print!("Email: ");
    io::stdout().flush()?;

    let mut email = String::new();
    io::stdin().read_line(&mut email)?;
    Ok(email.trim().to_string())
}
