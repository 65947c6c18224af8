//! `bwapi-authenticate`: log in to Brandwatch and store the access token.
//!
//! Missing credentials are prompted for; the password is read without
//! echo. The token is written to the credentials store so later SDK
//! sessions can authenticate with a username only.

use anyhow::{Context, Result};
use clap::Parser;
use std::io::{self, BufRead, Write};
use tracing::debug;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use bwapi::config::{Args, ClientConfig};
use bwapi::project::{AuthOptions, User};
use bwapi::VERSION;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging; RUST_LOG overrides --debug
    let log_level = if args.debug { "debug" } else { "info" };

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level)),
        )
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;

    debug!("bwapi-authenticate v{}", VERSION);

    let client = ClientConfig::from(&args);
    let store = args.store_path();

    if args.username.is_none() || args.password.is_none() {
        println!("Please enter your Brandwatch credentials below");
    }

    let username = match args.username {
        Some(username) => username,
        None => prompt_username()?,
    };
    let password = match args.password {
        Some(password) => password,
        None => rpassword::prompt_password("Password: ").context("Failed to read password")?,
    };

    println!("Authenticating user: {}", username);

    let options = AuthOptions::new()
        .username(username)
        .password(password)
        .credentials_path(store)
        .client_config(client);

    let user = User::connect(options).await?;
    println!("Success! Access token: {}", user.token());

    Ok(())
}

fn prompt_username() -> Result<String> {
    print!("Username: ");
    io::stdout().flush()?;

    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .context("Failed to read username")?;

    let username = line.trim().to_string();
    if username.is_empty() {
        anyhow::bail!("A username is required");
    }
    Ok(username)
}
