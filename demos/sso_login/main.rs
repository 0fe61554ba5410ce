//! # SSO Login Example
//!
//! Walks through a full EVE Online login: print the URL to open in a browser,
//! paste back the `code` from the callback, then exchange and verify it.
//!
//! Set `EVE_CLIENT_ID`, `EVE_SECRET_KEY` and `EVE_REDIRECT_URI` (a `.env`
//! file works). `EVE_SSO_SERVER` switches to another SSO server such as the
//! test server.
//!
//! Run: `cargo run --example sso_login -- [code]`

use std::io::{self, BufRead, Write};

use eve_sso::{Credentials, Grant, LIVE_SERVER, SingleSignOn};
use tracing_subscriber::EnvFilter;

fn env(name: &str) -> anyhow::Result<String> {
    std::env::var(name).map_err(|_| anyhow::anyhow!("{} must be set", name))
}

fn read_code() -> anyhow::Result<String> {
    if let Some(code) = std::env::args().nth(1) {
        return Ok(code);
    }

    print!("Paste the code from the callback URL: ");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let server = std::env::var("EVE_SSO_SERVER").unwrap_or_else(|_| LIVE_SERVER.to_string());
    let credentials =
        Credentials::new(env("EVE_CLIENT_ID")?, env("EVE_SECRET_KEY")?, env("EVE_REDIRECT_URI")?)
            .with_server(server);
    let sso = SingleSignOn::new(credentials)?;

    let state = format!("{:x}", std::process::id());
    println!("Open this URL to log in:\n\n  {}\n", sso.redirect_url(&state, Some("publicData")));

    let code = read_code()?;
    let (tokens, character) = sso.access_token(Grant::AuthorizationCode(code)).await?;

    println!("Logged in as {} ({})", character.character_name(), character.character_id());
    println!("Scopes: {}", character.scopes().join(" "));
    println!("Access token expires at {}", character.expires_at());

    if let Some(refresh_token) = tokens.refresh_token {
        let (_, refreshed) = sso.refresh_token(&refresh_token).await?;
        tracing::info!(character_id = refreshed.character_id(), "refresh token accepted");
    }

    Ok(())
}
