use clap::Parser;
use std::path::PathBuf;
use yt_oauth::{
    ClientSecrets, OAuthConfig, TokenStore, YOUTUBE_UPLOAD_SCOPE, start_auth_flow,
};

/// OAuth 2.0 helper tool: authorize an account for uploads ahead of time
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the client secrets JSON downloaded from the Google Cloud console
    #[arg(long, required = true)]
    client_secrets: PathBuf,

    /// Account identifier the token is cached under
    #[arg(long, default_value = "default")]
    account: String,

    /// Directory holding cached OAuth tokens
    #[arg(long, required = true)]
    token_dir: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let secrets = ClientSecrets::load(&args.client_secrets)?;
    let config =
        OAuthConfig::from_secrets(&secrets, YOUTUBE_UPLOAD_SCOPE).with_login_hint(&args.account);

    // Always run the consent flow so a stale or revoked token gets replaced
    let token = start_auth_flow(&config).await?;

    let store = TokenStore::new(&args.token_dir);
    store.save(&args.account, &token)?;

    eprintln!(
        "\nOAuth token saved to: {}",
        store.path_for(&args.account).display()
    );
    eprintln!("You can now upload with yt-video-uploader");

    Ok(())
}
