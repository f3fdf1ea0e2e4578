use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use yt_oauth::{InstalledAppAuthorizer, TokenStore};
use yt_upload::ResumableUploader;
use yt_video_uploader::workflow::{EXIT_FAILURE, report_failure, validate_input};
use yt_video_uploader::{CategoryCatalog, UploaderConfig, UploaderError, init_tracing, run_cli};

/// YouTube Video Uploader - Uploads a recording with metadata taken from its file name
///
/// Settings such as the client secrets path, account and category are read
/// from YT_UPLOADER_* environment variables.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Video file to upload, e.g. ouP-2021-02-11_12-27-41.avi
    video_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();

    let args = Args::parse();
    let mut stdout = std::io::stdout();

    // Argument problems are reported before any configuration is read
    if let Err(e) = validate_input(args.video_file.as_deref()) {
        report_failure(&e, &mut stdout);
        return ExitCode::from(EXIT_FAILURE);
    }

    let prepared = UploaderConfig::from_env().and_then(|config| {
        let catalog = CategoryCatalog::load(&config.categories_path)?;
        let uploader = ResumableUploader::new(config.api_base.clone())?
            .with_chunk_size(config.chunk_size);
        Ok::<_, UploaderError>((config, catalog, uploader))
    });

    let (config, catalog, uploader) = match prepared {
        Ok(prepared) => prepared,
        Err(e) => {
            report_failure(&e, &mut stdout);
            return ExitCode::from(EXIT_FAILURE);
        }
    };

    tracing::debug!(account = %config.account, api_base = %config.api_base, "Configuration loaded");

    let authorizer = InstalledAppAuthorizer::new(
        config.client_secrets_path.clone(),
        config.account.clone(),
        TokenStore::new(config.token_dir.clone()),
    );

    let status = run_cli(
        args.video_file.as_deref(),
        &config,
        &catalog,
        &authorizer,
        &uploader,
        &mut stdout,
    )
    .await;

    ExitCode::from(status)
}
