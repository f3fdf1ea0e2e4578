use crate::catalog::CategoryCatalog;
use crate::config::UploaderConfig;
use crate::error::UploaderError;
use crate::metadata::build_video_resource;
use crate::reporter::ProgressReporter;
use std::io::Write;
use std::path::Path;
use yt_oauth::TokenProvider;
use yt_upload::{UploadMedia, Video, VideoUploader};

/// Exit status for a successful run
pub const EXIT_SUCCESS: u8 = 0;
/// Exit status for any failed run
pub const EXIT_FAILURE: u8 = 1;

/// Require a video path that exists on disk
pub fn validate_input(video_path: Option<&Path>) -> Result<&Path, UploaderError> {
    let path = video_path
        .ok_or_else(|| UploaderError::Usage("You must specify a file name".to_string()))?;

    if !path.exists() {
        return Err(UploaderError::Usage(format!(
            "File does not exist {}",
            path.display()
        )));
    }

    Ok(path)
}

async fn open_media(path: &Path) -> Result<UploadMedia, UploaderError> {
    let access_error = |source: std::io::Error| UploaderError::FileAccess {
        path: path.display().to_string(),
        source,
    };

    let file = tokio::fs::File::open(path).await.map_err(access_error)?;
    let metadata = file.metadata().await.map_err(access_error)?;
    if !metadata.is_file() {
        return Err(access_error(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "not a regular file",
        )));
    }

    Ok(UploadMedia::new(file, metadata.len()))
}

/// Upload one recording: metadata, authorization, then the resumable upload.
///
/// Progress and the final video id are written to `out` by the reporter.
pub async fn run<W: Write + Send>(
    video_path: &Path,
    config: &UploaderConfig,
    catalog: &CategoryCatalog,
    tokens: &dyn TokenProvider,
    uploader: &dyn VideoUploader,
    out: &mut W,
) -> Result<Video, UploaderError> {
    let resource = build_video_resource(video_path, config, catalog)?;
    tracing::info!(
        title = %resource.snippet.title,
        category_id = %resource.snippet.category_id,
        privacy = %resource.status.privacy_status,
        "Prepared video metadata"
    );

    let access_token = tokens.access_token().await?;

    let media = open_media(video_path).await?;
    tracing::info!(path = %video_path.display(), total_size = media.total_size, "Uploading");

    let mut reporter = ProgressReporter::new(media.total_size, out);
    let video = uploader
        .insert(&access_token, &resource, media, &mut reporter)
        .await?;

    Ok(video)
}

/// Run the command line workflow and return the process exit status
pub async fn run_cli<W: Write + Send>(
    video_path: Option<&Path>,
    config: &UploaderConfig,
    catalog: &CategoryCatalog,
    tokens: &dyn TokenProvider,
    uploader: &dyn VideoUploader,
    out: &mut W,
) -> u8 {
    let video_path = match validate_input(video_path) {
        Ok(path) => path,
        Err(e) => {
            report_failure(&e, out);
            return EXIT_FAILURE;
        }
    };

    say(out, "YouTube Data API: Upload Video");
    say(out, "==============================");

    match run(video_path, config, catalog, tokens, uploader, out).await {
        Ok(video) => {
            tracing::info!(video_id = %video.id, "Upload finished");
            EXIT_SUCCESS
        }
        Err(e) => {
            report_failure(&e, out);
            EXIT_FAILURE
        }
    }
}

/// Print one `Error:` line per cause. Usage errors are printed as-is.
pub fn report_failure<W: Write>(error: &UploaderError, out: &mut W) {
    tracing::debug!(error = ?error, "Run failed");

    if let UploaderError::Usage(message) = error {
        say(out, message);
        return;
    }

    for cause in error.causes() {
        say(out, &format!("Error: {}", cause));
    }
}

fn say<W: Write>(out: &mut W, line: &str) {
    if let Err(e) = writeln!(out, "{}", line) {
        tracing::warn!(error = %e, "Failed to write to console");
    }
}
