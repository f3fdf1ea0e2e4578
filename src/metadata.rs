use crate::catalog::CategoryCatalog;
use crate::config::UploaderConfig;
use crate::error::UploaderError;
use crate::filename_date::{format_video_date, parse_video_date};
use std::path::Path;
use yt_upload::{VideoResource, VideoSnippet, VideoStatus};

/// Build the insert metadata for a recording from its file name.
///
/// Fails before anything touches the network when the name carries no
/// timestamp or the configured category is missing from the catalog.
pub fn build_video_resource(
    video_path: &Path,
    config: &UploaderConfig,
    catalog: &CategoryCatalog,
) -> Result<VideoResource, UploaderError> {
    let recorded_at = parse_video_date(video_path, &config.filename_prefix)?;
    let date = format_video_date(&recorded_at);

    let category = catalog
        .get_by_name(&config.category_name)
        .ok_or_else(|| UploaderError::CategoryNotFound(config.category_name.clone()))?;

    Ok(VideoResource {
        snippet: VideoSnippet {
            title: format!("{} - {}", config.title_prefix, date),
            description: format!("{} {}", config.description_prefix, date),
            tags: config.tags.clone(),
            category_id: category.id.clone(),
        },
        status: VideoStatus {
            privacy_status: config.privacy,
        },
    })
}
