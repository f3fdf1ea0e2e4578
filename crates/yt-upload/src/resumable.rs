use crate::{
    INSERT_PARTS, UploadError, UploadMedia, UploadObserver, UploadProgress, Video, VideoResource,
    VideoUploader,
};
use reqwest::{Client, StatusCode, header};
use std::io::SeekFrom;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

/// Default chunk size (10 MiB). Every chunk but the last must be a multiple of 256 KiB.
pub const DEFAULT_CHUNK_SIZE: usize = 10 * 1024 * 1024;

const DEFAULT_MAX_RETRIES: u32 = 3;
const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Result of a PUT against an upload session
#[derive(Debug)]
enum SessionState {
    /// 308 Resume Incomplete: the server holds `committed` bytes
    Incomplete { committed: u64 },
    Complete(Video),
}

#[derive(Debug)]
enum SessionError {
    /// Transport failure or 5xx, worth asking the session where it stands
    Retryable(String),
    Fatal(String),
}

/// Uploads media through the YouTube resumable upload protocol
#[derive(Debug, Clone)]
pub struct ResumableUploader {
    client: Client,
    api_base: String,
    chunk_size: usize,
    max_retries: u32,
    retry_delay: Duration,
}

impl ResumableUploader {
    /// Create an uploader for the given API base (e.g. `https://www.googleapis.com`)
    pub fn new(api_base: impl Into<String>) -> Result<Self, UploadError> {
        // 308 is "Resume Incomplete" here, never a redirect
        let client = Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| UploadError::new(format!("Failed to create HTTP client: {}", e)))?;

        let api_base: String = api_base.into();

        Ok(Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay: DEFAULT_RETRY_DELAY,
        })
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Retry budget for consecutive failed requests, with exponential backoff from `delay`
    pub fn with_retries(mut self, max_retries: u32, delay: Duration) -> Self {
        self.max_retries = max_retries;
        self.retry_delay = delay;
        self
    }

    /// Open an upload session and return its URI
    async fn initiate(
        &self,
        access_token: &str,
        resource: &VideoResource,
        total_size: u64,
        mime_type: &str,
    ) -> Result<String, String> {
        let url = format!("{}/upload/youtube/v3/videos", self.api_base);

        tracing::info!(%url, total_size, "Initiating resumable upload");

        let response = self
            .client
            .post(&url)
            .query(&[("uploadType", "resumable"), ("part", INSERT_PARTS)])
            .bearer_auth(access_token)
            .header("X-Upload-Content-Length", total_size.to_string())
            .header("X-Upload-Content-Type", mime_type)
            .json(resource)
            .send()
            .await
            .map_err(|e| format!("Failed to initiate resumable upload: {}", e))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(format!(
                "Failed to initiate resumable upload (status {}): {}",
                status, body
            ));
        }

        let session_url = response
            .headers()
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .ok_or("No upload session URI in response (missing Location header)")?
            .to_string();

        tracing::debug!(%session_url, "Upload session opened");

        Ok(session_url)
    }

    async fn put_chunk(
        &self,
        session_url: &str,
        body: Vec<u8>,
        content_range: String,
        mime_type: &str,
    ) -> Result<SessionState, SessionError> {
        tracing::debug!(%content_range, "Sending chunk");

        let response = self
            .client
            .put(session_url)
            .header(header::CONTENT_RANGE, content_range)
            .header(header::CONTENT_TYPE, mime_type)
            .body(body)
            .send()
            .await
            .map_err(|e| SessionError::Retryable(format!("Failed to send chunk: {}", e)))?;

        interpret(response).await
    }

    /// Ask the session how many bytes it holds
    async fn query_status(
        &self,
        session_url: &str,
        total_size: u64,
    ) -> Result<SessionState, SessionError> {
        let response = self
            .client
            .put(session_url)
            .header(header::CONTENT_RANGE, format!("bytes */{}", total_size))
            .body(Vec::new())
            .send()
            .await
            .map_err(|e| SessionError::Retryable(format!("Failed to query upload status: {}", e)))?;

        interpret(response).await
    }

    fn backoff(&self, failures: u32) -> Duration {
        self.retry_delay
            .saturating_mul(2u32.saturating_pow(failures.saturating_sub(1)))
    }
}

#[async_trait::async_trait]
impl VideoUploader for ResumableUploader {
    async fn insert(
        &self,
        access_token: &str,
        resource: &VideoResource,
        media: UploadMedia,
        observer: &mut dyn UploadObserver,
    ) -> Result<Video, UploadError> {
        let UploadMedia {
            mut file,
            total_size,
            mime_type,
        } = media;

        let mut causes: Vec<String> = Vec::new();

        observer.on_progress(&UploadProgress::Starting);

        let session_url = match self
            .initiate(access_token, resource, total_size, &mime_type)
            .await
        {
            Ok(url) => url,
            Err(e) => {
                causes.push(e);
                return Err(fail(observer, 0, causes));
            }
        };

        let mut offset: u64 = 0;
        let mut failures: u32 = 0;

        loop {
            // Nothing left to send (or an empty file): ask the session to finish
            let outcome = if offset >= total_size {
                self.query_status(&session_url, total_size).await
            } else {
                let body = match read_chunk(&mut file, offset, self.chunk_size).await {
                    Ok(body) if !body.is_empty() => body,
                    Ok(_) => {
                        causes.push(format!(
                            "Media ended at {} bytes, expected {}",
                            offset, total_size
                        ));
                        return Err(fail(observer, offset, causes));
                    }
                    Err(e) => {
                        causes.push(format!("Failed to read media at offset {}: {}", offset, e));
                        return Err(fail(observer, offset, causes));
                    }
                };
                let end = offset + body.len() as u64 - 1;
                let range = format!("bytes {}-{}/{}", offset, end, total_size);
                self.put_chunk(&session_url, body, range, &mime_type).await
            };

            // Set when `outcome` is the status query that follows a failed request
            let mut resumed = false;
            let outcome = match outcome {
                Err(SessionError::Retryable(message)) => {
                    causes.push(message);
                    failures += 1;
                    if failures > self.max_retries {
                        return Err(fail(observer, offset, causes));
                    }

                    let delay = self.backoff(failures);
                    tracing::warn!(
                        attempt = failures,
                        delay_ms = delay.as_millis() as u64,
                        "Chunk failed, checking upload status before retrying"
                    );
                    tokio::time::sleep(delay).await;

                    match self.query_status(&session_url, total_size).await {
                        Err(SessionError::Retryable(message)) => {
                            causes.push(message);
                            failures += 1;
                            if failures > self.max_retries {
                                return Err(fail(observer, offset, causes));
                            }
                            continue;
                        }
                        other => {
                            resumed = true;
                            other
                        }
                    }
                }
                other => other,
            };

            match outcome {
                Ok(SessionState::Complete(video)) => {
                    tracing::info!(video_id = %video.id, "Resumable upload complete");
                    observer.on_progress(&UploadProgress::Completed {
                        bytes_sent: total_size,
                    });
                    observer.on_response(&video);
                    return Ok(video);
                }
                Ok(SessionState::Incomplete { committed }) => {
                    if committed > total_size {
                        causes.push(format!(
                            "Server reported {} bytes committed, more than the {} byte file",
                            committed, total_size
                        ));
                        return Err(fail(observer, offset, causes));
                    }

                    if committed > offset {
                        failures = 0;
                        offset = committed;
                        observer.on_progress(&UploadProgress::Uploading { bytes_sent: offset });
                    } else if committed < offset {
                        tracing::warn!(committed, offset, "Server holds fewer bytes, rewinding");
                        offset = committed;
                    } else if resumed {
                        // The failure was already counted; resend from the committed offset
                        tracing::debug!(committed, "Resending after status query");
                    } else {
                        causes.push(format!("Server committed no new bytes past {}", offset));
                        failures += 1;
                        if failures > self.max_retries {
                            return Err(fail(observer, offset, causes));
                        }
                    }
                }
                Err(SessionError::Fatal(message)) | Err(SessionError::Retryable(message)) => {
                    causes.push(message);
                    return Err(fail(observer, offset, causes));
                }
            }
        }
    }
}

fn fail(observer: &mut dyn UploadObserver, bytes_sent: u64, causes: Vec<String>) -> UploadError {
    let error = UploadError::from_causes(causes);
    tracing::error!(bytes_sent, "{}", error);
    observer.on_progress(&UploadProgress::Failed {
        bytes_sent,
        error: error.to_string(),
    });
    error
}

async fn interpret(response: reqwest::Response) -> Result<SessionState, SessionError> {
    let status = response.status();

    if status == StatusCode::PERMANENT_REDIRECT {
        let committed = response
            .headers()
            .get(header::RANGE)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_committed)
            .unwrap_or(0);
        return Ok(SessionState::Incomplete { committed });
    }

    if status.is_success() {
        let video: Video = response
            .json()
            .await
            .map_err(|e| SessionError::Fatal(format!("Failed to decode upload response: {}", e)))?;
        return Ok(SessionState::Complete(video));
    }

    let body = response.text().await.unwrap_or_default();
    let message = format!("Upload request failed (status {}): {}", status, body);
    if status.is_server_error() {
        Err(SessionError::Retryable(message))
    } else {
        Err(SessionError::Fatal(message))
    }
}

/// Parse a `Range: bytes=0-N` header into the number of committed bytes
fn parse_committed(range: &str) -> Option<u64> {
    let last = range
        .trim()
        .strip_prefix("bytes=")?
        .split_once('-')?
        .1
        .trim()
        .parse::<u64>()
        .ok()?;
    Some(last + 1)
}

async fn read_chunk(
    file: &mut tokio::fs::File,
    offset: u64,
    len: usize,
) -> std::io::Result<Vec<u8>> {
    file.seek(SeekFrom::Start(offset)).await?;
    let mut buf = Vec::with_capacity(len);
    (&mut *file).take(len as u64).read_to_end(&mut buf).await?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{PrivacyStatus, VideoSnippet, VideoStatus};
    use mockito::{Matcher, Server};
    use std::io::Write;

    #[derive(Default)]
    struct Recorder {
        events: Vec<UploadProgress>,
        responses: Vec<String>,
    }

    impl UploadObserver for Recorder {
        fn on_progress(&mut self, progress: &UploadProgress) {
            self.events.push(progress.clone());
        }

        fn on_response(&mut self, video: &Video) {
            self.responses.push(video.id.clone());
        }
    }

    fn resource() -> VideoResource {
        VideoResource {
            snippet: VideoSnippet {
                title: "demo".to_string(),
                description: "demo upload".to_string(),
                tags: vec!["Coinbase".to_string()],
                category_id: "28".to_string(),
            },
            status: VideoStatus {
                privacy_status: PrivacyStatus::Unlisted,
            },
        }
    }

    async fn media(contents: &[u8]) -> (tempfile::NamedTempFile, UploadMedia) {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(contents).unwrap();
        tmp.flush().unwrap();
        let file = tokio::fs::File::open(tmp.path()).await.unwrap();
        (tmp, UploadMedia::new(file, contents.len() as u64))
    }

    async fn mock_initiate(server: &mut Server, total: u64) -> mockito::Mock {
        let location = format!("{}/session/1", server.url());
        server
            .mock("POST", "/upload/youtube/v3/videos")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("uploadType".into(), "resumable".into()),
                Matcher::UrlEncoded("part".into(), "snippet,status".into()),
            ]))
            .match_header("authorization", "Bearer token")
            .match_header("x-upload-content-length", total.to_string().as_str())
            .match_header("x-upload-content-type", "video/*")
            .match_body(Matcher::PartialJson(serde_json::json!({
                "snippet": { "title": "demo", "categoryId": "28" },
                "status": { "privacyStatus": "unlisted" }
            })))
            .with_status(200)
            .with_header("location", &location)
            .create_async()
            .await
    }

    #[test]
    fn parses_committed_range() {
        assert_eq!(parse_committed("bytes=0-3"), Some(4));
        assert_eq!(parse_committed("bytes=0-262143"), Some(262_144));
        assert_eq!(parse_committed("items=0-3"), None);
        assert_eq!(parse_committed("bytes=0-"), None);
    }

    #[tokio::test]
    async fn uploads_in_chunks_and_reports_progress() {
        let mut server = Server::new_async().await;
        let init = mock_initiate(&mut server, 8).await;
        let first = server
            .mock("PUT", "/session/1")
            .match_header("content-range", "bytes 0-3/8")
            .with_status(308)
            .with_header("range", "bytes=0-3")
            .create_async()
            .await;
        let second = server
            .mock("PUT", "/session/1")
            .match_header("content-range", "bytes 4-7/8")
            .with_status(200)
            .with_body(r#"{"id":"abc123"}"#)
            .create_async()
            .await;

        let uploader = ResumableUploader::new(server.url()).unwrap().with_chunk_size(4);
        let (_tmp, media) = media(b"abcdefgh").await;
        let mut recorder = Recorder::default();

        let video = uploader
            .insert("token", &resource(), media, &mut recorder)
            .await
            .unwrap();

        assert_eq!(video.id, "abc123");
        assert_eq!(
            recorder.events,
            vec![
                UploadProgress::Starting,
                UploadProgress::Uploading { bytes_sent: 4 },
                UploadProgress::Completed { bytes_sent: 8 },
            ]
        );
        assert_eq!(recorder.responses, vec!["abc123".to_string()]);
        init.assert_async().await;
        first.assert_async().await;
        second.assert_async().await;
    }

    #[tokio::test]
    async fn resends_bytes_the_server_did_not_commit() {
        let mut server = Server::new_async().await;
        let _init = mock_initiate(&mut server, 8).await;
        let _partial = server
            .mock("PUT", "/session/1")
            .match_header("content-range", "bytes 0-7/8")
            .with_status(308)
            .with_header("range", "bytes=0-4")
            .create_async()
            .await;
        let rest = server
            .mock("PUT", "/session/1")
            .match_header("content-range", "bytes 5-7/8")
            .with_status(201)
            .with_body(r#"{"id":"resumed"}"#)
            .create_async()
            .await;

        let uploader = ResumableUploader::new(server.url()).unwrap().with_chunk_size(8);
        let (_tmp, media) = media(b"abcdefgh").await;
        let mut recorder = Recorder::default();

        let video = uploader
            .insert("token", &resource(), media, &mut recorder)
            .await
            .unwrap();

        assert_eq!(video.id, "resumed");
        assert!(recorder.events.contains(&UploadProgress::Uploading { bytes_sent: 5 }));
        rest.assert_async().await;
    }

    #[tokio::test]
    async fn recovers_from_server_error_by_querying_status() {
        let mut server = Server::new_async().await;
        let _init = mock_initiate(&mut server, 8).await;
        let _broken = server
            .mock("PUT", "/session/1")
            .match_header("content-range", "bytes 0-7/8")
            .with_status(503)
            .with_body("backend unavailable")
            .create_async()
            .await;
        let status = server
            .mock("PUT", "/session/1")
            .match_header("content-range", "bytes */8")
            .with_status(308)
            .with_header("range", "bytes=0-3")
            .create_async()
            .await;
        let rest = server
            .mock("PUT", "/session/1")
            .match_header("content-range", "bytes 4-7/8")
            .with_status(200)
            .with_body(r#"{"id":"recovered"}"#)
            .create_async()
            .await;

        let uploader = ResumableUploader::new(server.url())
            .unwrap()
            .with_chunk_size(8)
            .with_retries(3, Duration::ZERO);
        let (_tmp, media) = media(b"abcdefgh").await;
        let mut recorder = Recorder::default();

        let video = uploader
            .insert("token", &resource(), media, &mut recorder)
            .await
            .unwrap();

        assert_eq!(video.id, "recovered");
        status.assert_async().await;
        rest.assert_async().await;
    }

    #[tokio::test]
    async fn client_error_fails_without_retry() {
        let mut server = Server::new_async().await;
        let _init = mock_initiate(&mut server, 8).await;
        let _forbidden = server
            .mock("PUT", "/session/1")
            .with_status(403)
            .with_body("quotaExceeded")
            .expect(1)
            .create_async()
            .await;

        let uploader = ResumableUploader::new(server.url()).unwrap().with_chunk_size(8);
        let (_tmp, media) = media(b"abcdefgh").await;
        let mut recorder = Recorder::default();

        let err = uploader
            .insert("token", &resource(), media, &mut recorder)
            .await
            .unwrap_err();

        assert_eq!(err.causes().len(), 1);
        assert!(err.causes()[0].contains("403"));
        assert!(err.causes()[0].contains("quotaExceeded"));
        assert!(matches!(
            recorder.events.last(),
            Some(UploadProgress::Failed { bytes_sent: 0, .. })
        ));
        assert!(recorder.responses.is_empty());
    }

    #[tokio::test]
    async fn collects_every_cause_when_retries_run_out() {
        let mut server = Server::new_async().await;
        let _init = mock_initiate(&mut server, 8).await;
        let _broken = server
            .mock("PUT", "/session/1")
            .with_status(500)
            .with_body("internal")
            .create_async()
            .await;

        let uploader = ResumableUploader::new(server.url())
            .unwrap()
            .with_chunk_size(8)
            .with_retries(2, Duration::ZERO);
        let (_tmp, media) = media(b"abcdefgh").await;
        let mut recorder = Recorder::default();

        let err = uploader
            .insert("token", &resource(), media, &mut recorder)
            .await
            .unwrap_err();

        assert!(err.causes().len() >= 3);
        assert!(err.causes().iter().all(|cause| cause.contains("500")));
        assert!(matches!(
            recorder.events.last(),
            Some(UploadProgress::Failed { .. })
        ));
    }

    #[tokio::test]
    async fn each_server_error_uses_one_retry() {
        let mut server = Server::new_async().await;
        let _init = mock_initiate(&mut server, 8).await;
        let chunk = server
            .mock("PUT", "/session/1")
            .match_header("content-range", "bytes 0-7/8")
            .with_status(503)
            .with_body("backend unavailable")
            .expect(4)
            .create_async()
            .await;
        let status = server
            .mock("PUT", "/session/1")
            .match_header("content-range", "bytes */8")
            .with_status(308)
            .expect(3)
            .create_async()
            .await;

        let uploader = ResumableUploader::new(server.url())
            .unwrap()
            .with_chunk_size(8)
            .with_retries(3, Duration::ZERO);
        let (_tmp, media) = media(b"abcdefgh").await;
        let mut recorder = Recorder::default();

        let err = uploader
            .insert("token", &resource(), media, &mut recorder)
            .await
            .unwrap_err();

        chunk.assert_async().await;
        status.assert_async().await;
        assert_eq!(err.causes().len(), 4);
        assert!(err.causes().iter().all(|cause| cause.contains("503")));
    }

    #[tokio::test]
    async fn rewinds_when_server_holds_fewer_bytes() {
        let mut server = Server::new_async().await;
        let _init = mock_initiate(&mut server, 8).await;
        let _first = server
            .mock("PUT", "/session/1")
            .match_header("content-range", "bytes 0-3/8")
            .with_status(308)
            .with_header("range", "bytes=0-3")
            .create_async()
            .await;
        let _broken = server
            .mock("PUT", "/session/1")
            .match_header("content-range", "bytes 4-7/8")
            .with_status(503)
            .expect(1)
            .create_async()
            .await;
        let _status = server
            .mock("PUT", "/session/1")
            .match_header("content-range", "bytes */8")
            .with_status(308)
            .with_header("range", "bytes=0-1")
            .create_async()
            .await;
        let resent = server
            .mock("PUT", "/session/1")
            .match_header("content-range", "bytes 2-5/8")
            .with_status(308)
            .with_header("range", "bytes=0-5")
            .create_async()
            .await;
        let last = server
            .mock("PUT", "/session/1")
            .match_header("content-range", "bytes 6-7/8")
            .with_status(200)
            .with_body(r#"{"id":"rewound"}"#)
            .create_async()
            .await;

        let uploader = ResumableUploader::new(server.url())
            .unwrap()
            .with_chunk_size(4)
            .with_retries(3, Duration::ZERO);
        let (_tmp, media) = media(b"abcdefgh").await;
        let mut recorder = Recorder::default();

        let video = uploader
            .insert("token", &resource(), media, &mut recorder)
            .await
            .unwrap();

        assert_eq!(video.id, "rewound");
        resent.assert_async().await;
        last.assert_async().await;
    }

    #[tokio::test]
    async fn empty_file_is_sent_as_single_request() {
        let mut server = Server::new_async().await;
        let _init = mock_initiate(&mut server, 0).await;
        let finish = server
            .mock("PUT", "/session/1")
            .match_header("content-range", "bytes */0")
            .with_status(200)
            .with_body(r#"{"id":"empty"}"#)
            .create_async()
            .await;

        let uploader = ResumableUploader::new(server.url()).unwrap();
        let (_tmp, media) = media(b"").await;
        let mut recorder = Recorder::default();

        let video = uploader
            .insert("token", &resource(), media, &mut recorder)
            .await
            .unwrap();

        assert_eq!(video.id, "empty");
        finish.assert_async().await;
    }

    #[tokio::test]
    async fn missing_session_location_is_an_error() {
        let mut server = Server::new_async().await;
        let _init = server
            .mock("POST", "/upload/youtube/v3/videos")
            .match_query(Matcher::Any)
            .with_status(200)
            .create_async()
            .await;

        let uploader = ResumableUploader::new(server.url()).unwrap();
        let (_tmp, media) = media(b"abcd").await;
        let mut recorder = Recorder::default();

        let err = uploader
            .insert("token", &resource(), media, &mut recorder)
            .await
            .unwrap_err();

        assert!(err.causes()[0].contains("Location"));
        assert_eq!(recorder.events.first(), Some(&UploadProgress::Starting));
        assert!(matches!(
            recorder.events.last(),
            Some(UploadProgress::Failed { .. })
        ));
    }
}
