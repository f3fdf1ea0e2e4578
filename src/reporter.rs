use std::io::Write;
use yt_upload::{UploadObserver, UploadProgress, Video};

/// Prints upload progress against a total size fixed before the upload starts
pub struct ProgressReporter<W: Write + Send> {
    total_size: u64,
    out: W,
}

impl<W: Write + Send> ProgressReporter<W> {
    pub fn new(total_size: u64, out: W) -> Self {
        Self { total_size, out }
    }

    /// Share of the file confirmed so far, as a percentage
    pub fn percent(&self, bytes_sent: u64) -> f64 {
        if self.total_size == 0 {
            return 100.0;
        }
        bytes_sent as f64 / self.total_size as f64 * 100.0
    }

    fn print(&mut self, line: &str) {
        // Console output is best effort; a closed stdout must not abort the upload
        if let Err(e) = writeln!(self.out, "{}", line) {
            tracing::warn!(error = %e, "Failed to write progress");
        }
    }
}

impl<W: Write + Send> UploadObserver for ProgressReporter<W> {
    fn on_progress(&mut self, progress: &UploadProgress) {
        match progress {
            UploadProgress::Uploading { bytes_sent } => {
                let line = format!(
                    "{} bytes sent. ({:.2}%)",
                    bytes_sent,
                    self.percent(*bytes_sent)
                );
                self.print(&line);
            }
            UploadProgress::Failed { error, .. } => {
                self.print(&format!(
                    "An error prevented the upload from completing.\n{}",
                    error
                ));
            }
            UploadProgress::Starting => tracing::debug!("Upload starting"),
            UploadProgress::Completed { bytes_sent } => {
                tracing::debug!(bytes_sent, "All bytes accepted")
            }
        }
    }

    fn on_response(&mut self, video: &Video) {
        self.print(&format!("Video id '{}' was successfully uploaded.", video.id));
    }
}
