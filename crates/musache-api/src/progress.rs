//! Upload bodies that report how much has been handed to the connection

use std::sync::Arc;

use async_stream::stream;
use tokio_stream::Stream;

/// Callback receiving upload progress as a percentage in `[0, 100]`.
/// Values never decrease over one upload.
pub type ProgressFn = Arc<dyn Fn(f64) + Send + Sync>;

/// Size of each chunk fed to the request body
pub const UPLOAD_CHUNK_SIZE: usize = 64 * 1024;

/// Split `bytes` into chunks, reporting cumulative progress as each chunk is
/// handed to the transport. The last report is always exactly 100.
pub fn progress_stream(
    bytes: Vec<u8>,
    progress: Option<ProgressFn>,
) -> impl Stream<Item = std::io::Result<Vec<u8>>> + Send + 'static {
    stream! {
        let total = bytes.len();
        if total == 0 {
            if let Some(report) = &progress {
                report(100.0);
            }
            return;
        }

        let mut sent = 0usize;
        for chunk in bytes.chunks(UPLOAD_CHUNK_SIZE) {
            sent += chunk.len();
            if let Some(report) = &progress {
                report(percent(sent, total));
            }
            yield Ok::<_, std::io::Error>(chunk.to_vec());
        }
    }
}

pub(crate) fn progress_body(bytes: Vec<u8>, progress: Option<ProgressFn>) -> reqwest::Body {
    reqwest::Body::wrap_stream(progress_stream(bytes, progress))
}

fn percent(sent: usize, total: usize) -> f64 {
    if sent >= total {
        100.0
    } else {
        (sent as f64 / total as f64) * 100.0
    }
}
