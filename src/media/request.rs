//! Multipart request draining.
//!
//! Buffers an incoming multipart stream into in-memory [`FileUpload`]s,
//! honoring a maximum file count and the per-file size cap, before handing
//! off to the upload orchestrator. Route handlers stay a thin shell: they
//! extract `Multipart` and call [`MediaUploader::upload_from_request`].

use axum::extract::multipart::{Field, Multipart};
use bytes::BytesMut;
use gradnet_common::{Error, Result};
use tracing::debug;

use super::upload::{
    BatchUploadOutcome, FailedUpload, FileUpload, MediaUploader, UploadContext, UploadOptions,
};

/// Fallback MIME type for file parts that don't declare one; validation
/// will reject it unless explicitly allowed.
const OCTET_STREAM: &str = "application/octet-stream";

/// Drain every file part of a multipart stream into memory.
///
/// More file parts than `max_files` fails the whole request as a validation
/// error before any upload I/O. A single part growing past `max_file_size`
/// degrades to a per-file failure instead: the part's remaining bytes are
/// skipped and draining continues, matching the batch partial-failure
/// contract.
pub async fn drain_multipart(
    mut multipart: Multipart,
    max_files: usize,
    max_file_size: usize,
) -> Result<(Vec<FileUpload>, Vec<FailedUpload>)> {
    let mut files = Vec::new();
    let mut failed = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| Error::validation(format!("malformed multipart request: {e}")))?
    {
        let Some(filename) = field.file_name().map(str::to_string) else {
            // Non-file fields (captions etc.) belong to the route layer.
            continue;
        };

        if files.len() + failed.len() >= max_files {
            return Err(Error::validation(format!(
                "request carries more than {max_files} files"
            )));
        }

        match buffer_field(field, max_file_size, &filename).await? {
            Ok(file) => files.push(file),
            Err(failure) => failed.push(failure),
        }
    }

    Ok((files, failed))
}

/// Read one field into memory, capping at `max_file_size`.
///
/// Outer `Err` is a stream-level failure; inner `Err` is this file
/// exceeding the cap.
async fn buffer_field(
    mut field: Field<'_>,
    max_file_size: usize,
    filename: &str,
) -> Result<std::result::Result<FileUpload, FailedUpload>> {
    let content_type = field
        .content_type()
        .unwrap_or(OCTET_STREAM)
        .to_string();

    let mut buf = BytesMut::new();
    loop {
        let chunk = field
            .chunk()
            .await
            .map_err(|e| Error::validation(format!("malformed multipart request: {e}")))?;
        let Some(chunk) = chunk else {
            break;
        };

        if buf.len() + chunk.len() > max_file_size {
            debug!(filename, "dropping oversized multipart file");
            // Dropping the field skips its remaining bytes.
            return Ok(Err(FailedUpload {
                filename: filename.to_string(),
                error: format!("file size exceeds limit {max_file_size}"),
            }));
        }
        buf.extend_from_slice(&chunk);
    }

    Ok(Ok(FileUpload {
        filename: filename.to_string(),
        content_type,
        bytes: buf.freeze(),
    }))
}

impl MediaUploader {
    /// Drain a multipart request and upload its files.
    ///
    /// A single-file request with `replace_existing` goes through the
    /// single-upload path (and propagates its error directly); anything
    /// else goes through the batch path, with drain-time per-file failures
    /// merged into the outcome.
    pub async fn upload_from_request(
        &self,
        multipart: Multipart,
        context: &UploadContext,
        options: &UploadOptions,
        max_files: usize,
    ) -> Result<BatchUploadOutcome> {
        let (files, mut drain_failures) =
            drain_multipart(multipart, max_files, options.max_file_size).await?;

        if files.is_empty() && drain_failures.is_empty() {
            return Err(Error::validation("request carries no files".to_string()));
        }

        let mut outcome = if files.len() == 1 && options.replace_existing {
            let file = files.into_iter().next().expect("len checked");
            let result = self.upload_single(file, context, options).await?;
            BatchUploadOutcome {
                successful: vec![result],
                failed: Vec::new(),
            }
        } else {
            self.upload_multiple(files, context, options).await?
        };

        outcome.failed.append(&mut drain_failures);
        Ok(outcome)
    }
}
