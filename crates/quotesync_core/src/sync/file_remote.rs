//! JSON file-backed remote endpoint.
//!
//! # Invariants
//! - A missing file is an empty remote collection.
//! - Only a document that is not a JSON array fails the fetch; malformed
//!   elements are handed on as drafts and skipped during the merge.
//! - `push` writes a sibling temp file and renames it over the target, so a
//!   reader never observes a half-written snapshot.

use crate::model::quote::Quote;
use crate::service::transfer::{decode_import, encode_export, QuoteDraft};
use crate::sync::remote::{RemoteQuoteEndpoint, TransportError, TransportResult, TransportStage};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

pub struct FileRemote {
    endpoint_id: String,
    path: PathBuf,
}

impl FileRemote {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self {
            endpoint_id: format!("file:{}", path.display()),
            path,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn error(
        &self,
        stage: TransportStage,
        code: &str,
        message: String,
        retryable: bool,
    ) -> TransportError {
        TransportError::new(self.endpoint_id.as_str(), stage, code, message, retryable)
    }
}

impl RemoteQuoteEndpoint for FileRemote {
    fn endpoint_id(&self) -> &str {
        &self.endpoint_id
    }

    fn fetch(&self) -> TransportResult<Vec<QuoteDraft>> {
        let bytes = match std::fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => {
                return Err(self.error(TransportStage::Fetch, "io_error", err.to_string(), true))
            }
        };

        decode_import(&bytes).map_err(|err| {
            self.error(TransportStage::Fetch, "invalid_payload", err.to_string(), false)
        })
    }

    fn push(&self, quotes: &[Quote]) -> TransportResult<()> {
        let io_error = |err: std::io::Error| {
            self.error(TransportStage::Push, "io_error", err.to_string(), true)
        };

        let encoded = encode_export(quotes).map_err(|err| {
            self.error(TransportStage::Push, "encode_failed", err.to_string(), false)
        })?;

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(dir).map_err(io_error)?;

        let mut staged = NamedTempFile::new_in(dir).map_err(io_error)?;
        staged.write_all(&encoded).map_err(io_error)?;
        staged.as_file().sync_all().map_err(io_error)?;
        staged
            .persist(&self.path)
            .map_err(|err| io_error(err.error))?;
        Ok(())
    }
}
