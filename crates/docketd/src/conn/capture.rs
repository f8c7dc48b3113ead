//! Passive capture of raw client bytes.
//!
//! Bytes are tee'd into `_*.partial` inside the capture directory while the
//! connection is served. A capture that ends with a clean disconnect is
//! renamed to `<dir>/<first two hex digits>/<sha256>.bin`; any other ending
//! deletes it. Capture failures are logged and never affect the connection.

use std::fs;
use std::io::{self, Read, Write};

use camino::{Utf8Path, Utf8PathBuf};
use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use super::CONN_TARGET;

struct Capture {
    dir: Utf8PathBuf,
    file: NamedTempFile,
    hasher: Sha256,
    len: u64,
}

impl Capture {
    fn create(dir: &Utf8Path) -> io::Result<Self> {
        fs::create_dir_all(dir)?;
        let file = tempfile::Builder::new()
            .prefix("_")
            .suffix(".partial")
            .tempfile_in(dir)?;
        Ok(Self {
            dir: dir.to_path_buf(),
            file,
            hasher: Sha256::new(),
            len: 0,
        })
    }

    fn record(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.file.write_all(bytes)?;
        self.hasher.update(bytes);
        self.len = self
            .len
            .saturating_add(u64::try_from(bytes.len()).unwrap_or(u64::MAX));
        Ok(())
    }

    fn persist(self) -> io::Result<Utf8PathBuf> {
        let hash = format!("{:x}", self.hasher.finalize());
        let bucket = self.dir.join(hash.get(..2).unwrap_or("00"));
        fs::create_dir_all(&bucket)?;
        let path = bucket.join(format!("{hash}.bin"));
        self.file.as_file().sync_all()?;
        self.file.persist(&path).map_err(|error| error.error)?;
        Ok(path)
    }
}

/// Reader that copies everything it reads into an optional capture file.
pub(super) struct CaptureReader<R> {
    inner: R,
    capture: Option<Capture>,
}

impl<R: Read> CaptureReader<R> {
    /// Wraps `inner`; capturing is enabled when `dir` is given and usable.
    pub(super) fn new(inner: R, dir: Option<&Utf8Path>) -> Self {
        let capture = dir.and_then(|dir| match Capture::create(dir) {
            Ok(capture) => Some(capture),
            Err(error) => {
                warn!(
                    target: CONN_TARGET,
                    dir = %dir,
                    error = %error,
                    "failed to start capture"
                );
                None
            }
        });
        Self { inner, capture }
    }

    /// Keeps the capture after a clean disconnect and deletes it otherwise.
    ///
    /// Returns the path of a kept capture.
    pub(super) fn finish(self, clean: bool) -> Option<Utf8PathBuf> {
        let capture = self.capture?;
        if !clean || capture.len == 0 {
            return None;
        }
        match capture.persist() {
            Ok(path) => {
                debug!(target: CONN_TARGET, path = %path, "capture saved");
                Some(path)
            }
            Err(error) => {
                warn!(target: CONN_TARGET, error = %error, "failed to save capture");
                None
            }
        }
    }
}

impl<R: Read> Read for CaptureReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let read = self.inner.read(buf)?;
        if let Some(capture) = self.capture.as_mut()
            && let Err(error) = capture.record(buf.get(..read).unwrap_or_default())
        {
            warn!(target: CONN_TARGET, error = %error, "capture write failed; capture disabled");
            self.capture = None;
        }
        Ok(read)
    }
}
