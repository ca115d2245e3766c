//! NDJSON file sink
//!
//! One serialized `Record` per line, appended and flushed one at a time.

use crate::storage::traits::{LoadReport, RecordSink, StorageResult};
use crate::storage::Record;
use serde_json::Value;
use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Append-only newline-delimited JSON sink
pub struct NdjsonSink {
    path: PathBuf,
    writer: Option<File>,
}

impl NdjsonSink {
    /// Creates a sink for the file at `path`
    ///
    /// Nothing is opened until the first read or append; a missing file is an
    /// empty sink.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            writer: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn writer(&mut self) -> StorageResult<&mut File> {
        let file = match self.writer.take() {
            Some(file) => file,
            None => {
                if let Some(parent) = self.path.parent() {
                    if !parent.as_os_str().is_empty() {
                        std::fs::create_dir_all(parent)?;
                    }
                }

                OpenOptions::new()
                    .create(true)
                    .read(true)
                    .append(true)
                    .open(&self.path)?
            }
        };

        Ok(self.writer.insert(file))
    }
}

impl RecordSink for NdjsonSink {
    fn load_urls(&self) -> StorageResult<LoadReport> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(LoadReport::default()),
            Err(e) => return Err(e.into()),
        };

        let mut report = LoadReport::default();

        for (line_no, line) in BufReader::new(file).split(b'\n').enumerate() {
            let line = line?;
            if line.iter().all(u8::is_ascii_whitespace) {
                continue;
            }

            match url_from_line(&line) {
                Some(url) => report.urls.push(url),
                None => {
                    tracing::warn!(
                        "Skipping malformed entry at {}:{}",
                        self.path.display(),
                        line_no + 1
                    );
                    report.malformed += 1;
                }
            }
        }

        Ok(report)
    }

    fn append(&mut self, record: &Record) -> StorageResult<()> {
        // Serialize fully before touching the file so a bad record writes nothing
        let mut line = serde_json::to_string(record)?;
        line.push('\n');

        append_line(self.writer()?, line.as_bytes())?;
        Ok(())
    }
}

/// A file-like target that a failed append can be cut back on
trait LineTarget: Read + Write + Seek {
    fn truncate_to(&mut self, len: u64) -> io::Result<()>;
}

impl LineTarget for File {
    fn truncate_to(&mut self, len: u64) -> io::Result<()> {
        self.set_len(len)
    }
}

/// Appends one newline-terminated line as a unit
///
/// If the target does not end in a newline (a torn earlier write, or a file
/// edited by hand) a separator is written first so the new line stands on
/// its own. A failed write is truncated back to the previous length.
fn append_line<T: LineTarget>(target: &mut T, line: &[u8]) -> io::Result<()> {
    let start = target.seek(SeekFrom::End(0))?;

    let mut buffer = Vec::with_capacity(line.len() + 1);
    if start > 0 {
        let mut last = [0u8; 1];
        target.seek(SeekFrom::End(-1))?;
        target.read_exact(&mut last)?;
        if last[0] != b'\n' {
            buffer.push(b'\n');
        }
    }
    buffer.extend_from_slice(line);

    if let Err(e) = write_at_end(target, &buffer) {
        if let Err(rollback) = target.truncate_to(start) {
            tracing::error!("Could not roll back partial append: {}", rollback);
        }
        return Err(e);
    }

    Ok(())
}

fn write_at_end<T: LineTarget>(target: &mut T, bytes: &[u8]) -> io::Result<()> {
    target.seek(SeekFrom::End(0))?;
    target.write_all(bytes)?;
    target.flush()
}

/// Returns the non-empty `product_url` of a JSON object line
fn url_from_line(line: &[u8]) -> Option<String> {
    let value: Value = serde_json::from_slice(line).ok()?;
    value
        .get("product_url")
        .and_then(Value::as_str)
        .filter(|url| !url.is_empty())
        .map(str::to_string)
}
