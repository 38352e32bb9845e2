//! File-level helpers for TFRecords containers.
//!
//! The codec itself works on in-memory buffers; these functions are the thin
//! boundary used when a container lives on local disk.

use std::fs;
use std::path::Path;

use log::info;

use crate::builder::build_tfrecords;
use crate::error::TfrecError;
use crate::reader::{ReadOptions, TfRecordsReader};

/// Reads and parses a TFRecords file.
///
/// # Errors
/// Returns an error if the file cannot be read, or if it is corrupt and
/// `opts.lenient` is not set.
///
/// # Example
/// ```no_run
/// use std::path::Path;
/// use tfrec::{read_tfrecords, ReadOptions};
///
/// let reader = read_tfrecords(Path::new("train.tfrecord"), &ReadOptions::default())?;
/// println!("{} record(s)", reader.len());
/// # Ok::<(), tfrec::TfrecError>(())
/// ```
pub fn read_tfrecords(path: &Path, opts: &ReadOptions) -> Result<TfRecordsReader, TfrecError> {
    let bytes = fs::read(path).map_err(|source| TfrecError::ReadFile {
        path: path.to_path_buf(),
        source,
    })?;

    let reader = TfRecordsReader::with_options(&bytes, opts)?;
    info!(
        "read {} record(s) from {} ({} bytes)",
        reader.len(),
        path.display(),
        bytes.len()
    );
    Ok(reader)
}

/// Frames `records` and writes them to `path`, replacing any existing file.
///
/// # Errors
/// Returns an error if the file cannot be written.
pub fn write_tfrecords<R: AsRef<[u8]>>(path: &Path, records: &[R]) -> Result<(), TfrecError> {
    let bytes = build_tfrecords(records);
    fs::write(path, &bytes).map_err(|source| TfrecError::WriteFile {
        path: path.to_path_buf(),
        source,
    })?;

    info!(
        "wrote {} record(s) to {} ({} bytes)",
        records.len(),
        path.display(),
        bytes.len()
    );
    Ok(())
}
