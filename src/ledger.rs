//! The per-frame audit ledger (`metadata.csv`).
//!
//! One row is appended for every *examined* frame, kept or not, in the order
//! frames are examined. Rows are flushed as they are written so an aborted
//! run still leaves a readable prefix.
//!
//! ```text
//! frame_index,time_sec,blur_score,saved,path
//! 0,0.0,153.27,1,out/frames/frame_00000000.jpg
//! 10,0.3333,41.9,0,
//! ```

use std::{
    fs::File,
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

use crate::error::FramesiftError;

/// Column header line.
pub const LEDGER_HEADER: &str = "frame_index,time_sec,blur_score,saved,path";

/// Ledger file name inside the output directory.
pub const LEDGER_FILE_NAME: &str = "metadata.csv";

/// One examined frame.
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerRecord {
    /// Index of the frame in the source.
    pub frame_index: u64,
    /// Timestamp in seconds.
    pub time_sec: f64,
    /// Sharpness score after the transform stage.
    pub quality_score: f64,
    /// Whether the frame was written to disk.
    pub kept: bool,
    /// Where it was written, if kept.
    pub stored_path: Option<PathBuf>,
}

impl LedgerRecord {
    /// Render as one CSV line without the trailing newline.
    pub fn to_csv_row(&self) -> String {
        let path = self
            .stored_path
            .as_ref()
            .map(|path| escape_field(&path.display().to_string()))
            .unwrap_or_default();
        format!(
            "{},{},{},{},{}",
            self.frame_index,
            format_rounded(self.time_sec, 4),
            format_rounded(self.quality_score, 2),
            u8::from(self.kept),
            path,
        )
    }
}

/// Round to `places` decimals and print the shortest representation that
/// reads back as the rounded value (`0.2`, `0.0`, `153.27`).
///
/// Rounding works on the exact binary value, and exact ties go to the even
/// digit, so `0.125` becomes `0.12` and `1/32` becomes `0.0312`.
pub fn format_rounded(value: f64, places: usize) -> String {
    let fixed = format!("{value:.places$}");
    let rounded = fixed.parse::<f64>().unwrap_or(value);
    // Avoid printing "-0.0" for tiny negatives.
    let rounded = if rounded == 0.0 { 0.0 } else { rounded };
    format!("{rounded:?}")
}

/// Quote a field if it contains a delimiter, quote or line break.
fn escape_field(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// Append-only writer for ledger rows.
pub struct LedgerWriter<W: Write> {
    writer: W,
    path: PathBuf,
    last_index: Option<u64>,
    rows: u64,
}

impl LedgerWriter<BufWriter<File>> {
    /// Create (or truncate) the ledger file at `path` and write the header.
    ///
    /// # Errors
    ///
    /// Returns [`FramesiftError::PersistenceFailure`] if the file cannot be
    /// created or the header cannot be written.
    pub fn create(path: &Path) -> Result<Self, FramesiftError> {
        let file = File::create(path).map_err(|error| FramesiftError::persistence(path, error))?;
        Self::with_path(BufWriter::new(file), path.to_path_buf())
    }
}

impl<W: Write> LedgerWriter<W> {
    /// Wrap `writer` and emit the header line.
    pub fn new(writer: W) -> Result<Self, FramesiftError> {
        Self::with_path(writer, PathBuf::from(LEDGER_FILE_NAME))
    }

    fn with_path(mut writer: W, path: PathBuf) -> Result<Self, FramesiftError> {
        writeln!(writer, "{LEDGER_HEADER}")
            .and_then(|()| writer.flush())
            .map_err(|error| FramesiftError::persistence(&path, error))?;
        Ok(Self {
            writer,
            path,
            last_index: None,
            rows: 0,
        })
    }

    /// Append and flush one row.
    ///
    /// # Errors
    ///
    /// Returns [`FramesiftError::InvalidConfiguration`] if `record` does not
    /// advance the frame index, or [`FramesiftError::PersistenceFailure`] on
    /// a write error.
    pub fn append(&mut self, record: &LedgerRecord) -> Result<(), FramesiftError> {
        if self.last_index.is_some_and(|last| record.frame_index <= last) {
            return Err(FramesiftError::InvalidConfiguration(format!(
                "ledger rows must advance: {} after {:?}",
                record.frame_index, self.last_index
            )));
        }

        writeln!(self.writer, "{}", record.to_csv_row())
            .and_then(|()| self.writer.flush())
            .map_err(|error| FramesiftError::persistence(&self.path, error))?;

        self.last_index = Some(record.frame_index);
        self.rows += 1;
        Ok(())
    }

    /// Rows written so far, excluding the header.
    pub fn rows(&self) -> u64 {
        self.rows
    }

    /// Flush and hand back the underlying writer.
    pub fn finish(mut self) -> Result<W, FramesiftError> {
        self.writer
            .flush()
            .map_err(|error| FramesiftError::persistence(&self.path, error))?;
        Ok(self.writer)
    }
}
