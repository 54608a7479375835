//! Frame formats for streamed query results.
//!
//! A streamed result is a sequence of self-contained frames: one leading
//! frame describing the columns, followed by one frame per row. Every frame
//! ends with a newline so that concatenating any prefix of whole frames
//! yields a well-formed document for the format's content type.

use crate::error::CoreError;
use crate::value::SqlValue;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Wire format for streamed results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrameFormat {
    /// Comma-separated values with a header line
    #[default]
    Csv,
    /// Newline-delimited JSON: a column descriptor object, then one array per row
    Ndjson,
}

impl FrameFormat {
    /// HTTP content type for this format.
    pub fn content_type(&self) -> &'static str {
        match self {
            FrameFormat::Csv => "text/csv; charset=utf-8",
            FrameFormat::Ndjson => "application/x-ndjson",
        }
    }

    /// Encode the leading frame for a result with the given columns.
    pub fn leading_frame(&self, columns: &[String]) -> Frame {
        let mut out = String::new();
        match self {
            FrameFormat::Csv => {
                push_csv_line(&mut out, columns.iter().map(String::as_str));
            }
            FrameFormat::Ndjson => {
                let descriptor = serde_json::json!({ "columns": columns });
                out.push_str(&descriptor.to_string());
                out.push('\n');
            }
        }
        Frame::leading(out)
    }

    /// Encode one row frame.
    pub fn row_frame(&self, values: &[SqlValue]) -> Frame {
        let mut out = String::new();
        match self {
            FrameFormat::Csv => {
                let cells: Vec<String> = values.iter().map(ToString::to_string).collect();
                push_csv_line(&mut out, cells.iter().map(String::as_str));
            }
            FrameFormat::Ndjson => {
                let row: Vec<serde_json::Value> = values.iter().map(SqlValue::to_json).collect();
                out.push_str(&serde_json::Value::Array(row).to_string());
                out.push('\n');
            }
        }
        Frame::row(out)
    }
}

impl fmt::Display for FrameFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameFormat::Csv => write!(f, "csv"),
            FrameFormat::Ndjson => write!(f, "ndjson"),
        }
    }
}

impl FromStr for FrameFormat {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "csv" => Ok(FrameFormat::Csv),
            "ndjson" | "jsonl" => Ok(FrameFormat::Ndjson),
            _ => Err(CoreError::UnknownFrameFormat(s.to_string())),
        }
    }
}

/// Whether a frame describes the result or carries a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    Leading,
    Row,
}

/// One encoded frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub kind: FrameKind,
    pub bytes: Bytes,
}

impl Frame {
    fn leading(text: String) -> Self {
        Self {
            kind: FrameKind::Leading,
            bytes: Bytes::from(text),
        }
    }

    fn row(text: String) -> Self {
        Self {
            kind: FrameKind::Row,
            bytes: Bytes::from(text),
        }
    }
}

fn push_csv_line<'a>(out: &mut String, cells: impl Iterator<Item = &'a str>) {
    for (i, cell) in cells.enumerate() {
        if i > 0 {
            out.push(',');
        }
        if cell.contains([',', '"', '\n', '\r']) {
            out.push('"');
            out.push_str(&cell.replace('"', "\"\""));
            out.push('"');
        } else {
            out.push_str(cell);
        }
    }
    out.push('\n');
}

#[cfg(test)]
#[path = "frame_test.rs"]
mod tests;
