//! Columnar suggestion table and its on-disk format
//!
//! The table is the single persisted artifact: the corpus lives in the
//! `suggestion` column and the ledger in `selection_count`. Any other column
//! is carried through untouched.
//!
//! # File format
//!
//! ```text
//! magic "SGTB" | version u8 | row_count u32 | column_count u16
//! per column:
//!   name: varint len + utf8
//!   type: u8 (0 utf8, 1 uint64, 2 int64, 3 float64)
//!   row_count values:
//!     utf8    -> varint len + bytes
//!     uint64  -> varint
//!     int64   -> i64 LE
//!     float64 -> f64 LE
//! footer: crc32 u32 LE over everything before it | "BTGS"
//! ```
//!
//! Files ending in `.parquet` are read and written as Apache Parquet instead,
//! so datasets produced by pandas/pyarrow load directly.
//!
//! Saves go through a temp file and a rename so readers never observe a
//! partially written table.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::collections::HashSet;
use std::fs;
use std::io::{self, Cursor, Read, Write};
use std::path::{Path, PathBuf};

use crate::error::{Result, SuggestError};
use crate::varint::{decode_str, decode_varint, encode_str, encode_varint};

mod parquet_io;

/// Column holding the corpus text
pub const SUGGESTION_COLUMN: &str = "suggestion";

/// Column holding the selection ledger
pub const SELECTION_COUNT_COLUMN: &str = "selection_count";

/// Magic bytes: "SGTB"
pub const MAGIC: [u8; 4] = *b"SGTB";

/// Footer magic: "BTGS"
pub const FOOTER_MAGIC: [u8; 4] = *b"BTGS";

/// Current format version
pub const VERSION: u8 = 1;

const HEADER_LEN: usize = 4 + 1 + 4 + 2;
const FOOTER_LEN: usize = 4 + 4;

const TAG_UTF8: u8 = 0;
const TAG_UINT64: u8 = 1;
const TAG_INT64: u8 = 2;
const TAG_FLOAT64: u8 = 3;

/// Values of a single column
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnData {
    Utf8(Vec<String>),
    UInt64(Vec<u64>),
    Int64(Vec<i64>),
    Float64(Vec<f64>),
}

impl ColumnData {
    /// Number of rows in the column
    pub fn len(&self) -> usize {
        match self {
            ColumnData::Utf8(v) => v.len(),
            ColumnData::UInt64(v) => v.len(),
            ColumnData::Int64(v) => v.len(),
            ColumnData::Float64(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Human-readable type name
    pub fn type_name(&self) -> &'static str {
        match self {
            ColumnData::Utf8(_) => "utf8",
            ColumnData::UInt64(_) => "uint64",
            ColumnData::Int64(_) => "int64",
            ColumnData::Float64(_) => "float64",
        }
    }

    fn tag(&self) -> u8 {
        match self {
            ColumnData::Utf8(_) => TAG_UTF8,
            ColumnData::UInt64(_) => TAG_UINT64,
            ColumnData::Int64(_) => TAG_INT64,
            ColumnData::Float64(_) => TAG_FLOAT64,
        }
    }
}

/// A named column
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub data: ColumnData,
}

impl Column {
    pub fn new(name: impl Into<String>, data: ColumnData) -> Self {
        Self {
            name: name.into(),
            data,
        }
    }
}

/// In-memory columnar dataset backing the corpus and the ledger
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SuggestionTable {
    columns: Vec<Column>,
    num_rows: usize,
}

impl SuggestionTable {
    /// Create a table from columns of equal length with unique names
    pub fn new(columns: Vec<Column>) -> Result<Self> {
        let num_rows = columns.first().map(|c| c.data.len()).unwrap_or(0);
        let mut seen = HashSet::new();
        for column in &columns {
            if !seen.insert(column.name.as_str()) {
                return Err(SuggestError::schema(format!(
                    "duplicate column '{}'",
                    column.name
                )));
            }
            if column.data.len() != num_rows {
                return Err(SuggestError::schema(format!(
                    "column '{}' has {} rows, expected {}",
                    column.name,
                    column.data.len(),
                    num_rows
                )));
            }
        }
        Ok(Self { columns, num_rows })
    }

    /// Create a fresh table with every selection count at zero
    pub fn from_suggestions<I, S>(suggestions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let texts: Vec<String> = suggestions.into_iter().map(Into::into).collect();
        let num_rows = texts.len();
        Self {
            columns: vec![
                Column::new(SUGGESTION_COLUMN, ColumnData::Utf8(texts)),
                Column::new(SELECTION_COUNT_COLUMN, ColumnData::UInt64(vec![0; num_rows])),
            ],
            num_rows,
        }
    }

    pub fn num_rows(&self) -> usize {
        self.num_rows
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Look up a column by name
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Corpus text, in row order
    pub fn suggestions(&self) -> Result<&[String]> {
        match self.required(SUGGESTION_COLUMN)? {
            ColumnData::Utf8(values) => Ok(values),
            other => Err(column_type(SUGGESTION_COLUMN, "utf8", other)),
        }
    }

    /// Selection counts, in row order
    pub fn selection_counts(&self) -> Result<&[u64]> {
        match self.required(SELECTION_COUNT_COLUMN)? {
            ColumnData::UInt64(values) => Ok(values),
            other => Err(column_type(SELECTION_COUNT_COLUMN, "uint64", other)),
        }
    }

    /// Corpus text and mutable counts, borrowed together
    pub(crate) fn ledger_mut(&mut self) -> Result<(&[String], &mut [u64])> {
        let mut texts = None;
        let mut counts = None;
        for column in self.columns.iter_mut() {
            match column.name.as_str() {
                SUGGESTION_COLUMN => texts = Some(&mut column.data),
                SELECTION_COUNT_COLUMN => counts = Some(&mut column.data),
                _ => {}
            }
        }
        let texts = match texts {
            Some(ColumnData::Utf8(values)) => values,
            Some(other) => return Err(column_type(SUGGESTION_COLUMN, "utf8", other)),
            None => return Err(missing(SUGGESTION_COLUMN)),
        };
        let counts = match counts {
            Some(ColumnData::UInt64(values)) => values,
            Some(other) => return Err(column_type(SELECTION_COUNT_COLUMN, "uint64", other)),
            None => return Err(missing(SELECTION_COUNT_COLUMN)),
        };
        Ok((texts.as_slice(), counts.as_mut_slice()))
    }

    /// Make sure the ledger column exists and is unsigned
    ///
    /// A missing column is added with every count at zero. A signed column is
    /// converted as long as no value is negative.
    pub fn ensure_selection_counts(&mut self) -> Result<()> {
        let num_rows = self.num_rows;
        let Some(idx) = self
            .columns
            .iter()
            .position(|c| c.name == SELECTION_COUNT_COLUMN)
        else {
            self.columns.push(Column::new(
                SELECTION_COUNT_COLUMN,
                ColumnData::UInt64(vec![0; num_rows]),
            ));
            return Ok(());
        };
        let column = &mut self.columns[idx];

        match &column.data {
            ColumnData::UInt64(_) => Ok(()),
            ColumnData::Int64(values) => {
                let converted = values
                    .iter()
                    .map(|&v| u64::try_from(v))
                    .collect::<std::result::Result<Vec<u64>, _>>()
                    .map_err(|_| {
                        SuggestError::schema(format!(
                            "column '{}' contains negative counts",
                            SELECTION_COUNT_COLUMN
                        ))
                    })?;
                column.data = ColumnData::UInt64(converted);
                Ok(())
            }
            other => Err(column_type(SELECTION_COUNT_COLUMN, "uint64", other)),
        }
    }

    fn required(&self, name: &str) -> Result<&ColumnData> {
        self.column(name)
            .map(|c| &c.data)
            .ok_or_else(|| missing(name))
    }

    /// Serialize the table, footer included
    pub fn to_bytes(&self) -> io::Result<Vec<u8>> {
        let mut buf = Vec::new();
        buf.write_all(&MAGIC)?;
        buf.write_u8(VERSION)?;
        buf.write_u32::<LittleEndian>(to_u32(self.num_rows, "row count")?)?;
        buf.write_u16::<LittleEndian>(
            u16::try_from(self.columns.len())
                .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "too many columns"))?,
        )?;

        for column in &self.columns {
            encode_str(&column.name, &mut buf)?;
            buf.write_u8(column.data.tag())?;
            match &column.data {
                ColumnData::Utf8(values) => {
                    for v in values {
                        encode_str(v, &mut buf)?;
                    }
                }
                ColumnData::UInt64(values) => {
                    for &v in values {
                        encode_varint(v, &mut buf)?;
                    }
                }
                ColumnData::Int64(values) => {
                    for &v in values {
                        buf.write_i64::<LittleEndian>(v)?;
                    }
                }
                ColumnData::Float64(values) => {
                    for &v in values {
                        buf.write_f64::<LittleEndian>(v)?;
                    }
                }
            }
        }

        let crc = crc32fast::hash(&buf);
        buf.write_u32::<LittleEndian>(crc)?;
        buf.write_all(&FOOTER_MAGIC)?;
        Ok(buf)
    }

    /// Decode a table, verifying the footer checksum first
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_LEN + FOOTER_LEN {
            return Err(SuggestError::corrupt(format!(
                "file too short ({} bytes)",
                bytes.len()
            )));
        }
        let (payload, footer) = bytes.split_at(bytes.len() - FOOTER_LEN);
        if footer[4..] != FOOTER_MAGIC {
            return Err(SuggestError::corrupt("missing footer magic"));
        }
        let expected_crc = stored_crc(bytes);
        let computed_crc = crc32fast::hash(payload);
        if expected_crc != computed_crc {
            return Err(SuggestError::corrupt(format!(
                "CRC32 mismatch: expected {:#010x}, got {:#010x}",
                expected_crc, computed_crc
            )));
        }

        let mut reader = Cursor::new(payload);
        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic).map_err(decode_err)?;
        if magic != MAGIC {
            return Err(SuggestError::corrupt("bad magic"));
        }
        let version = reader.read_u8().map_err(decode_err)?;
        if version != VERSION {
            return Err(SuggestError::corrupt(format!(
                "unsupported version {}",
                version
            )));
        }
        let num_rows = reader.read_u32::<LittleEndian>().map_err(decode_err)? as usize;
        let num_columns = reader.read_u16::<LittleEndian>().map_err(decode_err)? as usize;

        let mut columns = Vec::with_capacity(num_columns);
        for _ in 0..num_columns {
            let left = remaining(&reader);
            let name = decode_str(&mut reader, left).map_err(decode_err)?;
            let tag = reader.read_u8().map_err(decode_err)?;
            // Every value takes at least one byte, which bounds the allocation
            let capacity = num_rows.min(left);
            let data = match tag {
                TAG_UTF8 => {
                    let mut values = Vec::with_capacity(capacity);
                    for _ in 0..num_rows {
                        let limit = remaining(&reader);
                        values.push(decode_str(&mut reader, limit).map_err(decode_err)?);
                    }
                    ColumnData::Utf8(values)
                }
                TAG_UINT64 => {
                    let mut values = Vec::with_capacity(capacity);
                    for _ in 0..num_rows {
                        values.push(decode_varint(&mut reader).map_err(decode_err)?);
                    }
                    ColumnData::UInt64(values)
                }
                TAG_INT64 => {
                    let mut values = Vec::with_capacity(capacity);
                    for _ in 0..num_rows {
                        values.push(reader.read_i64::<LittleEndian>().map_err(decode_err)?);
                    }
                    ColumnData::Int64(values)
                }
                TAG_FLOAT64 => {
                    let mut values = Vec::with_capacity(capacity);
                    for _ in 0..num_rows {
                        values.push(reader.read_f64::<LittleEndian>().map_err(decode_err)?);
                    }
                    ColumnData::Float64(values)
                }
                other => {
                    return Err(SuggestError::corrupt(format!(
                        "unknown column type tag {} for '{}'",
                        other, name
                    )))
                }
            };
            columns.push(Column::new(name, data));
        }

        if remaining(&reader) != 0 {
            return Err(SuggestError::corrupt(format!(
                "{} trailing bytes after last column",
                remaining(&reader)
            )));
        }

        let mut table = Self::new(columns)?;
        // A table with no columns still records its row count
        table.num_rows = num_rows;
        Ok(table)
    }

    /// Load a table from disk, picking the format from the file extension
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        match TableFormat::from_path(path) {
            TableFormat::Sgtb => Self::load_sgtb(path),
            TableFormat::Parquet => Self::load_parquet(path),
        }
    }

    /// Write the whole table to disk, replacing any existing file
    ///
    /// The format follows the file extension, as in [`SuggestionTable::load`].
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        match TableFormat::from_path(path) {
            TableFormat::Sgtb => self.save_sgtb(path),
            TableFormat::Parquet => self.save_parquet(path),
        }
    }

    /// Load a table in the native format
    pub fn load_sgtb(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read(path).map_err(|source| SuggestError::Load {
            path: path.to_path_buf(),
            source,
        })?;
        let table = Self::from_bytes(&raw)?;
        tracing::info!(
            "Loaded table {:?} ({} rows, {} columns, CRC32={:#010x})",
            path,
            table.num_rows,
            table.columns.len(),
            stored_crc(&raw)
        );
        Ok(table)
    }

    /// Write the table in the native format
    pub fn save_sgtb(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let bytes = self
            .to_bytes()
            .map_err(|source| persistence(path, source))?;

        let tmp = tmp_path(path);
        fs::write(&tmp, &bytes).map_err(|source| persistence(path, source))?;
        if let Err(e) = fs::rename(&tmp, path) {
            let _ = fs::remove_file(&tmp);
            return Err(persistence(path, e));
        }

        tracing::info!(
            "Saved table {:?} ({} rows, {} bytes, CRC32={:#010x})",
            path,
            self.num_rows,
            bytes.len(),
            stored_crc(&bytes)
        );
        Ok(())
    }
}

/// On-disk encoding of a table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableFormat {
    /// Native columnar format described in the module docs
    Sgtb,
    /// Apache Parquet
    Parquet,
}

impl TableFormat {
    /// `.parquet` / `.parq` files are Parquet; everything else is native
    pub fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
            .as_deref()
        {
            Some("parquet") | Some("parq") => TableFormat::Parquet,
            _ => TableFormat::Sgtb,
        }
    }
}

/// Checksum recorded in the footer of an encoded table
fn stored_crc(bytes: &[u8]) -> u32 {
    if bytes.len() < FOOTER_LEN {
        return 0;
    }
    let at = bytes.len() - FOOTER_LEN;
    u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}

fn persistence(path: &Path, source: io::Error) -> SuggestError {
    SuggestError::Persistence {
        path: path.to_path_buf(),
        source,
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

fn remaining(reader: &Cursor<&[u8]>) -> usize {
    reader.get_ref().len().saturating_sub(reader.position() as usize)
}

fn to_u32(value: usize, what: &str) -> io::Result<u32> {
    u32::try_from(value)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, format!("{} exceeds u32", what)))
}

fn decode_err(e: io::Error) -> SuggestError {
    SuggestError::corrupt(e.to_string())
}

fn missing(name: &str) -> SuggestError {
    SuggestError::MissingColumn {
        name: name.to_string(),
    }
}

fn column_type(name: &str, expected: &'static str, found: &ColumnData) -> SuggestError {
    SuggestError::ColumnType {
        name: name.to_string(),
        expected,
        found: found.type_name(),
    }
}
