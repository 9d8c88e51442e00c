use anyhow::{Context, Result};
use csv::DeserializeRecordsIntoIter;
use flate2::read::GzDecoder;
use log::info;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use crate::error::EtlError;
use crate::row::Row;

pub const METADATA_FILE: &str = "metadata.csv";

/// Streams rows from `metadata.csv` (or `metadata.csv.gz`) in file order.
/// Undecodable records come back as `MalformedRow`; read failures of the
/// underlying file as `RowStream`.
pub struct RowStream {
    records: DeserializeRecordsIntoIter<Box<dyn Read + Send>, Row>,
}

impl RowStream {
    pub fn open(input_dir: &Path) -> Result<Self> {
        let path = Self::locate(input_dir);
        let file = File::open(&path).with_context(|| format!("Failed to open row stream: {}", path.display()))?;
        let reader: Box<dyn Read + Send> = if path.extension().map_or(false, |ext| ext == "gz") {
            Box::new(GzDecoder::new(BufReader::new(file)))
        } else {
            Box::new(BufReader::new(file))
        };
        info!("Streaming rows from {}", path.display());
        Ok(Self { records: csv::Reader::from_reader(reader).into_deserialize() })
    }

    fn locate(input_dir: &Path) -> PathBuf {
        let plain = input_dir.join(METADATA_FILE);
        let compressed = input_dir.join(format!("{}.gz", METADATA_FILE));
        if !plain.exists() && compressed.exists() {
            compressed
        } else {
            plain
        }
    }
}

impl Iterator for RowStream {
    type Item = Result<Row, EtlError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.records.next().map(|record| {
            record.map_err(|e| {
                if e.is_io_error() {
                    EtlError::RowStream { message: e.to_string() }
                } else {
                    EtlError::MalformedRow { line: e.position().map_or(0, |p| p.line()), message: e.to_string() }
                }
            })
        })
    }
}
