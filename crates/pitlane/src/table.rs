//! CSV encoding of the cached tables.

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::store::StoreError;

/// Delimiter of the scraped result, aggregate and dataset tables.
pub const COMMA: u8 = b',';
/// Delimiter of the raw pit-stop tables.
pub const SEMICOLON: u8 = b';';

/// Serializes `rows` with a header line. No rows produce an empty buffer.
pub fn encode<T: Serialize>(rows: &[T], delimiter: u8) -> Result<Vec<u8>, StoreError> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .from_writer(Vec::new());
    for row in rows {
        writer.serialize(row)?;
    }
    writer.into_inner().map_err(|e| StoreError::Io(e.into_error()))
}

pub fn decode<T: DeserializeOwned>(bytes: &[u8], delimiter: u8) -> Result<Vec<T>, StoreError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .from_reader(bytes);
    reader
        .deserialize()
        .collect::<Result<Vec<T>, _>>()
        .map_err(StoreError::from)
}
