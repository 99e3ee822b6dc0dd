/// ETL Module
///
/// Per-file Extract, Transform, Load:
/// - Locate: find the input files of a phase
/// - Extract: read a file into source records
/// - Transform: reshape records into table rows
/// - Load: insert the rows into the warehouse
pub mod extract;
pub mod load;
pub mod locate;
#[cfg(test)]
pub mod memory;
pub mod transform;

use crate::error::EtlError;
use load::{LoadCounts, Warehouse};
use std::path::Path;

/// The two kinds of input file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataKind {
    Song,
    Log,
}

impl std::fmt::Display for DataKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DataKind::Song => write!(f, "song"),
            DataKind::Log => write!(f, "log"),
        }
    }
}

/// Extract, transform and insert one file. Committing is left to the caller.
pub async fn process_file<W: Warehouse>(warehouse: &mut W, kind: DataKind, path: &Path) -> Result<LoadCounts, EtlError> {
    let content = extract::read_file(path).await?;

    match kind {
        DataKind::Song => {
            let record = extract::parse_song_file(path, &content)?;
            load::load_song_record(warehouse, record).await
        }
        DataKind::Log => {
            let events = extract::parse_log_file(path, &content)?;
            load::load_play_events(warehouse, path, &events).await
        }
    }
}
