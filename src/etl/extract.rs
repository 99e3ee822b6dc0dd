/// Extract Module
///
/// Reads song-metadata and event-log files into source records.
use crate::{
    error::EtlError,
    models::{Level, PlayEvent, RawLogEvent, SongFileRecord},
};
use std::path::Path;

/// The only page whose events describe a song being played
pub const NEXT_SONG_PAGE: &str = "NextSong";

/// Read a whole input file; content that is not UTF-8 is a parse error, not an I/O error
pub async fn read_file(path: &Path) -> Result<String, EtlError> {
    let bytes = tokio::fs::read(path).await.map_err(|err| EtlError::io(path, err))?;
    String::from_utf8(bytes).map_err(|err| EtlError::parse_file(path, err.to_string()))
}

/// Parse a song-metadata file.
///
/// The first JSON value in the file is the record; anything after it is ignored.
pub fn parse_song_file(path: &Path, content: &str) -> Result<SongFileRecord, EtlError> {
    let mut records = serde_json::Deserializer::from_str(content).into_iter::<SongFileRecord>();

    match records.next() {
        Some(Ok(record)) => Ok(record),
        Some(Err(err)) => Err(EtlError::parse_file(path, err.to_string())),
        None => Err(EtlError::parse_file(path, "file contains no song record")),
    }
}

/// Parse an event-log file and keep only its `NextSong` events, in file order
pub fn parse_log_file(path: &Path, content: &str) -> Result<Vec<PlayEvent>, EtlError> {
    let mut plays = Vec::new();
    let mut discarded = 0usize;

    for (index, line) in content.lines().enumerate() {
        let line_no = index + 1;
        if line.trim().is_empty() {
            continue;
        }

        let event: RawLogEvent =
            serde_json::from_str(line).map_err(|err| EtlError::parse_line(path, line_no, err.to_string()))?;

        if event.page.as_deref() != Some(NEXT_SONG_PAGE) {
            discarded += 1;
            continue;
        }

        plays.push(into_play_event(event).map_err(|message| EtlError::parse_line(path, line_no, message))?);
    }

    tracing::debug!("{}: {} plays, {} other events discarded", path.display(), plays.len(), discarded);
    Ok(plays)
}

fn into_play_event(event: RawLogEvent) -> Result<PlayEvent, String> {
    let user_id = event.user_id.ok_or("NextSong event without userId")?;
    let level = match event.level.as_deref() {
        Some(value) => Level::parse(value).ok_or_else(|| format!("unknown level '{}'", value))?,
        None => return Err("NextSong event without level".to_string()),
    };
    let ts = event.ts.ok_or("NextSong event without ts")?;
    let session_id = event.session_id.ok_or("NextSong event without sessionId")?;

    Ok(PlayEvent {
        user_id,
        first_name: event.first_name,
        last_name: event.last_name,
        gender: event.gender,
        level,
        ts,
        song: event.song,
        artist: event.artist,
        length: event.length,
        session_id,
        location: event.location,
        user_agent: event.user_agent,
    })
}
