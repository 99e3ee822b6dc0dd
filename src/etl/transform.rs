/// Transform Module
///
/// Reshapes source records into table rows.
use crate::models::{Artist, PlayEvent, Song, SongFileRecord, SongKey, SongMatch, SongPlay, TimeRow, User};
use chrono::{DateTime, Datelike, NaiveDateTime, Timelike};

/// Split a song-metadata record into its song and artist rows
pub fn split_song_record(record: SongFileRecord) -> (Song, Artist) {
    let song = Song {
        song_id: record.song_id,
        title: record.title,
        artist_id: record.artist_id.clone(),
        year: record.year,
        duration: record.duration,
    };

    let artist = Artist {
        artist_id: record.artist_id,
        name: record.artist_name,
        location: record.artist_location,
        latitude: record.artist_latitude,
        longitude: record.artist_longitude,
    };

    (song, artist)
}

/// Convert epoch milliseconds into a UTC timestamp
pub fn start_time(ts: i64) -> Option<NaiveDateTime> {
    DateTime::from_timestamp_millis(ts).map(|dt| dt.naive_utc())
}

/// Calendar breakdown of a play's timestamp
pub fn time_row(start_time: NaiveDateTime) -> TimeRow {
    TimeRow {
        start_time,
        hour: start_time.hour() as i32,
        day: start_time.day() as i32,
        week: start_time.iso_week().week() as i32,
        month: start_time.month() as i32,
        year: start_time.year(),
        weekday: start_time.weekday().num_days_from_monday() as i32,
    }
}

/// User row exactly as the event reports it
pub fn user_row(event: &PlayEvent) -> User {
    User {
        user_id: event.user_id.clone(),
        first_name: event.first_name.clone(),
        last_name: event.last_name.clone(),
        gender: event.gender.clone(),
        level: event.level,
    }
}

/// Natural key of the played song, if the event names one completely
pub fn song_key(event: &PlayEvent) -> Option<SongKey<'_>> {
    Some(SongKey { title: event.song.as_deref()?, artist_name: event.artist.as_deref()?, duration: event.length? })
}

/// Fact row for a play; an unresolved song leaves both references null
pub fn song_play(event: &PlayEvent, start_time: NaiveDateTime, resolved: Option<SongMatch>) -> SongPlay {
    let (song_id, artist_id) = match resolved {
        Some(SongMatch { song_id, artist_id }) => (Some(song_id), Some(artist_id)),
        None => (None, None),
    };

    SongPlay {
        start_time,
        user_id: event.user_id.clone(),
        level: event.level,
        song_id,
        artist_id,
        session_id: event.session_id,
        location: event.location.clone(),
        user_agent: event.user_agent.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Level;

    fn event() -> PlayEvent {
        PlayEvent {
            user_id: "7".to_string(),
            first_name: Some("A".to_string()),
            last_name: Some("B".to_string()),
            gender: Some("M".to_string()),
            level: Level::Free,
            ts: 1541121000000,
            song: Some("T".to_string()),
            artist: Some("N".to_string()),
            length: Some(180.5),
            session_id: 100,
            location: Some("X".to_string()),
            user_agent: Some("UA".to_string()),
        }
    }

    #[test]
    fn test_time_row_breakdown() {
        let ts = start_time(1541121000000).unwrap();
        let row = time_row(ts);

        assert_eq!(ts.to_string(), "2018-11-02 01:10:00");
        assert_eq!(row.hour, 1);
        assert_eq!(row.day, 2);
        assert_eq!(row.week, 44);
        assert_eq!(row.month, 11);
        assert_eq!(row.year, 2018);
        assert_eq!(row.weekday, 4); // Friday
    }

    #[test]
    fn test_iso_week_at_year_boundary() {
        // 2018-12-31 is a Monday in ISO week 1 of 2019
        let row = time_row(start_time(1546214400000).unwrap());
        assert_eq!(row.year, 2018);
        assert_eq!(row.week, 1);
        assert_eq!(row.weekday, 0);
    }

    #[test]
    fn test_start_time_keeps_milliseconds() {
        let ts = start_time(1541106106796).unwrap();
        assert_eq!(ts.and_utc().timestamp_millis(), 1541106106796);
    }

    #[test]
    fn test_split_song_record() {
        let record = SongFileRecord {
            song_id: "S1".to_string(),
            title: "T".to_string(),
            artist_id: "A1".to_string(),
            artist_name: "N".to_string(),
            artist_location: Some("L".to_string()),
            artist_latitude: Some(1.0),
            artist_longitude: Some(2.0),
            year: 2000,
            duration: 180.5,
        };

        let (song, artist) = split_song_record(record);

        assert_eq!(song.song_id, "S1");
        assert_eq!(song.artist_id, "A1");
        assert_eq!(song.duration, 180.5);
        assert_eq!(artist.name, "N");
        assert_eq!(artist.latitude, Some(1.0));
    }

    #[test]
    fn test_song_key_requires_all_parts() {
        let complete = event();
        let key = song_key(&complete).unwrap();
        assert_eq!((key.title, key.artist_name, key.duration), ("T", "N", 180.5));

        let mut partial = event();
        partial.length = None;
        assert!(song_key(&partial).is_none());
    }

    #[test]
    fn test_song_play_references() {
        let ts = start_time(1541121000000).unwrap();
        let resolved = SongMatch { song_id: "S1".to_string(), artist_id: "A1".to_string() };

        let matched = song_play(&event(), ts, Some(resolved));
        assert_eq!(matched.song_id.as_deref(), Some("S1"));
        assert_eq!(matched.artist_id.as_deref(), Some("A1"));
        assert_eq!(matched.session_id, 100);

        let unmatched = song_play(&event(), ts, None);
        assert_eq!(unmatched.song_id, None);
        assert_eq!(unmatched.artist_id, None);
        assert_eq!(unmatched.user_id, "7");
    }

    #[test]
    fn test_user_row_is_verbatim() {
        let user = user_row(&event());
        assert_eq!(user.user_id, "7");
        assert_eq!(user.first_name.as_deref(), Some("A"));
        assert_eq!(user.level, Level::Free);
    }
}
