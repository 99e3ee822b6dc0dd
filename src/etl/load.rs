/// Load Module
///
/// Handles storing rows into the warehouse. Every insert is a plain,
/// parameterized INSERT: loading the same song twice fails on the primary key,
/// and users, artists and time rows are duplicated on repeated input.
use crate::{
    db::schema::SqlStatements,
    error::EtlError,
    etl::transform,
    models::{Artist, PlayEvent, Song, SongKey, SongMatch, SongPlay, SongFileRecord, TimeRow, User},
};
use sqlx::{PgConnection, PgPool, Postgres, Transaction};
use std::path::Path;

/// Destination of the star schema rows.
///
/// Inserts made after the previous `commit_file` belong to the current file and
/// become visible to other sessions only once it is committed.
#[allow(async_fn_in_trait)]
pub trait Warehouse {
    async fn insert_song(&mut self, song: &Song) -> Result<(), EtlError>;

    async fn insert_artist(&mut self, artist: &Artist) -> Result<(), EtlError>;

    async fn insert_user(&mut self, user: &User) -> Result<(), EtlError>;

    async fn insert_time(&mut self, time: &TimeRow) -> Result<(), EtlError>;

    async fn insert_songplay(&mut self, play: &SongPlay) -> Result<(), EtlError>;

    /// Resolve a play to a song and its artist by exact title, name and duration.
    ///
    /// With several matches, whichever row the store yields first is returned.
    async fn find_song(&mut self, key: SongKey<'_>) -> Result<Option<SongMatch>, EtlError>;

    async fn commit_file(&mut self) -> Result<(), EtlError>;

    /// Discard everything inserted since the last commit
    async fn rollback_file(&mut self) -> Result<(), EtlError>;
}

/// Rows written for one file
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadCounts {
    pub songs: usize,
    pub artists: usize,
    pub users: usize,
    pub time_rows: usize,
    pub songplays: usize,
    pub songplays_matched: usize,
}

impl std::ops::AddAssign for LoadCounts {
    fn add_assign(&mut self, other: Self) {
        self.songs += other.songs;
        self.artists += other.artists;
        self.users += other.users;
        self.time_rows += other.time_rows;
        self.songplays += other.songplays;
        self.songplays_matched += other.songplays_matched;
    }
}

/// Insert the song and artist rows of one song-metadata file
pub async fn load_song_record<W: Warehouse>(warehouse: &mut W, record: SongFileRecord) -> Result<LoadCounts, EtlError> {
    let (song, artist) = transform::split_song_record(record);

    warehouse.insert_song(&song).await?;
    warehouse.insert_artist(&artist).await?;

    tracing::debug!("Inserted song {} by artist {}", song.song_id, artist.artist_id);
    Ok(LoadCounts { songs: 1, artists: 1, ..Default::default() })
}

/// Insert the time, user and songplay rows of one log file's plays
pub async fn load_play_events<W: Warehouse>(
    warehouse: &mut W,
    path: &Path,
    events: &[PlayEvent],
) -> Result<LoadCounts, EtlError> {
    let mut counts = LoadCounts::default();

    let mut start_times = Vec::with_capacity(events.len());
    for event in events {
        let start_time = transform::start_time(event.ts)
            .ok_or_else(|| EtlError::parse_file(path, format!("timestamp {} out of range", event.ts)))?;
        start_times.push(start_time);
    }

    for start_time in &start_times {
        warehouse.insert_time(&transform::time_row(*start_time)).await?;
        counts.time_rows += 1;
    }

    for event in events {
        warehouse.insert_user(&transform::user_row(event)).await?;
        counts.users += 1;
    }

    for (event, start_time) in events.iter().zip(start_times) {
        let resolved = match transform::song_key(event) {
            Some(key) => warehouse.find_song(key).await?,
            None => None,
        };

        if resolved.is_some() {
            counts.songplays_matched += 1;
        }

        warehouse.insert_songplay(&transform::song_play(event, start_time, resolved)).await?;
        counts.songplays += 1;
    }

    Ok(counts)
}

/// Warehouse backed by the PostgreSQL star schema
pub struct PgWarehouse {
    pool: PgPool,
    statements: &'static SqlStatements,
    tx: Option<Transaction<'static, Postgres>>,
}

impl PgWarehouse {
    pub fn new(pool: PgPool, statements: &'static SqlStatements) -> Self {
        Self { pool, statements, tx: None }
    }

    /// Connection of the current file's transaction, opened on first use
    async fn connection(&mut self) -> Result<&mut PgConnection, EtlError> {
        let tx = match self.tx.take() {
            Some(tx) => tx,
            None => self.pool.begin().await.map_err(|source| EtlError::Database { context: "begin", source })?,
        };

        Ok(&mut **self.tx.insert(tx))
    }
}

impl Warehouse for PgWarehouse {
    async fn insert_song(&mut self, song: &Song) -> Result<(), EtlError> {
        let statement = self.statements.song_insert;
        let conn = self.connection().await?;

        sqlx::query(statement)
            .bind(&song.song_id)
            .bind(&song.title)
            .bind(&song.artist_id)
            .bind(song.year)
            .bind(song.duration)
            .execute(conn)
            .await
            .map_err(|err| EtlError::from_store("songs", err))?;

        Ok(())
    }

    async fn insert_artist(&mut self, artist: &Artist) -> Result<(), EtlError> {
        let statement = self.statements.artist_insert;
        let conn = self.connection().await?;

        sqlx::query(statement)
            .bind(&artist.artist_id)
            .bind(&artist.name)
            .bind(&artist.location)
            .bind(artist.latitude)
            .bind(artist.longitude)
            .execute(conn)
            .await
            .map_err(|err| EtlError::from_store("artists", err))?;

        Ok(())
    }

    async fn insert_user(&mut self, user: &User) -> Result<(), EtlError> {
        let statement = self.statements.user_insert;
        let conn = self.connection().await?;

        sqlx::query(statement)
            .bind(&user.user_id)
            .bind(&user.first_name)
            .bind(&user.last_name)
            .bind(&user.gender)
            .bind(user.level.as_str())
            .execute(conn)
            .await
            .map_err(|err| EtlError::from_store("users", err))?;

        Ok(())
    }

    async fn insert_time(&mut self, time: &TimeRow) -> Result<(), EtlError> {
        let statement = self.statements.time_insert;
        let conn = self.connection().await?;

        sqlx::query(statement)
            .bind(time.start_time)
            .bind(time.hour)
            .bind(time.day)
            .bind(time.week)
            .bind(time.month)
            .bind(time.year)
            .bind(time.weekday)
            .execute(conn)
            .await
            .map_err(|err| EtlError::from_store("time", err))?;

        Ok(())
    }

    async fn insert_songplay(&mut self, play: &SongPlay) -> Result<(), EtlError> {
        let statement = self.statements.songplay_insert;
        let conn = self.connection().await?;

        sqlx::query(statement)
            .bind(play.start_time)
            .bind(&play.user_id)
            .bind(play.level.as_str())
            .bind(&play.song_id)
            .bind(&play.artist_id)
            .bind(play.session_id)
            .bind(&play.location)
            .bind(&play.user_agent)
            .execute(conn)
            .await
            .map_err(|err| EtlError::from_store("songplays", err))?;

        Ok(())
    }

    async fn find_song(&mut self, key: SongKey<'_>) -> Result<Option<SongMatch>, EtlError> {
        let statement = self.statements.song_select;
        let conn = self.connection().await?;

        let found = sqlx::query_as::<_, SongMatch>(statement)
            .bind(key.title)
            .bind(key.artist_name)
            .bind(key.duration)
            .fetch_optional(conn)
            .await
            .map_err(|source| EtlError::Database { context: "song lookup", source })?;

        Ok(found)
    }

    async fn commit_file(&mut self) -> Result<(), EtlError> {
        if let Some(tx) = self.tx.take() {
            tx.commit().await.map_err(|err| EtlError::from_store("commit", err))?;
        }

        Ok(())
    }

    async fn rollback_file(&mut self) -> Result<(), EtlError> {
        if let Some(tx) = self.tx.take() {
            tx.rollback().await.map_err(|source| EtlError::Database { context: "rollback", source })?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::etl::memory::MemoryWarehouse;
    use crate::models::Level;
    use std::path::PathBuf;

    fn record(song_id: &str, title: &str, artist_id: &str, artist_name: &str, duration: f64) -> SongFileRecord {
        SongFileRecord {
            song_id: song_id.to_string(),
            title: title.to_string(),
            artist_id: artist_id.to_string(),
            artist_name: artist_name.to_string(),
            artist_location: None,
            artist_latitude: None,
            artist_longitude: None,
            year: 2000,
            duration,
        }
    }

    fn play(user_id: &str, song: &str, artist: &str, length: f64) -> PlayEvent {
        PlayEvent {
            user_id: user_id.to_string(),
            first_name: Some("Lily".to_string()),
            last_name: Some("Koch".to_string()),
            gender: Some("F".to_string()),
            level: Level::Paid,
            ts: 1541121000000,
            song: Some(song.to_string()),
            artist: Some(artist.to_string()),
            length: Some(length),
            session_id: 818,
            location: Some("Chicago-Naperville-Elgin, IL-IN-WI".to_string()),
            user_agent: Some("Mozilla/5.0".to_string()),
        }
    }

    #[tokio::test]
    async fn test_load_song_record_inserts_song_and_artist() {
        let mut warehouse = MemoryWarehouse::default();

        let counts = load_song_record(&mut warehouse, record("S1", "T", "A1", "N", 180.5)).await.unwrap();
        warehouse.commit_file().await.unwrap();

        assert_eq!(counts, LoadCounts { songs: 1, artists: 1, ..Default::default() });
        assert_eq!(warehouse.songs.len(), 1);
        assert_eq!(warehouse.artists[0].name, "N");
    }

    #[tokio::test]
    async fn test_load_play_events_resolves_known_songs() {
        let mut warehouse = MemoryWarehouse::default();
        load_song_record(&mut warehouse, record("S1", "T", "A1", "N", 180.5)).await.unwrap();
        warehouse.commit_file().await.unwrap();

        let events = vec![play("15", "T", "N", 180.5), play("15", "T", "N", 180.0), play("29", "Other", "N", 180.5)];
        let counts = load_play_events(&mut warehouse, &PathBuf::from("/logs/a.json"), &events).await.unwrap();
        warehouse.commit_file().await.unwrap();

        assert_eq!(counts.time_rows, 3);
        assert_eq!(counts.users, 3);
        assert_eq!(counts.songplays, 3);
        assert_eq!(counts.songplays_matched, 1);

        assert_eq!(warehouse.songplays[0].song_id.as_deref(), Some("S1"));
        assert_eq!(warehouse.songplays[0].artist_id.as_deref(), Some("A1"));
        assert_eq!(warehouse.songplays[1].song_id, None);
        assert_eq!(warehouse.songplays[2].artist_id, None);
    }

    #[tokio::test]
    async fn test_repeated_users_are_not_deduplicated() {
        let mut warehouse = MemoryWarehouse::default();
        let events = vec![play("15", "T", "N", 1.0), play("15", "T", "N", 1.0)];

        load_play_events(&mut warehouse, &PathBuf::from("/logs/a.json"), &events).await.unwrap();
        warehouse.commit_file().await.unwrap();

        assert_eq!(warehouse.users.len(), 2);
        assert_eq!(warehouse.time_rows.len(), 2);
    }

    #[tokio::test]
    async fn test_out_of_range_timestamp_is_a_parse_error() {
        let mut warehouse = MemoryWarehouse::default();
        let mut event = play("15", "T", "N", 1.0);
        event.ts = i64::MAX;

        let err = load_play_events(&mut warehouse, &PathBuf::from("/logs/a.json"), &[event]).await.unwrap_err();
        assert!(err.is_parse());
        assert!(warehouse.time_rows.is_empty());
    }

    #[tokio::test]
    #[ignore = "requires a PostgreSQL server (TEST_DATABASE_URL)"]
    async fn test_pg_warehouse_round_trip() {
        use crate::db::{schema, Database};
        use sqlx::postgres::PgConnectOptions;
        use std::str::FromStr;

        let url = std::env::var("TEST_DATABASE_URL").expect("TEST_DATABASE_URL must be set for database tests");
        let db = Database::connect(PgConnectOptions::from_str(&url).unwrap()).await.unwrap();
        db.reset_schema().await.unwrap();

        let mut warehouse = PgWarehouse::new(db.pool().clone(), &schema::STATEMENTS);
        load_song_record(&mut warehouse, record("S1", "T", "A1", "N", 180.5)).await.unwrap();
        warehouse.commit_file().await.unwrap();

        let events = vec![play("7", "T", "N", 180.5), play("7", "T", "N", 99.0)];
        let counts = load_play_events(&mut warehouse, &PathBuf::from("/logs/a.json"), &events).await.unwrap();
        warehouse.commit_file().await.unwrap();
        assert_eq!(counts.songplays_matched, 1);

        let plays: Vec<(Option<String>, Option<String>)> =
            sqlx::query_as("SELECT song_id, artist_id FROM songplays ORDER BY songplay_id")
                .fetch_all(db.pool())
                .await
                .unwrap();
        assert_eq!(plays[0], (Some("S1".to_string()), Some("A1".to_string())));
        assert_eq!(plays[1], (None, None));

        let err = load_song_record(&mut warehouse, record("S1", "T", "A1", "N", 180.5)).await.unwrap_err();
        assert!(matches!(err, EtlError::ConstraintViolation { table: "songs", .. }));
        warehouse.rollback_file().await.unwrap();

        let users: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users").fetch_one(db.pool()).await.unwrap();
        assert_eq!(users, 2);
    }

    #[tokio::test]
    async fn test_duplicate_song_is_a_constraint_violation() {
        let mut warehouse = MemoryWarehouse::default();
        load_song_record(&mut warehouse, record("S1", "T", "A1", "N", 180.5)).await.unwrap();
        warehouse.commit_file().await.unwrap();

        let err = load_song_record(&mut warehouse, record("S1", "T", "A1", "N", 180.5)).await.unwrap_err();
        assert!(matches!(err, EtlError::ConstraintViolation { table: "songs", .. }));
    }
}
