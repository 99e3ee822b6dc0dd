/// In-memory warehouse for exercising the loader and pipeline without a server.
///
/// Rows inserted since the last commit are staged per file; `songs.song_id`
/// is the only key enforced, mirroring the Postgres schema.
use super::load::Warehouse;
use crate::{
    error::EtlError,
    models::{Artist, Song, SongKey, SongMatch, SongPlay, TimeRow, User},
};

#[derive(Debug, Default, Clone)]
pub struct Tables {
    pub songs: Vec<Song>,
    pub artists: Vec<Artist>,
    pub users: Vec<User>,
    pub time_rows: Vec<TimeRow>,
    pub songplays: Vec<SongPlay>,
}

impl Tables {
    fn append(&mut self, other: Tables) {
        self.songs.extend(other.songs);
        self.artists.extend(other.artists);
        self.users.extend(other.users);
        self.time_rows.extend(other.time_rows);
        self.songplays.extend(other.songplays);
    }
}

#[derive(Debug, Default)]
pub struct MemoryWarehouse {
    committed: Tables,
    staged: Tables,
    pub commits: usize,
}

impl std::ops::Deref for MemoryWarehouse {
    type Target = Tables;

    fn deref(&self) -> &Tables {
        &self.committed
    }
}

impl MemoryWarehouse {
    fn visible_songs(&self) -> impl Iterator<Item = &Song> {
        self.committed.songs.iter().chain(self.staged.songs.iter())
    }

    fn visible_artists(&self) -> impl Iterator<Item = &Artist> {
        self.committed.artists.iter().chain(self.staged.artists.iter())
    }
}

impl Warehouse for MemoryWarehouse {
    async fn insert_song(&mut self, song: &Song) -> Result<(), EtlError> {
        if self.visible_songs().any(|existing| existing.song_id == song.song_id) {
            return Err(EtlError::ConstraintViolation {
                table: "songs",
                message: format!("duplicate key value violates unique constraint: song_id={}", song.song_id),
            });
        }

        self.staged.songs.push(song.clone());
        Ok(())
    }

    async fn insert_artist(&mut self, artist: &Artist) -> Result<(), EtlError> {
        self.staged.artists.push(artist.clone());
        Ok(())
    }

    async fn insert_user(&mut self, user: &User) -> Result<(), EtlError> {
        self.staged.users.push(user.clone());
        Ok(())
    }

    async fn insert_time(&mut self, time: &TimeRow) -> Result<(), EtlError> {
        self.staged.time_rows.push(time.clone());
        Ok(())
    }

    async fn insert_songplay(&mut self, play: &SongPlay) -> Result<(), EtlError> {
        self.staged.songplays.push(play.clone());
        Ok(())
    }

    async fn find_song(&mut self, key: SongKey<'_>) -> Result<Option<SongMatch>, EtlError> {
        let found = self
            .visible_songs()
            .filter(|song| song.title == key.title && song.duration == key.duration)
            .find_map(|song| {
                self.visible_artists()
                    .find(|artist| artist.artist_id == song.artist_id && artist.name == key.artist_name)
                    .map(|artist| SongMatch { song_id: song.song_id.clone(), artist_id: artist.artist_id.clone() })
            });

        Ok(found)
    }

    async fn commit_file(&mut self) -> Result<(), EtlError> {
        let staged = std::mem::take(&mut self.staged);
        self.committed.append(staged);
        self.commits += 1;
        Ok(())
    }

    async fn rollback_file(&mut self) -> Result<(), EtlError> {
        self.staged = Tables::default();
        Ok(())
    }
}
