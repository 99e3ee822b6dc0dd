/// Schema Catalog
///
/// Table definitions of the star schema and every statement the loader issues.
/// Statements are immutable constants handed to the components that execute
/// them; nothing here touches a connection.

/// Drop and create statements for one table
#[derive(Debug, Clone, Copy)]
pub struct TableDef {
    pub name: &'static str,
    pub drop: &'static str,
    pub create: &'static str,
}

pub const SONGPLAYS: TableDef = TableDef {
    name: "songplays",
    drop: "DROP TABLE IF EXISTS songplays",
    create: r#"
        CREATE TABLE songplays (
            songplay_id SERIAL PRIMARY KEY,
            start_time TIMESTAMP NOT NULL,
            user_id VARCHAR NOT NULL,
            level VARCHAR NOT NULL,
            song_id VARCHAR,
            artist_id VARCHAR,
            session_id BIGINT NOT NULL,
            location VARCHAR,
            user_agent VARCHAR
        )
    "#,
};

pub const USERS: TableDef = TableDef {
    name: "users",
    drop: "DROP TABLE IF EXISTS users",
    create: r#"
        CREATE TABLE users (
            user_id VARCHAR NOT NULL,
            first_name VARCHAR,
            last_name VARCHAR,
            gender VARCHAR,
            level VARCHAR NOT NULL CHECK (level IN ('free', 'paid'))
        )
    "#,
};

pub const SONGS: TableDef = TableDef {
    name: "songs",
    drop: "DROP TABLE IF EXISTS songs",
    create: r#"
        CREATE TABLE songs (
            song_id VARCHAR PRIMARY KEY,
            title VARCHAR NOT NULL,
            artist_id VARCHAR NOT NULL,
            year INT NOT NULL,
            duration DOUBLE PRECISION NOT NULL
        )
    "#,
};

pub const ARTISTS: TableDef = TableDef {
    name: "artists",
    drop: "DROP TABLE IF EXISTS artists",
    create: r#"
        CREATE TABLE artists (
            artist_id VARCHAR NOT NULL,
            name VARCHAR NOT NULL,
            location VARCHAR,
            latitude NUMERIC,
            longitude NUMERIC
        )
    "#,
};

pub const TIME: TableDef = TableDef {
    name: "time",
    drop: "DROP TABLE IF EXISTS time",
    create: r#"
        CREATE TABLE time (
            start_time TIMESTAMP NOT NULL,
            hour INT NOT NULL,
            day INT NOT NULL,
            week INT NOT NULL,
            month INT NOT NULL,
            year INT NOT NULL,
            weekday INT NOT NULL
        )
    "#,
};

/// All tables, in drop and create order
pub const TABLES: [TableDef; 5] = [SONGPLAYS, USERS, SONGS, ARTISTS, TIME];

pub fn drop_statements() -> impl Iterator<Item = &'static str> {
    TABLES.iter().map(|table| table.drop)
}

pub fn create_statements() -> impl Iterator<Item = &'static str> {
    TABLES.iter().map(|table| table.create)
}

/// Parameterized DML used while loading
#[derive(Debug)]
pub struct SqlStatements {
    pub song_insert: &'static str,
    pub artist_insert: &'static str,
    pub user_insert: &'static str,
    pub time_insert: &'static str,
    pub songplay_insert: &'static str,
    /// (title, artist name, duration) -> (song_id, artist_id); first row wins, no ordering
    pub song_select: &'static str,
}

pub static STATEMENTS: SqlStatements = SqlStatements {
    song_insert: "INSERT INTO songs (song_id, title, artist_id, year, duration) VALUES ($1, $2, $3, $4, $5)",
    artist_insert: "INSERT INTO artists (artist_id, name, location, latitude, longitude) VALUES ($1, $2, $3, $4, $5)",
    user_insert: "INSERT INTO users (user_id, first_name, last_name, gender, level) VALUES ($1, $2, $3, $4, $5)",
    time_insert: r#"
        INSERT INTO time (start_time, hour, day, week, month, year, weekday)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
    "#,
    songplay_insert: r#"
        INSERT INTO songplays (start_time, user_id, level, song_id, artist_id, session_id, location, user_agent)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
    "#,
    song_select: r#"
        SELECT s.song_id, a.artist_id
        FROM songs AS s
        JOIN artists AS a ON a.artist_id = s.artist_id
        WHERE s.title = $1 AND a.name = $2 AND s.duration = $3
        LIMIT 1
    "#,
};

/// Quote a Postgres identifier (used only for database names in DDL)
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

pub fn drop_database(name: &str) -> String {
    format!("DROP DATABASE IF EXISTS {}", quote_identifier(name))
}

pub fn create_database(name: &str) -> String {
    format!("CREATE DATABASE {} WITH ENCODING 'utf8' TEMPLATE template0", quote_identifier(name))
}
