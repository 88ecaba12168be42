use crate::libkuizu::toukei::{Key, KeyValueStore};
use crate::Result;
use log::{debug, error, info, warn};
use rusqlite::{params, Connection, DatabaseName, OptionalExtension, Row};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::Instant;

#[derive(Debug, Clone, PartialEq)]
pub struct Movie {
    pub id: Option<i32>,
    pub title: String,
    pub rating: f32,
    pub poster: PathBuf,
}

impl Movie {
    fn insert(connection: &Connection, title: &str, rating: f32, poster: &Path) -> Result<i32> {
        let poster_resolved = poster.to_string_lossy().into_owned();
        match connection.execute(
            "INSERT INTO Movie(title, rating, poster) VALUES (?1, ?2, ?3)",
            params![title, rating, poster_resolved],
        ) {
            Ok(_) => {
                let id = connection.last_insert_rowid() as i32;
                debug!("[DB] Created new Movie {} '{}' ({})", id, title, rating);
                Ok(id)
            }
            Err(err) => {
                error!("[DB] Error while creating new Movie '{}': {:?}", title, err);
                Err(err.into())
            }
        }
    }

    pub fn add(connection: &Connection, src: &Movie) -> Result<i32> {
        Self::insert(connection, &src.title, src.rating, &src.poster)
    }

    pub fn delete(connection: &Connection, id: i32) -> Result<()> {
        match connection.execute("DELETE FROM Movie WHERE id = ?1", params![id]) {
            Ok(_) => {
                debug!("[DB] Deleted Movie '{}'", id);
                Ok(())
            }
            Err(err) => {
                error!("[DB] Error while deleting Movie {}: {:?}", id, err);
                Err(err.into())
            }
        }
    }

    fn from_row(row: &Row) -> rusqlite::Result<Movie> {
        Ok(Movie {
            id: row.get(0)?,
            title: row.get(1)?,
            rating: row.get(2)?,
            poster: PathBuf::from(row.get::<usize, String>(3)?),
        })
    }

    pub fn get_all(connection: &Connection) -> Result<Vec<Movie>> {
        let mut statement = connection.prepare("SELECT id, title, rating, poster FROM Movie ORDER BY id")?;
        let rows = statement.query_map([], Self::from_row)?;

        Ok(rows.collect::<rusqlite::Result<_>>()?)
    }

    pub fn get_by_id(connection: &Connection, id: i32) -> Result<Option<Movie>> {
        let mut statement =
            connection.prepare("SELECT id, title, rating, poster FROM Movie WHERE id = :id LIMIT 1")?;
        let row = statement
            .query_row(&[(":id", &id)], Self::from_row)
            .optional()?;

        Ok(row)
    }

    pub fn exists(connection: &Connection, title: &str) -> Result<bool> {
        let mut statement = connection.prepare("SELECT 1 FROM Movie WHERE title = ?1 LIMIT 1")?;
        Ok(statement.exists(params![title])?)
    }
}

/// `KeyValueStore` over the `Statistic` table. Single writes autocommit and a
/// batch commits in one transaction, so both are on disk once they return.
pub struct SqliteStore {
    connection: Rc<Connection>,
}

impl SqliteStore {
    pub fn new(connection: Rc<Connection>) -> Self {
        Self { connection }
    }
}

impl KeyValueStore for SqliteStore {
    fn integer(&self, key: Key) -> Result<Option<i64>> {
        let mut statement = self
            .connection
            .prepare("SELECT value FROM Statistic WHERE key = ?1")?;
        Ok(statement
            .query_row(params![key.as_str()], |row| row.get(0))
            .optional()?)
    }

    fn set_integer(&mut self, key: Key, value: i64) -> Result<()> {
        upsert_statistic(&self.connection, key, value)
    }

    fn set_integers(&mut self, values: &[(Key, i64)]) -> Result<()> {
        let tx = self.connection.unchecked_transaction()?;
        for (key, value) in values {
            upsert_statistic(&tx, *key, *value)?;
        }
        tx.commit()?;
        debug!("[DB] Committed {} statistics", values.len());
        Ok(())
    }
}

fn upsert_statistic(connection: &Connection, key: Key, value: i64) -> Result<()> {
    match connection.execute(
        "INSERT INTO Statistic(key, value) VALUES (?1, ?2) \
        ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        params![key.as_str(), value],
    ) {
        Ok(_) => Ok(()),
        Err(err) => {
            error!("[DB] Failed to update statistic '{}'.", key.as_str());
            Err(err.into())
        }
    }
}

pub fn create_or_open(src: &Path) -> Result<Connection> {
    if src.exists() {
        info!("[DB] Opening existing Database");
        open_db(src)
    } else {
        info!("[DB] Creating new Database");
        create_db(src)
    }
}

pub fn create_db(dest: &Path) -> Result<Connection> {
    let now = Instant::now();
    let db = init_db(Connection::open_in_memory()?)?;
    match db.backup(DatabaseName::Main, dest, None) {
        Ok(_) => {
            close_db(db)?;
            debug!(
                "[DB] Creating and Saving took {} ms.",
                now.elapsed().as_millis()
            );
            open_db(dest)
        }
        Err(err) => {
            warn!("[DB] Failed to create database file: {}", err);
            close_db(db)?;
            Err(err.into())
        }
    }
}

pub fn open_db(src: &Path) -> Result<Connection> {
    let now = Instant::now();
    let db = init_db(Connection::open(src)?)?;
    debug!("[DB] Opening took {} ms.", now.elapsed().as_millis());
    Ok(db)
}

#[cfg(test)]
pub(crate) fn open_in_memory() -> Result<Connection> {
    init_db(Connection::open_in_memory()?)
}

pub fn close_db(connection: Connection) -> Result<()> {
    info!("[DB] Closing Database");
    let mut connection = connection;
    for attempt in 1..=2 {
        match connection.close() {
            Ok(_) => return Ok(()),
            Err((conn, _)) => {
                error!("[DB] Cannot close connection. Retrying {}/2...", attempt);
                connection = conn;
            }
        }
    }
    connection.close().map_err(|(_, err)| {
        error!("[DB] Cannot close connection! Giving up.");
        err.into()
    })
}

fn init_db(conn: Connection) -> Result<Connection> {
    debug!("[DB INIT] Ensuring tables");
    conn.execute(
        "CREATE TABLE IF NOT EXISTS Movie (
              id INTEGER NOT NULL PRIMARY KEY AUTOINCREMENT,
              title TEXT NOT NULL,
              rating REAL NOT NULL,
              poster TEXT NOT NULL
            )",
        (),
    )?;
    conn.execute(
        "CREATE TABLE IF NOT EXISTS Statistic (
              key TEXT NOT NULL PRIMARY KEY,
              value INTEGER NOT NULL
            )",
        (),
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS Movie_title_idx ON Movie(title)",
        (),
    )?;
    debug!("[DB INIT] Tables ready");

    Ok(conn)
}
