use crate::config::get_app_data_prefix;
use crate::models::{Article, Comic, HistoryEntry};
use chrono::Utc;
use eyre::Result;
use rusqlite::{Connection, params};
use std::path::{Path, PathBuf};

pub struct Store {
    conn: Connection,
}

impl Store {
    pub fn new() -> Result<Self> {
        Self::open_at(&Self::default_path()?)
    }

    pub fn default_path() -> Result<PathBuf> {
        Ok(get_app_data_prefix()?.join("rxkcd.db"))
    }

    pub fn open_at(filepath: &Path) -> Result<Self> {
        if let Some(parent) = filepath.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(filepath)?;

        // Always ensure the schema exists. Tables are created only if
        // missing, so this is safe to run on an existing database.
        Self::init_db(&conn)?;

        Ok(Self { conn })
    }

    fn init_db(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS articles (
                number INTEGER PRIMARY KEY,
                title TEXT NOT NULL DEFAULT '',
                thumbnail TEXT NOT NULL DEFAULT '',
                favorite INTEGER NOT NULL DEFAULT 0,
                read INTEGER NOT NULL DEFAULT 0,
                offline INTEGER NOT NULL DEFAULT 0,
                last_read DATETIME
            );

            CREATE TABLE IF NOT EXISTS comics (
                number INTEGER PRIMARY KEY,
                title TEXT NOT NULL DEFAULT '',
                url TEXT NOT NULL DEFAULT ''
            );

            CREATE TABLE IF NOT EXISTS app_state (
                id INTEGER PRIMARY KEY CHECK (id = 0),
                last_viewed INTEGER
            );
            ",
        )?;
        Ok(())
    }

    /// Insert or update an article row. `last_read` is owned by `set_read`
    /// and survives upserts.
    pub fn upsert_article(&self, article: &Article) -> Result<()> {
        self.conn.execute(
            "INSERT INTO articles (number, title, thumbnail, favorite, read, offline)
             VALUES (?, ?, ?, ?, ?, ?)
             ON CONFLICT(number) DO UPDATE SET
                 title = excluded.title,
                 thumbnail = excluded.thumbnail,
                 favorite = excluded.favorite,
                 read = excluded.read,
                 offline = excluded.offline",
            params![
                article.number,
                article.title,
                article.thumbnail,
                article.favorite,
                article.read,
                article.offline,
            ],
        )?;
        Ok(())
    }

    /// Create the row if it does not exist yet; an existing row is left
    /// untouched so read/favorite flags are not clobbered.
    pub fn insert_article_if_missing(&self, article: &Article) -> Result<()> {
        self.conn.execute(
            "INSERT OR IGNORE INTO articles (number, title, thumbnail, favorite, read, offline)
             VALUES (?, ?, ?, ?, ?, ?)",
            params![
                article.number,
                article.title,
                article.thumbnail,
                article.favorite,
                article.read,
                article.offline,
            ],
        )?;
        Ok(())
    }

    pub fn get_article(&self, number: u32) -> Result<Option<Article>> {
        let mut stmt = self.conn.prepare(
            "SELECT number, title, thumbnail, favorite, read, offline
             FROM articles WHERE number = ?",
        )?;
        let result = stmt.query_row(params![number], |row| {
            Ok(Article {
                number: row.get(0)?,
                title: row.get(1)?,
                thumbnail: row.get(2)?,
                favorite: row.get(3)?,
                read: row.get(4)?,
                offline: row.get(5)?,
            })
        });

        match result {
            Ok(article) => Ok(Some(article)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn articles(&self) -> Result<Vec<Article>> {
        let mut stmt = self.conn.prepare(
            "SELECT number, title, thumbnail, favorite, read, offline
             FROM articles ORDER BY number",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(Article {
                number: row.get(0)?,
                title: row.get(1)?,
                thumbnail: row.get(2)?,
                favorite: row.get(3)?,
                read: row.get(4)?,
                offline: row.get(5)?,
            })
        })?;

        let mut articles = Vec::new();
        for row in rows {
            articles.push(row?);
        }
        Ok(articles)
    }

    pub fn set_offline(&self, number: u32, offline: bool) -> Result<()> {
        self.conn.execute(
            "UPDATE articles SET offline = ? WHERE number = ?",
            params![offline, number],
        )?;
        Ok(())
    }

    pub fn set_favorite(&self, number: u32, favorite: bool) -> Result<()> {
        self.conn.execute(
            "UPDATE articles SET favorite = ? WHERE number = ?",
            params![favorite, number],
        )?;
        Ok(())
    }

    /// Mark an article read and stamp the history timestamp.
    pub fn set_read(&self, number: u32) -> Result<()> {
        self.conn.execute(
            "UPDATE articles SET read = 1, last_read = ? WHERE number = ?",
            params![Utc::now(), number],
        )?;
        Ok(())
    }

    /// Read articles, most recently opened first.
    pub fn history(&self) -> Result<Vec<HistoryEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT number, title, thumbnail, favorite, read, offline, last_read
             FROM articles WHERE read = 1 AND last_read IS NOT NULL
             ORDER BY last_read DESC",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(HistoryEntry {
                article: Article {
                    number: row.get(0)?,
                    title: row.get(1)?,
                    thumbnail: row.get(2)?,
                    favorite: row.get(3)?,
                    read: row.get(4)?,
                    offline: row.get(5)?,
                },
                last_read: row.get(6)?,
            })
        })?;

        let mut entries = Vec::new();
        for row in rows {
            entries.push(row?);
        }
        Ok(entries)
    }

    pub fn comics(&self) -> Result<Vec<Comic>> {
        let mut stmt = self
            .conn
            .prepare("SELECT number, title, url FROM comics ORDER BY number")?;
        let rows = stmt.query_map([], |row| {
            Ok(Comic {
                number: row.get(0)?,
                title: row.get(1)?,
                url: row.get(2)?,
            })
        })?;

        let mut comics = Vec::new();
        for row in rows {
            comics.push(row?);
        }
        Ok(comics)
    }

    pub fn insert_comic(&self, comic: &Comic) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO comics (number, title, url) VALUES (?, ?, ?)",
            params![comic.number, comic.title, comic.url],
        )?;
        Ok(())
    }

    pub fn last_viewed(&self) -> Result<Option<u32>> {
        let result = self.conn.query_row(
            "SELECT last_viewed FROM app_state WHERE id = 0",
            [],
            |row| row.get::<_, Option<u32>>(0),
        );

        match result {
            Ok(number) => Ok(number),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn set_last_viewed(&self, number: u32) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO app_state (id, last_viewed) VALUES (0, ?)",
            params![number],
        )?;
        Ok(())
    }
}
