//! Database fixtures shared by unit tests.

use std::path::{Path, PathBuf};

use rusqlite::{Connection, params};
use tempfile::TempDir;

/// A database file that lives as long as the fixture.
pub struct Fixture {
    _dir: TempDir,
    path: PathBuf,
}

impl Fixture {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn build(name: &str, setup: impl FnOnce(&Connection)) -> Fixture {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join(name);
    let conn = Connection::open(&path).expect("create database");
    setup(&conn);
    Fixture { _dir: dir, path }
}

/// Users, posts, an empty table, a view, two indices and a trigger.
pub fn sample_db() -> Fixture {
    build("sample.db", |conn| {
        conn.execute_batch(
            "CREATE TABLE users (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                email TEXT,
                age INTEGER,
                created_at TEXT DEFAULT CURRENT_TIMESTAMP
            );
            CREATE TABLE posts (
                id INTEGER PRIMARY KEY,
                user_id INTEGER NOT NULL REFERENCES users(id),
                title TEXT NOT NULL,
                body TEXT
            );
            CREATE TABLE empty_table (id INTEGER PRIMARY KEY, note TEXT);
            CREATE INDEX idx_users_email ON users(email);
            CREATE INDEX idx_posts_user ON posts(user_id);
            CREATE VIEW user_post_counts AS
                SELECT u.name AS name, count(p.id) AS posts
                FROM users u LEFT JOIN posts p ON p.user_id = u.id
                GROUP BY u.id;
            CREATE TRIGGER update_timestamp AFTER UPDATE ON users
            BEGIN
                UPDATE users SET created_at = CURRENT_TIMESTAMP WHERE id = NEW.id;
            END;

            INSERT INTO users (id, name, email, age) VALUES
                (1, 'Alice', 'alice@example.com', 30),
                (2, 'Bob', 'bob@example.com', 25),
                (3, 'Carol', NULL, 35),
                (4, 'Dave', 'dave@example.com', NULL),
                (5, 'Eve', '', 42);
            INSERT INTO posts (user_id, title, body) VALUES
                (1, 'Hello', 'First post'),
                (1, 'Again', NULL),
                (3, 'Notes', '{\"tags\":[\"a\",\"b\"]}');",
        )
        .expect("sample schema");
    })
}

/// A table whose column shadows `rowid`, and a WITHOUT ROWID table.
pub fn without_rowid_db() -> Fixture {
    build("rowid.db", |conn| {
        conn.execute_batch(
            "CREATE TABLE shadowed (rowid TEXT, v INTEGER);
            CREATE TABLE keyed (k TEXT PRIMARY KEY, v INTEGER) WITHOUT ROWID;
            INSERT INTO shadowed VALUES ('a', 1), ('b', 2);
            INSERT INTO keyed VALUES ('x', 1), ('y', 2);",
        )
        .expect("rowid schema");
    })
}

/// A healthy table `good` next to a view `orphan` over a dropped table.
pub fn stale_view_db() -> Fixture {
    build("stale.db", |conn| {
        conn.execute_batch(
            "CREATE TABLE good (id INTEGER PRIMARY KEY, v TEXT);
            INSERT INTO good (v) VALUES ('one'), ('two');
            CREATE TABLE gone (x INTEGER);
            CREATE VIEW orphan AS SELECT x FROM gone;
            DROP TABLE gone;",
        )
        .expect("stale schema");
    })
}

/// `numbers(id)` holding 1..=10000.
pub fn numbers_db() -> Fixture {
    build("numbers.db", |conn| {
        conn.execute_batch(
            "CREATE TABLE numbers (id INTEGER PRIMARY KEY, label TEXT);
            WITH RECURSIVE n(x) AS (SELECT 1 UNION ALL SELECT x + 1 FROM n WHERE x < 10000)
            INSERT INTO numbers (id, label) SELECT x, 'n' || x FROM n;",
        )
        .expect("numbers schema");
    })
}

pub const LONG_TEXT: &str = "Lorem ipsum dolor sit amet, consectetur adipiscing elit. \
    Sed do eiusmod tempor incididunt ut labore et dolore magna aliqua. \
    Ut enim ad minim veniam, quis nostrud exercitation ullamco laboris.";

pub fn blob_bytes() -> Vec<u8> {
    (0..64u8).map(|b| b.wrapping_mul(7)).collect()
}

/// `documents(id, body, payload)` with one long text and one blob.
pub fn blob_db() -> Fixture {
    build("blob.db", |conn| {
        conn.execute_batch(
            "CREATE TABLE documents (id INTEGER PRIMARY KEY, body TEXT, payload BLOB);",
        )
        .expect("documents schema");
        conn.execute(
            "INSERT INTO documents (id, body, payload) VALUES (1, ?1, ?2)",
            params![LONG_TEXT, blob_bytes()],
        )
        .expect("documents row");
    })
}

/// `notes(id, body)` whose single text value is not valid UTF-8.
pub fn raw_text_db() -> Fixture {
    build("raw.db", |conn| {
        conn.execute_batch(
            "CREATE TABLE notes (id INTEGER PRIMARY KEY, body TEXT);
            INSERT INTO notes (id, body) VALUES (1, CAST(x'41FF42' AS TEXT));",
        )
        .expect("raw text schema");
    })
}
