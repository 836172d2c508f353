use lifeline_core::db::migrations::latest_version;
use lifeline_core::db::{open_db, open_db_in_memory, DbError};
use lifeline_core::{EntityRepository, RepoError, SqliteEntityRepository, UserId};
use rusqlite::Connection;

#[test]
fn open_db_in_memory_applies_all_migrations() {
    let conn = open_db_in_memory().unwrap();

    assert_eq!(schema_version(&conn), latest_version());
    assert_table_exists(&conn, "users");
    assert_table_exists(&conn, "children");
}

#[test]
fn opening_same_database_twice_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("lifeline.db");

    let conn_first = open_db(&path).unwrap();
    conn_first
        .execute("INSERT INTO users (name) VALUES ('kept');", [])
        .unwrap();
    drop(conn_first);

    let conn_second = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn_second), latest_version());
    let kept: i64 = conn_second
        .query_row("SELECT COUNT(*) FROM users;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(kept, 1);
}

#[test]
fn opening_database_with_newer_schema_version_returns_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.db");

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("PRAGMA user_version = 999;").unwrap();
    drop(conn);

    let err = open_db(&path).unwrap_err();
    match err {
        DbError::UnsupportedSchemaVersion {
            db_version,
            latest_supported,
        } => {
            assert_eq!(db_version, 999);
            assert_eq!(latest_supported, latest_version());
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn foreign_keys_reject_children_of_missing_users() {
    let conn = open_db_in_memory().unwrap();

    let result = conn.execute(
        "INSERT INTO children (user_id, content) VALUES (42, 'orphan');",
        [],
    );
    assert!(result.is_err());
}

#[test]
fn repository_rejects_unmigrated_connection() {
    let conn = Connection::open_in_memory().unwrap();

    let err = SqliteEntityRepository::try_new(&conn).err().unwrap();
    assert!(matches!(
        err,
        RepoError::UninitializedConnection {
            actual_version: 0,
            ..
        }
    ));
}

#[test]
fn repository_load_user_reads_one_row_or_none() {
    let conn = open_db_in_memory().unwrap();
    conn.execute("INSERT INTO users (name) VALUES ('Gblanco');", [])
        .unwrap();
    let repo = SqliteEntityRepository::try_new(&conn).unwrap();

    let loaded = repo.load_user(UserId(1)).unwrap().unwrap();
    assert_eq!(loaded.id, Some(UserId(1)));
    assert_eq!(loaded.name.as_deref(), Some("Gblanco"));
    assert!(loaded.children.is_empty());

    assert!(repo.load_user(UserId(2)).unwrap().is_none());
}

fn schema_version(conn: &Connection) -> u32 {
    conn.query_row("PRAGMA user_version;", [], |row| row.get(0))
        .unwrap()
}

fn assert_table_exists(conn: &Connection, table_name: &str) {
    let exists: i64 = conn
        .query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM sqlite_master
                WHERE type = 'table' AND name = ?1
            );",
            [table_name],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(exists, 1, "table {table_name} does not exist");
}
