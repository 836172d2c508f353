//! Entity repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Insert user/child rows and hand back store-assigned ids.
//! - Read user rows and the child rows mapped by `children.user_id`.
//!
//! # Invariants
//! - Reads reject rows that break the back-reference invariant.
//! - `write_pending` either writes every row or none.

use crate::db::migrations::latest_version;
use crate::db::DbError;
use crate::mapping::{EntityKind, USER_CHILDREN};
use crate::model::user::{Child, ChildId, User, UserId};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::error::Error;
use std::fmt::{Display, Formatter};

const USER_SELECT_SQL: &str = "SELECT id, name FROM users";
const CHILD_SELECT_SQL: &str = "SELECT id, user_id, content FROM children";

pub type RepoResult<T> = Result<T, RepoError>;

/// Errors from entity persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    /// Underlying SQLite/bootstrap error.
    Db(DbError),
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    /// Required table is missing.
    MissingRequiredTable(&'static str),
    /// Required column is missing from expected table.
    MissingRequiredColumn {
        table: &'static str,
        column: &'static str,
    },
    /// Persisted data cannot be converted to a valid entity.
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "entity repository requires schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "entity repository requires table `{table}`")
            }
            Self::MissingRequiredColumn { table, column } => write!(
                f,
                "entity repository requires column `{column}` in table `{table}`"
            ),
            Self::InvalidData(message) => write!(f, "invalid persisted entity data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::UninitializedConnection { .. } => None,
            Self::MissingRequiredTable(_) => None,
            Self::MissingRequiredColumn { .. } => None,
            Self::InvalidData(_) => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Repository interface used by the entity manager.
pub trait EntityRepository {
    /// Inserts every pending user (with its collection) and standalone child
    /// in one transaction, writing assigned ids back into the instances.
    ///
    /// Child back-references inside `users` are set to the new parent id.
    fn write_pending(&self, users: &mut [User], children: &mut [Child]) -> RepoResult<()>;
    /// Loads every user row ordered by id. Collections are left empty.
    fn load_users(&self) -> RepoResult<Vec<User>>;
    /// Loads one user row. The collection is left empty.
    fn load_user(&self, id: UserId) -> RepoResult<Option<User>>;
    /// Loads the child rows pointing at `user`, ordered by id.
    fn load_children(&self, user: UserId) -> RepoResult<Vec<Child>>;
}

/// SQLite-backed entity repository.
pub struct SqliteEntityRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteEntityRepository<'conn> {
    /// Wraps a migrated connection.
    ///
    /// # Errors
    /// - Returns an error when the schema version or required columns do not
    ///   match this binary.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_entity_connection_ready(conn)?;
        Ok(Self { conn })
    }
}

impl EntityRepository for SqliteEntityRepository<'_> {
    fn write_pending(&self, users: &mut [User], children: &mut [Child]) -> RepoResult<()> {
        let tx = self.conn.unchecked_transaction()?;

        for user in users.iter_mut() {
            let user_id = insert_user_row(&tx, user)?;
            user.id = Some(user_id);
            for child in user.children.iter_mut() {
                child.user = Some(user_id);
                child.id = Some(insert_child_row(&tx, child)?);
            }
        }

        for child in children.iter_mut() {
            child.id = Some(insert_child_row(&tx, child)?);
        }

        tx.commit()?;
        Ok(())
    }

    fn load_users(&self) -> RepoResult<Vec<User>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{USER_SELECT_SQL} ORDER BY id ASC;"))?;
        let mut rows = stmt.query([])?;
        let mut users = Vec::new();
        while let Some(row) = rows.next()? {
            users.push(parse_user_row(row)?);
        }
        Ok(users)
    }

    fn load_user(&self, id: UserId) -> RepoResult<Option<User>> {
        let user = self
            .conn
            .query_row(
                &format!("{USER_SELECT_SQL} WHERE id = ?1;"),
                [id.0],
                parse_user_row,
            )
            .optional()?;
        Ok(user)
    }

    fn load_children(&self, user: UserId) -> RepoResult<Vec<Child>> {
        let mut stmt = self.conn.prepare(&format!(
            "{CHILD_SELECT_SQL} WHERE {} = ?1 ORDER BY id ASC;",
            USER_CHILDREN.mapped_by
        ))?;
        let mut rows = stmt.query([user.0])?;
        let mut children = Vec::new();
        while let Some(row) = rows.next()? {
            let child = parse_child_row(row)?;
            if child.user != Some(user) {
                return Err(RepoError::InvalidData(format!(
                    "child row {:?} does not point at user {user}",
                    child.id
                )));
            }
            children.push(child);
        }
        Ok(children)
    }
}

fn insert_user_row(conn: &Connection, user: &User) -> RepoResult<UserId> {
    conn.execute(
        "INSERT INTO users (name) VALUES (?1);",
        params![user.name.as_deref()],
    )?;
    Ok(UserId(conn.last_insert_rowid()))
}

fn insert_child_row(conn: &Connection, child: &Child) -> RepoResult<ChildId> {
    conn.execute(
        "INSERT INTO children (user_id, content) VALUES (?1, ?2);",
        params![child.user.map(|id| id.0), child.content.as_deref()],
    )?;
    Ok(ChildId(conn.last_insert_rowid()))
}

fn parse_user_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: Some(UserId(row.get("id")?)),
        name: row.get("name")?,
        children: Vec::new(),
    })
}

fn parse_child_row(row: &Row<'_>) -> RepoResult<Child> {
    Ok(Child {
        id: Some(ChildId(row.get("id")?)),
        user: row.get::<_, Option<i64>>("user_id")?.map(UserId),
        content: row.get("content")?,
    })
}

fn ensure_entity_connection_ready(conn: &Connection) -> RepoResult<()> {
    let expected_version = latest_version();
    let actual_version: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    if actual_version != expected_version {
        return Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    let required: [(EntityKind, &[&'static str]); 2] = [
        (EntityKind::User, &["id", "name"]),
        (EntityKind::Child, &["id", "user_id", "content"]),
    ];
    for (kind, columns) in required {
        let table = kind.table();
        if !table_exists(conn, table)? {
            return Err(RepoError::MissingRequiredTable(table));
        }
        for column in columns {
            if !table_has_column(conn, table, column)? {
                return Err(RepoError::MissingRequiredColumn {
                    table,
                    column: *column,
                });
            }
        }
    }

    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> RepoResult<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table});"))?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let current: String = row.get(1)?;
        if current == column {
            return Ok(true);
        }
    }
    Ok(false)
}
