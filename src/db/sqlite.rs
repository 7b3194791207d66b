use async_trait::async_trait;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, ErrorCode, OptionalExtension};
use tokio_rusqlite::Connection;

use super::backend::{SqlDialect, TodoStore};
use super::query::{item_update, list_update, SqlValue, UpdateStatement};
use crate::context::RequestContext;
use crate::error::{Error, Result};
use crate::types::{NewItem, NewList, TodoItem, TodoList, UpdateItemInput, UpdateListInput, User};

const PRAGMAS: &str = r#"
PRAGMA journal_mode = WAL;
PRAGMA synchronous = NORMAL;
PRAGMA foreign_keys = ON;
PRAGMA temp_store = MEMORY;
"#;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    username TEXT NOT NULL UNIQUE,
    password_hash TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS todo_lists (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    title TEXT NOT NULL CHECK (title <> ''),
    description TEXT NOT NULL DEFAULT ''
);

CREATE TABLE IF NOT EXISTS users_lists (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    list_id INTEGER NOT NULL REFERENCES todo_lists(id) ON DELETE CASCADE
);
CREATE INDEX IF NOT EXISTS idx_users_lists_user ON users_lists(user_id);
CREATE INDEX IF NOT EXISTS idx_users_lists_list ON users_lists(list_id);

CREATE TABLE IF NOT EXISTS todo_items (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    title TEXT NOT NULL CHECK (title <> ''),
    description TEXT NOT NULL DEFAULT '',
    done INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS lists_items (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    list_id INTEGER NOT NULL REFERENCES todo_lists(id) ON DELETE CASCADE,
    item_id INTEGER NOT NULL REFERENCES todo_items(id) ON DELETE CASCADE
);
CREATE INDEX IF NOT EXISTS idx_lists_items_list ON lists_items(list_id);
CREATE INDEX IF NOT EXISTS idx_lists_items_item ON lists_items(item_id);
"#;

pub struct SqliteBackend {
  conn: Connection,
}

impl SqliteBackend {
  pub async fn new(path: &str) -> Result<Self> {
    let conn = if path == ":memory:" {
      Connection::open_in_memory().await?
    } else {
      Connection::open(path).await?
    };

    conn
      .call(|conn| conn.execute_batch(PRAGMAS).map_err(|e| e.into()))
      .await?;

    Ok(Self { conn })
  }

  pub async fn in_memory() -> Result<Self> {
    Self::new(":memory:").await
  }

  async fn execute_update(&self, ctx: &RequestContext, stmt: UpdateStatement) -> Result<usize> {
    tracing::debug!(sql = %stmt.sql, params = stmt.params.len(), "executing partial update");
    let values: Vec<Value> = stmt.params.into_iter().map(to_value).collect();
    let sql = stmt.sql;
    let changed = ctx
      .bound(self.conn.call(move |conn| {
        conn
          .execute(&sql, params_from_iter(values.iter()))
          .map_err(|e| e.into())
      }))
      .await??;
    Ok(changed)
  }
}

fn to_value(value: SqlValue) -> Value {
  match value {
    SqlValue::Text(s) => Value::Text(s),
    SqlValue::Bool(b) => Value::Integer(b as i64),
    SqlValue::Int(i) => Value::Integer(i),
  }
}

fn row_to_list(row: &rusqlite::Row<'_>) -> rusqlite::Result<TodoList> {
  Ok(TodoList {
    id: row.get(0)?,
    title: row.get(1)?,
    description: row.get(2)?,
  })
}

fn row_to_item(row: &rusqlite::Row<'_>) -> rusqlite::Result<TodoItem> {
  Ok(TodoItem {
    id: row.get(0)?,
    title: row.get(1)?,
    description: row.get(2)?,
    done: row.get(3)?,
  })
}

fn is_unique_violation(err: &tokio_rusqlite::Error) -> bool {
  matches!(
    err,
    tokio_rusqlite::Error::Rusqlite(rusqlite::Error::SqliteFailure(e, _))
      if e.code == ErrorCode::ConstraintViolation
        && e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
  )
}

#[async_trait]
impl TodoStore for SqliteBackend {
  fn dialect(&self) -> SqlDialect {
    SqlDialect::Sqlite
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| conn.execute_batch(SCHEMA).map_err(|e| e.into()))
      .await?;
    tracing::info!("SQLite schema initialized");
    Ok(())
  }

  async fn drop_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn
          .execute_batch(
            "DROP TABLE IF EXISTS lists_items;
         DROP TABLE IF EXISTS todo_items;
         DROP TABLE IF EXISTS users_lists;
         DROP TABLE IF EXISTS todo_lists;
         DROP TABLE IF EXISTS users;",
          )
          .map_err(|e| e.into())
      })
      .await?;
    Ok(())
  }

  async fn create_user(
    &self,
    ctx: &RequestContext,
    name: &str,
    username: &str,
    password_hash: &str,
  ) -> Result<i64> {
    let name = name.to_string();
    let username = username.to_string();
    let password_hash = password_hash.to_string();

    let result = ctx
      .bound(self.conn.call(move |conn| {
        conn
          .query_row(
            "INSERT INTO users (name, username, password_hash) VALUES (?1, ?2, ?3) RETURNING id",
            params![name, username, password_hash],
            |row| row.get::<_, i64>(0),
          )
          .map_err(|e| e.into())
      }))
      .await?;

    match result {
      Ok(id) => Ok(id),
      Err(e) if is_unique_violation(&e) => Err(Error::validation("username already exists")),
      Err(e) => Err(e.into()),
    }
  }

  async fn get_user_by_username(&self, ctx: &RequestContext, username: &str) -> Result<User> {
    let name = username.to_string();
    let user = ctx
      .bound(self.conn.call(move |conn| {
        let mut stmt = conn.prepare_cached(
          "SELECT id, name, username, password_hash FROM users WHERE username = ?1",
        )?;
        let user = stmt
          .query_row(params![name], |row| {
            Ok(User {
              id: row.get(0)?,
              name: row.get(1)?,
              username: row.get(2)?,
              password_hash: row.get(3)?,
            })
          })
          .optional()?;
        Ok(user)
      }))
      .await??;

    user.ok_or_else(|| Error::not_found(format!("user {}", username)))
  }

  async fn create_list(&self, ctx: &RequestContext, user_id: i64, list: &NewList) -> Result<i64> {
    let list = list.clone();
    let id = ctx
      .bound(self.conn.call(move |conn| {
        let tx = conn.transaction()?;
        let id: i64 = tx.query_row(
          "INSERT INTO todo_lists (title, description) VALUES (?1, ?2) RETURNING id",
          params![list.title, list.description],
          |row| row.get(0),
        )?;
        tx.execute(
          "INSERT INTO users_lists (user_id, list_id) VALUES (?1, ?2)",
          params![user_id, id],
        )?;
        tx.commit()?;
        Ok(id)
      }))
      .await??;
    Ok(id)
  }

  async fn get_all_lists(&self, ctx: &RequestContext, user_id: i64) -> Result<Vec<TodoList>> {
    let lists = ctx
      .bound(self.conn.call(move |conn| {
        let mut stmt = conn.prepare_cached(
          "SELECT tl.id, tl.title, tl.description FROM todo_lists tl \
           INNER JOIN users_lists ul ON tl.id = ul.list_id WHERE ul.user_id = ?1 ORDER BY tl.id",
        )?;
        let lists = stmt
          .query_map(params![user_id], row_to_list)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(lists)
      }))
      .await??;
    Ok(lists)
  }

  async fn get_list(&self, ctx: &RequestContext, user_id: i64, list_id: i64) -> Result<TodoList> {
    let list = ctx
      .bound(self.conn.call(move |conn| {
        let mut stmt = conn.prepare_cached(
          "SELECT tl.id, tl.title, tl.description FROM todo_lists tl \
           INNER JOIN users_lists ul ON tl.id = ul.list_id WHERE ul.user_id = ?1 AND ul.list_id = ?2",
        )?;
        Ok(stmt.query_row(params![user_id, list_id], row_to_list).optional()?)
      }))
      .await??;
    list.ok_or_else(|| Error::not_found(format!("list {}", list_id)))
  }

  async fn update_list(
    &self,
    ctx: &RequestContext,
    user_id: i64,
    list_id: i64,
    input: &UpdateListInput,
  ) -> Result<()> {
    let stmt = list_update(self.dialect(), user_id, list_id, input)?;
    if self.execute_update(ctx, stmt).await? == 0 {
      return Err(Error::not_found(format!("list {}", list_id)));
    }
    Ok(())
  }

  async fn delete_list(&self, ctx: &RequestContext, user_id: i64, list_id: i64) -> Result<()> {
    let deleted = ctx
      .bound(self.conn.call(move |conn| {
        let tx = conn.transaction()?;
        tx.execute(
          "DELETE FROM todo_items WHERE id IN (SELECT li.item_id FROM lists_items li \
           INNER JOIN users_lists ul ON ul.list_id = li.list_id WHERE ul.user_id = ?1 AND li.list_id = ?2)",
          params![user_id, list_id],
        )?;
        let deleted = tx.execute(
          "DELETE FROM todo_lists WHERE id = ?2 AND id IN (SELECT list_id FROM users_lists WHERE user_id = ?1)",
          params![user_id, list_id],
        )?;
        if deleted == 0 {
          // Dropping the transaction rolls back the item deletes.
          return Ok(false);
        }
        tx.commit()?;
        Ok(true)
      }))
      .await??;

    if !deleted {
      return Err(Error::not_found(format!("list {}", list_id)));
    }
    Ok(())
  }

  async fn create_item(
    &self,
    ctx: &RequestContext,
    user_id: i64,
    list_id: i64,
    item: &NewItem,
  ) -> Result<i64> {
    let item = item.clone();
    let id = ctx
      .bound(self.conn.call(move |conn| {
        let tx = conn.transaction()?;
        let owned: bool = tx.query_row(
          "SELECT EXISTS(SELECT 1 FROM users_lists WHERE user_id = ?1 AND list_id = ?2)",
          params![user_id, list_id],
          |row| row.get(0),
        )?;
        if !owned {
          return Ok(None);
        }
        let id: i64 = tx.query_row(
          "INSERT INTO todo_items (title, description, done) VALUES (?1, ?2, ?3) RETURNING id",
          params![item.title, item.description, item.done],
          |row| row.get(0),
        )?;
        tx.execute(
          "INSERT INTO lists_items (list_id, item_id) VALUES (?1, ?2)",
          params![list_id, id],
        )?;
        tx.commit()?;
        Ok(Some(id))
      }))
      .await??;

    id.ok_or_else(|| Error::not_found(format!("list {}", list_id)))
  }

  async fn get_all_items(
    &self,
    ctx: &RequestContext,
    user_id: i64,
    list_id: i64,
  ) -> Result<Vec<TodoItem>> {
    let items = ctx
      .bound(self.conn.call(move |conn| {
        let mut stmt = conn.prepare_cached(
          "SELECT ti.id, ti.title, ti.description, ti.done FROM todo_items ti \
           INNER JOIN lists_items li ON li.item_id = ti.id \
           INNER JOIN users_lists ul ON ul.list_id = li.list_id \
           WHERE li.list_id = ?1 AND ul.user_id = ?2 ORDER BY ti.id",
        )?;
        let items = stmt
          .query_map(params![list_id, user_id], row_to_item)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(items)
      }))
      .await??;
    Ok(items)
  }

  async fn get_item(&self, ctx: &RequestContext, user_id: i64, item_id: i64) -> Result<TodoItem> {
    let item = ctx
      .bound(self.conn.call(move |conn| {
        let mut stmt = conn.prepare_cached(
          "SELECT ti.id, ti.title, ti.description, ti.done FROM todo_items ti \
           INNER JOIN lists_items li ON li.item_id = ti.id \
           INNER JOIN users_lists ul ON ul.list_id = li.list_id \
           WHERE ti.id = ?1 AND ul.user_id = ?2",
        )?;
        Ok(stmt.query_row(params![item_id, user_id], row_to_item).optional()?)
      }))
      .await??;
    item.ok_or_else(|| Error::not_found(format!("item {}", item_id)))
  }

  async fn update_item(
    &self,
    ctx: &RequestContext,
    user_id: i64,
    item_id: i64,
    input: &UpdateItemInput,
  ) -> Result<()> {
    let stmt = item_update(self.dialect(), user_id, item_id, input)?;
    if self.execute_update(ctx, stmt).await? == 0 {
      return Err(Error::not_found(format!("item {}", item_id)));
    }
    Ok(())
  }

  async fn delete_item(&self, ctx: &RequestContext, user_id: i64, item_id: i64) -> Result<()> {
    let deleted = ctx
      .bound(self.conn.call(move |conn| {
        conn
          .execute(
            "DELETE FROM todo_items WHERE id = ?2 AND id IN (SELECT li.item_id FROM lists_items li \
             INNER JOIN users_lists ul ON ul.list_id = li.list_id WHERE ul.user_id = ?1)",
            params![user_id, item_id],
          )
          .map_err(|e| e.into())
      }))
      .await??;

    if deleted == 0 {
      return Err(Error::not_found(format!("item {}", item_id)));
    }
    Ok(())
  }
}
