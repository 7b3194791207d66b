use async_trait::async_trait;
use deadpool_postgres::{Config, ManagerConfig, Pool, PoolConfig, RecyclingMethod, Runtime};
use tokio_postgres::error::SqlState;
use tokio_postgres::types::ToSql;
use tokio_postgres::{NoTls, Row};

use super::backend::{SqlDialect, TodoStore};
use super::query::{item_update, list_update, SqlValue, UpdateStatement};
use crate::context::RequestContext;
use crate::error::{Error, Result};
use crate::types::{NewItem, NewList, TodoItem, TodoList, UpdateItemInput, UpdateListInput, User};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id BIGSERIAL PRIMARY KEY,
    name VARCHAR(255) NOT NULL,
    username VARCHAR(255) NOT NULL UNIQUE,
    password_hash VARCHAR(255) NOT NULL
);

CREATE TABLE IF NOT EXISTS todo_lists (
    id BIGSERIAL PRIMARY KEY,
    title VARCHAR(255) NOT NULL CHECK (title <> ''),
    description VARCHAR(255) NOT NULL DEFAULT ''
);

CREATE TABLE IF NOT EXISTS users_lists (
    id BIGSERIAL PRIMARY KEY,
    user_id BIGINT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    list_id BIGINT NOT NULL REFERENCES todo_lists(id) ON DELETE CASCADE
);
CREATE INDEX IF NOT EXISTS idx_users_lists_user ON users_lists(user_id);
CREATE INDEX IF NOT EXISTS idx_users_lists_list ON users_lists(list_id);

CREATE TABLE IF NOT EXISTS todo_items (
    id BIGSERIAL PRIMARY KEY,
    title VARCHAR(255) NOT NULL CHECK (title <> ''),
    description VARCHAR(255) NOT NULL DEFAULT '',
    done BOOLEAN NOT NULL DEFAULT FALSE
);

CREATE TABLE IF NOT EXISTS lists_items (
    id BIGSERIAL PRIMARY KEY,
    list_id BIGINT NOT NULL REFERENCES todo_lists(id) ON DELETE CASCADE,
    item_id BIGINT NOT NULL REFERENCES todo_items(id) ON DELETE CASCADE
);
CREATE INDEX IF NOT EXISTS idx_lists_items_list ON lists_items(list_id);
CREATE INDEX IF NOT EXISTS idx_lists_items_item ON lists_items(item_id);
"#;

const DROP_SCHEMA: &str = r#"
DROP TABLE IF EXISTS lists_items;
DROP TABLE IF EXISTS todo_items;
DROP TABLE IF EXISTS users_lists;
DROP TABLE IF EXISTS todo_lists;
DROP TABLE IF EXISTS users;
"#;

pub struct PostgresBackend {
  pool: Pool,
}

impl PostgresBackend {
  pub fn new(url: &str, max_connections: usize) -> Result<Self> {
    let mut cfg = Config::new();
    cfg.url = Some(url.into());
    cfg.manager = Some(ManagerConfig {
      recycling_method: RecyclingMethod::Fast,
    });
    cfg.pool = Some(PoolConfig::new(max_connections.max(1)));
    let pool = cfg
      .create_pool(Some(Runtime::Tokio1), NoTls)
      .map_err(Error::store)?;
    Ok(Self { pool })
  }

  async fn execute_update(&self, ctx: &RequestContext, stmt: UpdateStatement) -> Result<u64> {
    tracing::debug!(sql = %stmt.sql, params = stmt.params.len(), "executing partial update");
    let boxed: Vec<Box<dyn ToSql + Sync + Send>> = stmt.params.into_iter().map(to_sql).collect();
    let params: Vec<&(dyn ToSql + Sync)> = boxed
      .iter()
      .map(|p| p.as_ref() as &(dyn ToSql + Sync))
      .collect();

    ctx
      .bound(async {
        let client = self.pool.get().await?;
        Ok::<_, Error>(client.execute(&stmt.sql, &params).await?)
      })
      .await?
  }
}

fn to_sql(value: SqlValue) -> Box<dyn ToSql + Sync + Send> {
  match value {
    SqlValue::Text(s) => Box::new(s),
    SqlValue::Bool(b) => Box::new(b),
    SqlValue::Int(i) => Box::new(i),
  }
}

fn row_to_list(row: &Row) -> TodoList {
  TodoList {
    id: row.get(0),
    title: row.get(1),
    description: row.get(2),
  }
}

fn row_to_item(row: &Row) -> TodoItem {
  TodoItem {
    id: row.get(0),
    title: row.get(1),
    description: row.get(2),
    done: row.get(3),
  }
}

#[async_trait]
impl TodoStore for PostgresBackend {
  fn dialect(&self) -> SqlDialect {
    SqlDialect::Postgres
  }

  async fn init_schema(&self) -> Result<()> {
    self.pool.get().await?.batch_execute(SCHEMA).await?;
    tracing::info!("PostgreSQL schema initialized");
    Ok(())
  }

  async fn drop_schema(&self) -> Result<()> {
    self.pool.get().await?.batch_execute(DROP_SCHEMA).await?;
    Ok(())
  }

  async fn create_user(
    &self,
    ctx: &RequestContext,
    name: &str,
    username: &str,
    password_hash: &str,
  ) -> Result<i64> {
    ctx
      .bound(async {
        let client = self.pool.get().await?;
        let result = client
          .query_one(
            "INSERT INTO users (name, username, password_hash) VALUES ($1, $2, $3) RETURNING id",
            &[&name, &username, &password_hash],
          )
          .await;
        match result {
          Ok(row) => Ok::<i64, Error>(row.get(0)),
          Err(e) if e.code() == Some(&SqlState::UNIQUE_VIOLATION) => {
            Err(Error::validation("username already exists"))
          }
          Err(e) => Err(e.into()),
        }
      })
      .await?
  }

  async fn get_user_by_username(&self, ctx: &RequestContext, username: &str) -> Result<User> {
    let row = ctx
      .bound(async {
        let client = self.pool.get().await?;
        Ok::<_, Error>(
          client
            .query_opt(
              "SELECT id, name, username, password_hash FROM users WHERE username = $1",
              &[&username],
            )
            .await?,
        )
      })
      .await??;

    row
      .map(|r| User {
        id: r.get(0),
        name: r.get(1),
        username: r.get(2),
        password_hash: r.get(3),
      })
      .ok_or_else(|| Error::not_found(format!("user {}", username)))
  }

  async fn create_list(&self, ctx: &RequestContext, user_id: i64, list: &NewList) -> Result<i64> {
    ctx
      .bound(async {
        let mut client = self.pool.get().await?;
        let tx = client.transaction().await?;
        let row = tx
          .query_one(
            "INSERT INTO todo_lists (title, description) VALUES ($1, $2) RETURNING id",
            &[&list.title, &list.description],
          )
          .await?;
        let id: i64 = row.get(0);
        tx.execute(
          "INSERT INTO users_lists (user_id, list_id) VALUES ($1, $2)",
          &[&user_id, &id],
        )
        .await?;
        tx.commit().await?;
        Ok::<_, Error>(id)
      })
      .await?
  }

  async fn get_all_lists(&self, ctx: &RequestContext, user_id: i64) -> Result<Vec<TodoList>> {
    let rows = ctx
      .bound(async {
        let client = self.pool.get().await?;
        Ok::<_, Error>(
          client
            .query(
              "SELECT tl.id, tl.title, tl.description FROM todo_lists tl \
               INNER JOIN users_lists ul ON tl.id = ul.list_id WHERE ul.user_id = $1 ORDER BY tl.id",
              &[&user_id],
            )
            .await?,
        )
      })
      .await??;
    Ok(rows.iter().map(row_to_list).collect())
  }

  async fn get_list(&self, ctx: &RequestContext, user_id: i64, list_id: i64) -> Result<TodoList> {
    let row = ctx
      .bound(async {
        let client = self.pool.get().await?;
        Ok::<_, Error>(
          client
            .query_opt(
              "SELECT tl.id, tl.title, tl.description FROM todo_lists tl \
               INNER JOIN users_lists ul ON tl.id = ul.list_id WHERE ul.user_id = $1 AND ul.list_id = $2",
              &[&user_id, &list_id],
            )
            .await?,
        )
      })
      .await??;
    row
      .as_ref()
      .map(row_to_list)
      .ok_or_else(|| Error::not_found(format!("list {}", list_id)))
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
    ctx
      .bound(async {
        let mut client = self.pool.get().await?;
        let tx = client.transaction().await?;
        tx.execute(
          "DELETE FROM todo_items WHERE id IN (SELECT li.item_id FROM lists_items li \
           INNER JOIN users_lists ul ON ul.list_id = li.list_id WHERE ul.user_id = $1 AND li.list_id = $2)",
          &[&user_id, &list_id],
        )
        .await?;
        let deleted = tx
          .execute(
            "DELETE FROM todo_lists WHERE id = $2 AND id IN (SELECT list_id FROM users_lists WHERE user_id = $1)",
            &[&user_id, &list_id],
          )
          .await?;
        if deleted == 0 {
          // Dropping the transaction rolls back the item deletes.
          return Err(Error::not_found(format!("list {}", list_id)));
        }
        tx.commit().await?;
        Ok::<_, Error>(())
      })
      .await?
  }

  async fn create_item(
    &self,
    ctx: &RequestContext,
    user_id: i64,
    list_id: i64,
    item: &NewItem,
  ) -> Result<i64> {
    ctx
      .bound(async {
        let mut client = self.pool.get().await?;
        let tx = client.transaction().await?;
        let owned: bool = tx
          .query_one(
            "SELECT EXISTS(SELECT 1 FROM users_lists WHERE user_id = $1 AND list_id = $2)",
            &[&user_id, &list_id],
          )
          .await?
          .get(0);
        if !owned {
          return Err(Error::not_found(format!("list {}", list_id)));
        }
        let row = tx
          .query_one(
            "INSERT INTO todo_items (title, description, done) VALUES ($1, $2, $3) RETURNING id",
            &[&item.title, &item.description, &item.done],
          )
          .await?;
        let id: i64 = row.get(0);
        tx.execute(
          "INSERT INTO lists_items (list_id, item_id) VALUES ($1, $2)",
          &[&list_id, &id],
        )
        .await?;
        tx.commit().await?;
        Ok::<_, Error>(id)
      })
      .await?
  }

  async fn get_all_items(
    &self,
    ctx: &RequestContext,
    user_id: i64,
    list_id: i64,
  ) -> Result<Vec<TodoItem>> {
    let rows = ctx
      .bound(async {
        let client = self.pool.get().await?;
        Ok::<_, Error>(
          client
            .query(
              "SELECT ti.id, ti.title, ti.description, ti.done FROM todo_items ti \
               INNER JOIN lists_items li ON li.item_id = ti.id \
               INNER JOIN users_lists ul ON ul.list_id = li.list_id \
               WHERE li.list_id = $1 AND ul.user_id = $2 ORDER BY ti.id",
              &[&list_id, &user_id],
            )
            .await?,
        )
      })
      .await??;
    Ok(rows.iter().map(row_to_item).collect())
  }

  async fn get_item(&self, ctx: &RequestContext, user_id: i64, item_id: i64) -> Result<TodoItem> {
    let row = ctx
      .bound(async {
        let client = self.pool.get().await?;
        Ok::<_, Error>(
          client
            .query_opt(
              "SELECT ti.id, ti.title, ti.description, ti.done FROM todo_items ti \
               INNER JOIN lists_items li ON li.item_id = ti.id \
               INNER JOIN users_lists ul ON ul.list_id = li.list_id \
               WHERE ti.id = $1 AND ul.user_id = $2",
              &[&item_id, &user_id],
            )
            .await?,
        )
      })
      .await??;
    row
      .as_ref()
      .map(row_to_item)
      .ok_or_else(|| Error::not_found(format!("item {}", item_id)))
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
      .bound(async {
        let client = self.pool.get().await?;
        Ok::<_, Error>(
          client
            .execute(
              "DELETE FROM todo_items WHERE id = $2 AND id IN (SELECT li.item_id FROM lists_items li \
               INNER JOIN users_lists ul ON ul.list_id = li.list_id WHERE ul.user_id = $1)",
              &[&user_id, &item_id],
            )
            .await?,
        )
      })
      .await??;

    if deleted == 0 {
      return Err(Error::not_found(format!("item {}", item_id)));
    }
    Ok(())
  }
}
