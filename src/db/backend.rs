use async_trait::async_trait;

use crate::context::RequestContext;
use crate::error::Result;
use crate::types::{NewItem, NewList, TodoItem, TodoList, UpdateItemInput, UpdateListInput, User};

/// SQL dialect for statement generation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlDialect {
  Postgres,
  Sqlite,
}

impl SqlDialect {
  /// Positional placeholder for the `n`th bound parameter (1-based)
  pub fn placeholder(&self, n: usize) -> String {
    match self {
      Self::Postgres => format!("${}", n),
      Self::Sqlite => format!("?{}", n),
    }
  }
}

/// Authoritative relational store for users, lists and items.
///
/// Every list/item operation is scoped by the owning `user_id`; a record the
/// user does not own behaves exactly like a record that does not exist and
/// yields [`crate::Error::NotFound`].
#[async_trait]
pub trait TodoStore: Send + Sync {
  fn dialect(&self) -> SqlDialect;

  async fn init_schema(&self) -> Result<()>;
  async fn drop_schema(&self) -> Result<()>;

  // Users
  async fn create_user(
    &self,
    ctx: &RequestContext,
    name: &str,
    username: &str,
    password_hash: &str,
  ) -> Result<i64>;
  async fn get_user_by_username(&self, ctx: &RequestContext, username: &str) -> Result<User>;

  // Lists
  /// Inserts the list and its ownership link in one transaction.
  async fn create_list(&self, ctx: &RequestContext, user_id: i64, list: &NewList) -> Result<i64>;
  async fn get_all_lists(&self, ctx: &RequestContext, user_id: i64) -> Result<Vec<TodoList>>;
  async fn get_list(&self, ctx: &RequestContext, user_id: i64, list_id: i64) -> Result<TodoList>;
  async fn update_list(
    &self,
    ctx: &RequestContext,
    user_id: i64,
    list_id: i64,
    input: &UpdateListInput,
  ) -> Result<()>;
  /// Deletes the list, its links and the items linked to it.
  async fn delete_list(&self, ctx: &RequestContext, user_id: i64, list_id: i64) -> Result<()>;

  // Items
  /// Checks list ownership, then inserts the item and its link in one transaction.
  async fn create_item(
    &self,
    ctx: &RequestContext,
    user_id: i64,
    list_id: i64,
    item: &NewItem,
  ) -> Result<i64>;
  async fn get_all_items(
    &self,
    ctx: &RequestContext,
    user_id: i64,
    list_id: i64,
  ) -> Result<Vec<TodoItem>>;
  async fn get_item(&self, ctx: &RequestContext, user_id: i64, item_id: i64) -> Result<TodoItem>;
  async fn update_item(
    &self,
    ctx: &RequestContext,
    user_id: i64,
    item_id: i64,
    input: &UpdateItemInput,
  ) -> Result<()>;
  async fn delete_item(&self, ctx: &RequestContext, user_id: i64, item_id: i64) -> Result<()>;
}
