//! Partial-update statement construction.
//!
//! An update touches only the fields the caller provided. Assignments are
//! emitted in the declared column order of the record, placeholders are
//! numbered from 1, and the ownership scope id and record id are bound last,
//! in that order. The ownership join lives in the same statement as the SET
//! so a caller can never mutate a record outside their scope.

use super::backend::SqlDialect;
use crate::error::{Error, Result};
use crate::types::{UpdateItemInput, UpdateListInput};

/// A value bound to a generated statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqlValue {
  Text(String),
  Bool(bool),
  Int(i64),
}

impl From<String> for SqlValue {
  fn from(v: String) -> Self {
    SqlValue::Text(v)
  }
}

impl From<&str> for SqlValue {
  fn from(v: &str) -> Self {
    SqlValue::Text(v.to_string())
  }
}

impl From<bool> for SqlValue {
  fn from(v: bool) -> Self {
    SqlValue::Bool(v)
  }
}

impl From<i64> for SqlValue {
  fn from(v: i64) -> Self {
    SqlValue::Int(v)
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateStatement {
  pub sql: String,
  pub params: Vec<SqlValue>,
}

/// Which record kind an update targets, and how ownership is joined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateTarget {
  /// `todo_lists`, scoped by `users_lists.user_id`.
  List,
  /// `todo_items`, scoped through `lists_items` to `users_lists.user_id`.
  Item,
}

impl UpdateTarget {
  fn table(&self) -> &'static str {
    match self {
      UpdateTarget::List => "todo_lists AS tl",
      UpdateTarget::Item => "todo_items AS ti",
    }
  }

  fn ownership_join(&self) -> &'static str {
    match self {
      UpdateTarget::List => "users_lists ul",
      UpdateTarget::Item => "lists_items li, users_lists ul",
    }
  }

  fn ownership_filter(&self, scope: &str, record: &str) -> String {
    match self {
      UpdateTarget::List => format!(
        "tl.id = ul.list_id AND ul.user_id = {} AND ul.list_id = {}",
        scope, record
      ),
      UpdateTarget::Item => format!(
        "ti.id = li.item_id AND li.list_id = ul.list_id AND ul.user_id = {} AND ti.id = {}",
        scope, record
      ),
    }
  }
}

/// Accumulates the provided assignments of a sparse update.
#[derive(Debug)]
pub struct UpdateBuilder {
  dialect: SqlDialect,
  target: UpdateTarget,
  assignments: Vec<String>,
  params: Vec<SqlValue>,
}

impl UpdateBuilder {
  pub fn new(dialect: SqlDialect, target: UpdateTarget) -> Self {
    Self {
      dialect,
      target,
      assignments: Vec::new(),
      params: Vec::new(),
    }
  }

  /// Adds `column = $n` when `value` is present; absent values are skipped.
  pub fn set<V: Into<SqlValue>>(mut self, column: &str, value: Option<V>) -> Self {
    if let Some(value) = value {
      let placeholder = self.dialect.placeholder(self.params.len() + 1);
      self.assignments.push(format!("{} = {}", column, placeholder));
      self.params.push(value.into());
    }
    self
  }

  pub fn build(mut self, scope_id: i64, record_id: i64) -> Result<UpdateStatement> {
    if self.assignments.is_empty() {
      return Err(Error::validation("no fields to update"));
    }

    let scope = self.dialect.placeholder(self.params.len() + 1);
    let record = self.dialect.placeholder(self.params.len() + 2);
    let sql = format!(
      "UPDATE {} SET {} FROM {} WHERE {}",
      self.target.table(),
      self.assignments.join(", "),
      self.target.ownership_join(),
      self.target.ownership_filter(&scope, &record)
    );
    self.params.push(SqlValue::Int(scope_id));
    self.params.push(SqlValue::Int(record_id));

    Ok(UpdateStatement {
      sql,
      params: self.params,
    })
  }
}

/// Builds the scoped update for a list owned by `user_id`.
pub fn list_update(
  dialect: SqlDialect,
  user_id: i64,
  list_id: i64,
  input: &UpdateListInput,
) -> Result<UpdateStatement> {
  UpdateBuilder::new(dialect, UpdateTarget::List)
    .set("title", input.title.clone())
    .set("description", input.description.clone())
    .build(user_id, list_id)
}

/// Builds the scoped update for an item reachable from `user_id`'s lists.
pub fn item_update(
  dialect: SqlDialect,
  user_id: i64,
  item_id: i64,
  input: &UpdateItemInput,
) -> Result<UpdateStatement> {
  UpdateBuilder::new(dialect, UpdateTarget::Item)
    .set("title", input.title.clone())
    .set("description", input.description.clone())
    .set("done", input.done)
    .build(user_id, item_id)
}
