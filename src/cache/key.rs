//! Cache key layout.
//!
//! Every user owns exactly one hash key, `user:{id}`. Query results live in
//! fields of that hash, so one `DEL` drops everything cached for the user and
//! one `EXPIRE` covers all of it.

use std::fmt;

pub fn user_key(user_id: i64) -> String {
  format!("user:{}", user_id)
}

/// A cached collection result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Aggregate {
  /// All lists of the user: field `lists`.
  Lists,
  /// All items of one list: field `items:list{id}`.
  ItemsInList(i64),
}

/// A cached single record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Record {
  /// Field `list:{id}`.
  List(i64),
  /// Field `item:{id}`.
  Item(i64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheField {
  Aggregate(Aggregate),
  Record(Record),
}

impl CacheField {
  pub fn name(&self) -> String {
    match self {
      CacheField::Aggregate(Aggregate::Lists) => "lists".to_string(),
      CacheField::Aggregate(Aggregate::ItemsInList(id)) => format!("items:list{}", id),
      CacheField::Record(Record::List(id)) => format!("list:{}", id),
      CacheField::Record(Record::Item(id)) => format!("item:{}", id),
    }
  }
}

impl From<Aggregate> for CacheField {
  fn from(a: Aggregate) -> Self {
    CacheField::Aggregate(a)
  }
}

impl From<Record> for CacheField {
  fn from(r: Record) -> Self {
    CacheField::Record(r)
  }
}

impl fmt::Display for CacheField {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.name())
  }
}
