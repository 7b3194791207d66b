mod common;

use common::Harness;
use listkeep::cache::{Aggregate, Record};
use listkeep::db::TodoStore;
use listkeep::types::{NewItem, NewList, UpdateItemInput, UpdateListInput};
use listkeep::{Error, RequestContext};
use std::time::Duration;

#[tokio::test]
async fn test_hit_never_touches_store() {
  let h = Harness::new().await;
  let ctx = &h.ctx;
  let alice = h.user("alice").await;
  let list = h
    .services
    .lists
    .create(ctx, alice, &NewList::new("Groceries", ""))
    .await
    .unwrap();

  let reads = h.store.reads();
  h.services.lists.get_all(ctx, alice).await.unwrap();
  h.services.lists.get(ctx, alice, list).await.unwrap();
  assert_eq!(h.store.reads(), reads + 2);

  for _ in 0..5 {
    h.services.lists.get_all(ctx, alice).await.unwrap();
    h.services.lists.get(ctx, alice, list).await.unwrap();
  }
  assert_eq!(h.store.reads(), reads + 2);
}

#[tokio::test]
async fn test_empty_update_issues_no_store_call() {
  let h = Harness::new().await;
  let ctx = &h.ctx;
  let alice = h.user("alice").await;
  let writes = h.store.writes();

  let err = h
    .services
    .lists
    .update(ctx, alice, 1, &UpdateListInput::default())
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Validation(ref msg) if msg == "no fields to update"));

  let err = h
    .services
    .items
    .update(ctx, alice, 1, &UpdateItemInput::default())
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Validation(_)));

  assert_eq!(h.store.writes(), writes);
}

#[tokio::test]
async fn test_blank_title_rejected_before_store() {
  let h = Harness::new().await;
  let alice = h.user("alice").await;
  let writes = h.store.writes();

  let err = h
    .services
    .lists
    .create(&h.ctx, alice, &NewList::new("   ", ""))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Validation(_)));
  assert_eq!(h.store.writes(), writes);
}

#[tokio::test]
async fn test_create_item_invalidates_only_its_list() {
  let h = Harness::new().await;
  let ctx = &h.ctx;
  let alice = h.user("alice").await;
  let groceries = h
    .services
    .lists
    .create(ctx, alice, &NewList::new("Groceries", ""))
    .await
    .unwrap();
  let chores = h
    .services
    .lists
    .create(ctx, alice, &NewList::new("Chores", ""))
    .await
    .unwrap();

  h.services.lists.get_all(ctx, alice).await.unwrap();
  h.services.items.get_all(ctx, alice, groceries).await.unwrap();
  h.services.items.get_all(ctx, alice, chores).await.unwrap();

  h.services
    .items
    .create(ctx, alice, groceries, &NewItem::new("Milk", ""))
    .await
    .unwrap();

  assert!(h.raw(alice, Aggregate::ItemsInList(groceries)).await.is_none());
  assert!(h.raw(alice, Aggregate::ItemsInList(chores)).await.is_some());
  assert!(h.raw(alice, Aggregate::Lists).await.is_some());

  let items = h.services.items.get_all(ctx, alice, groceries).await.unwrap();
  assert_eq!(items.len(), 1);
  assert_eq!(items[0].title, "Milk");
}

#[tokio::test]
async fn test_item_update_and_delete_drop_whole_user_cache() {
  let h = Harness::new().await;
  let ctx = &h.ctx;
  let alice = h.user("alice").await;
  let list = h
    .services
    .lists
    .create(ctx, alice, &NewList::new("Groceries", ""))
    .await
    .unwrap();
  let item = h
    .services
    .items
    .create(ctx, alice, list, &NewItem::new("Milk", ""))
    .await
    .unwrap();

  h.services.lists.get_all(ctx, alice).await.unwrap();
  h.services.items.get(ctx, alice, item).await.unwrap();

  let input = UpdateItemInput {
    done: Some(true),
    ..Default::default()
  };
  h.services.items.update(ctx, alice, item, &input).await.unwrap();
  assert!(h.raw(alice, Aggregate::Lists).await.is_none());
  assert!(h.raw(alice, Record::Item(item)).await.is_none());
  assert!(h.services.items.get(ctx, alice, item).await.unwrap().done);

  h.services.items.delete(ctx, alice, item).await.unwrap();
  assert!(h.raw(alice, Record::Item(item)).await.is_none());
  let err = h.services.items.get(ctx, alice, item).await.unwrap_err();
  assert!(err.is_not_found());
}

#[tokio::test]
async fn test_list_delete_never_serves_stale_items() {
  let h = Harness::new().await;
  let ctx = &h.ctx;
  let alice = h.user("alice").await;
  let list = h
    .services
    .lists
    .create(ctx, alice, &NewList::new("Groceries", ""))
    .await
    .unwrap();
  let item = h
    .services
    .items
    .create(ctx, alice, list, &NewItem::new("Milk", ""))
    .await
    .unwrap();
  h.services.items.get(ctx, alice, item).await.unwrap();
  h.services.items.get_all(ctx, alice, list).await.unwrap();

  h.services.lists.delete(ctx, alice, list).await.unwrap();

  assert!(h.services.items.get(ctx, alice, item).await.unwrap_err().is_not_found());
  assert!(h.services.items.get_all(ctx, alice, list).await.unwrap().is_empty());
  assert!(h.services.lists.get(ctx, alice, list).await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn test_not_found_is_not_cached() {
  let h = Harness::new().await;
  let ctx = &h.ctx;
  let alice = h.user("alice").await;

  assert!(h.services.lists.get(ctx, alice, 7).await.unwrap_err().is_not_found());
  assert!(h.raw(alice, Record::List(7)).await.is_none());
}

#[tokio::test]
async fn test_cache_outage_degrades_to_store() {
  let h = Harness::with_failing_cache().await;
  let ctx = &h.ctx;
  let alice = h.user("alice").await;

  let list = h
    .services
    .lists
    .create(ctx, alice, &NewList::new("Groceries", ""))
    .await
    .unwrap();
  let item = h
    .services
    .items
    .create(ctx, alice, list, &NewItem::new("Milk", ""))
    .await
    .unwrap();

  let reads = h.store.reads();
  assert_eq!(h.services.lists.get_all(ctx, alice).await.unwrap().len(), 1);
  assert_eq!(h.services.lists.get_all(ctx, alice).await.unwrap().len(), 1);
  assert_eq!(h.store.reads(), reads + 2);

  let input = UpdateListInput {
    title: Some("Food".into()),
    description: None,
  };
  h.services.lists.update(ctx, alice, list, &input).await.unwrap();
  assert_eq!(h.services.lists.get(ctx, alice, list).await.unwrap().title, "Food");

  h.services.items.delete(ctx, alice, item).await.unwrap();
  h.services.lists.delete(ctx, alice, list).await.unwrap();
  assert!(h.services.lists.get_all(ctx, alice).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_store_errors_propagate() {
  let h = Harness::new().await;
  let ctx = &h.ctx;
  let alice = h.user("alice").await;

  let err = h
    .services
    .items
    .create(ctx, alice, 99, &NewItem::new("Milk", ""))
    .await
    .unwrap_err();
  assert!(err.is_not_found());

  let input = UpdateListInput {
    title: Some("x".into()),
    description: None,
  };
  let err = h.services.lists.update(ctx, alice, 99, &input).await.unwrap_err();
  assert!(err.is_not_found());
}

#[tokio::test]
async fn test_write_past_deadline_never_leaves_stale_cache() {
  let h = Harness::new().await;
  let alice = h.user("alice").await;
  h.cache
    .write_raw(&h.ctx, alice, Aggregate::Lists, "[]".to_string())
    .await
    .unwrap();

  // Whether the create reports success or a timeout, it may have committed.
  let ctx = RequestContext::with_timeout(Duration::from_nanos(1));
  let _ = h
    .services
    .lists
    .create(&ctx, alice, &NewList::new("Groceries", ""))
    .await;
  tokio::time::sleep(Duration::from_millis(200)).await;

  let stored = h.store.get_all_lists(&h.ctx, alice).await.unwrap();
  let served = h.services.lists.get_all(&h.ctx, alice).await.unwrap();
  assert_eq!(served, stored);
}

#[tokio::test]
async fn test_update_past_deadline_never_leaves_stale_cache() {
  let h = Harness::new().await;
  let alice = h.user("alice").await;
  let list = h
    .services
    .lists
    .create(&h.ctx, alice, &NewList::new("Groceries", ""))
    .await
    .unwrap();
  h.services.lists.get(&h.ctx, alice, list).await.unwrap();

  let ctx = RequestContext::with_timeout(Duration::from_nanos(1));
  let input = UpdateListInput {
    title: Some("Food".into()),
    description: None,
  };
  let _ = h.services.lists.update(&ctx, alice, list, &input).await;
  tokio::time::sleep(Duration::from_millis(200)).await;

  let stored = h.store.get_list(&h.ctx, alice, list).await.unwrap();
  let served = h.services.lists.get(&h.ctx, alice, list).await.unwrap();
  assert_eq!(served, stored);
}

#[tokio::test]
async fn test_store_error_after_commit_drops_user_cache() {
  let h = Harness::new().await;
  let ctx = &h.ctx;
  let alice = h.user("alice").await;
  let list = h
    .services
    .lists
    .create(ctx, alice, &NewList::new("Groceries", ""))
    .await
    .unwrap();
  h.services.lists.get_all(ctx, alice).await.unwrap();
  h.services.items.get_all(ctx, alice, list).await.unwrap();

  h.store.fail_after_commit(true);
  let err = h
    .services
    .items
    .create(ctx, alice, list, &NewItem::new("Milk", ""))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Store(_)));
  assert!(h.raw(alice, Aggregate::Lists).await.is_none());
  assert!(h.raw(alice, Aggregate::ItemsInList(list)).await.is_none());

  let err = h
    .services
    .lists
    .create(ctx, alice, &NewList::new("Chores", ""))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Store(_)));
  h.store.fail_after_commit(false);

  assert_eq!(h.services.lists.get_all(ctx, alice).await.unwrap().len(), 2);
  let items = h.services.items.get_all(ctx, alice, list).await.unwrap();
  assert_eq!(items.len(), 1);
  assert_eq!(items[0].title, "Milk");
}

#[tokio::test]
async fn test_not_found_write_keeps_cache() {
  let h = Harness::new().await;
  let ctx = &h.ctx;
  let alice = h.user("alice").await;
  h.services
    .lists
    .create(ctx, alice, &NewList::new("Groceries", ""))
    .await
    .unwrap();
  h.services.lists.get_all(ctx, alice).await.unwrap();

  assert!(h.services.lists.delete(ctx, alice, 99).await.unwrap_err().is_not_found());
  assert!(h.raw(alice, Aggregate::Lists).await.is_some());
}
