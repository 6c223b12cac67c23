use async_trait::async_trait;
use catalog_sync::clients::{CatalogClient, ClientError, StoreCatalogClient};
use catalog_sync::diff::DiffError;
use catalog_sync::lifecycle::SyncSystem;
use catalog_sync::model::{
    Attribute, AttributeValue, CatalogResource, LineItemDraft, Money, PriceDraft, Reference, ResourceDraft,
    ResourceKey, ResourceKind, UpdateAction, VariantDraft,
};
use catalog_sync::resolution::{
    CleanupStatistics, CustomObjectReferenceStore, StoreError, UnresolvedReferenceStore, WaitingEntry,
};
use catalog_sync::sync::{ReconciliationCoordinator, SyncError, SyncOptions, SyncOptionsBuilder};
use chrono::{DateTime, Utc};
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

fn key(kind: ResourceKind, key: &str) -> ResourceKey {
    ResourceKey::new(kind, key)
}

fn product(key: &str) -> ResourceDraft {
    ResourceDraft::new(ResourceKind::Product, key)
        .with_name("en", key)
        .with_slug("en", key)
        .with_variant(VariantDraft::new("master").with_sku(&format!("{key}-sku")))
}

fn referencing(key: &str, target: &str) -> ResourceDraft {
    let mut draft = product(key);
    draft.variants[0].attributes.push(Attribute::new(
        "related",
        AttributeValue::Reference(Reference::by_key(ResourceKind::Product, target)),
    ));
    draft
}

fn recording(builder: SyncOptionsBuilder) -> (SyncOptions, Arc<Mutex<Vec<SyncError>>>) {
    let errors = Arc::new(Mutex::new(Vec::new()));
    let sink = errors.clone();
    let options = builder
        .error_callback(move |error, _, _, _| sink.lock().unwrap().push(error.clone()))
        .build();
    (options, errors)
}

/// Full end-to-end run against the in-memory stores: a draft that points
/// at a product which does not exist yet waits, then lands once the
/// product is synced.
#[tokio::test]
async fn test_forward_reference_is_drained() {
    let system = SyncSystem::new();
    let coordinator = system.coordinator(SyncOptions::default());
    let prod_a = key(ResourceKind::Product, "prod-A");
    let prod_b = key(ResourceKind::Product, "prod-B");

    let stats = coordinator.sync(vec![referencing("prod-A", "prod-B")]).await;
    assert_eq!(stats.processed, 1);
    assert_eq!(stats.unresolved, 1);
    assert_eq!(stats.created, 0);

    let waiting = coordinator.store().fetch(&prod_a).await.unwrap().expect("entry saved");
    assert_eq!(waiting.missing_keys.into_iter().collect::<Vec<_>>(), vec![prod_b.clone()]);
    assert!(system.catalog_client.fetch_by_key(&prod_a).await.unwrap().is_none());

    let stats = coordinator.sync(vec![product("prod-B")]).await;
    assert_eq!(stats.processed, 2);
    assert_eq!(stats.created, 2);
    assert_eq!(stats.unresolved, 0);
    assert_eq!(stats.failed, 0);

    let b = system.catalog_client.fetch_by_key(&prod_b).await.unwrap().expect("prod-B created");
    let a = system.catalog_client.fetch_by_key(&prod_a).await.unwrap().expect("prod-A created");
    assert_eq!(
        a.variants[0].attributes[0].value,
        AttributeValue::Reference(Reference::by_id(ResourceKind::Product, b.id.clone()))
    );
    assert!(coordinator.store().fetch(&prod_a).await.unwrap().is_none());
    assert_eq!(coordinator.cache().resolve(&prod_a), Some(a.id));

    drop(coordinator);
    system.shutdown().await.expect("Shutdown failed");
}

#[tokio::test]
async fn test_price_changes_become_one_update() {
    let system = SyncSystem::new();
    let coordinator = system.coordinator(SyncOptions::default());
    let prod = key(ResourceKind::Product, "prod-P");

    let mut draft = product("prod-P");
    draft.variants[0].prices = vec![
        PriceDraft::new(Money::new("EUR", 1000)).with_key("price-1"),
        PriceDraft::new(Money::new("USD", 2000)).with_key("price-2"),
    ];
    coordinator.sync(vec![draft.clone()]).await;

    draft.variants[0].prices = vec![
        PriceDraft::new(Money::new("USD", 2500)).with_key("price-2"),
        PriceDraft::new(Money::new("GBP", 500)).with_key("p3"),
    ];
    let stats = coordinator.sync(vec![draft]).await;
    assert_eq!(stats.created, 1);
    assert_eq!(stats.updated, 1);

    let stored = system.catalog_client.fetch_by_key(&prod).await.unwrap().unwrap();
    assert_eq!(stored.version, 2);
    let prices: Vec<(Option<&str>, i64)> = stored.variants[0]
        .prices
        .iter()
        .map(|p| (p.draft.key.as_deref(), p.draft.value.cent_amount))
        .collect();
    assert_eq!(prices, vec![(Some("price-2"), 2500), (Some("p3"), 500)]);
}

#[tokio::test]
async fn test_resync_without_changes_is_a_no_op() {
    let system = SyncSystem::new();
    let coordinator = system.coordinator(SyncOptions::default());

    let draft = product("prod-N")
        .with_line_item(LineItemDraft::new("prod-N-sku", 0))
        .with_category(Reference::by_id(ResourceKind::Category, "cat-1"));
    coordinator.sync(vec![draft.clone()]).await;
    let stats = coordinator.sync(vec![draft]).await;

    assert_eq!(stats.processed, 2);
    assert_eq!(stats.created, 1);
    assert_eq!(stats.unchanged, 1);

    let stored = system
        .catalog_client
        .fetch_by_key(&key(ResourceKind::Product, "prod-N"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.version, 1);
}

#[tokio::test]
async fn test_duplicate_price_keys_fail_without_writing() {
    let system = SyncSystem::new();
    let (options, errors) = recording(SyncOptions::builder());
    let coordinator = system.coordinator(options);

    coordinator.sync(vec![product("prod-D")]).await;

    let mut bad = product("prod-D");
    bad.variants[0].prices = vec![
        PriceDraft::new(Money::new("EUR", 100)).with_key("dup"),
        PriceDraft::new(Money::new("USD", 200)).with_key("dup"),
    ];
    let stats = coordinator.sync(vec![bad]).await;
    assert_eq!(stats.failed, 1);

    assert!(matches!(
        errors.lock().unwrap().as_slice(),
        [SyncError::Diff { source: DiffError::DuplicateIdentity { .. }, .. }]
    ));
    let stored = system
        .catalog_client
        .fetch_by_key(&key(ResourceKind::Product, "prod-D"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.version, 1);
    assert!(stored.variants[0].prices.is_empty());
}

#[tokio::test]
async fn test_before_update_cannot_add_unresolved_references() {
    let system = SyncSystem::new();
    let (options, errors) = recording(SyncOptions::builder().before_update(|mut actions, _, _| {
        actions.push(UpdateAction::AddToCategory {
            category: Reference::by_key(ResourceKind::Category, "ghost"),
        });
        actions
    }));
    let coordinator = system.coordinator(options);

    coordinator.sync(vec![product("prod-H")]).await;
    let stats = coordinator.sync(vec![product("prod-H").with_name("en", "Renamed")]).await;

    assert_eq!(stats.created, 1);
    assert_eq!(stats.failed, 1);
    assert_eq!(
        errors.lock().unwrap().as_slice(),
        &[SyncError::HookIntroducedUnresolvedReference {
            key: key(ResourceKind::Product, "prod-H"),
            missing: vec![key(ResourceKind::Category, "ghost")],
        }]
    );
}

#[tokio::test]
async fn test_before_create_can_skip_a_draft() {
    let system = SyncSystem::new();
    let options = SyncOptions::builder()
        .before_create(|draft| (draft.key.as_deref() != Some("skip-me")).then_some(draft))
        .build();
    let coordinator = system.coordinator(options);

    let stats = coordinator.sync(vec![product("skip-me"), product("keep-me")]).await;

    assert_eq!(stats.unchanged, 1);
    assert_eq!(stats.created, 1);
    let skipped = system
        .catalog_client
        .fetch_by_key(&key(ResourceKind::Product, "skip-me"))
        .await
        .unwrap();
    assert!(skipped.is_none());
}

#[tokio::test]
async fn test_keyless_draft_is_reported() {
    let system = SyncSystem::new();
    let (options, errors) = recording(SyncOptions::builder());
    let coordinator = system.coordinator(options);

    let mut keyless = product("ignored");
    keyless.key = None;
    let stats = coordinator.sync(vec![keyless, product("prod-K")]).await;

    assert_eq!(stats.processed, 2);
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.created, 1);
    assert_eq!(errors.lock().unwrap().as_slice(), &[SyncError::MissingKey]);
}

#[tokio::test]
async fn test_cancelled_sync_processes_nothing() {
    let system = SyncSystem::new();
    let token = CancellationToken::new();
    token.cancel();
    let coordinator = system.coordinator(SyncOptions::builder().cancellation(token).build());

    let stats = coordinator.sync(vec![product("prod-X"), product("prod-Y")]).await;

    assert_eq!(stats.processed, 0);
    assert!(system
        .catalog_client
        .fetch_by_key(&key(ResourceKind::Product, "prod-X"))
        .await
        .unwrap()
        .is_none());
}

/// With a revisit limit of one, creating `A` releases `B` but not `C`,
/// which waits on `B`. The next time `B` is seen, even unchanged, `C` is
/// released.
#[tokio::test]
async fn test_revisit_limit_defers_chained_drafts() {
    let system = SyncSystem::new();
    let coordinator = system.coordinator(SyncOptions::builder().revisit_limit(1).build());

    let stats = coordinator
        .sync(vec![referencing("prod-C", "prod-B"), referencing("prod-B", "prod-A")])
        .await;
    assert_eq!(stats.unresolved, 2);

    let stats = coordinator.sync(vec![product("prod-A")]).await;
    assert_eq!(stats.processed, 3);
    assert_eq!(stats.created, 2);
    assert_eq!(stats.unresolved, 1);
    assert!(coordinator
        .store()
        .fetch(&key(ResourceKind::Product, "prod-C"))
        .await
        .unwrap()
        .is_some());

    let stats = coordinator.sync(vec![referencing("prod-B", "prod-A")]).await;
    assert_eq!(stats.processed, 4);
    assert_eq!(stats.created, 3);
    assert_eq!(stats.unchanged, 1);
    assert_eq!(stats.unresolved, 0);
    assert!(system
        .catalog_client
        .fetch_by_key(&key(ResourceKind::Product, "prod-C"))
        .await
        .unwrap()
        .is_some());
}

/// Store whose saves take a while to land.
struct SlowSaves(CustomObjectReferenceStore);

#[async_trait]
impl UnresolvedReferenceStore for SlowSaves {
    async fn save(&self, entry: WaitingEntry) -> Result<(), StoreError> {
        tokio::time::sleep(Duration::from_millis(100)).await;
        self.0.save(entry).await
    }

    async fn fetch(&self, draft_key: &ResourceKey) -> Result<Option<WaitingEntry>, StoreError> {
        self.0.fetch(draft_key).await
    }

    async fn fetch_all_waiting_on(&self, key: &ResourceKey) -> Result<Vec<WaitingEntry>, StoreError> {
        self.0.fetch_all_waiting_on(key).await
    }

    async fn delete(&self, draft_key: &ResourceKey) -> Result<Option<WaitingEntry>, StoreError> {
        self.0.delete(draft_key).await
    }

    async fn cleanup(&self, older_than: DateTime<Utc>) -> Result<CleanupStatistics, StoreError> {
        self.0.cleanup(older_than).await
    }
}

/// Catalog client that is slow to create one particular key.
struct SlowCreate {
    inner: StoreCatalogClient,
    slow_key: &'static str,
}

#[async_trait]
impl CatalogClient for SlowCreate {
    async fn fetch_by_key(&self, key: &ResourceKey) -> Result<Option<CatalogResource>, ClientError> {
        self.inner.fetch_by_key(key).await
    }

    async fn fetch_by_keys(&self, keys: &BTreeSet<ResourceKey>) -> Result<Vec<CatalogResource>, ClientError> {
        self.inner.fetch_by_keys(keys).await
    }

    async fn create(&self, draft: &ResourceDraft) -> Result<CatalogResource, ClientError> {
        if draft.key.as_deref() == Some(self.slow_key) {
            tokio::time::sleep(Duration::from_millis(30)).await;
        }
        self.inner.create(draft).await
    }

    async fn update(&self, id: &str, version: u64, actions: &[UpdateAction]) -> Result<CatalogResource, ClientError> {
        self.inner.update(id, version, actions).await
    }

    async fn batch_fetch_keys_to_ids(
        &self,
        keys: &BTreeSet<ResourceKey>,
    ) -> Result<HashMap<ResourceKey, String>, ClientError> {
        self.inner.batch_fetch_keys_to_ids(keys).await
    }
}

/// A draft waiting on two keys created side by side: the second key shows
/// up while the first key's drain is still saving the shrunk entry.
#[tokio::test]
async fn test_draft_waiting_on_two_keys_created_together() {
    let system = SyncSystem::new();
    let coordinator = ReconciliationCoordinator::new(
        SlowCreate {
            inner: system.catalog_client.clone(),
            slow_key: "k2",
        },
        SlowSaves(CustomObjectReferenceStore::new(system.custom_object_client.clone())),
        SyncOptions::default(),
    );

    let mut waiting = referencing("d", "k1");
    waiting.variants[0].attributes.push(Attribute::new(
        "also-related",
        AttributeValue::Reference(Reference::by_key(ResourceKind::Product, "k2")),
    ));
    let stats = coordinator.sync(vec![waiting]).await;
    assert_eq!(stats.unresolved, 1);

    let stats = coordinator.sync(vec![product("k1"), product("k2")]).await;
    assert_eq!(stats.processed, 3);
    assert_eq!(stats.created, 3);
    assert_eq!(stats.unresolved, 0);

    let d = key(ResourceKind::Product, "d");
    assert!(system.catalog_client.fetch_by_key(&d).await.unwrap().is_some());
    assert!(coordinator.store().fetch(&d).await.unwrap().is_none());
}
