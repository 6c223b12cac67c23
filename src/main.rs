//! # Catalog Sync demo
//!
//! Runs the forward-reference scenario against the in-memory stores:
//!
//! 1. `prod-A` references `prod-B`, which does not exist yet, so it waits.
//! 2. `prod-B` is synced. Its creation drains `prod-A`, which is created
//!    pointing at `prod-B`'s id.
//! 3. `prod-B` is re-synced with a changed price and gets one update.

use catalog_sync::lifecycle::{setup_tracing, SyncSystem};
use catalog_sync::model::{
    Attribute, AttributeValue, Money, PriceDraft, Reference, ResourceDraft, ResourceKind, VariantDraft,
};
use catalog_sync::sync::SyncOptions;
use tracing::{info, warn, Instrument};

fn product(key: &str, amount: i64) -> ResourceDraft {
    ResourceDraft::new(ResourceKind::Product, key)
        .with_name("en", key)
        .with_slug("en", key)
        .with_variant(
            VariantDraft::new(&format!("{key}-master"))
                .with_price(PriceDraft::new(Money::new("EUR", amount)).with_key("base")),
        )
}

#[tokio::main]
async fn main() -> Result<(), String> {
    setup_tracing();

    info!("Starting catalog sync demo");

    let system = SyncSystem::new();
    let options = SyncOptions::builder()
        .error_callback(|error, _, _, _| warn!(%error, "Sync error"))
        .warning_callback(|message, _, _| warn!(warning = message, "Sync warning"))
        .build();
    let coordinator = system.coordinator(options);

    let mut prod_a = product("prod-A", 1999);
    prod_a.variants[0].attributes.push(Attribute::new(
        "related",
        AttributeValue::Reference(Reference::by_key(ResourceKind::Product, "prod-B")),
    ));

    let stats = coordinator
        .sync(vec![prod_a])
        .instrument(tracing::info_span!("first_batch"))
        .await;
    info!(unresolved = stats.unresolved, "First batch done");

    let stats = coordinator
        .sync(vec![product("prod-B", 4999)])
        .instrument(tracing::info_span!("second_batch"))
        .await;
    info!(created = stats.created, unresolved = stats.unresolved, "Second batch done");

    let stats = coordinator
        .sync(vec![product("prod-B", 3999)])
        .instrument(tracing::info_span!("third_batch"))
        .await;
    info!("{}", stats.summary());

    drop(coordinator);
    system.shutdown().await?;

    info!("Application completed successfully");
    Ok(())
}
