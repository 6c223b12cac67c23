//! # Reconciliation Coordinator
//!
//! Drives each draft through
//!
//! ```text
//! RESOLVING ─┬─> UNRESOLVED
//!            └─> DIFFING ─┬─> NO_OP
//!                         └─> WRITING ─┬─> DONE
//!                                      ├─> FAILED
//!                                      └─> CONFLICT ─> DIFFING (bounded)
//! ```
//!
//! Drafts are grouped into sub-batches. A sub-batch warms the key cache and
//! fetches its existing resources with one call each, then reconciles its
//! drafts concurrently. Every resource that ends up existing (`DONE` or
//! `NO_OP`) triggers a drain of the drafts waiting on its key.

use crate::clients::{CatalogClient, ClientError};
use crate::diff::{DiffEngine, DiffOptions};
use crate::model::{CatalogResource, Reference, ResourceDraft, ResourceKey, UpdateAction};
use crate::resolution::{KeyValueCache, ReferenceResolver, UnresolvedReferenceStore, WaitingEntry};
use crate::sync::statistics::{Outcome, StatisticsTracker};
use crate::sync::{SyncError, SyncOptions, SyncStatistics};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::future::BoxFuture;
use futures::{stream, FutureExt, StreamExt};
use std::collections::{BTreeSet, HashMap};
use std::time::Instant;
use tracing::{debug, info, info_span, warn, Instrument};

/// Where a draft came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Origin {
    Submitted,
    Drained,
}

enum Write {
    Create { resolved: ResourceDraft, payload: ResourceDraft },
    Update { resolved: ResourceDraft, current: CatalogResource, actions: Vec<UpdateAction> },
}

enum State {
    Resolving,
    Diffing { resolved: ResourceDraft, current: Option<CatalogResource>, attempt: u32 },
    Writing { write: Write, attempt: u32 },
    Conflict {
        resolved: ResourceDraft,
        attempt: u32,
        /// The state and actions of the rejected update, for error reports.
        last: Option<(CatalogResource, Vec<UpdateAction>)>,
    },
}

/// Final state of one draft plus the id of the resource it left behind.
struct Terminal {
    outcome: Outcome,
    resource_id: Option<String>,
}

impl Terminal {
    fn done(outcome: Outcome, resource: &CatalogResource) -> Self {
        Self {
            outcome,
            resource_id: Some(resource.id.clone()),
        }
    }

    fn without_resource(outcome: Outcome) -> Self {
        Self {
            outcome,
            resource_id: None,
        }
    }
}

fn draft_key(draft: &ResourceDraft) -> Option<ResourceKey> {
    draft
        .key
        .as_ref()
        .filter(|key| !key.is_empty())
        .map(|key| ResourceKey::new(draft.kind, key.clone()))
}

pub struct ReconciliationCoordinator<C, S> {
    client: C,
    store: S,
    options: SyncOptions,
    cache: KeyValueCache,
    resolver: ReferenceResolver,
    stats: StatisticsTracker,
    /// Waiting drafts currently being re-submitted by some drain. The flag
    /// is raised when another drain wanted the same draft meanwhile.
    claims: DashMap<ResourceKey, bool>,
}

impl<C: CatalogClient, S: UnresolvedReferenceStore> ReconciliationCoordinator<C, S> {
    pub fn new(client: C, store: S, options: SyncOptions) -> Self {
        let cache = KeyValueCache::new();
        Self {
            client,
            store,
            options,
            resolver: ReferenceResolver::new(cache.clone()),
            cache,
            stats: StatisticsTracker::new(),
            claims: DashMap::new(),
        }
    }

    pub fn cache(&self) -> &KeyValueCache {
        &self.cache
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn options(&self) -> &SyncOptions {
        &self.options
    }

    /// Counters accumulated over every `sync` call so far.
    pub fn statistics(&self) -> SyncStatistics {
        self.stats.snapshot()
    }

    /// Reconciles `drafts` against the target. Per-draft failures are
    /// reported through the error callback and counted, never returned.
    pub async fn sync(&self, drafts: Vec<ResourceDraft>) -> SyncStatistics {
        let started = Instant::now();
        let batch_size = self.options.config.batch_size.max(1);
        info!(drafts = drafts.len(), batch_size, "Starting sync");

        let mut remaining = drafts;
        while !remaining.is_empty() {
            if self.options.is_cancelled() {
                info!(skipped = remaining.len(), "Sync cancelled");
                break;
            }
            let rest = remaining.split_off(batch_size.min(remaining.len()));
            let sub_batch = std::mem::replace(&mut remaining, rest);
            self.sync_sub_batch(sub_batch).await;
        }

        self.stats.add_duration(started.elapsed());
        let stats = self.stats.snapshot();
        info!("{}", stats.summary());
        stats
    }

    async fn sync_sub_batch(&self, drafts: Vec<ResourceDraft>) {
        let mut keyed = Vec::with_capacity(drafts.len());
        for draft in drafts {
            match draft_key(&draft) {
                Some(key) => keyed.push((key, draft)),
                None => {
                    self.fail(None, SyncError::MissingKey, Some(&draft), None, &[]);
                    self.stats.record(None, Outcome::Failed);
                }
            }
        }
        if keyed.is_empty() {
            return;
        }

        let mut wanted: BTreeSet<ResourceKey> = keyed.iter().map(|(key, _)| key.clone()).collect();
        for (_, draft) in &keyed {
            wanted.extend(ReferenceResolver::collect_key_references(draft));
        }
        wanted.extend(self.options.schemas.unresolved_type_keys());
        wanted.retain(|key| !self.cache.contains(key));

        if !wanted.is_empty() {
            match self.client.batch_fetch_keys_to_ids(&wanted).await {
                Ok(ids) => {
                    debug!(requested = wanted.len(), found = ids.len(), "Cache warmed");
                    self.cache.put_all(ids);
                }
                Err(e) => return self.fail_sub_batch(keyed, e),
            }
        }

        let own_keys: BTreeSet<ResourceKey> = keyed.iter().map(|(key, _)| key.clone()).collect();
        let mut existing: HashMap<ResourceKey, CatalogResource> = match self.client.fetch_by_keys(&own_keys).await {
            Ok(found) => found
                .into_iter()
                .filter_map(|resource| resource.resource_key().map(|key| (key, resource)))
                .collect(),
            Err(e) => return self.fail_sub_batch(keyed, e),
        };

        let tasks: Vec<_> = keyed
            .into_iter()
            .map(|(key, draft)| {
                let current = existing.remove(&key);
                async move {
                    if self.options.is_cancelled() {
                        debug!(key = %key, "Skipping draft after cancellation");
                        return;
                    }
                    self.reconcile(key, draft, current, Origin::Submitted, 0).await;
                }
            })
            .collect();

        stream::iter(tasks)
            .buffer_unordered(self.options.config.max_concurrency.max(1))
            .collect::<Vec<()>>()
            .await;
    }

    fn fail_sub_batch(&self, keyed: Vec<(ResourceKey, ResourceDraft)>, e: ClientError) {
        warn!(drafts = keyed.len(), error = %e, "Sub-batch lookup failed");
        for (key, draft) in keyed {
            let error = SyncError::from_client(&key, e.clone());
            self.fail(Some(&key), error, Some(&draft), None, &[]);
            self.stats.record(Some(&key), Outcome::Failed);
        }
    }

    /// Logs and reports a failure. Counting is left to the caller.
    fn fail(
        &self,
        key: Option<&ResourceKey>,
        error: SyncError,
        draft: Option<&ResourceDraft>,
        old: Option<&CatalogResource>,
        actions: &[UpdateAction],
    ) -> Terminal {
        warn!(key = ?key.map(ToString::to_string), error = %error, "Draft failed");
        self.options.report_error(&error, draft, old, actions);
        Terminal::without_resource(Outcome::Failed)
    }

    /// Runs one draft to its terminal state, counts it and follows up:
    /// caches the resource id, clears a stale waiting entry and drains the
    /// drafts waiting on the key.
    fn reconcile<'a>(
        &'a self,
        key: ResourceKey,
        draft: ResourceDraft,
        current: Option<CatalogResource>,
        origin: Origin,
        depth: u32,
    ) -> BoxFuture<'a, ()> {
        let span = info_span!("reconcile", key = %key, depth);
        async move {
            let terminal = self.run_states(&key, &draft, current).await;
            self.stats.record(Some(&key), terminal.outcome);

            match (&terminal.resource_id, terminal.outcome) {
                (Some(id), _) => {
                    self.cache.put(key.clone(), id.clone());
                    self.clear_waiting_entry(&key).await;
                    self.drain(&key, depth).await;
                }
                (None, Outcome::Failed) if origin == Origin::Drained => {
                    self.clear_waiting_entry(&key).await;
                }
                _ => {}
            }
        }
        .instrument(span)
        .boxed()
    }

    async fn run_states(&self, key: &ResourceKey, draft: &ResourceDraft, current: Option<CatalogResource>) -> Terminal {
        let retries = self.options.config.conflict_retries;
        let mut current = Some(current);
        let mut state = State::Resolving;

        loop {
            state = match state {
                State::Resolving => match self.resolver.resolve(draft) {
                    Ok(resolved) => State::Diffing {
                        resolved,
                        current: current.take().flatten(),
                        attempt: 0,
                    },
                    Err(missing) => return self.park(key, draft, missing).await,
                },

                State::Diffing { resolved, current: None, attempt } => {
                    let engine = self.diff_engine();
                    match engine.validate(&resolved) {
                        Ok(warnings) => {
                            for warning in &warnings {
                                self.options.report_warning(warning, Some(draft), None);
                            }
                        }
                        Err(e) => {
                            let error = SyncError::Diff { key: key.clone(), source: e };
                            return self.fail(Some(key), error, Some(draft), None, &[]);
                        }
                    }
                    let Some(hooked) = self.options.before_create(resolved.clone()) else {
                        debug!("Creation skipped by before_create");
                        return Terminal::without_resource(Outcome::Unchanged);
                    };
                    match self.resolver.resolve(&hooked) {
                        Ok(payload) => State::Writing {
                            write: Write::Create { resolved, payload },
                            attempt,
                        },
                        Err(missing) => {
                            let error = SyncError::HookIntroducedUnresolvedReference {
                                key: key.clone(),
                                missing: missing.into_iter().collect(),
                            };
                            return self.fail(Some(key), error, Some(draft), None, &[]);
                        }
                    }
                }

                State::Diffing { resolved, current: Some(current), attempt } => {
                    let outcome = match self.diff_engine().diff(&current, &resolved) {
                        Ok(outcome) => outcome,
                        Err(e) => {
                            let error = SyncError::Diff { key: key.clone(), source: e };
                            return self.fail(Some(key), error, Some(draft), Some(&current), &[]);
                        }
                    };
                    for warning in &outcome.warnings {
                        self.options.report_warning(warning, Some(draft), Some(&current));
                    }
                    if outcome.actions.is_empty() {
                        debug!("Already up to date");
                        return Terminal::done(Outcome::Unchanged, &current);
                    }
                    let actions = self.options.before_update(outcome.actions, &resolved, &current);
                    if actions.is_empty() {
                        debug!("before_update left no actions");
                        return Terminal::done(Outcome::Unchanged, &current);
                    }
                    match self.resolve_actions(actions) {
                        Ok(actions) => State::Writing {
                            write: Write::Update { resolved, current, actions },
                            attempt,
                        },
                        Err(missing) => {
                            let error = SyncError::HookIntroducedUnresolvedReference {
                                key: key.clone(),
                                missing: missing.into_iter().collect(),
                            };
                            return self.fail(Some(key), error, Some(draft), Some(&current), &[]);
                        }
                    }
                }

                State::Writing { write: Write::Create { resolved, payload }, attempt } => {
                    match self.client.create(&payload).await {
                        Ok(created) => {
                            info!(id = %created.id, "Created");
                            return Terminal::done(Outcome::Created, &created);
                        }
                        Err(ClientError::Conflict(reason)) => {
                            debug!(%reason, attempt, "Key taken concurrently");
                            State::Conflict {
                                resolved,
                                attempt,
                                last: None,
                            }
                        }
                        Err(e) => {
                            let error = SyncError::from_client(key, e);
                            return self.fail(Some(key), error, Some(draft), None, &[]);
                        }
                    }
                }

                State::Writing { write: Write::Update { resolved, current, actions }, attempt } => {
                    debug!(actions = actions.len(), version = current.version, "Updating");
                    match self.client.update(&current.id, current.version, &actions).await {
                        Ok(updated) => {
                            info!(id = %updated.id, actions = actions.len(), "Updated");
                            return Terminal::done(Outcome::Updated, &updated);
                        }
                        Err(ClientError::Conflict(reason)) => {
                            debug!(%reason, attempt, "Version conflict");
                            State::Conflict {
                                resolved,
                                attempt,
                                last: Some((current, actions)),
                            }
                        }
                        Err(e) => {
                            let error = SyncError::from_client(key, e);
                            return self.fail(Some(key), error, Some(draft), Some(&current), &actions);
                        }
                    }
                }

                State::Conflict { resolved, attempt, last } => {
                    let (old, attempted) = match &last {
                        Some((current, actions)) => (Some(current), actions.as_slice()),
                        None => (None, &[][..]),
                    };
                    if attempt >= retries {
                        let error = SyncError::ConflictExhausted {
                            key: key.clone(),
                            attempts: attempt + 1,
                        };
                        return self.fail(Some(key), error, Some(draft), old, attempted);
                    }
                    match self.client.fetch_by_key(key).await {
                        Ok(Some(fresh)) => State::Diffing {
                            resolved,
                            current: Some(fresh),
                            attempt: attempt + 1,
                        },
                        Ok(None) => {
                            let error = SyncError::ConcurrentlyDeleted { key: key.clone() };
                            return self.fail(Some(key), error, Some(draft), old, attempted);
                        }
                        Err(e) => {
                            let error = SyncError::from_client(key, e);
                            return self.fail(Some(key), error, Some(draft), old, attempted);
                        }
                    }
                }
            };
        }
    }

    /// Custom type schemas follow the cache, so the engine is built per use.
    fn diff_engine(&self) -> DiffEngine {
        DiffEngine::new(DiffOptions {
            empty_set_policy: self.options.config.empty_set_policy,
            schemas: self.options.schemas.resolve_with(|key| self.cache.resolve(key)),
        })
    }

    /// Translates key references a `before_update` hook put into its actions.
    fn resolve_actions(&self, mut actions: Vec<UpdateAction>) -> Result<Vec<UpdateAction>, BTreeSet<ResourceKey>> {
        let mut missing = BTreeSet::new();
        for action in &mut actions {
            action.for_each_reference_mut(&mut |reference: &mut Reference| {
                if let Some(key) = reference.unresolved_key() {
                    match self.cache.resolve(&key) {
                        Some(id) => *reference = Reference::by_id(key.kind, id),
                        None => {
                            missing.insert(key);
                        }
                    }
                }
            });
        }
        if missing.is_empty() {
            Ok(actions)
        } else {
            Err(missing)
        }
    }

    async fn park(&self, key: &ResourceKey, draft: &ResourceDraft, missing: BTreeSet<ResourceKey>) -> Terminal {
        let count = missing.len();
        let saved = match WaitingEntry::new(draft.clone(), missing) {
            Ok(entry) => self.store.save(entry).await,
            Err(e) => Err(e),
        };
        match saved {
            Ok(()) => {
                info!(missing = count, "Waiting for referenced resources");
                Terminal::without_resource(Outcome::Unresolved)
            }
            Err(e) => {
                let error = SyncError::Store {
                    key: key.clone(),
                    reason: e.to_string(),
                };
                self.fail(Some(key), error, Some(draft), None, &[])
            }
        }
    }

    async fn clear_waiting_entry(&self, key: &ResourceKey) {
        match self.store.delete(key).await {
            Ok(Some(_)) => debug!(key = %key, "Removed waiting entry"),
            Ok(None) => {}
            Err(e) => warn!(key = %key, error = %e, "Could not remove waiting entry"),
        }
    }

    /// Re-submits the drafts waiting on `established`, which now exists.
    async fn drain(&self, established: &ResourceKey, depth: u32) {
        let entries = match self.store.fetch_all_waiting_on(established).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!(key = %established, error = %e, "Could not look up waiting drafts");
                return;
            }
        };
        if entries.is_empty() {
            return;
        }
        if depth >= self.options.config.revisit_limit {
            info!(
                key = %established,
                waiting = entries.len(),
                "Revisit limit reached, leaving waiting drafts for a later run"
            );
            return;
        }

        debug!(key = %established, waiting = entries.len(), "Draining");
        for entry in entries {
            let Some(draft_key) = entry.draft_key() else {
                continue;
            };
            match self.claims.entry(draft_key.clone()) {
                Entry::Occupied(mut claim) => {
                    // The holder re-reads the entry before letting go.
                    *claim.get_mut() = true;
                    continue;
                }
                Entry::Vacant(claim) => {
                    claim.insert(false);
                }
            }
            self.revisit_claimed(draft_key, entry, depth).await;
        }
    }

    /// Revisits a claimed draft until no other drain asked for it meanwhile,
    /// then releases the claim.
    async fn revisit_claimed(&self, draft_key: ResourceKey, mut entry: WaitingEntry, depth: u32) {
        loop {
            self.revisit(draft_key.clone(), entry, depth).await;

            if self.claims.remove_if(&draft_key, |_, recheck| !*recheck).is_some() {
                return;
            }
            if let Some(mut recheck) = self.claims.get_mut(&draft_key) {
                *recheck = false;
            }
            debug!(key = %draft_key, "Re-checking waiting draft");
            entry = match self.store.fetch(&draft_key).await {
                Ok(Some(entry)) => entry,
                Ok(None) => {
                    self.claims.remove(&draft_key);
                    return;
                }
                Err(e) => {
                    warn!(key = %draft_key, error = %e, "Could not re-read waiting entry");
                    self.claims.remove(&draft_key);
                    return;
                }
            };
        }
    }

    async fn revisit(&self, draft_key: ResourceKey, mut entry: WaitingEntry, depth: u32) {
        let before = entry.missing_keys.len();
        entry.missing_keys.retain(|key| !self.cache.contains(key));

        if !entry.missing_keys.is_empty() {
            if entry.missing_keys.len() < before {
                debug!(key = %draft_key, missing = entry.missing_keys.len(), "Still waiting");
                entry.touch();
                if let Err(e) = self.store.save(entry).await {
                    warn!(key = %draft_key, error = %e, "Could not shrink waiting entry");
                }
            }
            return;
        }

        let current = match self.client.fetch_by_key(&draft_key).await {
            Ok(current) => current,
            Err(e) => {
                let error = SyncError::from_client(&draft_key, e);
                self.fail(Some(&draft_key), error, Some(&entry.draft), None, &[]);
                self.stats.record(Some(&draft_key), Outcome::Failed);
                return;
            }
        };
        self.reconcile(draft_key, entry.draft, current, Origin::Drained, depth + 1)
            .await;
    }
}
