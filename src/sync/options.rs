use crate::diff::{CustomTypeSchemas, EmptySetPolicy};
use crate::model::{CatalogResource, ResourceDraft, UpdateAction};
use crate::sync::SyncError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Tunables of a sync run. Deserializes from camelCase JSON, missing fields
/// take their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SyncConfig {
    /// Drafts per sub-batch. Each sub-batch warms the cache and fetches its
    /// existing resources in one call each.
    pub batch_size: usize,
    /// Drafts reconciled concurrently within a sub-batch.
    pub max_concurrency: usize,
    /// Re-fetch and retry cycles after a conflicting write.
    pub conflict_retries: u32,
    /// How deep one drain may chain into further drains.
    pub revisit_limit: u32,
    pub empty_set_policy: EmptySetPolicy,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            batch_size: 30,
            max_concurrency: 8,
            conflict_retries: 2,
            revisit_limit: 10,
            empty_set_policy: EmptySetPolicy::default(),
        }
    }
}

pub type ErrorCallback =
    Arc<dyn Fn(&SyncError, Option<&ResourceDraft>, Option<&CatalogResource>, &[UpdateAction]) + Send + Sync>;
pub type WarningCallback = Arc<dyn Fn(&str, Option<&ResourceDraft>, Option<&CatalogResource>) + Send + Sync>;
pub type BeforeCreateCallback = Arc<dyn Fn(ResourceDraft) -> Option<ResourceDraft> + Send + Sync>;
pub type BeforeUpdateCallback =
    Arc<dyn Fn(Vec<UpdateAction>, &ResourceDraft, &CatalogResource) -> Vec<UpdateAction> + Send + Sync>;

/// Configuration plus the caller's hooks.
///
/// Hooks run inline on the reconciling task. The error and warning
/// callbacks only observe. `before_create` may rewrite the draft or return
/// `None` to skip it. `before_update` may rewrite the action list, and an
/// empty list skips the write.
#[derive(Clone, Default)]
pub struct SyncOptions {
    pub config: SyncConfig,
    pub schemas: CustomTypeSchemas,
    pub cancellation: Option<CancellationToken>,
    error_callback: Option<ErrorCallback>,
    warning_callback: Option<WarningCallback>,
    before_create: Option<BeforeCreateCallback>,
    before_update: Option<BeforeUpdateCallback>,
}

impl SyncOptions {
    pub fn builder() -> SyncOptionsBuilder {
        SyncOptionsBuilder::default()
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancellation
            .as_ref()
            .is_some_and(CancellationToken::is_cancelled)
    }

    pub(crate) fn report_error(
        &self,
        error: &SyncError,
        draft: Option<&ResourceDraft>,
        old: Option<&CatalogResource>,
        actions: &[UpdateAction],
    ) {
        if let Some(callback) = &self.error_callback {
            callback(error, draft, old, actions);
        }
    }

    pub(crate) fn report_warning(&self, message: &str, draft: Option<&ResourceDraft>, old: Option<&CatalogResource>) {
        if let Some(callback) = &self.warning_callback {
            callback(message, draft, old);
        }
    }

    pub(crate) fn before_create(&self, draft: ResourceDraft) -> Option<ResourceDraft> {
        match &self.before_create {
            Some(callback) => callback(draft),
            None => Some(draft),
        }
    }

    pub(crate) fn before_update(
        &self,
        actions: Vec<UpdateAction>,
        draft: &ResourceDraft,
        old: &CatalogResource,
    ) -> Vec<UpdateAction> {
        match &self.before_update {
            Some(callback) => callback(actions, draft, old),
            None => actions,
        }
    }
}

impl fmt::Debug for SyncOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncOptions")
            .field("config", &self.config)
            .field("schemas", &self.schemas)
            .field("cancellable", &self.cancellation.is_some())
            .field("error_callback", &self.error_callback.is_some())
            .field("warning_callback", &self.warning_callback.is_some())
            .field("before_create", &self.before_create.is_some())
            .field("before_update", &self.before_update.is_some())
            .finish()
    }
}

#[derive(Default)]
pub struct SyncOptionsBuilder {
    options: SyncOptions,
}

impl SyncOptionsBuilder {
    pub fn config(mut self, config: SyncConfig) -> Self {
        self.options.config = config;
        self
    }

    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.options.config.batch_size = batch_size;
        self
    }

    pub fn max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.options.config.max_concurrency = max_concurrency;
        self
    }

    pub fn conflict_retries(mut self, retries: u32) -> Self {
        self.options.config.conflict_retries = retries;
        self
    }

    pub fn revisit_limit(mut self, limit: u32) -> Self {
        self.options.config.revisit_limit = limit;
        self
    }

    pub fn empty_set_policy(mut self, policy: EmptySetPolicy) -> Self {
        self.options.config.empty_set_policy = policy;
        self
    }

    pub fn schemas(mut self, schemas: CustomTypeSchemas) -> Self {
        self.options.schemas = schemas;
        self
    }

    pub fn cancellation(mut self, token: CancellationToken) -> Self {
        self.options.cancellation = Some(token);
        self
    }

    pub fn error_callback(
        mut self,
        callback: impl Fn(&SyncError, Option<&ResourceDraft>, Option<&CatalogResource>, &[UpdateAction])
            + Send
            + Sync
            + 'static,
    ) -> Self {
        self.options.error_callback = Some(Arc::new(callback));
        self
    }

    pub fn warning_callback(
        mut self,
        callback: impl Fn(&str, Option<&ResourceDraft>, Option<&CatalogResource>) + Send + Sync + 'static,
    ) -> Self {
        self.options.warning_callback = Some(Arc::new(callback));
        self
    }

    pub fn before_create(
        mut self,
        callback: impl Fn(ResourceDraft) -> Option<ResourceDraft> + Send + Sync + 'static,
    ) -> Self {
        self.options.before_create = Some(Arc::new(callback));
        self
    }

    pub fn before_update(
        mut self,
        callback: impl Fn(Vec<UpdateAction>, &ResourceDraft, &CatalogResource) -> Vec<UpdateAction>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        self.options.before_update = Some(Arc::new(callback));
        self
    }

    /// Zero batch sizes and concurrency limits are raised to one.
    pub fn build(mut self) -> SyncOptions {
        self.options.config.batch_size = self.options.config.batch_size.max(1);
        self.options.config.max_concurrency = self.options.config.max_concurrency.max(1);
        self.options
    }
}
