pub mod ddl;

pub use ddl::{index_name, quote_ident, quote_literal, DdlBuilder, IndexKind};

use crate::config::ProvisionerConfig;
use crate::error::CoreResult;
use crate::schema::{Column, ColumnType};
use crate::values::is_uuid;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tokio::task::JoinHandle;

/// Executes one DDL statement against the shared database.
///
/// Implementations must not wrap statements in a transaction when the
/// provisioner is configured for concurrent index builds.
#[async_trait]
pub trait DdlExecutor: Send + Sync {
    async fn execute(&self, statement: &str) -> CoreResult<()>;
}

/// Memo key: one provisioning attempt per column and type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IndexKey {
    pub table_id: String,
    pub column_id: String,
    pub column_type: ColumnType,
}

impl IndexKey {
    pub fn new(table_id: &str, column_id: &str, column_type: ColumnType) -> Self {
        Self {
            table_id: table_id.to_owned(),
            column_id: column_id.to_owned(),
            column_type,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisionState {
    InFlight,
    Succeeded,
    Failed,
}

/// What one `ensure_column_indexes` call did. Never an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisionOutcome {
    /// Table or column id is not a hyphenated UUID; nothing issued.
    InvalidId,
    /// Provisioning is switched off by configuration.
    Disabled,
    /// This key was already attempted by this provisioner.
    AlreadyAttempted,
    Provisioned,
    /// At least one statement failed; the key stays memoized.
    Failed,
}

/// Lazily ensures per-column expression indexes exist on the row store.
///
/// Memo state lives on the instance, so tests get isolated provisioners
/// while production shares one `Arc<IndexProvisioner>` per process. The memo
/// only saves round trips: every statement is `IF NOT EXISTS`, so other
/// processes racing on the same index are harmless.
pub struct IndexProvisioner {
    executor: Arc<dyn DdlExecutor>,
    config: ProvisionerConfig,
    attempts: Mutex<HashMap<IndexKey, ProvisionState>>,
    trigram_ready: OnceCell<bool>,
}

impl IndexProvisioner {
    pub fn new(executor: Arc<dyn DdlExecutor>, config: ProvisionerConfig) -> Self {
        Self {
            executor,
            config,
            attempts: Mutex::new(HashMap::new()),
            trigram_ready: OnceCell::new(),
        }
    }

    pub fn config(&self) -> &ProvisionerConfig {
        &self.config
    }

    /// State of a key, if it was ever attempted.
    pub fn state(&self, key: &IndexKey) -> Option<ProvisionState> {
        self.attempts.lock().get(key).copied()
    }

    /// Number of keys attempted so far.
    pub fn attempted_count(&self) -> usize {
        self.attempts.lock().len()
    }

    /// Ensure the indexes backing `column_type` filters and sorts exist for
    /// one column. At most one attempt per key; failures are logged and
    /// remembered, never returned.
    pub async fn ensure_column_indexes(
        &self,
        table_id: &str,
        column_id: &str,
        column_type: ColumnType,
    ) -> ProvisionOutcome {
        if !self.config.enabled {
            return ProvisionOutcome::Disabled;
        }
        if !is_uuid(table_id) || !is_uuid(column_id) {
            tracing::debug!(table_id, column_id, "skipping index provisioning for non-uuid id");
            return ProvisionOutcome::InvalidId;
        }

        let key = IndexKey::new(table_id, column_id, column_type);
        {
            let mut attempts = self.attempts.lock();
            if attempts.contains_key(&key) {
                tracing::debug!(table_id, column_id, "index provisioning already attempted");
                return ProvisionOutcome::AlreadyAttempted;
            }
            attempts.insert(key.clone(), ProvisionState::InFlight);
        }

        if column_type == ColumnType::Text {
            self.ensure_trigram().await;
        }

        let builder = DdlBuilder::new(&self.config.layout, self.config.concurrently);
        let mut failed = false;
        for statement in builder.statements_for(column_type, table_id, column_id) {
            if let Err(err) = self.executor.execute(&statement).await {
                failed = true;
                tracing::warn!(
                    error = %err,
                    table_id,
                    column_id,
                    column_type = %column_type,
                    "column index provisioning failed"
                );
            }
        }

        let (state, outcome) = if failed {
            (ProvisionState::Failed, ProvisionOutcome::Failed)
        } else {
            tracing::info!(
                table_id,
                column_id,
                column_type = %column_type,
                "column indexes provisioned"
            );
            (ProvisionState::Succeeded, ProvisionOutcome::Provisioned)
        };
        self.attempts.lock().insert(key, state);
        outcome
    }

    /// One attempt per provisioner to enable the trigram extension. Text
    /// index statements still run if it fails; the extension may already be
    /// installed by someone with more privileges.
    async fn ensure_trigram(&self) -> bool {
        *self
            .trigram_ready
            .get_or_init(|| async {
                match self.executor.execute(ddl::ENABLE_TRIGRAM_SQL).await {
                    Ok(()) => true,
                    Err(err) => {
                        tracing::warn!(error = %err, "enabling pg_trgm failed");
                        false
                    }
                }
            })
            .await
    }

    /// Fire-and-forget form of [`Self::ensure_column_indexes`]. The handle
    /// may be dropped; the task keeps running and cannot fail the caller.
    pub fn spawn_column_indexes(
        self: &Arc<Self>,
        table_id: &str,
        column_id: &str,
        column_type: ColumnType,
    ) -> JoinHandle<ProvisionOutcome> {
        let provisioner = Arc::clone(self);
        let table_id = table_id.to_owned();
        let column_id = column_id.to_owned();
        tokio::spawn(async move {
            provisioner
                .ensure_column_indexes(&table_id, &column_id, column_type)
                .await
        })
    }

    /// Dispatch provisioning for every column without waiting on any of it.
    pub fn spawn_table_indexes(
        self: &Arc<Self>,
        columns: &[Column],
    ) -> Vec<JoinHandle<ProvisionOutcome>> {
        columns
            .iter()
            .map(|column| {
                self.spawn_column_indexes(&column.table_id, &column.id, column.column_type)
            })
            .collect()
    }
}
