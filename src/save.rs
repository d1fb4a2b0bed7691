//! Save-operation pipeline
//!
//! A create or update is an ordered list of [`SaveOperation`] steps sharing a
//! [`SaveContext`]. Each step first prepares its request from the desired
//! spec (and the host's change list on updates) and decides whether it has
//! anything to send; only steps that report updates are executed.
//!
//! The pipeline is fail-fast. When a step's remote call fails, nothing after
//! it runs and the caller receives the context as it stood before that step,
//! together with the names of the steps that did complete. Earlier steps are
//! never rolled back.

use crate::aws::api::RemoteCall;
use crate::error::ProviderError;
use crate::spec::changes::ResourceChanges;
use async_trait::async_trait;
use serde_json::Value;

/// State shared between the steps of one pipeline run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SaveContext<D> {
    upstream_id: Option<String>,
    pub data: D,
}

impl<D> SaveContext<D> {
    pub fn new(data: D) -> Self {
        Self {
            upstream_id: None,
            data,
        }
    }

    /// Identifier assigned by the remote API, once known
    pub fn upstream_id(&self) -> Option<&str> {
        self.upstream_id.as_deref()
    }

    /// Record the upstream identifier. Write-once: a second call is ignored
    /// and returns false.
    pub fn set_upstream_id(&mut self, id: impl Into<String>) -> bool {
        let id = id.into();
        if let Some(existing) = &self.upstream_id {
            tracing::error!(
                "Upstream ID already set to {}; ignoring attempt to set {}",
                existing,
                id
            );
            return false;
        }
        self.upstream_id = Some(id);
        true
    }
}

#[async_trait]
pub trait SaveOperation<D: Send + Sync>: Send + Sync {
    /// Step name, normally the remote operation it performs
    fn name(&self) -> &'static str;

    /// Build the outbound request. Returns whether there is anything to send.
    ///
    /// Errors raised here are precondition failures; no remote call has been
    /// made for this step.
    fn prepare(
        &mut self,
        context: &SaveContext<D>,
        spec: &Value,
        changes: Option<&ResourceChanges>,
    ) -> Result<bool, ProviderError>;

    /// Perform the remote call prepared earlier
    async fn execute(
        &mut self,
        context: &mut SaveContext<D>,
        remote: &RemoteCall<'_>,
    ) -> Result<(), ProviderError>;
}

pub type BoxedOperation<D> = Box<dyn SaveOperation<D>>;

#[derive(Debug)]
pub struct SaveOutcome<D> {
    /// True when at least one step executed
    pub applied: bool,
    pub context: SaveContext<D>,
    pub completed: Vec<&'static str>,
}

#[derive(Debug)]
pub struct SaveFailure<D> {
    pub step: &'static str,
    pub completed: Vec<&'static str>,
    /// Context as it stood before the failing step
    pub context: SaveContext<D>,
    pub error: ProviderError,
}

impl<D> SaveFailure<D> {
    /// Convert into a [`ProviderError::PartialSave`] naming the resource
    pub fn into_error(self, resource: impl Into<String>) -> ProviderError {
        ProviderError::PartialSave {
            resource: resource.into(),
            step: self.step,
            completed: self.completed,
            source: Box::new(self.error),
        }
    }
}

/// Run steps strictly in order, stopping at the first failure
pub async fn run_save_operations<D>(
    mut context: SaveContext<D>,
    operations: Vec<BoxedOperation<D>>,
    spec: &Value,
    changes: Option<&ResourceChanges>,
    remote: &RemoteCall<'_>,
) -> Result<SaveOutcome<D>, SaveFailure<D>>
where
    D: Clone + Send + Sync,
{
    let mut completed = Vec::new();

    for mut operation in operations {
        let step = operation.name();

        if remote.is_cancelled() {
            return Err(SaveFailure {
                step,
                completed,
                context,
                error: ProviderError::Cancelled { operation: step },
            });
        }

        let has_updates = match operation.prepare(&context, spec, changes) {
            Ok(has_updates) => has_updates,
            Err(error) => {
                return Err(SaveFailure {
                    step,
                    completed,
                    context,
                    error,
                })
            },
        };

        if !has_updates {
            tracing::debug!("Skipping {}: nothing to update", step);
            continue;
        }

        let before = context.clone();
        if let Err(error) = operation.execute(&mut context, remote).await {
            tracing::warn!(
                "Save step {} failed after [{}]: {}",
                step,
                completed.join(", "),
                error
            );
            return Err(SaveFailure {
                step,
                completed,
                context: before,
                error,
            });
        }

        tracing::debug!("Completed {}", step);
        completed.push(step);
    }

    Ok(SaveOutcome {
        applied: !completed.is_empty(),
        context,
        completed,
    })
}
