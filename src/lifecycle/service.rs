// Load, transform, compare-and-swap. The service is the only place that
// touches storage; the controller stays a pure computation.

use std::sync::Arc;
use tracing::{info, warn, Instrument};

use super::controller::{ActionRequest, LifecycleController, Transition};
use crate::config::LifecycleConfig;
use crate::documents::{Charges, Document, DocumentAction, DocumentId, NewDocument};
use crate::error::LifecycleError;
use crate::observability::{lifecycle_metrics, OperationTimer};
use crate::signature::SignaturePad;
use crate::store::DocumentStore;
use crate::telemetry::{create_lifecycle_span, generate_correlation_id};

pub struct LifecycleService<S: DocumentStore + ?Sized> {
    store: Arc<S>,
    controller: LifecycleController,
    retry_on_conflict: bool,
}

impl<S: DocumentStore + ?Sized> LifecycleService<S> {
    pub fn new(store: Arc<S>, controller: LifecycleController) -> Self {
        Self {
            store,
            controller,
            retry_on_conflict: true,
        }
    }

    pub fn from_config(store: Arc<S>, config: &LifecycleConfig) -> Self {
        Self {
            store,
            controller: LifecycleController::from_config(config),
            retry_on_conflict: config.retry_on_conflict,
        }
    }

    pub fn with_retry_on_conflict(mut self, retry: bool) -> Self {
        self.retry_on_conflict = retry;
        self
    }

    pub fn controller(&self) -> &LifecycleController {
        &self.controller
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub async fn create(&self, new: NewDocument) -> Result<Document, LifecycleError> {
        let document = Document::new(new);
        self.store.insert(&document).await?;
        info!(
            document_id = %document.id(),
            kind = %document.kind(),
            total_cents = document.total_amount_cents(),
            "Document created"
        );
        Ok(document)
    }

    pub async fn get(&self, id: &DocumentId) -> Result<Document, LifecycleError> {
        Ok(self.store.fetch(id).await?)
    }

    pub async fn list(&self) -> Result<Vec<Document>, LifecycleError> {
        Ok(self.store.list().await?)
    }

    /// Apply one action against the current stored snapshot.
    ///
    /// Fails with `Conflict` if the request names a stale version or another
    /// writer got in between the read and the write.
    pub async fn execute(&self, request: &ActionRequest) -> Result<Transition, LifecycleError> {
        let correlation_id = generate_correlation_id();
        let span = create_lifecycle_span(
            "execute",
            Some(request.document_id.as_str()),
            Some(&correlation_id),
        );
        async {
            let timer = OperationTimer::new("execute");
            let current = self.store.fetch(&request.document_id).await?;
            let transition = self.controller.apply(&current, request);
            let outcome = self.persist(transition).await;
            timer.finish();
            outcome
        }
        .instrument(span)
        .await
    }

    /// Like [`execute`](Self::execute), but on a conflict refetch once and
    /// re-apply the action to the fresh snapshot.
    pub async fn execute_with_retry(
        &self,
        request: &ActionRequest,
    ) -> Result<Transition, LifecycleError> {
        match self.execute(request).await {
            Err(err) if err.is_conflict() && self.retry_on_conflict => {
                lifecycle_metrics().record_retry();
                warn!(
                    document_id = %request.document_id,
                    action = %request.action,
                    error = %err,
                    "Retrying action against refetched document"
                );
                let rebased = ActionRequest {
                    expected_version: None,
                    ..request.clone()
                };
                self.execute(&rebased).await
            }
            other => other,
        }
    }

    /// Validate the pad and apply the signing action it was captured for
    pub async fn capture_and_execute(
        &self,
        id: &DocumentId,
        action: DocumentAction,
        pad: &SignaturePad,
    ) -> Result<Transition, LifecycleError> {
        let current = self.store.fetch(id).await?;
        let transition = self.controller.capture_and_apply(&current, action, pad);
        self.persist(transition).await
    }

    pub async fn revise_charges(
        &self,
        id: &DocumentId,
        charges: Charges,
        expected_version: Option<u64>,
    ) -> Result<Transition, LifecycleError> {
        let current = self.store.fetch(id).await?;
        if let Some(expected) = expected_version {
            if expected != current.version() {
                lifecycle_metrics().record_conflict();
                return Err(LifecycleError::Conflict {
                    id: id.clone(),
                    expected,
                    found: current.version(),
                });
            }
        }
        let transition = self.controller.revise_charges(&current, charges);
        self.persist(transition).await
    }

    async fn persist(
        &self,
        transition: Result<Transition, LifecycleError>,
    ) -> Result<Transition, LifecycleError> {
        let metrics = lifecycle_metrics();
        let transition = match transition {
            Ok(transition) => transition,
            Err(err) => {
                match &err {
                    LifecycleError::Conflict { .. } => metrics.record_conflict(),
                    LifecycleError::Capture(_) => metrics.record_capture_rejected(),
                    _ => metrics.record_rejection(),
                }
                return Err(err);
            }
        };

        if let Err(err) = self
            .store
            .compare_and_swap(&transition.document, transition.previous_version)
            .await
        {
            let err = LifecycleError::from(err);
            if err.is_conflict() {
                metrics.record_conflict();
            }
            return Err(err);
        }

        metrics.record_transition();
        info!(
            document_id = %transition.document.id(),
            status = %transition.document.status(),
            version = transition.document.version(),
            "Document persisted"
        );
        Ok(transition)
    }
}
