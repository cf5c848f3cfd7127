use super::errors::{DispatchError, ScanFault, StoreError};
use super::events::ScanEvent;
use super::models::{DispatchRequest, Scan, ScanId, ScanStatus, TaskContext, ToolId};
use super::state::{Applied, Transition};
use super::store::{ScanQuery, ScanStore};
use super::validator::validate;
use crate::executors::command::{ProcessOutput, ProcessSupervisor};
use crate::output::schema::{ExecutionMeta, Parsed, ScanEnvelope};
use crate::plugins::registry::AdapterRegistry;
use crate::plugins::types::ToolAdapter;
use crate::utils::time::utc_timestamp;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc, watch};

const INTERRUPTED_MESSAGE: &str = "interrupted: the worker running this scan exited before it finished";

/// Drives scans through their lifecycle.
///
/// Shared by every worker of the pool. The only mutable state it owns is the
/// table of cancellation senders for scans running in this process; the
/// table lock also serialises dispatch against cancellation so a scan
/// cancelled while PENDING is never started.
pub struct Orchestrator {
    store: Arc<dyn ScanStore>,
    registry: Arc<AdapterRegistry>,
    supervisor: ProcessSupervisor,
    running: Mutex<HashMap<ScanId, watch::Sender<bool>>>,
    events: Option<mpsc::UnboundedSender<ScanEvent>>,
}

impl Orchestrator {
    pub fn new(store: Arc<dyn ScanStore>, registry: Arc<AdapterRegistry>) -> Self {
        Self {
            store,
            registry,
            supervisor: ProcessSupervisor::new(),
            running: Mutex::new(HashMap::new()),
            events: None,
        }
    }

    pub fn with_events(mut self, events: mpsc::UnboundedSender<ScanEvent>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn store(&self) -> &Arc<dyn ScanStore> {
        &self.store
    }

    pub fn registry(&self) -> &AdapterRegistry {
        &self.registry
    }

    fn emit(&self, event: ScanEvent) {
        if let Some(events) = &self.events {
            // observers may come and go
            let _ = events.send(event);
        }
    }

    /// Checks a request before it is queued: the tool is known, the scan
    /// exists, is still PENDING and was created for that tool.
    pub async fn accept(&self, request: &DispatchRequest) -> Result<(), DispatchError> {
        let adapter = self.registry.resolve(&request.tool)?;

        let scan = match self.store.get(request.scan_id).await {
            Ok(scan) => scan,
            Err(StoreError::NotFound(id)) => return Err(DispatchError::ScanNotFound(id)),
            Err(e) => return Err(e.into()),
        };

        if scan.status != ScanStatus::Pending {
            return Err(DispatchError::NotPending {
                id: scan.id,
                status: scan.status,
            });
        }

        if scan.tool.parse::<ToolId>().ok() != Some(adapter.tool()) {
            return Err(DispatchError::ToolMismatch {
                id: scan.id,
                expected: scan.tool,
                requested: request.tool.clone(),
            });
        }

        Ok(())
    }

    /// Runs one scan to a terminal state.
    ///
    /// An unknown tool is rejected without touching the record. Once the scan
    /// is RUNNING every fault is folded into the record as FAILED (or
    /// CANCELLED) and the stored scan is returned; `Err` then only means the
    /// store itself failed.
    pub async fn run(&self, ctx: &TaskContext, request: DispatchRequest) -> Result<Scan, DispatchError> {
        let adapter = self.registry.resolve(&request.tool)?;
        let id = request.scan_id;

        let cancel = match self.start(ctx, id).await? {
            Started::Running(cancel) => cancel,
            Started::AlreadyTerminal(scan) => {
                tracing::info!(
                    "[worker {}] scan {} is already {}, nothing to run",
                    ctx.worker,
                    id,
                    scan.status
                );
                return Ok(scan);
            }
        };

        tracing::info!(
            "[worker {}] scan {} started: {} against {} (task {})",
            ctx.worker,
            id,
            adapter.tool(),
            request.target,
            ctx.task_ref
        );
        self.emit(ScanEvent::Started {
            id,
            tool: adapter.tool().to_string(),
            task_ref: ctx.task_ref.clone(),
        });

        let outcome = self.execute(adapter, &request, cancel).await;
        let (transition, event) = self.conclude(adapter, &request, outcome);
        let recorded = self.store.apply(id, transition).await;
        // deregistered only once the terminal state is on record, so a
        // concurrent cancel never mistakes this scan for a foreign one
        self.running.lock().await.remove(&id);

        match recorded {
            Ok((scan, applied)) => {
                if applied == Applied::Changed {
                    self.emit(event);
                }
                Ok(scan)
            }
            Err(StoreError::InvalidTransition { from, to, .. }) => {
                tracing::warn!("scan {} moved to {} elsewhere, dropping {} result", id, from, to);
                Ok(self.store.get(id).await?)
            }
            Err(e) => {
                tracing::error!("scan {} finished but could not be recorded: {}", id, e);
                Err(e.into())
            }
        }
    }

    /// Applies PENDING -> RUNNING and registers the cancellation channel,
    /// both under the table lock.
    async fn start(&self, ctx: &TaskContext, id: ScanId) -> Result<Started, DispatchError> {
        let mut running = self.running.lock().await;

        let transition = Transition::Start {
            task_ref: ctx.task_ref.clone(),
            started_at: Utc::now(),
        };

        match self.store.apply(id, transition).await {
            Ok(_) => {
                let (tx, rx) = watch::channel(false);
                running.insert(id, tx);
                Ok(Started::Running(rx))
            }
            Err(StoreError::InvalidTransition { from, .. }) if from.is_terminal() => {
                Ok(Started::AlreadyTerminal(self.store.get(id).await?))
            }
            Err(StoreError::InvalidTransition { from, .. }) => {
                Err(DispatchError::NotPending { id, status: from })
            }
            Err(StoreError::NotFound(id)) => Err(DispatchError::ScanNotFound(id)),
            Err(e) => Err(e.into()),
        }
    }

    async fn execute(
        &self,
        adapter: &dyn ToolAdapter,
        request: &DispatchRequest,
        cancel: watch::Receiver<bool>,
    ) -> Result<(Parsed, ProcessOutput), ScanFault> {
        if !validate(&request.target) {
            return Err(ScanFault::InvalidTarget(request.target.clone()));
        }

        let argv = adapter.build_command(&request.target, &request.options);
        let output = self
            .supervisor
            .run(adapter.binding(), &argv, Some(cancel))
            .await?;
        let parsed = adapter.parse_output(&output.stdout, &output.stderr);

        Ok((parsed, output))
    }

    fn conclude(
        &self,
        adapter: &dyn ToolAdapter,
        request: &DispatchRequest,
        outcome: Result<(Parsed, ProcessOutput), ScanFault>,
    ) -> (Transition, ScanEvent) {
        let id = request.scan_id;
        let completed_at = Utc::now();

        match outcome {
            Ok((parsed, output)) => {
                let degraded = parsed.is_degraded();
                if degraded {
                    tracing::warn!(
                        "scan {}: {} output was not fully structured, kept best-effort records",
                        id,
                        adapter.tool()
                    );
                }

                let meta = ExecutionMeta {
                    tool: adapter.tool().to_string(),
                    target: request.target.clone(),
                    return_code: output.exit_code,
                    timestamp: utc_timestamp(completed_at),
                };
                let records = parsed.result.record_count();
                tracing::info!(
                    "scan {} completed: {} records, exit code {}",
                    id,
                    records,
                    output.exit_code
                );

                (
                    Transition::Complete {
                        results: ScanEnvelope {
                            result: parsed.result,
                            meta: meta.clone(),
                        },
                        raw_meta: meta,
                        degraded,
                        completed_at,
                    },
                    ScanEvent::Completed {
                        id,
                        records,
                        degraded,
                    },
                )
            }
            Err(ScanFault::Cancelled { .. }) => {
                tracing::info!("scan {} cancelled while running", id);
                (Transition::Cancel { completed_at }, ScanEvent::Cancelled { id })
            }
            Err(fault) => {
                tracing::error!("scan {} failed ({}): {}", id, fault.kind(), fault);
                let message = fault.to_string();
                (
                    Transition::Fail {
                        message: message.clone(),
                        completed_at,
                    },
                    ScanEvent::Failed { id, message },
                )
            }
        }
    }

    /// Cancels a scan. PENDING scans are moved to CANCELLED directly; RUNNING
    /// scans owned by this process are signalled and recorded as CANCELLED by
    /// their worker once the process tree is gone. Terminal scans are
    /// returned unchanged.
    pub async fn cancel(&self, id: ScanId) -> Result<Scan, DispatchError> {
        let running = self.running.lock().await;

        if let Some(signal) = running.get(&id) {
            let _ = signal.send(true);
            tracing::info!("cancellation requested for running scan {}", id);
            drop(running);
            return Ok(self.store.get(id).await?);
        }

        let scan = match self.store.get(id).await {
            Ok(scan) => scan,
            Err(StoreError::NotFound(id)) => return Err(DispatchError::ScanNotFound(id)),
            Err(e) => return Err(e.into()),
        };

        match scan.status {
            ScanStatus::Pending => {
                let (scan, applied) = self
                    .store
                    .apply(id, Transition::Cancel {
                        completed_at: Utc::now(),
                    })
                    .await?;
                if applied == Applied::Changed {
                    tracing::info!("scan {} cancelled before dispatch", id);
                    self.emit(ScanEvent::Cancelled { id });
                }
                Ok(scan)
            }
            ScanStatus::Running => Err(DispatchError::RunningElsewhere(id)),
            _ => Ok(scan),
        }
    }

    /// Fails every RUNNING scan that no worker of this process owns. Meant
    /// for startup, after a previous process died mid-scan.
    pub async fn recover_interrupted(&self) -> Result<Vec<ScanId>, StoreError> {
        let running = self.running.lock().await;
        let stale = self
            .store
            .list(&ScanQuery::default().with_status(ScanStatus::Running))
            .await?;

        let mut recovered = Vec::new();
        for scan in stale.scans.into_iter().filter(|s| !running.contains_key(&s.id)) {
            let transition = Transition::Fail {
                message: INTERRUPTED_MESSAGE.to_string(),
                completed_at: Utc::now(),
            };
            match self.store.apply(scan.id, transition).await {
                Ok(_) => {
                    tracing::warn!("scan {} was left RUNNING, marked FAILED", scan.id);
                    self.emit(ScanEvent::Failed {
                        id: scan.id,
                        message: INTERRUPTED_MESSAGE.to_string(),
                    });
                    recovered.push(scan.id);
                }
                Err(StoreError::InvalidTransition { .. }) => {}
                Err(e) => return Err(e),
            }
        }

        Ok(recovered)
    }

    pub async fn running_count(&self) -> usize {
        self.running.lock().await.len()
    }
}

enum Started {
    Running(watch::Receiver<bool>),
    AlreadyTerminal(Scan),
}
