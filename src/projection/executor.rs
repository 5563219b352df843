// Copyright (c) 2025 - Cowboy AI, Inc.
//! Summary Writers
//!
//! Executors that interpret [`SummaryEffect`]s produced by the pure summary
//! projection and perform the I/O.
//!
//! ```text
//! plan_unit_sync()  ── Effects ──>  SummaryWriter::execute()
//!   (pure)                              (async I/O)
//! ```
//!
//! The summary is a rebuildable cache. Writers keep the last summary they
//! wrote so the next plan can be diffed against it.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::pure::{ExtensionSummary, LogLevel, SummaryEffect, UnitSummary};
use crate::errors::EngineError;
use crate::nats::NatsClient;
use crate::subjects::{summary_subject, SummaryKind};

/// Errors that can occur while writing summaries
#[derive(Debug, thiserror::Error)]
pub enum ExecutorError {
    #[error("Summary write failed: {0}")]
    WriteFailed(String),

    #[error("Summary serialization failed: {0}")]
    Serialization(String),
}

/// Destination for denormalized summaries
#[async_trait]
pub trait SummaryWriter: Send + Sync {
    /// Last summary written for a unit
    async fn unit_summary(&self, unit_id: Uuid) -> Result<Option<UnitSummary>, ExecutorError>;

    /// Last summary written for an extension
    async fn extension_summary(
        &self,
        extension_id: Uuid,
    ) -> Result<Option<ExtensionSummary>, ExecutorError>;

    /// Execute a batch of effects in order; the first failure stops the batch
    async fn execute(&self, effects: Vec<SummaryEffect>) -> Result<(), ExecutorError>;
}

fn log_effect(level: LogLevel, message: &str) {
    match level {
        LogLevel::Debug => debug!("{}", message),
        LogLevel::Info => info!("{}", message),
        LogLevel::Warn => warn!("{}", message),
    }
}

/// In-process summary cache
///
/// Counts the writes it performs, which makes idempotency observable.
#[derive(Debug, Default)]
pub struct InMemorySummaryStore {
    units: RwLock<HashMap<Uuid, UnitSummary>>,
    extensions: RwLock<HashMap<Uuid, ExtensionSummary>>,
    writes: AtomicUsize,
}

impl InMemorySummaryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of summary writes performed so far
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Every unit summary, keyed by unit id
    pub async fn unit_summaries(&self) -> HashMap<Uuid, UnitSummary> {
        self.units.read().await.clone()
    }
}

#[async_trait]
impl SummaryWriter for InMemorySummaryStore {
    async fn unit_summary(&self, unit_id: Uuid) -> Result<Option<UnitSummary>, ExecutorError> {
        Ok(self.units.read().await.get(&unit_id).cloned())
    }

    async fn extension_summary(
        &self,
        extension_id: Uuid,
    ) -> Result<Option<ExtensionSummary>, ExecutorError> {
        Ok(self.extensions.read().await.get(&extension_id).cloned())
    }

    async fn execute(&self, effects: Vec<SummaryEffect>) -> Result<(), ExecutorError> {
        for effect in effects {
            match effect {
                SummaryEffect::WriteUnit(summary) => {
                    self.units.write().await.insert(summary.unit_id, summary);
                    self.writes.fetch_add(1, Ordering::SeqCst);
                }
                SummaryEffect::WriteExtension(summary) => {
                    self.extensions
                        .write()
                        .await
                        .insert(summary.extension_id, summary);
                    self.writes.fetch_add(1, Ordering::SeqCst);
                }
                SummaryEffect::Log { level, message } => log_effect(level, &message),
            }
        }
        Ok(())
    }
}

/// Publishes summaries to NATS for downstream readers
///
/// Subjects are `{prefix}.unit.{id}` and `{prefix}.extension.{id}`. The last
/// published summaries are cached locally for diffing.
pub struct NatsSummaryPublisher {
    client: NatsClient,
    prefix: String,
    published: InMemorySummaryStore,
}

impl NatsSummaryPublisher {
    pub fn new(client: NatsClient, prefix: impl Into<String>) -> Self {
        Self {
            client,
            prefix: prefix.into(),
            published: InMemorySummaryStore::new(),
        }
    }

    async fn publish<T: serde::Serialize>(
        &self,
        kind: SummaryKind,
        id: Uuid,
        summary: &T,
    ) -> Result<(), ExecutorError> {
        let subject = summary_subject(&self.prefix, kind, id);
        self.client
            .publish(&subject, summary)
            .await
            .map_err(|e| match e {
                EngineError::Serialization(message) => ExecutorError::Serialization(message),
                other => ExecutorError::WriteFailed(other.to_string()),
            })?;

        debug!(subject = %subject, "Published summary");
        Ok(())
    }
}

#[async_trait]
impl SummaryWriter for NatsSummaryPublisher {
    async fn unit_summary(&self, unit_id: Uuid) -> Result<Option<UnitSummary>, ExecutorError> {
        self.published.unit_summary(unit_id).await
    }

    async fn extension_summary(
        &self,
        extension_id: Uuid,
    ) -> Result<Option<ExtensionSummary>, ExecutorError> {
        self.published.extension_summary(extension_id).await
    }

    async fn execute(&self, effects: Vec<SummaryEffect>) -> Result<(), ExecutorError> {
        for effect in effects {
            match &effect {
                SummaryEffect::WriteUnit(summary) => {
                    self.publish(SummaryKind::Unit, summary.unit_id, summary)
                        .await?;
                }
                SummaryEffect::WriteExtension(summary) => {
                    self.publish(SummaryKind::Extension, summary.extension_id, summary)
                        .await?;
                }
                SummaryEffect::Log { .. } => {}
            }
            self.published.execute(vec![effect]).await?;
        }
        Ok(())
    }
}
