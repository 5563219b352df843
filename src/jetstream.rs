// Copyright (c) 2025 - Cowboy AI, Inc.

//! JetStream configuration and setup for the allocation event log
//!
//! One stream captures both channels (`equipment.events.>` and
//! `equipment.approvals.>`). Every message body is a [`StoredFact`].
//!
//! # Example
//!
//! ```rust,no_run
//! use cim_equipment_allocation::jetstream::{create_allocation_stream, JetStreamConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = async_nats::connect("nats://localhost:4222").await?;
//!     let jetstream = async_nats::jetstream::new(client);
//!
//!     let stream = create_allocation_stream(jetstream, JetStreamConfig::default()).await?;
//!     Ok(())
//! }
//! ```

use async_nats::jetstream::{self, stream::Stream};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

use crate::errors::{EngineError, EngineResult};
use crate::events::{ApprovalDecision, EventRecord};
use crate::subjects::{approval_subject, event_subject, stream_subjects};

/// Configuration for the allocation stream
#[derive(Debug, Clone)]
pub struct JetStreamConfig {
    pub stream_name: String,

    /// Subjects the stream captures
    pub subjects: Vec<String>,

    /// Maximum age of messages; the log is the only authority, so keep it long
    pub max_age: Duration,

    pub max_bytes: i64,

    pub storage: StorageType,

    /// Number of replicas (for clustered NATS)
    pub replicas: usize,
}

impl Default for JetStreamConfig {
    fn default() -> Self {
        Self {
            stream_name: "EQUIPMENT_ALLOCATION".to_string(),
            subjects: stream_subjects(),
            max_age: Duration::from_secs(10 * 365 * 24 * 60 * 60),
            max_bytes: 10 * 1024 * 1024 * 1024, // 10 GB
            storage: StorageType::File,
            replicas: 1,
        }
    }
}

impl JetStreamConfig {
    pub fn named(stream_name: impl Into<String>) -> Self {
        Self {
            stream_name: stream_name.into(),
            ..Self::default()
        }
    }
}

/// Storage type for JetStream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageType {
    /// File-based storage (persistent across restarts)
    File,
    /// Memory-based storage (faster, but lost on restart)
    Memory,
}

/// What a stored message records
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "fact", content = "body", rename_all = "snake_case")]
pub enum FactBody {
    Event(EventRecord),
    Approval(ApprovalDecision),
}

/// Stored message envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredFact {
    /// Unique fact ID (UUID v7 for time-ordering)
    pub fact_id: Uuid,

    /// Unit the fact concerns
    pub unit_id: Uuid,

    /// When the fact was written to the stream
    pub stored_at: DateTime<Utc>,

    pub body: FactBody,

    /// Optional metadata (e.g., user context, source system)
    pub metadata: Option<serde_json::Value>,
}

impl StoredFact {
    pub fn event(event: EventRecord, stored_at: DateTime<Utc>) -> Self {
        Self {
            fact_id: Uuid::now_v7(),
            unit_id: event.unit_id,
            stored_at,
            body: FactBody::Event(event),
            metadata: None,
        }
    }

    pub fn approval(decision: ApprovalDecision, stored_at: DateTime<Utc>) -> Self {
        Self {
            fact_id: Uuid::now_v7(),
            unit_id: decision.unit_id,
            stored_at,
            body: FactBody::Approval(decision),
            metadata: None,
        }
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Subject the fact is published on
    pub fn subject(&self) -> String {
        match &self.body {
            FactBody::Event(event) => event_subject(event.unit_id, event.event_type()),
            FactBody::Approval(decision) => approval_subject(decision.unit_id),
        }
    }
}

/// Create the allocation stream, or fetch it if it exists
pub async fn create_allocation_stream(
    jetstream: jetstream::Context,
    config: JetStreamConfig,
) -> EngineResult<Stream> {
    let storage = match config.storage {
        StorageType::File => jetstream::stream::StorageType::File,
        StorageType::Memory => jetstream::stream::StorageType::Memory,
    };

    let stream_config = jetstream::stream::Config {
        name: config.stream_name.clone(),
        subjects: config.subjects,
        max_age: config.max_age,
        max_bytes: config.max_bytes,
        storage,
        num_replicas: config.replicas,
        retention: jetstream::stream::RetentionPolicy::Limits,
        ..Default::default()
    };

    jetstream
        .get_or_create_stream(stream_config)
        .await
        .map_err(|e| EngineError::Nats(e.to_string()))
}
