// Copyright (c) 2025 - Cowboy AI, Inc.
//! NATS JetStream Event Store Implementation
//!
//! Records and approval decisions are published as [`StoredFact`]s on the
//! allocation stream. Reads replay the relevant subjects through an ephemeral
//! pull consumer and fold the facts into records with their latest decision
//! applied.
//!
//! Version checks read the stream and then publish; unlike the in-memory
//! store the check and the write are not one atomic step.

use async_nats::jetstream::{self, stream::Stream};
use async_trait::async_trait;
use chrono::Utc;
use futures::StreamExt;
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

use super::memory::FactLog;
use super::{EventFilter, EventStore, StreamId, VersionCheck};
use crate::errors::{EngineError, EngineResult};
use crate::events::{ApprovalDecision, EventRecord};
use crate::jetstream::{create_allocation_stream, JetStreamConfig, StoredFact};
use crate::subjects::{approval_subject, channel_wildcard, unit_events_filter, Channel};

/// Messages fetched per pull request
const BATCH_SIZE: usize = 10000;

/// How long a pull waits for more messages before the read is considered complete
const FETCH_EXPIRY: Duration = Duration::from_secs(2);

/// NATS JetStream-backed event store
///
/// # Example
///
/// ```rust,no_run
/// use cim_equipment_allocation::event_store::NatsEventStore;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = NatsEventStore::connect("nats://localhost:4222").await?;
///     Ok(())
/// }
/// ```
pub struct NatsEventStore {
    jetstream: jetstream::Context,
    stream: Stream,
}

impl NatsEventStore {
    /// Connect to NATS and create or get the allocation stream
    pub async fn connect(nats_url: &str) -> EngineResult<Self> {
        Self::connect_with_config(nats_url, JetStreamConfig::default()).await
    }

    /// Connect with custom configuration
    pub async fn connect_with_config(nats_url: &str, config: JetStreamConfig) -> EngineResult<Self> {
        let client = async_nats::connect(nats_url)
            .await
            .map_err(|e| EngineError::Nats(e.to_string()))?;
        Self::from_client(client, config).await
    }

    /// Use an existing connection
    pub async fn from_client(client: async_nats::Client, config: JetStreamConfig) -> EngineResult<Self> {
        let jetstream = jetstream::new(client);
        let stream_name = config.stream_name.clone();
        let stream = create_allocation_stream(jetstream.clone(), config).await?;
        info!(stream = %stream_name, "Allocation event store ready");

        Ok(Self { jetstream, stream })
    }

    /// Replay every fact on one subject filter, in stream order
    async fn read_facts(&self, filter_subject: String) -> EngineResult<Vec<StoredFact>> {
        let consumer = self
            .stream
            .create_consumer(jetstream::consumer::pull::Config {
                filter_subject: filter_subject.clone(),
                ..Default::default()
            })
            .await
            .map_err(|e| EngineError::Nats(e.to_string()))?;

        let mut facts = Vec::new();

        loop {
            let messages_result = consumer
                .fetch()
                .max_messages(BATCH_SIZE)
                .expires(FETCH_EXPIRY)
                .messages()
                .await;

            // An expired pull with nothing to deliver means the subject is drained.
            let mut messages = match messages_result {
                Ok(msgs) => msgs,
                Err(e) => {
                    let err_msg = e.to_string().to_lowercase();
                    if err_msg.contains("timeout") || err_msg.contains("timed out") || err_msg.contains("no messages") {
                        break;
                    }
                    return Err(EngineError::Nats(e.to_string()));
                }
            };

            let mut batch_count = 0;

            while let Some(message) = messages.next().await {
                let msg = message.map_err(|e| EngineError::Nats(e.to_string()))?;

                let fact: StoredFact = serde_json::from_slice(&msg.payload)
                    .map_err(|e| EngineError::Store(format!("malformed fact on {}: {}", msg.subject, e)))?;
                facts.push(fact);

                msg.ack().await.map_err(|e| EngineError::Nats(e.to_string()))?;
                batch_count += 1;
            }

            if batch_count < BATCH_SIZE {
                break;
            }
        }

        debug!(filter = %filter_subject, count = facts.len(), "Replayed facts");
        Ok(facts)
    }

    /// Folded view of one unit's events and decisions
    async fn unit_log(&self, unit_id: Uuid) -> EngineResult<FactLog> {
        let mut facts = self.read_facts(unit_events_filter(unit_id)).await?;
        facts.extend(self.read_facts(approval_subject(unit_id)).await?);
        Ok(FactLog::from_facts(facts))
    }

    /// Folded view of the whole log
    async fn full_log(&self) -> EngineResult<FactLog> {
        let mut facts = self.read_facts(channel_wildcard(Channel::Events)).await?;
        facts.extend(self.read_facts(channel_wildcard(Channel::Approvals)).await?);
        Ok(FactLog::from_facts(facts))
    }

    /// Smallest view that can answer for a stream
    async fn log_for(&self, stream: StreamId) -> EngineResult<FactLog> {
        match stream {
            StreamId::Unit(unit_id) => self.unit_log(unit_id).await,
            StreamId::Extension(_) => self.full_log().await,
        }
    }

    async fn publish(&self, fact: &StoredFact) -> EngineResult<()> {
        let subject = fact.subject();
        let payload = serde_json::to_vec(fact)?;

        self.jetstream
            .publish(subject.clone(), payload.into())
            .await
            .map_err(|e| EngineError::Nats(e.to_string()))?
            .await
            .map_err(|e| EngineError::Nats(e.to_string()))?;

        debug!(subject = %subject, fact_id = %fact.fact_id, "Published fact");
        Ok(())
    }
}

#[async_trait]
impl EventStore for NatsEventStore {
    async fn append(&self, event: EventRecord, check: Option<VersionCheck>) -> EngineResult<u64> {
        let unit_log = self.unit_log(event.unit_id).await?;
        if unit_log.contains(event.event_id) {
            return Err(EngineError::Concurrency(format!(
                "Event {} already recorded",
                event.event_id
            )));
        }
        if let Some(guard) = check {
            self.log_for(guard.stream).await?.check(check)?;
        }

        let unit_stream = StreamId::Unit(event.unit_id);
        let version = unit_log.version(unit_stream) + 1;
        self.publish(&StoredFact::event(event, Utc::now())).await?;

        Ok(version)
    }

    async fn record_decision(
        &self,
        decision: ApprovalDecision,
        check: Option<VersionCheck>,
    ) -> EngineResult<EventRecord> {
        let unit_log = self.unit_log(decision.unit_id).await?;
        let pending = unit_log.pending(decision.event_id)?.clone();
        if let Some(guard) = check {
            self.log_for(guard.stream).await?.check(check)?;
        }

        self.publish(&StoredFact::approval(decision.clone(), Utc::now()))
            .await?;

        Ok(pending.decided(&decision))
    }

    async fn find_event(&self, event_id: Uuid) -> EngineResult<Option<EventRecord>> {
        Ok(self.full_log().await?.find(event_id).cloned())
    }

    async fn events_for_unit(&self, unit_id: Uuid, filter: &EventFilter) -> EngineResult<Vec<EventRecord>> {
        let log = self.unit_log(unit_id).await?;
        Ok(log.select(|e| e.unit_id == unit_id && filter.matches(e)))
    }

    async fn events_for_extension(
        &self,
        extension_id: Uuid,
        filter: &EventFilter,
    ) -> EngineResult<Vec<EventRecord>> {
        let log = self.full_log().await?;
        Ok(log.select(|e| e.extension_id() == Some(extension_id) && filter.matches(e)))
    }

    async fn events_for_site(&self, site_id: Uuid, filter: &EventFilter) -> EngineResult<Vec<EventRecord>> {
        let log = self.full_log().await?;
        Ok(log.select(|e| e.kind.references_site(site_id) && filter.matches(e)))
    }

    async fn events_matching(&self, filter: &EventFilter) -> EngineResult<Vec<EventRecord>> {
        let log = self.full_log().await?;
        Ok(log.select(|e| filter.matches(e)))
    }

    async fn stream_version(&self, stream: StreamId) -> EngineResult<u64> {
        Ok(self.log_for(stream).await?.version(stream))
    }
}
