// Copyright (c) 2025 - Cowboy AI, Inc.
//! Allocation Summary Sync Service
//!
//! Listens to approval decisions on NATS JetStream and publishes refreshed
//! unit/extension summaries.
//!
//! - Approvals → JetStream → Consumer → AllocationService::sync_derived_state → Summary subjects
//!
//! Run with: cargo run --bin allocation-sync
//!
//! Prerequisites:
//! 1. NATS server running (default: localhost:4222)
//! 2. Equipment registry file (via EQUIPMENT_REGISTRY environment variable)

use anyhow::{Context, Result};
use async_nats::jetstream;
use chrono::Utc;
use cim_equipment_allocation::{
    config::EngineConfig,
    event_store::{EventStore, NatsEventStore},
    events::ApprovalStatus,
    jetstream::{create_allocation_stream, FactBody, StoredFact},
    nats::NatsClient,
    projection::executor::NatsSummaryPublisher,
    registry::InMemoryRegistry,
    service::{AllocationService, EventSourcedAllocationService, SyncTarget},
    subjects::{channel_wildcard, unit_id_from_subject, Channel},
};
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

type SyncService = EventSourcedAllocationService<NatsEventStore, InMemoryRegistry, NatsSummaryPublisher>;

/// Summaries an approval decision invalidates
async fn targets_for(store: &NatsEventStore, fact: &StoredFact) -> Result<Vec<SyncTarget>> {
    let decision = match &fact.body {
        FactBody::Approval(decision) if decision.status == ApprovalStatus::Approved => decision,
        _ => return Ok(Vec::new()),
    };

    let mut targets = vec![SyncTarget::Unit(decision.unit_id)];
    if let Some(event) = store.find_event(decision.event_id).await? {
        if let Some(extension_id) = event.extension_id() {
            targets.push(SyncTarget::Extension(extension_id));
        }
    }
    Ok(targets)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    info!("Starting allocation summary sync");

    let config = EngineConfig::from_env()?;
    info!(
        nats_url = %config.nats_url,
        stream = %config.stream_name,
        consumer = %config.consumer_name,
        registry = %config.registry_path.display(),
        "Configuration loaded"
    );

    let client = NatsClient::new(config.nats())
        .await
        .context("Failed to connect to NATS")?;

    let store = Arc::new(
        NatsEventStore::from_client(client.inner().clone(), config.jetstream())
            .await
            .context("Failed to open event store")?,
    );
    let registry = Arc::new(
        InMemoryRegistry::load(&config.registry_path)
            .await
            .context("Failed to load equipment registry")?,
    );
    let publisher = Arc::new(NatsSummaryPublisher::new(
        client.clone(),
        config.summary_prefix.clone(),
    ));
    let service: SyncService = EventSourcedAllocationService::new(Arc::clone(&store), registry, publisher);

    let rebuilt = service.rebuild_summaries(Utc::now()).await?;
    info!(summaries = rebuilt, "Initial summary rebuild complete");

    let stream = create_allocation_stream(jetstream::new(client.inner().clone()), config.jetstream())
        .await
        .context("Failed to open allocation stream")?;

    // Create or get consumer
    let consumer: jetstream::consumer::PullConsumer = match stream.get_consumer(&config.consumer_name).await {
        Ok(consumer) => {
            info!(consumer = %config.consumer_name, "Found existing consumer");
            consumer
        }
        Err(_) => {
            info!(consumer = %config.consumer_name, "Consumer not found, creating");
            stream
                .create_consumer(jetstream::consumer::pull::Config {
                    durable_name: Some(config.consumer_name.clone()),
                    filter_subject: channel_wildcard(Channel::Approvals),
                    ack_policy: jetstream::consumer::AckPolicy::Explicit,
                    ..Default::default()
                })
                .await
                .context("Failed to create consumer")?;
            stream
                .get_consumer(&config.consumer_name)
                .await
                .map_err(|e| anyhow::anyhow!("Failed to get consumer: {}", e))?
        }
    };

    info!("Consuming approval decisions");
    let messages = consumer
        .stream()
        .max_messages_per_batch(10)
        .messages()
        .await
        .context("Failed to start consuming messages")?;

    tokio::pin!(messages);

    let mut synced_count = 0u64;
    let mut error_count = 0u64;

    while let Some(message) = messages.next().await {
        let msg = match message {
            Ok(msg) => msg,
            Err(e) => {
                error_count += 1;
                error!(error = %e, errors = error_count, "Error receiving message");
                tokio::time::sleep(Duration::from_secs(1)).await;
                continue;
            }
        };

        debug!(subject = %msg.subject, "Received decision");

        let fact = match serde_json::from_slice::<StoredFact>(&msg.payload) {
            Ok(fact) => fact,
            Err(e) => {
                error_count += 1;
                error!(
                    subject = %msg.subject,
                    unit_id = ?unit_id_from_subject(&msg.subject),
                    error = %e,
                    "Malformed fact"
                );

                // Bad message format, retry won't help
                if let Err(e) = msg.ack_with(jetstream::AckKind::Term).await {
                    error!(error = %e, "Failed to terminate message");
                }
                continue;
            }
        };

        let outcome = async {
            let now = Utc::now();
            for target in targets_for(&store, &fact).await? {
                service.sync_derived_state(target, now).await?;
            }
            Ok::<(), anyhow::Error>(())
        }
        .await;

        match outcome {
            Ok(()) => {
                synced_count += 1;
                if let Err(e) = msg.ack().await {
                    error!(error = %e, "Failed to acknowledge message");
                }
            }
            Err(e) => {
                error_count += 1;
                error!(fact_id = %fact.fact_id, unit_id = %fact.unit_id, error = %e, "Summary sync failed");

                // Redeliver with backoff; the next attempt recomputes from the log
                if let Err(e) = msg.ack_with(jetstream::AckKind::Nak(None)).await {
                    error!(error = %e, "Failed to NAK message");
                }
            }
        }

        if (synced_count + error_count) % 100 == 0 {
            info!(synced = synced_count, errors = error_count, "Sync statistics");
        }
    }

    warn!("Message stream ended unexpectedly");
    Ok(())
}
