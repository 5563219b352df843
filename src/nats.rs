// Copyright (c) 2025 - Cowboy AI, Inc.
//! NATS client abstraction for the allocation engine

use async_nats::{Client, ConnectOptions, Subscriber};
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info};

use crate::errors::{EngineError, EngineResult};

/// Configuration for NATS connection
#[derive(Debug, Clone)]
pub struct NatsConfig {
    /// NATS server URLs
    pub servers: Vec<String>,
    /// Client name
    pub name: String,
    /// Connection timeout
    pub connect_timeout: Duration,
    /// Request timeout
    pub request_timeout: Duration,
}

impl Default for NatsConfig {
    fn default() -> Self {
        Self {
            servers: vec!["nats://localhost:4222".to_string()],
            name: "allocation-engine".to_string(),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(5),
        }
    }
}

impl NatsConfig {
    /// Single-server configuration with a client name
    pub fn for_server(url: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            servers: vec![url.into()],
            name: name.into(),
            ..Self::default()
        }
    }
}

/// NATS client wrapper used by the store, the summary publisher and the sync worker
#[derive(Clone)]
pub struct NatsClient {
    client: Client,
}

impl NatsClient {
    /// Connect with the given configuration
    pub async fn new(config: NatsConfig) -> EngineResult<Self> {
        let connect_options = ConnectOptions::new()
            .name(&config.name)
            .connection_timeout(config.connect_timeout)
            .request_timeout(Some(config.request_timeout));

        let client = async_nats::connect_with_options(config.servers.join(","), connect_options)
            .await
            .map_err(|e| EngineError::Nats(e.to_string()))?;

        info!(servers = ?config.servers, "Connected to NATS");

        Ok(Self { client })
    }

    /// Wrap an existing connection
    pub fn from_client(client: Client) -> Self {
        Self { client }
    }

    /// Publish a JSON message to a subject
    pub async fn publish<T>(&self, subject: &str, message: &T) -> EngineResult<()>
    where
        T: Serialize,
    {
        let payload = serde_json::to_vec(message)?;

        self.client
            .publish(subject.to_string(), payload.into())
            .await
            .map_err(|e| EngineError::Nats(e.to_string()))?;

        debug!(subject = %subject, "Published message");
        Ok(())
    }

    /// Subscribe to a subject
    pub async fn subscribe(&self, subject: &str) -> EngineResult<Subscriber> {
        let subscriber = self
            .client
            .subscribe(subject.to_string())
            .await
            .map_err(|e| EngineError::Nats(e.to_string()))?;

        info!(subject = %subject, "Subscribed");
        Ok(subscriber)
    }

    /// Get the underlying NATS client for JetStream operations
    pub fn inner(&self) -> &Client {
        &self.client
    }
}
