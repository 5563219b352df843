// Copyright (c) 2025 - Cowboy AI, Inc.
//! Environment-driven configuration for the allocation engine

use std::path::PathBuf;

use crate::errors::{EngineError, EngineResult};
use crate::jetstream::JetStreamConfig;
use crate::nats::NatsConfig;
use crate::subjects::DEFAULT_SUMMARY_PREFIX;

pub const DEFAULT_NATS_URL: &str = "nats://localhost:4222";
pub const DEFAULT_STREAM: &str = "EQUIPMENT_ALLOCATION";
pub const DEFAULT_CONSUMER: &str = "allocation-sync";

/// Settings for the sync worker and anything else embedding the engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// NATS server URL
    pub nats_url: String,
    /// JetStream stream holding the event log
    pub stream_name: String,
    /// Durable consumer name for the sync worker
    pub consumer_name: String,
    /// Path to the JSON equipment registry
    pub registry_path: PathBuf,
    /// Subject prefix summaries are published under
    pub summary_prefix: String,
}

impl EngineConfig {
    /// Load configuration from environment variables
    ///
    /// `EQUIPMENT_REGISTRY` is required; everything else has a default.
    pub fn from_env() -> EngineResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> EngineResult<Self> {
        let or_default = |key: &str, default: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        let registry_path = lookup("EQUIPMENT_REGISTRY")
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from)
            .ok_or_else(|| EngineError::Configuration("EQUIPMENT_REGISTRY not set".to_string()))?;

        Ok(Self {
            nats_url: or_default("NATS_URL", DEFAULT_NATS_URL),
            stream_name: or_default("NATS_STREAM", DEFAULT_STREAM),
            consumer_name: or_default("NATS_CONSUMER", DEFAULT_CONSUMER),
            registry_path,
            summary_prefix: or_default("SUMMARY_SUBJECT_PREFIX", DEFAULT_SUMMARY_PREFIX),
        })
    }

    pub fn nats(&self) -> NatsConfig {
        NatsConfig::for_server(self.nats_url.clone(), self.consumer_name.clone())
    }

    pub fn jetstream(&self) -> JetStreamConfig {
        JetStreamConfig::named(self.stream_name.clone())
    }
}
