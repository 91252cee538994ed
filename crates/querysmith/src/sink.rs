// Copyright © 2025 lituus-io <spicyzhug@gmail.com>
// All Rights Reserved.
// Licensed under PolyForm Noncommercial 1.0.0

//! Result sinks for refinement and evaluation records.
//!
//! Persistence is optional; the engines work with [`NoopSink`].

use crate::error::Result;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

/// Stores a structured record and returns an opaque id.
#[async_trait]
pub trait ResultSink: Send + Sync {
    /// Persist `record`
    async fn persist(&self, record: Value) -> Result<String>;
}

/// Sink that drops every record.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

#[async_trait]
impl ResultSink for NoopSink {
    async fn persist(&self, _record: Value) -> Result<String> {
        Ok(String::new())
    }
}

/// Sink that keeps records in memory. Ids are insertion indices.
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<Value>>,
}

impl MemorySink {
    /// Create an empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of every stored record
    pub fn records(&self) -> Vec<Value> {
        self.records.lock().clone()
    }

    /// Number of stored records
    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    /// Whether nothing has been stored
    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

#[async_trait]
impl ResultSink for MemorySink {
    async fn persist(&self, record: Value) -> Result<String> {
        let mut records = self.records.lock();
        records.push(record);
        Ok((records.len() - 1).to_string())
    }
}
