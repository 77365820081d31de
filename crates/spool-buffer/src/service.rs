// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Producer-facing service.
//!
//! `submit` resolves the owner and buffers the payload; `fetch` reads
//! through the buffer and falls back to the durable store.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use spool_core::error::{BufferResult, SinkError};
use spool_core::types::{ItemKey, OwnerId};

use crate::buffer::BufferStore;
use crate::resolver::{resolve_or_unlinked, OwnerResolver};

/// Reads already persisted records from the durable store.
#[async_trait]
pub trait DurableReader: Send + Sync {
    /// Returns the persisted payload of `item_key` and its last update time.
    async fn read(&self, item_key: &ItemKey) -> Result<Option<(Vec<u8>, Option<DateTime<Utc>>)>, SinkError>;
}

/// Where a fetched payload came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchSource {
    /// Still pending in the buffer.
    Buffer,
    /// Already persisted.
    Durable,
}

/// A payload returned by [`BufferService::fetch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedItem {
    /// The payload bytes.
    pub payload: Vec<u8>,
    /// Time of the last update, if known.
    pub updated_at: Option<DateTime<Utc>>,
    /// Origin of the payload.
    pub source: FetchSource,
}

/// Buffered write path with read-through lookups.
#[derive(Clone)]
pub struct BufferService {
    buffer: BufferStore,
    resolver: Option<Arc<dyn OwnerResolver>>,
    reader: Option<Arc<dyn DurableReader>>,
}

impl BufferService {
    /// Creates a service without owner resolution or durable fallback.
    pub fn new(buffer: BufferStore) -> Self {
        Self {
            buffer,
            resolver: None,
            reader: None,
        }
    }

    /// Sets the owner resolver.
    pub fn with_resolver(mut self, resolver: Arc<dyn OwnerResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Sets the durable reader used when a key is not buffered.
    pub fn with_reader(mut self, reader: Arc<dyn DurableReader>) -> Self {
        self.reader = Some(reader);
        self
    }

    /// Buffers `payload` for `item_key`. Returns the owner it was stored under.
    pub async fn submit(
        &self,
        item_key: impl Into<ItemKey>,
        payload: impl Into<Vec<u8>>,
    ) -> BufferResult<OwnerId> {
        let item_key = item_key.into();
        let owner = resolve_or_unlinked(self.resolver.as_deref(), &item_key).await;
        self.buffer.add(owner, item_key, payload).await?;
        Ok(owner)
    }

    /// Returns the latest payload of `item_key`.
    ///
    /// A buffered record wins over the durable copy. When the buffered value
    /// cannot be read the durable copy is returned instead; without a durable
    /// reader the buffer error is returned.
    pub async fn fetch(&self, item_key: impl Into<ItemKey>) -> BufferResult<Option<FetchedItem>> {
        let item_key = item_key.into();

        let buffered = match self.buffer.get(item_key.as_str()).await {
            Ok(Some(record)) => {
                return Ok(Some(FetchedItem {
                    payload: record.payload,
                    updated_at: Some(record.updated_at),
                    source: FetchSource::Buffer,
                }))
            }
            Ok(None) => Ok(()),
            Err(e) => {
                debug!(item_key = %item_key, error = %e, "Buffered read failed, trying durable store");
                Err(e)
            }
        };

        let Some(reader) = &self.reader else {
            return buffered.map(|()| None);
        };

        let durable = reader.read(&item_key).await?;
        Ok(durable.map(|(payload, updated_at)| FetchedItem {
            payload,
            updated_at,
            source: FetchSource::Durable,
        }))
    }

    /// Returns the underlying buffer.
    pub fn buffer(&self) -> &BufferStore {
        &self.buffer
    }
}

impl std::fmt::Debug for BufferService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferService")
            .field("buffer", &self.buffer)
            .field("resolver", &self.resolver.is_some())
            .field("reader", &self.reader.is_some())
            .finish()
    }
}
