// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Redis backing store.
//!
//! Uses a multiplexed async connection shared by all callers. The two
//! compound operations run as server-side Lua scripts, which Redis executes
//! atomically with respect to every other command.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Script};
use tracing::{debug, info};

use spool_core::error::{StoreError, StoreResult};

use super::{BackingStore, Namespace};

/// KEYS[1] = record hash, KEYS[2] = pending set,
/// ARGV[1] = field, ARGV[2] = expected bytes.
const DELETE_IF_EQUALS: &str = r#"
if redis.call('HGET', KEYS[1], ARGV[1]) == ARGV[2] then
    redis.call('SREM', KEYS[2], ARGV[1])
    redis.call('HDEL', KEYS[1], ARGV[1])
    return 1
end
return 0
"#;

/// KEYS[1] = record hash, KEYS[2] = pending set, ARGV[1] = field.
const DEINDEX_IF_MISSING: &str = r#"
if redis.call('HEXISTS', KEYS[1], ARGV[1]) == 0 then
    return redis.call('SREM', KEYS[2], ARGV[1])
end
return 0
"#;

/// A backing store on a Redis server.
pub struct RedisStore {
    url: String,
    conn: MultiplexedConnection,
    delete_if_equals: Script,
    deindex_if_missing: Script,
    closed: AtomicBool,
}

impl std::fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisStore")
            .field("url", &self.url)
            .field("closed", &self.closed.load(Ordering::Relaxed))
            .finish()
    }
}

impl RedisStore {
    /// Connects to the server at `url` (e.g. `redis://127.0.0.1:6379/0`).
    pub async fn connect(url: &str) -> StoreResult<Self> {
        let client = redis::Client::open(url).map_err(connection_error)?;
        let mut conn = client
            .get_multiplexed_async_connection()
            .await
            .map_err(connection_error)?;

        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(connection_error)?;

        info!(url = %url, "Connected to Redis backing store");

        Ok(Self {
            url: url.to_string(),
            conn,
            delete_if_equals: Script::new(DELETE_IF_EQUALS),
            deindex_if_missing: Script::new(DEINDEX_IF_MISSING),
            closed: AtomicBool::new(false),
        })
    }

    fn connection(&self) -> StoreResult<MultiplexedConnection> {
        if self.closed.load(Ordering::Acquire) {
            return Err(StoreError::Closed);
        }
        Ok(self.conn.clone())
    }
}

fn connection_error(e: redis::RedisError) -> StoreError {
    StoreError::connection(e.to_string())
}

fn command_error(command: &'static str) -> impl FnOnce(redis::RedisError) -> StoreError {
    move |e| {
        if e.is_io_error() || e.is_connection_dropped() || e.is_connection_refusal() || e.is_timeout() {
            StoreError::connection(e.to_string())
        } else {
            StoreError::command(command, e.to_string())
        }
    }
}

#[async_trait]
impl BackingStore for RedisStore {
    async fn hash_get(&self, hash: &str, field: &str) -> StoreResult<Option<Vec<u8>>> {
        let mut conn = self.connection()?;
        conn.hget(hash, field).await.map_err(command_error("HGET"))
    }

    async fn hash_set(&self, hash: &str, field: &str, value: &[u8]) -> StoreResult<()> {
        let mut conn = self.connection()?;
        let _: i64 = conn
            .hset(hash, field, value)
            .await
            .map_err(command_error("HSET"))?;
        Ok(())
    }

    async fn set_add(&self, set: &str, member: &str) -> StoreResult<bool> {
        let mut conn = self.connection()?;
        let added: i64 = conn.sadd(set, member).await.map_err(command_error("SADD"))?;
        Ok(added > 0)
    }

    async fn set_members(&self, set: &str) -> StoreResult<Vec<String>> {
        let mut conn = self.connection()?;
        conn.smembers(set).await.map_err(command_error("SMEMBERS"))
    }

    async fn set_random_members(&self, set: &str, count: usize) -> StoreResult<Vec<String>> {
        if count == 0 {
            return Ok(Vec::new());
        }
        let mut conn = self.connection()?;
        conn.srandmember_multiple(set, count)
            .await
            .map_err(command_error("SRANDMEMBER"))
    }

    async fn set_cardinality(&self, set: &str) -> StoreResult<u64> {
        let mut conn = self.connection()?;
        conn.scard(set).await.map_err(command_error("SCARD"))
    }

    async fn delete_if_equals(
        &self,
        namespace: &Namespace,
        field: &str,
        expected: &[u8],
    ) -> StoreResult<bool> {
        let mut conn = self.connection()?;
        let deleted: i64 = self
            .delete_if_equals
            .key(namespace.records_key())
            .key(namespace.pending_key())
            .arg(field)
            .arg(expected)
            .invoke_async(&mut conn)
            .await
            .map_err(command_error("EVALSHA"))?;
        Ok(deleted == 1)
    }

    async fn deindex_if_missing(&self, namespace: &Namespace, field: &str) -> StoreResult<bool> {
        let mut conn = self.connection()?;
        let removed: i64 = self
            .deindex_if_missing
            .key(namespace.records_key())
            .key(namespace.pending_key())
            .arg(field)
            .invoke_async(&mut conn)
            .await
            .map_err(command_error("EVALSHA"))?;
        Ok(removed == 1)
    }

    async fn close(&self) -> StoreResult<()> {
        if !self.closed.swap(true, Ordering::AcqRel) {
            debug!(url = %self.url, "Redis backing store closed");
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "redis"
    }
}
