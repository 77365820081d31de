// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Core data types for SPOOL.
//!
//! This module provides the record model that every layer of the buffer
//! shares, together with the stored encoding of a record.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{BufferError, BufferResult};

// =============================================================================
// Identifiers
// =============================================================================

/// Identifies the account that owns a buffered record.
///
/// Zero is a valid value meaning "not linked to any account", not an error.
///
/// # Examples
///
/// ```
/// use spool_core::types::OwnerId;
///
/// assert!(OwnerId::UNLINKED.is_unlinked());
/// assert_eq!(OwnerId::new(42).get(), 42);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OwnerId(i64);

impl OwnerId {
    /// The owner of records that are not linked to any account.
    pub const UNLINKED: OwnerId = OwnerId(0);

    /// Creates a new owner ID.
    #[inline]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    /// Returns the raw identifier.
    #[inline]
    pub const fn get(self) -> i64 {
        self.0
    }

    /// Returns `true` for the unlinked sentinel.
    #[inline]
    pub const fn is_unlinked(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for OwnerId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// The identity of a record within the buffer.
///
/// At most one record per key is buffered at any time; a later add for the
/// same key replaces the earlier one.
///
/// # Examples
///
/// ```
/// use spool_core::types::ItemKey;
///
/// let key = ItemKey::new("user-1");
/// assert_eq!(key.as_str(), "user-1");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemKey(String);

impl ItemKey {
    /// Creates a new item key.
    #[inline]
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Returns the key as a string slice.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the key and returns the inner string.
    #[inline]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for ItemKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ItemKey {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ItemKey {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl AsRef<str> for ItemKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// =============================================================================
// BufferedRecord
// =============================================================================

/// The unit of buffering.
///
/// The payload is opaque to the buffer and is carried through unchanged to
/// the persistence sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BufferedRecord {
    /// Owning account, [`OwnerId::UNLINKED`] if unknown.
    pub owner_id: OwnerId,
    /// Record identity.
    pub item_key: ItemKey,
    /// Opaque record body, base64-encoded when stored.
    #[serde(with = "base64_bytes")]
    pub payload: Vec<u8>,
    /// Time of the most recent add for this key.
    pub updated_at: DateTime<Utc>,
}

impl BufferedRecord {
    /// Creates a record stamped with the current time.
    pub fn new(owner_id: OwnerId, item_key: impl Into<ItemKey>, payload: impl Into<Vec<u8>>) -> Self {
        Self::with_timestamp(owner_id, item_key, payload, Utc::now())
    }

    /// Creates a record with an explicit timestamp.
    pub fn with_timestamp(
        owner_id: OwnerId,
        item_key: impl Into<ItemKey>,
        payload: impl Into<Vec<u8>>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            owner_id,
            item_key: item_key.into(),
            payload: payload.into(),
            updated_at,
        }
    }

    /// Returns the age of the record relative to `now`.
    ///
    /// Records stamped in the future report a zero age.
    pub fn age_at(&self, now: DateTime<Utc>) -> chrono::Duration {
        (now - self.updated_at).max(chrono::Duration::zero())
    }

    /// Encodes the record into its stored form.
    ///
    /// The returned bytes are the snapshot later compared by the conditional
    /// evict, so encoding is deterministic for a given record.
    pub fn encode(&self) -> BufferResult<Vec<u8>> {
        serde_json::to_vec(self)
            .map_err(|e| BufferError::serialization(self.item_key.as_str(), e.to_string()))
    }

    /// Decodes a stored value read under `item_key`.
    ///
    /// Any failure is reported as [`BufferError::CorruptedData`].
    pub fn decode(item_key: &str, bytes: &[u8]) -> BufferResult<Self> {
        serde_json::from_slice(bytes).map_err(|e| BufferError::corrupted(item_key, e.to_string()))
    }
}

mod base64_bytes {
    use super::BASE64;
    use base64::Engine as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&BASE64.encode(bytes))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let encoded = String::deserialize(deserializer)?;
        BASE64.decode(encoded).map_err(serde::de::Error::custom)
    }
}

/// Encodes a payload the way it appears inside a stored record.
pub fn encode_payload(payload: &[u8]) -> String {
    BASE64.encode(payload)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_owner_id_unlinked() {
        assert!(OwnerId::UNLINKED.is_unlinked());
        assert!(OwnerId::default().is_unlinked());
        assert!(!OwnerId::new(7).is_unlinked());
        assert_eq!(OwnerId::from(7).to_string(), "7");
    }

    #[test]
    fn test_item_key_conversions() {
        let key: ItemKey = "user-1".into();
        assert_eq!(key.as_str(), "user-1");
        assert_eq!(key.to_string(), "user-1");
        assert_eq!(key.into_inner(), "user-1".to_string());
    }

    #[test]
    fn test_stored_layout() {
        let at = Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap();
        let record = BufferedRecord::with_timestamp(OwnerId::new(9), "user-1", b"hi".to_vec(), at);

        let value: serde_json::Value = serde_json::from_slice(&record.encode().unwrap()).unwrap();
        assert_eq!(value["owner_id"], 9);
        assert_eq!(value["item_key"], "user-1");
        assert_eq!(value["payload"], encode_payload(b"hi"));
        assert_eq!(value["updated_at"], "2025-01-02T03:04:05Z");
    }

    #[test]
    fn test_encoding_is_deterministic() {
        let record = BufferedRecord::new(OwnerId::UNLINKED, "k", vec![0u8, 1, 2, 255]);
        assert_eq!(record.encode().unwrap(), record.encode().unwrap());

        let decoded = BufferedRecord::decode("k", &record.encode().unwrap()).unwrap();
        assert_eq!(decoded, record);
    }

    #[test]
    fn test_decode_garbage_is_corrupt() {
        let err = BufferedRecord::decode("k", b"not json").unwrap_err();
        assert!(matches!(err, BufferError::CorruptedData { ref item_key, .. } if item_key == "k"));

        let bad_payload = br#"{"owner_id":1,"item_key":"k","payload":"%%%","updated_at":"2025-01-01T00:00:00Z"}"#;
        assert!(BufferedRecord::decode("k", bad_payload).is_err());
    }

    #[test]
    fn test_age_never_negative() {
        let now = Utc::now();
        let record = BufferedRecord::with_timestamp(
            OwnerId::UNLINKED,
            "k",
            Vec::new(),
            now + chrono::Duration::seconds(30),
        );
        assert_eq!(record.age_at(now), chrono::Duration::zero());
    }
}
