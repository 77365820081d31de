// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Owner resolution.
//!
//! Maps an item key to the account that owns it. Resolution is best effort:
//! a failure never blocks buffering, the record is stored as unlinked.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::debug;

use spool_core::error::ResolveError;
use spool_core::types::{ItemKey, OwnerId};

/// Looks up the owner of an item key.
#[async_trait]
pub trait OwnerResolver: Send + Sync {
    /// Resolves the owner of `item_key`.
    ///
    /// An unknown key may resolve to [`OwnerId::UNLINKED`] or fail; callers
    /// treat both the same way.
    async fn resolve_owner(&self, item_key: &ItemKey) -> Result<OwnerId, ResolveError>;
}

/// Resolves the owner of `item_key`, falling back to [`OwnerId::UNLINKED`].
pub async fn resolve_or_unlinked(resolver: Option<&dyn OwnerResolver>, item_key: &ItemKey) -> OwnerId {
    let Some(resolver) = resolver else {
        return OwnerId::UNLINKED;
    };
    match resolver.resolve_owner(item_key).await {
        Ok(owner) => owner,
        Err(e) => {
            debug!(item_key = %item_key, error = %e, "Owner lookup failed, storing as unlinked");
            OwnerId::UNLINKED
        }
    }
}

/// Resolver backed by an in-memory table.
#[derive(Debug, Default)]
pub struct StaticOwnerResolver {
    owners: RwLock<HashMap<ItemKey, OwnerId>>,
}

impl StaticOwnerResolver {
    /// Creates an empty resolver.
    pub fn new() -> Self {
        Self::default()
    }

    /// Links `item_key` to `owner`.
    pub fn link(&self, item_key: impl Into<ItemKey>, owner: OwnerId) {
        self.owners.write().insert(item_key.into(), owner);
    }

    /// Removes the link of `item_key`.
    pub fn unlink(&self, item_key: &ItemKey) -> Option<OwnerId> {
        self.owners.write().remove(item_key)
    }
}

impl<K: Into<ItemKey>> FromIterator<(K, OwnerId)> for StaticOwnerResolver {
    fn from_iter<I: IntoIterator<Item = (K, OwnerId)>>(iter: I) -> Self {
        Self {
            owners: RwLock::new(iter.into_iter().map(|(k, v)| (k.into(), v)).collect()),
        }
    }
}

#[async_trait]
impl OwnerResolver for StaticOwnerResolver {
    async fn resolve_owner(&self, item_key: &ItemKey) -> Result<OwnerId, ResolveError> {
        self.owners
            .read()
            .get(item_key)
            .copied()
            .ok_or_else(|| ResolveError::new(item_key.as_str(), "no owner linked"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_resolver() {
        let resolver: StaticOwnerResolver = [("user-1", OwnerId::new(11))].into_iter().collect();
        resolver.link("user-2", OwnerId::new(22));

        assert_eq!(
            resolver.resolve_owner(&ItemKey::new("user-1")).await.unwrap(),
            OwnerId::new(11)
        );
        assert_eq!(
            resolve_or_unlinked(Some(&resolver), &ItemKey::new("user-2")).await,
            OwnerId::new(22)
        );
        assert!(resolver.resolve_owner(&ItemKey::new("user-3")).await.is_err());
    }

    #[tokio::test]
    async fn test_failure_falls_back_to_unlinked() {
        let resolver = StaticOwnerResolver::new();
        let key = ItemKey::new("stranger");
        assert_eq!(resolve_or_unlinked(Some(&resolver), &key).await, OwnerId::UNLINKED);
        assert_eq!(resolve_or_unlinked(None, &key).await, OwnerId::UNLINKED);

        resolver.link("stranger", OwnerId::new(5));
        assert_eq!(resolver.unlink(&key), Some(OwnerId::new(5)));
    }
}
