//! The [`ChannelRegistry`]: owner → name → handle, plus handle → secret key.

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use ctk_types::{ConnectorId, HandleId, SecretKey};

use crate::error::{ChannelError, ChannelResult};
use crate::handle::ChannelHandle;

/// Answers whether an owner id still resolves to a live connector.
pub trait OwnerLookup {
    /// Returns `true` if `owner` is registered and not pending removal.
    fn is_live(&self, owner: &ConnectorId) -> bool;
}

impl<F> OwnerLookup for F
where
    F: Fn(&ConnectorId) -> bool,
{
    fn is_live(&self, owner: &ConnectorId) -> bool {
        self(owner)
    }
}

/// One `(owner, name) → handle` binding, in persistable form.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelBinding {
    /// Owning connector.
    pub owner: ConnectorId,
    /// Channel name, unique per owner.
    pub name: String,
    /// Bound handle.
    pub handle: HandleId,
}

/// Named channel handles per connector and the secret key of every handle.
///
/// Invariant: every handle with a secret key is bound under at least one
/// `(owner, name)` until its owner is swept.
#[derive(Debug)]
pub struct ChannelRegistry {
    channels: HashMap<ConnectorId, HashMap<String, ChannelHandle>>,
    secret_keys: HashMap<HandleId, SecretKey>,
    /// Every handle ever bound under an owner, including ones since replaced
    /// or removed. Keys of these are revoked when the owner is swept.
    issued: HashMap<ConnectorId, HashSet<HandleId>>,
    key_bytes: usize,
}

impl Default for ChannelRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ChannelRegistry {
    /// Create an empty registry minting keys of the default size.
    pub fn new() -> Self {
        Self::with_key_bytes(SecretKey::DEFAULT_BYTES)
    }

    /// Create an empty registry minting keys of `key_bytes` random bytes.
    pub fn with_key_bytes(key_bytes: usize) -> Self {
        Self {
            channels: HashMap::new(),
            secret_keys: HashMap::new(),
            issued: HashMap::new(),
            key_bytes,
        }
    }

    /// Bind `handle` to `owner` under `name`.
    ///
    /// A handle already bound under the same name is replaced. The handle
    /// keeps its existing secret key if it has one (it may have been bound
    /// elsewhere before); otherwise a fresh key is minted.
    pub fn add_channel(
        &mut self,
        owner: &ConnectorId,
        name: &str,
        handle: ChannelHandle,
        owners: &dyn OwnerLookup,
    ) -> ChannelResult<()> {
        if !owners.is_live(owner) {
            return Err(ChannelError::UnknownOwner {
                owner: owner.clone(),
            });
        }

        let handle_id = handle.handle_id();
        self.channels
            .entry(owner.clone())
            .or_default()
            .insert(name.to_string(), handle);
        self.issued.entry(owner.clone()).or_default().insert(handle_id);

        self.ensure_secret_key(handle_id);
        debug!(owner = %owner, name, handle = %handle_id.short_id(), "bound channel");
        Ok(())
    }

    /// The handle bound to `owner` under `name`.
    pub fn get_channel(&self, owner: &ConnectorId, name: &str) -> Option<&ChannelHandle> {
        self.channels.get(owner)?.get(name)
    }

    /// Unbind `owner`'s channel `name`.
    ///
    /// The handle's secret key is kept: the same handle may still be, or
    /// later be, bound under another name. Returns the removed handle.
    pub fn remove_channel(&mut self, owner: &ConnectorId, name: &str) -> Option<ChannelHandle> {
        let Some(by_name) = self.channels.get_mut(owner) else {
            debug!(owner = %owner, name, "no channels registered for owner");
            return None;
        };
        let removed = by_name.remove(name);
        if by_name.is_empty() {
            self.channels.remove(owner);
        }
        removed
    }

    /// The secret key of a handle.
    pub fn get_secret_key(&self, handle: &ChannelHandle) -> Option<&SecretKey> {
        self.secret_keys.get(&handle.handle_id())
    }

    /// Check a presented token against a handle's secret key.
    pub fn verify_secret_key(&self, handle: &ChannelHandle, candidate: &str) -> bool {
        self.get_secret_key(handle)
            .is_some_and(|key| key.matches(candidate))
    }

    /// Drop every channel whose owner is no longer live.
    ///
    /// Every handle ever bound under a dropped owner loses its secret key,
    /// unless it is still bound under a live owner. This includes handles
    /// that were replaced or removed earlier. Returns the number of channels
    /// removed.
    pub fn sweep_orphans(&mut self, owners: &dyn OwnerLookup) -> usize {
        let mut orphaned: Vec<ConnectorId> = self
            .channels
            .keys()
            .chain(self.issued.keys())
            .filter(|owner| !owners.is_live(owner))
            .cloned()
            .collect();
        orphaned.sort();
        orphaned.dedup();

        let mut removed = 0;
        let mut candidates: HashSet<HandleId> = HashSet::new();
        for owner in &orphaned {
            if let Some(by_name) = self.channels.remove(owner) {
                removed += by_name.len();
                debug!(owner = %owner, channels = by_name.len(), "removed channels of detached owner");
                candidates.extend(by_name.values().map(|h| h.handle_id()));
            }
            if let Some(issued) = self.issued.remove(owner) {
                candidates.extend(issued);
            }
        }

        let still_bound: HashSet<HandleId> = self
            .channels
            .values()
            .flat_map(|by_name| by_name.values().map(|h| h.handle_id()))
            .collect();
        for handle_id in candidates.difference(&still_bound) {
            if self.secret_keys.remove(handle_id).is_some() {
                debug!(handle = %handle_id.short_id(), "revoked secret key");
            }
        }
        removed
    }

    // ---------------------------------------------------------------
    // Queries and persistence
    // ---------------------------------------------------------------

    /// Owners that have at least one channel, sorted.
    pub fn owners(&self) -> Vec<ConnectorId> {
        let mut owners: Vec<ConnectorId> = self.channels.keys().cloned().collect();
        owners.sort();
        owners
    }

    /// Total number of `(owner, name)` bindings.
    pub fn channel_count(&self) -> usize {
        self.channels.values().map(HashMap::len).sum()
    }

    /// Number of handles holding a secret key.
    pub fn secret_key_count(&self) -> usize {
        self.secret_keys.len()
    }

    /// Every binding, sorted by owner then name.
    pub fn bindings(&self) -> Vec<ChannelBinding> {
        let mut bindings: Vec<ChannelBinding> = self
            .channels
            .iter()
            .flat_map(|(owner, by_name)| {
                by_name.iter().map(move |(name, handle)| ChannelBinding {
                    owner: owner.clone(),
                    name: name.clone(),
                    handle: handle.handle_id(),
                })
            })
            .collect();
        bindings.sort_by(|a, b| (&a.owner, &a.name).cmp(&(&b.owner, &b.name)));
        bindings
    }

    /// Every secret key, keyed by handle id.
    pub fn secret_keys(&self) -> BTreeMap<HandleId, SecretKey> {
        self.secret_keys
            .iter()
            .map(|(id, key)| (*id, key.clone()))
            .collect()
    }

    /// Re-bind a persisted channel without checking the owner.
    ///
    /// A persisted key is adopted for the handle unless it already has one;
    /// without a persisted key a fresh one is minted.
    pub fn insert_restored(
        &mut self,
        binding: &ChannelBinding,
        handle: ChannelHandle,
        key: Option<SecretKey>,
    ) {
        let handle_id = handle.handle_id();
        if handle_id != binding.handle {
            warn!(
                owner = %binding.owner,
                name = %binding.name,
                expected = %binding.handle,
                actual = %handle_id,
                "restored handle id differs from the persisted binding"
            );
        }
        self.channels
            .entry(binding.owner.clone())
            .or_default()
            .insert(binding.name.clone(), handle);
        self.issued
            .entry(binding.owner.clone())
            .or_default()
            .insert(handle_id);
        if let Some(key) = key {
            self.secret_keys.entry(handle_id).or_insert(key);
        }
        self.ensure_secret_key(handle_id);
    }

    fn ensure_secret_key(&mut self, handle_id: HandleId) {
        if self.secret_keys.contains_key(&handle_id) {
            return;
        }
        let key = loop {
            let candidate = SecretKey::generate(self.key_bytes);
            if !self.secret_keys.values().any(|k| *k == candidate) {
                break candidate;
            }
        };
        self.secret_keys.insert(handle_id, key);
    }
}
