//! Client-side record of which tracked account holds which NFT.
//!
//! The NFT contract has no enumeration query, so the bot remembers what it
//! minted. The record can drift from chain state (dropped or reordered
//! transactions, mints by someone else); `NftManager::reconcile` repairs it
//! against `ownerOf`.

use alloy::primitives::{Address, U256};
use rand::{Rng, seq::SliceRandom};
use std::collections::{BTreeSet, HashMap, HashSet};

/// Invariant: a token id is recorded under at most one address.
#[derive(Debug, Clone, Default)]
pub struct OwnershipIndex {
    tracked: HashSet<Address>,
    owned: HashMap<Address, BTreeSet<U256>>,
    owners: HashMap<U256, Address>,
}

impl OwnershipIndex {
    /// Track only the given owners. Tokens that move elsewhere are forgotten.
    pub fn new(tracked: impl IntoIterator<Item = Address>) -> Self {
        Self {
            tracked: tracked.into_iter().collect(),
            ..Default::default()
        }
    }

    pub fn tracks(&self, address: Address) -> bool {
        self.tracked.contains(&address)
    }

    pub fn owner_of(&self, token_id: U256) -> Option<Address> {
        self.owners.get(&token_id).copied()
    }

    /// Token ids held by `owner`, ascending.
    pub fn owned_by(&self, owner: Address) -> Vec<U256> {
        self.owned
            .get(&owner)
            .map(|ids| ids.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn count(&self, owner: Address) -> usize {
        self.owned.get(&owner).map_or(0, BTreeSet::len)
    }

    /// Total number of tracked tokens.
    pub fn len(&self) -> usize {
        self.owners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.owners.is_empty()
    }

    pub fn record_mint(&mut self, owner: Address, token_id: U256) {
        self.forget(token_id);
        self.insert(owner, token_id);
    }

    /// Returns false (and changes nothing) when `from` is not the recorded owner.
    pub fn record_transfer(&mut self, from: Address, to: Address, token_id: U256) -> bool {
        if self.owner_of(token_id) != Some(from) {
            return false;
        }
        self.forget(token_id);
        self.insert(to, token_id);
        true
    }

    /// Returns false (and changes nothing) when `owner` is not the recorded owner.
    pub fn record_burn(&mut self, owner: Address, token_id: U256) -> bool {
        if self.owner_of(token_id) != Some(owner) {
            return false;
        }
        self.forget(token_id);
        true
    }

    /// Drop a token from the index, returning who held it.
    pub fn forget(&mut self, token_id: U256) -> Option<Address> {
        let owner = self.owners.remove(&token_id)?;
        if let Some(ids) = self.owned.get_mut(&owner) {
            ids.remove(&token_id);
            if ids.is_empty() {
                self.owned.remove(&owner);
            }
        }
        Some(owner)
    }

    /// Pick up to `max` of `owner`'s tokens at random.
    pub fn sample<R: Rng + ?Sized>(&self, owner: Address, max: usize, rng: &mut R) -> Vec<U256> {
        let mut ids = self.owned_by(owner);
        ids.shuffle(rng);
        ids.truncate(max);
        ids
    }

    fn insert(&mut self, owner: Address, token_id: U256) {
        if !self.tracks(owner) {
            return;
        }
        self.owned.entry(owner).or_default().insert(token_id);
        self.owners.insert(token_id, owner);
    }
}
