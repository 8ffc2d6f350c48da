use ethers::types::{Address, U256};
use serde::ser::{Serialize, Serializer};
use std::collections::{BTreeMap, HashMap};

/// Accumulator for the snapshot's final asset -> balance mapping.
///
/// The two merge passes of a snapshot need different write policies, and the
/// sheet makes that distinction explicit instead of leaving it to raw map
/// mutation: `add_to` accumulates (read-modify-write, defaulting to zero)
/// while `set` overwrites. A fresh sheet always carries a zero entry for the
/// native-ETH placeholder address, even if nothing else lands on it.
///
/// Invariant: once a wrapper token has been resolved or converted, its own
/// address must not remain as a key; callers enforce this with `remove`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BalanceSheet {
    balances: HashMap<Address, U256>,
}

impl BalanceSheet {
    /// Native-asset placeholder key, present in every sheet.
    pub fn eth_placeholder() -> Address {
        Address::zero()
    }

    pub fn new() -> Self {
        let mut balances = HashMap::new();
        balances.insert(Self::eth_placeholder(), U256::zero());
        Self { balances }
    }

    /// Adds `amount` onto the existing entry, treating a missing key as zero.
    pub fn add_to(&mut self, key: Address, amount: U256) {
        let entry = self.balances.entry(key).or_insert_with(U256::zero);
        *entry = entry.saturating_add(amount);
    }

    /// Overwrites the entry for `key`. Used by the underlying-resolution
    /// pass, where a later resolution replaces an earlier one.
    pub fn set(&mut self, key: Address, amount: U256) {
        self.balances.insert(key, amount);
    }

    pub fn remove(&mut self, key: Address) -> Option<U256> {
        self.balances.remove(&key)
    }

    pub fn get(&self, key: &Address) -> Option<U256> {
        self.balances.get(key).copied()
    }

    pub fn contains(&self, key: &Address) -> bool {
        self.balances.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.balances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.balances.is_empty()
    }

    /// The external representation: lowercase 0x-hex address keys mapping to
    /// decimal string balances, sorted for stable output.
    pub fn to_output(&self) -> BTreeMap<String, String> {
        self.balances
            .iter()
            .map(|(addr, balance)| (format!("{addr:?}"), balance.to_string()))
            .collect()
    }
}

impl Default for BalanceSheet {
    fn default() -> Self {
        Self::new()
    }
}

impl Serialize for BalanceSheet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.to_output())
    }
}
