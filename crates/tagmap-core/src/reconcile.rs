//! Joins normalized upload rows against the remote lookup tables.

use std::collections::HashMap;

use crate::domain::{
    normalize_email_key, normalize_tag_key, AccountId, AccountRecord, NormalizedRow, ResolvedRow,
    TagId, TagMatching, TagRecord,
};

/// A normalized key claimed by more than one remote record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyCollision<Id> {
    pub key: String,
    /// Every distinct id seen for the key, in lookup order.
    pub ids: Vec<Id>,
}

/// Normalized key to id map that keeps track of collisions.
///
/// On a collision the last record wins, matching the order the remote
/// service returned; callers decide whether collisions are fatal.
#[derive(Debug, Clone)]
pub struct KeyIndex<Id> {
    entries: HashMap<String, Id>,
    collisions: Vec<KeyCollision<Id>>,
}

impl<Id: Copy + PartialEq> KeyIndex<Id> {
    pub fn build<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (String, Id)>,
    {
        let mut entries: HashMap<String, Id> = HashMap::new();
        let mut collisions: Vec<KeyCollision<Id>> = Vec::new();
        let mut collision_slots: HashMap<String, usize> = HashMap::new();

        for (key, id) in pairs {
            if key.is_empty() {
                continue;
            }
            match entries.insert(key.clone(), id) {
                Some(previous) if previous != id => match collision_slots.get(&key) {
                    Some(&slot) => {
                        let ids = &mut collisions[slot].ids;
                        if !ids.contains(&id) {
                            ids.push(id);
                        }
                    }
                    None => {
                        collision_slots.insert(key.clone(), collisions.len());
                        collisions.push(KeyCollision {
                            key,
                            ids: vec![previous, id],
                        });
                    }
                },
                _ => {}
            }
        }

        Self {
            entries,
            collisions,
        }
    }

    pub fn get(&self, key: &str) -> Option<Id> {
        self.entries.get(key).copied()
    }

    pub fn collisions(&self) -> &[KeyCollision<Id>] {
        &self.collisions
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl KeyIndex<AccountId> {
    pub fn from_accounts(accounts: &[AccountRecord]) -> Self {
        Self::build(
            accounts
                .iter()
                .map(|account| (normalize_email_key(&account.email), account.id)),
        )
    }
}

impl KeyIndex<TagId> {
    pub fn from_tags(tags: &[TagRecord], matching: TagMatching) -> Self {
        Self::build(
            tags.iter()
                .map(|tag| (normalize_tag_key(&tag.name, matching), tag.id)),
        )
    }
}

/// Produces one resolved row per input row, in input order.
pub fn reconcile(
    rows: &[NormalizedRow],
    accounts: &KeyIndex<AccountId>,
    tags: &KeyIndex<TagId>,
) -> Vec<ResolvedRow> {
    rows.iter()
        .map(|row| ResolvedRow {
            account_id: accounts.get(&row.email_key),
            tag_id: tags.get(&row.tag_key),
            row: row.clone(),
        })
        .collect()
}
