//! Identity-based matching of nested collections.
//!
//! Old and new entries are paired by a stable identity string rather than by
//! position. The resulting [`CollectionPlan`] lists, in emission order, the
//! removed old entries, the matched pairs, and the added new entries, plus
//! the desired order when the survivors-then-additions order would differ
//! from the draft's.

use crate::diff::DiffError;
use std::collections::{HashMap, HashSet};

pub struct CollectionPlan<'a, O, N> {
    /// Old entries without a counterpart, in old order.
    pub removed: Vec<&'a O>,
    /// Matched pairs, in new order.
    pub matched: Vec<(&'a O, &'a N)>,
    /// New entries without a counterpart, in new order.
    pub added: Vec<&'a N>,
    /// New identities in draft order, present only when the order reached
    /// after removals and appended additions differs from it.
    pub reorder: Option<Vec<String>>,
}

/// Pairs `old` and `new` by identity.
///
/// A new entry without identity or sharing its identity with another new
/// entry fails the whole plan. Old entries without identity, or repeating an
/// identity, cannot be addressed and are skipped with a warning.
pub fn plan<'a, O, N>(
    collection: &'static str,
    old: &'a [O],
    new: &'a [N],
    old_identity: impl Fn(&O) -> Option<String>,
    new_identity: impl Fn(&N) -> Option<String>,
    warnings: &mut Vec<String>,
) -> Result<CollectionPlan<'a, O, N>, DiffError> {
    let mut new_ids = Vec::with_capacity(new.len());
    let mut seen = HashSet::with_capacity(new.len());
    for (position, entry) in new.iter().enumerate() {
        let identity = new_identity(entry).ok_or(DiffError::MissingIdentity { collection, position })?;
        if !seen.insert(identity.clone()) {
            return Err(DiffError::DuplicateIdentity { collection, identity });
        }
        new_ids.push(identity);
    }

    let mut old_by_id: HashMap<String, &'a O> = HashMap::with_capacity(old.len());
    let mut old_order = Vec::with_capacity(old.len());
    for (position, entry) in old.iter().enumerate() {
        match old_identity(entry) {
            None => warnings.push(format!("{collection} entry at position {position} has no identity and is left untouched")),
            Some(identity) if old_by_id.contains_key(&identity) => {
                warnings.push(format!("{collection} identity '{identity}' appears more than once, later entries are left untouched"));
            }
            Some(identity) => {
                old_by_id.insert(identity.clone(), entry);
                old_order.push(identity);
            }
        }
    }

    let removed = old_order
        .iter()
        .filter(|identity| !seen.contains(*identity))
        .map(|identity| old_by_id[identity])
        .collect();

    let mut matched = Vec::new();
    let mut added = Vec::new();
    for (identity, entry) in new_ids.iter().zip(new) {
        match old_by_id.get(identity) {
            Some(old_entry) => matched.push((*old_entry, entry)),
            None => added.push(entry),
        }
    }

    let reached: Vec<&String> = old_order
        .iter()
        .filter(|identity| seen.contains(*identity))
        .chain(new_ids.iter().filter(|identity| !old_by_id.contains_key(*identity)))
        .collect();
    let reorder = (!reached.iter().copied().eq(new_ids.iter())).then(|| new_ids.clone());

    Ok(CollectionPlan {
        removed,
        matched,
        added,
        reorder,
    })
}
