//! Attaching related entities to their owners.

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use crate::descriptor::JoinDescriptor;
use crate::entity::{Entity, EntityRef};
use crate::error::{JoinError, Result};
use crate::key::JoinKey;

/// Related entities grouped by the owner key they belong to.
///
/// Entities keep their input order within a group.
#[derive(Debug, Clone)]
pub struct Grouped<R> {
    groups: HashMap<JoinKey, Vec<R>>,
}

impl<R> Default for Grouped<R> {
    fn default() -> Self {
        Self { groups: HashMap::new() }
    }
}

impl<R> Grouped<R> {
    /// Empty grouping.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `related` to the group of `key`.
    pub fn insert(&mut self, key: impl Into<JoinKey>, related: R) {
        match self.groups.entry(key.into()) {
            Entry::Occupied(mut group) => group.get_mut().push(related),
            Entry::Vacant(group) => {
                group.insert(vec![related]);
            }
        }
    }

    /// Entities of the group of `key`.
    #[must_use]
    pub fn get(&self, key: &JoinKey) -> Option<&[R]> {
        self.groups.get(key).map(Vec::as_slice)
    }

    /// Number of groups.
    #[must_use]
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    /// Whether no entity was grouped.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

impl JoinDescriptor {
    /// Group `related` by their referenced-side join key.
    ///
    /// Two-hop rows carry their owner key in the [`JoinDescriptor::owner_key_alias`]
    /// column rather than in a referenced field; group those with [`Grouped::insert`].
    ///
    /// # Errors
    ///
    /// Returns [`JoinError::Unsupported`] for two-hop relations,
    /// [`JoinError::EntityMismatch`] if `R` isn't the referenced entity, or a key
    /// extraction error.
    pub fn group<R: Entity>(&self, related: impl IntoIterator<Item = R>) -> Result<Grouped<R>> {
        if self.is_two_hop() {
            return Err(JoinError::Unsupported {
                entity: self.owner().name,
                property: self.property(),
                operation: "grouping by referenced key",
            });
        }
        expect_entity::<R>(self.referenced())?;

        let mut grouped = Grouped::new();
        for entity in related {
            let key = self.target_key(&entity)?;
            grouped.insert(key, entity);
        }
        Ok(grouped)
    }

    /// Group `related` and assign each owner its matches.
    ///
    /// # Errors
    ///
    /// See [`JoinDescriptor::group`] and [`JoinDescriptor::populate_grouped`].
    pub fn populate<E: Entity, R: Entity + Clone>(
        &self, owners: &mut [E], related: impl IntoIterator<Item = R>,
    ) -> Result<()> {
        let grouped = self.group(related)?;
        self.populate_grouped(owners, &grouped)
    }

    /// Assign each owner the group matching its owner key.
    ///
    /// Collection fields receive the whole group, single fields its first entity.
    /// Owners without a group are left untouched. Every owner key is extracted before
    /// the first assignment, so a key error leaves all owners unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`JoinError::EntityMismatch`] if `E` or `R` aren't the descriptor's
    /// entities, the first owner key extraction error, or [`JoinError::SlotMismatch`]
    /// if the relation field rejects the entities.
    pub fn populate_grouped<E: Entity, R: Entity + Clone>(
        &self, owners: &mut [E], grouped: &Grouped<R>,
    ) -> Result<()> {
        expect_entity::<E>(self.owner())?;
        expect_entity::<R>(self.referenced())?;

        let keys = owners.iter().map(|owner| self.owner_key(owner)).collect::<Result<Vec<_>>>()?;

        let mut assigned = 0_usize;
        for (owner, key) in owners.iter_mut().zip(&keys) {
            let Some(group) = grouped.get(key) else {
                continue;
            };
            let mut items = group.to_vec();
            if !owner.assign_relation(self.property(), &mut items) {
                return Err(JoinError::SlotMismatch {
                    entity: E::NAME,
                    property: self.property(),
                    related: R::NAME,
                });
            }
            assigned += 1;
        }

        tracing::debug!(
            entity = E::NAME,
            property = self.property(),
            owners = owners.len(),
            assigned,
            "populated relation"
        );
        Ok(())
    }
}

fn expect_entity<T: Entity>(expected: EntityRef) -> Result<()> {
    if expected.is::<T>() {
        Ok(())
    } else {
        Err(JoinError::EntityMismatch {
            expected: expected.name,
            found: T::NAME,
        })
    }
}
