//! Module: collect::table
//! Responsibility: arena-indexed hash table from encoded group key to group.
//! Does not own: fold semantics or emission order policy.
//! Boundary: hash strategy storage; every insert is charged to the budget.

use crate::{
    aggregate::Accumulator,
    collect::{
        context::{ExecutionContext, GroupError},
        group::{Group, GroupProgram},
        key::EncodedGroupKey,
    },
    value::StableHash,
};
use std::collections::{HashMap, hash_map::Entry};

///
/// GroupIndex
///
/// Arena slot of one group. Stable for the lifetime of the table.
///

pub(crate) type GroupIndex = usize;

///
/// GroupTable
///
/// Groups live in an arena in first-seen order. Buckets map the stable hash
/// of an encoded key to the arena slots sharing that hash; slot equality is
/// decided by the full encoding, so hash collisions never merge groups.
///

#[derive(Debug, Default)]
pub(crate) struct GroupTable {
    groups: Vec<Group>,
    encoded: Vec<Vec<u8>>,
    buckets: HashMap<StableHash, Vec<GroupIndex>>,
}

impl GroupTable {
    #[must_use]
    pub(crate) fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub(crate) const fn len(&self) -> usize {
        self.groups.len()
    }

    /// Resolve the slot for one key, creating the group on first sight.
    pub(crate) fn find_or_insert(
        &mut self,
        key: EncodedGroupKey,
        program: &GroupProgram,
        ctx: &mut ExecutionContext,
    ) -> Result<GroupIndex, GroupError> {
        let hash = key.hash();
        let (created_bucket, bucket) = match self.buckets.entry(hash) {
            Entry::Occupied(entry) => (false, entry.into_mut()),
            Entry::Vacant(entry) => (true, entry.insert(Vec::new())),
        };
        if let Some(index) = bucket
            .iter()
            .copied()
            .find(|index| self.encoded[*index] == key.bytes())
        {
            return Ok(index);
        }

        let (group_key, bytes) = key.into_parts();
        let group = program.new_group(group_key);
        let bytes_delta = estimated_new_group_bytes(&group, bytes.len(), created_bucket);
        if let Err(err) = ctx.record_new_group(bytes_delta) {
            if created_bucket && bucket.is_empty() {
                // Keep no empty bucket behind for a rejected key.
                self.buckets.remove(&hash);
            }
            return Err(err);
        }

        let index = self.groups.len();
        bucket.push(index);
        self.groups.push(group);
        self.encoded.push(bytes);

        Ok(index)
    }

    pub(crate) fn group_mut(&mut self, index: GroupIndex) -> &mut Group {
        &mut self.groups[index]
    }

    /// Release groups in first-seen order.
    #[must_use]
    pub(crate) fn into_groups(self) -> Vec<Group> {
        self.groups
    }
}

// Conservative heap + inline estimate for one new group.
fn estimated_new_group_bytes(group: &Group, encoded_len: usize, created_bucket: bool) -> u64 {
    let bucket_entry = if created_bucket {
        size_of::<(StableHash, Vec<GroupIndex>)>()
    } else {
        0
    };
    let accumulators = group
        .accumulator_count()
        .saturating_mul(size_of::<Accumulator>());
    let total = size_of::<Group>()
        .saturating_add(size_of::<Vec<u8>>())
        .saturating_add(size_of::<GroupIndex>())
        // Encoded bytes once for the encoding, once again for the decoded key.
        .saturating_add(encoded_len.saturating_mul(2))
        .saturating_add(accumulators)
        .saturating_add(bucket_entry);

    u64::try_from(total).unwrap_or(u64::MAX)
}

///
/// TESTS
///
