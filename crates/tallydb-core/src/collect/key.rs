//! Module: collect::key
//! Responsibility: group-key extraction and canonical key encoding.
//! Does not own: group storage or fold state.
//! Boundary: every strategy turns rows into keys through this extractor.

use crate::{
    error::InternalError,
    plan::{Expr, GroupKeySpec},
    row::Row,
    value::{
        StableHash, Value,
        hash::{encode_tuple, stable_hash_bytes},
    },
};
use derive_more::{Deref, IntoIterator};

///
/// GroupKey
///
/// Fixed-length tuple of values identifying one group. Equality and
/// ordering are component-wise under the canonical value order.
///

#[derive(Clone, Debug, Default, Deref, Eq, IntoIterator, Ord, PartialEq, PartialOrd)]
pub struct GroupKey(Vec<Value>);

impl GroupKey {
    #[must_use]
    pub const fn new(values: Vec<Value>) -> Self {
        Self(values)
    }

    /// Attach the normalized encoding and its stable hash.
    pub fn encode(self) -> Result<EncodedGroupKey, InternalError> {
        let bytes = encode_tuple(&self.0)?;
        let hash = stable_hash_bytes(&bytes);

        Ok(EncodedGroupKey {
            key: self,
            bytes,
            hash,
        })
    }
}

///
/// EncodedGroupKey
///
/// Group key plus its normalized byte encoding. Two keys are equal iff their
/// encodings are byte-equal; `hash` only selects a bucket.
///

#[derive(Clone, Debug)]
pub struct EncodedGroupKey {
    key: GroupKey,
    bytes: Vec<u8>,
    hash: StableHash,
}

impl EncodedGroupKey {
    #[must_use]
    pub const fn key(&self) -> &GroupKey {
        &self.key
    }

    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    #[must_use]
    pub const fn hash(&self) -> StableHash {
        self.hash
    }

    #[must_use]
    pub fn into_parts(self) -> (GroupKey, Vec<u8>) {
        (self.key, self.bytes)
    }
}

///
/// GroupKeyExtractor
///
/// Evaluates the group-key expressions of one plan against each row.
/// With no expressions every row maps to the empty key, i.e. one implicit
/// group.
///

#[derive(Clone, Debug)]
pub struct GroupKeyExtractor {
    exprs: Vec<Expr>,
}

impl GroupKeyExtractor {
    #[must_use]
    pub fn new(keys: &[GroupKeySpec]) -> Self {
        Self {
            exprs: keys.iter().map(|key| key.expr.clone()).collect(),
        }
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.exprs.is_empty()
    }

    #[must_use]
    pub const fn arity(&self) -> usize {
        self.exprs.len()
    }

    pub fn extract(&self, row: &Row) -> Result<GroupKey, InternalError> {
        self.exprs
            .iter()
            .map(|expr| expr.evaluate(row))
            .collect::<Result<Vec<_>, _>>()
            .map(GroupKey)
    }

    pub fn extract_encoded(&self, row: &Row) -> Result<EncodedGroupKey, InternalError> {
        self.extract(row)?.encode()
    }
}

///
/// TESTS
///
