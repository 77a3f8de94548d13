use crate::error::{RedomineError, Result};
use crate::types::RowId;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::ops::Bound;

/// A row of one `SYS.*` meta-table shadow.
///
/// Every row has its ROWID identity plus up to two composite unique keys
/// maintained as ordered secondary indices. `key` / `alt_key` return `None`
/// when the row is not indexed (for example `SYS.COL$` rows with
/// SEGCOL# <= 0 stay out of the seg index).
pub trait DictRow: PartialEq {
    /// Oracle name of the backing meta-table, used in diagnostics.
    const TABLE: &'static str;
    type Key: Ord + Clone + fmt::Debug;
    type AltKey: Ord + Clone + fmt::Debug;

    fn row_id(&self) -> &RowId;
    fn key(&self) -> Option<Self::Key>;
    fn alt_key(&self) -> Option<Self::AltKey> {
        None
    }
    /// Human-readable rendering of the unique key for diagnostics,
    /// e.g. `OBJ#: 5, INTCOL#: 2, CON#: 1`.
    fn key_desc(&self) -> String;
    fn alt_desc(&self) -> String {
        String::new()
    }
}

/// Sole-owner store for one meta-table: rows live in the primary map, the
/// secondary indices hold only ROWID keys back into it. Dropping a row
/// always removes the primary entry first, so a stale secondary entry can
/// only ever surface as a lookup failure, never as a dangling reference.
///
/// Only rows are serialized; indices are rebuilt with [`DictStore::reindex`]
/// after deserialization.
#[derive(Debug, Serialize, Deserialize)]
#[serde(bound(serialize = "R: Serialize", deserialize = "R: serde::de::DeserializeOwned"))]
pub struct DictStore<R: DictRow> {
    rows: HashMap<RowId, R>,
    #[serde(skip)]
    key_index: BTreeMap<R::Key, RowId>,
    #[serde(skip)]
    alt_index: BTreeMap<R::AltKey, RowId>,
    #[serde(skip)]
    touched: HashSet<RowId>,
}

impl<R: DictRow> Default for DictStore<R> {
    fn default() -> Self {
        Self {
            rows: HashMap::new(),
            key_index: BTreeMap::new(),
            alt_index: BTreeMap::new(),
            touched: HashSet::new(),
        }
    }
}

impl<R: DictRow> DictStore<R> {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, row_id: &RowId) -> Option<&R> {
        self.rows.get(row_id)
    }

    pub(crate) fn get_mut(&mut self, row_id: &RowId) -> Option<&mut R> {
        self.rows.get_mut(row_id)
    }

    pub fn by_key(&self, key: &R::Key) -> Option<&R> {
        self.key_index.get(key).and_then(|id| self.rows.get(id))
    }

    pub fn by_alt(&self, key: &R::AltKey) -> Option<&R> {
        self.alt_index.get(key).and_then(|id| self.rows.get(id))
    }

    /// Inserts a new row, marking it touched. Duplicate ROWID raises 50023,
    /// a collision on either unique index raises 50024; the store is left
    /// unchanged on error.
    pub fn insert(&mut self, row: R) -> Result<()> {
        if self.rows.contains_key(row.row_id()) {
            return Err(RedomineError::data(
                50023,
                format!(
                    "duplicate {} value: (rowid: {})",
                    R::TABLE,
                    row.row_id()
                ),
            ));
        }
        if let Some(key) = row.key() {
            if self.key_index.contains_key(&key) {
                return Err(RedomineError::data(
                    50024,
                    format!("duplicate {} value for unique ({})", R::TABLE, row.key_desc()),
                ));
            }
        }
        if let Some(alt) = row.alt_key() {
            if self.alt_index.contains_key(&alt) {
                return Err(RedomineError::data(
                    50024,
                    format!("duplicate {} value for unique ({})", R::TABLE, row.alt_desc()),
                ));
            }
        }

        let row_id = row.row_id().clone();
        if let Some(key) = row.key() {
            self.key_index.insert(key, row_id.clone());
        }
        if let Some(alt) = row.alt_key() {
            self.alt_index.insert(alt, row_id.clone());
        }
        self.touched.insert(row_id.clone());
        self.rows.insert(row_id, row);
        Ok(())
    }

    /// Removes a row by ROWID. Absent rows are a no-op (`Ok(None)`).
    /// A declared secondary entry missing at removal raises 50030, after
    /// the primary entry is already gone.
    pub fn remove(&mut self, row_id: &RowId) -> Result<Option<R>> {
        let Some(row) = self.rows.remove(row_id) else {
            return Ok(None);
        };
        if let Some(key) = row.key() {
            if self.key_index.remove(&key).is_none() {
                return Err(RedomineError::data(
                    50030,
                    format!("missing index for {} ({})", R::TABLE, row.key_desc()),
                ));
            }
        }
        if let Some(alt) = row.alt_key() {
            if self.alt_index.remove(&alt).is_none() {
                return Err(RedomineError::data(
                    50030,
                    format!("missing index for {} ({})", R::TABLE, row.alt_desc()),
                ));
            }
        }
        Ok(Some(row))
    }

    /// Ordered scan over the unique-key index, strictly above `lower`.
    /// Callers pass a `(prefix, 0)` bound and stop when the prefix changes.
    pub fn scan_above<'a>(&'a self, lower: &R::Key) -> impl Iterator<Item = &'a R> + 'a {
        self.key_index
            .range((Bound::Excluded(lower.clone()), Bound::Unbounded))
            .filter_map(|(_, row_id)| self.rows.get(row_id))
    }

    pub fn rows(&self) -> impl Iterator<Item = &R> {
        self.rows.values()
    }

    /// Any remaining ROWID, used by the purge drain.
    pub fn any_row_id(&self) -> Option<RowId> {
        self.rows.keys().next().cloned()
    }

    /// Drains the touched set accumulated by inserts.
    pub fn take_touched(&mut self) -> Vec<RowId> {
        self.touched.drain().collect()
    }

    pub fn clear_touched(&mut self) {
        self.touched.clear();
    }

    pub(crate) fn index_residue(&self) -> (usize, usize) {
        (self.key_index.len(), self.alt_index.len())
    }

    pub(crate) fn clear_indexes(&mut self) {
        self.key_index.clear();
        self.alt_index.clear();
    }

    /// Set-equality over ROWIDs plus per-row equality, in both directions.
    /// On mismatch `msgs` names the first lost or differing ROWID.
    pub fn compare(&self, other: &Self, msgs: &mut String) -> bool {
        for (row_id, row) in &self.rows {
            match other.rows.get(row_id) {
                None => {
                    *msgs = format!("schema mismatch: {} lost ROWID: {}", R::TABLE, row_id);
                    return false;
                }
                Some(other_row) if row != other_row => {
                    *msgs = format!("schema mismatch: {} differs ROWID: {}", R::TABLE, row_id);
                    return false;
                }
                Some(_) => {}
            }
        }
        for row_id in other.rows.keys() {
            if !self.rows.contains_key(row_id) {
                *msgs = format!("schema mismatch: {} lost ROWID: {}", R::TABLE, row_id);
                return false;
            }
        }
        true
    }

    /// Rebuilds both secondary indices from the primary map, used after
    /// deserializing a checkpoint. A collision means the checkpoint itself
    /// violates the unique constraints and is refused.
    pub fn reindex(&mut self) -> Result<()> {
        self.key_index.clear();
        self.alt_index.clear();
        self.touched.clear();
        for (row_id, row) in &self.rows {
            if let Some(key) = row.key() {
                if self.key_index.insert(key, row_id.clone()).is_some() {
                    return Err(RedomineError::data(
                        50024,
                        format!("duplicate {} value for unique ({})", R::TABLE, row.key_desc()),
                    ));
                }
            }
            if let Some(alt) = row.alt_key() {
                if self.alt_index.insert(alt, row_id.clone()).is_some() {
                    return Err(RedomineError::data(
                        50024,
                        format!("duplicate {} value for unique ({})", R::TABLE, row.alt_desc()),
                    ));
                }
            }
        }
        Ok(())
    }
}
