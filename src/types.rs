use compact_str::CompactString;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// System Change Number: Oracle's monotonically increasing logical timestamp.
pub type Scn = u64;
/// Sentinel for "no SCN assigned yet".
pub const ZERO_SCN: Scn = u64::MAX;

/// Redo log sequence number.
pub type Seq = u32;
pub const ZERO_SEQ: Seq = u32::MAX;

/// Dictionary object number (OBJ#).
pub type Obj = u32;
/// Physical segment incarnation (DATAOBJ#).
pub type DataObj = u32;
/// Schema user number (USER#).
pub type UserId = u32;
/// Constraint number (CON#).
pub type Con = u32;
/// Column number (COL# / SEGCOL# / INTCOL#).
pub type Col = i16;
/// Tablespace number (TS#).
pub type Ts = u32;
/// Object type discriminator (OBJ$.TYPE#).
pub type ObjType = u16;

/// Oracle ROWID of a dictionary row, the natural row identity of every
/// `SYS.*` shadow record. Real ROWIDs are 18 characters, which
/// `CompactString` keeps inline.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RowId(CompactString);

impl RowId {
    pub fn new(value: &str) -> Self {
        RowId(CompactString::new(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RowId {
    fn from(value: &str) -> Self {
        RowId::new(value)
    }
}

/// A 128-bit dictionary flag value (SPARE1, FLAGS, PROPERTY), stored by
/// Oracle as two 64-bit columns. Serialized as the `[low, high]` pair so
/// the high word survives the JSON number range.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IntX(u128);

impl IntX {
    pub fn new(low: u64, high: u64) -> Self {
        IntX((u128::from(high) << 64) | u128::from(low))
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn has(&self, mask: u128) -> bool {
        self.0 & mask != 0
    }

    pub fn clear(&mut self, mask: u128) {
        self.0 &= !mask;
    }

    pub fn set(&mut self, mask: u128) {
        self.0 |= mask;
    }
}

impl Serialize for IntX {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let low = (self.0 & u128::from(u64::MAX)) as u64;
        let high = (self.0 >> 64) as u64;
        (low, high).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for IntX {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let (low, high) = <(u64, u64)>::deserialize(deserializer)?;
        Ok(IntX::new(low, high))
    }
}

/// Packs a table partition reference into one word: high 32 bits obj,
/// low 32 bits dataObj.
pub fn pack_obj2(obj: Obj, data_obj: DataObj) -> u64 {
    (u64::from(obj) << 32) | u64::from(data_obj)
}

pub fn unpack_obj2(packed: u64) -> (Obj, DataObj) {
    ((packed >> 32) as Obj, (packed & 0xFFFF_FFFF) as DataObj)
}

#[cfg(test)]
mod tests {
    use super::{pack_obj2, unpack_obj2, IntX, RowId};

    #[test]
    fn obj2_packing_is_invertible() {
        for (obj, data_obj) in [(0, 0), (1, 2), (500, 501), (u32::MAX, u32::MAX)] {
            let packed = pack_obj2(obj, data_obj);
            assert_eq!(unpack_obj2(packed), (obj, data_obj));
        }
        assert_eq!(pack_obj2(1, 0), 1 << 32);
    }

    #[test]
    fn intx_keeps_the_high_word_through_serde() {
        let value = IntX::new(5, 3);
        assert!(value.has(5));
        assert!(value.has(3u128 << 64));
        assert!(!value.is_zero());

        let json = serde_json::to_string(&value).unwrap();
        assert_eq!(json, "[5,3]");
        let back: IntX = serde_json::from_str(&json).unwrap();
        assert_eq!(back, value);
        assert!(IntX::new(0, 0).is_zero());
    }

    #[test]
    fn row_id_round_trips_through_serde() {
        let row_id = RowId::new("AAAWbzAAEAAAA1zAAA");
        let json = serde_json::to_string(&row_id).unwrap();
        assert_eq!(json, "\"AAAWbzAAEAAAA1zAAA\"");
        let back: RowId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, row_id);
    }
}
