use crate::schema::store::DictRow;
use crate::types::{Col, Con, DataObj, IntX, Obj, RowId, Ts, UserId};
use serde::{Deserialize, Serialize};

/// Longest NAME value accepted for SYS.COL$ / SYS.OBJ$ / SYS.USER$ rows.
pub const MAX_NAME_LENGTH: usize = 30;

/// SYS.CCOL$ — constraint-column rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SysCCol {
    pub row_id: RowId,
    pub con: Con,
    pub int_col: Col,
    pub obj: Obj,
    pub spare1: IntX,
}

impl DictRow for SysCCol {
    const TABLE: &'static str = "SYS.CCOL$";
    type Key = (Obj, Col, Con);
    type AltKey = ();

    fn row_id(&self) -> &RowId {
        &self.row_id
    }

    fn key(&self) -> Option<Self::Key> {
        Some((self.obj, self.int_col, self.con))
    }

    fn key_desc(&self) -> String {
        format!(
            "OBJ#: {}, INTCOL#: {}, CON#: {}",
            self.obj, self.int_col, self.con
        )
    }
}

/// SYS.CDEF$ — constraint definitions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SysCDef {
    pub row_id: RowId,
    pub con: Con,
    pub obj: Obj,
    pub con_type: u16,
}

impl SysCDef {
    pub const TYPE_PK: u16 = 2;
    pub const TYPE_SUPPLEMENTAL_LOG: u16 = 12;
    pub const TYPE_SUPPLEMENTAL_LOG_PK: u16 = 14;
    pub const TYPE_SUPPLEMENTAL_LOG_ALL: u16 = 17;

    pub fn is_pk(&self) -> bool {
        self.con_type == Self::TYPE_PK
    }

    pub fn is_supplemental_log(&self) -> bool {
        self.con_type == Self::TYPE_SUPPLEMENTAL_LOG
    }

    pub fn is_supplemental_log_pk(&self) -> bool {
        self.con_type == Self::TYPE_SUPPLEMENTAL_LOG_PK
    }

    pub fn is_supplemental_log_all(&self) -> bool {
        self.con_type == Self::TYPE_SUPPLEMENTAL_LOG_ALL
    }
}

impl DictRow for SysCDef {
    const TABLE: &'static str = "SYS.CDEF$";
    type Key = (Obj, Con);
    type AltKey = Con;

    fn row_id(&self) -> &RowId {
        &self.row_id
    }

    fn key(&self) -> Option<Self::Key> {
        Some((self.obj, self.con))
    }

    fn alt_key(&self) -> Option<Self::AltKey> {
        Some(self.con)
    }

    fn key_desc(&self) -> String {
        format!("OBJ#: {}, CON#: {}", self.obj, self.con)
    }

    fn alt_desc(&self) -> String {
        format!("CON#: {}", self.con)
    }
}

/// SYS.COL$ — column definitions. Only rows with SEGCOL# > 0 participate
/// in the seg index; intcol-only entries (virtual, unused) stay out of it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SysCol {
    pub row_id: RowId,
    pub obj: Obj,
    pub col: Col,
    pub seg_col: Col,
    pub int_col: Col,
    pub name: String,
    pub col_type: u16,
    pub length: u64,
    pub precision: i64,
    pub scale: i64,
    pub charset_form: u64,
    pub charset_id: u64,
    pub null_constraint: bool,
    pub property: IntX,
}

impl SysCol {
    pub const TYPE_VARCHAR: u16 = 1;
    pub const TYPE_NUMBER: u16 = 2;
    pub const TYPE_LONG: u16 = 8;
    pub const TYPE_DATE: u16 = 12;
    pub const TYPE_RAW: u16 = 23;
    pub const TYPE_CHAR: u16 = 96;
    pub const TYPE_CLOB: u16 = 112;
    pub const TYPE_BLOB: u16 = 113;

    pub const PROPERTY_STORED_AS_LOB: u128 = 1 << 7;
    pub const PROPERTY_CONSTRAINT: u128 = 1 << 8;
    pub const PROPERTY_NESTED: u128 = 1 << 10;
    pub const PROPERTY_UNUSED: u128 = 1 << 15;
    pub const PROPERTY_ADDED: u128 = 1 << 30;
    pub const PROPERTY_INVISIBLE: u128 = 1 << 37;
    pub const PROPERTY_GUARD: u128 = 1 << 39;

    pub fn is_nullable(&self) -> bool {
        !self.null_constraint
    }

    pub fn is_invisible(&self) -> bool {
        self.property.has(Self::PROPERTY_INVISIBLE)
    }

    pub fn is_stored_as_lob(&self) -> bool {
        self.property.has(Self::PROPERTY_STORED_AS_LOB)
    }

    pub fn is_constraint(&self) -> bool {
        self.property.has(Self::PROPERTY_CONSTRAINT)
    }

    pub fn is_nested(&self) -> bool {
        self.property.has(Self::PROPERTY_NESTED)
    }

    pub fn is_unused(&self) -> bool {
        self.property.has(Self::PROPERTY_UNUSED)
    }

    pub fn is_added(&self) -> bool {
        self.property.has(Self::PROPERTY_ADDED)
    }

    pub fn is_guard(&self) -> bool {
        self.property.has(Self::PROPERTY_GUARD)
    }
}

impl DictRow for SysCol {
    const TABLE: &'static str = "SYS.COL$";
    type Key = (Obj, Col);
    type AltKey = ();

    fn row_id(&self) -> &RowId {
        &self.row_id
    }

    fn key(&self) -> Option<Self::Key> {
        (self.seg_col > 0).then_some((self.obj, self.seg_col))
    }

    fn key_desc(&self) -> String {
        format!("OBJ#: {}, SEGCOL#: {}", self.obj, self.seg_col)
    }
}

/// SYS.DEFERRED_STG$ — deferred segment storage attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SysDeferredStg {
    pub row_id: RowId,
    pub obj: Obj,
    pub flags_stg: IntX,
}

impl SysDeferredStg {
    pub const FLAGS_STG_COMPRESSED: u128 = 4;

    pub fn is_compressed(&self) -> bool {
        self.flags_stg.has(Self::FLAGS_STG_COMPRESSED)
    }
}

impl DictRow for SysDeferredStg {
    const TABLE: &'static str = "SYS.DEFERRED_STG$";
    type Key = Obj;
    type AltKey = ();

    fn row_id(&self) -> &RowId {
        &self.row_id
    }

    fn key(&self) -> Option<Self::Key> {
        Some(self.obj)
    }

    fn key_desc(&self) -> String {
        format!("OBJ#: {}", self.obj)
    }
}

/// SYS.ECOL$ — edition/guard column metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SysECol {
    pub row_id: RowId,
    pub tab_obj: Obj,
    pub col_num: Col,
    pub guard_id: Col,
}

impl DictRow for SysECol {
    const TABLE: &'static str = "SYS.ECOL$";
    type Key = (Obj, Col);
    type AltKey = ();

    fn row_id(&self) -> &RowId {
        &self.row_id
    }

    fn key(&self) -> Option<Self::Key> {
        Some((self.tab_obj, self.col_num))
    }

    fn key_desc(&self) -> String {
        format!("TABOBJ#: {}, COLNUM: {}", self.tab_obj, self.col_num)
    }
}

/// SYS.LOB$ — LOB column metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SysLob {
    pub row_id: RowId,
    pub obj: Obj,
    pub col: Col,
    pub int_col: Col,
    pub l_obj: Obj,
    pub ts: Ts,
}

impl DictRow for SysLob {
    const TABLE: &'static str = "SYS.LOB$";
    type Key = (Obj, Col);
    type AltKey = Obj;

    fn row_id(&self) -> &RowId {
        &self.row_id
    }

    fn key(&self) -> Option<Self::Key> {
        Some((self.obj, self.int_col))
    }

    fn alt_key(&self) -> Option<Self::AltKey> {
        Some(self.l_obj)
    }

    fn key_desc(&self) -> String {
        format!("OBJ#: {}, INTCOL#: {}", self.obj, self.int_col)
    }

    fn alt_desc(&self) -> String {
        format!("LOBJ#: {}", self.l_obj)
    }
}

/// SYS.LOBCOMPPART$ — composite LOB partition groups.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SysLobCompPart {
    pub row_id: RowId,
    pub part_obj: Obj,
    pub l_obj: Obj,
}

impl DictRow for SysLobCompPart {
    const TABLE: &'static str = "SYS.LOBCOMPPART$";
    type Key = (Obj, Obj);
    type AltKey = Obj;

    fn row_id(&self) -> &RowId {
        &self.row_id
    }

    fn key(&self) -> Option<Self::Key> {
        Some((self.l_obj, self.part_obj))
    }

    fn alt_key(&self) -> Option<Self::AltKey> {
        Some(self.part_obj)
    }

    fn key_desc(&self) -> String {
        format!("LOBJ#: {}, PARTOBJ#: {}", self.l_obj, self.part_obj)
    }

    fn alt_desc(&self) -> String {
        format!("PARTOBJ#: {}", self.part_obj)
    }
}

/// SYS.LOBFRAG$ — LOB fragments (partition/subpartition segments).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SysLobFrag {
    pub row_id: RowId,
    pub frag_obj: Obj,
    pub parent_obj: Obj,
    pub ts: Ts,
}

impl DictRow for SysLobFrag {
    const TABLE: &'static str = "SYS.LOBFRAG$";
    type Key = (Obj, Obj);
    type AltKey = ();

    fn row_id(&self) -> &RowId {
        &self.row_id
    }

    fn key(&self) -> Option<Self::Key> {
        Some((self.parent_obj, self.frag_obj))
    }

    fn key_desc(&self) -> String {
        format!(
            "PARENTOBJ#: {}, FRAGOBJ#: {}",
            self.parent_obj, self.frag_obj
        )
    }
}

/// SYS.OBJ$ — the dictionary object table.
///
/// `single` marks rows seeded for one explicitly listed table rather than a
/// full schema scan; it is bookkeeping, not row content, and stays out of
/// row equality.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SysObj {
    pub row_id: RowId,
    pub owner: UserId,
    pub obj: Obj,
    pub data_obj: DataObj,
    pub obj_type: u16,
    pub name: String,
    pub flags: IntX,
    pub single: bool,
}

impl SysObj {
    pub const TYPE_INDEX: u16 = 1;
    pub const TYPE_TABLE: u16 = 2;
    pub const TYPE_VIEW: u16 = 4;
    pub const TYPE_SYNONYM: u16 = 5;
    pub const TYPE_SEQUENCE: u16 = 6;
    pub const TYPE_LOB: u16 = 21;

    pub const FLAGS_TEMPORARY: u128 = 2;
    pub const FLAGS_SECONDARY: u128 = 16;
    pub const FLAGS_IN_MEMORY_TEMP: u128 = 32;
    pub const FLAGS_DROPPED: u128 = 128;

    pub fn is_table(&self) -> bool {
        self.obj_type == Self::TYPE_TABLE
    }

    pub fn is_temporary(&self) -> bool {
        self.flags.has(Self::FLAGS_TEMPORARY | Self::FLAGS_SECONDARY | Self::FLAGS_IN_MEMORY_TEMP)
    }

    pub fn is_dropped(&self) -> bool {
        self.flags.has(Self::FLAGS_DROPPED)
    }
}

impl PartialEq for SysObj {
    fn eq(&self, other: &Self) -> bool {
        self.row_id == other.row_id
            && self.owner == other.owner
            && self.obj == other.obj
            && self.data_obj == other.data_obj
            && self.obj_type == other.obj_type
            && self.name == other.name
            && self.flags == other.flags
    }
}

impl DictRow for SysObj {
    const TABLE: &'static str = "SYS.OBJ$";
    type Key = (UserId, String, Obj, DataObj);
    type AltKey = Obj;

    fn row_id(&self) -> &RowId {
        &self.row_id
    }

    fn key(&self) -> Option<Self::Key> {
        Some((self.owner, self.name.clone(), self.obj, self.data_obj))
    }

    fn alt_key(&self) -> Option<Self::AltKey> {
        Some(self.obj)
    }

    fn key_desc(&self) -> String {
        format!(
            "OWNER#: {}, NAME: '{}', OBJ#: {}, DATAOBJ#: {}",
            self.owner, self.name, self.obj, self.data_obj
        )
    }

    fn alt_desc(&self) -> String {
        format!("OBJ#: {}", self.obj)
    }
}

/// SYS.TAB$ — table storage attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SysTab {
    pub row_id: RowId,
    pub obj: Obj,
    pub data_obj: DataObj,
    pub ts: Ts,
    pub clu_cols: Col,
    pub flags: IntX,
    pub property: IntX,
}

impl SysTab {
    pub const PROPERTY_BINARY: u128 = 1;
    pub const PROPERTY_PARTITIONED: u128 = 32;
    pub const PROPERTY_IOT: u128 = 64;
    pub const PROPERTY_IOT_OVERFLOW_SEGMENT: u128 = 512;
    pub const PROPERTY_CLUSTERED: u128 = 1024;
    pub const PROPERTY_NESTED: u128 = 8192;

    pub const FLAGS_ROW_MOVEMENT: u128 = 1 << 17;
    pub const FLAGS_DEPENDENCIES: u128 = 1 << 23;
    pub const FLAGS_INITIAL: u128 = 1 << 34;

    pub fn is_binary(&self) -> bool {
        self.property.has(Self::PROPERTY_BINARY)
    }

    pub fn is_partitioned(&self) -> bool {
        self.property.has(Self::PROPERTY_PARTITIONED)
    }

    pub fn is_iot(&self) -> bool {
        self.property.has(Self::PROPERTY_IOT | Self::PROPERTY_IOT_OVERFLOW_SEGMENT)
    }

    pub fn is_clustered(&self) -> bool {
        self.property.has(Self::PROPERTY_CLUSTERED)
    }

    pub fn is_nested(&self) -> bool {
        self.property.has(Self::PROPERTY_NESTED)
    }

    pub fn is_row_movement(&self) -> bool {
        self.flags.has(Self::FLAGS_ROW_MOVEMENT)
    }

    pub fn is_dependencies(&self) -> bool {
        self.flags.has(Self::FLAGS_DEPENDENCIES)
    }

    /// Segment creation deferred; compression is then recorded in
    /// SYS.DEFERRED_STG$ instead of SYS.TAB$.
    pub fn is_initial(&self) -> bool {
        self.flags.has(Self::FLAGS_INITIAL)
    }
}

impl DictRow for SysTab {
    const TABLE: &'static str = "SYS.TAB$";
    type Key = Obj;
    type AltKey = ();

    fn row_id(&self) -> &RowId {
        &self.row_id
    }

    fn key(&self) -> Option<Self::Key> {
        Some(self.obj)
    }

    fn key_desc(&self) -> String {
        format!("OBJ#: {}", self.obj)
    }
}

/// SYS.TABCOMPART$ — composite table partitions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SysTabComPart {
    pub row_id: RowId,
    pub obj: Obj,
    pub data_obj: DataObj,
    pub bo: Obj,
}

impl DictRow for SysTabComPart {
    const TABLE: &'static str = "SYS.TABCOMPART$";
    type Key = (Obj, Obj);
    type AltKey = Obj;

    fn row_id(&self) -> &RowId {
        &self.row_id
    }

    fn key(&self) -> Option<Self::Key> {
        Some((self.bo, self.obj))
    }

    fn alt_key(&self) -> Option<Self::AltKey> {
        Some(self.obj)
    }

    fn key_desc(&self) -> String {
        format!("BO#: {}, OBJ#: {}", self.bo, self.obj)
    }

    fn alt_desc(&self) -> String {
        format!("OBJ#: {}", self.obj)
    }
}

/// SYS.TABPART$ — table partitions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SysTabPart {
    pub row_id: RowId,
    pub obj: Obj,
    pub data_obj: DataObj,
    pub bo: Obj,
}

impl DictRow for SysTabPart {
    const TABLE: &'static str = "SYS.TABPART$";
    type Key = (Obj, Obj);
    type AltKey = ();

    fn row_id(&self) -> &RowId {
        &self.row_id
    }

    fn key(&self) -> Option<Self::Key> {
        Some((self.bo, self.obj))
    }

    fn key_desc(&self) -> String {
        format!("BO#: {}, OBJ#: {}", self.bo, self.obj)
    }
}

/// SYS.TABSUBPART$ — table subpartitions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SysTabSubPart {
    pub row_id: RowId,
    pub obj: Obj,
    pub data_obj: DataObj,
    pub p_obj: Obj,
}

impl DictRow for SysTabSubPart {
    const TABLE: &'static str = "SYS.TABSUBPART$";
    type Key = (Obj, Obj);
    type AltKey = ();

    fn row_id(&self) -> &RowId {
        &self.row_id
    }

    fn key(&self) -> Option<Self::Key> {
        Some((self.p_obj, self.obj))
    }

    fn key_desc(&self) -> String {
        format!("POBJ#: {}, OBJ#: {}", self.p_obj, self.obj)
    }
}

/// SYS.TS$ — tablespaces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SysTs {
    pub row_id: RowId,
    pub ts: Ts,
    pub name: String,
    pub block_size: u32,
}

impl DictRow for SysTs {
    const TABLE: &'static str = "SYS.TS$";
    type Key = Ts;
    type AltKey = ();

    fn row_id(&self) -> &RowId {
        &self.row_id
    }

    fn key(&self) -> Option<Self::Key> {
        Some(self.ts)
    }

    fn key_desc(&self) -> String {
        format!("TS#: {}", self.ts)
    }
}

/// SYS.USER$ — schema users. `single` has the same bookkeeping role as on
/// [`SysObj`] and is excluded from equality.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SysUser {
    pub row_id: RowId,
    pub user: UserId,
    pub name: String,
    pub spare1: IntX,
    pub single: bool,
}

impl SysUser {
    pub const SPARE1_SUPP_LOG_PRIMARY: u128 = 1;
    pub const SPARE1_SUPP_LOG_ALL: u128 = 8;

    pub fn is_supp_log_primary(&self) -> bool {
        self.spare1.has(Self::SPARE1_SUPP_LOG_PRIMARY)
    }

    pub fn is_supp_log_all(&self) -> bool {
        self.spare1.has(Self::SPARE1_SUPP_LOG_ALL)
    }
}

impl PartialEq for SysUser {
    fn eq(&self, other: &Self) -> bool {
        self.row_id == other.row_id
            && self.user == other.user
            && self.name == other.name
            && self.spare1 == other.spare1
    }
}

impl DictRow for SysUser {
    const TABLE: &'static str = "SYS.USER$";
    type Key = UserId;
    type AltKey = ();

    fn row_id(&self) -> &RowId {
        &self.row_id
    }

    fn key(&self) -> Option<Self::Key> {
        Some(self.user)
    }

    fn key_desc(&self) -> String {
        format!("USER#: {}", self.user)
    }
}
