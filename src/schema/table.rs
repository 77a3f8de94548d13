use crate::types::{Col, DataObj, Obj, UserId};
use serde::{Deserialize, Serialize};

/// Bit-flag options for materialized tables.
pub type TableOptions = u64;
/// Internal dictionary table mined for the engine's own use; suppresses
/// supplemental-log analysis and alternate LOB discovery.
pub const OPTIONS_SYSTEM_TABLE: TableOptions = 1;

/// One decodable column of a materialized table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OracleColumn {
    pub col: Col,
    pub guard_seg: Col,
    pub seg_col: Col,
    pub name: String,
    pub col_type: u16,
    pub length: u64,
    pub precision: i64,
    pub scale: i64,
    pub num_pk: Col,
    pub charset_id: u64,
    pub nullable: bool,
    pub invisible: bool,
    pub stored_as_lob: bool,
    pub constraint: bool,
    pub nested: bool,
    pub unused: bool,
    pub added: bool,
    pub guard: bool,
}

/// One LOB column of a materialized table, with its discovered index and
/// partition segments. The owning table is reachable through the
/// descriptor maps, never through a back pointer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OracleLob {
    pub obj: Obj,
    pub data_obj: DataObj,
    pub l_obj: Obj,
    pub col: Col,
    pub int_col: Col,
    pub lob_indexes: Vec<DataObj>,
    /// Partition segments with the usable block size of their tablespace.
    pub lob_partitions: Vec<(DataObj, u16)>,
}

impl OracleLob {
    pub fn new(obj: Obj, data_obj: DataObj, l_obj: Obj, col: Col, int_col: Col) -> Self {
        Self {
            obj,
            data_obj,
            l_obj,
            col,
            int_col,
            lob_indexes: Vec::new(),
            lob_partitions: Vec::new(),
        }
    }

    pub fn add_index(&mut self, data_obj: DataObj) {
        self.lob_indexes.push(data_obj);
    }

    pub fn add_partition(&mut self, data_obj: DataObj, block_size: u16) {
        self.lob_partitions.push((data_obj, block_size));
    }

    pub fn partition_block_size(&self, data_obj: DataObj) -> Option<u16> {
        self.lob_partitions
            .iter()
            .find(|(part, _)| *part == data_obj)
            .map(|(_, size)| *size)
    }
}

/// A materialized table descriptor: the unit the redo parser decodes row
/// pieces against. Built exclusively by the materializer; immutable once
/// published into the dictionary maps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OracleTable {
    pub obj: Obj,
    pub data_obj: DataObj,
    pub owner: UserId,
    pub clu_cols: Col,
    pub options: TableOptions,
    pub owner_name: String,
    pub name: String,
    pub columns: Vec<OracleColumn>,
    pub lobs: Vec<OracleLob>,
    /// Partition and subpartition objs packed with their dataObj,
    /// see `pack_obj2`.
    pub table_partitions: Vec<u64>,
    pub max_seg_col: Col,
    pub total_pk: Col,
    pub total_lobs: Col,
}

impl OracleTable {
    pub fn new(
        obj: Obj,
        data_obj: DataObj,
        owner: UserId,
        clu_cols: Col,
        options: TableOptions,
        owner_name: String,
        name: String,
    ) -> Self {
        Self {
            obj,
            data_obj,
            owner,
            clu_cols,
            options,
            owner_name,
            name,
            columns: Vec::new(),
            lobs: Vec::new(),
            table_partitions: Vec::new(),
            max_seg_col: 0,
            total_pk: 0,
            total_lobs: 0,
        }
    }

    pub fn add_column(&mut self, column: OracleColumn) {
        if column.seg_col > self.max_seg_col {
            self.max_seg_col = column.seg_col;
        }
        self.total_pk += column.num_pk;
        self.columns.push(column);
    }

    pub fn add_lob(&mut self, lob: OracleLob) {
        self.total_lobs += 1;
        self.lobs.push(lob);
    }

    pub fn add_table_partition(&mut self, obj: Obj, data_obj: DataObj) {
        self.table_partitions
            .push(crate::types::pack_obj2(obj, data_obj));
    }

    pub fn is_system_table(&self) -> bool {
        self.options & OPTIONS_SYSTEM_TABLE != 0
    }
}
