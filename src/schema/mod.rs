pub mod build;
pub mod row;
pub mod store;
pub mod table;

use crate::ctx::{Ctx, REDO_FLAGS_ADAPTIVE_SCHEMA, TRACE_SYSTEM};
use crate::error::{RedomineError, Result};
use crate::schema::row::{
    SysCCol, SysCDef, SysCol, SysDeferredStg, SysECol, SysLob, SysLobCompPart, SysLobFrag, SysObj,
    SysTab, SysTabComPart, SysTabPart, SysTabSubPart, SysTs, SysUser, MAX_NAME_LENGTH,
};
use crate::schema::store::{DictRow, DictStore};
use crate::schema::table::{OracleLob, OracleTable};
use crate::types::{unpack_obj2, Col, Con, DataObj, IntX, Obj, RowId, Scn, Ts, UserId, ZERO_SCN};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};

/// Handle to a LOB inside its owning table descriptor. The descriptor maps
/// store these instead of aliasing pointers; a stale handle resolves to
/// `None` instead of dangling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LobRef {
    pub table: Obj,
    pub lob: usize,
}

/// The catalog shadow: an in-memory replica of the Oracle data dictionary,
/// mutated by DML redo applied to the `SYS.*` meta-tables and queried by
/// the materializer to build table descriptors.
///
/// Rows are serialized into catalog checkpoints; secondary indices,
/// descriptor maps and touch sets are runtime state and are rebuilt after
/// a reload (`reindex` + a materializer pass over `touch_all`).
#[derive(Debug, Serialize, Deserialize)]
pub struct Schema {
    pub scn: Scn,
    pub ref_scn: Scn,
    #[serde(skip)]
    pub loaded: bool,

    pub sys_ccol: DictStore<SysCCol>,
    pub sys_cdef: DictStore<SysCDef>,
    pub sys_col: DictStore<SysCol>,
    pub sys_deferred_stg: DictStore<SysDeferredStg>,
    pub sys_ecol: DictStore<SysECol>,
    pub sys_lob: DictStore<SysLob>,
    pub sys_lob_comp_part: DictStore<SysLobCompPart>,
    pub sys_lob_frag: DictStore<SysLobFrag>,
    pub sys_obj: DictStore<SysObj>,
    pub sys_tab: DictStore<SysTab>,
    pub sys_tab_com_part: DictStore<SysTabComPart>,
    pub sys_tab_part: DictStore<SysTabPart>,
    pub sys_tab_sub_part: DictStore<SysTabSubPart>,
    pub sys_ts: DictStore<SysTs>,
    pub sys_user: DictStore<SysUser>,

    /// Materialized descriptors keyed by table obj; owns the descriptors.
    #[serde(skip)]
    pub table_map: HashMap<Obj, OracleTable>,
    /// Every table, partition and subpartition obj mapped to the owning
    /// table obj (flat lookup for the redo parser).
    #[serde(skip)]
    pub table_partition_map: HashMap<Obj, Obj>,
    #[serde(skip)]
    pub lob_index_map: HashMap<DataObj, LobRef>,
    #[serde(skip)]
    pub lob_partition_map: HashMap<DataObj, LobRef>,

    #[serde(skip)]
    pub identifiers_touched: BTreeSet<Obj>,
    #[serde(skip)]
    tables_touched: BTreeSet<Obj>,
    #[serde(skip)]
    pub touched: bool,
}

impl Default for Schema {
    fn default() -> Self {
        Self {
            scn: ZERO_SCN,
            ref_scn: ZERO_SCN,
            loaded: false,
            sys_ccol: DictStore::default(),
            sys_cdef: DictStore::default(),
            sys_col: DictStore::default(),
            sys_deferred_stg: DictStore::default(),
            sys_ecol: DictStore::default(),
            sys_lob: DictStore::default(),
            sys_lob_comp_part: DictStore::default(),
            sys_lob_frag: DictStore::default(),
            sys_obj: DictStore::default(),
            sys_tab: DictStore::default(),
            sys_tab_com_part: DictStore::default(),
            sys_tab_part: DictStore::default(),
            sys_tab_sub_part: DictStore::default(),
            sys_ts: DictStore::default(),
            sys_user: DictStore::default(),
            table_map: HashMap::new(),
            table_partition_map: HashMap::new(),
            lob_index_map: HashMap::new(),
            lob_partition_map: HashMap::new(),
            identifiers_touched: BTreeSet::new(),
            tables_touched: BTreeSet::new(),
            touched: false,
        }
    }
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks the table owning `obj` for re-materialization. A zero obj is
    /// a no-op. Objs without a published descriptor still land in
    /// `identifiers_touched` so the next materializer pass considers them.
    fn touch_table(&mut self, obj: Obj) {
        if obj == 0 {
            return;
        }
        self.identifiers_touched.insert(obj);
        if self.table_map.contains_key(&obj) {
            self.tables_touched.insert(obj);
        }
    }

    // ---- SYS.CCOL$ ----

    pub fn add_sys_ccol(
        &mut self,
        ctx: &Ctx,
        row_id: &str,
        con: Con,
        int_col: Col,
        obj: Obj,
        spare11: u64,
        spare12: u64,
    ) -> Result<()> {
        let row = SysCCol {
            row_id: RowId::new(row_id),
            con,
            int_col,
            obj,
            spare1: IntX::new(spare11, spare12),
        };
        ctx.log_trace(
            TRACE_SYSTEM,
            format!(
                "insert SYS.CCOL$ (ROWID: {}, CON#: {con}, INTCOL#: {int_col}, OBJ#: {obj})",
                row.row_id
            ),
        );
        self.sys_ccol.insert(row)?;
        self.touch_table(obj);
        self.touched = true;
        Ok(())
    }

    pub fn drop_sys_ccol(&mut self, ctx: &Ctx, row_id: &RowId) -> Result<()> {
        let Some(row) = self.sys_ccol.remove(row_id)? else {
            return Ok(());
        };
        ctx.log_trace(
            TRACE_SYSTEM,
            format!(
                "delete SYS.CCOL$ (ROWID: {}, CON#: {}, INTCOL#: {}, OBJ#: {})",
                row.row_id, row.con, row.int_col, row.obj
            ),
        );
        self.touch_table(row.obj);
        self.touched = true;
        Ok(())
    }

    pub fn find_sys_ccol(&self, row_id: &RowId) -> Option<&SysCCol> {
        self.sys_ccol.get(row_id)
    }

    // ---- SYS.CDEF$ ----

    pub fn add_sys_cdef(
        &mut self,
        ctx: &Ctx,
        row_id: &str,
        con: Con,
        obj: Obj,
        con_type: u16,
    ) -> Result<()> {
        let row = SysCDef {
            row_id: RowId::new(row_id),
            con,
            obj,
            con_type,
        };
        ctx.log_trace(
            TRACE_SYSTEM,
            format!(
                "insert SYS.CDEF$ (ROWID: {}, CON#: {con}, OBJ#: {obj}, TYPE: {con_type})",
                row.row_id
            ),
        );
        self.sys_cdef.insert(row)?;
        self.touch_table(obj);
        self.touched = true;
        Ok(())
    }

    pub fn drop_sys_cdef(&mut self, ctx: &Ctx, row_id: &RowId) -> Result<()> {
        let Some(row) = self.sys_cdef.remove(row_id)? else {
            return Ok(());
        };
        ctx.log_trace(
            TRACE_SYSTEM,
            format!(
                "delete SYS.CDEF$ (ROWID: {}, CON#: {}, OBJ#: {}, TYPE: {})",
                row.row_id, row.con, row.obj, row.con_type
            ),
        );
        self.touch_table(row.obj);
        self.touched = true;
        Ok(())
    }

    pub fn find_sys_cdef(&self, row_id: &RowId) -> Option<&SysCDef> {
        self.sys_cdef.get(row_id)
    }

    // ---- SYS.COL$ ----

    #[allow(clippy::too_many_arguments)]
    pub fn add_sys_col(
        &mut self,
        ctx: &Ctx,
        row_id: &str,
        obj: Obj,
        col: Col,
        seg_col: Col,
        int_col: Col,
        name: &str,
        col_type: u16,
        length: u64,
        precision: i64,
        scale: i64,
        charset_form: u64,
        charset_id: u64,
        null_constraint: bool,
        property1: u64,
        property2: u64,
    ) -> Result<()> {
        if name.len() > MAX_NAME_LENGTH {
            return Err(RedomineError::data(
                50025,
                format!(
                    "value of SYS.COL$ too long for NAME (value: '{name}', length: {})",
                    name.len()
                ),
            ));
        }
        if seg_col > 1000 {
            return Err(RedomineError::data(
                50025,
                format!("value of SYS.COL$ too big for SEGCOL# (value: {seg_col})"),
            ));
        }
        let row = SysCol {
            row_id: RowId::new(row_id),
            obj,
            col,
            seg_col,
            int_col,
            name: name.to_owned(),
            col_type,
            length,
            precision,
            scale,
            charset_form,
            charset_id,
            null_constraint,
            property: IntX::new(property1, property2),
        };
        ctx.log_trace(
            TRACE_SYSTEM,
            format!(
                "insert SYS.COL$ (ROWID: {}, OBJ#: {obj}, COL#: {col}, SEGCOL#: {seg_col}, \
                 INTCOL#: {int_col}, NAME: '{name}', TYPE#: {col_type})",
                row.row_id
            ),
        );
        self.sys_col.insert(row)?;
        self.touch_table(obj);
        self.touched = true;
        Ok(())
    }

    pub fn drop_sys_col(&mut self, ctx: &Ctx, row_id: &RowId) -> Result<()> {
        let Some(row) = self.sys_col.remove(row_id)? else {
            return Ok(());
        };
        ctx.log_trace(
            TRACE_SYSTEM,
            format!(
                "delete SYS.COL$ (ROWID: {}, OBJ#: {}, SEGCOL#: {}, NAME: '{}')",
                row.row_id, row.obj, row.seg_col, row.name
            ),
        );
        self.touch_table(row.obj);
        self.touched = true;
        Ok(())
    }

    pub fn find_sys_col(&self, row_id: &RowId) -> Option<&SysCol> {
        self.sys_col.get(row_id)
    }

    // ---- SYS.DEFERRED_STG$ ----

    pub fn add_sys_deferred_stg(
        &mut self,
        ctx: &Ctx,
        row_id: &str,
        obj: Obj,
        flags_stg1: u64,
        flags_stg2: u64,
    ) -> Result<()> {
        let row = SysDeferredStg {
            row_id: RowId::new(row_id),
            obj,
            flags_stg: IntX::new(flags_stg1, flags_stg2),
        };
        ctx.log_trace(
            TRACE_SYSTEM,
            format!("insert SYS.DEFERRED_STG$ (ROWID: {}, OBJ#: {obj})", row.row_id),
        );
        self.sys_deferred_stg.insert(row)?;
        self.touch_table(obj);
        self.touched = true;
        Ok(())
    }

    pub fn drop_sys_deferred_stg(&mut self, ctx: &Ctx, row_id: &RowId) -> Result<()> {
        let Some(row) = self.sys_deferred_stg.remove(row_id)? else {
            return Ok(());
        };
        ctx.log_trace(
            TRACE_SYSTEM,
            format!(
                "delete SYS.DEFERRED_STG$ (ROWID: {}, OBJ#: {})",
                row.row_id, row.obj
            ),
        );
        self.touch_table(row.obj);
        self.touched = true;
        Ok(())
    }

    pub fn find_sys_deferred_stg(&self, row_id: &RowId) -> Option<&SysDeferredStg> {
        self.sys_deferred_stg.get(row_id)
    }

    // ---- SYS.ECOL$ ----

    pub fn add_sys_ecol(
        &mut self,
        ctx: &Ctx,
        row_id: &str,
        tab_obj: Obj,
        col_num: Col,
        guard_id: Col,
    ) -> Result<()> {
        let row = SysECol {
            row_id: RowId::new(row_id),
            tab_obj,
            col_num,
            guard_id,
        };
        ctx.log_trace(
            TRACE_SYSTEM,
            format!(
                "insert SYS.ECOL$ (ROWID: {}, TABOBJ#: {tab_obj}, COLNUM: {col_num}, \
                 GUARD_ID: {guard_id})",
                row.row_id
            ),
        );
        self.sys_ecol.insert(row)?;
        self.touch_table(tab_obj);
        self.touched = true;
        Ok(())
    }

    pub fn drop_sys_ecol(&mut self, ctx: &Ctx, row_id: &RowId) -> Result<()> {
        let Some(row) = self.sys_ecol.remove(row_id)? else {
            return Ok(());
        };
        ctx.log_trace(
            TRACE_SYSTEM,
            format!(
                "delete SYS.ECOL$ (ROWID: {}, TABOBJ#: {}, COLNUM: {})",
                row.row_id, row.tab_obj, row.col_num
            ),
        );
        self.touch_table(row.tab_obj);
        self.touched = true;
        Ok(())
    }

    pub fn find_sys_ecol(&self, row_id: &RowId) -> Option<&SysECol> {
        self.sys_ecol.get(row_id)
    }

    // ---- SYS.LOB$ ----

    pub fn add_sys_lob(
        &mut self,
        ctx: &Ctx,
        row_id: &str,
        obj: Obj,
        col: Col,
        int_col: Col,
        l_obj: Obj,
        ts: Ts,
    ) -> Result<()> {
        let row = SysLob {
            row_id: RowId::new(row_id),
            obj,
            col,
            int_col,
            l_obj,
            ts,
        };
        ctx.log_trace(
            TRACE_SYSTEM,
            format!(
                "insert SYS.LOB$ (ROWID: {}, OBJ#: {obj}, COL#: {col}, INTCOL#: {int_col}, \
                 LOBJ#: {l_obj}, TS#: {ts})",
                row.row_id
            ),
        );
        self.sys_lob.insert(row)?;
        self.touch_table(obj);
        self.touched = true;
        Ok(())
    }

    pub fn drop_sys_lob(&mut self, ctx: &Ctx, row_id: &RowId) -> Result<()> {
        let Some(row) = self.sys_lob.remove(row_id)? else {
            return Ok(());
        };
        ctx.log_trace(
            TRACE_SYSTEM,
            format!(
                "delete SYS.LOB$ (ROWID: {}, OBJ#: {}, LOBJ#: {})",
                row.row_id, row.obj, row.l_obj
            ),
        );
        self.touch_table(row.obj);
        self.touched = true;
        Ok(())
    }

    pub fn find_sys_lob(&self, row_id: &RowId) -> Option<&SysLob> {
        self.sys_lob.get(row_id)
    }

    // ---- SYS.LOBCOMPPART$ ----

    pub fn add_sys_lob_comp_part(
        &mut self,
        ctx: &Ctx,
        row_id: &str,
        part_obj: Obj,
        l_obj: Obj,
    ) -> Result<()> {
        let row = SysLobCompPart {
            row_id: RowId::new(row_id),
            part_obj,
            l_obj,
        };
        ctx.log_trace(
            TRACE_SYSTEM,
            format!(
                "insert SYS.LOBCOMPPART$ (ROWID: {}, PARTOBJ#: {part_obj}, LOBJ#: {l_obj})",
                row.row_id
            ),
        );
        self.sys_lob_comp_part.insert(row)?;
        let owner = self.sys_lob.by_alt(&l_obj).map(|lob| lob.obj);
        if let Some(obj) = owner {
            self.touch_table(obj);
        }
        self.touched = true;
        Ok(())
    }

    pub fn drop_sys_lob_comp_part(&mut self, ctx: &Ctx, row_id: &RowId) -> Result<()> {
        let Some(row) = self.sys_lob_comp_part.remove(row_id)? else {
            return Ok(());
        };
        ctx.log_trace(
            TRACE_SYSTEM,
            format!(
                "delete SYS.LOBCOMPPART$ (ROWID: {}, PARTOBJ#: {}, LOBJ#: {})",
                row.row_id, row.part_obj, row.l_obj
            ),
        );
        let owner = self.sys_lob.by_alt(&row.l_obj).map(|lob| lob.obj);
        if let Some(obj) = owner {
            self.touch_table(obj);
        }
        self.touched = true;
        Ok(())
    }

    pub fn find_sys_lob_comp_part(&self, row_id: &RowId) -> Option<&SysLobCompPart> {
        self.sys_lob_comp_part.get(row_id)
    }

    // ---- SYS.LOBFRAG$ ----

    pub fn add_sys_lob_frag(
        &mut self,
        ctx: &Ctx,
        row_id: &str,
        frag_obj: Obj,
        parent_obj: Obj,
        ts: Ts,
    ) -> Result<()> {
        let row = SysLobFrag {
            row_id: RowId::new(row_id),
            frag_obj,
            parent_obj,
            ts,
        };
        ctx.log_trace(
            TRACE_SYSTEM,
            format!(
                "insert SYS.LOBFRAG$ (ROWID: {}, FRAGOBJ#: {frag_obj}, PARENTOBJ#: {parent_obj}, \
                 TS#: {ts})",
                row.row_id
            ),
        );
        self.sys_lob_frag.insert(row)?;
        self.touch_lob_frag_owner(parent_obj);
        self.touched = true;
        Ok(())
    }

    pub fn drop_sys_lob_frag(&mut self, ctx: &Ctx, row_id: &RowId) -> Result<()> {
        let Some(row) = self.sys_lob_frag.remove(row_id)? else {
            return Ok(());
        };
        ctx.log_trace(
            TRACE_SYSTEM,
            format!(
                "delete SYS.LOBFRAG$ (ROWID: {}, FRAGOBJ#: {}, PARENTOBJ#: {})",
                row.row_id, row.frag_obj, row.parent_obj
            ),
        );
        self.touch_lob_frag_owner(row.parent_obj);
        self.touched = true;
        Ok(())
    }

    pub fn find_sys_lob_frag(&self, row_id: &RowId) -> Option<&SysLobFrag> {
        self.sys_lob_frag.get(row_id)
    }

    /// A fragment parent is either a LOB segment or a composite partition
    /// group; follow both paths to the owning table.
    fn touch_lob_frag_owner(&mut self, parent_obj: Obj) {
        let via_comp_part = self
            .sys_lob_comp_part
            .by_alt(&parent_obj)
            .and_then(|part| self.sys_lob.by_alt(&part.l_obj))
            .map(|lob| lob.obj);
        if let Some(obj) = via_comp_part {
            self.touch_table(obj);
        }
        let direct = self.sys_lob.by_alt(&parent_obj).map(|lob| lob.obj);
        if let Some(obj) = direct {
            self.touch_table(obj);
        }
    }

    // ---- SYS.OBJ$ ----

    /// Returns `false` when the row already exists and is not eligible for
    /// the single-flag merge; `true` otherwise. A stored `single` row seen
    /// again with `single = false` keeps the row and clears the flag.
    #[allow(clippy::too_many_arguments)]
    pub fn add_sys_obj(
        &mut self,
        ctx: &Ctx,
        row_id: &str,
        owner: UserId,
        obj: Obj,
        data_obj: DataObj,
        obj_type: u16,
        name: &str,
        flags1: u64,
        flags2: u64,
        single: bool,
    ) -> Result<bool> {
        let row_id = RowId::new(row_id);
        if let Some(existing) = self.sys_obj.get_mut(&row_id) {
            if existing.single {
                if !single {
                    existing.single = false;
                    ctx.log_trace(
                        TRACE_SYSTEM,
                        format!("disabling single option for object {name} (owner {owner})"),
                    );
                }
                return Ok(true);
            }
            return Ok(false);
        }

        if name.len() > MAX_NAME_LENGTH {
            return Err(RedomineError::data(
                50025,
                format!(
                    "value of SYS.OBJ$ too long for NAME (value: '{name}', length: {})",
                    name.len()
                ),
            ));
        }
        let row = SysObj {
            row_id,
            owner,
            obj,
            data_obj,
            obj_type,
            name: name.to_owned(),
            flags: IntX::new(flags1, flags2),
            single,
        };
        ctx.log_trace(
            TRACE_SYSTEM,
            format!(
                "insert SYS.OBJ$ (ROWID: {}, OWNER#: {owner}, OBJ#: {obj}, DATAOBJ#: {data_obj}, \
                 TYPE#: {obj_type}, NAME: '{name}')",
                row.row_id
            ),
        );
        self.sys_obj.insert(row)?;
        self.touch_table(obj);
        self.touched = true;
        Ok(true)
    }

    pub fn drop_sys_obj(&mut self, ctx: &Ctx, row_id: &RowId) -> Result<()> {
        let Some(row) = self.sys_obj.remove(row_id)? else {
            return Ok(());
        };
        ctx.log_trace(
            TRACE_SYSTEM,
            format!(
                "delete SYS.OBJ$ (ROWID: {}, OWNER#: {}, OBJ#: {}, NAME: '{}')",
                row.row_id, row.owner, row.obj, row.name
            ),
        );
        self.touch_table(row.obj);
        self.touched = true;
        Ok(())
    }

    pub fn find_sys_obj(&self, row_id: &RowId) -> Option<&SysObj> {
        self.sys_obj.get(row_id)
    }

    pub fn sys_obj_by_obj(&self, obj: Obj) -> Option<&SysObj> {
        self.sys_obj.by_alt(&obj)
    }

    // ---- SYS.TAB$ ----

    #[allow(clippy::too_many_arguments)]
    pub fn add_sys_tab(
        &mut self,
        ctx: &Ctx,
        row_id: &str,
        obj: Obj,
        data_obj: DataObj,
        ts: Ts,
        clu_cols: Col,
        flags1: u64,
        flags2: u64,
        property1: u64,
        property2: u64,
    ) -> Result<()> {
        let row = SysTab {
            row_id: RowId::new(row_id),
            obj,
            data_obj,
            ts,
            clu_cols,
            flags: IntX::new(flags1, flags2),
            property: IntX::new(property1, property2),
        };
        ctx.log_trace(
            TRACE_SYSTEM,
            format!(
                "insert SYS.TAB$ (ROWID: {}, OBJ#: {obj}, DATAOBJ#: {data_obj}, \
                 CLUCOLS: {clu_cols})",
                row.row_id
            ),
        );
        self.sys_tab.insert(row)?;
        self.touch_table(obj);
        self.touched = true;
        Ok(())
    }

    pub fn drop_sys_tab(&mut self, ctx: &Ctx, row_id: &RowId) -> Result<()> {
        let Some(row) = self.sys_tab.remove(row_id)? else {
            return Ok(());
        };
        ctx.log_trace(
            TRACE_SYSTEM,
            format!(
                "delete SYS.TAB$ (ROWID: {}, OBJ#: {}, DATAOBJ#: {})",
                row.row_id, row.obj, row.data_obj
            ),
        );
        self.touch_table(row.obj);
        self.touched = true;
        Ok(())
    }

    pub fn find_sys_tab(&self, row_id: &RowId) -> Option<&SysTab> {
        self.sys_tab.get(row_id)
    }

    // ---- SYS.TABCOMPART$ ----

    pub fn add_sys_tab_com_part(
        &mut self,
        ctx: &Ctx,
        row_id: &str,
        obj: Obj,
        data_obj: DataObj,
        bo: Obj,
    ) -> Result<()> {
        let row = SysTabComPart {
            row_id: RowId::new(row_id),
            obj,
            data_obj,
            bo,
        };
        ctx.log_trace(
            TRACE_SYSTEM,
            format!(
                "insert SYS.TABCOMPART$ (ROWID: {}, OBJ#: {obj}, DATAOBJ#: {data_obj}, BO#: {bo})",
                row.row_id
            ),
        );
        self.sys_tab_com_part.insert(row)?;
        self.touch_table(bo);
        self.touched = true;
        Ok(())
    }

    pub fn drop_sys_tab_com_part(&mut self, ctx: &Ctx, row_id: &RowId) -> Result<()> {
        let Some(row) = self.sys_tab_com_part.remove(row_id)? else {
            return Ok(());
        };
        ctx.log_trace(
            TRACE_SYSTEM,
            format!(
                "delete SYS.TABCOMPART$ (ROWID: {}, OBJ#: {}, BO#: {})",
                row.row_id, row.obj, row.bo
            ),
        );
        self.touch_table(row.bo);
        self.touched = true;
        Ok(())
    }

    pub fn find_sys_tab_com_part(&self, row_id: &RowId) -> Option<&SysTabComPart> {
        self.sys_tab_com_part.get(row_id)
    }

    // ---- SYS.TABPART$ ----

    pub fn add_sys_tab_part(
        &mut self,
        ctx: &Ctx,
        row_id: &str,
        obj: Obj,
        data_obj: DataObj,
        bo: Obj,
    ) -> Result<()> {
        let row = SysTabPart {
            row_id: RowId::new(row_id),
            obj,
            data_obj,
            bo,
        };
        ctx.log_trace(
            TRACE_SYSTEM,
            format!(
                "insert SYS.TABPART$ (ROWID: {}, OBJ#: {obj}, DATAOBJ#: {data_obj}, BO#: {bo})",
                row.row_id
            ),
        );
        self.sys_tab_part.insert(row)?;
        self.touch_table(bo);
        self.touched = true;
        Ok(())
    }

    pub fn drop_sys_tab_part(&mut self, ctx: &Ctx, row_id: &RowId) -> Result<()> {
        let Some(row) = self.sys_tab_part.remove(row_id)? else {
            return Ok(());
        };
        ctx.log_trace(
            TRACE_SYSTEM,
            format!(
                "delete SYS.TABPART$ (ROWID: {}, OBJ#: {}, BO#: {})",
                row.row_id, row.obj, row.bo
            ),
        );
        self.touch_table(row.bo);
        self.touched = true;
        Ok(())
    }

    pub fn find_sys_tab_part(&self, row_id: &RowId) -> Option<&SysTabPart> {
        self.sys_tab_part.get(row_id)
    }

    // ---- SYS.TABSUBPART$ ----

    pub fn add_sys_tab_sub_part(
        &mut self,
        ctx: &Ctx,
        row_id: &str,
        obj: Obj,
        data_obj: DataObj,
        p_obj: Obj,
    ) -> Result<()> {
        let row = SysTabSubPart {
            row_id: RowId::new(row_id),
            obj,
            data_obj,
            p_obj,
        };
        ctx.log_trace(
            TRACE_SYSTEM,
            format!(
                "insert SYS.TABSUBPART$ (ROWID: {}, OBJ#: {obj}, DATAOBJ#: {data_obj}, \
                 POBJ#: {p_obj})",
                row.row_id
            ),
        );
        self.sys_tab_sub_part.insert(row)?;
        if self.sys_obj.by_alt(&obj).is_some() {
            self.touch_table(obj);
        }
        self.touched = true;
        Ok(())
    }

    pub fn drop_sys_tab_sub_part(&mut self, ctx: &Ctx, row_id: &RowId) -> Result<()> {
        let Some(row) = self.sys_tab_sub_part.remove(row_id)? else {
            return Ok(());
        };
        ctx.log_trace(
            TRACE_SYSTEM,
            format!(
                "delete SYS.TABSUBPART$ (ROWID: {}, OBJ#: {}, POBJ#: {})",
                row.row_id, row.obj, row.p_obj
            ),
        );
        if self.sys_obj.by_alt(&row.obj).is_some() {
            self.touch_table(row.obj);
        }
        self.touched = true;
        Ok(())
    }

    pub fn find_sys_tab_sub_part(&self, row_id: &RowId) -> Option<&SysTabSubPart> {
        self.sys_tab_sub_part.get(row_id)
    }

    // ---- SYS.TS$ ----

    pub fn add_sys_ts(
        &mut self,
        ctx: &Ctx,
        row_id: &str,
        ts: Ts,
        name: &str,
        block_size: u32,
    ) -> Result<()> {
        let row = SysTs {
            row_id: RowId::new(row_id),
            ts,
            name: name.to_owned(),
            block_size,
        };
        ctx.log_trace(
            TRACE_SYSTEM,
            format!(
                "insert SYS.TS$ (ROWID: {}, TS#: {ts}, NAME: '{name}', BLOCKSIZE: {block_size})",
                row.row_id
            ),
        );
        self.sys_ts.insert(row)?;
        self.touched = true;
        Ok(())
    }

    pub fn drop_sys_ts(&mut self, ctx: &Ctx, row_id: &RowId) -> Result<()> {
        let Some(row) = self.sys_ts.remove(row_id)? else {
            return Ok(());
        };
        ctx.log_trace(
            TRACE_SYSTEM,
            format!(
                "delete SYS.TS$ (ROWID: {}, TS#: {}, NAME: '{}')",
                row.row_id, row.ts, row.name
            ),
        );
        self.touched = true;
        Ok(())
    }

    pub fn find_sys_ts(&self, row_id: &RowId) -> Option<&SysTs> {
        self.sys_ts.get(row_id)
    }

    // ---- SYS.USER$ ----

    /// Same single-flag contract as [`Schema::add_sys_obj`].
    pub fn add_sys_user(
        &mut self,
        ctx: &Ctx,
        row_id: &str,
        user: UserId,
        name: &str,
        spare11: u64,
        spare12: u64,
        single: bool,
    ) -> Result<bool> {
        let row_id = RowId::new(row_id);
        if let Some(existing) = self.sys_user.get_mut(&row_id) {
            if existing.single {
                if !single {
                    existing.single = false;
                    ctx.log_trace(
                        TRACE_SYSTEM,
                        format!("disabling single option for user {name} ({user})"),
                    );
                }
                return Ok(true);
            }
            return Ok(false);
        }

        if name.len() > MAX_NAME_LENGTH {
            return Err(RedomineError::data(
                50025,
                format!(
                    "value of SYS.USER$ too long for NAME (value: '{name}', length: {})",
                    name.len()
                ),
            ));
        }
        let row = SysUser {
            row_id,
            user,
            name: name.to_owned(),
            spare1: IntX::new(spare11, spare12),
            single,
        };
        ctx.log_trace(
            TRACE_SYSTEM,
            format!(
                "insert SYS.USER$ (ROWID: {}, USER#: {user}, NAME: {name})",
                row.row_id
            ),
        );
        self.sys_user.insert(row)?;
        self.touched = true;
        Ok(true)
    }

    pub fn drop_sys_user(&mut self, ctx: &Ctx, row_id: &RowId) -> Result<()> {
        let Some(row) = self.sys_user.remove(row_id)? else {
            return Ok(());
        };
        ctx.log_trace(
            TRACE_SYSTEM,
            format!(
                "delete SYS.USER$ (ROWID: {}, USER#: {}, NAME: {})",
                row.row_id, row.user, row.name
            ),
        );
        self.touched = true;
        Ok(())
    }

    pub fn find_sys_user(&self, row_id: &RowId) -> Option<&SysUser> {
        self.sys_user.get(row_id)
    }

    // ---- descriptor maps ----

    /// Publishes a materialized descriptor into the dictionary maps.
    pub fn add_table_to_dict(&mut self, table: OracleTable) -> Result<()> {
        let obj = table.obj;
        if self.table_map.contains_key(&obj) {
            return Err(RedomineError::data(
                50031,
                format!(
                    "can't add table (obj: {obj}, dataobj: {})",
                    table.data_obj
                ),
            ));
        }

        for (lob_idx, lob) in table.lobs.iter().enumerate() {
            let handle = LobRef {
                table: obj,
                lob: lob_idx,
            };
            for &data_obj in &lob.lob_indexes {
                if self.lob_index_map.insert(data_obj, handle).is_some() {
                    return Err(RedomineError::data(
                        50032,
                        format!("can't add lob index element (dataobj: {data_obj})"),
                    ));
                }
            }
            for &(data_obj, _) in &lob.lob_partitions {
                self.lob_partition_map.entry(data_obj).or_insert(handle);
            }
        }

        if self.table_partition_map.insert(obj, obj).is_some() {
            return Err(RedomineError::data(
                50033,
                format!(
                    "can't add partition (obj: {obj}, dataobj: {})",
                    table.data_obj
                ),
            ));
        }
        for &packed in &table.table_partitions {
            let (part_obj, part_data_obj) = unpack_obj2(packed);
            if self.table_partition_map.insert(part_obj, obj).is_some() {
                return Err(RedomineError::data(
                    50034,
                    format!(
                        "can't add partition element (obj: {part_obj}, dataobj: {part_data_obj})"
                    ),
                ));
            }
        }

        self.table_map.insert(obj, table);
        Ok(())
    }

    /// Reverses `add_table_to_dict`, returning the descriptor.
    pub fn remove_table_from_dict(&mut self, obj: Obj) -> Result<OracleTable> {
        let Some(table) = self.table_map.get(&obj) else {
            return Err(RedomineError::data(
                50038,
                format!("can't remove table (obj: {obj})"),
            ));
        };

        if self.table_partition_map.remove(&obj).is_none() {
            return Err(RedomineError::data(
                50035,
                format!(
                    "can't remove partition (obj: {obj}, dataobj: {})",
                    table.data_obj
                ),
            ));
        }
        for &packed in &table.table_partitions {
            let (part_obj, part_data_obj) = unpack_obj2(packed);
            if self.table_partition_map.remove(&part_obj).is_none() {
                return Err(RedomineError::data(
                    50036,
                    format!(
                        "can't remove table partition element (obj: {part_obj}, \
                         dataobj: {part_data_obj})"
                    ),
                ));
            }
        }
        for lob in &table.lobs {
            for &data_obj in &lob.lob_indexes {
                if self.lob_index_map.remove(&data_obj).is_none() {
                    return Err(RedomineError::data(
                        50037,
                        format!("can't remove lob index element (dataobj: {data_obj})"),
                    ));
                }
            }
            for &(data_obj, _) in &lob.lob_partitions {
                self.lob_partition_map.remove(&data_obj);
            }
        }

        self.table_map.remove(&obj).ok_or_else(|| {
            RedomineError::data(50038, format!("can't remove table (obj: {obj})"))
        })
    }

    /// Table descriptor owning `obj`, resolving partitions and
    /// subpartitions to their parent.
    pub fn check_table_dict(&self, obj: Obj) -> Option<&OracleTable> {
        let owner = self.table_partition_map.get(&obj)?;
        self.table_map.get(owner)
    }

    pub fn check_lob_dict(&self, data_obj: DataObj) -> Option<&OracleLob> {
        self.resolve_lob(self.lob_partition_map.get(&data_obj)?)
    }

    pub fn check_lob_index_dict(&self, data_obj: DataObj) -> Option<&OracleLob> {
        self.resolve_lob(self.lob_index_map.get(&data_obj)?)
    }

    fn resolve_lob(&self, handle: &LobRef) -> Option<&OracleLob> {
        self.table_map.get(&handle.table)?.lobs.get(handle.lob)
    }

    // ---- reconciliation ----

    /// Reconciliation pass run after materialization: rebuilds nothing,
    /// only drops touched rows whose owning object no longer exists.
    /// Dropped descriptors are reported through `msgs`.
    pub fn drop_unused_metadata(
        &mut self,
        ctx: &Ctx,
        users: &HashSet<String>,
        msgs: &mut Vec<String>,
    ) -> Result<()> {
        let touched_tables: Vec<Obj> = self.tables_touched.iter().copied().collect();
        self.tables_touched.clear();
        for obj in touched_tables {
            if let Some(table) = self.table_map.get(&obj) {
                msgs.push(format!(
                    "{}.{} (dataobj: {}, obj: {}) ",
                    table.owner_name, table.name, table.data_obj, table.obj
                ));
                self.remove_table_from_dict(obj)?;
            }
        }

        for row_id in self.sys_user.take_touched() {
            let keep = match self.sys_user.get(&row_id) {
                None => continue,
                Some(user) => users.contains(&user.name),
            };
            if !keep {
                self.drop_sys_user(ctx, &row_id)?;
            }
        }

        for row_id in self.sys_obj.take_touched() {
            let keep = match self.sys_obj.get(&row_id) {
                None => continue,
                Some(obj_row) => self.sys_user.by_key(&obj_row.owner).is_some(),
            };
            if keep || !ctx.flag(REDO_FLAGS_ADAPTIVE_SCHEMA) {
                continue;
            }
            self.drop_sys_obj(ctx, &row_id)?;
        }

        for row_id in self.sys_ccol.take_touched() {
            let keep = match self.sys_ccol.get(&row_id) {
                None => continue,
                Some(row) => self.sys_obj.by_alt(&row.obj).is_some(),
            };
            if !keep {
                self.drop_sys_ccol(ctx, &row_id)?;
            }
        }

        for row_id in self.sys_cdef.take_touched() {
            let keep = match self.sys_cdef.get(&row_id) {
                None => continue,
                Some(row) => self.sys_obj.by_alt(&row.obj).is_some(),
            };
            if !keep {
                self.drop_sys_cdef(ctx, &row_id)?;
            }
        }

        for row_id in self.sys_col.take_touched() {
            let keep = match self.sys_col.get(&row_id) {
                None => continue,
                Some(row) => self.sys_obj.by_alt(&row.obj).is_some(),
            };
            if !keep {
                self.drop_sys_col(ctx, &row_id)?;
            }
        }

        for row_id in self.sys_deferred_stg.take_touched() {
            let keep = match self.sys_deferred_stg.get(&row_id) {
                None => continue,
                Some(row) => self.sys_obj.by_alt(&row.obj).is_some(),
            };
            if !keep {
                self.drop_sys_deferred_stg(ctx, &row_id)?;
            }
        }

        for row_id in self.sys_ecol.take_touched() {
            let keep = match self.sys_ecol.get(&row_id) {
                None => continue,
                Some(row) => self.sys_obj.by_alt(&row.tab_obj).is_some(),
            };
            if !keep {
                self.drop_sys_ecol(ctx, &row_id)?;
            }
        }

        for row_id in self.sys_lob.take_touched() {
            let keep = match self.sys_lob.get(&row_id) {
                None => continue,
                Some(row) => self.sys_obj.by_alt(&row.obj).is_some(),
            };
            if !keep {
                self.drop_sys_lob(ctx, &row_id)?;
            }
        }

        for row_id in self.sys_lob_comp_part.take_touched() {
            let keep = match self.sys_lob_comp_part.get(&row_id) {
                None => continue,
                Some(row) => self.sys_lob.by_alt(&row.l_obj).is_some(),
            };
            if !keep {
                self.drop_sys_lob_comp_part(ctx, &row_id)?;
            }
        }

        for row_id in self.sys_lob_frag.take_touched() {
            let keep = match self.sys_lob_frag.get(&row_id) {
                None => continue,
                Some(row) => {
                    self.sys_lob_comp_part.by_alt(&row.parent_obj).is_some()
                        || self.sys_lob.by_alt(&row.parent_obj).is_some()
                }
            };
            if !keep {
                self.drop_sys_lob_frag(ctx, &row_id)?;
            }
        }

        for row_id in self.sys_tab.take_touched() {
            let keep = match self.sys_tab.get(&row_id) {
                None => continue,
                Some(row) => self.sys_obj.by_alt(&row.obj).is_some(),
            };
            if !keep {
                self.drop_sys_tab(ctx, &row_id)?;
            }
        }

        for row_id in self.sys_tab_com_part.take_touched() {
            let keep = match self.sys_tab_com_part.get(&row_id) {
                None => continue,
                Some(row) => self.sys_obj.by_alt(&row.obj).is_some(),
            };
            if !keep {
                self.drop_sys_tab_com_part(ctx, &row_id)?;
            }
        }

        for row_id in self.sys_tab_part.take_touched() {
            let keep = match self.sys_tab_part.get(&row_id) {
                None => continue,
                Some(row) => self.sys_obj.by_alt(&row.bo).is_some(),
            };
            if !keep {
                self.drop_sys_tab_part(ctx, &row_id)?;
            }
        }

        for row_id in self.sys_tab_sub_part.take_touched() {
            let keep = match self.sys_tab_sub_part.get(&row_id) {
                None => continue,
                Some(row) => self.sys_obj.by_alt(&row.obj).is_some(),
            };
            if !keep {
                self.drop_sys_tab_sub_part(ctx, &row_id)?;
            }
        }

        Ok(())
    }

    /// Clears every touch set; invoked once the materializer has consumed
    /// them at a quiescence boundary.
    pub fn reset_touched(&mut self) {
        self.tables_touched.clear();
        self.identifiers_touched.clear();
        self.sys_ccol.clear_touched();
        self.sys_cdef.clear_touched();
        self.sys_col.clear_touched();
        self.sys_deferred_stg.clear_touched();
        self.sys_ecol.clear_touched();
        self.sys_lob.clear_touched();
        self.sys_lob_comp_part.clear_touched();
        self.sys_lob_frag.clear_touched();
        self.sys_obj.clear_touched();
        self.sys_tab.clear_touched();
        self.sys_tab_com_part.clear_touched();
        self.sys_tab_part.clear_touched();
        self.sys_tab_sub_part.clear_touched();
        self.sys_ts.clear_touched();
        self.sys_user.clear_touched();
        self.touched = false;
    }

    /// Tears the shadow down through the regular drop paths, then verifies
    /// every secondary and descriptor map drained with them. Residue is a
    /// dictionary invariant violation, reported as error 50029 through the
    /// Ctx hook. Idempotent.
    pub fn purge(&mut self, ctx: &Ctx) -> Result<()> {
        self.scn = ZERO_SCN;

        while let Some(obj) = self.table_map.keys().next().copied() {
            self.remove_table_from_dict(obj)?;
        }
        if !self.lob_partition_map.is_empty() {
            ctx.error(
                50029,
                format!(
                    "schema lob partition map not empty, left: {} at exit",
                    self.lob_partition_map.len()
                ),
            );
            self.lob_partition_map.clear();
        }
        if !self.lob_index_map.is_empty() {
            ctx.error(
                50029,
                format!(
                    "schema lob index map not empty, left: {} at exit",
                    self.lob_index_map.len()
                ),
            );
            self.lob_index_map.clear();
        }
        if !self.table_partition_map.is_empty() {
            ctx.error(
                50029,
                format!(
                    "schema table partition map not empty, left: {} at exit",
                    self.table_partition_map.len()
                ),
            );
            self.table_partition_map.clear();
        }

        while let Some(row_id) = self.sys_ccol.any_row_id() {
            self.drop_sys_ccol(ctx, &row_id)?;
        }
        report_residue(ctx, &mut self.sys_ccol);
        while let Some(row_id) = self.sys_cdef.any_row_id() {
            self.drop_sys_cdef(ctx, &row_id)?;
        }
        report_residue(ctx, &mut self.sys_cdef);
        while let Some(row_id) = self.sys_col.any_row_id() {
            self.drop_sys_col(ctx, &row_id)?;
        }
        report_residue(ctx, &mut self.sys_col);
        while let Some(row_id) = self.sys_deferred_stg.any_row_id() {
            self.drop_sys_deferred_stg(ctx, &row_id)?;
        }
        report_residue(ctx, &mut self.sys_deferred_stg);
        while let Some(row_id) = self.sys_ecol.any_row_id() {
            self.drop_sys_ecol(ctx, &row_id)?;
        }
        report_residue(ctx, &mut self.sys_ecol);
        while let Some(row_id) = self.sys_lob.any_row_id() {
            self.drop_sys_lob(ctx, &row_id)?;
        }
        report_residue(ctx, &mut self.sys_lob);
        while let Some(row_id) = self.sys_lob_comp_part.any_row_id() {
            self.drop_sys_lob_comp_part(ctx, &row_id)?;
        }
        report_residue(ctx, &mut self.sys_lob_comp_part);
        while let Some(row_id) = self.sys_lob_frag.any_row_id() {
            self.drop_sys_lob_frag(ctx, &row_id)?;
        }
        report_residue(ctx, &mut self.sys_lob_frag);
        while let Some(row_id) = self.sys_obj.any_row_id() {
            self.drop_sys_obj(ctx, &row_id)?;
        }
        report_residue(ctx, &mut self.sys_obj);
        while let Some(row_id) = self.sys_tab.any_row_id() {
            self.drop_sys_tab(ctx, &row_id)?;
        }
        report_residue(ctx, &mut self.sys_tab);
        while let Some(row_id) = self.sys_tab_com_part.any_row_id() {
            self.drop_sys_tab_com_part(ctx, &row_id)?;
        }
        report_residue(ctx, &mut self.sys_tab_com_part);
        while let Some(row_id) = self.sys_tab_part.any_row_id() {
            self.drop_sys_tab_part(ctx, &row_id)?;
        }
        report_residue(ctx, &mut self.sys_tab_part);
        while let Some(row_id) = self.sys_tab_sub_part.any_row_id() {
            self.drop_sys_tab_sub_part(ctx, &row_id)?;
        }
        report_residue(ctx, &mut self.sys_tab_sub_part);
        while let Some(row_id) = self.sys_ts.any_row_id() {
            self.drop_sys_ts(ctx, &row_id)?;
        }
        report_residue(ctx, &mut self.sys_ts);
        while let Some(row_id) = self.sys_user.any_row_id() {
            self.drop_sys_user(ctx, &row_id)?;
        }
        report_residue(ctx, &mut self.sys_user);

        self.reset_touched();
        Ok(())
    }

    // ---- comparison / reload ----

    /// Set-equality over every store; used to validate a reloaded shadow
    /// against freshly mined state. On success `msgs` is cleared; on
    /// failure it names the first diverging store and ROWID.
    pub fn compare(&self, other: &Schema, msgs: &mut String) -> bool {
        if !self.sys_ccol.compare(&other.sys_ccol, msgs) {
            return false;
        }
        if !self.sys_cdef.compare(&other.sys_cdef, msgs) {
            return false;
        }
        if !self.sys_col.compare(&other.sys_col, msgs) {
            return false;
        }
        if !self.sys_deferred_stg.compare(&other.sys_deferred_stg, msgs) {
            return false;
        }
        if !self.sys_ecol.compare(&other.sys_ecol, msgs) {
            return false;
        }
        if !self.sys_lob.compare(&other.sys_lob, msgs) {
            return false;
        }
        if !self.sys_lob_comp_part.compare(&other.sys_lob_comp_part, msgs) {
            return false;
        }
        if !self.sys_lob_frag.compare(&other.sys_lob_frag, msgs) {
            return false;
        }
        if !self.sys_obj.compare(&other.sys_obj, msgs) {
            return false;
        }
        if !self.sys_tab.compare(&other.sys_tab, msgs) {
            return false;
        }
        if !self.sys_tab_com_part.compare(&other.sys_tab_com_part, msgs) {
            return false;
        }
        if !self.sys_tab_part.compare(&other.sys_tab_part, msgs) {
            return false;
        }
        if !self.sys_tab_sub_part.compare(&other.sys_tab_sub_part, msgs) {
            return false;
        }
        if !self.sys_ts.compare(&other.sys_ts, msgs) {
            return false;
        }
        if !self.sys_user.compare(&other.sys_user, msgs) {
            return false;
        }
        msgs.clear();
        true
    }

    /// Rebuilds every secondary index after deserializing a checkpoint.
    pub fn reindex(&mut self) -> Result<()> {
        self.sys_ccol.reindex()?;
        self.sys_cdef.reindex()?;
        self.sys_col.reindex()?;
        self.sys_deferred_stg.reindex()?;
        self.sys_ecol.reindex()?;
        self.sys_lob.reindex()?;
        self.sys_lob_comp_part.reindex()?;
        self.sys_lob_frag.reindex()?;
        self.sys_obj.reindex()?;
        self.sys_tab.reindex()?;
        self.sys_tab_com_part.reindex()?;
        self.sys_tab_part.reindex()?;
        self.sys_tab_sub_part.reindex()?;
        self.sys_ts.reindex()?;
        self.sys_user.reindex()?;
        Ok(())
    }

    /// Marks every dictionary object touched so the next materializer pass
    /// rebuilds all descriptors; used after reloading a checkpoint.
    pub fn touch_all(&mut self) {
        let objs: Vec<Obj> = self.sys_obj.rows().map(|row| row.obj).collect();
        for obj in objs {
            self.identifiers_touched.insert(obj);
        }
        self.touched = true;
    }
}

fn report_residue<R: DictRow>(ctx: &Ctx, store: &mut DictStore<R>) {
    let (keys, alts) = store.index_residue();
    if keys > 0 {
        ctx.error(
            50029,
            format!("key map {} not empty, left: {keys} at exit", R::TABLE),
        );
    }
    if alts > 0 {
        ctx.error(
            50029,
            format!("secondary map {} not empty, left: {alts} at exit", R::TABLE),
        );
    }
    store.clear_indexes();
    store.clear_touched();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::schema::row::SysObj;

    fn ctx() -> Ctx {
        Ctx::new(&EngineConfig::default())
    }

    #[test]
    fn obj_round_trip_leaves_no_residue() {
        let ctx = ctx();
        let mut schema = Schema::new();
        assert!(schema
            .add_sys_obj(
                &ctx,
                "AAAA",
                5,
                100,
                101,
                SysObj::TYPE_TABLE,
                "T1",
                0,
                0,
                true
            )
            .unwrap());

        let found = schema.find_sys_obj(&RowId::new("AAAA")).unwrap();
        assert_eq!(found.obj, 100);
        assert_eq!(schema.sys_obj_by_obj(100).unwrap().row_id, RowId::new("AAAA"));

        schema.drop_sys_obj(&ctx, &RowId::new("AAAA")).unwrap();
        assert!(schema.find_sys_obj(&RowId::new("AAAA")).is_none());
        assert!(schema.sys_obj_by_obj(100).is_none());

        schema.purge(&ctx).unwrap();
        assert_eq!(ctx.diagnostic_count(50029), 0);
    }

    #[test]
    fn duplicate_ccol_row_id_raises_50023() {
        let ctx = ctx();
        let mut schema = Schema::new();
        schema.add_sys_ccol(&ctx, "AAAA", 1, 1, 100, 0, 0).unwrap();
        let err = schema
            .add_sys_ccol(&ctx, "AAAA", 2, 2, 100, 0, 0)
            .unwrap_err();
        assert_eq!(err.code(), 50023);
    }

    #[test]
    fn user_single_flag_merge() {
        let ctx = ctx();
        let mut schema = Schema::new();
        assert!(schema.add_sys_user(&ctx, "U1", 7, "A", 0, 0, true).unwrap());
        assert!(schema.add_sys_user(&ctx, "U1", 7, "A", 0, 0, false).unwrap());
        assert!(!schema.find_sys_user(&RowId::new("U1")).unwrap().single);
        // the flag is already cleared, a further add is a plain duplicate
        assert!(!schema.add_sys_user(&ctx, "U1", 7, "A", 0, 0, false).unwrap());
        assert!(!schema.find_sys_user(&RowId::new("U1")).unwrap().single);
    }

    #[test]
    fn touch_follows_lob_ownership() {
        let ctx = ctx();
        let mut schema = Schema::new();
        schema.add_sys_lob(&ctx, "L1", 500, 1, 1, 900, 4).unwrap();
        schema.identifiers_touched.clear();

        schema.add_sys_lob_comp_part(&ctx, "LC", 910, 900).unwrap();
        assert!(schema.identifiers_touched.contains(&500));

        schema.identifiers_touched.clear();
        schema.add_sys_lob_frag(&ctx, "LF", 920, 910, 4).unwrap();
        assert!(schema.identifiers_touched.contains(&500));
    }

    #[test]
    fn drop_unused_metadata_respects_user_list() {
        let ctx = ctx();
        let mut schema = Schema::new();
        schema.add_sys_user(&ctx, "U1", 7, "HR", 0, 0, false).unwrap();
        schema.add_sys_user(&ctx, "U2", 8, "OLD", 0, 0, false).unwrap();

        let users = HashSet::from(["HR".to_string()]);
        let mut msgs = Vec::new();
        schema.drop_unused_metadata(&ctx, &users, &mut msgs).unwrap();

        assert!(schema.find_sys_user(&RowId::new("U1")).is_some());
        assert!(schema.find_sys_user(&RowId::new("U2")).is_none());
    }

    #[test]
    fn drop_unused_metadata_reclaims_orphan_rows() {
        let ctx = ctx();
        let mut schema = Schema::new();
        // TAB$ row without a matching OBJ$ entry
        schema
            .add_sys_tab(&ctx, "T1", 600, 601, 4, 0, 0, 0, 0, 0)
            .unwrap();
        let mut msgs = Vec::new();
        schema
            .drop_unused_metadata(&ctx, &HashSet::new(), &mut msgs)
            .unwrap();
        assert!(schema.find_sys_tab(&RowId::new("T1")).is_none());
    }

    #[test]
    fn compare_is_symmetric_and_reports_first_divergence() {
        let ctx = ctx();
        let mut a = Schema::new();
        let mut b = Schema::new();
        a.add_sys_ts(&ctx, "TS1", 4, "USERS", 8192, ).unwrap();
        b.add_sys_ts(&ctx, "TS1", 4, "USERS", 8192).unwrap();

        let mut msgs = String::from("stale");
        assert!(a.compare(&b, &mut msgs));
        assert!(msgs.is_empty());
        assert!(b.compare(&a, &mut msgs));

        b.add_sys_user(&ctx, "U1", 7, "HR", 0, 0, false).unwrap();
        assert!(!a.compare(&b, &mut msgs));
        assert!(msgs.contains("SYS.USER$ lost ROWID: U1"));
        assert!(!b.compare(&a, &mut msgs));
    }

    #[test]
    fn schema_serde_round_trip_compares_equal() {
        let ctx = ctx();
        let mut schema = Schema::new();
        schema.scn = 12345;
        schema
            .add_sys_obj(&ctx, "AAAA", 5, 100, 101, SysObj::TYPE_TABLE, "T1", 0, 0, false)
            .unwrap();
        schema
            .add_sys_tab(&ctx, "BBBB", 100, 101, 4, 0, 0, 0, 0, 0)
            .unwrap();

        let json = serde_json::to_string(&schema).unwrap();
        let mut back: Schema = serde_json::from_str(&json).unwrap();
        back.reindex().unwrap();

        assert_eq!(back.scn, 12345);
        let mut msgs = String::new();
        assert!(schema.compare(&back, &mut msgs), "{msgs}");
        assert_eq!(back.sys_obj_by_obj(100).unwrap().name, "T1");
    }

    #[test]
    fn purge_is_idempotent() {
        let ctx = ctx();
        let mut schema = Schema::new();
        schema.add_sys_user(&ctx, "U1", 7, "HR", 0, 0, false).unwrap();
        schema.purge(&ctx).unwrap();
        schema.purge(&ctx).unwrap();
        assert_eq!(ctx.diagnostic_count(50029), 0);
        assert!(schema.sys_user.is_empty());
    }
}
