//! Materialization of table descriptors from the dictionary shadow.

use crate::ctx::{Ctx, DISABLE_CHECKS_SUPPLEMENTAL_LOG, REDO_FLAGS_ADAPTIVE_SCHEMA, TRACE_LOB};
use crate::error::{RedomineError, Result};
use crate::locales::Locales;
use crate::schema::row::SysCol;
use crate::schema::table::{OracleColumn, OracleLob, OracleTable, TableOptions, OPTIONS_SYSTEM_TABLE};
use crate::schema::Schema;
use crate::types::{Col, Obj, Ts};
use regex::Regex;

/// Owner/table filters are full matches, not substring searches.
fn anchored(pattern: &str) -> Result<Regex> {
    Regex::new(&format!("^(?:{pattern})$")).map_err(|err| {
        RedomineError::runtime(10040, format!("invalid filter regex '{pattern}': {err}"))
    })
}

impl Schema {
    /// Builds table descriptors for every touched dictionary object whose
    /// owner and name match the given filters, and publishes them into the
    /// dictionary maps.
    ///
    /// `keys` replaces primary-key detection with an explicit column list;
    /// `keys_str` is its display form used in diagnostics. Skipped objects
    /// are reported through `msgs` at debug level, one distinct reason
    /// each; every materialized table gets a summary message.
    #[allow(clippy::too_many_arguments)]
    pub fn build_maps(
        &mut self,
        ctx: &Ctx,
        locales: &Locales,
        owner: &str,
        table_filter: &str,
        keys: &[String],
        keys_str: &str,
        options: TableOptions,
        msgs: &mut Vec<String>,
        supp_log_db_primary: bool,
        supp_log_db_all: bool,
        default_charmap: u64,
        default_nchar_charmap: u64,
    ) -> Result<()> {
        let regex_owner = anchored(owner)?;
        let regex_table = anchored(table_filter)?;

        let objs: Vec<Obj> = self.identifiers_touched.iter().copied().collect();
        for obj in objs {
            let Some(sys_obj) = self.sys_obj.by_alt(&obj) else {
                continue;
            };
            if sys_obj.is_dropped() || !sys_obj.is_table() || !regex_table.is_match(&sys_obj.name)
            {
                continue;
            }
            let obj_owner = sys_obj.owner;
            let obj_name = sys_obj.name.clone();
            let obj_temporary = sys_obj.is_temporary();

            let (user_name, supp_user_primary, supp_user_all) =
                match self.sys_user.by_key(&obj_owner) {
                    Some(user) => {
                        if !regex_owner.is_match(&user.name) {
                            continue;
                        }
                        (
                            user.name.clone(),
                            user.is_supp_log_primary(),
                            user.is_supp_log_all(),
                        )
                    }
                    None => {
                        if !ctx.flag(REDO_FLAGS_ADAPTIVE_SCHEMA) {
                            continue;
                        }
                        (format!("USER_{obj}"), false, false)
                    }
                };

            // Table already added with another rule
            if self.table_map.contains_key(&obj) {
                if ctx.is_debug() {
                    msgs.push(format!(
                        "{user_name}.{obj_name} (obj: {obj}) - already added (skipped)"
                    ));
                }
                continue;
            }

            let Some(sys_tab) = self.sys_tab.by_key(&obj) else {
                if ctx.is_debug() {
                    msgs.push(format!(
                        "{user_name}.{obj_name} (obj: {obj}) - SYS.TAB$ entry missing (skipped)"
                    ));
                }
                continue;
            };
            let tab_data_obj = sys_tab.data_obj;
            let tab_ts = sys_tab.ts;
            let clu_cols = sys_tab.clu_cols;
            let partitioned = sys_tab.is_partitioned();
            let clustered = sys_tab.is_clustered();
            let dependencies = sys_tab.is_dependencies();
            let row_movement = sys_tab.is_row_movement();
            let tab_binary = sys_tab.is_binary();
            let tab_iot = sys_tab.is_iot();
            let tab_nested = sys_tab.is_nested();
            let tab_initial = sys_tab.is_initial();

            if tab_binary {
                if ctx.is_debug() {
                    msgs.push(format!("{user_name}.{obj_name} (obj: {obj}) - binary (skipped)"));
                }
                continue;
            }
            if tab_iot {
                if ctx.is_debug() {
                    msgs.push(format!("{user_name}.{obj_name} (obj: {obj}) - IOT (skipped)"));
                }
                continue;
            }
            if obj_temporary {
                if ctx.is_debug() {
                    msgs.push(format!(
                        "{user_name}.{obj_name} (obj: {obj}) - temporary table (skipped)"
                    ));
                }
                continue;
            }
            if tab_nested {
                if ctx.is_debug() {
                    msgs.push(format!(
                        "{user_name}.{obj_name} (obj: {obj}) - nested table (skipped)"
                    ));
                }
                continue;
            }

            let compressed = !partitioned
                && tab_initial
                && self
                    .sys_deferred_stg
                    .by_key(&obj)
                    .map(|stg| stg.is_compressed())
                    .unwrap_or(false);
            if compressed {
                if ctx.is_debug() {
                    msgs.push(format!(
                        "{user_name}.{obj_name} (obj: {obj}) - compressed table (skipped)"
                    ));
                }
                continue;
            }

            let mut keys_cnt: usize = 0;
            let mut supp_log_table_primary = false;
            let mut supp_log_table_all = false;
            let mut sup_log_col_missing = false;

            let mut table = OracleTable::new(
                obj,
                tab_data_obj,
                obj_owner,
                clu_cols,
                options,
                user_name.clone(),
                obj_name.clone(),
            );

            let mut table_partitions: u64 = 0;
            let mut lob_partitions: u64 = 0;
            let mut lob_indexes: u64 = 0;
            let mut lob_list = String::new();
            let mut lob_indexes_list = String::new();

            if partitioned {
                for part in self
                    .sys_tab_part
                    .scan_above(&(obj, 0))
                    .take_while(|part| part.bo == obj)
                {
                    table.add_table_partition(part.obj, part.data_obj);
                    table_partitions += 1;
                }

                let comp_objs: Vec<Obj> = self
                    .sys_tab_com_part
                    .scan_above(&(obj, 0))
                    .take_while(|comp| comp.bo == obj)
                    .map(|comp| comp.obj)
                    .collect();
                for comp_obj in comp_objs {
                    for sub in self
                        .sys_tab_sub_part
                        .scan_above(&(comp_obj, 0))
                        .take_while(|sub| sub.p_obj == comp_obj)
                    {
                        table.add_table_partition(sub.obj, sub.data_obj);
                        table_partitions += 1;
                    }
                }
            }

            if !ctx.checks_disabled(DISABLE_CHECKS_SUPPLEMENTAL_LOG)
                && options & OPTIONS_SYSTEM_TABLE == 0
                && !supp_log_db_all
                && !supp_user_all
            {
                for cdef in self
                    .sys_cdef
                    .scan_above(&(obj, 0))
                    .take_while(|cdef| cdef.obj == obj)
                {
                    if cdef.is_supplemental_log_pk() {
                        supp_log_table_primary = true;
                    } else if cdef.is_supplemental_log_all() {
                        supp_log_table_all = true;
                    }
                }
            }

            for sys_col in self
                .sys_col
                .scan_above(&(obj, 0))
                .take_while(|col| col.obj == obj)
            {
                let mut num_pk: Col = 0;
                let mut num_sup: Col = 0;
                let mut guard_seg: Col = -1;

                if let Some(ecol) = self.sys_ecol.by_key(&(obj, sys_col.seg_col)) {
                    guard_seg = ecol.guard_id;
                }

                let charmap_id = if sys_col.charset_form == 1 {
                    if sys_col.col_type == SysCol::TYPE_CLOB {
                        default_nchar_charmap
                    } else {
                        default_charmap
                    }
                } else if sys_col.charset_form == 2 {
                    default_nchar_charmap
                } else {
                    sys_col.charset_id
                };

                if matches!(
                    sys_col.col_type,
                    SysCol::TYPE_VARCHAR | SysCol::TYPE_CHAR | SysCol::TYPE_CLOB
                ) && !locales.supports(charmap_id)
                {
                    ctx.hint(format!(
                        "check in database for name: SELECT NLS_CHARSET_NAME({charmap_id}) \
                         FROM DUAL;"
                    ));
                    return Err(RedomineError::data(
                        50026,
                        format!(
                            "table {user_name}.{obj_name} - unsupported character set id: \
                             {charmap_id} for column: {}",
                            sys_col.name
                        ),
                    ));
                }

                for ccol in self
                    .sys_ccol
                    .scan_above(&(obj, sys_col.int_col, 0))
                    .take_while(|ccol| ccol.obj == obj && ccol.int_col == sys_col.int_col)
                {
                    let Some(cdef) = self.sys_cdef.by_alt(&ccol.con) else {
                        ctx.warning(
                            70005,
                            format!("data in SYS.CDEF$ missing for CON#: {}", ccol.con),
                        );
                        continue;
                    };
                    if cdef.is_pk() {
                        num_pk += 1;
                    }
                    if ccol.spare1.is_zero() && cdef.is_supplemental_log() {
                        num_sup += 1;
                    }
                }

                if !keys.is_empty() {
                    // A manually defined key may overlap the table's own pk
                    if num_pk > 0
                        && (supp_log_table_primary || supp_user_primary || supp_log_db_primary)
                    {
                        num_sup = 1;
                    }
                    num_pk = 0;
                    for key in keys {
                        if sys_col.name == *key {
                            num_pk = 1;
                            keys_cnt += 1;
                            if num_sup == 0 {
                                sup_log_col_missing = true;
                            }
                            break;
                        }
                    }
                } else if num_pk > 0 && num_sup == 0 {
                    sup_log_col_missing = true;
                }

                if ctx.is_debug() {
                    msgs.push(format!(
                        "- col: {}: {} (pk: {num_pk}, S: {num_sup}, G: {guard_seg})",
                        sys_col.seg_col, sys_col.name
                    ));
                }

                table.add_column(OracleColumn {
                    col: sys_col.col,
                    guard_seg,
                    seg_col: sys_col.seg_col,
                    name: sys_col.name.clone(),
                    col_type: sys_col.col_type,
                    length: sys_col.length,
                    precision: sys_col.precision,
                    scale: sys_col.scale,
                    num_pk,
                    charset_id: charmap_id,
                    nullable: sys_col.is_nullable(),
                    invisible: sys_col.is_invisible(),
                    stored_as_lob: sys_col.is_stored_as_lob(),
                    constraint: sys_col.is_constraint(),
                    nested: sys_col.is_nested(),
                    unused: sys_col.is_unused(),
                    added: sys_col.is_added(),
                    guard: sys_col.is_guard(),
                });
            }

            if options & OPTIONS_SYSTEM_TABLE == 0 {
                for sys_lob in self
                    .sys_lob
                    .scan_above(&(obj, 0))
                    .take_while(|lob| lob.obj == obj)
                {
                    let lob_data_obj = match self.sys_obj.by_alt(&sys_lob.l_obj) {
                        Some(lob_obj) => lob_obj.data_obj,
                        None => {
                            return Err(RedomineError::data(
                                50027,
                                format!(
                                    "table {user_name}.{obj_name} couldn't find obj for lob {}",
                                    sys_lob.l_obj
                                ),
                            ))
                        }
                    };

                    if ctx.is_debug() {
                        msgs.push(format!(
                            "- lob: {}:{}:{lob_data_obj}:{}",
                            sys_lob.col, sys_lob.int_col, sys_lob.l_obj
                        ));
                    }

                    let mut lob =
                        OracleLob::new(obj, lob_data_obj, sys_lob.l_obj, sys_lob.col, sys_lob.int_col);

                    let index_name = format!("SYS_IL{obj:010}C{:05}$$", sys_lob.int_col);
                    for index_obj in self
                        .sys_obj
                        .scan_above(&(obj_owner, index_name.clone(), 0, 0))
                        .take_while(|row| row.owner == obj_owner && row.name == index_name)
                    {
                        if index_obj.data_obj == 0 {
                            continue;
                        }
                        lob.add_index(index_obj.data_obj);
                        if ctx.trace & TRACE_LOB != 0 {
                            lob_indexes_list
                                .push_str(&format!(" {}/{}", index_obj.data_obj, index_obj.obj));
                        }
                        lob_indexes += 1;
                    }
                    if lob.lob_indexes.is_empty() {
                        ctx.warning(
                            60021,
                            format!(
                                "missing LOB index for LOB (OBJ#: {obj}, DATAOBJ#: {}, COL#: {})",
                                sys_lob.l_obj, sys_lob.int_col
                            ),
                        );
                    }

                    if partitioned {
                        for frag in self
                            .sys_lob_frag
                            .scan_above(&(sys_lob.l_obj, 0))
                            .take_while(|frag| frag.parent_obj == sys_lob.l_obj)
                        {
                            let frag_data_obj = self
                                .sys_obj
                                .by_alt(&frag.frag_obj)
                                .map(|row| row.data_obj)
                                .ok_or_else(|| {
                                    RedomineError::data(
                                        50028,
                                        format!(
                                            "table {user_name}.{obj_name} couldn't find obj for \
                                             lob frag {}",
                                            frag.frag_obj
                                        ),
                                    )
                                })?;
                            lob.add_partition(frag_data_obj, self.lob_block_size(ctx, frag.ts));
                            lob_partitions += 1;
                        }

                        for comp in self
                            .sys_lob_comp_part
                            .scan_above(&(sys_lob.l_obj, 0))
                            .take_while(|comp| comp.l_obj == sys_lob.l_obj)
                        {
                            for frag in self
                                .sys_lob_frag
                                .scan_above(&(comp.part_obj, 0))
                                .take_while(|frag| frag.parent_obj == comp.part_obj)
                            {
                                let frag_data_obj = self
                                    .sys_obj
                                    .by_alt(&frag.frag_obj)
                                    .map(|row| row.data_obj)
                                    .ok_or_else(|| {
                                        RedomineError::data(
                                            50028,
                                            format!(
                                                "table {user_name}.{obj_name} couldn't find obj \
                                                 for lob frag {}",
                                                frag.frag_obj
                                            ),
                                        )
                                    })?;
                                lob.add_partition(frag_data_obj, self.lob_block_size(ctx, frag.ts));
                                lob_partitions += 1;
                            }
                        }
                    }

                    lob.add_partition(lob.data_obj, self.lob_block_size(ctx, sys_lob.ts));
                    if ctx.trace & TRACE_LOB != 0 {
                        lob_list.push_str(&format!(" {}/{}/{}", lob.obj, lob.data_obj, lob.l_obj));
                    }
                    table.add_lob(lob);
                }

                // Tables with LOB segments but no SYS.LOB$ metadata still
                // leave SYS_LOB<obj>C<intcol>$$ entries behind in SYS.OBJ$.
                let lob_prefix = format!("SYS_LOB{obj:010}C");
                let discovered: Vec<(Col, u32)> = self
                    .sys_obj
                    .scan_above(&(obj_owner, lob_prefix.clone(), 0, 0))
                    .take_while(|row| row.owner == obj_owner && row.name.starts_with(&lob_prefix))
                    .filter(|row| row.name.len() == 25 && row.name.ends_with("$$"))
                    .filter_map(|row| {
                        let col: Col = row.name.get(18..23)?.parse().ok()?;
                        Some((col, row.data_obj))
                    })
                    .collect();
                for (col, lob_data_obj) in discovered {
                    let block_size = self.lob_block_size(ctx, tab_ts);
                    let pos = match table.lobs.iter().position(|lob| lob.int_col == col) {
                        Some(pos) => pos,
                        None => {
                            table.add_lob(OracleLob::new(obj, 0, 0, col, col));
                            table.lobs.len() - 1
                        }
                    };
                    table.lobs[pos].add_partition(lob_data_obj, block_size);
                }
            }

            // Check that the table has all listed key columns
            if keys.len() != keys_cnt {
                return Err(RedomineError::data(
                    10041,
                    format!(
                        "table {user_name}.{obj_name} - couldn't find all column set ({keys_str})"
                    ),
                ));
            }

            let mut summary = format!(
                "{user_name}.{obj_name} (dataobj: {tab_data_obj}, obj: {obj}, columns: {}, \
                 lobs: {}{lob_list}, lob-idx: {lob_indexes}{lob_indexes_list})",
                table.max_seg_col, table.total_lobs
            );
            if clustered {
                summary.push_str(", part of cluster");
            }
            if partitioned {
                summary.push_str(&format!(
                    ", partitioned(table: {table_partitions}, lob: {lob_partitions})"
                ));
            }
            if dependencies {
                summary.push_str(", row dependencies");
            }
            if row_movement {
                summary.push_str(", row movement enabled");
            }

            if !ctx.checks_disabled(DISABLE_CHECKS_SUPPLEMENTAL_LOG)
                && options & OPTIONS_SYSTEM_TABLE == 0
            {
                if keys.is_empty() {
                    if table.total_pk == 0 {
                        summary.push_str(", primary key missing");
                    } else if !supp_log_table_primary
                        && !supp_log_table_all
                        && !supp_user_primary
                        && !supp_user_all
                        && !supp_log_db_primary
                        && !supp_log_db_all
                        && sup_log_col_missing
                    {
                        summary.push_str(&format!(
                            ", supplemental log missing, try: ALTER TABLE {user_name}.{obj_name} \
                             ADD SUPPLEMENTAL LOG DATA (PRIMARY KEY) COLUMNS;"
                        ));
                    }
                } else if !supp_log_table_all
                    && !supp_user_all
                    && !supp_log_db_all
                    && sup_log_col_missing
                {
                    summary.push_str(&format!(
                        ", supplemental log missing, try: ALTER TABLE {user_name}.{obj_name} \
                         ADD SUPPLEMENTAL LOG GROUP GRP{obj} ({keys_str}) ALWAYS;"
                    ));
                }
            }
            msgs.push(summary);

            self.add_table_to_dict(table)?;
        }

        Ok(())
    }

    /// Usable LOB data bytes per block for the given tablespace: the block
    /// size minus the fixed per-block overhead. Unknown tablespaces and
    /// unexpected block sizes warn 60022 and fall back to the 8k value.
    fn lob_block_size(&self, ctx: &Ctx, ts: Ts) -> u16 {
        match self.sys_ts.by_key(&ts) {
            Some(row) => match row.block_size {
                8192 => 8132,
                16384 => 16264,
                32768 => 32528,
                other => {
                    ctx.warning(60022, format!("missing TS#: {ts}, BLOCKSIZE: {other})"));
                    8132
                }
            },
            None => {
                ctx.warning(60022, format!("missing TS#: {ts})"));
                8132
            }
        }
    }
}
