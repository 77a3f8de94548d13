pub mod state;

use crate::ctx::{Ctx, TRACE_CHECKPOINT};
use crate::error::{RedomineError, Result};
use crate::schema::Schema;
use crate::types::{Scn, Seq, ZERO_SCN, ZERO_SEQ};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use sha2::{Digest, Sha256};
use state::StateStore;
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

/// Upper bound for writer checkpoint files.
pub const CHECKPOINT_FILE_MAX_SIZE: u64 = 1024 * 1024;
/// Upper bound for catalog snapshot files.
pub const SCHEMA_FILE_MAX_SIZE: u64 = 256 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineStatus {
    /// Waiting for initial positioning.
    Initialize,
    /// No stored checkpoint; start from the configured position.
    Boot,
    /// Resuming from a stored checkpoint SCN.
    Replicate,
}

/// One online redo log group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedoLogFile {
    pub group: i64,
    pub path: String,
}

/// One database incarnation from V$DATABASE_INCARNATION.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Incarnation {
    pub incarnation: u32,
    pub resetlogs_scn: Scn,
    pub prior_resetlogs_scn: Scn,
    pub status: String,
    pub resetlogs: u32,
    pub prior_incarnation: u32,
    pub current: bool,
}

#[derive(Serialize)]
struct CatalogCheckpointRef<'a> {
    database: &'a str,
    scn: Scn,
    resetlogs: u32,
    activation: u32,
    incarnations: &'a [Incarnation],
    redo_logs: &'a [RedoLogFile],
    schema_digest: &'a str,
    schema: &'a RawValue,
}

#[derive(Deserialize)]
struct CatalogCheckpointOwned {
    database: String,
    #[allow(dead_code)]
    scn: Scn,
    resetlogs: u32,
    activation: u32,
    incarnations: Vec<Incarnation>,
    redo_logs: Vec<RedoLogFile>,
    schema_digest: String,
    schema: Box<RawValue>,
}

#[derive(Debug)]
struct MetadataInner {
    status: EngineStatus,
    start_scn: Scn,
    start_sequence: Seq,
    resetlogs: u32,
    activation: u32,
    incarnations: Vec<Incarnation>,
    redo_logs: Vec<RedoLogFile>,
    checkpoint_scns: VecDeque<Scn>,
    last_checkpoint_scn: Option<Scn>,
}

/// Replication metadata: positioning state, database identity facts, the
/// catalog shadow, and the durable checkpoint plumbing shared by the
/// checkpoint thread and the writer.
pub struct Metadata {
    ctx: Arc<Ctx>,
    pub database: String,
    state: Box<dyn StateStore>,
    pub schema: RwLock<Schema>,
    users: Mutex<HashSet<String>>,
    inner: Mutex<MetadataInner>,
}

impl Metadata {
    pub fn new(ctx: Arc<Ctx>, database: impl Into<String>, state: Box<dyn StateStore>) -> Self {
        Self {
            ctx,
            database: database.into(),
            state,
            schema: RwLock::new(Schema::new()),
            users: Mutex::new(HashSet::new()),
            inner: Mutex::new(MetadataInner {
                status: EngineStatus::Initialize,
                start_scn: ZERO_SCN,
                start_sequence: ZERO_SEQ,
                resetlogs: 0,
                activation: 0,
                incarnations: Vec::new(),
                redo_logs: Vec::new(),
                checkpoint_scns: VecDeque::new(),
                last_checkpoint_scn: None,
            }),
        }
    }

    // ---- status machine ----

    pub fn status(&self) -> EngineStatus {
        self.inner.lock().status
    }

    pub fn set_status_boot(&self) {
        self.inner.lock().status = EngineStatus::Boot;
    }

    pub fn set_status_replicate(&self) {
        self.inner.lock().status = EngineStatus::Replicate;
    }

    // ---- positioning ----

    pub fn start_scn(&self) -> Scn {
        self.inner.lock().start_scn
    }

    /// Resuming from a stored SCN invalidates any configured start
    /// sequence.
    pub fn set_start_scn(&self, scn: Scn) {
        let mut inner = self.inner.lock();
        inner.start_scn = scn;
        inner.start_sequence = ZERO_SEQ;
    }

    pub fn start_sequence(&self) -> Seq {
        self.inner.lock().start_sequence
    }

    pub fn resetlogs(&self) -> u32 {
        self.inner.lock().resetlogs
    }

    pub fn set_resetlogs(&self, resetlogs: u32) {
        self.inner.lock().resetlogs = resetlogs;
    }

    pub fn activation(&self) -> u32 {
        self.inner.lock().activation
    }

    pub fn set_activation(&self, activation: u32) {
        self.inner.lock().activation = activation;
    }

    // ---- database identity ----

    pub fn add_incarnation(&self, incarnation: Incarnation) {
        self.inner.lock().incarnations.push(incarnation);
    }

    pub fn incarnations(&self) -> Vec<Incarnation> {
        self.inner.lock().incarnations.clone()
    }

    pub fn current_incarnation(&self) -> Option<Incarnation> {
        self.inner
            .lock()
            .incarnations
            .iter()
            .find(|incarnation| incarnation.current)
            .cloned()
    }

    pub fn set_redo_logs(&self, redo_logs: Vec<RedoLogFile>) {
        let mut inner = self.inner.lock();
        inner.redo_logs = redo_logs;
        inner.redo_logs.sort_by_key(|log| log.group);
    }

    pub fn redo_logs(&self) -> Vec<RedoLogFile> {
        self.inner.lock().redo_logs.clone()
    }

    // ---- schema-element users ----

    pub fn add_user(&self, name: impl Into<String>) {
        self.users.lock().insert(name.into());
    }

    pub fn users(&self) -> HashSet<String> {
        self.users.lock().clone()
    }

    // ---- durable state ----

    /// Writes a value into the durable state store, reporting failures
    /// through the diagnostics hook instead of propagating them; the
    /// caller decides whether to retry at the next checkpoint boundary.
    pub fn state_write(&self, name: &str, content: &str) -> bool {
        match self.state.write(name, content) {
            Ok(()) => true,
            Err(err) => {
                self.ctx
                    .warning(10042, format!("state write failed for {name}: {err}"));
                false
            }
        }
    }

    pub fn state_read(&self, name: &str, max_size: u64) -> Result<Option<String>> {
        self.state.read(name, max_size)
    }

    // ---- catalog checkpoints ----

    fn schema_state_name(&self, scn: Scn) -> String {
        format!("{}-schema-{}", self.database, scn)
    }

    /// Serializes the catalog shadow to durable state under
    /// `<database>-schema-<scn>`. A checkpoint is written once per catalog
    /// SCN; `final_` (the shutdown flush) rewrites even an already
    /// persisted SCN.
    pub fn write_checkpoint(&self, final_: bool) -> Result<()> {
        let schema = self.schema.read();
        let scn = schema.scn;
        if scn == ZERO_SCN {
            return Ok(());
        }
        {
            let inner = self.inner.lock();
            if inner.last_checkpoint_scn == Some(scn) && !final_ {
                return Ok(());
            }
        }

        let schema_json = serde_json::to_string(&*schema)
            .map_err(|err| RedomineError::Encode(err.to_string()))?;
        drop(schema);
        let digest = sha256_hex(schema_json.as_bytes());
        let schema_raw = RawValue::from_string(schema_json)
            .map_err(|err| RedomineError::Encode(err.to_string()))?;

        let (resetlogs, activation, incarnations, redo_logs) = {
            let inner = self.inner.lock();
            (
                inner.resetlogs,
                inner.activation,
                inner.incarnations.clone(),
                inner.redo_logs.clone(),
            )
        };
        let content = serde_json::to_string(&CatalogCheckpointRef {
            database: &self.database,
            scn,
            resetlogs,
            activation,
            incarnations: &incarnations,
            redo_logs: &redo_logs,
            schema_digest: &digest,
            schema: &schema_raw,
        })
        .map_err(|err| RedomineError::Encode(err.to_string()))?;

        let name = self.schema_state_name(scn);
        self.state.write(&name, &content)?;
        self.ctx.log_trace(
            TRACE_CHECKPOINT,
            format!("catalog checkpoint written: {name}"),
        );

        let mut inner = self.inner.lock();
        if inner.checkpoint_scns.back() != Some(&scn) {
            inner.checkpoint_scns.push_back(scn);
        }
        inner.last_checkpoint_scn = Some(scn);
        Ok(())
    }

    /// Deletes catalog checkpoints beyond the retention window, oldest
    /// first.
    pub fn delete_old_checkpoints(&self) -> Result<()> {
        loop {
            let scn = {
                let mut inner = self.inner.lock();
                if inner.checkpoint_scns.len() <= self.ctx.checkpoints_keep {
                    return Ok(());
                }
                match inner.checkpoint_scns.pop_front() {
                    Some(scn) => scn,
                    None => return Ok(()),
                }
            };
            let name = self.schema_state_name(scn);
            self.state.delete(&name)?;
            self.ctx
                .log_trace(TRACE_CHECKPOINT, format!("deleted old checkpoint: {name}"));
        }
    }

    pub fn checkpoint_scns(&self) -> Vec<Scn> {
        self.inner.lock().checkpoint_scns.iter().copied().collect()
    }

    /// Loads and verifies the catalog checkpoint stored for `scn`.
    /// Returns the reloaded shadow, reindexed and fully touched so the
    /// next materializer pass rebuilds descriptors; database identity
    /// fields are restored into this metadata. `Ok(None)` when no
    /// checkpoint exists for that SCN.
    pub fn load_checkpoint(&self, scn: Scn) -> Result<Option<Schema>> {
        let name = self.schema_state_name(scn);
        let Some(content) = self.state.read(&name, SCHEMA_FILE_MAX_SIZE)? else {
            return Ok(None);
        };

        let checkpoint: CatalogCheckpointOwned = serde_json::from_str(&content)
            .map_err(|err| RedomineError::data(20001, format!("file: {name} - parse error: {err}")))?;
        if checkpoint.database != self.database {
            return Err(RedomineError::data(
                20001,
                format!(
                    "file: {name} - invalid database name: {}",
                    checkpoint.database
                ),
            ));
        }
        let digest = sha256_hex(checkpoint.schema.get().as_bytes());
        if digest != checkpoint.schema_digest {
            return Err(RedomineError::data(
                20001,
                format!("file: {name} - schema digest mismatch"),
            ));
        }

        let mut schema: Schema = serde_json::from_str(checkpoint.schema.get())
            .map_err(|err| RedomineError::data(20001, format!("file: {name} - parse error: {err}")))?;
        schema.reindex()?;
        schema.touch_all();
        schema.loaded = true;

        {
            let mut inner = self.inner.lock();
            inner.resetlogs = checkpoint.resetlogs;
            inner.activation = checkpoint.activation;
            inner.incarnations = checkpoint.incarnations;
            inner.redo_logs = checkpoint.redo_logs;
        }
        self.ctx.info(0, format!("catalog checkpoint loaded: {name}"));
        Ok(Some(schema))
    }
}

fn sha256_hex(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}
