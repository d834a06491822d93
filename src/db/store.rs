use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use lru::LruCache;
use parking_lot::Mutex;
use rusqlite::{Connection, OpenFlags, TransactionBehavior};
use tracing::{debug, info, warn};

use super::config::{StoreConfig, SweepPolicy};
use super::session::ReadSession;
use crate::error::{Result, StoreError};
use crate::ledger::{ResourceLedger, SweepStats};
use crate::ontology::Ontology;
use crate::storage::{schema, OntologyResources};
use crate::types::ResourceId;
use crate::update::{Quad, UpdateBatch, UpdateCoordinator, UpdateSummary};

static NEXT_MEMORY_DB: AtomicUsize = AtomicUsize::new(0);

/// Where the store's database lives.
#[derive(Debug, Clone)]
enum Location {
    File(PathBuf),
    /// URI of a process-local `memdb` database shared by the writer and the
    /// reader pool.
    Memory(String),
}

fn memory_uri() -> String {
    let n = NEXT_MEMORY_DB.fetch_add(1, Ordering::Relaxed);
    format!("file:/tinystore-{}-{n}?vfs=memdb", process::id())
}

impl Location {
    fn open_reader(&self) -> Result<Connection> {
        match self {
            Location::File(path) => Ok(Connection::open_with_flags(
                path,
                OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
            )?),
            Location::Memory(uri) => {
                let conn = Connection::open_with_flags(
                    uri,
                    OpenFlags::SQLITE_OPEN_READ_WRITE
                        | OpenFlags::SQLITE_OPEN_URI
                        | OpenFlags::SQLITE_OPEN_NO_MUTEX,
                )?;
                conn.pragma_update(None, "query_only", "ON")?;
                Ok(conn)
            }
        }
    }
}

/// State owned by the single writer.
struct WriterState {
    conn: Connection,
    cache: LruCache<String, ResourceId>,
    ledger: ResourceLedger,
}

/// An open triple store.
///
/// Writes are serialized through one writer connection. Reads go through
/// [`ReadSession`]s, which see a consistent snapshot and run concurrently
/// with each other.
///
/// File stores use WAL, so writers never wait for readers. In-memory stores
/// use a rollback journal: a commit waits (up to the busy timeout) for open
/// sessions to end, and a thread holding a session on an in-memory store
/// gets a busy error if it writes before dropping it.
///
/// # Example
///
/// ```rust
/// use tinystore::{Ontology, PropertyDef, Quad, Store, StoreConfig, Term, Object};
///
/// let ontology = Ontology::builder()
///     .namespace("ex", "http://example.org/#")
///     .class("ex:Doc", &[])
///     .property(PropertyDef::new("ex:title", "ex:Doc", "xsd:string"))
///     .build()?;
/// let store = Store::open_in_memory(ontology, StoreConfig::default())?;
/// let doc = Term::iri("urn:doc:1");
/// store.insert([
///     Quad::a(doc.clone(), "ex:Doc"),
///     Quad::new(doc, "ex:title", Object::literal("Hello")),
/// ])?;
/// assert!(store.resource_id("urn:doc:1")?.is_some());
/// # Ok::<(), tinystore::StoreError>(())
/// ```
pub struct Store {
    ontology: Arc<Ontology>,
    ids: Arc<OntologyResources>,
    config: StoreConfig,
    location: Location,
    writer: Mutex<WriterState>,
    readers: Mutex<Vec<Connection>>,
}

impl Store {
    /// Opens (or creates) a file-backed store.
    pub fn open(path: impl AsRef<Path>, ontology: Arc<Ontology>, config: StoreConfig) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let conn = Connection::open(&path)?;
        let mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        if !mode.eq_ignore_ascii_case("wal") {
            warn!(mode = %mode, "store.journal_mode_unavailable");
        }
        conn.pragma_update(None, "synchronous", config.synchronous.pragma_value())?;
        Self::init(conn, Location::File(path), ontology, config)
    }

    /// Opens a private in-memory store.
    ///
    /// The database is dropped together with the store.
    pub fn open_in_memory(ontology: Arc<Ontology>, config: StoreConfig) -> Result<Self> {
        let uri = memory_uri();
        let conn = Connection::open_with_flags(
            &uri,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_URI
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        conn.pragma_update_and_check(None, "journal_mode", "MEMORY", |row| row.get::<_, String>(0))?;
        Self::init(conn, Location::Memory(uri), ontology, config)
    }

    fn init(
        mut conn: Connection,
        location: Location,
        ontology: Arc<Ontology>,
        config: StoreConfig,
    ) -> Result<Self> {
        config.validate()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        schema::bootstrap(&tx, &ontology)?;
        let ids = Arc::new(OntologyResources::register(&tx, &ontology)?);
        let mut ledger = ResourceLedger::new(Arc::clone(&ontology), Arc::clone(&ids));
        if config.sweep == SweepPolicy::Deferred {
            ledger.collect_garbage(&tx)?;
        }
        tx.commit()?;

        let capacity = NonZeroUsize::new(config.resource_cache_size)
            .ok_or_else(|| StoreError::Config("resource_cache_size must be positive".into()))?;
        info!(
            location = ?location,
            classes = ontology.classes().len(),
            properties = ontology.properties().len(),
            sweep = ?config.sweep,
            "store.open"
        );
        Ok(Self {
            ontology,
            ids,
            location,
            writer: Mutex::new(WriterState {
                conn,
                cache: LruCache::new(capacity),
                ledger,
            }),
            readers: Mutex::new(Vec::new()),
            config,
        })
    }

    /// The ontology the store was opened with.
    pub fn ontology(&self) -> &Arc<Ontology> {
        &self.ontology
    }

    /// Active configuration.
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Resource ids of ontology classes and properties.
    pub fn ontology_resources(&self) -> &OntologyResources {
        &self.ids
    }

    /// Applies a batch atomically: either every operation is stored, or
    /// nothing is.
    pub fn update(&self, batch: &UpdateBatch) -> Result<UpdateSummary> {
        let mut guard = self.writer.lock();
        let WriterState {
            conn,
            cache,
            ledger,
        } = &mut *guard;
        let outcome = (|| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let summary = UpdateCoordinator::new(
                &tx,
                &self.ontology,
                &self.ids,
                ledger,
                cache,
                self.config.implicit_create,
            )
            .apply(batch, self.config.sweep)?;
            tx.commit()?;
            Ok::<_, StoreError>(summary)
        })();
        match outcome {
            Ok(summary) => {
                debug!(
                    inserted = summary.inserted,
                    deleted = summary.deleted,
                    replaced = summary.replaced,
                    unchanged = summary.unchanged,
                    created = summary.resources_created,
                    reclaimed = summary.reclaimed,
                    "update.apply"
                );
                Ok(summary)
            }
            Err(err) => {
                ledger.discard_pending();
                cache.clear();
                warn!(error = %err, "update.rejected");
                Err(err)
            }
        }
    }

    /// Inserts statements.
    pub fn insert(&self, quads: impl IntoIterator<Item = Quad>) -> Result<UpdateSummary> {
        self.update(&UpdateBatch::new().insert(quads))
    }

    /// Deletes statements.
    pub fn delete(&self, quads: impl IntoIterator<Item = Quad>) -> Result<UpdateSummary> {
        self.update(&UpdateBatch::new().delete(quads))
    }

    /// Replaces the named properties of each subject, then inserts.
    pub fn insert_or_replace(&self, quads: impl IntoIterator<Item = Quad>) -> Result<UpdateSummary> {
        self.update(&UpdateBatch::new().insert_or_replace(quads))
    }

    /// Reclaims every dead resource now.
    pub fn collect_garbage(&self) -> Result<SweepStats> {
        let mut guard = self.writer.lock();
        let WriterState {
            conn,
            cache,
            ledger,
        } = &mut *guard;
        let outcome = (|| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let stats = ledger.collect_garbage(&tx)?;
            tx.commit()?;
            Ok::<_, StoreError>(stats)
        })();
        cache.clear();
        if outcome.is_err() {
            ledger.discard_pending();
        }
        outcome
    }

    /// Starts a snapshot read on a pooled read-only connection.
    pub fn read(&self) -> Result<ReadSession<'_>> {
        let pooled = self.readers.lock().pop();
        let conn = match pooled {
            Some(conn) => conn,
            None => self.location.open_reader()?,
        };
        ReadSession::begin(self, conn)
    }

    /// Id of a live resource; `None` once it has been reclaimed.
    pub fn resource_id(&self, uri: &str) -> Result<Option<ResourceId>> {
        self.read()?.resource_id(uri)
    }

    pub(crate) fn ids(&self) -> &Arc<OntologyResources> {
        &self.ids
    }

    pub(crate) fn release_reader(&self, conn: Connection) {
        let mut pool = self.readers.lock();
        if pool.len() < self.config.reader_pool_size {
            pool.push(conn);
        }
    }

    /// Closes the store, checkpointing the WAL of file-backed stores.
    pub fn close(self) -> Result<()> {
        self.readers.lock().clear();
        let state = self.writer.into_inner();
        if let Location::File(_) = self.location {
            state
                .conn
                .query_row("PRAGMA wal_checkpoint(TRUNCATE)", [], |_| Ok(()))?;
        }
        state.conn.close().map_err(|(_, err)| StoreError::from(err))?;
        info!(location = ?self.location, "store.close");
        Ok(())
    }
}
