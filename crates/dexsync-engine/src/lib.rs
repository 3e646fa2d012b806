//! The reconciliation engine.
//!
//! A `Reconciler` owns the store, a data source, the per-run identity cache,
//! the surrogate-id allocator, and the in-flight guard. Entity kinds plug in
//! through the `Resource` trait; each upsert runs the same protocol:
//!
//! 1. already reconciled this run? return the cached id;
//! 2. load any existing row by natural id and register it;
//! 3. fetch the upstream document;
//! 4. refuse re-entry while the same record is mid-resolution;
//! 5. parse-or-compare, resolve relationships (recursively), then commit the
//!    row and its localized-text delta in one transaction.
//!
//! Re-entry surfaces as `SyncError::InProgress` and is handled at link call
//! sites by falling back to the registered id, so mutually referential
//! records (evolution lines, the type matrix) converge instead of looping.

mod cache;
mod csvload;
mod ids;
mod resource;
mod text;

use std::collections::BTreeSet;

use dexsync_client::DataSource;
use dexsync_core::api::ApiRef;
use dexsync_core::{model, Kind, Missing, SyncError};
use dexsync_store_sqlite::SqliteStore;
use tracing::{debug, warn};

use cache::IdentityCache;
use ids::IdAllocator;
use resource::Resource;

pub use csvload::{CsvSummary, FileSummary};

pub struct Reconciler<S: DataSource> {
    pub(crate) store: SqliteStore,
    pub(crate) source: S,
    pub(crate) cache: IdentityCache,
    pub(crate) ids: IdAllocator,
    pub(crate) in_flight: BTreeSet<String>,
}

impl<S: DataSource> Reconciler<S> {
    #[must_use]
    pub fn new(store: SqliteStore, source: S) -> Self {
        Reconciler {
            store,
            source,
            cache: IdentityCache::new(),
            ids: IdAllocator::new(),
            in_flight: BTreeSet::new(),
        }
    }

    #[must_use]
    pub fn store(&self) -> &SqliteStore {
        &self.store
    }

    #[must_use]
    pub fn into_store(self) -> SqliteStore {
        self.store
    }

    /// Reconcile one record and everything it references.
    ///
    /// # Errors
    /// `SyncError::NotFound` when the record does not exist upstream;
    /// `SyncError::Integrity` on fatal data violations; store and transport
    /// failures are propagated.
    pub fn sync(&mut self, kind: Kind, api_id: i64) -> Result<i64, SyncError> {
        let id = match kind {
            Kind::Language => self.upsert::<model::Language>(api_id, Missing::Deny)?,
            Kind::EggGroup => self.upsert::<model::EggGroup>(api_id, Missing::Deny)?,
            Kind::Color => self.upsert::<model::PokemonColor>(api_id, Missing::Deny)?,
            Kind::Shape => self.upsert::<model::PokemonShape>(api_id, Missing::Deny)?,
            Kind::Habitat => self.upsert::<model::PokemonHabitat>(api_id, Missing::Deny)?,
            Kind::GrowthRate => self.upsert::<model::GrowthRate>(api_id, Missing::Deny)?,
            Kind::Species => self.upsert::<model::Species>(api_id, Missing::Deny)?,
            Kind::Pokemon => self.upsert::<model::Pokemon>(api_id, Missing::Deny)?,
            Kind::Type => self.upsert::<model::PokemonType>(api_id, Missing::Deny)?,
            Kind::Ability => self.upsert::<model::Ability>(api_id, Missing::Deny)?,
            Kind::Move => self.upsert::<model::Move>(api_id, Missing::Deny)?,
            Kind::Item => self.upsert::<model::Item>(api_id, Missing::Deny)?,
            Kind::Location => self.upsert::<model::Location>(api_id, Missing::Deny)?,
            Kind::EvolutionTrigger => {
                self.upsert::<model::EvolutionTrigger>(api_id, Missing::Deny)?
            }
            Kind::EvolutionChain => self.upsert::<model::EvolutionChain>(api_id, Missing::Deny)?,
            Kind::Region | Kind::Generation | Kind::VersionGroup | Kind::Version => {
                return Err(SyncError::Integrity(format!(
                    "{kind} is loaded from snapshots, not synced"
                )))
            }
        };
        id.ok_or(SyncError::NotFound { kind, api_id })
    }

    fn upsert<T: Resource>(&mut self, api_id: i64, missing: Missing) -> Result<Option<i64>, SyncError> {
        let kind = T::KIND;
        if let Some(id) = self.cache.current_id(kind, api_id) {
            debug!(%kind, api_id, id, "already reconciled this run");
            return Ok(Some(id));
        }

        let existing: Option<T> = match self.store.load_by_api_id(kind, api_id)? {
            Some(row) => {
                let entity = T::from_entity(row).ok_or_else(|| {
                    SyncError::Integrity(format!("store returned a mismatched row for {kind} {api_id}"))
                })?;
                self.cache.register(kind, api_id, entity.id());
                Some(entity)
            }
            None => None,
        };

        let Some(value) = self.source.fetch(kind, api_id)? else {
            return match missing {
                // A row that vanished upstream still links locally.
                Missing::Allow => match existing {
                    Some(entity) => {
                        debug!(%kind, api_id, "absent upstream; keeping the local row");
                        self.cache.mark_current(kind, api_id);
                        Ok(Some(entity.id()))
                    }
                    None => {
                        debug!(%kind, api_id, "absent upstream; absence is allowed here");
                        Ok(None)
                    }
                },
                Missing::Deny => Err(SyncError::NotFound { kind, api_id }),
            };
        };

        let key = kind.resource_url(api_id).ok_or_else(|| {
            SyncError::Integrity(format!("{kind} has no canonical resource url"))
        })?;
        if self.in_flight.contains(&key) {
            return Err(SyncError::InProgress(key));
        }

        let data: T::Data = serde_json::from_value(value)
            .map_err(|err| SyncError::Decode(format!("{kind} {api_id}: {err}")))?;

        self.in_flight.insert(key.clone());
        let outcome = self.reconcile::<T>(existing, api_id, &data);
        self.in_flight.remove(&key);

        let id = outcome?;
        self.cache.mark_current(kind, api_id);
        Ok(Some(id))
    }

    fn reconcile<T: Resource>(
        &mut self,
        existing: Option<T>,
        api_id: i64,
        data: &T::Data,
    ) -> Result<i64, SyncError> {
        let kind = T::KIND;
        let mut entity = match existing {
            Some(mut entity) => {
                if entity.compare(data) {
                    debug!(%kind, api_id, "scalar fields changed upstream");
                }
                entity
            }
            None => {
                let id = self.ids.next(&mut self.store)?;
                let entity = T::from_data(id, data);
                self.cache.register(kind, api_id, id);
                debug!(%kind, api_id, id, "new record");
                entity
            }
        };

        T::resolve(self, &mut entity, data)?;
        let (new_text, stale_text) = self.plan_text::<T>(entity.id(), data)?;
        self.store.commit_entity(&entity.as_row(), &new_text, &stale_text)?;
        Ok(entity.id())
    }

    /// Resolve one reference to a surrogate id, riding out re-entrancy: a
    /// target that is mid-resolution on this stack already has a registered
    /// id, which is enough to link against.
    fn link<T: Resource>(&mut self, reference: &ApiRef) -> Result<Option<i64>, SyncError> {
        self.link_ref::<T>(Some(reference), Missing::Deny)
    }

    fn link_ref<T: Resource>(
        &mut self,
        reference: Option<&ApiRef>,
        missing: Missing,
    ) -> Result<Option<i64>, SyncError> {
        let Some(reference) = reference else {
            return Ok(None);
        };
        let api_id = reference.api_id()?;
        match self.upsert::<T>(api_id, missing) {
            Ok(id) => Ok(id),
            Err(SyncError::InProgress(key)) => {
                debug!(%key, "link target mid-resolution; using registered id");
                Ok(self.cache.peek(T::KIND, api_id))
            }
            Err(err) => Err(err),
        }
    }

    /// Key lookup for snapshot-loaded kinds (and anything else that must not
    /// trigger a fetch). Cache first, then the store; absence is reported as
    /// `None` with a warning.
    fn snapshot_id(&mut self, kind: Kind, api_id: i64) -> Result<Option<i64>, SyncError> {
        if let Some(id) = self.cache.peek(kind, api_id) {
            return Ok(Some(id));
        }
        match self.store.find_id(kind, api_id)? {
            Some(id) => {
                self.cache.register(kind, api_id, id);
                Ok(Some(id))
            }
            None => {
                warn!(%kind, api_id, "row not loaded; leaving the link null");
                Ok(None)
            }
        }
    }

    fn snapshot_ref(&mut self, kind: Kind, reference: Option<&ApiRef>) -> Result<Option<i64>, SyncError> {
        match reference {
            Some(reference) => self.snapshot_id(kind, reference.api_id()?),
            None => Ok(None),
        }
    }
}

fn required(id: Option<i64>, kind: Kind, api_id: i64) -> Result<i64, SyncError> {
    id.ok_or_else(|| SyncError::Integrity(format!("{kind} {api_id} could not be resolved")))
}
