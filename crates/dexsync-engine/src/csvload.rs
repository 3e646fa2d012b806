//! Bulk reconciliation from CSV snapshots.
//!
//! Snapshot kinds never hit the upstream API. Each file is partitioned into
//! existing and new rows with one store query, compared row-by-row, and
//! written back in one transaction. Cross-file references (`main_region_id`
//! and friends) resolve through the cache/store only, which is why the files
//! load in dependency order. Name CSVs run the same full-sync merge as the
//! per-entity text reconciler, keyed by parent row + language + text.

use std::path::Path;

use dexsync_client::DataSource;
use dexsync_core::api;
use dexsync_core::model::{self, EntityRow, TextEntry};
use dexsync_core::{text_key, Kind, SyncError};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{info, warn};

use crate::Reconciler;

#[derive(Debug, Default, Clone, Serialize)]
pub struct CsvSummary {
    pub files: Vec<FileSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FileSummary {
    pub file: String,
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub deleted: usize,
}

impl FileSummary {
    fn new(path: &Path) -> Self {
        FileSummary {
            file: path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default(),
            created: 0,
            updated: 0,
            unchanged: 0,
            deleted: 0,
        }
    }
}

pub(crate) trait CsvResource: Sized + Clone + PartialEq {
    const KIND: Kind;
    type Row: DeserializeOwned;

    fn row_api_id(row: &Self::Row) -> i64;
    fn from_row(id: i64, row: &Self::Row) -> Self;
    fn compare_row(&mut self, row: &Self::Row) -> bool;
    fn from_entity(row: EntityRow) -> Option<Self>;
    fn as_row(&self) -> EntityRow;

    fn resolve_links<S: DataSource>(
        _rec: &mut Reconciler<S>,
        _entity: &mut Self,
        _row: &Self::Row,
    ) -> Result<(), SyncError> {
        Ok(())
    }
}

impl CsvResource for model::Language {
    const KIND: Kind = Kind::Language;
    type Row = api::LanguageRow;

    fn row_api_id(row: &Self::Row) -> i64 {
        row.id
    }
    fn from_row(id: i64, row: &Self::Row) -> Self {
        model::Language::from_row(id, row)
    }
    fn compare_row(&mut self, row: &Self::Row) -> bool {
        model::Language::compare_row(self, row)
    }
    fn from_entity(row: EntityRow) -> Option<Self> {
        match row {
            EntityRow::Language(e) => Some(e),
            _ => None,
        }
    }
    fn as_row(&self) -> EntityRow {
        EntityRow::Language(self.clone())
    }
}

impl CsvResource for model::Region {
    const KIND: Kind = Kind::Region;
    type Row = api::RegionRow;

    fn row_api_id(row: &Self::Row) -> i64 {
        row.id
    }
    fn from_row(id: i64, row: &Self::Row) -> Self {
        model::Region::from_row(id, row)
    }
    fn compare_row(&mut self, row: &Self::Row) -> bool {
        model::Region::compare_row(self, row)
    }
    fn from_entity(row: EntityRow) -> Option<Self> {
        match row {
            EntityRow::Region(e) => Some(e),
            _ => None,
        }
    }
    fn as_row(&self) -> EntityRow {
        EntityRow::Region(self.clone())
    }
}

impl CsvResource for model::Generation {
    const KIND: Kind = Kind::Generation;
    type Row = api::GenerationRow;

    fn row_api_id(row: &Self::Row) -> i64 {
        row.id
    }
    fn from_row(id: i64, row: &Self::Row) -> Self {
        model::Generation::from_row(id, row)
    }
    fn compare_row(&mut self, row: &Self::Row) -> bool {
        model::Generation::compare_row(self, row)
    }
    fn from_entity(row: EntityRow) -> Option<Self> {
        match row {
            EntityRow::Generation(e) => Some(e),
            _ => None,
        }
    }
    fn as_row(&self) -> EntityRow {
        EntityRow::Generation(self.clone())
    }
    fn resolve_links<S: DataSource>(
        rec: &mut Reconciler<S>,
        entity: &mut Self,
        row: &Self::Row,
    ) -> Result<(), SyncError> {
        entity.main_region_key = rec.snapshot_id(Kind::Region, row.main_region_id)?;
        Ok(())
    }
}

impl CsvResource for model::VersionGroup {
    const KIND: Kind = Kind::VersionGroup;
    type Row = api::VersionGroupRow;

    fn row_api_id(row: &Self::Row) -> i64 {
        row.id
    }
    fn from_row(id: i64, row: &Self::Row) -> Self {
        model::VersionGroup::from_row(id, row)
    }
    fn compare_row(&mut self, row: &Self::Row) -> bool {
        model::VersionGroup::compare_row(self, row)
    }
    fn from_entity(row: EntityRow) -> Option<Self> {
        match row {
            EntityRow::VersionGroup(e) => Some(e),
            _ => None,
        }
    }
    fn as_row(&self) -> EntityRow {
        EntityRow::VersionGroup(self.clone())
    }
    fn resolve_links<S: DataSource>(
        rec: &mut Reconciler<S>,
        entity: &mut Self,
        row: &Self::Row,
    ) -> Result<(), SyncError> {
        entity.generation_key = rec.snapshot_id(Kind::Generation, row.generation_id)?;
        Ok(())
    }
}

impl CsvResource for model::Version {
    const KIND: Kind = Kind::Version;
    type Row = api::VersionRow;

    fn row_api_id(row: &Self::Row) -> i64 {
        row.id
    }
    fn from_row(id: i64, row: &Self::Row) -> Self {
        model::Version::from_row(id, row)
    }
    fn compare_row(&mut self, row: &Self::Row) -> bool {
        model::Version::compare_row(self, row)
    }
    fn from_entity(row: EntityRow) -> Option<Self> {
        match row {
            EntityRow::Version(e) => Some(e),
            _ => None,
        }
    }
    fn as_row(&self) -> EntityRow {
        EntityRow::Version(self.clone())
    }
    fn resolve_links<S: DataSource>(
        rec: &mut Reconciler<S>,
        entity: &mut Self,
        row: &Self::Row,
    ) -> Result<(), SyncError> {
        entity.version_group_key = rec.snapshot_id(Kind::VersionGroup, row.version_group_id)?;
        Ok(())
    }
}

impl<S: DataSource> Reconciler<S> {
    /// Load every snapshot file present in `dir`, in dependency order, then
    /// the localized-name files.
    ///
    /// # Errors
    /// `SyncError::Decode` for unreadable or malformed files; store failures
    /// are propagated. Missing files are skipped with a warning.
    pub fn load_csv_dir(&mut self, dir: &Path) -> Result<CsvSummary, SyncError> {
        let mut summary = CsvSummary::default();
        self.run_entity_file::<model::Language>(dir, "languages.csv", &mut summary)?;
        self.run_entity_file::<model::Region>(dir, "regions.csv", &mut summary)?;
        self.run_entity_file::<model::Generation>(dir, "generations.csv", &mut summary)?;
        self.run_entity_file::<model::VersionGroup>(dir, "version_groups.csv", &mut summary)?;
        self.run_entity_file::<model::Version>(dir, "versions.csv", &mut summary)?;
        self.run_text_file(dir, "language_names.csv", Kind::Language, "language_id", &mut summary)?;
        self.run_text_file(dir, "region_names.csv", Kind::Region, "region_id", &mut summary)?;
        self.run_text_file(
            dir,
            "generation_names.csv",
            Kind::Generation,
            "generation_id",
            &mut summary,
        )?;
        self.run_text_file(dir, "version_names.csv", Kind::Version, "version_id", &mut summary)?;
        Ok(summary)
    }

    fn run_entity_file<R: CsvResource>(
        &mut self,
        dir: &Path,
        file: &str,
        summary: &mut CsvSummary,
    ) -> Result<(), SyncError> {
        let path = dir.join(file);
        if !path.exists() {
            warn!(file, "snapshot file missing; skipped");
            return Ok(());
        }
        let file_summary = self.process_csv::<R>(&path)?;
        info!(
            file,
            created = file_summary.created,
            updated = file_summary.updated,
            unchanged = file_summary.unchanged,
            "snapshot file loaded"
        );
        summary.files.push(file_summary);
        Ok(())
    }

    fn run_text_file(
        &mut self,
        dir: &Path,
        file: &str,
        kind: Kind,
        id_column: &str,
        summary: &mut CsvSummary,
    ) -> Result<(), SyncError> {
        let path = dir.join(file);
        if !path.exists() {
            warn!(file, "snapshot file missing; skipped");
            return Ok(());
        }
        let file_summary = self.process_text_csv(kind, "names", &path, id_column)?;
        info!(
            file,
            created = file_summary.created,
            deleted = file_summary.deleted,
            "name snapshot loaded"
        );
        summary.files.push(file_summary);
        Ok(())
    }

    fn process_csv<R: CsvResource>(&mut self, path: &Path) -> Result<FileSummary, SyncError> {
        let mut reader = csv_reader(path)?;
        let mut rows: Vec<R::Row> = Vec::new();
        for result in reader.deserialize() {
            rows.push(decode(path, result)?);
        }

        // One partition query for the whole file; everything it returns is
        // warm in the cache for the link resolution below.
        let api_ids: Vec<i64> = rows.iter().map(R::row_api_id).collect();
        let existing_ids = self.store.find_ids_for(R::KIND, &api_ids)?;
        for (&api_id, &id) in &existing_ids {
            self.cache.register(R::KIND, api_id, id);
        }

        let new_count = api_ids.iter().filter(|id| !existing_ids.contains_key(id)).count();
        let mut fresh = self.ids.next_ids(&mut self.store, new_count)?.into_iter();

        let mut summary = FileSummary::new(path);
        let mut batch: Vec<EntityRow> = Vec::new();
        for row in &rows {
            let api_id = R::row_api_id(row);
            let is_new = !existing_ids.contains_key(&api_id);
            let mut entity = if is_new {
                let id = fresh.next().ok_or_else(|| {
                    SyncError::Integrity(format!("{} id block exhausted mid-file", R::KIND))
                })?;
                self.cache.register(R::KIND, api_id, id);
                R::from_row(id, row)
            } else {
                self.store
                    .load_by_api_id(R::KIND, api_id)?
                    .and_then(R::from_entity)
                    .ok_or_else(|| {
                        SyncError::Integrity(format!("{} {api_id} vanished mid-load", R::KIND))
                    })?
            };
            let before = entity.clone();
            let _ = entity.compare_row(row);
            R::resolve_links(self, &mut entity, row)?;
            if is_new {
                summary.created += 1;
                batch.push(entity.as_row());
            } else if entity == before {
                summary.unchanged += 1;
            } else {
                summary.updated += 1;
                batch.push(entity.as_row());
            }
            self.cache.mark_current(R::KIND, api_id);
        }
        self.store.save_entities(&batch)?;
        Ok(summary)
    }

    fn process_text_csv(
        &mut self,
        kind: Kind,
        grouping: &str,
        path: &Path,
        id_column: &str,
    ) -> Result<FileSummary, SyncError> {
        let mut reader = csv_reader(path)?;
        let headers = decode(path, reader.headers().map(Clone::clone))?;
        let idx_parent = column(path, &headers, id_column)?;
        let idx_language = column(path, &headers, "local_language_id")?;
        let idx_text = column(path, &headers, "name")?;

        let existing = self.store.list_text_entries_for_kind(kind, grouping)?;
        let mut by_key = std::collections::HashMap::with_capacity(existing.len());
        for record in &existing {
            let key = format!(
                "{}:{}",
                record.entry.parent_id,
                text_key(&record.entry.text, record.language_api_id, None)
            );
            by_key.insert(key, record.entry.id);
        }

        let mut summary = FileSummary::new(path);
        let mut new_entries: Vec<TextEntry> = Vec::new();
        for result in reader.records() {
            let record = decode(path, result)?;
            let parent_api_id = field_i64(path, &record, idx_parent)?;
            let language_api_id = field_i64(path, &record, idx_language)?;
            let text = record.get(idx_text).unwrap_or_default();

            let Some(parent_id) = self.snapshot_id(kind, parent_api_id)? else {
                continue;
            };
            let key = format!("{parent_id}:{}", text_key(text, language_api_id, None));
            if by_key.remove(&key).is_some() {
                summary.unchanged += 1;
                continue;
            }
            let Some(language_key) = self.snapshot_id(Kind::Language, language_api_id)? else {
                return Err(SyncError::Integrity(format!(
                    "language {language_api_id} not loaded; load languages.csv first"
                )));
            };
            let id = self.ids.next(&mut self.store)?;
            new_entries.push(TextEntry {
                id,
                parent_kind: kind,
                parent_id,
                grouping: grouping.to_owned(),
                language_key,
                version_key: None,
                version_group_key: None,
                text: text.to_owned(),
            });
        }

        let stale: Vec<i64> = by_key.into_values().collect();
        summary.created = new_entries.len();
        summary.deleted = stale.len();
        self.store.commit_text_batch(&new_entries, &stale)?;
        Ok(summary)
    }
}

fn csv_reader(path: &Path) -> Result<csv::Reader<std::fs::File>, SyncError> {
    csv::Reader::from_path(path)
        .map_err(|err| SyncError::Decode(format!("{}: {err}", path.display())))
}

fn decode<T, E: std::fmt::Display>(path: &Path, result: Result<T, E>) -> Result<T, SyncError> {
    result.map_err(|err| SyncError::Decode(format!("{}: {err}", path.display())))
}

fn column(path: &Path, headers: &csv::StringRecord, name: &str) -> Result<usize, SyncError> {
    headers.iter().position(|h| h == name).ok_or_else(|| {
        SyncError::Decode(format!("{}: missing column '{name}'", path.display()))
    })
}

fn field_i64(path: &Path, record: &csv::StringRecord, index: usize) -> Result<i64, SyncError> {
    let raw = record.get(index).unwrap_or_default();
    raw.parse::<i64>()
        .map_err(|_| SyncError::Decode(format!("{}: '{raw}' is not an id", path.display())))
}
