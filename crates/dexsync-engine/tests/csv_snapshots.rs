//! Snapshot-directory loading: bulk entity files plus localized-name files.

mod common;

use std::fs;
use std::path::Path;

use common::{must, FixtureSource};
use dexsync_core::model::EntityRow;
use dexsync_core::Kind;
use dexsync_engine::{CsvSummary, Reconciler};
use dexsync_store_sqlite::SqliteStore;

fn fixture_store() -> SqliteStore {
    let mut store = must(SqliteStore::open_in_memory(), "open failed");
    must(store.migrate(), "migrate failed");
    store
}

fn write_file(dir: &Path, name: &str, content: &str) {
    if let Err(err) = fs::write(dir.join(name), content) {
        panic!("writing {name} failed: {err}");
    }
}

fn seed_dir(dir: &Path) {
    write_file(dir, "languages.csv", "id,iso639,iso3166,identifier,official\n9,en,us,en,1\n5,fr,fr,fr,1\n");
    write_file(dir, "regions.csv", "id,identifier\n1,kanto\n");
    write_file(dir, "generations.csv", "id,main_region_id,identifier\n1,1,generation-i\n");
    write_file(dir, "version_groups.csv", "id,identifier,generation_id,order\n1,red-blue,1,1\n");
    write_file(dir, "versions.csv", "id,version_group_id,identifier\n1,1,red\n2,1,blue\n");
    write_file(dir, "language_names.csv", "language_id,local_language_id,name\n9,9,English\n5,9,French\n");
    write_file(dir, "region_names.csv", "region_id,local_language_id,name\n1,9,Kanto\n");
    write_file(dir, "generation_names.csv", "generation_id,local_language_id,name\n1,9,Generation I\n");
    write_file(dir, "version_names.csv", "version_id,local_language_id,name\n1,9,Red\n2,9,Blue\n");
}

fn load(store: SqliteStore, dir: &Path) -> (CsvSummary, SqliteStore) {
    let mut rec = Reconciler::new(store, FixtureSource::empty());
    let summary = must(rec.load_csv_dir(dir), "load failed");
    (summary, rec.into_store())
}

fn count(store: &SqliteStore, kind: Kind) -> i64 {
    must(store.count_rows(kind), "count failed")
}

fn key_of(store: &SqliteStore, kind: Kind, api_id: i64) -> i64 {
    match must(store.find_id(kind, api_id), "lookup failed") {
        Some(id) => id,
        None => panic!("{kind} {api_id} missing from the store"),
    }
}

#[test]
fn full_directory_loads_with_links_resolved() {
    let dir = must(tempfile::tempdir(), "tempdir failed");
    seed_dir(dir.path());
    let (summary, store) = load(fixture_store(), dir.path());

    assert_eq!(summary.files.len(), 9);
    assert_eq!(count(&store, Kind::Language), 2);
    assert_eq!(count(&store, Kind::Region), 1);
    assert_eq!(count(&store, Kind::Generation), 1);
    assert_eq!(count(&store, Kind::VersionGroup), 1);
    assert_eq!(count(&store, Kind::Version), 2);

    let generation = match must(store.load_by_api_id(Kind::Generation, 1), "load failed") {
        Some(EntityRow::Generation(g)) => g,
        other => panic!("unexpected row: {other:?}"),
    };
    assert_eq!(generation.main_region_key, Some(key_of(&store, Kind::Region, 1)));

    let version = match must(store.load_by_api_id(Kind::Version, 2), "load failed") {
        Some(EntityRow::Version(v)) => v,
        other => panic!("unexpected row: {other:?}"),
    };
    assert_eq!(version.version_group_key, Some(key_of(&store, Kind::VersionGroup, 1)));

    let region_names =
        must(store.list_text_entries_for_kind(Kind::Region, "names"), "text failed");
    assert_eq!(region_names.len(), 1);
    assert_eq!(region_names[0].entry.text, "Kanto");
    assert_eq!(region_names[0].language_api_id, 9);
}

#[test]
fn second_load_is_a_no_op() {
    let dir = must(tempfile::tempdir(), "tempdir failed");
    seed_dir(dir.path());
    let (_, store) = load(fixture_store(), dir.path());

    let first_names =
        must(store.list_text_entries_for_kind(Kind::Region, "names"), "text failed");
    let kept_id = first_names[0].entry.id;

    let (summary, store) = load(store, dir.path());
    for file in &summary.files {
        assert_eq!(file.created, 0, "{} created rows on re-run", file.file);
        assert_eq!(file.updated, 0, "{} updated rows on re-run", file.file);
        assert_eq!(file.deleted, 0, "{} deleted rows on re-run", file.file);
    }
    let second_names =
        must(store.list_text_entries_for_kind(Kind::Region, "names"), "text failed");
    assert_eq!(second_names.len(), 1);
    assert_eq!(second_names[0].entry.id, kept_id);
}

#[test]
fn changed_name_retires_the_old_entry() {
    let dir = must(tempfile::tempdir(), "tempdir failed");
    seed_dir(dir.path());
    let (_, store) = load(fixture_store(), dir.path());

    let before = must(store.list_text_entries_for_kind(Kind::Region, "names"), "text failed");
    let old_id = before[0].entry.id;

    write_file(dir.path(), "region_names.csv", "region_id,local_language_id,name\n1,9,Kanto Region\n");
    let (_, store) = load(store, dir.path());

    let after = must(store.list_text_entries_for_kind(Kind::Region, "names"), "text failed");
    assert_eq!(after.len(), 1);
    assert_eq!(after[0].entry.text, "Kanto Region");
    assert_ne!(after[0].entry.id, old_id);
}

#[test]
fn changed_scalar_updates_the_row_in_place() {
    let dir = must(tempfile::tempdir(), "tempdir failed");
    seed_dir(dir.path());
    let (_, store) = load(fixture_store(), dir.path());
    let kept_key = key_of(&store, Kind::Region, 1);

    write_file(dir.path(), "regions.csv", "id,identifier\n1,kanto-remastered\n");
    let (summary, store) = load(store, dir.path());

    let regions = match summary.files.iter().find(|f| f.file == "regions.csv") {
        Some(file) => file,
        None => panic!("regions.csv missing from the summary"),
    };
    assert_eq!(regions.updated, 1);
    assert_eq!(regions.created, 0);
    assert_eq!(key_of(&store, Kind::Region, 1), kept_key);
    let region = match must(store.load_by_api_id(Kind::Region, 1), "load failed") {
        Some(EntityRow::Region(r)) => r,
        other => panic!("unexpected row: {other:?}"),
    };
    assert_eq!(region.name, "kanto-remastered");
}

#[test]
fn missing_files_are_skipped() {
    let dir = must(tempfile::tempdir(), "tempdir failed");
    write_file(dir.path(), "languages.csv", "id,iso639,iso3166,identifier,official\n9,en,us,en,1\n");
    let (summary, store) = load(fixture_store(), dir.path());

    assert_eq!(summary.files.len(), 1);
    assert_eq!(count(&store, Kind::Language), 1);
    assert_eq!(count(&store, Kind::Region), 0);
}
