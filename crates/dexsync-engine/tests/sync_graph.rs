//! End-to-end reconciliation over a canned document graph.

mod common;

use common::{en, fr, language_doc, localized, must, named_doc, reference, FixtureSource};
use dexsync_core::model::EntityRow;
use dexsync_core::{Kind, SyncError};
use dexsync_engine::Reconciler;
use dexsync_store_sqlite::SqliteStore;
use serde_json::{json, Value};

fn fixture_store() -> SqliteStore {
    let mut store = must(SqliteStore::open_in_memory(), "open failed");
    must(store.migrate(), "migrate failed");
    store
}

fn stat(name: &str, value: i64) -> Value {
    json!({"base_stat": value, "stat": {"name": name, "url": "https://pokeapi.co/api/v2/stat/1/"}})
}

fn full_stats(hp: i64) -> Value {
    json!([
        stat("hp", hp),
        stat("attack", 49),
        stat("defense", 49),
        stat("special-attack", 65),
        stat("special-defense", 65),
        stat("speed", 45),
    ])
}

fn pokemon_doc(api_id: i64, name: &str, species: i64, hp: i64) -> Value {
    json!({
        "id": api_id,
        "name": name,
        "base_experience": 64,
        "height": 7,
        "weight": 69,
        "is_default": !name.ends_with("-mega"),
        "order": api_id,
        "species": reference(Kind::Species, species, ""),
        "stats": full_stats(hp),
        "types": [
            {"slot": 1, "type": reference(Kind::Type, 12, "grass")},
            {"slot": 2, "type": reference(Kind::Type, 4, "poison")}
        ],
        "abilities": [
            {"slot": 1, "is_hidden": false, "ability": reference(Kind::Ability, 65, "overgrow")},
            {"slot": 3, "is_hidden": true, "ability": reference(Kind::Ability, 34, "chlorophyll")}
        ]
    })
}

fn species_doc(
    api_id: i64,
    name: &str,
    label: &str,
    evolves_from: Option<(i64, &str)>,
    varieties: &[(i64, &str)],
) -> Value {
    let varieties: Vec<Value> = varieties
        .iter()
        .map(|(id, n)| {
            json!({"is_default": !n.ends_with("-mega"), "pokemon": reference(Kind::Pokemon, *id, n)})
        })
        .collect();
    json!({
        "id": api_id,
        "name": name,
        "order": api_id,
        "gender_rate": 1,
        "capture_rate": 45,
        "base_happiness": 50,
        "hatch_counter": 20,
        "egg_groups": [
            reference(Kind::EggGroup, 1, "monster"),
            reference(Kind::EggGroup, 7, "plant")
        ],
        "color": reference(Kind::Color, 5, "green"),
        "shape": reference(Kind::Shape, 8, "squiggle"),
        "habitat": reference(Kind::Habitat, 3, "grassland"),
        "growth_rate": reference(Kind::GrowthRate, 4, "medium-slow"),
        "evolves_from_species": evolves_from.map(|(id, n)| reference(Kind::Species, id, n)),
        "evolution_chain": reference(Kind::EvolutionChain, 1, ""),
        "varieties": varieties,
        "names": [localized(label, en()), localized(label, fr())],
        "genera": [{"genus": "Seed Pokemon", "language": en()}]
    })
}

/// The bulbasaur line: three species, four forms (one mega), two types, two
/// abilities, one chain.
fn kanto_fixtures() -> FixtureSource {
    let mut src = FixtureSource::empty();
    src.insert(Kind::Language, 9, language_doc(9, "en", "English"));
    src.insert(Kind::Language, 5, language_doc(5, "fr", "French"));
    src.insert(Kind::EggGroup, 1, named_doc(1, "monster", "Monster"));
    src.insert(Kind::EggGroup, 7, named_doc(7, "plant", "Grass"));
    src.insert(Kind::Color, 5, named_doc(5, "green", "Green"));
    src.insert(Kind::Shape, 8, named_doc(8, "squiggle", "Squiggle"));
    src.insert(Kind::Habitat, 3, named_doc(3, "grassland", "Grassland"));
    src.insert(
        Kind::GrowthRate,
        4,
        json!({
            "id": 4,
            "name": "medium-slow",
            "formula": "\\frac{6x^3}{5} - 15x^2 + 100x - 140",
            "descriptions": [{"description": "Slower at first.", "language": en()}]
        }),
    );
    src.insert(Kind::EvolutionTrigger, 1, named_doc(1, "level-up", "Level up"));
    src.insert(
        Kind::Type,
        12,
        json!({
            "id": 12,
            "name": "grass",
            "damage_relations": {
                "half_damage_to": [reference(Kind::Type, 4, "poison")],
                "double_damage_from": [reference(Kind::Type, 4, "poison")]
            },
            "names": [localized("Grass", en())]
        }),
    );
    src.insert(
        Kind::Type,
        4,
        json!({
            "id": 4,
            "name": "poison",
            "damage_relations": {
                "double_damage_to": [reference(Kind::Type, 12, "grass")],
                "half_damage_from": [
                    reference(Kind::Type, 12, "grass"),
                    reference(Kind::Type, 4, "poison")
                ]
            },
            "names": [localized("Poison", en())]
        }),
    );
    src.insert(Kind::Ability, 65, named_doc(65, "overgrow", "Overgrow"));
    src.insert(Kind::Ability, 34, named_doc(34, "chlorophyll", "Chlorophyll"));
    src.insert(
        Kind::Species,
        1,
        species_doc(1, "bulbasaur", "Bulbasaur", None, &[(1, "bulbasaur")]),
    );
    src.insert(
        Kind::Species,
        2,
        species_doc(2, "ivysaur", "Ivysaur", Some((1, "bulbasaur")), &[(2, "ivysaur")]),
    );
    src.insert(
        Kind::Species,
        3,
        species_doc(
            3,
            "venusaur",
            "Venusaur",
            Some((2, "ivysaur")),
            &[(3, "venusaur"), (10033, "venusaur-mega")],
        ),
    );
    src.insert(Kind::Pokemon, 1, pokemon_doc(1, "bulbasaur", 1, 45));
    src.insert(Kind::Pokemon, 2, pokemon_doc(2, "ivysaur", 2, 60));
    src.insert(Kind::Pokemon, 3, pokemon_doc(3, "venusaur", 3, 80));
    src.insert(Kind::Pokemon, 10033, pokemon_doc(10033, "venusaur-mega", 3, 80));
    src.insert(
        Kind::EvolutionChain,
        1,
        json!({
            "id": 1,
            "chain": {
                "species": reference(Kind::Species, 1, "bulbasaur"),
                "evolves_to": [{
                    "species": reference(Kind::Species, 2, "ivysaur"),
                    "evolution_details": [{
                        "trigger": reference(Kind::EvolutionTrigger, 1, "level-up"),
                        "min_level": 16
                    }],
                    "evolves_to": [{
                        "species": reference(Kind::Species, 3, "venusaur"),
                        "evolution_details": [{
                            "trigger": reference(Kind::EvolutionTrigger, 1, "level-up"),
                            "min_level": 32
                        }]
                    }]
                }]
            }
        }),
    );
    src
}

fn key_of(store: &SqliteStore, kind: Kind, api_id: i64) -> i64 {
    match must(store.find_id(kind, api_id), "lookup failed") {
        Some(id) => id,
        None => panic!("{kind} {api_id} missing from the store"),
    }
}

fn count(store: &SqliteStore, kind: Kind) -> i64 {
    must(store.count_rows(kind), "count failed")
}

#[test]
fn one_species_pulls_in_its_whole_graph() {
    let mut rec = Reconciler::new(fixture_store(), kanto_fixtures());
    let bulbasaur_key = must(rec.sync(Kind::Species, 1), "sync failed");
    let store = rec.into_store();

    assert_eq!(count(&store, Kind::Species), 3);
    assert_eq!(count(&store, Kind::Pokemon), 4);
    assert_eq!(count(&store, Kind::Type), 2);
    assert_eq!(count(&store, Kind::Ability), 2);
    assert_eq!(count(&store, Kind::EggGroup), 2);
    assert_eq!(count(&store, Kind::Language), 2);
    assert_eq!(count(&store, Kind::EvolutionChain), 1);
    assert_eq!(count(&store, Kind::EvolutionTrigger), 1);

    let venusaur = match must(store.species_by_name("venusaur"), "lookup failed") {
        Some(species) => species,
        None => panic!("venusaur missing"),
    };
    assert_eq!(venusaur.evolves_from_species_key, Some(key_of(&store, Kind::Species, 2)));
    assert_eq!(venusaur.evolution_chain_key, Some(key_of(&store, Kind::EvolutionChain, 1)));
    assert_eq!(venusaur.egg_group_1_key, Some(key_of(&store, Kind::EggGroup, 1)));
    assert_eq!(venusaur.habitat_key, Some(key_of(&store, Kind::Habitat, 3)));

    let names = must(store.list_text_entries(Kind::Species, bulbasaur_key, "names"), "text failed");
    assert_eq!(names.len(), 2);
    let genera = must(store.list_text_entries(Kind::Species, bulbasaur_key, "genera"), "text failed");
    assert_eq!(genera.len(), 1);
}

#[test]
fn chain_stages_and_details_follow_the_tree() {
    let mut rec = Reconciler::new(fixture_store(), kanto_fixtures());
    must(rec.sync(Kind::Species, 1), "sync failed");
    let store = rec.into_store();

    let chain_key = key_of(&store, Kind::EvolutionChain, 1);
    let ivysaur_key = key_of(&store, Kind::Species, 2);
    let venusaur_key = key_of(&store, Kind::Species, 3);

    let ivysaur_stage = match must(store.find_stage(chain_key, ivysaur_key), "stage failed") {
        Some(stage) => stage,
        None => panic!("ivysaur stage missing"),
    };
    let venusaur_stage = match must(store.find_stage(chain_key, venusaur_key), "stage failed") {
        Some(stage) => stage,
        None => panic!("venusaur stage missing"),
    };
    assert_eq!(venusaur_stage.evolves_from_key, Some(ivysaur_stage.id));

    let venusaur_form = key_of(&store, Kind::Pokemon, 3);
    let detail = match must(store.find_detail(venusaur_stage.id, venusaur_form), "detail failed") {
        Some(detail) => detail,
        None => panic!("venusaur detail missing"),
    };
    assert_eq!(detail.min_level, Some(32));
    assert_eq!(detail.trigger_key, key_of(&store, Kind::EvolutionTrigger, 1));

    // The mega form never receives an evolution path.
    let mega_form = key_of(&store, Kind::Pokemon, 10033);
    let mega_detail = must(store.find_detail(venusaur_stage.id, mega_form), "detail failed");
    assert!(mega_detail.is_none());
}

#[test]
fn top_level_pokemon_sync_walks_the_chain_without_aborting() {
    // Entering through a form means its row is uncommitted while the chain
    // walks; the first run defers that node's detail pairing instead of
    // failing, and the re-run fills it in.
    let mut rec = Reconciler::new(fixture_store(), kanto_fixtures());
    must(rec.sync(Kind::Pokemon, 2), "first sync failed");
    let store = rec.into_store();

    assert_eq!(count(&store, Kind::Species), 3);
    assert_eq!(count(&store, Kind::Pokemon), 4);
    let ivysaur_form = match must(store.load_by_api_id(Kind::Pokemon, 2), "load failed") {
        Some(EntityRow::Pokemon(p)) => p,
        other => panic!("unexpected row: {other:?}"),
    };
    assert_eq!(ivysaur_form.species_key, Some(key_of(&store, Kind::Species, 2)));

    let mut rec = Reconciler::new(store, kanto_fixtures());
    must(rec.sync(Kind::Pokemon, 2), "second sync failed");
    let store = rec.into_store();

    let chain_key = key_of(&store, Kind::EvolutionChain, 1);
    let stage = match must(
        store.find_stage(chain_key, key_of(&store, Kind::Species, 2)),
        "stage failed",
    ) {
        Some(stage) => stage,
        None => panic!("ivysaur stage missing"),
    };
    let detail = match must(
        store.find_detail(stage.id, key_of(&store, Kind::Pokemon, 2)),
        "detail failed",
    ) {
        Some(detail) => detail,
        None => panic!("ivysaur detail missing after re-run"),
    };
    assert_eq!(detail.min_level, Some(16));
}

#[test]
fn local_row_still_links_after_vanishing_upstream() {
    let mut src = FixtureSource::empty();
    src.insert(Kind::Language, 9, language_doc(9, "en", "English"));
    src.insert(Kind::Habitat, 3, named_doc(3, "grassland", "Grassland"));
    let mut rec = Reconciler::new(fixture_store(), src);
    let habitat_key = must(rec.sync(Kind::Habitat, 3), "habitat sync failed");
    let store = rec.into_store();

    // The habitat is gone upstream, but the species still references it.
    let mut src = FixtureSource::empty();
    src.insert(
        Kind::Species,
        10,
        json!({
            "id": 10,
            "name": "caterpie",
            "habitat": reference(Kind::Habitat, 3, "grassland")
        }),
    );
    let mut rec = Reconciler::new(store, src);
    must(rec.sync(Kind::Species, 10), "species sync failed");
    let store = rec.into_store();

    let species = match must(store.load_by_api_id(Kind::Species, 10), "load failed") {
        Some(EntityRow::Species(s)) => s,
        other => panic!("unexpected row: {other:?}"),
    };
    assert_eq!(species.habitat_key, Some(habitat_key));
}

#[test]
fn type_matrix_is_written_in_both_directions() {
    let mut rec = Reconciler::new(fixture_store(), kanto_fixtures());
    must(rec.sync(Kind::Species, 1), "sync failed");
    let store = rec.into_store();

    let grass = key_of(&store, Kind::Type, 12);
    let poison = key_of(&store, Kind::Type, 4);

    let to_poison = match must(store.find_type_relation(grass, poison, None), "relation failed") {
        Some(relation) => relation,
        None => panic!("grass->poison relation missing"),
    };
    assert!((to_poison.multiplier - 0.5).abs() < f64::EPSILON);

    let from_poison = match must(store.find_type_relation(poison, grass, None), "relation failed") {
        Some(relation) => relation,
        None => panic!("poison->grass relation missing"),
    };
    assert!((from_poison.multiplier - 2.0).abs() < f64::EPSILON);
}

#[test]
fn base_stats_land_on_their_columns() {
    let mut rec = Reconciler::new(fixture_store(), kanto_fixtures());
    must(rec.sync(Kind::Species, 1), "sync failed");
    let store = rec.into_store();

    let row = must(store.load_by_api_id(Kind::Pokemon, 1), "load failed");
    let pokemon = match row {
        Some(EntityRow::Pokemon(p)) => p,
        other => panic!("unexpected row: {other:?}"),
    };
    assert_eq!(pokemon.hp, 45);
    assert_eq!(pokemon.speed, 45);
    assert_eq!(pokemon.species_key, Some(key_of(&store, Kind::Species, 1)));
    assert_eq!(pokemon.type_1_key, Some(key_of(&store, Kind::Type, 12)));
    assert_eq!(pokemon.type_2_key, Some(key_of(&store, Kind::Type, 4)));
    assert_eq!(pokemon.hidden_ability_key, Some(key_of(&store, Kind::Ability, 34)));
}

#[test]
fn second_run_changes_nothing() {
    let mut rec = Reconciler::new(fixture_store(), kanto_fixtures());
    let bulbasaur_key = must(rec.sync(Kind::Species, 1), "first sync failed");
    let store = rec.into_store();

    let mut first_ids: Vec<i64> =
        must(store.list_text_entries(Kind::Species, bulbasaur_key, "names"), "text failed")
            .iter()
            .map(|r| r.entry.id)
            .collect();
    first_ids.sort_unstable();
    let species_before = count(&store, Kind::Species);
    let pokemon_before = count(&store, Kind::Pokemon);

    let mut rec = Reconciler::new(store, kanto_fixtures());
    let again = must(rec.sync(Kind::Species, 1), "second sync failed");
    assert_eq!(again, bulbasaur_key);
    let store = rec.into_store();

    assert_eq!(count(&store, Kind::Species), species_before);
    assert_eq!(count(&store, Kind::Pokemon), pokemon_before);
    let mut second_ids: Vec<i64> =
        must(store.list_text_entries(Kind::Species, bulbasaur_key, "names"), "text failed")
            .iter()
            .map(|r| r.entry.id)
            .collect();
    second_ids.sort_unstable();
    assert_eq!(second_ids, first_ids);
}

#[test]
fn changed_names_replace_stale_entries_in_place() {
    let mut src = FixtureSource::empty();
    src.insert(Kind::Language, 9, language_doc(9, "en", "English"));
    src.insert(Kind::Language, 5, language_doc(5, "fr", "French"));
    src.insert(Kind::Language, 7, language_doc(7, "es", "Spanish"));
    src.insert(
        Kind::EggGroup,
        1,
        json!({
            "id": 1,
            "name": "monster",
            "names": [localized("Monster", en()), localized("Monstre", fr())]
        }),
    );
    let mut rec = Reconciler::new(fixture_store(), src);
    let group_key = must(rec.sync(Kind::EggGroup, 1), "first sync failed");
    let store = rec.into_store();

    let first = must(store.list_text_entries(Kind::EggGroup, group_key, "names"), "text failed");
    assert_eq!(first.len(), 2);
    let kept_id = match first.iter().find(|r| r.entry.text == "Monster") {
        Some(record) => record.entry.id,
        None => panic!("english entry missing"),
    };

    // Same english name, french replaced by spanish.
    let mut src = FixtureSource::empty();
    src.insert(Kind::Language, 9, language_doc(9, "en", "English"));
    src.insert(Kind::Language, 7, language_doc(7, "es", "Spanish"));
    src.insert(
        Kind::EggGroup,
        1,
        json!({
            "id": 1,
            "name": "monster",
            "names": [localized("Monster", en()), localized("Monstruo", reference(Kind::Language, 7, "es"))]
        }),
    );
    let mut rec = Reconciler::new(store, src);
    must(rec.sync(Kind::EggGroup, 1), "second sync failed");
    let store = rec.into_store();

    let second = must(store.list_text_entries(Kind::EggGroup, group_key, "names"), "text failed");
    assert_eq!(second.len(), 2);
    assert!(second.iter().any(|r| r.entry.id == kept_id && r.entry.text == "Monster"));
    assert!(second.iter().any(|r| r.entry.text == "Monstruo"));
    assert!(second.iter().all(|r| r.entry.text != "Monstre"));
}

#[test]
fn mutually_referential_species_converge() {
    let mut src = FixtureSource::empty();
    src.insert(
        Kind::Species,
        100,
        json!({
            "id": 100,
            "name": "loop-a",
            "evolves_from_species": reference(Kind::Species, 101, "loop-b")
        }),
    );
    src.insert(
        Kind::Species,
        101,
        json!({
            "id": 101,
            "name": "loop-b",
            "evolves_from_species": reference(Kind::Species, 100, "loop-a")
        }),
    );
    let mut rec = Reconciler::new(fixture_store(), src);
    must(rec.sync(Kind::Species, 100), "sync failed");
    let store = rec.into_store();

    let a_key = key_of(&store, Kind::Species, 100);
    let b_key = key_of(&store, Kind::Species, 101);
    let a = match must(store.load_by_api_id(Kind::Species, 100), "load failed") {
        Some(EntityRow::Species(s)) => s,
        other => panic!("unexpected row: {other:?}"),
    };
    let b = match must(store.load_by_api_id(Kind::Species, 101), "load failed") {
        Some(EntityRow::Species(s)) => s,
        other => panic!("unexpected row: {other:?}"),
    };
    assert_eq!(a.evolves_from_species_key, Some(b_key));
    assert_eq!(b.evolves_from_species_key, Some(a_key));
}

#[test]
fn missing_required_record_is_not_found() {
    let mut rec = Reconciler::new(fixture_store(), FixtureSource::empty());
    match rec.sync(Kind::Species, 999) {
        Err(SyncError::NotFound { kind, api_id }) => {
            assert_eq!(kind, Kind::Species);
            assert_eq!(api_id, 999);
        }
        other => panic!("expected NotFound, got {other:?}"),
    }
}

#[test]
fn missing_optional_habitat_leaves_the_link_null() {
    let mut src = FixtureSource::empty();
    src.insert(
        Kind::Species,
        10,
        json!({
            "id": 10,
            "name": "caterpie",
            "habitat": reference(Kind::Habitat, 50, "lost")
        }),
    );
    let mut rec = Reconciler::new(fixture_store(), src);
    must(rec.sync(Kind::Species, 10), "sync failed");
    let store = rec.into_store();
    let species = match must(store.load_by_api_id(Kind::Species, 10), "load failed") {
        Some(EntityRow::Species(s)) => s,
        other => panic!("unexpected row: {other:?}"),
    };
    assert!(species.habitat_key.is_none());
}

#[test]
fn unknown_stat_name_is_fatal() {
    let mut src = FixtureSource::empty();
    src.insert(
        Kind::Species,
        20,
        json!({
            "id": 20,
            "name": "statmon",
            "varieties": [{"is_default": true, "pokemon": reference(Kind::Pokemon, 20, "statmon")}]
        }),
    );
    src.insert(
        Kind::Pokemon,
        20,
        json!({
            "id": 20,
            "name": "statmon",
            "species": reference(Kind::Species, 20, "statmon"),
            "stats": [stat("evasion", 10)]
        }),
    );
    let mut rec = Reconciler::new(fixture_store(), src);
    match rec.sync(Kind::Species, 20) {
        Err(SyncError::Integrity(message)) => assert!(message.contains("evasion")),
        other => panic!("expected Integrity, got {other:?}"),
    }
}

#[test]
fn detail_variety_count_mismatch_is_fatal() {
    let mut src = FixtureSource::empty();
    src.insert(
        Kind::Species,
        60,
        json!({
            "id": 60,
            "name": "stem",
            "evolution_chain": reference(Kind::EvolutionChain, 5, "")
        }),
    );
    src.insert(Kind::Species, 61, json!({"id": 61, "name": "bloom"}));
    src.insert(Kind::EvolutionTrigger, 1, json!({"id": 1, "name": "level-up"}));
    src.insert(
        Kind::EvolutionChain,
        5,
        json!({
            "id": 5,
            "chain": {
                "species": reference(Kind::Species, 60, "stem"),
                "evolves_to": [{
                    "species": reference(Kind::Species, 61, "bloom"),
                    "evolution_details": [{
                        "trigger": reference(Kind::EvolutionTrigger, 1, "level-up")
                    }]
                }]
            }
        }),
    );
    let mut rec = Reconciler::new(fixture_store(), src);
    match rec.sync(Kind::Species, 60) {
        Err(SyncError::Integrity(message)) => assert!(message.contains("evolution details")),
        other => panic!("expected Integrity, got {other:?}"),
    }
}
