//! Persisted entity rows.
//!
//! Every row carries a sequence-allocated `i64` surrogate id and (for
//! reconciled kinds) the upstream natural id in `api_id`. Relationships are
//! plain nullable `*_key` columns; self-referential structures (evolution
//! chains) are rows pointing at rows, never owned graphs.
//!
//! `from_data` builds a fresh row from a source record; `compare` folds a
//! source record into an existing row and reports whether anything changed.
//! Neither touches relationship keys; those are the resolvers' job.

use crate::api;
use crate::{Kind, SyncError};

macro_rules! fold {
    ($changed:ident, $field:expr, $value:expr) => {
        if $field != $value {
            $field = $value;
            $changed = true;
        }
    };
}

#[derive(Debug, Clone, PartialEq)]
pub struct Language {
    pub id: i64,
    pub api_id: i64,
    pub name: String,
    pub official: bool,
    pub iso639: String,
    pub iso3166: String,
}

impl Language {
    #[must_use]
    pub fn from_data(id: i64, data: &api::LanguageData) -> Self {
        Language {
            id,
            api_id: data.id,
            name: data.name.clone(),
            official: data.official,
            iso639: data.iso639.clone(),
            iso3166: data.iso3166.clone(),
        }
    }

    pub fn compare(&mut self, data: &api::LanguageData) -> bool {
        let mut changed = false;
        fold!(changed, self.name, data.name.clone());
        fold!(changed, self.official, data.official);
        fold!(changed, self.iso639, data.iso639.clone());
        fold!(changed, self.iso3166, data.iso3166.clone());
        changed
    }

    #[must_use]
    pub fn from_row(id: i64, row: &api::LanguageRow) -> Self {
        Language {
            id,
            api_id: row.id,
            name: row.identifier.clone(),
            official: row.official == 1,
            iso639: row.iso639.clone(),
            iso3166: row.iso3166.clone(),
        }
    }

    pub fn compare_row(&mut self, row: &api::LanguageRow) -> bool {
        let mut changed = false;
        fold!(changed, self.name, row.identifier.clone());
        fold!(changed, self.official, row.official == 1);
        fold!(changed, self.iso639, row.iso639.clone());
        fold!(changed, self.iso3166, row.iso3166.clone());
        changed
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EggGroup {
    pub id: i64,
    pub api_id: i64,
    pub name: String,
}

impl EggGroup {
    #[must_use]
    pub fn from_data(id: i64, data: &api::EggGroupData) -> Self {
        EggGroup { id, api_id: data.id, name: data.name.clone() }
    }

    pub fn compare(&mut self, data: &api::EggGroupData) -> bool {
        let mut changed = false;
        fold!(changed, self.name, data.name.clone());
        changed
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PokemonColor {
    pub id: i64,
    pub api_id: i64,
    pub name: String,
}

impl PokemonColor {
    #[must_use]
    pub fn from_data(id: i64, data: &api::ColorData) -> Self {
        PokemonColor { id, api_id: data.id, name: data.name.clone() }
    }

    pub fn compare(&mut self, data: &api::ColorData) -> bool {
        let mut changed = false;
        fold!(changed, self.name, data.name.clone());
        changed
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PokemonShape {
    pub id: i64,
    pub api_id: i64,
    pub name: String,
}

impl PokemonShape {
    #[must_use]
    pub fn from_data(id: i64, data: &api::ShapeData) -> Self {
        PokemonShape { id, api_id: data.id, name: data.name.clone() }
    }

    pub fn compare(&mut self, data: &api::ShapeData) -> bool {
        let mut changed = false;
        fold!(changed, self.name, data.name.clone());
        changed
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PokemonHabitat {
    pub id: i64,
    pub api_id: i64,
    pub name: String,
}

impl PokemonHabitat {
    #[must_use]
    pub fn from_data(id: i64, data: &api::HabitatData) -> Self {
        PokemonHabitat { id, api_id: data.id, name: data.name.clone() }
    }

    pub fn compare(&mut self, data: &api::HabitatData) -> bool {
        let mut changed = false;
        fold!(changed, self.name, data.name.clone());
        changed
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GrowthRate {
    pub id: i64,
    pub api_id: i64,
    pub name: String,
    pub formula: String,
}

impl GrowthRate {
    #[must_use]
    pub fn from_data(id: i64, data: &api::GrowthRateData) -> Self {
        GrowthRate {
            id,
            api_id: data.id,
            name: data.name.clone(),
            formula: data.formula.clone(),
        }
    }

    pub fn compare(&mut self, data: &api::GrowthRateData) -> bool {
        let mut changed = false;
        fold!(changed, self.name, data.name.clone());
        fold!(changed, self.formula, data.formula.clone());
        changed
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EvolutionTrigger {
    pub id: i64,
    pub api_id: i64,
    pub name: String,
}

impl EvolutionTrigger {
    #[must_use]
    pub fn from_data(id: i64, data: &api::EvolutionTriggerData) -> Self {
        EvolutionTrigger { id, api_id: data.id, name: data.name.clone() }
    }

    pub fn compare(&mut self, data: &api::EvolutionTriggerData) -> bool {
        let mut changed = false;
        fold!(changed, self.name, data.name.clone());
        changed
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    pub id: i64,
    pub api_id: i64,
    pub name: String,
    pub cost: i64,
}

impl Item {
    #[must_use]
    pub fn from_data(id: i64, data: &api::ItemData) -> Self {
        Item { id, api_id: data.id, name: data.name.clone(), cost: data.cost }
    }

    pub fn compare(&mut self, data: &api::ItemData) -> bool {
        let mut changed = false;
        fold!(changed, self.name, data.name.clone());
        fold!(changed, self.cost, data.cost);
        changed
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Move {
    pub id: i64,
    pub api_id: i64,
    pub name: String,
    pub power: Option<i64>,
    pub pp: Option<i64>,
    pub accuracy: Option<i64>,
    pub priority: i64,
    pub type_key: Option<i64>,
}

impl Move {
    #[must_use]
    pub fn from_data(id: i64, data: &api::MoveData) -> Self {
        Move {
            id,
            api_id: data.id,
            name: data.name.clone(),
            power: data.power,
            pp: data.pp,
            accuracy: data.accuracy,
            priority: data.priority,
            type_key: None,
        }
    }

    pub fn compare(&mut self, data: &api::MoveData) -> bool {
        let mut changed = false;
        fold!(changed, self.name, data.name.clone());
        fold!(changed, self.power, data.power);
        fold!(changed, self.pp, data.pp);
        fold!(changed, self.accuracy, data.accuracy);
        fold!(changed, self.priority, data.priority);
        changed
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Location {
    pub id: i64,
    pub api_id: i64,
    pub name: String,
    pub region_key: Option<i64>,
}

impl Location {
    #[must_use]
    pub fn from_data(id: i64, data: &api::LocationData) -> Self {
        Location { id, api_id: data.id, name: data.name.clone(), region_key: None }
    }

    pub fn compare(&mut self, data: &api::LocationData) -> bool {
        let mut changed = false;
        fold!(changed, self.name, data.name.clone());
        changed
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PokemonType {
    pub id: i64,
    pub api_id: i64,
    pub name: String,
}

impl PokemonType {
    #[must_use]
    pub fn from_data(id: i64, data: &api::TypeData) -> Self {
        PokemonType { id, api_id: data.id, name: data.name.clone() }
    }

    pub fn compare(&mut self, data: &api::TypeData) -> bool {
        let mut changed = false;
        fold!(changed, self.name, data.name.clone());
        changed
    }
}

/// One cell of the type-effectiveness matrix. `generation_key` is NULL for
/// the current matrix and set for a past-generation override.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeRelation {
    pub id: i64,
    pub offense_key: i64,
    pub defense_key: i64,
    pub generation_key: Option<i64>,
    pub multiplier: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Ability {
    pub id: i64,
    pub api_id: i64,
    pub name: String,
    pub is_main_series: bool,
}

impl Ability {
    #[must_use]
    pub fn from_data(id: i64, data: &api::AbilityData) -> Self {
        Ability {
            id,
            api_id: data.id,
            name: data.name.clone(),
            is_main_series: data.is_main_series,
        }
    }

    pub fn compare(&mut self, data: &api::AbilityData) -> bool {
        let mut changed = false;
        fold!(changed, self.name, data.name.clone());
        fold!(changed, self.is_main_series, data.is_main_series);
        changed
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Species {
    pub id: i64,
    pub api_id: i64,
    pub name: String,
    pub ordering: i64,
    pub gender_rate: i64,
    pub capture_rate: i64,
    pub base_happiness: Option<i64>,
    pub is_baby: bool,
    pub is_legendary: bool,
    pub is_mythical: bool,
    pub hatch_counter: Option<i64>,
    pub has_gender_differences: bool,
    pub forms_switchable: bool,
    pub evolves_from_species_key: Option<i64>,
    pub egg_group_1_key: Option<i64>,
    pub egg_group_2_key: Option<i64>,
    pub color_key: Option<i64>,
    pub shape_key: Option<i64>,
    pub habitat_key: Option<i64>,
    pub growth_rate_key: Option<i64>,
    pub generation_key: Option<i64>,
    pub evolution_chain_key: Option<i64>,
}

impl Species {
    #[must_use]
    pub fn from_data(id: i64, data: &api::SpeciesData) -> Self {
        Species {
            id,
            api_id: data.id,
            name: data.name.clone(),
            ordering: data.order,
            gender_rate: data.gender_rate,
            capture_rate: data.capture_rate,
            base_happiness: data.base_happiness,
            is_baby: data.is_baby,
            is_legendary: data.is_legendary,
            is_mythical: data.is_mythical,
            hatch_counter: data.hatch_counter,
            has_gender_differences: data.has_gender_differences,
            forms_switchable: data.forms_switchable,
            evolves_from_species_key: None,
            egg_group_1_key: None,
            egg_group_2_key: None,
            color_key: None,
            shape_key: None,
            habitat_key: None,
            growth_rate_key: None,
            generation_key: None,
            evolution_chain_key: None,
        }
    }

    pub fn compare(&mut self, data: &api::SpeciesData) -> bool {
        let mut changed = false;
        fold!(changed, self.name, data.name.clone());
        fold!(changed, self.ordering, data.order);
        fold!(changed, self.gender_rate, data.gender_rate);
        fold!(changed, self.capture_rate, data.capture_rate);
        fold!(changed, self.base_happiness, data.base_happiness);
        fold!(changed, self.is_baby, data.is_baby);
        fold!(changed, self.is_legendary, data.is_legendary);
        fold!(changed, self.is_mythical, data.is_mythical);
        fold!(changed, self.hatch_counter, data.hatch_counter);
        fold!(changed, self.has_gender_differences, data.has_gender_differences);
        fold!(changed, self.forms_switchable, data.forms_switchable);
        changed
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Pokemon {
    pub id: i64,
    pub api_id: i64,
    pub name: String,
    pub base_experience: Option<i64>,
    pub height: i64,
    pub weight: i64,
    pub is_default: bool,
    pub ordering: Option<i64>,
    pub species_key: Option<i64>,
    pub type_1_key: Option<i64>,
    pub type_2_key: Option<i64>,
    pub ability_1_key: Option<i64>,
    pub ability_2_key: Option<i64>,
    pub hidden_ability_key: Option<i64>,
    pub hp: i64,
    pub attack: i64,
    pub defense: i64,
    pub special_attack: i64,
    pub special_defense: i64,
    pub speed: i64,
}

impl Pokemon {
    #[must_use]
    pub fn from_data(id: i64, data: &api::PokemonData) -> Self {
        Pokemon {
            id,
            api_id: data.id,
            name: data.name.clone(),
            base_experience: data.base_experience,
            height: data.height,
            weight: data.weight,
            is_default: data.is_default,
            ordering: data.order,
            species_key: None,
            type_1_key: None,
            type_2_key: None,
            ability_1_key: None,
            ability_2_key: None,
            hidden_ability_key: None,
            hp: 0,
            attack: 0,
            defense: 0,
            special_attack: 0,
            special_defense: 0,
            speed: 0,
        }
    }

    pub fn compare(&mut self, data: &api::PokemonData) -> bool {
        let mut changed = false;
        fold!(changed, self.name, data.name.clone());
        fold!(changed, self.base_experience, data.base_experience);
        fold!(changed, self.height, data.height);
        fold!(changed, self.weight, data.weight);
        fold!(changed, self.is_default, data.is_default);
        fold!(changed, self.ordering, data.order);
        changed
    }
}

/// Dispatches one named base-stat value onto the matching column. An unknown
/// stat name means the source data no longer matches this schema and the run
/// must stop.
///
/// # Errors
/// `SyncError::Integrity` for any name outside the six known stats.
pub fn apply_base_stat(pokemon: &mut Pokemon, stat_name: &str, value: i64) -> Result<(), SyncError> {
    match stat_name {
        "hp" => pokemon.hp = value,
        "attack" => pokemon.attack = value,
        "defense" => pokemon.defense = value,
        "special-attack" => pokemon.special_attack = value,
        "special-defense" => pokemon.special_defense = value,
        "speed" => pokemon.speed = value,
        other => {
            return Err(SyncError::Integrity(format!(
                "unknown stat '{other}' on pokemon {}",
                pokemon.api_id
            )))
        }
    }
    Ok(())
}

/// One chain per upstream document; stages hang off it.
#[derive(Debug, Clone, PartialEq)]
pub struct EvolutionChain {
    pub id: i64,
    pub api_id: i64,
    pub baby_trigger_item_key: Option<i64>,
}

impl EvolutionChain {
    #[must_use]
    pub fn from_data(id: i64, data: &api::EvolutionChainData) -> Self {
        EvolutionChain { id, api_id: data.id, baby_trigger_item_key: None }
    }

    /// Chains carry no scalar fields of their own.
    pub fn compare(&mut self, _data: &api::EvolutionChainData) -> bool {
        false
    }
}

/// One species' place in a chain. `evolves_from_key` points at the previous
/// stage row, not at a species.
#[derive(Debug, Clone, PartialEq)]
pub struct ChainStage {
    pub id: i64,
    pub chain_key: i64,
    pub species_key: i64,
    pub evolves_from_key: Option<i64>,
    pub is_baby: bool,
}

/// One way of reaching a stage, attached to the concrete variety it applies
/// to. Keyed `(stage_key, pokemon_key)` so re-runs update in place.
#[derive(Debug, Clone, PartialEq)]
pub struct EvolutionDetail {
    pub id: i64,
    pub stage_key: i64,
    pub pokemon_key: i64,
    pub trigger_key: i64,
    pub item_key: Option<i64>,
    pub held_item_key: Option<i64>,
    pub known_move_key: Option<i64>,
    pub known_move_type_key: Option<i64>,
    pub location_key: Option<i64>,
    pub party_species_key: Option<i64>,
    pub party_type_key: Option<i64>,
    pub trade_species_key: Option<i64>,
    pub gender: Option<i64>,
    pub min_level: Option<i64>,
    pub min_happiness: Option<i64>,
    pub min_beauty: Option<i64>,
    pub min_affection: Option<i64>,
    pub relative_physical_stats: Option<i64>,
    pub needs_overworld_rain: bool,
    pub turn_upside_down: bool,
    pub time_of_day: String,
}

impl EvolutionDetail {
    /// Folds the scalar conditions in; relationship keys are the resolver's.
    pub fn compare_scalars(&mut self, data: &api::EvolutionDetailData) -> bool {
        let mut changed = false;
        fold!(changed, self.gender, data.gender);
        fold!(changed, self.min_level, data.min_level);
        fold!(changed, self.min_happiness, data.min_happiness);
        fold!(changed, self.min_beauty, data.min_beauty);
        fold!(changed, self.min_affection, data.min_affection);
        fold!(changed, self.relative_physical_stats, data.relative_physical_stats);
        fold!(changed, self.needs_overworld_rain, data.needs_overworld_rain);
        fold!(changed, self.turn_upside_down, data.turn_upside_down);
        fold!(changed, self.time_of_day, data.time_of_day.clone());
        changed
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Region {
    pub id: i64,
    pub api_id: i64,
    pub name: String,
}

impl Region {
    #[must_use]
    pub fn from_row(id: i64, row: &api::RegionRow) -> Self {
        Region { id, api_id: row.id, name: row.identifier.clone() }
    }

    pub fn compare_row(&mut self, row: &api::RegionRow) -> bool {
        let mut changed = false;
        fold!(changed, self.name, row.identifier.clone());
        changed
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Generation {
    pub id: i64,
    pub api_id: i64,
    pub name: String,
    pub main_region_key: Option<i64>,
}

impl Generation {
    #[must_use]
    pub fn from_row(id: i64, row: &api::GenerationRow) -> Self {
        Generation { id, api_id: row.id, name: row.identifier.clone(), main_region_key: None }
    }

    pub fn compare_row(&mut self, row: &api::GenerationRow) -> bool {
        let mut changed = false;
        fold!(changed, self.name, row.identifier.clone());
        changed
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VersionGroup {
    pub id: i64,
    pub api_id: i64,
    pub name: String,
    pub ordering: i64,
    pub generation_key: Option<i64>,
}

impl VersionGroup {
    #[must_use]
    pub fn from_row(id: i64, row: &api::VersionGroupRow) -> Self {
        VersionGroup {
            id,
            api_id: row.id,
            name: row.identifier.clone(),
            ordering: row.order,
            generation_key: None,
        }
    }

    pub fn compare_row(&mut self, row: &api::VersionGroupRow) -> bool {
        let mut changed = false;
        fold!(changed, self.name, row.identifier.clone());
        fold!(changed, self.ordering, row.order);
        changed
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Version {
    pub id: i64,
    pub api_id: i64,
    pub name: String,
    pub version_group_key: Option<i64>,
}

impl Version {
    #[must_use]
    pub fn from_row(id: i64, row: &api::VersionRow) -> Self {
        Version { id, api_id: row.id, name: row.identifier.clone(), version_group_key: None }
    }

    pub fn compare_row(&mut self, row: &api::VersionRow) -> bool {
        let mut changed = false;
        fold!(changed, self.name, row.identifier.clone());
        changed
    }
}

/// One localized text child in the generic `text_entries` table.
#[derive(Debug, Clone, PartialEq)]
pub struct TextEntry {
    pub id: i64,
    pub parent_kind: Kind,
    pub parent_id: i64,
    pub grouping: String,
    pub language_key: i64,
    pub version_key: Option<i64>,
    pub version_group_key: Option<i64>,
    pub text: String,
}

/// A persisted entity row, tagged by kind, for single-dispatch store calls.
#[derive(Debug, Clone, PartialEq)]
pub enum EntityRow {
    Language(Language),
    EggGroup(EggGroup),
    Color(PokemonColor),
    Shape(PokemonShape),
    Habitat(PokemonHabitat),
    GrowthRate(GrowthRate),
    Species(Species),
    Pokemon(Pokemon),
    Type(PokemonType),
    Ability(Ability),
    Move(Move),
    Item(Item),
    Location(Location),
    EvolutionTrigger(EvolutionTrigger),
    EvolutionChain(EvolutionChain),
    Region(Region),
    Generation(Generation),
    VersionGroup(VersionGroup),
    Version(Version),
}

impl EntityRow {
    #[must_use]
    pub fn kind(&self) -> Kind {
        match self {
            EntityRow::Language(_) => Kind::Language,
            EntityRow::EggGroup(_) => Kind::EggGroup,
            EntityRow::Color(_) => Kind::Color,
            EntityRow::Shape(_) => Kind::Shape,
            EntityRow::Habitat(_) => Kind::Habitat,
            EntityRow::GrowthRate(_) => Kind::GrowthRate,
            EntityRow::Species(_) => Kind::Species,
            EntityRow::Pokemon(_) => Kind::Pokemon,
            EntityRow::Type(_) => Kind::Type,
            EntityRow::Ability(_) => Kind::Ability,
            EntityRow::Move(_) => Kind::Move,
            EntityRow::Item(_) => Kind::Item,
            EntityRow::Location(_) => Kind::Location,
            EntityRow::EvolutionTrigger(_) => Kind::EvolutionTrigger,
            EntityRow::EvolutionChain(_) => Kind::EvolutionChain,
            EntityRow::Region(_) => Kind::Region,
            EntityRow::Generation(_) => Kind::Generation,
            EntityRow::VersionGroup(_) => Kind::VersionGroup,
            EntityRow::Version(_) => Kind::Version,
        }
    }

    #[must_use]
    pub fn id(&self) -> i64 {
        match self {
            EntityRow::Language(e) => e.id,
            EntityRow::EggGroup(e) => e.id,
            EntityRow::Color(e) => e.id,
            EntityRow::Shape(e) => e.id,
            EntityRow::Habitat(e) => e.id,
            EntityRow::GrowthRate(e) => e.id,
            EntityRow::Species(e) => e.id,
            EntityRow::Pokemon(e) => e.id,
            EntityRow::Type(e) => e.id,
            EntityRow::Ability(e) => e.id,
            EntityRow::Move(e) => e.id,
            EntityRow::Item(e) => e.id,
            EntityRow::Location(e) => e.id,
            EntityRow::EvolutionTrigger(e) => e.id,
            EntityRow::EvolutionChain(e) => e.id,
            EntityRow::Region(e) => e.id,
            EntityRow::Generation(e) => e.id,
            EntityRow::VersionGroup(e) => e.id,
            EntityRow::Version(e) => e.id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture_language_data() -> api::LanguageData {
        api::LanguageData {
            id: 9,
            name: "en".to_owned(),
            official: true,
            iso639: "en".to_owned(),
            iso3166: "us".to_owned(),
            names: Vec::new(),
        }
    }

    #[test]
    fn compare_reports_no_change_for_identical_data() {
        let data = fixture_language_data();
        let mut lang = Language::from_data(101, &data);
        assert!(!lang.compare(&data));
        assert_eq!(lang.id, 101);
        assert_eq!(lang.api_id, 9);
    }

    #[test]
    fn compare_folds_changed_scalars_in() {
        let data = fixture_language_data();
        let mut lang = Language::from_data(101, &data);
        let mut renamed = data.clone();
        renamed.name = "english".to_owned();
        assert!(lang.compare(&renamed));
        assert_eq!(lang.name, "english");
        assert!(!lang.compare(&renamed));
    }

    #[test]
    fn stat_dispatch_covers_the_six_stats() {
        let data = api::PokemonData {
            id: 1,
            name: "bulbasaur".to_owned(),
            base_experience: Some(64),
            height: 7,
            weight: 69,
            is_default: true,
            order: Some(1),
            species: api::ApiRef {
                name: Some("bulbasaur".to_owned()),
                url: "https://pokeapi.co/api/v2/pokemon-species/1/".to_owned(),
            },
            stats: Vec::new(),
            types: Vec::new(),
            abilities: Vec::new(),
        };
        let mut mon = Pokemon::from_data(7, &data);
        for (name, value) in [
            ("hp", 45),
            ("attack", 49),
            ("defense", 49),
            ("special-attack", 65),
            ("special-defense", 65),
            ("speed", 45),
        ] {
            if let Err(err) = apply_base_stat(&mut mon, name, value) {
                panic!("dispatch failed for {name}: {err}");
            }
        }
        assert_eq!(mon.hp, 45);
        assert_eq!(mon.special_defense, 65);
    }

    #[test]
    fn unknown_stat_name_is_an_integrity_error() {
        let mut mon = Pokemon {
            id: 1,
            api_id: 1,
            name: "bulbasaur".to_owned(),
            base_experience: None,
            height: 0,
            weight: 0,
            is_default: true,
            ordering: None,
            species_key: None,
            type_1_key: None,
            type_2_key: None,
            ability_1_key: None,
            ability_2_key: None,
            hidden_ability_key: None,
            hp: 0,
            attack: 0,
            defense: 0,
            special_attack: 0,
            special_defense: 0,
            speed: 0,
        };
        match apply_base_stat(&mut mon, "evasion", 100) {
            Err(SyncError::Integrity(msg)) => assert!(msg.contains("evasion")),
            other => panic!("expected integrity error, got {other:?}"),
        }
    }
}
