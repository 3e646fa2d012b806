//! Source-record types: the shapes of upstream JSON documents and CSV rows.
//!
//! Upstream references are `{name, url}` objects; the referenced natural id
//! is the trailing numeric path segment of the URL. Fields the pipeline does
//! not reconcile are simply not declared here.

use serde::Deserialize;

use crate::SyncError;

/// A `{name, url}` reference to another upstream record.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiRef {
    #[serde(default)]
    pub name: Option<String>,
    pub url: String,
}

impl ApiRef {
    /// Natural id encoded in the reference URL.
    ///
    /// # Errors
    /// `SyncError::Decode` if the URL has no trailing numeric segment.
    pub fn api_id(&self) -> Result<i64, SyncError> {
        let trimmed = self.url.trim_end_matches('/');
        let segment = trimmed.rsplit('/').next().unwrap_or_default();
        segment
            .parse::<i64>()
            .map_err(|_| SyncError::Decode(format!("reference url has no id: {}", self.url)))
    }
}

/// Localized display name, present on nearly every upstream document.
#[derive(Debug, Clone, Deserialize)]
pub struct NameText {
    pub name: String,
    pub language: ApiRef,
}

/// Localized genus line ("Seed Pokémon") on species documents.
#[derive(Debug, Clone, Deserialize)]
pub struct GenusText {
    pub genus: String,
    pub language: ApiRef,
}

/// Localized flavor text, scoped to a version or a version group.
#[derive(Debug, Clone, Deserialize)]
pub struct FlavorText {
    pub flavor_text: String,
    pub language: ApiRef,
    #[serde(default)]
    pub version: Option<ApiRef>,
    #[serde(default)]
    pub version_group: Option<ApiRef>,
}

/// Localized long-form description (growth-rate formulas, form notes).
#[derive(Debug, Clone, Deserialize)]
pub struct DescriptionText {
    pub description: String,
    pub language: ApiRef,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LanguageData {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub official: bool,
    #[serde(default)]
    pub iso639: String,
    #[serde(default)]
    pub iso3166: String,
    #[serde(default)]
    pub names: Vec<NameText>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EggGroupData {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub names: Vec<NameText>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ColorData {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub names: Vec<NameText>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ShapeData {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub names: Vec<NameText>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HabitatData {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub names: Vec<NameText>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GrowthRateData {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub formula: String,
    #[serde(default)]
    pub descriptions: Vec<DescriptionText>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EvolutionTriggerData {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub names: Vec<NameText>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ItemData {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub cost: i64,
    #[serde(default)]
    pub names: Vec<NameText>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MoveData {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub power: Option<i64>,
    #[serde(default)]
    pub pp: Option<i64>,
    #[serde(default)]
    pub accuracy: Option<i64>,
    #[serde(default)]
    pub priority: i64,
    #[serde(rename = "type", default)]
    pub type_: Option<ApiRef>,
    #[serde(default)]
    pub names: Vec<NameText>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LocationData {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub region: Option<ApiRef>,
    #[serde(default)]
    pub names: Vec<NameText>,
}

/// One tier of the type-effectiveness matrix, as upstream publishes it.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DamageRelations {
    #[serde(default)]
    pub double_damage_to: Vec<ApiRef>,
    #[serde(default)]
    pub half_damage_to: Vec<ApiRef>,
    #[serde(default)]
    pub no_damage_to: Vec<ApiRef>,
    #[serde(default)]
    pub double_damage_from: Vec<ApiRef>,
    #[serde(default)]
    pub half_damage_from: Vec<ApiRef>,
    #[serde(default)]
    pub no_damage_from: Vec<ApiRef>,
}

/// Effectiveness overrides that applied up to a given generation.
#[derive(Debug, Clone, Deserialize)]
pub struct PastDamageRelations {
    pub generation: ApiRef,
    pub damage_relations: DamageRelations,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TypeData {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub damage_relations: DamageRelations,
    #[serde(default)]
    pub past_damage_relations: Vec<PastDamageRelations>,
    #[serde(default)]
    pub names: Vec<NameText>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AbilityData {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub is_main_series: bool,
    #[serde(default)]
    pub names: Vec<NameText>,
    #[serde(default)]
    pub flavor_text_entries: Vec<FlavorText>,
}

/// A species' pointer to one of its concrete forms.
#[derive(Debug, Clone, Deserialize)]
pub struct VarietyRef {
    #[serde(default)]
    pub is_default: bool,
    pub pokemon: ApiRef,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SpeciesData {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub order: i64,
    #[serde(default)]
    pub gender_rate: i64,
    #[serde(default)]
    pub capture_rate: i64,
    #[serde(default)]
    pub base_happiness: Option<i64>,
    #[serde(default)]
    pub is_baby: bool,
    #[serde(default)]
    pub is_legendary: bool,
    #[serde(default)]
    pub is_mythical: bool,
    #[serde(default)]
    pub hatch_counter: Option<i64>,
    #[serde(default)]
    pub has_gender_differences: bool,
    #[serde(default)]
    pub forms_switchable: bool,
    #[serde(default)]
    pub evolves_from_species: Option<ApiRef>,
    #[serde(default)]
    pub egg_groups: Vec<ApiRef>,
    #[serde(default)]
    pub color: Option<ApiRef>,
    #[serde(default)]
    pub shape: Option<ApiRef>,
    #[serde(default)]
    pub habitat: Option<ApiRef>,
    #[serde(default)]
    pub growth_rate: Option<ApiRef>,
    #[serde(default)]
    pub generation: Option<ApiRef>,
    #[serde(default)]
    pub evolution_chain: Option<ApiRef>,
    #[serde(default)]
    pub varieties: Vec<VarietyRef>,
    #[serde(default)]
    pub names: Vec<NameText>,
    #[serde(default)]
    pub genera: Vec<GenusText>,
    #[serde(default)]
    pub flavor_text_entries: Vec<FlavorText>,
    #[serde(default)]
    pub form_descriptions: Vec<DescriptionText>,
}

/// Base stat value keyed by stat name (`hp`, `attack`, ...).
#[derive(Debug, Clone, Deserialize)]
pub struct StatValue {
    pub base_stat: i64,
    pub stat: ApiRef,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TypeSlot {
    pub slot: i64,
    #[serde(rename = "type")]
    pub type_: ApiRef,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AbilitySlot {
    pub slot: i64,
    #[serde(default)]
    pub is_hidden: bool,
    pub ability: ApiRef,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PokemonData {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub base_experience: Option<i64>,
    #[serde(default)]
    pub height: i64,
    #[serde(default)]
    pub weight: i64,
    #[serde(default)]
    pub is_default: bool,
    #[serde(default)]
    pub order: Option<i64>,
    pub species: ApiRef,
    #[serde(default)]
    pub stats: Vec<StatValue>,
    #[serde(default)]
    pub types: Vec<TypeSlot>,
    #[serde(default)]
    pub abilities: Vec<AbilitySlot>,
}

/// One path by which a species evolves into the link that carries it.
#[derive(Debug, Clone, Deserialize)]
pub struct EvolutionDetailData {
    pub trigger: ApiRef,
    #[serde(default)]
    pub item: Option<ApiRef>,
    #[serde(default)]
    pub held_item: Option<ApiRef>,
    #[serde(default)]
    pub known_move: Option<ApiRef>,
    #[serde(default)]
    pub known_move_type: Option<ApiRef>,
    #[serde(default)]
    pub location: Option<ApiRef>,
    #[serde(default)]
    pub party_species: Option<ApiRef>,
    #[serde(default)]
    pub party_type: Option<ApiRef>,
    #[serde(default)]
    pub trade_species: Option<ApiRef>,
    #[serde(default)]
    pub gender: Option<i64>,
    #[serde(default)]
    pub min_level: Option<i64>,
    #[serde(default)]
    pub min_happiness: Option<i64>,
    #[serde(default)]
    pub min_beauty: Option<i64>,
    #[serde(default)]
    pub min_affection: Option<i64>,
    #[serde(default)]
    pub relative_physical_stats: Option<i64>,
    #[serde(default)]
    pub needs_overworld_rain: bool,
    #[serde(default)]
    pub turn_upside_down: bool,
    #[serde(default)]
    pub time_of_day: String,
}

/// Recursive chain node: a species plus how it was reached and what follows.
#[derive(Debug, Clone, Deserialize)]
pub struct ChainLinkData {
    #[serde(default)]
    pub is_baby: bool,
    pub species: ApiRef,
    #[serde(default)]
    pub evolution_details: Vec<EvolutionDetailData>,
    #[serde(default)]
    pub evolves_to: Vec<ChainLinkData>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EvolutionChainData {
    pub id: i64,
    #[serde(default)]
    pub baby_trigger_item: Option<ApiRef>,
    pub chain: ChainLinkData,
}

// CSV snapshot rows. Headers follow the upstream data dump.

#[derive(Debug, Clone, Deserialize)]
pub struct LanguageRow {
    pub id: i64,
    pub iso639: String,
    pub iso3166: String,
    pub identifier: String,
    #[serde(default)]
    pub official: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegionRow {
    pub id: i64,
    pub identifier: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GenerationRow {
    pub id: i64,
    pub main_region_id: i64,
    pub identifier: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VersionGroupRow {
    pub id: i64,
    pub identifier: String,
    pub generation_id: i64,
    #[serde(default)]
    pub order: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VersionRow {
    pub id: i64,
    pub version_group_id: i64,
    pub identifier: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_ref_parses_trailing_id() {
        let r = ApiRef {
            name: Some("bulbasaur".to_owned()),
            url: "https://pokeapi.co/api/v2/pokemon-species/1/".to_owned(),
        };
        match r.api_id() {
            Ok(id) => assert_eq!(id, 1),
            Err(err) => panic!("expected id: {err}"),
        }
    }

    #[test]
    fn api_ref_rejects_non_numeric_tail() {
        let r = ApiRef {
            name: None,
            url: "https://pokeapi.co/api/v2/pokemon-species/".to_owned(),
        };
        assert!(r.api_id().is_err());
    }

    #[test]
    fn species_document_decodes_with_sparse_fields() {
        let doc = serde_json::json!({
            "id": 1,
            "name": "bulbasaur",
            "gender_rate": 1,
            "capture_rate": 45,
            "color": {"name": "green", "url": "https://pokeapi.co/api/v2/pokemon-color/5/"}
        });
        let parsed: Result<SpeciesData, _> = serde_json::from_value(doc);
        match parsed {
            Ok(data) => {
                assert_eq!(data.name, "bulbasaur");
                assert!(data.habitat.is_none());
                assert!(data.varieties.is_empty());
            }
            Err(err) => panic!("decode failed: {err}"),
        }
    }
}
