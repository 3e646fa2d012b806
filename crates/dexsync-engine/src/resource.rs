//! Per-kind reconciliation behavior.
//!
//! `Resource` binds an entity row to its source-document type and supplies
//! the pieces the generic upsert needs: construction, scalar comparison,
//! store dispatch, text groups, and the relationship resolver. Resolver
//! bodies run between parse/compare and the commit, so every key they assign
//! lands in the same transaction as the row itself.

use dexsync_client::DataSource;
use dexsync_core::api;
use dexsync_core::model::{self, EntityRow};
use dexsync_core::{is_mega_form, Kind, Missing, SyncError};
use serde::de::DeserializeOwned;
use tracing::warn;

use crate::text::{
    description_sources, flavor_sources, genus_sources, name_sources, TextGroupSpec, TextScope,
    TextSource,
};
use crate::{required, Reconciler};

pub(crate) trait Resource: Sized + Clone {
    const KIND: Kind;
    type Data: DeserializeOwned;

    fn from_data(id: i64, data: &Self::Data) -> Self;
    fn compare(&mut self, data: &Self::Data) -> bool;
    fn id(&self) -> i64;
    fn from_entity(row: EntityRow) -> Option<Self>;
    fn as_row(&self) -> EntityRow;

    fn text_groups() -> Vec<TextGroupSpec<Self::Data>> {
        Vec::new()
    }

    fn resolve<S: DataSource>(
        _rec: &mut Reconciler<S>,
        _entity: &mut Self,
        _data: &Self::Data,
    ) -> Result<(), SyncError> {
        Ok(())
    }
}

fn language_names(d: &api::LanguageData) -> Vec<TextSource> {
    name_sources(&d.names)
}

impl Resource for model::Language {
    const KIND: Kind = Kind::Language;
    type Data = api::LanguageData;

    fn from_data(id: i64, data: &Self::Data) -> Self {
        model::Language::from_data(id, data)
    }
    fn compare(&mut self, data: &Self::Data) -> bool {
        model::Language::compare(self, data)
    }
    fn id(&self) -> i64 {
        self.id
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
    fn text_groups() -> Vec<TextGroupSpec<Self::Data>> {
        vec![TextGroupSpec { grouping: "names", scope: TextScope::Plain, extract: language_names }]
    }
}

fn egg_group_names(d: &api::EggGroupData) -> Vec<TextSource> {
    name_sources(&d.names)
}

impl Resource for model::EggGroup {
    const KIND: Kind = Kind::EggGroup;
    type Data = api::EggGroupData;

    fn from_data(id: i64, data: &Self::Data) -> Self {
        model::EggGroup::from_data(id, data)
    }
    fn compare(&mut self, data: &Self::Data) -> bool {
        model::EggGroup::compare(self, data)
    }
    fn id(&self) -> i64 {
        self.id
    }
    fn from_entity(row: EntityRow) -> Option<Self> {
        match row {
            EntityRow::EggGroup(e) => Some(e),
            _ => None,
        }
    }
    fn as_row(&self) -> EntityRow {
        EntityRow::EggGroup(self.clone())
    }
    fn text_groups() -> Vec<TextGroupSpec<Self::Data>> {
        vec![TextGroupSpec { grouping: "names", scope: TextScope::Plain, extract: egg_group_names }]
    }
}

fn color_names(d: &api::ColorData) -> Vec<TextSource> {
    name_sources(&d.names)
}

impl Resource for model::PokemonColor {
    const KIND: Kind = Kind::Color;
    type Data = api::ColorData;

    fn from_data(id: i64, data: &Self::Data) -> Self {
        model::PokemonColor::from_data(id, data)
    }
    fn compare(&mut self, data: &Self::Data) -> bool {
        model::PokemonColor::compare(self, data)
    }
    fn id(&self) -> i64 {
        self.id
    }
    fn from_entity(row: EntityRow) -> Option<Self> {
        match row {
            EntityRow::Color(e) => Some(e),
            _ => None,
        }
    }
    fn as_row(&self) -> EntityRow {
        EntityRow::Color(self.clone())
    }
    fn text_groups() -> Vec<TextGroupSpec<Self::Data>> {
        vec![TextGroupSpec { grouping: "names", scope: TextScope::Plain, extract: color_names }]
    }
}

fn shape_names(d: &api::ShapeData) -> Vec<TextSource> {
    name_sources(&d.names)
}

impl Resource for model::PokemonShape {
    const KIND: Kind = Kind::Shape;
    type Data = api::ShapeData;

    fn from_data(id: i64, data: &Self::Data) -> Self {
        model::PokemonShape::from_data(id, data)
    }
    fn compare(&mut self, data: &Self::Data) -> bool {
        model::PokemonShape::compare(self, data)
    }
    fn id(&self) -> i64 {
        self.id
    }
    fn from_entity(row: EntityRow) -> Option<Self> {
        match row {
            EntityRow::Shape(e) => Some(e),
            _ => None,
        }
    }
    fn as_row(&self) -> EntityRow {
        EntityRow::Shape(self.clone())
    }
    fn text_groups() -> Vec<TextGroupSpec<Self::Data>> {
        vec![TextGroupSpec { grouping: "names", scope: TextScope::Plain, extract: shape_names }]
    }
}

fn habitat_names(d: &api::HabitatData) -> Vec<TextSource> {
    name_sources(&d.names)
}

impl Resource for model::PokemonHabitat {
    const KIND: Kind = Kind::Habitat;
    type Data = api::HabitatData;

    fn from_data(id: i64, data: &Self::Data) -> Self {
        model::PokemonHabitat::from_data(id, data)
    }
    fn compare(&mut self, data: &Self::Data) -> bool {
        model::PokemonHabitat::compare(self, data)
    }
    fn id(&self) -> i64 {
        self.id
    }
    fn from_entity(row: EntityRow) -> Option<Self> {
        match row {
            EntityRow::Habitat(e) => Some(e),
            _ => None,
        }
    }
    fn as_row(&self) -> EntityRow {
        EntityRow::Habitat(self.clone())
    }
    fn text_groups() -> Vec<TextGroupSpec<Self::Data>> {
        vec![TextGroupSpec { grouping: "names", scope: TextScope::Plain, extract: habitat_names }]
    }
}

fn growth_rate_descriptions(d: &api::GrowthRateData) -> Vec<TextSource> {
    description_sources(&d.descriptions)
}

impl Resource for model::GrowthRate {
    const KIND: Kind = Kind::GrowthRate;
    type Data = api::GrowthRateData;

    fn from_data(id: i64, data: &Self::Data) -> Self {
        model::GrowthRate::from_data(id, data)
    }
    fn compare(&mut self, data: &Self::Data) -> bool {
        model::GrowthRate::compare(self, data)
    }
    fn id(&self) -> i64 {
        self.id
    }
    fn from_entity(row: EntityRow) -> Option<Self> {
        match row {
            EntityRow::GrowthRate(e) => Some(e),
            _ => None,
        }
    }
    fn as_row(&self) -> EntityRow {
        EntityRow::GrowthRate(self.clone())
    }
    fn text_groups() -> Vec<TextGroupSpec<Self::Data>> {
        vec![TextGroupSpec {
            grouping: "descriptions",
            scope: TextScope::Plain,
            extract: growth_rate_descriptions,
        }]
    }
}

fn trigger_names(d: &api::EvolutionTriggerData) -> Vec<TextSource> {
    name_sources(&d.names)
}

impl Resource for model::EvolutionTrigger {
    const KIND: Kind = Kind::EvolutionTrigger;
    type Data = api::EvolutionTriggerData;

    fn from_data(id: i64, data: &Self::Data) -> Self {
        model::EvolutionTrigger::from_data(id, data)
    }
    fn compare(&mut self, data: &Self::Data) -> bool {
        model::EvolutionTrigger::compare(self, data)
    }
    fn id(&self) -> i64 {
        self.id
    }
    fn from_entity(row: EntityRow) -> Option<Self> {
        match row {
            EntityRow::EvolutionTrigger(e) => Some(e),
            _ => None,
        }
    }
    fn as_row(&self) -> EntityRow {
        EntityRow::EvolutionTrigger(self.clone())
    }
    fn text_groups() -> Vec<TextGroupSpec<Self::Data>> {
        vec![TextGroupSpec { grouping: "names", scope: TextScope::Plain, extract: trigger_names }]
    }
}

fn item_names(d: &api::ItemData) -> Vec<TextSource> {
    name_sources(&d.names)
}

impl Resource for model::Item {
    const KIND: Kind = Kind::Item;
    type Data = api::ItemData;

    fn from_data(id: i64, data: &Self::Data) -> Self {
        model::Item::from_data(id, data)
    }
    fn compare(&mut self, data: &Self::Data) -> bool {
        model::Item::compare(self, data)
    }
    fn id(&self) -> i64 {
        self.id
    }
    fn from_entity(row: EntityRow) -> Option<Self> {
        match row {
            EntityRow::Item(e) => Some(e),
            _ => None,
        }
    }
    fn as_row(&self) -> EntityRow {
        EntityRow::Item(self.clone())
    }
    fn text_groups() -> Vec<TextGroupSpec<Self::Data>> {
        vec![TextGroupSpec { grouping: "names", scope: TextScope::Plain, extract: item_names }]
    }
}

fn move_names(d: &api::MoveData) -> Vec<TextSource> {
    name_sources(&d.names)
}

impl Resource for model::Move {
    const KIND: Kind = Kind::Move;
    type Data = api::MoveData;

    fn from_data(id: i64, data: &Self::Data) -> Self {
        model::Move::from_data(id, data)
    }
    fn compare(&mut self, data: &Self::Data) -> bool {
        model::Move::compare(self, data)
    }
    fn id(&self) -> i64 {
        self.id
    }
    fn from_entity(row: EntityRow) -> Option<Self> {
        match row {
            EntityRow::Move(e) => Some(e),
            _ => None,
        }
    }
    fn as_row(&self) -> EntityRow {
        EntityRow::Move(self.clone())
    }
    fn text_groups() -> Vec<TextGroupSpec<Self::Data>> {
        vec![TextGroupSpec { grouping: "names", scope: TextScope::Plain, extract: move_names }]
    }
    fn resolve<S: DataSource>(
        rec: &mut Reconciler<S>,
        entity: &mut Self,
        data: &Self::Data,
    ) -> Result<(), SyncError> {
        entity.type_key = rec.link_ref::<model::PokemonType>(data.type_.as_ref(), Missing::Deny)?;
        Ok(())
    }
}

fn location_names(d: &api::LocationData) -> Vec<TextSource> {
    name_sources(&d.names)
}

impl Resource for model::Location {
    const KIND: Kind = Kind::Location;
    type Data = api::LocationData;

    fn from_data(id: i64, data: &Self::Data) -> Self {
        model::Location::from_data(id, data)
    }
    fn compare(&mut self, data: &Self::Data) -> bool {
        model::Location::compare(self, data)
    }
    fn id(&self) -> i64 {
        self.id
    }
    fn from_entity(row: EntityRow) -> Option<Self> {
        match row {
            EntityRow::Location(e) => Some(e),
            _ => None,
        }
    }
    fn as_row(&self) -> EntityRow {
        EntityRow::Location(self.clone())
    }
    fn text_groups() -> Vec<TextGroupSpec<Self::Data>> {
        vec![TextGroupSpec { grouping: "names", scope: TextScope::Plain, extract: location_names }]
    }
    fn resolve<S: DataSource>(
        rec: &mut Reconciler<S>,
        entity: &mut Self,
        data: &Self::Data,
    ) -> Result<(), SyncError> {
        entity.region_key = rec.snapshot_ref(Kind::Region, data.region.as_ref())?;
        Ok(())
    }
}

fn type_names(d: &api::TypeData) -> Vec<TextSource> {
    name_sources(&d.names)
}

impl Resource for model::PokemonType {
    const KIND: Kind = Kind::Type;
    type Data = api::TypeData;

    fn from_data(id: i64, data: &Self::Data) -> Self {
        model::PokemonType::from_data(id, data)
    }
    fn compare(&mut self, data: &Self::Data) -> bool {
        model::PokemonType::compare(self, data)
    }
    fn id(&self) -> i64 {
        self.id
    }
    fn from_entity(row: EntityRow) -> Option<Self> {
        match row {
            EntityRow::Type(e) => Some(e),
            _ => None,
        }
    }
    fn as_row(&self) -> EntityRow {
        EntityRow::Type(self.clone())
    }
    fn text_groups() -> Vec<TextGroupSpec<Self::Data>> {
        vec![TextGroupSpec { grouping: "names", scope: TextScope::Plain, extract: type_names }]
    }
    fn resolve<S: DataSource>(
        rec: &mut Reconciler<S>,
        entity: &mut Self,
        data: &Self::Data,
    ) -> Result<(), SyncError> {
        apply_damage_relations(rec, entity.id, &data.damage_relations, None)?;
        for past in &data.past_damage_relations {
            let Some(generation_key) =
                rec.snapshot_ref(Kind::Generation, Some(&past.generation))?
            else {
                continue;
            };
            apply_damage_relations(rec, entity.id, &past.damage_relations, Some(generation_key))?;
        }
        Ok(())
    }
}

/// Writes one tier of the matrix in both directions. Relations are scoped by
/// `(offense, defense, generation-or-NULL)`, so a past-generation override
/// never clobbers the current matrix.
fn apply_damage_relations<S: DataSource>(
    rec: &mut Reconciler<S>,
    type_key: i64,
    relations: &api::DamageRelations,
    generation_key: Option<i64>,
) -> Result<(), SyncError> {
    let tiers: [(&Vec<api::ApiRef>, f64, bool); 6] = [
        (&relations.double_damage_to, 2.0, true),
        (&relations.half_damage_to, 0.5, true),
        (&relations.no_damage_to, 0.0, true),
        (&relations.double_damage_from, 2.0, false),
        (&relations.half_damage_from, 0.5, false),
        (&relations.no_damage_from, 0.0, false),
    ];
    for (references, multiplier, self_is_offense) in tiers {
        for reference in references {
            let other = required(
                rec.link::<model::PokemonType>(reference)?,
                Kind::Type,
                reference.api_id()?,
            )?;
            let (offense_key, defense_key) =
                if self_is_offense { (type_key, other) } else { (other, type_key) };
            rec.save_type_relation(offense_key, defense_key, generation_key, multiplier)?;
        }
    }
    Ok(())
}

fn ability_names(d: &api::AbilityData) -> Vec<TextSource> {
    name_sources(&d.names)
}

fn ability_flavor(d: &api::AbilityData) -> Vec<TextSource> {
    flavor_sources(&d.flavor_text_entries)
}

impl Resource for model::Ability {
    const KIND: Kind = Kind::Ability;
    type Data = api::AbilityData;

    fn from_data(id: i64, data: &Self::Data) -> Self {
        model::Ability::from_data(id, data)
    }
    fn compare(&mut self, data: &Self::Data) -> bool {
        model::Ability::compare(self, data)
    }
    fn id(&self) -> i64 {
        self.id
    }
    fn from_entity(row: EntityRow) -> Option<Self> {
        match row {
            EntityRow::Ability(e) => Some(e),
            _ => None,
        }
    }
    fn as_row(&self) -> EntityRow {
        EntityRow::Ability(self.clone())
    }
    fn text_groups() -> Vec<TextGroupSpec<Self::Data>> {
        vec![
            TextGroupSpec { grouping: "names", scope: TextScope::Plain, extract: ability_names },
            TextGroupSpec {
                grouping: "flavor_text",
                scope: TextScope::VersionGroup,
                extract: ability_flavor,
            },
        ]
    }
}

fn species_names(d: &api::SpeciesData) -> Vec<TextSource> {
    name_sources(&d.names)
}

fn species_genera(d: &api::SpeciesData) -> Vec<TextSource> {
    genus_sources(&d.genera)
}

fn species_flavor(d: &api::SpeciesData) -> Vec<TextSource> {
    flavor_sources(&d.flavor_text_entries)
}

fn species_form_descriptions(d: &api::SpeciesData) -> Vec<TextSource> {
    description_sources(&d.form_descriptions)
}

impl Resource for model::Species {
    const KIND: Kind = Kind::Species;
    type Data = api::SpeciesData;

    fn from_data(id: i64, data: &Self::Data) -> Self {
        model::Species::from_data(id, data)
    }
    fn compare(&mut self, data: &Self::Data) -> bool {
        model::Species::compare(self, data)
    }
    fn id(&self) -> i64 {
        self.id
    }
    fn from_entity(row: EntityRow) -> Option<Self> {
        match row {
            EntityRow::Species(e) => Some(e),
            _ => None,
        }
    }
    fn as_row(&self) -> EntityRow {
        EntityRow::Species(self.clone())
    }
    fn text_groups() -> Vec<TextGroupSpec<Self::Data>> {
        vec![
            TextGroupSpec { grouping: "names", scope: TextScope::Plain, extract: species_names },
            TextGroupSpec { grouping: "genera", scope: TextScope::Plain, extract: species_genera },
            TextGroupSpec {
                grouping: "flavor_text",
                scope: TextScope::Version,
                extract: species_flavor,
            },
            TextGroupSpec {
                grouping: "form_descriptions",
                scope: TextScope::Plain,
                extract: species_form_descriptions,
            },
        ]
    }
    fn resolve<S: DataSource>(
        rec: &mut Reconciler<S>,
        entity: &mut Self,
        data: &Self::Data,
    ) -> Result<(), SyncError> {
        let mut egg_groups = data.egg_groups.iter();
        entity.egg_group_1_key = rec.link_ref::<model::EggGroup>(egg_groups.next(), Missing::Deny)?;
        entity.egg_group_2_key = rec.link_ref::<model::EggGroup>(egg_groups.next(), Missing::Deny)?;
        if egg_groups.next().is_some() {
            return Err(SyncError::Integrity(format!(
                "species {} declares more than two egg groups",
                entity.api_id
            )));
        }
        entity.color_key = rec.link_ref::<model::PokemonColor>(data.color.as_ref(), Missing::Deny)?;
        entity.shape_key = rec.link_ref::<model::PokemonShape>(data.shape.as_ref(), Missing::Deny)?;
        // Some species legitimately have no habitat upstream.
        entity.habitat_key =
            rec.link_ref::<model::PokemonHabitat>(data.habitat.as_ref(), Missing::Allow)?;
        entity.growth_rate_key =
            rec.link_ref::<model::GrowthRate>(data.growth_rate.as_ref(), Missing::Deny)?;
        entity.generation_key = rec.snapshot_ref(Kind::Generation, data.generation.as_ref())?;
        entity.evolves_from_species_key =
            rec.link_ref::<model::Species>(data.evolves_from_species.as_ref(), Missing::Deny)?;
        // Varieties before the chain: detail matching reads them back from
        // the store.
        for variety in &data.varieties {
            let _ = rec.link::<model::Pokemon>(&variety.pokemon)?;
        }
        entity.evolution_chain_key =
            rec.link_ref::<model::EvolutionChain>(data.evolution_chain.as_ref(), Missing::Deny)?;
        Ok(())
    }
}

impl Resource for model::Pokemon {
    const KIND: Kind = Kind::Pokemon;
    type Data = api::PokemonData;

    fn from_data(id: i64, data: &Self::Data) -> Self {
        model::Pokemon::from_data(id, data)
    }
    fn compare(&mut self, data: &Self::Data) -> bool {
        model::Pokemon::compare(self, data)
    }
    fn id(&self) -> i64 {
        self.id
    }
    fn from_entity(row: EntityRow) -> Option<Self> {
        match row {
            EntityRow::Pokemon(e) => Some(e),
            _ => None,
        }
    }
    fn as_row(&self) -> EntityRow {
        EntityRow::Pokemon(self.clone())
    }
    fn resolve<S: DataSource>(
        rec: &mut Reconciler<S>,
        entity: &mut Self,
        data: &Self::Data,
    ) -> Result<(), SyncError> {
        entity.species_key = rec.link::<model::Species>(&data.species)?;

        entity.type_1_key = None;
        entity.type_2_key = None;
        for slot in &data.types {
            let key = rec.link::<model::PokemonType>(&slot.type_)?;
            let target = match slot.slot {
                1 => &mut entity.type_1_key,
                2 => &mut entity.type_2_key,
                other => {
                    return Err(SyncError::Integrity(format!(
                        "pokemon {}: type slot {other} out of range",
                        entity.api_id
                    )))
                }
            };
            if target.is_some() {
                return Err(SyncError::Integrity(format!(
                    "pokemon {}: duplicate type slot {}",
                    entity.api_id, slot.slot
                )));
            }
            *target = key;
        }

        entity.ability_1_key = None;
        entity.ability_2_key = None;
        entity.hidden_ability_key = None;
        for slot in &data.abilities {
            let key = rec.link::<model::Ability>(&slot.ability)?;
            let target = if slot.is_hidden {
                &mut entity.hidden_ability_key
            } else {
                match slot.slot {
                    1 => &mut entity.ability_1_key,
                    2 => &mut entity.ability_2_key,
                    other => {
                        return Err(SyncError::Integrity(format!(
                            "pokemon {}: ability slot {other} out of range",
                            entity.api_id
                        )))
                    }
                }
            };
            if target.is_some() {
                return Err(SyncError::Integrity(format!(
                    "pokemon {}: duplicate ability slot {}",
                    entity.api_id, slot.slot
                )));
            }
            *target = key;
        }

        for stat in &data.stats {
            let name = stat.stat.name.as_deref().ok_or_else(|| {
                SyncError::Integrity(format!(
                    "pokemon {}: stat reference without a name",
                    entity.api_id
                ))
            })?;
            model::apply_base_stat(entity, name, stat.base_stat)?;
        }
        Ok(())
    }
}

impl Resource for model::EvolutionChain {
    const KIND: Kind = Kind::EvolutionChain;
    type Data = api::EvolutionChainData;

    fn from_data(id: i64, data: &Self::Data) -> Self {
        model::EvolutionChain::from_data(id, data)
    }
    fn compare(&mut self, data: &Self::Data) -> bool {
        model::EvolutionChain::compare(self, data)
    }
    fn id(&self) -> i64 {
        self.id
    }
    fn from_entity(row: EntityRow) -> Option<Self> {
        match row {
            EntityRow::EvolutionChain(e) => Some(e),
            _ => None,
        }
    }
    fn as_row(&self) -> EntityRow {
        EntityRow::EvolutionChain(self.clone())
    }
    fn resolve<S: DataSource>(
        rec: &mut Reconciler<S>,
        entity: &mut Self,
        data: &Self::Data,
    ) -> Result<(), SyncError> {
        entity.baby_trigger_item_key =
            rec.link_ref::<model::Item>(data.baby_trigger_item.as_ref(), Missing::Allow)?;
        walk_chain(rec, entity.id, &data.chain, None)
    }
}

/// Depth-first over the chain tree. Each node becomes a stage row keyed
/// `(chain, species)`; its details are paired index-by-index with the
/// species' non-mega varieties, and a count mismatch is fatal rather than a
/// silent mis-link. A species that is itself mid-resolution may still have
/// uncommitted varieties (the chain walk runs from inside its resolver), so
/// its pairing is deferred to the next run instead of failing.
fn walk_chain<S: DataSource>(
    rec: &mut Reconciler<S>,
    chain_key: i64,
    link: &api::ChainLinkData,
    evolves_from: Option<i64>,
) -> Result<(), SyncError> {
    let species_api_id = link.species.api_id()?;
    let species_key =
        required(rec.link::<model::Species>(&link.species)?, Kind::Species, species_api_id)?;

    let stage = match rec.store.find_stage(chain_key, species_key)? {
        Some(mut stage) => {
            stage.evolves_from_key = evolves_from;
            stage.is_baby = link.is_baby;
            stage
        }
        None => model::ChainStage {
            id: rec.ids.next(&mut rec.store)?,
            chain_key,
            species_key,
            evolves_from_key: evolves_from,
            is_baby: link.is_baby,
        },
    };
    rec.store.save_stage(&stage)?;

    if !link.evolution_details.is_empty() {
        let varieties = rec.store.list_varieties(species_key)?;
        let candidates: Vec<&model::Pokemon> =
            varieties.iter().filter(|p| !is_mega_form(&p.name)).collect();
        if candidates.len() == link.evolution_details.len() {
            for (variety, detail) in candidates.iter().zip(&link.evolution_details) {
                apply_detail(rec, stage.id, variety.id, detail)?;
            }
        } else if species_mid_resolution(rec, species_api_id) {
            warn!(
                species_api_id,
                details = link.evolution_details.len(),
                varieties = candidates.len(),
                "variety set incomplete mid-resolution; detail matching deferred"
            );
        } else {
            return Err(SyncError::Integrity(format!(
                "species {species_api_id}: {} evolution details vs {} non-mega varieties",
                link.evolution_details.len(),
                candidates.len()
            )));
        }
    }

    for child in &link.evolves_to {
        walk_chain(rec, chain_key, child, Some(stage.id))?;
    }
    Ok(())
}

fn species_mid_resolution<S: DataSource>(rec: &Reconciler<S>, species_api_id: i64) -> bool {
    Kind::Species
        .resource_url(species_api_id)
        .is_some_and(|url| rec.in_flight.contains(&url))
}

fn apply_detail<S: DataSource>(
    rec: &mut Reconciler<S>,
    stage_key: i64,
    pokemon_key: i64,
    data: &api::EvolutionDetailData,
) -> Result<(), SyncError> {
    let trigger_api_id = data.trigger.api_id()?;
    let trigger_key = required(
        rec.link::<model::EvolutionTrigger>(&data.trigger)?,
        Kind::EvolutionTrigger,
        trigger_api_id,
    )?;
    let item_key = rec.link_ref::<model::Item>(data.item.as_ref(), Missing::Allow)?;
    let held_item_key = rec.link_ref::<model::Item>(data.held_item.as_ref(), Missing::Allow)?;
    let known_move_key = rec.link_ref::<model::Move>(data.known_move.as_ref(), Missing::Deny)?;
    let known_move_type_key =
        rec.link_ref::<model::PokemonType>(data.known_move_type.as_ref(), Missing::Deny)?;
    let location_key = rec.link_ref::<model::Location>(data.location.as_ref(), Missing::Allow)?;
    let party_species_key =
        rec.link_ref::<model::Species>(data.party_species.as_ref(), Missing::Deny)?;
    let party_type_key =
        rec.link_ref::<model::PokemonType>(data.party_type.as_ref(), Missing::Deny)?;
    let trade_species_key =
        rec.link_ref::<model::Species>(data.trade_species.as_ref(), Missing::Deny)?;

    let mut detail = match rec.store.find_detail(stage_key, pokemon_key)? {
        Some(existing) => existing,
        None => model::EvolutionDetail {
            id: rec.ids.next(&mut rec.store)?,
            stage_key,
            pokemon_key,
            trigger_key,
            item_key: None,
            held_item_key: None,
            known_move_key: None,
            known_move_type_key: None,
            location_key: None,
            party_species_key: None,
            party_type_key: None,
            trade_species_key: None,
            gender: None,
            min_level: None,
            min_happiness: None,
            min_beauty: None,
            min_affection: None,
            relative_physical_stats: None,
            needs_overworld_rain: false,
            turn_upside_down: false,
            time_of_day: String::new(),
        },
    };
    detail.trigger_key = trigger_key;
    detail.item_key = item_key;
    detail.held_item_key = held_item_key;
    detail.known_move_key = known_move_key;
    detail.known_move_type_key = known_move_type_key;
    detail.location_key = location_key;
    detail.party_species_key = party_species_key;
    detail.party_type_key = party_type_key;
    detail.trade_species_key = trade_species_key;
    let _ = detail.compare_scalars(data);
    rec.store.save_detail(&detail)?;
    Ok(())
}

impl<S: DataSource> Reconciler<S> {
    fn save_type_relation(
        &mut self,
        offense_key: i64,
        defense_key: i64,
        generation_key: Option<i64>,
        multiplier: f64,
    ) -> Result<(), SyncError> {
        match self.store.find_type_relation(offense_key, defense_key, generation_key)? {
            Some(mut relation) => {
                if (relation.multiplier - multiplier).abs() > f64::EPSILON {
                    relation.multiplier = multiplier;
                    self.store.save_type_relation(&relation)?;
                }
            }
            None => {
                let id = self.ids.next(&mut self.store)?;
                self.store.save_type_relation(&model::TypeRelation {
                    id,
                    offense_key,
                    defense_key,
                    generation_key,
                    multiplier,
                })?;
            }
        }
        Ok(())
    }
}
