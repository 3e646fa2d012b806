//! SQLite persistence for the dexsync pipeline.
//!
//! One `rusqlite::Connection` behind `SqliteStore`. Reference keys between
//! tables are soft integer columns rather than declared foreign keys:
//! reconciliation crosses entity boundaries mid-flight (a variety can be
//! written before its species' row is final), so write order cannot honor
//! declared constraints.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use dexsync_core::model::{
    Ability, ChainStage, EggGroup, EntityRow, EvolutionChain, EvolutionDetail, EvolutionTrigger,
    Generation, GrowthRate, Item, Language, Location, Move, Pokemon, PokemonColor, PokemonHabitat,
    PokemonShape, PokemonType, Region, Species, TextEntry, TypeRelation, Version, VersionGroup,
};
use dexsync_core::Kind;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use tracing::debug;

const LATEST_SCHEMA_VERSION: i64 = 1;

const CREATE_SCHEMA_MIGRATIONS_SQL: &str = r"
CREATE TABLE IF NOT EXISTS schema_migrations (
  version INTEGER PRIMARY KEY,
  applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);
";

const MIGRATION_001_SQL: &str = r"
CREATE TABLE IF NOT EXISTS id_sequence (
  next_val INTEGER NOT NULL,
  increment INTEGER NOT NULL
);

INSERT INTO id_sequence (next_val, increment)
SELECT 1, 100 WHERE NOT EXISTS (SELECT 1 FROM id_sequence);

CREATE TABLE IF NOT EXISTS languages (
  id INTEGER PRIMARY KEY,
  api_id INTEGER NOT NULL UNIQUE,
  name TEXT NOT NULL,
  official INTEGER NOT NULL,
  iso639 TEXT NOT NULL,
  iso3166 TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS egg_groups (
  id INTEGER PRIMARY KEY,
  api_id INTEGER NOT NULL UNIQUE,
  name TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS pokemon_colors (
  id INTEGER PRIMARY KEY,
  api_id INTEGER NOT NULL UNIQUE,
  name TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS pokemon_shapes (
  id INTEGER PRIMARY KEY,
  api_id INTEGER NOT NULL UNIQUE,
  name TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS pokemon_habitats (
  id INTEGER PRIMARY KEY,
  api_id INTEGER NOT NULL UNIQUE,
  name TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS growth_rates (
  id INTEGER PRIMARY KEY,
  api_id INTEGER NOT NULL UNIQUE,
  name TEXT NOT NULL,
  formula TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS evolution_triggers (
  id INTEGER PRIMARY KEY,
  api_id INTEGER NOT NULL UNIQUE,
  name TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS items (
  id INTEGER PRIMARY KEY,
  api_id INTEGER NOT NULL UNIQUE,
  name TEXT NOT NULL,
  cost INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS moves (
  id INTEGER PRIMARY KEY,
  api_id INTEGER NOT NULL UNIQUE,
  name TEXT NOT NULL,
  power INTEGER,
  pp INTEGER,
  accuracy INTEGER,
  priority INTEGER NOT NULL,
  type_key INTEGER
);

CREATE TABLE IF NOT EXISTS locations (
  id INTEGER PRIMARY KEY,
  api_id INTEGER NOT NULL UNIQUE,
  name TEXT NOT NULL,
  region_key INTEGER
);

CREATE TABLE IF NOT EXISTS types (
  id INTEGER PRIMARY KEY,
  api_id INTEGER NOT NULL UNIQUE,
  name TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS type_relations (
  id INTEGER PRIMARY KEY,
  offense_key INTEGER NOT NULL,
  defense_key INTEGER NOT NULL,
  generation_key INTEGER,
  multiplier REAL NOT NULL
);

CREATE TABLE IF NOT EXISTS abilities (
  id INTEGER PRIMARY KEY,
  api_id INTEGER NOT NULL UNIQUE,
  name TEXT NOT NULL,
  is_main_series INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS species (
  id INTEGER PRIMARY KEY,
  api_id INTEGER NOT NULL UNIQUE,
  name TEXT NOT NULL,
  ordering INTEGER NOT NULL,
  gender_rate INTEGER NOT NULL,
  capture_rate INTEGER NOT NULL,
  base_happiness INTEGER,
  is_baby INTEGER NOT NULL,
  is_legendary INTEGER NOT NULL,
  is_mythical INTEGER NOT NULL,
  hatch_counter INTEGER,
  has_gender_differences INTEGER NOT NULL,
  forms_switchable INTEGER NOT NULL,
  evolves_from_species_key INTEGER,
  egg_group_1_key INTEGER,
  egg_group_2_key INTEGER,
  color_key INTEGER,
  shape_key INTEGER,
  habitat_key INTEGER,
  growth_rate_key INTEGER,
  generation_key INTEGER,
  evolution_chain_key INTEGER
);

CREATE TABLE IF NOT EXISTS pokemon (
  id INTEGER PRIMARY KEY,
  api_id INTEGER NOT NULL UNIQUE,
  name TEXT NOT NULL,
  base_experience INTEGER,
  height INTEGER NOT NULL,
  weight INTEGER NOT NULL,
  is_default INTEGER NOT NULL,
  ordering INTEGER,
  species_key INTEGER,
  type_1_key INTEGER,
  type_2_key INTEGER,
  ability_1_key INTEGER,
  ability_2_key INTEGER,
  hidden_ability_key INTEGER,
  hp INTEGER NOT NULL,
  attack INTEGER NOT NULL,
  defense INTEGER NOT NULL,
  special_attack INTEGER NOT NULL,
  special_defense INTEGER NOT NULL,
  speed INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS evolution_chains (
  id INTEGER PRIMARY KEY,
  api_id INTEGER NOT NULL UNIQUE,
  baby_trigger_item_key INTEGER
);

CREATE TABLE IF NOT EXISTS chain_stages (
  id INTEGER PRIMARY KEY,
  chain_key INTEGER NOT NULL,
  species_key INTEGER NOT NULL,
  evolves_from_key INTEGER,
  is_baby INTEGER NOT NULL,
  UNIQUE (chain_key, species_key)
);

CREATE TABLE IF NOT EXISTS evolution_details (
  id INTEGER PRIMARY KEY,
  stage_key INTEGER NOT NULL,
  pokemon_key INTEGER NOT NULL,
  trigger_key INTEGER NOT NULL,
  item_key INTEGER,
  held_item_key INTEGER,
  known_move_key INTEGER,
  known_move_type_key INTEGER,
  location_key INTEGER,
  party_species_key INTEGER,
  party_type_key INTEGER,
  trade_species_key INTEGER,
  gender INTEGER,
  min_level INTEGER,
  min_happiness INTEGER,
  min_beauty INTEGER,
  min_affection INTEGER,
  relative_physical_stats INTEGER,
  needs_overworld_rain INTEGER NOT NULL,
  turn_upside_down INTEGER NOT NULL,
  time_of_day TEXT NOT NULL,
  UNIQUE (stage_key, pokemon_key)
);

CREATE TABLE IF NOT EXISTS regions (
  id INTEGER PRIMARY KEY,
  api_id INTEGER NOT NULL UNIQUE,
  name TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS generations (
  id INTEGER PRIMARY KEY,
  api_id INTEGER NOT NULL UNIQUE,
  name TEXT NOT NULL,
  main_region_key INTEGER
);

CREATE TABLE IF NOT EXISTS version_groups (
  id INTEGER PRIMARY KEY,
  api_id INTEGER NOT NULL UNIQUE,
  name TEXT NOT NULL,
  ordering INTEGER NOT NULL,
  generation_key INTEGER
);

CREATE TABLE IF NOT EXISTS versions (
  id INTEGER PRIMARY KEY,
  api_id INTEGER NOT NULL UNIQUE,
  name TEXT NOT NULL,
  version_group_key INTEGER
);

CREATE TABLE IF NOT EXISTS text_entries (
  id INTEGER PRIMARY KEY,
  parent_kind TEXT NOT NULL,
  parent_id INTEGER NOT NULL,
  grouping TEXT NOT NULL,
  language_key INTEGER NOT NULL,
  version_key INTEGER,
  version_group_key INTEGER,
  text TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_text_entries_parent
  ON text_entries(parent_kind, parent_id, grouping);
CREATE INDEX IF NOT EXISTS idx_text_entries_kind
  ON text_entries(parent_kind, grouping);
CREATE INDEX IF NOT EXISTS idx_type_relations_scope
  ON type_relations(offense_key, defense_key);
CREATE INDEX IF NOT EXISTS idx_chain_stages_chain ON chain_stages(chain_key);
CREATE INDEX IF NOT EXISTS idx_pokemon_species ON pokemon(species_key);
CREATE INDEX IF NOT EXISTS idx_species_name ON species(name);
";

pub struct SqliteStore {
    conn: Connection,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SchemaStatus {
    pub current_version: i64,
    pub target_version: i64,
    pub pending_versions: Vec<i64>,
}

/// A text child joined with the natural ids of its language and scope rows,
/// which is what the merge key is computed from.
#[derive(Debug, Clone, PartialEq)]
pub struct TextEntryRecord {
    pub entry: TextEntry,
    pub language_api_id: i64,
    pub version_api_id: Option<i64>,
    pub version_group_api_id: Option<i64>,
}

impl SqliteStore {
    /// Open a SQLite-backed store and configure runtime pragmas.
    ///
    /// # Errors
    /// Returns an error when the database cannot be opened or pragmas cannot
    /// be applied.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open sqlite database at {}", path.display()))?;
        configure(&conn)?;
        Ok(Self { conn })
    }

    /// In-memory store, used by tests and dry runs.
    ///
    /// # Errors
    /// Returns an error when the in-memory database cannot be created.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("failed to open in-memory database")?;
        configure(&conn)?;
        Ok(Self { conn })
    }

    /// Report current and target schema versions plus pending migrations.
    ///
    /// # Errors
    /// Returns an error when schema metadata cannot be read or initialized.
    pub fn schema_status(&self) -> Result<SchemaStatus> {
        self.conn
            .execute_batch(CREATE_SCHEMA_MIGRATIONS_SQL)
            .context("failed to apply schema_migrations table")?;
        let current_version = current_schema_version(&self.conn)?;
        let pending_versions = if current_version < LATEST_SCHEMA_VERSION {
            ((current_version + 1)..=LATEST_SCHEMA_VERSION).collect::<Vec<_>>()
        } else {
            Vec::new()
        };
        Ok(SchemaStatus {
            current_version,
            target_version: LATEST_SCHEMA_VERSION,
            pending_versions,
        })
    }

    /// Apply all forward migrations up to the latest schema version.
    ///
    /// # Errors
    /// Returns an error when migration bootstrapping or any step fails.
    pub fn migrate(&mut self) -> Result<()> {
        self.conn
            .execute_batch(CREATE_SCHEMA_MIGRATIONS_SQL)
            .context("failed to apply schema_migrations table")?;
        let version = current_schema_version(&self.conn)?;
        if version < 1 {
            let tx = self.conn.transaction().context("failed to start migration transaction")?;
            tx.execute_batch(MIGRATION_001_SQL).context("failed to apply migration 1")?;
            tx.execute(
                "INSERT OR IGNORE INTO schema_migrations(version) VALUES (?1)",
                params![1_i64],
            )
            .context("failed to record migration version 1")?;
            tx.commit().context("failed to commit migration 1")?;
            debug!(version = 1, "schema migrated");
        }
        Ok(())
    }

    /// Claim the next block of surrogate ids, advancing the sequence.
    ///
    /// # Errors
    /// Returns an error when the sequence row is missing or cannot be
    /// advanced.
    pub fn next_id_range(&mut self) -> Result<(i64, i64)> {
        let tx = self.conn.transaction().context("failed to start sequence transaction")?;
        let (next_val, increment) = tx
            .query_row("SELECT next_val, increment FROM id_sequence", [], |row| {
                Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?))
            })
            .context("id_sequence row is missing; was the store migrated?")?;
        tx.execute("UPDATE id_sequence SET next_val = next_val + increment", [])
            .context("failed to advance id_sequence")?;
        tx.commit().context("failed to commit sequence advance")?;
        debug!(start = next_val, count = increment, "claimed id block");
        Ok((next_val, increment))
    }

    /// Surrogate id for one natural id, if the row exists.
    ///
    /// # Errors
    /// Returns an error when the query fails.
    pub fn find_id(&self, kind: Kind, api_id: i64) -> Result<Option<i64>> {
        let sql = format!("SELECT id FROM {} WHERE api_id = ?1", table(kind));
        self.conn
            .query_row(&sql, params![api_id], |row| row.get(0))
            .optional()
            .with_context(|| format!("failed to look up {kind} {api_id}"))
    }

    /// Surrogate ids for a batch of natural ids in one query. Natural ids
    /// absent from the table are simply absent from the result.
    ///
    /// # Errors
    /// Returns an error when the query fails.
    pub fn find_ids_for(&self, kind: Kind, api_ids: &[i64]) -> Result<HashMap<i64, i64>> {
        if api_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let placeholders = vec!["?"; api_ids.len()].join(",");
        let sql =
            format!("SELECT api_id, id FROM {} WHERE api_id IN ({placeholders})", table(kind));
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(rusqlite::params_from_iter(api_ids.iter()), |row| {
                Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?))
            })
            .with_context(|| format!("failed to partition {kind} ids"))?;
        let mut out = HashMap::new();
        for row in rows {
            let (api_id, id) = row?;
            out.insert(api_id, id);
        }
        Ok(out)
    }

    /// Load one entity row by natural id.
    ///
    /// # Errors
    /// Returns an error when the query fails.
    pub fn load_by_api_id(&self, kind: Kind, api_id: i64) -> Result<Option<EntityRow>> {
        let row = match kind {
            Kind::Language => self
                .conn
                .query_row(
                    "SELECT id, api_id, name, official, iso639, iso3166
                     FROM languages WHERE api_id = ?1",
                    params![api_id],
                    map_language,
                )
                .optional()?
                .map(EntityRow::Language),
            Kind::EggGroup => self
                .named_row("egg_groups", api_id)?
                .map(|(id, api_id, name)| EntityRow::EggGroup(EggGroup { id, api_id, name })),
            Kind::Color => self.named_row("pokemon_colors", api_id)?.map(|(id, api_id, name)| {
                EntityRow::Color(PokemonColor { id, api_id, name })
            }),
            Kind::Shape => self.named_row("pokemon_shapes", api_id)?.map(|(id, api_id, name)| {
                EntityRow::Shape(PokemonShape { id, api_id, name })
            }),
            Kind::Habitat => {
                self.named_row("pokemon_habitats", api_id)?.map(|(id, api_id, name)| {
                    EntityRow::Habitat(PokemonHabitat { id, api_id, name })
                })
            }
            Kind::GrowthRate => self
                .conn
                .query_row(
                    "SELECT id, api_id, name, formula FROM growth_rates WHERE api_id = ?1",
                    params![api_id],
                    |row| {
                        Ok(GrowthRate {
                            id: row.get(0)?,
                            api_id: row.get(1)?,
                            name: row.get(2)?,
                            formula: row.get(3)?,
                        })
                    },
                )
                .optional()?
                .map(EntityRow::GrowthRate),
            Kind::EvolutionTrigger => {
                self.named_row("evolution_triggers", api_id)?.map(|(id, api_id, name)| {
                    EntityRow::EvolutionTrigger(EvolutionTrigger { id, api_id, name })
                })
            }
            Kind::Item => self
                .conn
                .query_row(
                    "SELECT id, api_id, name, cost FROM items WHERE api_id = ?1",
                    params![api_id],
                    |row| {
                        Ok(Item {
                            id: row.get(0)?,
                            api_id: row.get(1)?,
                            name: row.get(2)?,
                            cost: row.get(3)?,
                        })
                    },
                )
                .optional()?
                .map(EntityRow::Item),
            Kind::Move => self
                .conn
                .query_row(
                    "SELECT id, api_id, name, power, pp, accuracy, priority, type_key
                     FROM moves WHERE api_id = ?1",
                    params![api_id],
                    |row| {
                        Ok(Move {
                            id: row.get(0)?,
                            api_id: row.get(1)?,
                            name: row.get(2)?,
                            power: row.get(3)?,
                            pp: row.get(4)?,
                            accuracy: row.get(5)?,
                            priority: row.get(6)?,
                            type_key: row.get(7)?,
                        })
                    },
                )
                .optional()?
                .map(EntityRow::Move),
            Kind::Location => self
                .conn
                .query_row(
                    "SELECT id, api_id, name, region_key FROM locations WHERE api_id = ?1",
                    params![api_id],
                    |row| {
                        Ok(Location {
                            id: row.get(0)?,
                            api_id: row.get(1)?,
                            name: row.get(2)?,
                            region_key: row.get(3)?,
                        })
                    },
                )
                .optional()?
                .map(EntityRow::Location),
            Kind::Type => self
                .named_row("types", api_id)?
                .map(|(id, api_id, name)| EntityRow::Type(PokemonType { id, api_id, name })),
            Kind::Ability => self
                .conn
                .query_row(
                    "SELECT id, api_id, name, is_main_series FROM abilities WHERE api_id = ?1",
                    params![api_id],
                    |row| {
                        Ok(Ability {
                            id: row.get(0)?,
                            api_id: row.get(1)?,
                            name: row.get(2)?,
                            is_main_series: row.get(3)?,
                        })
                    },
                )
                .optional()?
                .map(EntityRow::Ability),
            Kind::Species => self
                .conn
                .query_row(
                    &format!("{SPECIES_SELECT} WHERE api_id = ?1"),
                    params![api_id],
                    map_species,
                )
                .optional()?
                .map(EntityRow::Species),
            Kind::Pokemon => self
                .conn
                .query_row(
                    &format!("{POKEMON_SELECT} WHERE api_id = ?1"),
                    params![api_id],
                    map_pokemon,
                )
                .optional()?
                .map(EntityRow::Pokemon),
            Kind::EvolutionChain => self
                .conn
                .query_row(
                    "SELECT id, api_id, baby_trigger_item_key
                     FROM evolution_chains WHERE api_id = ?1",
                    params![api_id],
                    |row| {
                        Ok(EvolutionChain {
                            id: row.get(0)?,
                            api_id: row.get(1)?,
                            baby_trigger_item_key: row.get(2)?,
                        })
                    },
                )
                .optional()?
                .map(EntityRow::EvolutionChain),
            Kind::Region => self
                .named_row("regions", api_id)?
                .map(|(id, api_id, name)| EntityRow::Region(Region { id, api_id, name })),
            Kind::Generation => self
                .conn
                .query_row(
                    "SELECT id, api_id, name, main_region_key
                     FROM generations WHERE api_id = ?1",
                    params![api_id],
                    |row| {
                        Ok(Generation {
                            id: row.get(0)?,
                            api_id: row.get(1)?,
                            name: row.get(2)?,
                            main_region_key: row.get(3)?,
                        })
                    },
                )
                .optional()?
                .map(EntityRow::Generation),
            Kind::VersionGroup => self
                .conn
                .query_row(
                    "SELECT id, api_id, name, ordering, generation_key
                     FROM version_groups WHERE api_id = ?1",
                    params![api_id],
                    |row| {
                        Ok(VersionGroup {
                            id: row.get(0)?,
                            api_id: row.get(1)?,
                            name: row.get(2)?,
                            ordering: row.get(3)?,
                            generation_key: row.get(4)?,
                        })
                    },
                )
                .optional()?
                .map(EntityRow::VersionGroup),
            Kind::Version => self
                .conn
                .query_row(
                    "SELECT id, api_id, name, version_group_key
                     FROM versions WHERE api_id = ?1",
                    params![api_id],
                    |row| {
                        Ok(Version {
                            id: row.get(0)?,
                            api_id: row.get(1)?,
                            name: row.get(2)?,
                            version_group_key: row.get(3)?,
                        })
                    },
                )
                .optional()?
                .map(EntityRow::Version),
        };
        Ok(row)
    }

    fn named_row(&self, table: &str, api_id: i64) -> Result<Option<(i64, i64, String)>> {
        let sql = format!("SELECT id, api_id, name FROM {table} WHERE api_id = ?1");
        self.conn
            .query_row(&sql, params![api_id], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?))
            })
            .optional()
            .with_context(|| format!("failed to load row from {table}"))
    }

    /// Species lookup by display name, for the CLI's name argument.
    ///
    /// # Errors
    /// Returns an error when the query fails.
    pub fn species_by_name(&self, name: &str) -> Result<Option<Species>> {
        self.conn
            .query_row(&format!("{SPECIES_SELECT} WHERE name = ?1"), params![name], map_species)
            .optional()
            .with_context(|| format!("failed to look up species '{name}'"))
    }

    /// All concrete forms of one species, ordered by surrogate id so that
    /// positional matching against chain details is deterministic.
    ///
    /// # Errors
    /// Returns an error when the query fails.
    pub fn list_varieties(&self, species_key: i64) -> Result<Vec<Pokemon>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{POKEMON_SELECT} WHERE species_key = ?1 ORDER BY api_id ASC"))?;
        let rows = stmt
            .query_map(params![species_key], map_pokemon)
            .context("failed to list varieties")?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// Persist one reconciled entity plus its localized-text delta in a
    /// single transaction.
    ///
    /// # Errors
    /// Returns an error when any statement in the transaction fails.
    pub fn commit_entity(
        &mut self,
        row: &EntityRow,
        new_text: &[TextEntry],
        stale_text: &[i64],
    ) -> Result<()> {
        let tx = self.conn.transaction().context("failed to start entity transaction")?;
        insert_entity(&tx, row)?;
        for entry in new_text {
            insert_text_entry(&tx, entry)?;
        }
        delete_text_entries(&tx, stale_text)?;
        tx.commit().context("failed to commit entity")?;
        debug!(
            kind = %row.kind(),
            id = row.id(),
            new_text = new_text.len(),
            stale_text = stale_text.len(),
            "entity committed"
        );
        Ok(())
    }

    /// Persist a batch of entity rows in one transaction (CSV loads).
    ///
    /// # Errors
    /// Returns an error when any insert fails.
    pub fn save_entities(&mut self, rows: &[EntityRow]) -> Result<()> {
        let tx = self.conn.transaction().context("failed to start batch transaction")?;
        for row in rows {
            insert_entity(&tx, row)?;
        }
        tx.commit().context("failed to commit entity batch")
    }

    /// Apply a localized-text delta on its own (CSV name loads).
    ///
    /// # Errors
    /// Returns an error when any statement fails.
    pub fn commit_text_batch(&mut self, new_text: &[TextEntry], stale_text: &[i64]) -> Result<()> {
        let tx = self.conn.transaction().context("failed to start text transaction")?;
        for entry in new_text {
            insert_text_entry(&tx, entry)?;
        }
        delete_text_entries(&tx, stale_text)?;
        tx.commit().context("failed to commit text batch")
    }

    /// Text children of one parent and grouping, joined with natural ids.
    ///
    /// # Errors
    /// Returns an error when the query fails.
    pub fn list_text_entries(
        &self,
        parent_kind: Kind,
        parent_id: i64,
        grouping: &str,
    ) -> Result<Vec<TextEntryRecord>> {
        self.query_text_entries(
            parent_kind,
            "t.parent_kind = ?1 AND t.parent_id = ?2 AND t.grouping = ?3",
            params![parent_kind.as_str(), parent_id, grouping],
        )
    }

    /// Text children across every parent of one kind and grouping (CSV name
    /// sync operates on whole files).
    ///
    /// # Errors
    /// Returns an error when the query fails.
    pub fn list_text_entries_for_kind(
        &self,
        parent_kind: Kind,
        grouping: &str,
    ) -> Result<Vec<TextEntryRecord>> {
        self.query_text_entries(
            parent_kind,
            "t.parent_kind = ?1 AND t.grouping = ?2",
            params![parent_kind.as_str(), grouping],
        )
    }

    fn query_text_entries(
        &self,
        parent_kind: Kind,
        filter: &str,
        args: &[&dyn rusqlite::ToSql],
    ) -> Result<Vec<TextEntryRecord>> {
        let sql = format!(
            "SELECT t.id, t.parent_id, t.grouping, t.language_key, t.version_key,
                    t.version_group_key, t.text, l.api_id, v.api_id, vg.api_id
             FROM text_entries t
             JOIN languages l ON l.id = t.language_key
             LEFT JOIN versions v ON v.id = t.version_key
             LEFT JOIN version_groups vg ON vg.id = t.version_group_key
             WHERE {filter}"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(args, |row| {
                Ok(TextEntryRecord {
                    entry: TextEntry {
                        id: row.get(0)?,
                        parent_kind,
                        parent_id: row.get(1)?,
                        grouping: row.get(2)?,
                        language_key: row.get(3)?,
                        version_key: row.get(4)?,
                        version_group_key: row.get(5)?,
                        text: row.get(6)?,
                    },
                    language_api_id: row.get(7)?,
                    version_api_id: row.get(8)?,
                    version_group_api_id: row.get(9)?,
                })
            })
            .context("failed to list text entries")?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// Type-effectiveness cell for one (offense, defense, generation) scope.
    /// `generation_key = None` addresses the current-generation matrix.
    ///
    /// # Errors
    /// Returns an error when the query fails.
    pub fn find_type_relation(
        &self,
        offense_key: i64,
        defense_key: i64,
        generation_key: Option<i64>,
    ) -> Result<Option<TypeRelation>> {
        self.conn
            .query_row(
                "SELECT id, offense_key, defense_key, generation_key, multiplier
                 FROM type_relations
                 WHERE offense_key = ?1 AND defense_key = ?2 AND generation_key IS ?3",
                params![offense_key, defense_key, generation_key],
                |row| {
                    Ok(TypeRelation {
                        id: row.get(0)?,
                        offense_key: row.get(1)?,
                        defense_key: row.get(2)?,
                        generation_key: row.get(3)?,
                        multiplier: row.get(4)?,
                    })
                },
            )
            .optional()
            .context("failed to look up type relation")
    }

    /// Insert or replace one type-effectiveness cell.
    ///
    /// # Errors
    /// Returns an error when the write fails.
    pub fn save_type_relation(&mut self, relation: &TypeRelation) -> Result<()> {
        self.conn
            .execute(
                "INSERT OR REPLACE INTO type_relations
                   (id, offense_key, defense_key, generation_key, multiplier)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    relation.id,
                    relation.offense_key,
                    relation.defense_key,
                    relation.generation_key,
                    relation.multiplier,
                ],
            )
            .context("failed to save type relation")?;
        Ok(())
    }

    /// Stage row for one (chain, species) pair.
    ///
    /// # Errors
    /// Returns an error when the query fails.
    pub fn find_stage(&self, chain_key: i64, species_key: i64) -> Result<Option<ChainStage>> {
        self.conn
            .query_row(
                "SELECT id, chain_key, species_key, evolves_from_key, is_baby
                 FROM chain_stages WHERE chain_key = ?1 AND species_key = ?2",
                params![chain_key, species_key],
                |row| {
                    Ok(ChainStage {
                        id: row.get(0)?,
                        chain_key: row.get(1)?,
                        species_key: row.get(2)?,
                        evolves_from_key: row.get(3)?,
                        is_baby: row.get(4)?,
                    })
                },
            )
            .optional()
            .context("failed to look up chain stage")
    }

    /// Insert or replace one stage row.
    ///
    /// # Errors
    /// Returns an error when the write fails.
    pub fn save_stage(&mut self, stage: &ChainStage) -> Result<()> {
        self.conn
            .execute(
                "INSERT OR REPLACE INTO chain_stages
                   (id, chain_key, species_key, evolves_from_key, is_baby)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    stage.id,
                    stage.chain_key,
                    stage.species_key,
                    stage.evolves_from_key,
                    stage.is_baby,
                ],
            )
            .context("failed to save chain stage")?;
        Ok(())
    }

    /// Detail row for one (stage, variety) pair.
    ///
    /// # Errors
    /// Returns an error when the query fails.
    pub fn find_detail(&self, stage_key: i64, pokemon_key: i64) -> Result<Option<EvolutionDetail>> {
        self.conn
            .query_row(
                "SELECT id, stage_key, pokemon_key, trigger_key, item_key, held_item_key,
                        known_move_key, known_move_type_key, location_key, party_species_key,
                        party_type_key, trade_species_key, gender, min_level, min_happiness,
                        min_beauty, min_affection, relative_physical_stats,
                        needs_overworld_rain, turn_upside_down, time_of_day
                 FROM evolution_details WHERE stage_key = ?1 AND pokemon_key = ?2",
                params![stage_key, pokemon_key],
                map_detail,
            )
            .optional()
            .context("failed to look up evolution detail")
    }

    /// Insert or replace one detail row.
    ///
    /// # Errors
    /// Returns an error when the write fails.
    pub fn save_detail(&mut self, detail: &EvolutionDetail) -> Result<()> {
        self.conn
            .execute(
                "INSERT OR REPLACE INTO evolution_details
                   (id, stage_key, pokemon_key, trigger_key, item_key, held_item_key,
                    known_move_key, known_move_type_key, location_key, party_species_key,
                    party_type_key, trade_species_key, gender, min_level, min_happiness,
                    min_beauty, min_affection, relative_physical_stats,
                    needs_overworld_rain, turn_upside_down, time_of_day)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15,
                         ?16, ?17, ?18, ?19, ?20, ?21)",
                params![
                    detail.id,
                    detail.stage_key,
                    detail.pokemon_key,
                    detail.trigger_key,
                    detail.item_key,
                    detail.held_item_key,
                    detail.known_move_key,
                    detail.known_move_type_key,
                    detail.location_key,
                    detail.party_species_key,
                    detail.party_type_key,
                    detail.trade_species_key,
                    detail.gender,
                    detail.min_level,
                    detail.min_happiness,
                    detail.min_beauty,
                    detail.min_affection,
                    detail.relative_physical_stats,
                    detail.needs_overworld_rain,
                    detail.turn_upside_down,
                    detail.time_of_day,
                ],
            )
            .context("failed to save evolution detail")?;
        Ok(())
    }

    /// Row count for one table, used by CLI summaries and tests.
    ///
    /// # Errors
    /// Returns an error when the query fails.
    pub fn count_rows(&self, kind: Kind) -> Result<i64> {
        let sql = format!("SELECT COUNT(*) FROM {}", table(kind));
        self.conn
            .query_row(&sql, [], |row| row.get(0))
            .with_context(|| format!("failed to count {kind} rows"))
    }
}

fn configure(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "PRAGMA journal_mode = WAL;
         PRAGMA foreign_keys = ON;
         PRAGMA busy_timeout = 5000;",
    )
    .context("failed to configure sqlite pragmas")
}

fn current_schema_version(conn: &Connection) -> Result<i64> {
    conn.query_row("SELECT COALESCE(MAX(version), 0) FROM schema_migrations", [], |row| {
        row.get(0)
    })
    .context("failed to read schema version")
}

fn table(kind: Kind) -> &'static str {
    match kind {
        Kind::Language => "languages",
        Kind::EggGroup => "egg_groups",
        Kind::Color => "pokemon_colors",
        Kind::Shape => "pokemon_shapes",
        Kind::Habitat => "pokemon_habitats",
        Kind::GrowthRate => "growth_rates",
        Kind::Species => "species",
        Kind::Pokemon => "pokemon",
        Kind::Type => "types",
        Kind::Ability => "abilities",
        Kind::Move => "moves",
        Kind::Item => "items",
        Kind::Location => "locations",
        Kind::EvolutionTrigger => "evolution_triggers",
        Kind::EvolutionChain => "evolution_chains",
        Kind::Region => "regions",
        Kind::Generation => "generations",
        Kind::VersionGroup => "version_groups",
        Kind::Version => "versions",
    }
}

const SPECIES_SELECT: &str = "SELECT id, api_id, name, ordering, gender_rate, capture_rate,
        base_happiness, is_baby, is_legendary, is_mythical, hatch_counter,
        has_gender_differences, forms_switchable, evolves_from_species_key,
        egg_group_1_key, egg_group_2_key, color_key, shape_key, habitat_key,
        growth_rate_key, generation_key, evolution_chain_key
 FROM species";

const POKEMON_SELECT: &str = "SELECT id, api_id, name, base_experience, height, weight,
        is_default, ordering, species_key, type_1_key, type_2_key, ability_1_key,
        ability_2_key, hidden_ability_key, hp, attack, defense, special_attack,
        special_defense, speed
 FROM pokemon";

fn map_language(row: &rusqlite::Row<'_>) -> rusqlite::Result<Language> {
    Ok(Language {
        id: row.get(0)?,
        api_id: row.get(1)?,
        name: row.get(2)?,
        official: row.get(3)?,
        iso639: row.get(4)?,
        iso3166: row.get(5)?,
    })
}

fn map_species(row: &rusqlite::Row<'_>) -> rusqlite::Result<Species> {
    Ok(Species {
        id: row.get(0)?,
        api_id: row.get(1)?,
        name: row.get(2)?,
        ordering: row.get(3)?,
        gender_rate: row.get(4)?,
        capture_rate: row.get(5)?,
        base_happiness: row.get(6)?,
        is_baby: row.get(7)?,
        is_legendary: row.get(8)?,
        is_mythical: row.get(9)?,
        hatch_counter: row.get(10)?,
        has_gender_differences: row.get(11)?,
        forms_switchable: row.get(12)?,
        evolves_from_species_key: row.get(13)?,
        egg_group_1_key: row.get(14)?,
        egg_group_2_key: row.get(15)?,
        color_key: row.get(16)?,
        shape_key: row.get(17)?,
        habitat_key: row.get(18)?,
        growth_rate_key: row.get(19)?,
        generation_key: row.get(20)?,
        evolution_chain_key: row.get(21)?,
    })
}

fn map_pokemon(row: &rusqlite::Row<'_>) -> rusqlite::Result<Pokemon> {
    Ok(Pokemon {
        id: row.get(0)?,
        api_id: row.get(1)?,
        name: row.get(2)?,
        base_experience: row.get(3)?,
        height: row.get(4)?,
        weight: row.get(5)?,
        is_default: row.get(6)?,
        ordering: row.get(7)?,
        species_key: row.get(8)?,
        type_1_key: row.get(9)?,
        type_2_key: row.get(10)?,
        ability_1_key: row.get(11)?,
        ability_2_key: row.get(12)?,
        hidden_ability_key: row.get(13)?,
        hp: row.get(14)?,
        attack: row.get(15)?,
        defense: row.get(16)?,
        special_attack: row.get(17)?,
        special_defense: row.get(18)?,
        speed: row.get(19)?,
    })
}

fn map_detail(row: &rusqlite::Row<'_>) -> rusqlite::Result<EvolutionDetail> {
    Ok(EvolutionDetail {
        id: row.get(0)?,
        stage_key: row.get(1)?,
        pokemon_key: row.get(2)?,
        trigger_key: row.get(3)?,
        item_key: row.get(4)?,
        held_item_key: row.get(5)?,
        known_move_key: row.get(6)?,
        known_move_type_key: row.get(7)?,
        location_key: row.get(8)?,
        party_species_key: row.get(9)?,
        party_type_key: row.get(10)?,
        trade_species_key: row.get(11)?,
        gender: row.get(12)?,
        min_level: row.get(13)?,
        min_happiness: row.get(14)?,
        min_beauty: row.get(15)?,
        min_affection: row.get(16)?,
        relative_physical_stats: row.get(17)?,
        needs_overworld_rain: row.get(18)?,
        turn_upside_down: row.get(19)?,
        time_of_day: row.get(20)?,
    })
}

fn insert_entity(conn: &Connection, row: &EntityRow) -> Result<()> {
    match row {
        EntityRow::Language(e) => {
            conn.execute(
                "INSERT OR REPLACE INTO languages (id, api_id, name, official, iso639, iso3166)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![e.id, e.api_id, e.name, e.official, e.iso639, e.iso3166],
            )
            .context("failed to save language")?;
        }
        EntityRow::EggGroup(e) => insert_named(conn, "egg_groups", e.id, e.api_id, &e.name)?,
        EntityRow::Color(e) => insert_named(conn, "pokemon_colors", e.id, e.api_id, &e.name)?,
        EntityRow::Shape(e) => insert_named(conn, "pokemon_shapes", e.id, e.api_id, &e.name)?,
        EntityRow::Habitat(e) => insert_named(conn, "pokemon_habitats", e.id, e.api_id, &e.name)?,
        EntityRow::GrowthRate(e) => {
            conn.execute(
                "INSERT OR REPLACE INTO growth_rates (id, api_id, name, formula)
                 VALUES (?1, ?2, ?3, ?4)",
                params![e.id, e.api_id, e.name, e.formula],
            )
            .context("failed to save growth rate")?;
        }
        EntityRow::EvolutionTrigger(e) => {
            insert_named(conn, "evolution_triggers", e.id, e.api_id, &e.name)?;
        }
        EntityRow::Item(e) => {
            conn.execute(
                "INSERT OR REPLACE INTO items (id, api_id, name, cost) VALUES (?1, ?2, ?3, ?4)",
                params![e.id, e.api_id, e.name, e.cost],
            )
            .context("failed to save item")?;
        }
        EntityRow::Move(e) => {
            conn.execute(
                "INSERT OR REPLACE INTO moves
                   (id, api_id, name, power, pp, accuracy, priority, type_key)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![e.id, e.api_id, e.name, e.power, e.pp, e.accuracy, e.priority, e.type_key],
            )
            .context("failed to save move")?;
        }
        EntityRow::Location(e) => {
            conn.execute(
                "INSERT OR REPLACE INTO locations (id, api_id, name, region_key)
                 VALUES (?1, ?2, ?3, ?4)",
                params![e.id, e.api_id, e.name, e.region_key],
            )
            .context("failed to save location")?;
        }
        EntityRow::Type(e) => insert_named(conn, "types", e.id, e.api_id, &e.name)?,
        EntityRow::Ability(e) => {
            conn.execute(
                "INSERT OR REPLACE INTO abilities (id, api_id, name, is_main_series)
                 VALUES (?1, ?2, ?3, ?4)",
                params![e.id, e.api_id, e.name, e.is_main_series],
            )
            .context("failed to save ability")?;
        }
        EntityRow::Species(e) => {
            conn.execute(
                "INSERT OR REPLACE INTO species
                   (id, api_id, name, ordering, gender_rate, capture_rate, base_happiness,
                    is_baby, is_legendary, is_mythical, hatch_counter, has_gender_differences,
                    forms_switchable, evolves_from_species_key, egg_group_1_key, egg_group_2_key,
                    color_key, shape_key, habitat_key, growth_rate_key, generation_key,
                    evolution_chain_key)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15,
                         ?16, ?17, ?18, ?19, ?20, ?21, ?22)",
                params![
                    e.id,
                    e.api_id,
                    e.name,
                    e.ordering,
                    e.gender_rate,
                    e.capture_rate,
                    e.base_happiness,
                    e.is_baby,
                    e.is_legendary,
                    e.is_mythical,
                    e.hatch_counter,
                    e.has_gender_differences,
                    e.forms_switchable,
                    e.evolves_from_species_key,
                    e.egg_group_1_key,
                    e.egg_group_2_key,
                    e.color_key,
                    e.shape_key,
                    e.habitat_key,
                    e.growth_rate_key,
                    e.generation_key,
                    e.evolution_chain_key,
                ],
            )
            .context("failed to save species")?;
        }
        EntityRow::Pokemon(e) => {
            conn.execute(
                "INSERT OR REPLACE INTO pokemon
                   (id, api_id, name, base_experience, height, weight, is_default, ordering,
                    species_key, type_1_key, type_2_key, ability_1_key, ability_2_key,
                    hidden_ability_key, hp, attack, defense, special_attack, special_defense,
                    speed)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15,
                         ?16, ?17, ?18, ?19, ?20)",
                params![
                    e.id,
                    e.api_id,
                    e.name,
                    e.base_experience,
                    e.height,
                    e.weight,
                    e.is_default,
                    e.ordering,
                    e.species_key,
                    e.type_1_key,
                    e.type_2_key,
                    e.ability_1_key,
                    e.ability_2_key,
                    e.hidden_ability_key,
                    e.hp,
                    e.attack,
                    e.defense,
                    e.special_attack,
                    e.special_defense,
                    e.speed,
                ],
            )
            .context("failed to save pokemon")?;
        }
        EntityRow::EvolutionChain(e) => {
            conn.execute(
                "INSERT OR REPLACE INTO evolution_chains (id, api_id, baby_trigger_item_key)
                 VALUES (?1, ?2, ?3)",
                params![e.id, e.api_id, e.baby_trigger_item_key],
            )
            .context("failed to save evolution chain")?;
        }
        EntityRow::Region(e) => insert_named(conn, "regions", e.id, e.api_id, &e.name)?,
        EntityRow::Generation(e) => {
            conn.execute(
                "INSERT OR REPLACE INTO generations (id, api_id, name, main_region_key)
                 VALUES (?1, ?2, ?3, ?4)",
                params![e.id, e.api_id, e.name, e.main_region_key],
            )
            .context("failed to save generation")?;
        }
        EntityRow::VersionGroup(e) => {
            conn.execute(
                "INSERT OR REPLACE INTO version_groups
                   (id, api_id, name, ordering, generation_key)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![e.id, e.api_id, e.name, e.ordering, e.generation_key],
            )
            .context("failed to save version group")?;
        }
        EntityRow::Version(e) => {
            conn.execute(
                "INSERT OR REPLACE INTO versions (id, api_id, name, version_group_key)
                 VALUES (?1, ?2, ?3, ?4)",
                params![e.id, e.api_id, e.name, e.version_group_key],
            )
            .context("failed to save version")?;
        }
    }
    Ok(())
}

fn insert_named(conn: &Connection, table: &str, id: i64, api_id: i64, name: &str) -> Result<()> {
    let sql = format!("INSERT OR REPLACE INTO {table} (id, api_id, name) VALUES (?1, ?2, ?3)");
    conn.execute(&sql, params![id, api_id, name])
        .with_context(|| format!("failed to save row into {table}"))?;
    Ok(())
}

fn insert_text_entry(conn: &Connection, entry: &TextEntry) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO text_entries
           (id, parent_kind, parent_id, grouping, language_key, version_key,
            version_group_key, text)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            entry.id,
            entry.parent_kind.as_str(),
            entry.parent_id,
            entry.grouping,
            entry.language_key,
            entry.version_key,
            entry.version_group_key,
            entry.text,
        ],
    )
    .context("failed to save text entry")?;
    Ok(())
}

fn delete_text_entries(conn: &Connection, ids: &[i64]) -> Result<()> {
    if ids.is_empty() {
        return Ok(());
    }
    let placeholders = vec!["?"; ids.len()].join(",");
    let sql = format!("DELETE FROM text_entries WHERE id IN ({placeholders})");
    conn.execute(&sql, rusqlite::params_from_iter(ids.iter()))
        .context("failed to delete stale text entries")?;
    Ok(())
}
