//! Domain model and pure rules for the dexsync reference-data pipeline.
//!
//! This crate is I/O free. It holds the entity rows the store persists, the
//! source-record types deserialized from upstream JSON and CSV snapshots, the
//! `SyncError` taxonomy shared by every other crate, and the small set of
//! rules the engine applies (stat dispatch, localized-text keys, form
//! filtering).

pub mod api;
pub mod model;

use std::fmt;

/// Error taxonomy for a sync run.
///
/// `NotFound` and `InProgress` are recoverable signals the engine routes by
/// policy; `Integrity` always aborts the run; `Store` and `Transport` are
/// propagated unchanged.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// The upstream source has no record for this natural id.
    #[error("{kind} {api_id} not found upstream")]
    NotFound { kind: Kind, api_id: i64 },
    /// The named resource is already mid-resolution on this call stack.
    #[error("resolution already in progress for {0}")]
    InProgress(String),
    /// The source data violates a game-data invariant. Fatal.
    #[error("integrity violation: {0}")]
    Integrity(String),
    /// A source document could not be decoded.
    #[error("malformed source document: {0}")]
    Decode(String),
    /// The transport layer failed (network, non-404 HTTP status).
    #[error("transport failure: {0}")]
    Transport(String),
    /// Storage failure, with context attached by the store.
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

/// Policy for a reference whose upstream record may legitimately be absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Missing {
    /// Absence is acceptable; the caller receives `None`.
    Allow,
    /// Absence is an error; `SyncError::NotFound` is raised.
    Deny,
}

/// Every entity kind the pipeline reconciles.
///
/// API kinds are fetched one document at a time from the upstream source;
/// CSV kinds (`Region`, `Generation`, `VersionGroup`, `Version`) are loaded
/// in bulk from snapshot files and are never fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Kind {
    Language,
    EggGroup,
    Color,
    Shape,
    Habitat,
    GrowthRate,
    Species,
    Pokemon,
    Type,
    Ability,
    Move,
    Item,
    Location,
    EvolutionTrigger,
    EvolutionChain,
    Region,
    Generation,
    VersionGroup,
    Version,
}

impl Kind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Kind::Language => "language",
            Kind::EggGroup => "egg-group",
            Kind::Color => "pokemon-color",
            Kind::Shape => "pokemon-shape",
            Kind::Habitat => "pokemon-habitat",
            Kind::GrowthRate => "growth-rate",
            Kind::Species => "pokemon-species",
            Kind::Pokemon => "pokemon",
            Kind::Type => "type",
            Kind::Ability => "ability",
            Kind::Move => "move",
            Kind::Item => "item",
            Kind::Location => "location",
            Kind::EvolutionTrigger => "evolution-trigger",
            Kind::EvolutionChain => "evolution-chain",
            Kind::Region => "region",
            Kind::Generation => "generation",
            Kind::VersionGroup => "version-group",
            Kind::Version => "version",
        }
    }

    /// Parses the kebab-case form produced by [`Kind::as_str`].
    #[must_use]
    pub fn parse(value: &str) -> Option<Kind> {
        match value {
            "language" => Some(Kind::Language),
            "egg-group" => Some(Kind::EggGroup),
            "pokemon-color" => Some(Kind::Color),
            "pokemon-shape" => Some(Kind::Shape),
            "pokemon-habitat" => Some(Kind::Habitat),
            "growth-rate" => Some(Kind::GrowthRate),
            "pokemon-species" => Some(Kind::Species),
            "pokemon" => Some(Kind::Pokemon),
            "type" => Some(Kind::Type),
            "ability" => Some(Kind::Ability),
            "move" => Some(Kind::Move),
            "item" => Some(Kind::Item),
            "location" => Some(Kind::Location),
            "evolution-trigger" => Some(Kind::EvolutionTrigger),
            "evolution-chain" => Some(Kind::EvolutionChain),
            "region" => Some(Kind::Region),
            "generation" => Some(Kind::Generation),
            "version-group" => Some(Kind::VersionGroup),
            "version" => Some(Kind::Version),
            _ => None,
        }
    }

    /// Upstream endpoint path segment, or `None` for CSV-only kinds.
    #[must_use]
    pub fn endpoint(self) -> Option<&'static str> {
        match self {
            Kind::Region | Kind::Generation | Kind::VersionGroup | Kind::Version => None,
            other => Some(other.as_str()),
        }
    }

    /// Canonical source URL for one record. Used as the in-flight key.
    #[must_use]
    pub fn resource_url(self, api_id: i64) -> Option<String> {
        self.endpoint()
            .map(|ep| format!("https://pokeapi.co/api/v2/{ep}/{api_id}/"))
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Merge key for one localized text child: the text itself, the language's
/// natural id, and (when scoped) the version or version-group natural id.
#[must_use]
pub fn text_key(text: &str, language_api_id: i64, scope_api_id: Option<i64>) -> String {
    match scope_api_id {
        Some(scope) => format!("{text}:{language_api_id}:{scope}"),
        None => format!("{text}:{language_api_id}"),
    }
}

/// Battle-only mega forms are excluded when pairing evolution details with a
/// species' varieties.
#[must_use]
pub fn is_mega_form(variety_name: &str) -> bool {
    variety_name.ends_with("-mega") || variety_name.contains("-mega-")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_round_trips_through_parse() {
        let kinds = [
            Kind::Language,
            Kind::EggGroup,
            Kind::Species,
            Kind::Pokemon,
            Kind::Type,
            Kind::EvolutionChain,
            Kind::VersionGroup,
        ];
        for kind in kinds {
            assert_eq!(Kind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(Kind::parse("berry"), None);
    }

    #[test]
    fn csv_kinds_have_no_endpoint() {
        assert_eq!(Kind::Region.endpoint(), None);
        assert_eq!(Kind::Version.resource_url(3), None);
        match Kind::Species.resource_url(1) {
            Some(url) => assert_eq!(url, "https://pokeapi.co/api/v2/pokemon-species/1/"),
            None => panic!("species is an API kind"),
        }
    }

    #[test]
    fn text_keys_embed_scope_only_when_present() {
        assert_eq!(text_key("Bulbasaur", 9, None), "Bulbasaur:9");
        assert_eq!(text_key("Bulbizarre", 5, Some(7)), "Bulbizarre:5:7");
    }

    #[test]
    fn mega_forms_are_filtered_by_name_shape() {
        assert!(is_mega_form("venusaur-mega"));
        assert!(is_mega_form("charizard-mega-x"));
        assert!(!is_mega_form("meganium"));
        assert!(!is_mega_form("venusaur"));
    }
}
