//! Localized-text reconciliation.
//!
//! Each entity kind declares its text groups (`names`, `genera`, flavor
//! text, ...) as data: a grouping label, a scope, and an extraction function
//! over the source document. Sync is a full merge per (parent, grouping):
//! incoming entries are keyed by text + language [+ scope], matched entries
//! are kept as-is, unmatched incoming entries become new rows, and leftover
//! stored rows are deleted in one batch. Languages referenced by new entries
//! are resolved through the ordinary upsert path before the parent's write
//! transaction opens.

use std::collections::HashMap;

use dexsync_client::DataSource;
use dexsync_core::api::{self, ApiRef};
use dexsync_core::model::TextEntry;
use dexsync_core::{text_key, Kind, Missing, SyncError};
use tracing::warn;

use crate::resource::Resource;
use crate::{required, Reconciler};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TextScope {
    Plain,
    Version,
    VersionGroup,
}

/// One localized-text group on a source document.
pub(crate) struct TextGroupSpec<D> {
    pub grouping: &'static str,
    pub scope: TextScope,
    pub extract: fn(&D) -> Vec<TextSource>,
}

/// One incoming text entry, scope references included.
pub(crate) struct TextSource {
    pub text: String,
    pub language: ApiRef,
    pub version: Option<ApiRef>,
    pub version_group: Option<ApiRef>,
}

impl TextSource {
    pub(crate) fn plain(text: &str, language: &ApiRef) -> Self {
        TextSource {
            text: text.to_owned(),
            language: language.clone(),
            version: None,
            version_group: None,
        }
    }
}

pub(crate) fn name_sources(names: &[api::NameText]) -> Vec<TextSource> {
    names.iter().map(|n| TextSource::plain(&n.name, &n.language)).collect()
}

pub(crate) fn description_sources(descriptions: &[api::DescriptionText]) -> Vec<TextSource> {
    descriptions.iter().map(|d| TextSource::plain(&d.description, &d.language)).collect()
}

pub(crate) fn genus_sources(genera: &[api::GenusText]) -> Vec<TextSource> {
    genera.iter().map(|g| TextSource::plain(&g.genus, &g.language)).collect()
}

pub(crate) fn flavor_sources(entries: &[api::FlavorText]) -> Vec<TextSource> {
    entries
        .iter()
        .map(|f| TextSource {
            text: f.flavor_text.clone(),
            language: f.language.clone(),
            version: f.version.clone(),
            version_group: f.version_group.clone(),
        })
        .collect()
}

impl<S: DataSource> Reconciler<S> {
    /// Compute the text delta for one parent: rows to insert and stale row
    /// ids to delete. Performs the recursive language upserts now so the
    /// caller's transaction stays write-only.
    pub(crate) fn plan_text<T: Resource>(
        &mut self,
        parent_id: i64,
        data: &T::Data,
    ) -> Result<(Vec<TextEntry>, Vec<i64>), SyncError> {
        let mut new_entries = Vec::new();
        let mut stale = Vec::new();

        for group in T::text_groups() {
            let existing = self.store.list_text_entries(T::KIND, parent_id, group.grouping)?;
            let mut by_key: HashMap<String, i64> = HashMap::with_capacity(existing.len());
            for record in &existing {
                let scope = match group.scope {
                    TextScope::Plain => None,
                    TextScope::Version => record.version_api_id,
                    TextScope::VersionGroup => record.version_group_api_id,
                };
                by_key.insert(
                    text_key(&record.entry.text, record.language_api_id, scope),
                    record.entry.id,
                );
            }

            for source in (group.extract)(data) {
                let language_api_id = source.language.api_id()?;
                let scope_ref = match group.scope {
                    TextScope::Plain => None,
                    TextScope::Version => source.version.as_ref(),
                    TextScope::VersionGroup => source.version_group.as_ref(),
                };
                let scope_api_id = match scope_ref {
                    Some(reference) => Some(reference.api_id()?),
                    None if group.scope == TextScope::Plain => None,
                    None => {
                        warn!(
                            kind = %T::KIND,
                            parent_id,
                            grouping = group.grouping,
                            "scoped text entry without a scope reference; skipped"
                        );
                        continue;
                    }
                };

                let key = text_key(&source.text, language_api_id, scope_api_id);
                if by_key.remove(&key).is_some() {
                    continue;
                }

                let language_key = required(
                    self.link_ref::<dexsync_core::model::Language>(
                        Some(&source.language),
                        Missing::Deny,
                    )?,
                    Kind::Language,
                    language_api_id,
                )?;
                let (version_key, version_group_key) = match group.scope {
                    TextScope::Plain => (None, None),
                    TextScope::Version => {
                        let Some(key) = self.snapshot_ref(Kind::Version, scope_ref)? else {
                            continue;
                        };
                        (Some(key), None)
                    }
                    TextScope::VersionGroup => {
                        let Some(key) = self.snapshot_ref(Kind::VersionGroup, scope_ref)? else {
                            continue;
                        };
                        (None, Some(key))
                    }
                };

                let id = self.ids.next(&mut self.store)?;
                new_entries.push(TextEntry {
                    id,
                    parent_kind: T::KIND,
                    parent_id,
                    grouping: group.grouping.to_owned(),
                    language_key,
                    version_key,
                    version_group_key,
                    text: source.text,
                });
            }

            stale.extend(by_key.into_values());
        }

        Ok((new_entries, stale))
    }
}
