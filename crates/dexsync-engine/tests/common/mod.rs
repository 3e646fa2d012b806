#![allow(dead_code)]

use std::collections::HashMap;

use dexsync_client::DataSource;
use dexsync_core::{Kind, SyncError};
use serde_json::{json, Value};

/// In-memory stand-in for the upstream API: a map of canned documents.
pub struct FixtureSource {
    docs: HashMap<(Kind, i64), Value>,
}

impl FixtureSource {
    pub fn empty() -> Self {
        FixtureSource { docs: HashMap::new() }
    }

    pub fn insert(&mut self, kind: Kind, api_id: i64, doc: Value) {
        self.docs.insert((kind, api_id), doc);
    }
}

impl DataSource for FixtureSource {
    fn fetch(&mut self, kind: Kind, api_id: i64) -> Result<Option<Value>, SyncError> {
        Ok(self.docs.get(&(kind, api_id)).cloned())
    }
}

pub fn reference(kind: Kind, api_id: i64, name: &str) -> Value {
    let url = match kind.resource_url(api_id) {
        Some(url) => url,
        None => panic!("{kind} has no resource url"),
    };
    json!({"name": name, "url": url})
}

pub fn en() -> Value {
    reference(Kind::Language, 9, "en")
}

pub fn fr() -> Value {
    reference(Kind::Language, 5, "fr")
}

pub fn localized(text: &str, language: Value) -> Value {
    json!({"name": text, "language": language})
}

pub fn language_doc(api_id: i64, name: &str, label: &str) -> Value {
    json!({
        "id": api_id,
        "name": name,
        "official": true,
        "iso639": name,
        "iso3166": name,
        "names": [localized(label, en())]
    })
}

/// Minimal `{id, name, names}` document, enough for the simple lookup kinds.
pub fn named_doc(api_id: i64, name: &str, label: &str) -> Value {
    json!({"id": api_id, "name": name, "names": [localized(label, en())]})
}

pub fn must<T, E: std::fmt::Display>(result: Result<T, E>, what: &str) -> T {
    match result {
        Ok(value) => value,
        Err(err) => panic!("{what}: {err}"),
    }
}
