//! Per-decorator metadata records and their ordered store
//!
//! Records are stored per (decorator name, target type) in
//! newest-first order: registering pushes to the front, and lookups
//! that want "last applied wins" read element 0.

use crate::provider::Provider;
use crate::token::Token;
use rustc_hash::FxHashMap;
use std::any::TypeId;

/// Decorator names understood by the default pipeline. Third-party
/// decorators use their own names via `LifeScope::register_decorator`.
pub mod decorators {
    pub const INJECTABLE: &str = "Injectable";
    pub const SINGLETON: &str = "Singleton";
    pub const ABSTRACT: &str = "Abstract";
    pub const INJECT: &str = "Inject";
    pub const AUTORUN: &str = "Autorun";
    pub const IOC_MODULE: &str = "IocModule";
}

/// One decorator application on a class, parameter, property or method.
#[derive(Clone, Default)]
pub struct MetadataRecord {
    pub decorator: &'static str,
    /// Declared runtime type, filled from the type registry when the
    /// decorator omits an explicit token.
    pub type_token: Option<Token>,
    /// Explicit token this target should be provided under.
    pub provide: Option<Token>,
    /// Alias qualifier; combined with `provide` into a Registration.
    pub alias: Option<String>,
    pub singleton: bool,
    /// Cache lifetime in milliseconds for non-singleton types.
    pub expires_ms: Option<u64>,
    /// Method to run immediately after registration.
    pub autorun: Option<String>,
    pub property_key: Option<String>,
    pub index: Option<usize>,
    pub providers: Vec<Provider>,
}

impl MetadataRecord {
    pub fn new(decorator: &'static str) -> Self {
        Self {
            decorator,
            ..Default::default()
        }
    }

    /// A terminal record carries an explicit provide token; merging
    /// stops when one is seen.
    pub fn is_terminal(&self) -> bool {
        self.provide.is_some()
    }

    /// The explicit provide token (qualified by the alias when both
    /// are present), without any declared-type fallback.
    pub fn provide_token(&self) -> Option<Token> {
        let provide = self.provide.as_ref()?;
        match (&self.alias, provide.type_key()) {
            (Some(alias), Some(base)) => Some(Token::Registration {
                base,
                desc: alias.as_str().into(),
            }),
            _ => Some(provide.clone()),
        }
    }

    /// The effective injection token: provide (+alias) first, declared
    /// type as the inference fallback.
    pub fn effective_token(&self) -> Option<Token> {
        self.provide_token().or_else(|| self.type_token.clone())
    }
}

/// Merge the records applied to one slot into a single effective record.
///
/// Records are iterated newest-first (nearest to the declaration).
/// Missing fields fill in from older records; the first terminal record
/// wins outright and stops the walk.
pub fn merge_records(records: &[MetadataRecord]) -> Option<MetadataRecord> {
    let mut merged: Option<MetadataRecord> = None;
    for record in records {
        if record.is_terminal() {
            // Keep any already-merged declared type as the fallback.
            let mut winner = record.clone();
            if winner.type_token.is_none() {
                winner.type_token = merged.and_then(|m| m.type_token);
            }
            return Some(winner);
        }
        match &mut merged {
            None => merged = Some(record.clone()),
            Some(acc) => {
                if acc.type_token.is_none() {
                    acc.type_token = record.type_token.clone();
                }
                if acc.alias.is_none() {
                    acc.alias = record.alias.clone();
                }
                if acc.expires_ms.is_none() {
                    acc.expires_ms = record.expires_ms;
                }
                if acc.autorun.is_none() {
                    acc.autorun = record.autorun.clone();
                }
                acc.singleton |= record.singleton;
                acc.providers.extend(record.providers.iter().cloned());
            }
        }
    }
    merged
}

type MetaKey = (&'static str, TypeId);

/// Ordered storage of metadata records, queried by decorator name.
#[derive(Default)]
pub struct MetadataStore {
    class: FxHashMap<MetaKey, Vec<MetadataRecord>>,
    params: FxHashMap<MetaKey, Vec<Vec<MetadataRecord>>>,
    properties: FxHashMap<MetaKey, FxHashMap<String, Vec<MetadataRecord>>>,
    methods: FxHashMap<MetaKey, FxHashMap<String, Vec<MetadataRecord>>>,
}

impl MetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_class(&mut self, target: TypeId, record: MetadataRecord) {
        self.class
            .entry((record.decorator, target))
            .or_default()
            .insert(0, record);
    }

    pub fn add_param(&mut self, target: TypeId, index: usize, record: MetadataRecord) {
        let slots = self.params.entry((record.decorator, target)).or_default();
        if slots.len() <= index {
            slots.resize_with(index + 1, Vec::new);
        }
        slots[index].insert(0, record);
    }

    pub fn add_property(&mut self, target: TypeId, key: &str, record: MetadataRecord) {
        self.properties
            .entry((record.decorator, target))
            .or_default()
            .entry(key.to_string())
            .or_default()
            .insert(0, record);
    }

    pub fn add_method(&mut self, target: TypeId, key: &str, record: MetadataRecord) {
        self.methods
            .entry((record.decorator, target))
            .or_default()
            .entry(key.to_string())
            .or_default()
            .insert(0, record);
    }

    /// Records declared directly on `target`, newest first.
    pub fn own_class(&self, decorator: &str, target: TypeId) -> &[MetadataRecord] {
        self.class
            .get(&(decorator_key(decorator), target))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Class records along an extends chain, nearest type first.
    pub fn class_chain<'a>(
        &'a self,
        decorator: &str,
        chain: impl IntoIterator<Item = TypeId> + 'a,
    ) -> Vec<&'a MetadataRecord> {
        let decorator = decorator_key(decorator);
        chain
            .into_iter()
            .flat_map(|target| {
                self.class
                    .get(&(decorator, target))
                    .map(Vec::as_slice)
                    .unwrap_or(&[])
            })
            .collect()
    }

    /// Per-parameter record lists for a constructor, by position.
    pub fn params(&self, decorator: &str, target: TypeId) -> &[Vec<MetadataRecord>] {
        self.params
            .get(&(decorator_key(decorator), target))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn property(&self, decorator: &str, target: TypeId, key: &str) -> &[MetadataRecord] {
        self.properties
            .get(&(decorator_key(decorator), target))
            .and_then(|by_key| by_key.get(key))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn method(&self, decorator: &str, target: TypeId, key: &str) -> &[MetadataRecord] {
        self.methods
            .get(&(decorator_key(decorator), target))
            .and_then(|by_key| by_key.get(key))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// All decorator names present on `target` at class level.
    pub fn class_decorators(&self, target: TypeId) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = self
            .class
            .keys()
            .filter(|(_, t)| *t == target)
            .map(|(d, _)| *d)
            .collect();
        names.sort_unstable();
        names.dedup();
        names
    }

    pub fn has_class_decorator(&self, target: TypeId) -> bool {
        self.class.keys().any(|(_, t)| *t == target)
    }
}

/// Interns well-known decorator names so map keys stay `&'static`.
fn decorator_key(decorator: &str) -> &'static str {
    match decorator {
        d if d == decorators::INJECTABLE => decorators::INJECTABLE,
        d if d == decorators::SINGLETON => decorators::SINGLETON,
        d if d == decorators::ABSTRACT => decorators::ABSTRACT,
        d if d == decorators::INJECT => decorators::INJECT,
        d if d == decorators::AUTORUN => decorators::AUTORUN,
        d if d == decorators::IOC_MODULE => decorators::IOC_MODULE,
        other => Box::leak(other.to_string().into_boxed_str()),
    }
}
