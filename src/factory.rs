//! Database factory
//!
//! Maps backend names to constructors, so a harness can create adapters from
//! its properties alone. [`DbFactory::with_defaults`] registers this crate's
//! adapter as [`BTREE_DB_NAME`].

use std::collections::HashMap;
use std::sync::Arc;

use crate::adapter::BTreeDb;
use crate::config::{Config, Properties};
use crate::db::Db;
use crate::engine::KvTable;
use crate::error::{BTreeDbError, Result};
use crate::shared::SharedEngine;

/// Name the B-tree adapter is registered under
pub const BTREE_DB_NAME: &str = "btreedb";

/// Builds a fresh adapter from harness properties
pub type DbConstructor = Box<dyn Fn(&Properties) -> Result<Box<dyn Db>> + Send + Sync>;

/// Registry of database constructors
#[derive(Default)]
pub struct DbFactory {
    constructors: HashMap<String, DbConstructor>,
}

impl DbFactory {
    /// An empty factory
    pub fn new() -> Self {
        Self::default()
    }

    /// A factory with every backend of this crate registered
    pub fn with_defaults() -> Self {
        let mut factory = Self::new();
        register_btree_db(&mut factory, Arc::new(SharedEngine::new()));
        factory
    }

    /// Register `constructor` under `name`. Returns false if the name was
    /// already taken (the existing constructor is kept).
    pub fn register(&mut self, name: impl Into<String>, constructor: DbConstructor) -> bool {
        let name = name.into();
        if self.constructors.contains_key(&name) {
            return false;
        }
        self.constructors.insert(name, constructor);
        true
    }

    /// Create a new instance of the backend registered as `name`
    pub fn create(&self, name: &str, props: &Properties) -> Result<Box<dyn Db>> {
        let constructor = self
            .constructors
            .get(name)
            .ok_or_else(|| BTreeDbError::UnknownDb(name.to_string()))?;
        constructor(props)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.constructors.contains_key(name)
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.constructors.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

/// Register the B-tree adapter; every instance it creates shares `shared`
pub fn register_btree_db(factory: &mut DbFactory, shared: Arc<SharedEngine<KvTable>>) -> bool {
    factory.register(
        BTREE_DB_NAME,
        Box::new(move |props: &Properties| {
            let config = Config::from_properties(props)?;
            let db = BTreeDb::init(&shared, &config)?;
            Ok(Box::new(db) as Box<dyn Db>)
        }),
    )
}
