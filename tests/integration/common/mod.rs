#![allow(dead_code)]

use std::path::Path;
use std::sync::{Arc, Once};

use tinystore::{Ontology, OntologyDescription, Result, Store, StoreConfig};
use tracing_subscriber::EnvFilter;

const ONTOLOGY: &str = include_str!("../../fixtures/ontology.toml");

static TRACING: Once = Once::new();

/// Routes store events to the test output when `RUST_LOG` is set.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

pub fn ontology() -> Arc<Ontology> {
    OntologyDescription::from_toml_str(ONTOLOGY)
        .and_then(OntologyDescription::build)
        .expect("fixture ontology")
}

pub fn open(path: &Path) -> Result<Store> {
    open_with(path, StoreConfig::ephemeral())
}

pub fn open_with(path: &Path, config: StoreConfig) -> Result<Store> {
    init_tracing();
    Store::open(path, ontology(), config)
}

pub fn memory() -> Result<Store> {
    init_tracing();
    Store::open_in_memory(ontology(), StoreConfig::ephemeral())
}

pub fn reopen(store: Store, path: &Path) -> Result<Store> {
    let config = store.config().clone();
    store.close()?;
    open_with(path, config)
}

pub fn queryable(store: &Store, uri: &str) -> Result<bool> {
    Ok(store.resource_id(uri)?.is_some())
}
