#![allow(missing_docs)]

mod common;

use common::{open, open_with, queryable, reopen};
use tempfile::tempdir;
use tinystore::{Object, Quad, Result, StoreConfig, SweepPolicy, Term, UpdateBatch};

fn foo(name: &str) -> Term {
    Term::iri(format!("foo:{name}"))
}

fn described_a() -> Vec<Quad> {
    vec![
        Quad::a(foo("a"), "nie:InformationElement"),
        Quad::new(foo("a"), "nco:publisher", foo("b")),
        Quad::new(foo("a"), "nie:rootElementOf", foo("c")),
    ]
}

#[test]
fn subtype_deletion_keeps_resource_until_root_class_is_removed() -> Result<()> {
    let dir = tempdir()?;
    let store = open(&dir.path().join("ledger.db"))?;

    for _ in 0..10 {
        store.insert([Quad::a(foo("a"), "nie:InformationElement")])?;
    }
    assert!(queryable(&store, "foo:a")?);

    store.delete([Quad::a(foo("a"), "nie:InformationElement")])?;
    assert!(queryable(&store, "foo:a")?);

    store.delete([Quad::a(foo("a"), "rdfs:Resource")])?;
    assert!(!queryable(&store, "foo:a")?);
    Ok(())
}

#[test]
fn references_keep_objects_alive_across_reopen() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("ledger.db");
    let mut store = open(&path)?;

    // c is asserted on its own as well as referenced.
    store.insert([Quad::a(foo("c"), "nie:DataObject")])?;
    for _ in 0..10 {
        store.insert(described_a())?;
    }
    store = reopen(store, &path)?;
    for name in ["foo:a", "foo:b", "foo:c"] {
        assert!(queryable(&store, name)?, "{name} should be queryable");
    }

    for _ in 0..10 {
        store.delete([Quad::new(foo("a"), "nco:publisher", foo("b"))])?;
    }
    store = reopen(store, &path)?;
    assert!(queryable(&store, "foo:a")?);
    assert!(!queryable(&store, "foo:b")?);
    assert!(queryable(&store, "foo:c")?);

    store.delete([Quad::a(foo("a"), "rdfs:Resource")])?;
    store = reopen(store, &path)?;
    assert!(!queryable(&store, "foo:a")?);
    assert!(!queryable(&store, "foo:b")?);
    assert!(queryable(&store, "foo:c")?);

    store.delete([
        Quad::a(foo("b"), "rdfs:Resource"),
        Quad::a(foo("c"), "rdfs:Resource"),
    ])?;
    assert!(!queryable(&store, "foo:c")?);
    store.close()
}

#[test]
fn insert_or_replace_releases_previous_objects() -> Result<()> {
    let dir = tempdir()?;
    let store = open(&dir.path().join("ledger.db"))?;
    store.insert(described_a())?;

    store.insert_or_replace([
        Quad::a(foo("a"), "nie:InformationElement"),
        Quad::new(foo("a"), "nco:publisher", foo("d")),
        Quad::new(foo("a"), "nie:rootElementOf", foo("e")),
    ])?;

    assert!(queryable(&store, "foo:a")?);
    assert!(!queryable(&store, "foo:b")?);
    assert!(!queryable(&store, "foo:c")?);
    assert!(queryable(&store, "foo:d")?);
    assert!(queryable(&store, "foo:e")?);
    Ok(())
}

#[test]
fn recreated_resource_does_not_resurrect_old_values() -> Result<()> {
    let dir = tempdir()?;
    let store = open(&dir.path().join("ledger.db"))?;
    store.insert([
        Quad::a(foo("a"), "nie:InformationElement"),
        Quad::new(foo("a"), "nie:title", Object::literal("first life")),
        Quad::new(foo("a"), "nco:publisher", foo("b")),
    ])?;
    let first = store.resource_id("foo:a")?.expect("a");

    store.delete([Quad::a(foo("a"), "rdfs:Resource")])?;
    assert!(!queryable(&store, "foo:b")?);

    store.insert([Quad::a(foo("a"), "nie:InformationElement")])?;
    let second = store.resource_id("foo:a")?.expect("a again");
    assert_ne!(first, second, "identifiers are never reused");

    let read = store.read()?;
    assert!(read.values("foo:a", "nie:title")?.is_empty());
    assert!(read.values("foo:a", "nco:publisher")?.is_empty());
    Ok(())
}

#[test]
fn deleting_absent_references_leaves_counts_alone() -> Result<()> {
    let store = common::memory()?;
    store.insert([
        Quad::a(foo("a"), "nie:InformationElement"),
        Quad::a(foo("z"), "nie:InformationElement"),
        Quad::new(foo("a"), "nco:publisher", foo("b")),
    ])?;
    let b = store.resource_id("foo:b")?.expect("b");

    let summary = store.delete([
        Quad::new(foo("z"), "nco:publisher", foo("b")),
        Quad::new(foo("nobody"), "nco:publisher", foo("b")),
        Quad::new(foo("a"), "nco:publisher", foo("b")).in_graph("urn:graph:unknown"),
    ])?;
    assert_eq!(summary.deleted, 0);
    assert_eq!(summary.unchanged, 3);
    assert_eq!(store.read()?.reference_count(b)?, 1);
    Ok(())
}

#[test]
fn duplicate_references_count_once() -> Result<()> {
    let store = common::memory()?;
    let batch = UpdateBatch::new()
        .insert(described_a())
        .insert(described_a());
    store.update(&batch)?;
    store.insert(described_a())?;

    let read = store.read()?;
    let b = read.resource_id("foo:b")?.expect("b");
    assert_eq!(read.reference_count(b)?, 1);
    Ok(())
}

#[test]
fn subproperty_values_count_once() -> Result<()> {
    let store = common::memory()?;
    store.insert([
        Quad::a(foo("a"), "nie:InformationElement"),
        Quad::new(foo("a"), "nco:creator", foo("b")),
    ])?;
    let read = store.read()?;
    let b = read.resource_id("foo:b")?.expect("b");
    assert_eq!(read.reference_count(b)?, 1);
    assert!(read.values("foo:a", "nco:contributor")?.is_empty());
    assert_eq!(read.values_with_subproperties("foo:a", "nco:contributor")?.len(), 1);
    Ok(())
}

#[test]
fn reclamation_follows_reference_chains() -> Result<()> {
    let store = common::memory()?;
    store.insert([
        Quad::a(foo("a"), "nie:InformationElement"),
        Quad::new(foo("a"), "nie:rootElementOf", foo("b")),
        Quad::a(foo("b"), "nie:InformationElement").in_graph("urn:graph:1"),
        Quad::new(foo("b"), "nie:rootElementOf", foo("c")),
    ])?;

    // b loses its only assertion, and its default-graph data goes with it.
    let summary = store.delete([Quad::a(foo("b"), "rdfs:Resource").in_graph("urn:graph:1")])?;
    assert_eq!(summary.reclaimed, 1);
    assert!(queryable(&store, "foo:b")?, "still referenced by a");
    assert!(!queryable(&store, "foo:c")?);

    let summary = store.delete([Quad::a(foo("a"), "rdfs:Resource")])?;
    assert_eq!(summary.reclaimed, 2);
    for name in ["foo:a", "foo:b", "foo:c"] {
        assert!(!queryable(&store, name)?, "{name} should be reclaimed");
    }
    assert!(queryable(&store, "urn:graph:1")?, "graphs are pinned");
    Ok(())
}

#[test]
fn deferred_sweep_runs_on_reopen() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("deferred.db");
    let config = StoreConfig {
        sweep: SweepPolicy::Deferred,
        ..StoreConfig::ephemeral()
    };
    let mut store = open_with(&path, config)?;
    store.insert(described_a())?;
    store.delete([Quad::new(foo("a"), "nco:publisher", foo("b"))])?;
    assert!(queryable(&store, "foo:b")?, "reclamation is deferred");

    store = reopen(store, &path)?;
    assert!(!queryable(&store, "foo:b")?);
    assert!(queryable(&store, "foo:c")?);
    store.close()
}
