#![allow(missing_docs)]

mod common;

use tinystore::{
    Object, Quad, ReadSession, Result, SchemaError, Store, StoreConfig, StoreError, Term,
    TriplePattern, UpdateBatch, Value,
};

fn foo(name: &str) -> Term {
    Term::iri(format!("foo:{name}"))
}

/// Every surfaced row in a stable order, for before/after comparisons.
fn dump(read: &ReadSession<'_>) -> Result<Vec<(Option<i64>, i64, i64, String)>> {
    let mut rows: Vec<_> = read
        .triples(&TriplePattern::new())?
        .map(|row| row.map(|r| (r.graph.map(|g| g.0), r.subject.0, r.predicate.0, r.object)))
        .collect::<Result<_>>()?;
    rows.sort();
    Ok(rows)
}

fn seeded() -> Result<Store> {
    let store = common::memory()?;
    store.insert([
        Quad::a(foo("doc"), "nfo:Document"),
        Quad::new(foo("doc"), "nie:title", Object::literal("Original")),
        Quad::new(foo("doc"), "nco:publisher", foo("alice")),
    ])?;
    Ok(store)
}

fn assert_rejected(store: &Store, batch: UpdateBatch, check: impl Fn(&SchemaError) -> bool) -> Result<()> {
    let before = dump(&store.read()?)?;
    match store.update(&batch) {
        Err(StoreError::Schema(err)) => assert!(check(&err), "unexpected schema error: {err}"),
        other => panic!("expected a schema error, got {other:?}"),
    }
    assert_eq!(dump(&store.read()?)?, before, "a rejected batch must not leave a trace");
    Ok(())
}

#[test]
fn unknown_property_rejects_the_whole_batch() -> Result<()> {
    let store = seeded()?;
    let batch = UpdateBatch::new()
        .insert([
            Quad::a(foo("new"), "nie:InformationElement"),
            Quad::new(foo("doc"), "nie:title", Object::literal("Changed")),
        ])
        .delete([Quad::new(foo("doc"), "nco:publisher", foo("alice"))])
        .insert([Quad::new(foo("doc"), "nie:nonexistent", Object::literal("x"))]);
    assert_rejected(&store, batch, |err| {
        matches!(err, SchemaError::UnknownProperty(name) if name == "nie:nonexistent")
    })?;
    assert!(!common::queryable(&store, "foo:new")?);
    assert!(common::queryable(&store, "foo:alice")?);
    Ok(())
}

#[test]
fn unknown_class_is_rejected() -> Result<()> {
    let store = seeded()?;
    let batch = UpdateBatch::new().insert([Quad::a(foo("doc"), "nfo:Spreadsheet")]);
    assert_rejected(&store, batch, |err| matches!(err, SchemaError::UnknownClass(_)))
}

#[test]
fn datatype_mismatches_are_rejected() -> Result<()> {
    let store = seeded()?;
    assert_rejected(
        &store,
        UpdateBatch::new().insert([Quad::new(foo("doc"), "nie:title", Object::literal(5i64))]),
        |err| matches!(err, SchemaError::DatatypeMismatch { .. }),
    )?;
    assert_rejected(
        &store,
        UpdateBatch::new().insert([Quad::new(foo("doc"), "nie:title", foo("alice"))]),
        |err| matches!(err, SchemaError::DatatypeMismatch { found, .. } if found == "resource"),
    )?;
    assert_rejected(
        &store,
        UpdateBatch::new().insert([Quad::new(
            foo("doc"),
            "nco:publisher",
            Object::literal("alice"),
        )]),
        |err| matches!(err, SchemaError::DatatypeMismatch { .. }),
    )?;
    assert_rejected(
        &store,
        UpdateBatch::new().insert([Quad::new(
            foo("doc"),
            "nfo:pageCount",
            Object::literal("many"),
        )]),
        |err| matches!(err, SchemaError::InvalidLiteral { .. }),
    )?;
    assert_rejected(
        &store,
        UpdateBatch::new().insert([Quad::new(
            foo("doc"),
            "rdf:type",
            Object::literal("nfo:Document"),
        )]),
        |err| matches!(err, SchemaError::LiteralInResourcePosition(_)),
    )
}

#[test]
fn failed_deletes_restore_reference_counts() -> Result<()> {
    let store = seeded()?;
    let alice = store.resource_id("foo:alice")?.expect("alice");
    let batch = UpdateBatch::new()
        .delete([Quad::new(foo("doc"), "nco:publisher", foo("alice"))])
        .insert([Quad::a(foo("doc"), "nie:Unknown")]);
    assert!(store.update(&batch).is_err());
    let read = store.read()?;
    assert_eq!(read.reference_count(alice)?, 1);
    assert_eq!(read.resource_id("foo:alice")?, Some(alice));
    Ok(())
}

#[test]
fn properties_require_their_domain() -> Result<()> {
    let store = common::memory()?;
    let batch = UpdateBatch::new().insert([Quad::new(
        foo("loose"),
        "nie:title",
        Object::literal("No type"),
    )]);
    assert_rejected(&store, batch, |err| {
        matches!(err, SchemaError::DomainViolation { domain, .. } if domain == "nie:InformationElement")
    })?;

    // A subclass instance satisfies the domain of a superclass property.
    store.insert([
        Quad::a(foo("doc"), "nfo:Document"),
        Quad::new(foo("doc"), "nie:title", Object::literal("Typed")),
    ])?;
    // A sibling class does not.
    store.insert([Quad::a(foo("person"), "nco:Contact")])?;
    let batch = UpdateBatch::new().insert([Quad::new(foo("person"), "nfo:pageCount", Object::literal(3i64))]);
    assert_rejected(&store, batch, |err| matches!(err, SchemaError::DomainViolation { .. }))
}

#[test]
fn implicit_create_asserts_the_domain() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let config = StoreConfig {
        implicit_create: true,
        ..StoreConfig::ephemeral()
    };
    let store = common::open_with(&dir.path().join("implicit.db"), config)?;
    let summary = store.insert([Quad::new(
        foo("loose"),
        "nfo:pageCount",
        Object::literal(7i64),
    )])?;
    assert_eq!(summary.resources_created, 1);
    // nfo:Document, nie:InformationElement, rdfs:Resource, then the value.
    assert_eq!(summary.inserted, 4);

    let read = store.read()?;
    assert_eq!(read.values("foo:loose", "nfo:pageCount")?, vec![Value::Integer(7)]);
    let types = read.values("foo:loose", "rdf:type")?;
    assert_eq!(types.len(), 3);
    Ok(())
}

#[test]
fn single_valued_properties_overwrite() -> Result<()> {
    let store = seeded()?;
    let summary = store.insert([Quad::new(foo("doc"), "nie:title", Object::literal("Second"))])?;
    assert_eq!(summary.replaced, 1);
    assert_eq!(summary.inserted, 0);

    let summary = store.insert([Quad::new(foo("doc"), "nie:title", Object::literal("Second"))])?;
    assert_eq!(summary.unchanged, 1);

    let read = store.read()?;
    assert_eq!(
        read.values("foo:doc", "nie:title")?,
        vec![Value::String("Second".into())]
    );
    Ok(())
}

#[test]
fn insert_or_replace_is_scoped_to_named_properties_and_graph() -> Result<()> {
    let store = seeded()?;
    store.insert([
        Quad::new(foo("doc"), "nie:title", Object::literal("Archived")).in_graph("urn:graph:archive"),
        Quad::new(foo("doc"), "nie:keyword", Object::literal("one")),
        Quad::new(foo("doc"), "nie:keyword", Object::literal("two")),
    ])?;

    let summary = store.insert_or_replace([
        Quad::new(foo("doc"), "nie:keyword", Object::literal("three")),
        Quad::new(foo("doc"), "nie:title", Object::literal("Current")),
    ])?;
    assert_eq!(summary.replaced, 3);
    assert_eq!(summary.inserted, 2);

    let read = store.read()?;
    assert_eq!(
        read.values("foo:doc", "nie:keyword")?,
        vec![Value::String("three".into())]
    );
    let mut titles = read.values("foo:doc", "nie:title")?;
    titles.sort_by_key(|v| v.to_string());
    assert_eq!(
        titles,
        vec![Value::String("Archived".into()), Value::String("Current".into())]
    );
    // Untouched properties keep their values and references.
    assert_eq!(read.values("foo:doc", "nco:publisher")?.len(), 1);
    let alice = read.resource_id("foo:alice")?.expect("alice");
    assert_eq!(read.reference_count(alice)?, 1);
    Ok(())
}

#[test]
fn deleting_a_class_clears_its_properties() -> Result<()> {
    let store = seeded()?;
    store.insert([
        Quad::new(foo("doc"), "nfo:pageCount", Object::literal(10i64)),
        Quad::new(foo("doc"), "rdfs:label", Object::literal("kept")),
    ])?;

    let summary = store.delete([Quad::a(foo("doc"), "nie:InformationElement")])?;
    // Document goes with its superclass; alice loses her only reference.
    assert_eq!(summary.reclaimed, 1);

    let read = store.read()?;
    assert!(read.resource_id("foo:doc")?.is_some());
    assert!(read.values("foo:doc", "nie:title")?.is_empty());
    assert!(read.values("foo:doc", "nfo:pageCount")?.is_empty());
    assert!(read.values("foo:doc", "nco:publisher")?.is_empty());
    assert_eq!(
        read.values("foo:doc", "rdfs:label")?,
        vec![Value::String("kept".into())]
    );
    assert_eq!(read.resource_id("foo:alice")?, None);
    Ok(())
}

#[test]
fn blank_nodes_are_scoped_to_one_batch() -> Result<()> {
    let store = common::memory()?;
    let summary = store.insert([
        Quad::a(Term::blank("doc"), "nie:InformationElement"),
        Quad::new(Term::blank("doc"), "nco:publisher", Object::blank("who")),
        Quad::new(Term::blank("doc"), "nco:creator", Object::blank("who")),
    ])?;
    assert_eq!(summary.resources_created, 2);

    let summary = store.insert([Quad::a(Term::blank("doc"), "nie:InformationElement")])?;
    assert_eq!(summary.resources_created, 1, "labels do not carry across batches");

    let read = store.read()?;
    let rows: Vec<_> = read
        .triples(&TriplePattern::new().predicate(read.predicate_id("nco:publisher")?))?
        .collect::<Result<_>>()?;
    assert_eq!(rows.len(), 1);
    assert!(rows[0].object.starts_with("urn:bnode:"));
    let who = read.resource_id(&rows[0].object)?.expect("blank contact");
    assert_eq!(read.reference_count(who)?, 2);
    Ok(())
}

#[test]
fn mixed_batches_apply_in_order() -> Result<()> {
    let store = common::memory()?;
    let batch = UpdateBatch::new()
        .insert([
            Quad::a(foo("doc"), "nie:InformationElement"),
            Quad::new(foo("doc"), "nco:publisher", foo("temp")),
        ])
        .delete([Quad::new(foo("doc"), "nco:publisher", foo("temp"))])
        .insert([Quad::new(foo("doc"), "nco:publisher", foo("kept"))]);
    let summary = store.update(&batch)?;
    assert_eq!(summary.deleted, 1);
    assert_eq!(summary.reclaimed, 1);
    assert!(!common::queryable(&store, "foo:temp")?);
    assert!(common::queryable(&store, "foo:kept")?);
    Ok(())
}

#[test]
fn removing_a_class_from_its_last_graph_clears_values_everywhere() -> Result<()> {
    let store = common::memory()?;
    store.insert([
        Quad::a(foo("a"), "nie:InformationElement").in_graph("urn:g"),
        Quad::new(foo("a"), "nie:title", Object::literal("t")),
        Quad::new(foo("a"), "nco:publisher", foo("alice")),
    ])?;

    let summary = store.delete([Quad::a(foo("a"), "nie:InformationElement").in_graph("urn:g")])?;
    assert_eq!(summary.reclaimed, 1);

    let read = store.read()?;
    assert!(read.values("foo:a", "nie:title")?.is_empty());
    assert!(read.values("foo:a", "nco:publisher")?.is_empty());
    assert_eq!(read.values("foo:a", "rdf:type")?.len(), 1);
    assert_eq!(read.resource_id("foo:alice")?, None);
    Ok(())
}

#[test]
fn class_kept_in_another_graph_keeps_its_values() -> Result<()> {
    let store = common::memory()?;
    store.insert([
        Quad::a(foo("a"), "nie:InformationElement"),
        Quad::a(foo("a"), "nie:InformationElement").in_graph("urn:g"),
        Quad::new(foo("a"), "nie:title", Object::literal("default")),
        Quad::new(foo("a"), "nie:title", Object::literal("scoped")).in_graph("urn:g"),
    ])?;

    store.delete([Quad::a(foo("a"), "nie:InformationElement").in_graph("urn:g")])?;

    let read = store.read()?;
    assert_eq!(
        read.values("foo:a", "nie:title")?,
        vec![Value::String("default".into())]
    );
    Ok(())
}

#[test]
fn prefixed_names_resolve_to_the_same_resource() -> Result<()> {
    let store = seeded()?;
    let contact = store.ontology().class("nco:Contact").expect("class").id();
    let pinned = store.ontology_resources().class(contact);

    let summary = store.insert([Quad::new(foo("doc"), "nco:publisher", Term::iri("nco:Contact"))])?;
    assert_eq!(summary.resources_created, 0);
    assert_eq!(summary.inserted, 1);
    assert_eq!(store.resource_id("nco:Contact")?, Some(pinned));
    assert_eq!(
        store.resource_id("http://tracker.api.gnome.org/ontology/v3/nco#Contact")?,
        Some(pinned)
    );

    let summary = store.delete([Quad::new(
        foo("doc"),
        "nco:publisher",
        Term::iri("http://tracker.api.gnome.org/ontology/v3/nco#Contact"),
    )])?;
    assert_eq!(summary.deleted, 1);
    Ok(())
}
