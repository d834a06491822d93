#![allow(missing_docs)]

mod common;

use std::collections::BTreeMap;

use tinystore::{
    best_index, Column, Constraint, ConstraintOp, DataType, GraphId, Match, Object, Quad,
    ReadSession, Result, Store, StoreConfig, StoreError, Term, TriplePattern, TripleRow,
};

fn foo(name: &str) -> Term {
    Term::iri(format!("foo:{name}"))
}

fn populate(store: &Store) -> Result<()> {
    store.insert([
        Quad::a(foo("alice"), "nco:Contact"),
        Quad::new(foo("alice"), "nco:fullname", Object::literal("Alice")),
        Quad::a(foo("doc"), "nfo:Document"),
        Quad::new(foo("doc"), "nie:title", Object::literal("Report")),
        Quad::new(foo("doc"), "nfo:pageCount", Object::literal(12i64)),
        Quad::new(foo("doc"), "nfo:encrypted", Object::literal(true)),
        Quad::new(
            foo("doc"),
            "nie:contentCreated",
            Object::literal("2023-05-01T10:20:30Z"),
        ),
        Quad::new(
            foo("doc"),
            "nie:informationElementDate",
            Object::literal("2023-05-01"),
        ),
        Quad::new(foo("doc"), "nie:generator", Object::literal("tool 1.0")),
        Quad::new(foo("doc"), "nco:publisher", foo("alice")),
        Quad::new(foo("doc"), "nie:keyword", Object::literal("draft")).in_graph("urn:graph:1"),
        Quad::a(foo("memo"), "nie:InformationElement"),
        Quad::new(foo("memo"), "nco:publisher", foo("alice")),
        Quad::new(foo("memo"), "nco:publisher", foo("bob")),
        Quad::new(foo("memo"), "nie:keyword", Object::literal("internal")).in_graph("urn:graph:2"),
    ])?;
    Ok(())
}

fn rows(read: &ReadSession<'_>, pattern: TriplePattern) -> Result<Vec<TripleRow>> {
    read.triples(&pattern)?.collect()
}

fn sorted_objects(rows: &[TripleRow]) -> Vec<String> {
    let mut objects: Vec<String> = rows.iter().map(|row| row.object.clone()).collect();
    objects.sort();
    objects
}

fn id(read: &ReadSession<'_>, uri: &str) -> Result<i64> {
    Ok(read.resource_id(uri)?.expect("resource").0)
}

#[test]
fn predicate_scan_returns_exactly_that_table() -> Result<()> {
    let store = common::memory()?;
    populate(&store)?;
    let read = store.read()?;
    let publisher = read.predicate_id("nco:publisher")?;

    let found = rows(&read, TriplePattern::new().predicate(publisher))?;
    assert_eq!(found.len(), 3);
    assert!(found.iter().all(|row| row.predicate == publisher));
    assert!(found.iter().all(|row| row.graph.is_none()));
    assert_eq!(
        sorted_objects(&found),
        vec!["foo:alice", "foo:alice", "foo:bob"]
    );
    Ok(())
}

#[test]
fn object_and_rowid_constraints_fail_at_plan_time() {
    for column in [Column::Object, Column::RowId] {
        let err = best_index(&[
            Constraint::new(Column::Predicate, ConstraintOp::Eq),
            Constraint::new(column, ConstraintOp::Eq),
        ])
        .expect_err("rejected");
        assert!(matches!(err, StoreError::UnsupportedConstraint { column: c, .. } if c == column));
    }
    let err = TriplePattern::new()
        .with(Column::Object, Match::IsNull)
        .plan()
        .expect_err("rejected");
    assert!(matches!(err, StoreError::UnsupportedConstraint { .. }));
    assert!(best_index(&[Constraint::new(Column::Subject, ConstraintOp::Like)]).is_err());
}

#[test]
fn objects_render_canonically_per_datatype() -> Result<()> {
    let store = common::memory()?;
    populate(&store)?;
    let read = store.read()?;
    let doc = read.resource_id("foo:doc")?.expect("doc");

    let mut by_predicate = BTreeMap::new();
    for row in rows(&read, TriplePattern::new().subject(doc))? {
        let name = read.uri_of(row.predicate)?.expect("predicate uri");
        by_predicate
            .entry(store.ontology().namespaces().compact(&name))
            .or_insert_with(Vec::new)
            .push(row.object);
    }
    let single = |name: &str| by_predicate.get(name).map(|v| v.join(","));

    assert_eq!(single("nie:title").as_deref(), Some("Report"));
    assert_eq!(single("nfo:pageCount").as_deref(), Some("12"));
    assert_eq!(single("nfo:encrypted").as_deref(), Some("true"));
    assert_eq!(
        single("nie:contentCreated").as_deref(),
        Some("2023-05-01T10:20:30Z")
    );
    assert_eq!(
        single("nie:informationElementDate").as_deref(),
        Some("2023-05-01")
    );
    assert_eq!(single("nco:publisher").as_deref(), Some("foo:alice"));
    assert_eq!(single("nie:keyword").as_deref(), Some("draft"));
    assert_eq!(single("nie:generator"), None, "unbound values are not surfaced");

    let mut types = by_predicate.get("rdf:type").cloned().expect("types");
    types.sort();
    let ontology = store.ontology();
    let mut expected: Vec<String> = ["nfo:Document", "nie:InformationElement", "rdfs:Resource"]
        .iter()
        .map(|name| ontology.class(name).expect("class").uri().to_string())
        .collect();
    expected.sort();
    assert_eq!(types, expected);
    Ok(())
}

#[test]
fn graph_filters_translate_null_and_negation() -> Result<()> {
    let store = common::memory()?;
    populate(&store)?;
    let read = store.read()?;
    let keyword = read.predicate_id("nie:keyword")?;
    let g1 = GraphId(id(&read, "urn:graph:1")?);

    let in_g1 = rows(&read, TriplePattern::new().predicate(keyword).graph(Some(g1)))?;
    assert_eq!(sorted_objects(&in_g1), vec!["draft"]);
    assert!(in_g1.iter().all(|row| row.graph == Some(g1)));

    let default_graph = rows(&read, TriplePattern::new().predicate(keyword).graph(None))?;
    assert!(default_graph.is_empty());

    let named = rows(
        &read,
        TriplePattern::new()
            .predicate(keyword)
            .with(Column::Graph, Match::IsNotNull),
    )?;
    assert_eq!(sorted_objects(&named), vec!["draft", "internal"]);

    // `!=` never matches the default graph.
    let not_g1 = rows(
        &read,
        TriplePattern::new().with(Column::Graph, Match::Ne(g1.0)),
    )?;
    assert_eq!(sorted_objects(&not_g1), vec!["internal"]);
    Ok(())
}

#[test]
fn negated_subject_and_predicate_filters() -> Result<()> {
    let store = common::memory()?;
    populate(&store)?;
    let read = store.read()?;
    let publisher = read.predicate_id("nco:publisher")?;
    let rdf_type = read.predicate_id("rdf:type")?;
    let doc = id(&read, "foo:doc")?;
    let alice = id(&read, "foo:alice")?;

    let others = rows(
        &read,
        TriplePattern::new()
            .predicate(publisher)
            .with(Column::Subject, Match::Ne(doc)),
    )?;
    assert_eq!(sorted_objects(&others), vec!["foo:alice", "foo:bob"]);

    let untyped = rows(
        &read,
        TriplePattern::new()
            .with(Column::Predicate, Match::Ne(rdf_type.0))
            .with(Column::Subject, Match::Eq(alice)),
    )?;
    assert_eq!(sorted_objects(&untyped), vec!["Alice"]);

    // Two predicate equalities can only both hold for the same property.
    let contradictory = rows(
        &read,
        TriplePattern::new().predicate(publisher).predicate(rdf_type),
    )?;
    assert!(contradictory.is_empty());
    Ok(())
}

#[test]
fn cursor_visits_only_selected_tables() -> Result<()> {
    let store = common::memory()?;
    populate(&store)?;
    let read = store.read()?;
    let publisher = read.predicate_id("nco:publisher")?;

    let single = read.triples(&TriplePattern::new().predicate(publisher))?;
    assert_eq!(single.table_count(), 1);
    single.close();

    let surfaced = store
        .ontology()
        .properties()
        .iter()
        .filter(|p| p.data_type() != DataType::Unbound)
        .count();
    let all = read.triples(&TriplePattern::new())?;
    assert_eq!(all.table_count(), surfaced);

    let except = read.triples(&TriplePattern::new().with(Column::Predicate, Match::Ne(publisher.0)))?;
    assert_eq!(except.table_count(), surfaced - 1);
    Ok(())
}

#[test]
fn small_pages_yield_the_same_rows_with_dense_rowids() -> Result<()> {
    common::init_tracing();
    let paged = Store::open_in_memory(
        common::ontology(),
        StoreConfig {
            scan_batch_size: 1,
            ..StoreConfig::ephemeral()
        },
    )?;
    let reference = common::memory()?;
    populate(&paged)?;
    populate(&reference)?;

    let paged_rows = rows(&paged.read()?, TriplePattern::new())?;
    let reference_rows = rows(&reference.read()?, TriplePattern::new())?;
    assert_eq!(sorted_objects(&paged_rows), sorted_objects(&reference_rows));

    let rowids: Vec<i64> = paged_rows.iter().map(|row| row.rowid).collect();
    let expected: Vec<i64> = (1..=paged_rows.len() as i64).collect();
    assert_eq!(rowids, expected);
    Ok(())
}

#[test]
fn cursors_can_be_abandoned_early() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let store = common::open(&dir.path().join("triples.db"))?;
    populate(&store)?;
    {
        let read = store.read()?;
        let mut cursor = read.triples(&TriplePattern::new())?;
        let first = cursor.next().expect("a row")?;
        assert_eq!(first.rowid, 1);
        cursor.close();
    }
    store.delete([Quad::new(foo("memo"), "nco:publisher", foo("bob"))])?;

    let read = store.read()?;
    let publisher = read.predicate_id("nco:publisher")?;
    let found = rows(&read, TriplePattern::new().predicate(publisher))?;
    assert_eq!(sorted_objects(&found), vec!["foo:alice", "foo:alice"]);
    assert_eq!(read.resource_id("foo:bob")?, None);
    Ok(())
}

#[test]
fn arguments_must_match_the_plan() -> Result<()> {
    let store = common::memory()?;
    let read = store.read()?;
    let info = best_index(&[Constraint::new(Column::Subject, ConstraintOp::Eq)])?;
    assert_eq!(info.plan.arg_count(), 1);
    let err = read.scan(&info.plan, &[]).err().expect("rejected");
    assert!(matches!(err, StoreError::InvalidArgument(_)));
    Ok(())
}

#[test]
fn cheaper_plans_for_tighter_constraints() -> Result<()> {
    let full = best_index(&[])?;
    let by_graph = best_index(&[Constraint::new(Column::Graph, ConstraintOp::Eq)])?;
    let by_predicate = best_index(&[Constraint::new(Column::Predicate, ConstraintOp::Eq)])?;
    let by_subject = best_index(&[Constraint::new(Column::Subject, ConstraintOp::Eq)])?;
    let negated = best_index(&[Constraint::new(Column::Subject, ConstraintOp::Ne)])?;

    assert!(by_graph.plan.estimated_cost() < full.plan.estimated_cost());
    assert!(by_predicate.plan.estimated_cost() < by_graph.plan.estimated_cost());
    assert!(by_subject.plan.estimated_cost() < by_predicate.plan.estimated_cost());
    assert_eq!(negated.plan.estimated_cost(), full.plan.estimated_cost());
    Ok(())
}
