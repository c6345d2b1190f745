use cupboard::{
    Config, Crumb, CrumbState, Cupboard, CupboardError, Filter, Link, LinkType, Metadata,
    Property, Table, Trail, ValueType,
};
use serde_json::json;
use std::path::Path;
use tempfile::tempdir;

fn attach(dir: &Path) -> Cupboard {
    Cupboard::open(Config::sqlite(dir)).unwrap()
}

fn property_id(cupboard: &Cupboard, name: &str) -> String {
    let properties = cupboard.get_table("properties").unwrap();
    let found: Vec<Property> = properties
        .fetch_as(&Filter::new().with("name", name))
        .unwrap();
    assert_eq!(found.len(), 1, "property {} not seeded", name);
    found[0].id.clone()
}

fn category_id(cupboard: &Cupboard, property: &str, category: &str) -> String {
    let property: Property = cupboard
        .get_table("properties")
        .unwrap()
        .get_as(&property_id(cupboard, property))
        .unwrap();
    let categories = cupboard.get_table("categories").unwrap();
    property
        .get_categories(&categories)
        .unwrap()
        .into_iter()
        .find(|c| c.name == category)
        .unwrap()
        .id
}

fn count(table: &Table) -> usize {
    table.fetch(&Filter::new()).unwrap().len()
}

#[test]
fn test_fix_bug_scenario() {
    let tmp = tempdir().unwrap();
    let cupboard = attach(tmp.path());
    let crumbs = cupboard.get_table("crumbs").unwrap();

    let crumb = Crumb::new("Fix bug");
    assert_eq!(crumb.state, CrumbState::Draft);

    let id = crumbs.set("", crumb).unwrap();
    assert_eq!(id.len(), 26);
    assert!(cupboard::core::time::is_valid_id(&id));

    let stored: Crumb = crumbs.get_as(&id).unwrap();
    assert_eq!(stored.state.as_str(), "draft");
    assert_eq!(stored.name, "Fix bug");
}

#[test]
fn test_round_trip_preserves_fields() {
    let tmp = tempdir().unwrap();
    let cupboard = attach(tmp.path());
    let crumbs = cupboard.get_table("crumbs").unwrap();

    let mut crumb = Crumb::new("Write docs");
    crumb.set_state("ready").unwrap();
    crumb.set_property(property_id(&cupboard, "owner"), json!("ana"));
    crumb.set_property(property_id(&cupboard, "labels"), json!(["docs", "easy"]));
    crumb.set_property(
        property_id(&cupboard, "priority"),
        json!(category_id(&cupboard, "priority", "high")),
    );

    let id = crumbs.set("", crumb.clone()).unwrap();
    let stored: Crumb = crumbs.get_as(&id).unwrap();
    assert_eq!(stored.id, id);

    let mut expected = crumb;
    expected.id = id;
    assert_eq!(stored, expected);
}

#[test]
fn test_set_with_id_updates_or_creates() {
    let tmp = tempdir().unwrap();
    let cupboard = attach(tmp.path());
    let crumbs = cupboard.get_table("crumbs").unwrap();

    let id = crumbs.set("", Crumb::new("first")).unwrap();
    let mut crumb: Crumb = crumbs.get_as(&id).unwrap();
    crumb.name = "renamed".to_string();
    assert_eq!(crumbs.set(&id, crumb).unwrap(), id);
    assert_eq!(crumbs.get_as::<Crumb>(&id).unwrap().name, "renamed");

    let chosen = crumbs.set("my-own-id", Crumb::new("upserted")).unwrap();
    assert_eq!(chosen, "my-own-id");
    assert_eq!(crumbs.get_as::<Crumb>("my-own-id").unwrap().name, "upserted");
    assert_eq!(count(&crumbs), 2);
}

#[test]
fn test_fail_from_draft_is_rejected() {
    let tmp = tempdir().unwrap();
    let cupboard = attach(tmp.path());
    let crumbs = cupboard.get_table("crumbs").unwrap();
    let id = crumbs.set("", Crumb::new("Fix bug")).unwrap();

    let mut crumb: Crumb = crumbs.get_as(&id).unwrap();
    let err = crumb.fail().unwrap_err();
    assert!(matches!(err, CupboardError::InvalidTransition(_)));
    assert_eq!(crumb.state, CrumbState::Draft);
    assert_eq!(crumbs.get_as::<Crumb>(&id).unwrap().state, CrumbState::Draft);
}

#[test]
fn test_take_then_complete_persists() {
    let tmp = tempdir().unwrap();
    let cupboard = attach(tmp.path());
    let crumbs = cupboard.get_table("crumbs").unwrap();
    let id = crumbs.set("", Crumb::new("Fix bug")).unwrap();

    let mut crumb: Crumb = crumbs.get_as(&id).unwrap();
    let created = crumb.updated_at;
    crumb.set_state("taken").unwrap();
    crumb.complete().unwrap();
    crumbs.set(&id, crumb).unwrap();

    let stored: Crumb = crumbs.get_as(&id).unwrap();
    assert_eq!(stored.state, CrumbState::Completed);
    assert!(stored.updated_at > created);
}

#[test]
fn test_delete_cascades_to_dependents() {
    let tmp = tempdir().unwrap();
    let cupboard = attach(tmp.path());
    let crumbs = cupboard.get_table("crumbs").unwrap();
    let trails = cupboard.get_table("trails").unwrap();
    let metadata = cupboard.get_table("metadata").unwrap();
    let links = cupboard.get_table("links").unwrap();

    let mut crumb = Crumb::new("doomed");
    crumb.set_property(property_id(&cupboard, "owner"), json!("ana"));
    let doomed = crumbs.set("", crumb).unwrap();
    let parent = crumbs.set("", Crumb::new("parent")).unwrap();
    let child = crumbs.set("", Crumb::new("child")).unwrap();
    let trail = trails.set("", Trail::new()).unwrap();

    metadata.set("", Metadata::comment(&doomed, "first")).unwrap();
    metadata.set("", Metadata::comment(&doomed, "second")).unwrap();
    let kept_note = metadata.set("", Metadata::comment(&parent, "kept")).unwrap();

    links.set("", Link::belongs_to(&doomed, &trail)).unwrap();
    links
        .set("", Link::new(LinkType::ChildOf, &doomed, &parent))
        .unwrap();
    links
        .set("", Link::new(LinkType::ChildOf, &child, &doomed))
        .unwrap();
    let kept_link = links
        .set("", Link::new(LinkType::ChildOf, &child, &parent))
        .unwrap();

    crumbs.delete(&doomed).unwrap();

    assert!(matches!(
        crumbs.get(&doomed),
        Err(CupboardError::NotFound { .. })
    ));
    let notes: Vec<Metadata> = metadata.fetch_as(&Filter::new()).unwrap();
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].id, kept_note);
    let remaining: Vec<Link> = links.fetch_as(&Filter::new()).unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].id, kept_link);
    assert!(
        remaining
            .iter()
            .all(|l| l.from_id != doomed && l.to_id != doomed)
    );

    // The property value went with the crumb.
    let owner = property_id(&cupboard, "owner");
    assert!(
        crumbs
            .fetch(&Filter::new().with(owner.as_str(), "ana"))
            .unwrap()
            .is_empty()
    );
}

#[test]
fn test_fetch_counts_and_filters() {
    let tmp = tempdir().unwrap();
    let cupboard = attach(tmp.path());
    let crumbs = cupboard.get_table("crumbs").unwrap();
    let priority = property_id(&cupboard, "priority");
    let high = category_id(&cupboard, "priority", "high");

    let mut ids = Vec::new();
    for (name, state) in [("a", "draft"), ("b", "ready"), ("c", "ready"), ("d", "taken")] {
        let mut crumb = Crumb::new(name);
        crumb.set_state(state).unwrap();
        if name != "d" {
            crumb.set_property(&priority, json!(high.as_str()));
        }
        ids.push(crumbs.set("", crumb).unwrap());
    }

    let all = crumbs.fetch(&Filter::new()).unwrap();
    assert_eq!(all.len(), 4);
    let all_ids: Vec<&str> = all.iter().map(|e| e.id()).collect();
    assert_eq!(all_ids, ids.iter().map(String::as_str).collect::<Vec<_>>());

    let ready: Vec<Crumb> = crumbs
        .fetch_as(&Filter::new().with("state", "ready"))
        .unwrap();
    assert_eq!(ready.len(), 2);
    assert!(ready.iter().all(|c| c.state == CrumbState::Ready));

    let urgent_ready: Vec<Crumb> = crumbs
        .fetch_as(
            &Filter::new()
                .with("state", "ready")
                .with(priority.as_str(), high.as_str()),
        )
        .unwrap();
    assert_eq!(urgent_ready.len(), 2);

    let urgent: Vec<Crumb> = crumbs
        .fetch_as(&Filter::new().with(priority.as_str(), high.as_str()))
        .unwrap();
    assert_eq!(urgent.len(), 3);

    let none = crumbs
        .fetch(&Filter::new().with("state", "archived"))
        .unwrap();
    assert!(none.is_empty());
}

#[test]
fn test_fetch_rejects_malformed_filters() {
    let tmp = tempdir().unwrap();
    let cupboard = attach(tmp.path());
    let crumbs = cupboard.get_table("crumbs").unwrap();
    for value in [json!(null), json!(["ready"]), json!({"state": "ready"})] {
        assert!(matches!(
            crumbs.fetch(&Filter::new().with("state", value)),
            Err(CupboardError::InvalidFilter(_))
        ));
    }
}

#[test]
fn test_id_errors() {
    let tmp = tempdir().unwrap();
    let cupboard = attach(tmp.path());
    let crumbs = cupboard.get_table("crumbs").unwrap();
    assert!(matches!(crumbs.get(""), Err(CupboardError::InvalidId(_))));
    assert!(matches!(crumbs.delete(""), Err(CupboardError::InvalidId(_))));
    assert!(matches!(
        crumbs.get("01ARZ3NDEKTSV4RRFFQ69G5FAV"),
        Err(CupboardError::NotFound { .. })
    ));
    assert!(matches!(
        crumbs.delete("01ARZ3NDEKTSV4RRFFQ69G5FAV"),
        Err(CupboardError::NotFound { .. })
    ));
}

#[test]
fn test_wrong_entity_kind_is_rejected() {
    let tmp = tempdir().unwrap();
    let cupboard = attach(tmp.path());
    let crumbs = cupboard.get_table("crumbs").unwrap();
    assert!(matches!(
        crumbs.set("", Trail::new()),
        Err(CupboardError::InvalidData(_))
    ));
    let trails = cupboard.get_table("trails").unwrap();
    let id = trails.set("", Trail::new()).unwrap();
    assert!(matches!(
        trails.get_as::<Crumb>(&id),
        Err(CupboardError::InvalidData(_))
    ));
}

#[test]
fn test_property_values_are_validated() {
    let tmp = tempdir().unwrap();
    let cupboard = attach(tmp.path());
    let crumbs = cupboard.get_table("crumbs").unwrap();

    let mut crumb = Crumb::new("x");
    crumb.set_property("no-such-property", json!("v"));
    assert!(matches!(
        crumbs.set("", crumb),
        Err(CupboardError::PropertyNotFound(_))
    ));

    let mut crumb = Crumb::new("x");
    crumb.set_property(property_id(&cupboard, "labels"), json!("not-a-list"));
    assert!(matches!(
        crumbs.set("", crumb),
        Err(CupboardError::TypeMismatch(_))
    ));

    let mut crumb = Crumb::new("x");
    crumb.set_property(property_id(&cupboard, "priority"), json!("urgent"));
    assert!(matches!(
        crumbs.set("", crumb),
        Err(CupboardError::InvalidCategory(_))
    ));

    // A category of another property does not count.
    let mut crumb = Crumb::new("x");
    crumb.set_property(
        property_id(&cupboard, "priority"),
        json!(category_id(&cupboard, "type", "bug")),
    );
    assert!(matches!(
        crumbs.set("", crumb),
        Err(CupboardError::InvalidCategory(_))
    ));

    assert!(matches!(
        crumbs.set("", Crumb::new("  ")),
        Err(CupboardError::InvalidName(_))
    ));
    assert_eq!(count(&crumbs), 0);
}

#[test]
fn test_custom_property_types() {
    let tmp = tempdir().unwrap();
    let cupboard = attach(tmp.path());
    let properties = cupboard.get_table("properties").unwrap();
    let crumbs = cupboard.get_table("crumbs").unwrap();

    let estimate = properties
        .set("", Property::new("estimate", ValueType::Integer))
        .unwrap();
    let blocked = properties
        .set("", Property::new("blocked", ValueType::Boolean))
        .unwrap();
    let due = properties
        .set("", Property::new("due", ValueType::Timestamp))
        .unwrap();

    let mut crumb = Crumb::new("typed");
    crumb.set_property(&estimate, json!(3));
    crumb.set_property(&blocked, json!(false));
    crumb.set_property(&due, json!("2026-11-01T09:00:00Z"));
    let id = crumbs.set("", crumb).unwrap();

    let stored: Crumb = crumbs.get_as(&id).unwrap();
    assert_eq!(stored.get_property(&estimate).unwrap(), &json!(3));
    assert_eq!(stored.get_property(&blocked).unwrap(), &json!(false));

    let found: Vec<Crumb> = crumbs
        .fetch_as(&Filter::new().with(estimate.as_str(), 3))
        .unwrap();
    assert_eq!(found.len(), 1);
    let found: Vec<Crumb> = crumbs
        .fetch_as(&Filter::new().with(blocked.as_str(), true))
        .unwrap();
    assert!(found.is_empty());
}

#[test]
fn test_metadata_rules() {
    let tmp = tempdir().unwrap();
    let cupboard = attach(tmp.path());
    let crumbs = cupboard.get_table("crumbs").unwrap();
    let metadata = cupboard.get_table("metadata").unwrap();
    let crumb = crumbs.set("", Crumb::new("annotated")).unwrap();

    assert!(matches!(
        metadata.set("", Metadata::comment("missing-crumb", "hello")),
        Err(CupboardError::NotFound { .. })
    ));
    assert!(matches!(
        metadata.set("", Metadata::new(&crumb, "reviews", "hello")),
        Err(CupboardError::SchemaNotFound(_))
    ));
    assert!(matches!(
        metadata.set("", Metadata::comment(&crumb, "   ")),
        Err(CupboardError::InvalidContent(_))
    ));

    let note_id = metadata.set("", Metadata::comment(&crumb, "hello")).unwrap();
    let mut note: Metadata = metadata.get_as(&note_id).unwrap();
    // Re-storing the identical row is harmless; editing it is not.
    metadata.set(&note_id, note.clone()).unwrap();
    note.content = "edited".to_string();
    assert!(matches!(
        metadata.set(&note_id, note),
        Err(CupboardError::InvalidData(_))
    ));

    let notes: Vec<Metadata> = metadata
        .fetch_as(&Filter::new().with("crumb_id", crumb.as_str()))
        .unwrap();
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].content, "hello");
}
