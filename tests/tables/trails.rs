use cupboard::graph::{add_to_trail, crumb_trail, remove_from_trail, scope_stash, trail_crumbs};
use cupboard::{
    Config, Crumb, Cupboard, CupboardError, Filter, Link, Metadata, Stash, Trail, TrailState,
};
use std::path::Path;
use tempfile::tempdir;

fn attach(dir: &Path) -> Cupboard {
    Cupboard::open(Config::sqlite(dir)).unwrap()
}

fn active_trail(cupboard: &Cupboard) -> String {
    let mut trail = Trail::new();
    trail.set_state("active").unwrap();
    cupboard.get_table("trails").unwrap().set("", trail).unwrap()
}

#[test]
fn test_complete_makes_members_permanent() {
    let tmp = tempdir().unwrap();
    let cupboard = attach(tmp.path());
    let trails = cupboard.get_table("trails").unwrap();
    let crumbs = cupboard.get_table("crumbs").unwrap();
    let links = cupboard.get_table("links").unwrap();

    let trail_id = active_trail(&cupboard);
    let a = crumbs.set("", Crumb::new("a")).unwrap();
    let b = crumbs.set("", Crumb::new("b")).unwrap();
    add_to_trail(&links, &a, &trail_id).unwrap();
    add_to_trail(&links, &b, &trail_id).unwrap();
    assert_eq!(trail_crumbs(&links, &crumbs, &trail_id).unwrap().len(), 2);

    let mut trail: Trail = trails.get_as(&trail_id).unwrap();
    trail.complete().unwrap();
    assert!(trail.completed_at.is_some());
    trails.set(&trail_id, trail).unwrap();

    let stored: Trail = trails.get_as(&trail_id).unwrap();
    assert_eq!(stored.state, TrailState::Completed);
    assert!(stored.completed_at.is_some());
    assert!(links.fetch(&Filter::new()).unwrap().is_empty());
    assert_eq!(crumbs.fetch(&Filter::new()).unwrap().len(), 2);
    assert_eq!(crumb_trail(&links, &a).unwrap(), None);
}

#[test]
fn test_abandon_deletes_members() {
    let tmp = tempdir().unwrap();
    let cupboard = attach(tmp.path());
    let trails = cupboard.get_table("trails").unwrap();
    let crumbs = cupboard.get_table("crumbs").unwrap();
    let links = cupboard.get_table("links").unwrap();
    let metadata = cupboard.get_table("metadata").unwrap();

    let trail_id = active_trail(&cupboard);
    let member = crumbs.set("", Crumb::new("member")).unwrap();
    let outsider = crumbs.set("", Crumb::new("outsider")).unwrap();
    add_to_trail(&links, &member, &trail_id).unwrap();
    metadata
        .set("", Metadata::comment(&member, "exploring"))
        .unwrap();

    let mut trail: Trail = trails.get_as(&trail_id).unwrap();
    trail.abandon().unwrap();
    trails.set(&trail_id, trail).unwrap();

    assert!(matches!(
        crumbs.get(&member),
        Err(CupboardError::NotFound { .. })
    ));
    assert!(crumbs.get(&outsider).is_ok());
    assert!(metadata.fetch(&Filter::new()).unwrap().is_empty());
    assert!(links.fetch(&Filter::new()).unwrap().is_empty());
    assert_eq!(
        trails.get_as::<Trail>(&trail_id).unwrap().state,
        TrailState::Abandoned
    );
}

#[test]
fn test_complete_and_abandon_require_active() {
    let mut trail = Trail::new();
    assert!(matches!(trail.complete(), Err(CupboardError::InvalidState(_))));
    assert!(matches!(trail.abandon(), Err(CupboardError::InvalidState(_))));
    assert_eq!(trail.state, TrailState::Draft);
    assert!(trail.completed_at.is_none());

    trail.set_state("pending").unwrap();
    assert!(matches!(trail.complete(), Err(CupboardError::InvalidState(_))));
}

#[test]
fn test_finished_trail_cannot_reopen() {
    let tmp = tempdir().unwrap();
    let cupboard = attach(tmp.path());
    let trails = cupboard.get_table("trails").unwrap();
    let trail_id = active_trail(&cupboard);

    let mut trail: Trail = trails.get_as(&trail_id).unwrap();
    trail.complete().unwrap();
    trails.set(&trail_id, trail).unwrap();

    let mut trail: Trail = trails.get_as(&trail_id).unwrap();
    assert!(matches!(
        trail.set_state("active"),
        Err(CupboardError::InvalidTransition(_))
    ));

    // Bypassing the entity methods is caught at Set.
    trail.state = TrailState::Active;
    assert!(matches!(
        trails.set(&trail_id, trail),
        Err(CupboardError::InvalidTransition(_))
    ));
    assert_eq!(
        trails.get_as::<Trail>(&trail_id).unwrap().state,
        TrailState::Completed
    );
}

#[test]
fn test_membership_rules() {
    let tmp = tempdir().unwrap();
    let cupboard = attach(tmp.path());
    let crumbs = cupboard.get_table("crumbs").unwrap();
    let links = cupboard.get_table("links").unwrap();
    let first = active_trail(&cupboard);
    let second = active_trail(&cupboard);
    let crumb = crumbs.set("", Crumb::new("busy")).unwrap();

    add_to_trail(&links, &crumb, &first).unwrap();
    let err = add_to_trail(&links, &crumb, &second).unwrap_err();
    assert!(matches!(
        err,
        CupboardError::AlreadyInTrail { ref trail, .. } if *trail == first
    ));
    assert_eq!(crumb_trail(&links, &crumb).unwrap(), Some(first.clone()));

    assert!(matches!(
        remove_from_trail(&links, &crumb, &second),
        Err(CupboardError::NotInTrail { .. })
    ));
    remove_from_trail(&links, &crumb, &first).unwrap();
    assert_eq!(crumb_trail(&links, &crumb).unwrap(), None);
    add_to_trail(&links, &crumb, &second).unwrap();
}

#[test]
fn test_delete_trail_keeps_crumbs_and_drops_scoped_stashes() {
    let tmp = tempdir().unwrap();
    let cupboard = attach(tmp.path());
    let trails = cupboard.get_table("trails").unwrap();
    let crumbs = cupboard.get_table("crumbs").unwrap();
    let links = cupboard.get_table("links").unwrap();
    let stashes = cupboard.get_table("stashes").unwrap();

    let trail_id = active_trail(&cupboard);
    let crumb = crumbs.set("", Crumb::new("member")).unwrap();
    add_to_trail(&links, &crumb, &trail_id).unwrap();
    let scoped = stashes.set("", Stash::counter("attempts")).unwrap();
    scope_stash(&links, &scoped, &trail_id).unwrap();
    let global = stashes.set("", Stash::counter("builds")).unwrap();

    trails.delete(&trail_id).unwrap();

    assert!(crumbs.get(&crumb).is_ok());
    assert!(matches!(
        stashes.get(&scoped),
        Err(CupboardError::NotFound { .. })
    ));
    assert!(stashes.get(&global).is_ok());
    assert!(links.fetch_as::<Link>(&Filter::new()).unwrap().is_empty());
}

#[test]
fn test_fetch_trails_by_state() {
    let tmp = tempdir().unwrap();
    let cupboard = attach(tmp.path());
    let trails = cupboard.get_table("trails").unwrap();
    trails.set("", Trail::new()).unwrap();
    active_trail(&cupboard);
    active_trail(&cupboard);

    let active: Vec<Trail> = trails
        .fetch_as(&Filter::new().with("state", "active"))
        .unwrap();
    assert_eq!(active.len(), 2);
    assert!(matches!(
        trails.fetch(&Filter::new().with("colour", "red")),
        Err(CupboardError::InvalidFilter(_))
    ));
}
