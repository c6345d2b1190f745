//! Traversal helpers over the links table.
//!
//! Membership and scope live only in `links`; crumbs, trails and stashes
//! carry no reference columns of their own.

use crate::core::error::{CupboardError, Result};
use crate::core::filter::Filter;
use crate::entities::{Crumb, Link, LinkType, TableName};
use crate::table::Table;

fn require_table(table: &Table, name: TableName) -> Result<()> {
    if table.name() != name {
        return Err(CupboardError::InvalidData(format!(
            "expected the {} table, got {}",
            name,
            table.name()
        )));
    }
    Ok(())
}

fn links(links: &Table, link_type: LinkType, field: &str, id: &str) -> Result<Vec<Link>> {
    require_table(links, TableName::Links)?;
    let filter = Filter::new()
        .with("link_type", link_type.as_str())
        .with(field, id);
    links.fetch_as::<Link>(&filter)
}

/// Links `crumb_id` into `trail_id` and returns the link ID.
pub fn add_to_trail(links: &Table, crumb_id: &str, trail_id: &str) -> Result<String> {
    require_table(links, TableName::Links)?;
    links.set("", Link::belongs_to(crumb_id, trail_id))
}

pub fn remove_from_trail(links_table: &Table, crumb_id: &str, trail_id: &str) -> Result<()> {
    let membership = links(links_table, LinkType::BelongsTo, "from_id", crumb_id)?
        .into_iter()
        .find(|link| link.to_id == trail_id)
        .ok_or_else(|| CupboardError::NotInTrail {
            crumb: crumb_id.to_string(),
            trail: trail_id.to_string(),
        })?;
    links_table.delete(&membership.id)
}

/// Member crumbs of a trail, ordered by ID.
pub fn trail_crumbs(links_table: &Table, crumbs: &Table, trail_id: &str) -> Result<Vec<Crumb>> {
    require_table(crumbs, TableName::Crumbs)?;
    let mut members = Vec::new();
    for link in links(links_table, LinkType::BelongsTo, "to_id", trail_id)? {
        members.push(crumbs.get_as::<Crumb>(&link.from_id)?);
    }
    members.sort_by(|a, b| a.id.cmp(&b.id));
    Ok(members)
}

/// The trail a crumb belongs to, if any.
pub fn crumb_trail(links_table: &Table, crumb_id: &str) -> Result<Option<String>> {
    Ok(links(links_table, LinkType::BelongsTo, "from_id", crumb_id)?
        .into_iter()
        .next()
        .map(|link| link.to_id))
}

/// Scopes a global stash to a trail and returns the link ID.
pub fn scope_stash(links: &Table, stash_id: &str, trail_id: &str) -> Result<String> {
    require_table(links, TableName::Links)?;
    links.set("", Link::scoped_to(stash_id, trail_id))
}

/// The trail a stash is scoped to; `None` means the stash is global.
pub fn stash_scope(links_table: &Table, stash_id: &str) -> Result<Option<String>> {
    Ok(links(links_table, LinkType::ScopedTo, "from_id", stash_id)?
        .into_iter()
        .next()
        .map(|link| link.to_id))
}
