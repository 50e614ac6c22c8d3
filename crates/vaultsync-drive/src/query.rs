//! Rendering of object queries into the files API `q` parameter
//!
//! Every populated field of a [`QueryMatch`] becomes a condition joined with
//! `and`; the matches of an [`ObjectQuery`] are joined with `or`. The result
//! is always scoped to untrashed objects of one vault:
//!
//! ```text
//! ((name='a.md' and modifiedTime>'2024-01-01T00:00:00.000Z') or (...))
//!     and trashed=false and properties has { key='vault' and value='Notes' }
//! ```

use chrono::{DateTime, SecondsFormat, Utc};

use vaultsync_core::{
    domain::remote_object::VAULT_PROPERTY,
    ports::{DateComparison, ObjectQuery, QueryMatch, StringSearch},
};

/// Quotes a literal for use inside a query string
fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\\', "\\\\").replace('\'', "\\'"))
}

fn timestamp(at: &DateTime<Utc>) -> String {
    quote(&at.to_rfc3339_opts(SecondsFormat::Millis, true))
}

fn string_search(search: &StringSearch) -> String {
    match search {
        StringSearch::Equals(s) => format!("={}", quote(s)),
        StringSearch::Contains(s) => format!(" contains {}", quote(s)),
        StringSearch::Not(s) => format!("!={}", quote(s)),
    }
}

fn property(key: &str, search: &StringSearch) -> String {
    format!(
        "properties has {{ key={} and value{} }}",
        quote(key),
        string_search(search)
    )
}

/// Renders the conditions of one match, in a stable order
pub fn render_match(m: &QueryMatch) -> Vec<String> {
    let mut conditions = Vec::new();

    if let Some(id) = &m.id {
        conditions.push(format!("id={}", quote(id.as_str())));
    }
    conditions.extend(m.name.iter().map(|s| format!("name{}", string_search(s))));
    conditions.extend(
        m.mime_type
            .iter()
            .map(|s| format!("mimeType{}", string_search(s))),
    );
    if let Some(parent) = &m.parent {
        conditions.push(format!("{} in parents", quote(parent.as_str())));
    }
    if let Some(starred) = m.starred {
        conditions.push(format!("starred={starred}"));
    }
    if let Some(text) = &m.full_text {
        conditions.push(format!("fullText contains {}", quote(text)));
    }
    conditions.extend(m.properties.iter().map(|(k, v)| property(k, v)));
    if let Some(comparison) = &m.modified_time {
        conditions.push(match comparison {
            DateComparison::Eq(at) => format!("modifiedTime={}", timestamp(at)),
            DateComparison::Gt(at) => format!("modifiedTime>{}", timestamp(at)),
            DateComparison::Lt(at) => format!("modifiedTime<{}", timestamp(at)),
        });
    }
    conditions
}

/// Renders a full query scoped to `vault`
pub fn render(query: &ObjectQuery, vault: &str) -> String {
    let scope = format!(
        "trashed=false and {}",
        property(VAULT_PROPERTY, &StringSearch::Equals(vault.to_string()))
    );

    let clauses: Vec<Vec<String>> = query.matches.iter().map(render_match).collect();
    // An empty match matches every object, which makes the whole OR vacuous.
    if clauses.is_empty() || clauses.iter().any(Vec::is_empty) {
        return scope;
    }

    let alternatives: Vec<String> = clauses
        .into_iter()
        .map(|c| format!("({})", c.join(" and ")))
        .collect();
    format!("({}) and {}", alternatives.join(" or "), scope)
}
