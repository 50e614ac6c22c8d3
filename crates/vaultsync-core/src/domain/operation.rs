//! Pending local mutations awaiting remote reconciliation
//!
//! The [`OperationLog`] holds at most one [`OperationKind`] per path. New
//! events are merged into the existing entry by [`OperationLog::record`]:
//!
//! | existing | incoming | result                                   |
//! |----------|----------|------------------------------------------|
//! | -        | any      | incoming                                 |
//! | Create   | Delete   | entry removed                            |
//! | Create   | Create / Modify | Create                            |
//! | Delete   | Create / Modify | Modify if known remotely, else Create |
//! | Delete   | Delete   | Delete                                   |
//! | Modify   | Delete   | Delete                                   |
//! | Modify   | Create / Modify | Modify                            |
//!
//! Entries are cleared one path at a time as soon as the remote side has
//! applied them, so an interrupted run leaves exactly the unfinished subset.

use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};

use super::newtypes::VaultPath;

/// Kind of pending mutation for a single path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Create,
    Delete,
    Modify,
}

impl Display for OperationKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let s = match self {
            OperationKind::Create => "create",
            OperationKind::Delete => "delete",
            OperationKind::Modify => "modify",
        };
        f.write_str(s)
    }
}

/// A pending mutation of one path
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Operation {
    pub path: VaultPath,
    pub kind: OperationKind,
}

impl Operation {
    #[must_use]
    pub fn new(path: VaultPath, kind: OperationKind) -> Self {
        Self { path, kind }
    }
}

impl Display for Operation {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.path)
    }
}

/// Per-path log of pending local mutations
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OperationLog {
    entries: BTreeMap<VaultPath, OperationKind>,
}

impl OperationLog {
    /// Creates an empty log
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Merges a local event into the entry for `path`
    ///
    /// `known_remotely` tells whether the remote store already holds an
    /// object for this path; it decides whether a delete followed by a
    /// create degrades to a modify.
    ///
    /// Returns the resulting entry, `None` if the path ends up clean.
    pub fn record(
        &mut self,
        path: VaultPath,
        kind: OperationKind,
        known_remotely: bool,
    ) -> Option<OperationKind> {
        let merged = merge(self.entries.get(&path).copied(), kind, known_remotely);
        match merged {
            Some(k) => {
                self.entries.insert(path, k);
            }
            None => {
                self.entries.remove(&path);
            }
        }
        merged
    }

    /// Records a rename as Delete(from) followed by Create(to)
    pub fn record_rename(
        &mut self,
        from: VaultPath,
        to: VaultPath,
        from_known: bool,
        to_known: bool,
    ) {
        self.record(from, OperationKind::Delete, from_known);
        self.record(to, OperationKind::Create, to_known);
    }

    /// Overwrites the entry for `path` without applying merge rules
    ///
    /// Used by the engines when reconciliation changes what a pending
    /// entry means (for example a Create whose object already exists).
    pub fn set(&mut self, path: VaultPath, kind: OperationKind) {
        self.entries.insert(path, kind);
    }

    /// Removes the entry for `path`, returning it if present
    pub fn clear(&mut self, path: &VaultPath) -> Option<OperationKind> {
        self.entries.remove(path)
    }

    /// Removes every entry
    pub fn clear_all(&mut self) {
        self.entries.clear();
    }

    /// Returns an immutable copy of the current entries, ordered by path
    #[must_use]
    pub fn snapshot(&self) -> Vec<Operation> {
        self.entries
            .iter()
            .map(|(path, kind)| Operation::new(path.clone(), *kind))
            .collect()
    }

    #[must_use]
    pub fn get(&self, path: &VaultPath) -> Option<OperationKind> {
        self.entries.get(path).copied()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&VaultPath, &OperationKind)> {
        self.entries.iter()
    }
}

fn merge(
    existing: Option<OperationKind>,
    incoming: OperationKind,
    known_remotely: bool,
) -> Option<OperationKind> {
    use OperationKind::{Create, Delete, Modify};

    match (existing, incoming) {
        (None, kind) => Some(kind),
        (Some(Create), Delete) => None,
        (Some(Create), Create | Modify) => Some(Create),
        (Some(Delete), Create | Modify) => {
            if known_remotely {
                Some(Modify)
            } else {
                Some(Create)
            }
        }
        (Some(Delete), Delete) => Some(Delete),
        (Some(Modify), Delete) => Some(Delete),
        (Some(Modify), Create | Modify) => Some(Modify),
    }
}
