//! Atomic multi-row writes.

use std::collections::HashSet;

use crate::{Row, RowKey, StorageError, Version};

/// A single row write inside a [`ChangeSet`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change {
    /// Inserts a new row. The row must carry [`Version::first`].
    Insert(Row),

    /// Replaces a row. The row carries the version the writer read; the
    /// store rejects the write if the stored version differs and otherwise
    /// stores the row at the next version.
    Update(Row),

    /// Deletes a row and everything that cascades from it.
    ///
    /// With `expected` set the delete only succeeds at that version.
    Delete {
        key: RowKey,
        expected: Option<Version>,
    },
}

impl Change {
    /// Returns the key of the row this change touches.
    pub fn key(&self) -> RowKey {
        match self {
            Change::Insert(row) | Change::Update(row) => row.key(),
            Change::Delete { key, .. } => *key,
        }
    }
}

/// An ordered list of changes that commit together or not at all.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    changes: Vec<Change>,
}

impl ChangeSet {
    /// Creates an empty change set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an insert.
    pub fn insert(mut self, row: impl Into<Row>) -> Self {
        self.changes.push(Change::Insert(row.into()));
        self
    }

    /// Adds a versioned update.
    pub fn update(mut self, row: impl Into<Row>) -> Self {
        self.changes.push(Change::Update(row.into()));
        self
    }

    /// Adds a delete guarded by the version the caller read.
    pub fn delete(mut self, key: RowKey, expected: Version) -> Self {
        self.changes.push(Change::Delete {
            key,
            expected: Some(expected),
        });
        self
    }

    /// Adds an unguarded delete.
    pub fn delete_unchecked(mut self, key: RowKey) -> Self {
        self.changes.push(Change::Delete {
            key,
            expected: None,
        });
        self
    }

    /// Appends a change in place.
    pub fn push(&mut self, change: Change) {
        self.changes.push(change);
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Change> {
        self.changes.iter()
    }
}

impl IntoIterator for ChangeSet {
    type Item = Change;
    type IntoIter = std::vec::IntoIter<Change>;

    fn into_iter(self) -> Self::IntoIter {
        self.changes.into_iter()
    }
}

impl Extend<Change> for ChangeSet {
    fn extend<T: IntoIterator<Item = Change>>(&mut self, iter: T) {
        self.changes.extend(iter);
    }
}

/// Validates a change set before it is committed.
///
/// Rejects empty sets, more than one change to the same row, inserts not at
/// the first version, and deletes of tables the engine never deletes from
/// directly (carts, orders and order items only disappear by cascade).
pub fn validate_changes(changes: &ChangeSet) -> Result<(), StorageError> {
    if changes.is_empty() {
        return Err(StorageError::InvalidChangeSet(
            "Cannot commit an empty change set".to_string(),
        ));
    }

    let mut seen = HashSet::with_capacity(changes.len());
    for change in changes.iter() {
        let key = change.key();
        if !seen.insert(key) {
            return Err(StorageError::InvalidChangeSet(format!(
                "{} {} is changed more than once",
                key.entity(),
                key
            )));
        }

        match change {
            Change::Insert(row) if row.version() != Version::first() => {
                return Err(StorageError::InvalidChangeSet(format!(
                    "{} {} must be inserted at version {}, got {}",
                    key.entity(),
                    key,
                    Version::first(),
                    row.version()
                )));
            }
            Change::Delete {
                key: RowKey::Cart(_) | RowKey::Order(_) | RowKey::OrderItem(_),
                ..
            } => {
                return Err(StorageError::InvalidChangeSet(format!(
                    "{} rows cannot be deleted directly",
                    key.entity()
                )));
            }
            _ => {}
        }
    }

    Ok(())
}
