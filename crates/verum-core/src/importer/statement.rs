//! Statements a store executes and what it reports back.

use crate::{Attributes, StoreId};

/// One write against a graph store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Statement {
    /// Find the node labelled `label` with this `key` and `value`, or create
    /// it with `properties`. An existing node is left as is.
    MergeNode {
        label: String,
        key: String,
        value: String,
        properties: Attributes,
    },
    /// Create a new relationship between two stored nodes.
    CreateEdge {
        source_label: String,
        target_label: String,
        source_id: StoreId,
        target_id: StoreId,
        relationship: String,
        properties: Attributes,
    },
}

/// An ordered batch of statements committed as one unit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transaction {
    statements: Vec<Statement>,
}

impl Transaction {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, statement: Statement) {
        self.statements.push(statement);
    }

    #[must_use]
    pub fn statements(&self) -> &[Statement] {
        &self.statements
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.statements.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }
}

impl IntoIterator for Transaction {
    type Item = Statement;
    type IntoIter = std::vec::IntoIter<Statement>;

    fn into_iter(self) -> Self::IntoIter {
        self.statements.into_iter()
    }
}

/// A node as the store holds it after a commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredNode {
    pub id: StoreId,
    pub properties: Attributes,
}

/// What a committed transaction touched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitResult {
    /// Every node a `MergeNode` matched or created, in statement order.
    pub nodes: Vec<StoredNode>,
    pub relationships_created: usize,
}
