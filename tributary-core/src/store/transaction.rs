//! Write transactions.

use std::fmt;

use super::record::RawRecord;

/// A field writer run against the stored record at commit time.
pub type FieldWriter = Box<dyn FnOnce(&mut RawRecord) + Send>;

/// One write.
pub enum Mutation {
    Insert(RawRecord),
    Update {
        entity: String,
        id: u64,
        apply: FieldWriter,
    },
    Delete {
        entity: String,
        id: u64,
    },
}

impl Mutation {
    pub fn entity(&self) -> &str {
        match self {
            Mutation::Insert(record) => &record.entity,
            Mutation::Update { entity, .. } | Mutation::Delete { entity, .. } => entity,
        }
    }

    pub fn id(&self) -> u64 {
        match self {
            Mutation::Insert(record) => record.id,
            Mutation::Update { id, .. } | Mutation::Delete { id, .. } => *id,
        }
    }
}

impl fmt::Debug for Mutation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self {
            Mutation::Insert(_) => "Insert",
            Mutation::Update { .. } => "Update",
            Mutation::Delete { .. } => "Delete",
        };
        write!(f, "{kind}({} {:016x})", self.entity(), self.id())
    }
}

/// An ordered batch of mutations committed all-or-nothing.
#[derive(Debug, Default)]
pub struct Transaction {
    mutations: Vec<Mutation>,
}

impl Transaction {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, record: RawRecord) -> &mut Self {
        self.mutations.push(Mutation::Insert(record));
        self
    }

    pub fn update<F>(&mut self, entity: impl Into<String>, id: u64, apply: F) -> &mut Self
    where
        F: FnOnce(&mut RawRecord) + Send + 'static,
    {
        self.mutations.push(Mutation::Update {
            entity: entity.into(),
            id,
            apply: Box::new(apply),
        });
        self
    }

    pub fn delete(&mut self, entity: impl Into<String>, id: u64) -> &mut Self {
        self.mutations.push(Mutation::Delete {
            entity: entity.into(),
            id,
        });
        self
    }

    pub fn len(&self) -> usize {
        self.mutations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mutations.is_empty()
    }

    pub fn into_mutations(self) -> Vec<Mutation> {
        self.mutations
    }
}
