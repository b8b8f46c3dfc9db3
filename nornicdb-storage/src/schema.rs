use nornicdb_api::{
    ConstraintMeta, Error, FulltextIndexMeta, IndexMeta, Result, VectorIndexMeta, VectorSimilarity,
};
use std::collections::{BTreeSet, HashMap};
use std::sync::Mutex;

#[derive(Default)]
struct SchemaState {
    labels: BTreeSet<String>,
    rel_types: BTreeSet<String>,
    property_keys: BTreeSet<String>,
    indexes: Vec<IndexMeta>,
    constraints: Vec<ConstraintMeta>,
    vector_indexes: HashMap<String, VectorIndexMeta>,
    fulltext_indexes: HashMap<String, FulltextIndexMeta>,
}

/// In-memory metadata bridge backing `db.labels`, `db.indexes`,
/// `db.constraints`, and the vector/full-text index catalogs.
///
/// Labels, relationship types, and property keys are discovered
/// automatically as [`crate::MemoryEngine`] writes data; indexes and
/// constraints are only ever declared explicitly.
pub struct MemorySchemaCatalog {
    state: Mutex<SchemaState>,
}

impl MemorySchemaCatalog {
    pub(crate) fn new() -> Self {
        MemorySchemaCatalog {
            state: Mutex::new(SchemaState::default()),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SchemaState> {
        self.state.lock().expect("schema lock poisoned")
    }

    pub(crate) fn observe_label(&self, label: &str) {
        self.lock().labels.insert(label.to_string());
    }

    pub(crate) fn observe_rel_type(&self, rel_type: &str) {
        self.lock().rel_types.insert(rel_type.to_string());
    }

    pub(crate) fn observe_property_key(&self, key: &str) {
        self.lock().property_keys.insert(key.to_string());
    }

    pub fn labels(&self) -> Vec<String> {
        self.lock().labels.iter().cloned().collect()
    }

    pub fn relationship_types(&self) -> Vec<String> {
        self.lock().rel_types.iter().cloned().collect()
    }

    pub fn property_keys(&self) -> Vec<String> {
        self.lock().property_keys.iter().cloned().collect()
    }

    pub fn indexes(&self) -> Vec<IndexMeta> {
        self.lock().indexes.clone()
    }

    pub fn constraints(&self) -> Vec<ConstraintMeta> {
        self.lock().constraints.clone()
    }

    pub fn create_index(&self, label: &str, property: &str) -> Result<()> {
        let mut state = self.lock();
        if state
            .indexes
            .iter()
            .any(|i| i.label == label && i.property == property)
        {
            return Err(Error::AlreadyExists(format!(
                "index on :{label}({property})"
            )));
        }
        state.indexes.push(IndexMeta {
            label: label.to_string(),
            property: property.to_string(),
        });
        Ok(())
    }

    pub fn drop_index(&self, label: &str, property: &str) -> Result<()> {
        let mut state = self.lock();
        let before = state.indexes.len();
        state
            .indexes
            .retain(|i| !(i.label == label && i.property == property));
        if state.indexes.len() == before {
            return Err(Error::NotFound(format!("index on :{label}({property})")));
        }
        Ok(())
    }

    pub fn create_constraint(&self, label: &str, property: &str, unique: bool) -> Result<()> {
        let mut state = self.lock();
        if state
            .constraints
            .iter()
            .any(|c| c.label == label && c.property == property)
        {
            return Err(Error::AlreadyExists(format!(
                "constraint on :{label}({property})"
            )));
        }
        state.constraints.push(ConstraintMeta {
            label: label.to_string(),
            property: property.to_string(),
            unique,
        });
        Ok(())
    }

    pub fn drop_constraint(&self, label: &str, property: &str) -> Result<()> {
        let mut state = self.lock();
        let before = state.constraints.len();
        state
            .constraints
            .retain(|c| !(c.label == label && c.property == property));
        if state.constraints.len() == before {
            return Err(Error::NotFound(format!(
                "constraint on :{label}({property})"
            )));
        }
        Ok(())
    }

    pub fn vector_indexes(&self) -> Vec<VectorIndexMeta> {
        self.lock().vector_indexes.values().cloned().collect()
    }

    pub fn vector_index(&self, name: &str) -> Option<VectorIndexMeta> {
        self.lock().vector_indexes.get(name).cloned()
    }

    pub fn create_vector_index(
        &self,
        name: &str,
        label: &str,
        property: &str,
        dimensions: usize,
        similarity: VectorSimilarity,
    ) -> Result<()> {
        let mut state = self.lock();
        if state.vector_indexes.contains_key(name) {
            return Err(Error::AlreadyExists(format!("vector index {name}")));
        }
        state.vector_indexes.insert(
            name.to_string(),
            VectorIndexMeta {
                name: name.to_string(),
                label: label.to_string(),
                property: property.to_string(),
                dimensions,
                similarity,
            },
        );
        Ok(())
    }

    pub fn fulltext_indexes(&self) -> Vec<FulltextIndexMeta> {
        self.lock().fulltext_indexes.values().cloned().collect()
    }

    pub fn fulltext_index(&self, name: &str) -> Option<FulltextIndexMeta> {
        self.lock().fulltext_indexes.get(name).cloned()
    }

    pub fn create_fulltext_index(
        &self,
        name: &str,
        labels: Vec<String>,
        properties: Vec<String>,
    ) -> Result<()> {
        let mut state = self.lock();
        if state.fulltext_indexes.contains_key(name) {
            return Err(Error::AlreadyExists(format!("fulltext index {name}")));
        }
        state.fulltext_indexes.insert(
            name.to_string(),
            FulltextIndexMeta {
                name: name.to_string(),
                labels,
                properties,
            },
        );
        Ok(())
    }
}
