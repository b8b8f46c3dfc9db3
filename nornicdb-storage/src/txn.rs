use nornicdb_api::{Error, Result, Transaction};
use std::sync::{Arc, RwLock};

use crate::engine::GraphData;

/// Snapshot/rollback transaction handle for [`crate::MemoryEngine`].
///
/// `rollback` restores the node/edge maps to the state captured at
/// `begin_transaction`; `commit` is a no-op since writes already land
/// directly in the shared store.
pub(crate) struct MemoryTransaction {
    data: Arc<RwLock<GraphData>>,
    snapshot: GraphData,
    finished: bool,
}

impl MemoryTransaction {
    pub(crate) fn new(data: Arc<RwLock<GraphData>>, snapshot: GraphData) -> Self {
        MemoryTransaction {
            data,
            snapshot,
            finished: false,
        }
    }
}

impl Transaction for MemoryTransaction {
    fn commit(mut self: Box<Self>) -> Result<()> {
        self.finished = true;
        Ok(())
    }

    fn rollback(mut self: Box<Self>) -> Result<()> {
        let mut data = self
            .data
            .write()
            .map_err(|_| Error::Other("storage lock poisoned".to_string()))?;
        *data = std::mem::take(&mut self.snapshot);
        self.finished = true;
        Ok(())
    }
}
