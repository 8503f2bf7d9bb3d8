use std::sync::Arc;

use crate::db::Store;
use crate::revalidate::Revalidator;
use crate::storage::ObjectStorage;

/// Process-wide handles shared by every request: the record store, the
/// picture bucket and the revalidation bus. Built once in `main`, cloned
/// cheaply into handlers, and shut down explicitly.
#[derive(Clone)]
pub struct AppContext {
    pub store: Arc<dyn Store>,
    pub storage: Arc<dyn ObjectStorage>,
    pub revalidator: Revalidator,
}

impl AppContext {
    pub fn new(store: Arc<dyn Store>, storage: Arc<dyn ObjectStorage>) -> Self {
        Self {
            store,
            storage,
            revalidator: Revalidator::new(),
        }
    }

    pub async fn shutdown(&self) {
        self.store.close().await;
    }
}
