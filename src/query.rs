//! Read-only query path

use crate::error::AppError;
use crate::store::{RequestQuery, ResponseQuery, Store};
use std::sync::Arc;

/// Anything that can answer a validated query.
pub trait QueryBackend: Send + Sync {
    fn query(&self, request: &RequestQuery) -> ResponseQuery;
}

impl QueryBackend for Store {
    fn query(&self, request: &RequestQuery) -> ResponseQuery {
        Store::query(self, request)
    }
}

pub struct QueryGateway<B = Store> {
    backend: Arc<B>,
}

impl<B: QueryBackend> QueryGateway<B> {
    pub fn new(backend: Arc<B>) -> Self {
        Self { backend }
    }

    /// Rejects empty payloads, forwards everything else verbatim.
    pub fn query(&self, request: &RequestQuery) -> ResponseQuery {
        if request.data.is_empty() {
            return ResponseQuery::from_error(&AppError::Encoding(
                "Query cannot be zero length".to_string(),
            ));
        }
        self.backend.query(request)
    }
}
