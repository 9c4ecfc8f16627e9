use std::cmp::Ordering;
use std::marker::PhantomData;
use std::sync::Arc;

use tracing::trace;

use crate::cancel::CancellationToken;
use crate::store::error::{StoreError, StoreResult};
use crate::store::{Document, DocumentBackend};

type Predicate<D> = Arc<dyn Fn(&D) -> bool + Send + Sync>;
type Comparator<D> = Arc<dyn Fn(&D, &D) -> Ordering + Send + Sync>;

/// Lazily evaluated query over one document collection.
///
/// Composing a query performs no I/O; the collection is loaded when a
/// terminal (`to_list`, `count`, `first`, `first_or_none`) runs. Without an
/// explicit ordering documents come back in identifier order. `skip` is
/// applied before `take` regardless of call order.
pub struct Query<D> {
    backend: Arc<dyn DocumentBackend>,
    predicates: Vec<Predicate<D>>,
    order: Option<Comparator<D>>,
    skip: usize,
    take: Option<usize>,
    _document: PhantomData<fn() -> D>,
}

impl<D> Clone for Query<D> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            predicates: self.predicates.clone(),
            order: self.order.clone(),
            skip: self.skip,
            take: self.take,
            _document: PhantomData,
        }
    }
}

impl<D> std::fmt::Debug for Query<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Query")
            .field("predicates", &self.predicates.len())
            .field("ordered", &self.order.is_some())
            .field("skip", &self.skip)
            .field("take", &self.take)
            .finish()
    }
}

impl<D: Document> Query<D> {
    pub(crate) fn new(backend: Arc<dyn DocumentBackend>) -> Self {
        Self {
            backend,
            predicates: Vec::new(),
            order: None,
            skip: 0,
            take: None,
            _document: PhantomData,
        }
    }

    /// Keeps documents matching `predicate`; multiple filters combine with AND.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&D) -> bool + Send + Sync + 'static,
    {
        self.predicates.push(Arc::new(predicate));
        self
    }

    pub fn order_by<K, F>(mut self, key: F) -> Self
    where
        K: Ord,
        F: Fn(&D) -> K + Send + Sync + 'static,
    {
        self.order = Some(Arc::new(move |a: &D, b: &D| key(a).cmp(&key(b))));
        self
    }

    pub fn order_by_descending<K, F>(mut self, key: F) -> Self
    where
        K: Ord,
        F: Fn(&D) -> K + Send + Sync + 'static,
    {
        self.order = Some(Arc::new(move |a: &D, b: &D| key(b).cmp(&key(a))));
        self
    }

    pub fn skip(mut self, count: usize) -> Self {
        self.skip = count;
        self
    }

    pub fn take(mut self, count: usize) -> Self {
        self.take = Some(count);
        self
    }

    pub async fn to_list(self, cancel: &CancellationToken) -> StoreResult<Vec<D>> {
        self.execute(cancel).await
    }

    pub async fn count(self, cancel: &CancellationToken) -> StoreResult<usize> {
        Ok(self.execute(cancel).await?.len())
    }

    /// First document matching `predicate`; an empty result is
    /// [`StoreError::NoMatchingDocument`].
    pub async fn first<F>(self, predicate: F, cancel: &CancellationToken) -> StoreResult<D>
    where
        F: Fn(&D) -> bool + Send + Sync + 'static,
    {
        self.first_or_none(predicate, cancel)
            .await?
            .ok_or(StoreError::NoMatchingDocument)
    }

    pub async fn first_or_none<F>(
        self,
        predicate: F,
        cancel: &CancellationToken,
    ) -> StoreResult<Option<D>>
    where
        F: Fn(&D) -> bool + Send + Sync + 'static,
    {
        Ok(self.filter(predicate).execute(cancel).await?.into_iter().next())
    }

    fn matches(&self, document: &D) -> bool {
        self.predicates.iter().all(|predicate| predicate(document))
    }

    async fn execute(&self, cancel: &CancellationToken) -> StoreResult<Vec<D>> {
        if cancel.is_cancelled() {
            return Err(StoreError::Cancelled);
        }

        let raw = self.backend.load(D::COLLECTION).await?;
        let scanned = raw.len();

        let mut documents = Vec::new();
        for value in raw {
            let document: D = serde_json::from_value(value)?;
            if self.matches(&document) {
                documents.push(document);
            }
        }

        if let Some(order) = &self.order {
            documents.sort_by(|a, b| order(a, b));
        }

        let take = self.take.unwrap_or(usize::MAX);
        let documents: Vec<D> = documents.into_iter().skip(self.skip).take(take).collect();
        trace!(collection = D::COLLECTION, scanned, returned = documents.len(), "query executed");
        Ok(documents)
    }
}
