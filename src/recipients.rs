//! Fetches the recipient working set in bounded requests.
//!
//! The total is learned first with a one-row request. Sets at or below the
//! threshold come back in one request; bigger ones are cut at the threshold
//! until the operator asks for the rest.

use log::{info, warn};

use crate::api::ApiClient;
use crate::api::models::{ListQuery, Page, Recipient};
use crate::error::{AdminError, Result};
use crate::selection::{Completeness, SelectionManager};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecipientSource {
    /// `/bulk-email/recipients`
    Recipients,
    /// `/admin/users`, used when the recipients endpoint is down.
    Users,
}

#[derive(Debug)]
pub struct LoadOutcome {
    pub source: Option<RecipientSource>,
    pub loaded: usize,
    pub total: Option<u64>,
    pub has_loaded_all: bool,
    /// Set when both endpoints failed and the working set was emptied.
    pub error: Option<AdminError>,
}

pub struct RecipientLoader {
    client: ApiClient,
    threshold: usize,
    filter: ListQuery,
    source: RecipientSource,
    total: Option<u64>,
}

impl RecipientLoader {
    pub fn new(client: ApiClient, threshold: usize) -> Self {
        Self {
            client,
            threshold: threshold.max(1),
            filter: ListQuery::default(),
            source: RecipientSource::Recipients,
            total: None,
        }
    }

    pub fn with_filter(mut self, search: Option<String>, status: Option<String>) -> Self {
        self.filter.search = search;
        self.filter.status = status;
        self
    }

    pub fn source(&self) -> RecipientSource {
        self.source
    }

    fn query(&self, limit: usize) -> ListQuery {
        ListQuery {
            page: 1,
            limit: u32::try_from(limit).unwrap_or(u32::MAX),
            ..self.filter.clone()
        }
    }

    async fn fetch_from(&self, source: RecipientSource, limit: usize) -> Result<Page<Recipient>> {
        let query = self.query(limit);
        match source {
            RecipientSource::Recipients => self.client.recipients(&query).await,
            RecipientSource::Users => {
                let page = self.client.users(&query).await?;
                Ok(Page {
                    items: page.items.into_iter().filter_map(|u| u.into_recipient()).collect(),
                    pagination: page.pagination,
                })
            }
        }
    }

    /// Primary endpoint first, then the users endpoint with the same query.
    async fn fetch(&mut self, limit: usize) -> Result<Page<Recipient>> {
        if self.source == RecipientSource::Recipients {
            match self.fetch_from(RecipientSource::Recipients, limit).await {
                Ok(page) => return Ok(page),
                Err(e) => {
                    warn!("Recipients endpoint failed ({e}), falling back to users");
                    self.source = RecipientSource::Users;
                }
            }
        }
        self.fetch_from(RecipientSource::Users, limit).await
    }

    async fn count(&mut self) -> Result<Option<u64>> {
        let page = self.fetch(1).await?;
        Ok(page.total_count())
    }

    /// Initial load into `manager`. Never fails: on total failure the set is emptied
    /// and the error is handed back in the outcome.
    pub async fn load(&mut self, manager: &mut SelectionManager) -> LoadOutcome {
        self.source = RecipientSource::Recipients;
        match self.load_inner(manager).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!("Could not load recipients: {e}");
                self.total = None;
                manager.total_count = None;
                manager.replace_recipients(Vec::new(), false);
                LoadOutcome { source: None, loaded: 0, total: None, has_loaded_all: false, error: Some(e) }
            }
        }
    }

    async fn load_inner(&mut self, manager: &mut SelectionManager) -> Result<LoadOutcome> {
        self.total = self.count().await?;
        let (items, has_loaded_all) = match self.total {
            Some(0) => (Vec::new(), true),
            Some(total) => {
                let limit = usize::try_from(total).unwrap_or(usize::MAX).min(self.threshold);
                let page = self.fetch(limit).await?;
                (page.items, total <= self.threshold as u64)
            }
            None => {
                let page = self.fetch(self.threshold).await?;
                let complete = page.items.len() < self.threshold;
                (page.items, complete)
            }
        };
        if !has_loaded_all {
            info!("Loaded first {} recipients of {:?}; more available", items.len(), self.total);
        }
        Ok(self.apply(manager, items, has_loaded_all))
    }

    /// Re-fetches the complete set and marks it as fully loaded.
    pub async fn load_all_remaining(&mut self, manager: &mut SelectionManager) -> Result<LoadOutcome> {
        if manager.has_loaded_all {
            return Ok(self.outcome(manager));
        }
        if self.total.is_none() {
            self.total = self.count().await?;
        }
        let limit = match self.total {
            Some(total) => usize::try_from(total).unwrap_or(usize::MAX).max(manager.recipients.len()),
            None => u32::MAX as usize,
        };
        let page = self.fetch(limit).await?;
        if let Some(total) = page.total_count() {
            self.total = Some(total);
        }
        Ok(self.apply(manager, page.items, true))
    }

    /// Selects every active recipient, fetching the rest of the set first if needed.
    /// `on_provisional` receives the provisional selection size before that fetch.
    pub async fn select_all_active<F>(&mut self, manager: &mut SelectionManager, on_provisional: F) -> Completeness
    where
        F: FnOnce(usize),
    {
        if manager.select_all_active() == Completeness::Complete {
            return Completeness::Complete;
        }
        on_provisional(manager.selection.len());
        match self.load_all_remaining(manager).await {
            Ok(_) => manager.select_all_active(),
            Err(e) => {
                warn!("Could not load remaining recipients: {e}");
                Completeness::Provisional
            }
        }
    }

    fn apply(&self, manager: &mut SelectionManager, items: Vec<Recipient>, has_loaded_all: bool) -> LoadOutcome {
        manager.total_count = self.total;
        manager.replace_recipients(items, has_loaded_all);
        self.outcome(manager)
    }

    fn outcome(&self, manager: &SelectionManager) -> LoadOutcome {
        LoadOutcome {
            source: Some(self.source),
            loaded: manager.recipients.len(),
            total: self.total,
            has_loaded_all: manager.has_loaded_all,
            error: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::{Value, json};

    fn recipients_json(n: usize, total: usize) -> Value {
        let items: Vec<Value> = (1..=n)
            .map(|i| json!({"id": i, "name": format!("R{i}"), "email": format!("r{i}@x.io"), "status": "ACTIVE"}))
            .collect();
        json!({"data": {"recipients": items, "pagination": {"page": 1, "totalPages": 1, "totalCount": total}}})
    }

    #[tokio::test]
    async fn large_sets_are_cut_at_the_threshold_until_load_all() {
        let server = MockServer::start_async().await;
        let count = server
            .mock_async(|when, then| {
                when.method(GET).path("/bulk-email/recipients").query_param("limit", "1");
                then.status(200).json_body(recipients_json(1, 6000));
            })
            .await;
        let prefix = server
            .mock_async(|when, then| {
                when.method(GET).path("/bulk-email/recipients").query_param("limit", "5000");
                then.status(200).json_body(recipients_json(5000, 6000));
            })
            .await;
        let full = server
            .mock_async(|when, then| {
                when.method(GET).path("/bulk-email/recipients").query_param("limit", "6000");
                then.status(200).json_body(recipients_json(6000, 6000));
            })
            .await;

        let client = ApiClient::with_base(&server.base_url(), "s").unwrap();
        let mut loader = RecipientLoader::new(client, 5000);
        let mut manager = SelectionManager::default();

        let outcome = loader.load(&mut manager).await;
        assert!(outcome.error.is_none());
        assert_eq!(outcome.loaded, 5000);
        assert_eq!(outcome.total, Some(6000));
        assert!(!manager.has_loaded_all);
        count.assert_hits_async(1).await;
        prefix.assert_hits_async(1).await;
        assert_eq!(full.hits_async().await, 0);

        let outcome = loader.load_all_remaining(&mut manager).await.unwrap();
        assert_eq!(outcome.loaded, 6000);
        assert!(manager.has_loaded_all);
        full.assert_hits_async(1).await;
    }

    #[tokio::test]
    async fn small_sets_load_in_one_request() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/bulk-email/recipients").query_param("limit", "1");
                then.status(200).json_body(recipients_json(1, 3));
            })
            .await;
        let all = server
            .mock_async(|when, then| {
                when.method(GET).path("/bulk-email/recipients").query_param("limit", "3");
                then.status(200).json_body(recipients_json(3, 3));
            })
            .await;

        let client = ApiClient::with_base(&server.base_url(), "s").unwrap();
        let mut loader = RecipientLoader::new(client, 5000);
        let mut manager = SelectionManager::default();
        let outcome = loader.load(&mut manager).await;

        all.assert_async().await;
        assert!(outcome.has_loaded_all);
        assert_eq!(outcome.source, Some(RecipientSource::Recipients));
        assert_eq!(manager.recipients.len(), 3);
    }

    #[tokio::test]
    async fn falls_back_to_users_endpoint() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/bulk-email/recipients");
                then.status(500).json_body(json!({"message": "boom"}));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/admin/users");
                then.status(200).json_body(json!({
                    "users": [
                        {"id": 1, "name": "Ann", "email": "ann@x.io", "status": "active"},
                        {"id": 2, "username": "nomail"}
                    ],
                    "pagination": {"page": 1, "totalPages": 1, "totalCount": 2}
                }));
            })
            .await;

        let client = ApiClient::with_base(&server.base_url(), "s").unwrap();
        let mut loader = RecipientLoader::new(client, 5000);
        let mut manager = SelectionManager::default();
        let outcome = loader.load(&mut manager).await;

        assert!(outcome.error.is_none());
        assert_eq!(outcome.source, Some(RecipientSource::Users));
        assert_eq!(manager.recipients.len(), 1);
        assert_eq!(manager.recipients[0].email, "ann@x.io");
    }

    #[tokio::test]
    async fn both_endpoints_down_leaves_an_empty_set() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET);
                then.status(503);
            })
            .await;

        let client = ApiClient::with_base(&server.base_url(), "s").unwrap();
        let mut loader = RecipientLoader::new(client, 5000);
        let mut manager = SelectionManager::default();
        manager.replace_recipients(
            vec![Recipient { id: "old".into(), name: "Old".into(), email: "o@x.io".into(), status: Default::default() }],
            true,
        );

        let outcome = loader.load(&mut manager).await;
        assert!(matches!(outcome.error, Some(AdminError::Api { status: 503, .. })));
        assert!(manager.recipients.is_empty());
        assert!(outcome.source.is_none());
    }

    #[tokio::test]
    async fn select_all_active_fetches_the_rest_first() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/bulk-email/recipients").query_param("limit", "1");
                then.status(200).json_body(recipients_json(1, 4));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/bulk-email/recipients").query_param("limit", "2");
                then.status(200).json_body(recipients_json(2, 4));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/bulk-email/recipients").query_param("limit", "4");
                then.status(200).json_body(recipients_json(4, 4));
            })
            .await;

        let client = ApiClient::with_base(&server.base_url(), "s").unwrap();
        let mut loader = RecipientLoader::new(client, 2);
        let mut manager = SelectionManager::default();
        loader.load(&mut manager).await;
        assert_eq!(manager.recipients.len(), 2);

        let mut provisional = None;
        let done = loader.select_all_active(&mut manager, |n| provisional = Some(n)).await;
        assert_eq!(provisional, Some(2));
        assert_eq!(done, Completeness::Complete);
        assert_eq!(manager.selection.len(), 4);
    }
}
