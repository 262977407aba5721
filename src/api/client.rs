use log::{debug, warn};
use reqwest::{Client as HttpClient, Method, RequestBuilder};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;
use url::Url;

use crate::api::models::{ListQuery, Page, Pagination};
use crate::app::AppConfig;
use crate::error::{AdminError, Result};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Clone)]
pub struct ApiClient {
    pub http: HttpClient,
    base_url: String,
    secret: String,
}

impl ApiClient {
    pub fn new(config: &AppConfig) -> Result<Self> {
        Self::with_base(&config.api_url, &config.admin_secret)
    }

    pub fn with_base(base_url: &str, secret: &str) -> Result<Self> {
        let http = HttpClient::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("freespeek-admin/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Url::parse(base_url).map_err(|e| AdminError::InvalidUrl(format!("{e}: {base_url}")))?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            secret: secret.to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn url(&self, path: &str) -> Result<Url> {
        let full = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        Url::parse(&full).map_err(|e| AdminError::InvalidUrl(format!("{e}: {full}")))
    }

    /// Every request carries the static admin bearer token.
    pub fn request(&self, method: Method, path: &str) -> Result<RequestBuilder> {
        let url = self.url(path)?;
        debug!("building request for {method} {url}");
        Ok(self.http.request(method, url).bearer_auth(&self.secret))
    }

    pub async fn send(&self, req: RequestBuilder) -> Result<Value> {
        let resp = req.send().await?;
        let status = resp.status();
        let text = resp.text().await?;
        if !status.is_success() {
            return Err(AdminError::Api {
                status: status.as_u16(),
                message: server_message(&text).unwrap_or_default(),
            });
        }
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text).map_err(|e| AdminError::Decode(e.to_string()))
    }

    pub async fn get_json<Q: Serialize + ?Sized>(&self, path: &str, query: &Q) -> Result<Value> {
        let req = self.request(Method::GET, path)?.query(query);
        self.send(req).await
    }

    pub async fn post_json<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<Value> {
        let req = self.request(Method::POST, path)?.json(body);
        self.send(req).await
    }

    pub async fn put_json<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<Value> {
        let req = self.request(Method::PUT, path)?.json(body);
        self.send(req).await
    }

    pub async fn patch_json<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<Value> {
        let req = self.request(Method::PATCH, path)?.json(body);
        self.send(req).await
    }

    /// Fetch a paginated list and decode each entry, skipping ones that do not parse.
    pub async fn list<T, Q>(&self, path: &str, resource: &str, query: &Q) -> Result<Page<T>>
    where
        T: DeserializeOwned,
        Q: Serialize + ?Sized,
    {
        let json = self.get_json(path, query).await?;
        let mut items = Vec::new();
        for item in extract_list(&json, resource) {
            match serde_json::from_value::<T>(item.clone()) {
                Ok(v) => items.push(v),
                Err(e) => warn!("Skipping malformed {resource} entry: {e}"),
            }
        }
        Ok(Page { items, pagination: extract_pagination(&json) })
    }

    /// Every page of a list, `page_size` rows per request. Stops when the
    /// reported pages or total are reached, or a page comes back empty.
    pub async fn list_all<T>(&self, path: &str, resource: &str, page_size: u32) -> Result<Page<T>>
    where
        T: DeserializeOwned,
    {
        let mut query = ListQuery::new(1, page_size);
        let mut items = Vec::new();
        let mut first: Option<Pagination> = None;
        loop {
            let page: Page<T> = self.list(path, resource, &query).await?;
            let fetched = page.items.len();
            items.extend(page.items);
            first = first.or(page.pagination);
            let more = match page.pagination {
                Some(p) if p.total_pages > 0 => query.page < p.total_pages,
                Some(p) => (items.len() as u64) < p.total_count,
                None => false,
            };
            if !more || fetched == 0 {
                break;
            }
            query.page += 1;
            debug!("Fetching {resource} page {}", query.page);
        }
        if let Some(p) = first {
            if p.total_count > items.len() as u64 {
                warn!("Server reported {} {resource} but returned {}", p.total_count, items.len());
            }
        }
        Ok(Page { items, pagination: first })
    }

    /// Try to reach the admin API. Returns the HTTP status of the first endpoint that answers.
    pub async fn ping(&self) -> Result<u16> {
        let candidates = ["health", "admin/users?page=1&limit=1", ""];
        let mut last_err: Option<AdminError> = None;
        for endpoint in candidates {
            let req = self.request(Method::GET, endpoint)?;
            match req.send().await {
                Ok(resp) => return Ok(resp.status().as_u16()),
                Err(e) => last_err = Some(e.into()),
            }
        }
        Err(last_err.unwrap_or_else(|| AdminError::Decode("Failed to reach any endpoint".into())))
    }
}

/// Pull a human-readable message out of an error body, if it has one.
fn server_message(body: &str) -> Option<String> {
    let json: Value = serde_json::from_str(body).ok()?;
    json.get("message")
        .or_else(|| json.get("error"))
        .or_else(|| json.get("data").and_then(|d| d.get("message")))
        .and_then(|v| v.as_str())
        .map(str::to_string)
}

/// List responses come wrapped as `{data: {<resource>: [...]}}`, but older
/// endpoints answer with `{<resource>: [...]}`, `{data: [...]}` or a bare array.
pub fn extract_list(json: &Value, resource: &str) -> Vec<Value> {
    let data = json.get("data");
    let arr = data
        .and_then(|d| d.get(resource))
        .and_then(|v| v.as_array())
        .or_else(|| data.and_then(|d| d.as_array()))
        .or_else(|| json.get(resource).and_then(|v| v.as_array()))
        .or_else(|| json.as_array())
        .or_else(|| data.and_then(|d| d.get("items")).and_then(|v| v.as_array()));
    arr.cloned().unwrap_or_default()
}

pub fn extract_pagination(json: &Value) -> Option<Pagination> {
    json.get("data")
        .and_then(|d| d.get("pagination"))
        .or_else(|| json.get("pagination"))
        .and_then(|p| serde_json::from_value(p.clone()).ok())
}

/// Single-record responses: `{data: {<key>: {...}}}`, `{data: {...}}`, `{<key>: {...}}` or the record itself.
pub fn extract_item(json: &Value, key: &str) -> Value {
    let data = json.get("data");
    data.and_then(|d| d.get(key))
        .or(data.filter(|d| d.is_object()))
        .or_else(|| json.get(key))
        .unwrap_or(json)
        .clone()
}

pub fn decode_item<T: DeserializeOwned>(json: &Value, key: &str) -> Result<T> {
    serde_json::from_value(extract_item(json, key)).map_err(|e| AdminError::Decode(format!("{key}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::models::{ListQuery, Recipient};
    use httpmock::prelude::*;
    use serde_json::json;

    #[test]
    fn extract_list_handles_every_envelope() {
        let nested = json!({"data": {"recipients": [{"id": 1}], "pagination": {"page": 1, "totalPages": 3, "totalCount": 42}}});
        let flat = json!({"recipients": [{"id": 1}, {"id": 2}]});
        let data_arr = json!({"data": [{"id": 1}]});
        let bare = json!([{"id": 1}, {"id": 2}, {"id": 3}]);

        assert_eq!(extract_list(&nested, "recipients").len(), 1);
        assert_eq!(extract_list(&flat, "recipients").len(), 2);
        assert_eq!(extract_list(&data_arr, "recipients").len(), 1);
        assert_eq!(extract_list(&bare, "recipients").len(), 3);
        assert!(extract_list(&json!({"data": {}}), "recipients").is_empty());

        let p = extract_pagination(&nested).unwrap();
        assert_eq!((p.page, p.total_pages, p.total_count), (1, 3, 42));
        assert!(extract_pagination(&bare).is_none());
    }

    #[test]
    fn extract_item_unwraps_data() {
        let wrapped = json!({"success": true, "data": {"group": {"id": 5}}});
        assert_eq!(extract_item(&wrapped, "group"), json!({"id": 5}));
        assert_eq!(extract_item(&json!({"data": {"id": 6}}), "group"), json!({"id": 6}));
        assert_eq!(extract_item(&json!({"id": 7}), "group"), json!({"id": 7}));
    }

    #[test]
    fn server_message_reads_message_or_error() {
        assert_eq!(server_message(r#"{"message":"nope"}"#).as_deref(), Some("nope"));
        assert_eq!(server_message(r#"{"error":"bad"}"#).as_deref(), Some("bad"));
        assert_eq!(server_message("<html>"), None);
    }

    #[tokio::test]
    async fn list_sends_bearer_and_pagination_params() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/bulk-email/recipients")
                    .header("authorization", "Bearer top-secret")
                    .query_param("page", "2")
                    .query_param("limit", "10")
                    .query_param("search", "ann");
                then.status(200).json_body(json!({
                    "data": {
                        "recipients": [
                            {"id": 1, "name": "Ann", "email": "ann@x.io", "status": "ACTIVE"},
                            {"id": 2, "name": "broken"}
                        ],
                        "pagination": {"page": 2, "totalPages": 2, "totalCount": 11}
                    }
                }));
            })
            .await;

        let client = ApiClient::with_base(&server.base_url(), "top-secret").unwrap();
        let query = ListQuery { search: Some("ann".into()), ..ListQuery::new(2, 10) };
        let page: Page<Recipient> = client.list("/bulk-email/recipients", "recipients", &query).await.unwrap();

        mock.assert_async().await;
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.total_count(), Some(11));
    }

    #[tokio::test]
    async fn non_success_surfaces_server_message() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/admin/users");
                then.status(409).json_body(json!({"message": "Email already registered"}));
            })
            .await;

        let client = ApiClient::with_base(&server.base_url(), "s").unwrap();
        let err = client.post_json("/admin/users", &json!({})).await.unwrap_err();
        match err {
            AdminError::Api { status, message } => {
                assert_eq!(status, 409);
                assert_eq!(message, "Email already registered");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn rejects_unparseable_base() {
        assert!(matches!(ApiClient::with_base("not a url", "s"), Err(AdminError::InvalidUrl(_))));
    }

    #[tokio::test]
    async fn list_all_walks_every_page() {
        let server = MockServer::start_async().await;
        let first = server
            .mock_async(|when, then| {
                when.method(GET).path("/bulk-email/groups").query_param("page", "1").query_param("limit", "2");
                then.status(200).json_body(json!({"data": {
                    "groups": [{"id": 1, "name": "A"}, {"id": 2, "name": "B"}],
                    "pagination": {"page": 1, "totalPages": 2, "totalCount": 3}
                }}));
            })
            .await;
        let second = server
            .mock_async(|when, then| {
                when.method(GET).path("/bulk-email/groups").query_param("page", "2");
                then.status(200).json_body(json!({"data": {
                    "groups": [{"id": 3, "name": "C"}],
                    "pagination": {"page": 2, "totalPages": 2, "totalCount": 3}
                }}));
            })
            .await;

        let client = ApiClient::with_base(&server.base_url(), "s").unwrap();
        let page: Page<crate::api::models::Group> = client.list_all("/bulk-email/groups", "groups", 2).await.unwrap();
        first.assert_async().await;
        second.assert_async().await;
        let names: Vec<_> = page.items.iter().map(|g| g.name.as_str()).collect();
        assert_eq!(names, vec!["A", "B", "C"]);
    }
}
