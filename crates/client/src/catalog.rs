use catalog_admin_core::{
    strip_reserved, FlatCategory, LocalizedName, NodePatch, SiblingPosition, TokenStore,
};
use metrics::counter;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use thiserror::Error;
use tracing::{debug, info};

use crate::http::{ApiRequest, AuthenticatedClient, ClientError};

const CATEGORIES_PATH: &str = "categories";
const DEFAULT_PAGE_SIZE: u32 = 100;

/// Category endpoints of the catalog REST API.
pub struct CatalogClient<S> {
    client: AuthenticatedClient<S>,
    locale: String,
    page_size: u32,
}

impl<S> Clone for CatalogClient<S> {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            locale: self.locale.clone(),
            page_size: self.page_size,
        }
    }
}

/// Payload for creating a category.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NewCategory {
    pub name: String,
    pub parent_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort: Option<i64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error(transparent)]
    Client(#[from] ClientError),
    #[error("invalid category id '{0}'")]
    InvalidId(String),
}

impl<S> CatalogClient<S>
where
    S: TokenStore + 'static,
{
    pub fn new(client: AuthenticatedClient<S>, locale: impl Into<String>) -> Self {
        Self {
            client,
            locale: locale.into(),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn client(&self) -> &AuthenticatedClient<S> {
        &self.client
    }

    /// Fetches every category, following pagination until the last page.
    pub async fn list_categories(&self) -> Result<Vec<FlatCategory>, CatalogError> {
        let mut categories = Vec::new();
        let mut page = 1u32;
        loop {
            let request = ApiRequest::get(CATEGORIES_PATH)
                .query("page", page)
                .query("per_page", self.page_size);
            let response: ListResponse = self.client.send_json(&request).await?;
            let (records, meta) = response.into_parts();
            let fetched = records.len();
            categories.extend(records.into_iter().map(|record| record.into_flat(&self.locale)));

            debug!(stage = "catalog", page, fetched, "fetched category page");
            match meta {
                Some(meta) if fetched > 0 && page < meta.last_page => page += 1,
                _ => break,
            }
        }

        Ok(categories)
    }

    pub async fn create_category(&self, category: &NewCategory) -> Result<FlatCategory, CatalogError> {
        let request = ApiRequest::post(CATEGORIES_PATH).json(json!(category));
        let created = self
            .client
            .send_json::<Envelope<CategoryRecord>>(&request)
            .await;
        let category = record_mutation("create", created)?
            .into_inner()
            .into_flat(&self.locale);

        info!(stage = "catalog", id = %category.id, "category created");
        Ok(category)
    }

    pub async fn update_category(&self, id: &str, patch: &NodePatch) -> Result<(), CatalogError> {
        let path = category_path(id)?;
        if patch.is_empty() {
            debug!(stage = "catalog", id, "empty patch, nothing to send");
            return Ok(());
        }
        let request = ApiRequest::patch(path).json(json!(patch));
        record_mutation("update", self.client.send_empty(&request).await)?;
        Ok(())
    }

    pub async fn delete_category(&self, id: &str) -> Result<(), CatalogError> {
        let request = ApiRequest::delete(category_path(id)?);
        record_mutation("delete", self.client.send_empty(&request).await)?;

        info!(stage = "catalog", id, "category deleted");
        Ok(())
    }

    /// Persists one node's parent and rank.
    pub async fn update_position(&self, position: &SiblingPosition) -> Result<(), CatalogError> {
        let request = ApiRequest::patch(category_path(&position.id)?).json(json!({
            "parent_id": position.parent_id,
            "sort": position.sort_index,
        }));
        record_mutation("position", self.client.send_empty(&request).await)?;
        Ok(())
    }
}

fn category_path(id: &str) -> Result<String, CatalogError> {
    if id.is_empty() || id.contains(['/', '?', '#']) {
        return Err(CatalogError::InvalidId(id.to_string()));
    }
    Ok(format!("{CATEGORIES_PATH}/{id}"))
}

fn record_mutation<T>(kind: &'static str, outcome: Result<T, ClientError>) -> Result<T, ClientError> {
    let result = if outcome.is_ok() { "success" } else { "failed" };
    counter!("category_mutations_total", "kind" => kind, "result" => result).increment(1);
    outcome
}

/// Ids arrive as strings or integers depending on the backend.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
enum RecordId {
    Text(String),
    Number(i64),
}

impl From<RecordId> for String {
    fn from(value: RecordId) -> Self {
        match value {
            RecordId::Text(text) => text,
            RecordId::Number(number) => number.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct CategoryRecord {
    id: RecordId,
    name: LocalizedName,
    #[serde(default)]
    parent_id: Option<RecordId>,
    #[serde(default)]
    sort: Option<i64>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

impl CategoryRecord {
    fn into_flat(self, locale: &str) -> FlatCategory {
        FlatCategory {
            id: self.id.into(),
            name: self.name.resolve(locale),
            parent_id: self.parent_id.map(String::from),
            sort: self.sort,
            extra: strip_reserved(self.extra),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Envelope<T> {
    Wrapped { data: T },
    Bare(T),
}

impl<T> Envelope<T> {
    fn into_inner(self) -> T {
        match self {
            Self::Wrapped { data } | Self::Bare(data) => data,
        }
    }
}

#[derive(Debug, Deserialize)]
struct PageMeta {
    current_page: u32,
    last_page: u32,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ListResponse {
    Paged {
        data: Vec<CategoryRecord>,
        #[serde(default)]
        meta: Option<PageMeta>,
    },
    Bare(Vec<CategoryRecord>),
}

impl ListResponse {
    fn into_parts(self) -> (Vec<CategoryRecord>, Option<PageMeta>) {
        match self {
            Self::Paged { data, meta } => (data, meta),
            Self::Bare(data) => (data, None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{AuthClient, DeviceContext};
    use crate::events::SessionEvents;
    use catalog_admin_core::{MemoryTokenStore, TokenPair};
    use httpmock::prelude::*;
    use reqwest::Client;
    use url::Url;

    fn catalog(server: &MockServer) -> CatalogClient<MemoryTokenStore> {
        let base = Url::parse(&server.url("/api/")).expect("url");
        let http = Client::builder().build().expect("client");
        let auth = AuthClient::new(base.clone(), http.clone(), DeviceContext::detect("d", "0.1.0"));
        let store = MemoryTokenStore::with_tokens(TokenPair::new("a-1", "r-1"));
        let client = AuthenticatedClient::new(http, base, auth, store, SessionEvents::new());
        CatalogClient::new(client, "de").with_page_size(2)
    }

    #[tokio::test]
    async fn list_follows_pagination_and_resolves_names() {
        let server = MockServer::start_async().await;
        let first = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/api/categories")
                    .query_param("page", "1")
                    .query_param("per_page", "2");
                then.status(200).json_body(json!({
                    "data": [
                        { "id": 1, "name": { "en": "Shoes", "de": "Schuhe" }, "parent_id": null, "sort": 0 },
                        { "id": "2", "name": "Boots", "parent_id": 1, "slug": "boots" }
                    ],
                    "meta": { "current_page": 1, "last_page": 2 }
                }));
            })
            .await;
        let second = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/api/categories")
                    .query_param("page", "2");
                then.status(200).json_body(json!({
                    "data": [
                        { "id": 3, "name": { "fr": "Sandales" }, "parent_id": "1" }
                    ],
                    "meta": { "current_page": 2, "last_page": 2 }
                }));
            })
            .await;

        let categories = catalog(&server).list_categories().await.expect("list");
        first.assert_async().await;
        second.assert_async().await;

        assert_eq!(categories.len(), 3);
        assert_eq!(categories[0].id, "1");
        assert_eq!(categories[0].name, "Schuhe");
        assert_eq!(categories[0].sort, Some(0));
        assert_eq!(categories[1].parent_id.as_deref(), Some("1"));
        assert_eq!(categories[1].extra.get("slug"), Some(&json!("boots")));
        assert_eq!(categories[2].name, "Sandales");
    }

    #[tokio::test]
    async fn list_stops_at_last_page_when_server_ignores_page_param() {
        let server = MockServer::start_async().await;
        let stuck = server
            .mock_async(|when, then| {
                when.method(GET).path("/api/categories");
                then.status(200).json_body(json!({
                    "data": [{ "id": 1, "name": "Shoes" }],
                    "meta": { "current_page": 1, "last_page": 2 }
                }));
            })
            .await;

        let categories = tokio::time::timeout(
            std::time::Duration::from_secs(2),
            catalog(&server).list_categories(),
        )
        .await
        .expect("pagination terminates")
        .expect("list");
        stuck.assert_hits_async(2).await;
        assert_eq!(categories.len(), 2);
    }

    #[tokio::test]
    async fn list_drops_engine_owned_keys_from_extra() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/api/categories");
                then.status(200).json_body(json!([
                    { "id": 1, "name": "Shoes", "children": [], "sort_index": 9, "slug": "shoes" }
                ]));
            })
            .await;

        let categories = catalog(&server).list_categories().await.expect("list");
        let extra = &categories[0].extra;
        assert!(!extra.contains_key("children"));
        assert!(!extra.contains_key("sort_index"));
        assert_eq!(extra.get("slug"), Some(&json!("shoes")));
    }

    #[tokio::test]
    async fn list_accepts_unpaged_array() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/api/categories");
                then.status(200).json_body(json!([
                    { "id": 9, "name": "Hats" }
                ]));
            })
            .await;

        let categories = catalog(&server).list_categories().await.expect("list");
        assert_eq!(categories, vec![FlatCategory::new("9", "Hats", None)]);
    }

    #[tokio::test]
    async fn create_returns_flat_record() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/api/categories")
                    .json_body(json!({ "name": "Socks", "parent_id": "1", "slug": "socks" }));
                then.status(201).json_body(json!({
                    "data": { "id": 12, "name": "Socks", "parent_id": 1, "slug": "socks" }
                }));
            })
            .await;

        let mut extra = Map::new();
        extra.insert("slug".into(), json!("socks"));
        let created = catalog(&server)
            .create_category(&NewCategory {
                name: "Socks".into(),
                parent_id: Some("1".into()),
                sort: None,
                extra,
            })
            .await
            .expect("create");
        mock.assert_async().await;
        assert_eq!(created.id, "12");
        assert_eq!(created.parent_id.as_deref(), Some("1"));
    }

    #[tokio::test]
    async fn update_and_position_use_patch() {
        let server = MockServer::start_async().await;
        let rename = server
            .mock_async(|when, then| {
                when.method(httpmock::Method::PATCH)
                    .path("/api/categories/4")
                    .json_body(json!({ "name": "Sneakers" }));
                then.status(200).json_body(json!({ "data": {} }));
            })
            .await;
        let position = server
            .mock_async(|when, then| {
                when.method(httpmock::Method::PATCH)
                    .path("/api/categories/5")
                    .json_body(json!({ "parent_id": null, "sort": 2 }));
                then.status(204);
            })
            .await;

        let catalog = catalog(&server);
        catalog
            .update_category("4", &NodePatch::rename("Sneakers"))
            .await
            .expect("update");
        catalog
            .update_position(&SiblingPosition {
                id: "5".into(),
                parent_id: None,
                sort_index: 2,
            })
            .await
            .expect("position");
        rename.assert_async().await;
        position.assert_async().await;

        catalog
            .update_category("4", &NodePatch::default())
            .await
            .expect("empty update");
        rename.assert_hits_async(1).await;
    }

    #[tokio::test]
    async fn delete_rejects_malformed_ids() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(DELETE).path("/api/categories/8");
                then.status(404).body("missing");
            })
            .await;

        let catalog = catalog(&server);
        assert!(matches!(
            catalog.delete_category("../users").await,
            Err(CatalogError::InvalidId(_))
        ));
        let err = catalog.delete_category("8").await.expect_err("404");
        assert!(matches!(
            err,
            CatalogError::Client(ClientError::Status { .. })
        ));
        mock.assert_async().await;
    }
}
