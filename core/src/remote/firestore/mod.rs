//! Profile store and equipment repository over the Firestore REST API.

pub mod value;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::Instrument;

use crate::config::Config;
use crate::error::StoreError;
use crate::models::{
    normalize_email, Equipment, EquipmentHistoryEntry, ProfileDocument, ProfilePatch,
};
use crate::remote::identity_toolkit::IdTokenSource;
use crate::remote::{EquipmentRepository, ProfileStore};

const LIST_PAGE_SIZE: u32 = 300;

#[derive(Debug, Deserialize)]
struct Document {
    name: String,
    #[serde(default)]
    fields: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListResponse {
    #[serde(default)]
    documents: Vec<Document>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct QueryResult {
    #[serde(default)]
    document: Option<Document>,
}

impl Document {
    /// Plain JSON of the document, with its id stored under `id_field`.
    fn into_json(self, id_field: &str) -> Value {
        let id = value::document_id(&self.name).to_string();
        let mut map = value::decode_fields(&self.fields);
        map.entry(id_field.to_string())
            .or_insert_with(|| Value::String(id));
        Value::Object(map)
    }
}

pub struct FirestoreClient {
    client: Client,
    documents_url: String,
    profile_collection: String,
    equipment_collection: String,
    history_collection: String,
    token: Option<Arc<dyn IdTokenSource>>,
}

impl FirestoreClient {
    pub fn new(config: &Config, token: Option<Arc<dyn IdTokenSource>>) -> Self {
        Self {
            client: Client::new(),
            documents_url: config.documents_base_url(),
            profile_collection: config.profile_collection.clone(),
            equipment_collection: config.equipment_collection.clone(),
            history_collection: config.history_collection.clone(),
            token,
        }
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        let builder = self.client.request(method, url);
        match self.token.as_ref().and_then(|source| source.id_token()) {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    fn document_url(&self, collection: &str, id: &str) -> String {
        format!("{}/{}/{}", self.documents_url, collection, id)
    }

    async fn send<T: DeserializeOwned>(
        &self,
        builder: RequestBuilder,
        target: &str,
    ) -> Result<T, StoreError> {
        let span = tracing::debug_span!("firestore", target);
        async move {
            let response = builder
                .send()
                .await
                .map_err(|e| StoreError::Transport(format!("Request failed: {}", e)))?;

            let status = response.status();
            if status == StatusCode::NOT_FOUND {
                return Err(StoreError::NotFound(target.to_string()));
            }
            if !status.is_success() {
                let message = response.text().await.unwrap_or_default();
                return Err(StoreError::Rejected {
                    status: status.as_u16(),
                    message,
                });
            }
            response
                .json()
                .await
                .map_err(|e| StoreError::Malformed(format!("Failed to parse response: {}", e)))
        }
        .instrument(span)
        .await
    }

    async fn get_document(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        let url = self.document_url(collection, id);
        match self.send(self.request(Method::GET, &url), &url).await {
            Ok(doc) => Ok(Some(doc)),
            Err(StoreError::NotFound(_)) => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// PATCHes `fields`; with a mask only those paths are written (merge).
    async fn patch_document(
        &self,
        collection: &str,
        id: &str,
        fields: &Map<String, Value>,
        mask: Option<&[String]>,
        must_exist: bool,
    ) -> Result<Document, StoreError> {
        let url = self.document_url(collection, id);
        let mut query: Vec<(&str, String)> = mask
            .unwrap_or_default()
            .iter()
            .map(|path| ("updateMask.fieldPaths", path.clone()))
            .collect();
        if must_exist {
            query.push(("currentDocument.exists", "true".to_string()));
        }
        let builder = self
            .request(Method::PATCH, &url)
            .query(&query)
            .json(&json!({ "fields": value::encode_fields(fields) }));
        self.send(builder, &url).await
    }

    async fn create_document(
        &self,
        parent: &str,
        fields: &Map<String, Value>,
    ) -> Result<Document, StoreError> {
        let url = format!("{}/{}", self.documents_url, parent);
        let builder = self
            .request(Method::POST, &url)
            .json(&json!({ "fields": value::encode_fields(fields) }));
        self.send(builder, &url).await
    }

    async fn query_equal(
        &self,
        collection: &str,
        field: &str,
        expected: &str,
    ) -> Result<Vec<Document>, StoreError> {
        let url = format!("{}:runQuery", self.documents_url);
        let body = json!({
            "structuredQuery": {
                "from": [{ "collectionId": collection }],
                "where": {
                    "fieldFilter": {
                        "field": { "fieldPath": field },
                        "op": "EQUAL",
                        "value": { "stringValue": expected }
                    }
                }
            }
        });
        let results: Vec<QueryResult> = self
            .send(self.request(Method::POST, &url).json(&body), &url)
            .await?;
        Ok(results
            .into_iter()
            .filter_map(|result| result.document)
            .collect())
    }

    async fn list_documents(&self, collection: &str) -> Result<Vec<Document>, StoreError> {
        let url = format!("{}/{}", self.documents_url, collection);
        let mut documents = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut query = vec![("pageSize", LIST_PAGE_SIZE.to_string())];
            if let Some(token) = &page_token {
                query.push(("pageToken", token.clone()));
            }
            let page: ListResponse = match self
                .send(self.request(Method::GET, &url).query(&query), &url)
                .await
            {
                Ok(page) => page,
                Err(StoreError::NotFound(_)) => break,
                Err(err) => return Err(err),
            };
            documents.extend(page.documents);
            match page.next_page_token.filter(|token| !token.is_empty()) {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        Ok(documents)
    }
}

fn to_fields<T: Serialize>(value: &T) -> Result<Map<String, Value>, StoreError> {
    match serde_json::to_value(value) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(StoreError::Malformed(format!(
            "expected an object, got {}",
            other
        ))),
        Err(e) => Err(StoreError::Malformed(e.to_string())),
    }
}

fn from_json<T: DeserializeOwned>(value: Value) -> Result<T, StoreError> {
    serde_json::from_value(value).map_err(|e| StoreError::Malformed(e.to_string()))
}

fn equipment_fields(equipment: &Equipment) -> Result<Map<String, Value>, StoreError> {
    let mut fields = to_fields(equipment)?;
    fields.remove("id");
    Ok(fields)
}

#[async_trait]
impl ProfileStore for FirestoreClient {
    async fn get(&self, uid: &str) -> Result<Option<ProfileDocument>, StoreError> {
        self.get_document(&self.profile_collection, uid)
            .await?
            .map(|doc| from_json(doc.into_json("uid")))
            .transpose()
    }

    async fn merge(&self, uid: &str, patch: &ProfilePatch) -> Result<(), StoreError> {
        let mut patch = patch.clone();
        patch.email = patch.email.as_deref().map(normalize_email);
        let fields = to_fields(&patch)?;
        let mask = patch.field_names();
        self.patch_document(&self.profile_collection, uid, &fields, Some(&mask), false)
            .await?;
        Ok(())
    }

    async fn find_by_email(&self, email: &str) -> Result<Vec<ProfileDocument>, StoreError> {
        self.query_equal(&self.profile_collection, "email", &normalize_email(email))
            .await?
            .into_iter()
            .map(|doc| from_json(doc.into_json("uid")))
            .collect()
    }

    async fn update_many(
        &self,
        uids: &[String],
        patch: &ProfilePatch,
    ) -> Result<usize, StoreError> {
        let fields = to_fields(patch)?;
        let mask = patch.field_names();
        let mut updated = 0;
        for uid in uids {
            self.patch_document(&self.profile_collection, uid, &fields, Some(&mask), true)
                .await?;
            updated += 1;
        }
        Ok(updated)
    }
}

#[async_trait]
impl EquipmentRepository for FirestoreClient {
    async fn list_all(&self) -> Result<Vec<Equipment>, StoreError> {
        self.list_documents(&self.equipment_collection)
            .await?
            .into_iter()
            .map(|doc| from_json(doc.into_json("id")))
            .collect()
    }

    async fn get(&self, id: &str) -> Result<Option<Equipment>, StoreError> {
        self.get_document(&self.equipment_collection, id)
            .await?
            .map(|doc| from_json(doc.into_json("id")))
            .transpose()
    }

    async fn create(&self, equipment: &Equipment) -> Result<Equipment, StoreError> {
        let fields = equipment_fields(equipment)?;
        let doc = self
            .create_document(&self.equipment_collection, &fields)
            .await?;
        from_json(doc.into_json("id"))
    }

    async fn update(
        &self,
        equipment: &Equipment,
        changed_by: Option<String>,
    ) -> Result<Equipment, StoreError> {
        let before = EquipmentRepository::get(self, &equipment.id)
            .await?
            .ok_or_else(|| StoreError::NotFound(equipment.id.clone()))?;

        let fields = equipment_fields(equipment)?;
        let doc = self
            .patch_document(&self.equipment_collection, &equipment.id, &fields, None, true)
            .await?;
        let after: Equipment = from_json(doc.into_json("id"))?;

        let entry = EquipmentHistoryEntry {
            equipment_id: equipment.id.clone(),
            changed_by,
            changed_at: Utc::now(),
            before,
            after: after.clone(),
        };
        let parent = format!(
            "{}/{}/{}",
            self.equipment_collection, equipment.id, self.history_collection
        );
        match to_fields(&entry) {
            Ok(history) => {
                if let Err(err) = self.create_document(&parent, &history).await {
                    tracing::warn!(
                        error = %err,
                        equipment_id = %equipment.id,
                        "Failed to record equipment history"
                    );
                }
            }
            Err(err) => tracing::warn!(error = %err, "Failed to encode equipment history"),
        }

        Ok(after)
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        let url = self.document_url(&self.equipment_collection, id);
        let _: Value = self.send(self.request(Method::DELETE, &url), &url).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;
    use httpmock::prelude::*;

    const DOCS: &str = "/projects/inventario/databases/(default)/documents";

    fn client(server: &MockServer) -> FirestoreClient {
        let config = Config {
            project_id: "inventario".into(),
            firestore_base_url: server.base_url(),
            ..Config::default()
        };
        FirestoreClient::new(&config, None)
    }

    fn profile_doc(uid: &str, war_name: &str) -> Value {
        json!({
            "name": format!("projects/inventario/databases/(default)/documents/usuarios/{}", uid),
            "fields": {
                "email": {"stringValue": "silva@x.com"},
                "nomeGuerra": {"stringValue": war_name},
                "role": {"stringValue": "admin"}
            }
        })
    }

    #[tokio::test]
    async fn get_profile_decodes_fields_and_id() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path(format!("{}/usuarios/u1", DOCS));
                then.status(200).json_body(profile_doc("u1", "Silva"));
            })
            .await;

        let profile = ProfileStore::get(&client(&server), "u1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(profile.uid, "u1");
        assert_eq!(profile.war_name.as_deref(), Some("Silva"));
        assert_eq!(profile.role, Role::Admin);
    }

    #[tokio::test]
    async fn get_missing_profile_is_none() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path(format!("{}/usuarios/ghost", DOCS));
                then.status(404).json_body(json!({"error": {"code": 404}}));
            })
            .await;

        let profile = ProfileStore::get(&client(&server), "ghost").await.unwrap();
        assert!(profile.is_none());
    }

    #[tokio::test]
    async fn merge_sends_update_mask() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(httpmock::Method::PATCH)
                    .path(format!("{}/usuarios/u1", DOCS))
                    .query_param("updateMask.fieldPaths", "nomeGuerra")
                    .json_body_partial(r#"{"fields":{"nomeGuerra":{"stringValue":"Silva"}}}"#);
                then.status(200).json_body(profile_doc("u1", "Silva"));
            })
            .await;

        let patch = ProfilePatch {
            war_name: Some("Silva".into()),
            ..ProfilePatch::default()
        };
        client(&server).merge("u1", &patch).await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn find_by_email_skips_empty_results() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST)
                    .path(format!("{}:runQuery", DOCS))
                    .json_body_partial(
                        r#"{"structuredQuery":{"where":{"fieldFilter":{"value":{"stringValue":"silva@x.com"}}}}}"#,
                    );
                then.status(200).json_body(json!([
                    {"document": profile_doc("u1", "Silva"), "readTime": "2025-01-01T00:00:00Z"},
                    {"readTime": "2025-01-01T00:00:00Z"}
                ]));
            })
            .await;

        let found = client(&server).find_by_email("silva@x.com").await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].uid, "u1");
    }

    #[tokio::test]
    async fn email_is_lowercased_on_write_and_lookup() {
        let server = MockServer::start_async().await;
        let write = server
            .mock_async(|when, then| {
                when.method(httpmock::Method::PATCH)
                    .path(format!("{}/usuarios/u1", DOCS))
                    .json_body_partial(r#"{"fields":{"email":{"stringValue":"silva@x.com"}}}"#);
                then.status(200).json_body(profile_doc("u1", "Silva"));
            })
            .await;
        let query = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path(format!("{}:runQuery", DOCS))
                    .json_body_partial(
                        r#"{"structuredQuery":{"where":{"fieldFilter":{"value":{"stringValue":"silva@x.com"}}}}}"#,
                    );
                then.status(200)
                    .json_body(json!([{"document": profile_doc("u1", "Silva")}]));
            })
            .await;

        let store = client(&server);
        let patch = ProfilePatch {
            email: Some("Silva@X.com".into()),
            ..ProfilePatch::default()
        };
        store.merge("u1", &patch).await.unwrap();
        let found = store.find_by_email(" SILVA@x.com").await.unwrap();

        write.assert_async().await;
        query.assert_async().await;
        assert_eq!(found.len(), 1);
    }

    // The page-token mock is registered first so it wins for the second request.
    #[tokio::test]
    async fn list_all_follows_page_tokens() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET)
                    .path(format!("{}/computadores", DOCS))
                    .query_param("pageToken", "next");
                then.status(200).json_body(json!({
                    "documents": [{
                        "name": "projects/inventario/databases/(default)/documents/computadores/pc-2",
                        "fields": {"name": {"stringValue": "PC 2"}}
                    }]
                }));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET)
                    .path(format!("{}/computadores", DOCS))
                    .query_param("pageSize", "300");
                then.status(200).json_body(json!({
                    "documents": [{
                        "name": "projects/inventario/databases/(default)/documents/computadores/pc-1",
                        "fields": {
                            "name": {"stringValue": "PC 1"},
                            "type": {"stringValue": "Desktop"},
                            "section": {"stringValue": "TI"},
                            "ip": {"stringValue": "10.0.0.1"}
                        }
                    }],
                    "nextPageToken": "next"
                }));
            })
            .await;

        let records = client(&server).list_all().await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id, "pc-1");
        assert_eq!(records[0].kind.as_deref(), Some("Desktop"));
        assert_eq!(records[1].name, "PC 2");
    }

    #[tokio::test]
    async fn update_writes_history_entry() {
        let server = MockServer::start_async().await;
        let doc = json!({
            "name": "projects/inventario/databases/(default)/documents/computadores/pc-1",
            "fields": {"name": {"stringValue": "PC 1"}}
        });
        server
            .mock_async(|when, then| {
                when.method(GET).path(format!("{}/computadores/pc-1", DOCS));
                then.status(200).json_body(doc.clone());
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(httpmock::Method::PATCH)
                    .path(format!("{}/computadores/pc-1", DOCS));
                then.status(200).json_body(json!({
                    "name": "projects/inventario/databases/(default)/documents/computadores/pc-1",
                    "fields": {"name": {"stringValue": "PC Renomeado"}}
                }));
            })
            .await;
        let history = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path(format!("{}/computadores/pc-1/historico", DOCS))
                    .json_body_partial(r#"{"fields":{"changedBy":{"stringValue":"admin@x.com"}}}"#);
                then.status(200).json_body(json!({
                    "name": "projects/inventario/databases/(default)/documents/computadores/pc-1/historico/h1",
                    "fields": {}
                }));
            })
            .await;

        let updated = client(&server)
            .update(
                &Equipment {
                    id: "pc-1".into(),
                    name: "PC Renomeado".into(),
                    ..Equipment::default()
                },
                Some("admin@x.com".into()),
            )
            .await
            .unwrap();
        assert_eq!(updated.name, "PC Renomeado");
        history.assert_async().await;
    }

    #[tokio::test]
    async fn server_errors_are_rejections() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path(format!("{}/usuarios/u1", DOCS));
                then.status(403).body("PERMISSION_DENIED");
            })
            .await;

        let err = ProfileStore::get(&client(&server), "u1").await.unwrap_err();
        assert_eq!(
            err,
            StoreError::Rejected {
                status: 403,
                message: "PERMISSION_DENIED".into()
            }
        );
    }
}
