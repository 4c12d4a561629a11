//! Hosted store client
//!
//! Tables are reached through the PostgREST interface (`/rest/v1/{table}`,
//! `eq.` filters, `Prefer: return=representation`) and files through the
//! storage interface (`/storage/v1/object/{bucket}/{path}`). Every request
//! carries the service key as both `apikey` and bearer token.

use async_trait::async_trait;
use classboard_common::models::{
    ClassKey, ClassRecord, NewClass, NewNoteUpload, NewReminder, NewScheduleUpload, NoteUpload,
    Reminder, ScheduleUpload,
};
use classboard_common::OwnerId;
use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

use super::{join_path, Bucket, NoteFilter, ObjectStore, Store, StoreError, StoreResult};

const CLASSES: &str = "classes";
const NOTES_UPLOADS: &str = "notes_uploads";
const REMINDERS: &str = "reminders";
const SCHEDULE_UPLOADS: &str = "schedule_uploads";

const NEWEST_FIRST: &str = "created_at.desc,id.desc";

/// Page size of a storage folder listing
const LIST_LIMIT: usize = 1000;

type Filters = Vec<(&'static str, String)>;

fn eq(value: impl std::fmt::Display) -> String {
    format!("eq.{}", value)
}

fn owned_by(owner: OwnerId) -> Filters {
    vec![("user_id", eq(owner))]
}

/// Hosted store client
pub struct RestStore {
    base_url: String,
    service_key: String,
    client: reqwest::Client,
}

impl RestStore {
    pub fn new(base_url: &str, service_key: &str, timeout: Duration) -> StoreResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| StoreError::Network(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            service_key: service_key.to_string(),
            client,
        })
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn object_url(&self, bucket: Bucket, path: &str) -> String {
        format!(
            "{}/storage/v1/object/{}/{}",
            self.base_url,
            bucket.as_str(),
            path.trim_start_matches('/')
        )
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        self.client
            .request(method, url)
            .header("apikey", &self.service_key)
            .bearer_auth(&self.service_key)
    }

    async fn send(&self, request: RequestBuilder) -> StoreResult<Response> {
        let response = request
            .send()
            .await
            .map_err(|e| StoreError::Network(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = error_message(&body)
            .or_else(|| {
                let trimmed = body.trim();
                (!trimmed.is_empty()).then(|| trimmed.to_string())
            })
            .unwrap_or_else(|| {
                status
                    .canonical_reason()
                    .unwrap_or("request failed")
                    .to_string()
            });

        if status == reqwest::StatusCode::NOT_FOUND || is_missing_object(&body) {
            return Err(StoreError::NotFound(message));
        }

        Err(StoreError::Api {
            status: status.as_u16(),
            message,
        })
    }

    async fn rows<T: DeserializeOwned>(response: Response) -> StoreResult<Vec<T>> {
        response
            .json::<Vec<T>>()
            .await
            .map_err(|e| StoreError::Parse(e.to_string()))
    }

    async fn select<T: DeserializeOwned>(&self, table: &str, filters: Filters) -> StoreResult<Vec<T>> {
        debug!(table, ?filters, "Store select");
        let request = self
            .request(Method::GET, &self.table_url(table))
            .query(&[("select", "*")])
            .query(&filters);
        Self::rows(self.send(request).await?).await
    }

    async fn insert<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        table: &str,
        body: &B,
    ) -> StoreResult<Vec<T>> {
        debug!(table, "Store insert");
        let request = self
            .request(Method::POST, &self.table_url(table))
            .header("Prefer", "return=representation")
            .json(body);
        Self::rows(self.send(request).await?).await
    }

    async fn update<T: DeserializeOwned>(
        &self,
        table: &str,
        filters: Filters,
        body: &Value,
    ) -> StoreResult<Vec<T>> {
        debug!(table, ?filters, "Store update");
        let request = self
            .request(Method::PATCH, &self.table_url(table))
            .header("Prefer", "return=representation")
            .query(&filters)
            .json(body);
        Self::rows(self.send(request).await?).await
    }

    async fn delete(&self, table: &str, filters: Filters) -> StoreResult<u64> {
        debug!(table, ?filters, "Store delete");
        let request = self
            .request(Method::DELETE, &self.table_url(table))
            .header("Prefer", "return=representation")
            .query(&filters);
        let deleted: Vec<Value> = Self::rows(self.send(request).await?).await?;
        Ok(deleted.len() as u64)
    }

    async fn insert_one<T: DeserializeOwned, B: Serialize>(
        &self,
        table: &str,
        body: &B,
    ) -> StoreResult<T> {
        self.insert::<T, _>(table, &[body])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::Parse(format!("Insert into {} returned no row", table)))
    }
}

/// Message field of a hosted error body, if there is one
fn error_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    ["message", "error_description", "error", "msg"]
        .iter()
        .find_map(|key| value.get(*key).and_then(Value::as_str))
        .map(str::to_string)
}

/// Entry of a storage folder listing; sub-folders carry no id
#[derive(Debug, Deserialize)]
struct ListedObject {
    name: String,
    #[serde(default)]
    id: Option<Value>,
}

fn listed_files(folder: &str, entries: Vec<ListedObject>) -> Vec<String> {
    entries
        .into_iter()
        .filter(|entry| entry.id.as_ref().is_some_and(|id| !id.is_null()))
        .map(|entry| join_path(folder, &entry.name))
        .collect()
}

// The storage API reports a missing object as 400 with a not_found body.
fn is_missing_object(body: &str) -> bool {
    let lower = body.to_ascii_lowercase();
    lower.contains("not_found") || lower.contains("object not found")
}

#[async_trait]
impl Store for RestStore {
    async fn list_classes(&self, owner: OwnerId) -> StoreResult<Vec<ClassRecord>> {
        let mut filters = owned_by(owner);
        filters.push(("order", "id.asc".to_string()));
        self.select(CLASSES, filters).await
    }

    async fn find_class(&self, key: &ClassKey) -> StoreResult<Option<ClassRecord>> {
        let mut filters = owned_by(key.owner);
        filters.push(("class_code", eq(&key.class_code)));
        filters.push(("days_of_week", eq(&key.days_of_week)));
        filters.push(("start_time", eq(&key.start_time)));
        filters.push(("limit", "1".to_string()));
        Ok(self.select(CLASSES, filters).await?.into_iter().next())
    }

    async fn find_class_by_code(
        &self,
        owner: OwnerId,
        class_code: &str,
    ) -> StoreResult<Option<ClassRecord>> {
        let mut filters = owned_by(owner);
        filters.push(("class_code", eq(class_code)));
        filters.push(("order", "id.asc".to_string()));
        filters.push(("limit", "1".to_string()));
        Ok(self.select(CLASSES, filters).await?.into_iter().next())
    }

    async fn insert_classes(&self, rows: &[NewClass]) -> StoreResult<Vec<ClassRecord>> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        self.insert(CLASSES, rows).await
    }

    async fn delete_classes(&self, owner: OwnerId) -> StoreResult<u64> {
        self.delete(CLASSES, owned_by(owner)).await
    }

    async fn list_note_uploads(
        &self,
        owner: OwnerId,
        filter: &NoteFilter,
    ) -> StoreResult<Vec<NoteUpload>> {
        let mut filters = owned_by(owner);
        if let Some(date) = filter.class_date {
            filters.push(("class_date", eq(date.format("%Y-%m-%d"))));
        }
        if let Some(code) = &filter.class_code {
            filters.push(("class_code", eq(code)));
        }
        filters.push(("order", NEWEST_FIRST.to_string()));
        self.select(NOTES_UPLOADS, filters).await
    }

    async fn insert_note_upload(&self, row: &NewNoteUpload) -> StoreResult<NoteUpload> {
        self.insert_one(NOTES_UPLOADS, row).await
    }

    async fn delete_note_uploads(&self, owner: OwnerId) -> StoreResult<u64> {
        self.delete(NOTES_UPLOADS, owned_by(owner)).await
    }

    async fn list_reminders(
        &self,
        owner: OwnerId,
        unresolved_only: bool,
    ) -> StoreResult<Vec<Reminder>> {
        let mut filters = owned_by(owner);
        if unresolved_only {
            filters.push(("resolved", "is.false".to_string()));
        }
        filters.push(("order", NEWEST_FIRST.to_string()));
        self.select(REMINDERS, filters).await
    }

    async fn insert_reminder(&self, row: &NewReminder) -> StoreResult<Reminder> {
        self.insert_one(REMINDERS, row).await
    }

    async fn resolve_reminder(&self, owner: OwnerId, id: i64) -> StoreResult<Reminder> {
        let mut filters = owned_by(owner);
        filters.push(("id", eq(id)));
        self.update::<Reminder>(REMINDERS, filters, &json!({ "resolved": true }))
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::NotFound(format!("Reminder {}", id)))
    }

    async fn delete_reminder(&self, owner: OwnerId, id: i64) -> StoreResult<()> {
        let mut filters = owned_by(owner);
        filters.push(("id", eq(id)));
        match self.delete(REMINDERS, filters).await? {
            0 => Err(StoreError::NotFound(format!("Reminder {}", id))),
            _ => Ok(()),
        }
    }

    async fn delete_reminders(&self, owner: OwnerId) -> StoreResult<u64> {
        self.delete(REMINDERS, owned_by(owner)).await
    }

    async fn insert_schedule_upload(
        &self,
        row: &NewScheduleUpload,
    ) -> StoreResult<ScheduleUpload> {
        self.insert_one(SCHEDULE_UPLOADS, row).await
    }

    async fn list_schedule_uploads(&self, owner: OwnerId) -> StoreResult<Vec<ScheduleUpload>> {
        let mut filters = owned_by(owner);
        filters.push(("order", NEWEST_FIRST.to_string()));
        self.select(SCHEDULE_UPLOADS, filters).await
    }

    async fn delete_schedule_uploads(&self, owner: OwnerId) -> StoreResult<u64> {
        self.delete(SCHEDULE_UPLOADS, owned_by(owner)).await
    }
}

#[async_trait]
impl ObjectStore for RestStore {
    async fn upload(
        &self,
        bucket: Bucket,
        path: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> StoreResult<()> {
        debug!(bucket = bucket.as_str(), path, size = bytes.len(), "Storage upload");
        let request = self
            .request(Method::POST, &self.object_url(bucket, path))
            .header("x-upsert", "true")
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(bytes);
        self.send(request).await?;
        Ok(())
    }

    async fn download(&self, bucket: Bucket, path: &str) -> StoreResult<Vec<u8>> {
        debug!(bucket = bucket.as_str(), path, "Storage download");
        let response = self
            .send(self.request(Method::GET, &self.object_url(bucket, path)))
            .await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| StoreError::Network(e.to_string()))?;
        Ok(bytes.to_vec())
    }

    async fn list(&self, bucket: Bucket, folder: &str) -> StoreResult<Vec<String>> {
        debug!(bucket = bucket.as_str(), folder, "Storage list");
        let url = format!("{}/storage/v1/object/list/{}", self.base_url, bucket.as_str());
        let mut files = Vec::new();
        let mut offset = 0;

        loop {
            let request = self.request(Method::POST, &url).json(&json!({
                "prefix": folder.trim_matches('/'),
                "limit": LIST_LIMIT,
                "offset": offset,
                "sortBy": { "column": "name", "order": "asc" },
            }));
            let page: Vec<ListedObject> = Self::rows(self.send(request).await?).await?;
            let page_len = page.len();
            files.extend(listed_files(folder, page));

            if page_len < LIST_LIMIT {
                return Ok(files);
            }
            offset += page_len;
        }
    }

    async fn remove(&self, bucket: Bucket, paths: &[String]) -> StoreResult<()> {
        if paths.is_empty() {
            return Ok(());
        }
        debug!(bucket = bucket.as_str(), count = paths.len(), "Storage remove");
        let url = format!("{}/storage/v1/object/{}", self.base_url, bucket.as_str());
        let request = self
            .request(Method::DELETE, &url)
            .json(&json!({ "prefixes": paths }));
        self.send(request).await?;
        Ok(())
    }

    fn public_url(&self, bucket: Bucket, path: &str) -> String {
        format!(
            "{}/storage/v1/object/public/{}/{}",
            self.base_url,
            bucket.as_str(),
            path.trim_start_matches('/')
        )
    }
}
