//! HTTP client for a directory endpoint.
//!
//! One client speaks every capability; which ones a caller uses depends on
//! which side of replication the endpoint sits on.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::net::TcpStream;
use tracing::{debug, error};
use url::Url;

use crate::capabilities::{
    DirectoryExporter, DirectoryImporter, DirectoryReader, DirectoryWriter, ExportStream,
};
use crate::endpoint::{base_url, socket_address};
use crate::error::{DirectoryError, DirectoryResult};
use crate::ndjson::decode_lines;
use crate::records::{
    ExportRequest, ImportCounts, ImportRequest, Object, ObjectType, Permission, Relation,
    RelationType,
};

const TENANT_HEADER: &str = "x-tenant-id";
const SESSION_HEADER: &str = "x-session-id";
const NDJSON: &str = "application/x-ndjson";

/// Everything needed to open a connection to a directory endpoint.
#[derive(Clone)]
pub struct ConnectParams {
    /// `host:port` or full URL.
    pub address: String,
    pub api_key: String,
    pub tenant_id: String,
    pub session_id: String,
    /// Skip TLS certificate verification.
    pub insecure: bool,
    /// Connect timeout, and request timeout for point calls.
    pub timeout: Duration,
}

impl std::fmt::Debug for ConnectParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectParams")
            .field("address", &self.address)
            .field("tenant_id", &self.tenant_id)
            .field("session_id", &self.session_id)
            .field("insecure", &self.insecure)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

/// Open a client, failing fast if the endpoint does not accept connections.
pub async fn connect(params: &ConnectParams) -> DirectoryResult<DirectoryClient> {
    let base = base_url(&params.address)?;
    let target = socket_address(&base)?;

    match tokio::time::timeout(params.timeout, TcpStream::connect(target.as_str())).await {
        Ok(Ok(_)) => {}
        Ok(Err(e)) => {
            return Err(DirectoryError::Connect(format!("{}: {}", target, e)));
        }
        Err(_) => {
            return Err(DirectoryError::Connect(format!(
                "{}: timed out after {:?}",
                target, params.timeout
            )));
        }
    }

    let http_client = reqwest::Client::builder()
        .default_headers(metadata_headers(params)?)
        .connect_timeout(params.timeout)
        .danger_accept_invalid_certs(params.insecure)
        .build()?;

    debug!(endpoint = %base, insecure = params.insecure, "Directory client connected");

    Ok(DirectoryClient {
        http_client,
        base,
        timeout: params.timeout,
    })
}

fn metadata_headers(params: &ConnectParams) -> DirectoryResult<HeaderMap> {
    let mut headers = HeaderMap::new();

    if !params.api_key.is_empty() {
        let mut value = header_value(&format!("basic {}", params.api_key))?;
        value.set_sensitive(true);
        headers.insert(AUTHORIZATION, value);
    }
    if !params.tenant_id.is_empty() {
        headers.insert(
            HeaderName::from_static(TENANT_HEADER),
            header_value(&params.tenant_id)?,
        );
    }
    headers.insert(
        HeaderName::from_static(SESSION_HEADER),
        header_value(&params.session_id)?,
    );

    Ok(headers)
}

fn header_value(raw: &str) -> DirectoryResult<HeaderValue> {
    HeaderValue::from_str(raw)
        .map_err(|e| DirectoryError::Connect(format!("invalid metadata value: {}", e)))
}

/// Connected directory endpoint.
#[derive(Clone)]
pub struct DirectoryClient {
    http_client: reqwest::Client,
    base: Url,
    timeout: Duration,
}

impl DirectoryClient {
    pub fn base_url(&self) -> &Url {
        &self.base
    }

    fn url(&self, segments: &[&str]) -> DirectoryResult<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| DirectoryError::InvalidAddress(self.base.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn relation_url(&self, relation: &Relation) -> DirectoryResult<Url> {
        let mut url = self.url(&["relations"])?;
        url.query_pairs_mut()
            .append_pair("object_type", &relation.object_type)
            .append_pair("object_id", &relation.object_id)
            .append_pair("relation", &relation.relation)
            .append_pair("subject_type", &relation.subject_type)
            .append_pair("subject_id", &relation.subject_id);
        Ok(url)
    }

    async fn set<T: Serialize + Sync>(&self, collection: &str, body: &T) -> DirectoryResult<()> {
        let response = self
            .http_client
            .post(self.url(&[collection])?)
            .timeout(self.timeout)
            .json(body)
            .send()
            .await?;

        check_response(response).await?;
        Ok(())
    }

    async fn delete(&self, url: Url) -> DirectoryResult<()> {
        let response = self
            .http_client
            .delete(url)
            .timeout(self.timeout)
            .send()
            .await?;

        check_response(response).await?;
        Ok(())
    }

    async fn get_optional<T: DeserializeOwned>(&self, url: Url) -> DirectoryResult<Option<T>> {
        let response = self
            .http_client
            .get(url)
            .timeout(self.timeout)
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let response = check_response(response).await?;
        Ok(Some(response.json().await?))
    }
}

/// Map a non-success status to [`DirectoryError::Api`].
async fn check_response(response: reqwest::Response) -> DirectoryResult<reqwest::Response> {
    if !response.status().is_success() {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        error!("Directory request failed: {} - {}", status, body);
        return Err(DirectoryError::Api {
            status,
            message: body,
        });
    }
    Ok(response)
}

#[async_trait]
impl DirectoryExporter for DirectoryClient {
    async fn export(&self, request: ExportRequest) -> DirectoryResult<ExportStream> {
        debug!(
            options = request.options.bits(),
            start_from = request.start_from,
            page_size = ?request.page_size,
            "Opening export stream"
        );

        // No request deadline: a full export can legitimately run for a long time.
        let response = self
            .http_client
            .post(self.url(&["export"])?)
            .json(&request)
            .send()
            .await?;

        let response = check_response(response).await?;
        Ok(decode_lines(response.bytes_stream()))
    }
}

#[async_trait]
impl DirectoryImporter for DirectoryClient {
    async fn import(&self, requests: Vec<ImportRequest>) -> DirectoryResult<ImportCounts> {
        let mut body = String::new();
        for request in &requests {
            body.push_str(&serde_json::to_string(request)?);
            body.push('\n');
        }

        debug!(count = requests.len(), "Importing records");

        let response = self
            .http_client
            .post(self.url(&["import"])?)
            .header(CONTENT_TYPE, NDJSON)
            .body(body)
            .send()
            .await?;

        let response = check_response(response).await?;
        Ok(response.json().await?)
    }
}

#[async_trait]
impl DirectoryReader for DirectoryClient {
    async fn get_object(&self, object_type: &str, id: &str) -> DirectoryResult<Option<Object>> {
        self.get_optional(self.url(&["objects", object_type, id])?)
            .await
    }

    async fn get_relation(&self, relation: &Relation) -> DirectoryResult<Option<Relation>> {
        self.get_optional(self.relation_url(relation)?).await
    }
}

#[async_trait]
impl DirectoryWriter for DirectoryClient {
    async fn set_object_type(&self, object_type: &ObjectType) -> DirectoryResult<()> {
        self.set("object_types", object_type).await
    }

    async fn set_relation_type(&self, relation_type: &RelationType) -> DirectoryResult<()> {
        self.set("relation_types", relation_type).await
    }

    async fn set_permission(&self, permission: &Permission) -> DirectoryResult<()> {
        self.set("permissions", permission).await
    }

    async fn set_object(&self, object: &Object) -> DirectoryResult<()> {
        self.set("objects", object).await
    }

    async fn set_relation(&self, relation: &Relation) -> DirectoryResult<()> {
        self.set("relations", relation).await
    }

    async fn delete_object(&self, object_type: &str, id: &str) -> DirectoryResult<()> {
        self.delete(self.url(&["objects", object_type, id])?).await
    }

    async fn delete_relation(&self, relation: &Relation) -> DirectoryResult<()> {
        self.delete(self.relation_url(relation)?).await
    }
}

impl std::fmt::Debug for DirectoryClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectoryClient")
            .field("base", &self.base.as_str())
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}
