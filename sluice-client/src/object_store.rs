//! Object-store client
//!
//! Minimal S3 surface used for workspace staging and log retrieval. URLs are
//! path-style (`{endpoint}/{bucket}/{key}`) so the same client works against
//! S3-compatible emulators.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use sluice_core::ObjectUri;
use tracing::debug;

use crate::error::{ClientError, Result};
use crate::signing::{AwsCredentials, Signer};
use crate::{error_from_response, handle_empty_response};

const SERVICE: &str = "s3";

/// One object returned by a listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectSummary {
    pub key: String,
    pub size: u64,
    /// Entity tag without surrounding quotes
    pub etag: Option<String>,
}

/// A page of listed objects plus the continuation cursor
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectPage {
    pub objects: Vec<ObjectSummary>,
    pub next_token: Option<String>,
}

/// Operations the runner consumes from the object store
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Writes `body` at `uri`, replacing any existing object
    async fn put_object(&self, uri: &ObjectUri, body: Vec<u8>) -> Result<()>;

    /// Lists objects whose key starts with `prefix`, one page at a time
    ///
    /// # Arguments
    /// * `prefix` - Bucket and key prefix; the key is used verbatim
    /// * `continuation` - Cursor returned by the previous page, if any
    async fn list_objects(
        &self,
        prefix: &ObjectUri,
        continuation: Option<&str>,
    ) -> Result<ObjectPage>;

    /// Reads the full body of an object
    async fn get_object(&self, uri: &ObjectUri) -> Result<Vec<u8>>;

    /// Deletes one object; deleting a missing key succeeds
    async fn delete_object(&self, uri: &ObjectUri) -> Result<()>;
}

/// HTTP implementation of ObjectStore
#[derive(Debug, Clone)]
pub struct S3Client {
    client: Client,
    endpoint: String,
    signer: Option<Signer>,
    region: String,
}

impl S3Client {
    /// Creates a client for the regional endpoint
    pub fn new(region: impl Into<String>) -> Self {
        let region = region.into();
        Self {
            client: Client::new(),
            endpoint: format!("https://{}.{}.amazonaws.com", SERVICE, region),
            signer: None,
            region,
        }
    }

    /// Overrides the endpoint (e.g., MinIO or LocalStack)
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_credentials(mut self, credentials: AwsCredentials) -> Self {
        self.signer = Some(Signer::new(credentials, self.region.clone(), SERVICE));
        self
    }

    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Path-style URL with every key segment percent-encoded
    fn object_url(&self, uri: &ObjectUri) -> String {
        let key: String = uri
            .key()
            .split('/')
            .map(|segment| format!("/{}", urlencoding::encode(segment)))
            .collect();
        format!("{}/{}{}", self.endpoint, urlencoding::encode(uri.bucket()), key)
    }

    async fn send(&self, builder: RequestBuilder) -> Result<reqwest::Response> {
        let mut request = builder.build()?;
        if let Some(signer) = &self.signer {
            signer.sign(&mut request)?;
        }

        debug!("{} {}", request.method(), request.url());
        Ok(self.client.execute(request).await?)
    }
}

#[async_trait]
impl ObjectStore for S3Client {
    async fn put_object(&self, uri: &ObjectUri, body: Vec<u8>) -> Result<()> {
        if uri.key().is_empty() {
            return Err(ClientError::InvalidRequest(format!(
                "cannot put object at bucket root {uri}"
            )));
        }

        let response = self
            .send(self.client.put(self.object_url(uri)).body(body))
            .await?;
        handle_empty_response(response).await
    }

    async fn list_objects(
        &self,
        prefix: &ObjectUri,
        continuation: Option<&str>,
    ) -> Result<ObjectPage> {
        let mut url = format!(
            "{}/{}?list-type=2&prefix={}",
            self.endpoint,
            urlencoding::encode(prefix.bucket()),
            urlencoding::encode(&prefix.prefix())
        );
        if let Some(token) = continuation {
            url.push_str(&format!("&continuation-token={}", urlencoding::encode(token)));
        }

        let response = self.send(self.client.get(&url)).await?;
        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        let body = response.text().await?;
        parse_list_objects(&body)
    }

    async fn get_object(&self, uri: &ObjectUri) -> Result<Vec<u8>> {
        let response = self.send(self.client.get(self.object_url(uri))).await?;
        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        Ok(response.bytes().await?.to_vec())
    }

    async fn delete_object(&self, uri: &ObjectUri) -> Result<()> {
        let response = self.send(self.client.delete(self.object_url(uri))).await?;
        match handle_empty_response(response).await {
            Err(err) if err.is_not_found() => Ok(()),
            other => other,
        }
    }
}

/// Parses a `ListBucketResult` document
fn parse_list_objects(body: &str) -> Result<ObjectPage> {
    let doc = roxmltree::Document::parse(body)
        .map_err(|e| ClientError::ParseError(format!("Failed to parse listing: {}", e)))?;

    let root = doc.root_element();
    let mut objects = Vec::new();
    for contents in root.children().filter(|node| node.has_tag_name("Contents")) {
        let key = child_text(contents, "Key")
            .ok_or_else(|| ClientError::ParseError("listing entry without Key".to_string()))?;
        let size = child_text(contents, "Size")
            .map(|raw| {
                raw.parse::<u64>()
                    .map_err(|e| ClientError::ParseError(format!("invalid Size '{raw}': {e}")))
            })
            .transpose()?
            .unwrap_or_default();
        let etag = child_text(contents, "ETag").map(|tag| tag.trim_matches('"').to_string());

        objects.push(ObjectSummary { key, size, etag });
    }

    let truncated = child_text(root, "IsTruncated").is_some_and(|value| value == "true");
    let next_token = child_text(root, "NextContinuationToken")
        .filter(|token| truncated && !token.is_empty());

    Ok(ObjectPage { objects, next_token })
}

fn child_text(node: roxmltree::Node<'_, '_>, tag: &str) -> Option<String> {
    node.children()
        .find(|child| child.has_tag_name(tag))
        .and_then(|child| child.text())
        .map(str::to_string)
}
