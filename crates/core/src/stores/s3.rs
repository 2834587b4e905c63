//! S3-compatible blob store (MinIO, AWS S3) over the REST API.
//!
//! Requests are path-style (`{endpoint}/{bucket}/{key}`) and signed with AWS
//! Signature Version 4 using `hmac` + `sha2`.

use crate::models::PDF_CONTENT_TYPE;
use crate::traits::BlobStore;
use crate::StoreError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use reqwest::{Client, Method, StatusCode};
use sha2::{Digest, Sha256};
use url::Url;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone)]
pub struct S3Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
}

impl S3Credentials {
    pub fn new(access_key_id: impl Into<String>, secret_access_key: impl Into<String>) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
            session_token: None,
        }
    }
}

pub struct S3BlobStore {
    client: Client,
    endpoint: Url,
    region: String,
    credentials: S3Credentials,
}

impl S3BlobStore {
    pub fn new(
        endpoint: &str,
        region: impl Into<String>,
        credentials: S3Credentials,
    ) -> Result<Self, StoreError> {
        Ok(Self {
            client: Client::new(),
            endpoint: Url::parse(endpoint)?,
            region: region.into(),
            credentials,
        })
    }

    fn host(&self) -> Result<String, StoreError> {
        let host = self
            .endpoint
            .host_str()
            .ok_or_else(|| StoreError::Request(format!("endpoint {} has no host", self.endpoint)))?;
        Ok(match self.endpoint.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        })
    }

    fn canonical_uri(bucket: &str, key: &str) -> String {
        let encoded_key = key.split('/').map(uri_encode).collect::<Vec<_>>().join("/");
        format!("/{}/{}", uri_encode(bucket), encoded_key)
    }

    async fn send(
        &self,
        method: Method,
        bucket: &str,
        key: &str,
        body: Option<&[u8]>,
    ) -> Result<reqwest::Response, StoreError> {
        self.send_with(method, bucket, key, body, &[]).await
    }

    async fn send_with(
        &self,
        method: Method,
        bucket: &str,
        key: &str,
        body: Option<&[u8]>,
        extra_headers: &[(&str, &str)],
    ) -> Result<reqwest::Response, StoreError> {
        let canonical_uri = Self::canonical_uri(bucket, key);
        let host = self.host()?;
        let payload_hash = hex_sha256(body.unwrap_or_default());
        let signed = sign_request(&SigningInput {
            method: method.as_str(),
            canonical_uri: &canonical_uri,
            host: &host,
            payload_hash: &payload_hash,
            region: &self.region,
            credentials: &self.credentials,
            now: Utc::now(),
        })?;

        let url = self.endpoint.join(canonical_uri.trim_start_matches('/'))?;
        let mut request = self
            .client
            .request(method, url)
            .header("Authorization", signed.authorization)
            .header("x-amz-content-sha256", payload_hash)
            .header("x-amz-date", signed.amz_date);

        if let Some(token) = &self.credentials.session_token {
            request = request.header("x-amz-security-token", token);
        }
        for (name, value) in extra_headers {
            request = request.header(*name, *value);
        }
        if let Some(body) = body {
            request = request
                .header("Content-Type", PDF_CONTENT_TYPE)
                .body(body.to_vec());
        }

        Ok(request.send().await?)
    }
}

fn backend_failure(operation: &str, bucket: &str, key: &str, status: StatusCode) -> StoreError {
    StoreError::BackendResponse {
        backend: "s3".to_string(),
        details: format!("{operation} {bucket}/{key} returned {status}"),
    }
}

#[async_trait]
impl BlobStore for S3BlobStore {
    async fn put(&self, bucket: &str, key: &str, data: &[u8]) -> Result<(), StoreError> {
        // Conditional write: the object must not exist yet.
        let response = self
            .send_with(Method::PUT, bucket, key, Some(data), &[("If-None-Match", "*")])
            .await?;
        if matches!(
            response.status(),
            StatusCode::PRECONDITION_FAILED | StatusCode::CONFLICT
        ) {
            return Err(StoreError::Conflict(format!(
                "object {bucket}/{key} already exists"
            )));
        }
        if !response.status().is_success() {
            return Err(backend_failure("PutObject", bucket, key, response.status()));
        }
        Ok(())
    }

    async fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StoreError> {
        let response = self.send(Method::GET, bucket, key, None).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(StoreError::NotFound(format!("object {bucket}/{key}")));
        }
        if !response.status().is_success() {
            return Err(backend_failure("GetObject", bucket, key, response.status()));
        }
        Ok(response.bytes().await?.to_vec())
    }

    async fn delete(&self, bucket: &str, key: &str) -> Result<(), StoreError> {
        let response = self.send(Method::DELETE, bucket, key, None).await?;
        if !response.status().is_success() {
            return Err(backend_failure("DeleteObject", bucket, key, response.status()));
        }
        Ok(())
    }
}

struct SigningInput<'a> {
    method: &'a str,
    canonical_uri: &'a str,
    host: &'a str,
    payload_hash: &'a str,
    region: &'a str,
    credentials: &'a S3Credentials,
    now: DateTime<Utc>,
}

struct SignedRequest {
    authorization: String,
    amz_date: String,
}

fn canonical_request(input: &SigningInput<'_>, amz_date: &str) -> (String, String) {
    let mut headers = vec![
        ("host", input.host.to_string()),
        ("x-amz-content-sha256", input.payload_hash.to_string()),
        ("x-amz-date", amz_date.to_string()),
    ];
    if let Some(token) = &input.credentials.session_token {
        headers.push(("x-amz-security-token", token.clone()));
    }
    headers.sort_by(|left, right| left.0.cmp(right.0));

    let signed_headers = headers
        .iter()
        .map(|(name, _)| *name)
        .collect::<Vec<_>>()
        .join(";");
    let canonical_headers: String = headers
        .iter()
        .map(|(name, value)| format!("{name}:{value}\n"))
        .collect();

    let request = format!(
        "{}\n{}\n\n{}\n{}\n{}",
        input.method, input.canonical_uri, canonical_headers, signed_headers, input.payload_hash
    );
    (request, signed_headers)
}

fn sign_request(input: &SigningInput<'_>) -> Result<SignedRequest, StoreError> {
    let date_stamp = input.now.format("%Y%m%d").to_string();
    let amz_date = input.now.format("%Y%m%dT%H%M%SZ").to_string();

    let (request, signed_headers) = canonical_request(input, &amz_date);
    let scope = format!("{date_stamp}/{}/s3/aws4_request", input.region);
    let string_to_sign = format!(
        "AWS4-HMAC-SHA256\n{amz_date}\n{scope}\n{}",
        hex_sha256(request.as_bytes())
    );

    let signing_key = derive_signing_key(
        &input.credentials.secret_access_key,
        &date_stamp,
        input.region,
        "s3",
    )?;
    let signature = hex::encode(hmac_sha256(&signing_key, string_to_sign.as_bytes())?);

    Ok(SignedRequest {
        authorization: format!(
            "AWS4-HMAC-SHA256 Credential={}/{scope}, SignedHeaders={signed_headers}, Signature={signature}",
            input.credentials.access_key_id
        ),
        amz_date,
    })
}

fn hex_sha256(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Result<Vec<u8>, StoreError> {
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|error| StoreError::Request(format!("hmac key rejected: {error}")))?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}

fn derive_signing_key(
    secret_key: &str,
    date_stamp: &str,
    region: &str,
    service: &str,
) -> Result<Vec<u8>, StoreError> {
    let k_date = hmac_sha256(format!("AWS4{secret_key}").as_bytes(), date_stamp.as_bytes())?;
    let k_region = hmac_sha256(&k_date, region.as_bytes())?;
    let k_service = hmac_sha256(&k_region, service.as_bytes())?;
    hmac_sha256(&k_service, b"aws4_request")
}

/// RFC 3986 encoding; only `A-Z a-z 0-9 - _ . ~` pass through.
fn uri_encode(value: &str) -> String {
    let mut encoded = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                encoded.push(byte as char)
            }
            _ => encoded.push_str(&format!("%{byte:02X}")),
        }
    }
    encoded
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn signing_key_matches_published_vector() -> Result<(), StoreError> {
        let key = derive_signing_key(
            "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY",
            "20120215",
            "us-east-1",
            "iam",
        )?;
        assert_eq!(
            hex::encode(key),
            "f4780e2d9f65fa895f9c67b32ce1baf0b0d8a43505a000a1a9e090d414db404d"
        );
        Ok(())
    }

    #[test]
    fn object_keys_are_encoded_per_segment() {
        assert_eq!(
            S3BlobStore::canonical_uri("pdf", "reports/Q1 summary (final).pdf"),
            "/pdf/reports/Q1%20summary%20%28final%29.pdf"
        );
        assert_eq!(uri_encode("a~b_c-d.e"), "a~b_c-d.e");
    }

    #[test]
    fn canonical_request_signs_sorted_headers() {
        let mut credentials = S3Credentials::new("AKID", "secret");
        credentials.session_token = Some("token".to_string());
        let input = SigningInput {
            method: "GET",
            canonical_uri: "/pdf/doc.pdf",
            host: "localhost:9000",
            payload_hash: "e3b0",
            region: "us-east-1",
            credentials: &credentials,
            now: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
        };

        let (request, signed_headers) = canonical_request(&input, "20240501T120000Z");
        assert_eq!(
            signed_headers,
            "host;x-amz-content-sha256;x-amz-date;x-amz-security-token"
        );
        assert!(request.starts_with("GET\n/pdf/doc.pdf\n\nhost:localhost:9000\n"));
        assert!(request.ends_with("\ne3b0"));

        let signed = sign_request(&input).unwrap();
        assert_eq!(signed.amz_date, "20240501T120000Z");
        assert!(signed
            .authorization
            .starts_with("AWS4-HMAC-SHA256 Credential=AKID/20240501/us-east-1/s3/aws4_request"));
    }

    #[test]
    fn endpoint_host_keeps_port() -> Result<(), StoreError> {
        let store = S3BlobStore::new(
            "http://minio:9000",
            "us-east-1",
            S3Credentials::new("minioadmin", "minioadmin"),
        )?;
        assert_eq!(store.host()?, "minio:9000");
        Ok(())
    }
}
