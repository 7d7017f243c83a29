//! AWS Signature Version 4
//!
//! Signs a fully built `reqwest::Request` in place. The request URL must
//! already carry canonical percent-encoding (each path segment and query
//! component encoded with [`urlencoding::encode`]), which is how both clients
//! build their URLs.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use reqwest::header::{AUTHORIZATION, HeaderName, HeaderValue};
use sha2::{Digest, Sha256};

use crate::error::{ClientError, Result};

type HmacSha256 = Hmac<Sha256>;

const ALGORITHM: &str = "AWS4-HMAC-SHA256";
const X_AMZ_DATE: &str = "x-amz-date";
const X_AMZ_CONTENT_SHA256: &str = "x-amz-content-sha256";
const X_AMZ_SECURITY_TOKEN: &str = "x-amz-security-token";

/// Static credentials used to sign requests
#[derive(Clone)]
pub struct AwsCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
}

impl AwsCredentials {
    pub fn new(access_key_id: impl Into<String>, secret_access_key: impl Into<String>) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
            session_token: None,
        }
    }

    pub fn with_session_token(mut self, token: impl Into<String>) -> Self {
        self.session_token = Some(token.into());
        self
    }
}

impl std::fmt::Debug for AwsCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AwsCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("session_token", &self.session_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Signing scope for one service in one region
#[derive(Debug, Clone)]
pub struct Signer {
    credentials: AwsCredentials,
    region: String,
    service: String,
}

impl Signer {
    pub fn new(
        credentials: AwsCredentials,
        region: impl Into<String>,
        service: impl Into<String>,
    ) -> Self {
        Self {
            credentials,
            region: region.into(),
            service: service.into(),
        }
    }

    /// Signs `request` with the current time
    pub fn sign(&self, request: &mut reqwest::Request) -> Result<()> {
        self.sign_at(request, Utc::now())
    }

    /// Signs `request` as if sent at `now`
    pub fn sign_at(&self, request: &mut reqwest::Request, now: DateTime<Utc>) -> Result<()> {
        let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
        let date = now.format("%Y%m%d").to_string();

        let payload = request
            .body()
            .and_then(|body| body.as_bytes())
            .unwrap_or_default();
        let payload_hash = hex(&Sha256::digest(payload));

        let url = request.url();
        let host = match url.port() {
            Some(port) => format!("{}:{}", url.host_str().unwrap_or_default(), port),
            None => url.host_str().unwrap_or_default().to_string(),
        };

        let mut headers = vec![
            ("host".to_string(), host),
            (X_AMZ_CONTENT_SHA256.to_string(), payload_hash.clone()),
            (X_AMZ_DATE.to_string(), amz_date.clone()),
        ];
        if let Some(token) = &self.credentials.session_token {
            headers.push((X_AMZ_SECURITY_TOKEN.to_string(), token.clone()));
        }
        headers.sort();

        let canonical_headers: String = headers
            .iter()
            .map(|(name, value)| format!("{}:{}\n", name, value.trim()))
            .collect();
        let signed_headers = headers
            .iter()
            .map(|(name, _)| name.as_str())
            .collect::<Vec<_>>()
            .join(";");

        let path = if url.path().is_empty() { "/" } else { url.path() };
        let canonical_request = format!(
            "{}\n{}\n{}\n{}\n{}\n{}",
            request.method().as_str(),
            path,
            canonical_query(url.query().unwrap_or_default()),
            canonical_headers,
            signed_headers,
            payload_hash
        );

        let scope = format!("{}/{}/{}/aws4_request", date, self.region, self.service);
        let string_to_sign = format!(
            "{}\n{}\n{}\n{}",
            ALGORITHM,
            amz_date,
            scope,
            hex(&Sha256::digest(canonical_request.as_bytes()))
        );

        let mac = self.signing_key(&date)?.chain_update(string_to_sign);
        let signature = hex(&mac.finalize().into_bytes());
        let authorization = format!(
            "{} Credential={}/{}, SignedHeaders={}, Signature={}",
            ALGORITHM, self.credentials.access_key_id, scope, signed_headers, signature
        );

        for (name, value) in headers.into_iter().filter(|(name, _)| name != "host") {
            insert_header(request, &name, &value)?;
        }
        insert_header(request, AUTHORIZATION.as_str(), &authorization)?;

        Ok(())
    }

    /// HMAC keyed with the derived signing key for `date`
    fn signing_key(&self, date: &str) -> Result<HmacSha256> {
        let secret = format!("AWS4{}", self.credentials.secret_access_key);
        let k_date = hmac_sha256(secret.as_bytes(), date.as_bytes())?;
        let k_region = hmac_sha256(&k_date, self.region.as_bytes())?;
        let k_service = hmac_sha256(&k_region, self.service.as_bytes())?;
        let k_signing = hmac_sha256(&k_service, b"aws4_request")?;
        new_mac(&k_signing)
    }
}

/// Sorts already-encoded query pairs by name, then value
fn canonical_query(query: &str) -> String {
    let mut pairs: Vec<(&str, &str)> = query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| pair.split_once('=').unwrap_or((pair, "")))
        .collect();
    pairs.sort();

    pairs
        .iter()
        .map(|(name, value)| format!("{name}={value}"))
        .collect::<Vec<_>>()
        .join("&")
}

fn new_mac(key: &[u8]) -> Result<HmacSha256> {
    HmacSha256::new_from_slice(key)
        .map_err(|e| ClientError::InvalidRequest(format!("invalid signing key: {e}")))
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Result<Vec<u8>> {
    Ok(new_mac(key)?.chain_update(data).finalize().into_bytes().to_vec())
}

fn insert_header(request: &mut reqwest::Request, name: &str, value: &str) -> Result<()> {
    let name = HeaderName::from_bytes(name.as_bytes())
        .map_err(|e| ClientError::InvalidRequest(format!("invalid header name {name}: {e}")))?;
    let value = HeaderValue::from_str(value)
        .map_err(|e| ClientError::InvalidRequest(format!("invalid header value: {e}")))?;
    request.headers_mut().insert(name, value);
    Ok(())
}

pub(crate) fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn signer() -> Signer {
        Signer::new(
            AwsCredentials::new("AKIDEXAMPLE", "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY"),
            "us-east-1",
            "service",
        )
    }

    #[test]
    fn test_canonical_query_sorts_pairs() {
        assert_eq!(canonical_query("b=2&a=1&a=0"), "a=0&a=1&b=2");
        assert_eq!(canonical_query("list-type=2&prefix="), "list-type=2&prefix=");
        assert_eq!(canonical_query(""), "");
    }

    #[test]
    fn test_hex_encoding() {
        assert_eq!(hex(&[0x00, 0xab, 0x10]), "00ab10");
    }

    #[test]
    fn test_sign_sets_authorization_headers() {
        let client = reqwest::Client::new();
        let mut request = client
            .get("https://example.amazonaws.com/")
            .build()
            .unwrap();
        let now = Utc.with_ymd_and_hms(2015, 8, 30, 12, 36, 0).unwrap();

        signer().sign_at(&mut request, now).unwrap();

        let auth = request.headers()[AUTHORIZATION].to_str().unwrap();
        assert!(auth.starts_with(
            "AWS4-HMAC-SHA256 Credential=AKIDEXAMPLE/20150830/us-east-1/service/aws4_request, \
             SignedHeaders=host;x-amz-content-sha256;x-amz-date, Signature="
        ));
        assert_eq!(request.headers()[X_AMZ_DATE], "20150830T123600Z");
        assert_eq!(
            request.headers()[X_AMZ_CONTENT_SHA256],
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    fn signature(request: &reqwest::Request) -> &str {
        let auth = request.headers()[AUTHORIZATION].to_str().unwrap();
        auth.rsplit("Signature=").next().unwrap()
    }

    #[test]
    fn test_sign_known_answers() {
        let credentials =
            AwsCredentials::new("AKIDEXAMPLE", "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY");
        let now = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        let client = reqwest::Client::new();

        let mut list = client
            .get(
                "https://emr-serverless.eu-west-1.amazonaws.com\
                 /applications/app-1/jobruns/run-9/attempts?nextToken=abc%2F%3D",
            )
            .build()
            .unwrap();
        Signer::new(credentials.clone(), "eu-west-1", "emr-serverless")
            .sign_at(&mut list, now)
            .unwrap();
        assert_eq!(
            signature(&list),
            "ed7342cfdc30d5f56e4807f6c0e783645b7f08fa88e07b491ef84dd92cdc5530"
        );

        let mut put = client
            .put("https://s3.eu-west-1.amazonaws.com/bucket/ws/a%20b/main.py")
            .body("print(1)")
            .build()
            .unwrap();
        Signer::new(credentials, "eu-west-1", "s3")
            .sign_at(&mut put, now)
            .unwrap();
        assert_eq!(
            signature(&put),
            "f28d8df7a6b623cb2b1f1e53e6a3b8cceb3ee50fb76d138d2a9442f984a2cef2"
        );
    }

    #[test]
    fn test_sign_adds_session_token() {
        let signer = Signer::new(
            AwsCredentials::new("AKID", "secret").with_session_token("token"),
            "eu-west-1",
            "s3",
        );
        let client = reqwest::Client::new();
        let mut request = client
            .put("https://s3.eu-west-1.amazonaws.com/bucket/key")
            .body("hello")
            .build()
            .unwrap();

        signer.sign(&mut request).unwrap();

        assert_eq!(request.headers()[X_AMZ_SECURITY_TOKEN], "token");
        let auth = request.headers()[AUTHORIZATION].to_str().unwrap();
        assert!(auth.contains(
            "SignedHeaders=host;x-amz-content-sha256;x-amz-date;x-amz-security-token"
        ));
    }

    #[test]
    fn test_debug_redacts_secret() {
        let creds = AwsCredentials::new("AKID", "super-secret");
        assert!(!format!("{creds:?}").contains("super-secret"));
    }
}
