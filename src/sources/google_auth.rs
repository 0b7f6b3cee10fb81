//! Google OAuth "authorized user" credentials.
//!
//! Reads the token file written by Google's installed-app consent flow
//! (`token`, `refresh_token`, `token_uri`, `client_id`, `client_secret`,
//! `scopes`, `expiry`). An expired access token is refreshed in memory
//! when a refresh token is available; the file itself is never rewritten.

use std::path::Path;

use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::error::SourceError;

pub const GMAIL_READONLY_SCOPE: &str = "https://www.googleapis.com/auth/gmail.readonly";
pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Scopes that grant at least read access to the mailbox.
const READ_CAPABLE_SCOPES: &[&str] = &[
    GMAIL_READONLY_SCOPE,
    "https://www.googleapis.com/auth/gmail.modify",
    "https://mail.google.com/",
];

/// Tokens this close to expiry are treated as expired.
const EXPIRY_SKEW_SECS: i64 = 60;

const NAME: &str = "gmail";

#[derive(Debug, Deserialize)]
struct AuthorizedUserFile {
    #[serde(default, alias = "access_token")]
    token: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    token_uri: Option<String>,
    #[serde(default)]
    client_id: Option<String>,
    #[serde(default)]
    client_secret: Option<String>,
    #[serde(default)]
    scopes: Vec<String>,
    #[serde(default)]
    expiry: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ClientSecretsFile {
    #[serde(alias = "web")]
    installed: ClientSecrets,
}

#[derive(Debug, Deserialize)]
struct ClientSecrets {
    client_id: String,
    client_secret: String,
    #[serde(default)]
    token_uri: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct RefreshError {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

/// Credentials for calling the Gmail API on behalf of one user.
#[derive(Debug, Clone)]
pub struct GoogleCredentials {
    access_token: Option<SecretString>,
    refresh_token: Option<SecretString>,
    token_uri: String,
    client_id: Option<String>,
    client_secret: Option<SecretString>,
    scopes: Vec<String>,
    expiry: Option<DateTime<Utc>>,
}

/// A usable bearer token and when it stops being valid.
#[derive(Debug, Clone)]
pub struct AccessToken {
    pub token: SecretString,
    pub expires_at: Option<DateTime<Utc>>,
}

impl GoogleCredentials {
    /// Load from the token file, falling back to the client secrets file for
    /// a missing client id / secret.
    pub async fn load(
        token_path: &Path,
        credentials_path: Option<&Path>,
    ) -> Result<Self, SourceError> {
        let token_json = read_file(token_path, "token").await?;
        let secrets_json = match credentials_path {
            Some(path) => Some(read_file(path, "client secrets").await?),
            None => None,
        };
        Self::from_json(&token_json, secrets_json.as_deref())
    }

    /// Parse token file contents (and optional client secrets contents).
    pub fn from_json(token_json: &str, client_secrets: Option<&str>) -> Result<Self, SourceError> {
        let file: AuthorizedUserFile =
            serde_json::from_str(token_json).map_err(|e| SourceError::NotConfigured {
                name: NAME.to_string(),
                reason: format!("invalid token file: {e}"),
            })?;

        let secrets = client_secrets
            .map(|raw| {
                serde_json::from_str::<ClientSecretsFile>(raw).map_err(|e| {
                    SourceError::NotConfigured {
                        name: NAME.to_string(),
                        reason: format!("invalid client secrets file: {e}"),
                    }
                })
            })
            .transpose()?
            .map(|f| f.installed);

        let expiry = file.expiry.as_deref().and_then(|raw| {
            let parsed = parse_expiry(raw);
            if parsed.is_none() {
                warn!(expiry = raw, "Unparseable token expiry, assuming token is valid");
            }
            parsed
        });

        let scopes = file.scopes;
        if !scopes.is_empty() && !scopes.iter().any(|s| READ_CAPABLE_SCOPES.contains(&s.as_str())) {
            warn!(?scopes, "Token file scopes do not include Gmail read access");
        }

        let token_uri = file
            .token_uri
            .or_else(|| secrets.as_ref().and_then(|s| s.token_uri.clone()))
            .unwrap_or_else(|| DEFAULT_TOKEN_URI.to_string());
        let client_id = file
            .client_id
            .or_else(|| secrets.as_ref().map(|s| s.client_id.clone()));
        let client_secret = file
            .client_secret
            .or_else(|| secrets.as_ref().map(|s| s.client_secret.clone()));

        Ok(Self {
            access_token: file.token.filter(|t| !t.is_empty()).map(SecretString::from),
            refresh_token: file
                .refresh_token
                .filter(|t| !t.is_empty())
                .map(SecretString::from),
            token_uri,
            client_id,
            client_secret: client_secret.map(SecretString::from),
            scopes,
            expiry,
        })
    }

    pub fn scopes(&self) -> &[String] {
        &self.scopes
    }

    /// Whether the stored access token is missing or (nearly) expired.
    pub fn needs_refresh(&self, now: DateTime<Utc>) -> bool {
        match (&self.access_token, self.expiry) {
            (None, _) => true,
            (Some(_), Some(expiry)) => expiry - Duration::seconds(EXPIRY_SKEW_SECS) <= now,
            (Some(_), None) => false,
        }
    }

    /// Return a usable access token, refreshing it if needed.
    pub async fn access_token(&self, client: &reqwest::Client) -> Result<AccessToken, SourceError> {
        let now = Utc::now();
        if !self.needs_refresh(now) {
            if let Some(token) = &self.access_token {
                return Ok(AccessToken {
                    token: token.clone(),
                    expires_at: self.expiry,
                });
            }
        }

        let (Some(refresh_token), Some(client_id), Some(client_secret)) =
            (&self.refresh_token, &self.client_id, &self.client_secret)
        else {
            return Err(SourceError::AuthFailed {
                name: NAME.to_string(),
                reason: "access token expired and no refresh credentials are available"
                    .to_string(),
            });
        };

        debug!(token_uri = %self.token_uri, "Refreshing Google access token");
        let params = [
            ("grant_type", "refresh_token"),
            ("client_id", client_id.as_str()),
            ("client_secret", client_secret.expose_secret()),
            ("refresh_token", refresh_token.expose_secret()),
        ];
        let resp = client
            .post(&self.token_uri)
            .form(&params)
            .send()
            .await
            .map_err(|e| SourceError::from_reqwest(NAME, e))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let reason = serde_json::from_str::<RefreshError>(&body)
                .map(|e| match e.error_description {
                    Some(desc) => format!("{}: {}", e.error, desc),
                    None => e.error,
                })
                .unwrap_or(body);
            return Err(if status.is_client_error() && status.as_u16() != 429 {
                SourceError::AuthFailed {
                    name: NAME.to_string(),
                    reason: format!("token refresh rejected: {reason}"),
                }
            } else {
                SourceError::from_status(NAME, status, reason)
            });
        }

        let refreshed: RefreshResponse = resp
            .json()
            .await
            .map_err(|e| SourceError::from_reqwest(NAME, e))?;
        info!("Refreshed Google access token");

        Ok(AccessToken {
            token: SecretString::from(refreshed.access_token),
            expires_at: refreshed
                .expires_in
                .map(|secs| now + Duration::seconds(secs)),
        })
    }
}

async fn read_file(path: &Path, what: &str) -> Result<String, SourceError> {
    tokio::fs::read_to_string(path)
        .await
        .map_err(|e| SourceError::NotConfigured {
            name: NAME.to_string(),
            reason: format!("cannot read {what} file {}: {e}", path.display()),
        })
}

/// Parse the expiry formats Google's client libraries write.
fn parse_expiry(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    const TOKEN: &str = r#"{
        "token": "ya29.a0",
        "refresh_token": "1//0g",
        "token_uri": "https://oauth2.googleapis.com/token",
        "client_id": "123.apps.googleusercontent.com",
        "client_secret": "shh",
        "scopes": ["https://www.googleapis.com/auth/gmail.readonly"],
        "expiry": "2030-01-01T00:00:00.000000Z"
    }"#;

    #[test]
    fn parses_authorized_user_file() {
        let creds = GoogleCredentials::from_json(TOKEN, None).unwrap();
        assert_eq!(creds.scopes(), [GMAIL_READONLY_SCOPE]);
        assert_eq!(creds.token_uri, DEFAULT_TOKEN_URI);
        assert_eq!(creds.client_id.as_deref(), Some("123.apps.googleusercontent.com"));
        assert_eq!(
            creds.expiry,
            Some("2030-01-01T00:00:00Z".parse::<DateTime<Utc>>().unwrap())
        );
    }

    #[test]
    fn naive_expiry_is_treated_as_utc() {
        let parsed = parse_expiry("2024-05-01T12:30:00.123456").unwrap();
        assert_eq!(parsed.to_rfc3339(), "2024-05-01T12:30:00.123456+00:00");
        assert!(parse_expiry("next tuesday").is_none());
    }

    #[test]
    fn needs_refresh_near_expiry() {
        let creds = GoogleCredentials::from_json(TOKEN, None).unwrap();
        let far = "2029-12-31T00:00:00Z".parse::<DateTime<Utc>>().unwrap();
        let close = "2029-12-31T23:59:30Z".parse::<DateTime<Utc>>().unwrap();
        assert!(!creds.needs_refresh(far));
        assert!(creds.needs_refresh(close));
    }

    #[test]
    fn missing_access_token_needs_refresh() {
        let creds =
            GoogleCredentials::from_json(r#"{"refresh_token": "1//0g"}"#, None).unwrap();
        assert!(creds.needs_refresh(Utc::now()));
    }

    #[test]
    fn client_secrets_fill_missing_fields() {
        let secrets = r#"{"installed": {
            "client_id": "from-secrets",
            "client_secret": "s",
            "token_uri": "https://example.test/token"
        }}"#;
        let creds =
            GoogleCredentials::from_json(r#"{"refresh_token": "r"}"#, Some(secrets)).unwrap();
        assert_eq!(creds.client_id.as_deref(), Some("from-secrets"));
        assert_eq!(creds.token_uri, "https://example.test/token");
        assert!(creds.client_secret.is_some());
    }

    #[test]
    fn invalid_token_file_is_not_configured() {
        let err = GoogleCredentials::from_json("not json", None).unwrap_err();
        assert!(matches!(err, SourceError::NotConfigured { .. }));
    }

    #[tokio::test]
    async fn valid_token_is_returned_without_refresh() {
        let creds = GoogleCredentials::from_json(TOKEN, None).unwrap();
        let token = creds.access_token(&reqwest::Client::new()).await.unwrap();
        assert_eq!(token.token.expose_secret(), "ya29.a0");
    }

    #[tokio::test]
    async fn expired_without_refresh_token_is_auth_failure() {
        let creds = GoogleCredentials::from_json(
            r#"{"token": "old", "expiry": "2001-01-01T00:00:00Z"}"#,
            None,
        )
        .unwrap();
        let err = creds.access_token(&reqwest::Client::new()).await.unwrap_err();
        assert!(matches!(err, SourceError::AuthFailed { .. }));
    }

    #[tokio::test]
    async fn load_reads_token_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(TOKEN.as_bytes()).unwrap();
        let creds = GoogleCredentials::load(file.path(), None).await.unwrap();
        assert!(!creds.needs_refresh(Utc::now()));
    }

    #[tokio::test]
    async fn load_missing_file_is_not_configured() {
        let dir = tempfile::tempdir().unwrap();
        let err = GoogleCredentials::load(&dir.path().join("token.json"), None)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("cannot read token file"));
    }
}
