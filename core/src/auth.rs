//! Login and token refresh.
//!
//! Both endpoints identify the caller's device and need the browser-style
//! `Referrer` headers the web cabinet sends; every other route relies on the
//! bearer token attached by the dispatcher.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::client::NalogClient;
use crate::context::Context;
use crate::device::{self, DeviceInfo};
use crate::error::{NalogError, Result};
use crate::http::{HttpMethod, HttpRequest};
use crate::users::User;

pub const REFERRER: &str = "https://lknpd.nalog.ru/";
pub const REFERRER_POLICY: &str = "strict-origin-when-cross-origin";

/// Bearer credential issued by `auth/lkfl` or `auth/token`.
///
/// Never mutated after it is issued; a refresh yields a new value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessToken {
    pub token: String,
    #[serde(default)]
    pub token_expire_in: DateTime<Utc>,
    #[serde(default)]
    pub refresh_token: String,
    #[serde(default)]
    pub refresh_token_expires_in: DateTime<Utc>,
    #[serde(default)]
    pub profile: User,
}

impl AccessToken {
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// The bearer token is unusable once its expiry is at or before `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.token_expire_in <= now
    }

    pub fn is_refresh_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.refresh_token_expires_in <= now
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
    device_info: DeviceInfo,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
    device_info: DeviceInfo,
}

pub struct AuthService<'a> {
    client: &'a NalogClient,
}

impl<'a> AuthService<'a> {
    pub(crate) fn new(client: &'a NalogClient) -> Self {
        Self { client }
    }

    /// Exchange the cabinet login (usually the INN) and password for a token.
    pub fn create_access_token(&self, ctx: &Context, username: &str, password: &str) -> Result<AccessToken> {
        let body = LoginRequest {
            username,
            password,
            device_info: self.device_info(),
        };
        let request = self.pre_auth_request("auth/lkfl", &body)?;
        tracing::debug!("requesting access token");
        self.client.send(ctx, &request)
    }

    /// Trade a still-valid refresh token for a new access token.
    pub fn refresh_token(&self, ctx: &Context, token: Option<&AccessToken>) -> Result<AccessToken> {
        self.refresh_token_at(ctx, token, Utc::now())
    }

    /// Return `token` unchanged while it is still valid, refresh it otherwise.
    pub fn ensure_fresh(&self, ctx: &Context, token: Option<&AccessToken>) -> Result<AccessToken> {
        let now = Utc::now();
        let token = token.ok_or(NalogError::TokenEmpty)?;
        if !token.is_expired_at(now) {
            return Ok(token.clone());
        }
        self.refresh_token_at(ctx, Some(token), now)
    }

    fn refresh_token_at(&self, ctx: &Context, token: Option<&AccessToken>, now: DateTime<Utc>) -> Result<AccessToken> {
        let token = token.ok_or(NalogError::TokenEmpty)?;
        if token.is_refresh_expired_at(now) {
            return Err(NalogError::RefreshExpired);
        }
        let body = RefreshRequest {
            refresh_token: &token.refresh_token,
            device_info: self.device_info(),
        };
        let request = self.pre_auth_request("auth/token", &body)?;
        tracing::debug!("refreshing access token");
        self.client.send(ctx, &request)
    }

    fn device_info(&self) -> DeviceInfo {
        let config = self.client.config();
        DeviceInfo::new(&device::device_id(), &config.app_version, &config.user_agent)
    }

    fn pre_auth_request<T: Serialize>(&self, path: &str, body: &T) -> Result<HttpRequest> {
        let request = self.client.new_request(HttpMethod::Post, path, Some(body))?;
        Ok(request
            .with_header("Referrer", REFERRER)
            .with_header("Referrer-Policy", REFERRER_POLICY))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Duration;

    use super::*;
    use crate::config::ClientConfig;
    use crate::transport::testing::RecordingTransport;

    const TOKEN_BODY: &str = r#"{
        "refreshToken": "refresh-2",
        "refreshTokenExpiresIn": "2030-01-01T00:00:00.000Z",
        "token": "bearer-2",
        "tokenExpireIn": "2030-01-01T00:00:00.000Z",
        "profile": {"id": 7, "displayName": "Тест", "inn": "123456789012"}
    }"#;

    fn client_with(transport: Arc<RecordingTransport>) -> NalogClient {
        NalogClient::new(ClientConfig::new("http://localhost:3000/api/v1/").unwrap(), transport)
    }

    fn token(expires_in: Duration, refresh_expires_in: Duration) -> AccessToken {
        let now = Utc::now();
        AccessToken {
            token: "bearer-1".to_string(),
            token_expire_in: now + expires_in,
            refresh_token: "refresh-1".to_string(),
            refresh_token_expires_in: now + refresh_expires_in,
            profile: User::default(),
        }
    }

    #[test]
    fn expiry_is_at_or_before_now() {
        let now = Utc::now();
        let mut t = AccessToken {
            token_expire_in: now,
            ..AccessToken::default()
        };
        assert!(t.is_expired_at(now));
        t.token_expire_in = now + Duration::seconds(1);
        assert!(!t.is_expired_at(now));
        t.token_expire_in = now - Duration::seconds(1);
        assert!(t.is_expired_at(now));
    }

    #[test]
    fn login_posts_credentials_with_pre_auth_headers() {
        let transport = Arc::new(RecordingTransport::new().reply(200, TOKEN_BODY));
        let client = client_with(transport.clone());

        let token = client
            .auth()
            .create_access_token(&Context::background(), "123456789012", "secret")
            .unwrap();
        assert_eq!(token.token, "bearer-2");
        assert_eq!(token.profile.inn, "123456789012");

        let sent = transport.sent().remove(0);
        assert_eq!(sent.method, HttpMethod::Post);
        assert_eq!(sent.url, "http://localhost:3000/api/v1/auth/lkfl");
        assert_eq!(sent.header("Referrer"), Some(REFERRER));
        assert_eq!(sent.header("Referrer-Policy"), Some(REFERRER_POLICY));
        assert!(sent.header("Authorization").is_none());

        let body: serde_json::Value = serde_json::from_str(sent.body.as_deref().unwrap()).unwrap();
        assert_eq!(body["username"], "123456789012");
        assert_eq!(body["password"], "secret");
        assert_eq!(body["deviceInfo"]["sourceType"], "WEB");
        assert!(body["deviceInfo"]["sourceDeviceId"].as_str().unwrap().len() <= 21);
    }

    #[test]
    fn refresh_without_token_is_rejected() {
        let transport = Arc::new(RecordingTransport::new());
        let client = client_with(transport.clone());
        let err = client.auth().refresh_token(&Context::background(), None).unwrap_err();
        assert!(matches!(err, NalogError::TokenEmpty));
        assert!(transport.sent().is_empty());
    }

    #[test]
    fn refresh_with_expired_refresh_token_is_rejected() {
        let transport = Arc::new(RecordingTransport::new());
        let client = client_with(transport.clone());
        let stale = token(Duration::minutes(-10), Duration::minutes(-1));
        let err = client
            .auth()
            .refresh_token(&Context::background(), Some(&stale))
            .unwrap_err();
        assert!(matches!(err, NalogError::RefreshExpired));
        assert!(transport.sent().is_empty());
    }

    #[test]
    fn refresh_posts_refresh_token() {
        let transport = Arc::new(RecordingTransport::new().reply(200, TOKEN_BODY));
        let client = client_with(transport.clone());
        let current = token(Duration::minutes(-1), Duration::days(30));

        let renewed = client
            .auth()
            .refresh_token(&Context::background(), Some(&current))
            .unwrap();
        assert_eq!(renewed.token, "bearer-2");
        assert_eq!(renewed.refresh_token, "refresh-2");

        let sent = transport.sent().remove(0);
        assert_eq!(sent.url, "http://localhost:3000/api/v1/auth/token");
        assert_eq!(sent.header("Referrer"), Some(REFERRER));
        let body: serde_json::Value = serde_json::from_str(sent.body.as_deref().unwrap()).unwrap();
        assert_eq!(body["refreshToken"], "refresh-1");
        assert!(body["deviceInfo"].is_object());
    }

    #[test]
    fn ensure_fresh_keeps_valid_token_without_a_call() {
        let transport = Arc::new(RecordingTransport::new());
        let client = client_with(transport.clone());
        let current = token(Duration::minutes(10), Duration::days(30));
        let same = client
            .auth()
            .ensure_fresh(&Context::background(), Some(&current))
            .unwrap();
        assert_eq!(same, current);
        assert!(transport.sent().is_empty());
    }

    #[test]
    fn ensure_fresh_refreshes_expired_token() {
        let transport = Arc::new(RecordingTransport::new().reply(200, TOKEN_BODY));
        let client = client_with(transport.clone());
        let current = token(Duration::seconds(-5), Duration::days(30));
        let renewed = client
            .auth()
            .ensure_fresh(&Context::background(), Some(&current))
            .unwrap();
        assert_eq!(renewed.token, "bearer-2");
        assert_eq!(transport.sent().len(), 1);
    }
}
