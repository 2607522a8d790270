//! Taxpayer profile.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::client::NalogClient;
use crate::context::Context;
use crate::error::Result;
use crate::http::HttpMethod;

/// Profile of the signed-in self-employed taxpayer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct User {
    pub id: i64,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub last_name: String,
    pub display_name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub middle_name: String,
    pub email: String,
    pub phone: String,
    pub inn: String,
    pub snils: String,
    pub avatar_exists: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub initial_registration_date: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registration_date: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_receipt_register_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_receipt_cancel_time: Option<DateTime<Utc>>,
    pub hide_cancelled_receipt: bool,
    pub register_available: Option<serde_json::Value>,
    pub status: String,
    pub restricted_mode: bool,
    pub pfr_url: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub login: String,
}

pub struct UsersService<'a> {
    client: &'a NalogClient,
}

impl<'a> UsersService<'a> {
    pub(crate) fn new(client: &'a NalogClient) -> Self {
        Self { client }
    }

    /// Fetch the profile of the user the client is authenticated as.
    pub fn get(&self, ctx: &Context) -> Result<User> {
        let request = self.client.new_request::<()>(HttpMethod::Get, "user", None)?;
        self.client.send(ctx, &request)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::config::ClientConfig;
    use crate::transport::testing::RecordingTransport;

    #[test]
    fn get_decodes_profile() {
        let body = r#"{
            "id": 42,
            "lastName": "Пупкин",
            "displayName": "Василий Пупкин",
            "email": "v@example.test",
            "phone": "79990000000",
            "inn": "123456789012",
            "snils": "",
            "avatarExists": false,
            "registrationDate": "2021-02-03T10:00:00.000+03:00",
            "hideCancelledReceipt": true,
            "registerAvailable": null,
            "status": "ACTIVE",
            "restrictedMode": false,
            "pfrUrl": "https://es.pfrf.ru/"
        }"#;
        let transport = Arc::new(RecordingTransport::new().reply(200, body));
        let client = NalogClient::new(ClientConfig::new("http://localhost:3000/api/v1/").unwrap(), transport.clone());

        let user = client.users().get(&Context::background()).unwrap();
        assert_eq!(user.id, 42);
        assert_eq!(user.last_name, "Пупкин");
        assert_eq!(user.inn, "123456789012");
        assert!(user.hide_cancelled_receipt);
        assert!(user.registration_date.is_some());
        assert!(user.first_receipt_cancel_time.is_none());

        let sent = transport.sent();
        assert_eq!(sent[0].method, HttpMethod::Get);
        assert_eq!(sent[0].url, "http://localhost:3000/api/v1/user");
    }
}
