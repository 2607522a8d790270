//! Generated receipts.
//!
//! Receipts are addressed by the seller's INN and the receipt UUID. The INN is
//! taken from the profile embedded in the client's access token, so these
//! calls need an authenticated client.

use std::io::Write;

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::client::NalogClient;
use crate::context::Context;
use crate::error::{NalogError, Result};
use crate::http::HttpMethod;
use crate::money;

/// Receipt as rendered by `receipt/{inn}/{uuid}/json`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Receipt {
    pub receipt_id: String,
    pub services: Vec<ReceiptLine>,
    pub operation_time: Option<DateTime<Utc>>,
    pub request_time: Option<DateTime<Utc>>,
    pub register_time: Option<DateTime<Utc>>,
    pub tax_period_id: i64,
    pub payment_type: String,
    pub income_type: String,
    #[serde(with = "money")]
    pub total_amount: BigDecimal,
    pub cancellation_info: Option<serde_json::Value>,
    pub source_device_id: Option<serde_json::Value>,
    pub client_inn: Option<serde_json::Value>,
    pub client_display_name: Option<String>,
    pub partner_display_name: Option<String>,
    pub partner_inn: Option<String>,
    pub inn: String,
    pub profession: String,
    pub description: Vec<serde_json::Value>,
    pub email: Option<serde_json::Value>,
    pub phone: Option<serde_json::Value>,
    pub invoice_id: Option<serde_json::Value>,
}

impl Receipt {
    pub fn is_cancelled(&self) -> bool {
        self.cancellation_info
            .as_ref()
            .is_some_and(|info| !info.is_null())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReceiptLine {
    pub name: String,
    pub quantity: i64,
    pub service_number: i64,
    #[serde(with = "money")]
    pub amount: BigDecimal,
}

pub struct ReceiptService<'a> {
    client: &'a NalogClient,
}

impl<'a> ReceiptService<'a> {
    pub(crate) fn new(client: &'a NalogClient) -> Self {
        Self { client }
    }

    /// Fetch and decode a receipt.
    pub fn json(&self, ctx: &Context, receipt_uuid: &str) -> Result<Receipt> {
        let path = self.path(receipt_uuid, "json")?;
        let request = self.client.new_request::<()>(HttpMethod::Get, &path, None)?;
        self.client.send(ctx, &request)
    }

    /// Fetch a receipt and copy its JSON into `sink` untouched. Returns the
    /// number of bytes written.
    pub fn write_json<W>(&self, ctx: &Context, receipt_uuid: &str, sink: &mut W) -> Result<u64>
    where
        W: Write + ?Sized,
    {
        let path = self.path(receipt_uuid, "json")?;
        let request = self.client.new_request::<()>(HttpMethod::Get, &path, None)?;
        self.client.send_raw(ctx, &request, sink)
    }

    /// Public link to the printable receipt image. No request is made.
    pub fn print_url(&self, receipt_uuid: &str) -> Result<Url> {
        let path = self.path(receipt_uuid, "print")?;
        self.client.config().endpoint(&path)
    }

    fn path(&self, receipt_uuid: &str, format: &str) -> Result<String> {
        let token = self.client.access_token().ok_or(NalogError::TokenEmpty)?;
        Ok(format!("receipt/{}/{}/{format}", token.profile.inn, receipt_uuid))
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;
    use std::sync::Arc;

    use super::*;
    use crate::auth::AccessToken;
    use crate::config::ClientConfig;
    use crate::transport::testing::RecordingTransport;
    use crate::users::User;

    const RECEIPT_BODY: &str = r#"{
        "receiptId": "200abc",
        "services": [
            {"name": "Test service", "quantity": 10, "serviceNumber": 0, "amount": "10000.00"},
            {"name": "Test 2 service", "quantity": 10, "serviceNumber": 1, "amount": "19003.30"}
        ],
        "operationTime": "2024-03-01T10:15:30+03:00",
        "requestTime": "2024-03-01T10:15:31+03:00",
        "registerTime": "2024-03-01T10:15:32.123+03:00",
        "taxPeriodId": 202403,
        "paymentType": "CASH",
        "incomeType": "FROM_INDIVIDUAL",
        "totalAmount": "29003.30",
        "cancellationInfo": null,
        "sourceDeviceId": "abc",
        "clientInn": null,
        "clientDisplayName": null,
        "partnerDisplayName": null,
        "partnerInn": null,
        "inn": "123456789012",
        "profession": "Разработчик",
        "description": [],
        "email": null,
        "phone": null,
        "invoiceId": null
    }"#;

    fn authed(transport: Arc<RecordingTransport>) -> NalogClient {
        let client = NalogClient::new(ClientConfig::new("http://localhost:3000/api/v1/").unwrap(), transport);
        client.with_access_token(AccessToken {
            token: "bearer".to_string(),
            profile: User {
                inn: "123456789012".to_string(),
                ..User::default()
            },
            ..AccessToken::default()
        })
    }

    #[test]
    fn json_requires_token() {
        let transport = Arc::new(RecordingTransport::new());
        let client = NalogClient::new(ClientConfig::new("http://localhost:3000/api/v1/").unwrap(), transport.clone());
        let err = client.receipt().json(&Context::background(), "200abc").unwrap_err();
        assert!(matches!(err, NalogError::TokenEmpty));
        assert!(transport.sent().is_empty());
    }

    #[test]
    fn json_fetches_by_profile_inn() {
        let transport = Arc::new(RecordingTransport::new().reply(200, RECEIPT_BODY));
        let client = authed(transport.clone());

        let receipt = client.receipt().json(&Context::background(), "200abc").unwrap();
        assert_eq!(receipt.receipt_id, "200abc");
        assert_eq!(receipt.services.len(), 2);
        assert_eq!(receipt.services[1].amount, BigDecimal::from_str("19003.30").unwrap());
        assert_eq!(receipt.total_amount, BigDecimal::from_str("29003.30").unwrap());
        assert_eq!(receipt.profession, "Разработчик");
        assert!(!receipt.is_cancelled());

        let sent = transport.sent().remove(0);
        assert_eq!(sent.method, HttpMethod::Get);
        assert_eq!(sent.url, "http://localhost:3000/api/v1/receipt/123456789012/200abc/json");
        assert_eq!(sent.header("Authorization"), Some("Bearer bearer"));
    }

    #[test]
    fn numeric_amounts_are_not_rounded_through_floats() {
        let body = r#"{"receiptId":"200abc","totalAmount":29003.3,
            "services":[{"name":"Test","quantity":1,"serviceNumber":0,"amount":0.1}]}"#;
        let transport = Arc::new(RecordingTransport::new().reply(200, body));
        let client = authed(transport);

        let receipt = client.receipt().json(&Context::background(), "200abc").unwrap();
        assert_eq!(receipt.total_amount.to_string(), "29003.3");
        assert_eq!(receipt.services[0].amount.to_string(), "0.1");
    }

    #[test]
    fn write_json_copies_body() {
        let transport = Arc::new(RecordingTransport::new().reply(200, RECEIPT_BODY));
        let client = authed(transport);
        let mut sink = Vec::new();
        let written = client
            .receipt()
            .write_json(&Context::background(), "200abc", &mut sink)
            .unwrap();
        assert_eq!(sink, RECEIPT_BODY.as_bytes());
        assert_eq!(written, RECEIPT_BODY.len() as u64);
    }

    #[test]
    fn missing_receipt_is_api_error() {
        let transport = Arc::new(
            RecordingTransport::new().reply(404, r#"{"code":"receipt.not.found","message":"Чек не найден"}"#),
        );
        let client = authed(transport);
        match client.receipt().json(&Context::background(), "nope").unwrap_err() {
            NalogError::Api(api) => {
                assert_eq!(api.code, "receipt.not.found");
                assert_eq!(api.message, "Чек не найден");
                assert_eq!(api.status, 404);
            }
            other => panic!("expected API error, got {other:?}"),
        }
    }

    #[test]
    fn print_url_is_built_without_a_request() {
        let transport = Arc::new(RecordingTransport::new());
        let client = authed(transport.clone());
        let url = client.receipt().print_url("200abc").unwrap();
        assert_eq!(url.as_str(), "http://localhost:3000/api/v1/receipt/123456789012/200abc/print");
        assert!(transport.sent().is_empty());
    }
}
