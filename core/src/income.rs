//! Registering and cancelling income (receipts).
//!
//! # Design
//! Callers describe an income with [`NewIncome`] and a cancellation with
//! [`CancelIncome`]. Neither lets the caller set derived fields: `assemble`
//! stamps the request time, defaults the operation time, sums the total with
//! `BigDecimal`, and then validates. Validation is ordered and stops at the
//! first violation, so the error always names the earliest bad field. Nothing
//! is sent unless assembly succeeds.

use bigdecimal::{BigDecimal, Zero};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::client::NalogClient;
use crate::context::Context;
use crate::error::{Result, ValidationError};
use crate::http::HttpMethod;
use crate::money;
use crate::timestamp::{self, truncate_to_millis};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum IncomeType {
    #[default]
    #[serde(rename = "FROM_INDIVIDUAL")]
    Individual,
    #[serde(rename = "FROM_LEGAL_ENTITY")]
    LegalEntity,
    #[serde(rename = "FROM_FOREIGN_AGENCY")]
    ForeignAgency,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentType {
    #[default]
    Cash,
    Account,
}

/// Reason given when a receipt is cancelled. The API only accepts these two
/// literal phrases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CancelComment {
    #[serde(rename = "Чек сформирован ошибочно")]
    ErroneousIssuance,
    #[serde(rename = "Возврат средств")]
    Refund,
}

/// Who paid for the services.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncomeClient {
    pub contact_phone: String,
    pub display_name: String,
    pub income_type: IncomeType,
    pub inn: Option<String>,
}

impl IncomeClient {
    pub fn individual() -> Self {
        Self::default()
    }

    pub fn legal_entity(inn: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
            income_type: IncomeType::LegalEntity,
            inn: Some(inn.into()),
            ..Self::default()
        }
    }
}

/// One line of a receipt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncomeServiceItem {
    pub name: String,
    /// Price of a single unit.
    #[serde(with = "money")]
    pub amount: BigDecimal,
    pub quantity: i64,
}

impl IncomeServiceItem {
    pub fn new(name: impl Into<String>, amount: BigDecimal, quantity: i64) -> Self {
        Self {
            name: name.into(),
            amount,
            quantity,
        }
    }

    pub fn line_total(&self) -> BigDecimal {
        self.amount.clone() * BigDecimal::from(self.quantity)
    }
}

/// Caller's description of a new income, before derived fields are filled in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewIncome {
    pub services: Vec<IncomeServiceItem>,
    pub client: IncomeClient,
    /// `Cash` when not given.
    pub payment_type: Option<PaymentType>,
    /// When the service was provided; defaults to the request time.
    pub operation_time: Option<DateTime<Utc>>,
    pub ignore_max_total_income_restriction: bool,
}

impl NewIncome {
    pub fn new(client: IncomeClient) -> Self {
        Self {
            client,
            ..Self::default()
        }
    }

    pub fn service(mut self, item: IncomeServiceItem) -> Self {
        self.services.push(item);
        self
    }

    pub fn payment_type(mut self, payment_type: PaymentType) -> Self {
        self.payment_type = Some(payment_type);
        self
    }

    pub fn operation_time(mut self, at: DateTime<Utc>) -> Self {
        self.operation_time = Some(at);
        self
    }

    /// Fill in derived fields as of `now` and validate the result.
    pub fn assemble(self, now: DateTime<Utc>) -> std::result::Result<IncomeCreateRequest, ValidationError> {
        let request_time = truncate_to_millis(now);
        let request = IncomeCreateRequest {
            payment_type: self.payment_type.unwrap_or_default(),
            total_amount: total_amount(&self.services),
            operation_time: self.operation_time.map(truncate_to_millis).unwrap_or(request_time),
            request_time,
            client: self.client,
            services: self.services,
            ignore_max_total_income_restriction: self.ignore_max_total_income_restriction,
        };
        request.validate()?;
        Ok(request)
    }
}

/// Exact sum of `amount * quantity` over all items.
pub fn total_amount(services: &[IncomeServiceItem]) -> BigDecimal {
    services
        .iter()
        .fold(BigDecimal::zero(), |acc, item| acc + item.line_total())
}

/// Wire body of `POST income` for a new receipt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncomeCreateRequest {
    pub payment_type: PaymentType,
    pub client: IncomeClient,
    #[serde(with = "timestamp::millis")]
    pub request_time: DateTime<Utc>,
    #[serde(with = "timestamp::millis")]
    pub operation_time: DateTime<Utc>,
    pub services: Vec<IncomeServiceItem>,
    #[serde(with = "money")]
    pub total_amount: BigDecimal,
    #[serde(default)]
    pub ignore_max_total_income_restriction: bool,
}

impl IncomeCreateRequest {
    /// Check business rules in order and report the first violation.
    pub fn validate(&self) -> std::result::Result<(), ValidationError> {
        if self.services.is_empty() {
            return Err(ValidationError::new("services", "no items"));
        }

        for (index, item) in self.services.iter().enumerate() {
            if item.name.is_empty() {
                return Err(ValidationError::at(
                    "services.name",
                    index,
                    format!("name of item[{index}] cannot be empty"),
                ));
            }
            if item.quantity <= 0 {
                return Err(ValidationError::at(
                    "services.quantity",
                    index,
                    format!("quantity of item[{index}] must be greater than 0"),
                ));
            }
            if item.amount <= BigDecimal::zero() {
                return Err(ValidationError::at(
                    "services.amount",
                    index,
                    format!("amount of item[{index}] must be greater than 0"),
                ));
            }
        }

        if self.client.income_type == IncomeType::LegalEntity {
            let inn = self.client.inn.as_deref().unwrap_or_default();
            if inn.is_empty() {
                return Err(ValidationError::new("client.inn", "client INN cannot be empty"));
            }
            if !inn.bytes().all(|b| b.is_ascii_digit()) {
                return Err(ValidationError::new("client.inn", "client INN must contain only digits"));
            }
            if inn.len() != 10 && inn.len() != 12 {
                return Err(ValidationError::new("client.inn", "client INN length must be 10 or 12"));
            }
            if self.client.display_name.is_empty() {
                return Err(ValidationError::new(
                    "client.displayName",
                    "client display name cannot be empty",
                ));
            }
        }

        Ok(())
    }
}

/// Response to a successful income registration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncomeCreate {
    #[serde(default)]
    pub approved_receipt_uuid: String,
}

/// Caller's description of a cancellation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CancelIncome {
    pub receipt_uuid: String,
    pub comment: CancelComment,
    pub partner_code: Option<String>,
    pub operation_time: Option<DateTime<Utc>>,
}

impl CancelIncome {
    pub fn new(receipt_uuid: impl Into<String>, comment: CancelComment) -> Self {
        Self {
            receipt_uuid: receipt_uuid.into(),
            comment,
            partner_code: None,
            operation_time: None,
        }
    }

    /// Stamp request and operation times as of `now`. The API validates the
    /// rest.
    pub fn assemble(self, now: DateTime<Utc>) -> IncomeCancelRequest {
        let request_time = truncate_to_millis(now);
        IncomeCancelRequest {
            operation_time: self.operation_time.map(truncate_to_millis).unwrap_or(request_time),
            request_time,
            comment: self.comment,
            receipt_uuid: self.receipt_uuid,
            partner_code: self.partner_code,
        }
    }
}

/// Wire body of `POST income` for a cancellation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncomeCancelRequest {
    #[serde(with = "timestamp::millis")]
    pub request_time: DateTime<Utc>,
    #[serde(with = "timestamp::millis")]
    pub operation_time: DateTime<Utc>,
    pub comment: CancelComment,
    pub receipt_uuid: String,
    pub partner_code: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IncomeCancel {
    pub approved_receipt_uuid: String,
    pub name: String,
    pub operation_time: Option<DateTime<Utc>>,
    pub request_time: Option<DateTime<Utc>>,
    pub payment_type: String,
    pub partner_code: Option<String>,
    #[serde(with = "money::option")]
    pub total_amount: Option<BigDecimal>,
    pub cancellation_info: Option<CancellationInfo>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CancellationInfo {
    pub operation_time: Option<DateTime<Utc>>,
    pub register_time: Option<DateTime<Utc>>,
    pub tax_period_id: i64,
    pub comment: Option<CancelComment>,
}

pub struct IncomeService<'a> {
    client: &'a NalogClient,
}

impl<'a> IncomeService<'a> {
    pub(crate) fn new(client: &'a NalogClient) -> Self {
        Self { client }
    }

    /// Register a new income and return the id of the issued receipt.
    pub fn create(&self, ctx: &Context, income: NewIncome) -> Result<IncomeCreate> {
        let request = income.assemble(Utc::now())?;
        tracing::debug!(
            items = request.services.len(),
            total = %request.total_amount,
            "registering income"
        );
        let http_request = self.client.new_request(HttpMethod::Post, "income", Some(&request))?;
        self.client.send(ctx, &http_request)
    }

    /// Cancel a previously issued receipt.
    pub fn cancel(&self, ctx: &Context, cancel: CancelIncome) -> Result<IncomeCancel> {
        let request = cancel.assemble(Utc::now());
        tracing::debug!(receipt = %request.receipt_uuid, "cancelling income");
        let http_request = self.client.new_request(HttpMethod::Post, "income", Some(&request))?;
        self.client.send(ctx, &http_request)
    }
}
