//! Blocking client for the Moy Nalog self-employed tax API (lknpd.nalog.ru).
//!
//! # Overview
//! Signs a taxpayer in, registers and cancels income (receipts), reads the
//! taxpayer profile and fetches generated receipts.
//!
//! # Design
//! - `NalogClient` owns the request/response pipeline: build a request from a
//!   typed payload, dispatch it through a `Transport`, decode the typed
//!   response, and map non-2xx statuses to `ApiError`.
//! - Resource groups (`auth`, `users`, `income`, `receipt`) are services that
//!   borrow the client; they only choose the path and payload shape.
//! - Every call takes a `Context` carrying cancellation and an optional
//!   deadline. There are no retries and no background work.
//! - Money is `BigDecimal` end to end; timestamps go out with millisecond
//!   precision.
//!
//! ```no_run
//! use nalog_core::{ClientConfig, Context, IncomeClient, IncomeServiceItem, NalogClient, NewIncome};
//!
//! # fn main() -> nalog_core::Result<()> {
//! let client = NalogClient::from_config(ClientConfig::default());
//! let ctx = Context::with_timeout(std::time::Duration::from_secs(5));
//! let token = client.auth().create_access_token(&ctx, "123456789012", "password")?;
//! let client = client.with_access_token(token);
//!
//! let income = NewIncome::new(IncomeClient::individual())
//!     .service(IncomeServiceItem::new("Консультация", "1500.00".parse().unwrap(), 1));
//! let created = client.income().create(&ctx, income)?;
//! println!("receipt {}", created.approved_receipt_uuid);
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod client;
pub mod config;
pub mod context;
pub mod device;
pub mod error;
pub mod http;
pub mod income;
pub mod money;
pub mod receipt;
pub mod timestamp;
pub mod transport;
pub mod users;

pub use auth::{AccessToken, AuthService};
pub use client::NalogClient;
pub use config::ClientConfig;
pub use context::Context;
pub use device::DeviceInfo;
pub use error::{ApiError, CancelReason, NalogError, Result, ValidationError};
pub use http::{HttpMethod, HttpRequest, HttpResponse};
pub use income::{
    CancelComment, CancelIncome, IncomeCancel, IncomeCancelRequest, IncomeClient, IncomeCreate,
    IncomeCreateRequest, IncomeService, IncomeServiceItem, IncomeType, NewIncome, PaymentType,
};
pub use receipt::{Receipt, ReceiptLine, ReceiptService};
pub use transport::{Transport, TransportError, UreqTransport};
pub use users::{User, UsersService};

pub use bigdecimal::BigDecimal;
