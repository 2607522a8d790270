use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use chrono::{Duration, SecondsFormat, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::{net::TcpListener, sync::RwLock};
use uuid::Uuid;

/// Credentials the mock accepts on `auth/lkfl`.
pub const USERNAME: &str = "123456789012";
pub const PASSWORD: &str = "password";

#[derive(Default)]
pub struct Store {
    access_tokens: HashSet<String>,
    refresh_tokens: HashSet<String>,
    receipts: HashMap<String, Value>,
}

pub type Db = Arc<RwLock<Store>>;

type ApiResult = Result<Json<Value>, (StatusCode, Json<Value>)>;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
    pub device_info: Value,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: String,
    pub device_info: Value,
}

pub fn app() -> Router {
    let db: Db = Arc::new(RwLock::new(Store::default()));
    Router::new()
        .route("/api/v1/auth/lkfl", post(login))
        .route("/api/v1/auth/token", post(refresh))
        .route("/api/v1/user", get(user))
        .route("/api/v1/income", post(income))
        .route("/api/v1/receipt/{inn}/{id}/json", get(receipt_json))
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

fn api_error(status: StatusCode, code: &str, message: &str) -> (StatusCode, Json<Value>) {
    (status, Json(json!({ "code": code, "message": message, "additionalInfo": null })))
}

fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn profile() -> Value {
    json!({
        "id": 1001,
        "lastName": "Пупкин",
        "displayName": "Василий Пупкин",
        "middleName": "Иванович",
        "email": "vasily@example.test",
        "phone": "79990000000",
        "inn": USERNAME,
        "snils": "11223344595",
        "avatarExists": false,
        "initialRegistrationDate": "2021-02-03T10:00:00.000+03:00",
        "registrationDate": "2021-02-03T10:00:00.000+03:00",
        "firstReceiptRegisterTime": null,
        "firstReceiptCancelTime": null,
        "hideCancelledReceipt": false,
        "registerAvailable": null,
        "status": "ACTIVE",
        "restrictedMode": false,
        "pfrUrl": "https://es.pfrf.ru/",
        "login": USERNAME
    })
}

async fn issue_token(db: &Db) -> Value {
    let token = Uuid::new_v4().to_string();
    let refresh_token = Uuid::new_v4().to_string();
    let mut store = db.write().await;
    store.access_tokens.insert(token.clone());
    store.refresh_tokens.insert(refresh_token.clone());
    let expires = |d: Duration| (Utc::now() + d).to_rfc3339_opts(SecondsFormat::Millis, true);
    json!({
        "refreshToken": refresh_token,
        "refreshTokenExpiresIn": expires(Duration::days(30)),
        "token": token,
        "tokenExpireIn": expires(Duration::hours(1)),
        "profile": profile()
    })
}

fn check_pre_auth(headers: &HeaderMap) -> Result<(), (StatusCode, Json<Value>)> {
    if headers.contains_key("referrer") && headers.contains_key("referrer-policy") {
        Ok(())
    } else {
        Err(api_error(StatusCode::BAD_REQUEST, "auth.headers", "missing referrer headers"))
    }
}

async fn check_bearer(db: &Db, headers: &HeaderMap) -> Result<(), (StatusCode, Json<Value>)> {
    let token = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));
    let known = match token {
        Some(token) => db.read().await.access_tokens.contains(token),
        None => false,
    };
    if known {
        Ok(())
    } else {
        Err(api_error(StatusCode::UNAUTHORIZED, "auth.required", "Требуется авторизация"))
    }
}

async fn login(State(db): State<Db>, headers: HeaderMap, Json(input): Json<LoginRequest>) -> ApiResult {
    check_pre_auth(&headers)?;
    if input.device_info["sourceDeviceId"].as_str().map_or(true, str::is_empty) {
        return Err(api_error(StatusCode::BAD_REQUEST, "device.required", "device info is required"));
    }
    if input.username != USERNAME || input.password != PASSWORD {
        tracing::warn!("rejected login");
        return Err(api_error(StatusCode::UNAUTHORIZED, "auth.failed", "Неверный логин или пароль"));
    }
    tracing::info!("issued access token");
    Ok(Json(issue_token(&db).await))
}

async fn refresh(State(db): State<Db>, headers: HeaderMap, Json(input): Json<RefreshRequest>) -> ApiResult {
    check_pre_auth(&headers)?;
    if !input.device_info.is_object() {
        return Err(api_error(StatusCode::BAD_REQUEST, "device.required", "device info is required"));
    }
    if !db.write().await.refresh_tokens.remove(&input.refresh_token) {
        return Err(api_error(StatusCode::UNAUTHORIZED, "auth.refresh", "refresh token is unknown"));
    }
    Ok(Json(issue_token(&db).await))
}

async fn user(State(db): State<Db>, headers: HeaderMap) -> ApiResult {
    check_bearer(&db, &headers).await?;
    Ok(Json(profile()))
}

/// Create and cancel share `POST income`; a `receiptUuid` marks a cancel.
async fn income(State(db): State<Db>, headers: HeaderMap, Json(input): Json<Value>) -> ApiResult {
    check_bearer(&db, &headers).await?;
    match input.get("receiptUuid").and_then(Value::as_str) {
        Some(id) => cancel_income(&db, id, &input).await,
        None => create_income(&db, &input).await,
    }
}

async fn create_income(db: &Db, input: &Value) -> ApiResult {
    let services = input["services"].as_array().cloned().unwrap_or_default();
    if services.is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "income.services", "services cannot be empty"));
    }
    let id = Uuid::new_v4().simple().to_string();
    let lines: Vec<Value> = services
        .iter()
        .enumerate()
        .map(|(n, item)| {
            json!({
                "name": item["name"],
                "quantity": item["quantity"],
                "serviceNumber": n,
                "amount": item["amount"]
            })
        })
        .collect();
    let receipt = json!({
        "receiptId": id,
        "services": lines,
        "operationTime": input["operationTime"],
        "requestTime": input["requestTime"],
        "registerTime": now(),
        "taxPeriodId": 202403,
        "paymentType": input["paymentType"],
        "incomeType": input["client"]["incomeType"],
        "totalAmount": input["totalAmount"],
        "cancellationInfo": null,
        "sourceDeviceId": null,
        "clientInn": input["client"]["inn"],
        "clientDisplayName": input["client"]["displayName"],
        "partnerDisplayName": null,
        "partnerInn": null,
        "inn": USERNAME,
        "profession": "Разработчик",
        "description": [],
        "email": null,
        "phone": null,
        "invoiceId": null
    });
    db.write().await.receipts.insert(id.clone(), receipt);
    tracing::info!(receipt = %id, "registered income");
    Ok(Json(json!({ "approvedReceiptUuid": id })))
}

async fn cancel_income(db: &Db, id: &str, input: &Value) -> ApiResult {
    let mut store = db.write().await;
    let receipt = store
        .receipts
        .get_mut(id)
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, "receipt.not.found", "Чек не найден"))?;
    if !receipt["cancellationInfo"].is_null() {
        return Err(api_error(StatusCode::CONFLICT, "receipt.already.cancelled", "Чек уже аннулирован"));
    }
    let info = json!({
        "operationTime": input["operationTime"],
        "registerTime": now(),
        "taxPeriodId": 202403,
        "comment": input["comment"]
    });
    receipt["cancellationInfo"] = info.clone();
    tracing::info!(receipt = %id, "cancelled income");
    Ok(Json(json!({
        "approvedReceiptUuid": id,
        "name": receipt["services"][0]["name"],
        "operationTime": receipt["operationTime"],
        "requestTime": receipt["requestTime"],
        "paymentType": receipt["paymentType"],
        "partnerCode": input["partnerCode"],
        "totalAmount": receipt["totalAmount"],
        "cancellationInfo": info
    })))
}

async fn receipt_json(State(db): State<Db>, Path((inn, id)): Path<(String, String)>) -> ApiResult {
    let store = db.read().await;
    match store.receipts.get(&id) {
        Some(receipt) if inn == USERNAME => Ok(Json(receipt.clone())),
        _ => Err(api_error(StatusCode::NOT_FOUND, "receipt.not.found", "Чек не найден")),
    }
}
