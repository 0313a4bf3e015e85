//! Bank-transfer receipt upload and review.

use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::domain::events::AppEvent;
use crate::domain::receipt::ReceiptStatus;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use crate::uploads;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Receipt {
    pub id: Uuid,
    pub user_id: Uuid,
    pub order_id: Option<Uuid>,
    pub appointment_id: Option<Uuid>,
    pub bank: String,
    pub amount: i64,
    pub payment_method: String,
    pub file_path: String,
    pub content_type: String,
    pub size_bytes: i64,
    pub status: String,
    pub reviewed_by: Option<Uuid>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub review_comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Default)]
struct ReceiptForm {
    bank: Option<String>,
    amount: Option<String>,
    payment_method: Option<String>,
    order_id: Option<String>,
    appointment_id: Option<String>,
    file: Option<(String, axum::body::Bytes)>,
}

async fn read_form(mut multipart: Multipart) -> ApiResult<ReceiptForm> {
    let mut form = ReceiptForm::default();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("malformed multipart body: {e}")))?
    {
        let read_text = |e| ApiError::bad_request(format!("failed to read field: {e}"));
        match field.name() {
            Some("bank") => form.bank = Some(field.text().await.map_err(read_text)?),
            Some("amount") => form.amount = Some(field.text().await.map_err(read_text)?),
            Some("payment_method") => form.payment_method = Some(field.text().await.map_err(read_text)?),
            Some("order_id") => form.order_id = Some(field.text().await.map_err(read_text)?),
            Some("appointment_id") => form.appointment_id = Some(field.text().await.map_err(read_text)?),
            Some("file") => {
                let content_type = field
                    .content_type()
                    .map(str::to_string)
                    .ok_or_else(|| ApiError::bad_request("file part is missing a content type"))?;
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::bad_request(format!("failed to read file: {e}")))?;
                form.file = Some((content_type, bytes));
            }
            _ => {}
        }
    }
    Ok(form)
}

fn required(value: Option<String>, name: &str) -> ApiResult<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::bad_request(format!("{name} is required")))
}

fn parse_uuid(value: &str, name: &str) -> ApiResult<Uuid> {
    value.parse().map_err(|_| ApiError::bad_request(format!("{name} is not a valid id")))
}

pub async fn create_receipt(
    State(s): State<AppState>,
    user: AuthUser,
    multipart: Multipart,
) -> ApiResult<(StatusCode, Json<Receipt>)> {
    let form = read_form(multipart).await?;

    let bank = required(form.bank, "bank")?;
    let payment_method = required(form.payment_method, "payment_method")?;
    let amount: i64 = required(form.amount, "amount")?
        .parse()
        .map_err(|_| ApiError::bad_request("amount must be an integer in minor units"))?;
    if amount <= 0 {
        return Err(ApiError::bad_request("amount must be positive"));
    }
    let (content_type, bytes) = form.file.ok_or_else(|| ApiError::bad_request("missing file part"))?;

    // Policy first: nothing is persisted for an invalid file.
    uploads::RECEIPTS.check(&content_type, bytes.len())?;

    let (order_id, appointment_id) = match (form.order_id.as_deref(), form.appointment_id.as_deref()) {
        (Some(o), None) => (Some(parse_uuid(o, "order_id")?), None),
        (None, Some(a)) => (None, Some(parse_uuid(a, "appointment_id")?)),
        _ => {
            return Err(ApiError::bad_request("exactly one of order_id or appointment_id is required"));
        }
    };

    if let Some(order_id) = order_id {
        let owner: Option<(Uuid,)> = sqlx::query_as("SELECT user_id FROM orders WHERE id = $1")
            .bind(order_id)
            .fetch_optional(&s.db)
            .await?;
        match owner {
            Some((owner,)) if owner == user.id || user.is_admin() => {}
            _ => return Err(ApiError::NotFound("order")),
        }
    }
    if let Some(appointment_id) = appointment_id {
        let patient: Option<(Uuid,)> = sqlx::query_as("SELECT patient_id FROM appointments WHERE id = $1")
            .bind(appointment_id)
            .fetch_optional(&s.db)
            .await?;
        match patient {
            Some((patient,)) if patient == user.id || user.is_admin() => {}
            _ => return Err(ApiError::NotFound("appointment")),
        }
    }

    let file_path = uploads::store(&s.config.upload_dir, &uploads::RECEIPTS, &content_type, &bytes).await?;
    let receipt = sqlx::query_as::<_, Receipt>(
        "INSERT INTO receipts (id, user_id, order_id, appointment_id, bank, amount, payment_method, \
                               file_path, content_type, size_bytes, status, created_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, 'PENDING', NOW()) RETURNING *",
    )
    .bind(Uuid::now_v7())
    .bind(user.id)
    .bind(order_id)
    .bind(appointment_id)
    .bind(&bank)
    .bind(amount)
    .bind(&payment_method)
    .bind(&file_path)
    .bind(&content_type)
    .bind(bytes.len() as i64)
    .fetch_one(&s.db)
    .await?;

    Ok((StatusCode::CREATED, Json(receipt)))
}

#[derive(Debug, Deserialize)]
pub struct ReceiptListParams {
    pub status: Option<String>,
}

pub async fn list_receipts(
    State(s): State<AppState>,
    user: AuthUser,
    Query(p): Query<ReceiptListParams>,
) -> ApiResult<Json<Vec<Receipt>>> {
    let status = match p.status.as_deref() {
        Some(v) => Some(
            ReceiptStatus::parse(v)
                .ok_or_else(|| ApiError::bad_request(format!("unknown receipt status: {v}")))?
                .as_str(),
        ),
        None => None,
    };
    let receipts = if user.is_admin() {
        sqlx::query_as::<_, Receipt>(
            "SELECT * FROM receipts WHERE ($1::TEXT IS NULL OR status = $1) ORDER BY created_at DESC",
        )
        .bind(status)
        .fetch_all(&s.db)
        .await?
    } else {
        sqlx::query_as::<_, Receipt>(
            "SELECT * FROM receipts WHERE user_id = $2 AND ($1::TEXT IS NULL OR status = $1) \
             ORDER BY created_at DESC",
        )
        .bind(status)
        .bind(user.id)
        .fetch_all(&s.db)
        .await?
    };
    Ok(Json(receipts))
}

#[derive(Debug, Deserialize)]
pub struct ReviewRequest {
    pub status: String,
    pub comment: Option<String>,
}

pub async fn review_receipt(
    State(s): State<AppState>,
    admin: AuthUser,
    Path(id): Path<Uuid>,
    Json(r): Json<ReviewRequest>,
) -> ApiResult<Json<Receipt>> {
    admin.require_admin()?;
    let verdict = ReceiptStatus::parse(&r.status)
        .filter(ReceiptStatus::is_verdict)
        .ok_or_else(|| ApiError::bad_request("review status must be APPROVED or REJECTED"))?;

    let mut tx = s.db.begin().await?;
    let receipt = sqlx::query_as::<_, Receipt>("SELECT * FROM receipts WHERE id = $1 FOR UPDATE")
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(ApiError::NotFound("receipt"))?;
    let current = ReceiptStatus::parse(&receipt.status)
        .ok_or_else(|| anyhow::anyhow!("corrupt status on receipt {id}"))?;
    if !current.reviewable() {
        return Err(ApiError::bad_request("receipt has already been reviewed"));
    }

    let updated = sqlx::query_as::<_, Receipt>(
        "UPDATE receipts SET status = $2, reviewed_by = $3, reviewed_at = NOW(), review_comment = $4 \
         WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(verdict.as_str())
    .bind(admin.id)
    .bind(&r.comment)
    .fetch_one(&mut *tx)
    .await?;

    // An approved payment proof settles the linked order.
    if verdict == ReceiptStatus::Approved {
        if let Some(order_id) = updated.order_id {
            sqlx::query(
                "UPDATE orders SET payment_status = 'paid', updated_at = NOW() \
                 WHERE id = $1 AND payment_status = 'unpaid'",
            )
            .bind(order_id)
            .execute(&mut *tx)
            .await?;
        }
    }
    tx.commit().await?;

    if let Ok(Some((email, name))) =
        sqlx::query_as::<_, (String, String)>("SELECT email, name FROM users WHERE id = $1")
            .bind(updated.user_id)
            .fetch_optional(&s.db)
            .await
    {
        let outcome = if verdict == ReceiptStatus::Approved { "approved" } else { "rejected" };
        s.notifier.send_email(
            &email,
            &format!("Payment receipt {outcome}"),
            format!("Hi {name},\n\nYour payment receipt was {outcome}.\n"),
        );
    }
    s.notifier.publish(AppEvent::ReceiptReviewed { receipt_id: updated.id, status: updated.status.clone() });

    Ok(Json(updated))
}
