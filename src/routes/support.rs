//! Support records: tickets, inquiries and feedback.

use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::validated;
use crate::auth::AuthUser;
use crate::domain::events::AppEvent;
use crate::domain::support::{InquiryStatus, TicketStatus};
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use crate::uploads;

// ---------------------------------------------------------------------------
// Tickets
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Ticket {
    pub id: Uuid,
    pub user_id: Uuid,
    pub subject: String,
    pub message: String,
    pub attachment_path: Option<String>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub async fn create_ticket(
    State(s): State<AppState>,
    user: AuthUser,
    mut multipart: Multipart,
) -> ApiResult<(StatusCode, Json<Ticket>)> {
    let mut subject = None;
    let mut message = None;
    let mut file = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("malformed multipart body: {e}")))?
    {
        match field.name() {
            Some("subject") => {
                subject = Some(field.text().await.map_err(|e| ApiError::bad_request(e.to_string()))?)
            }
            Some("message") => {
                message = Some(field.text().await.map_err(|e| ApiError::bad_request(e.to_string()))?)
            }
            Some("file") => {
                let content_type = field
                    .content_type()
                    .map(str::to_string)
                    .ok_or_else(|| ApiError::bad_request("file part is missing a content type"))?;
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::bad_request(format!("failed to read file: {e}")))?;
                file = Some((content_type, bytes));
            }
            _ => {}
        }
    }
    let subject = subject
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::bad_request("subject is required"))?;
    let message = message
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::bad_request("message is required"))?;

    let attachment_path = match file {
        Some((content_type, bytes)) => {
            Some(uploads::store(&s.config.upload_dir, &uploads::TICKET_ATTACHMENTS, &content_type, &bytes).await?)
        }
        None => None,
    };

    let ticket = sqlx::query_as::<_, Ticket>(
        "INSERT INTO tickets (id, user_id, subject, message, attachment_path, status, created_at, updated_at) \
         VALUES ($1, $2, $3, $4, $5, 'new', NOW(), NOW()) RETURNING *",
    )
    .bind(Uuid::now_v7())
    .bind(user.id)
    .bind(&subject)
    .bind(&message)
    .bind(&attachment_path)
    .fetch_one(&s.db)
    .await?;
    Ok((StatusCode::CREATED, Json(ticket)))
}

pub async fn list_tickets(State(s): State<AppState>, user: AuthUser) -> ApiResult<Json<Vec<Ticket>>> {
    let tickets = if user.is_admin() {
        sqlx::query_as::<_, Ticket>("SELECT * FROM tickets ORDER BY created_at DESC")
            .fetch_all(&s.db)
            .await?
    } else {
        sqlx::query_as::<_, Ticket>("SELECT * FROM tickets WHERE user_id = $1 ORDER BY created_at DESC")
            .bind(user.id)
            .fetch_all(&s.db)
            .await?
    };
    Ok(Json(tickets))
}

#[derive(Debug, Deserialize)]
pub struct UpdateTicketRequest {
    pub status: String,
}

pub async fn update_ticket(
    State(s): State<AppState>,
    admin: AuthUser,
    Path(id): Path<Uuid>,
    Json(r): Json<UpdateTicketRequest>,
) -> ApiResult<Json<Ticket>> {
    admin.require_admin()?;
    let next = TicketStatus::parse(&r.status)
        .ok_or_else(|| ApiError::bad_request(format!("unknown ticket status: {}", r.status)))?;

    let ticket = sqlx::query_as::<_, Ticket>("SELECT * FROM tickets WHERE id = $1")
        .bind(id)
        .fetch_optional(&s.db)
        .await?
        .ok_or(ApiError::NotFound("ticket"))?;
    let current = TicketStatus::parse(&ticket.status)
        .ok_or_else(|| anyhow::anyhow!("corrupt status on ticket {id}"))?;
    if !current.can_transition_to(next) {
        return Err(ApiError::bad_request(format!(
            "cannot move a {} ticket to {}",
            current.as_str(),
            next.as_str()
        )));
    }

    let updated = sqlx::query_as::<_, Ticket>(
        "UPDATE tickets SET status = $2, updated_at = NOW() WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(next.as_str())
    .fetch_one(&s.db)
    .await?;

    if let Ok(Some((email, name))) =
        sqlx::query_as::<_, (String, String)>("SELECT email, name FROM users WHERE id = $1")
            .bind(updated.user_id)
            .fetch_optional(&s.db)
            .await
    {
        s.notifier.send_email(
            &email,
            &format!("Ticket \"{}\" update", updated.subject),
            format!("Hi {name},\n\nYour support ticket is now {}.\n", updated.status),
        );
    }
    s.notifier.publish(AppEvent::TicketUpdated { ticket_id: updated.id, status: updated.status.clone() });

    Ok(Json(updated))
}

pub async fn delete_ticket(
    State(s): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    let ticket = sqlx::query_as::<_, Ticket>("SELECT * FROM tickets WHERE id = $1")
        .bind(id)
        .fetch_optional(&s.db)
        .await?
        .ok_or(ApiError::NotFound("ticket"))?;
    if !user.is_admin() {
        if ticket.user_id != user.id {
            return Err(ApiError::NotFound("ticket"));
        }
        if ticket.status != TicketStatus::New.as_str() {
            return Err(ApiError::Forbidden("only new tickets can be withdrawn"));
        }
    }
    sqlx::query("DELETE FROM tickets WHERE id = $1").bind(id).execute(&s.db).await?;

    if let Some(path) = ticket.attachment_path {
        let disk = s.config.upload_dir.join(path.trim_start_matches("/uploads/"));
        tokio::spawn(async move {
            let _ = tokio::fs::remove_file(disk).await;
        });
    }
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Inquiries
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Inquiry {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub subject: String,
    pub message: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateInquiryRequest {
    #[validate(length(min = 1, max = 120))]
    pub name: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1, max = 200))]
    pub subject: String,
    #[validate(length(min = 1, max = 5000))]
    pub message: String,
}

/// Public contact form; no account required.
pub async fn create_inquiry(
    State(s): State<AppState>,
    Json(r): Json<CreateInquiryRequest>,
) -> ApiResult<(StatusCode, Json<Inquiry>)> {
    validated(&r)?;
    let inquiry = sqlx::query_as::<_, Inquiry>(
        "INSERT INTO inquiries (id, name, email, subject, message, status, created_at) \
         VALUES ($1, $2, $3, $4, $5, 'new', NOW()) RETURNING *",
    )
    .bind(Uuid::now_v7())
    .bind(r.name.trim())
    .bind(r.email.trim())
    .bind(r.subject.trim())
    .bind(r.message.trim())
    .fetch_one(&s.db)
    .await?;
    Ok((StatusCode::CREATED, Json(inquiry)))
}

pub async fn list_inquiries(State(s): State<AppState>, user: AuthUser) -> ApiResult<Json<Vec<Inquiry>>> {
    user.require_admin()?;
    let inquiries = sqlx::query_as::<_, Inquiry>("SELECT * FROM inquiries ORDER BY created_at DESC")
        .fetch_all(&s.db)
        .await?;
    Ok(Json(inquiries))
}

#[derive(Debug, Deserialize, Validate)]
pub struct AnswerInquiryRequest {
    #[validate(length(min = 1, max = 5000))]
    pub reply: String,
}

pub async fn answer_inquiry(
    State(s): State<AppState>,
    admin: AuthUser,
    Path(id): Path<Uuid>,
    Json(r): Json<AnswerInquiryRequest>,
) -> ApiResult<Json<Inquiry>> {
    admin.require_admin()?;
    validated(&r)?;
    let inquiry = sqlx::query_as::<_, Inquiry>("SELECT * FROM inquiries WHERE id = $1")
        .bind(id)
        .fetch_optional(&s.db)
        .await?
        .ok_or(ApiError::NotFound("inquiry"))?;
    if inquiry.status == InquiryStatus::Answered.as_str() {
        return Err(ApiError::bad_request("inquiry has already been answered"));
    }

    let updated = sqlx::query_as::<_, Inquiry>(
        "UPDATE inquiries SET status = 'answered' WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .fetch_one(&s.db)
    .await?;

    s.notifier.send_email(
        &updated.email,
        &format!("Re: {}", updated.subject),
        format!("Hi {},\n\n{}\n", updated.name, r.reply.trim()),
    );
    Ok(Json(updated))
}

// ---------------------------------------------------------------------------
// Feedback
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Feedback {
    pub id: Uuid,
    pub user_id: Uuid,
    pub rating: i32,
    pub comment: String,
    pub approved: Option<bool>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateFeedbackRequest {
    #[validate(range(min = 1, max = 5))]
    pub rating: i32,
    #[validate(length(min = 1, max = 2000))]
    pub comment: String,
}

pub async fn create_feedback(
    State(s): State<AppState>,
    user: AuthUser,
    Json(r): Json<CreateFeedbackRequest>,
) -> ApiResult<(StatusCode, Json<Feedback>)> {
    validated(&r)?;
    let feedback = sqlx::query_as::<_, Feedback>(
        "INSERT INTO feedback (id, user_id, rating, comment, approved, created_at) \
         VALUES ($1, $2, $3, $4, NULL, NOW()) RETURNING *",
    )
    .bind(Uuid::now_v7())
    .bind(user.id)
    .bind(r.rating)
    .bind(r.comment.trim())
    .fetch_one(&s.db)
    .await?;
    Ok((StatusCode::CREATED, Json(feedback)))
}

#[derive(Debug, Deserialize)]
pub struct FeedbackListParams {
    pub all: Option<bool>,
}

/// Public listing shows approved entries; admins may request everything.
pub async fn list_feedback(
    State(s): State<AppState>,
    user: Option<AuthUser>,
    Query(p): Query<FeedbackListParams>,
) -> ApiResult<Json<Vec<Feedback>>> {
    let see_all = p.all.unwrap_or(false) && user.as_ref().is_some_and(AuthUser::is_admin);
    let feedback = if see_all {
        sqlx::query_as::<_, Feedback>("SELECT * FROM feedback ORDER BY created_at DESC")
            .fetch_all(&s.db)
            .await?
    } else {
        sqlx::query_as::<_, Feedback>(
            "SELECT * FROM feedback WHERE approved = TRUE ORDER BY created_at DESC",
        )
        .fetch_all(&s.db)
        .await?
    };
    Ok(Json(feedback))
}

#[derive(Debug, Deserialize)]
pub struct ModerateFeedbackRequest {
    pub approved: bool,
}

pub async fn moderate_feedback(
    State(s): State<AppState>,
    admin: AuthUser,
    Path(id): Path<Uuid>,
    Json(r): Json<ModerateFeedbackRequest>,
) -> ApiResult<Json<Feedback>> {
    admin.require_admin()?;
    let feedback = sqlx::query_as::<_, Feedback>(
        "UPDATE feedback SET approved = $2 WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(r.approved)
    .fetch_optional(&s.db)
    .await?
    .ok_or(ApiError::NotFound("feedback"))?;
    Ok(Json(feedback))
}

pub async fn delete_feedback(
    State(s): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    let result = if user.is_admin() {
        sqlx::query("DELETE FROM feedback WHERE id = $1").bind(id).execute(&s.db).await?
    } else {
        sqlx::query("DELETE FROM feedback WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user.id)
            .execute(&s.db)
            .await?
    };
    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound("feedback"));
    }
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inquiry_requires_valid_email() {
        let r = CreateInquiryRequest {
            name: "Ravi".into(),
            email: "nope".into(),
            subject: "Hours".into(),
            message: "Are you open on Sunday?".into(),
        };
        assert!(r.validate().is_err());
    }

    #[test]
    fn feedback_rating_is_bounded() {
        let r = CreateFeedbackRequest { rating: 6, comment: "great".into() };
        assert!(r.validate().is_err());
        let r = CreateFeedbackRequest { rating: 0, comment: "great".into() };
        assert!(r.validate().is_err());
        let r = CreateFeedbackRequest { rating: 5, comment: "great".into() };
        assert!(r.validate().is_ok());
    }
}
