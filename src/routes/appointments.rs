//! Clinic appointment booking.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::validated;
use crate::auth::AuthUser;
use crate::domain::appointment::AppointmentStatus;
use crate::domain::events::AppEvent;
use crate::domain::user::Role;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Appointment {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub scheduled_at: DateTime<Utc>,
    pub reason: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateAppointmentRequest {
    pub doctor_id: Uuid,
    pub scheduled_at: DateTime<Utc>,
    #[validate(length(min = 1, max = 500))]
    pub reason: String,
}

pub async fn create_appointment(
    State(s): State<AppState>,
    user: AuthUser,
    Json(r): Json<CreateAppointmentRequest>,
) -> ApiResult<(StatusCode, Json<Appointment>)> {
    validated(&r)?;
    if r.scheduled_at <= Utc::now() {
        return Err(ApiError::bad_request("appointment must be in the future"));
    }
    let doctor: Option<(String, String)> = sqlx::query_as(
        "SELECT email, name FROM users WHERE id = $1 AND role = 'DOCTOR' AND is_approved = TRUE",
    )
    .bind(r.doctor_id)
    .fetch_optional(&s.db)
    .await?;
    let (doctor_email, doctor_name) = doctor.ok_or(ApiError::NotFound("doctor"))?;

    let appointment = sqlx::query_as::<_, Appointment>(
        "INSERT INTO appointments (id, patient_id, doctor_id, scheduled_at, reason, status, created_at, updated_at) \
         VALUES ($1, $2, $3, $4, $5, 'pending', NOW(), NOW()) RETURNING *",
    )
    .bind(Uuid::now_v7())
    .bind(user.id)
    .bind(r.doctor_id)
    .bind(r.scheduled_at)
    .bind(r.reason.trim())
    .fetch_one(&s.db)
    .await?;

    s.notifier.send_email(
        &doctor_email,
        "New appointment request",
        format!(
            "Hi {doctor_name},\n\n{} requested an appointment on {}.\n",
            user.name, appointment.scheduled_at
        ),
    );

    Ok((StatusCode::CREATED, Json(appointment)))
}

pub async fn list_appointments(State(s): State<AppState>, user: AuthUser) -> ApiResult<Json<Vec<Appointment>>> {
    let appointments = match user.role {
        Role::Admin => {
            sqlx::query_as::<_, Appointment>("SELECT * FROM appointments ORDER BY scheduled_at")
                .fetch_all(&s.db)
                .await?
        }
        Role::Doctor => {
            sqlx::query_as::<_, Appointment>(
                "SELECT * FROM appointments WHERE doctor_id = $1 ORDER BY scheduled_at",
            )
            .bind(user.id)
            .fetch_all(&s.db)
            .await?
        }
        _ => {
            sqlx::query_as::<_, Appointment>(
                "SELECT * FROM appointments WHERE patient_id = $1 ORDER BY scheduled_at",
            )
            .bind(user.id)
            .fetch_all(&s.db)
            .await?
        }
    };
    Ok(Json(appointments))
}

#[derive(Debug, Deserialize)]
pub struct UpdateAppointmentRequest {
    pub status: String,
}

pub async fn update_appointment(
    State(s): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(r): Json<UpdateAppointmentRequest>,
) -> ApiResult<Json<Appointment>> {
    let next = AppointmentStatus::parse(&r.status)
        .ok_or_else(|| ApiError::bad_request(format!("unknown appointment status: {}", r.status)))?;

    let appointment = sqlx::query_as::<_, Appointment>("SELECT * FROM appointments WHERE id = $1")
        .bind(id)
        .fetch_optional(&s.db)
        .await?
        .ok_or(ApiError::NotFound("appointment"))?;
    let is_patient = appointment.patient_id == user.id;
    let is_doctor = appointment.doctor_id == user.id;
    if !is_patient && !is_doctor && !user.is_admin() {
        return Err(ApiError::NotFound("appointment"));
    }

    let allowed = match next {
        AppointmentStatus::Cancelled => is_patient || user.is_admin(),
        AppointmentStatus::Confirmed | AppointmentStatus::Completed => is_doctor || user.is_admin(),
        AppointmentStatus::Pending => user.is_admin(),
    };
    if !allowed {
        return Err(ApiError::Forbidden("not allowed to set this appointment status"));
    }

    let current = AppointmentStatus::parse(&appointment.status)
        .ok_or_else(|| anyhow::anyhow!("corrupt status on appointment {id}"))?;
    if !current.can_transition_to(next) {
        return Err(ApiError::bad_request(format!(
            "cannot move a {} appointment to {}",
            current.as_str(),
            next.as_str()
        )));
    }

    let updated = sqlx::query_as::<_, Appointment>(
        "UPDATE appointments SET status = $2, updated_at = NOW() WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(next.as_str())
    .fetch_one(&s.db)
    .await?;

    // Tell the other party, whichever side made the change.
    let counterpart = if is_patient { updated.doctor_id } else { updated.patient_id };
    if let Ok(Some((email, name))) =
        sqlx::query_as::<_, (String, String)>("SELECT email, name FROM users WHERE id = $1")
            .bind(counterpart)
            .fetch_optional(&s.db)
            .await
    {
        s.notifier.send_email(
            &email,
            "Appointment update",
            format!("Hi {name},\n\nThe appointment on {} is now {}.\n", updated.scheduled_at, updated.status),
        );
    }
    s.notifier.publish(AppEvent::AppointmentUpdated { appointment_id: updated.id, status: updated.status.clone() });

    Ok(Json(updated))
}
