//! HTTP engine handlers

use axum::{
    extract::{Path, State},
    Json,
};

use crate::error::{AppError, Result};
use crate::events::EventOutcome;
use crate::notification::{DeliveryMode, DispatchArgs};
use crate::reminders::{ReminderKind, ReminderOutcome};
use crate::server::AppState;

use super::models::{
    DispatchRequest, DispatchResponse, DrainResponse, ExpenseRejectedRequest, RunReminderRequest,
    SendResponse, TimesheetRejectedRequest, TimesheetSharedRequest,
};

/// Create a notification and, in immediate mode, send it
#[tracing::instrument(
    name = "http.dispatch",
    skip(state, request),
    fields(template_code = %request.template_code, recipient_uid = %request.recipient_uid)
)]
pub async fn dispatch_notification(
    State(state): State<AppState>,
    Json(request): Json<DispatchRequest>,
) -> Result<Json<DispatchResponse>> {
    let mode: DeliveryMode = request.mode.trim().parse()?;

    let args = DispatchArgs::new(request.template_code, request.recipient_uid, mode)
        .data(request.data)
        .system(request.system)
        .actor(request.actor_uid);
    let id = state.engine.dispatch(args).await?;

    Ok(Json(DispatchResponse {
        created: id.is_some(),
        notification_id: id,
        mode: mode.as_str().to_string(),
    }))
}

/// Send one pending notification by id
#[tracing::instrument(name = "http.send", skip(state))]
pub async fn send_notification(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SendResponse>> {
    if state.engine.store().get(&id).await?.is_none() {
        return Err(AppError::NotFound(format!("notification {}", id)));
    }

    state.engine.send_by_id(&id).await?;

    let status = state
        .engine
        .store()
        .snapshot(&id)
        .await?
        .map(|snapshot| snapshot.status)
        .unwrap_or_default();

    Ok(Json(SendResponse {
        notification_id: id,
        status,
    }))
}

/// Send pending notifications until none are left
#[tracing::instrument(name = "http.drain", skip(state))]
pub async fn drain_notifications(State(state): State<AppState>) -> Result<Json<DrainResponse>> {
    let sent = state
        .engine
        .drain()
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?;

    Ok(Json(DrainResponse { sent }))
}

/// Run a named reminder job
#[tracing::instrument(name = "http.run_reminder", skip(state, request))]
pub async fn run_reminder(
    State(state): State<AppState>,
    Path(job): Path<String>,
    Json(request): Json<RunReminderRequest>,
) -> Result<Json<ReminderOutcome>> {
    let kind: ReminderKind = job.parse()?;
    let outcome = state
        .engine
        .reminders()
        .run_named(kind, request.send, request.week_ending.as_deref())
        .await?;

    Ok(Json(outcome))
}

#[tracing::instrument(
    name = "http.timesheet_rejected",
    skip(state, request),
    fields(timesheet_id = %request.timesheet.id)
)]
pub async fn timesheet_rejected(
    State(state): State<AppState>,
    Json(request): Json<TimesheetRejectedRequest>,
) -> Result<Json<EventOutcome>> {
    let outcome = state
        .engine
        .events()
        .queue_timesheet_rejected(&request.timesheet, &request.rejector_uid, &request.reason)
        .await?;

    Ok(Json(outcome))
}

#[tracing::instrument(
    name = "http.expense_rejected",
    skip(state, request),
    fields(expense_id = %request.expense.id)
)]
pub async fn expense_rejected(
    State(state): State<AppState>,
    Json(request): Json<ExpenseRejectedRequest>,
) -> Result<Json<EventOutcome>> {
    let outcome = state
        .engine
        .events()
        .queue_expense_rejected(&request.expense, &request.rejector_uid, &request.reason)
        .await?;

    Ok(Json(outcome))
}

#[tracing::instrument(
    name = "http.timesheet_shared",
    skip(state, request),
    fields(timesheet_id = %request.timesheet.id)
)]
pub async fn timesheet_shared(
    State(state): State<AppState>,
    Json(request): Json<TimesheetSharedRequest>,
) -> Result<Json<EventOutcome>> {
    let outcome = state
        .engine
        .events()
        .queue_timesheet_shared(&request.timesheet, &request.sharer_uid, &request.viewer_uids)
        .await?;

    Ok(Json(outcome))
}
