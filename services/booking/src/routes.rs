//! Booking service routes

use axum::{
    Extension, Json, Router,
    extract::{Path, Query, State},
    middleware,
    response::IntoResponse,
    routing::{delete, get, post, put},
};
use chrono::{Duration, NaiveDate, Utc};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::{
    error::{ApiError, ApiResult},
    middleware::{AuthUser, auth_middleware},
    models::{CalendarConfig, NewReservation, NewTrade, PrimeTimeWindow, ReservationStatus, User},
    state::AppState,
};

/// Create the router for the booking service
pub fn create_router(state: AppState) -> Router {
    let protected_routes = Router::new()
        .route("/reservations", get(list_reservations))
        .route("/reservations", post(create_reservation))
        .route("/reservations/:id", get(get_reservation))
        .route("/reservations/:id", put(update_reservation))
        .route("/reservations/:id", delete(cancel_reservation))
        .route("/reservations/:id/approval", post(decide_approval))
        .route("/reservations/:id/audit", get(get_reservation_audit))
        .route("/calendar", get(get_calendar))
        .route("/trades", get(list_trades))
        .route("/trades", post(propose_trade))
        .route("/trades/:id/response", post(respond_trade))
        .route("/settings/calendar", get(get_calendar_settings))
        .route("/settings/calendar", put(update_calendar_settings))
        .route("/settings/primetime", get(list_primetime_windows))
        .route("/settings/primetime", post(upsert_primetime_window))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    Router::new()
        .route("/health", get(health_check))
        .merge(protected_routes)
        .with_state(state)
}

/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "booking-service"
    }))
}

async fn current_user(state: &AppState, auth: AuthUser) -> ApiResult<User> {
    state
        .users
        .find_by_id(auth.id)
        .await?
        .ok_or(ApiError::Unauthenticated)
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

/// Reservation list filters
#[derive(Debug, Deserialize)]
pub struct ReservationQuery {
    pub date: Option<NaiveDate>,
    pub status: Option<String>,
    pub user_id: Option<Uuid>,
}

/// List reservations, scoped to the caller unless they are an admin
pub async fn list_reservations(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Query(query): Query<ReservationQuery>,
) -> ApiResult<impl IntoResponse> {
    let user = current_user(&state, auth).await?;

    let status = query
        .status
        .as_deref()
        .map(|s| {
            s.parse::<ReservationStatus>()
                .map_err(|_| ApiError::Validation(format!("Unknown status: {}", s)))
        })
        .transpose()?;

    let owner = if user.role.is_admin() {
        query.user_id
    } else {
        Some(user.id)
    };

    let reservations = state.ledger.list(owner, query.date, status).await?;
    Ok(Json(reservations))
}

/// Book a slot
pub async fn create_reservation(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Json(payload): Json<NewReservation>,
) -> ApiResult<impl IntoResponse> {
    let user = current_user(&state, auth).await?;
    let reservation = state.ledger.create(&user, payload, today()).await?;

    Ok((axum::http::StatusCode::CREATED, Json(reservation)))
}

/// Get a reservation, visible to its owner and admins
pub async fn get_reservation(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let user = current_user(&state, auth).await?;
    let reservation = state.ledger.find(id).await?.ok_or(ApiError::NotFound)?;

    if reservation.user_id != user.id && !user.role.is_admin() {
        return Err(ApiError::NotFound);
    }

    Ok(Json(reservation))
}

/// Move a reservation to a different slot
pub async fn update_reservation(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(payload): Json<NewReservation>,
) -> ApiResult<impl IntoResponse> {
    let user = current_user(&state, auth).await?;
    let reservation = state.ledger.update(&user, id, payload, today()).await?;

    Ok(Json(reservation))
}

/// Cancel a reservation
pub async fn cancel_reservation(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let user = current_user(&state, auth).await?;
    let reservation = state.ledger.cancel(&user, id, today()).await?;

    Ok(Json(reservation))
}

/// Approval decision payload
#[derive(Debug, Deserialize)]
pub struct ApprovalRequest {
    pub approve: bool,
    pub rejection_reason: Option<String>,
}

/// Approve or reject a pending primetime reservation, admin only
pub async fn decide_approval(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ApprovalRequest>,
) -> ApiResult<impl IntoResponse> {
    let user = current_user(&state, auth).await?;
    let reservation = state
        .ledger
        .approve(
            &user,
            id,
            payload.approve,
            payload.rejection_reason.as_deref(),
        )
        .await?;

    Ok(Json(reservation))
}

/// Audit history of a reservation, visible to its owner and admins
pub async fn get_reservation_audit(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let user = current_user(&state, auth).await?;
    let reservation = state.ledger.find(id).await?.ok_or(ApiError::NotFound)?;

    if reservation.user_id != user.id && !user.role.is_admin() {
        return Err(ApiError::NotFound);
    }

    let entries = state.audit.list_for_reservation(id).await?;
    Ok(Json(entries))
}

/// Calendar range query, defaults to one week starting today
#[derive(Debug, Deserialize)]
pub struct CalendarQuery {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

/// Slot grid for a date range
pub async fn get_calendar(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Query(query): Query<CalendarQuery>,
) -> ApiResult<impl IntoResponse> {
    current_user(&state, auth).await?;

    let start = query.start.unwrap_or_else(today);
    let end = query.end.unwrap_or(start + Duration::days(6));

    let days = state.ledger.calendar_view(start, end).await?;
    Ok(Json(days))
}

/// Trades the caller participates in
pub async fn list_trades(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> ApiResult<impl IntoResponse> {
    let user = current_user(&state, auth).await?;
    let trades = state.ledger.trades_for_user(user.id).await?;

    Ok(Json(trades))
}

/// Propose a trade
pub async fn propose_trade(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Json(payload): Json<NewTrade>,
) -> ApiResult<impl IntoResponse> {
    let user = current_user(&state, auth).await?;
    let trade = state.ledger.propose_trade(&user, payload, today()).await?;

    Ok((axum::http::StatusCode::CREATED, Json(trade)))
}

/// Trade response payload
#[derive(Debug, Deserialize)]
pub struct TradeResponseRequest {
    pub accept: bool,
    pub message: Option<String>,
}

/// Accept or reject a trade request, target user only
pub async fn respond_trade(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(payload): Json<TradeResponseRequest>,
) -> ApiResult<impl IntoResponse> {
    let user = current_user(&state, auth).await?;
    let trade = state
        .ledger
        .respond_trade(
            &user,
            id,
            payload.accept,
            payload.message.as_deref(),
            today(),
        )
        .await?;

    Ok(Json(trade))
}

/// Current calendar configuration
pub async fn get_calendar_settings(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> ApiResult<impl IntoResponse> {
    current_user(&state, auth).await?;
    let config = state.settings.calendar_config().await?;

    Ok(Json(config))
}

/// Replace the calendar configuration, admin only
pub async fn update_calendar_settings(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Json(payload): Json<CalendarConfig>,
) -> ApiResult<impl IntoResponse> {
    let user = current_user(&state, auth).await?;
    if !user.role.is_admin() {
        return Err(ApiError::Forbidden);
    }

    if payload.business_start_time >= payload.business_end_time {
        return Err(ApiError::Validation(
            "Business hours must start before they end".to_string(),
        ));
    }
    if payload.slot_duration_minutes <= 0 {
        return Err(ApiError::Validation(
            "Slot duration must be positive".to_string(),
        ));
    }
    if payload.max_advance_booking_days < 0 {
        return Err(ApiError::Validation(
            "Advance booking window must not be negative".to_string(),
        ));
    }

    state.settings.upsert_calendar_config(&payload).await?;
    Ok(Json(payload))
}

/// All primetime windows
pub async fn list_primetime_windows(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> ApiResult<impl IntoResponse> {
    current_user(&state, auth).await?;
    let windows = state.settings.windows().await?;

    Ok(Json(windows))
}

/// Create or replace the window for a weekday, admin only
pub async fn upsert_primetime_window(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Json(payload): Json<PrimeTimeWindow>,
) -> ApiResult<impl IntoResponse> {
    let user = current_user(&state, auth).await?;
    if !user.role.is_admin() {
        return Err(ApiError::Forbidden);
    }

    if !(0..=6).contains(&payload.weekday) {
        return Err(ApiError::Validation(
            "Weekday must be between 0 (Monday) and 6 (Sunday)".to_string(),
        ));
    }
    if payload.start_time >= payload.end_time {
        return Err(ApiError::Validation(
            "Window must start before it ends".to_string(),
        ));
    }

    state.settings.upsert_window(&payload).await?;
    Ok((axum::http::StatusCode::CREATED, Json(payload)))
}
