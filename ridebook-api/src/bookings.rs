use std::sync::Arc;

use axum::{
    extract::{Extension, Json, State},
    http::StatusCode,
    routing::{delete, get, post, put},
    Router,
};
use chrono::{DateTime, Utc};
use ridebook_core::{
    BookingDraft, BookingHistoryRecord, CarSummary, Outcome, PaymentStatus, StationId, TicketPlan,
};
use ridebook_core::repository::BookingRepository;
use ridebook_flow::BookingSession;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::AppError;
use crate::middleware::{customer_auth_middleware, CustomerClaims};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct BookingResponse {
    pub success: bool,
    pub message: String,
    pub booking: BookingDraft,
}

type BookingReply = (StatusCode, Json<BookingResponse>);

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DepartureRequest {
    pub station_id: StationId,
    pub qr_virtual_station_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArrivalRequest {
    pub station_id: StationId,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleRequest {
    pub departure_date: Option<DateTime<Utc>>,
    pub departure_time: Option<DateTime<Utc>>,
    pub confirmed: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct StepRequest {
    pub step: u8,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketPlanRequest {
    pub ticket_plan: Option<TicketPlan>,
}

#[derive(Debug, Deserialize)]
pub struct PaymentRequest {
    pub status: Option<PaymentStatus>,
    pub reference: Option<String>,
}

pub fn routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/v1/booking", get(get_booking))
        .route("/v1/booking/departure", post(select_departure).delete(clear_departure))
        .route("/v1/booking/arrival", post(select_arrival).delete(clear_arrival))
        .route("/v1/booking/schedule", put(set_schedule))
        .route("/v1/booking/step", post(advance_step))
        .route("/v1/booking/route", post(plan_route))
        .route("/v1/booking/car", post(select_car))
        .route("/v1/booking/ticket-plan", post(set_ticket_plan))
        .route("/v1/booking/payment", post(set_payment))
        .route("/v1/booking/save", post(save))
        .route("/v1/booking/load", post(load))
        .route("/v1/booking/finalize", post(finalize))
        .route("/v1/booking/complete", post(complete))
        .route("/v1/booking/reset", post(reset))
        .route("/v1/booking/history", get(history))
        .route("/v1/booking/session", delete(end_session))
        .route_layer(axum::middleware::from_fn_with_state(state, customer_auth_middleware))
}

async fn session(state: &AppState, claims: &CustomerClaims) -> Arc<BookingSession> {
    state.sessions.session_for(claims.identity()).await
}

fn reply(session: &BookingSession, outcome: Outcome) -> BookingReply {
    let status = if outcome.success {
        StatusCode::OK
    } else {
        StatusCode::UNPROCESSABLE_ENTITY
    };
    (
        status,
        Json(BookingResponse {
            success: outcome.success,
            message: outcome.message,
            booking: session.store().state(),
        }),
    )
}

/// Store mutations that can be refused on the current step answer 409.
fn guarded(session: &BookingSession, accepted: bool, refused: &str) -> BookingReply {
    if accepted {
        return reply(session, Outcome::ok("Updated"));
    }
    let (_, body) = reply(session, Outcome::failed(refused));
    (StatusCode::CONFLICT, body)
}

async fn get_booking(State(state): State<AppState>, Extension(claims): Extension<CustomerClaims>) -> BookingReply {
    let session = session(&state, &claims).await;
    let step_name = session.store().state().step_name();
    reply(&session, Outcome::ok(step_name.as_str()))
}

async fn select_departure(
    State(state): State<AppState>,
    Extension(claims): Extension<CustomerClaims>,
    Json(req): Json<DepartureRequest>,
) -> BookingReply {
    let session = session(&state, &claims).await;
    let accepted = match req.qr_virtual_station_id {
        Some(virtual_id) => session.store().select_qr_departure(req.station_id, virtual_id),
        None => session.store().select_departure(req.station_id),
    };
    guarded(&session, accepted, "Departure can only be changed before the arrival step")
}

async fn clear_departure(State(state): State<AppState>, Extension(claims): Extension<CustomerClaims>) -> BookingReply {
    let session = session(&state, &claims).await;
    session.store().clear_departure();
    reply(&session, Outcome::ok("Departure cleared"))
}

async fn select_arrival(
    State(state): State<AppState>,
    Extension(claims): Extension<CustomerClaims>,
    Json(req): Json<ArrivalRequest>,
) -> BookingReply {
    let session = session(&state, &claims).await;
    let accepted = session.store().select_arrival(req.station_id);
    guarded(&session, accepted, "Arrival can only be chosen on the arrival steps")
}

async fn clear_arrival(State(state): State<AppState>, Extension(claims): Extension<CustomerClaims>) -> BookingReply {
    let session = session(&state, &claims).await;
    session.store().clear_arrival();
    reply(&session, Outcome::ok("Arrival cleared"))
}

async fn set_schedule(
    State(state): State<AppState>,
    Extension(claims): Extension<CustomerClaims>,
    Json(req): Json<ScheduleRequest>,
) -> BookingReply {
    let session = session(&state, &claims).await;
    session
        .store()
        .set_departure_schedule(req.departure_date, req.departure_time);
    if let Some(confirmed) = req.confirmed {
        session.store().set_date_time_confirmed(confirmed);
    }
    reply(&session, Outcome::ok("Schedule updated"))
}

async fn advance_step(
    State(state): State<AppState>,
    Extension(claims): Extension<CustomerClaims>,
    Json(req): Json<StepRequest>,
) -> BookingReply {
    let session = session(&state, &claims).await;
    let outcome = session.advance_step(req.step).await;
    reply(&session, outcome)
}

async fn plan_route(State(state): State<AppState>, Extension(claims): Extension<CustomerClaims>) -> BookingReply {
    let session = session(&state, &claims).await;
    let outcome = session.plan_route().await;
    reply(&session, outcome)
}

async fn select_car(
    State(state): State<AppState>,
    Extension(claims): Extension<CustomerClaims>,
    Json(car): Json<CarSummary>,
) -> BookingReply {
    let session = session(&state, &claims).await;
    let message = format!("Car {} selected", car.id);
    session.store().select_car(car);
    reply(&session, Outcome::ok(message))
}

async fn set_ticket_plan(
    State(state): State<AppState>,
    Extension(claims): Extension<CustomerClaims>,
    Json(req): Json<TicketPlanRequest>,
) -> BookingReply {
    let session = session(&state, &claims).await;
    session.store().set_ticket_plan(req.ticket_plan);
    reply(&session, Outcome::ok("Ticket plan updated"))
}

async fn set_payment(
    State(state): State<AppState>,
    Extension(claims): Extension<CustomerClaims>,
    Json(req): Json<PaymentRequest>,
) -> BookingReply {
    let session = session(&state, &claims).await;
    session.store().set_payment_status(req.status);
    if req.reference.is_some() {
        session.store().set_payment_reference(req.reference);
    }
    reply(&session, Outcome::ok("Payment updated"))
}

async fn save(State(state): State<AppState>, Extension(claims): Extension<CustomerClaims>) -> BookingReply {
    let session = session(&state, &claims).await;
    let outcome = session.save().await;
    reply(&session, outcome)
}

async fn load(State(state): State<AppState>, Extension(claims): Extension<CustomerClaims>) -> BookingReply {
    let session = session(&state, &claims).await;
    let outcome = session.load().await;
    reply(&session, outcome)
}

async fn finalize(State(state): State<AppState>, Extension(claims): Extension<CustomerClaims>) -> BookingReply {
    let session = session(&state, &claims).await;
    let outcome = session.finalize().await;
    reply(&session, outcome)
}

async fn complete(State(state): State<AppState>, Extension(claims): Extension<CustomerClaims>) -> BookingReply {
    let session = session(&state, &claims).await;
    let outcome = session.complete().await;
    reply(&session, outcome)
}

/// Local reset followed by a save, which clears the remote draft.
async fn reset(State(state): State<AppState>, Extension(claims): Extension<CustomerClaims>) -> BookingReply {
    let session = session(&state, &claims).await;
    session.store().reset();
    let outcome = session.save().await;
    reply(&session, outcome)
}

async fn history(
    State(state): State<AppState>,
    Extension(claims): Extension<CustomerClaims>,
) -> Result<Json<Vec<BookingHistoryRecord>>, AppError> {
    let records = state
        .collaborators
        .bookings
        .list_history(&claims.sub)
        .await
        .map_err(AppError::collaborator)?;
    Ok(Json(records))
}

async fn end_session(
    State(state): State<AppState>,
    Extension(claims): Extension<CustomerClaims>,
) -> Result<StatusCode, AppError> {
    if !state.sessions.end(&claims.sub).await {
        return Err(AppError::NotFound("No active booking session".to_string()));
    }
    info!("Booking session for {} ended", claims.sub);
    Ok(StatusCode::NO_CONTENT)
}
