use chrono::{DateTime, Utc};
use ridebook_shared::Masked;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::draft::{BookingDraft, CarSummary, PaymentStatus, RouteInfo, StationId, TicketPlan};

/// Lifecycle of a durable booking
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Active,
    Completed,
}

/// Payload sent to the booking API when a draft is finalized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookingRequest {
    pub user_id: String,
    pub departure_station_id: StationId,
    pub arrival_station_id: StationId,
    pub departure_date: DateTime<Utc>,
    pub departure_time: DateTime<Utc>,
    pub ticket_plan: Option<TicketPlan>,
    pub selected_car: CarSummary,
    pub route: Option<RouteInfo>,
    pub estimated_cost: Option<i64>,
    pub payment_status: Option<PaymentStatus>,
    pub payment_reference: Option<Masked<String>>,
}

impl BookingRequest {
    /// Build a request from a draft, or `None` if a required field is missing.
    pub fn from_draft(user_id: &str, draft: &BookingDraft) -> Option<Self> {
        Some(Self {
            user_id: user_id.to_string(),
            departure_station_id: draft.departure_station_id?,
            arrival_station_id: draft.arrival_station_id?,
            departure_date: draft.departure_date?,
            departure_time: draft.departure_time?,
            ticket_plan: draft.ticket_plan,
            selected_car: draft.selected_car.clone()?,
            route: draft.route.clone(),
            estimated_cost: draft.estimated_cost,
            payment_status: draft.payment_status,
            payment_reference: draft.payment_reference.clone(),
        })
    }
}

/// A finalized booking, independent of the draft that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookingRecord {
    pub id: String,
    pub user_id: String,
    pub departure_station_id: StationId,
    pub arrival_station_id: StationId,
    pub departure_date: DateTime<Utc>,
    pub departure_time: DateTime<Utc>,
    pub ticket_plan: Option<TicketPlan>,
    pub selected_car_id: String,
    pub selected_car: CarSummary,
    pub route: Option<RouteInfo>,
    pub estimated_cost: Option<i64>,
    pub payment_status: Option<PaymentStatus>,
    pub payment_reference: Option<Masked<String>>,
    pub status: BookingStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl BookingRecord {
    pub fn from_request(request: &BookingRequest) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: request.user_id.clone(),
            departure_station_id: request.departure_station_id,
            arrival_station_id: request.arrival_station_id,
            departure_date: request.departure_date,
            departure_time: request.departure_time,
            ticket_plan: request.ticket_plan,
            selected_car_id: request.selected_car.id.clone(),
            selected_car: request.selected_car.clone(),
            route: request.route.clone(),
            estimated_cost: request.estimated_cost,
            payment_status: request.payment_status,
            payment_reference: request.payment_reference.clone(),
            status: BookingStatus::Active,
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    /// Transition: Active → Completed
    pub fn complete(&mut self) {
        let now = Utc::now();
        self.status = BookingStatus::Completed;
        self.completed_at = Some(now);
        self.updated_at = now;
    }
}

/// Append-only trip history entry, derived from a completed booking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookingHistoryRecord {
    pub id: String,
    pub booking_id: String,
    pub user_id: String,
    pub departure_station_id: StationId,
    pub arrival_station_id: StationId,
    pub departure_date: DateTime<Utc>,
    pub departure_time: DateTime<Utc>,
    pub ticket_plan: Option<TicketPlan>,
    pub car_name: String,
    pub distance: Option<f64>,
    pub duration: Option<f64>,
    pub final_cost: Option<i64>,
    pub payment_reference: Option<Masked<String>>,
    pub booked_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

impl BookingHistoryRecord {
    pub fn from_completed(record: &BookingRecord) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            booking_id: record.id.clone(),
            user_id: record.user_id.clone(),
            departure_station_id: record.departure_station_id,
            arrival_station_id: record.arrival_station_id,
            departure_date: record.departure_date,
            departure_time: record.departure_time,
            ticket_plan: record.ticket_plan,
            car_name: record.selected_car.name.clone(),
            distance: record.route.as_ref().map(|r| r.distance),
            duration: record.route.as_ref().map(|r| r.duration),
            final_cost: record.estimated_cost,
            payment_reference: record.payment_reference.clone(),
            booked_at: record.created_at,
            completed_at: record.completed_at.unwrap_or(record.updated_at),
        }
    }
}
