use chrono::{DateTime, Utc};
use ridebook_shared::Masked;
use serde::{Deserialize, Serialize};

use crate::step::{self, StepName, FIRST_STEP};

/// Catalog identifier of a station.
pub type StationId = i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TicketPlan {
    Single,
    Payg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RouteStatus {
    #[default]
    Idle,
    Loading,
    Succeeded,
    Failed,
}

/// Route between the two selected stations, as produced by the mapping provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteInfo {
    /// Meters.
    pub distance: f64,
    /// Seconds.
    pub duration: f64,
    /// Encoded path.
    pub polyline: String,
}

impl RouteInfo {
    pub fn distance_km(&self) -> f64 {
        self.distance / 1000.0
    }
}

/// Vehicle summary kept on the draft once a car has been picked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CarSummary {
    pub id: String,
    pub name: String,
    /// Price per distance unit.
    pub price: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seats: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

/// The in-progress booking of the active session.
///
/// `step` and `step_name` are private: they only ever change together through
/// [`BookingDraft::set_step`], which the state store calls after the step
/// policy has admitted the transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BookingDraft {
    step: u8,
    step_name: StepName,
    pub departure_station_id: Option<StationId>,
    pub arrival_station_id: Option<StationId>,
    pub departure_date: Option<DateTime<Utc>>,
    pub departure_time: Option<DateTime<Utc>>,
    pub is_date_time_confirmed: bool,
    pub route: Option<RouteInfo>,
    pub route_status: RouteStatus,
    pub route_error: Option<String>,
    pub ticket_plan: Option<TicketPlan>,
    pub selected_car_id: Option<String>,
    pub selected_car: Option<CarSummary>,
    pub estimated_cost: Option<i64>,
    pub booking_id: Option<String>,
    pub payment_status: Option<PaymentStatus>,
    pub payment_reference: Option<Masked<String>>,
    pub is_qr_scan_station: bool,
    pub qr_virtual_station_id: Option<String>,
}

impl Default for BookingDraft {
    fn default() -> Self {
        Self {
            step: FIRST_STEP,
            step_name: StepName::for_step(FIRST_STEP),
            departure_station_id: None,
            arrival_station_id: None,
            departure_date: None,
            departure_time: None,
            is_date_time_confirmed: false,
            route: None,
            route_status: RouteStatus::Idle,
            route_error: None,
            ticket_plan: None,
            selected_car_id: None,
            selected_car: None,
            estimated_cost: None,
            booking_id: None,
            payment_status: None,
            payment_reference: None,
            is_qr_scan_station: false,
            qr_virtual_station_id: None,
        }
    }
}

impl BookingDraft {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn step(&self) -> u8 {
        self.step
    }

    pub fn step_name(&self) -> StepName {
        self.step_name
    }

    /// Move to `step`, keeping `step_name` in sync. Admissibility is the
    /// caller's concern.
    pub fn set_step(&mut self, step: u8) {
        self.step = step;
        self.step_name = StepName::for_step(step);
    }

    pub fn is_durable(&self) -> bool {
        step::is_durable(self.step)
    }

    /// A snapshot read from storage is only trusted if its step is in range and
    /// its name agrees with it.
    pub fn is_well_formed(&self) -> bool {
        step::is_valid_step(self.step) && self.step_name == StepName::for_step(self.step)
    }

    pub fn clear_schedule(&mut self) {
        self.departure_date = None;
        self.departure_time = None;
        self.is_date_time_confirmed = false;
    }

    pub fn clear_route(&mut self) {
        self.route = None;
        self.route_status = RouteStatus::Idle;
        self.route_error = None;
    }

    pub fn has_both_stations(&self) -> bool {
        self.departure_station_id.is_some() && self.arrival_station_id.is_some()
    }

    /// Route data may only exist while both endpoints are selected.
    pub fn is_route_consistent(&self) -> bool {
        self.route.is_none() || self.has_both_stations()
    }

    /// Fields a draft needs before it can become a durable booking.
    pub fn missing_for_finalize(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.departure_station_id.is_none() {
            missing.push("departure station");
        }
        if self.arrival_station_id.is_none() {
            missing.push("arrival station");
        }
        if self.departure_date.is_none() {
            missing.push("departure date");
        }
        if self.departure_time.is_none() {
            missing.push("departure time");
        }
        if self.selected_car.is_none() {
            missing.push("car");
        }
        missing
    }
}
