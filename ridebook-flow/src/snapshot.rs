//! Remote representation of the booking draft.
//!
//! Writing is a straight serialization. Reading is field by field: whatever
//! lives in the remote document is loosely typed, so each field is parsed on
//! its own and dropped if it does not validate. A bad field never aborts the
//! whole load.

use chrono::{DateTime, SecondsFormat, TimeZone, Utc};
use ridebook_core::step;
use ridebook_core::{BookingDraft, CarSummary, PaymentStatus, RouteInfo, StationId, TicketPlan};
use ridebook_shared::Masked;
use serde_json::{json, Value};

/// The `booking` field written to the user's remote document.
pub fn to_remote(draft: &BookingDraft) -> Value {
    json!({
        "step": draft.step(),
        "stepName": draft.step_name(),
        "departureStationId": draft.departure_station_id,
        "arrivalStationId": draft.arrival_station_id,
        "departureDateString": draft.departure_date.map(format_timestamp),
        "departureTimeString": draft.departure_time.map(format_timestamp),
        "isDateTimeConfirmed": draft.is_date_time_confirmed,
        "ticketPlan": draft.ticket_plan,
        "selectedCarId": draft.selected_car_id,
        "selectedCar": draft.selected_car,
        "estimatedCost": draft.estimated_cost,
        "bookingId": draft.booking_id,
        "paymentStatus": draft.payment_status,
        "paymentReference": draft.payment_reference.as_ref().map(|r| r.expose().clone()),
        "route": draft.route,
        "isQrScanStation": draft.is_qr_scan_station,
        "qrVirtualStationId": draft.qr_virtual_station_id,
        "updatedAt": format_timestamp(Utc::now()),
    })
}

fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Step recorded in a remote snapshot, if it is a valid step number.
pub fn decode_step(remote: &Value) -> Option<u8> {
    remote
        .get("step")
        .and_then(Value::as_u64)
        .and_then(|s| u8::try_from(s).ok())
        .filter(|s| step::is_valid_step(*s))
}

/// Fields that survived validation. `None` means absent or dropped.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RehydratedDraft {
    pub departure_station_id: Option<StationId>,
    pub arrival_station_id: Option<StationId>,
    pub departure_date: Option<DateTime<Utc>>,
    pub departure_time: Option<DateTime<Utc>>,
    pub is_date_time_confirmed: Option<bool>,
    pub ticket_plan: Option<TicketPlan>,
    pub selected_car_id: Option<String>,
    pub selected_car: Option<CarSummary>,
    pub estimated_cost: Option<i64>,
    pub booking_id: Option<String>,
    pub payment_status: Option<PaymentStatus>,
    pub payment_reference: Option<String>,
    pub route: Option<RouteInfo>,
    pub is_qr_scan_station: Option<bool>,
    pub qr_virtual_station_id: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct Decoded {
    pub draft: RehydratedDraft,
    /// Names of fields that were present but failed validation.
    pub dropped: Vec<&'static str>,
}

pub fn decode(remote: &Value) -> Decoded {
    let mut decoded = Decoded::default();
    let d = &mut decoded.draft;
    let dropped = &mut decoded.dropped;

    d.departure_station_id = field(remote, "departureStationId", station_id, dropped);
    d.arrival_station_id = field(remote, "arrivalStationId", station_id, dropped);
    d.departure_date = field(remote, "departureDateString", timestamp, dropped);
    d.departure_time = field(remote, "departureTimeString", timestamp, dropped);
    d.is_date_time_confirmed = field(remote, "isDateTimeConfirmed", Value::as_bool, dropped);
    d.ticket_plan = field(remote, "ticketPlan", typed, dropped);
    d.selected_car_id = field(remote, "selectedCarId", non_empty_string, dropped);
    d.selected_car = field(remote, "selectedCar", typed, dropped);
    d.estimated_cost = field(remote, "estimatedCost", whole_number, dropped);
    d.booking_id = field(remote, "bookingId", non_empty_string, dropped);
    d.payment_status = field(remote, "paymentStatus", typed, dropped);
    d.payment_reference = field(remote, "paymentReference", non_empty_string, dropped);
    d.route = field(remote, "route", route, dropped);
    d.is_qr_scan_station = field(remote, "isQrScanStation", Value::as_bool, dropped);
    d.qr_virtual_station_id = field(remote, "qrVirtualStationId", non_empty_string, dropped);

    decoded
}

impl RehydratedDraft {
    pub fn apply_to(&self, draft: &mut BookingDraft) {
        draft.departure_station_id = self.departure_station_id;
        draft.arrival_station_id = self.arrival_station_id;
        draft.departure_date = self.departure_date;
        draft.departure_time = self.departure_time;
        draft.is_date_time_confirmed = self.is_date_time_confirmed.unwrap_or(false);
        draft.ticket_plan = self.ticket_plan;
        draft.selected_car = self.selected_car.clone();
        draft.selected_car_id = self
            .selected_car_id
            .clone()
            .or_else(|| self.selected_car.as_ref().map(|c| c.id.clone()));
        draft.estimated_cost = self.estimated_cost;
        draft.booking_id = self.booking_id.clone();
        draft.payment_status = self.payment_status;
        draft.payment_reference = self.payment_reference.clone().map(Masked::new);
        if let Some(route) = &self.route {
            draft.route = Some(route.clone());
            draft.route_status = ridebook_core::RouteStatus::Succeeded;
        }
        draft.is_qr_scan_station = self.is_qr_scan_station.unwrap_or(false);
        draft.qr_virtual_station_id = self.qr_virtual_station_id.clone();
    }
}

/// Decode one field. Absent and `null` are both "no value"; anything else that
/// fails to parse is recorded as dropped.
fn field<T>(
    remote: &Value,
    name: &'static str,
    parse: impl Fn(&Value) -> Option<T>,
    dropped: &mut Vec<&'static str>,
) -> Option<T> {
    let value = remote.get(name).filter(|v| !v.is_null())?;
    let parsed = parse(value);
    if parsed.is_none() {
        tracing::warn!("Dropping invalid remote field {}: {}", name, value);
        dropped.push(name);
    }
    parsed
}

fn station_id(value: &Value) -> Option<StationId> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => DateTime::parse_from_rfc3339(s.trim())
            .ok()
            .map(|ts| ts.with_timezone(&Utc)),
        Value::Number(n) => n.as_i64().and_then(|ms| Utc.timestamp_millis_opt(ms).single()),
        _ => None,
    }
}

fn non_empty_string(value: &Value) -> Option<String> {
    value.as_str().filter(|s| !s.is_empty()).map(str::to_string)
}

fn whole_number(value: &Value) -> Option<i64> {
    value
        .as_i64()
        .or_else(|| value.as_f64().filter(|f| f.is_finite()).map(|f| f.round() as i64))
}

fn route(value: &Value) -> Option<RouteInfo> {
    let route: RouteInfo = typed(value)?;
    let valid = route.distance.is_finite()
        && route.distance >= 0.0
        && route.duration.is_finite()
        && route.duration >= 0.0;
    valid.then_some(route)
}

fn typed<T: serde::de::DeserializeOwned>(value: &Value) -> Option<T> {
    serde_json::from_value(value.clone()).ok()
}
