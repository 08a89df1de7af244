use chrono::{DateTime, Utc};
use ridebook_core::pricing::FareEstimator;
use ridebook_core::step::{self, StepDecision, TransitionKind, PAYMENT_STEP};
use ridebook_core::{BookingDraft, CarSummary, PaymentStatus, RouteInfo, RouteStatus, StationId, TicketPlan};
use ridebook_shared::Masked;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::snapshot::RehydratedDraft;

/// Owns the booking draft of one session.
///
/// Every mutation runs inside a single `send_if_modified` closure: it applies
/// completely or not at all, and observers see the new state as soon as the
/// call returns. Rejected transitions are logged and reported as `false`;
/// nothing here returns an error.
pub struct BookingStore {
    state: watch::Sender<BookingDraft>,
    fares: FareEstimator,
}

impl BookingStore {
    pub fn new(fares: FareEstimator) -> Self {
        let (state, _) = watch::channel(BookingDraft::default());
        Self { state, fares }
    }

    /// Current draft. Async callers must call this again after every `.await`.
    pub fn state(&self) -> BookingDraft {
        self.state.borrow().clone()
    }

    pub fn step(&self) -> u8 {
        self.state.borrow().step()
    }

    pub fn subscribe(&self) -> watch::Receiver<BookingDraft> {
        self.state.subscribe()
    }

    pub fn fares(&self) -> FareEstimator {
        self.fares
    }

    /// Pick the departure station. Only open on steps 1 and 2.
    pub fn select_departure(&self, station_id: StationId) -> bool {
        self.apply_departure(station_id, None)
    }

    /// Departure picked by scanning a station code instead of the catalog.
    pub fn select_qr_departure(&self, station_id: StationId, virtual_station_id: String) -> bool {
        self.apply_departure(station_id, Some(virtual_station_id))
    }

    fn apply_departure(&self, station_id: StationId, qr_station: Option<String>) -> bool {
        let mut accepted = false;
        self.state.send_if_modified(|draft| {
            if draft.step() > 2 {
                return false;
            }
            draft.departure_station_id = Some(station_id);
            if draft.step() == 1 {
                draft.set_step(2);
            }
            if !draft.is_date_time_confirmed {
                draft.departure_date = None;
                draft.departure_time = None;
            }
            draft.clear_route();
            draft.is_qr_scan_station = qr_station.is_some();
            draft.qr_virtual_station_id = qr_station;
            accepted = true;
            true
        });

        if !accepted {
            warn!("Departure selection ignored on step {}", self.step());
        }
        accepted
    }

    pub fn clear_departure(&self) {
        self.state.send_modify(|draft| {
            draft.departure_station_id = None;
            draft.is_qr_scan_station = false;
            draft.qr_virtual_station_id = None;
            draft.set_step(1);
            draft.clear_route();
            draft.clear_schedule();
        });
        debug!("Departure cleared, back to step 1");
    }

    /// Pick the arrival station. Only open on steps 3 and 4.
    pub fn select_arrival(&self, station_id: StationId) -> bool {
        let mut accepted = false;
        self.state.send_if_modified(|draft| {
            if !matches!(draft.step(), 3 | 4) {
                return false;
            }
            draft.arrival_station_id = Some(station_id);
            if draft.step() == 3 {
                draft.set_step(4);
            }
            draft.clear_route();
            accepted = true;
            true
        });

        if !accepted {
            warn!("Arrival selection ignored on step {}", self.step());
        }
        accepted
    }

    pub fn clear_arrival(&self) {
        self.state.send_modify(|draft| {
            draft.arrival_station_id = None;
            if draft.step() >= 3 {
                draft.set_step(3);
            }
            draft.clear_route();
            draft.clear_schedule();
        });
        debug!("Arrival cleared");
    }

    /// Move to `target` if the step policy admits it.
    pub fn advance_step(&self, target: u8, kind: TransitionKind) -> bool {
        let mut decision = StepDecision::Reject;
        let mut from = 0;
        self.state.send_if_modified(|draft| {
            from = draft.step();
            decision = step::evaluate(from, target, kind);
            match decision {
                StepDecision::Reject | StepDecision::Unchanged => false,
                _ => {
                    draft.set_step(target);
                    true
                }
            }
        });

        if decision.is_admitted() {
            debug!("Step {} -> {} ({:?})", from, target, decision);
        } else {
            warn!("Rejected step transition {} -> {} ({:?})", from, target, kind);
        }
        decision.is_admitted()
    }

    pub fn set_departure_schedule(&self, date: Option<DateTime<Utc>>, time: Option<DateTime<Utc>>) {
        self.state.send_modify(|draft| {
            draft.departure_date = date;
            draft.departure_time = time;
        });
    }

    pub fn set_date_time_confirmed(&self, confirmed: bool) {
        self.state.send_if_modified(|draft| {
            let changed = draft.is_date_time_confirmed != confirmed;
            draft.is_date_time_confirmed = confirmed;
            changed
        });
    }

    /// Mark the route as being fetched. Fails when an endpoint is missing.
    pub fn begin_route_fetch(&self) -> bool {
        self.state.send_if_modified(|draft| {
            if !draft.has_both_stations() {
                return false;
            }
            draft.route = None;
            draft.route_status = RouteStatus::Loading;
            draft.route_error = None;
            true
        })
    }

    /// Store a route from the mapping provider. Rejected unless both stations
    /// are selected.
    pub fn set_route(&self, route: RouteInfo) -> bool {
        let fares = self.fares;
        let accepted = self.state.send_if_modified(|draft| {
            if !draft.has_both_stations() {
                return false;
            }
            if let Some(car) = &draft.selected_car {
                draft.estimated_cost = fares.estimate(car.price, route.distance);
            }
            draft.route = Some(route);
            draft.route_status = RouteStatus::Succeeded;
            draft.route_error = None;
            true
        });

        if !accepted {
            warn!("Route ignored: both stations must be selected");
        }
        accepted
    }

    /// Record a failed fetch. Prior route data is dropped, never left stale.
    pub fn fail_route(&self, message: impl Into<String>) {
        let message = message.into();
        warn!("Route fetch failed: {}", message);
        self.state.send_modify(|draft| {
            draft.route = None;
            draft.route_status = RouteStatus::Failed;
            draft.route_error = Some(message);
        });
    }

    pub fn clear_route(&self) {
        self.state.send_modify(|draft| draft.clear_route());
    }

    pub fn select_car(&self, car: CarSummary) {
        let fares = self.fares;
        self.state.send_modify(|draft| {
            if let Some(route) = &draft.route {
                draft.estimated_cost = fares.estimate(car.price, route.distance);
            }
            draft.selected_car_id = Some(car.id.clone());
            draft.selected_car = Some(car);
        });
    }

    pub fn set_ticket_plan(&self, plan: Option<TicketPlan>) {
        self.state.send_modify(|draft| draft.ticket_plan = plan);
    }

    pub fn set_booking_id(&self, booking_id: Option<String>) {
        self.state.send_modify(|draft| draft.booking_id = booking_id);
    }

    pub fn set_payment_status(&self, status: Option<PaymentStatus>) {
        self.state.send_modify(|draft| draft.payment_status = status);
    }

    pub fn set_payment_reference(&self, reference: Option<String>) {
        self.state.send_modify(|draft| draft.payment_reference = reference.map(Masked::new));
    }

    pub fn set_estimated_cost(&self, cost: Option<i64>) {
        self.state.send_modify(|draft| draft.estimated_cost = cost);
    }

    /// Back to the initial draft.
    pub fn reset(&self) {
        self.state.send_replace(BookingDraft::default());
        info!("Booking draft reset");
    }

    /// Restore a payment session decoded from the remote store: a fresh draft
    /// with every decoded field applied, then the rehydration jump to payment.
    pub fn rehydrate(&self, fields: &RehydratedDraft) -> bool {
        let mut accepted = false;
        self.state.send_if_modified(|draft| {
            if !step::evaluate(draft.step(), PAYMENT_STEP, TransitionKind::Rehydration).is_admitted() {
                return false;
            }
            let mut next = BookingDraft::default();
            fields.apply_to(&mut next);
            if !next.is_route_consistent() {
                next.clear_route();
            }
            next.set_step(PAYMENT_STEP);
            *draft = next;
            accepted = true;
            true
        });

        if accepted {
            info!("Booking draft rehydrated into the payment step");
        } else {
            warn!("Rehydration rejected on step {}", self.step());
        }
        accepted
    }

    /// Replace the draft with a durable snapshot read back from the local cache.
    pub fn restore_snapshot(&self, snapshot: BookingDraft) -> bool {
        if !snapshot.is_well_formed() || !snapshot.is_durable() {
            warn!("Ignoring non-durable or malformed snapshot (step {})", snapshot.step());
            return false;
        }
        let mut snapshot = snapshot;
        if !snapshot.is_route_consistent() {
            snapshot.clear_route();
        }
        self.state.send_replace(snapshot);
        true
    }
}

impl Default for BookingStore {
    fn default() -> Self {
        Self::new(FareEstimator::default())
    }
}
