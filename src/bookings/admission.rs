use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{Datelike, Duration, NaiveDate};

use crate::bookings::availability::{self, Availability};
use crate::bookings::models::{
    Booking, BookingFilter, BookingRequest, BookingStatus, Ground, ManualBookingRequest,
    NewBooking, PaymentMethod, PaymentStatus, Reservation, StatusUpdate,
};
use crate::bookings::pricing;
use crate::bookings::store::{
    BookingStore, Customer, GroundRevenue, MonthlyRevenue, Revenue, StartTimeCount, Transition,
};
use crate::errors::ServiceError;

/// One lock per ground and day, held while a booking is checked and stored
#[derive(Default)]
pub struct SlotLocks {
    locks: Mutex<HashMap<(Ground, NaiveDate), Arc<Mutex<()>>>>,
}

impl SlotLocks {
    pub fn new() -> Self {
        SlotLocks::default()
    }

    fn get(&self, ground: Ground, date: NaiveDate) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);

        // forget locks that nobody is holding anymore
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);

        locks
            .entry((ground, date))
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Runs `f` while holding the lock of the ground and day
    pub fn with<T, F>(&self, ground: Ground, date: NaiveDate, f: F) -> T
    where
        F: FnOnce() -> T,
    {
        let lock = self.get(ground, date);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        f()
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// months shown in the revenue charts
const CHART_MONTHS: i64 = 12;
const POPULAR_START_TIMES: i64 = 10;
/// bookings shown with the details of a customer
const RECENT_BOOKINGS: i64 = 10;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    pub today: Revenue,
    pub last_week: Revenue,
    pub this_month: Revenue,
    pub pending_bookings: i64,
    pub monthly_revenue: Vec<MonthlyRevenue>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Analytics {
    pub popular_slots: Vec<StartTimeCount>,
    pub ground_stats: Vec<GroundRevenue>,
    pub monthly_revenue: Vec<MonthlyRevenue>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CustomerDetails {
    pub customer: Customer,
    /// the latest bookings, cancelled ones included
    pub bookings: Vec<Booking>,
}

/// Decides which bookings are accepted and how they move through their lifecycle.
///
/// Every change to a booking goes through here.
pub struct Admission {
    store: Arc<dyn BookingStore>,
    locks: SlotLocks,
    horizon_days: i64,
}

impl Admission {
    pub fn new(store: Arc<dyn BookingStore>, horizon_days: i64) -> Self {
        Admission {
            store,
            locks: SlotLocks::new(),
            horizon_days,
        }
    }

    /// customers can book from today until `horizon_days` ahead, both days included
    pub fn check_horizon(&self, date: NaiveDate, today: NaiveDate) -> Result<(), ServiceError> {
        if date < today {
            return Err(ServiceError::Horizon(
                "Cannot book for past dates".to_string(),
            ));
        }

        if date > today + Duration::days(self.horizon_days) {
            return Err(ServiceError::Horizon(format!(
                "Booking only available up to {} days in advance",
                self.horizon_days
            )));
        }

        Ok(())
    }

    #[tracing::instrument(name = "Admission::check", skip(self))]
    pub fn check(
        &self,
        reservation: &Reservation,
        today: NaiveDate,
    ) -> Result<Availability, ServiceError> {
        self.check_horizon(reservation.date, today)?;

        let existing = self
            .store
            .active_slots(reservation.ground, reservation.date)?;

        Ok(availability::check(&existing, &reservation.slot()))
    }

    /// Admits a customer booking, it starts out pending until an administrator approves it.
    ///
    /// `proof` is the stored file name of the payment screenshot.
    #[tracing::instrument(name = "Admission::create", skip(self))]
    pub fn create(
        &self,
        owner: i64,
        request: &BookingRequest,
        proof: Option<String>,
        today: NaiveDate,
    ) -> Result<Booking, ServiceError> {
        let details = request.parse()?;
        let reservation = details.reservation;

        self.check_horizon(reservation.date, today)?;

        let total_amount = pricing::quote(reservation.ground, reservation.start, details.duration)?;
        if (details.total_amount - f64::from(total_amount)).abs() >= 0.5 {
            warn!(
                "user {} sent an amount of {} for a booking that costs {}",
                owner, details.total_amount, total_amount
            );
        }

        let booking = NewBooking {
            user_id: Some(owner),
            ground_number: reservation.ground.number(),
            booking_date: reservation.date,
            start_time: reservation.start,
            end_time: reservation.end,
            duration: details.duration,
            player_count: details.player_count,
            total_amount,
            payment_method: details.payment_method.to_string(),
            payment_status: PaymentStatus::Pending.to_string(),
            payment_screenshot: proof,
            booking_status: BookingStatus::Pending.to_string(),
            notes: details.notes,
        };

        self.admit(&booking)
    }

    /// Walk-in and phone bookings, confirmed and paid right away.
    /// There is no booking window for the staff.
    #[tracing::instrument(name = "Admission::create_manual", skip(self))]
    pub fn create_manual(&self, request: &ManualBookingRequest) -> Result<Booking, ServiceError> {
        let details = request.parse()?;
        let reservation = details.reservation;

        let booking = NewBooking {
            user_id: None,
            ground_number: reservation.ground.number(),
            booking_date: reservation.date,
            start_time: reservation.start,
            end_time: reservation.end,
            duration: reservation.slot().duration() as i16,
            player_count: details.player_count,
            total_amount: details.total_amount,
            payment_method: PaymentMethod::Venue.to_string(),
            payment_status: PaymentStatus::Paid.to_string(),
            payment_screenshot: None,
            booking_status: BookingStatus::Confirmed.to_string(),
            notes: Some(details.notes),
        };

        self.admit(&booking)
    }

    fn admit(&self, booking: &NewBooking) -> Result<Booking, ServiceError> {
        let ground = booking.ground()?;

        let booking = self
            .locks
            .with(ground, booking.booking_date, || self.store.admit(booking))?;

        info!(
            "booking {} admitted on ground {} at {} {}",
            booking.id,
            ground,
            booking.booking_date,
            booking.slot()
        );

        Ok(booking)
    }

    /// Approve or reject a pending booking
    #[tracing::instrument(name = "Admission::set_status", skip(self))]
    pub fn set_status(&self, id: i64, update: StatusUpdate) -> Result<Booking, ServiceError> {
        let current = self.find(id)?.status()?;

        if !current.can_become(update.status) {
            return Err(ServiceError::InvalidTransition {
                from: current,
                to: update.status,
            });
        }

        let change = Transition {
            id,
            owner: None,
            from: current,
            to: update.status,
            payment_status: update.payment_status,
        };

        match self.store.transition(&change)? {
            Some(booking) => Ok(booking),
            // somebody else changed the booking in the meantime
            None => Err(ServiceError::InvalidTransition {
                from: self.find(id)?.status()?,
                to: update.status,
            }),
        }
    }

    /// Customers can only cancel their own bookings, and only while they're pending
    #[tracing::instrument(name = "Admission::cancel", skip(self))]
    pub fn cancel(&self, id: i64, requester: i64) -> Result<Booking, ServiceError> {
        let change = Transition {
            id,
            owner: Some(requester),
            from: BookingStatus::Pending,
            to: BookingStatus::Cancelled,
            payment_status: None,
        };

        match self.store.transition(&change)? {
            Some(booking) => Ok(booking),
            None => Err(ServiceError::NotFound(
                "Booking not found or cannot be cancelled".to_string(),
            )),
        }
    }

    pub fn find(&self, id: i64) -> Result<Booking, ServiceError> {
        self.store.find(id)
    }

    pub fn find_all(&self, filter: &BookingFilter) -> Result<Vec<Booking>, ServiceError> {
        self.store.find_all(filter)
    }

    pub fn my_bookings(&self, owner: i64) -> Result<Vec<Booking>, ServiceError> {
        let filter = BookingFilter {
            owner: Some(owner),
            active_only: true,
            ..Default::default()
        };

        self.store.find_all(&filter)
    }

    pub fn dashboard(&self, today: NaiveDate) -> Result<Dashboard, ServiceError> {
        let first_of_month = today.with_day(1).unwrap_or(today);

        Ok(Dashboard {
            today: self.store.revenue(today, Some(today))?,
            last_week: self.store.revenue(today - Duration::days(7), None)?,
            this_month: self.store.revenue(first_of_month, None)?,
            pending_bookings: self.store.count_pending()?,
            monthly_revenue: self.store.monthly_revenue(CHART_MONTHS)?,
        })
    }

    pub fn analytics(&self) -> Result<Analytics, ServiceError> {
        Ok(Analytics {
            popular_slots: self.store.popular_start_times(POPULAR_START_TIMES)?,
            ground_stats: self.store.ground_revenue()?,
            monthly_revenue: self.store.monthly_revenue(CHART_MONTHS)?,
        })
    }

    pub fn customers(&self) -> Result<Vec<Customer>, ServiceError> {
        self.store.customers()
    }

    pub fn customer(&self, id: i64) -> Result<CustomerDetails, ServiceError> {
        let customer = match self.store.customer(id)? {
            Some(customer) => customer,
            None => return Err(ServiceError::NotFound("Customer not found".to_string())),
        };

        let filter = BookingFilter {
            owner: Some(id),
            limit: Some(RECENT_BOOKINGS),
            ..Default::default()
        };

        Ok(CustomerDetails {
            customer,
            bookings: self.store.find_all(&filter)?,
        })
    }
}
