use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{NaiveDate, Utc};

use crate::analytics::NewEvent;
use crate::bookings::availability::{self, Slot};
use crate::bookings::models::{Booking, BookingFilter, BookingStatus, Ground, NewBooking};
use crate::bookings::store::{
    BookingStore, Customer, GroundRevenue, MonthlyRevenue, Revenue, StartTimeCount, Transition,
};
use crate::errors::ServiceError;
use crate::users::User;

#[derive(Default)]
struct Tables {
    bookings: Vec<Booking>,
    events: Vec<NewEvent>,
    users: Vec<User>,
}

/// Keeps bookings in memory.
///
/// `admit` is not atomic on its own, callers have to hold the lock of the ground and date.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore::default()
    }

    pub fn events(&self) -> Vec<NewEvent> {
        self.tables().events.clone()
    }

    pub fn add_user(&self, user: User) {
        self.tables().users.push(user);
    }

    fn tables(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn insert(&self, booking: &NewBooking) -> Result<Booking, ServiceError> {
        let mut tables = self.tables();

        let booking = Booking {
            id: tables.bookings.len() as i64 + 1,
            user_id: booking.user_id,
            ground_number: booking.ground_number,
            booking_date: booking.booking_date,
            start_time: booking.start_time,
            end_time: booking.end_time,
            duration: booking.duration,
            player_count: booking.player_count,
            total_amount: booking.total_amount,
            payment_method: booking.payment_method.clone(),
            payment_status: booking.payment_status.clone(),
            payment_screenshot: booking.payment_screenshot.clone(),
            booking_status: booking.booking_status.clone(),
            notes: booking.notes.clone(),
            created_at: Utc::now(),
        };

        let event = NewEvent::booking_created(&booking)?;
        tables.events.push(event);
        tables.bookings.push(booking.clone());

        Ok(booking)
    }

    fn active(&self) -> Vec<Booking> {
        self.tables()
            .bookings
            .iter()
            .filter(|b| is_active(b))
            .cloned()
            .collect()
    }

    fn summary(&self, user: &User) -> Customer {
        let (total_bookings, total_spent) = self
            .active()
            .iter()
            .filter(|b| b.user_id == Some(user.id))
            .fold((0, 0), |(count, spent), b| {
                (count + 1, spent + i64::from(b.total_amount))
            });

        Customer {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
            phone: user.phone.clone(),
            created_at: user.created_at,
            total_bookings,
            total_spent,
        }
    }
}

fn is_active(booking: &Booking) -> bool {
    booking.booking_status != BookingStatus::Cancelled.to_string()
}

impl BookingStore for MemoryStore {
    fn find(&self, id: i64) -> Result<Booking, ServiceError> {
        self.tables()
            .bookings
            .iter()
            .find(|booking| booking.id == id)
            .cloned()
            .ok_or_else(|| ServiceError::NotFound("Booking not found".to_string()))
    }

    fn find_all(&self, filter: &BookingFilter) -> Result<Vec<Booking>, ServiceError> {
        let mut bookings: Vec<Booking> = self
            .tables()
            .bookings
            .iter()
            .filter(|b| filter.status.map_or(true, |s| b.booking_status == s.to_string()))
            .filter(|b| filter.date.map_or(true, |date| b.booking_date == date))
            .filter(|b| filter.ground.map_or(true, |ground| b.ground_number == ground))
            .filter(|b| filter.owner.map_or(true, |owner| b.user_id == Some(owner)))
            .filter(|b| !filter.active_only || is_active(b))
            .cloned()
            .collect();

        bookings.sort_by(|a, b| {
            (b.booking_date, b.start_time).cmp(&(a.booking_date, a.start_time))
        });

        if let Some(limit) = filter.limit {
            bookings.truncate(limit as usize);
        }

        Ok(bookings)
    }

    fn active_slots(&self, ground: Ground, date: NaiveDate) -> Result<Vec<Slot>, ServiceError> {
        Ok(self
            .tables()
            .bookings
            .iter()
            .filter(|b| b.ground_number == ground.number() && b.booking_date == date)
            .filter(|b| is_active(b))
            .map(Booking::slot)
            .collect())
    }

    fn admit(&self, booking: &NewBooking) -> Result<Booking, ServiceError> {
        let slots = self.active_slots(booking.ground()?, booking.booking_date)?;
        availability::ensure_free(&slots, &booking.slot())?;
        self.insert(booking)
    }

    fn transition(&self, change: &Transition) -> Result<Option<Booking>, ServiceError> {
        let mut tables = self.tables();

        let booking = tables.bookings.iter_mut().find(|b| {
            b.id == change.id
                && b.booking_status == change.from.to_string()
                && change.owner.map_or(true, |owner| b.user_id == Some(owner))
        });

        Ok(booking.map(|booking| {
            booking.booking_status = change.to.to_string();
            if let Some(payment_status) = change.payment_status {
                booking.payment_status = payment_status.to_string();
            }
            booking.clone()
        }))
    }

    fn revenue(&self, from: NaiveDate, to: Option<NaiveDate>) -> Result<Revenue, ServiceError> {
        Ok(self
            .tables()
            .bookings
            .iter()
            .filter(|b| is_active(b) && b.booking_date >= from)
            .filter(|b| to.map_or(true, |to| b.booking_date <= to))
            .fold(Revenue::default(), |total, b| Revenue {
                bookings: total.bookings + 1,
                revenue: total.revenue + i64::from(b.total_amount),
            }))
    }

    fn count_pending(&self) -> Result<i64, ServiceError> {
        Ok(self
            .tables()
            .bookings
            .iter()
            .filter(|b| b.booking_status == BookingStatus::Pending.to_string())
            .count() as i64)
    }

    fn monthly_revenue(&self, months: i64) -> Result<Vec<MonthlyRevenue>, ServiceError> {
        let mut totals: BTreeMap<String, Revenue> = BTreeMap::new();

        for booking in self.active() {
            let total = totals
                .entry(booking.booking_date.format("%Y-%m").to_string())
                .or_default();
            total.bookings += 1;
            total.revenue += i64::from(booking.total_amount);
        }

        Ok(totals
            .into_iter()
            .rev()
            .take(months as usize)
            .map(|(month, total)| MonthlyRevenue {
                month,
                bookings: total.bookings,
                revenue: total.revenue,
            })
            .collect())
    }

    fn popular_start_times(&self, limit: i64) -> Result<Vec<StartTimeCount>, ServiceError> {
        let mut counts: BTreeMap<String, i64> = BTreeMap::new();

        for booking in self.active() {
            *counts
                .entry(booking.start_time.format("%H:%M").to_string())
                .or_default() += 1;
        }

        let mut popular: Vec<StartTimeCount> = counts
            .into_iter()
            .map(|(start_time, bookings)| StartTimeCount {
                start_time,
                bookings,
            })
            .collect();

        // stable, so equal counts stay ordered by start time
        popular.sort_by(|a, b| b.bookings.cmp(&a.bookings));
        popular.truncate(limit as usize);

        Ok(popular)
    }

    fn ground_revenue(&self) -> Result<Vec<GroundRevenue>, ServiceError> {
        let mut totals: BTreeMap<i16, Revenue> = BTreeMap::new();

        for booking in self.active() {
            let total = totals.entry(booking.ground_number).or_default();
            total.bookings += 1;
            total.revenue += i64::from(booking.total_amount);
        }

        Ok(totals
            .into_iter()
            .map(|(ground_number, total)| GroundRevenue {
                ground_number,
                bookings: total.bookings,
                revenue: total.revenue,
            })
            .collect())
    }

    fn customers(&self) -> Result<Vec<Customer>, ServiceError> {
        let mut users: Vec<User> = self
            .tables()
            .users
            .iter()
            .filter(|user| !user.is_admin)
            .cloned()
            .collect();

        users.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        Ok(users.iter().map(|user| self.summary(user)).collect())
    }

    fn customer(&self, id: i64) -> Result<Option<Customer>, ServiceError> {
        let user = self
            .tables()
            .users
            .iter()
            .find(|user| user.id == id && !user.is_admin)
            .cloned();

        Ok(user.map(|user| self.summary(&user)))
    }
}
