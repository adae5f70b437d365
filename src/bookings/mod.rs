pub mod admission;
pub mod availability;
#[cfg(test)]
pub mod memory;
pub mod models;
pub mod pricing;
pub mod routes;
pub mod store;

pub use admission::{Admission, Dashboard};
pub use models::{
    Booking, BookingFilter, BookingRequest, BookingStatus, ManualBookingRequest, StatusUpdate,
};
pub use store::{BookingStore, PgStore};

/// the current day at the venue
pub fn today() -> chrono::NaiveDate {
    chrono::Local::today().naive_local()
}
