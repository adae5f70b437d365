use serde_json::json;

use crate::bookings::Booking;
use crate::errors::ServiceError;
use crate::schema::analytics;

/// An audit record, written in the same transaction as the change it describes
#[derive(Debug, Clone, Insertable, PartialEq)]
#[table_name = "analytics"]
pub struct NewEvent {
    pub event_type: String,
    pub event_data: Option<String>,
}

impl NewEvent {
    pub fn booking_created(booking: &Booking) -> Result<NewEvent, ServiceError> {
        let event_type = match booking.user_id {
            Some(_) => "booking_created",
            None => "manual_booking_created",
        };

        let data = json!({
            "bookingId": booking.id,
            "userId": booking.user_id,
            "ground": booking.ground_number,
            "amount": booking.total_amount,
        });

        Ok(NewEvent {
            event_type: event_type.to_string(),
            event_data: Some(serde_json::to_string(&data)?),
        })
    }
}
