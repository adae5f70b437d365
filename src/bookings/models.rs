use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveTime, Timelike, Utc};
use regex::Regex;
use serde::{Deserialize as _, Deserializer, Serialize as _, Serializer};

use crate::bookings::availability::Slot;
use crate::errors::ServiceError;
use crate::schema::bookings;

/// customers may bring at most this many players, whatever the ground
const MAX_PLAYERS: i64 = 22;
/// upper bound for a single booking amount
const MAX_AMOUNT: f64 = 1_000_000.0;
/// durations a customer can pick from
pub const DURATIONS: [i16; 2] = [60, 90];

lazy_static! {
    static ref TIME_PATTERN: Regex = Regex::new(r"^([0-1]?[0-9]|2[0-3]):([0-5][0-9])$").unwrap();
}

/// A bookable pitch, every ground has its own schedule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Ground {
    One,
    Two,
}

impl Ground {
    pub const ALL: [Ground; 2] = [Ground::One, Ground::Two];

    pub fn from_number(number: i64) -> Result<Ground, ServiceError> {
        match number {
            1 => Ok(Ground::One),
            2 => Ok(Ground::Two),
            _ => bad_request!("groundNumber should be 1 or 2"),
        }
    }

    pub fn number(self) -> i16 {
        match self {
            Ground::One => 1,
            Ground::Two => 2,
        }
    }

    /// maximum amount of players allowed on the ground
    pub fn capacity(self) -> i16 {
        match self {
            Ground::One => 14,
            Ground::Two => 12,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Ground::One => "Football Ground",
            Ground::Two => "Cricket Ground",
        }
    }

    pub fn facilities(self) -> &'static [&'static str] {
        match self {
            Ground::One => &["Floodlights", "Changing Rooms", "Water Facility"],
            Ground::Two => &[
                "Floodlights",
                "Changing Rooms",
                "Boundary Ropes",
                "Scoreboard",
            ],
        }
    }
}

impl fmt::Display for Ground {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.number())
    }
}

impl serde::Serialize for Ground {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i16(self.number())
    }
}

/// Lifecycle of a booking, only pending bookings can still change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Cancelled,
}

impl BookingStatus {
    /// pending -> confirmed and pending -> cancelled are the only allowed moves
    pub fn can_become(self, next: BookingStatus) -> bool {
        matches!(
            (self, next),
            (BookingStatus::Pending, BookingStatus::Confirmed)
                | (BookingStatus::Pending, BookingStatus::Cancelled)
        )
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Cancelled => "cancelled",
        };
        write!(f, "{}", status)
    }
}

impl FromStr for BookingStatus {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(BookingStatus::Pending),
            "confirmed" => Ok(BookingStatus::Confirmed),
            "cancelled" => Ok(BookingStatus::Cancelled),
            _ => bad_request!("unknown booking status '{}'", s),
        }
    }
}

/// Payment state, tracked independently of the booking approval
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Failed,
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Failed => "failed",
        };
        write!(f, "{}", status)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Bkash,
    Nagad,
    Bank,
    Venue,
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let method = match self {
            PaymentMethod::Bkash => "bkash",
            PaymentMethod::Nagad => "nagad",
            PaymentMethod::Bank => "bank",
            PaymentMethod::Venue => "venue",
        };
        write!(f, "{}", method)
    }
}

impl FromStr for PaymentMethod {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bkash" => Ok(PaymentMethod::Bkash),
            "nagad" => Ok(PaymentMethod::Nagad),
            "bank" => Ok(PaymentMethod::Bank),
            "venue" => Ok(PaymentMethod::Venue),
            _ => bad_request!("paymentMethod should be one of bkash, nagad, bank or venue"),
        }
    }
}

/// A persisted reservation of a ground.
///
/// Bookings are never deleted, cancelling only changes the `booking_status`.
#[derive(Debug, Clone, Serialize, Queryable, PartialEq)]
pub struct Booking {
    pub id: i64,
    /// empty for bookings entered by an administrator
    pub user_id: Option<i64>,
    pub ground_number: i16,
    pub booking_date: NaiveDate,
    #[serde(serialize_with = "hh_mm")]
    pub start_time: NaiveTime,
    #[serde(serialize_with = "hh_mm")]
    pub end_time: NaiveTime,
    /// minutes
    pub duration: i16,
    pub player_count: i16,
    pub total_amount: i32,
    pub payment_method: String,
    pub payment_status: String,
    pub payment_screenshot: Option<String>,
    pub booking_status: String,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Booking {
    pub fn status(&self) -> Result<BookingStatus, ServiceError> {
        self.booking_status.parse().map_err(|_| {
            error!(
                "booking {} has an unknown status: {}",
                self.id, self.booking_status
            );
            ServiceError::InternalServerError
        })
    }

    pub fn slot(&self) -> Slot {
        Slot::from_times(self.start_time, self.end_time)
    }
}

#[derive(Debug, Clone, Insertable, PartialEq)]
#[table_name = "bookings"]
pub struct NewBooking {
    pub user_id: Option<i64>,
    pub ground_number: i16,
    pub booking_date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub duration: i16,
    pub player_count: i16,
    pub total_amount: i32,
    pub payment_method: String,
    pub payment_status: String,
    pub payment_screenshot: Option<String>,
    pub booking_status: String,
    pub notes: Option<String>,
}

impl NewBooking {
    pub fn ground(&self) -> Result<Ground, ServiceError> {
        Ground::from_number(self.ground_number.into())
    }

    pub fn slot(&self) -> Slot {
        Slot::from_times(self.start_time, self.end_time)
    }
}

/// Used by administrators and customers to list bookings
#[derive(Debug, Default, Deserialize)]
pub struct BookingFilter {
    pub status: Option<BookingStatus>,
    pub date: Option<NaiveDate>,
    pub ground: Option<i16>,
    /// only show bookings of this user
    #[serde(skip)]
    pub owner: Option<i64>,
    /// hide cancelled bookings
    #[serde(skip)]
    pub active_only: bool,
    #[serde(skip)]
    pub limit: Option<i64>,
}

/// **POST /api/bookings/check-availability**
///
/// ``` shell
/// curl --location --request POST 'localhost:8080/api/bookings/check-availability' \
///     --header 'Content-Type: application/json' \
///     --data-raw '{
///         "groundNumber": 1,
///         "bookingDate": "2020-11-21",
///         "startTime": "09:00",
///         "endTime": "10:00"
///     }'
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityRequest {
    #[serde(deserialize_with = "lenient_i64")]
    pub ground_number: i64,
    pub booking_date: String,
    pub start_time: String,
    pub end_time: String,
}

/// The ground, date and time range a booking would occupy
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reservation {
    pub ground: Ground,
    pub date: NaiveDate,
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl Reservation {
    pub fn slot(&self) -> Slot {
        Slot::from_times(self.start, self.end)
    }

    fn parse(
        ground_number: i64,
        booking_date: &str,
        start_time: &str,
        end_time: &str,
    ) -> Result<Reservation, ServiceError> {
        let ground = Ground::from_number(ground_number)?;
        let date = parse_date(booking_date)?;
        let start = parse_time("startTime", start_time)?;
        let end = parse_time("endTime", end_time)?;

        if end <= start {
            bad_request!("endTime should be after startTime, bookings can't cross midnight");
        }

        Ok(Reservation {
            ground,
            date,
            start,
            end,
        })
    }
}

impl AvailabilityRequest {
    pub fn parse(&self) -> Result<Reservation, ServiceError> {
        Reservation::parse(
            self.ground_number,
            &self.booking_date,
            &self.start_time,
            &self.end_time,
        )
    }
}

/// **POST /api/bookings/create**
///
/// Sent as `multipart/form-data`, optionally with a `paymentScreenshot` image.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingRequest {
    pub ground_number: i64,
    pub booking_date: String,
    pub start_time: String,
    pub end_time: String,
    pub duration: i64,
    pub player_count: i64,
    pub payment_method: String,
    pub total_amount: f64,
    pub notes: Option<String>,
}

/// A structurally valid customer booking
#[derive(Debug, Clone, PartialEq)]
pub struct BookingDetails {
    pub reservation: Reservation,
    pub duration: i16,
    pub player_count: i16,
    pub payment_method: PaymentMethod,
    pub total_amount: f64,
    pub notes: Option<String>,
}

impl BookingRequest {
    /// build a request out of the text fields of a multipart form
    pub fn from_form(fields: &HashMap<String, String>) -> Result<Self, ServiceError> {
        Ok(BookingRequest {
            ground_number: form_number(fields, "groundNumber")?,
            booking_date: form_text(fields, "bookingDate")?,
            start_time: form_text(fields, "startTime")?,
            end_time: form_text(fields, "endTime")?,
            duration: form_number(fields, "duration")?,
            player_count: form_number(fields, "playerCount")?,
            payment_method: form_text(fields, "paymentMethod")?,
            total_amount: form_number(fields, "totalAmount")?,
            notes: fields
                .get("notes")
                .map(|notes| notes.trim().to_string())
                .filter(|notes| !notes.is_empty()),
        })
    }

    pub fn parse(&self) -> Result<BookingDetails, ServiceError> {
        let reservation = Reservation::parse(
            self.ground_number,
            &self.booking_date,
            &self.start_time,
            &self.end_time,
        )?;

        let player_count = parse_player_count(self.player_count, reservation.ground)?;
        let payment_method: PaymentMethod = self.payment_method.parse()?;
        let total_amount = parse_amount(self.total_amount)?;

        let duration = match DURATIONS.iter().find(|d| i64::from(**d) == self.duration) {
            Some(duration) => *duration,
            None => bad_request!("duration should be 60 or 90 minutes"),
        };

        if reservation.slot().duration() != i32::from(duration) {
            bad_request!(
                "endTime should be exactly {} minutes after startTime",
                duration
            );
        }

        Ok(BookingDetails {
            reservation,
            duration,
            player_count,
            payment_method,
            total_amount,
            notes: self.notes.clone(),
        })
    }
}

impl crate::validator::Validate<BookingRequest> for BookingRequest {
    fn validate(&self) -> Result<(), ServiceError> {
        self.parse().map(|_| ())
    }
}

/// **POST /api/admin/bookings/manual**
///
/// Walk-in and phone bookings entered by the staff.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManualBookingRequest {
    pub customer_name: String,
    pub customer_phone: String,
    #[serde(deserialize_with = "lenient_i64")]
    pub ground_number: i64,
    pub booking_date: String,
    pub start_time: String,
    pub end_time: String,
    #[serde(deserialize_with = "lenient_i64")]
    pub player_count: i64,
    #[serde(deserialize_with = "lenient_f64")]
    pub total_amount: f64,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ManualBookingDetails {
    pub reservation: Reservation,
    pub player_count: i16,
    pub total_amount: i32,
    pub notes: String,
}

impl ManualBookingRequest {
    pub fn parse(&self) -> Result<ManualBookingDetails, ServiceError> {
        let customer_name = self.customer_name.trim();
        let customer_phone = self.customer_phone.trim();

        if customer_name.is_empty() {
            bad_request!("customerName is required");
        }

        if customer_phone.is_empty() {
            bad_request!("customerPhone is required");
        }

        let reservation = Reservation::parse(
            self.ground_number,
            &self.booking_date,
            &self.start_time,
            &self.end_time,
        )?;
        let player_count = parse_player_count(self.player_count, reservation.ground)?;
        let total_amount = parse_amount(self.total_amount)?;

        let notes = format!(
            "Manual booking by admin for: {} ({}). {}",
            customer_name,
            customer_phone,
            self.notes.as_deref().unwrap_or("").trim()
        );

        Ok(ManualBookingDetails {
            reservation,
            player_count,
            total_amount: total_amount.round() as i32,
            notes: notes.trim_end().to_string(),
        })
    }
}

/// **PUT /api/admin/bookings/{id}/status**
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusUpdate {
    pub status: BookingStatus,
    pub payment_status: Option<PaymentStatus>,
}

/// parses `HH:MM` in 24-hour notation, a single digit hour is allowed
pub fn parse_time(field: &str, value: &str) -> Result<NaiveTime, ServiceError> {
    let captures = match TIME_PATTERN.captures(value.trim()) {
        Some(captures) => captures,
        None => bad_request!("{} should be formatted as HH:MM", field),
    };

    let hours: u32 = captures[1].parse().unwrap_or_default();
    let minutes: u32 = captures[2].parse().unwrap_or_default();

    match NaiveTime::from_hms_opt(hours, minutes, 0) {
        Some(time) => Ok(time),
        None => bad_request!("{} is not a valid time", field),
    }
}

pub fn parse_date(value: &str) -> Result<NaiveDate, ServiceError> {
    let value = value.trim();
    // clients sometimes send a full ISO 8601 timestamp
    let day = value.split('T').next().unwrap_or(value);

    NaiveDate::parse_from_str(day, "%Y-%m-%d")
        .map_err(|_| ServiceError::Validation("bookingDate should be a valid date".to_string()))
}

/// minutes since midnight
pub fn minutes(time: NaiveTime) -> i32 {
    (time.hour() * 60 + time.minute()) as i32
}

fn parse_player_count(count: i64, ground: Ground) -> Result<i16, ServiceError> {
    if count < 1 || count > MAX_PLAYERS {
        bad_request!("playerCount should be between 1 and {}", MAX_PLAYERS);
    }

    if count > i64::from(ground.capacity()) {
        bad_request!(
            "ground {} allows at most {} players",
            ground,
            ground.capacity()
        );
    }

    Ok(count as i16)
}

fn parse_amount(amount: f64) -> Result<f64, ServiceError> {
    if !amount.is_finite() || amount < 0.0 {
        bad_request!("totalAmount can't be negative");
    }

    if amount > MAX_AMOUNT {
        bad_request!("totalAmount is too large");
    }

    Ok(amount)
}

fn form_text(fields: &HashMap<String, String>, name: &str) -> Result<String, ServiceError> {
    match fields.get(name) {
        Some(value) => Ok(value.trim().to_string()),
        None => bad_request!("{} is required", name),
    }
}

fn form_number<T: FromStr>(fields: &HashMap<String, String>, name: &str) -> Result<T, ServiceError> {
    match form_text(fields, name)?.parse::<T>() {
        Ok(number) => Ok(number),
        Err(_) => bad_request!("{} should be a number", name),
    }
}

fn hh_mm<S: Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
    time.format("%H:%M").to_string().serialize(serializer)
}

/// html forms send numbers as strings, accept both
#[derive(Deserialize)]
#[serde(untagged)]
enum Lenient {
    Number(serde_json::Number),
    Text(String),
}

fn lenient_f64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    match Lenient::deserialize(deserializer)? {
        Lenient::Number(number) => number
            .as_f64()
            .ok_or_else(|| serde::de::Error::custom("expected a number")),
        Lenient::Text(text) => text
            .trim()
            .parse()
            .map_err(|_| serde::de::Error::custom("expected a number")),
    }
}

fn lenient_i64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    match Lenient::deserialize(deserializer)? {
        Lenient::Number(number) => number
            .as_i64()
            .ok_or_else(|| serde::de::Error::custom("expected a whole number")),
        Lenient::Text(text) => text
            .trim()
            .parse()
            .map_err(|_| serde::de::Error::custom("expected a whole number")),
    }
}
