use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use diesel::dsl::{count_star, sum};
use diesel::pg::Pg;
use diesel::prelude::*;
use diesel::sql_types::{BigInt, Nullable, SmallInt, Text, Timestamptz};
use diesel::PgConnection;

use crate::analytics::NewEvent;
use crate::bookings::availability::{self, Slot};
use crate::bookings::models::{
    Booking, BookingFilter, BookingStatus, Ground, NewBooking, PaymentStatus,
};
use crate::db;
use crate::errors::ServiceError;
use crate::schema::{analytics, bookings};

/// A conditional status change, it only applies while the booking is still in `from`
#[derive(Debug, Clone)]
pub struct Transition {
    pub id: i64,
    /// restrict the change to bookings of this user
    pub owner: Option<i64>,
    pub from: BookingStatus,
    pub to: BookingStatus,
    pub payment_status: Option<PaymentStatus>,
}

/// Booking count and revenue of non-cancelled bookings
#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize)]
pub struct Revenue {
    pub bookings: i64,
    pub revenue: i64,
}

/// Bookings and revenue of one calendar month, `month` is formatted as `YYYY-MM`
#[derive(Debug, Clone, PartialEq, Serialize, QueryableByName)]
pub struct MonthlyRevenue {
    #[sql_type = "Text"]
    pub month: String,
    #[sql_type = "BigInt"]
    pub bookings: i64,
    #[sql_type = "BigInt"]
    pub revenue: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, QueryableByName)]
pub struct StartTimeCount {
    /// `HH:MM`
    #[sql_type = "Text"]
    pub start_time: String,
    #[sql_type = "BigInt"]
    pub bookings: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, QueryableByName)]
pub struct GroundRevenue {
    #[sql_type = "SmallInt"]
    pub ground_number: i16,
    #[sql_type = "BigInt"]
    pub bookings: i64,
    #[sql_type = "BigInt"]
    pub revenue: i64,
}

/// A registered customer with the totals of their non-cancelled bookings
#[derive(Debug, Clone, PartialEq, Serialize, QueryableByName)]
pub struct Customer {
    #[sql_type = "BigInt"]
    pub id: i64,
    #[sql_type = "Text"]
    pub name: String,
    #[sql_type = "Text"]
    pub email: String,
    #[sql_type = "Nullable<Text>"]
    pub phone: Option<String>,
    #[sql_type = "Timestamptz"]
    pub created_at: DateTime<Utc>,
    #[sql_type = "BigInt"]
    pub total_bookings: i64,
    #[sql_type = "BigInt"]
    pub total_spent: i64,
}

/// Persistence of bookings
pub trait BookingStore: Send + Sync {
    fn find(&self, id: i64) -> Result<Booking, ServiceError>;

    /// ordered by date and start time, newest first
    fn find_all(&self, filter: &BookingFilter) -> Result<Vec<Booking>, ServiceError>;

    /// the time ranges of every non-cancelled booking of a ground on a day
    fn active_slots(&self, ground: Ground, date: NaiveDate) -> Result<Vec<Slot>, ServiceError>;

    /// Stores the booking together with its audit event, as long as its slot is still free
    fn admit(&self, booking: &NewBooking) -> Result<Booking, ServiceError>;

    /// returns `None` when no booking matched the transition
    fn transition(&self, change: &Transition) -> Result<Option<Booking>, ServiceError>;

    /// revenue of bookings from `from` until `to` (inclusive), or without an end
    fn revenue(&self, from: NaiveDate, to: Option<NaiveDate>) -> Result<Revenue, ServiceError>;

    fn count_pending(&self) -> Result<i64, ServiceError>;

    /// the latest `months` months that have bookings, newest first
    fn monthly_revenue(&self, months: i64) -> Result<Vec<MonthlyRevenue>, ServiceError>;

    /// most booked start times first
    fn popular_start_times(&self, limit: i64) -> Result<Vec<StartTimeCount>, ServiceError>;

    fn ground_revenue(&self) -> Result<Vec<GroundRevenue>, ServiceError>;

    /// every non-admin user, newest first
    fn customers(&self) -> Result<Vec<Customer>, ServiceError>;

    fn customer(&self, id: i64) -> Result<Option<Customer>, ServiceError>;
}

const CUSTOMERS: &str = "SELECT u.id, u.name, u.email, u.phone, u.created_at, \
     COUNT(b.id) AS total_bookings, \
     COALESCE(SUM(b.total_amount), 0)::BIGINT AS total_spent \
     FROM users u \
     LEFT JOIN bookings b ON b.user_id = u.id AND b.booking_status <> $1 \
     WHERE NOT u.is_admin";

#[derive(AsChangeset)]
#[table_name = "bookings"]
struct StatusChange {
    booking_status: String,
    payment_status: Option<String>,
}

/// Postgres backed store
pub struct PgStore {
    pool: db::Pool,
}

impl PgStore {
    pub fn new(pool: db::Pool) -> Self {
        PgStore { pool }
    }

    fn load_slots(
        ground: Ground,
        date: NaiveDate,
        conn: &PgConnection,
    ) -> Result<Vec<Slot>, ServiceError> {
        let times = bookings::table
            .filter(bookings::ground_number.eq(ground.number()))
            .filter(bookings::booking_date.eq(date))
            .filter(bookings::booking_status.ne(BookingStatus::Cancelled.to_string()))
            .select((bookings::start_time, bookings::end_time))
            .load::<(NaiveTime, NaiveTime)>(conn)?;

        Ok(times
            .into_iter()
            .map(|(start, end)| Slot::from_times(start, end))
            .collect())
    }

    /// non-cancelled bookings from `from` until `to`, both included
    fn active_between(
        from: NaiveDate,
        to: Option<NaiveDate>,
    ) -> bookings::BoxedQuery<'static, Pg> {
        let mut query = bookings::table
            .filter(bookings::booking_date.ge(from))
            .filter(bookings::booking_status.ne(BookingStatus::Cancelled.to_string()))
            .into_boxed();

        if let Some(to) = to {
            query = query.filter(bookings::booking_date.le(to));
        }

        query
    }

    fn save(booking: &NewBooking, conn: &PgConnection) -> Result<Booking, ServiceError> {
        let booking: Booking = diesel::insert_into(bookings::table)
            .values(booking)
            .get_result(conn)?;

        diesel::insert_into(analytics::table)
            .values(&NewEvent::booking_created(&booking)?)
            .execute(conn)?;

        Ok(booking)
    }
}

impl BookingStore for PgStore {
    fn find(&self, id: i64) -> Result<Booking, ServiceError> {
        let conn = self.pool.get()?;

        let booking = bookings::table
            .filter(bookings::id.eq(id))
            .first::<Booking>(&conn)
            .optional()?;

        booking.ok_or_else(|| ServiceError::NotFound("Booking not found".to_string()))
    }

    fn find_all(&self, filter: &BookingFilter) -> Result<Vec<Booking>, ServiceError> {
        let conn = self.pool.get()?;
        let mut query = bookings::table.into_boxed();

        if let Some(status) = filter.status {
            query = query.filter(bookings::booking_status.eq(status.to_string()));
        }

        if let Some(date) = filter.date {
            query = query.filter(bookings::booking_date.eq(date));
        }

        if let Some(ground) = filter.ground {
            query = query.filter(bookings::ground_number.eq(ground));
        }

        if let Some(owner) = filter.owner {
            query = query.filter(bookings::user_id.eq(owner));
        }

        if filter.active_only {
            query = query.filter(bookings::booking_status.ne(BookingStatus::Cancelled.to_string()));
        }

        if let Some(limit) = filter.limit {
            query = query.limit(limit);
        }

        let bookings = query
            .order((bookings::booking_date.desc(), bookings::start_time.desc()))
            .load::<Booking>(&conn)?;

        Ok(bookings)
    }

    fn active_slots(&self, ground: Ground, date: NaiveDate) -> Result<Vec<Slot>, ServiceError> {
        let conn = self.pool.get()?;
        PgStore::load_slots(ground, date, &conn)
    }

    /// Runs the availability check and the insert in one serializable transaction,
    /// a concurrent booking of the same slot makes one of both fail.
    fn admit(&self, booking: &NewBooking) -> Result<Booking, ServiceError> {
        let conn = self.pool.get()?;
        let ground = booking.ground()?;

        conn.build_transaction()
            .serializable()
            .run::<Booking, ServiceError, _>(|| {
                let slots = PgStore::load_slots(ground, booking.booking_date, &conn)?;
                availability::ensure_free(&slots, &booking.slot())?;
                PgStore::save(booking, &conn)
            })
    }

    fn transition(&self, change: &Transition) -> Result<Option<Booking>, ServiceError> {
        let conn = self.pool.get()?;

        let update = StatusChange {
            booking_status: change.to.to_string(),
            payment_status: change.payment_status.map(|status| status.to_string()),
        };

        let target = bookings::table
            .filter(bookings::id.eq(change.id))
            .filter(bookings::booking_status.eq(change.from.to_string()));

        let booking = match change.owner {
            Some(owner) => diesel::update(target.filter(bookings::user_id.eq(owner)))
                .set(&update)
                .get_result::<Booking>(&conn)
                .optional()?,
            None => diesel::update(target)
                .set(&update)
                .get_result::<Booking>(&conn)
                .optional()?,
        };

        Ok(booking)
    }

    fn revenue(&self, from: NaiveDate, to: Option<NaiveDate>) -> Result<Revenue, ServiceError> {
        let conn = self.pool.get()?;

        let count = PgStore::active_between(from, to)
            .select(count_star())
            .first::<i64>(&conn)?;

        let revenue = PgStore::active_between(from, to)
            .select(sum(bookings::total_amount))
            .first::<Option<i64>>(&conn)?;

        Ok(Revenue {
            bookings: count,
            revenue: revenue.unwrap_or(0),
        })
    }

    fn count_pending(&self) -> Result<i64, ServiceError> {
        let conn = self.pool.get()?;

        let count = bookings::table
            .filter(bookings::booking_status.eq(BookingStatus::Pending.to_string()))
            .select(count_star())
            .first::<i64>(&conn)?;

        Ok(count)
    }

    fn monthly_revenue(&self, months: i64) -> Result<Vec<MonthlyRevenue>, ServiceError> {
        let conn = self.pool.get()?;

        let rows = diesel::sql_query(
            "SELECT to_char(booking_date, 'YYYY-MM') AS month, COUNT(*) AS bookings, \
             COALESCE(SUM(total_amount), 0)::BIGINT AS revenue \
             FROM bookings WHERE booking_status <> $1 \
             GROUP BY month ORDER BY month DESC LIMIT $2",
        )
        .bind::<Text, _>(BookingStatus::Cancelled.to_string())
        .bind::<BigInt, _>(months)
        .load::<MonthlyRevenue>(&conn)?;

        Ok(rows)
    }

    fn popular_start_times(&self, limit: i64) -> Result<Vec<StartTimeCount>, ServiceError> {
        let conn = self.pool.get()?;

        let rows = diesel::sql_query(
            "SELECT to_char(start_time, 'HH24:MI') AS start_time, COUNT(*) AS bookings \
             FROM bookings WHERE booking_status <> $1 \
             GROUP BY 1 ORDER BY bookings DESC, 1 LIMIT $2",
        )
        .bind::<Text, _>(BookingStatus::Cancelled.to_string())
        .bind::<BigInt, _>(limit)
        .load::<StartTimeCount>(&conn)?;

        Ok(rows)
    }

    fn ground_revenue(&self) -> Result<Vec<GroundRevenue>, ServiceError> {
        let conn = self.pool.get()?;

        let rows = diesel::sql_query(
            "SELECT ground_number, COUNT(*) AS bookings, \
             COALESCE(SUM(total_amount), 0)::BIGINT AS revenue \
             FROM bookings WHERE booking_status <> $1 \
             GROUP BY ground_number ORDER BY ground_number",
        )
        .bind::<Text, _>(BookingStatus::Cancelled.to_string())
        .load::<GroundRevenue>(&conn)?;

        Ok(rows)
    }

    fn customers(&self) -> Result<Vec<Customer>, ServiceError> {
        let conn = self.pool.get()?;

        let customers = diesel::sql_query(format!(
            "{} GROUP BY u.id ORDER BY u.created_at DESC",
            CUSTOMERS
        ))
        .bind::<Text, _>(BookingStatus::Cancelled.to_string())
        .load::<Customer>(&conn)?;

        Ok(customers)
    }

    fn customer(&self, id: i64) -> Result<Option<Customer>, ServiceError> {
        let conn = self.pool.get()?;

        let customer = diesel::sql_query(format!("{} AND u.id = $2 GROUP BY u.id", CUSTOMERS))
            .bind::<Text, _>(BookingStatus::Cancelled.to_string())
            .bind::<BigInt, _>(id)
            .load::<Customer>(&conn)?;

        Ok(customer.into_iter().next())
    }
}
