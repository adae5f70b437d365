use actix_identity::Identity;
use actix_multipart::Multipart;
use actix_web::web::{Data, Json, Path};
use actix_web::{get, post, put, web};
use serde_json::json;

use crate::auth;
use crate::bookings::availability::Availability;
use crate::bookings::models::AvailabilityRequest;
use crate::bookings::{pricing, today, Admission, BookingRequest};
use crate::errors::ServiceError;
use crate::server::Response;
use crate::uploads::{self, UploadDir};
use crate::validator::Validator;

#[post("/bookings/check-availability")]
async fn check_availability(
    request: Json<AvailabilityRequest>,
    admission: Data<Admission>,
) -> Response {
    let reservation = request.parse()?;
    let today = today();

    let result: Result<Availability, ServiceError> =
        web::block(move || admission.check(&reservation, today))
            .await
            .map_err(ServiceError::from);

    match result {
        Ok(availability) => http_ok_json!(json!({
            "available": availability.available,
            "message": availability.message(),
            "conflictingRange": availability.conflicting_range.map(|slot| slot.to_string()),
        })),
        // a date outside of the booking window is simply not available
        Err(ServiceError::Horizon(message)) => http_ok_json!(json!({
            "available": false,
            "message": message,
        })),
        Err(e) => Err(e),
    }
}

#[post("/bookings/create")]
async fn create(
    payload: Multipart,
    id: Identity,
    admission: Data<Admission>,
    upload_dir: Data<UploadDir>,
) -> Response {
    let user = auth::get_user(&id)?;

    let form = uploads::read_form(payload).await?;
    let request = Validator::new(BookingRequest::from_form(&form.fields)?).validate()?;

    let proof = match form.proof {
        Some(upload) => Some(uploads::save(upload_dir.path(), upload).await?),
        None => None,
    };

    let stored = proof.clone();
    let today = today();

    let result: Result<_, ServiceError> =
        web::block(move || admission.create(user.id, &request, proof, today))
            .await
            .map_err(ServiceError::from);

    match result {
        Ok(booking) => http_created_json!(json!({
            "message": "Booking created successfully",
            "bookingId": booking.id,
        })),
        Err(e) => {
            if let Some(name) = stored {
                uploads::remove(upload_dir.path(), &name).await;
            }
            Err(e)
        }
    }
}

#[get("/bookings/my-bookings")]
async fn my_bookings(id: Identity, admission: Data<Admission>) -> Response {
    let user = auth::get_user(&id)?;

    let bookings = web::block(move || admission.my_bookings(user.id)).await?;

    http_ok_json!(bookings);
}

#[put("/bookings/cancel/{id}")]
async fn cancel(booking_id: Path<i64>, id: Identity, admission: Data<Admission>) -> Response {
    let user = auth::get_user(&id)?;
    let booking_id = booking_id.into_inner();

    web::block(move || admission.cancel(booking_id, user.id)).await?;

    info!("user {} cancelled booking {}", user.id, booking_id);

    http_ok_json!(json!({ "message": "Booking cancelled successfully" }));
}

#[get("/customer/pricing")]
async fn prices() -> Response {
    http_ok_json!(pricing::price_list());
}

pub fn register(cfg: &mut web::ServiceConfig) {
    cfg.service(check_availability);
    cfg.service(create);
    cfg.service(my_bookings);
    cfg.service(cancel);
    cfg.service(prices);
}
