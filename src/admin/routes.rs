use actix_identity::Identity;
use actix_web::web::{Data, Json, Path, Query};
use actix_web::{get, post, put, web, HttpResponse};
use serde_json::json;

use crate::auth;
use crate::bookings::{today, Admission, BookingFilter, ManualBookingRequest, StatusUpdate};
use crate::db;
use crate::server::Response;
use crate::stats::Stats;
use crate::uploads::{self, UploadDir};

#[post("/admin/bookings/manual")]
async fn create_manual(
    request: Json<ManualBookingRequest>,
    id: Identity,
    admission: Data<Admission>,
) -> Response {
    let admin = auth::verify_admin(&id)?;
    let request = request.into_inner();

    let booking = web::block(move || admission.create_manual(&request)).await?;

    info!("admin {} entered manual booking {}", admin.id, booking.id);

    http_created_json!(json!({
        "message": "Manual booking created successfully",
        "bookingId": booking.id,
    }));
}

#[put("/admin/bookings/{id}/status")]
async fn update_status(
    booking_id: Path<i64>,
    update: Json<StatusUpdate>,
    id: Identity,
    admission: Data<Admission>,
) -> Response {
    let admin = auth::verify_admin(&id)?;
    let booking_id = booking_id.into_inner();
    let update = update.into_inner();

    let booking = web::block(move || admission.set_status(booking_id, update)).await?;

    info!(
        "admin {} set booking {} to {}",
        admin.id, booking.id, booking.booking_status
    );

    http_ok_json!(json!({ "message": "Booking status updated successfully" }));
}

#[get("/admin/bookings")]
async fn find_all(
    filter: Query<BookingFilter>,
    id: Identity,
    admission: Data<Admission>,
) -> Response {
    auth::verify_admin(&id)?;

    let bookings = web::block(move || admission.find_all(&filter)).await?;

    http_ok_json!(bookings);
}

#[get("/admin/bookings/{id}")]
async fn find(booking_id: Path<i64>, id: Identity, admission: Data<Admission>) -> Response {
    auth::verify_admin(&id)?;

    let booking = web::block(move || admission.find(*booking_id)).await?;

    http_ok_json!(booking);
}

#[get("/admin/dashboard")]
async fn dashboard(id: Identity, admission: Data<Admission>) -> Response {
    auth::verify_admin(&id)?;

    let today = today();
    let dashboard = web::block(move || admission.dashboard(today)).await?;

    http_ok_json!(dashboard);
}

#[get("/admin/analytics")]
async fn analytics(id: Identity, admission: Data<Admission>) -> Response {
    auth::verify_admin(&id)?;

    let analytics = web::block(move || admission.analytics()).await?;

    http_ok_json!(analytics);
}

#[get("/admin/customers")]
async fn customers(id: Identity, admission: Data<Admission>) -> Response {
    auth::verify_admin(&id)?;

    let customers = web::block(move || admission.customers()).await?;

    http_ok_json!(customers);
}

#[get("/admin/customers/{id}")]
async fn customer(customer_id: Path<i64>, id: Identity, admission: Data<Admission>) -> Response {
    auth::verify_admin(&id)?;

    let details = web::block(move || admission.customer(*customer_id)).await?;

    http_ok_json!(details);
}

#[get("/admin/payments/{name}")]
async fn payment_screenshot(
    name: Path<String>,
    id: Identity,
    upload_dir: Data<UploadDir>,
) -> Response {
    auth::verify_admin(&id)?;

    let (data, mime) = uploads::load(upload_dir.path(), &name).await?;

    Ok(HttpResponse::Ok().content_type(mime).body(data))
}

#[get("/admin/server/stats")]
async fn server_stats(id: Identity, stats: Data<Stats>, pool: Data<db::Pool>) -> Response {
    auth::verify_admin(&id)?;

    http_ok_json!(stats.report(pool.state()));
}

pub fn register(cfg: &mut web::ServiceConfig) {
    cfg.service(create_manual);
    cfg.service(update_status);
    cfg.service(find_all);
    cfg.service(find);
    cfg.service(dashboard);
    cfg.service(analytics);
    cfg.service(customers);
    cfg.service(customer);
    cfg.service(payment_screenshot);
    cfg.service(server_stats);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bookings::memory::MemoryStore;
    use crate::bookings::BookingRequest;
    use crate::uploads::Upload;
    use crate::users::User;
    use actix_web::http::StatusCode;
    use actix_web::{test, App};
    use chrono::{Duration, Utc};
    use serde_json::Value;
    use std::sync::Arc;

    fn upload_dir() -> UploadDir {
        let dir = std::env::temp_dir().join(format!("greenfield-{}", uploads::file_name("d")));
        UploadDir(dir.to_str().unwrap().to_string())
    }

    fn booking(start: &str, end: &str) -> BookingRequest {
        BookingRequest {
            ground_number: 1,
            booking_date: (today() + Duration::days(1)).to_string(),
            start_time: start.to_string(),
            end_time: end.to_string(),
            duration: 60,
            player_count: 10,
            payment_method: String::from("bkash"),
            total_amount: 1000.0,
            notes: None,
        }
    }

    #[actix_rt::test]
    async fn admin_routes_require_a_login() {
        let admission = Admission::new(Arc::new(MemoryStore::new()), 7);

        let mut app = test::init_service(
            App::new()
                .app_data(Data::new(admission))
                .configure(register),
        )
        .await;

        for uri in &[
            "/admin/bookings",
            "/admin/bookings/1",
            "/admin/dashboard",
            "/admin/analytics",
            "/admin/customers",
            "/admin/customers/1",
        ] {
            let req = test::TestRequest::get().uri(uri).to_request();
            let resp = test::call_service(&mut app, req).await;

            assert_eq!(resp.status(), StatusCode::UNAUTHORIZED, "{}", uri);
        }
    }

    #[actix_rt::test]
    async fn customers_cannot_use_admin_routes() {
        let admission = Admission::new(Arc::new(MemoryStore::new()), 7);

        let mut app = test::init_service(
            App::new()
                .wrap(auth::testing::identity_service())
                .app_data(Data::new(admission))
                .configure(auth::testing::register)
                .configure(register),
        )
        .await;
        let cookie = sign_in!(&mut app, 2, false);

        let req = test::TestRequest::put()
            .uri("/admin/bookings/1/status")
            .cookie(cookie.clone())
            .set_json(&json!({ "status": "confirmed" }))
            .to_request();
        let resp = test::call_service(&mut app, req).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);

        let req = test::TestRequest::get()
            .uri("/admin/dashboard")
            .cookie(cookie)
            .to_request();
        let resp = test::call_service(&mut app, req).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);

        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["error"], "Admin access required");
    }

    #[actix_rt::test]
    async fn manual_bookings_and_status_updates() {
        let admission = Data::new(Admission::new(Arc::new(MemoryStore::new()), 7));

        let mut app = test::init_service(
            App::new()
                .wrap(auth::testing::identity_service())
                .app_data(admission.clone())
                .configure(auth::testing::register)
                .configure(register),
        )
        .await;
        let cookie = sign_in!(&mut app, 1, true);

        let req = test::TestRequest::post()
            .uri("/admin/bookings/manual")
            .cookie(cookie.clone())
            .set_json(&json!({
                "customerName": "Karim",
                "customerPhone": "01800000000",
                "groundNumber": "2",
                "bookingDate": (today() + Duration::days(30)).to_string(),
                "startTime": "20:00",
                "endTime": "21:30",
                "playerCount": 12,
                "totalAmount": "1800",
            }))
            .to_request();
        let resp = test::call_service(&mut app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);

        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["message"], "Manual booking created successfully");
        assert_eq!(body["bookingId"], 1);

        let pending = admission
            .create(2, &booking("09:00", "10:00"), None, today())
            .unwrap();

        let req = test::TestRequest::put()
            .uri(&format!("/admin/bookings/{}/status", pending.id))
            .cookie(cookie.clone())
            .set_json(&json!({ "status": "confirmed", "paymentStatus": "paid" }))
            .to_request();
        let resp = test::call_service(&mut app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(admission.find(pending.id).unwrap().payment_status, "paid");

        // the manual booking is confirmed already
        let req = test::TestRequest::put()
            .uri("/admin/bookings/1/status")
            .cookie(cookie.clone())
            .set_json(&json!({ "status": "cancelled" }))
            .to_request();
        let resp = test::call_service(&mut app, req).await;
        assert_eq!(resp.status(), StatusCode::CONFLICT);

        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["error"], "cannot change a confirmed booking to cancelled");

        let req = test::TestRequest::put()
            .uri("/admin/bookings/42/status")
            .cookie(cookie)
            .set_json(&json!({ "status": "confirmed" }))
            .to_request();
        let resp = test::call_service(&mut app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[actix_rt::test]
    async fn rejecting_a_booking_keeps_the_payment_screenshot() {
        let admission = Data::new(Admission::new(Arc::new(MemoryStore::new()), 7));
        let dir = upload_dir();

        let proof = uploads::save(
            dir.path(),
            Upload {
                extension: "png".to_string(),
                data: vec![0x89, b'P', b'N', b'G'],
            },
        )
        .await
        .unwrap();
        let pending = admission
            .create(2, &booking("09:00", "10:00"), Some(proof.clone()), today())
            .unwrap();

        let mut app = test::init_service(
            App::new()
                .wrap(auth::testing::identity_service())
                .app_data(admission.clone())
                .app_data(Data::new(dir.clone()))
                .configure(auth::testing::register)
                .configure(register),
        )
        .await;
        let cookie = sign_in!(&mut app, 1, true);

        let req = test::TestRequest::put()
            .uri(&format!("/admin/bookings/{}/status", pending.id))
            .cookie(cookie.clone())
            .set_json(&json!({ "status": "cancelled" }))
            .to_request();
        let resp = test::call_service(&mut app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let rejected = admission.find(pending.id).unwrap();
        assert_eq!(rejected.booking_status, "cancelled");
        assert_eq!(rejected.payment_screenshot.as_deref(), Some(proof.as_str()));

        let req = test::TestRequest::get()
            .uri(&format!("/admin/payments/{}", proof))
            .cookie(cookie)
            .to_request();
        let resp = test::call_service(&mut app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let _ = std::fs::remove_dir_all(dir.path());
    }

    #[actix_rt::test]
    async fn analytics_and_customers() {
        let store = Arc::new(MemoryStore::new());
        store.add_user(User {
            id: 2,
            name: String::from("Rahim Uddin"),
            email: String::from("rahim@example.com"),
            phone: Some(String::from("01700000000")),
            password: String::from("secret"),
            is_admin: false,
            created_at: Utc::now(),
        });

        let admission = Admission::new(store, 7);
        admission
            .create(2, &booking("09:00", "10:00"), None, today())
            .unwrap();

        let mut app = test::init_service(
            App::new()
                .wrap(auth::testing::identity_service())
                .app_data(Data::new(admission))
                .configure(auth::testing::register)
                .configure(register),
        )
        .await;
        let cookie = sign_in!(&mut app, 1, true);

        let req = test::TestRequest::get()
            .uri("/admin/analytics")
            .cookie(cookie.clone())
            .to_request();
        let body: Value = test::read_response_json(&mut app, req).await;
        assert_eq!(body["popularSlots"][0]["start_time"], "09:00");
        assert_eq!(body["groundStats"][0]["revenue"], 1000);
        assert_eq!(body["monthlyRevenue"][0]["bookings"], 1);

        let req = test::TestRequest::get()
            .uri("/admin/dashboard")
            .cookie(cookie.clone())
            .to_request();
        let body: Value = test::read_response_json(&mut app, req).await;
        assert_eq!(body["pendingBookings"], 1);
        assert_eq!(body["monthlyRevenue"][0]["revenue"], 1000);

        let req = test::TestRequest::get()
            .uri("/admin/customers")
            .cookie(cookie.clone())
            .to_request();
        let body: Value = test::read_response_json(&mut app, req).await;
        assert_eq!(body[0]["email"], "rahim@example.com");
        assert_eq!(body[0]["total_bookings"], 1);
        assert_eq!(body[0]["total_spent"], 1000);
        assert!(body[0].get("password").is_none());

        let req = test::TestRequest::get()
            .uri("/admin/customers/2")
            .cookie(cookie.clone())
            .to_request();
        let body: Value = test::read_response_json(&mut app, req).await;
        assert_eq!(body["customer"]["name"], "Rahim Uddin");
        assert_eq!(body["bookings"][0]["start_time"], "09:00");

        let req = test::TestRequest::get()
            .uri("/admin/customers/3")
            .cookie(cookie)
            .to_request();
        let resp = test::call_service(&mut app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}
