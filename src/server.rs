use actix_cors::Cors;
use actix_identity::{CookieIdentityPolicy, IdentityService};
use actix_web::{cookie, get, middleware, web, App, HttpRequest, HttpResponse, HttpServer};

use crate::admin;
use crate::auth;
use crate::bookings::{self, Admission};
use crate::config::Config;
use crate::db;
use crate::errors::ServiceError;
use crate::stats;
use crate::uploads::UploadDir;
use crate::users;

pub type Response = Result<HttpResponse, ServiceError>;

/// a week, in seconds
const SESSION_MAX_AGE: i64 = 7 * 24 * 60 * 60;

#[get("/health")]
async fn health(_: HttpRequest) -> &'static str {
    "ok"
}

pub async fn launch(db_pool: db::Pool, admission: Admission) -> std::io::Result<()> {
    let admission = web::Data::new(admission);
    let stats = web::Data::new(stats::Stats::new());
    let upload_dir = web::Data::new(UploadDir(Config::upload_dir().to_string()));
    let session_private_key = Config::session_private_key().to_string();

    debug!("listening on {}:{}", Config::api_host(), Config::api_port());

    HttpServer::new(move || {
        App::new()
            .data(db_pool.clone())
            .app_data(admission.clone())
            .app_data(stats.clone())
            .app_data(upload_dir.clone())
            .wrap(middleware::DefaultHeaders::new().header("X-Version", env!("CARGO_PKG_VERSION")))
            .wrap(middleware::Compress::default())
            .wrap(middleware::Logger::default())
            .wrap(
                Cors::default()
                    .allow_any_origin()
                    .allow_any_method()
                    .allow_any_header()
                    .max_age(3600),
            )
            .wrap(sentry_actix::Sentry::new())
            .wrap(stats::Middleware::default())
            .wrap(IdentityService::new(
                CookieIdentityPolicy::new(session_private_key.as_bytes())
                    .name("greenfield-auth")
                    .path("/")
                    .max_age(SESSION_MAX_AGE)
                    .same_site(cookie::SameSite::Strict)
                    .secure(false),
            ))
            .app_data(web::JsonConfig::default().limit(262_144))
            .app_data(web::PayloadConfig::default().limit(262_144))
            .service(
                web::scope("/api")
                    .configure(auth::routes::register)
                    .configure(users::routes::register)
                    .configure(bookings::routes::register)
                    .configure(admin::routes::register)
                    .service(health),
            )
    })
    .bind(format!("{}:{}", Config::api_host(), Config::api_port()))?
    .run()
    .await
}
