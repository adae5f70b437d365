//! Booking service for The Green Field, a football and a cricket ground that
//! can be reserved by the hour.
#![warn(rust_2018_idioms)]
#![allow(semicolon_in_expressions_from_macros)]

#[macro_use]
extern crate diesel;

#[macro_use]
extern crate diesel_migrations;

#[macro_use]
extern crate lazy_static;

#[macro_use]
extern crate log;

#[macro_use]
extern crate serde_derive;

use std::sync::Arc;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::prelude::*;

use anyhow::{anyhow, Error};
use dotenv::dotenv;

#[macro_use]
mod macros;

mod admin;
mod analytics;
mod auth;
mod bookings;
mod config;
mod db;
mod errors;
mod schema;
mod server;
mod stats;
mod uploads;
mod users;
mod validator;

use config::Config;

#[actix_web::main]
async fn main() -> anyhow::Result<(), Error> {
    init().await?;

    Ok(())
}

async fn init() -> anyhow::Result<(), Error> {
    dotenv().ok();

    let _sentry = Config::sentry_dsn().map(|dsn| {
        sentry::init((
            dsn,
            sentry::ClientOptions {
                release: sentry::release_name!(),
                ..Default::default()
            },
        ))
    });

    let (tracer, _uninstall) = opentelemetry_jaeger::new_pipeline()
        .with_service_name("greenfield")
        .with_agent_endpoint(Config::opentelemetry_endpoint())
        .install()
        .expect("unable to connect to opentelemetry agent");

    // Create a tracing layer with the configured tracer
    let opentelemetry = tracing_opentelemetry::layer().with_tracer(tracer);

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stdout))
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(opentelemetry)
        .try_init()
        .expect("unable to initialize the tokio tracer");

    db::migrate(Config::database_url())
        .map_err(|e| anyhow!("unable to run the database migrations: {}", e))?;

    let pool = db::build_connection_pool(Config::database_url())
        .map_err(|e| anyhow!("unable to build the database pool: {}", e))?;

    if let Some((email, password)) = Config::admin_credentials() {
        let conn = pool.get()?;
        let admin = users::User::ensure_admin(email, password, &conn)
            .map_err(|e| anyhow!("unable to set up the admin account: {}", e))?;
        info!("admin account {} is ready", admin.email);
    }

    let store = Arc::new(bookings::PgStore::new(pool.clone()));
    let admission = bookings::Admission::new(store, Config::booking_horizon_days());

    debug!("launching the actix webserver");
    server::launch(pool, admission).await?;

    Ok(())
}
