use actix_identity::Identity;
use actix_web::web::{Data, Json};
use actix_web::{post, web, HttpResponse};
use serde_json::json;

use crate::auth::{self, UserIdentity};
use crate::db;
use crate::errors::ServiceError;
use crate::server::Response;
use crate::users::{LoginMessage, RegisterMessage, User};
use crate::validator::Validator;

#[post("/auth/register")]
async fn sign_up(message: Json<Validator<RegisterMessage>>, pool: Data<db::Pool>) -> Response {
    let message = message.into_inner().validate()?;

    let user = web::block(move || {
        let conn = pool.get()?;
        User::create(message, &conn)
    })
    .await?;

    info!("user {} registered", user.id);

    http_created_json!(user);
}

#[post("/auth/login")]
async fn login(credentials: Json<LoginMessage>, id: Identity, pool: Data<db::Pool>) -> Response {
    let credentials = credentials.into_inner();

    let user = web::block(move || -> Result<User, ServiceError> {
        let conn = pool.get()?;

        let user = match User::find_by_email(&credentials.email, &conn)? {
            Some(user) => user,
            None => return Err(ServiceError::Unauthorized),
        };

        user.verify_password(credentials.password.as_bytes())?;

        Ok(user)
    })
    .await?;

    auth::remember(
        &id,
        UserIdentity {
            id: user.id,
            is_admin: user.is_admin,
        },
    )?;

    http_ok_json!(user);
}

#[post("/auth/logout")]
async fn logout(id: Identity) -> Response {
    auth::get_user(&id)?;
    id.forget();

    Ok(HttpResponse::Ok().json(json!({ "message": "Successfully signed out" })))
}

pub fn register(cfg: &mut web::ServiceConfig) {
    cfg.service(sign_up);
    cfg.service(login);
    cfg.service(logout);
}
