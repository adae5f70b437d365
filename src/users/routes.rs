use actix_identity::Identity;
use actix_web::get;
use actix_web::web;
use actix_web::web::Data;

use crate::auth;
use crate::db;
use crate::server::Response;
use crate::users::User;

#[get("/users/me")]
async fn find_me(pool: Data<db::Pool>, id: Identity) -> Response {
    let identity = auth::get_user(&id)?;

    let user = web::block(move || {
        let conn = pool.get()?;
        User::find(identity.id, &conn)
    })
    .await?;

    http_ok_json!(user);
}

pub fn register(cfg: &mut web::ServiceConfig) {
    cfg.service(find_me);
}
