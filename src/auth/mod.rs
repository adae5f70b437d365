use actix_identity::Identity;

use crate::errors::ServiceError;

pub mod routes;

/// What is stored in the signed identity cookie
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UserIdentity {
    pub id: i64,
    pub is_admin: bool,
}

/// get the identity of the current user
/// returns Unauthorized when nobody is logged in
pub fn get_user(id: &Identity) -> Result<UserIdentity, ServiceError> {
    let identity = match id.identity() {
        Some(identity) => identity,
        None => return Err(ServiceError::Unauthorized),
    };

    serde_json::from_str(&identity).map_err(|e| {
        debug!("unreadable identity cookie: {}", e);
        ServiceError::Unauthorized
    })
}

/// only administrators get through
pub fn verify_admin(id: &Identity) -> Result<UserIdentity, ServiceError> {
    let user = get_user(id)?;

    if !user.is_admin {
        forbidden!("Admin access required");
    }

    Ok(user)
}

pub fn remember(id: &Identity, user: UserIdentity) -> Result<(), ServiceError> {
    id.remember(serde_json::to_string(&user)?);

    Ok(())
}
