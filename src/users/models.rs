use argon2::Config;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DBError};
use rand::Rng;

use crate::db;
use crate::errors::ServiceError;
use crate::schema::users;

/// **POST /api/auth/register**
///
/// ``` shell
/// curl --location --request POST 'localhost:8080/api/auth/register' \
///     --header 'Content-Type: application/json' \
///     --data-raw '{
///         "name": "Rahim Uddin",
///         "email": "rahim@example.com",
///         "phone": "01700000000",
///         "password": "hunter2boogaloo"
///     }'
/// ```
#[derive(Debug, Deserialize)]
pub struct RegisterMessage {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginMessage {
    pub email: String,
    pub password: String,
}

#[derive(Insertable)]
#[table_name = "users"]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub password: String,
    pub is_admin: bool,
}

#[derive(Serialize, Queryable, Debug, Clone)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    #[serde(skip_serializing)]
    pub password: String,
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn find(id: i64, conn: &db::Conn) -> Result<Self, ServiceError> {
        let user = users::table
            .filter(users::id.eq(id))
            .first::<User>(conn)
            .optional()?;

        user.ok_or_else(|| ServiceError::NotFound("User not found".to_string()))
    }

    pub fn find_by_email(email: &str, conn: &db::Conn) -> Result<Option<Self>, ServiceError> {
        let user = users::table
            .filter(users::email.eq(email.trim().to_lowercase()))
            .first::<User>(conn)
            .optional()?;

        Ok(user)
    }

    pub fn create(message: RegisterMessage, conn: &db::Conn) -> Result<Self, ServiceError> {
        if User::find_by_email(&message.email, conn)?.is_some() {
            bad_request!("Email already registered");
        }

        let user = NewUser {
            name: message.name.trim().to_string(),
            email: message.email.trim().to_lowercase(),
            phone: message
                .phone
                .map(|phone| phone.trim().to_string())
                .filter(|phone| !phone.is_empty()),
            password: hash_password(&message.password)?,
            is_admin: false,
        };

        let user = diesel::insert_into(users::table)
            .values(&user)
            .get_result::<User>(conn)
            .map_err(|error| match error {
                DBError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
                    ServiceError::Validation("Email already registered".to_string())
                }
                error => error.into(),
            })?;

        Ok(user)
    }

    /// Creates the administrator account, or resets its password when it already exists
    pub fn ensure_admin(email: &str, password: &str, conn: &db::Conn) -> Result<Self, ServiceError> {
        let email = email.trim().to_lowercase();
        let password = hash_password(password)?;

        let user = diesel::insert_into(users::table)
            .values(&NewUser {
                name: "Administrator".to_string(),
                email,
                phone: None,
                password: password.clone(),
                is_admin: true,
            })
            .on_conflict(users::email)
            .do_update()
            .set((users::password.eq(password), users::is_admin.eq(true)))
            .get_result::<User>(conn)?;

        Ok(user)
    }

    pub fn verify_password(&self, password: &[u8]) -> Result<(), ServiceError> {
        let is_match = argon2::verify_encoded(&self.password, password)?;

        if !is_match {
            return Err(ServiceError::Unauthorized);
        }

        Ok(())
    }
}

pub fn hash_password(password: &str) -> Result<String, ServiceError> {
    let salt: [u8; 32] = rand::thread_rng().gen();
    let config = Config::default();

    Ok(argon2::hash_encoded(password.as_bytes(), &salt, &config)?)
}

impl crate::validator::Validate<RegisterMessage> for RegisterMessage {
    fn validate(&self) -> Result<(), ServiceError> {
        if self.name.trim().is_empty() {
            bad_request!("name is required");
        }

        if self.name.trim().len() > 100 {
            bad_request!("name is too long, max 100 characters");
        }

        if !::validator::validate_email(self.email.trim()) {
            bad_request!("email is not a valid email address");
        }

        if self.password.len() < 6 {
            bad_request!("your password should at least be 6 characters long");
        }

        Ok(())
    }
}
