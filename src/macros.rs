/// Return the request with HTTP 403
#[macro_export]
macro_rules! forbidden {
    ($message:expr) => {
        return Err(crate::errors::ServiceError::Forbidden($message.to_string()));
    };
}

/// Reject the request with HTTP 400 because of an invalid field
#[macro_export]
macro_rules! bad_request {
    ($message:expr) => {
        return Err(crate::errors::ServiceError::Validation(
            $message.to_string(),
        ));
    };
    ($fmt:expr, $($arg:tt)+) => {
        return Err(crate::errors::ServiceError::Validation(format!(
            $fmt, $($arg)+
        )));
    };
}

/// Answer the request with HTTP 201 and the object as response body
#[macro_export]
macro_rules! http_created_json {
    ($object:expr) => {
        return Ok(actix_web::web::HttpResponse::Created().json($object));
    };
}

/// Answer the request with HTTP 200 and the object as response body
#[macro_export]
macro_rules! http_ok_json {
    ($object:expr) => {
        return Ok(actix_web::web::HttpResponse::Ok().json($object));
    };
}

/// Signs in through the test login route, returns the identity cookie
#[cfg(test)]
macro_rules! sign_in {
    ($app:expr, $user:expr, $is_admin:expr) => {{
        let req = actix_web::test::TestRequest::get()
            .uri(&format!("/test/login/{}/{}", $user, $is_admin))
            .to_request();
        let resp = actix_web::test::call_service($app, req).await;

        resp.response()
            .cookies()
            .next()
            .expect("no identity cookie was set")
            .into_owned()
    }};
}
