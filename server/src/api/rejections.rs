// server/src/api/rejections.rs
use std::convert::Infallible;

use log::{debug, error, warn};
use serde::Serialize;
use warp::http::StatusCode;
use warp::reply::Response;
use warp::{Rejection, Reply};

use models::errors::{ClinicError, ValidationErrors};

/// Carries a domain error through warp's rejection chain.
#[derive(Debug)]
pub struct ApiError(pub ClinicError);

impl warp::reject::Reject for ApiError {}

pub fn reject(err: ClinicError) -> Rejection {
    warp::reject::custom(ApiError(err))
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<ValidationErrors>,
}

impl ErrorBody {
    fn plain(message: impl Into<String>) -> Self {
        ErrorBody { message: message.into(), errors: None }
    }
}

pub fn status_for(err: &ClinicError) -> StatusCode {
    match err {
        ClinicError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        ClinicError::Forbidden(_) => StatusCode::FORBIDDEN,
        ClinicError::NotFound(_) => StatusCode::NOT_FOUND,
        ClinicError::Validation(_) | ClinicError::InvalidState(_) | ClinicError::InvalidCredentials => {
            StatusCode::BAD_REQUEST
        }
        ClinicError::Conflict(_) => StatusCode::CONFLICT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Internal details are logged, never returned.
pub fn error_response(err: &ClinicError) -> (StatusCode, ErrorBody) {
    let status = status_for(err);
    let body = match err {
        ClinicError::Validation(errors) => ErrorBody {
            message: "Validation failed".to_string(),
            errors: Some(errors.clone()),
        },
        e if e.is_internal() => {
            error!("Request failed with internal error: {}", e);
            ErrorBody::plain("Internal server error")
        }
        ClinicError::Unauthorized(msg) | ClinicError::Forbidden(msg) | ClinicError::Conflict(msg) => {
            warn!("Rejected request ({}): {}", status, msg);
            ErrorBody::plain(msg.clone())
        }
        e => {
            debug!("Rejected request ({}): {}", status, e);
            ErrorBody::plain(e.to_string())
        }
    };
    (status, body)
}

fn json_error(status: StatusCode, body: &ErrorBody) -> Response {
    warp::reply::with_status(warp::reply::json(body), status).into_response()
}

pub async fn handle_rejection(err: Rejection) -> Result<Response, Infallible> {
    if let Some(ApiError(clinic_error)) = err.find::<ApiError>() {
        let (status, body) = error_response(clinic_error);
        return Ok(json_error(status, &body));
    }
    if let Some(e) = err.find::<warp::filters::body::BodyDeserializeError>() {
        debug!("Malformed request body: {}", e);
        return Ok(json_error(StatusCode::BAD_REQUEST, &ErrorBody::plain(format!("Invalid request body: {}", e))));
    }
    if let Some(e) = err.find::<warp::reject::InvalidQuery>() {
        debug!("Malformed query string: {}", e);
        return Ok(json_error(StatusCode::BAD_REQUEST, &ErrorBody::plain("Invalid query string")));
    }
    if err.find::<warp::reject::PayloadTooLarge>().is_some() {
        return Ok(json_error(StatusCode::PAYLOAD_TOO_LARGE, &ErrorBody::plain("Request body too large")));
    }
    if err.find::<warp::reject::LengthRequired>().is_some() {
        return Ok(json_error(StatusCode::LENGTH_REQUIRED, &ErrorBody::plain("Content-Length header is required")));
    }
    if err.find::<warp::reject::UnsupportedMediaType>().is_some() {
        return Ok(json_error(
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
            &ErrorBody::plain("Request body must be application/json"),
        ));
    }
    if let Some(e) = err.find::<warp::reject::InvalidHeader>() {
        debug!("Rejected header: {}", e);
        return Ok(json_error(StatusCode::BAD_REQUEST, &ErrorBody::plain(e.to_string())));
    }
    if let Some(e) = err.find::<warp::reject::MissingHeader>() {
        debug!("Missing header: {}", e);
        return Ok(json_error(StatusCode::BAD_REQUEST, &ErrorBody::plain(e.to_string())));
    }
    if err.is_not_found() {
        return Ok(json_error(StatusCode::NOT_FOUND, &ErrorBody::plain("Route not found")));
    }
    if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        return Ok(json_error(StatusCode::METHOD_NOT_ALLOWED, &ErrorBody::plain("Method not allowed")));
    }

    error!("Unhandled rejection: {:?}", err);
    Ok(json_error(StatusCode::INTERNAL_SERVER_ERROR, &ErrorBody::plain("Internal server error")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_map_taxonomy_to_status_codes() {
        assert_eq!(status_for(&ClinicError::Unauthorized("x".into())), StatusCode::UNAUTHORIZED);
        assert_eq!(status_for(&ClinicError::Forbidden("x".into())), StatusCode::FORBIDDEN);
        assert_eq!(status_for(&ClinicError::NotFound("Visit".into())), StatusCode::NOT_FOUND);
        assert_eq!(status_for(&ClinicError::invalid_field("id", "bad")), StatusCode::BAD_REQUEST);
        assert_eq!(status_for(&ClinicError::InvalidState("x".into())), StatusCode::BAD_REQUEST);
        assert_eq!(status_for(&ClinicError::InvalidCredentials), StatusCode::BAD_REQUEST);
        assert_eq!(status_for(&ClinicError::Conflict("x".into())), StatusCode::CONFLICT);
        assert_eq!(status_for(&ClinicError::StorageError("disk".into())), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn should_hide_internal_details() {
        let (_, body) = error_response(&ClinicError::StorageError("password=hunter2".into()));
        assert_eq!(body.message, "Internal server error");
        assert!(body.errors.is_none());
    }

    #[test]
    fn should_list_invalid_fields() {
        let mut errors = ValidationErrors::new();
        errors.add("username", "too short");
        errors.add("email", "invalid");
        let (status, body) = error_response(&ClinicError::Validation(errors));
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["errors"][1]["field"], "email");
    }
}
