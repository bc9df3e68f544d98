use serde::Serialize;
use std::convert::Infallible;

use warp::{reject, Filter, Rejection, Reply};

use crate::collage_types::CollageError;
use crate::handlers_collage::AppState;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: u16,
    pub timestamp: String,
}

#[derive(Debug)]
pub struct ValidationError {
    pub message: String,
}

impl reject::Reject for ValidationError {}

#[derive(Debug)]
pub struct CompositionError {
    pub message: String,
}

impl reject::Reject for CompositionError {}

/// A newer request for the same session replaced this one.
#[derive(Debug)]
pub struct SupersededError;

impl reject::Reject for SupersededError {}

pub fn validation(message: impl Into<String>) -> Rejection {
    reject::custom(ValidationError {
        message: message.into(),
    })
}

/// Caller mistakes become 400s, cancellation a 409, everything else a 500.
pub fn collage_rejection(e: CollageError) -> Rejection {
    match e {
        CollageError::InvalidGeometry(_) | CollageError::UnknownTemplate(_) => {
            validation(e.to_string())
        }
        CollageError::Cancelled => reject::custom(SupersededError),
        CollageError::Encoding(_) | CollageError::Surface(_) => {
            log::error!("Composition failed: {}", e);
            reject::custom(CompositionError {
                message: e.to_string(),
            })
        }
    }
}

pub fn with_state(state: AppState) -> impl Filter<Extract = (AppState,), Error = Infallible> + Clone {
    warp::any().map(move || state.clone())
}

pub async fn handle_rejection(err: Rejection) -> Result<impl Reply, Infallible> {
    let code;
    let message;
    let timestamp = chrono::Utc::now().to_rfc3339();

    if err.is_not_found() {
        code = warp::http::StatusCode::NOT_FOUND;
        message = "Not Found".to_string();
    } else if let Some(validation_error) = err.find::<ValidationError>() {
        code = warp::http::StatusCode::BAD_REQUEST;
        message = validation_error.message.clone();
    } else if let Some(composition_error) = err.find::<CompositionError>() {
        code = warp::http::StatusCode::INTERNAL_SERVER_ERROR;
        message = composition_error.message.clone();
    } else if err.find::<SupersededError>().is_some() {
        code = warp::http::StatusCode::CONFLICT;
        message = "Superseded by a newer request".to_string();
    } else if let Some(body_error) = err.find::<warp::body::BodyDeserializeError>() {
        code = warp::http::StatusCode::BAD_REQUEST;
        message = format!("Invalid request body: {}", body_error);
    } else if err.find::<warp::reject::PayloadTooLarge>().is_some() {
        code = warp::http::StatusCode::PAYLOAD_TOO_LARGE;
        message = "Payload too large".to_string();
    } else if err.find::<warp::reject::UnsupportedMediaType>().is_some() {
        code = warp::http::StatusCode::UNSUPPORTED_MEDIA_TYPE;
        message = "Unsupported media type".to_string();
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        code = warp::http::StatusCode::METHOD_NOT_ALLOWED;
        message = "Method not allowed".to_string();
    } else {
        log::error!("Unhandled rejection: {:?}", err);
        code = warp::http::StatusCode::INTERNAL_SERVER_ERROR;
        message = "Internal server error".to_string();
    }

    let error_response = ErrorResponse {
        error: message,
        code: code.as_u16(),
        timestamp,
    };

    Ok(warp::reply::with_status(
        warp::reply::json(&error_response),
        code,
    ))
}

pub fn cors() -> warp::cors::Builder {
    warp::cors()
        .allow_any_origin()
        .allow_headers(vec!["content-type"])
        .allow_methods(vec!["GET", "POST", "OPTIONS"])
}
