// server/src/api/handlers_auth.rs
use warp::http::StatusCode;
use warp::reply::Response;
use warp::Rejection;

use crate::api::rejections::reject;
use crate::api::routes::reply_json;
use lib::database::ClinicDatabase;
use models::requests::{LoginRequest, RegisterRequest};

pub async fn register(db: ClinicDatabase, body: RegisterRequest) -> Result<Response, Rejection> {
    let response = db.identity.register(body).await.map_err(reject)?;
    Ok(reply_json(&response, StatusCode::CREATED))
}

pub async fn login(db: ClinicDatabase, body: LoginRequest) -> Result<Response, Rejection> {
    let response = db.identity.login(body).await.map_err(reject)?;
    Ok(reply_json(&response, StatusCode::OK))
}
