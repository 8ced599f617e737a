// server/src/api/handlers_user.rs
use warp::http::StatusCode;
use warp::reply::Response;
use warp::Rejection;

use crate::api::rejections::reject;
use crate::api::routes::reply_json;
use lib::auth::Caller;
use lib::database::ClinicDatabase;
use models::requests::{AddDoctorRequest, AvailabilityUpdate, ProfileUpdate};

pub async fn list_users(caller: Caller, db: ClinicDatabase) -> Result<Response, Rejection> {
    let users = db.identity.list_users(&caller).await.map_err(reject)?;
    Ok(reply_json(&users, StatusCode::OK))
}

// Any authenticated role may browse doctors.
pub async fn list_doctors(_caller: Caller, db: ClinicDatabase) -> Result<Response, Rejection> {
    let doctors = db.identity.list_doctors().await.map_err(reject)?;
    Ok(reply_json(&doctors, StatusCode::OK))
}

pub async fn get_profile(caller: Caller, db: ClinicDatabase) -> Result<Response, Rejection> {
    let profile = db.identity.profile(&caller).await.map_err(reject)?;
    Ok(reply_json(&profile, StatusCode::OK))
}

pub async fn update_profile(caller: Caller, db: ClinicDatabase, body: ProfileUpdate) -> Result<Response, Rejection> {
    let profile = db.identity.update_profile(&caller, body).await.map_err(reject)?;
    Ok(reply_json(&profile, StatusCode::OK))
}

pub async fn set_availability(
    caller: Caller,
    db: ClinicDatabase,
    body: AvailabilityUpdate,
) -> Result<Response, Rejection> {
    let profile = db.identity.set_availability(&caller, body).await.map_err(reject)?;
    Ok(reply_json(&profile, StatusCode::OK))
}

pub async fn add_doctor(caller: Caller, db: ClinicDatabase, body: AddDoctorRequest) -> Result<Response, Rejection> {
    let doctor = db.identity.add_doctor(&caller, body).await.map_err(reject)?;
    Ok(reply_json(&doctor, StatusCode::CREATED))
}
