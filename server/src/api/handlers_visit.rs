// server/src/api/handlers_visit.rs
use uuid::Uuid;
use warp::http::StatusCode;
use warp::reply::Response;
use warp::Rejection;

use crate::api::rejections::reject;
use crate::api::routes::reply_json;
use lib::auth::Caller;
use lib::database::ClinicDatabase;
use models::identifiers::parse_id;
use models::requests::{CreateVisitRequest, MedicalUpdate, PaymentUpdate, VisitQuery};

fn visit_id(raw: &str) -> Result<Uuid, Rejection> {
    parse_id("id", raw).map_err(|e| reject(e.into()))
}

pub async fn create_visit(caller: Caller, db: ClinicDatabase, body: CreateVisitRequest) -> Result<Response, Rejection> {
    let visit = db.visits.create(&caller, body).await.map_err(reject)?;
    Ok(reply_json(&visit, StatusCode::CREATED))
}

pub async fn list_visits(caller: Caller, db: ClinicDatabase, query: VisitQuery) -> Result<Response, Rejection> {
    let visits = db.visits.list(&caller, &query).await.map_err(reject)?;
    Ok(reply_json(&visits, StatusCode::OK))
}

pub async fn get_visit(id: String, caller: Caller, db: ClinicDatabase) -> Result<Response, Rejection> {
    let id = visit_id(&id)?;
    let visit = db.visits.get(&caller, &id).await.map_err(reject)?;
    Ok(reply_json(&visit, StatusCode::OK))
}

pub async fn start_visit(id: String, caller: Caller, db: ClinicDatabase) -> Result<Response, Rejection> {
    let id = visit_id(&id)?;
    let visit = db.visits.start(&caller, &id).await.map_err(reject)?;
    Ok(reply_json(&visit, StatusCode::OK))
}

pub async fn update_medical(
    id: String,
    caller: Caller,
    db: ClinicDatabase,
    body: MedicalUpdate,
) -> Result<Response, Rejection> {
    let id = visit_id(&id)?;
    let visit = db.visits.update_medical(&caller, &id, body).await.map_err(reject)?;
    Ok(reply_json(&visit, StatusCode::OK))
}

pub async fn complete_visit(id: String, caller: Caller, db: ClinicDatabase) -> Result<Response, Rejection> {
    let id = visit_id(&id)?;
    let visit = db.visits.complete(&caller, &id).await.map_err(reject)?;
    Ok(reply_json(&visit, StatusCode::OK))
}

pub async fn cancel_visit(id: String, caller: Caller, db: ClinicDatabase) -> Result<Response, Rejection> {
    let id = visit_id(&id)?;
    let visit = db.visits.cancel(&caller, &id).await.map_err(reject)?;
    Ok(reply_json(&visit, StatusCode::OK))
}

pub async fn set_payment(
    id: String,
    caller: Caller,
    db: ClinicDatabase,
    body: PaymentUpdate,
) -> Result<Response, Rejection> {
    let id = visit_id(&id)?;
    let visit = db.visits.set_payment(&caller, &id, body).await.map_err(reject)?;
    Ok(reply_json(&visit, StatusCode::OK))
}
