// server/src/api/handlers_stats.rs
use warp::http::StatusCode;
use warp::reply::Response;
use warp::Rejection;

use crate::api::rejections::reject;
use crate::api::routes::reply_json;
use lib::auth::Caller;
use lib::database::ClinicDatabase;

/// Doctor callers get their own figures, finance callers the clinic-wide ones.
pub async fn get_stats(caller: Caller, db: ClinicDatabase) -> Result<Response, Rejection> {
    let stats = db.stats.stats(&caller).await.map_err(reject)?;
    Ok(reply_json(&stats, StatusCode::OK))
}
