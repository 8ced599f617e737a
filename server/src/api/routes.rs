// server/src/api/routes.rs
use std::convert::Infallible;

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;
use warp::filters::BoxedFilter;
use warp::http::StatusCode;
use warp::reply::Response;
use warp::{Filter, Rejection, Reply};

use crate::api::rejections::{handle_rejection, reject};
use crate::api::{handlers_auth, handlers_stats, handlers_user, handlers_visit};
use lib::auth::Caller;
use lib::database::ClinicDatabase;
use models::requests::VisitQuery;

const MAX_BODY_BYTES: u64 = 64 * 1024;

pub fn with_db(db: ClinicDatabase) -> impl Filter<Extract = (ClinicDatabase,), Error = Infallible> + Clone {
    warp::any().map(move || db.clone())
}

/// Resolves the bearer token in `Authorization` to the calling user.
pub fn with_auth(db: ClinicDatabase) -> impl Filter<Extract = (Caller,), Error = Rejection> + Clone {
    warp::header::optional::<String>("authorization")
        .and(with_db(db))
        .and_then(|header: Option<String>, db: ClinicDatabase| async move {
            db.gate.authenticate(header.as_deref()).await.map_err(reject)
        })
}

pub fn json_body<T>() -> impl Filter<Extract = (T,), Error = Rejection> + Clone
where
    T: DeserializeOwned + Send,
{
    warp::body::content_length_limit(MAX_BODY_BYTES).and(warp::body::json())
}

pub fn reply_json<T: Serialize>(body: &T, status: StatusCode) -> Response {
    warp::reply::with_status(warp::reply::json(body), status).into_response()
}

fn auth_routes(db: &ClinicDatabase) -> BoxedFilter<(Response,)> {
    let register = warp::path!("auth" / "register")
        .and(warp::post())
        .and(with_db(db.clone()))
        .and(json_body())
        .and_then(handlers_auth::register);

    let login = warp::path!("auth" / "login")
        .and(warp::post())
        .and(with_db(db.clone()))
        .and(json_body())
        .and_then(handlers_auth::login);

    register.or(login).unify().boxed()
}

fn user_routes(db: &ClinicDatabase) -> BoxedFilter<(Response,)> {
    let list = warp::path!("users")
        .and(warp::get())
        .and(with_auth(db.clone()))
        .and(with_db(db.clone()))
        .and_then(handlers_user::list_users);

    let doctors = warp::path!("users" / "doctors")
        .and(warp::get())
        .and(with_auth(db.clone()))
        .and(with_db(db.clone()))
        .and_then(handlers_user::list_doctors);

    let profile = warp::path!("users" / "profile")
        .and(warp::get())
        .and(with_auth(db.clone()))
        .and(with_db(db.clone()))
        .and_then(handlers_user::get_profile);

    let update_profile = warp::path!("users" / "profile")
        .and(warp::put())
        .and(with_auth(db.clone()))
        .and(with_db(db.clone()))
        .and(json_body())
        .and_then(handlers_user::update_profile);

    let availability = warp::path!("users" / "availability")
        .and(warp::put())
        .and(with_auth(db.clone()))
        .and(with_db(db.clone()))
        .and(json_body())
        .and_then(handlers_user::set_availability);

    let add_doctor = warp::path!("doctors")
        .and(warp::post())
        .and(with_auth(db.clone()))
        .and(with_db(db.clone()))
        .and(json_body())
        .and_then(handlers_user::add_doctor);

    list.or(doctors)
        .unify()
        .or(profile)
        .unify()
        .or(update_profile)
        .unify()
        .or(availability)
        .unify()
        .or(add_doctor)
        .unify()
        .boxed()
}

fn visit_routes(db: &ClinicDatabase) -> BoxedFilter<(Response,)> {
    let create = warp::path!("visits")
        .and(warp::post())
        .and(with_auth(db.clone()))
        .and(with_db(db.clone()))
        .and(json_body())
        .and_then(handlers_visit::create_visit);

    let list = warp::path!("visits")
        .and(warp::get())
        .and(with_auth(db.clone()))
        .and(with_db(db.clone()))
        .and(warp::query::<VisitQuery>())
        .and_then(handlers_visit::list_visits);

    let get = warp::path!("visits" / String)
        .and(warp::get())
        .and(with_auth(db.clone()))
        .and(with_db(db.clone()))
        .and_then(handlers_visit::get_visit);

    let start = warp::path!("visits" / String / "start")
        .and(warp::put())
        .and(with_auth(db.clone()))
        .and(with_db(db.clone()))
        .and_then(handlers_visit::start_visit);

    let medical = warp::path!("visits" / String / "medical")
        .and(warp::put())
        .and(with_auth(db.clone()))
        .and(with_db(db.clone()))
        .and(json_body())
        .and_then(handlers_visit::update_medical);

    let complete = warp::path!("visits" / String / "complete")
        .and(warp::put())
        .and(with_auth(db.clone()))
        .and(with_db(db.clone()))
        .and_then(handlers_visit::complete_visit);

    let cancel = warp::path!("visits" / String / "cancel")
        .and(warp::put())
        .and(with_auth(db.clone()))
        .and(with_db(db.clone()))
        .and_then(handlers_visit::cancel_visit);

    let payment = warp::path!("visits" / String / "payment")
        .and(warp::put())
        .and(with_auth(db.clone()))
        .and(with_db(db.clone()))
        .and(json_body())
        .and_then(handlers_visit::set_payment);

    create
        .or(list)
        .unify()
        .or(get)
        .unify()
        .or(start)
        .unify()
        .or(medical)
        .unify()
        .or(complete)
        .unify()
        .or(cancel)
        .unify()
        .or(payment)
        .unify()
        .boxed()
}

fn stats_routes(db: &ClinicDatabase) -> BoxedFilter<(Response,)> {
    warp::path!("doctors" / "stats")
        .and(warp::get())
        .and(with_auth(db.clone()))
        .and(with_db(db.clone()))
        .and_then(handlers_stats::get_stats)
        .boxed()
}

fn health_route(db: &ClinicDatabase) -> BoxedFilter<(Response,)> {
    warp::path!("health")
        .and(warp::get())
        .and(with_db(db.clone()))
        .map(|db: ClinicDatabase| {
            reply_json(
                &json!({
                    "status": "OK",
                    "message": "Clinic service is running",
                    "timestamp": Utc::now().to_rfc3339(),
                    "storage": db.storage_type(),
                }),
                StatusCode::OK,
            )
        })
        .boxed()
}

/// The full route tree with request logging and error mapping.
pub fn routes(db: ClinicDatabase) -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone {
    health_route(&db)
        .or(auth_routes(&db))
        .unify()
        .or(user_routes(&db))
        .unify()
        .or(visit_routes(&db))
        .unify()
        .or(stats_routes(&db))
        .unify()
        .recover(handle_rejection)
        .unify()
        .with(warp::log("clinic_server::api"))
}
