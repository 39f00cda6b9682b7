use rocket::{http::Status, response::status::Custom, serde::json::Json, Catcher, Request, Route};

use crate::error::ErrorBody;

mod candidates;
mod public;
mod voters;
mod votes;

pub fn routes() -> Vec<Route> {
    let mut routes = Vec::new();
    routes.extend(voters::routes());
    routes.extend(candidates::routes());
    routes.extend(votes::routes());
    routes.extend(public::routes());
    routes
}

/// Report framework-level failures in the same JSON shape as handler errors.
pub fn catchers() -> Vec<Catcher> {
    catchers![bad_request, not_found, unprocessable, internal_error, default_catcher]
}

#[catch(400)]
fn bad_request(_req: &Request) -> Json<ErrorBody> {
    Json(ErrorBody::new("Malformed request body"))
}

#[catch(404)]
fn not_found(req: &Request) -> Json<ErrorBody> {
    Json(ErrorBody::new(format!("No resource at {}", req.uri())))
}

/// Bodies of the wrong shape are bad requests like any other invalid input.
#[catch(422)]
fn unprocessable(_req: &Request) -> Custom<Json<ErrorBody>> {
    Custom(
        Status::BadRequest,
        Json(ErrorBody::new("Request body has the wrong shape")),
    )
}

#[catch(500)]
fn internal_error(_req: &Request) -> Json<ErrorBody> {
    Json(ErrorBody::new("Internal server error"))
}

#[catch(default)]
fn default_catcher(status: Status, _req: &Request) -> Json<ErrorBody> {
    Json(ErrorBody::new(status.reason_lossy()))
}
