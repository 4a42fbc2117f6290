use rocket::Route;

mod admin;
pub mod auth;
mod candidates;
mod common;
mod positions;
mod public;
mod registry;
mod voters;
mod voting;

pub fn routes() -> Vec<Route> {
    let mut routes = Vec::new();
    routes.extend(admin::routes());
    routes.extend(public::routes());
    routes.extend(auth::routes());
    routes.extend(voting::routes());
    routes.extend(candidates::routes());
    routes.extend(positions::routes());
    routes.extend(voters::routes());
    routes.extend(registry::routes());
    routes
}
