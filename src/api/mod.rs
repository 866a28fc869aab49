use axum::Router;

pub mod admin_requests;
pub mod auth;
pub mod home;
pub mod posts;
pub mod users;
pub mod validation;

pub fn app() -> Router {
    Router::new()
        .nest("/auth", auth::app())
        .nest("/users", users::app())
        .nest("/posts", posts::app())
        .nest("/main", home::app())
        .nest("/admin-requests", admin_requests::app())
}
