use super::{
    users::{find_taken_field, unique_conflict, Unique, UserResponse},
    validation,
};
use crate::{
    auth::{self, AuthKeys, TOKEN_LIFETIME},
    codes::{Affiliation, DevLevel, Field},
    error::{AppError, AppResult},
    models::User,
    schema::*,
    DbPool,
};
use axum::{http::StatusCode, routing::post, Extension, Json, Router};
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignupRequest {
    pub username: String,
    pub nickname: String,
    pub email: String,
    pub password: String,
    pub password_confirm: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub interest_field: Field,
    #[serde(default)]
    pub affiliation: Affiliation,
    #[serde(default)]
    pub dev_level: DevLevel,
}

#[derive(Deserialize)]
struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AuthorizedResponse {
    pub token: String,
    pub user: UserResponse,
}

impl AuthorizedResponse {
    fn from_user(keys: &AuthKeys, user: User) -> anyhow::Result<AuthorizedResponse> {
        Ok(AuthorizedResponse {
            token: keys.generate_jwt(&user, TOKEN_LIFETIME)?,
            user: UserResponse::from(user),
        })
    }
}

async fn signup(
    Extension(pool): Extension<DbPool>,
    Extension(keys): Extension<Arc<AuthKeys>>,
    Json(req): Json<SignupRequest>,
) -> AppResult<Json<AuthorizedResponse>> {
    #[derive(Insertable)]
    #[diesel(table_name = users)]
    struct NewUser {
        username: String,
        nickname: String,
        email: String,
        password_hash: String,
        phone: Option<String>,
        address: Option<String>,
        interest_field: Field,
        affiliation: Affiliation,
        dev_level: DevLevel,
    }

    let username = validation::required_text("username", &req.username, 150)?;
    let nickname = validation::required_text("nickname", &req.nickname, 50)?;
    let email = validation::normalize_email(&req.email)?;
    validation::validate_password(&req.password, &req.password_confirm)?;
    let phone = validation::optional_text("phone", req.phone.as_deref(), 20)?;
    let address = validation::optional_text("address", req.address.as_deref(), 255)?;

    let conn = &mut pool.get().await?;

    let candidates = [
        Unique::Username(&username),
        Unique::Nickname(&nickname),
        Unique::Email(&email),
    ];
    if let Some(field) = find_taken_field(conn, None, &candidates).await? {
        return Err(AppError::from(
            StatusCode::CONFLICT,
            format!("{field} has been taken"),
        ));
    }

    let new_user = diesel::insert_into(users::table)
        .values(NewUser {
            username,
            nickname,
            email,
            password_hash: auth::hash_password(req.password)?,
            phone,
            address,
            interest_field: req.interest_field,
            affiliation: req.affiliation,
            dev_level: req.dev_level,
        })
        .get_result::<User>(conn)
        .await
        .map_err(unique_conflict)?;

    tracing::info!(user_id = new_user.id, "user signed up");
    Ok(Json(AuthorizedResponse::from_user(&keys, new_user)?))
}

async fn login(
    Extension(pool): Extension<DbPool>,
    Extension(keys): Extension<Arc<AuthKeys>>,
    Json(req): Json<LoginRequest>,
) -> AppResult<Json<AuthorizedResponse>> {
    let conn = &mut pool.get().await?;

    if let Some(user) = users::table
        .filter(users::username.eq(req.username))
        .first::<User>(conn)
        .await
        .optional()?
    {
        if user.is_active && auth::verify_password(req.password, &user.password_hash)? {
            return Ok(Json(AuthorizedResponse::from_user(&keys, user)?));
        }
    }
    Err(AppError::from(
        StatusCode::UNAUTHORIZED,
        "invalid username or password",
    ))
}

pub fn app() -> Router {
    Router::new()
        .route("/signup", post(signup))
        .route("/login", post(login))
}
