use super::validation;
use crate::{
    auth::AuthUser,
    codes::{Affiliation, DevLevel, Field},
    error::{AppError, AppResult},
    models::User,
    schema::*,
    DbPool,
};
use axum::{http::StatusCode, routing::get, Extension, Json, Router};
use chrono::{DateTime, Utc};
use diesel::{prelude::*, result::DatabaseErrorKind};
use diesel_async::{pg::AsyncPgConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct UserResponse {
    id: i32,
    username: String,
    nickname: String,
    email: String,
    phone: Option<String>,
    address: Option<String>,
    interest_field: Field,
    affiliation: Affiliation,
    dev_level: DevLevel,
    is_staff: bool,
    date_joined: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            nickname: user.nickname,
            email: user.email,
            phone: user.phone,
            address: user.address,
            interest_field: user.interest_field,
            affiliation: user.affiliation,
            dev_level: user.dev_level,
            is_staff: user.is_staff,
            date_joined: user.date_joined,
        }
    }
}

/// A value that must be unique across all accounts.
#[derive(Clone, Copy)]
pub(crate) enum Unique<'a> {
    Username(&'a str),
    Nickname(&'a str),
    Email(&'a str),
}

impl Unique<'_> {
    fn field(self) -> &'static str {
        match self {
            Unique::Username(_) => "username",
            Unique::Nickname(_) => "nickname",
            Unique::Email(_) => "email",
        }
    }
}

/// Returns the first field already used by an account other than `exclude_id`.
pub(crate) async fn find_taken_field(
    conn: &mut AsyncPgConnection,
    exclude_id: Option<i32>,
    candidates: &[Unique<'_>],
) -> AppResult<Option<&'static str>> {
    for candidate in candidates {
        let query = users::table.select(users::id).into_boxed();
        let query = match *candidate {
            Unique::Username(value) => query.filter(users::username.eq(value)),
            Unique::Nickname(value) => query.filter(users::nickname.eq(value)),
            Unique::Email(value) => query.filter(users::email.eq(value)),
        };
        let owners = query.load::<i32>(conn).await?;
        if owners.into_iter().any(|id| Some(id) != exclude_id) {
            return Ok(Some(candidate.field()));
        }
    }
    Ok(None)
}

/// Turns a unique index hit into a 409. The lookup in [`find_taken_field`] can
/// race a concurrent write.
pub(crate) fn unique_conflict(err: diesel::result::Error) -> AppError {
    match err {
        diesel::result::Error::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
            AppError::from(StatusCode::CONFLICT, "account details have been taken")
        }
        err => err.into(),
    }
}

pub(crate) async fn load_user(conn: &mut AsyncPgConnection, user_id: i32) -> AppResult<User> {
    users::table
        .find(user_id)
        .first::<User>(conn)
        .await
        .optional()?
        .ok_or_else(|| AppError::not_found("user"))
}

async fn me(Extension(pool): Extension<DbPool>, auth: AuthUser) -> AppResult<Json<UserResponse>> {
    let conn = &mut pool.get().await?;
    Ok(Json(load_user(conn, auth.user_id).await?.into()))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProfileRequest {
    nickname: Option<String>,
    email: Option<String>,
    phone: Option<String>,
    address: Option<String>,
    interest_field: Option<Field>,
    affiliation: Option<Affiliation>,
    dev_level: Option<DevLevel>,
}

#[derive(AsChangeset)]
#[diesel(table_name = users)]
struct ProfileEdit {
    nickname: Option<String>,
    email: Option<String>,
    phone: Option<Option<String>>,
    address: Option<Option<String>>,
    interest_field: Option<Field>,
    affiliation: Option<Affiliation>,
    dev_level: Option<DevLevel>,
}

impl ProfileEdit {
    fn is_empty(&self) -> bool {
        self.nickname.is_none()
            && self.email.is_none()
            && self.phone.is_none()
            && self.address.is_none()
            && self.interest_field.is_none()
            && self.affiliation.is_none()
            && self.dev_level.is_none()
    }
}

/// `None` leaves the column alone, an empty string clears it.
fn nullable_text(
    field: &'static str,
    value: Option<&str>,
    max_chars: usize,
) -> AppResult<Option<Option<String>>> {
    value
        .map(|text| validation::optional_text(field, Some(text), max_chars))
        .transpose()
}

async fn edit_profile(
    Extension(pool): Extension<DbPool>,
    auth: AuthUser,
    Json(req): Json<ProfileRequest>,
) -> AppResult<Json<UserResponse>> {
    let edit = ProfileEdit {
        nickname: req
            .nickname
            .as_deref()
            .map(|nickname| validation::required_text("nickname", nickname, 50))
            .transpose()?,
        email: req
            .email
            .as_deref()
            .map(validation::normalize_email)
            .transpose()?,
        phone: nullable_text("phone", req.phone.as_deref(), 20)?,
        address: nullable_text("address", req.address.as_deref(), 255)?,
        interest_field: req.interest_field,
        affiliation: req.affiliation,
        dev_level: req.dev_level,
    };

    let conn = &mut pool.get().await?;

    if edit.is_empty() {
        return Ok(Json(load_user(conn, auth.user_id).await?.into()));
    }

    let mut candidates = Vec::new();
    if let Some(nickname) = &edit.nickname {
        candidates.push(Unique::Nickname(nickname));
    }
    if let Some(email) = &edit.email {
        candidates.push(Unique::Email(email));
    }
    if let Some(field) = find_taken_field(conn, Some(auth.user_id), &candidates).await? {
        return Err(AppError::from(
            StatusCode::CONFLICT,
            format!("{field} has been taken"),
        ));
    }

    let user = diesel::update(users::table.find(auth.user_id))
        .set(edit)
        .get_result::<User>(conn)
        .await
        .optional()
        .map_err(unique_conflict)?
        .ok_or_else(|| AppError::not_found("user"))?;

    tracing::info!(user_id = user.id, "profile updated");
    Ok(Json(user.into()))
}

pub fn app() -> Router {
    Router::new().route("/me", get(me).put(edit_profile))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::response::IntoResponse;

    #[test]
    fn unique_index_hits_are_conflicts() {
        let err = diesel::result::Error::DatabaseError(
            DatabaseErrorKind::UniqueViolation,
            Box::new("duplicate key value violates unique constraint".to_string()),
        );
        assert_eq!(
            unique_conflict(err).into_response().status(),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn other_database_errors_stay_internal() {
        assert_eq!(
            unique_conflict(diesel::result::Error::NotFound)
                .into_response()
                .status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn empty_profile_edits_are_detected() {
        let edit = ProfileEdit {
            nickname: None,
            email: None,
            phone: None,
            address: None,
            interest_field: None,
            affiliation: None,
            dev_level: None,
        };
        assert!(edit.is_empty());
        assert!(!ProfileEdit {
            phone: Some(None),
            ..edit
        }
        .is_empty());
    }
}
