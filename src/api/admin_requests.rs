use super::{users::load_user, validation};
use crate::{
    auth::{AuthUser, StaffOnly},
    codes::{CodeSet, RequestStatus, RequestType},
    email::{notify_admins, Notifier},
    error::{AppError, AppResult},
    models::AdminRequest,
    requests::{self, RequestError},
    schema::*,
    DbPool,
};
use axum::{
    extract::{Path, Query},
    http::StatusCode,
    routing::{delete, get, post, put},
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::{pg::AsyncPgConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const LIST_PATH: &str = "/api/admin-requests";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AdminRequestResponse {
    id: i32,
    requester_id: i32,
    target_post_id: Option<i32>,
    request_type: RequestType,
    title: String,
    content: String,
    status: RequestStatus,
    reviewer_id: Option<i32>,
    review_comment: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<AdminRequest> for AdminRequestResponse {
    fn from(request: AdminRequest) -> Self {
        Self {
            id: request.id,
            requester_id: request.requester_id,
            target_post_id: request.target_post_id,
            request_type: request.request_type,
            title: request.title,
            content: request.content,
            status: request.status,
            reviewer_id: request.reviewer_id,
            review_comment: request.review_comment,
            created_at: request.created_at,
            updated_at: request.updated_at,
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AdminRequestForm {
    request_type: RequestType,
    title: String,
    content: String,
    #[serde(default)]
    target_post_id: Option<i32>,
}

#[derive(Insertable, AsChangeset)]
#[diesel(table_name = admin_requests)]
#[diesel(treat_none_as_null = true)]
struct RequestFields {
    request_type: RequestType,
    title: String,
    content: String,
    target_post_id: Option<i32>,
}

impl AdminRequestForm {
    fn validate(&self) -> AppResult<RequestFields> {
        requests::validate_target(self.request_type, self.target_post_id)
            .map_err(AppError::invalid)?;

        Ok(RequestFields {
            request_type: self.request_type,
            title: validation::required_text("title", &self.title, 255)?,
            content: validation::required_text("content", &self.content, 10_000)?,
            target_post_id: self.target_post_id,
        })
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReviewForm {
    status: RequestStatus,
    #[serde(default)]
    review_comment: String,
}

#[derive(Deserialize)]
struct ListParams {
    status: Option<String>,
    #[serde(rename = "type")]
    request_type: Option<String>,
}

async fn ensure_target_exists(
    conn: &mut AsyncPgConnection,
    target_post_id: Option<i32>,
) -> AppResult<()> {
    let Some(post_id) = target_post_id else {
        return Ok(());
    };

    posts::table
        .find(post_id)
        .select(posts::id)
        .first::<i32>(conn)
        .await
        .optional()?
        .map(|_| ())
        .ok_or_else(|| AppError::validation("target_post", "the target post does not exist"))
}

async fn load_request(conn: &mut AsyncPgConnection, request_id: i32) -> AppResult<AdminRequest> {
    admin_requests::table
        .find(request_id)
        .first::<AdminRequest>(conn)
        .await
        .optional()?
        .ok_or_else(|| AppError::not_found("request"))
}

/// Loads a request the caller must be allowed to see; everyone else is sent
/// back to their own list.
async fn load_visible_request(
    conn: &mut AsyncPgConnection,
    auth: &AuthUser,
    request_id: i32,
) -> AppResult<AdminRequest> {
    let request = load_request(conn, request_id).await?;
    if !(auth.is_staff || auth.owns(request.requester_id)) {
        tracing::debug!(request_id, user_id = auth.user_id, "non-owner redirected");
        return Err(AppError::redirect(LIST_PATH));
    }
    Ok(request)
}

async fn list(
    Extension(pool): Extension<DbPool>,
    auth: AuthUser,
    Query(params): Query<ListParams>,
) -> AppResult<Json<Vec<AdminRequestResponse>>> {
    let mut query = admin_requests::table
        .order(admin_requests::created_at.desc())
        .into_boxed();

    if !auth.is_staff {
        query = query.filter(admin_requests::requester_id.eq(auth.user_id));
    }
    let statuses = params
        .status
        .as_deref()
        .map(CodeSet::<RequestStatus>::parse_lenient)
        .unwrap_or_default();
    if !statuses.is_empty() {
        query = query.filter(admin_requests::status.eq_any(statuses.to_vec()));
    }
    let types = params
        .request_type
        .as_deref()
        .map(CodeSet::<RequestType>::parse_lenient)
        .unwrap_or_default();
    if !types.is_empty() {
        query = query.filter(admin_requests::request_type.eq_any(types.to_vec()));
    }

    let conn = &mut pool.get().await?;
    let requests = query.load::<AdminRequest>(conn).await?;
    Ok(Json(requests.into_iter().map(Into::into).collect()))
}

async fn detail(
    Extension(pool): Extension<DbPool>,
    Path(request_id): Path<i32>,
    auth: AuthUser,
) -> AppResult<Json<AdminRequestResponse>> {
    let conn = &mut pool.get().await?;
    Ok(Json(load_visible_request(conn, &auth, request_id).await?.into()))
}

async fn create(
    Extension(pool): Extension<DbPool>,
    Extension(notifier): Extension<Arc<dyn Notifier>>,
    auth: AuthUser,
    Json(form): Json<AdminRequestForm>,
) -> AppResult<Json<AdminRequestResponse>> {
    #[derive(Insertable)]
    #[diesel(table_name = admin_requests)]
    struct NewAdminRequest {
        requester_id: i32,
        #[diesel(embed)]
        fields: RequestFields,
    }

    let fields = form.validate()?;

    let conn = &mut pool.get().await?;
    let requester = load_user(conn, auth.user_id).await?;
    ensure_target_exists(conn, fields.target_post_id).await?;

    let request = diesel::insert_into(admin_requests::table)
        .values(NewAdminRequest {
            requester_id: requester.id,
            fields,
        })
        .get_result::<AdminRequest>(conn)
        .await?;

    tracing::info!(
        request_id = request.id,
        requester_id = requester.id,
        request_type = %request.request_type,
        "admin request created"
    );
    notify_admins(notifier.as_ref(), &request, &requester).await;

    Ok(Json(request.into()))
}

async fn edit(
    Extension(pool): Extension<DbPool>,
    Path(request_id): Path<i32>,
    auth: AuthUser,
    Json(form): Json<AdminRequestForm>,
) -> AppResult<Json<AdminRequestResponse>> {
    let conn = &mut pool.get().await?;
    let current = load_request(conn, request_id).await?;
    if !auth.owns(current.requester_id) {
        return Err(AppError::redirect(LIST_PATH));
    }
    current.status.ensure_editable().map_err(AppError::invalid)?;
    let fields = form.validate()?;
    ensure_target_exists(conn, fields.target_post_id).await?;

    let request = diesel::update(
        admin_requests::table
            .find(request_id)
            .filter(admin_requests::status.eq(RequestStatus::Processing)),
    )
    .set(fields)
    .get_result::<AdminRequest>(conn)
    .await
    .optional()?
    .ok_or_else(|| AppError::invalid(RequestError::AlreadyReviewed))?;

    Ok(Json(request.into()))
}

async fn remove(
    Extension(pool): Extension<DbPool>,
    Path(request_id): Path<i32>,
    auth: AuthUser,
) -> AppResult<Json<()>> {
    let conn = &mut pool.get().await?;
    load_visible_request(conn, &auth, request_id).await?;

    diesel::delete(admin_requests::table.find(request_id))
        .execute(conn)
        .await?;

    tracing::info!(request_id, user_id = auth.user_id, "admin request deleted");
    Ok(Json(()))
}

async fn review(
    Extension(pool): Extension<DbPool>,
    Path(request_id): Path<i32>,
    StaffOnly(staff): StaffOnly,
    Json(form): Json<ReviewForm>,
) -> AppResult<Json<AdminRequestResponse>> {
    // a review can only ever land on a processing request
    RequestStatus::Processing
        .transition(form.status)
        .map_err(AppError::invalid)?;

    let conn = &mut pool.get().await?;
    let current = load_request(conn, request_id).await?;
    current.status.ensure_editable().map_err(AppError::invalid)?;
    let next = current
        .status
        .transition(form.status)
        .map_err(AppError::invalid)?;

    let request = diesel::update(
        admin_requests::table
            .find(request_id)
            .filter(admin_requests::status.eq(current.status)),
    )
    .set((
        admin_requests::status.eq(next),
        admin_requests::reviewer_id.eq(Some(staff.user_id)),
        admin_requests::review_comment.eq(form.review_comment.trim()),
    ))
    .get_result::<AdminRequest>(conn)
    .await
    .optional()?
    .ok_or_else(|| {
        AppError::from(
            StatusCode::CONFLICT,
            "the request was reviewed by someone else",
        )
    })?;

    tracing::info!(
        request_id,
        reviewer_id = staff.user_id,
        status = %request.status,
        "admin request reviewed"
    );
    Ok(Json(request.into()))
}

pub fn app() -> Router {
    Router::new()
        .route("/", get(list))
        .route("/detail/:request_id", get(detail))
        .route("/create", post(create))
        .route("/edit/:request_id", put(edit))
        .route("/delete/:request_id", delete(remove))
        .route("/review/:request_id", post(review))
}
