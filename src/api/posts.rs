use super::validation;
use crate::{
    auth::{AuthUser, StaffOnly},
    codes::{ActivityType, CodeSet, DevLevel, Eligibility, Field, Month},
    error::{AppError, AppResult},
    filter::{PostFilter, PostParams},
    models::{Post, PostReviewLink},
    schema::*,
    DbPool,
};
use axum::{
    extract::{Path, Query},
    routing::{delete, get, post, put},
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::{pg::AsyncPgConnection, AsyncConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ReviewLinkResponse {
    id: i32,
    review_title: String,
    review_url: String,
}

impl From<PostReviewLink> for ReviewLinkResponse {
    fn from(link: PostReviewLink) -> Self {
        Self {
            id: link.id,
            review_title: link.review_title,
            review_url: link.review_url,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PostResponse {
    id: i32,
    author_id: i32,
    club_name: String,
    description: String,
    activity_type: ActivityType,
    application_months: CodeSet<Month>,
    activity_months: CodeSet<Month>,
    eligibility: CodeSet<Eligibility>,
    recruitment_fields: CodeSet<Field>,
    required_dev_levels: CodeSet<DevLevel>,
    is_published: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    review_links: Vec<ReviewLinkResponse>,
}

impl PostResponse {
    fn from(post: Post, links: Vec<PostReviewLink>) -> Self {
        Self {
            id: post.id,
            author_id: post.author_id,
            club_name: post.club_name,
            description: post.description,
            activity_type: post.activity_type,
            application_months: post.application_months,
            activity_months: post.activity_months,
            eligibility: post.eligibility,
            recruitment_fields: post.recruitment_fields,
            required_dev_levels: post.required_dev_levels,
            is_published: post.is_published,
            created_at: post.created_at,
            updated_at: post.updated_at,
            review_links: links.into_iter().map(ReviewLinkResponse::from).collect(),
        }
    }
}

async fn attach_review_links(
    conn: &mut AsyncPgConnection,
    posts: Vec<Post>,
) -> AppResult<Vec<PostResponse>> {
    let links = PostReviewLink::belonging_to(&posts)
        .order(post_review_links::id.asc())
        .load::<PostReviewLink>(conn)
        .await?
        .grouped_by(&posts);

    Ok(posts
        .into_iter()
        .zip(links)
        .map(|(post, links)| PostResponse::from(post, links))
        .collect())
}

/// Runs a filter and returns the matching posts with their review links.
pub(crate) async fn load_posts(
    conn: &mut AsyncPgConnection,
    filter: &PostFilter,
) -> AppResult<Vec<PostResponse>> {
    let posts = filter.query().load::<Post>(conn).await?;
    attach_review_links(conn, posts).await
}

async fn load_post(conn: &mut AsyncPgConnection, post_id: i32) -> AppResult<Post> {
    posts::table
        .find(post_id)
        .first::<Post>(conn)
        .await
        .optional()?
        .ok_or_else(|| AppError::not_found("post"))
}

fn detail_path(post_id: i32) -> String {
    format!("/api/posts/detail/{post_id}")
}

/// Loads a post the caller is about to change. Anyone but the author is
/// sent back to the post's detail view.
async fn load_owned_post(
    conn: &mut AsyncPgConnection,
    auth: &AuthUser,
    post_id: i32,
) -> AppResult<Post> {
    let post = load_post(conn, post_id).await?;
    if !auth.owns(post.author_id) {
        tracing::debug!(post_id, user_id = auth.user_id, "non-owner redirected");
        return Err(AppError::redirect(detail_path(post_id)));
    }
    Ok(post)
}

async fn list(
    Extension(pool): Extension<DbPool>,
    Query(params): Query<PostParams>,
) -> AppResult<Json<Vec<PostResponse>>> {
    let conn = &mut pool.get().await?;
    let filter = PostFilter::from_params(&params);
    Ok(Json(load_posts(conn, &filter).await?))
}

async fn list_by_type(
    Extension(pool): Extension<DbPool>,
    Path(type_code): Path<String>,
    Query(params): Query<PostParams>,
) -> AppResult<Json<Vec<PostResponse>>> {
    let activity_type = type_code
        .to_uppercase()
        .parse::<ActivityType>()
        .map_err(|_| AppError::not_found("activity type"))?;

    let conn = &mut pool.get().await?;
    let filter = PostFilter::from_params(&params).with_activity_type(activity_type);
    Ok(Json(load_posts(conn, &filter).await?))
}

async fn detail(
    Extension(pool): Extension<DbPool>,
    Path(post_id): Path<i32>,
    viewer: Option<AuthUser>,
) -> AppResult<Json<PostResponse>> {
    let conn = &mut pool.get().await?;
    let post = load_post(conn, post_id).await?;

    let can_see_draft = viewer.map_or(false, |v| v.is_staff || v.owns(post.author_id));
    if !post.is_published && !can_see_draft {
        return Err(AppError::not_found("post"));
    }

    Ok(Json(attach_review_links(conn, vec![post]).await?.pop().ok_or_else(
        || anyhow::anyhow!("`attach_review_links` should return one post"),
    )?))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReviewLinkRequest {
    review_title: String,
    review_url: String,
}

#[derive(Insertable)]
#[diesel(table_name = post_review_links)]
struct NewReviewLink {
    post_id: i32,
    review_title: String,
    review_url: String,
}

impl ReviewLinkRequest {
    fn validate(&self, post_id: i32) -> AppResult<NewReviewLink> {
        Ok(NewReviewLink {
            post_id,
            review_title: validation::required_text("review_title", &self.review_title, 200)?,
            review_url: validation::validate_review_url(&self.review_url)?,
        })
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PostRequest {
    club_name: String,
    description: String,
    #[serde(default)]
    activity_type: ActivityType,
    #[serde(default)]
    application_months: CodeSet<Month>,
    #[serde(default)]
    activity_months: CodeSet<Month>,
    #[serde(default)]
    eligibility: CodeSet<Eligibility>,
    #[serde(default)]
    recruitment_fields: CodeSet<Field>,
    #[serde(default)]
    required_dev_levels: CodeSet<DevLevel>,
    #[serde(default)]
    is_published: bool,
    #[serde(default)]
    review_links: Vec<ReviewLinkRequest>,
}

#[derive(Insertable, AsChangeset)]
#[diesel(table_name = posts)]
struct PostChanges {
    club_name: String,
    description: String,
    activity_type: ActivityType,
    application_months: Vec<Month>,
    activity_months: Vec<Month>,
    eligibility: Vec<Eligibility>,
    recruitment_fields: Vec<Field>,
    required_dev_levels: Vec<DevLevel>,
    is_published: bool,
}

impl PostRequest {
    fn validate(&self) -> AppResult<PostChanges> {
        Ok(PostChanges {
            club_name: validation::required_text("club_name", &self.club_name, 100)?,
            description: validation::required_text("description", &self.description, 10_000)?,
            activity_type: self.activity_type,
            application_months: self.application_months.to_vec(),
            activity_months: self.activity_months.to_vec(),
            eligibility: self.eligibility.to_vec(),
            recruitment_fields: self.recruitment_fields.to_vec(),
            required_dev_levels: self.required_dev_levels.to_vec(),
            is_published: self.is_published,
        })
    }
}

async fn create(
    Extension(pool): Extension<DbPool>,
    StaffOnly(staff): StaffOnly,
    Json(req): Json<PostRequest>,
) -> AppResult<Json<PostResponse>> {
    #[derive(Insertable)]
    #[diesel(table_name = posts)]
    struct NewPost {
        author_id: i32,
        #[diesel(embed)]
        changes: PostChanges,
    }

    let changes = req.validate()?;
    let links = req
        .review_links
        .iter()
        .map(|link| link.validate(0))
        .collect::<AppResult<Vec<_>>>()?;

    let conn = &mut pool.get().await?;

    let post = conn
        .transaction::<_, AppError, _>(|conn| {
            Box::pin(async move {
                let post = diesel::insert_into(posts::table)
                    .values(NewPost {
                        author_id: staff.user_id,
                        changes,
                    })
                    .get_result::<Post>(conn)
                    .await?;

                if !links.is_empty() {
                    let links: Vec<NewReviewLink> = links
                        .into_iter()
                        .map(|link| NewReviewLink {
                            post_id: post.id,
                            ..link
                        })
                        .collect();
                    diesel::insert_into(post_review_links::table)
                        .values(links)
                        .execute(conn)
                        .await?;
                }
                Ok(post)
            })
        })
        .await?;

    tracing::info!(post_id = post.id, author_id = staff.user_id, "post created");
    Ok(Json(attach_review_links(conn, vec![post]).await?.pop().ok_or_else(
        || anyhow::anyhow!("`attach_review_links` should return one post"),
    )?))
}

async fn edit(
    Extension(pool): Extension<DbPool>,
    Path(post_id): Path<i32>,
    auth: AuthUser,
    Json(req): Json<PostRequest>,
) -> AppResult<Json<PostResponse>> {
    let conn = &mut pool.get().await?;
    load_owned_post(conn, &auth, post_id).await?;
    let changes = req.validate()?;

    let post = diesel::update(posts::table.find(post_id))
        .set(changes)
        .get_result::<Post>(conn)
        .await?;

    tracing::info!(post_id, "post updated");
    Ok(Json(attach_review_links(conn, vec![post]).await?.pop().ok_or_else(
        || anyhow::anyhow!("`attach_review_links` should return one post"),
    )?))
}

async fn remove(
    Extension(pool): Extension<DbPool>,
    Path(post_id): Path<i32>,
    auth: AuthUser,
) -> AppResult<Json<()>> {
    let conn = &mut pool.get().await?;
    load_owned_post(conn, &auth, post_id).await?;

    diesel::delete(posts::table.find(post_id))
        .execute(conn)
        .await?;

    tracing::info!(post_id, "post deleted");
    Ok(Json(()))
}

async fn add_review_link(
    Extension(pool): Extension<DbPool>,
    Path(post_id): Path<i32>,
    auth: AuthUser,
    Json(req): Json<ReviewLinkRequest>,
) -> AppResult<Json<ReviewLinkResponse>> {
    let conn = &mut pool.get().await?;
    load_owned_post(conn, &auth, post_id).await?;
    let new_link = req.validate(post_id)?;

    let link = diesel::insert_into(post_review_links::table)
        .values(new_link)
        .get_result::<PostReviewLink>(conn)
        .await?;

    Ok(Json(link.into()))
}

async fn remove_review_link(
    Extension(pool): Extension<DbPool>,
    Path((post_id, link_id)): Path<(i32, i32)>,
    auth: AuthUser,
) -> AppResult<Json<()>> {
    let conn = &mut pool.get().await?;
    load_owned_post(conn, &auth, post_id).await?;

    let deleted = diesel::delete(
        post_review_links::table
            .filter(post_review_links::id.eq(link_id))
            .filter(post_review_links::post_id.eq(post_id)),
    )
    .execute(conn)
    .await?;

    if deleted == 0 {
        return Err(AppError::not_found("review link"));
    }
    Ok(Json(()))
}

pub fn app() -> Router {
    Router::new()
        .route("/", get(list).post(create))
        .route("/type/:type_code", get(list_by_type))
        .route("/detail/:post_id", get(detail))
        .route("/edit/:post_id", put(edit))
        .route("/delete/:post_id", delete(remove))
        .route("/detail/:post_id/reviews", post(add_review_link))
        .route(
            "/detail/:post_id/reviews/:link_id",
            delete(remove_review_link),
        )
}
