use super::{
    posts::{load_posts, PostResponse},
    users::load_user,
};
use crate::{
    auth::AuthUser,
    codes::{ActivityType, CodeSet, Field, Month},
    error::AppResult,
    filter::{PostFilter, ProfileMatch},
    DbPool,
};
use axum::{extract::Query, routing::get, Extension, Json, Router};
use chrono::Datelike;
use serde::{Deserialize, Serialize};

#[derive(Deserialize)]
struct HomeParams {
    activity_type: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HomeResponse {
    nickname: Option<String>,
    recommended_posts: Vec<PostResponse>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RecommendResponse {
    user_interest: Option<Field>,
    recommended_posts: Vec<PostResponse>,
}

fn current_month() -> AppResult<Month> {
    let month = chrono::Local::now().month();
    Ok(Month::from_number(month)
        .ok_or_else(|| anyhow::anyhow!("month {month} is out of range"))?)
}

async fn home(
    Extension(pool): Extension<DbPool>,
    viewer: Option<AuthUser>,
    Query(params): Query<HomeParams>,
) -> AppResult<Json<HomeResponse>> {
    let Some(viewer) = viewer else {
        return Ok(Json(HomeResponse {
            nickname: None,
            recommended_posts: Vec::new(),
        }));
    };

    let conn = &mut pool.get().await?;
    let user = load_user(conn, viewer.user_id).await?;
    let month = current_month()?;

    let mut filter = PostFilter::default().with_profile(ProfileMatch::recommend(&user, month));
    if let Some(raw) = params.activity_type.as_deref() {
        filter.activity_types = CodeSet::<ActivityType>::parse_lenient(raw);
    }

    tracing::debug!(
        user_id = user.id,
        interest = %user.interest_field,
        affiliation = %user.affiliation,
        level = %user.dev_level,
        month = %month,
        "building recommendations"
    );

    let recommended_posts = load_posts(conn, &filter).await?;
    Ok(Json(HomeResponse {
        nickname: Some(user.nickname),
        recommended_posts,
    }))
}

async fn recommend(
    Extension(pool): Extension<DbPool>,
    viewer: Option<AuthUser>,
) -> AppResult<Json<RecommendResponse>> {
    let Some(viewer) = viewer else {
        return Ok(Json(RecommendResponse {
            user_interest: None,
            recommended_posts: Vec::new(),
        }));
    };

    let conn = &mut pool.get().await?;
    let user = load_user(conn, viewer.user_id).await?;

    let filter = PostFilter::default().with_profile(ProfileMatch::interest_only(&user));
    let recommended_posts = load_posts(conn, &filter).await?;
    Ok(Json(RecommendResponse {
        user_interest: Some(user.interest_field),
        recommended_posts,
    }))
}

pub fn app() -> Router {
    Router::new()
        .route("/", get(home))
        .route("/recommend", get(recommend))
}
