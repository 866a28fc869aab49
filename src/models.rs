use crate::{
    codes::{
        ActivityType, Affiliation, CodeSet, DevLevel, Eligibility, Month, RequestStatus,
        RequestType,
    },
    schema::*,
};
use chrono::{DateTime, Utc};
use diesel::prelude::*;

// `Queryable` brings diesel's own `Field` trait into scope, so the code enum
// is spelled out in full below.
#[derive(Debug, Clone, Queryable, Identifiable)]
pub struct User {
    pub id: i32,
    pub username: String,
    pub nickname: String,
    pub email: String,
    pub password_hash: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub interest_field: crate::codes::Field,
    pub affiliation: Affiliation,
    pub dev_level: DevLevel,
    pub is_active: bool,
    pub is_staff: bool,
    pub date_joined: DateTime<Utc>,
}

#[derive(Debug, Clone, Queryable, Identifiable)]
pub struct Post {
    pub id: i32,
    pub author_id: i32,
    pub club_name: String,
    pub description: String,
    pub activity_type: ActivityType,
    #[diesel(deserialize_as = Vec<Month>)]
    pub application_months: CodeSet<Month>,
    #[diesel(deserialize_as = Vec<Month>)]
    pub activity_months: CodeSet<Month>,
    #[diesel(deserialize_as = Vec<Eligibility>)]
    pub eligibility: CodeSet<Eligibility>,
    #[diesel(deserialize_as = Vec<crate::codes::Field>)]
    pub recruitment_fields: CodeSet<crate::codes::Field>,
    #[diesel(deserialize_as = Vec<DevLevel>)]
    pub required_dev_levels: CodeSet<DevLevel>,
    pub is_published: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(belongs_to(Post))]
pub struct PostReviewLink {
    pub id: i32,
    pub post_id: i32,
    pub review_title: String,
    pub review_url: String,
}

#[derive(Debug, Clone, Queryable, Identifiable)]
pub struct AdminRequest {
    pub id: i32,
    pub requester_id: i32,
    pub target_post_id: Option<i32>,
    pub request_type: RequestType,
    pub title: String,
    pub content: String,
    pub status: RequestStatus,
    pub reviewer_id: Option<i32>,
    pub review_comment: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
