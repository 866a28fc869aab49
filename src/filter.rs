//! Post filtering and recommendation.
//!
//! A [`PostFilter`] is one predicate over published posts. It can be compiled
//! into a boxed diesel query ([`PostFilter::query`]) or checked against a
//! loaded [`Post`] ([`PostFilter::matches`]); both read the same way:
//!
//! * every non-empty code group is an OR over its codes,
//! * the groups are ANDed together,
//! * in profile mode the viewer's interest, eligibility and level are ORed.
//!
//! Membership is always exact set membership, so `STUDENT` never matches a
//! post that only lists `STUDENT_CS` and `1월` never matches `11월`.

use crate::{
    codes::{
        ActivityType, Code, CodeSet, DevLevel, Eligibility, Field, Month, Quarter,
    },
    models::{Post, User},
    schema::posts,
};
use diesel::{pg::Pg, prelude::*};
use serde::Deserialize;

/// Raw listing parameters. Each value is a comma-packed code list or `ALL`.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct PostParams {
    pub field: Option<String>,
    pub quarter: Option<String>,
    pub eligibility: Option<String>,
    pub level: Option<String>,
    #[serde(rename = "type")]
    pub activity_type: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PostFilter {
    pub fields: CodeSet<Field>,
    pub application_months: CodeSet<Month>,
    pub eligibility: CodeSet<Eligibility>,
    pub levels: CodeSet<DevLevel>,
    pub activity_types: CodeSet<ActivityType>,
    pub profile: Option<ProfileMatch>,
}

/// What a viewer's stored profile contributes to a recommendation.
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileMatch {
    pub interest: Field,
    pub eligibility: CodeSet<Eligibility>,
    pub levels: CodeSet<DevLevel>,
    /// Only posts taking applications in this month qualify.
    pub month: Option<Month>,
}

impl ProfileMatch {
    /// Home page recommendation: open for applications in `month`, and
    /// matching the viewer's interest, affiliation or level.
    pub fn recommend(user: &User, month: Month) -> ProfileMatch {
        ProfileMatch {
            interest: user.interest_field,
            eligibility: user.affiliation.eligibility(),
            levels: [user.dev_level].into_iter().collect(),
            month: Some(month),
        }
    }

    /// Recommendation page: interest alone decides.
    pub fn interest_only(user: &User) -> ProfileMatch {
        ProfileMatch {
            interest: user.interest_field,
            eligibility: CodeSet::new(),
            levels: CodeSet::new(),
            month: None,
        }
    }

    fn matches(&self, post: &Post) -> bool {
        if let Some(month) = self.month {
            if !post.application_months.contains(month) {
                return false;
            }
        }

        post.recruitment_fields.contains(self.interest)
            || post.eligibility.intersects(&self.eligibility)
            || post.required_dev_levels.intersects(&self.levels)
    }
}

impl PostFilter {
    pub fn from_params(params: &PostParams) -> PostFilter {
        fn group<T: Code>(raw: &Option<String>) -> CodeSet<T> {
            raw.as_deref().map(CodeSet::parse_lenient).unwrap_or_default()
        }

        let quarters: CodeSet<Quarter> = group(&params.quarter);

        PostFilter {
            fields: group(&params.field),
            application_months: quarters.iter().flat_map(Quarter::months).collect(),
            eligibility: group(&params.eligibility),
            levels: group(&params.level),
            activity_types: group(&params.activity_type),
            profile: None,
        }
    }

    pub fn with_profile(mut self, profile: ProfileMatch) -> PostFilter {
        self.profile = Some(profile);
        self
    }

    pub fn with_activity_type(mut self, activity_type: ActivityType) -> PostFilter {
        self.activity_types = [activity_type].into_iter().collect();
        self
    }

    pub fn matches(&self, post: &Post) -> bool {
        fn group_matches<T: Code>(wanted: &CodeSet<T>, have: &CodeSet<T>) -> bool {
            wanted.is_empty() || wanted.intersects(have)
        }

        post.is_published
            && group_matches(&self.fields, &post.recruitment_fields)
            && group_matches(&self.application_months, &post.application_months)
            && group_matches(&self.eligibility, &post.eligibility)
            && group_matches(&self.levels, &post.required_dev_levels)
            && (self.activity_types.is_empty() || self.activity_types.contains(post.activity_type))
            && self.profile.as_ref().map_or(true, |profile| profile.matches(post))
    }

    /// Published posts satisfying the filter, newest first.
    pub fn query(&self) -> posts::BoxedQuery<'static, Pg> {
        let mut query = posts::table
            .filter(posts::is_published.eq(true))
            .order(posts::created_at.desc())
            .into_boxed();

        if !self.fields.is_empty() {
            query = query.filter(posts::recruitment_fields.overlaps_with(self.fields.to_vec()));
        }
        if !self.application_months.is_empty() {
            query = query.filter(
                posts::application_months.overlaps_with(self.application_months.to_vec()),
            );
        }
        if !self.eligibility.is_empty() {
            query = query.filter(posts::eligibility.overlaps_with(self.eligibility.to_vec()));
        }
        if !self.levels.is_empty() {
            query = query.filter(posts::required_dev_levels.overlaps_with(self.levels.to_vec()));
        }
        if !self.activity_types.is_empty() {
            query = query.filter(posts::activity_type.eq_any(self.activity_types.to_vec()));
        }

        if let Some(profile) = &self.profile {
            if let Some(month) = profile.month {
                query = query.filter(posts::application_months.contains(vec![month]));
            }
            query = query.filter(
                posts::recruitment_fields
                    .contains(vec![profile.interest])
                    .or(posts::eligibility.overlaps_with(profile.eligibility.to_vec()))
                    .or(posts::required_dev_levels.overlaps_with(profile.levels.to_vec())),
            );
        }

        query
    }
}
