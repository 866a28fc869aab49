//! Admin request rules: which requests may name a target post, and how a
//! request moves through review.

use crate::{
    codes::{RequestStatus, RequestType},
    error::FieldError,
};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RequestError {
    #[error("an update request must name the post to update")]
    MissingTarget,
    #[error("a create request cannot name a target post")]
    UnexpectedTarget,
    #[error("a request cannot move from {from} to {to}")]
    InvalidTransition {
        from: RequestStatus,
        to: RequestStatus,
    },
    #[error("a request can only be changed while it is processing")]
    AlreadyReviewed,
}

impl FieldError for RequestError {
    fn field(&self) -> &'static str {
        match self {
            RequestError::MissingTarget | RequestError::UnexpectedTarget => "target_post",
            RequestError::InvalidTransition { .. } | RequestError::AlreadyReviewed => "status",
        }
    }
}

pub fn validate_target(
    request_type: RequestType,
    target_post_id: Option<i32>,
) -> Result<(), RequestError> {
    match (request_type, target_post_id) {
        (RequestType::Update, None) => Err(RequestError::MissingTarget),
        (RequestType::Create, Some(_)) => Err(RequestError::UnexpectedTarget),
        _ => Ok(()),
    }
}

impl RequestStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, RequestStatus::Processing)
    }

    pub fn can_transition_to(self, next: RequestStatus) -> bool {
        matches!(
            (self, next),
            (
                RequestStatus::Processing,
                RequestStatus::Done | RequestStatus::Rejected
            )
        )
    }

    pub fn transition(self, next: RequestStatus) -> Result<RequestStatus, RequestError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(RequestError::InvalidTransition {
                from: self,
                to: next,
            })
        }
    }

    /// Owners may only rework a request nobody has reviewed yet.
    pub fn ensure_editable(self) -> Result<(), RequestError> {
        if self.is_terminal() {
            Err(RequestError::AlreadyReviewed)
        } else {
            Ok(())
        }
    }
}
