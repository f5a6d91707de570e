use thiserror::Error;

/// Input rejected before any store call is made.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("Task text cannot be empty")]
    EmptyText,
    #[error("Unknown apartment '{0}'")]
    UnknownApartment(String),
    #[error("'{0}' is not a household member")]
    UnknownMember(String),
    #[error("Amount must be a non-negative number, got {0}")]
    InvalidAmount(f64),
    #[error("Description cannot be empty")]
    EmptyDescription,
    #[error("{actor} cannot manage records owned by {owner}")]
    NotPermitted { actor: String, owner: String },
}

/// Whether `err` is a rejected input rather than a store or IO failure.
pub fn is_validation(err: &anyhow::Error) -> bool {
    err.downcast_ref::<ValidationError>().is_some()
}
