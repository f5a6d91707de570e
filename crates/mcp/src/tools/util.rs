use std::sync::Arc;

use anyhow::{anyhow, Result};
use housekeep_core::error::is_validation;
use housekeep_core::household::{Session, SessionError};
use housekeep_core::services::TasksService;

pub async fn with_service<T, F>(service: Arc<TasksService>, f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce(&TasksService) -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(move || f(service.as_ref()))
        .await
        .map_err(|err| anyhow!("blocking task failed: {}", err))?
}

/// Acting session for a tool call: the member with `email`, else the first admin.
pub fn session_for(service: &TasksService, email: Option<&str>) -> Result<Session> {
    let uid = format!("mcp:{}", email.unwrap_or("default"));
    Ok(service
        .household()
        .session_or_first_admin(&uid, email)?)
}

pub fn validation_error(err: impl std::fmt::Display) -> pmcp::Error {
    pmcp::Error::validation(err.to_string())
}

pub fn internal_error(err: impl Into<anyhow::Error>) -> pmcp::Error {
    pmcp::Error::internal(err.into().to_string())
}

/// Rejected input maps to a validation error, anything else to an internal one.
pub fn service_error(err: anyhow::Error) -> pmcp::Error {
    if is_validation(&err) || err.downcast_ref::<SessionError>().is_some() {
        validation_error(err)
    } else {
        internal_error(err)
    }
}

#[cfg(test)]
pub(crate) fn test_service() -> (Arc<TasksService>, tempfile::TempDir) {
    use housekeep_core::config::AppConfig;

    let dir = tempfile::TempDir::new().expect("temp dir");
    let config = AppConfig::from_data_dir(dir.path().to_path_buf()).expect("config");
    let service = TasksService::new(&config).expect("service");
    (Arc::new(service), dir)
}

#[cfg(test)]
pub(crate) fn test_extra() -> pmcp::RequestHandlerExtra {
    pmcp::RequestHandlerExtra::new(
        "test-request".to_string(),
        tokio_util::sync::CancellationToken::new(),
    )
}

#[cfg(test)]
pub(crate) fn seed_task(service: &TasksService, email: &str, text: &str) -> String {
    use housekeep_core::capture::TaskInput;

    let session = session_for(service, Some(email)).expect("session");
    service
        .capture(&session, TaskInput::from_text(text))
        .expect("capture")
        .id
}
