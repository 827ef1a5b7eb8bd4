use std::any::Any;

use thiserror::Error;

pub type RenderResult<T> = Result<T, RenderError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderError {
    /// Raised by a component's own render.
    #[error("{message}")]
    Failed { message: String },
    #[error("maximum update depth exceeded while rendering {component}")]
    UpdateDepthExceeded { component: String },
}

impl RenderError {
    pub fn new(message: impl Into<String>) -> Self {
        RenderError::Failed {
            message: message.into(),
        }
    }
}

/// Best-effort text of a panic payload.
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "Unknown panic".to_string()
    }
}
