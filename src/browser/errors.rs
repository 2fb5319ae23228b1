//! Browser session error types

use thiserror::Error;

/// Errors raised by the browser session layer
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Failed to launch browser session: {0}")]
    LaunchFailed(String),

    #[error("Navigation failed: {0}")]
    NavigationFailed(String),

    #[error("Element not found: {0}")]
    ElementNotFound(String),

    #[error("WebDriver error: {0}")]
    WebDriver(#[from] thirtyfour::error::WebDriverError),
}

impl From<SessionError> for String {
    fn from(err: SessionError) -> String {
        err.to_string()
    }
}
