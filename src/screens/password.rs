use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use crate::remote::AuthSession;

pub const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PasswordError {
  #[error("Password must be at least {} characters", MIN_PASSWORD_LEN)]
  TooShort,
  #[error("Passwords do not match")]
  Mismatch,
  /// Message reported by the auth service
  #[error("{0}")]
  Remote(String),
}

/// Check a new password and its confirmation, reporting the first failing rule.
pub fn validate(password: &str, confirm: &str) -> Result<(), PasswordError> {
  if password.chars().count() < MIN_PASSWORD_LEN {
    return Err(PasswordError::TooShort);
  }
  if password != confirm {
    return Err(PasswordError::Mismatch);
  }
  Ok(())
}

/// Sets a new password for the signed-in user.
#[derive(Clone)]
pub struct PasswordReset {
  auth: Arc<dyn AuthSession>,
}

impl PasswordReset {
  pub fn new(auth: Arc<dyn AuthSession>) -> Self {
    Self { auth }
  }

  /// Validate locally, then update the password. Nothing is sent when
  /// validation fails.
  pub async fn submit(&self, password: &str, confirm: &str) -> Result<(), PasswordError> {
    validate(password, confirm)?;
    info!("Updating password");
    self
      .auth
      .update_password(password)
      .await
      .map_err(|e| PasswordError::Remote(e.to_string()))
  }
}
