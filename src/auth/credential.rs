//! Validated application identifier and the credential pair exchanged for access tokens.

// std
use std::{borrow::Borrow, ops::Deref};
// self
use crate::{_prelude::*, auth::ClientSecret, error::ConfigError};

const APP_ID_MAX_LEN: usize = 128;

/// Application identifier issued by the e-signature platform.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AppId(String);
impl AppId {
	/// Creates a new identifier after validation.
	pub fn new(value: impl AsRef<str>) -> Result<Self, AppIdError> {
		let view = value.as_ref();

		validate_view(view)?;

		Ok(Self(view.to_owned()))
	}
}
impl Deref for AppId {
	type Target = str;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}
impl AsRef<str> for AppId {
	fn as_ref(&self) -> &str {
		&self.0
	}
}
impl From<AppId> for String {
	fn from(value: AppId) -> Self {
		value.0
	}
}
impl TryFrom<String> for AppId {
	type Error = AppIdError;

	fn try_from(value: String) -> Result<Self, Self::Error> {
		validate_view(&value)?;

		Ok(Self(value))
	}
}
impl Borrow<str> for AppId {
	fn borrow(&self) -> &str {
		&self.0
	}
}
impl Debug for AppId {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "AppId({})", self.0)
	}
}
impl Display for AppId {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(&self.0)
	}
}
impl FromStr for AppId {
	type Err = AppIdError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::new(s)
	}
}

/// Error returned when application identifier validation fails.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, ThisError)]
pub enum AppIdError {
	/// The identifier was empty.
	#[error("App identifier cannot be empty.")]
	Empty,
	/// The identifier contains whitespace characters.
	#[error("App identifier contains whitespace.")]
	ContainsWhitespace,
	/// The identifier exceeded the allowed character count.
	#[error("App identifier exceeds {max} characters.")]
	TooLong {
		/// Maximum permitted length.
		max: usize,
	},
}

/// Client identifier + secret pair, immutable for the lifetime of a token manager.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Credential {
	/// Application identifier (`appId`).
	pub app_id: AppId,
	/// Application secret.
	pub secret: ClientSecret,
}
impl Credential {
	/// Validates and pairs an application identifier with its secret.
	pub fn new(app_id: impl AsRef<str>, secret: impl Into<String>) -> Result<Self, ConfigError> {
		let app_id = AppId::new(app_id)?;
		let secret = ClientSecret::new(secret);

		if secret.expose().is_empty() {
			return Err(ConfigError::EmptySecret);
		}

		Ok(Self { app_id, secret })
	}
}

fn validate_view(view: &str) -> Result<(), AppIdError> {
	if view.is_empty() {
		return Err(AppIdError::Empty);
	}
	if view.chars().any(char::is_whitespace) {
		return Err(AppIdError::ContainsWhitespace);
	}
	if view.len() > APP_ID_MAX_LEN {
		return Err(AppIdError::TooLong { max: APP_ID_MAX_LEN });
	}

	Ok(())
}
