use thiserror::Error;

use crate::auth::AuthError;
use crate::remote::RemoteError;
use crate::tabs::TabError;

#[derive(Debug, Error)]
pub enum ContentError {
	#[error("Remote store unavailable: {0}")]
	RemoteUnavailable(String),
	#[error("Record not found: {category}/{id}")]
	NotFound { category: String, id: String },
	#[error("Invalid record: {0}")]
	InvalidRecord(String),
	#[error("Not signed in: mutations require an active session")]
	Unauthenticated,
	#[error("Tab state error: {0}")]
	Tab(#[from] TabError),
	#[error("Authentication error: {0}")]
	Auth(#[from] AuthError),
	#[error("Invalid params: {0}")]
	InvalidParams(String),
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),
}

impl ContentError {
	pub fn not_found(category: &str, id: &str) -> Self {
		Self::NotFound {
			category: category.to_string(),
			id: id.to_string(),
		}
	}

	/// Fold a collaborator failure into the store's taxonomy. A remote
	/// `NotFound` keeps the caller's category/id rather than the remote path.
	pub fn from_remote(category: &str, id: &str, err: RemoteError) -> Self {
		match err {
			RemoteError::NotFound(_) => Self::not_found(category, id),
			RemoteError::Unavailable(msg) => Self::RemoteUnavailable(msg),
			RemoteError::Decode(msg) => Self::RemoteUnavailable(format!("bad response: {msg}")),
		}
	}

	pub fn code(&self) -> &str {
		match self {
			Self::RemoteUnavailable(_) => "CONTENT_REMOTE_UNAVAILABLE",
			Self::NotFound { .. } => "CONTENT_NOT_FOUND",
			Self::InvalidRecord(_) => "CONTENT_INVALID_RECORD",
			Self::Unauthenticated => "CONTENT_UNAUTHENTICATED",
			Self::Tab(_) => "CONTENT_TAB_STATE",
			Self::Auth(_) => "CONTENT_AUTH",
			Self::InvalidParams(_) => "CONTENT_INVALID_PARAMS",
			Self::Io(_) => "CONTENT_IO",
		}
	}

	pub fn to_json_rpc_error(&self) -> serde_json::Value {
		serde_json::json!({
			"contentCode": self.code(),
			"message": self.to_string(),
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn remote_not_found_keeps_caller_context() {
		let err = ContentError::from_remote(
			"events",
			"abc",
			RemoteError::NotFound("projects/x/documents/events/abc".into()),
		);
		match err {
			ContentError::NotFound { category, id } => {
				assert_eq!(category, "events");
				assert_eq!(id, "abc");
			}
			other => panic!("unexpected error: {other:?}"),
		}
	}

	#[test]
	fn decode_failures_surface_as_unavailable() {
		let err = ContentError::from_remote("books", "", RemoteError::Decode("no name".into()));
		assert_eq!(err.code(), "CONTENT_REMOTE_UNAVAILABLE");
	}

	#[test]
	fn json_rpc_error_carries_code_and_message() {
		let v = ContentError::InvalidRecord("title is required".into()).to_json_rpc_error();
		assert_eq!(v["contentCode"], "CONTENT_INVALID_RECORD");
		assert_eq!(v["message"], "Invalid record: title is required");
	}
}
