// ---------------------------------------------------------------------------
// Authentication
// ---------------------------------------------------------------------------
//
// Sessions are explicit values published through a `SessionHandle`
// (`tokio::sync::watch`). Whoever needs to know whether an admin is signed
// in holds a handle and either reads it or subscribes to changes.
// ---------------------------------------------------------------------------

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::sync::watch;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
	#[error("Invalid email or password")]
	InvalidCredentials,
	#[error("Account disabled")]
	Disabled,
	#[error("Auth service unavailable: {0}")]
	Unavailable(String),
}

impl AuthError {
	pub fn code(&self) -> &str {
		match self {
			Self::InvalidCredentials => "AUTH_INVALID_CREDENTIALS",
			Self::Disabled => "AUTH_DISABLED",
			Self::Unavailable(_) => "AUTH_UNAVAILABLE",
		}
	}
}

#[derive(Debug, Clone, Deserialize)]
pub struct Credentials {
	pub email: String,
	pub password: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
	pub uid: String,
	pub email: String,
	#[serde(skip_serializing)]
	pub id_token: String,
	#[serde(skip_serializing)]
	pub refresh_token: String,
	pub expires_at: DateTime<Utc>,
}

impl Session {
	pub fn is_expired(&self) -> bool {
		self.expires_at <= Utc::now()
	}
}

// ---------------------------------------------------------------------------
// SessionHandle
// ---------------------------------------------------------------------------

/// Shared view of the current session. Clones observe the same channel.
#[derive(Clone)]
pub struct SessionHandle {
	tx: Arc<watch::Sender<Option<Session>>>,
}

impl Default for SessionHandle {
	fn default() -> Self {
		let (tx, _rx) = watch::channel(None);
		Self { tx: Arc::new(tx) }
	}
}

impl SessionHandle {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn current(&self) -> Option<Session> {
		self.tx.borrow().clone()
	}

	/// The current session if it has not expired. An expired session is
	/// cleared on the way, so subscribers see it as a sign-out.
	pub fn live(&self) -> Option<Session> {
		let expired = self.tx.send_if_modified(|current| {
			if current.as_ref().is_some_and(Session::is_expired) {
				*current = None;
				true
			} else {
				false
			}
		});
		if expired {
			tracing::info!("Session expired");
		}
		self.current()
	}

	/// A session is present and has not expired.
	pub fn is_signed_in(&self) -> bool {
		self.live().is_some()
	}

	/// Bearer token of a live session.
	pub fn id_token(&self) -> Option<String> {
		self.live().map(|s| s.id_token)
	}

	pub fn subscribe(&self) -> watch::Receiver<Option<Session>> {
		self.tx.subscribe()
	}

	pub fn publish(&self, session: Option<Session>) {
		self.tx.send_replace(session);
	}
}

// ---------------------------------------------------------------------------
// Provider trait
// ---------------------------------------------------------------------------

#[async_trait::async_trait]
pub trait AuthProvider: Send + Sync {
	/// Verify credentials and publish the resulting session.
	async fn sign_in(&self, credentials: &Credentials) -> Result<Session, AuthError>;

	/// Clear the session. Signing out while signed out is a no-op.
	async fn sign_out(&self);

	fn handle(&self) -> SessionHandle;
}

// ---------------------------------------------------------------------------
// Local provider
// ---------------------------------------------------------------------------

const LOCAL_SESSION_HOURS: i64 = 12;

fn digest(password: &str) -> [u8; 32] {
	Sha256::digest(password.as_bytes()).into()
}

/// A single configured admin account, for the in-memory backend and tests.
/// Only the SHA-256 digest of the password is kept.
pub struct LocalAuthProvider {
	email: String,
	password_digest: [u8; 32],
	handle: SessionHandle,
}

impl LocalAuthProvider {
	pub fn new(email: impl Into<String>, password: &str) -> Self {
		Self {
			email: email.into(),
			password_digest: digest(password),
			handle: SessionHandle::new(),
		}
	}
}

#[async_trait::async_trait]
impl AuthProvider for LocalAuthProvider {
	async fn sign_in(&self, credentials: &Credentials) -> Result<Session, AuthError> {
		let email_ok = credentials.email.trim().eq_ignore_ascii_case(&self.email);
		let password_ok = digest(&credentials.password) == self.password_digest;
		if !(email_ok && password_ok) {
			tracing::warn!(email = %credentials.email, "Rejected local sign-in");
			return Err(AuthError::InvalidCredentials);
		}

		let session = Session {
			uid: format!("local:{}", self.email),
			email: self.email.clone(),
			id_token: uuid::Uuid::new_v4().to_string(),
			refresh_token: String::new(),
			expires_at: Utc::now() + chrono::Duration::hours(LOCAL_SESSION_HOURS),
		};
		self.handle.publish(Some(session.clone()));
		tracing::info!(email = %session.email, "Signed in");
		Ok(session)
	}

	async fn sign_out(&self) {
		if self.handle.current().is_some() {
			tracing::info!("Signed out");
		}
		self.handle.publish(None);
	}

	fn handle(&self) -> SessionHandle {
		self.handle.clone()
	}
}

// ---------------------------------------------------------------------------
// Identity Toolkit provider
// ---------------------------------------------------------------------------

pub const IDENTITY_TOOLKIT_ENDPOINT: &str = "https://identitytoolkit.googleapis.com/v1";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SignInRequest<'a> {
	email: &'a str,
	password: &'a str,
	return_secure_token: bool,
}

const DEFAULT_TOKEN_TTL_SECS: i64 = 3600;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignInResponse {
	id_token: String,
	email: String,
	#[serde(default)]
	refresh_token: String,
	expires_in: String,
	local_id: String,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
	error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
	message: String,
}

/// Identity Toolkit error messages look like `CODE` or `CODE : detail`.
fn map_identity_error(message: &str) -> AuthError {
	let code = message.split(':').next().unwrap_or_default().trim();
	match code {
		"EMAIL_NOT_FOUND" | "INVALID_PASSWORD" | "INVALID_LOGIN_CREDENTIALS" | "INVALID_EMAIL" => {
			AuthError::InvalidCredentials
		}
		"USER_DISABLED" => AuthError::Disabled,
		other => AuthError::Unavailable(other.to_string()),
	}
}

/// `expiresIn` is a decimal count of seconds; unparsable values fall back to
/// an hour. Values that overflow the clock are rejected.
fn session_expiry(now: DateTime<Utc>, expires_in: &str) -> Result<DateTime<Utc>, AuthError> {
	let ttl = expires_in.trim().parse::<i64>().unwrap_or(DEFAULT_TOKEN_TTL_SECS);
	chrono::Duration::try_seconds(ttl)
		.and_then(|ttl| now.checked_add_signed(ttl))
		.ok_or_else(|| {
			AuthError::Unavailable(format!("token lifetime out of range: {expires_in}"))
		})
}

/// Email/password sign-in against Google Identity Toolkit.
pub struct IdentityToolkitAuth {
	http: reqwest::Client,
	endpoint: String,
	api_key: String,
	handle: SessionHandle,
}

impl IdentityToolkitAuth {
	pub fn new(api_key: impl Into<String>, timeout: Duration) -> Self {
		Self::with_endpoint(IDENTITY_TOOLKIT_ENDPOINT, api_key, timeout)
	}

	/// Point at an emulator or proxy instead of the public endpoint.
	pub fn with_endpoint(
		endpoint: impl Into<String>,
		api_key: impl Into<String>,
		timeout: Duration,
	) -> Self {
		let http = reqwest::Client::builder()
			.timeout(timeout)
			.build()
			.unwrap_or_default();
		Self {
			http,
			endpoint: endpoint.into().trim_end_matches('/').to_string(),
			api_key: api_key.into(),
			handle: SessionHandle::new(),
		}
	}

	fn sign_in_url(&self) -> Result<reqwest::Url, AuthError> {
		let mut url = reqwest::Url::parse(&format!(
			"{}/accounts:signInWithPassword",
			self.endpoint
		))
		.map_err(|e| AuthError::Unavailable(e.to_string()))?;
		url.query_pairs_mut().append_pair("key", &self.api_key);
		Ok(url)
	}
}

#[async_trait::async_trait]
impl AuthProvider for IdentityToolkitAuth {
	async fn sign_in(&self, credentials: &Credentials) -> Result<Session, AuthError> {
		let url = self.sign_in_url()?;
		let response = self
			.http
			.post(url)
			.json(&SignInRequest {
				email: credentials.email.trim(),
				password: &credentials.password,
				return_secure_token: true,
			})
			.send()
			.await
			.map_err(|e| AuthError::Unavailable(e.to_string()))?;

		if !response.status().is_success() {
			let status = response.status();
			let envelope: Result<ErrorEnvelope, _> = response.json().await;
			return Err(match envelope {
				Ok(env) => map_identity_error(&env.error.message),
				Err(_) => AuthError::Unavailable(format!("HTTP {status}")),
			});
		}

		let body: SignInResponse = response
			.json()
			.await
			.map_err(|e| AuthError::Unavailable(e.to_string()))?;
		let expires_at = session_expiry(Utc::now(), &body.expires_in)?;
		let session = Session {
			uid: body.local_id,
			email: body.email,
			id_token: body.id_token,
			refresh_token: body.refresh_token,
			expires_at,
		};
		self.handle.publish(Some(session.clone()));
		tracing::info!(email = %session.email, "Signed in");
		Ok(session)
	}

	async fn sign_out(&self) {
		self.handle.publish(None);
	}

	fn handle(&self) -> SessionHandle {
		self.handle.clone()
	}
}
