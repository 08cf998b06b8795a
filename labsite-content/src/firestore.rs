// ---------------------------------------------------------------------------
// Firestore REST backend
// ---------------------------------------------------------------------------
//
// `RemoteCollectionClient` over the Firestore v1 REST API. Documents travel
// as typed values (`{"stringValue": ..}`, `{"integerValue": ".."}`, ...); the
// codec at the bottom of this file converts them to and from plain JSON.
// ---------------------------------------------------------------------------

use std::time::Duration;

use reqwest::{RequestBuilder, Response, StatusCode, Url};
use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::auth::SessionHandle;
use crate::remote::{RemoteCollectionClient, RemoteError};
use crate::types::{Fields, RemoteDocument};

pub const FIRESTORE_ENDPOINT: &str = "https://firestore.googleapis.com/v1";

const PAGE_SIZE: u32 = 300;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListResponse {
	#[serde(default)]
	documents: Vec<WireDocument>,
	next_page_token: Option<String>,
}

#[derive(Deserialize)]
struct WireDocument {
	name: String,
	#[serde(default)]
	fields: Map<String, Value>,
}

pub struct FirestoreClient {
	http: reqwest::Client,
	documents_root: String,
	api_key: Option<String>,
	session: Option<SessionHandle>,
}

impl FirestoreClient {
	pub fn new(project_id: &str, timeout: Duration) -> Self {
		Self::with_root(documents_root(FIRESTORE_ENDPOINT, project_id), timeout)
	}

	/// `root` is the full `.../projects/{p}/databases/(default)/documents`
	/// prefix, e.g. an emulator address.
	pub fn with_root(root: impl Into<String>, timeout: Duration) -> Self {
		let http = reqwest::Client::builder()
			.timeout(timeout)
			.build()
			.unwrap_or_default();
		Self {
			http,
			documents_root: root.into().trim_end_matches('/').to_string(),
			api_key: None,
			session: None,
		}
	}

	pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
		self.api_key = Some(key.into());
		self
	}

	/// Requests carry the session's ID token as a bearer token when signed in.
	pub fn with_session(mut self, session: SessionHandle) -> Self {
		self.session = Some(session);
		self
	}

	// -- URLs ----------------------------------------------------------------

	fn url(&self, segments: &[&str]) -> Result<Url, RemoteError> {
		let mut url = Url::parse(&self.documents_root)
			.map_err(|e| RemoteError::Unavailable(format!("bad Firestore root: {e}")))?;
		url.path_segments_mut()
			.map_err(|_| RemoteError::Unavailable("Firestore root cannot be a base".into()))?
			.extend(segments);
		if let Some(key) = &self.api_key {
			url.query_pairs_mut().append_pair("key", key);
		}
		Ok(url)
	}

	fn list_url(&self, collection: &str, page_token: Option<&str>) -> Result<Url, RemoteError> {
		let mut url = self.url(&[collection])?;
		{
			let mut query = url.query_pairs_mut();
			query.append_pair("pageSize", &PAGE_SIZE.to_string());
			if let Some(token) = page_token {
				query.append_pair("pageToken", token);
			}
		}
		Ok(url)
	}

	fn patch_url(&self, collection: &str, id: &str, fields: &Fields) -> Result<Url, RemoteError> {
		let mut url = self.url(&[collection, id])?;
		{
			let mut query = url.query_pairs_mut();
			for name in fields.keys() {
				query.append_pair("updateMask.fieldPaths", &field_path(name));
			}
			query.append_pair("currentDocument.exists", "true");
		}
		Ok(url)
	}

	fn delete_url(&self, collection: &str, id: &str) -> Result<Url, RemoteError> {
		let mut url = self.url(&[collection, id])?;
		url.query_pairs_mut().append_pair("currentDocument.exists", "true");
		Ok(url)
	}

	// -- Plumbing ------------------------------------------------------------

	fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
		match self.session.as_ref().and_then(|s| s.id_token()) {
			Some(token) => request.bearer_auth(token),
			None => request,
		}
	}

	async fn send(&self, request: RequestBuilder, what: &str) -> Result<Response, RemoteError> {
		let response = self
			.authorize(request)
			.send()
			.await
			.map_err(|e| RemoteError::Unavailable(format!("{what}: {e}")))?;
		let status = response.status();
		if status.is_success() {
			return Ok(response);
		}
		let body = response.text().await.unwrap_or_default();
		tracing::debug!(%status, body = %body, "Firestore request failed: {}", what);
		Err(status_error(status, what))
	}
}

#[async_trait::async_trait]
impl RemoteCollectionClient for FirestoreClient {
	async fn fetch_all(&self, collection: &str) -> Result<Vec<RemoteDocument>, RemoteError> {
		let mut documents = Vec::new();
		let mut page_token: Option<String> = None;
		loop {
			let url = self.list_url(collection, page_token.as_deref())?;
			let response = self.send(self.http.get(url), collection).await?;
			let page: ListResponse = response
				.json()
				.await
				.map_err(|e| RemoteError::Decode(e.to_string()))?;
			for doc in page.documents {
				documents.push(decode_document(doc)?);
			}
			match page.next_page_token {
				Some(token) if !token.is_empty() => page_token = Some(token),
				_ => break,
			}
		}
		tracing::debug!(collection, documents = documents.len(), "Fetched collection");
		Ok(documents)
	}

	async fn create(&self, collection: &str, fields: &Fields) -> Result<String, RemoteError> {
		let url = self.url(&[collection])?;
		let body = json!({ "fields": encode_fields(fields) });
		let response = self.send(self.http.post(url).json(&body), collection).await?;
		let doc: WireDocument = response
			.json()
			.await
			.map_err(|e| RemoteError::Decode(e.to_string()))?;
		document_id(&doc.name)
	}

	async fn update(&self, collection: &str, id: &str, fields: &Fields) -> Result<(), RemoteError> {
		let url = self.patch_url(collection, id, fields)?;
		let body = json!({ "fields": encode_fields(fields) });
		self.send(self.http.patch(url).json(&body), &format!("{collection}/{id}"))
			.await?;
		Ok(())
	}

	async fn delete(&self, collection: &str, id: &str) -> Result<(), RemoteError> {
		let url = self.delete_url(collection, id)?;
		self.send(self.http.delete(url), &format!("{collection}/{id}"))
			.await?;
		Ok(())
	}
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

pub fn documents_root(endpoint: &str, project_id: &str) -> String {
	format!(
		"{}/projects/{}/databases/(default)/documents",
		endpoint.trim_end_matches('/'),
		project_id
	)
}

fn status_error(status: StatusCode, what: &str) -> RemoteError {
	if status == StatusCode::NOT_FOUND {
		RemoteError::NotFound(what.to_string())
	} else {
		RemoteError::Unavailable(format!("{what}: HTTP {status}"))
	}
}

/// Simple names pass through; anything else is backtick-quoted.
fn field_path(name: &str) -> String {
	let mut chars = name.chars();
	let simple = chars
		.next()
		.is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
		&& chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
	if simple {
		return name.to_string();
	}
	let escaped = name.replace('\\', "\\\\").replace('`', "\\`");
	format!("`{escaped}`")
}

/// Last segment of `projects/../documents/{collection}/{id}`.
fn document_id(name: &str) -> Result<String, RemoteError> {
	name.rsplit('/')
		.next()
		.filter(|id| !id.is_empty())
		.map(str::to_string)
		.ok_or_else(|| RemoteError::Decode(format!("document name without id: {name}")))
}

fn decode_document(doc: WireDocument) -> Result<RemoteDocument, RemoteError> {
	let id = document_id(&doc.name)?;
	let mut fields = Fields::new();
	for (key, value) in &doc.fields {
		fields.insert(key.clone(), decode_value(value)?);
	}
	Ok(RemoteDocument { id, fields })
}

// ---------------------------------------------------------------------------
// Typed value codec
// ---------------------------------------------------------------------------

pub fn encode_fields(fields: &Fields) -> Value {
	Value::Object(
		fields
			.iter()
			.map(|(k, v)| (k.clone(), encode_value(v)))
			.collect(),
	)
}

pub fn encode_value(value: &Value) -> Value {
	match value {
		Value::Null => json!({ "nullValue": null }),
		Value::Bool(b) => json!({ "booleanValue": b }),
		Value::Number(n) => {
			if let Some(i) = n.as_i64() {
				json!({ "integerValue": i.to_string() })
			} else if let Some(u) = n.as_u64() {
				json!({ "integerValue": u.to_string() })
			} else {
				json!({ "doubleValue": n.as_f64() })
			}
		}
		Value::String(s) => json!({ "stringValue": s }),
		Value::Array(items) => {
			json!({ "arrayValue": { "values": items.iter().map(encode_value).collect::<Vec<_>>() } })
		}
		Value::Object(map) => json!({ "mapValue": { "fields": encode_fields(map) } }),
	}
}

pub fn decode_value(value: &Value) -> Result<Value, RemoteError> {
	let Some((kind, inner)) = value.as_object().and_then(|m| m.iter().next()) else {
		return Err(RemoteError::Decode(format!("not a typed value: {value}")));
	};
	match kind.as_str() {
		"nullValue" => Ok(Value::Null),
		"booleanValue" => Ok(Value::Bool(inner.as_bool().unwrap_or_default())),
		"integerValue" => {
			let parsed = match inner {
				Value::String(s) => s.parse::<i64>().ok(),
				other => other.as_i64(),
			};
			parsed
				.map(Value::from)
				.ok_or_else(|| RemoteError::Decode(format!("bad integerValue: {inner}")))
		}
		"doubleValue" => Ok(inner
			.as_f64()
			.and_then(serde_json::Number::from_f64)
			.map(Value::Number)
			.unwrap_or(Value::Null)),
		"stringValue" | "timestampValue" | "referenceValue" | "bytesValue" => Ok(inner.clone()),
		"geoPointValue" => Ok(json!({
			"latitude": inner.get("latitude").cloned().unwrap_or(json!(0.0)),
			"longitude": inner.get("longitude").cloned().unwrap_or(json!(0.0)),
		})),
		"arrayValue" => {
			let values = inner
				.get("values")
				.and_then(Value::as_array)
				.map(|items| items.iter().map(decode_value).collect::<Result<Vec<_>, _>>())
				.transpose()?
				.unwrap_or_default();
			Ok(Value::Array(values))
		}
		"mapValue" => {
			let mut out = Map::new();
			if let Some(fields) = inner.get("fields").and_then(Value::as_object) {
				for (k, v) in fields {
					out.insert(k.clone(), decode_value(v)?);
				}
			}
			Ok(Value::Object(out))
		}
		other => Err(RemoteError::Decode(format!("unsupported value type: {other}"))),
	}
}
