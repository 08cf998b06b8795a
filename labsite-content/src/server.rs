// ---------------------------------------------------------------------------
// ContentServer: JSON-RPC dispatcher
// ---------------------------------------------------------------------------
//
// Reads JSON-RPC 2.0 requests (NDJSON over stdin) and routes them to the
// admin panel. Requests are handled one at a time; between requests the loop
// also watches the session channel and emits `auth/sessionChanged`.
// ---------------------------------------------------------------------------

use serde::Deserialize;
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::auth::{Credentials, Session};
use crate::error::ContentError;
use crate::panel::AdminPanel;
use crate::protocol::*;
use crate::transport::NdjsonTransport;
use crate::types::Fields;
use crate::year::{classify_year, YearInput, UNCATEGORIZED};

// ---------------------------------------------------------------------------
// Server
// ---------------------------------------------------------------------------

pub struct ContentServer {
	transport: NdjsonTransport,
	panel: AdminPanel,
}

impl ContentServer {
	pub fn new(transport: NdjsonTransport, panel: AdminPanel) -> Self {
		Self { transport, panel }
	}

	/// Main loop: read requests from stdin until EOF.
	pub async fn run(&mut self) -> Result<(), ContentError> {
		let mut lines = BufReader::new(tokio::io::stdin()).lines();
		let mut session_rx = self.panel.subscribe();
		let mut watching = true;

		loop {
			// Pending session changes are flushed before the next request.
			tokio::select! {
				biased;
				changed = session_rx.changed(), if watching => {
					match changed {
						Ok(()) => {
							let session = session_rx.borrow_and_update().clone();
							self.notify_session(session.as_ref());
						}
						Err(_) => watching = false,
					}
				}
				line = lines.next_line() => {
					let Some(line) = line? else {
						break;
					};
					self.handle_line(&line).await;
				}
			}
		}

		Ok(())
	}

	async fn handle_line(&mut self, line: &str) {
		if line.trim().is_empty() {
			return;
		}
		let request: JsonRpcRequest = match serde_json::from_str(line) {
			Ok(r) => r,
			Err(e) => {
				tracing::error!("Failed to parse request: {}", e);
				return;
			}
		};
		self.dispatch(request).await;
	}

	fn notify_session(&self, session: Option<&Session>) {
		let params = match session {
			Some(s) => json!({ "signedIn": true, "email": s.email }),
			None => json!({ "signedIn": false }),
		};
		self.transport.write_notification(SESSION_CHANGED, params);
	}

	// -- Dispatch ------------------------------------------------------------

	async fn dispatch(&mut self, req: JsonRpcRequest) {
		let id = req.id;
		tracing::debug!(id, method = %req.method, "Dispatching");
		let panel = &mut self.panel;
		let result = match req.method.as_str() {
			// -- Content ---------------------------------------------------
			"content/load" => handle_load(panel, req.params).await,
			"content/add" => handle_add(panel, req.params).await,
			"content/update" => handle_update(panel, req.params).await,
			"content/remove" => handle_remove(panel, req.params).await,
			"content/years" => handle_years(panel, req.params),
			"content/bucket" => handle_bucket(panel, req.params),
			"content/partition" => handle_partition(panel, req.params),
			"content/categories" => {
				let schemas = panel.store().schemas();
				Ok(json!({
					"categories": schemas.categories(),
					"schemas": schemas.iter().collect::<Vec<_>>(),
				}))
			}

			// -- Tabs ------------------------------------------------------
			"tabs/state" => Ok(json!(panel.tabs().state())),
			"tabs/select" => handle_select(panel, req.params),
			"tabs/focus" => handle_focus(panel, req.params),
			"tabs/unfocus" => Ok(json!(panel.unfocus())),

			// -- Auth ------------------------------------------------------
			"auth/signIn" => handle_sign_in(panel, req.params).await,
			"auth/signOut" => {
				panel.sign_out().await;
				Ok(json!({}))
			}
			"auth/session" => Ok(json!({ "session": panel.session() })),

			// -- Unknown ---------------------------------------------------
			_ => {
				self.transport.write_error(
					id,
					METHOD_NOT_FOUND,
					format!("Unknown method: {}", req.method),
					None,
				);
				return;
			}
		};

		match result {
			Ok(value) => self.transport.write_response(id, value),
			Err(e) => {
				let code = match &e {
					ContentError::InvalidParams(_) => INVALID_PARAMS,
					ContentError::Io(_) => INTERNAL_ERROR,
					_ => CONTENT_ERROR,
				};
				self.transport
					.write_error(id, code, e.to_string(), Some(e.to_json_rpc_error()));
			}
		}
	}
}

// ---------------------------------------------------------------------------
// Param types
// ---------------------------------------------------------------------------

fn parse_params<T: serde::de::DeserializeOwned>(params: Value) -> Result<T, ContentError> {
	let params = if params.is_null() { json!({}) } else { params };
	serde_json::from_value(params).map_err(|e| ContentError::InvalidParams(e.to_string()))
}

/// Bucket labels may arrive as numbers or strings.
fn bucket_label(year: &Value) -> Result<String, ContentError> {
	match classify_year(Some(year)).map_err(|e| ContentError::InvalidParams(e.to_string()))? {
		YearInput::Label(label) => Ok(label),
		YearInput::Blank | YearInput::Missing => Ok(UNCATEGORIZED.to_string()),
	}
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct LoadParams {
	categories: Option<Vec<String>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CategoryParams {
	category: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AddParams {
	category: String,
	fields: Fields,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateParams {
	category: String,
	id: String,
	fields: Fields,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecordParams {
	category: String,
	id: String,
	year: Value,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct BucketParams {
	category: String,
	year: Value,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct IdParams {
	id: String,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn handle_load(panel: &mut AdminPanel, params: Value) -> Result<Value, ContentError> {
	let p: LoadParams = parse_params(params)?;
	let categories = p
		.categories
		.unwrap_or_else(|| panel.store().schemas().categories());
	let report = panel.load(&categories).await;
	let failed: Vec<Value> = report
		.failures
		.iter()
		.map(|f| {
			json!({
				"category": f.category,
				"code": f.error.code(),
				"message": f.error.to_string(),
			})
		})
		.collect();
	Ok(json!({ "loaded": report.loaded, "failed": failed }))
}

async fn handle_add(panel: &mut AdminPanel, params: Value) -> Result<Value, ContentError> {
	let p: AddParams = parse_params(params)?;
	let record = panel.add(&p.category, p.fields).await?;
	Ok(json!({ "record": record }))
}

async fn handle_update(panel: &mut AdminPanel, params: Value) -> Result<Value, ContentError> {
	let p: UpdateParams = parse_params(params)?;
	let record = panel.update(&p.category, &p.id, p.fields).await?;
	Ok(json!({ "record": record }))
}

async fn handle_remove(panel: &mut AdminPanel, params: Value) -> Result<Value, ContentError> {
	let p: RecordParams = parse_params(params)?;
	let year = bucket_label(&p.year)?;
	panel.remove(&p.category, &p.id, &year).await?;
	Ok(json!({}))
}

fn handle_years(panel: &AdminPanel, params: Value) -> Result<Value, ContentError> {
	let p: CategoryParams = parse_params(params)?;
	Ok(json!({ "years": panel.store().years(&p.category) }))
}

fn handle_bucket(panel: &AdminPanel, params: Value) -> Result<Value, ContentError> {
	let p: BucketParams = parse_params(params)?;
	let year = bucket_label(&p.year)?;
	Ok(json!({ "records": panel.store().bucket(&p.category, &year) }))
}

fn handle_partition(panel: &AdminPanel, params: Value) -> Result<Value, ContentError> {
	let p: CategoryParams = parse_params(params)?;
	Ok(json!({ "years": panel.store().sections(&p.category) }))
}

fn handle_select(panel: &mut AdminPanel, params: Value) -> Result<Value, ContentError> {
	let p: CategoryParams = parse_params(params)?;
	Ok(json!(panel.select_category(&p.category)?))
}

fn handle_focus(panel: &mut AdminPanel, params: Value) -> Result<Value, ContentError> {
	let p: IdParams = parse_params(params)?;
	Ok(json!(panel.focus(&p.id)?))
}

async fn handle_sign_in(panel: &AdminPanel, params: Value) -> Result<Value, ContentError> {
	let credentials: Credentials = parse_params(params)?;
	let session = panel.sign_in(&credentials).await?;
	Ok(json!({ "session": session }))
}

#[cfg(test)]
mod tests {
	use std::sync::Arc;

	use super::*;
	use crate::auth::LocalAuthProvider;
	use crate::remote::{MemoryCollectionClient, RemoteCollectionClient};
	use crate::schema::SchemaRegistry;
	use crate::store::PartitionedContentStore;
	use crate::transport::testing::SharedBuffer;
	use crate::year::FixedClock;

	fn make_server() -> (ContentServer, SharedBuffer, Arc<MemoryCollectionClient>) {
		let client = Arc::new(MemoryCollectionClient::new());
		let store = PartitionedContentStore::new(
			client.clone(),
			SchemaRegistry::lab_site(),
			Arc::new(FixedClock(2026)),
		);
		let auth = Arc::new(LocalAuthProvider::new("admin@lab.edu", "pw"));
		let panel = AdminPanel::new(store, auth, "events").unwrap();
		let buf = SharedBuffer::default();
		(ContentServer::new(NdjsonTransport::new(buf.clone()), panel), buf, client)
	}

	async fn call(
		server: &mut ContentServer,
		buf: &SharedBuffer,
		method: &str,
		params: Value,
	) -> Value {
		let id = buf.lines().len() as u64 + 1;
		server
			.dispatch(JsonRpcRequest {
				id,
				method: method.into(),
				params,
			})
			.await;
		buf.lines().pop().unwrap()
	}

	#[tokio::test]
	async fn add_then_read_back() {
		let (mut server, buf, _client) = make_server();
		let creds = json!({"email": "admin@lab.edu", "password": "pw"});
		call(&mut server, &buf, "auth/signIn", creds).await;

		let resp = call(
			&mut server,
			&buf,
			"content/add",
			json!({"category": "events", "fields": {"title": "Workshop"}}),
		)
		.await;
		assert_eq!(resp["result"]["record"]["year"], "2026");

		let resp = call(&mut server, &buf, "content/years", json!({"category": "events"})).await;
		assert_eq!(resp["result"]["years"], json!(["2026"]));

		let resp = call(
			&mut server,
			&buf,
			"content/bucket",
			json!({"category": "events", "year": 2026}),
		)
		.await;
		assert_eq!(resp["result"]["records"][0]["fields"]["title"], "Workshop");
	}

	#[tokio::test]
	async fn errors_carry_content_codes() {
		let (mut server, buf, _client) = make_server();
		let resp = call(
			&mut server,
			&buf,
			"content/add",
			json!({"category": "events", "fields": {"title": "x"}}),
		)
		.await;
		assert_eq!(resp["error"]["code"], CONTENT_ERROR);
		assert_eq!(resp["error"]["data"]["contentCode"], "CONTENT_UNAUTHENTICATED");

		let resp = call(&mut server, &buf, "content/add", json!({"category": "events"})).await;
		assert_eq!(resp["error"]["code"], INVALID_PARAMS);

		let resp = call(&mut server, &buf, "content/explode", json!({})).await;
		assert_eq!(resp["error"]["code"], METHOD_NOT_FOUND);
	}

	#[tokio::test]
	async fn tab_methods_report_state() {
		let (mut server, buf, _client) = make_server();
		let resp = call(&mut server, &buf, "tabs/state", Value::Null).await;
		assert_eq!(resp["result"], json!({"state": "listing", "category": "events"}));

		let resp = call(&mut server, &buf, "tabs/select", json!({"category": "members"})).await;
		assert_eq!(resp["result"]["category"], "members");

		let resp = call(&mut server, &buf, "tabs/focus", json!({"id": "nope"})).await;
		assert_eq!(resp["error"]["data"]["contentCode"], "CONTENT_NOT_FOUND");
	}

	#[tokio::test]
	async fn load_defaults_to_every_category() {
		let (mut server, buf, _client) = make_server();
		let resp = call(&mut server, &buf, "content/load", Value::Null).await;
		assert_eq!(resp["result"]["loaded"].as_array().unwrap().len(), 10);
		assert_eq!(resp["result"]["failed"], json!([]));
	}

	#[tokio::test]
	async fn reload_clears_focus_on_remotely_deleted_record() {
		let (mut server, buf, client) = make_server();
		let creds = json!({"email": "admin@lab.edu", "password": "pw"});
		call(&mut server, &buf, "auth/signIn", creds).await;
		let resp = call(
			&mut server,
			&buf,
			"content/add",
			json!({"category": "events", "fields": {"title": "Talk", "year": "2024"}}),
		)
		.await;
		let id = resp["result"]["record"]["id"].as_str().unwrap().to_string();
		let resp = call(&mut server, &buf, "tabs/focus", json!({"id": id})).await;
		assert_eq!(resp["result"]["state"], "focused");

		client.delete("events", &id).await.unwrap();
		let resp = call(&mut server, &buf, "content/load", json!({"categories": ["events"]})).await;
		assert_eq!(resp["result"]["loaded"], json!(["events"]));

		let resp = call(&mut server, &buf, "tabs/state", json!({})).await;
		assert_eq!(resp["result"], json!({"state": "listing", "category": "events"}));
	}
}
