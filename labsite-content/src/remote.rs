// ---------------------------------------------------------------------------
// Remote collection client
// ---------------------------------------------------------------------------
//
// The durable side of the store. The partitioned store only ever talks to a
// `RemoteCollectionClient`; which backend sits behind it (in-process memory,
// Firestore) is decided at construction.
// ---------------------------------------------------------------------------

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use thiserror::Error;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::types::{Fields, RemoteDocument};

#[derive(Debug, Error)]
pub enum RemoteError {
	#[error("Unavailable: {0}")]
	Unavailable(String),
	#[error("Not found: {0}")]
	NotFound(String),
	#[error("Decode error: {0}")]
	Decode(String),
}

/// Document storage keyed by collection name and server-assigned id.
#[async_trait::async_trait]
pub trait RemoteCollectionClient: Send + Sync {
	/// Full scan of a collection, in the backend's natural order.
	async fn fetch_all(&self, collection: &str) -> Result<Vec<RemoteDocument>, RemoteError>;

	/// Insert a document; the backend assigns and returns its id.
	async fn create(&self, collection: &str, fields: &Fields) -> Result<String, RemoteError>;

	/// Replace the supplied fields of an existing document, leaving the rest.
	async fn update(&self, collection: &str, id: &str, fields: &Fields) -> Result<(), RemoteError>;

	async fn delete(&self, collection: &str, id: &str) -> Result<(), RemoteError>;
}

// ---------------------------------------------------------------------------
// In-process backend
// ---------------------------------------------------------------------------

/// Insertion-ordered collections held in memory. Used by the engine's
/// `memory` backend and throughout the tests; `set_unavailable` simulates an
/// outage so failure paths can be exercised.
#[derive(Debug, Default)]
pub struct MemoryCollectionClient {
	collections: Mutex<HashMap<String, Vec<RemoteDocument>>>,
	unavailable: AtomicBool,
}

impl MemoryCollectionClient {
	pub fn new() -> Self {
		Self::default()
	}

	/// While set, every call fails with `RemoteError::Unavailable`.
	pub fn set_unavailable(&self, unavailable: bool) {
		self.unavailable.store(unavailable, Ordering::SeqCst);
	}

	/// Insert a document directly, bypassing the outage switch.
	pub async fn seed(&self, collection: &str, fields: Fields) -> String {
		let id = Uuid::new_v4().to_string();
		self.collections
			.lock()
			.await
			.entry(collection.to_string())
			.or_default()
			.push(RemoteDocument {
				id: id.clone(),
				fields,
			});
		id
	}

	/// Current stored fields of one document.
	pub async fn document(&self, collection: &str, id: &str) -> Option<Fields> {
		self.collections
			.lock()
			.await
			.get(collection)
			.and_then(|docs| docs.iter().find(|d| d.id == id))
			.map(|d| d.fields.clone())
	}

	pub async fn count(&self, collection: &str) -> usize {
		self.collections
			.lock()
			.await
			.get(collection)
			.map_or(0, Vec::len)
	}

	fn check_available(&self, op: &str, collection: &str) -> Result<(), RemoteError> {
		if self.unavailable.load(Ordering::SeqCst) {
			return Err(RemoteError::Unavailable(format!(
				"{op} {collection}: backend offline"
			)));
		}
		Ok(())
	}
}

#[async_trait::async_trait]
impl RemoteCollectionClient for MemoryCollectionClient {
	async fn fetch_all(&self, collection: &str) -> Result<Vec<RemoteDocument>, RemoteError> {
		self.check_available("fetch", collection)?;
		Ok(self
			.collections
			.lock()
			.await
			.get(collection)
			.cloned()
			.unwrap_or_default())
	}

	async fn create(&self, collection: &str, fields: &Fields) -> Result<String, RemoteError> {
		self.check_available("create", collection)?;
		let id = Uuid::new_v4().to_string();
		self.collections
			.lock()
			.await
			.entry(collection.to_string())
			.or_default()
			.push(RemoteDocument {
				id: id.clone(),
				fields: fields.clone(),
			});
		Ok(id)
	}

	async fn update(&self, collection: &str, id: &str, fields: &Fields) -> Result<(), RemoteError> {
		self.check_available("update", collection)?;
		let mut collections = self.collections.lock().await;
		let doc = collections
			.get_mut(collection)
			.and_then(|docs| docs.iter_mut().find(|d| d.id == id))
			.ok_or_else(|| RemoteError::NotFound(format!("{collection}/{id}")))?;
		for (key, value) in fields {
			doc.fields.insert(key.clone(), value.clone());
		}
		Ok(())
	}

	async fn delete(&self, collection: &str, id: &str) -> Result<(), RemoteError> {
		self.check_available("delete", collection)?;
		let mut collections = self.collections.lock().await;
		let docs = collections
			.get_mut(collection)
			.ok_or_else(|| RemoteError::NotFound(format!("{collection}/{id}")))?;
		let index = docs
			.iter()
			.position(|d| d.id == id)
			.ok_or_else(|| RemoteError::NotFound(format!("{collection}/{id}")))?;
		docs.remove(index);
		Ok(())
	}
}
