// ---------------------------------------------------------------------------
// AdminPanel: store + tabs + session
// ---------------------------------------------------------------------------
//
// The admin view composes the three pieces: reads go straight to the store,
// mutations require a signed-in session, and successful removes/moves are
// reported to the tab controller so focus never points at a stale record.
// ---------------------------------------------------------------------------

use std::sync::Arc;

use tokio::sync::watch;

use crate::auth::{AuthProvider, Credentials, Session, SessionHandle};
use crate::error::ContentError;
use crate::store::{LoadReport, PartitionedContentStore};
use crate::tabs::{TabController, TabState};
use crate::types::{Fields, Record};

pub struct AdminPanel {
	store: PartitionedContentStore,
	tabs: TabController,
	auth: Arc<dyn AuthProvider>,
	session: SessionHandle,
}

impl AdminPanel {
	/// Tabs cover every registered category; `default_category` opens first.
	pub fn new(
		store: PartitionedContentStore,
		auth: Arc<dyn AuthProvider>,
		default_category: &str,
	) -> Result<Self, ContentError> {
		let tabs = TabController::new(store.schemas().categories(), default_category)?;
		let session = auth.handle();
		Ok(Self {
			store,
			tabs,
			auth,
			session,
		})
	}

	pub fn store(&self) -> &PartitionedContentStore {
		&self.store
	}

	pub fn tabs(&self) -> &TabController {
		&self.tabs
	}

	fn require_session(&self) -> Result<(), ContentError> {
		if self.session.is_signed_in() {
			Ok(())
		} else {
			Err(ContentError::Unauthenticated)
		}
	}

	// -- Loading -------------------------------------------------------------

	/// Reload categories from the remote. A focused record that is gone after
	/// the reload (deleted remotely, or its category failed to load) drops
	/// focus; one that changed bucket keeps focus with its new year.
	pub async fn load(&mut self, categories: &[String]) -> LoadReport {
		let report = self.store.load(categories).await;
		let Some(focused) = self.tabs.focused().cloned() else {
			return report;
		};
		let category = self.tabs.active_category().to_string();
		match self.store.find_year(&category, &focused.id) {
			None => {
				tracing::debug!(
					category = %category,
					id = %focused.id,
					"Focused record gone after reload"
				);
				self.tabs.record_deleted(&category, &focused.id);
			}
			Some(year) if year != focused.year => {
				self.tabs.record_moved(&category, &focused.id, &year);
			}
			Some(_) => {}
		}
		report
	}

	// -- Mutations -----------------------------------------------------------

	pub async fn add(&mut self, category: &str, fields: Fields) -> Result<Record, ContentError> {
		self.require_session()?;
		self.store.add(category, fields).await
	}

	pub async fn update(
		&mut self,
		category: &str,
		id: &str,
		fields: Fields,
	) -> Result<Record, ContentError> {
		self.require_session()?;
		let record = self.store.update(category, id, fields).await?;
		self.tabs.record_moved(category, id, &record.year);
		Ok(record)
	}

	pub async fn remove(&mut self, category: &str, id: &str, year: &str) -> Result<(), ContentError> {
		self.require_session()?;
		self.store.remove(category, id, year).await?;
		self.tabs.record_deleted(category, id);
		Ok(())
	}

	// -- Navigation ----------------------------------------------------------

	pub fn select_category(&mut self, category: &str) -> Result<TabState, ContentError> {
		Ok(self.tabs.select_category(category)?.clone())
	}

	/// Focus a record of the active category by id.
	pub fn focus(&mut self, id: &str) -> Result<TabState, ContentError> {
		let category = self.tabs.active_category().to_string();
		let record = self
			.store
			.get(&category, id)
			.ok_or_else(|| ContentError::not_found(&category, id))?;
		Ok(self.tabs.focus(&category, record.to_ref())?.clone())
	}

	pub fn unfocus(&mut self) -> TabState {
		self.tabs.unfocus().clone()
	}

	// -- Session -------------------------------------------------------------

	pub async fn sign_in(&self, credentials: &Credentials) -> Result<Session, ContentError> {
		Ok(self.auth.sign_in(credentials).await?)
	}

	pub async fn sign_out(&self) {
		self.auth.sign_out().await;
	}

	pub fn session(&self) -> Option<Session> {
		self.session.live()
	}

	pub fn subscribe(&self) -> watch::Receiver<Option<Session>> {
		self.session.subscribe()
	}
}
