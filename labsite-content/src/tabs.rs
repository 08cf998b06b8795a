// ---------------------------------------------------------------------------
// Category Tab Controller
// ---------------------------------------------------------------------------
//
// Which category is on screen and whether one of its records is open for
// viewing/editing. Listing(c) <-> Focused(c, r); changing category always
// drops focus.
// ---------------------------------------------------------------------------

use serde::Serialize;
use thiserror::Error;

use crate::types::RecordRef;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TabError {
	#[error("Unknown category: {0}")]
	UnknownCategory(String),
	#[error("Record belongs to {requested}, but {active} is active")]
	CategoryMismatch { active: String, requested: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum TabState {
	Listing {
		category: String,
	},
	Focused {
		category: String,
		#[serde(rename = "focused")]
		record: RecordRef,
	},
}

impl TabState {
	pub fn category(&self) -> &str {
		match self {
			Self::Listing { category } | Self::Focused { category, .. } => category,
		}
	}
}

pub struct TabController {
	categories: Vec<String>,
	state: TabState,
}

impl TabController {
	/// Starts in `Listing(default)`. `default` must be one of `categories`.
	pub fn new(categories: Vec<String>, default: &str) -> Result<Self, TabError> {
		if !categories.iter().any(|c| c == default) {
			return Err(TabError::UnknownCategory(default.to_string()));
		}
		Ok(Self {
			categories,
			state: TabState::Listing {
				category: default.to_string(),
			},
		})
	}

	pub fn state(&self) -> &TabState {
		&self.state
	}

	pub fn active_category(&self) -> &str {
		self.state.category()
	}

	pub fn focused(&self) -> Option<&RecordRef> {
		match &self.state {
			TabState::Focused { record, .. } => Some(record),
			TabState::Listing { .. } => None,
		}
	}

	pub fn categories(&self) -> &[String] {
		&self.categories
	}

	// -- Transitions ---------------------------------------------------------

	pub fn select_category(&mut self, category: &str) -> Result<&TabState, TabError> {
		if !self.categories.iter().any(|c| c == category) {
			return Err(TabError::UnknownCategory(category.to_string()));
		}
		self.state = TabState::Listing {
			category: category.to_string(),
		};
		Ok(&self.state)
	}

	/// Open `record` of `category`. Re-targets focus if already focused.
	pub fn focus(&mut self, category: &str, record: RecordRef) -> Result<&TabState, TabError> {
		let active = self.active_category();
		if active != category {
			return Err(TabError::CategoryMismatch {
				active: active.to_string(),
				requested: category.to_string(),
			});
		}
		self.state = TabState::Focused {
			category: category.to_string(),
			record,
		};
		Ok(&self.state)
	}

	pub fn unfocus(&mut self) -> &TabState {
		if let TabState::Focused { category, .. } = &self.state {
			self.state = TabState::Listing {
				category: category.clone(),
			};
		}
		&self.state
	}

	/// A record was removed from the store. Drops focus if it was the one open.
	pub fn record_deleted(&mut self, category: &str, id: &str) {
		if let TabState::Focused {
			category: active,
			record,
		} = &self.state
		{
			if active == category && record.id == id {
				tracing::debug!(category, id, "Focused record deleted; back to listing");
				self.state = TabState::Listing {
					category: active.clone(),
				};
			}
		}
	}

	/// A record changed bucket. Keeps focus pointing at its new year.
	pub fn record_moved(&mut self, category: &str, id: &str, new_year: &str) {
		if let TabState::Focused {
			category: active,
			record,
		} = &mut self.state
		{
			if active == category && record.id == id {
				record.year = new_year.to_string();
			}
		}
	}
}
