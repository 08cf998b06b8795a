// ---------------------------------------------------------------------------
// PartitionedContentStore: year-partitioned projection of remote collections
// ---------------------------------------------------------------------------
//
// Keeps `category -> year -> [records]` in memory and mirrors every add,
// update and remove to the remote collection client. Local state changes only
// after the remote call has succeeded, so a failed or abandoned call leaves
// the map exactly as it was.
// ---------------------------------------------------------------------------

use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;

use crate::error::ContentError;
use crate::remote::RemoteCollectionClient;
use crate::schema::SchemaRegistry;
use crate::types::{Fields, PartitionMap, Record, YearBuckets};
use crate::year::{
	remote_year_value, sort_years_desc, year_for_create, year_for_load, year_for_update,
	YearClock, YEAR_FIELD,
};

// ---------------------------------------------------------------------------
// Load report
// ---------------------------------------------------------------------------

/// One category that could not be (re)loaded.
#[derive(Debug)]
pub struct LoadFailure {
	pub category: String,
	pub error: ContentError,
}

/// Outcome of `load`: fetches are independent, so some categories may
/// populate while others fail.
#[derive(Debug, Default)]
pub struct LoadReport {
	pub loaded: Vec<String>,
	pub failures: Vec<LoadFailure>,
}

impl LoadReport {
	pub fn is_complete(&self) -> bool {
		self.failures.is_empty()
	}
}

/// Serializable view of one year bucket, used for display in `years()` order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct YearSection {
	pub year: String,
	pub records: Vec<Record>,
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Fields without the partition key; the year lives on `Record::year`.
fn strip_year(mut fields: Fields) -> Fields {
	fields.remove(YEAR_FIELD);
	fields
}

fn group_by_year(docs: Vec<crate::types::RemoteDocument>) -> YearBuckets {
	let mut buckets = YearBuckets::new();
	for doc in docs {
		let year = year_for_load(&doc.fields);
		let record = Record::new(doc.id, year.clone(), strip_year(doc.fields));
		match buckets.get_mut(&year) {
			Some(list) => list.push_back(record),
			None => {
				buckets.insert(year, im::vector![record]);
			}
		}
	}
	buckets
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

pub struct PartitionedContentStore {
	client: Arc<dyn RemoteCollectionClient>,
	schemas: SchemaRegistry,
	clock: Arc<dyn YearClock>,
	partitions: PartitionMap,
}

impl PartitionedContentStore {
	// -- Lifecycle -----------------------------------------------------------

	pub fn new(
		client: Arc<dyn RemoteCollectionClient>,
		schemas: SchemaRegistry,
		clock: Arc<dyn YearClock>,
	) -> Self {
		Self {
			client,
			schemas,
			clock,
			partitions: PartitionMap::new(),
		}
	}

	/// Fetch the named collections (concurrently) and rebuild their
	/// partitions from scratch. Partitions are swapped in only once every
	/// fetch has resolved. A category whose fetch fails is left absent.
	pub async fn load(&mut self, categories: &[String]) -> LoadReport {
		let mut report = LoadReport::default();
		let mut seen = HashSet::new();
		let mut wanted = Vec::new();

		for category in categories {
			if !seen.insert(category.as_str()) {
				continue;
			}
			if self.schemas.contains(category) {
				wanted.push(category.clone());
			} else {
				report.failures.push(LoadFailure {
					category: category.clone(),
					error: ContentError::InvalidRecord(format!("unknown category: {category}")),
				});
			}
		}

		let client = Arc::clone(&self.client);
		let fetches = wanted.iter().map(|category| {
			let client = Arc::clone(&client);
			async move { client.fetch_all(category).await }
		});
		let results = futures::future::join_all(fetches).await;

		for (category, result) in wanted.into_iter().zip(results) {
			match result {
				Ok(docs) => {
					let count = docs.len();
					self.partitions.insert(category.clone(), group_by_year(docs));
					tracing::debug!(category = %category, records = count, "Loaded category");
					report.loaded.push(category);
				}
				Err(e) => {
					tracing::warn!(category = %category, error = %e, "Failed to load category");
					self.partitions.remove(&category);
					let error = ContentError::from_remote(&category, "", e);
					report.failures.push(LoadFailure { category, error });
				}
			}
		}

		report
	}

	// -- CRUD ----------------------------------------------------------------

	/// Create a record remotely, then append it to its year bucket.
	pub async fn add(&mut self, category: &str, fields: Fields) -> Result<Record, ContentError> {
		let missing_year = {
			let schema = self.schemas.get(category).ok_or_else(|| {
				ContentError::InvalidRecord(format!("unknown category: {category}"))
			})?;
			schema.validate(&fields)?;
			schema.missing_year
		};
		let year = year_for_create(&fields, missing_year, self.clock.as_ref())?;

		let fields = strip_year(fields);
		let mut payload = fields.clone();
		payload.insert(YEAR_FIELD.to_string(), remote_year_value(&year));

		let id = self.client.create(category, &payload).await.map_err(|e| {
			tracing::warn!(category, error = %e, "Remote create failed");
			ContentError::from_remote(category, "", e)
		})?;

		let record = Record::new(id, year, fields);
		self.append(category, record.clone());
		tracing::debug!(category, id = %record.id, year = %record.year, "Added record");
		Ok(record)
	}

	/// Merge `new_fields` into an existing record. The record is found by id
	/// alone; if its effective year changes it moves to the end of the new
	/// bucket, otherwise it keeps its position.
	pub async fn update(
		&mut self,
		category: &str,
		id: &str,
		new_fields: Fields,
	) -> Result<Record, ContentError> {
		let (old_year, index) = self
			.locate(category, id)
			.ok_or_else(|| ContentError::not_found(category, id))?;
		let existing = self.partitions[category][&old_year][index].clone();

		let new_year = year_for_update(&new_fields, &old_year)?;
		let mut merged = existing.fields.clone();
		for (key, value) in &new_fields {
			if key != YEAR_FIELD {
				merged.insert(key.clone(), value.clone());
			}
		}
		if let Some(schema) = self.schemas.get(category) {
			schema.validate(&merged)?;
		}

		let mut patch = strip_year(new_fields.clone());
		if new_fields.contains_key(YEAR_FIELD) {
			patch.insert(YEAR_FIELD.to_string(), remote_year_value(&new_year));
		}
		if patch.is_empty() {
			return Ok(existing);
		}

		self.client.update(category, id, &patch).await.map_err(|e| {
			tracing::warn!(category, id, error = %e, "Remote update failed");
			ContentError::from_remote(category, id, e)
		})?;

		let updated = Record::new(id, new_year.clone(), merged);
		if new_year == old_year {
			if let Some(list) = self
				.partitions
				.get_mut(category)
				.and_then(|buckets| buckets.get_mut(&old_year))
			{
				list.set(index, updated.clone());
			}
		} else {
			self.take(category, &old_year, index);
			self.append(category, updated.clone());
			tracing::debug!(category, id, from = %old_year, to = %new_year, "Moved record");
		}
		Ok(updated)
	}

	/// Delete a record the caller has seen in `category/year`.
	pub async fn remove(&mut self, category: &str, id: &str, year: &str) -> Result<(), ContentError> {
		let index = self
			.partitions
			.get(category)
			.and_then(|buckets| buckets.get(year))
			.and_then(|list| list.iter().position(|r| r.id == id))
			.ok_or_else(|| ContentError::not_found(category, id))?;

		self.client.delete(category, id).await.map_err(|e| {
			tracing::warn!(category, id, error = %e, "Remote delete failed");
			ContentError::from_remote(category, id, e)
		})?;

		self.take(category, year, index);
		tracing::debug!(category, id, year, "Removed record");
		Ok(())
	}

	// -- Accessors -----------------------------------------------------------

	/// Year labels present in a category, newest first.
	pub fn years(&self, category: &str) -> Vec<String> {
		let mut years: Vec<String> = self
			.partitions
			.get(category)
			.map(|buckets| buckets.keys().cloned().collect())
			.unwrap_or_default();
		sort_years_desc(&mut years);
		years
	}

	/// Buckets of a category in `years()` order.
	pub fn sections(&self, category: &str) -> Vec<YearSection> {
		self.years(category)
			.into_iter()
			.map(|year| {
				let records = self.bucket(category, &year);
				YearSection { year, records }
			})
			.collect()
	}

	/// Snapshot of the whole map. Structural sharing keeps this cheap.
	pub fn partitions(&self) -> PartitionMap {
		self.partitions.clone()
	}

	pub fn buckets(&self, category: &str) -> Option<&YearBuckets> {
		self.partitions.get(category)
	}

	pub fn bucket(&self, category: &str, year: &str) -> Vec<Record> {
		self.partitions
			.get(category)
			.and_then(|buckets| buckets.get(year))
			.map(|list| list.iter().cloned().collect())
			.unwrap_or_default()
	}

	pub fn get(&self, category: &str, id: &str) -> Option<Record> {
		let (year, index) = self.locate(category, id)?;
		Some(self.partitions[category][&year][index].clone())
	}

	/// Year bucket currently holding `id`.
	pub fn find_year(&self, category: &str, id: &str) -> Option<String> {
		self.locate(category, id).map(|(year, _)| year)
	}

	/// Number of records held for a category.
	pub fn len(&self, category: &str) -> usize {
		self.partitions
			.get(category)
			.map_or(0, |buckets| buckets.values().map(|list| list.len()).sum())
	}

	pub fn is_loaded(&self, category: &str) -> bool {
		self.partitions.contains_key(category)
	}

	pub fn schemas(&self) -> &SchemaRegistry {
		&self.schemas
	}

	// -- Internals -----------------------------------------------------------

	fn locate(&self, category: &str, id: &str) -> Option<(String, usize)> {
		self.partitions.get(category)?.iter().find_map(|(year, list)| {
			list.iter()
				.position(|r| r.id == id)
				.map(|index| (year.clone(), index))
		})
	}

	fn append(&mut self, category: &str, record: Record) {
		if !self.partitions.contains_key(category) {
			self.partitions.insert(category.to_string(), YearBuckets::new());
		}
		let Some(buckets) = self.partitions.get_mut(category) else {
			return;
		};
		match buckets.get_mut(&record.year) {
			Some(list) => list.push_back(record),
			None => {
				buckets.insert(record.year.clone(), im::vector![record]);
			}
		}
	}

	/// Remove the record at `index` and prune the bucket if it empties.
	fn take(&mut self, category: &str, year: &str, index: usize) -> Option<Record> {
		let buckets = self.partitions.get_mut(category)?;
		let list = buckets.get_mut(year)?;
		let record = list.remove(index);
		if list.is_empty() {
			buckets.remove(year);
		}
		Some(record)
	}
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
