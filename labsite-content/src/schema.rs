// ---------------------------------------------------------------------------
// Category schemas
// ---------------------------------------------------------------------------
//
// One generic store serves every content type; what differs per category is
// looked up here: which fields a record must carry, which fields hold counts,
// and how a record created without a year is filed.
// ---------------------------------------------------------------------------

use serde::Serialize;
use serde_json::Value;

use crate::error::ContentError;
use crate::types::Fields;
use crate::year::MissingYearPolicy;

/// Minimal shape rules for one category.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategorySchema {
	pub name: String,
	pub required: Vec<String>,
	pub counts: Vec<String>,
	pub missing_year: MissingYearPolicy,
}

impl CategorySchema {
	pub fn new(name: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			required: Vec::new(),
			counts: Vec::new(),
			missing_year: MissingYearPolicy::CurrentYear,
		}
	}

	pub fn require(mut self, fields: &[&str]) -> Self {
		self.required.extend(fields.iter().map(|f| f.to_string()));
		self
	}

	pub fn counts(mut self, fields: &[&str]) -> Self {
		self.counts.extend(fields.iter().map(|f| f.to_string()));
		self
	}

	pub fn missing_year(mut self, policy: MissingYearPolicy) -> Self {
		self.missing_year = policy;
		self
	}

	/// Check a complete field set (a new record, or an existing record with
	/// an edit merged in).
	pub fn validate(&self, fields: &Fields) -> Result<(), ContentError> {
		if fields.contains_key("id") {
			return Err(ContentError::InvalidRecord(
				"id is assigned by the remote store and cannot be set".into(),
			));
		}

		for name in &self.required {
			match fields.get(name) {
				None | Some(Value::Null) => {
					return Err(ContentError::InvalidRecord(format!(
						"{}: {} is required",
						self.name, name
					)));
				}
				Some(Value::String(s)) if s.trim().is_empty() => {
					return Err(ContentError::InvalidRecord(format!(
						"{}: {} must not be blank",
						self.name, name
					)));
				}
				Some(_) => {}
			}
		}

		for name in &self.counts {
			if let Some(value) = fields.get(name) {
				if !is_count(value) {
					return Err(ContentError::InvalidRecord(format!(
						"{}: {} must be a non-negative whole number",
						self.name, name
					)));
				}
			}
		}

		Ok(())
	}
}

/// Form inputs arrive either as numbers or as digit strings.
fn is_count(value: &Value) -> bool {
	match value {
		Value::Number(n) => n.as_u64().is_some(),
		Value::String(s) => {
			let s = s.trim();
			s.is_empty() || s.bytes().all(|b| b.is_ascii_digit())
		}
		_ => false,
	}
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// `category -> schema`, in registration order.
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
	schemas: Vec<CategorySchema>,
}

impl SchemaRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	/// The collections the lab website keeps.
	pub fn lab_site() -> Self {
		let mut registry = Self::new();
		for resource in ["lectures", "books", "videos", "researchPapers"] {
			registry.register(CategorySchema::new(resource).require(&["title"]));
		}
		registry.register(
			CategorySchema::new("events")
				.require(&["title"])
				.counts(&["capacity", "registered"]),
		);
		registry.register(
			CategorySchema::new("courses")
				.require(&["title"])
				.counts(&["credits", "students"]),
		);
		registry.register(
			CategorySchema::new("labs")
				.require(&["title"])
				.counts(&["capacity", "enrolled"]),
		);
		registry.register(CategorySchema::new("blogs").require(&["title"]));
		registry.register(
			CategorySchema::new("members")
				.require(&["name"])
				.missing_year(MissingYearPolicy::Uncategorized),
		);
		registry.register(CategorySchema::new("homeUpdates").require(&["title", "description"]));
		registry
	}

	/// Add a schema, replacing any existing one with the same name in place.
	pub fn register(&mut self, schema: CategorySchema) {
		match self.schemas.iter_mut().find(|s| s.name == schema.name) {
			Some(existing) => *existing = schema,
			None => self.schemas.push(schema),
		}
	}

	pub fn get(&self, category: &str) -> Option<&CategorySchema> {
		self.schemas.iter().find(|s| s.name == category)
	}

	pub fn contains(&self, category: &str) -> bool {
		self.get(category).is_some()
	}

	pub fn iter(&self) -> impl Iterator<Item = &CategorySchema> {
		self.schemas.iter()
	}

	pub fn categories(&self) -> Vec<String> {
		self.schemas.iter().map(|s| s.name.clone()).collect()
	}
}
