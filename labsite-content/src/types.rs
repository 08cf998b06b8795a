use serde::{Deserialize, Serialize};

/// Open, category-specific attribute bag of a record.
pub type Fields = serde_json::Map<String, serde_json::Value>;

/// Effective year label a record is filed under.
pub type YearLabel = String;

/// Records of one category, keyed by effective year.
pub type YearBuckets = im::OrdMap<YearLabel, im::Vector<Record>>;

/// The whole projection: `category -> year -> records`.
pub type PartitionMap = im::OrdMap<String, YearBuckets>;

/// One content item (a lecture, an event, a member, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
	pub id: String,
	pub year: YearLabel,
	pub fields: Fields,
}

impl Record {
	pub fn new(id: impl Into<String>, year: impl Into<String>, fields: Fields) -> Self {
		Self {
			id: id.into(),
			year: year.into(),
			fields,
		}
	}

	/// Lightweight pointer used by the tab controller.
	pub fn to_ref(&self) -> RecordRef {
		RecordRef {
			id: self.id.clone(),
			year: self.year.clone(),
		}
	}

	/// String view of a field, if it holds a string.
	pub fn field_str(&self, key: &str) -> Option<&str> {
		self.fields.get(key).and_then(|v| v.as_str())
	}
}

/// Identifies a record by id together with the bucket it was last seen in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordRef {
	pub id: String,
	pub year: YearLabel,
}

/// A document as returned by a remote collection scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteDocument {
	pub id: String,
	pub fields: Fields,
}
