// ---------------------------------------------------------------------------
// Year normalization
// ---------------------------------------------------------------------------
//
// Every effective year the store files a record under is computed here, once,
// at the store boundary. Display code never re-derives it.
// ---------------------------------------------------------------------------

use chrono::Datelike;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ContentError;
use crate::types::{Fields, YearLabel};

/// Bucket label for records without a usable year.
pub const UNCATEGORIZED: &str = "Uncategorized";

/// Field name carrying the partition key in remote documents.
pub const YEAR_FIELD: &str = "year";

// ---------------------------------------------------------------------------
// Clock
// ---------------------------------------------------------------------------

/// Source of the "current year" used when a new record omits its year.
pub trait YearClock: Send + Sync {
	fn current_year(&self) -> i32;
}

/// Calendar year from the system clock (UTC).
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl YearClock for SystemClock {
	fn current_year(&self) -> i32 {
		chrono::Utc::now().year()
	}
}

/// Always reports the same year.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub i32);

impl YearClock for FixedClock {
	fn current_year(&self) -> i32 {
		self.0
	}
}

// ---------------------------------------------------------------------------
// Policy
// ---------------------------------------------------------------------------

/// What a newly created record is filed under when the caller leaves out the
/// `year` key entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MissingYearPolicy {
	#[default]
	CurrentYear,
	Uncategorized,
}

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

/// How the caller expressed the year.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum YearInput {
	/// No `year` key at all.
	Missing,
	/// `null`, `""`, whitespace, or the sentinel itself.
	Blank,
	Label(YearLabel),
}

/// Classify a raw `year` value. Integers (and integral floats) render in
/// decimal; strings are trimmed. Booleans, arrays and objects are rejected.
pub fn classify_year(value: Option<&Value>) -> Result<YearInput, ContentError> {
	let Some(value) = value else {
		return Ok(YearInput::Missing);
	};
	match value {
		Value::Null => Ok(YearInput::Blank),
		Value::String(s) => {
			let trimmed = s.trim();
			if trimmed.is_empty() || trimmed == UNCATEGORIZED {
				Ok(YearInput::Blank)
			} else {
				Ok(YearInput::Label(trimmed.to_string()))
			}
		}
		Value::Number(n) => {
			if let Some(i) = n.as_i64() {
				return Ok(YearInput::Label(i.to_string()));
			}
			if let Some(u) = n.as_u64() {
				return Ok(YearInput::Label(u.to_string()));
			}
			match n.as_f64() {
				// `i64::MAX as f64` is 2^63, outside the range.
				Some(f)
					if f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 =>
				{
					Ok(YearInput::Label(format!("{}", f as i64)))
				}
				_ => Err(ContentError::InvalidRecord(format!(
					"year must be a whole number in range, got {n}"
				))),
			}
		}
		other => Err(ContentError::InvalidRecord(format!(
			"year must be a string or integer, got {other}"
		))),
	}
}

// ---------------------------------------------------------------------------
// Effective year per entry point
// ---------------------------------------------------------------------------

/// Effective year for a freshly created record.
pub fn year_for_create(
	fields: &Fields,
	policy: MissingYearPolicy,
	clock: &dyn YearClock,
) -> Result<YearLabel, ContentError> {
	Ok(match classify_year(fields.get(YEAR_FIELD))? {
		YearInput::Label(label) => label,
		YearInput::Blank => UNCATEGORIZED.to_string(),
		YearInput::Missing => match policy {
			MissingYearPolicy::CurrentYear => clock.current_year().to_string(),
			MissingYearPolicy::Uncategorized => UNCATEGORIZED.to_string(),
		},
	})
}

/// Effective year after an edit. Leaving `year` out keeps the prior bucket.
pub fn year_for_update(fields: &Fields, prior: &str) -> Result<YearLabel, ContentError> {
	Ok(match classify_year(fields.get(YEAR_FIELD))? {
		YearInput::Label(label) => label,
		YearInput::Blank => UNCATEGORIZED.to_string(),
		YearInput::Missing => prior.to_string(),
	})
}

/// Effective year of a document read back from the remote store. Never fails:
/// anything unusable lands in the sentinel bucket.
pub fn year_for_load(fields: &Fields) -> YearLabel {
	match classify_year(fields.get(YEAR_FIELD)) {
		Ok(YearInput::Label(label)) => label,
		Ok(_) => UNCATEGORIZED.to_string(),
		Err(e) => {
			tracing::debug!("Unusable year on remote document: {}", e);
			UNCATEGORIZED.to_string()
		}
	}
}

/// Value written to the remote `year` field. The sentinel is stored as an
/// empty string so a reload files the record back under it.
pub fn remote_year_value(label: &str) -> Value {
	if label == UNCATEGORIZED {
		Value::String(String::new())
	} else {
		Value::String(label.to_string())
	}
}

/// Descending plain string order. Four-digit years sort newest first;
/// `"Uncategorized"` sorts ahead of any label starting with a digit.
pub fn sort_years_desc(years: &mut [YearLabel]) {
	years.sort_by(|a, b| b.cmp(a));
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	fn fields(v: Value) -> Fields {
		v.as_object().cloned().unwrap()
	}

	#[test]
	fn missing_year_follows_policy() {
		let clock = FixedClock(2026);
		let f = fields(json!({"title": "A"}));
		assert_eq!(
			year_for_create(&f, MissingYearPolicy::CurrentYear, &clock).unwrap(),
			"2026"
		);
		assert_eq!(
			year_for_create(&f, MissingYearPolicy::Uncategorized, &clock).unwrap(),
			UNCATEGORIZED
		);
	}

	#[test]
	fn blank_year_is_uncategorized_regardless_of_policy() {
		let clock = FixedClock(2026);
		for raw in [json!(""), json!("   "), json!(null), json!("Uncategorized")] {
			let f = fields(json!({ "year": raw }));
			assert_eq!(
				year_for_create(&f, MissingYearPolicy::CurrentYear, &clock).unwrap(),
				UNCATEGORIZED
			);
		}
	}

	#[test]
	fn integer_years_render_in_decimal() {
		let clock = FixedClock(2026);
		let f = fields(json!({"year": 2023}));
		assert_eq!(
			year_for_create(&f, MissingYearPolicy::CurrentYear, &clock).unwrap(),
			"2023"
		);
		let f = fields(json!({"year": 2021.0}));
		assert_eq!(year_for_update(&f, "2020").unwrap(), "2021");
	}

	#[test]
	fn strings_are_trimmed() {
		let f = fields(json!({"year": " 2019 "}));
		assert_eq!(year_for_update(&f, "2020").unwrap(), "2019");
	}

	#[test]
	fn update_without_year_keeps_prior() {
		let f = fields(json!({"title": "renamed"}));
		assert_eq!(year_for_update(&f, "2022").unwrap(), "2022");
	}

	#[test]
	fn non_scalar_years_are_rejected() {
		for raw in [json!(true), json!([2020]), json!({"y": 1}), json!(20.5)] {
			let f = fields(json!({ "year": raw }));
			assert!(matches!(
				year_for_update(&f, "2020"),
				Err(ContentError::InvalidRecord(_))
			));
		}
	}

	#[test]
	fn out_of_range_float_years_are_rejected() {
		for raw in [json!(1e20), json!(-1e20), json!(9.3e18)] {
			let f = fields(json!({ "year": raw }));
			assert!(matches!(
				year_for_update(&f, "2020"),
				Err(ContentError::InvalidRecord(_))
			));
		}
		let f = fields(json!({"year": 1e3}));
		assert_eq!(year_for_update(&f, "2020").unwrap(), "1000");
	}

	#[test]
	fn load_never_fails() {
		assert_eq!(year_for_load(&fields(json!({"year": [1]}))), UNCATEGORIZED);
		assert_eq!(year_for_load(&fields(json!({}))), UNCATEGORIZED);
		assert_eq!(year_for_load(&fields(json!({"year": "2024"}))), "2024");
	}

	#[test]
	fn sentinel_is_written_as_empty_string() {
		assert_eq!(remote_year_value(UNCATEGORIZED), json!(""));
		assert_eq!(remote_year_value("2024"), json!("2024"));
	}

	#[test]
	fn years_sort_descending() {
		let mut years = vec![
			"2021".to_string(),
			UNCATEGORIZED.to_string(),
			"2024".to_string(),
			"2023".to_string(),
		];
		sort_years_desc(&mut years);
		assert_eq!(years, vec![UNCATEGORIZED, "2024", "2023", "2021"]);
	}
}
