// ---------------------------------------------------------------------------
// Property tests for the partitioned content store
// ---------------------------------------------------------------------------
//
// Random add/update/remove sequences (some run against a failing remote) are
// replayed against the store and against a plain `year -> ids` model. After
// every step the store must match the model exactly.
// ---------------------------------------------------------------------------

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use labsite_content_engine::remote::MemoryCollectionClient;
use labsite_content_engine::schema::SchemaRegistry;
use labsite_content_engine::store::PartitionedContentStore;
use labsite_content_engine::types::Fields;
use labsite_content_engine::year::{FixedClock, UNCATEGORIZED};
use proptest::prelude::*;
use proptest::test_runner::TestCaseError;
use serde_json::json;

const THIS_YEAR: i32 = 2026;
const CATEGORY: &str = "books";

type Model = BTreeMap<String, Vec<String>>;

#[derive(Debug, Clone)]
enum YearChoice {
	Omitted,
	Blank,
	Text(String),
	Number(i64),
}

impl YearChoice {
	fn apply(&self, fields: &mut Fields) {
		let value = match self {
			Self::Omitted => return,
			Self::Blank => json!(""),
			Self::Text(s) => json!(s),
			Self::Number(n) => json!(n),
		};
		fields.insert("year".into(), value);
	}

	/// Bucket the store should file under; `fallback` applies when omitted.
	fn label(&self, fallback: &str) -> String {
		match self {
			Self::Omitted => fallback.to_string(),
			Self::Blank => UNCATEGORIZED.to_string(),
			Self::Text(s) => s.clone(),
			Self::Number(n) => n.to_string(),
		}
	}
}

#[derive(Debug, Clone)]
enum Op {
	Add { year: YearChoice, fail: bool },
	Update { target: usize, year: YearChoice, fail: bool },
	Remove { target: usize, fail: bool },
}

impl Op {
	fn fail(&self) -> bool {
		match self {
			Op::Add { fail, .. } | Op::Update { fail, .. } | Op::Remove { fail, .. } => *fail,
		}
	}
}

fn year_strategy() -> impl Strategy<Value = YearChoice> {
	prop_oneof![
		Just(YearChoice::Omitted),
		Just(YearChoice::Blank),
		(2019i64..2027).prop_map(|y| YearChoice::Text(y.to_string())),
		(2019i64..2027).prop_map(YearChoice::Number),
	]
}

fn op_strategy() -> impl Strategy<Value = Op> {
	let fail = prop::bool::weighted(0.15);
	prop_oneof![
		3 => (year_strategy(), fail.clone()).prop_map(|(year, fail)| Op::Add { year, fail }),
		2 => (any::<usize>(), year_strategy(), fail.clone())
			.prop_map(|(target, year, fail)| Op::Update { target, year, fail }),
		1 => (any::<usize>(), fail).prop_map(|(target, fail)| Op::Remove { target, fail }),
	]
}

// ---------------------------------------------------------------------------
// Model helpers
// ---------------------------------------------------------------------------

fn all_ids(model: &Model) -> Vec<String> {
	model.values().flatten().cloned().collect()
}

fn year_of(model: &Model, id: &str) -> Option<String> {
	model
		.iter()
		.find(|(_, ids)| ids.iter().any(|i| i == id))
		.map(|(year, _)| year.clone())
}

fn take(model: &mut Model, year: &str, id: &str) {
	if let Some(ids) = model.get_mut(year) {
		ids.retain(|i| i != id);
		if ids.is_empty() {
			model.remove(year);
		}
	}
}

fn snapshot(store: &PartitionedContentStore) -> Model {
	store
		.buckets(CATEGORY)
		.map(|buckets| {
			buckets
				.iter()
				.map(|(year, list)| (year.clone(), list.iter().map(|r| r.id.clone()).collect()))
				.collect()
		})
		.unwrap_or_default()
}

fn fail(e: impl std::fmt::Display) -> TestCaseError {
	TestCaseError::fail(e.to_string())
}

// ---------------------------------------------------------------------------
// Runner
// ---------------------------------------------------------------------------

async fn check(
	store: &PartitionedContentStore,
	client: &MemoryCollectionClient,
	model: &Model,
) -> Result<(), TestCaseError> {
	let actual = snapshot(store);
	prop_assert_eq!(&actual, model);
	prop_assert!(actual.values().all(|ids| !ids.is_empty()), "empty bucket kept");

	let mut seen = HashSet::new();
	for id in actual.values().flatten() {
		prop_assert!(seen.insert(id.clone()), "{} filed twice", id);
	}

	let mut keys: Vec<String> = actual.keys().cloned().collect();
	keys.sort_by(|a, b| b.cmp(a));
	prop_assert_eq!(store.years(CATEGORY), keys);
	prop_assert_eq!(client.count(CATEGORY).await, seen.len());
	Ok(())
}

async fn replay(
	ops: Vec<Op>,
) -> Result<(PartitionedContentStore, Arc<MemoryCollectionClient>, Model), TestCaseError> {
	let client = Arc::new(MemoryCollectionClient::new());
	let mut store = PartitionedContentStore::new(
		client.clone(),
		SchemaRegistry::lab_site(),
		Arc::new(FixedClock(THIS_YEAR)),
	);
	let mut model = Model::new();

	for (step, op) in ops.into_iter().enumerate() {
		let ids = all_ids(&model);
		let target_id = match &op {
			Op::Add { .. } => None,
			Op::Update { target, .. } | Op::Remove { target, .. } => {
				if ids.is_empty() {
					continue;
				}
				Some(ids[target % ids.len()].clone())
			}
		};

		let before = store.partitions();
		let failing = op.fail();
		client.set_unavailable(failing);

		match (&op, target_id) {
			(Op::Add { year, .. }, _) => {
				let mut fields = Fields::new();
				fields.insert("title".into(), json!(format!("book {step}")));
				year.apply(&mut fields);
				let result = store.add(CATEGORY, fields).await;
				if !failing {
					let record = result.map_err(fail)?;
					let expected = year.label(&THIS_YEAR.to_string());
					prop_assert_eq!(&record.year, &expected);
					model.entry(expected).or_default().push(record.id);
				} else {
					prop_assert!(result.is_err());
				}
			}
			(Op::Update { year, .. }, Some(id)) => {
				let old = year_of(&model, &id).ok_or_else(|| fail("model lost id"))?;
				let mut fields = Fields::new();
				fields.insert("title".into(), json!(format!("book {step} (edited)")));
				year.apply(&mut fields);
				let result = store.update(CATEGORY, &id, fields).await;
				if !failing {
					let record = result.map_err(fail)?;
					let new = year.label(&old);
					prop_assert_eq!(&record.year, &new);
					if new != old {
						take(&mut model, &old, &id);
						model.entry(new).or_default().push(id);
					}
				} else {
					prop_assert!(result.is_err());
				}
			}
			(Op::Remove { .. }, Some(id)) => {
				let year = year_of(&model, &id).ok_or_else(|| fail("model lost id"))?;
				let result = store.remove(CATEGORY, &id, &year).await;
				if !failing {
					result.map_err(fail)?;
					take(&mut model, &year, &id);
				} else {
					prop_assert!(result.is_err());
				}
			}
			_ => {}
		}

		client.set_unavailable(false);
		if failing {
			prop_assert_eq!(store.partitions(), before);
		}
		check(&store, &client, &model).await?;
	}

	Ok((store, client, model))
}

proptest! {
	#![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]

	#[test]
	fn store_matches_model(ops in prop::collection::vec(op_strategy(), 0..40)) {
		tokio_test::block_on(replay(ops))?;
	}

	#[test]
	fn reload_refiles_every_record(ops in prop::collection::vec(op_strategy(), 0..40)) {
		let (_store, client, model) = tokio_test::block_on(replay(ops))?;

		let mut reloaded = PartitionedContentStore::new(
			client,
			SchemaRegistry::lab_site(),
			Arc::new(FixedClock(THIS_YEAR)),
		);
		let report = tokio_test::block_on(reloaded.load(&[CATEGORY.to_string()]));
		prop_assert!(report.is_complete());

		for (year, ids) in &model {
			for id in ids {
				let found = reloaded.find_year(CATEGORY, id);
				prop_assert_eq!(found.as_deref(), Some(year.as_str()));
			}
		}
		prop_assert_eq!(reloaded.len(CATEGORY), all_ids(&model).len());
	}
}
