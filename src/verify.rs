//! Verifier: reads a replaced collection back and tallies it.

use std::collections::BTreeMap;
use std::fmt;

use serde_json::Value;
use tracing::info;

use crate::skill::fields;
use crate::store::{Document, DocumentStore, StoreError};

const UNKNOWN: &str = "unknown";

/// Grouping key for the cost table. Integers sort numerically, everything else last.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum CostBucket {
    Cost(i64),
    Unknown,
}

impl fmt::Display for CostBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CostBucket::Cost(cost) => write!(f, "cost {cost}"),
            CostBucket::Unknown => f.write_str("cost unknown"),
        }
    }
}

/// Frequency tables over a skill collection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VerificationReport {
    pub total: usize,
    pub by_shard: BTreeMap<String, usize>,
    pub by_cost: BTreeMap<CostBucket, usize>,
    pub by_element: BTreeMap<String, usize>,
    pub by_category: BTreeMap<String, usize>,
    /// First document by key, for display.
    pub sample: Option<Document>,
}

impl VerificationReport {
    /// Whether the collection holds exactly `expected` documents.
    pub fn matches(&self, expected: usize) -> bool {
        self.total == expected
    }

    fn tally(&mut self, doc: &Document) {
        self.total += 1;
        *self.by_shard.entry(label(doc, fields::SOURCE_SHARD)).or_default() += 1;
        *self.by_cost.entry(cost_bucket(doc)).or_default() += 1;
        *self.by_element.entry(label(doc, fields::ELEMENT)).or_default() += 1;
        *self.by_category.entry(label(doc, fields::CATEGORY)).or_default() += 1;
    }
}

fn label(doc: &Document, field: &str) -> String {
    match doc.fields.get(field) {
        None | Some(Value::Null) => UNKNOWN.to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

fn cost_bucket(doc: &Document) -> CostBucket {
    doc.fields
        .get(fields::COST)
        .and_then(Value::as_i64)
        .map_or(CostBucket::Unknown, CostBucket::Cost)
}

/// Read `collection` and build its frequency tables.
///
/// Only store read failures are errors; a surprising count is for the caller
/// to judge via [`VerificationReport::matches`].
pub fn verify<S: DocumentStore + ?Sized>(
    store: &S,
    collection: &str,
) -> Result<VerificationReport, StoreError> {
    let docs = store.list(collection)?;
    let mut report = VerificationReport::default();
    for doc in &docs {
        report.tally(doc);
    }
    report.sample = docs.into_iter().next();

    info!(collection, documents = report.total, "collection verified");
    Ok(report)
}

impl fmt::Display for VerificationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} documents present", self.total)?;
        write_table(f, "by source shard", &self.by_shard)?;
        writeln!(f, "[by cost]")?;
        for (bucket, count) in &self.by_cost {
            writeln!(f, "  {bucket}: {count}")?;
        }
        write_table(f, "by element", &self.by_element)?;
        write_table(f, "by category", &self.by_category)?;
        if let Some(sample) = &self.sample {
            writeln!(f, "[sample] {}", sample.key)?;
            for field in [fields::NAME, fields::ELEMENT, fields::COST] {
                if let Some(value) = sample.fields.get(field) {
                    writeln!(f, "  {field}: {value}")?;
                }
            }
        }
        Ok(())
    }
}

fn write_table(
    f: &mut fmt::Formatter<'_>,
    title: &str,
    table: &BTreeMap<String, usize>,
) -> fmt::Result {
    writeln!(f, "[{title}]")?;
    for (key, count) in table {
        writeln!(f, "  {key}: {count}")?;
    }
    Ok(())
}
