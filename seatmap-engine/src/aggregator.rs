// Table aggregation
//
// Groups records by table identity and merges every confirmed per-record
// mapping into one mapping per table. Merge policy is first-seen wins: mappings
// are merged in evidence supply order and a later, different value for an
// identifier is reported as a conflict and dropped. A name already owned by
// another identifier of the same table is never given out twice.

use crate::types::{Record, SeatMapping, TableIdentity};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

/// A per-record mapping that passed every gate, tagged with its source evidence
#[derive(Debug, Clone)]
pub struct ConfirmedMapping {
    pub record: usize,
    pub evidence: usize,
    /// Source filename, for conflict reports
    pub contributor: String,
    pub mapping: SeatMapping,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MergeConflict {
    /// Identifier already mapped to a different name
    ConflictingName {
        table: TableIdentity,
        identifier: String,
        kept: String,
        rejected: String,
        contributor: String,
    },
    /// Name already owned by a different identifier of the table
    NameTaken {
        table: TableIdentity,
        identifier: String,
        name: String,
        owner: String,
        contributor: String,
    },
}

impl MergeConflict {
    pub fn table(&self) -> &TableIdentity {
        match self {
            Self::ConflictingName { table, .. } | Self::NameTaken { table, .. } => table,
        }
    }
}

/// Identifier → name for one table, written only during the merge
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TableMapping {
    entries: BTreeMap<String, String>,
    #[serde(skip)]
    owners: BTreeMap<String, String>,
}

impl TableMapping {
    pub fn get(&self, identifier: &str) -> Option<&str> {
        self.entries.get(identifier).map(String::as_str)
    }

    pub fn entries(&self) -> &BTreeMap<String, String> {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn merge(
        &mut self,
        table: &TableIdentity,
        mapping: &SeatMapping,
        contributor: &str,
        conflicts: &mut Vec<MergeConflict>,
    ) {
        for assignment in mapping.assignments() {
            let identifier = &assignment.player_id;
            let name = &assignment.name;

            if let Some(kept) = self.entries.get(identifier) {
                if kept != name {
                    warn!(
                        table = %table,
                        identifier = %identifier,
                        kept = %kept,
                        rejected = %name,
                        contributor,
                        "Table merge conflict, keeping first-seen name"
                    );
                    conflicts.push(MergeConflict::ConflictingName {
                        table: table.clone(),
                        identifier: identifier.clone(),
                        kept: kept.clone(),
                        rejected: name.clone(),
                        contributor: contributor.to_string(),
                    });
                }
                continue;
            }

            if let Some(owner) = self.owners.get(name) {
                warn!(
                    table = %table,
                    identifier = %identifier,
                    name = %name,
                    owner = %owner,
                    contributor,
                    "Name already mapped to another identifier"
                );
                conflicts.push(MergeConflict::NameTaken {
                    table: table.clone(),
                    identifier: identifier.clone(),
                    name: name.clone(),
                    owner: owner.clone(),
                    contributor: contributor.to_string(),
                });
                continue;
            }

            self.entries.insert(identifier.clone(), name.clone());
            self.owners.insert(name.clone(), identifier.clone());
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TableStatus {
    /// Every identifier seen at the table is mapped
    Resolved,
    Partial,
    Unmapped,
}

/// Final per-table result
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableReport {
    pub table: TableIdentity,
    pub status: TableStatus,
    pub mapping: TableMapping,
    /// Identifiers (self marker included) with no mapped name
    pub unmapped: Vec<String>,
    /// Record ids grouped under this table, in supply order
    pub records: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct Aggregation {
    pub tables: BTreeMap<TableIdentity, TableReport>,
    pub conflicts: Vec<MergeConflict>,
}

#[derive(Debug, Clone, Default)]
pub struct TableAggregator;

impl TableAggregator {
    pub fn new() -> Self {
        Self
    }

    /// Merge confirmed mappings into one report per table
    ///
    /// Every table with at least one record gets a report, mapped or not.
    pub fn aggregate(&self, records: &[Record], confirmed: &[ConfirmedMapping]) -> Aggregation {
        let mut ordered: Vec<&ConfirmedMapping> = confirmed.iter().collect();
        ordered.sort_by_key(|c| (c.evidence, c.record));

        let mut record_ids: BTreeMap<TableIdentity, Vec<String>> = BTreeMap::new();
        let mut identifiers: BTreeMap<TableIdentity, BTreeSet<String>> = BTreeMap::new();
        for record in records {
            let table = record.table_identity();
            record_ids.entry(table.clone()).or_default().push(record.id.clone());
            identifiers
                .entry(table)
                .or_default()
                .extend(record.seats.iter().map(|s| s.player_id.clone()));
        }

        let mut mappings: BTreeMap<TableIdentity, TableMapping> = BTreeMap::new();
        let mut conflicts = Vec::new();
        for entry in ordered {
            let Some(record) = records.get(entry.record) else {
                continue;
            };
            if entry.mapping.is_empty() {
                continue;
            }
            let table = record.table_identity();
            mappings
                .entry(table.clone())
                .or_default()
                .merge(&table, &entry.mapping, &entry.contributor, &mut conflicts);
        }

        let mut tables = BTreeMap::new();
        for (table, ids) in identifiers {
            let mapping = mappings.remove(&table).unwrap_or_default();
            let unmapped: Vec<String> = ids
                .into_iter()
                .filter(|id| mapping.get(id).is_none())
                .collect();

            let status = if mapping.is_empty() {
                TableStatus::Unmapped
            } else if unmapped.is_empty() {
                TableStatus::Resolved
            } else {
                TableStatus::Partial
            };

            debug!(
                table = %table,
                mapped = mapping.len(),
                unmapped = unmapped.len(),
                status = ?status,
                "Table aggregated"
            );

            tables.insert(
                table.clone(),
                TableReport {
                    records: record_ids.remove(&table).unwrap_or_default(),
                    table,
                    status,
                    mapping,
                    unmapped,
                },
            );
        }

        Aggregation { tables, conflicts }
    }
}
