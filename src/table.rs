//! # Table
//!
//! An in-memory relation: an ordered header of column names plus a set of
//! fixed-arity rows. Every higher layer (the PKB, the query planner) carries
//! data exclusively as a `Table` — there is no separate typed tuple system,
//! mirroring how the original analyzer keeps every column as a string and
//! leaves type distinctions (statement number vs. procedure name) to the
//! caller.
//!
//! Row storage is a `Vec<Row>` alongside a `HashSet<Row>` index so that
//! `contains`/`insert` stay O(1) while iteration order remains stable for
//! tests and `to_string()`.

use crate::error::TableError;
use std::collections::{HashMap, HashSet};
use std::fmt;

/// A single row: one string value per column, same order as the header.
pub type Row = Vec<String>;

/// An ordered relation header. Empty names are "anonymous" columns — they
/// hold data but never participate in a natural join.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header(Vec<String>);

impl Header {
    pub fn new(names: Vec<String>) -> Result<Self, TableError> {
        if names.is_empty() {
            return Err(TableError::NonPositiveArity);
        }
        let mut seen = HashSet::new();
        for name in &names {
            if !name.is_empty() && !seen.insert(name.clone()) {
                return Err(TableError::DuplicateColumnName(name.clone()));
            }
        }
        Ok(Header(names))
    }

    pub fn arity(&self) -> usize {
        self.0.len()
    }

    pub fn names(&self) -> &[String] {
        &self.0
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.0.iter().position(|n| n == name)
    }

    fn concat(&self, other: &Header) -> Vec<String> {
        self.0.iter().chain(other.0.iter()).cloned().collect()
    }
}

/// A relation: a header plus a deduplicated set of rows.
#[derive(Debug, Clone)]
pub struct Table {
    header: Header,
    rows: Vec<Row>,
    index: HashSet<Row>,
}

impl Table {
    /// Create an empty table with the given column names.
    pub fn new(header: Vec<String>) -> Result<Self, TableError> {
        let header = Header::new(header)?;
        Ok(Table {
            header,
            rows: Vec::new(),
            index: HashSet::new(),
        })
    }

    /// Create a table with a single anonymous column, for synonym-free
    /// boolean clauses that still need somewhere to park their rows.
    pub fn single_anonymous() -> Self {
        Table {
            header: Header(vec![String::new()]),
            rows: Vec::new(),
            index: HashSet::new(),
        }
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn arity(&self) -> usize {
        self.header.arity()
    }

    pub fn size(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> impl Iterator<Item = &Row> {
        self.rows.iter()
    }

    /// Insert a row. Duplicate rows are silently collapsed: the set
    /// semantics of a Table mean a second `insert` of the same row is a
    /// no-op, not a second copy.
    pub fn insert(&mut self, row: Row) -> Result<(), TableError> {
        if row.len() != self.header.arity() {
            return Err(TableError::ArityMismatch {
                expected: self.header.arity(),
                actual: row.len(),
            });
        }
        if self.index.insert(row.clone()) {
            self.rows.push(row);
        }
        Ok(())
    }

    pub fn contains(&self, row: &Row) -> bool {
        self.index.contains(row)
    }

    pub fn delete_row(&mut self, row: &Row) {
        if self.index.remove(row) {
            self.rows.retain(|r| r != row);
        }
    }

    /// Project onto a single column by index, deduplicating the result.
    pub fn get_column(&self, index: usize) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for row in &self.rows {
            if let Some(v) = row.get(index) {
                if seen.insert(v.clone()) {
                    out.push(v.clone());
                }
            }
        }
        out
    }

    pub fn get_column_named(&self, name: &str) -> Result<Vec<String>, TableError> {
        let idx = self
            .header
            .index_of(name)
            .ok_or_else(|| TableError::UnknownColumn(name.to_string()))?;
        Ok(self.get_column(idx))
    }

    /// Project onto a subset of columns (by index), preserving order and
    /// deduplicating resulting rows.
    pub fn columns(&self, indices: &[usize]) -> Result<Table, TableError> {
        let names: Vec<String> = indices
            .iter()
            .map(|&i| self.header.0.get(i).cloned().unwrap_or_default())
            .collect();
        let mut out = Table::new(names)?;
        for row in &self.rows {
            let projected: Row = indices
                .iter()
                .map(|&i| row.get(i).cloned().unwrap_or_default())
                .collect();
            out.insert(projected)?;
        }
        Ok(out)
    }

    /// Drop a column by index, deduplicating the resulting rows.
    pub fn drop_column(&self, index: usize) -> Result<Table, TableError> {
        let indices: Vec<usize> = (0..self.header.arity()).filter(|&i| i != index).collect();
        self.columns(&indices)
    }

    pub fn drop_column_named(&self, name: &str) -> Result<Table, TableError> {
        let idx = self
            .header
            .index_of(name)
            .ok_or_else(|| TableError::UnknownColumn(name.to_string()))?;
        self.drop_column(idx)
    }

    /// Keep only rows whose value at `index` is in `allowed`.
    pub fn filter_column(&self, index: usize, allowed: &HashSet<String>) -> Result<Table, TableError> {
        let mut out = Table::new(self.header.0.clone())?;
        for row in &self.rows {
            if let Some(v) = row.get(index) {
                if allowed.contains(v) {
                    out.insert(row.clone())?;
                }
            }
        }
        Ok(out)
    }

    pub fn filter_column_named(
        &self,
        name: &str,
        allowed: &HashSet<String>,
    ) -> Result<Table, TableError> {
        let idx = self
            .header
            .index_of(name)
            .ok_or_else(|| TableError::UnknownColumn(name.to_string()))?;
        self.filter_column(idx, allowed)
    }

    /// Rename columns in place, preserving arity and row data. Used by the
    /// query planner to turn a raw PKB relation like `Follows` into a table
    /// headed by the clause's synonym names.
    pub fn renamed(&self, names: Vec<String>) -> Result<Table, TableError> {
        let header = Header::new(names)?;
        if header.arity() != self.header.arity() {
            return Err(TableError::ArityMismatch {
                expected: self.header.arity(),
                actual: header.arity(),
            });
        }
        Ok(Table {
            header,
            rows: self.rows.clone(),
            index: self.index.clone(),
        })
    }

    /// Set-union of rows; requires identical header arity.
    pub fn concatenate(&self, other: &Table) -> Result<Table, TableError> {
        if self.header.arity() != other.header.arity() {
            return Err(TableError::ConcatenateArityMismatch {
                a: self.header.arity(),
                b: other.header.arity(),
            });
        }
        let mut out = self.clone();
        for row in &other.rows {
            out.insert(row.clone())?;
        }
        Ok(out)
    }

    /// Equi-join on explicit (self_index, other_index) column pairs. The
    /// result header is `self.header ++ other.header` with the matched
    /// columns from `other` dropped (so each logical column appears once).
    ///
    /// The smaller side builds the hash index, matching the original
    /// analyzer's choice to probe from the larger relation.
    pub fn inner_join(&self, other: &Table, pairs: &[(usize, usize)]) -> Result<Table, TableError> {
        let (build, probe, build_is_self) = if self.rows.len() <= other.rows.len() {
            (self, other, true)
        } else {
            (other, self, false)
        };

        let build_pairs: Vec<(usize, usize)> = if build_is_self {
            pairs.to_vec()
        } else {
            pairs.iter().map(|&(a, b)| (b, a)).collect()
        };

        let mut build_index: HashMap<Vec<String>, Vec<&Row>> = HashMap::new();
        for row in &build.rows {
            let key: Vec<String> = build_pairs.iter().map(|&(i, _)| row[i].clone()).collect();
            build_index.entry(key).or_default().push(row);
        }

        let other_drop: HashSet<usize> = pairs.iter().map(|&(_, j)| j).collect();
        let kept_other_indices: Vec<usize> = (0..other.header.arity())
            .filter(|i| !other_drop.contains(i))
            .collect();

        let mut out_names = self.header.0.clone();
        for &i in &kept_other_indices {
            out_names.push(other.header.0[i].clone());
        }
        let mut out = Table::new(out_names)?;

        for probe_row in &probe.rows {
            let probe_pairs: Vec<usize> = if build_is_self {
                pairs.iter().map(|&(_, j)| j).collect()
            } else {
                pairs.iter().map(|&(i, _)| i).collect()
            };
            let key: Vec<String> = probe_pairs.iter().map(|&j| probe_row[j].clone()).collect();
            if let Some(matches) = build_index.get(&key) {
                for build_row in matches {
                    let (self_row, other_row): (&Row, &Row) = if build_is_self {
                        (build_row, probe_row)
                    } else {
                        (probe_row, build_row)
                    };
                    let mut new_row = self_row.clone();
                    for &i in &kept_other_indices {
                        new_row.push(other_row[i].clone());
                    }
                    out.insert(new_row)?;
                }
            }
        }
        Ok(out)
    }

    /// Join on all matching non-empty column names; if no names match this
    /// degrades to a cross product, exactly like `inner_join` with an empty
    /// pair list.
    pub fn natural_join(&self, other: &Table) -> Result<Table, TableError> {
        let mut pairs = Vec::new();
        for (i, name) in self.header.0.iter().enumerate() {
            if name.is_empty() {
                continue;
            }
            if let Some(j) = other.header.index_of(name) {
                pairs.push((i, j));
            }
        }
        self.inner_join(other, &pairs)
    }

    /// Cross product: header is the concatenation of both headers.
    pub fn cross_join(&self, other: &Table) -> Result<Table, TableError> {
        let mut out = Table::new(self.header.concat(&other.header))?;
        for r1 in &self.rows {
            for r2 in &other.rows {
                let mut row = r1.clone();
                row.extend(r2.clone());
                out.insert(row)?;
            }
        }
        Ok(out)
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.header.0.join(","))?;
        for row in &self.rows {
            writeln!(f, "{}", row.join(","))?;
        }
        Ok(())
    }
}
