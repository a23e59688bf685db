//! Read-only columnar dataset view consumed by training and inference.
//!
//! A [`ColumnarDataset`] stores, per feature column, the list of rows that
//! hold a *non-default* value for that column, together with the values
//! themselves. Rows absent from a column's list implicitly hold the column
//! default: `0.0` for continuous features, "absent" for binary features.
//!
//! The view is produced by an external dataset builder and consumed here
//! without modification. Two contracts are inherited from that builder:
//!
//! - Continuous columns list their entries in **descending value order**.
//!   Candidate selection during split search folds entries in list order,
//!   so the ordering is part of the correctness contract, not a detail.
//! - Continuous values are normalized below the binary presence value
//!   ([`BINARY_PRESENT`]); values at or above it never form a split
//!   candidate of their own.

use thiserror::Error;

/// Value implied by presence in a binary column's row list.
///
/// Also serves as the default "no-split" threshold the split search compares
/// explicit continuous values against.
pub const BINARY_PRESENT: f32 = 1.0;

/// Interpretation of column entries, shared by every column of a dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureMode {
    /// Presence/absence only; a listed row implicitly holds [`BINARY_PRESENT`].
    Binary,
    /// Listed rows carry an explicit numeric value; absent rows hold `0.0`.
    Continuous,
}

/// Errors reported when assembling a dataset view from column lists.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DatasetError {
    /// A column's row list and value list differ in length.
    #[error("column {column}: {rows} row ids but {values} values")]
    LengthMismatch {
        column: usize,
        rows: usize,
        values: usize,
    },
    /// A column references a row outside `0..n_rows`.
    #[error("column {column}: row id {row} out of range (n_rows = {n_rows})")]
    RowOutOfRange {
        column: usize,
        row: u32,
        n_rows: usize,
    },
}

/// Column-compressed training data.
///
/// Per-column offsets and lengths index two parallel arrays holding the
/// non-default row ids and their values. Binary datasets store no values at
/// all; presence in the row list is the value.
///
/// The view is immutable and may be shared across repeated tree builds.
#[derive(Debug, Clone)]
pub struct ColumnarDataset {
    mode: FeatureMode,
    n_rows: usize,
    col_offset: Vec<usize>,
    col_len: Vec<usize>,
    row_ids: Vec<u32>,
    values: Vec<f32>,
}

impl ColumnarDataset {
    /// Build a continuous-mode view from per-column `(row_ids, values)` lists.
    ///
    /// # Errors
    ///
    /// Returns [`DatasetError`] if a column's lists are misaligned or a row
    /// id falls outside `0..n_rows`.
    pub fn continuous(
        n_rows: usize,
        columns: Vec<(Vec<u32>, Vec<f32>)>,
    ) -> Result<Self, DatasetError> {
        let mut col_offset = Vec::with_capacity(columns.len());
        let mut col_len = Vec::with_capacity(columns.len());
        let mut row_ids = Vec::new();
        let mut values = Vec::new();

        for (c, (rows, vals)) in columns.into_iter().enumerate() {
            if rows.len() != vals.len() {
                return Err(DatasetError::LengthMismatch {
                    column: c,
                    rows: rows.len(),
                    values: vals.len(),
                });
            }
            Self::check_rows(c, &rows, n_rows)?;
            col_offset.push(row_ids.len());
            col_len.push(rows.len());
            row_ids.extend(rows);
            values.extend(vals);
        }

        Ok(Self {
            mode: FeatureMode::Continuous,
            n_rows,
            col_offset,
            col_len,
            row_ids,
            values,
        })
    }

    /// Build a binary-mode view from per-column presence lists.
    ///
    /// # Errors
    ///
    /// Returns [`DatasetError::RowOutOfRange`] if a row id falls outside
    /// `0..n_rows`.
    pub fn binary(n_rows: usize, columns: Vec<Vec<u32>>) -> Result<Self, DatasetError> {
        let mut col_offset = Vec::with_capacity(columns.len());
        let mut col_len = Vec::with_capacity(columns.len());
        let mut row_ids = Vec::new();

        for (c, rows) in columns.into_iter().enumerate() {
            Self::check_rows(c, &rows, n_rows)?;
            col_offset.push(row_ids.len());
            col_len.push(rows.len());
            row_ids.extend(rows);
        }

        Ok(Self {
            mode: FeatureMode::Binary,
            n_rows,
            col_offset,
            col_len,
            row_ids,
            values: Vec::new(),
        })
    }

    fn check_rows(column: usize, rows: &[u32], n_rows: usize) -> Result<(), DatasetError> {
        for &row in rows {
            if row as usize >= n_rows {
                return Err(DatasetError::RowOutOfRange {
                    column,
                    row,
                    n_rows,
                });
            }
        }
        Ok(())
    }

    /// Number of feature columns.
    #[inline]
    pub fn n_columns(&self) -> usize {
        self.col_len.len()
    }

    /// Number of rows covered by the view (listed or default).
    #[inline]
    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    /// Dataset-wide feature interpretation.
    #[inline]
    pub fn mode(&self) -> FeatureMode {
        self.mode
    }

    /// Non-default entries of column `c`.
    #[inline]
    pub fn column(&self, c: usize) -> ColumnView<'_> {
        let begin = self.col_offset[c];
        let end = begin + self.col_len[c];
        ColumnView {
            rows: &self.row_ids[begin..end],
            values: match self.mode {
                FeatureMode::Binary => &[],
                FeatureMode::Continuous => &self.values[begin..end],
            },
        }
    }
}

/// Borrowed non-default entries of a single column.
#[derive(Debug, Clone, Copy)]
pub struct ColumnView<'a> {
    rows: &'a [u32],
    values: &'a [f32],
}

impl<'a> ColumnView<'a> {
    /// Number of non-default entries.
    #[inline]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the column has no non-default entries.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// `(row, value)` pairs in list order. Binary columns yield
    /// [`BINARY_PRESENT`] for every listed row.
    #[inline]
    pub fn entries(&self) -> impl Iterator<Item = (u32, f32)> + 'a {
        let values = self.values;
        self.rows.iter().enumerate().map(move |(i, &row)| {
            let value = if values.is_empty() {
                BINARY_PRESENT
            } else {
                values[i]
            };
            (row, value)
        })
    }
}
