//! Turns report rows into [`PartialProduct`]s grouped by location.
//!
//! The inventory export has no stable header, so rows are located by a
//! profit-center marker cell and the product columns are read at fixed
//! signed offsets from it.

use std::collections::HashMap;

use pantry_core::TransactConfig;

use crate::types::PartialProduct;

/// Location identifier → product id → product.
pub type LocationProducts = HashMap<String, HashMap<String, PartialProduct>>;

/// Column positions relative to the marker cell. May be negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnOffsets {
    pub name: i64,
    pub id: i64,
    pub quantity: i64,
}

#[derive(Debug, Default)]
pub struct ExtractOutcome {
    pub products: LocationProducts,
    /// Rows looked at.
    pub scanned: usize,
    /// Rows that produced a product, duplicates included.
    pub accepted: usize,
}

/// Converts raw report rows into per-location products.
pub trait RecordExtractor: Send + Sync {
    fn extract(&self, rows: &[Vec<String>]) -> ExtractOutcome;
}

/// Offset-based extractor for the profit-center inventory export.
#[derive(Debug, Clone)]
pub struct RowExtractor {
    prefix: String,
    offsets: ColumnOffsets,
}

impl RowExtractor {
    #[must_use]
    pub fn new(prefix: impl Into<String>, offsets: ColumnOffsets) -> Self {
        Self {
            prefix: prefix.into(),
            offsets,
        }
    }

    #[must_use]
    pub fn from_config(config: &TransactConfig) -> Self {
        Self::new(
            config.profit_center_prefix.clone(),
            ColumnOffsets {
                name: config.name_column_offset,
                id: config.id_column_offset,
                quantity: config.quantity_column_offset,
            },
        )
    }

    /// Parses one row into `(location, product)`.
    ///
    /// Returns `None` for rows without a marker cell, with an offset that
    /// falls outside the row, with an empty name or id, or with a
    /// non-integer quantity. Negative quantities clamp to zero.
    #[must_use]
    pub fn parse_row(&self, row: &[String]) -> Option<(String, PartialProduct)> {
        let (marker, location) = row.iter().enumerate().find_map(|(index, cell)| {
            cell.strip_prefix(self.prefix.as_str())
                .map(|rest| (index, rest.trim()))
        })?;

        let name = cell_at(row, marker, self.offsets.name)?.trim();
        let id = cell_at(row, marker, self.offsets.id)?.trim();
        if name.is_empty() || id.is_empty() {
            return None;
        }

        let quantity: i64 = cell_at(row, marker, self.offsets.quantity)?
            .trim()
            .parse()
            .ok()?;
        let quantity = u32::try_from(quantity.max(0)).unwrap_or(u32::MAX);

        Some((
            location.to_string(),
            PartialProduct {
                id: id.to_string(),
                name: name.to_string(),
                quantity,
            },
        ))
    }
}

impl RecordExtractor for RowExtractor {
    fn extract(&self, rows: &[Vec<String>]) -> ExtractOutcome {
        let mut outcome = ExtractOutcome {
            scanned: rows.len(),
            ..ExtractOutcome::default()
        };

        for row in rows {
            let Some((location, product)) = self.parse_row(row) else {
                continue;
            };
            outcome
                .products
                .entry(location)
                .or_default()
                .insert(product.id.clone(), product);
            outcome.accepted += 1;
        }

        outcome
    }
}

fn cell_at(row: &[String], marker: usize, offset: i64) -> Option<&String> {
    let index = i64::try_from(marker).ok()?.checked_add(offset)?;
    row.get(usize::try_from(index).ok()?)
}
