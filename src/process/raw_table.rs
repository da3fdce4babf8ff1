use crate::codes::ColumnMapping;

/// A header row plus string cells, as returned by the API or read from CSV.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawTable {
    /// Column names; wire-level codes until renamed.
    pub headers: Vec<String>,
    /// Data rows, one cell per header.
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self { headers, rows }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Rename every header the mapping knows; unknown headers stay as they are.
    pub fn rename_columns(&mut self, mapping: &ColumnMapping) {
        mapping.rename_all(&mut self.headers);
    }

    /// Remove the named columns, returning the ones that were present.
    pub fn drop_columns(&mut self, names: &[String]) -> Vec<String> {
        let keep: Vec<bool> = self.headers.iter().map(|h| !names.contains(h)).collect();
        if keep.iter().all(|k| *k) {
            return Vec::new();
        }
        let removed = self
            .headers
            .iter()
            .zip(&keep)
            .filter(|(_, k)| !**k)
            .map(|(h, _)| h.clone())
            .collect();
        self.headers = retain_cells(std::mem::take(&mut self.headers), &keep);
        for row in &mut self.rows {
            *row = retain_cells(std::mem::take(row), &keep);
        }
        removed
    }

    /// Rows laid out in `order`; columns this table lacks become empty cells.
    pub fn aligned_rows(&self, order: &[String]) -> Vec<Vec<String>> {
        let positions: Vec<Option<usize>> =
            order.iter().map(|name| self.column_index(name)).collect();
        self.rows
            .iter()
            .map(|row| {
                positions
                    .iter()
                    .map(|p| p.and_then(|i| row.get(i)).cloned().unwrap_or_default())
                    .collect()
            })
            .collect()
    }

    /// Append `other` below `self`, widening the header with any new columns.
    pub fn extend_with(&mut self, other: &RawTable) {
        let before = self.headers.len();
        for h in &other.headers {
            if !self.headers.contains(h) {
                self.headers.push(h.clone());
            }
        }
        if self.headers.len() != before {
            let width = self.headers.len();
            for row in &mut self.rows {
                row.resize(width, String::new());
            }
        }
        let order = self.headers.clone();
        self.rows.extend(other.aligned_rows(&order));
    }
}

fn retain_cells(cells: Vec<String>, keep: &[bool]) -> Vec<String> {
    cells
        .into_iter()
        .enumerate()
        .filter(|(i, _)| keep.get(*i).copied().unwrap_or(true))
        .map(|(_, c)| c)
        .collect()
}
