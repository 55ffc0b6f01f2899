use std::sync::Arc;

use parking_lot::RwLock;

/// Growable list shared between a loader and the grids that display it.
pub type SharedList<T> = Arc<RwLock<Vec<T>>>;

pub fn shared_list<T>() -> SharedList<T> {
    Arc::new(RwLock::new(Vec::new()))
}

/// Fixed-width rows over a shared list.  Reads the list on every call, so
/// items appended later show up without rebuilding the grid.
#[derive(Debug)]
pub struct Grid<T> {
    items: SharedList<T>,
    row_width: usize,
}

impl<T> Clone for Grid<T> {
    fn clone(&self) -> Self {
        Self {
            items: Arc::clone(&self.items),
            row_width: self.row_width,
        }
    }
}

impl<T: Clone> Grid<T> {
    /// A zero `row_width` is treated as 1.
    pub fn new(row_width: usize, items: SharedList<T>) -> Self {
        Self {
            items,
            row_width: row_width.max(1),
        }
    }

    pub fn row_width(&self) -> usize {
        self.row_width
    }

    pub fn items(&self) -> &SharedList<T> {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.read().is_empty()
    }

    pub fn row_count(&self) -> usize {
        self.len().div_ceil(self.row_width)
    }

    /// Items of row `index`; empty past the last row.
    pub fn row(&self, index: usize) -> Vec<T> {
        let items = self.items.read();
        let start = index.saturating_mul(self.row_width).min(items.len());
        let end = start.saturating_add(self.row_width).min(items.len());
        items[start..end].to_vec()
    }

    pub fn rows(&self) -> Vec<Vec<T>> {
        self.items
            .read()
            .chunks(self.row_width)
            .map(<[T]>::to_vec)
            .collect()
    }
}
