//! Coarse map of where in a file changes were made

use serde::{Serialize, Serializer};

/// Default number of map cells
pub const DEFAULT_MAP_WIDTH: usize = 72;

/// Fixed-width row of cells, each covering an equal share of the file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoverageMap {
    cells: Vec<bool>,
    size: u64,
}

impl CoverageMap {
    pub fn new(width: usize, size: u64) -> Self {
        Self {
            cells: vec![false; width.max(1)],
            size,
        }
    }

    pub fn width(&self) -> usize {
        self.cells.len()
    }

    /// File size the map is scaled to
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Cell covering file offset `offset`
    pub fn cell_of(&self, offset: u64) -> usize {
        if self.size == 0 {
            return 0;
        }
        let width = self.cells.len() as u128;
        let cell = (offset as u128 * width) / self.size as u128;
        (cell as usize).min(self.cells.len() - 1)
    }

    /// Record a change at file offset `offset`
    pub fn mark(&mut self, offset: u64) {
        let cell = self.cell_of(offset);
        self.cells[cell] = true;
    }

    pub fn is_marked(&self, cell: usize) -> bool {
        self.cells.get(cell).copied().unwrap_or(false)
    }

    pub fn any(&self) -> bool {
        self.cells.iter().any(|c| *c)
    }

    /// `*` for changed cells, `_` for the rest
    pub fn render(&self) -> String {
        self.cells.iter().map(|c| if *c { '*' } else { '_' }).collect()
    }
}

impl Serialize for CoverageMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.render())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cells_scale_with_size() {
        let mut map = CoverageMap::new(10, 1000);
        map.mark(0);
        map.mark(555);
        map.mark(999);
        assert_eq!(map.render(), "*____*___*");
        assert_eq!(map.cell_of(99), 0);
        assert_eq!(map.cell_of(100), 1);
    }

    #[test]
    fn test_out_of_range_offsets_clamp() {
        let mut map = CoverageMap::new(4, 10);
        map.mark(50);
        assert!(map.is_marked(3));

        let mut empty = CoverageMap::new(4, 0);
        empty.mark(0);
        assert!(empty.is_marked(0));
    }

    #[test]
    fn test_serializes_as_text() {
        let mut map = CoverageMap::new(3, 3);
        map.mark(1);
        assert_eq!(serde_json::to_string(&map).unwrap(), "\"_*_\"");
    }
}
