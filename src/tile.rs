//! Tile (§4.10): one buffer per spec element, each `tr × tc` cells,
//! row-major. The façade computes `(rowInTile, colInTile)`; this type
//! enforces nothing about bounds beyond its own fixed shape.

use crate::types::{ElementSpec, ElementType, ElementValue, INT_NULL, SHORT_NULL};

/// Backing storage for one element within a tile. `IntegerCodedFloat`
/// shares `Integer`'s representation (§3: "stored as int32").
enum TileBuffer {
    Integer(Vec<i32>),
    Short(Vec<i16>),
    Float(Vec<f32>),
}

impl TileBuffer {
    fn new_nulls(element_type: ElementType, n_cells: usize) -> Self {
        match element_type {
            ElementType::Integer | ElementType::IntegerCodedFloat => TileBuffer::Integer(vec![INT_NULL; n_cells]),
            ElementType::Short => TileBuffer::Short(vec![SHORT_NULL; n_cells]),
            ElementType::Float => TileBuffer::Float(vec![f32::NAN; n_cells]),
        }
    }
}

pub struct Tile {
    pub tile_index: usize,
    pub tile_rows: u32,
    pub tile_cols: u32,
    buffers: Vec<TileBuffer>,
    dirty: bool,
}

impl Tile {
    /// Allocates a tile whose cells are all initialized to the null
    /// sentinel for their element type (§4.12 `allocateNewTile`).
    pub fn new_nulls(tile_index: usize, tile_rows: u32, tile_cols: u32, elements: &[ElementSpec]) -> Self {
        let n_cells = (tile_rows as usize) * (tile_cols as usize);
        let buffers = elements
            .iter()
            .map(|e| TileBuffer::new_nulls(e.element_type, n_cells))
            .collect();
        Self {
            tile_index,
            tile_rows,
            tile_cols,
            buffers,
            dirty: false,
        }
    }

    fn index_of(&self, row_in_tile: u32, col_in_tile: u32) -> usize {
        (row_in_tile as usize) * (self.tile_cols as usize) + (col_in_tile as usize)
    }

    pub fn get_value(&self, element_index: usize, row_in_tile: u32, col_in_tile: u32) -> ElementValue {
        let idx = self.index_of(row_in_tile, col_in_tile);
        match &self.buffers[element_index] {
            TileBuffer::Integer(v) => ElementValue::Integer(v[idx]),
            TileBuffer::Short(v) => ElementValue::Short(v[idx]),
            TileBuffer::Float(v) => ElementValue::Float(v[idx]),
        }
    }

    pub fn set_value(&mut self, element_index: usize, row_in_tile: u32, col_in_tile: u32, value: ElementValue) {
        let idx = self.index_of(row_in_tile, col_in_tile);
        match (&mut self.buffers[element_index], value) {
            (TileBuffer::Integer(v), ElementValue::Integer(x)) => v[idx] = x,
            (TileBuffer::Short(v), ElementValue::Short(x)) => v[idx] = x,
            (TileBuffer::Float(v), ElementValue::Float(x)) => v[idx] = x,
            _ => panic!("tile element type mismatch"),
        }
        self.dirty = true;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_clean(&mut self) {
        self.dirty = false;
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Borrows an integer-backed element's cells in row-major order, for
    /// handoff to an integer codec.
    pub fn integer_values(&self, element_index: usize) -> &[i32] {
        match &self.buffers[element_index] {
            TileBuffer::Integer(v) => v,
            _ => panic!("element {} is not integer-backed", element_index),
        }
    }

    pub fn float_values(&self, element_index: usize) -> &[f32] {
        match &self.buffers[element_index] {
            TileBuffer::Float(v) => v,
            _ => panic!("element {} is not float-backed", element_index),
        }
    }

    pub fn set_integer_values(&mut self, element_index: usize, values: Vec<i32>) {
        self.buffers[element_index] = TileBuffer::Integer(values);
    }

    pub fn set_float_values(&mut self, element_index: usize, values: Vec<f32>) {
        self.buffers[element_index] = TileBuffer::Float(values);
    }

    pub fn set_short_values(&mut self, element_index: usize, values: Vec<i16>) {
        self.buffers[element_index] = TileBuffer::Short(values);
    }

    pub fn short_values(&self, element_index: usize) -> &[i16] {
        match &self.buffers[element_index] {
            TileBuffer::Short(v) => v,
            _ => panic!("element {} is not short-backed", element_index),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_tile_is_all_nulls() {
        let elements = vec![ElementSpec::new("z", ElementType::Integer)];
        let tile = Tile::new_nulls(0, 4, 4, &elements);
        assert!(tile.get_value(0, 0, 0).is_null());
        assert!(!tile.is_dirty());
    }

    #[test]
    fn test_set_value_marks_dirty() {
        let elements = vec![ElementSpec::new("z", ElementType::Integer)];
        let mut tile = Tile::new_nulls(0, 4, 4, &elements);
        tile.set_value(0, 1, 2, ElementValue::Integer(42));
        assert_eq!(tile.get_value(0, 1, 2), ElementValue::Integer(42));
        assert!(tile.is_dirty());
    }

    #[test]
    fn test_multi_element_tile() {
        let elements = vec![
            ElementSpec::new("a", ElementType::Integer),
            ElementSpec::new("b", ElementType::Float),
        ];
        let mut tile = Tile::new_nulls(0, 3, 3, &elements);
        tile.set_value(1, 0, 0, ElementValue::Float(3.5));
        assert_eq!(tile.get_value(1, 0, 0), ElementValue::Float(3.5));
        assert!(tile.get_value(0, 0, 0).is_null());
    }
}
