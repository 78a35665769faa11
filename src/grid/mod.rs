//! Uniform cell grid used to store particle positions relative to their cell.
//!
//! The downstream solver stores each particle as a position local to its cell plus the
//! linear hash of that cell. [`CellGrid`] provides this mapping and its inverse.

pub use cell_grid::CellGrid;

mod cell_grid;
