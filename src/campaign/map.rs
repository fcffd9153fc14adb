//! Hex geometry for the offset grid
//!
//! Cells are addressed by `(row, col)`. Even and odd rows have different
//! neighbour deltas. Two neighbour sets exist: the full six used for
//! movement and routing, and a narrower four used by proximity scans.

use crate::core::types::CellId;

/// Row/column delta to an adjacent cell
pub type Delta = (i32, i32);

const EVEN_ROW_NEIGHBORS: [Delta; 6] = [(-1, -1), (-1, 0), (0, -1), (0, 1), (1, -1), (1, 0)];
const ODD_ROW_NEIGHBORS: [Delta; 6] = [(-1, 0), (-1, 1), (0, -1), (0, 1), (1, 0), (1, 1)];

// Same deltas for both parities: the two same-side diagonals are dropped.
const CARDINAL_NEIGHBORS: [Delta; 4] = [(-1, 0), (0, -1), (0, 1), (1, 0)];

/// The six neighbour deltas for a cell in `row`
pub fn neighbors6(row: i32) -> [Delta; 6] {
    if row.rem_euclid(2) == 0 {
        EVEN_ROW_NEIGHBORS
    } else {
        ODD_ROW_NEIGHBORS
    }
}

/// The four-direction subset used by proximity checks and bandit target scans
pub fn cardinal4(_row: i32) -> [Delta; 4] {
    CARDINAL_NEIGHBORS
}

/// Convert an offset cell to cube coordinates `(q, r, s)`
pub fn to_cube(cell: CellId) -> (i32, i32, i32) {
    let q = cell.col;
    let r = cell.row - (cell.col - (cell.col & 1)).div_euclid(2);
    let s = -q - r;
    (q, r, s)
}

/// Hex steps between two cells, measured in cube space
pub fn hex_distance(a: CellId, b: CellId) -> u32 {
    let (q1, r1, s1) = to_cube(a);
    let (q2, r2, s2) = to_cube(b);
    (q1.abs_diff(q2) + r1.abs_diff(r2) + s1.abs_diff(s2)) / 2
}

/// Grid (taxicab) distance, used by bandit chasing and spawn exclusion
pub fn manhattan(a: CellId, b: CellId) -> u32 {
    a.row.abs_diff(b.row) + a.col.abs_diff(b.col)
}

/// Adjacent cells of `cell` through the six-direction set, bounds unchecked
pub fn adjacent6(cell: CellId) -> impl Iterator<Item = CellId> {
    neighbors6(cell.row)
        .into_iter()
        .map(move |(dr, dc)| cell.offset(dr, dc))
}

/// Adjacent cells of `cell` through the four-direction set, bounds unchecked
pub fn adjacent4(cell: CellId) -> impl Iterator<Item = CellId> {
    cardinal4(cell.row)
        .into_iter()
        .map(move |(dr, dc)| cell.offset(dr, dc))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_neighbor_sets_by_parity() {
        assert_eq!(neighbors6(0)[0], (-1, -1));
        assert_eq!(neighbors6(1)[0], (-1, 0));
        assert_eq!(neighbors6(1)[5], (1, 1));
        assert_eq!(neighbors6(4), neighbors6(2));
    }

    #[test]
    fn test_cardinal_is_subset_of_six() {
        for row in 0..4 {
            let six = neighbors6(row);
            for delta in cardinal4(row) {
                assert!(six.contains(&delta), "row {} delta {:?}", row, delta);
            }
        }
    }

    #[test]
    fn test_hex_distance_zero_on_self() {
        let a = CellId::new(3, 4);
        assert_eq!(hex_distance(a, a), 0);
    }

    #[test]
    fn test_hex_distance_known_values() {
        // Castle to castle on the default board
        assert_eq!(hex_distance(CellId::new(5, 1), CellId::new(1, 5)), 6);
        assert_eq!(hex_distance(CellId::new(0, 0), CellId::new(0, 3)), 3);
        assert_eq!(hex_distance(CellId::new(0, 0), CellId::new(4, 0)), 4);
        assert_eq!(hex_distance(CellId::new(2, 1), CellId::new(2, 2)), 1);
    }

    #[test]
    fn test_to_cube_sums_to_zero() {
        for row in 0..6 {
            for col in 0..6 {
                let (q, r, s) = to_cube(CellId::new(row, col));
                assert_eq!(q + r + s, 0);
            }
        }
    }

    #[test]
    fn test_manhattan() {
        assert_eq!(manhattan(CellId::new(1, 1), CellId::new(3, 0)), 3);
    }
}
