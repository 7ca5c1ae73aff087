//! Reading order of boards on a page.

use imageproc::point::Point;

use super::{Region, top_left};
use crate::models::config::SortStrategy;

/// Indices of `corners` in reading order.
///
/// With [`SortStrategy::CompositeKey`] boards are ordered by
/// `min_y * 1000 + min_x`. [`SortStrategy::RowBands`] groups boards whose
/// top edges lie within `row_tolerance` pixels of the first board of a row,
/// then orders each row left to right. Both sorts are stable.
pub fn reading_order(
    corners: &[[Point<i32>; 4]],
    strategy: SortStrategy,
    row_tolerance: i32,
) -> Vec<usize> {
    let origins: Vec<(i32, i32)> = corners.iter().map(top_left).collect();
    let mut order: Vec<usize> = (0..origins.len()).collect();

    match strategy {
        SortStrategy::CompositeKey => {
            order.sort_by_key(|&i| {
                let (x, y) = origins[i];
                i64::from(y) * 1000 + i64::from(x)
            });
            order
        }
        SortStrategy::RowBands => {
            order.sort_by_key(|&i| origins[i].1);

            let mut rows: Vec<Vec<usize>> = Vec::new();
            let mut row_top = i32::MIN;
            for i in order {
                let y = origins[i].1;
                match rows.last_mut() {
                    Some(row) if i64::from(y) - i64::from(row_top) <= i64::from(row_tolerance) => {
                        row.push(i)
                    }
                    _ => {
                        row_top = y;
                        rows.push(vec![i]);
                    }
                }
            }

            rows.into_iter()
                .flat_map(|mut row| {
                    row.sort_by_key(|&i| origins[i].0);
                    row
                })
                .collect()
        }
    }
}

/// Reorder regions for reading.
pub fn sort_regions(
    regions: Vec<Region>,
    strategy: SortStrategy,
    row_tolerance: i32,
) -> Vec<Region> {
    let corners: Vec<[Point<i32>; 4]> = regions.iter().map(|r| r.corners).collect();
    let order = reading_order(&corners, strategy, row_tolerance);

    let mut slots: Vec<Option<Region>> = regions.into_iter().map(Some).collect();
    order.into_iter().filter_map(|i| slots[i].take()).collect()
}
