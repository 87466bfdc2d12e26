//! Reprojection of decoded frames between two calibrations.
//!
//! Every target pixel takes the sample of the source pixel whose ray is
//! nearest on the unit sphere. The correspondence is precomputed once per
//! plane (Y, U/V, depth) when the remapper is built, so mapping a frame is a
//! single gather pass.
//!
//! Nearest-ray queries go through a uniform hash grid whose cell edge equals
//! the match tolerance: any source ray within tolerance of a target ray lies
//! in one of the 27 cells around it. Candidates are compared by squared
//! distance, then by source index, so equal distances resolve to the first
//! source pixel in row-major order.

use std::collections::HashMap;

use log::debug;
use nalgebra::Vector3;

use crate::calibration::{is_valid_direction, CameraCalibration};
use crate::direction_table::DirectionTable;
use crate::error::CalibrationError;
use crate::frame::{Int32Frame, YuvFrame};

/// Fill value for unmapped luma samples
pub const UNMAPPED_LUMA: u8 = 0;
/// Fill value for unmapped chroma samples (neutral)
pub const UNMAPPED_CHROMA: u8 = 128;
/// Fill value for unmapped depth samples
pub const UNMAPPED_DEPTH: i32 = 0;

/// Tolerance as a multiple of the mean spacing between neighbouring rays
const DEFAULT_TOLERANCE_SCALE: f32 = 2.0;

type CellKey = (i64, i64, i64);

/// Target-to-source index map for one image plane
#[derive(Clone, Debug, PartialEq)]
pub struct PlaneMap {
    pub source_width: usize,
    pub source_height: usize,
    pub target_width: usize,
    pub target_height: usize,
    /// Source index per target pixel, `None` when unmapped
    pub indices: Vec<Option<usize>>,
}

impl PlaneMap {
    /// Match every target ray to its nearest source ray within `tolerance`.
    /// Without an explicit tolerance one is derived from the source spacing.
    pub fn build(source: &DirectionTable, target: &DirectionTable, tolerance: Option<f32>) -> Self {
        let tolerance = tolerance
            .filter(|t| t.is_finite() && *t > 0.0)
            .unwrap_or_else(|| default_tolerance(source));
        let grid = RayGrid::new(source, tolerance);

        let indices = target
            .directions
            .iter()
            .map(|direction| {
                if is_valid_direction(direction) {
                    grid.nearest(direction)
                } else {
                    None
                }
            })
            .collect::<Vec<_>>();

        debug!(
            "Plane map {}x{} -> {}x{}: {} of {} pixels mapped (tolerance {:.6})",
            source.width,
            source.height,
            target.width,
            target.height,
            indices.iter().filter(|i| i.is_some()).count(),
            indices.len(),
            tolerance
        );

        Self {
            source_width: source.width,
            source_height: source.height,
            target_width: target.width,
            target_height: target.height,
            indices,
        }
    }

    fn gather<T: Copy>(&self, samples: &[T], fill: T) -> Vec<T> {
        self.indices
            .iter()
            .map(|index| index.and_then(|i| samples.get(i).copied()).unwrap_or(fill))
            .collect()
    }
}

/// Mean distance between horizontally and vertically adjacent valid rays,
/// scaled. Falls back to the sphere diameter when no pair exists.
fn default_tolerance(table: &DirectionTable) -> f32 {
    let mut sum = 0.0f64;
    let mut count = 0usize;
    for row in 0..table.height {
        for col in 0..table.width {
            let here = &table.directions[row * table.width + col];
            if !is_valid_direction(here) {
                continue;
            }
            let neighbours = [
                (col + 1 < table.width).then(|| row * table.width + col + 1),
                (row + 1 < table.height).then(|| (row + 1) * table.width + col),
            ];
            for neighbour in neighbours.into_iter().flatten() {
                let other = &table.directions[neighbour];
                if is_valid_direction(other) {
                    sum += (here - other).norm() as f64;
                    count += 1;
                }
            }
        }
    }

    if count == 0 || sum <= 0.0 {
        return 2.0;
    }
    (sum / count as f64) as f32 * DEFAULT_TOLERANCE_SCALE
}

/// Uniform spatial hash over unit rays
struct RayGrid<'a> {
    directions: &'a [Vector3<f32>],
    cell_size: f32,
    tolerance_sq: f32,
    cells: HashMap<CellKey, Vec<usize>>,
}

impl<'a> RayGrid<'a> {
    fn new(table: &'a DirectionTable, tolerance: f32) -> Self {
        let mut cells: HashMap<CellKey, Vec<usize>> = HashMap::new();
        for (index, direction) in table.directions.iter().enumerate() {
            if is_valid_direction(direction) {
                cells
                    .entry(cell_key(direction, tolerance))
                    .or_default()
                    .push(index);
            }
        }
        Self {
            directions: &table.directions,
            cell_size: tolerance,
            tolerance_sq: tolerance * tolerance,
            cells,
        }
    }

    fn nearest(&self, direction: &Vector3<f32>) -> Option<usize> {
        let (cx, cy, cz) = cell_key(direction, self.cell_size);
        let mut best: Option<(f32, usize)> = None;

        for dx in -1..=1 {
            for dy in -1..=1 {
                for dz in -1..=1 {
                    let key = match (cx.checked_add(dx), cy.checked_add(dy), cz.checked_add(dz)) {
                        (Some(x), Some(y), Some(z)) => (x, y, z),
                        _ => continue,
                    };
                    let Some(candidates) = self.cells.get(&key) else {
                        continue;
                    };
                    for &index in candidates {
                        let distance_sq = (self.directions[index] - direction).norm_squared();
                        if distance_sq > self.tolerance_sq {
                            continue;
                        }
                        let better = match best {
                            None => true,
                            Some((best_sq, best_index)) => {
                                distance_sq < best_sq
                                    || (distance_sq == best_sq && index < best_index)
                            }
                        };
                        if better {
                            best = Some((distance_sq, index));
                        }
                    }
                }
            }
        }

        best.map(|(_, index)| index)
    }
}

/// Cell coordinates saturate at the `i64` range for very small cells.
fn cell_key(direction: &Vector3<f32>, cell_size: f32) -> CellKey {
    let coordinate = |value: f32| (value as f64 / cell_size as f64).floor() as i64;
    (
        coordinate(direction.x),
        coordinate(direction.y),
        coordinate(direction.z),
    )
}

/// Precomputed source-to-target resampler for color and depth frames
#[derive(Clone, Debug)]
pub struct FrameRemapper {
    y_map: PlaneMap,
    uv_map: PlaneMap,
    depth_map: PlaneMap,
}

impl FrameRemapper {
    pub fn new(source: &CameraCalibration, target: &CameraCalibration) -> Self {
        Self::build(source, target, None)
    }

    /// Remapper with a fixed match tolerance (Euclidean distance between
    /// unit rays) for all planes
    pub fn with_tolerance(
        source: &CameraCalibration,
        target: &CameraCalibration,
        tolerance: f32,
    ) -> Self {
        Self::build(source, target, Some(tolerance))
    }

    fn build(
        source: &CameraCalibration,
        target: &CameraCalibration,
        tolerance: Option<f32>,
    ) -> Self {
        let plane = |sw: usize, sh: usize, tw: usize, th: usize| {
            let source_table = DirectionTable::build_with_size(source, sw, sh);
            let target_table = DirectionTable::build_with_size(target, tw, th);
            PlaneMap::build(&source_table, &target_table, tolerance)
        };

        let y_map = plane(
            source.color_width(),
            source.color_height(),
            target.color_width(),
            target.color_height(),
        );
        let uv_map = plane(
            source.color_width() / 2,
            source.color_height() / 2,
            target.color_width() / 2,
            target.color_height() / 2,
        );
        let depth_map = PlaneMap::build(
            &DirectionTable::build(source),
            &DirectionTable::build(target),
            tolerance,
        );

        Self {
            y_map,
            uv_map,
            depth_map,
        }
    }

    pub fn map_color_frame(&self, frame: &YuvFrame) -> Result<YuvFrame, CalibrationError> {
        check_size(&self.y_map, frame.width(), frame.height())?;

        YuvFrame::new(
            self.y_map.target_width,
            self.y_map.target_height,
            self.y_map.gather(frame.y_channel(), UNMAPPED_LUMA),
            self.uv_map.gather(frame.u_channel(), UNMAPPED_CHROMA),
            self.uv_map.gather(frame.v_channel(), UNMAPPED_CHROMA),
        )
    }

    pub fn map_depth_frame(&self, frame: &Int32Frame) -> Result<Int32Frame, CalibrationError> {
        check_size(&self.depth_map, frame.width(), frame.height())?;

        Int32Frame::new(
            self.depth_map.target_width,
            self.depth_map.target_height,
            self.depth_map.gather(frame.values(), UNMAPPED_DEPTH),
        )
    }
}

fn check_size(map: &PlaneMap, width: usize, height: usize) -> Result<(), CalibrationError> {
    if map.source_width != width || map.source_height != height {
        return Err(CalibrationError::FrameSizeMismatch {
            expected_width: map.source_width,
            expected_height: map.source_height,
            width,
            height,
        });
    }
    Ok(())
}
