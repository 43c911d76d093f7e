use crate::sensor_layout::{default_pixel_edge_mm, SensorGeometry, DEFAULT_EXTENT_MM};

/// One pixel with the given center, edge and extent.
pub(crate) fn single_pixel_geometry(center: [f64; 2], edge: f64, extent: f64) -> SensorGeometry {
    SensorGeometry::from_columns("single", edge, extent, &[0], &[center[0]], &[center[1]])
        .expect("single pixel geometry")
}

/// Pixels at (0,0), (2,0) and (0,2) with unit edge inside `[-3, 3]^2`.
pub(crate) fn three_pixel_geometry() -> SensorGeometry {
    SensorGeometry::from_columns(
        "three",
        1.0,
        3.0,
        &[0, 1, 2],
        &[0.0, 2.0, 0.0],
        &[0.0, 0.0, 2.0],
    )
    .expect("three pixel geometry")
}

/// Hex patch with the reference camera's pixel size and extent.
pub(crate) fn reference_patch(rings: usize) -> SensorGeometry {
    SensorGeometry::hexagonal(
        format!("patch-{rings}"),
        rings,
        default_pixel_edge_mm(),
        DEFAULT_EXTENT_MM,
    )
    .expect("reference patch")
}
