/// Density of fresh water used for the hydrostatic column.
pub const WATER_DENSITY_KG_M3: f64 = 998.2;
pub const GRAVITY_M_S2: f64 = 9.81;

/// Pressure of a water column of `height_m` metres, in pascal.
pub fn hydrostatic_pressure(height_m: f64) -> f64 {
    WATER_DENSITY_KG_M3 * height_m * GRAVITY_M_S2
}

/// Converts a pressure measured at the wellhead into the pressure at the section bottom.
pub fn surface_to_downhole(measured: f64, reference_altitude: f64, bottom_altitude: f64) -> f64 {
    measured + hydrostatic_pressure(reference_altitude - bottom_altitude)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adds_the_water_column_above_the_section() {
        assert_eq!(surface_to_downhole(0.0, 100.0, 20.0), 998.2 * 80.0 * 9.81);
        assert_eq!(surface_to_downhole(5.0, 20.0, 20.0), 5.0);
    }
}
