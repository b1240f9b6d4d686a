//! Radial and vertical sensitivity weighting from Schrön et al. (2017).
//!
//! The coefficient tables encode the published empirical fit and must not be
//! altered; any deviation shifts calibration results silently. Arguments
//! follow the paper: `r` a rescaled radius (m), `x` absolute air humidity
//! (g/m^3), `y` a soil-moisture-like fraction (m^3/m^3).

/// Footprint-rescaled radius from physical distance (m), site pressure (mb),
/// vegetation height (m) and soil moisture.
pub fn rescaled_radius(radius: f64, pressure: f64, vegetation_height: f64, moisture: f64) -> f64 {
    let f_pressure = 0.4922 / (0.86 - (-pressure / 1013.25).exp());
    let f_vegetation = 1.0
        - 0.17 * (1.0 - (-0.41 * vegetation_height).exp()) * (1.0 + (-9.25 * moisture).exp());
    radius / f_pressure / f_vegetation
}

/// Radial weight for point measurements within 5 m of the sensor.
pub fn wr_x(r: f64, x: f64, y: f64) -> f64 {
    let x00 = 3.7;
    let a00 = 8735.0;
    let a01 = 22.689;
    let a02 = 11720.0;
    let a03 = 0.00978;
    let a04 = 9306.0;
    let a05 = 0.003632;
    let a10 = 2.7925e-2;
    let a11 = 6.6577;
    let a12 = 0.028544;
    let a13 = 0.002455;
    let a14 = 6.851e-5;
    let a15 = 12.2755;
    let a20 = 247970.0;
    let a21 = 23.289;
    let a22 = 374655.0;
    let a23 = 0.00191;
    let a24 = 258552.0;
    let a30 = 5.4818e-2;
    let a31 = 21.032;
    let a32 = 0.6373;
    let a33 = 0.0791;
    let a34 = 5.425e-4;

    let big_a0 = a00 * (1.0 + a03 * x) * (-a01 * y).exp() + a02 * (1.0 + a05 * x) - a04 * y;
    let big_a1 = ((-a10 + a14 * x) * (-a11 * y / (1.0 + a15 * y)).exp() + a12) * (1.0 + x * a13);
    let big_a2 = a20 * (1.0 + a23 * x) * (-a21 * y).exp() + a22 - a24 * y;
    let big_a3 = a30 * (-a31 * y).exp() + a32 - a33 * y + a34 * x;

    (big_a0 * (-big_a1 * r).exp() + big_a2 * (-big_a3 * r).exp()) * (1.0 - (-x00 * r).exp())
}

/// Radial weight for point measurements between 5 m and 50 m of the sensor.
pub fn wr_a(r: f64, x: f64, y: f64) -> f64 {
    let a00 = 8735.0;
    let a01 = 22.689;
    let a02 = 11720.0;
    let a03 = 0.00978;
    let a04 = 9306.0;
    let a05 = 0.003632;
    let a10 = 2.7925e-2;
    let a11 = 6.6577;
    let a12 = 0.028544;
    let a13 = 0.002455;
    let a14 = 6.851e-5;
    let a15 = 12.2755;
    let a20 = 247970.0;
    let a21 = 23.289;
    let a22 = 374655.0;
    let a23 = 0.00191;
    let a24 = 258552.0;
    let a30 = 5.4818e-2;
    let a31 = 21.032;
    let a32 = 0.6373;
    let a33 = 0.0791;
    let a34 = 5.425e-4;

    let big_a0 = a00 * (1.0 + a03 * x) * (-a01 * y).exp() + a02 * (1.0 + a05 * x) - a04 * y;
    let big_a1 = ((-a10 + a14 * x) * (-a11 * y / (1.0 + a15 * y)).exp() + a12) * (1.0 + x * a13);
    let big_a2 = a20 * (1.0 + a23 * x) * (-a21 * y).exp() + a22 - a24 * y;
    let big_a3 = a30 * (-a31 * y).exp() + a32 - a33 * y + a34 * x;

    big_a0 * (-big_a1 * r).exp() + big_a2 * (-big_a3 * r).exp()
}

/// Radial weight for point measurements beyond 50 m of the sensor.
pub fn wr_b(r: f64, x: f64, y: f64) -> f64 {
    let b00 = 39006.0;
    let b01 = 15002337.0;
    let b02 = 2009.24;
    let b03 = 0.01181;
    let b04 = 3.146;
    let b05 = 16.7417;
    let b06 = 3727.0;
    let b10 = 6.031e-5;
    let b11 = 98.5;
    let b12 = 0.0013826;
    let b20 = 11747.0;
    let b21 = 55.033;
    let b22 = 4521.0;
    let b23 = 0.01998;
    let b24 = 0.00604;
    let b25 = 3347.4;
    let b26 = 0.00475;
    let b30 = 1.543e-2;
    let b31 = 13.29;
    let b32 = 1.807e-2;
    let b33 = 0.0011;
    let b34 = 8.81e-5;
    let b35 = 0.0405;
    let b36 = 26.74;

    let big_b0 =
        (b00 - b01 / (b02 * y + x - 0.13)) * (b03 - y) * (-b04 * y).exp() - b05 * x * y + b06;
    let big_b1 = b10 * (x + b11) + b12 * y;
    let big_b2 =
        (b20 * (1.0 - b26 * x) * (-b21 * y * (1.0 - x * b24)).exp() + b22 - b25 * y)
            * (2.0 + x * b23);
    let big_b3 = ((-b30 + b34 * x) * (-b31 * y / (1.0 + b35 * x + b36 * y)).exp() + b32)
        * (2.0 + x * b33);

    big_b0 * (-big_b1 * r).exp() + big_b2 * (-big_b3 * r).exp()
}

/// Dispatches to the band-appropriate radial weighting function. The band is
/// chosen on the physical (un-rescaled) radius; the weight itself is
/// evaluated at the rescaled radius. Exactly one function applies, with no
/// blending at the band edges.
pub fn radial_weight(radius: f64, rescaled: f64, humidity: f64, moisture: f64) -> f64 {
    if radius <= 5.0 {
        wr_x(rescaled, humidity, moisture)
    } else if radius <= 50.0 {
        wr_a(rescaled, humidity, moisture)
    } else {
        wr_b(rescaled, humidity, moisture)
    }
}

/// Depth (cm) from which 86% of detected neutrons originate.
pub fn penetration_depth(rescaled_radius: f64, bulk_density: f64, moisture: f64) -> f64 {
    1.0 / bulk_density
        * (8.321
            + 0.14249 * (0.96655 + (-0.01 * rescaled_radius).exp()) * (20.0 + moisture)
                / (0.0429 + moisture))
}

/// Exponential depth weight `exp(-2 d / D86)` for a sample at depth `d` (cm).
pub fn depth_weight(depth: f64, rescaled_radius: f64, bulk_density: f64, moisture: f64) -> f64 {
    (-2.0 * depth / penetration_depth(rescaled_radius, bulk_density, moisture)).exp()
}

#[cfg(test)]
mod tests {
    use super::{
        depth_weight, penetration_depth, radial_weight, rescaled_radius, wr_a, wr_b, wr_x,
    };

    #[test]
    fn rescaled_radius_grows_with_pressure() {
        // Denser air shrinks the footprint, so a fixed physical distance
        // maps to a larger rescaled radius.
        let low = rescaled_radius(50.0, 900.0, 0.0, 0.2);
        let high = rescaled_radius(50.0, 1013.25, 0.0, 0.2);
        assert!(low > 0.0 && high > 0.0);
        assert!(high > low);
    }

    #[test]
    fn vegetation_reduces_the_footprint_scaling() {
        let bare = rescaled_radius(50.0, 1013.25, 0.0, 0.2);
        let vegetated = rescaled_radius(50.0, 1013.25, 3.0, 0.2);
        assert!(vegetated > bare);
    }

    #[test]
    fn radial_weights_decay_with_distance() {
        let (x, y) = (8.0, 0.2);
        assert!(wr_x(2.0, x, y) > wr_x(4.0, x, y));
        assert!(wr_a(10.0, x, y) > wr_a(40.0, x, y));
        assert!(wr_b(60.0, x, y) > wr_b(150.0, x, y));
    }

    #[test]
    fn near_sensor_weight_vanishes_at_zero_radius() {
        // The WrX damping term removes the singular weight at the sensor.
        assert_eq!(wr_x(0.0, 8.0, 0.2), 0.0);
        assert!(wr_x(0.5, 8.0, 0.2) > 0.0);
    }

    #[test]
    fn band_selection_uses_physical_radius() {
        let (x, y) = (8.0, 0.2);
        assert_eq!(radial_weight(5.0, 5.0, x, y), wr_x(5.0, x, y));
        assert_eq!(radial_weight(5.1, 5.1, x, y), wr_a(5.1, x, y));
        assert_eq!(radial_weight(50.0, 50.0, x, y), wr_a(50.0, x, y));
        assert_eq!(radial_weight(50.1, 50.1, x, y), wr_b(50.1, x, y));
    }

    #[test]
    fn penetration_depth_shallows_in_wet_dense_soil() {
        let dry_loose = penetration_depth(10.0, 1.2, 0.05);
        let wet_dense = penetration_depth(10.0, 1.6, 0.40);
        assert!(dry_loose > wet_dense);
        // Published magnitude: tens of centimetres.
        assert!(dry_loose > 30.0 && dry_loose < 80.0);
    }

    #[test]
    fn depth_weight_decays_exponentially_with_depth() {
        let shallow = depth_weight(5.0, 10.0, 1.4, 0.2);
        let deep = depth_weight(25.0, 10.0, 1.4, 0.2);
        assert!(shallow > deep);
        assert_eq!(depth_weight(0.0, 10.0, 1.4, 0.2), 1.0);
        let d86 = penetration_depth(10.0, 1.4, 0.2);
        assert!((depth_weight(d86 / 2.0, 10.0, 1.4, 0.2) - (-1.0f64).exp()).abs() < 1e-12);
    }
}
