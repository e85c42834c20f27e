//! Domain frame → render frame.
//!
//! The simulation works on a ground plane (x east, y north) with height as
//! a third axis, and measures slew clockwise from north in degrees. The
//! render engine is Y-up, right-handed, rotates counter-clockwise about +Y
//! and uses radians. North maps to −Z so that a boom modelled along −Z
//! points north at zero yaw.

use std::f64::consts::PI;

use crate::protocol::CraneState;
use crate::types::Vec3;

/// Domain `(x, y, height)` → render `(x, height, -y)`.
pub fn to_render(x: f64, y: f64, height: f64) -> Vec3 {
    Vec3::new(x, height, -y)
}

/// Clockwise-positive degrees → counter-clockwise-positive radians about Y.
pub fn slew_to_yaw(degrees: f64) -> f64 {
    -degrees * PI / 180.0
}

/// Luffing degrees above horizontal → pitch radians about the boom pivot's
/// local X axis. Positive raises the tip.
pub fn luffing_to_pitch(degrees: f64) -> f64 {
    degrees * PI / 180.0
}

/// Root placement of a crane (mast foot on the ground).
pub fn crane_origin(crane: &CraneState) -> Vec3 {
    to_render(crane.base_x, crane.base_y, 0.0)
}

/// Boom tip in the render frame, from base, mast, boom and current pose.
pub fn boom_tip(crane: &CraneState) -> Vec3 {
    let slew = crane.slew_angle.to_radians();
    let luff = crane.luffing_angle.to_radians();
    let reach = crane.boom_length * luff.cos();
    to_render(
        crane.base_x + reach * slew.sin(),
        crane.base_y + reach * slew.cos(),
        crane.mast_height + crane.boom_length * luff.sin(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    fn close(a: Vec3, b: Vec3) -> bool {
        a.distance(&b) < EPS
    }

    #[test]
    fn axes_map_to_y_up() {
        assert_eq!(to_render(1.0, 2.0, 3.0), Vec3::new(1.0, 3.0, -2.0));
        assert_eq!(to_render(0.0, 0.0, 0.0), Vec3::new(0.0, 0.0, -0.0));
        assert_eq!(to_render(-5.5, -7.25, 40.0), Vec3::new(-5.5, 40.0, 7.25));
    }

    #[test]
    fn slew_sign_is_inverted() {
        assert_eq!(slew_to_yaw(0.0), -0.0);
        assert!((slew_to_yaw(90.0) + PI / 2.0).abs() < EPS);
        assert!((slew_to_yaw(-90.0) - PI / 2.0).abs() < EPS);
        assert!((slew_to_yaw(180.0) + PI).abs() < EPS);
        assert_eq!(slew_to_yaw(45.0), -45.0 * PI / 180.0);
    }

    #[test]
    fn luffing_keeps_sign() {
        assert!((luffing_to_pitch(30.0) - PI / 6.0).abs() < EPS);
        assert_eq!(luffing_to_pitch(-10.0), -10.0 * PI / 180.0);
    }

    #[test]
    fn repeated_application_is_stable() {
        for deg in [-720.0, -33.3, 0.0, 12.5, 359.99] {
            let first = slew_to_yaw(deg);
            for _ in 0..10 {
                assert_eq!(slew_to_yaw(deg).to_bits(), first.to_bits());
            }
        }
        let p = to_render(12.34, -56.78, 9.0);
        for _ in 0..10 {
            assert_eq!(to_render(12.34, -56.78, 9.0), p);
        }
    }

    #[test]
    fn boom_tip_points_north_then_east() {
        let mut c = CraneState {
            id: "TC-1".into(),
            base_x: 10.0,
            base_y: 20.0,
            mast_height: 40.0,
            boom_length: 50.0,
            ..Default::default()
        };
        // North is -Z in the render frame.
        assert!(close(boom_tip(&c), Vec3::new(10.0, 40.0, -70.0)));

        c.slew_angle = 90.0;
        assert!(close(boom_tip(&c), Vec3::new(60.0, 40.0, -20.0)));

        c.slew_angle = 0.0;
        c.luffing_angle = 90.0;
        assert!(close(boom_tip(&c), Vec3::new(10.0, 90.0, -20.0)));
    }

    #[test]
    fn origin_sits_on_ground() {
        let c = CraneState {
            base_x: 3.0,
            base_y: 4.0,
            mast_height: 40.0,
            ..Default::default()
        };
        assert_eq!(crane_origin(&c), Vec3::new(3.0, 0.0, -4.0));
    }
}
