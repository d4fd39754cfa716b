//! Conversions between horizontal and vertical fields of view.

/// Horizontal field of view for a vertical one on a `width` x `height` viewport.
pub fn vtoh(vfov: f64, width: f64, height: f64) -> f64 {
    2.0 * (width * (vfov / 2.0).tan() / height).atan()
}

/// Vertical field of view for a horizontal one on a `width` x `height` viewport.
pub fn htov(hfov: f64, width: f64, height: f64) -> f64 {
    2.0 * (height * (hfov / 2.0).tan() / width).atan()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_square_viewport_is_identity() {
        assert!((vtoh(1.0, 100.0, 100.0) - 1.0).abs() < 1e-12);
        assert!((htov(1.0, 100.0, 100.0) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_round_trip() {
        let hfov = vtoh(0.8, 1600.0, 900.0);
        assert!(hfov > 0.8);
        assert!((htov(hfov, 1600.0, 900.0) - 0.8).abs() < 1e-12);
    }

    #[test]
    fn test_empty_viewport_is_nan() {
        assert!(vtoh(1.0, 0.0, 0.0).is_nan());
    }
}
