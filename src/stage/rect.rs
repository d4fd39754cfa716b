use serde::{Deserialize, Serialize};

/// Rectangle in coordinates normalized to a containing area.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// The whole area.
    pub fn full() -> Self {
        Self::new(0.0, 0.0, 1.0, 1.0)
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }
}

impl Default for Rect {
    fn default() -> Self {
        Self::full()
    }
}

/// Placement of a layer on the stage. Absolute values are in pixels and take
/// precedence over relative ones; missing fields cover the whole stage.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RectSpec {
    pub relative_x: Option<f64>,
    pub relative_y: Option<f64>,
    pub relative_width: Option<f64>,
    pub relative_height: Option<f64>,
    pub absolute_x: Option<f64>,
    pub absolute_y: Option<f64>,
    pub absolute_width: Option<f64>,
    pub absolute_height: Option<f64>,
}

/// Resolve `spec` against a stage of `total_width` by `total_height` pixels.
pub fn calc_rect(total_width: f64, total_height: f64, spec: Option<&RectSpec>) -> Rect {
    let Some(spec) = spec else {
        return Rect::full();
    };
    let resolve = |absolute: Option<f64>, relative: Option<f64>, total: f64, default: f64| {
        absolute
            .map(|value| value / total)
            .or(relative)
            .unwrap_or(default)
    };
    Rect {
        x: resolve(spec.absolute_x, spec.relative_x, total_width, 0.0),
        y: resolve(spec.absolute_y, spec.relative_y, total_height, 0.0),
        width: resolve(spec.absolute_width, spec.relative_width, total_width, 1.0),
        height: resolve(spec.absolute_height, spec.relative_height, total_height, 1.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_spec_covers_everything() {
        assert_eq!(calc_rect(800.0, 600.0, None), Rect::full());
        assert_eq!(calc_rect(800.0, 600.0, Some(&RectSpec::default())), Rect::full());
    }

    #[test]
    fn test_absolute_wins_over_relative() {
        let spec = RectSpec {
            absolute_x: Some(200.0),
            relative_x: Some(0.9),
            relative_y: Some(0.5),
            absolute_width: Some(400.0),
            relative_height: Some(0.25),
            ..Default::default()
        };
        assert_eq!(calc_rect(800.0, 600.0, Some(&spec)), Rect::new(0.25, 0.5, 0.5, 0.25));
    }

    #[test]
    fn test_spec_from_json() {
        let spec: RectSpec = serde_json::from_str(r#"{"relative_width": 0.5}"#).unwrap();
        let rect = calc_rect(100.0, 100.0, Some(&spec));
        assert_eq!(rect.width, 0.5);
        assert!(!rect.is_empty());
        assert!(Rect::new(0.0, 0.0, 0.0, 1.0).is_empty());
    }
}
