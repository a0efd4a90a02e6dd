//! Serializable sampler configuration.

use serde::{Deserialize, Serialize};

use crate::bitmap::{Border, Rect};
use crate::format::PixelFormat;

/// Everything needed to build a [`BitmapSampler`](crate::BitmapSampler).
///
/// Only `width` and `height` are required when deserializing; the rest
/// default to sampling alpha in pixel space with edge clamping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamplerDesc {
    pub width: u32,
    pub height: u32,
    #[serde(default)]
    pub format: PixelFormat,
    #[serde(default = "default_component")]
    pub component: usize,
    #[serde(default)]
    pub flip_y: bool,
    #[serde(default)]
    pub border: Border,
    /// Sample-space rectangle; `None` means pixel space.
    #[serde(default)]
    pub output_rect: Option<Rect>,
}

fn default_component() -> usize {
    PixelFormat::default().alpha_component()
}

impl SamplerDesc {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            format: PixelFormat::default(),
            component: default_component(),
            flip_y: false,
            border: Border::default(),
            output_rect: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitmap::BitmapSampler;
    use glam::Vec2;

    #[test]
    fn test_minimal_json_uses_defaults() {
        let desc: SamplerDesc =
            serde_json::from_str(r#"{ "width": 64, "height": 32 }"#).expect("parse");
        assert_eq!(desc, SamplerDesc::new(64, 32));
        assert_eq!(desc.component, 3);
    }

    #[test]
    fn test_full_json_builds_sampler() {
        let json = r#"{
            "width": 4,
            "height": 4,
            "format": "rgba8",
            "component": 1,
            "flip_y": true,
            "border": { "value": 0.25 },
            "output_rect": { "min": [0.0, 0.0], "max": [100.0, 100.0] }
        }"#;
        let desc: SamplerDesc = serde_json::from_str(json).expect("parse");
        let sampler = BitmapSampler::from_desc(&desc).expect("build");
        assert_eq!(sampler.component(), 1);
        assert!(sampler.flip_y());
        assert_eq!(sampler.border(), Border::Value(0.25));
        assert_eq!(sampler.output_rect().max, Vec2::new(100.0, 100.0));
        assert!((sampler.sample(Vec2::new(-1.0, 0.0)) - 0.25).abs() < 1e-6);
    }

    #[test]
    fn test_bad_component_is_rejected() {
        let mut desc = SamplerDesc::new(2, 2);
        desc.component = 9;
        assert!(BitmapSampler::from_desc(&desc).is_err());
    }
}
