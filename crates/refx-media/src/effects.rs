//! Effect-to-filter-graph translation.
//!
//! Effects are applied in a fixed order (watermark, blur, speed) no matter
//! how the request listed them, so identical effect sets always produce the
//! same FFmpeg invocation.

use std::path::{Path, PathBuf};

use refx_models::{canonical_order, Effect};

/// Bottom-right watermark with a 10px margin.
const WATERMARK_OVERLAY: &str = "overlay=main_w-overlay_w-10:main_h-overlay_h-10";
const BLUR_FILTER: &str = "boxblur=5";
const SPEED_FILTER: &str = "setpts=0.5*PTS";

/// The FFmpeg-facing shape of a set of effects.
#[derive(Debug, Clone, Default)]
pub struct EffectGraph {
    /// Extra input file (the watermark image), added after the main input.
    pub extra_input: Option<PathBuf>,
    /// Filter complex string, used when the graph needs a second input.
    pub filter_complex: Option<String>,
    /// Simple video filter chain, used for single-input graphs.
    pub video_filter: Option<String>,
    /// Stream maps to apply when a filter complex is in play.
    pub maps: Vec<String>,
}

impl EffectGraph {
    /// Whether this graph changes the video at all.
    pub fn is_passthrough(&self) -> bool {
        self.filter_complex.is_none() && self.video_filter.is_none()
    }
}

fn filter_for(effect: Effect) -> &'static str {
    match effect {
        Effect::Watermark => WATERMARK_OVERLAY,
        Effect::Blur => BLUR_FILTER,
        Effect::Speed => SPEED_FILTER,
    }
}

/// Build the filter graph for a set of effects.
///
/// `watermark` is the path to the overlay image; it only ends up in the
/// graph when the watermark effect is requested.
pub fn effect_graph(effects: &[Effect], watermark: impl AsRef<Path>) -> EffectGraph {
    let ordered = canonical_order(effects);
    if ordered.is_empty() {
        return EffectGraph::default();
    }

    let has_watermark = ordered.contains(&Effect::Watermark);
    let chain: Vec<&str> = ordered.iter().map(|e| filter_for(*e)).collect();

    if has_watermark {
        // The overlay consumes both inputs, so the whole chain lives in a
        // filter_complex and the output stream needs an explicit map. Audio
        // is mapped from the main input, optional so silent clips still work.
        let filter_complex = format!("[0:v][1:v]{}[vout]", chain.join(","));
        EffectGraph {
            extra_input: Some(watermark.as_ref().to_path_buf()),
            filter_complex: Some(filter_complex),
            video_filter: None,
            maps: vec!["[vout]".to_string(), "0:a?".to_string()],
        }
    } else {
        EffectGraph {
            extra_input: None,
            filter_complex: None,
            video_filter: Some(chain.join(",")),
            maps: Vec::new(),
        }
    }
}
