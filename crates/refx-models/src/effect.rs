//! Requested render effects.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A named transformation applied during the encode.
///
/// The set is closed: unrecognized names are a configuration error at
/// admission time, never silently ignored. The order effects are applied
/// in is fixed by the encoder (see `refx-media::effects`), not by the
/// order a client lists them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Effect {
    /// Overlay the branded watermark image in the bottom-right corner.
    Watermark,
    /// Box blur over the full frame.
    Blur,
    /// 2x playback speed (video PTS rescale).
    Speed,
}

impl Effect {
    pub fn as_str(&self) -> &'static str {
        match self {
            Effect::Watermark => "watermark",
            Effect::Blur => "blur",
            Effect::Speed => "speed",
        }
    }

    /// Position in the canonical application order.
    ///
    /// Watermark compositing happens before any frame filter, blur before
    /// time-domain changes. Changing this changes output.
    pub fn apply_rank(&self) -> u8 {
        match self {
            Effect::Watermark => 0,
            Effect::Blur => 1,
            Effect::Speed => 2,
        }
    }
}

impl fmt::Display for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Error for effect names outside the supported set.
#[derive(Debug, Clone, Error)]
#[error("unknown effect: {0}")]
pub struct UnknownEffect(pub String);

impl FromStr for Effect {
    type Err = UnknownEffect;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "watermark" => Ok(Effect::Watermark),
            "blur" => Ok(Effect::Blur),
            "speed" => Ok(Effect::Speed),
            other => Err(UnknownEffect(other.to_string())),
        }
    }
}

/// Sort effects into canonical application order, dropping duplicates.
pub fn canonical_order(effects: &[Effect]) -> Vec<Effect> {
    let mut ordered: Vec<Effect> = Vec::new();
    for effect in effects {
        if !ordered.contains(effect) {
            ordered.push(*effect);
        }
    }
    ordered.sort_by_key(|e| e.apply_rank());
    ordered
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_known_effects() {
        assert_eq!("watermark".parse::<Effect>().unwrap(), Effect::Watermark);
        assert_eq!("blur".parse::<Effect>().unwrap(), Effect::Blur);
        assert_eq!("speed".parse::<Effect>().unwrap(), Effect::Speed);
    }

    #[test]
    fn parse_unknown_effect_is_an_error() {
        let err = "sepia".parse::<Effect>().unwrap_err();
        assert_eq!(err.0, "sepia");
    }

    #[test]
    fn canonical_order_ignores_request_order() {
        let a = canonical_order(&[Effect::Speed, Effect::Watermark, Effect::Blur]);
        let b = canonical_order(&[Effect::Blur, Effect::Speed, Effect::Watermark]);
        assert_eq!(a, b);
        assert_eq!(a, vec![Effect::Watermark, Effect::Blur, Effect::Speed]);
    }

    #[test]
    fn canonical_order_drops_duplicates() {
        let ordered = canonical_order(&[Effect::Blur, Effect::Blur, Effect::Speed]);
        assert_eq!(ordered, vec![Effect::Blur, Effect::Speed]);
    }

    #[test]
    fn effect_serde_uses_snake_case() {
        let json = serde_json::to_string(&Effect::Watermark).unwrap();
        assert_eq!(json, "\"watermark\"");
        assert!(serde_json::from_str::<Effect>("\"vignette\"").is_err());
    }
}
