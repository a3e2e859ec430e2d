//! Wind dictionary and the pure preset/style resolver.
//!
//! The simulation collaborator consumes [`ResolvedWind`]; this module only
//! combines dictionary entries and never touches runtime state.
//!
//! ```text
//! preset.base ──× style.factors ──+ adjust ──clamp/floor──▶ ResolvedWind
//! ```

use heapless::Vec;
use serde::{Deserialize, Serialize};

use crate::error::ResolveError;
use crate::model::{AdjustDelta, Code, Name, bounded_str};

pub const MAX_PRESETS: usize = 16;
pub const MAX_STYLES: usize = 8;

// ───────────────────────────────────────────────────────────────
// Dictionary
// ───────────────────────────────────────────────────────────────

/// Base numbers of one preset.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindBase {
    pub wind_intensity: f32,
    pub gust_frequency: f32,
    pub wind_variability: f32,
    pub fan_limit: f32,
    pub min_fan: f32,
    pub turbulence_length_scale: f32,
    pub turbulence_intensity_sigma: f32,
    pub thermal_bubble_strength: f32,
    pub thermal_bubble_radius: f32,
    pub base_min_wind: f32,
    pub base_max_wind: f32,
    pub gust_prob_base: f32,
    pub gust_strength_max: f32,
    pub thermal_freq_base: f32,
}

impl Default for WindBase {
    fn default() -> Self {
        Self {
            wind_intensity: 50.0,
            gust_frequency: 30.0,
            wind_variability: 30.0,
            fan_limit: 80.0,
            min_fan: 10.0,
            turbulence_length_scale: 40.0,
            turbulence_intensity_sigma: 0.5,
            thermal_bubble_strength: 2.0,
            thermal_bubble_radius: 18.0,
            base_min_wind: 1.8,
            base_max_wind: 5.5,
            gust_prob_base: 0.04,
            gust_strength_max: 2.1,
            thermal_freq_base: 0.022,
        }
    }
}

/// Multipliers a style applies to a preset.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StyleFactors {
    pub intensity: f32,
    pub variability: f32,
    pub gust: f32,
    pub thermal: f32,
}

impl Default for StyleFactors {
    fn default() -> Self {
        Self {
            intensity: 1.0,
            variability: 1.0,
            gust: 1.0,
            thermal: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresetEntry {
    pub code: Code,
    #[serde(default)]
    pub name: Name,
    #[serde(default)]
    pub base: WindBase,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StyleEntry {
    pub code: Code,
    #[serde(default)]
    pub name: Name,
    #[serde(default)]
    pub factors: StyleFactors,
}

/// Presets and styles loaded from configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WindDict {
    #[serde(default)]
    pub presets: Vec<PresetEntry, MAX_PRESETS>,
    #[serde(default)]
    pub styles: Vec<StyleEntry, MAX_STYLES>,
}

impl WindDict {
    pub fn preset(&self, code: &str) -> Option<&PresetEntry> {
        self.presets
            .iter()
            .find(|p| p.code.eq_ignore_ascii_case(code))
    }

    pub fn style(&self, code: &str) -> Option<&StyleEntry> {
        self.styles.iter().find(|s| s.code.eq_ignore_ascii_case(code))
    }

    /// Display name for a preset code, falling back to the code itself.
    pub fn preset_name<'a>(&'a self, code: &'a str) -> &'a str {
        self.preset(code)
            .map(|p| p.name.as_str())
            .filter(|n| !n.is_empty())
            .unwrap_or(code)
    }

    /// Display name for a style code, falling back to the code itself.
    pub fn style_name<'a>(&'a self, code: &'a str) -> &'a str {
        self.style(code)
            .map(|s| s.name.as_str())
            .filter(|n| !n.is_empty())
            .unwrap_or(code)
    }

    /// Combine preset, optional style and deltas into final wind parameters.
    ///
    /// An empty `style` means "no style".  Unknown codes fail without side
    /// effects.
    pub fn resolve(
        &self,
        preset: &str,
        style: &str,
        adjust: &AdjustDelta,
    ) -> Result<ResolvedWind, ResolveError> {
        let entry = self.preset(preset).ok_or(ResolveError::UnknownPreset)?;
        let (style_code, factors) = if style.is_empty() {
            (Code::new(), StyleFactors::default())
        } else {
            let s = self.style(style).ok_or(ResolveError::UnknownStyle)?;
            (s.code.clone(), s.factors)
        };
        let b = &entry.base;

        let intensity = b.wind_intensity * factors.intensity + adjust.wind_intensity;
        let variability = b.wind_variability * factors.variability + adjust.wind_variability;
        let gust = b.gust_frequency * factors.gust + adjust.gust_frequency;
        let thermal = b.thermal_bubble_strength * factors.thermal;

        let fan_limit = clamp_pct(b.fan_limit + adjust.fan_limit);
        let min_fan = clamp_pct(b.min_fan + adjust.min_fan).min(fan_limit);

        Ok(ResolvedWind {
            preset_code: entry.code.clone(),
            style_code,
            wind_intensity: clamp_pct(intensity),
            wind_variability: clamp_pct(variability),
            gust_frequency: clamp_pct(gust),
            fan_limit,
            min_fan,
            turbulence_length_scale: b.turbulence_length_scale.max(1.0),
            turbulence_intensity_sigma: b.turbulence_intensity_sigma.max(0.0),
            thermal_bubble_strength: thermal.max(0.1),
            thermal_bubble_radius: b.thermal_bubble_radius.max(1.0),
            base_min_wind: b.base_min_wind,
            base_max_wind: b.base_max_wind,
            gust_prob_base: b.gust_prob_base,
            gust_strength_max: b.gust_strength_max,
            thermal_freq_base: b.thermal_freq_base,
        })
    }
}

fn clamp_pct(v: f32) -> f32 {
    v.clamp(0.0, 100.0)
}

// ───────────────────────────────────────────────────────────────
// Resolved output
// ───────────────────────────────────────────────────────────────

/// Final numbers handed to the simulation collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedWind {
    pub preset_code: Code,
    pub style_code: Code,
    pub wind_intensity: f32,
    pub wind_variability: f32,
    pub gust_frequency: f32,
    pub fan_limit: f32,
    pub min_fan: f32,
    pub turbulence_length_scale: f32,
    pub turbulence_intensity_sigma: f32,
    pub thermal_bubble_strength: f32,
    pub thermal_bubble_radius: f32,
    pub base_min_wind: f32,
    pub base_max_wind: f32,
    pub gust_prob_base: f32,
    pub gust_strength_max: f32,
    pub thermal_freq_base: f32,
}

/// What the actuator should do: run the simulation or hold a duty.
#[derive(Debug, Clone, PartialEq)]
pub enum WindCommand {
    Resolved(ResolvedWind),
    /// Duty percent, already clamped to `0..=100`.
    Fixed(f32),
}

impl WindCommand {
    pub fn fixed(percent: f32) -> Self {
        Self::Fixed(clamp_duty(percent))
    }
}

/// Clamp a requested duty to `0..=100`; NaN becomes 0.
pub fn clamp_duty(percent: f32) -> f32 {
    if percent.is_nan() { 0.0 } else { percent.clamp(0.0, 100.0) }
}
