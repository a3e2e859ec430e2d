//! Schedule and profile data model.
//!
//! These are the read-only items the config store hands to the engine.
//! Everything is fixed-capacity (`heapless`) so a full configuration fits
//! in a predictable amount of RAM.
//!
//! ```text
//! ScheduleItem ─┬─ SchedulePeriod (days + start/end)
//!               ├─ [Segment; ≤8] ── SegmentOutput (Preset | Fixed)
//!               ├─ repeat / repeat_count
//!               ├─ AutoOffConfig
//!               └─ MotionConfig
//! ProfileItem  ── same, minus the period
//! ```

use core::fmt::{self, Write as _};

use heapless::{String, Vec};
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

// ───────────────────────────────────────────────────────────────
// Capacities
// ───────────────────────────────────────────────────────────────

pub const MAX_SCHEDULES: usize = 8;
pub const MAX_PROFILES: usize = 6;
pub const MAX_SEGMENTS: usize = 8;
pub const MAX_NAME_LEN: usize = 32;
pub const MAX_CODE_LEN: usize = 24;

pub const MINUTES_PER_DAY: u16 = 1440;

pub type Name = String<MAX_NAME_LEN>;
pub type Code = String<MAX_CODE_LEN>;

/// Copy `s` into a bounded string, truncating at a char boundary.
pub fn bounded_str<const N: usize>(s: &str) -> String<N> {
    let mut out = String::new();
    for ch in s.chars() {
        if out.push(ch).is_err() {
            break;
        }
    }
    out
}

// ───────────────────────────────────────────────────────────────
// Calendar
// ───────────────────────────────────────────────────────────────

/// Day of week, Monday first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Weekday {
    Mon = 0,
    Tue = 1,
    Wed = 2,
    Thu = 3,
    Fri = 4,
    Sat = 5,
    Sun = 6,
}

impl Weekday {
    pub const ALL: [Self; 7] = [
        Self::Mon,
        Self::Tue,
        Self::Wed,
        Self::Thu,
        Self::Fri,
        Self::Sat,
        Self::Sun,
    ];

    /// Monday-first index (0..=6).
    pub fn from_index(idx: u8) -> Option<Self> {
        Self::ALL.get(idx as usize).copied()
    }

    /// Convert a C `tm_wday` value (0 = Sunday) to a Monday-first weekday.
    pub fn from_sunday_based(wday: u8) -> Option<Self> {
        if wday > 6 {
            return None;
        }
        Self::from_index((wday + 6) % 7)
    }

    pub const fn index(self) -> u8 {
        self as u8
    }

    /// The day before, wrapping Monday back to Sunday.
    pub fn previous(self) -> Self {
        Self::ALL[(self as usize + 6) % 7]
    }
}

/// Weekly day mask, bit 0 = Monday … bit 6 = Sunday.
///
/// Serialised as `[bool; 7]` in Monday-first order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "[bool; 7]", into = "[bool; 7]")]
pub struct WeekDays(u8);

impl WeekDays {
    pub const NONE: Self = Self(0);
    pub const EVERY_DAY: Self = Self(0x7F);

    pub const fn from_bits(bits: u8) -> Self {
        Self(bits & 0x7F)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    #[must_use]
    pub const fn with(self, day: Weekday) -> Self {
        Self(self.0 | (1 << day as u8))
    }

    pub const fn contains(self, day: Weekday) -> bool {
        self.0 & (1 << day as u8) != 0
    }
}

impl From<[bool; 7]> for WeekDays {
    fn from(days: [bool; 7]) -> Self {
        let bits = days
            .iter()
            .enumerate()
            .fold(0u8, |acc, (i, on)| if *on { acc | (1 << i) } else { acc });
        Self(bits)
    }
}

impl From<WeekDays> for [bool; 7] {
    fn from(days: WeekDays) -> Self {
        let mut out = [false; 7];
        for (i, slot) in out.iter_mut().enumerate() {
            *slot = days.0 & (1 << i) != 0;
        }
        out
    }
}

/// Minute of day in `0..=1440`, written as `"HH:MM"`.
///
/// `"24:00"` (1440) is accepted so a window can run to the end of the day.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimeOfDay(u16);

impl TimeOfDay {
    pub const MIDNIGHT: Self = Self(0);

    pub const fn from_minutes(minutes: u16) -> Option<Self> {
        if minutes <= MINUTES_PER_DAY {
            Some(Self(minutes))
        } else {
            None
        }
    }

    pub const fn hm(hour: u8, minute: u8) -> Option<Self> {
        if minute >= 60 || hour > 24 || (hour == 24 && minute != 0) {
            return None;
        }
        Some(Self(hour as u16 * 60 + minute as u16))
    }

    pub const fn minutes(self) -> u16 {
        self.0
    }

    /// Parse `"H:MM"` / `"HH:MM"`.
    pub fn parse(s: &str) -> Option<Self> {
        let (h, m) = s.trim().split_once(':')?;
        if m.len() != 2 || h.is_empty() || h.len() > 2 {
            return None;
        }
        Self::hm(h.parse().ok()?, m.parse().ok()?)
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.0 / 60, self.0 % 60)
    }
}

impl Serialize for TimeOfDay {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut buf: String<5> = String::new();
        write!(buf, "{self}")
            .map_err(|_| <S::Error as serde::ser::Error>::custom("time of day overflow"))?;
        serializer.serialize_str(&buf)
    }
}

impl<'de> Deserialize<'de> for TimeOfDay {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct HhMm;

        impl Visitor<'_> for HhMm {
            type Value = TimeOfDay;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a time of day as \"HH:MM\"")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<TimeOfDay, E> {
                TimeOfDay::parse(v).ok_or_else(|| E::invalid_value(de::Unexpected::Str(v), &self))
            }
        }

        deserializer.deserialize_str(HhMm)
    }
}

// ───────────────────────────────────────────────────────────────
// Segments
// ───────────────────────────────────────────────────────────────

/// Per-segment adjustment added on top of a resolved preset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdjustDelta {
    pub wind_intensity: f32,
    pub wind_variability: f32,
    pub gust_frequency: f32,
    pub fan_limit: f32,
    pub min_fan: f32,
}

/// What a segment drives while in its On phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentOutput {
    /// Resolve a preset (+ optional style and deltas) and hand it to the simulation.
    Preset {
        code: Code,
        #[serde(default)]
        style: Code,
        #[serde(default)]
        adjust: AdjustDelta,
    },
    /// Bypass the simulation and hold a fixed PWM duty.
    Fixed { duty_percent: f32 },
}

/// A timed on/off unit of a schedule or profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub seg_id: u8,
    pub seg_no: u16,
    #[serde(default)]
    pub on_minutes: u16,
    #[serde(default)]
    pub off_minutes: u16,
    pub output: SegmentOutput,
}

impl Segment {
    /// Builds a preset segment.  The id follows `seg_no` while it fits in a
    /// byte; larger numbers get id 0 until [`Segment::with_id`] sets one.
    pub fn preset(seg_no: u16, on_minutes: u16, off_minutes: u16, code: &str, style: &str) -> Self {
        Self {
            seg_id: default_seg_id(seg_no),
            seg_no,
            on_minutes,
            off_minutes,
            output: SegmentOutput::Preset {
                code: bounded_str(code),
                style: bounded_str(style),
                adjust: AdjustDelta::default(),
            },
        }
    }

    pub fn fixed(seg_no: u16, on_minutes: u16, off_minutes: u16, duty_percent: f32) -> Self {
        Self {
            seg_id: default_seg_id(seg_no),
            seg_no,
            on_minutes,
            off_minutes,
            output: SegmentOutput::Fixed { duty_percent },
        }
    }

    pub fn with_id(mut self, seg_id: u8) -> Self {
        self.seg_id = seg_id;
        self
    }

    pub fn on_ms(&self) -> u64 {
        u64::from(self.on_minutes) * 60_000
    }

    pub fn off_ms(&self) -> u64 {
        u64::from(self.off_minutes) * 60_000
    }
}

fn default_seg_id(seg_no: u16) -> u8 {
    u8::try_from(seg_no).unwrap_or(0)
}

/// Loop behaviour once the last segment's Off phase ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepeatPolicy {
    /// Run the list once, then stop.
    Once,
    /// Loop forever.
    Forever,
    /// Run the list this many times in total.
    Times(u8),
}

impl RepeatPolicy {
    pub fn from_flags(repeat: bool, repeat_count: u8) -> Self {
        match (repeat, repeat_count) {
            (false, _) => Self::Once,
            (true, 0) => Self::Forever,
            (true, n) => Self::Times(n),
        }
    }
}

// ───────────────────────────────────────────────────────────────
// AutoOff / motion
// ───────────────────────────────────────────────────────────────

/// Shutoff conditions armed when a schedule or profile starts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoOffConfig {
    /// Stop after this many minutes of running (0 disables).
    pub timer_minutes: Option<u32>,
    /// Stop once the local clock reaches this time.
    pub off_time: Option<TimeOfDay>,
    /// Stop once the sampled temperature reaches this value (°C).
    pub off_temp_c: Option<f32>,
}

/// Presence gating for a schedule or profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MotionConfig {
    pub pir_enabled: bool,
    pub ble_enabled: bool,
    /// Debounce hold handled by the motion collaborator.
    pub hold_sec: u16,
    /// BLE RSSI threshold handled by the motion collaborator.
    pub rssi_threshold: i8,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            pir_enabled: false,
            ble_enabled: false,
            hold_sec: 120,
            rssi_threshold: -70,
        }
    }
}

impl MotionConfig {
    pub fn gating_enabled(&self) -> bool {
        self.pir_enabled || self.ble_enabled
    }
}

// ───────────────────────────────────────────────────────────────
// Schedules and profiles
// ───────────────────────────────────────────────────────────────

/// Anything the segment sequencer can run.
pub trait SegmentProgram {
    fn segments(&self) -> &[Segment];
    fn repeat_policy(&self) -> RepeatPolicy;
    fn auto_off(&self) -> &AutoOffConfig;
    fn motion(&self) -> &MotionConfig;
}

/// Weekly time window of a schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulePeriod {
    pub days: WeekDays,
    pub start: TimeOfDay,
    pub end: TimeOfDay,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleItem {
    pub sch_id: u8,
    pub sch_no: u16,
    #[serde(default)]
    pub name: Name,
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub period: SchedulePeriod,
    #[serde(default)]
    pub segments: Vec<Segment, MAX_SEGMENTS>,
    #[serde(default = "default_true")]
    pub repeat: bool,
    #[serde(default)]
    pub repeat_count: u8,
    #[serde(default)]
    pub auto_off: AutoOffConfig,
    #[serde(default)]
    pub motion: MotionConfig,
}

impl ScheduleItem {
    /// An enabled, repeating schedule with no segments.
    pub fn new(sch_id: u8, sch_no: u16, period: SchedulePeriod) -> Self {
        Self {
            sch_id,
            sch_no,
            name: Name::new(),
            enabled: true,
            period,
            segments: Vec::new(),
            repeat: true,
            repeat_count: 0,
            auto_off: AutoOffConfig::default(),
            motion: MotionConfig::default(),
        }
    }
}

impl SegmentProgram for ScheduleItem {
    fn segments(&self) -> &[Segment] {
        &self.segments
    }

    fn repeat_policy(&self) -> RepeatPolicy {
        RepeatPolicy::from_flags(self.repeat, self.repeat_count)
    }

    fn auto_off(&self) -> &AutoOffConfig {
        &self.auto_off
    }

    fn motion(&self) -> &MotionConfig {
        &self.motion
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileItem {
    pub profile_id: u8,
    pub profile_no: u8,
    #[serde(default)]
    pub name: Name,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub segments: Vec<Segment, MAX_SEGMENTS>,
    #[serde(default = "default_true")]
    pub repeat: bool,
    #[serde(default)]
    pub repeat_count: u8,
    #[serde(default)]
    pub auto_off: AutoOffConfig,
    #[serde(default)]
    pub motion: MotionConfig,
}

impl ProfileItem {
    pub fn new(profile_id: u8, profile_no: u8) -> Self {
        Self {
            profile_id,
            profile_no,
            name: Name::new(),
            enabled: true,
            segments: Vec::new(),
            repeat: true,
            repeat_count: 0,
            auto_off: AutoOffConfig::default(),
            motion: MotionConfig::default(),
        }
    }
}

impl SegmentProgram for ProfileItem {
    fn segments(&self) -> &[Segment] {
        &self.segments
    }

    fn repeat_policy(&self) -> RepeatPolicy {
        RepeatPolicy::from_flags(self.repeat, self.repeat_count)
    }

    fn auto_off(&self) -> &AutoOffConfig {
        &self.auto_off
    }

    fn motion(&self) -> &MotionConfig {
        &self.motion
    }
}
