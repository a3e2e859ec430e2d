//! JSON-backed configuration store.
//!
//! Parses the schedule, profile, wind-dictionary and system documents once
//! and serves them through [`ConfigStore`].  A section that is missing from
//! the document stays absent (`None`), which the engine reports as
//! `NO_SCHEDULES` or a failed resolve rather than an error.

use anyhow::{Context, Result, bail};
use heapless::Vec;
use log::info;
use serde::Deserialize;

use crate::app::ports::ConfigStore;
use crate::broadcast::BroadcastPolicy;
use crate::model::{MAX_PROFILES, MAX_SCHEDULES, ProfileItem, ScheduleItem};
use crate::wind::WindDict;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Document {
    schedules: Option<Vec<ScheduleItem, MAX_SCHEDULES>>,
    profiles: Option<Vec<ProfileItem, MAX_PROFILES>>,
    wind_dict: Option<WindDict>,
    system: Option<SystemSection>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SystemSection {
    broadcast: Option<BroadcastPolicy>,
}

#[derive(Debug, Default)]
pub struct MemoryConfigStore {
    schedules: Option<Vec<ScheduleItem, MAX_SCHEDULES>>,
    profiles: Option<Vec<ProfileItem, MAX_PROFILES>>,
    wind_dict: Option<WindDict>,
    broadcast: Option<BroadcastPolicy>,
}

impl MemoryConfigStore {
    /// Empty store: every section absent.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a combined configuration document.
    pub fn from_json(json: &str) -> Result<Self> {
        let doc: Document = serde_json::from_str(json).context("parsing configuration document")?;

        if let Some(schedules) = &doc.schedules {
            check_unique(schedules.iter().map(|s| u32::from(s.sch_no)), "schedule number")?;
        }
        if let Some(profiles) = &doc.profiles {
            check_unique(profiles.iter().map(|p| u32::from(p.profile_no)), "profile number")?;
        }

        info!(
            "ConfigStore: {} schedules, {} profiles, dictionary {}",
            doc.schedules.as_ref().map_or(0, |s| s.len()),
            doc.profiles.as_ref().map_or(0, |p| p.len()),
            if doc.wind_dict.is_some() { "loaded" } else { "absent" }
        );

        Ok(Self {
            schedules: doc.schedules,
            profiles: doc.profiles,
            wind_dict: doc.wind_dict,
            broadcast: doc.system.and_then(|s| s.broadcast),
        })
    }

    pub fn set_schedules(&mut self, schedules: Option<Vec<ScheduleItem, MAX_SCHEDULES>>) {
        self.schedules = schedules;
    }

    pub fn set_profiles(&mut self, profiles: Option<Vec<ProfileItem, MAX_PROFILES>>) {
        self.profiles = profiles;
    }

    pub fn set_wind_dict(&mut self, dict: Option<WindDict>) {
        self.wind_dict = dict;
    }

    pub fn set_broadcast_policy(&mut self, policy: Option<BroadcastPolicy>) {
        self.broadcast = policy;
    }

    pub fn schedules_mut(&mut self) -> Option<&mut Vec<ScheduleItem, MAX_SCHEDULES>> {
        self.schedules.as_mut()
    }
}

fn check_unique(numbers: impl Iterator<Item = u32>, what: &str) -> Result<()> {
    let mut seen: Vec<u32, 16> = Vec::new();
    for no in numbers {
        if seen.contains(&no) {
            bail!("duplicate {} {}", what, no);
        }
        // Capacity exceeds both item limits.
        let _ = seen.push(no);
    }
    Ok(())
}

impl ConfigStore for MemoryConfigStore {
    fn schedules(&self) -> Option<&[ScheduleItem]> {
        self.schedules.as_deref()
    }

    fn profiles(&self) -> Option<&[ProfileItem]> {
        self.profiles.as_deref()
    }

    fn wind_dict(&self) -> Option<&WindDict> {
        self.wind_dict.as_ref()
    }

    fn broadcast_policy(&self) -> Option<BroadcastPolicy> {
        self.broadcast
    }
}
