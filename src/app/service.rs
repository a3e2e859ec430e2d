//! Control engine, the hexagonal core.
//!
//! [`ControlEngine`] owns the run context, the override, both segment
//! runtimes and the AutoOff monitor.  Configuration and devices are
//! injected per call through port traits, so the whole engine runs
//! against mock adapters in tests.
//!
//! ```text
//!  ConfigStore ──▶ ┌──────────────────────────────────┐
//!                  │          ControlEngine           │ ──▶ DirtyFlags
//!  DevicePorts ◀──▶│ decide · apply · AutoOff · run   │
//!                  └──────────────────────────────────┘
//! ```
//!
//! ## Tick
//!
//! 1. Rate limit (`min_tick_interval_ms`).
//! 2. Merge the actuator's dirty bits, sample the clock.
//! 3. Holding event state → republish metrics only, return.
//! 4. Decide `(state, reason, source)` and apply it.
//! 5. With a schedule/profile source: AutoOff check.
//! 6. Execute: override, segment sequencer, or nothing.
//!
//! `tick` never fails.  Every error is resolved where it occurs and
//! surfaces as a state/reason pair plus a log line.

use log::{debug, error, info, warn};

use crate::autooff::{AutoOffMonitor, AutoOffTrigger};
use crate::broadcast::{Channel, ChannelSet, DirtyFlags};
use crate::config::ControlConfig;
use crate::control::{SegmentRuntime, SequenceEvent};
use crate::error::{Error, Result};
use crate::fsm::context::{ActiveSnapshot, RunContext, ScheduleRef, SegmentRef};
use crate::fsm::{EventStateController, Reason, RunSource, RunState};
use crate::model::{AdjustDelta, AutoOffConfig, MotionConfig, ProfileItem, Segment, SegmentOutput, SegmentProgram};
use crate::schedule::find_active;
use crate::sensors::TemperatureSampler;
use crate::wind::{ResolvedWind, WindCommand, clamp_duty};

use super::commands::ControlCommand;
use super::ports::{ClockPort, ConfigPort, ConfigStore, DevicePorts, LocalTime, MotionPort, WindActuator};

// ───────────────────────────────────────────────────────────────
// Supporting types
// ───────────────────────────────────────────────────────────────

/// Manual override running on top of the run source.
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveOverride {
    pub command: WindCommand,
    pub started_ms: u64,
    /// `None` runs until cleared.
    pub expires_at_ms: Option<u64>,
    applied: bool,
}

impl ActiveOverride {
    /// Whole seconds left, rounded up.  `None` without an expiry.
    pub fn remaining_secs(&self, now_ms: u64) -> Option<u32> {
        self.expires_at_ms
            .map(|t| u32::try_from(t.saturating_sub(now_ms).div_ceil(1000)).unwrap_or(u32::MAX))
    }
}

/// Last clock reading the engine acted on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimeCache {
    pub valid: bool,
    pub local: Option<LocalTime>,
}

impl TimeCache {
    /// Local time, only when synchronised.
    pub fn usable(&self) -> Option<&LocalTime> {
        if self.valid { self.local.as_ref() } else { None }
    }
}

#[derive(Debug, Clone, Copy)]
enum SourceUpdate {
    Keep,
    Set(RunSource),
}

#[derive(Debug, Clone, Copy)]
struct Decision {
    state: RunState,
    reason: Reason,
    source: SourceUpdate,
}

impl Decision {
    fn keep(state: RunState, reason: Reason) -> Self {
        Self {
            state,
            reason,
            source: SourceUpdate::Keep,
        }
    }

    fn set(state: RunState, reason: Reason, source: RunSource) -> Self {
        Self {
            state,
            reason,
            source: SourceUpdate::Set(source),
        }
    }

    /// Run `source`, unless motion gating is on and nobody is present.
    fn gated(source: RunSource, state: RunState, reason: Reason, motion: &MotionConfig, presence: bool) -> Self {
        if motion.gating_enabled() && !presence {
            Self::set(RunState::MotionBlocked, Reason::MotionNoPresence, source)
        } else {
            Self::set(state, reason, source)
        }
    }
}

// ───────────────────────────────────────────────────────────────
// ControlEngine
// ───────────────────────────────────────────────────────────────

pub struct ControlEngine {
    config: ControlConfig,
    events: EventStateController,
    source: RunSource,
    profile_mode: bool,
    manual: Option<ActiveOverride>,
    schedule_rt: SegmentRuntime,
    profile_rt: SegmentRuntime,
    auto_off: AutoOffMonitor,
    temperature: TemperatureSampler,
    dirty: DirtyFlags,
    time: TimeCache,
    last_tick_ms: Option<u64>,
    last_metrics_push_ms: u64,
    tick_count: u64,
    config_dirty: bool,
    dirty_since_ms: u64,
}

impl ControlEngine {
    /// Construct the engine from configuration.  Starts Idle with no source.
    pub fn new(config: ControlConfig) -> Self {
        let events = EventStateController::new(&config);
        let temperature = TemperatureSampler::new(config.temperature_sample_interval_ms);
        Self {
            config,
            events,
            source: RunSource::None,
            profile_mode: false,
            manual: None,
            schedule_rt: SegmentRuntime::new(),
            profile_rt: SegmentRuntime::new(),
            auto_off: AutoOffMonitor::new(),
            temperature,
            dirty: DirtyFlags::new(),
            time: TimeCache::default(),
            last_tick_ms: None,
            last_metrics_push_ms: 0,
            tick_count: 0,
            config_dirty: false,
            dirty_since_ms: 0,
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Stamp the context and request a full publish.
    pub fn start(&mut self, now_ms: u64) {
        self.events.reset(now_ms);
        self.last_metrics_push_ms = now_ms;
        self.dirty.mark_set(ChannelSet::ALL);
        info!("Control: engine started in {}", self.events.state().as_str());
    }

    /// Run one control cycle.
    pub fn tick(&mut self, now_ms: u64, store: &impl ConfigStore, hw: &mut impl DevicePorts) {
        if let Some(last) = self.last_tick_ms {
            if now_ms.saturating_sub(last) < u64::from(self.config.min_tick_interval_ms) {
                return;
            }
        }
        self.last_tick_ms = Some(now_ms);
        self.tick_count += 1;

        self.dirty.mark_set(hw.take_dirty());
        self.sample_time(&*hw);

        if self.events.is_holding(now_ms) {
            self.push_metrics_if_due(now_ms);
            return;
        }

        let presence = MotionPort::is_active(hw);
        let decision = self.decide(store, presence);
        let resume = self.apply(decision, store, hw, now_ms);
        self.execute(store, hw, now_ms, resume);
        self.push_metrics_if_due(now_ms);
    }

    // ── Decision ──────────────────────────────────────────────

    /// Arbitration order: override, engaged profile, profile mode,
    /// clock validity, schedules.
    fn decide(&self, store: &impl ConfigStore, presence: bool) -> Decision {
        if self.manual.is_some() {
            return Decision::keep(RunState::Override, Reason::OverrideActive);
        }

        if let Some((idx, profile)) = self.engaged_profile(store) {
            let reason = if self.profile_mode {
                Reason::ProfileMode
            } else {
                Reason::UserProfileActive
            };
            return Decision::gated(
                RunSource::Profile(idx),
                RunState::ProfileRun,
                reason,
                profile.motion(),
                presence,
            );
        }
        if self.profile_mode {
            return Decision::set(RunState::Idle, Reason::ProfileMode, RunSource::None);
        }

        let Some(local) = self.time.usable() else {
            return Decision::set(RunState::TimeInvalid, Reason::TimeNotValid, RunSource::None);
        };

        let schedules = match store.schedules() {
            Some(list) if !list.is_empty() => list,
            _ => return Decision::set(RunState::Idle, Reason::NoSchedules, RunSource::None),
        };

        match find_active(
            schedules,
            local.weekday,
            local.minute_of_day(),
            self.config.overlap_policy,
        ) {
            Some(idx) => Decision::gated(
                RunSource::Schedule(idx),
                RunState::ScheduleRun,
                Reason::ScheduleActive,
                &schedules[idx].motion,
                presence,
            ),
            None => Decision::set(RunState::Idle, Reason::NoActiveSchedule, RunSource::None),
        }
    }

    /// The running user profile, if it is still configured and enabled.
    fn engaged_profile<'s>(&self, store: &'s impl ConfigStore) -> Option<(usize, &'s ProfileItem)> {
        let idx = self.source.profile_index()?;
        let profile = store.profiles()?.get(idx)?;
        profile.enabled.then_some((idx, profile))
    }

    /// Write the decision into the context.  Returns `true` when a running
    /// state was re-entered with its source intact, so the current segment
    /// must be re-applied.
    fn apply(
        &mut self,
        d: Decision,
        store: &impl ConfigStore,
        hw: &mut impl WindActuator,
        now_ms: u64,
    ) -> bool {
        let prev = self.events.state();

        let mut source_changed = false;
        if let SourceUpdate::Set(next) = d.source {
            if next != self.source {
                self.switch_source(next, store, hw, now_ms);
                source_changed = true;
            }
        }

        let changed = self.events.transition(d.state, d.reason, now_ms);
        if d.state != prev && !self.events.descriptor(d.state).drives_output && hw.is_running() {
            hw.stop();
        }
        self.refresh_snapshot(store);

        if changed || source_changed {
            self.dirty.mark_status();
            info!(
                "Control: state={} reason={} source={}",
                d.state.as_str(),
                d.reason.as_str(),
                self.source.as_str()
            );
        }

        !source_changed && d.state != prev && d.state.is_running() && !prev.is_running()
    }

    fn switch_source(
        &mut self,
        next: RunSource,
        store: &impl ConfigStore,
        hw: &mut impl WindActuator,
        now_ms: u64,
    ) {
        hw.stop();
        debug!("Control: run source {} -> {}", self.source.as_str(), next.as_str());
        self.source = next;
        match next {
            RunSource::None => {
                self.auto_off.clear();
                self.schedule_rt.reset(now_ms);
                self.profile_rt.reset(now_ms);
            }
            RunSource::Schedule(idx) => {
                self.schedule_rt.reset(now_ms);
                let cfg = store.schedules().and_then(|s| s.get(idx)).map(|s| s.auto_off);
                self.arm_auto_off(cfg.as_ref(), now_ms);
            }
            RunSource::Profile(idx) => {
                self.profile_rt.reset(now_ms);
                let cfg = store.profiles().and_then(|p| p.get(idx)).map(|p| p.auto_off);
                self.arm_auto_off(cfg.as_ref(), now_ms);
            }
        }
    }

    fn arm_auto_off(&mut self, cfg: Option<&AutoOffConfig>, now_ms: u64) {
        match cfg {
            Some(cfg) => self.auto_off.arm(cfg, now_ms),
            None => self.auto_off.clear(),
        }
    }

    /// Recompute the observers' snapshot from source and cursor.  A stop for
    /// AutoOff or invalid time keeps the last schedule or profile on show.
    fn refresh_snapshot(&mut self, store: &impl ConfigStore) {
        let snap = match self.source {
            RunSource::None
                if matches!(
                    self.events.state(),
                    RunState::AutoOffStopped | RunState::TimeInvalid
                ) =>
            {
                ActiveSnapshot {
                    segment: None,
                    ..self.events.context().active
                }
            }
            RunSource::None => ActiveSnapshot::default(),
            RunSource::Schedule(idx) => {
                let item = store.schedules().and_then(|s| s.get(idx));
                ActiveSnapshot {
                    schedule: item.map(|s| ScheduleRef {
                        sch_id: s.sch_id,
                        sch_no: s.sch_no,
                    }),
                    profile_no: None,
                    segment: item.and_then(|s| segment_ref(&s.segments, &self.schedule_rt)),
                }
            }
            RunSource::Profile(idx) => {
                let item = store.profiles().and_then(|p| p.get(idx));
                ActiveSnapshot {
                    schedule: None,
                    profile_no: item.map(|p| p.profile_no),
                    segment: item.and_then(|p| segment_ref(&p.segments, &self.profile_rt)),
                }
            }
        };
        *self.events.snapshot_mut() = snap;
    }

    // ── Execution ─────────────────────────────────────────────

    fn execute(
        &mut self,
        store: &impl ConfigStore,
        hw: &mut impl DevicePorts,
        now_ms: u64,
        resume: bool,
    ) {
        match self.events.state() {
            RunState::Override => self.run_override(hw, now_ms),
            RunState::ScheduleRun | RunState::ProfileRun | RunState::MotionBlocked => {
                if self.check_auto_off(store, hw, now_ms) {
                    return;
                }
                if self.events.state() == RunState::MotionBlocked {
                    return;
                }
                if resume {
                    self.resume_segment(store, hw);
                }
                self.step_sequence(store, hw, now_ms);
                if hw.is_running() {
                    hw.tick();
                }
            }
            _ => {}
        }
    }

    fn run_override(&mut self, hw: &mut impl WindActuator, now_ms: u64) {
        let Some(ov) = self.manual.as_mut() else {
            return;
        };

        if ov.expires_at_ms.is_some_and(|t| now_ms >= t) {
            info!(
                "Control: override expired after {} ms",
                now_ms.saturating_sub(ov.started_ms)
            );
            self.manual = None;
            self.dirty.mark_status();
            return;
        }

        if !ov.applied {
            ov.applied = true;
            match &ov.command {
                WindCommand::Fixed(p) => {
                    hw.stop();
                    hw.set_duty_percent(*p);
                }
                WindCommand::Resolved(wind) => hw.apply_resolved_wind(wind),
            }
            self.dirty.mark(Channel::Chart);
            self.dirty.mark_status();
        }

        if matches!(ov.command, WindCommand::Resolved(_)) {
            hw.tick();
        }
    }

    /// Returns `true` if AutoOff fired and output was stopped.
    fn check_auto_off(
        &mut self,
        store: &impl ConfigStore,
        hw: &mut impl DevicePorts,
        now_ms: u64,
    ) -> bool {
        if !self.auto_off.is_armed() {
            return false;
        }

        let temperature_c = if self.auto_off.wants_temperature() {
            self.temperature
                .sample(hw, &self.config.temperature, now_ms)
        } else {
            None
        };
        let local = self.time.usable().copied();

        let Some(trigger) = self.auto_off.check(now_ms, local.as_ref(), temperature_c) else {
            return false;
        };
        self.stop_on_auto_off(trigger, store, hw, now_ms);
        true
    }

    fn stop_on_auto_off(
        &mut self,
        trigger: AutoOffTrigger,
        store: &impl ConfigStore,
        hw: &mut impl WindActuator,
        now_ms: u64,
    ) {
        let reason = Reason::from(trigger);
        hw.stop();
        self.source = RunSource::None;
        self.schedule_rt.reset(now_ms);
        self.profile_rt.reset(now_ms);
        self.auto_off.clear();

        self.events.transition(RunState::AutoOffStopped, reason, now_ms);
        self.refresh_snapshot(store);
        self.dirty.mark_set(ChannelSet::ALL);

        warn!(
            "Control: {} stopped output (ack required: {})",
            reason.as_str(),
            self.events.context().ack_required
        );
    }

    /// Re-apply the current On segment after motion or an override paused it.
    fn resume_segment(&mut self, store: &impl ConfigStore, hw: &mut impl WindActuator) {
        let (segments, rt) = match self.source {
            RunSource::Schedule(idx) => (
                store.schedules().and_then(|s| s.get(idx)).map(|s| s.segments()),
                self.schedule_rt,
            ),
            RunSource::Profile(idx) => (
                store.profiles().and_then(|p| p.get(idx)).map(|p| p.segments()),
                self.profile_rt,
            ),
            RunSource::None => return,
        };
        let Some(segments) = segments else {
            return;
        };
        if rt.index().is_none() {
            return;
        }

        match rt.active_on().and_then(|j| segments.get(j)) {
            Some(seg) => {
                debug!("Control: resuming segment #{}", seg.seg_no);
                self.apply_segment(seg, store, hw);
            }
            None => hw.stop(),
        }
    }

    fn step_sequence(&mut self, store: &impl ConfigStore, hw: &mut impl WindActuator, now_ms: u64) {
        match self.source {
            RunSource::Schedule(idx) => {
                let Some(item) = store.schedules().and_then(|s| s.get(idx)) else {
                    return;
                };
                let event = self
                    .schedule_rt
                    .tick(item.segments(), item.repeat_policy(), now_ms);
                if let Some(event) = event {
                    self.on_sequence_event(event, item, store, hw);
                }
            }
            RunSource::Profile(idx) => {
                let Some(item) = store.profiles().and_then(|p| p.get(idx)) else {
                    return;
                };
                let event = self
                    .profile_rt
                    .tick(item.segments(), item.repeat_policy(), now_ms);
                if let Some(event) = event {
                    self.on_sequence_event(event, item, store, hw);
                }
            }
            RunSource::None => {}
        }
    }

    fn on_sequence_event(
        &mut self,
        event: SequenceEvent,
        item: &impl SegmentProgram,
        store: &impl ConfigStore,
        hw: &mut impl WindActuator,
    ) {
        match event {
            SequenceEvent::EnterOn(j) => {
                if let Some(seg) = item.segments().get(j) {
                    self.apply_segment(seg, store, hw);
                }
            }
            SequenceEvent::EnterOff(j) => {
                hw.stop();
                debug!("Control: segment {} off phase", j);
                self.dirty.mark(Channel::Chart);
                self.dirty.mark(Channel::State);
            }
            SequenceEvent::Completed => {
                hw.stop();
                info!("Control: {} sequence completed", self.source.as_str());
                self.dirty.mark_status();
            }
            SequenceEvent::Empty => {
                hw.stop();
                debug!("Control: {} has no segments", self.source.as_str());
            }
        }
        self.refresh_snapshot(store);
    }

    fn apply_segment(&mut self, seg: &Segment, store: &impl ConfigStore, hw: &mut impl WindActuator) {
        match &seg.output {
            SegmentOutput::Fixed { duty_percent } => {
                let duty = clamp_duty(*duty_percent);
                hw.stop();
                hw.set_duty_percent(duty);
                info!("Control: segment #{} fixed {:.0}%", seg.seg_no, duty);
            }
            SegmentOutput::Preset {
                code,
                style,
                adjust,
            } => match store.resolve_wind(code, style, adjust) {
                Ok(wind) => {
                    info!("Control: segment #{} preset {} {}", seg.seg_no, code, style);
                    hw.apply_resolved_wind(&wind);
                }
                Err(e) => warn!(
                    "Control: segment #{} {} ({}/{}), output unchanged",
                    seg.seg_no,
                    Error::from(e),
                    code,
                    style
                ),
            },
        }
        self.dirty.mark(Channel::Chart);
        self.dirty.mark_status();
    }

    fn sample_time(&mut self, clock: &impl ClockPort) {
        let valid = match clock.is_time_valid() {
            Ok(valid) => valid,
            Err(e) => {
                warn!("Control: {}, keeping cached time", e);
                return;
            }
        };

        let next = if valid {
            match clock.local_time() {
                Ok(Some(local)) => TimeCache {
                    valid: true,
                    local: Some(local),
                },
                Ok(None) => TimeCache::default(),
                Err(e) => {
                    warn!("Control: {}, keeping cached time", e);
                    return;
                }
            }
        } else {
            TimeCache::default()
        };

        if next.valid != self.time.valid {
            info!(
                "Control: wall clock {}",
                if next.valid { "synchronised" } else { "lost" }
            );
            self.dirty.mark(Channel::State);
        }
        self.time = next;
    }

    fn push_metrics_if_due(&mut self, now_ms: u64) {
        let interval = u64::from(self.config.metrics_push_interval_ms);
        if now_ms.saturating_sub(self.last_metrics_push_ms) >= interval {
            self.last_metrics_push_ms = now_ms;
            self.dirty.mark(Channel::Metrics);
        }
    }

    // ── Operator API ──────────────────────────────────────────

    /// Hold a fixed duty (clamped to 0–100).  `seconds == 0` runs until cleared.
    pub fn start_override_fixed(&mut self, percent: f32, seconds: u32, now_ms: u64) {
        self.begin_override(WindCommand::fixed(percent), seconds, now_ms);
    }

    /// Resolve a preset/style and run it as an override.
    pub fn start_override_preset(
        &mut self,
        store: &impl ConfigStore,
        preset: &str,
        style: &str,
        adjust: &AdjustDelta,
        seconds: u32,
        now_ms: u64,
    ) -> Result<()> {
        let wind = store.resolve_wind(preset, style, adjust).map_err(|e| {
            warn!("Control: override {}/{} rejected: {}", preset, style, e);
            Error::from(e)
        })?;
        self.begin_override(WindCommand::Resolved(wind), seconds, now_ms);
        Ok(())
    }

    pub fn start_override_resolved(&mut self, wind: ResolvedWind, seconds: u32, now_ms: u64) {
        self.begin_override(WindCommand::Resolved(wind), seconds, now_ms);
    }

    fn begin_override(&mut self, command: WindCommand, seconds: u32, now_ms: u64) {
        let expires_at_ms = (seconds > 0).then(|| now_ms + u64::from(seconds) * 1000);
        match &command {
            WindCommand::Fixed(p) => info!("Control: override fixed {:.0}% for {} s", p, seconds),
            WindCommand::Resolved(w) => info!(
                "Control: override preset {} {} for {} s",
                w.preset_code, w.style_code, seconds
            ),
        }
        self.manual = Some(ActiveOverride {
            command,
            started_ms: now_ms,
            expires_at_ms,
            applied: false,
        });
        self.dirty.mark_status();
    }

    /// End the override.  Normal arbitration resumes on the next tick.
    pub fn stop_override(&mut self) -> bool {
        let was_active = self.manual.take().is_some();
        if was_active {
            info!("Control: override cleared");
            self.dirty.mark_status();
        }
        was_active
    }

    /// Seconds until the override expires; `None` if inactive or open-ended.
    pub fn override_remaining_secs(&self, now_ms: u64) -> Option<u32> {
        self.manual.as_ref().and_then(|ov| ov.remaining_secs(now_ms))
    }

    /// Entering profile mode drops a schedule source; leaving it drops a
    /// profile source.
    pub fn set_profile_mode(&mut self, on: bool, hw: &mut impl WindActuator, now_ms: u64) {
        if self.profile_mode == on {
            return;
        }
        self.profile_mode = on;
        let release = match self.source {
            RunSource::Schedule(_) => on,
            RunSource::Profile(_) => !on,
            RunSource::None => false,
        };
        if release {
            self.release_source(hw, now_ms);
        }
        info!("Control: profile mode {}", if on { "on" } else { "off" });
        self.dirty.mark_status();
    }

    /// Make the enabled profile numbered `profile_no` the run source.
    pub fn start_user_profile(
        &mut self,
        profile_no: u8,
        store: &impl ConfigStore,
        hw: &mut impl WindActuator,
        now_ms: u64,
    ) -> Result<()> {
        let profiles = store.profiles().ok_or(Error::ConfigMissing("profiles"))?;
        let Some((idx, profile)) = profiles
            .iter()
            .enumerate()
            .find(|(_, p)| p.enabled && p.profile_no == profile_no)
        else {
            warn!("Control: no enabled profile #{}", profile_no);
            return Err(Error::UnknownProfile(profile_no));
        };

        if self.source != RunSource::None {
            hw.stop();
        }
        self.source = RunSource::Profile(idx);
        self.profile_rt.reset(now_ms);
        self.auto_off.arm(&profile.auto_off, now_ms);
        self.refresh_snapshot(store);
        self.dirty.mark_status();
        info!("Control: user profile #{} started", profile_no);
        Ok(())
    }

    /// Stop the running user profile, if any.
    pub fn stop_user_profile(&mut self, hw: &mut impl WindActuator, now_ms: u64) -> bool {
        if self.source.profile_index().is_none() {
            return false;
        }
        self.release_source(hw, now_ms);
        info!("Control: user profile stopped");
        self.dirty.mark_status();
        true
    }

    /// Acknowledge `AUTOOFF_STOPPED`.  No-op in any other state.
    pub fn ack_event_state(&mut self) -> bool {
        let acked = self.events.ack();
        if acked {
            self.dirty.mark_status();
        }
        acked
    }

    /// Drop override, source, runtimes and AutoOff; back to Idle.
    pub fn reload(&mut self, hw: &mut impl WindActuator, now_ms: u64) {
        hw.stop();
        self.manual = None;
        self.profile_mode = false;
        self.source = RunSource::None;
        self.schedule_rt.reset(now_ms);
        self.profile_rt.reset(now_ms);
        self.auto_off.clear();
        self.events.reset(now_ms);
        self.dirty.mark_set(ChannelSet::ALL);
        info!("Control: runtime reloaded");
    }

    fn release_source(&mut self, hw: &mut impl WindActuator, now_ms: u64) {
        hw.stop();
        self.source = RunSource::None;
        self.schedule_rt.reset(now_ms);
        self.profile_rt.reset(now_ms);
        self.auto_off.clear();
        *self.events.snapshot_mut() = ActiveSnapshot::default();
    }

    // ── Command handling ──────────────────────────────────────

    /// Process an external command.  Rejections are returned, never panicked.
    pub fn handle_command(
        &mut self,
        cmd: ControlCommand,
        now_ms: u64,
        store: &impl ConfigStore,
        hw: &mut impl WindActuator,
    ) -> Result<()> {
        match cmd {
            ControlCommand::OverrideFixed { percent, seconds } => {
                self.start_override_fixed(percent, seconds, now_ms);
            }
            ControlCommand::OverridePreset {
                preset,
                style,
                adjust,
                seconds,
            } => {
                self.start_override_preset(store, &preset, &style, &adjust, seconds, now_ms)?;
            }
            ControlCommand::OverrideResolved { wind, seconds } => {
                self.start_override_resolved(wind, seconds, now_ms);
            }
            ControlCommand::StopOverride => {
                self.stop_override();
            }
            ControlCommand::SetProfileMode(on) => self.set_profile_mode(on, hw, now_ms),
            ControlCommand::StartProfile(no) => self.start_user_profile(no, store, hw, now_ms)?,
            ControlCommand::StopProfile => {
                self.stop_user_profile(hw, now_ms);
            }
            ControlCommand::AckEvent => {
                self.ack_event_state();
            }
            ControlCommand::Reload => self.reload(hw, now_ms),
            ControlCommand::UpdateConfig(config) => self.update_config(config, now_ms)?,
            ControlCommand::SaveConfig => {
                self.config_dirty = true;
                self.dirty_since_ms = 0;
                info!("Control: config save requested");
            }
        }
        Ok(())
    }

    /// Validate and swap in a new configuration.
    pub fn update_config(&mut self, config: ControlConfig, now_ms: u64) -> Result<()> {
        config
            .validate()
            .inspect_err(|e| warn!("Control: config rejected: {}", e))?;
        self.events.reconfigure(&config);
        self.temperature
            .set_interval_ms(config.temperature_sample_interval_ms);
        self.config = config;
        self.mark_config_dirty(now_ms);
        info!("Control: configuration updated at runtime");
        Ok(())
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn config(&self) -> &ControlConfig {
        &self.config
    }

    pub fn context(&self) -> &RunContext {
        self.events.context()
    }

    pub fn state(&self) -> RunState {
        self.events.state()
    }

    pub fn reason(&self) -> Reason {
        self.events.reason()
    }

    pub fn run_source(&self) -> RunSource {
        self.source
    }

    pub fn profile_mode(&self) -> bool {
        self.profile_mode
    }

    pub fn active_override(&self) -> Option<&ActiveOverride> {
        self.manual.as_ref()
    }

    pub fn schedule_runtime(&self) -> &SegmentRuntime {
        &self.schedule_rt
    }

    pub fn profile_runtime(&self) -> &SegmentRuntime {
        &self.profile_rt
    }

    pub fn auto_off(&self) -> &AutoOffMonitor {
        &self.auto_off
    }

    pub fn time(&self) -> &TimeCache {
        &self.time
    }

    /// Last good temperature reading.
    pub fn temperature_c(&self) -> Option<f32> {
        self.temperature.last_good_c()
    }

    pub fn hold_remaining_ms(&self, now_ms: u64) -> u64 {
        self.events.hold_remaining_ms(now_ms)
    }

    /// Control ticks executed since startup (rate-limited ones excluded).
    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    /// Consume the channels marked since the last call.
    pub fn take_dirty(&mut self) -> ChannelSet {
        self.dirty.take()
    }

    pub fn pending_dirty(&self) -> ChannelSet {
        self.dirty.peek()
    }

    // ── Config dirty-flag management ──────────────────────────

    pub fn mark_config_dirty(&mut self, now_ms: u64) {
        if !self.config_dirty {
            self.config_dirty = true;
            self.dirty_since_ms = now_ms;
        }
    }

    /// Save once `autosave_delay_ms` has passed since the first unsaved
    /// change.  Returns `true` if the config was saved.
    pub fn auto_save_if_needed(&mut self, storage: &impl ConfigPort, now_ms: u64) -> bool {
        if !self.config_dirty {
            return false;
        }
        if now_ms.saturating_sub(self.dirty_since_ms) < u64::from(self.config.autosave_delay_ms) {
            return false;
        }
        match storage.save(&self.config) {
            Ok(()) => {
                self.config_dirty = false;
                info!("Control: config auto-saved");
                true
            }
            Err(e) => {
                error!("Control: config auto-save failed: {}", e);
                false
            }
        }
    }

    /// Force-save if dirty (call before a restart).
    pub fn force_save_if_dirty(&mut self, storage: &impl ConfigPort) {
        if !self.config_dirty {
            return;
        }
        match storage.save(&self.config) {
            Ok(()) => {
                self.config_dirty = false;
                info!("Control: config force-saved before restart");
            }
            Err(e) => error!("Control: config force-save failed: {}", e),
        }
    }

    pub fn is_config_dirty(&self) -> bool {
        self.config_dirty
    }
}

fn segment_ref(segments: &[Segment], rt: &SegmentRuntime) -> Option<SegmentRef> {
    rt.active_on()
        .and_then(|j| segments.get(j))
        .map(|s| SegmentRef {
            seg_id: s.seg_id,
            seg_no: s.seg_no,
        })
}
