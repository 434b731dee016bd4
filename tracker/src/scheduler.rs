//! Multi-rate task scheduler
//!
//! Three periodic tasks run from one fast tick:
//!
//! - **Track** (A): PLL update per axis from the raw encoder count, every tick
//! - **Fuse** (B): Kalman update per axis with the latest IMU sample, every
//!   `fast_hz / fusion_hz` ticks
//! - **Emit** (C): telemetry frame from the fused snapshot, every
//!   `fusion_hz / telemetry_hz` fusion cycles, always right after B
//!
//! Emit therefore never sees a fused state mixed from two fusion cycles.
//!
//! Track and Fuse errors stop the scheduler. An Emit failure (sink write,
//! temperature read) only loses that frame: it is counted, logged, and the
//! next tick runs as usual.

use hal::{Clock, EncoderSource, InertialSensor, TelemetrySink, Vector3d};
use log::{debug, info, warn};

use crate::config::SchedulerConfig;
use crate::error::{TrackerError, TrackerResult};
use crate::estimation::AxisEstimator;
use crate::telemetry::TelemetryFrame;

/// Overruns (or failed frames) between two warnings after the first one
const OVERRUN_LOG_INTERVAL: u64 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskId {
    Track,
    Fuse,
    Emit,
}

impl TaskId {
    pub const ALL: [TaskId; 3] = [TaskId::Track, TaskId::Fuse, TaskId::Emit];

    fn index(self) -> usize {
        match self {
            TaskId::Track => 0,
            TaskId::Fuse => 1,
            TaskId::Emit => 2,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            TaskId::Track => "track",
            TaskId::Fuse => "fuse",
            TaskId::Emit => "emit",
        }
    }
}

/// Runtime statistics for a single task
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TaskStats {
    /// Total number of executions
    pub executions: u64,

    /// Last execution time in microseconds
    pub last_execution_us: u32,

    /// Maximum execution time observed in microseconds
    pub max_execution_us: u32,

    /// Executions that took longer than the task period
    pub deadline_misses: u32,
}

impl TaskStats {
    pub fn record(&mut self, execution_us: u32, period_us: u32) {
        self.executions = self.executions.saturating_add(1);
        self.last_execution_us = execution_us;
        self.max_execution_us = self.max_execution_us.max(execution_us);
        if execution_us > period_us {
            self.deadline_misses = self.deadline_misses.saturating_add(1);
        }
    }
}

/// Which tasks ran during one tick
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickOutcome {
    pub fused: bool,
    pub emitted: bool,
}

/// Owns the per-axis estimators and the peripherals they read
pub struct Scheduler {
    fast_hz: u32,
    fusion_divider: u32,
    telemetry_divider: u32,
    periods_us: [u32; 3],

    axes: Vec<AxisEstimator>,
    encoders: Vec<Box<dyn EncoderSource>>,
    imu: Box<dyn InertialSensor>,
    sink: Box<dyn TelemetrySink>,

    accel: Vector3d,
    last_frame: Option<TelemetryFrame>,

    fast_ticks: u64,
    fusion_cycles: u64,
    frames_sent: u64,

    stats: [TaskStats; 3],
    overruns: u64,
    emit_failures: u64,

    /// Pacing origin: time of paced tick zero
    epoch_us: Option<u64>,
    paced_ticks: u64,
}

impl Scheduler {
    pub fn new(
        config: &SchedulerConfig,
        axes: Vec<AxisEstimator>,
        encoders: Vec<Box<dyn EncoderSource>>,
        imu: Box<dyn InertialSensor>,
        sink: Box<dyn TelemetrySink>,
    ) -> TrackerResult<Self> {
        if axes.len() != encoders.len() {
            return Err(TrackerError::Resources(format!(
                "{} axes configured but {} encoders provided",
                axes.len(),
                encoders.len()
            )));
        }
        config.validate()?;

        let period = |hz: u32| 1_000_000 / hz;
        Ok(Scheduler {
            fast_hz: config.fast_hz,
            fusion_divider: config.fusion_divider(),
            telemetry_divider: config.telemetry_divider(),
            periods_us: [
                period(config.fast_hz),
                period(config.fusion_hz),
                period(config.telemetry_hz),
            ],
            axes,
            encoders,
            imu,
            sink,
            accel: Vector3d::zeros(),
            last_frame: None,
            fast_ticks: 0,
            fusion_cycles: 0,
            frames_sent: 0,
            stats: [TaskStats::default(); 3],
            overruns: 0,
            emit_failures: 0,
            epoch_us: None,
            paced_ticks: 0,
        })
    }

    /// Seed every axis from its current encoder count
    pub fn seed(&mut self) -> TrackerResult<()> {
        for (axis, encoder) in self.axes.iter_mut().zip(self.encoders.iter_mut()) {
            let count = encoder.read();
            axis.seed(count)?;
            info!(
                "{} estimation starts at {} counts ({:.3} m)",
                axis.id(),
                count,
                axis.fused().position
            );
        }
        Ok(())
    }

    /// Run one fast tick and whatever slower tasks fall due on it
    pub fn tick(&mut self, clock: &dyn Clock) -> TrackerResult<TickOutcome> {
        let mut outcome = TickOutcome::default();

        let start = clock.now_us();
        self.track();
        let after_track = clock.now_us();
        self.record(TaskId::Track, start, after_track);
        self.fast_ticks += 1;

        if self.fast_ticks % self.fusion_divider as u64 != 0 {
            return Ok(outcome);
        }

        self.fuse()?;
        let after_fuse = clock.now_us();
        self.record(TaskId::Fuse, after_track, after_fuse);
        self.fusion_cycles += 1;
        outcome.fused = true;

        if self.fusion_cycles % self.telemetry_divider as u64 == 0 {
            match self.emit() {
                Ok(()) => outcome.emitted = true,
                Err(err) => {
                    self.emit_failures += 1;
                    if self.emit_failures == 1 || self.emit_failures % OVERRUN_LOG_INTERVAL == 0 {
                        warn!(
                            "telemetry frame dropped at fusion cycle {}: {} ({} dropped so far)",
                            self.fusion_cycles, err, self.emit_failures
                        );
                    }
                }
            }
            self.record(TaskId::Emit, after_fuse, clock.now_us());
        }

        Ok(outcome)
    }

    /// Run `ticks` fast ticks paced by `clock`.
    ///
    /// `wait` is called while the next deadline has not been reached. A tick
    /// starting more than one period late counts as an overrun; it still
    /// runs, and the following ticks run back to back until the schedule is
    /// caught up.
    pub fn run_for(
        &mut self,
        clock: &dyn Clock,
        ticks: u64,
        mut wait: impl FnMut(),
    ) -> TrackerResult<()> {
        let epoch = *self.epoch_us.get_or_insert_with(|| clock.now_us());
        let period = self.periods_us[TaskId::Track.index()] as u64;

        for _ in 0..ticks {
            let deadline = epoch + self.paced_ticks * 1_000_000 / self.fast_hz as u64;
            while clock.now_us() < deadline {
                wait();
            }

            let late = clock.now_us() - deadline;
            if late > period {
                self.overruns += 1;
                if self.overruns == 1 || self.overruns % OVERRUN_LOG_INTERVAL == 0 {
                    warn!(
                        "fast tick {} started {} us late ({} overruns so far)",
                        self.paced_ticks, late, self.overruns
                    );
                }
            }

            self.tick(clock)?;
            self.paced_ticks += 1;
        }

        Ok(())
    }

    fn track(&mut self) {
        for (axis, encoder) in self.axes.iter_mut().zip(self.encoders.iter_mut()) {
            axis.track(encoder.read());
        }
    }

    fn fuse(&mut self) -> TrackerResult<()> {
        self.accel = self.imu.read_acceleration()?;
        for axis in &mut self.axes {
            axis.fuse(&self.accel)?;
        }
        Ok(())
    }

    fn emit(&mut self) -> TrackerResult<()> {
        let temperature = self.imu.read_temperature()?;
        let mut frame = TelemetryFrame::new([self.accel.x, self.accel.y, self.accel.z], temperature);
        for axis in &self.axes {
            frame.push(axis.sample())?;
        }

        let bytes = frame.encode()?;
        self.sink.write_all(&bytes)?;
        self.sink.flush()?;
        self.frames_sent += 1;
        debug!("frame {} sent ({} bytes)", self.frames_sent, bytes.len());

        self.last_frame = Some(frame);
        Ok(())
    }

    fn record(&mut self, task: TaskId, start_us: u64, end_us: u64) {
        let elapsed = end_us.saturating_sub(start_us).min(u32::MAX as u64) as u32;
        let i = task.index();
        self.stats[i].record(elapsed, self.periods_us[i]);
    }

    pub fn axes(&self) -> &[AxisEstimator] {
        &self.axes
    }

    pub fn stats(&self, task: TaskId) -> &TaskStats {
        &self.stats[task.index()]
    }

    pub fn overruns(&self) -> u64 {
        self.overruns
    }

    pub fn fast_ticks(&self) -> u64 {
        self.fast_ticks
    }

    pub fn fusion_cycles(&self) -> u64 {
        self.fusion_cycles
    }

    pub fn frames_sent(&self) -> u64 {
        self.frames_sent
    }

    /// Frames lost to a failed temperature read or sink write
    pub fn emit_failures(&self) -> u64 {
        self.emit_failures
    }

    /// Last frame handed to the sink
    pub fn last_frame(&self) -> Option<&TelemetryFrame> {
        self.last_frame.as_ref()
    }

    /// Latest IMU sample used by the fusion task
    pub fn accel(&self) -> Vector3d {
        self.accel
    }

    /// Log per-task statistics
    pub fn log_stats(&self) {
        for task in TaskId::ALL {
            let s = self.stats(task);
            info!(
                "{}: {} runs, max {} us, {} deadline misses",
                task.name(),
                s.executions,
                s.max_execution_us,
                s.deadline_misses
            );
        }
        info!(
            "{} fast-tick overruns, {} telemetry frames dropped",
            self.overruns, self.emit_failures
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SimClock;
    use crate::config::AxisConfig;
    use hal::{HalError, HalResult};
    use std::cell::Cell;
    use std::rc::Rc;

    struct Fixed(i32);

    impl EncoderSource for Fixed {
        fn read(&mut self) -> i32 {
            self.0
        }

        fn write(&mut self, count: i32) {
            self.0 = count;
        }
    }

    struct Still;

    impl InertialSensor for Still {
        fn initialize(&mut self) -> HalResult<()> {
            Ok(())
        }

        fn read_acceleration(&mut self) -> HalResult<Vector3d> {
            Ok(Vector3d::zeros())
        }

        fn read_temperature(&mut self) -> HalResult<f32> {
            Ok(21.0)
        }
    }

    #[derive(Clone, Default)]
    struct Capture(Rc<Cell<usize>>);

    impl TelemetrySink for Capture {
        fn write_all(&mut self, bytes: &[u8]) -> HalResult<()> {
            self.0.set(self.0.get() + bytes.len());
            Ok(())
        }
    }

    /// Sink whose writes always fail
    struct Unplugged;

    impl TelemetrySink for Unplugged {
        fn write_all(&mut self, _bytes: &[u8]) -> HalResult<()> {
            Err(HalError::SinkWrite)
        }
    }

    fn with_sink(sink: Box<dyn TelemetrySink>) -> Scheduler {
        let config = SchedulerConfig::default();
        let axes = vec![
            AxisEstimator::new(&AxisConfig::yaw(), &config).unwrap(),
            AxisEstimator::new(&AxisConfig::pitch(), &config).unwrap(),
        ];
        let encoders: Vec<Box<dyn EncoderSource>> = vec![Box::new(Fixed(0)), Box::new(Fixed(671))];
        Scheduler::new(&config, axes, encoders, Box::new(Still), sink).unwrap()
    }

    fn scheduler(sink: Capture) -> Scheduler {
        with_sink(Box::new(sink))
    }

    #[test]
    fn test_task_rates() {
        let sink = Capture::default();
        let mut s = scheduler(sink.clone());
        let clock = SimClock::new();
        s.seed().unwrap();

        let mut fused_at = Vec::new();
        for i in 1..=200u64 {
            let outcome = s.tick(&clock).unwrap();
            if outcome.fused {
                fused_at.push(i);
            }
            assert!(!outcome.emitted || outcome.fused, "emit only right after fuse");
        }

        assert_eq!(fused_at, vec![20, 40, 60, 80, 100, 120, 140, 160, 180, 200]);
        assert_eq!(s.stats(TaskId::Track).executions, 200);
        assert_eq!(s.stats(TaskId::Fuse).executions, 10);
        assert_eq!(s.stats(TaskId::Emit).executions, 5);
        assert_eq!(s.frames_sent(), 5);
        assert_eq!(sink.0.get(), 5 * 50);
    }

    #[test]
    fn test_frame_carries_latest_snapshot() {
        let mut s = scheduler(Capture::default());
        let clock = SimClock::new();
        s.seed().unwrap();
        for _ in 0..40 {
            s.tick(&clock).unwrap();
        }

        let frame = s.last_frame().expect("one frame after two fusion cycles");
        assert_eq!(frame.axes().len(), 2);
        assert_eq!(frame.axes()[1].count, 671);
        assert_eq!(frame.axes()[1], s.axes()[1].sample());
        assert_eq!(frame.temperature(), 21);
    }

    #[test]
    fn test_paced_run_without_overruns() {
        let mut s = scheduler(Capture::default());
        let clock = SimClock::new();
        let ticker = clock.clone();
        s.run_for(&clock, 1_000, || ticker.advance_us(10)).unwrap();

        assert_eq!(s.fast_ticks(), 1_000);
        assert_eq!(s.overruns(), 0);
        // tick 999 is due at 49 950 us
        assert_eq!(clock.now_us(), 49_950);
    }

    #[test]
    fn test_late_ticks_are_counted_and_caught_up() {
        let mut s = scheduler(Capture::default());
        let clock = SimClock::new();
        let ticker = clock.clone();
        s.run_for(&clock, 10, || ticker.advance_us(10)).unwrap();

        // stall for 1 ms, i.e. 20 fast periods
        clock.advance_us(1_000);
        s.run_for(&clock, 30, || ticker.advance_us(10)).unwrap();

        assert_eq!(s.fast_ticks(), 40);
        assert!(s.overruns() >= 18, "got {} overruns", s.overruns());
        assert!(s.overruns() < 21);
    }

    #[test]
    fn test_rejects_mismatched_resources() {
        let config = SchedulerConfig::default();
        let axes = vec![AxisEstimator::new(&AxisConfig::yaw(), &config).unwrap()];
        let result = Scheduler::new(
            &config,
            axes,
            Vec::new(),
            Box::new(Still),
            Box::new(Capture::default()),
        );
        assert!(matches!(result, Err(TrackerError::Resources(_))));
    }

    #[test]
    fn test_rejects_rates_that_do_not_divide() {
        let config = SchedulerConfig {
            fusion_hz: 3_000,
            ..SchedulerConfig::default()
        };
        let axes = vec![AxisEstimator::new(&AxisConfig::yaw(), &config).unwrap()];
        let encoders: Vec<Box<dyn EncoderSource>> = vec![Box::new(Fixed(0))];
        let result = Scheduler::new(
            &config,
            axes,
            encoders,
            Box::new(Still),
            Box::new(Capture::default()),
        );
        assert!(matches!(
            result,
            Err(TrackerError::Config { ref field, .. }) if field == "scheduler.fusion_hz"
        ));

        let config = SchedulerConfig {
            telemetry_hz: 300,
            ..SchedulerConfig::default()
        };
        let axes = vec![AxisEstimator::new(&AxisConfig::yaw(), &config).unwrap()];
        let encoders: Vec<Box<dyn EncoderSource>> = vec![Box::new(Fixed(0))];
        let result = Scheduler::new(
            &config,
            axes,
            encoders,
            Box::new(Still),
            Box::new(Capture::default()),
        );
        assert!(matches!(
            result,
            Err(TrackerError::Config { ref field, .. }) if field == "scheduler.telemetry_hz"
        ));
    }

    #[test]
    fn test_failed_sink_only_drops_frames() {
        let mut s = with_sink(Box::new(Unplugged));
        let clock = SimClock::new();
        s.seed().unwrap();

        for _ in 0..400 {
            let outcome = s.tick(&clock).unwrap();
            assert!(!outcome.emitted);
        }

        assert_eq!(s.fast_ticks(), 400);
        assert_eq!(s.fusion_cycles(), 20);
        assert_eq!(s.frames_sent(), 0);
        assert_eq!(s.emit_failures(), 10);
        assert!(s.last_frame().is_none());
        assert_eq!(s.stats(TaskId::Emit).executions, 10);

        // estimation keeps running under a paced loop too
        let ticker = clock.clone();
        s.run_for(&clock, 100, || ticker.advance_us(10)).unwrap();
        assert_eq!(s.fast_ticks(), 500);
        assert_eq!(s.fusion_cycles(), 25);
    }
}
