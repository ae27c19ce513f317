//! Differential-drive motion control
//!
//! Two geared unipolar steppers drive the wheels. They are mounted mirror
//! image, so driving forward turns the right wheel [`Direction::Forward`]
//! and the left wheel [`Direction::Backward`].
//!
//! The gearboxes have backlash. Whenever a wheel reverses, a slack sub-move
//! of `slack_calibration` steps at full speed is queued ahead of the real
//! move so the gear train is taken up before distance starts counting.

use evebrain_hal::CoilDriver;
#[allow(unused_imports)]
use micromath::F32Ext;

use crate::error::ValidationError;
use crate::settings::Settings;

/// Step interval at full speed (500 steps/s)
pub const BASE_STEP_INTERVAL_US: u64 = 2000;

/// Lowest accepted speed scale; slower requests are clamped up to it
pub const MIN_SPEED: f32 = 0.1;

/// Half-step coil sequence, coils A-B-C-D in bits 0-3
const HALF_STEP: [u8; 8] = [
    0b0001, 0b0011, 0b0010, 0b0110, 0b0100, 0b1100, 0b1000, 0b1001,
];

/// Wheel rotation direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Direction {
    Forward,
    Backward,
}

impl Direction {
    pub fn reversed(self) -> Self {
        match self {
            Direction::Forward => Direction::Backward,
            Direction::Backward => Direction::Forward,
        }
    }

    /// Direction for a signed step count (positive is forward)
    pub fn from_sign(steps: i32) -> Self {
        if steps > 0 {
            Direction::Forward
        } else {
            Direction::Backward
        }
    }
}

/// A run of steps in one direction
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Move {
    pub direction: Direction,
    pub steps: u32,
    /// Fraction of full speed in [`MIN_SPEED`, 1.0]
    pub speed: f32,
}

/// One wheel stepper
#[derive(Debug, Clone)]
pub struct Stepper {
    current: Option<Move>,
    queued: Option<Move>,
    last_direction: Option<Direction>,
    phase: u8,
    next_step_us: u64,
    paused: bool,
}

impl Default for Stepper {
    fn default() -> Self {
        Self::new()
    }
}

impl Stepper {
    pub const fn new() -> Self {
        Self {
            current: None,
            queued: None,
            last_direction: None,
            phase: 0,
            next_step_us: 0,
            paused: false,
        }
    }

    /// Start (or queue behind the current move) a run of steps
    pub fn turn(&mut self, direction: Direction, steps: u32, speed: f32) {
        self.last_direction = Some(direction);
        if steps == 0 {
            return;
        }
        let mv = Move {
            direction,
            steps,
            speed: speed.clamp(MIN_SPEED, 1.0),
        };
        if self.current.is_none() {
            self.current = Some(mv);
        } else {
            self.queued = Some(mv);
        }
    }

    /// Queue a slack sub-move if the wheel is about to reverse
    ///
    /// Returns true when a sub-move was queued.
    pub fn take_up_slack(&mut self, direction: Direction, slack_steps: u16) -> bool {
        match self.last_direction {
            Some(last) if last != direction => {
                self.turn(direction, u32::from(slack_steps), 1.0);
                slack_steps > 0
            }
            _ => false,
        }
    }

    /// Steps left in the current and queued moves
    pub fn remaining(&self) -> u32 {
        self.current.map_or(0, |m| m.steps) + self.queued.map_or(0, |m| m.steps)
    }

    pub fn is_idle(&self) -> bool {
        self.current.is_none() && self.queued.is_none()
    }

    pub fn last_direction(&self) -> Option<Direction> {
        self.last_direction
    }

    pub fn current(&self) -> Option<Move> {
        self.current
    }

    pub fn queued(&self) -> Option<Move> {
        self.queued
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn pause(&mut self) {
        self.paused = true;
    }

    pub fn resume(&mut self) {
        self.paused = false;
    }

    /// Discard current and queued moves
    pub fn stop(&mut self) {
        self.current = None;
        self.queued = None;
        self.paused = false;
    }

    /// Coil pattern to latch; de-energised when idle
    pub fn coil_pattern(&self) -> u8 {
        if self.current.is_some() {
            HALF_STEP[self.phase as usize]
        } else {
            0
        }
    }

    /// Emit at most one step if it is due
    ///
    /// Returns true when the coil pattern changed.
    pub fn service(&mut self, now_us: u64) -> bool {
        if self.paused {
            return false;
        }
        let Some(mut mv) = self.current else {
            return false;
        };
        if now_us < self.next_step_us {
            return false;
        }

        self.phase = match mv.direction {
            Direction::Forward => (self.phase + 1) % 8,
            Direction::Backward => (self.phase + 7) % 8,
        };
        mv.steps -= 1;
        self.next_step_us = now_us + step_interval_us(mv.speed);

        self.current = if mv.steps == 0 {
            self.queued.take()
        } else {
            Some(mv)
        };
        true
    }
}

/// Microseconds between steps at `speed`
pub fn step_interval_us(speed: f32) -> u64 {
    (BASE_STEP_INTERVAL_US as f32 / speed.clamp(MIN_SPEED, 1.0)) as u64
}

/// Wheel and drivetrain dimensions
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Geometry {
    pub steps_per_revolution: f32,
    pub wheel_diameter_mm: f32,
    pub wheel_distance_mm: f32,
}

impl Geometry {
    pub fn steps_per_mm(&self) -> f32 {
        self.steps_per_revolution / (core::f32::consts::PI * self.wheel_diameter_mm)
    }

    /// Wheel steps per degree of rotation on the spot
    pub fn steps_per_degree(&self) -> f32 {
        ((self.wheel_distance_mm * core::f32::consts::PI) / 360.0) * self.steps_per_mm()
    }
}

/// Calibration factors applied to every move
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Calibration {
    pub slack: u16,
    pub movement: f32,
    pub turn: f32,
}

impl Default for Calibration {
    fn default() -> Self {
        Self {
            slack: crate::settings::DEFAULT_SLACK_CALIBRATION,
            movement: 1.0,
            turn: 1.0,
        }
    }
}

/// Validated speed for one wheel of a speed move
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WheelCommand {
    pub steps: i32,
    pub speed: f32,
}

/// Check speed-move arguments and clamp slow speeds
///
/// Errors name the first offending wheel, left before right.
pub fn validate_speeds(
    left: WheelCommand,
    right: WheelCommand,
) -> Result<(WheelCommand, WheelCommand), ValidationError> {
    fn check(
        wheel: WheelCommand,
        range: ValidationError,
        zero: ValidationError,
    ) -> Result<WheelCommand, ValidationError> {
        if !(0.0..=1.0).contains(&wheel.speed) {
            return Err(range);
        }
        if wheel.speed == 0.0 && wheel.steps != 0 {
            return Err(zero);
        }
        Ok(WheelCommand {
            steps: wheel.steps,
            speed: wheel.speed.max(MIN_SPEED),
        })
    }

    let left = check(
        left,
        ValidationError::LeftSpeedRange,
        ValidationError::LeftSpeedZero,
    )?;
    let right = check(
        right,
        ValidationError::RightSpeedRange,
        ValidationError::RightSpeedZero,
    )?;
    Ok((left, right))
}

/// Owns both wheels and turns distances and angles into steps
#[derive(Debug, Clone)]
pub struct MotionController {
    left: Stepper,
    right: Stepper,
    geometry: Geometry,
    calibration: Calibration,
    calibrating_slack: bool,
    latched: (u8, u8),
}

impl MotionController {
    pub fn new(geometry: Geometry, calibration: Calibration) -> Self {
        Self {
            left: Stepper::new(),
            right: Stepper::new(),
            geometry,
            calibration,
            calibrating_slack: false,
            latched: (0, 0),
        }
    }

    /// Take geometry and calibration from persisted settings
    pub fn apply_settings(&mut self, settings: &Settings) {
        self.geometry.wheel_diameter_mm = settings.wheel_diameter_mm;
        self.geometry.wheel_distance_mm = settings.wheel_distance_mm;
        self.calibration = Calibration {
            slack: settings.slack_calibration,
            movement: settings.move_calibration,
            turn: settings.turn_calibration,
        };
    }

    pub fn geometry(&self) -> Geometry {
        self.geometry
    }

    pub fn calibration(&self) -> Calibration {
        self.calibration
    }

    pub fn left(&self) -> &Stepper {
        &self.left
    }

    pub fn right(&self) -> &Stepper {
        &self.right
    }

    pub fn is_idle(&self) -> bool {
        self.left.is_idle() && self.right.is_idle()
    }

    pub fn is_calibrating_slack(&self) -> bool {
        self.calibrating_slack
    }

    /// Queue slack take-up on both wheels
    pub fn take_up_slack(&mut self, right: Direction, left: Direction) {
        let slack = self.calibration.slack;
        self.right.take_up_slack(right, slack);
        self.left.take_up_slack(left, slack);
    }

    fn distance_steps(&self, mm: i32, factor: f32) -> u32 {
        let steps = mm as f32 * self.geometry.steps_per_mm() * factor;
        steps.abs() as u32
    }

    fn angle_steps(&self, degrees: i32) -> u32 {
        let steps = degrees as f32 * self.geometry.steps_per_degree() * self.calibration.turn;
        steps.abs() as u32
    }

    fn drive(&mut self, right: Direction, left: Direction, steps: u32) {
        self.take_up_slack(right, left);
        self.right.turn(right, steps, 1.0);
        self.left.turn(left, steps, 1.0);
    }

    pub fn forward(&mut self, mm: i32) {
        let steps = self.distance_steps(mm, self.calibration.movement);
        self.drive(Direction::Forward, Direction::Backward, steps);
    }

    pub fn back(&mut self, mm: i32) {
        let steps = self.distance_steps(mm, self.calibration.movement);
        self.drive(Direction::Backward, Direction::Forward, steps);
    }

    pub fn left_turn(&mut self, degrees: i32) {
        let steps = self.angle_steps(degrees);
        self.drive(Direction::Forward, Direction::Forward, steps);
    }

    pub fn right_turn(&mut self, degrees: i32) {
        let steps = self.angle_steps(degrees);
        self.drive(Direction::Backward, Direction::Backward, steps);
    }

    /// Drive the left wheel alone
    pub fn left_wheel(&mut self, direction: Direction, mm: i32) {
        let steps = self.distance_steps(mm, self.calibration.turn);
        self.left.take_up_slack(direction, self.calibration.slack);
        self.left.turn(direction, steps, 1.0);
    }

    /// Drive the right wheel alone
    pub fn right_wheel(&mut self, direction: Direction, mm: i32) {
        let steps = self.distance_steps(mm, self.calibration.turn);
        self.right.take_up_slack(direction, self.calibration.slack);
        self.right.turn(direction, steps, 1.0);
    }

    /// Per-wheel distances (mm, signed) at independent speeds
    pub fn speed_move(
        &mut self,
        left: WheelCommand,
        right: WheelCommand,
    ) -> Result<(), ValidationError> {
        let (left, right) = validate_speeds(left, right)?;
        let spm = self.geometry.steps_per_mm();
        let to_steps = |w: WheelCommand| WheelCommand {
            steps: (w.steps as f32 * spm) as i32,
            speed: w.speed,
        };
        self.start_speed_move(to_steps(left), to_steps(right));
        Ok(())
    }

    /// Per-wheel signed step counts at independent speeds
    pub fn speed_move_steps(
        &mut self,
        left: WheelCommand,
        right: WheelCommand,
    ) -> Result<(), ValidationError> {
        let (left, right) = validate_speeds(left, right)?;
        self.start_speed_move(left, right);
        Ok(())
    }

    fn start_speed_move(&mut self, left: WheelCommand, right: WheelCommand) {
        let slack = self.calibration.slack;
        let turn = self.calibration.turn;
        for (stepper, cmd) in [(&mut self.right, right), (&mut self.left, left)] {
            if cmd.steps == 0 {
                continue;
            }
            let direction = Direction::from_sign(cmd.steps);
            stepper.take_up_slack(direction, slack);
            let steps = (cmd.steps.unsigned_abs() as f32 * turn) as u32;
            stepper.turn(direction, steps, cmd.speed);
        }
    }

    /// Start continuous back-and-forth slack calibration
    pub fn calibrate_slack(&mut self, amount: u16) {
        self.calibration.slack = amount;
        self.calibrating_slack = true;
        self.right.turn(Direction::Forward, 1, 1.0);
        self.left.turn(Direction::Backward, 1, 1.0);
    }

    /// Reverse both wheels through their slack whenever they come to rest
    pub fn calibration_step(&mut self) {
        if !self.calibrating_slack || !self.is_idle() {
            return;
        }
        let right = self
            .right
            .last_direction()
            .unwrap_or(Direction::Backward)
            .reversed();
        let left = self
            .left
            .last_direction()
            .unwrap_or(Direction::Forward)
            .reversed();
        self.take_up_slack(right, left);
    }

    /// Remaining steps as (left, right)
    pub fn remaining(&self) -> (u32, u32) {
        (self.left.remaining(), self.right.remaining())
    }

    pub fn pause(&mut self) {
        self.left.pause();
        self.right.pause();
    }

    pub fn resume(&mut self) {
        self.left.resume();
        self.right.resume();
    }

    /// Discard all motion and end slack calibration
    pub fn stop(&mut self) {
        self.left.stop();
        self.right.stop();
        self.calibrating_slack = false;
    }

    /// Step both wheels if due and latch the coils on change
    pub fn service(&mut self, now_us: u64, coils: &mut impl CoilDriver) {
        self.left.service(now_us);
        self.right.service(now_us);
        let patterns = (self.left.coil_pattern(), self.right.coil_pattern());
        if patterns != self.latched {
            coils.energize(patterns.0, patterns.1);
            self.latched = patterns;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    struct Coils;

    impl CoilDriver for Coils {
        fn energize(&mut self, _left: u8, _right: u8) {}
    }

    fn reference_geometry() -> Geometry {
        Geometry {
            steps_per_revolution: 200.0,
            wheel_diameter_mm: 65.0,
            wheel_distance_mm: 150.0,
        }
    }

    fn controller() -> MotionController {
        MotionController::new(reference_geometry(), Calibration::default())
    }

    fn run_to_idle(mc: &mut MotionController) -> u64 {
        let mut coils = Coils;
        let mut now = 0;
        while !mc.is_idle() {
            mc.service(now, &mut coils);
            now += 100;
            assert!(now < 100_000_000, "motion never finished");
        }
        now
    }

    #[test]
    fn test_geometry() {
        let g = reference_geometry();
        assert!((g.steps_per_mm() - 0.979).abs() < 0.001);
        let expected_deg = (150.0 * core::f32::consts::PI / 360.0) * g.steps_per_mm();
        assert!((g.steps_per_degree() - expected_deg).abs() < 1e-4);
    }

    #[test]
    fn test_forward_drives_wheels_opposite() {
        let mut mc = controller();
        mc.forward(100);

        let right = mc.right().current().unwrap();
        let left = mc.left().current().unwrap();
        assert_eq!(right.direction, Direction::Forward);
        assert_eq!(left.direction, Direction::Backward);
        assert!((97..=98).contains(&right.steps));
        assert_eq!(left.steps, right.steps);
    }

    #[test]
    fn test_turns_drive_wheels_together() {
        let mut mc = controller();
        mc.left_turn(90);
        assert_eq!(mc.right().current().unwrap().direction, Direction::Forward);
        assert_eq!(mc.left().current().unwrap().direction, Direction::Forward);

        let mut mc = controller();
        mc.right_turn(90);
        assert_eq!(mc.right().current().unwrap().direction, Direction::Backward);
        assert_eq!(mc.left().current().unwrap().direction, Direction::Backward);
    }

    #[test]
    fn test_slack_queued_on_reversal() {
        let mut mc = controller();
        mc.forward(10);
        run_to_idle(&mut mc);

        mc.back(10);
        let slack = mc.right().current().unwrap();
        assert_eq!(slack.direction, Direction::Backward);
        assert_eq!(slack.steps, 14);
        assert_eq!(slack.speed, 1.0);
        assert_eq!(mc.right().queued().unwrap().direction, Direction::Backward);
        assert_eq!(mc.right().remaining(), 14 + mc.right().queued().unwrap().steps);
    }

    #[test]
    fn test_slack_queued_on_turn_reversal() {
        let mut mc = controller();
        mc.right_turn(45);
        run_to_idle(&mut mc);

        mc.left_turn(45);
        for wheel in [mc.right(), mc.left()] {
            let slack = wheel.current().unwrap();
            assert_eq!(slack.direction, Direction::Forward);
            assert_eq!(slack.steps, 14);
            assert_eq!(wheel.queued().unwrap().direction, Direction::Forward);
        }
    }

    #[test]
    fn test_no_slack_when_direction_unchanged() {
        let mut mc = controller();
        mc.forward(10);
        run_to_idle(&mut mc);
        mc.forward(10);
        assert!(mc.right().queued().is_none());
    }

    #[test]
    fn test_slack_finishes_before_main_move() {
        let mut mc = controller();
        mc.forward(10);
        let mut now = run_to_idle(&mut mc);
        mc.back(10);

        let mut coils = Coils;
        for _ in 0..14 {
            assert!(mc.right().queued().is_some());
            now += BASE_STEP_INTERVAL_US;
            mc.service(now, &mut coils);
        }
        // Slack done, main move now current and nothing queued
        assert!(mc.right().queued().is_none());
        assert!(!mc.is_idle());
    }

    #[test]
    fn test_single_wheel_uses_turn_calibration() {
        let mut mc = MotionController::new(
            reference_geometry(),
            Calibration {
                slack: 0,
                movement: 1.0,
                turn: 1.2,
            },
        );
        mc.left_wheel(Direction::Forward, 100);
        assert!(mc.right().is_idle());
        let steps = mc.left().current().unwrap().steps;
        assert_eq!(steps, (100.0 * reference_geometry().steps_per_mm() * 1.2) as u32);
    }

    #[test]
    fn test_speed_move_steps_scaling() {
        let mut mc = controller();
        mc.speed_move_steps(
            WheelCommand { steps: -50, speed: 0.05 },
            WheelCommand { steps: 0, speed: 0.5 },
        )
        .unwrap();

        let left = mc.left().current().unwrap();
        assert_eq!(left.direction, Direction::Backward);
        assert_eq!(left.steps, 50);
        assert_eq!(left.speed, MIN_SPEED);
        assert!(mc.right().is_idle());
    }

    #[test]
    fn test_speed_move_slack_at_full_speed() {
        let mut mc = controller();
        mc.speed_move_steps(
            WheelCommand { steps: 5, speed: 1.0 },
            WheelCommand { steps: 5, speed: 1.0 },
        )
        .unwrap();
        run_to_idle(&mut mc);

        mc.speed_move_steps(
            WheelCommand { steps: -20, speed: 0.5 },
            WheelCommand { steps: 20, speed: 0.5 },
        )
        .unwrap();
        let slack = mc.left().current().unwrap();
        assert_eq!(slack.speed, 1.0);
        assert_eq!(mc.left().queued().unwrap().speed, 0.5);
        // Right wheel kept its direction
        assert!(mc.right().queued().is_none());
    }

    #[test]
    fn test_speed_interval() {
        assert_eq!(step_interval_us(1.0), 2000);
        assert_eq!(step_interval_us(0.5), 4000);
        assert_eq!(step_interval_us(0.0), 20000);
    }

    #[test]
    fn test_validation_messages() {
        let ok = WheelCommand { steps: 10, speed: 0.5 };
        assert_eq!(
            validate_speeds(WheelCommand { steps: 10, speed: 1.5 }, ok),
            Err(ValidationError::LeftSpeedRange)
        );
        assert_eq!(
            validate_speeds(WheelCommand { steps: 10, speed: 0.0 }, ok),
            Err(ValidationError::LeftSpeedZero)
        );
        assert_eq!(
            validate_speeds(ok, WheelCommand { steps: 10, speed: -0.1 }),
            Err(ValidationError::RightSpeedRange)
        );
        assert_eq!(
            validate_speeds(ok, WheelCommand { steps: 3, speed: 0.0 }),
            Err(ValidationError::RightSpeedZero)
        );
        // Zero speed is fine for a wheel that is not moving
        assert!(validate_speeds(WheelCommand { steps: 0, speed: 0.0 }, ok).is_ok());
    }

    #[test]
    fn test_pause_resume_stop() {
        let mut mc = controller();
        mc.forward(50);
        let mut coils = Coils;
        mc.service(0, &mut coils);
        let before = mc.remaining();

        mc.pause();
        mc.service(1_000_000, &mut coils);
        assert_eq!(mc.remaining(), before);

        mc.resume();
        mc.service(2_000_000, &mut coils);
        assert_eq!(mc.remaining().0, before.0 - 1);

        mc.stop();
        assert!(mc.is_idle());
        assert_eq!(mc.remaining(), (0, 0));
    }

    #[test]
    fn test_coils_released_when_idle() {
        let mut mc = controller();
        let mut coils = Coils;
        mc.forward(2);
        run_to_idle(&mut mc);
        mc.service(0, &mut coils);
        assert_eq!(mc.left().coil_pattern(), 0);
        assert_eq!(mc.right().coil_pattern(), 0);
    }

    #[test]
    fn test_slack_calibration_oscillates_until_stop() {
        let mut mc = controller();
        mc.calibrate_slack(5);
        assert_eq!(mc.calibration().slack, 5);
        run_to_idle(&mut mc);

        mc.calibration_step();
        let right = mc.right().current().unwrap();
        assert_eq!(right.direction, Direction::Backward);
        assert_eq!(right.steps, 5);
        assert_eq!(mc.left().current().unwrap().direction, Direction::Forward);

        run_to_idle(&mut mc);
        mc.calibration_step();
        assert_eq!(mc.right().current().unwrap().direction, Direction::Forward);

        mc.stop();
        assert!(!mc.is_calibrating_slack());
        mc.calibration_step();
        assert!(mc.is_idle());
    }

    proptest! {
        #[test]
        fn prop_invalid_speed_leaves_motors_untouched(
            ls in -2.0f32..2.0,
            rs in -2.0f32..2.0,
            lsteps in -500i32..500,
            rsteps in -500i32..500,
        ) {
            let mut mc = controller();
            let left = WheelCommand { steps: lsteps, speed: ls };
            let right = WheelCommand { steps: rsteps, speed: rs };
            let result = mc.speed_move_steps(left, right);

            let left_bad = !(0.0..=1.0).contains(&ls) || (ls == 0.0 && lsteps != 0);
            let right_bad = !(0.0..=1.0).contains(&rs) || (rs == 0.0 && rsteps != 0);

            if left_bad || right_bad {
                prop_assert!(result.is_err());
                prop_assert!(mc.is_idle());
                prop_assert!(mc.left().last_direction().is_none());
                prop_assert!(mc.right().last_direction().is_none());
            } else {
                prop_assert!(result.is_ok());
                if let Some(m) = mc.left().current() {
                    prop_assert!(m.speed >= MIN_SPEED && m.speed <= 1.0);
                }
            }
        }
    }
}
