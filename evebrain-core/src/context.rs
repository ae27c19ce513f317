//! Robot context
//!
//! Owns the board, the persisted settings and all runtime state the
//! command handlers touch. Operations start their work, record the
//! completion they owe and then [`Context::wait`]. In blocking mode that
//! spins until the robot is ready; in non-blocking mode it returns at once
//! and the main loop resolves the completion later through
//! [`Context::complete`].

use alloc::format;
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use serde_json::{json, Map, Value};

use evebrain_hal::{NvStorage, PinMode, ScanEntry};
use evebrain_protocol::number;

use crate::config::{Board, RobotConfig, SUB_VERSION};
use crate::error::ValidationError;
use crate::events::{PinEvent, PinEventQueue};
use crate::motion::{Calibration, Direction, Geometry, MotionController, WheelCommand};
use crate::notes;
use crate::scheduler::{ExecutionMode, PendingCompletion, ReadinessScheduler, ServoKind};
use crate::servo::ServoPulseTrain;
use crate::settings::{calibration_in_range, Settings, SettingsStore, MAX_SLACK_CALIBRATION};

/// Climate sensor settling time
pub const CLIMATE_WINDOW_MS: u64 = 1500;
/// Ultrasonic echo wait
pub const ECHO_TIMEOUT_US: u32 = 20_000;
pub const DISTANCE_WINDOW_MS: u64 = 250;
pub const COMPASS_WINDOW_MS: u64 = 150;
pub const ADC_WINDOW_MS: u64 = 50;
pub const PWM_SERVO_WINDOW_MS: u64 = 1000;
pub const PWM_SERVO_MIN_US: u16 = 500;
pub const PWM_SERVO_MAX_US: u16 = 2200;
pub const WIFI_SCAN_WINDOW_MS: u64 = 150;

/// Round-trip echo time per centimetre
const ECHO_US_PER_CM: f32 = 29.1;

/// Query appended to the host when polling for remote commands
const REMOTE_COMMAND_QUERY: &str = "/?_sort=id&_order=desc&_limit=1&bot=";

/// Last sensor values, posted to the server
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Readings {
    pub temperature: f32,
    pub humidity: f32,
    pub distance_cm: u32,
}

impl Default for Readings {
    fn default() -> Self {
        Self {
            temperature: f32::NAN,
            humidity: f32::NAN,
            distance_cm: 0,
        }
    }
}

/// All state owned by the main loop
pub struct Context<B: Board, S: NvStorage> {
    board: B,
    store: SettingsStore<S>,
    settings: Settings,
    config: RobotConfig,
    motion: MotionController,
    servo: ServoPulseTrain,
    scheduler: ReadinessScheduler,
    events: &'static dyn PinEventQueue,
    readings: Readings,
    version: String,
}

impl<B: Board, S: NvStorage> Context<B, S> {
    /// Load settings and build the context
    ///
    /// The reset input, when configured, is sampled here: held low it
    /// restores factory settings.
    pub fn new(
        mut board: B,
        storage: S,
        config: RobotConfig,
        events: &'static dyn PinEventQueue,
    ) -> Self {
        let reset_requested = match config.reset_pin {
            Some(pin) => {
                board.set_mode(pin, PinMode::Input);
                !board.digital_read(pin)
            }
            None => false,
        };

        let ap_name = board.default_ap_name();
        let mut store = SettingsStore::new(storage);
        let settings = store.load(reset_requested, &ap_name);

        let geometry = Geometry {
            steps_per_revolution: config.steps_per_revolution,
            wheel_diameter_mm: settings.wheel_diameter_mm,
            wheel_distance_mm: settings.wheel_distance_mm,
        };
        let mut motion = MotionController::new(geometry, Calibration::default());
        motion.apply_settings(&settings);

        let version = format!("{}.{}", config.hardware.number(), SUB_VERSION);

        Self {
            board,
            store,
            settings,
            config,
            motion,
            servo: ServoPulseTrain::new(),
            scheduler: ReadinessScheduler::new(),
            events,
            readings: Readings::default(),
            version,
        }
    }

    pub fn board(&self) -> &B {
        &self.board
    }

    pub fn board_mut(&mut self) -> &mut B {
        &mut self.board
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn config(&self) -> &RobotConfig {
        &self.config
    }

    pub fn motion(&self) -> &MotionController {
        &self.motion
    }

    pub fn servo(&self) -> &ServoPulseTrain {
        &self.servo
    }

    pub fn scheduler(&self) -> &ReadinessScheduler {
        &self.scheduler
    }

    pub fn events(&self) -> &'static dyn PinEventQueue {
        self.events
    }

    pub fn readings(&self) -> Readings {
        self.readings
    }

    /// `"<hardware>.<sub-version>"`
    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn storage(&self) -> &S {
        self.store.storage()
    }

    pub fn now_ms(&self) -> u64 {
        self.board.now_ms()
    }

    pub fn set_mode(&mut self, mode: ExecutionMode) {
        self.scheduler.set_mode(mode);
    }

    pub fn is_blocking(&self) -> bool {
        self.scheduler.is_blocking()
    }

    // ---- Scheduling -----------------------------------------------------

    /// Service the servo pulse train and both wheels once
    pub fn service(&mut self) {
        let now = self.board.now_us();
        self.servo.service(now, &mut self.board);
        self.motion.service(now, &mut self.board);
    }

    /// Keep slack calibration oscillating
    pub fn calibration_step(&mut self) {
        self.motion.calibration_step();
    }

    /// Wheels idle, no servo pulses left and the timed window elapsed
    pub fn ready(&self) -> bool {
        self.scheduler.ready(
            self.motion.is_idle(),
            self.servo.is_idle(),
            self.board.now_ms(),
        )
    }

    /// Spin until ready in blocking mode; return at once otherwise
    pub fn wait(&mut self) {
        if !self.scheduler.is_blocking() {
            return;
        }
        while !self.ready() {
            self.service();
        }
    }

    fn start_window(&mut self, window_ms: u64) {
        let now = self.board.now_ms();
        self.scheduler.start_window(now, window_ms);
    }

    fn owe(&mut self, pending: PendingCompletion) {
        self.scheduler.set_pending(pending);
        self.wait();
    }

    /// Resolve the outstanding completion
    ///
    /// Applies the completion side effects and returns the reply payload,
    /// if the operation has one.
    pub fn complete(&mut self) -> Option<Value> {
        match self.scheduler.take_pending() {
            PendingCompletion::Temperature => {
                let t = self.board.temperature();
                self.readings.temperature = t;
                Some(truncated(t))
            }
            PendingCompletion::Humidity => {
                let h = self.board.humidity();
                self.readings.humidity = h;
                Some(truncated(h))
            }
            PendingCompletion::Distance(cm) => Some(Value::String(cm.to_string())),
            PendingCompletion::Compass(r) => Some(json!({ "X": r.x, "Y": r.y, "Z": r.z })),
            PendingCompletion::Buzzer => {
                self.board.no_tone();
                None
            }
            PendingCompletion::Servo(ServoKind::Pwm) => {
                self.board.detach();
                None
            }
            PendingCompletion::Analog(value) => Some(Value::String(value.to_string())),
            PendingCompletion::Servo(ServoKind::PulseTrain)
            | PendingCompletion::Motion
            | PendingCompletion::None => None,
        }
    }

    // ---- Motion ---------------------------------------------------------

    pub fn forward(&mut self, mm: i32) {
        self.motion.forward(mm);
        self.owe(PendingCompletion::Motion);
    }

    pub fn back(&mut self, mm: i32) {
        self.motion.back(mm);
        self.owe(PendingCompletion::Motion);
    }

    pub fn left(&mut self, degrees: i32) {
        self.motion.left_turn(degrees);
        self.owe(PendingCompletion::Motion);
    }

    pub fn right(&mut self, degrees: i32) {
        self.motion.right_turn(degrees);
        self.owe(PendingCompletion::Motion);
    }

    pub fn left_motor(&mut self, direction: Direction, mm: i32) {
        self.motion.left_wheel(direction, mm);
        self.owe(PendingCompletion::Motion);
    }

    pub fn right_motor(&mut self, direction: Direction, mm: i32) {
        self.motion.right_wheel(direction, mm);
        self.owe(PendingCompletion::Motion);
    }

    /// Signed per-wheel distances in mm
    pub fn speed_move(
        &mut self,
        left: WheelCommand,
        right: WheelCommand,
    ) -> Result<(), ValidationError> {
        self.motion.speed_move(left, right)?;
        self.owe(PendingCompletion::Motion);
        Ok(())
    }

    /// Signed per-wheel step counts
    pub fn speed_move_steps(
        &mut self,
        left: WheelCommand,
        right: WheelCommand,
    ) -> Result<(), ValidationError> {
        self.motion.speed_move_steps(left, right)?;
        self.owe(PendingCompletion::Motion);
        Ok(())
    }

    /// Freeze both wheels, returning (left, right) steps remaining
    pub fn pause(&mut self) -> (u32, u32) {
        let remaining = self.motion.remaining();
        self.motion.pause();
        remaining
    }

    pub fn resume(&mut self) {
        self.motion.resume();
    }

    pub fn stop(&mut self) {
        self.motion.stop();
    }

    // ---- Calibration ----------------------------------------------------

    pub fn calibrate_slack(&mut self, amount: u16) -> Result<(), ValidationError> {
        if amount >= MAX_SLACK_CALIBRATION {
            return Err(ValidationError::InvalidArgument);
        }
        self.settings.slack_calibration = amount;
        self.save();
        self.motion.calibrate_slack(amount);
        self.owe(PendingCompletion::Motion);
        Ok(())
    }

    pub fn calibrate_move(&mut self, factor: f32) -> Result<(), ValidationError> {
        if !calibration_in_range(factor) {
            return Err(ValidationError::InvalidArgument);
        }
        self.settings.move_calibration = factor;
        self.motion.apply_settings(&self.settings);
        self.save();
        Ok(())
    }

    pub fn calibrate_turn(&mut self, factor: f32) -> Result<(), ValidationError> {
        if !calibration_in_range(factor) {
            return Err(ValidationError::InvalidArgument);
        }
        self.settings.turn_calibration = factor;
        self.motion.apply_settings(&self.settings);
        self.save();
        Ok(())
    }

    // ---- Sensors --------------------------------------------------------

    pub fn temperature(&mut self) {
        self.board.begin();
        self.start_window(CLIMATE_WINDOW_MS);
        self.owe(PendingCompletion::Temperature);
    }

    pub fn humidity(&mut self) {
        self.board.begin();
        self.start_window(CLIMATE_WINDOW_MS);
        self.owe(PendingCompletion::Humidity);
    }

    fn measure_distance(&mut self) -> u32 {
        let echo_us = self.board.echo_duration_us(ECHO_TIMEOUT_US);
        let cm = (echo_us / 2) as f32 / ECHO_US_PER_CM;
        self.readings.distance_cm = cm as u32;
        self.readings.distance_cm
    }

    pub fn distance(&mut self) {
        let cm = self.measure_distance();
        self.start_window(DISTANCE_WINDOW_MS);
        self.owe(PendingCompletion::Distance(cm));
    }

    pub fn compass(&mut self) {
        let reading = self.board.read();
        self.start_window(COMPASS_WINDOW_MS);
        self.owe(PendingCompletion::Compass(reading));
    }

    /// Read one channel of the ADC expander; unknown channels read 0
    pub fn read_sensors(&mut self, channel: i32) {
        let channels = self.board.read_channels();
        let value = usize::try_from(channel)
            .ok()
            .and_then(|c| channels.get(c).copied())
            .unwrap_or(0);
        self.start_window(ADC_WINDOW_MS);
        self.owe(PendingCompletion::Analog(value));
    }

    pub fn analog_input(&mut self) -> u16 {
        self.board.analog_read()
    }

    // ---- Actuators ------------------------------------------------------

    /// Sound a note for `duration_ms`; an unknown semitone stays silent
    pub fn beep(&mut self, semitone: i32, duration_ms: u64) {
        if let Some(hz) = notes::frequency(semitone) {
            self.board.tone(hz);
        }
        self.start_window(duration_ms);
        self.owe(PendingCompletion::Buzzer);
    }

    /// Move the primary servo with a pulse train
    pub fn servo_move(&mut self, angle: u16) {
        self.servo.start(angle);
        self.owe(PendingCompletion::Servo(ServoKind::PulseTrain));
    }

    /// Move the PWM servo; it is detached when the move completes
    pub fn pwm_servo_move(&mut self, angle: u16) {
        self.board.attach(PWM_SERVO_MIN_US, PWM_SERVO_MAX_US);
        self.board.write_angle(angle);
        self.start_window(PWM_SERVO_WINDOW_MS);
        self.owe(PendingCompletion::Servo(ServoKind::Pwm));
    }

    pub fn pin_servo(&mut self, pin: u8, angle: u16) -> Result<(), ValidationError> {
        if self.board.start_pin_servo(pin, angle) {
            Ok(())
        } else {
            Err(ValidationError::InvalidServoPin)
        }
    }

    pub fn poll_pin_servos(&mut self) {
        self.board.poll_pin_servos();
    }

    // ---- GPIO -----------------------------------------------------------

    pub fn gpio_write(&mut self, pin: u8, high: bool) {
        self.board.set_mode(pin, PinMode::Output);
        self.board.digital_write(pin, high);
    }

    pub fn gpio_pwm(&mut self, pin: u8, duty: u8) {
        self.board.pwm_write(pin, duty);
    }

    /// Release the pin as an input and read it
    pub fn digital_input(&mut self, pin: u8) -> bool {
        self.board.digital_write(pin, false);
        self.board.set_mode(pin, PinMode::Input);
        self.board.digital_read(pin)
    }

    /// Start reporting level changes of `pin`
    ///
    /// The current level is queued straight away so the client learns the
    /// starting state.
    pub fn digital_notify(&mut self, pin: u8) -> Result<(), ValidationError> {
        if !self.events.has_slot(pin) {
            return Err(ValidationError::NotifyUnsupported);
        }
        self.board.set_mode(pin, PinMode::Input);
        self.board
            .attach_interrupt(pin)
            .map_err(|_| ValidationError::NotifyUnsupported)?;
        let level = self.board.digital_read(pin);
        self.events.push(PinEvent { pin, level });
        Ok(())
    }

    pub fn digital_stop_notify(&mut self, pin: u8) -> Result<(), ValidationError> {
        if !self.events.has_slot(pin) {
            return Err(ValidationError::StopNotifyUnsupported);
        }
        self.board
            .detach_interrupt(pin)
            .map_err(|_| ValidationError::StopNotifyUnsupported)
    }

    // ---- Configuration --------------------------------------------------

    fn save(&mut self) {
        if let Err(e) = self.store.save(&self.settings) {
            log_error!("Failed to save settings: {:?}", e);
        }
    }

    /// Push the network settings to the network collaborator
    pub fn apply_network(&mut self) {
        self.board.apply(&self.settings.network_config());
    }

    /// Current network and wheel configuration
    pub fn config_json(&self) -> Value {
        let s = &self.settings;
        let mut msg = Map::new();
        msg.insert("sta_ssid".into(), s.sta_ssid.as_str().into());
        msg.insert("sta_dhcp".into(), s.sta_dhcp.into());
        msg.insert("sta_rssi".into(), self.board.station_rssi().into());
        if !s.sta_dhcp {
            msg.insert("sta_fixedip".into(), ip_string(s.sta_fixed_ip).into());
            msg.insert(
                "sta_fixedgateway".into(),
                ip_string(s.sta_fixed_gateway).into(),
            );
            msg.insert(
                "sta_fixednetmask".into(),
                ip_string(s.sta_fixed_netmask).into(),
            );
        }
        msg.insert(
            "sta_ip".into(),
            ip_string(self.board.station_ip()).into(),
        );
        msg.insert("ap_ssid".into(), s.ap_ssid.as_str().into());
        msg.insert("ap_encrypted".into(), (!s.ap_pass.is_empty()).into());
        msg.insert("discovery".into(), s.discovery.into());
        msg.insert("wifi_mode".into(), self.board.mode().as_str().into());
        msg.insert("wheelDiameter".into(), s.wheel_diameter_mm.into());
        msg.insert("wheelDistance".into(), s.wheel_distance_mm.into());
        msg.insert(
            "stepsPerTurn".into(),
            (self.config.steps_per_revolution as u32).into(),
        );
        Value::Object(msg)
    }

    /// Update network and wheel settings from an object argument
    ///
    /// Nothing changes unless every supplied field is valid.
    pub fn set_config(&mut self, arg: &Value) -> Result<(), ValidationError> {
        let Some(obj) = arg.as_object() else {
            return Ok(());
        };
        let mut next = self.settings.clone();

        if let Some(v) = obj.get("sta_ssid") {
            next.sta_ssid = text(v)?;
        }
        if let Some(v) = obj.get("sta_pass") {
            next.sta_pass = text(v)?;
        }
        if let Some(v) = obj.get("ap_ssid") {
            next.ap_ssid = text(v)?;
        }
        if let Some(v) = obj.get("ap_pass") {
            next.ap_pass = text(v)?;
        }
        if let Some(v) = obj.get("sta_dhcp") {
            next.sta_dhcp = flag(v)?;
        }
        if let Some(v) = obj.get("discovery") {
            next.discovery = flag(v)?;
        }
        for (key, field) in [
            ("sta_fixedip", &mut next.sta_fixed_ip),
            ("sta_fixedgateway", &mut next.sta_fixed_gateway),
            ("sta_fixednetmask", &mut next.sta_fixed_netmask),
            ("sta_fixeddns1", &mut next.sta_fixed_dns1),
            ("sta_fixeddns2", &mut next.sta_fixed_dns2),
        ] {
            if let Some(v) = obj.get(key) {
                *field = v
                    .as_str()
                    .and_then(parse_ip)
                    .ok_or(ValidationError::InvalidArgument)?;
            }
        }
        if let Some(v) = obj.get("wheelDiameter") {
            next.wheel_diameter_mm = length_mm(v)?;
        }
        if let Some(v) = obj.get("wheelDistance") {
            next.wheel_distance_mm = length_mm(v)?;
        }

        self.settings = next;
        self.motion.apply_settings(&self.settings);
        self.apply_network();
        self.save();
        Ok(())
    }

    /// Restore factory settings
    pub fn reset_config(&mut self) {
        self.settings.schema_version = 0;
        self.save();
        let ap_name = self.board.default_ap_name();
        self.settings = self.store.load(false, &ap_name);
        self.motion.apply_settings(&self.settings);
        self.apply_network();
    }

    /// Update the server posting settings from an object argument
    pub fn set_posting(&mut self, arg: &Value) -> Result<(), ValidationError> {
        let Some(obj) = arg.as_object() else {
            return Ok(());
        };
        let mut next = self.settings.clone();

        if let Some(v) = obj.get("onOff") {
            next.post_mode = integer(v)?;
        }
        if let Some(v) = obj.get("server") {
            next.host_server = text(v)?;
        }
        if let Some(v) = obj.get("time") {
            next.server_request_time_s = integer(v)?;
        }
        if let Some(v) = obj.get("toggleDistance") {
            next.post_distance = integer::<u8>(v)? == 1;
        }
        if let Some(v) = obj.get("toggleTempHumidity") {
            next.post_temp_humidity = integer::<u8>(v)? == 1;
        }

        self.settings = next;
        self.save();
        Ok(())
    }

    // ---- Network --------------------------------------------------------

    pub fn start_wifi_scan(&mut self) {
        self.board.start_scan();
    }

    /// Finished scan results as a JSON array
    ///
    /// Holds readiness off briefly so the notification does not race a
    /// completion reply.
    pub fn take_scan_results(&mut self) -> Option<Value> {
        let entries = self.board.take_scan_results()?;
        self.start_window(WIFI_SCAN_WINDOW_MS);
        self.wait();
        Some(scan_json(&entries))
    }

    pub fn take_network_changed(&mut self) -> bool {
        self.board.take_network_changed()
    }

    pub fn free_heap(&self) -> u32 {
        self.board.free_heap()
    }

    // ---- Server posting -------------------------------------------------

    /// Periodic posting is enabled and the interval has elapsed
    pub fn post_due(&self, last_post_ms: u64) -> bool {
        let interval_ms = u64::from(self.settings.server_request_time_s) * 1000;
        self.settings.post_mode != 0
            && self.ready()
            && self.board.now_ms().saturating_sub(last_post_ms) >= interval_ms
    }

    /// Status document posted to the server
    pub fn status_update(&mut self) -> Value {
        let analog = self.board.analog_read();
        let pins: String = self
            .config
            .status_pins
            .iter()
            .map(|&pin| if self.board.digital_read(pin) { '1' } else { '0' })
            .collect();

        let distance = if self.settings.post_distance {
            json!(self.readings.distance_cm)
        } else {
            Value::Null
        };
        let r = self.readings;
        let (temperature, humidity) =
            if self.settings.post_temp_humidity && r.temperature > -41.0 && r.humidity > -1.0 {
                (json!(r.temperature), json!(r.humidity))
            } else {
                (Value::Null, Value::Null)
            };

        json!({
            "type": "update",
            "analog": analog,
            "digital_pins": pins,
            "distance": distance,
            "temperature": temperature,
            "humidity": humidity,
            "bot": self.settings.ap_ssid.as_str(),
            "refresh_rate": self.settings.server_request_time_s,
        })
    }

    /// Fetch the newest command queued on the server for this robot
    pub fn fetch_remote_command(&mut self) -> Option<String> {
        let url = format!(
            "{}{}{}",
            self.settings.host_server, REMOTE_COMMAND_QUERY, self.settings.ap_ssid
        );
        let listing = self.board.fetch_command(&url)?;
        let command = strip_listing(&listing);
        (!command.is_empty()).then(|| command.to_string())
    }

    pub fn post_update(&mut self, update: &Value) {
        let body = serde_json::to_string(update).unwrap_or_default();
        self.board.post(&self.settings.host_server, &body);
    }

    /// Re-read the sensors that are being posted
    pub fn refresh_readings(&mut self) {
        if self.settings.post_temp_humidity {
            self.board.begin();
            self.readings.temperature = self.board.temperature();
            self.readings.humidity = self.board.humidity();
        }
        if self.settings.post_distance {
            self.measure_distance();
        }
    }
}

/// Sensor value as an integer string
fn truncated(value: f32) -> Value {
    Value::String((value as i32).to_string())
}

fn ip_string(ip: [u8; 4]) -> String {
    format!("{}.{}.{}.{}", ip[0], ip[1], ip[2], ip[3])
}

/// Parse dotted-quad IPv4
fn parse_ip(s: &str) -> Option<[u8; 4]> {
    let mut ip = [0u8; 4];
    let mut parts = s.trim().split('.');
    for octet in ip.iter_mut() {
        *octet = parts.next()?.parse().ok()?;
    }
    if parts.next().is_some() {
        return None;
    }
    Some(ip)
}

fn text<const N: usize>(v: &Value) -> Result<heapless::String<N>, ValidationError> {
    v.as_str()
        .and_then(|s| heapless::String::try_from(s).ok())
        .ok_or(ValidationError::InvalidArgument)
}

fn flag(v: &Value) -> Result<bool, ValidationError> {
    match v {
        Value::Bool(b) => Ok(*b),
        other => number(other)
            .map(|n| n != 0.0)
            .ok_or(ValidationError::InvalidArgument),
    }
}

fn integer<T: TryFrom<i64>>(v: &Value) -> Result<T, ValidationError> {
    number(v)
        .and_then(|n| T::try_from(n as i64).ok())
        .ok_or(ValidationError::InvalidArgument)
}

fn length_mm(v: &Value) -> Result<f32, ValidationError> {
    number(v)
        .map(|n| n as f32)
        .filter(|&mm| mm > 0.0)
        .ok_or(ValidationError::InvalidArgument)
}

/// The server answers with a JSON list; its single element is the command
fn strip_listing(listing: &str) -> &str {
    let s = listing.trim();
    let s = s.strip_prefix('[').unwrap_or(s);
    let s = s.strip_suffix(']').unwrap_or(s);
    s.trim()
}

fn scan_json(entries: &[ScanEntry]) -> Value {
    let list: Vec<Value> = entries
        .iter()
        .map(|e| {
            json!({
                "ssid": e.ssid.as_str(),
                "rssi": e.rssi,
                "encrypted": e.encrypted,
            })
        })
        .collect();
    Value::Array(list)
}
