//! Host-side test doubles for the HAL traits

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;
use std::string::String;
use std::vec::Vec;

use evebrain_hal::{
    AnalogExpander, Buzzer, ClimateSensor, Clock, CoilDriver, CompassReading, CompassSensor,
    GpioBank, InterruptError, NetworkConfig, NetworkLink, NvStorage, PinInterrupts, PinMode,
    PinServoBank, PwmServo, RangeSensor, ScanEntry, SerialRx, ServerLink, ServoLine,
    StorageError, WifiMode,
};
use evebrain_protocol::Reply;

use crate::command::OutputHandler;

/// RAM-backed storage
#[derive(Debug, Clone)]
pub struct MemoryStorage {
    bytes: Vec<u8>,
    commits: usize,
    fail: bool,
}

impl MemoryStorage {
    pub fn new(capacity: usize) -> Self {
        Self {
            bytes: vec![0xFF; capacity],
            commits: 0,
            fail: false,
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn commits(&self) -> usize {
        self.commits
    }

    /// Make every operation fail
    pub fn fail_all(&mut self, fail: bool) {
        self.fail = fail;
    }
}

impl NvStorage for MemoryStorage {
    fn capacity(&self) -> usize {
        self.bytes.len()
    }

    fn read(&mut self, offset: usize, buffer: &mut [u8]) -> Result<(), StorageError> {
        if self.fail {
            return Err(StorageError::Medium);
        }
        let end = offset + buffer.len();
        let src = self.bytes.get(offset..end).ok_or(StorageError::OutOfBounds)?;
        buffer.copy_from_slice(src);
        Ok(())
    }

    fn write(&mut self, offset: usize, data: &[u8]) -> Result<(), StorageError> {
        if self.fail {
            return Err(StorageError::Medium);
        }
        let end = offset + data.len();
        let dst = self
            .bytes
            .get_mut(offset..end)
            .ok_or(StorageError::OutOfBounds)?;
        dst.copy_from_slice(data);
        Ok(())
    }

    fn commit(&mut self) -> Result<(), StorageError> {
        if self.fail {
            return Err(StorageError::Medium);
        }
        self.commits += 1;
        Ok(())
    }
}

/// Output handler that keeps every serialized reply
#[derive(Debug, Clone, Default)]
pub struct RecordingOutput {
    lines: Rc<RefCell<Vec<String>>>,
}

impl RecordingOutput {
    pub fn lines(&self) -> Vec<String> {
        self.lines.borrow().clone()
    }

    pub fn clear(&self) {
        self.lines.borrow_mut().clear();
    }
}

impl OutputHandler for RecordingOutput {
    fn send(&mut self, reply: &Reply) {
        self.lines.borrow_mut().push(reply.to_json());
    }
}

/// Observable state of the mock board, shared with the test body
#[derive(Debug, Default)]
pub struct BoardState {
    pub levels: [bool; 32],
    pub modes: [Option<PinMode>; 32],
    pub pwm: Vec<(u8, u8)>,
    pub analog: u16,
    pub interrupts: Vec<u8>,
    pub interrupt_capable: Vec<u8>,
    pub coil_writes: usize,
    pub tone: Option<u16>,
    pub servo_line: bool,
    pub servo_pulses: usize,
    pub pwm_servo: Option<u16>,
    pub pin_servos: Vec<(u8, u16)>,
    pub climate_started: usize,
    pub temperature: f32,
    pub humidity: f32,
    pub echo_us: u32,
    pub compass: CompassReading,
    pub adc: [u8; 4],
    pub network_applied: usize,
    pub applied_ap_ssid: String,
    pub network_changed: bool,
    pub scan: Option<heapless::Vec<ScanEntry, 16>>,
    pub scans_started: usize,
    pub posts: Vec<(String, String)>,
    pub fetches: Vec<String>,
    pub remote_command: Option<String>,
    pub rx: VecDeque<u8>,
}

/// Mock board whose clock advances on every read
pub struct MockBoard {
    now_us: Cell<u64>,
    tick_us: u64,
    pub state: Rc<RefCell<BoardState>>,
}

impl MockBoard {
    pub fn new() -> Self {
        let state = BoardState {
            interrupt_capable: vec![4, 5, 12, 13, 14],
            temperature: 21.6,
            humidity: 40.2,
            ..Default::default()
        };
        Self {
            now_us: Cell::new(0),
            tick_us: 50,
            state: Rc::new(RefCell::new(state)),
        }
    }

    /// Shared handle to the recorded state
    pub fn handle(&self) -> Rc<RefCell<BoardState>> {
        self.state.clone()
    }

    fn tick(&self) -> u64 {
        let now = self.now_us.get() + self.tick_us;
        self.now_us.set(now);
        now
    }
}

impl Clock for MockBoard {
    fn now_ms(&self) -> u64 {
        self.tick() / 1000
    }

    fn now_us(&self) -> u64 {
        self.tick()
    }
}

impl GpioBank for MockBoard {
    fn set_mode(&mut self, pin: u8, mode: PinMode) {
        if let Some(m) = self.state.borrow_mut().modes.get_mut(pin as usize) {
            *m = Some(mode);
        }
    }

    fn digital_write(&mut self, pin: u8, high: bool) {
        if let Some(l) = self.state.borrow_mut().levels.get_mut(pin as usize) {
            *l = high;
        }
    }

    fn digital_read(&mut self, pin: u8) -> bool {
        self.state
            .borrow()
            .levels
            .get(pin as usize)
            .copied()
            .unwrap_or(false)
    }

    fn pwm_write(&mut self, pin: u8, duty: u8) {
        self.state.borrow_mut().pwm.push((pin, duty));
    }

    fn analog_read(&mut self) -> u16 {
        self.state.borrow().analog
    }
}

impl PinInterrupts for MockBoard {
    fn attach_interrupt(&mut self, pin: u8) -> Result<(), InterruptError> {
        let mut s = self.state.borrow_mut();
        if !s.interrupt_capable.contains(&pin) {
            return Err(InterruptError::NotInterruptCapable);
        }
        s.interrupts.push(pin);
        Ok(())
    }

    fn detach_interrupt(&mut self, pin: u8) -> Result<(), InterruptError> {
        let mut s = self.state.borrow_mut();
        if !s.interrupt_capable.contains(&pin) {
            return Err(InterruptError::NotInterruptCapable);
        }
        s.interrupts.retain(|&p| p != pin);
        Ok(())
    }
}

impl CoilDriver for MockBoard {
    fn energize(&mut self, _left: u8, _right: u8) {
        self.state.borrow_mut().coil_writes += 1;
    }
}

impl Buzzer for MockBoard {
    fn tone(&mut self, frequency_hz: u16) {
        self.state.borrow_mut().tone = Some(frequency_hz);
    }

    fn no_tone(&mut self) {
        self.state.borrow_mut().tone = None;
    }
}

impl ServoLine for MockBoard {
    fn set_level(&mut self, high: bool) {
        let mut s = self.state.borrow_mut();
        // A pulse counts once it ends
        if !high && s.servo_line {
            s.servo_pulses += 1;
        }
        s.servo_line = high;
    }
}

impl PwmServo for MockBoard {
    fn attach(&mut self, _min_us: u16, _max_us: u16) {
        self.state.borrow_mut().pwm_servo = Some(0);
    }

    fn write_angle(&mut self, angle: u16) {
        self.state.borrow_mut().pwm_servo = Some(angle);
    }

    fn detach(&mut self) {
        self.state.borrow_mut().pwm_servo = None;
    }
}

impl PinServoBank for MockBoard {
    fn start_pin_servo(&mut self, pin: u8, angle: u16) -> bool {
        if pin > 16 {
            return false;
        }
        self.state.borrow_mut().pin_servos.push((pin, angle));
        true
    }

    fn poll_pin_servos(&mut self) {}
}

impl ClimateSensor for MockBoard {
    fn begin(&mut self) {
        self.state.borrow_mut().climate_started += 1;
    }

    fn temperature(&mut self) -> f32 {
        self.state.borrow().temperature
    }

    fn humidity(&mut self) -> f32 {
        self.state.borrow().humidity
    }
}

impl RangeSensor for MockBoard {
    fn echo_duration_us(&mut self, _timeout_us: u32) -> u32 {
        self.state.borrow().echo_us
    }
}

impl CompassSensor for MockBoard {
    fn read(&mut self) -> CompassReading {
        self.state.borrow().compass
    }
}

impl AnalogExpander for MockBoard {
    fn read_channels(&mut self) -> [u8; 4] {
        self.state.borrow().adc
    }
}

impl NetworkLink for MockBoard {
    fn apply(&mut self, config: &NetworkConfig<'_>) {
        let mut s = self.state.borrow_mut();
        s.network_applied += 1;
        s.applied_ap_ssid = config.ap_ssid.into();
    }

    fn default_ap_name(&self) -> heapless::String<32> {
        heapless::String::try_from("Evebrain-0001").unwrap_or_default()
    }

    fn mode(&self) -> WifiMode {
        WifiMode::AccessPointStation
    }

    fn station_rssi(&self) -> i8 {
        -61
    }

    fn station_ip(&self) -> [u8; 4] {
        [192, 168, 1, 20]
    }

    fn start_scan(&mut self) {
        self.state.borrow_mut().scans_started += 1;
    }

    fn take_scan_results(&mut self) -> Option<heapless::Vec<ScanEntry, 16>> {
        self.state.borrow_mut().scan.take()
    }

    fn take_network_changed(&mut self) -> bool {
        core::mem::take(&mut self.state.borrow_mut().network_changed)
    }

    fn free_heap(&self) -> u32 {
        12_345
    }
}

impl ServerLink for MockBoard {
    fn post(&mut self, url: &str, body: &str) {
        self.state.borrow_mut().posts.push((url.into(), body.into()));
    }

    fn fetch_command(&mut self, url: &str) -> Option<heapless::String<256>> {
        let mut s = self.state.borrow_mut();
        s.fetches.push(url.into());
        s.remote_command
            .take()
            .and_then(|c| heapless::String::try_from(c.as_str()).ok())
    }
}

impl SerialRx for MockBoard {
    fn read_byte(&mut self) -> Option<u8> {
        self.state.borrow_mut().rx.pop_front()
    }
}
