//! Main-loop step
//!
//! [`Robot`] ties the [`Context`] to the [`CommandProcessor`] and the
//! serial frame decoder. The firmware calls [`Robot::poll`] forever; each
//! call does a bounded amount of work and never blocks once a transport
//! has been enabled.

use alloc::boxed::Box;
use alloc::format;
use serde_json::{json, Value};

use evebrain_hal::{NvStorage, SerialTx};
use evebrain_protocol::{FrameDecoder, FrameStatus, Reply, Request};

use crate::command::{CommandProcessor, OutputHandler};
use crate::config::{Board, RobotConfig};
use crate::context::Context;
use crate::events::PinEventQueue;
use crate::handlers::register_commands;
use crate::scheduler::ExecutionMode;

/// Replies written to the serial port in the board's framing
struct SerialOutput<W: SerialTx> {
    tx: W,
    framing: FrameDecoder,
}

impl<W: SerialTx> OutputHandler for SerialOutput<W> {
    fn send(&mut self, reply: &Reply) {
        let json = reply.to_json();
        self.tx.write(&self.framing.encode(json.as_bytes()));
    }
}

/// The robot: context, command registry and transport state
pub struct Robot<B: Board, S: NvStorage> {
    ctx: Context<B, S>,
    processor: CommandProcessor<Context<B, S>>,
    decoder: Option<FrameDecoder>,
    last_post_ms: u64,
}

impl<B: Board, S: NvStorage> Robot<B, S> {
    /// Load settings and register every command
    ///
    /// The robot starts in blocking mode with no outputs.
    pub fn new(
        board: B,
        storage: S,
        config: RobotConfig,
        events: &'static dyn PinEventQueue,
    ) -> Self {
        let ctx = Context::new(board, storage, config, events);
        let mut processor = CommandProcessor::new();
        register_commands(&mut processor);
        log_info!("Evebrain core ready");
        Self {
            ctx,
            processor,
            decoder: None,
            last_post_ms: 0,
        }
    }

    pub fn context(&self) -> &Context<B, S> {
        &self.ctx
    }

    pub fn context_mut(&mut self) -> &mut Context<B, S> {
        &mut self.ctx
    }

    /// Accept commands on the serial port
    ///
    /// Switches to non-blocking mode. Boards that announce themselves
    /// send a boot notification with the firmware version.
    pub fn enable_serial<W: SerialTx + 'static>(&mut self, tx: W) {
        let hardware = self.ctx.config().hardware;
        self.ctx.set_mode(ExecutionMode::NonBlocking);
        self.decoder = Some(FrameDecoder::for_hardware(hardware));
        self.processor.add_output_handler(Box::new(SerialOutput {
            tx,
            framing: FrameDecoder::for_hardware(hardware),
        }));
        log_info!("Serial enabled at {} baud", hardware.baud_rate());

        if hardware.announces_boot() {
            let version = Value::from(self.ctx.version());
            self.processor.notify("boot", version);
        }
    }

    /// Accept commands from the network
    ///
    /// `output` receives every reply and notification; requests arrive
    /// through [`Robot::process_msg`].
    pub fn enable_network(&mut self, output: Box<dyn OutputHandler>) {
        self.ctx.set_mode(ExecutionMode::NonBlocking);
        self.ctx.apply_network();
        self.processor.add_output_handler(output);
        log_info!("Network enabled");
    }

    /// Register an additional reply destination
    pub fn add_output_handler(&mut self, output: Box<dyn OutputHandler>) {
        self.processor.add_output_handler(output);
    }

    /// Dispatch a raw command document
    pub fn process_msg(&mut self, raw: &[u8]) -> bool {
        self.processor.process_msg(&mut self.ctx, raw)
    }

    /// Dispatch a request built in code
    ///
    /// In blocking mode the operation has already finished when the
    /// handler returns, so the completion is delivered straight away.
    pub fn execute(&mut self, request: &Request) -> bool {
        let accepted = self.processor.process_request(&mut self.ctx, request);
        if self.ctx.is_blocking() {
            self.check_ready();
        }
        accepted
    }

    pub fn forward(&mut self, mm: i32) -> bool {
        self.execute(&Request::new("forward", json!(mm)))
    }

    pub fn back(&mut self, mm: i32) -> bool {
        self.execute(&Request::new("back", json!(mm)))
    }

    pub fn left(&mut self, degrees: i32) -> bool {
        self.execute(&Request::new("left", json!(degrees)))
    }

    pub fn right(&mut self, degrees: i32) -> bool {
        self.execute(&Request::new("right", json!(degrees)))
    }

    /// One main-loop iteration
    pub fn poll(&mut self) {
        self.ctx.service();
        self.ctx.calibration_step();
        self.notify_network_changes();
        self.ctx.poll_pin_servos();
        self.poll_serial();
        self.check_ready();
        self.notify_pin_changes();
        self.post_to_server();
    }

    /// Send the deferred reply once the in-flight command has finished
    pub fn check_ready(&mut self) {
        if self.processor.in_process() && self.ctx.ready() {
            let payload = self.ctx.complete();
            self.processor.send_complete(payload);
        }
    }

    fn notify_network_changes(&mut self) {
        if self.ctx.take_network_changed() {
            let config = self.ctx.config_json();
            self.processor.notify("network", config);
        }
        if let Some(scan) = self.ctx.take_scan_results() {
            self.processor.notify("wifiScan", scan);
        }
    }

    fn poll_serial(&mut self) {
        let Some(decoder) = self.decoder.as_mut() else {
            return;
        };

        let mut received = false;
        while let Some(byte) = self.ctx.board_mut().read_byte() {
            received = true;
            let now = self.ctx.now_ms();
            match decoder.push(byte, now) {
                FrameStatus::Message(payload) => {
                    self.processor.process_msg(&mut self.ctx, &payload);
                }
                FrameStatus::Error => log_debug!("Dropped malformed serial frame"),
                FrameStatus::Pending | FrameStatus::HeaderComplete | FrameStatus::Empty => {}
            }
        }

        if !received && decoder.poll_idle(self.ctx.now_ms()) {
            log_debug!("Serial input idle, partial message dropped");
        }
    }

    fn notify_pin_changes(&mut self) {
        let events = self.ctx.events();
        while let Some(event) = events.pop() {
            let channel = format!("pin_{}_status", event.pin);
            self.processor.notify(&channel, json!(u8::from(event.level)));
        }
    }

    fn post_to_server(&mut self) {
        if !self.ctx.post_due(self.last_post_ms) {
            return;
        }
        let update = self.ctx.status_update();
        if let Some(command) = self.ctx.fetch_remote_command() {
            self.processor.process_msg(&mut self.ctx, command.as_bytes());
        }
        self.ctx.post_update(&update);
        self.ctx.refresh_readings();
        self.last_post_ms = self.ctx.now_ms();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::CLIMATE_WINDOW_MS;
    use crate::events::{EventQueue, PinEvent};
    use crate::testing::{MemoryStorage, MockBoard, RecordingOutput};
    use evebrain_hal::ScanEntry;
    use evebrain_protocol::{encode_text_frame, HardwareVersion};
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::vec::Vec;

    /// Serial port capturing written bytes
    #[derive(Clone, Default)]
    struct Wire(Rc<RefCell<Vec<u8>>>);

    impl SerialTx for Wire {
        fn write(&mut self, bytes: &[u8]) {
            self.0.borrow_mut().extend_from_slice(bytes);
        }
    }

    fn events() -> &'static EventQueue<3> {
        Box::leak(Box::new(EventQueue::new([4, 5, 14])))
    }

    fn robot_with(config: RobotConfig) -> (Robot<MockBoard, MemoryStorage>, RecordingOutput) {
        let mut robot = Robot::new(MockBoard::new(), MemoryStorage::new(1024), config, events());
        let output = RecordingOutput::default();
        robot.enable_network(Box::new(output.clone()));
        (robot, output)
    }

    fn robot() -> (Robot<MockBoard, MemoryStorage>, RecordingOutput) {
        robot_with(RobotConfig::default())
    }

    fn poll_until(robot: &mut Robot<MockBoard, MemoryStorage>, done: impl Fn() -> bool) {
        for _ in 0..200_000 {
            if done() {
                return;
            }
            robot.poll();
        }
        panic!("condition never met");
    }

    #[test]
    fn test_forward_completes_through_poll() {
        let (mut robot, out) = robot();
        robot.process_msg(br#"{"cmd":"forward","arg":"20","id":"7"}"#);
        assert!(out.lines().is_empty());

        let o = out.clone();
        poll_until(&mut robot, move || !o.lines().is_empty());
        assert_eq!(out.lines(), [r#"{"status":"ok","id":"7"}"#]);
        assert!(robot.context().motion().is_idle());
    }

    #[test]
    fn test_second_async_command_is_busy_and_motion_survives() {
        let (mut robot, out) = robot();
        robot.process_msg(br#"{"cmd":"forward","arg":"20","id":"a"}"#);
        let before = robot.context().motion().remaining();

        robot.process_msg(br#"{"cmd":"back","arg":"50","id":"b"}"#);
        assert_eq!(robot.context().motion().remaining(), before);
        assert_eq!(
            out.lines(),
            [r#"{"status":"error","id":"b","msg":"Busy: previous command still running"}"#]
        );

        let o = out.clone();
        poll_until(&mut robot, move || o.lines().len() == 2);
        for _ in 0..1000 {
            robot.poll();
        }
        assert_eq!(out.lines()[1], r#"{"status":"ok","id":"a"}"#);
        assert_eq!(out.lines().len(), 2);
    }

    #[test]
    fn test_sync_commands_run_while_busy() {
        let (mut robot, out) = robot();
        robot.process_msg(br#"{"cmd":"forward","arg":"20","id":"a"}"#);
        robot.process_msg(br#"{"cmd":"stop","id":"s"}"#);
        assert_eq!(out.lines(), [r#"{"status":"ok","id":"s"}"#]);

        // Stopped motion is idle, so the forward completes on the next poll
        robot.poll();
        assert_eq!(out.lines()[1], r#"{"status":"ok","id":"a"}"#);
    }

    #[test]
    fn test_temperature_reply_after_window() {
        let (mut robot, out) = robot();
        robot.process_msg(br#"{"cmd":"temperature","id":"t"}"#);
        robot.poll();
        assert!(out.lines().is_empty());

        let o = out.clone();
        poll_until(&mut robot, move || !o.lines().is_empty());
        assert_eq!(out.lines(), [r#"{"status":"ok","id":"t","msg":"21"}"#]);
    }

    #[test]
    fn test_scan_result_keeps_climate_window() {
        let (mut robot, out) = robot();
        let start = robot.context().now_ms();
        robot.process_msg(br#"{"cmd":"temperature","id":"t"}"#);
        {
            let state = robot.context().board().handle();
            let mut scan = heapless::Vec::new();
            scan.push(ScanEntry {
                ssid: heapless::String::try_from("cafe").unwrap(),
                rssi: -60,
                encrypted: false,
            })
            .unwrap();
            state.borrow_mut().scan = Some(scan);
        }

        let o = out.clone();
        poll_until(&mut robot, move || {
            o.lines().iter().any(|l| l.contains(r#""id":"t""#))
        });
        let elapsed = robot.context().now_ms() - start;
        assert!(elapsed >= CLIMATE_WINDOW_MS, "replied after {elapsed} ms");

        let lines = out.lines();
        assert!(lines[0].contains(r#""id":"wifiScan""#));
        assert_eq!(lines[1], r#"{"status":"ok","id":"t","msg":"21"}"#);
    }

    #[test]
    fn test_pin_changes_become_notifications() {
        let (mut robot, out) = robot();
        robot.context().board().state.borrow_mut().levels[4] = true;
        robot.process_msg(br#"{"cmd":"digitalNotify","arg":"4","id":"n"}"#);
        robot.poll();
        assert_eq!(
            out.lines(),
            [
                r#"{"status":"ok","id":"n"}"#,
                r#"{"status":"notify","id":"pin_4_status","msg":1}"#,
            ]
        );

        // Bursts collapse to the latest level
        let events = robot.context().events();
        events.push(PinEvent { pin: 4, level: true });
        events.push(PinEvent { pin: 4, level: false });
        robot.poll();
        assert_eq!(out.lines().len(), 3);
        assert_eq!(
            out.lines()[2],
            r#"{"status":"notify","id":"pin_4_status","msg":0}"#
        );
    }

    #[test]
    fn test_serial_line_mode_round_trip() {
        let mut robot = Robot::new(
            MockBoard::new(),
            MemoryStorage::new(1024),
            RobotConfig::default(),
            events(),
        );
        let wire = Wire::default();
        robot.enable_serial(wire.clone());
        assert_eq!(
            wire.0.borrow().as_slice(),
            b"{\"status\":\"notify\",\"id\":\"boot\",\"msg\":\"3.1.0\"}\r\n"
        );
        wire.0.borrow_mut().clear();

        robot
            .context()
            .board()
            .state
            .borrow_mut()
            .rx
            .extend(b"{\"cmd\":\"ping\",\"id\":\"p\"}\n".iter().copied());
        robot.poll();
        assert_eq!(
            wire.0.borrow().as_slice(),
            b"{\"status\":\"ok\",\"id\":\"p\"}\r\n"
        );
    }

    #[test]
    fn test_serial_legacy_framing() {
        let mut robot = Robot::new(
            MockBoard::new(),
            MemoryStorage::new(1024),
            RobotConfig {
                hardware: HardwareVersion::V1,
                ..Default::default()
            },
            events(),
        );
        let wire = Wire::default();
        robot.enable_serial(wire.clone());
        // No boot banner on the first generation
        assert!(wire.0.borrow().is_empty());

        let request = br#"{"cmd":"version"}"#;
        let frame = encode_text_frame(request);
        robot
            .context()
            .board()
            .state
            .borrow_mut()
            .rx
            .extend(frame.iter().copied());
        robot.poll();
        assert_eq!(
            *wire.0.borrow(),
            encode_text_frame(br#"{"status":"ok","msg":"1.1.0"}"#)
        );
    }

    #[test]
    fn test_unknown_serial_command_gets_no_reply() {
        let mut robot = Robot::new(
            MockBoard::new(),
            MemoryStorage::new(1024),
            RobotConfig::default(),
            events(),
        );
        let wire = Wire::default();
        robot.enable_serial(wire.clone());
        wire.0.borrow_mut().clear();

        robot
            .context()
            .board()
            .state
            .borrow_mut()
            .rx
            .extend(b"{\"cmd\":\"fly\"}\r\n{\"cmd\":\"ping\"}\r\n".iter().copied());
        robot.poll();
        assert_eq!(wire.0.borrow().as_slice(), b"{\"status\":\"ok\"}\r\n");
    }

    #[test]
    fn test_network_and_scan_notifications() {
        let (mut robot, out) = robot();
        {
            let state = robot.context().board().handle();
            let mut s = state.borrow_mut();
            s.network_changed = true;
            let mut scan = heapless::Vec::new();
            scan.push(ScanEntry {
                ssid: heapless::String::try_from("cafe").unwrap(),
                rssi: -70,
                encrypted: true,
            })
            .unwrap();
            s.scan = Some(scan);
        }
        robot.poll();

        let lines = out.lines();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with(r#"{"status":"notify","id":"network","msg":{"#));
        assert_eq!(
            lines[1],
            r#"{"status":"notify","id":"wifiScan","msg":[{"encrypted":true,"rssi":-70,"ssid":"cafe"}]}"#
        );
    }

    #[test]
    fn test_periodic_post_runs_remote_command_first() {
        let (mut robot, out) = robot_with(RobotConfig {
            status_pins: &[4, 5],
            ..Default::default()
        });
        robot.process_msg(
            br#"{"cmd":"postToServer","arg":{"onOff":1,"server":"http://srv","time":0}}"#,
        );
        robot
            .context()
            .board()
            .state
            .borrow_mut()
            .remote_command = Some(r#"[{"cmd":"gpio_on","arg":"5"}]"#.into());

        robot.poll();

        let state = robot.context().board().handle();
        let s = state.borrow();
        assert_eq!(s.fetches.len(), 1);
        assert_eq!(s.posts.len(), 1);
        assert_eq!(s.posts[0].0, "http://srv");
        // The update was built before the remote command ran
        let body: Value = serde_json::from_str(&s.posts[0].1).unwrap();
        assert_eq!(body["type"], "update");
        assert_eq!(body["digital_pins"], "00");
        assert!(s.levels[5]);
        assert_eq!(out.lines().len(), 2);
    }

    #[test]
    fn test_posting_waits_for_interval() {
        let (mut robot, _) = robot();
        robot.process_msg(br#"{"cmd":"postToServer","arg":{"onOff":1,"time":60}}"#);
        for _ in 0..100 {
            robot.poll();
        }
        assert!(robot.context().board().state.borrow().posts.is_empty());
    }

    #[test]
    fn test_blocking_execute_delivers_completion() {
        let mut robot = Robot::new(
            MockBoard::new(),
            MemoryStorage::new(1024),
            RobotConfig::default(),
            events(),
        );
        let out = RecordingOutput::default();
        robot.add_output_handler(Box::new(out.clone()));

        assert!(robot.forward(10));
        assert!(robot.context().motion().is_idle());
        assert_eq!(out.lines(), [r#"{"status":"ok"}"#]);
    }

    #[test]
    fn test_slack_calibration_keeps_oscillating_until_stop() {
        let (mut robot, out) = robot();
        robot.process_msg(br#"{"cmd":"calibrateSlack","arg":"5","id":"c"}"#);
        for _ in 0..5000 {
            robot.poll();
        }
        assert!(robot.context().motion().is_calibrating_slack());
        // Motion never settles while calibrating
        assert!(out.lines().is_empty());

        robot.process_msg(br#"{"cmd":"stop"}"#);
        robot.poll();
        assert!(!robot.context().motion().is_calibrating_slack());
        assert_eq!(out.lines().len(), 2);
        assert_eq!(out.lines()[1], r#"{"status":"ok","id":"c"}"#);
    }
}
