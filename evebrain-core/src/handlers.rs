//! Command handlers
//!
//! One thin adapter per command: pull the arguments out of the request,
//! call into the [`Context`] and fill in the reply. Argument errors are
//! reported as validation errors and leave the hardware untouched.

use serde_json::json;

use evebrain_hal::NvStorage;
use evebrain_protocol::{Reply, Request};

use crate::command::{CommandKind, CommandProcessor, Handler};
use crate::config::Board;
use crate::context::Context;
use crate::error::ValidationError;
use crate::motion::{Direction, WheelCommand};
use crate::servo::SERVO_MAX_ANGLE;

/// Register every command the robot understands
pub fn register_commands<B: Board, S: NvStorage>(processor: &mut CommandProcessor<Context<B, S>>) {
    use CommandKind as K;

    let table: &[(&'static str, Handler<Context<B, S>>, CommandKind)] = &[
        ("version", version, K::Sync),
        ("ping", ping, K::Sync),
        ("uptime", uptime, K::Sync),
        ("pause", pause, K::Sync),
        ("resume", resume, K::Sync),
        ("stop", stop, K::Sync),
        ("slackCalibration", slack_calibration, K::Sync),
        ("moveCalibration", move_calibration, K::Sync),
        ("turnCalibration", turn_calibration, K::Sync),
        ("calibrateMove", calibrate_move, K::Sync),
        ("calibrateTurn", calibrate_turn, K::Sync),
        ("analogInput", analog_input, K::Sync),
        ("digitalInput", digital_input, K::Sync),
        ("digitalNotify", digital_notify, K::Sync),
        ("digitalStopNotify", digital_stop_notify, K::Sync),
        ("gpio_on", gpio_on, K::Sync),
        ("gpio_off", gpio_off, K::Sync),
        ("gpio_pwm_16", gpio_pwm_16, K::Sync),
        ("gpio_pwm_5", gpio_pwm_5, K::Sync),
        ("gpio_pwm_10", gpio_pwm_10, K::Sync),
        ("pinServo", pin_servo, K::Sync),
        ("postToServer", post_to_server, K::Sync),
        ("getConfig", get_config, K::Sync),
        ("setConfig", set_config, K::Sync),
        ("resetConfig", reset_config, K::Sync),
        ("freeHeap", free_heap, K::Sync),
        ("startWifiScan", start_wifi_scan, K::Sync),
        ("forward", forward, K::Async),
        ("back", back, K::Async),
        ("left", left, K::Async),
        ("right", right, K::Async),
        ("beep", beep, K::Async),
        ("calibrateSlack", calibrate_slack, K::Async),
        ("readSensors", read_sensors, K::Async),
        ("temperature", temperature, K::Async),
        ("humidity", humidity, K::Async),
        ("distanceSensor", distance_sensor, K::Async),
        ("compassSensor", compass_sensor, K::Async),
        ("servo", servo, K::Async),
        ("servoII", servo_ii, K::Async),
        ("leftMotorF", left_motor_forward, K::Async),
        ("leftMotorB", left_motor_backward, K::Async),
        ("rightMotorF", right_motor_forward, K::Async),
        ("rightMotorB", right_motor_backward, K::Async),
        ("speedMove", speed_move, K::Async),
        ("speedMoveSteps", speed_move_steps, K::Async),
    ];

    for &(name, handler, kind) in table {
        processor.add_command(name, handler, kind);
    }
}

// ---- Argument helpers ---------------------------------------------------

fn respond(reply: &mut Reply, result: Result<(), ValidationError>) {
    if let Err(e) = result {
        log_debug!("Rejected command: {}", e.message());
        reply.set_error(e.message());
    }
}

fn int_arg(req: &Request) -> Result<i32, ValidationError> {
    req.arg_number()
        .map(|n| n as i32)
        .ok_or(ValidationError::InvalidArgument)
}

fn float_arg(req: &Request) -> Result<f32, ValidationError> {
    req.arg_number()
        .map(|n| n as f32)
        .ok_or(ValidationError::InvalidArgument)
}

fn byte_arg(req: &Request) -> Result<u8, ValidationError> {
    int_arg(req).and_then(|n| u8::try_from(n).map_err(|_| ValidationError::InvalidArgument))
}

fn angle_arg(req: &Request) -> Result<u16, ValidationError> {
    int_arg(req).map(clamp_angle)
}

fn clamp_angle(angle: i32) -> u16 {
    angle.clamp(0, i32::from(SERVO_MAX_ANGLE)) as u16
}

/// Run a distance or angle operation
///
/// Direction comes from the command, so the magnitude must not be negative.
fn with_int<B: Board, S: NvStorage>(
    ctx: &mut Context<B, S>,
    req: &Request,
    reply: &mut Reply,
    op: fn(&mut Context<B, S>, i32),
) {
    let magnitude = int_arg(req).and_then(|n| {
        if n < 0 {
            Err(ValidationError::InvalidArgument)
        } else {
            Ok(n)
        }
    });
    respond(reply, magnitude.map(|n| op(ctx, n)));
}

/// Run a GPIO operation on the pin named by the argument
fn with_pin<B: Board, S: NvStorage>(
    ctx: &mut Context<B, S>,
    req: &Request,
    reply: &mut Reply,
    op: fn(&mut Context<B, S>, u8),
) {
    respond(reply, byte_arg(req).map(|pin| op(ctx, pin)));
}

fn wheel(req: &Request, steps_key: &str, speed_key: &str) -> Option<WheelCommand> {
    Some(WheelCommand {
        steps: req.arg_field_number(steps_key)? as i32,
        speed: req.arg_field_number(speed_key)? as f32,
    })
}

// ---- Status -------------------------------------------------------------

fn version<B: Board, S: NvStorage>(ctx: &mut Context<B, S>, _: &Request, reply: &mut Reply) {
    reply.set_msg(ctx.version());
}

fn ping<B: Board, S: NvStorage>(_: &mut Context<B, S>, _: &Request, _: &mut Reply) {}

fn uptime<B: Board, S: NvStorage>(ctx: &mut Context<B, S>, _: &Request, reply: &mut Reply) {
    reply.set_msg(ctx.now_ms());
}

fn free_heap<B: Board, S: NvStorage>(ctx: &mut Context<B, S>, _: &Request, reply: &mut Reply) {
    reply.set_msg(ctx.free_heap());
}

// ---- Motion -------------------------------------------------------------

fn pause<B: Board, S: NvStorage>(ctx: &mut Context<B, S>, _: &Request, reply: &mut Reply) {
    let (left, right) = ctx.pause();
    reply.set_msg(json!({
        "leftMotorRemaining": left,
        "rightMotorRemaining": right,
    }));
}

fn resume<B: Board, S: NvStorage>(ctx: &mut Context<B, S>, _: &Request, _: &mut Reply) {
    ctx.resume();
}

fn stop<B: Board, S: NvStorage>(ctx: &mut Context<B, S>, _: &Request, _: &mut Reply) {
    ctx.stop();
}

fn forward<B: Board, S: NvStorage>(ctx: &mut Context<B, S>, req: &Request, reply: &mut Reply) {
    with_int(ctx, req, reply, Context::forward);
}

fn back<B: Board, S: NvStorage>(ctx: &mut Context<B, S>, req: &Request, reply: &mut Reply) {
    with_int(ctx, req, reply, Context::back);
}

fn left<B: Board, S: NvStorage>(ctx: &mut Context<B, S>, req: &Request, reply: &mut Reply) {
    with_int(ctx, req, reply, Context::left);
}

fn right<B: Board, S: NvStorage>(ctx: &mut Context<B, S>, req: &Request, reply: &mut Reply) {
    with_int(ctx, req, reply, Context::right);
}

fn left_motor_forward<B: Board, S: NvStorage>(
    ctx: &mut Context<B, S>,
    req: &Request,
    reply: &mut Reply,
) {
    with_int(ctx, req, reply, |ctx, mm| ctx.left_motor(Direction::Forward, mm));
}

fn left_motor_backward<B: Board, S: NvStorage>(
    ctx: &mut Context<B, S>,
    req: &Request,
    reply: &mut Reply,
) {
    with_int(ctx, req, reply, |ctx, mm| ctx.left_motor(Direction::Backward, mm));
}

fn right_motor_forward<B: Board, S: NvStorage>(
    ctx: &mut Context<B, S>,
    req: &Request,
    reply: &mut Reply,
) {
    with_int(ctx, req, reply, |ctx, mm| ctx.right_motor(Direction::Forward, mm));
}

fn right_motor_backward<B: Board, S: NvStorage>(
    ctx: &mut Context<B, S>,
    req: &Request,
    reply: &mut Reply,
) {
    with_int(ctx, req, reply, |ctx, mm| ctx.right_motor(Direction::Backward, mm));
}

fn speed_move<B: Board, S: NvStorage>(ctx: &mut Context<B, S>, req: &Request, reply: &mut Reply) {
    let wheels = wheel(req, "leftDistance", "leftSpeed")
        .zip(wheel(req, "rightDistance", "rightSpeed"));
    let result = match wheels {
        Some((left, right)) => ctx.speed_move(left, right),
        None => Err(ValidationError::MissingSpeedMoveArgs),
    };
    respond(reply, result);
}

fn speed_move_steps<B: Board, S: NvStorage>(
    ctx: &mut Context<B, S>,
    req: &Request,
    reply: &mut Reply,
) {
    let wheels =
        wheel(req, "leftSteps", "leftSpeed").zip(wheel(req, "rightSteps", "rightSpeed"));
    let result = match wheels {
        Some((left, right)) => ctx.speed_move_steps(left, right),
        None => Err(ValidationError::MissingSpeedMoveStepsArgs),
    };
    respond(reply, result);
}

// ---- Calibration --------------------------------------------------------

fn slack_calibration<B: Board, S: NvStorage>(
    ctx: &mut Context<B, S>,
    _: &Request,
    reply: &mut Reply,
) {
    reply.set_msg(ctx.settings().slack_calibration);
}

fn move_calibration<B: Board, S: NvStorage>(
    ctx: &mut Context<B, S>,
    _: &Request,
    reply: &mut Reply,
) {
    reply.set_msg(ctx.settings().move_calibration);
}

fn turn_calibration<B: Board, S: NvStorage>(
    ctx: &mut Context<B, S>,
    _: &Request,
    reply: &mut Reply,
) {
    reply.set_msg(ctx.settings().turn_calibration);
}

fn calibrate_move<B: Board, S: NvStorage>(
    ctx: &mut Context<B, S>,
    req: &Request,
    reply: &mut Reply,
) {
    respond(reply, float_arg(req).and_then(|f| ctx.calibrate_move(f)));
}

fn calibrate_turn<B: Board, S: NvStorage>(
    ctx: &mut Context<B, S>,
    req: &Request,
    reply: &mut Reply,
) {
    respond(reply, float_arg(req).and_then(|f| ctx.calibrate_turn(f)));
}

fn calibrate_slack<B: Board, S: NvStorage>(
    ctx: &mut Context<B, S>,
    req: &Request,
    reply: &mut Reply,
) {
    let result = int_arg(req)
        .and_then(|n| u16::try_from(n).map_err(|_| ValidationError::InvalidArgument))
        .and_then(|n| ctx.calibrate_slack(n));
    respond(reply, result);
}

// ---- Sensors ------------------------------------------------------------

fn analog_input<B: Board, S: NvStorage>(ctx: &mut Context<B, S>, _: &Request, reply: &mut Reply) {
    reply.set_msg(ctx.analog_input());
}

fn read_sensors<B: Board, S: NvStorage>(ctx: &mut Context<B, S>, req: &Request, _: &mut Reply) {
    // A missing channel reads as an unknown one
    let channel = req.arg_number().map(|n| n as i32).unwrap_or(-1);
    ctx.read_sensors(channel);
}

fn temperature<B: Board, S: NvStorage>(ctx: &mut Context<B, S>, _: &Request, _: &mut Reply) {
    ctx.temperature();
}

fn humidity<B: Board, S: NvStorage>(ctx: &mut Context<B, S>, _: &Request, _: &mut Reply) {
    ctx.humidity();
}

fn distance_sensor<B: Board, S: NvStorage>(ctx: &mut Context<B, S>, _: &Request, _: &mut Reply) {
    ctx.distance();
}

fn compass_sensor<B: Board, S: NvStorage>(ctx: &mut Context<B, S>, _: &Request, _: &mut Reply) {
    ctx.compass();
}

// ---- Actuators ----------------------------------------------------------

/// `"semitone,durationMs"`
fn parse_beep(arg: &str) -> Option<(i32, u64)> {
    let mut parts = arg.split(',');
    let semitone = parts.next()?.trim().parse().ok()?;
    let duration = match parts.next() {
        Some(d) => d.trim().parse::<i64>().ok()?.max(0) as u64,
        None => 0,
    };
    Some((semitone, duration))
}

fn beep<B: Board, S: NvStorage>(ctx: &mut Context<B, S>, req: &Request, reply: &mut Reply) {
    match req.arg_str().and_then(parse_beep) {
        Some((semitone, duration_ms)) => ctx.beep(semitone, duration_ms),
        None => respond(reply, Err(ValidationError::InvalidArgument)),
    }
}

fn servo<B: Board, S: NvStorage>(ctx: &mut Context<B, S>, req: &Request, reply: &mut Reply) {
    respond(reply, angle_arg(req).map(|a| ctx.servo_move(a)));
}

fn servo_ii<B: Board, S: NvStorage>(ctx: &mut Context<B, S>, req: &Request, reply: &mut Reply) {
    respond(reply, angle_arg(req).map(|a| ctx.pwm_servo_move(a)));
}

fn pin_servo<B: Board, S: NvStorage>(ctx: &mut Context<B, S>, req: &Request, reply: &mut Reply) {
    let result = match (req.arg_field_number("pin"), req.arg_field_number("angle")) {
        (Some(pin), Some(angle)) => u8::try_from(pin as i64)
            .map_err(|_| ValidationError::InvalidServoPin)
            .and_then(|pin| ctx.pin_servo(pin, clamp_angle(angle as i32))),
        _ => Err(ValidationError::MissingServoArgs),
    };
    respond(reply, result);
}

// ---- GPIO ---------------------------------------------------------------

fn gpio_on<B: Board, S: NvStorage>(ctx: &mut Context<B, S>, req: &Request, reply: &mut Reply) {
    with_pin(ctx, req, reply, |ctx, pin| ctx.gpio_write(pin, true));
}

fn gpio_off<B: Board, S: NvStorage>(ctx: &mut Context<B, S>, req: &Request, reply: &mut Reply) {
    with_pin(ctx, req, reply, |ctx, pin| ctx.gpio_write(pin, false));
}

fn gpio_pwm<B: Board, S: NvStorage>(
    ctx: &mut Context<B, S>,
    pin: u8,
    req: &Request,
    reply: &mut Reply,
) {
    respond(reply, byte_arg(req).map(|duty| ctx.gpio_pwm(pin, duty)));
}

fn gpio_pwm_16<B: Board, S: NvStorage>(ctx: &mut Context<B, S>, req: &Request, reply: &mut Reply) {
    gpio_pwm(ctx, 16, req, reply);
}

fn gpio_pwm_5<B: Board, S: NvStorage>(ctx: &mut Context<B, S>, req: &Request, reply: &mut Reply) {
    gpio_pwm(ctx, 5, req, reply);
}

fn gpio_pwm_10<B: Board, S: NvStorage>(ctx: &mut Context<B, S>, req: &Request, reply: &mut Reply) {
    gpio_pwm(ctx, 10, req, reply);
}

fn digital_input<B: Board, S: NvStorage>(
    ctx: &mut Context<B, S>,
    req: &Request,
    reply: &mut Reply,
) {
    match byte_arg(req) {
        Ok(pin) => reply.set_msg(u8::from(ctx.digital_input(pin))),
        Err(e) => respond(reply, Err(e)),
    }
}

fn digital_notify<B: Board, S: NvStorage>(
    ctx: &mut Context<B, S>,
    req: &Request,
    reply: &mut Reply,
) {
    let result = byte_arg(req)
        .map_err(|_| ValidationError::NotifyUnsupported)
        .and_then(|pin| ctx.digital_notify(pin));
    respond(reply, result);
}

fn digital_stop_notify<B: Board, S: NvStorage>(
    ctx: &mut Context<B, S>,
    req: &Request,
    reply: &mut Reply,
) {
    let result = byte_arg(req)
        .map_err(|_| ValidationError::StopNotifyUnsupported)
        .and_then(|pin| ctx.digital_stop_notify(pin));
    respond(reply, result);
}

// ---- Configuration ------------------------------------------------------

fn get_config<B: Board, S: NvStorage>(ctx: &mut Context<B, S>, _: &Request, reply: &mut Reply) {
    reply.set_msg(ctx.config_json());
}

fn set_config<B: Board, S: NvStorage>(ctx: &mut Context<B, S>, req: &Request, reply: &mut Reply) {
    respond(reply, ctx.set_config(&req.arg));
}

fn reset_config<B: Board, S: NvStorage>(ctx: &mut Context<B, S>, _: &Request, _: &mut Reply) {
    ctx.reset_config();
}

fn post_to_server<B: Board, S: NvStorage>(
    ctx: &mut Context<B, S>,
    req: &Request,
    reply: &mut Reply,
) {
    respond(reply, ctx.set_posting(&req.arg));
}

fn start_wifi_scan<B: Board, S: NvStorage>(ctx: &mut Context<B, S>, _: &Request, _: &mut Reply) {
    ctx.start_wifi_scan();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RobotConfig;
    use crate::events::EventQueue;
    use crate::testing::{MemoryStorage, MockBoard, RecordingOutput};

    type TestContext = Context<MockBoard, MemoryStorage>;

    fn setup() -> (CommandProcessor<TestContext>, TestContext, RecordingOutput) {
        let events: &'static EventQueue<2> = Box::leak(Box::new(EventQueue::new([4, 5])));
        let ctx = Context::new(
            MockBoard::new(),
            MemoryStorage::new(1024),
            RobotConfig::default(),
            events,
        );
        let output = RecordingOutput::default();
        let mut processor = CommandProcessor::new();
        register_commands(&mut processor);
        processor.add_output_handler(Box::new(output.clone()));
        (processor, ctx, output)
    }

    /// Dispatch and, for async commands, deliver the completion
    fn run(p: &mut CommandProcessor<TestContext>, ctx: &mut TestContext, msg: &str) {
        assert!(p.process_msg(ctx, msg.as_bytes()), "rejected: {msg}");
        if p.in_process() {
            let payload = ctx.complete();
            p.send_complete(payload);
        }
    }

    #[test]
    fn test_command_table_kinds() {
        let (p, _, _) = setup();
        for name in ["version", "pause", "getConfig", "startWifiScan", "pinServo"] {
            assert_eq!(p.command_kind(name), Some(CommandKind::Sync), "{name}");
        }
        for name in ["forward", "beep", "servoII", "speedMoveSteps", "readSensors"] {
            assert_eq!(p.command_kind(name), Some(CommandKind::Async), "{name}");
        }
    }

    #[test]
    fn test_version_and_calibration_getters() {
        let (mut p, mut ctx, out) = setup();
        run(&mut p, &mut ctx, r#"{"cmd":"version","id":"1"}"#);
        run(&mut p, &mut ctx, r#"{"cmd":"slackCalibration","id":"2"}"#);
        run(&mut p, &mut ctx, r#"{"cmd":"moveCalibration","id":"3"}"#);
        assert_eq!(
            out.lines(),
            [
                r#"{"status":"ok","id":"1","msg":"3.1.0"}"#,
                r#"{"status":"ok","id":"2","msg":14}"#,
                r#"{"status":"ok","id":"3","msg":1.0}"#,
            ]
        );
    }

    #[test]
    fn test_numeric_argument_errors() {
        let (mut p, mut ctx, out) = setup();
        run(&mut p, &mut ctx, r#"{"cmd":"forward","arg":"far","id":"f"}"#);
        assert!(!p.in_process());
        assert_eq!(
            out.lines(),
            [r#"{"status":"error","id":"f","msg":"Invalid argument"}"#]
        );
        assert!(ctx.motion().is_idle());
    }

    #[test]
    fn test_negative_distance_and_angle_rejected() {
        let (mut p, mut ctx, out) = setup();
        run(&mut p, &mut ctx, r#"{"cmd":"forward","arg":"-50","id":"f"}"#);
        run(&mut p, &mut ctx, r#"{"cmd":"left","arg":-90,"id":"l"}"#);
        run(&mut p, &mut ctx, r#"{"cmd":"rightMotorB","arg":"-5","id":"r"}"#);
        assert!(!p.in_process());
        assert_eq!(
            out.lines(),
            [
                r#"{"status":"error","id":"f","msg":"Invalid argument"}"#,
                r#"{"status":"error","id":"l","msg":"Invalid argument"}"#,
                r#"{"status":"error","id":"r","msg":"Invalid argument"}"#,
            ]
        );
        assert!(ctx.motion().is_idle());
    }

    #[test]
    fn test_speed_move_validation() {
        let (mut p, mut ctx, out) = setup();
        run(
            &mut p,
            &mut ctx,
            r#"{"cmd":"speedMove","arg":{"leftSpeed":0.5,"rightSpeed":0.5,"leftDistance":10}}"#,
        );
        run(
            &mut p,
            &mut ctx,
            r#"{"cmd":"speedMove","arg":{"leftSpeed":1.5,"rightSpeed":0.5,"leftDistance":10,"rightDistance":10}}"#,
        );
        run(
            &mut p,
            &mut ctx,
            r#"{"cmd":"speedMoveSteps","arg":{"leftSpeed":0.5,"rightSpeed":0,"leftSteps":10,"rightSteps":10}}"#,
        );
        run(
            &mut p,
            &mut ctx,
            r#"{"cmd":"speedMoveSteps","arg":{"leftSpeed":0.5}}"#,
        );
        assert_eq!(
            out.lines(),
            [
                r#"{"status":"error","msg":"Missing leftSpeed, rightSpeed, leftDistance or rightDistance"}"#,
                r#"{"status":"error","msg":"Left speed is out of range, must be within (0,1]"}"#,
                r#"{"status":"error","msg":"Right speed is out of range, cannot be 0 when moving non-zero distance."}"#,
                r#"{"status":"error","msg":"Missing leftSpeed, rightSpeed, leftSteps or rightSteps"}"#,
            ]
        );
        assert!(ctx.motion().is_idle());
        assert_eq!(ctx.motion().left().last_direction(), None);
    }

    #[test]
    fn test_speed_move_steps_runs() {
        let (mut p, mut ctx, out) = setup();
        run(
            &mut p,
            &mut ctx,
            r#"{"cmd":"speedMoveSteps","arg":{"leftSpeed":1,"rightSpeed":"0.5","leftSteps":-20,"rightSteps":20},"id":"m"}"#,
        );
        assert_eq!(out.lines(), [r#"{"status":"ok","id":"m"}"#]);
        assert_eq!(ctx.motion().left().last_direction(), Some(Direction::Backward));
        assert_eq!(ctx.motion().right().last_direction(), Some(Direction::Forward));
    }

    #[test]
    fn test_pin_servo_errors() {
        let (mut p, mut ctx, out) = setup();
        run(&mut p, &mut ctx, r#"{"cmd":"pinServo","arg":{"pin":"4"}}"#);
        run(&mut p, &mut ctx, r#"{"cmd":"pinServo","arg":{"pin":40,"angle":10}}"#);
        run(&mut p, &mut ctx, r#"{"cmd":"pinServo","arg":{"pin":"12","angle":"200"}}"#);
        assert_eq!(
            out.lines(),
            [
                r#"{"status":"error","msg":"Missing pin or angle argument for genericServo command"}"#,
                r#"{"status":"error","msg":"Pin not valid for generic servo."}"#,
                r#"{"status":"ok"}"#,
            ]
        );
        assert_eq!(ctx.board().state.borrow().pin_servos, [(12, 180)]);
    }

    #[test]
    fn test_beep_argument_forms() {
        assert_eq!(parse_beep("46,250"), Some((46, 250)));
        assert_eq!(parse_beep(" 3 , 10 "), Some((3, 10)));
        assert_eq!(parse_beep("12"), Some((12, 0)));
        assert_eq!(parse_beep("x,10"), None);
    }

    #[test]
    fn test_beep_completes_with_tone_off() {
        let (mut p, mut ctx, out) = setup();
        run(&mut p, &mut ctx, r#"{"cmd":"beep","arg":"46,10","id":"b"}"#);
        assert_eq!(out.lines(), [r#"{"status":"ok","id":"b"}"#]);
        assert_eq!(ctx.board().state.borrow().tone, None);
    }

    #[test]
    fn test_sensor_replies() {
        let (mut p, mut ctx, out) = setup();
        ctx.board().state.borrow_mut().adc = [1, 2, 3, 4];
        run(&mut p, &mut ctx, r#"{"cmd":"readSensors","arg":"3"}"#);
        run(&mut p, &mut ctx, r#"{"cmd":"humidity"}"#);
        assert_eq!(
            out.lines(),
            [r#"{"status":"ok","msg":"4"}"#, r#"{"status":"ok","msg":"40"}"#]
        );
    }

    #[test]
    fn test_pause_reports_remaining() {
        let (mut p, mut ctx, out) = setup();
        ctx.set_mode(crate::scheduler::ExecutionMode::NonBlocking);
        p.process_msg(&mut ctx, br#"{"cmd":"leftMotorF","arg":"10"}"#);
        let (left, right) = ctx.motion().remaining();
        assert!(left > 0);
        assert_eq!(right, 0);
        p.process_msg(&mut ctx, br#"{"cmd":"pause"}"#);
        assert_eq!(
            out.lines(),
            [format!(
                r#"{{"status":"ok","msg":{{"leftMotorRemaining":{left},"rightMotorRemaining":0}}}}"#
            )]
        );
        assert!(ctx.motion().left().is_paused());
    }

    #[test]
    fn test_gpio_commands() {
        let (mut p, mut ctx, out) = setup();
        run(&mut p, &mut ctx, r#"{"cmd":"gpio_on","arg":"13"}"#);
        assert!(ctx.board().state.borrow().levels[13]);
        run(&mut p, &mut ctx, r#"{"cmd":"gpio_pwm_5","arg":"128"}"#);
        assert_eq!(ctx.board().state.borrow().pwm, [(5, 128)]);
        run(&mut p, &mut ctx, r#"{"cmd":"gpio_pwm_5","arg":"300"}"#);
        run(&mut p, &mut ctx, r#"{"cmd":"digitalInput","arg":"13"}"#);
        assert_eq!(
            out.lines()[2..],
            [
                r#"{"status":"error","msg":"Invalid argument"}"#,
                r#"{"status":"ok","msg":0}"#,
            ]
        );
    }

    #[test]
    fn test_digital_notify_errors() {
        let (mut p, mut ctx, out) = setup();
        run(&mut p, &mut ctx, r#"{"cmd":"digitalNotify","arg":"7"}"#);
        run(&mut p, &mut ctx, r#"{"cmd":"digitalStopNotify","arg":"7"}"#);
        assert_eq!(
            out.lines(),
            [
                r#"{"status":"error","msg":"Cannot be notified about changes to that pin"}"#,
                r#"{"status":"error","msg":"Cannot stop being notified about changes to that pin since cannot be notified about changes to that pin"}"#,
            ]
        );
    }

    #[test]
    fn test_post_to_server_saves_settings() {
        let (mut p, mut ctx, _) = setup();
        let commits = ctx.storage().commits();
        run(
            &mut p,
            &mut ctx,
            r#"{"cmd":"postToServer","arg":{"onOff":"1","server":"http://h","time":"5","toggleDistance":"1"}}"#,
        );
        let s = ctx.settings();
        assert_eq!(s.post_mode, 1);
        assert_eq!(s.host_server.as_str(), "http://h");
        assert_eq!(s.server_request_time_s, 5);
        assert!(s.post_distance);
        assert!(!s.post_temp_humidity);
        assert_eq!(ctx.storage().commits(), commits + 1);
    }
}
