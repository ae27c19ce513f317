//! Command registry and reply correlation
//!
//! Commands are registered once at startup as plain function pointers
//! over a context type. Synchronous commands reply immediately.
//! Asynchronous commands start an operation and their reply is deferred
//! until [`CommandProcessor::send_complete`]; only one may be in flight.

use alloc::boxed::Box;
use alloc::string::String;
use alloc::vec::Vec;
use serde_json::Value;

use evebrain_protocol::{Reply, Request};

/// Message for an asynchronous command arriving while another is running
pub const BUSY_MESSAGE: &str = "Busy: previous command still running";

/// Command handler: reads the request, fills the reply
pub type Handler<C> = fn(&mut C, &Request, &mut Reply);

/// When a command's reply is sent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CommandKind {
    /// Reply as soon as the handler returns
    Sync,
    /// Reply when the started operation completes
    Async,
}

struct Command<C> {
    name: &'static str,
    handler: Handler<C>,
    kind: CommandKind,
}

/// Destination for replies and notifications
pub trait OutputHandler {
    fn send(&mut self, reply: &Reply);
}

/// The asynchronous command awaiting completion
#[derive(Debug, Clone, PartialEq, Eq)]
struct InFlight {
    id: Option<String>,
}

/// Parses requests, dispatches them and routes replies
pub struct CommandProcessor<C> {
    commands: Vec<Command<C>>,
    outputs: Vec<Box<dyn OutputHandler>>,
    in_flight: Option<InFlight>,
}

impl<C> Default for CommandProcessor<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> CommandProcessor<C> {
    pub fn new() -> Self {
        Self {
            commands: Vec::new(),
            outputs: Vec::new(),
            in_flight: None,
        }
    }

    /// Register a command; a later registration of the same name wins
    pub fn add_command(&mut self, name: &'static str, handler: Handler<C>, kind: CommandKind) {
        self.commands.retain(|c| c.name != name);
        self.commands.push(Command {
            name,
            handler,
            kind,
        });
    }

    pub fn add_output_handler(&mut self, output: Box<dyn OutputHandler>) {
        self.outputs.push(output);
    }

    pub fn command_kind(&self, name: &str) -> Option<CommandKind> {
        self.commands.iter().find(|c| c.name == name).map(|c| c.kind)
    }

    /// An asynchronous command is awaiting completion
    pub fn in_process(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Parse and dispatch a raw message
    ///
    /// Returns false when the message is malformed or names an unknown
    /// command; no reply is sent in that case.
    pub fn process_msg(&mut self, ctx: &mut C, raw: &[u8]) -> bool {
        match Request::parse(raw) {
            Ok(request) => self.process_request(ctx, &request),
            Err(e) => {
                log_debug!("Dropping unparseable message: {:?}", e);
                false
            }
        }
    }

    /// Dispatch an already parsed request
    pub fn process_request(&mut self, ctx: &mut C, request: &Request) -> bool {
        let Some(command) = self.commands.iter().find(|c| c.name == request.cmd) else {
            log_debug!("Unknown command");
            return false;
        };
        let (handler, kind) = (command.handler, command.kind);

        let mut reply = Reply::ok();
        reply.id = request.id.clone();

        if kind == CommandKind::Async && self.in_flight.is_some() {
            reply.set_error(BUSY_MESSAGE);
            self.emit(&reply);
            return true;
        }

        handler(ctx, request, &mut reply);

        if kind == CommandKind::Async && !reply.is_error() {
            self.in_flight = Some(InFlight {
                id: request.id.clone(),
            });
        } else {
            self.emit(&reply);
        }
        true
    }

    /// Send the deferred reply of the in-flight command
    ///
    /// Does nothing when no command is in flight.
    pub fn send_complete(&mut self, msg: Option<Value>) {
        let Some(in_flight) = self.in_flight.take() else {
            return;
        };
        let reply = Reply {
            status: evebrain_protocol::ReplyStatus::Ok,
            id: in_flight.id,
            msg,
        };
        self.emit(&reply);
    }

    /// Send a notification on `channel`
    pub fn notify(&mut self, channel: &str, msg: Value) {
        let reply = Reply::notify(channel, msg);
        self.emit(&reply);
    }

    fn emit(&mut self, reply: &Reply) {
        for output in self.outputs.iter_mut() {
            output.send(reply);
        }
    }
}
