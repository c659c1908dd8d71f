//! The per-view command channel.
//!
//! Each view instance owns one named bidirectional channel on the host's
//! method-call transport, identified by the fixed view-type string suffixed
//! with the instance's numeric id. Inbound calls currently carry no
//! application-specific commands (an extension point); unrecognized methods
//! are always answered, never thrown. Outbound, the channel carries transient
//! status notifications (content-load failures and the like).

use std::rc::Rc;

use serde_json::Value;

/// Fixed view-type string under which the view factory is registered.
pub const VIEW_TYPE: &str = "glowplug.platform_view";

/// Channel name for one view instance.
pub fn channel_name(view_id: i32) -> String {
    format!("{VIEW_TYPE}_{view_id}")
}

/// One inbound method call from the host application.
#[derive(Clone, Debug)]
pub struct MethodCall {
    pub method: String,
    pub arguments: Value,
}

/// Reply to an inbound method call.
#[derive(Clone, Debug, PartialEq)]
pub enum MethodResult {
    Success(Value),
    /// The method is not recognized. A reply, not an error: the channel
    /// contract requires answering every call.
    NotImplemented,
}

/// Receiver side of the command channel.
pub trait MethodHandler {
    fn on_method_call(&self, call: MethodCall) -> MethodResult;
}

/// The host's method-call transport, opaque to this crate.
pub trait MessageTransport {
    /// Installs or removes (`None`) the handler for `channel`.
    fn set_handler(&self, channel: &str, handler: Option<Rc<dyn MethodHandler>>);
    /// Invokes a method on the host side of `channel`.
    fn invoke(&self, channel: &str, method: &str, arguments: Value);
}

/// A registered per-view channel. Unregistered exactly once, on dispose.
pub struct CommandChannel {
    name: String,
    transport: Rc<dyn MessageTransport>,
}

impl CommandChannel {
    pub fn register(
        transport: Rc<dyn MessageTransport>,
        view_id: i32,
        handler: Rc<dyn MethodHandler>,
    ) -> Self {
        let name = channel_name(view_id);
        transport.set_handler(&name, Some(handler));
        Self { name, transport }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Sends a transient, user-visible status notification to the host.
    pub fn notify_status(&self, message: &str) {
        log::debug!("status on {}: {message}", self.name);
        self.transport
            .invoke(&self.name, "status", serde_json::json!({ "message": message }));
    }

    pub fn unregister(&self) {
        self.transport.set_handler(&self.name, None);
    }
}
