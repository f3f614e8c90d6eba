/// What happened. The payload, if any, is fetched from the device later.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    InterruptXhci,
}

/// Unit of work handed from interrupt context to the main loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Message {
    pub kind: MessageKind,
}

impl Message {
    pub const fn new(kind: MessageKind) -> Self {
        Self { kind }
    }
}
