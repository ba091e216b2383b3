//! Backend commands queued from UI to backend worker.

pub enum BackendCommand {
    Connect { server_url: String },
    Disconnect,
}

impl BackendCommand {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Connect { .. } => "connect",
            Self::Disconnect => "disconnect",
        }
    }
}
