//! Shared utilities for integration testing.

use std::sync::Mutex;

use offramp::Logger;

/// Logger that records every message for later assertions.
#[derive(Default)]
pub struct RecordingLogger {
    messages: Mutex<Vec<String>>,
}

impl RecordingLogger {
    #[allow(dead_code)]
    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }
}

impl Logger for RecordingLogger {
    fn info(&self, message: &str) {
        self.messages.lock().unwrap().push(format!("INFO {message}"));
    }

    fn error(&self, message: &str) {
        self.messages
            .lock()
            .unwrap()
            .push(format!("ERROR {message}"));
    }
}
