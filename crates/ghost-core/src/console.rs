//! Human Boundary
//!
//! The engine and the gateway talk to the human only through
//! [`HumanConsole`]. The binary provides a terminal implementation; tests
//! provide scripted ones.

use async_trait::async_trait;

use crate::error::Result;

/// Something to show the human
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Notice {
    /// Assistant text
    Assistant(String),
    /// A tool call waiting for confirmation; `arguments` is pretty JSON
    ToolCallPending { name: String, arguments: String },
    /// Display summary of a tool result
    ToolOutput(String),
    Info(String),
}

/// Line-oriented prompt/response interaction with the human
#[async_trait]
pub trait HumanConsole: Send + Sync {
    /// Display a notice
    fn show(&self, notice: Notice);

    /// Print `prompt` and block until one line arrives, trimmed
    async fn read_line(&self, prompt: &str) -> Result<String>;

    /// Start (`Some(label)`) or stop (`None`) a progress indicator
    fn busy(&self, _label: Option<&str>) {}
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Console replaying canned lines and recording notices
    #[derive(Default)]
    pub struct ScriptedConsole {
        lines: Mutex<VecDeque<String>>,
        pub shown: Mutex<Vec<Notice>>,
        pub prompts: Mutex<Vec<String>>,
    }

    impl ScriptedConsole {
        pub fn new(lines: &[&str]) -> Self {
            Self {
                lines: Mutex::new(lines.iter().map(|l| (*l).to_string()).collect()),
                ..Default::default()
            }
        }

        pub fn notices(&self) -> Vec<Notice> {
            self.shown.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl HumanConsole for ScriptedConsole {
        fn show(&self, notice: Notice) {
            self.shown.lock().unwrap().push(notice);
        }

        async fn read_line(&self, prompt: &str) -> Result<String> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            self.lines
                .lock()
                .unwrap()
                .pop_front()
                .map(|l| l.trim().to_string())
                .ok_or_else(|| crate::GhostError::HumanInput("script exhausted".into()))
        }
    }
}
