//! Listener that renders a turn to the terminal
//!
//! Answer text goes to stdout; tool status and errors go to stderr.

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};

use kubepilot_core::ai::prompt::tool_display_name;
use kubepilot_core::{AiError, Listener};

#[derive(Default)]
pub struct TerminalListener {
    show_reasoning: bool,
    /// Deltas were printed for the current turn
    streamed: AtomicBool,
}

impl TerminalListener {
    pub fn new(show_reasoning: bool) -> Self {
        Self {
            show_reasoning,
            streamed: AtomicBool::new(false),
        }
    }
}

fn print_out(text: &str) {
    let mut stdout = std::io::stdout().lock();
    let _ = stdout.write_all(text.as_bytes());
    let _ = stdout.flush();
}

impl Listener for TerminalListener {
    fn response_start(&self) {
        self.streamed.store(false, Ordering::SeqCst);
    }

    fn response_delta(&self, text: &str) {
        self.streamed.store(true, Ordering::SeqCst);
        print_out(text);
    }

    fn response_complete(&self, text: &str) {
        // Streaming already showed the text; the final copy only fills gaps
        if self.streamed.swap(false, Ordering::SeqCst) {
            print_out("\n");
        } else {
            print_out(&format!("{}\n", text));
        }
    }

    fn response_failed(&self, error: &AiError) {
        if self.streamed.swap(false, Ordering::SeqCst) {
            print_out("\n");
        }
        eprintln!("error: {}", error);
    }

    fn reasoning_delta(&self, text: &str) {
        if self.show_reasoning {
            eprint!("{}", text);
        }
    }

    fn reasoning_complete(&self, _text: &str) {
        if self.show_reasoning {
            eprintln!();
        }
    }

    fn tool_start(&self, tool: &str) {
        eprintln!("  {}", tool_display_name(tool));
    }

    fn tool_complete(&self, tool: &str) {
        tracing::debug!(tool, "Tool finished");
    }
}
