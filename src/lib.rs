//! Backend for the page-copilot browser extension.
//!
//! The extension sends a command, an intent, and the extracted content forest
//! of the current page; this server builds a prompt, calls Gemini (declaring
//! the enabled UI tools when the user wants an action), and maps any tool
//! calls in the reply back to actions the extension can execute.

pub mod config;
pub mod content;
pub mod dispatch;
pub mod gemini;
pub mod server;
pub mod tools;
