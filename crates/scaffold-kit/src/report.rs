//! Severity-tagged progress output
//!
//! Core operations never print directly; they report through this trait so the
//! terminal front-end (cliclack, behind the `tui` feature) and tests can plug in.

use std::io;

pub trait Reporter {
    fn info(&self, message: &str) -> io::Result<()>;
    fn success(&self, message: &str) -> io::Result<()>;
    fn warning(&self, message: &str) -> io::Result<()>;
    fn error(&self, message: &str) -> io::Result<()>;
    fn step(&self, message: &str) -> io::Result<()>;
}
