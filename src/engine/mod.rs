//! Core engine: universe → candles → score → rank → report → dispatch.

pub mod detector;
pub mod dispatcher;
pub mod report;
pub mod scanner;
pub mod scheduler;
pub mod universe;
