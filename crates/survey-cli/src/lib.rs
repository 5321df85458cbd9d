//! Library components of the survey CLI.

pub mod logging;
