//! Small domains used by the command line and the tests.

pub mod counter;
