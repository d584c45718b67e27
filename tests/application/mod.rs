pub mod support;

mod processors_test;
mod usage_recorder_test;
