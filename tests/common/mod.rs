pub use hdlflow_test_utils::init_tracing;
