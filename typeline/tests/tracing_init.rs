//! Global subscriber installation runs in its own test binary so it cannot
//! leak log output into the library's unit tests.

use typeline::observability::init_tracing;

#[test]
fn test_second_init_fails() {
    assert!(init_tracing(false).is_ok());
    assert!(init_tracing(true).is_err());
}
