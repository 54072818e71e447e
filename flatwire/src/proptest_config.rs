use proptest::test_runner::Config;

/// Shared proptest settings for graph round-trip tests.
///
/// Under Miri, failure persistence would touch the filesystem and every case is slow, so both
/// are cut back.
pub(crate) fn proptest_cfg() -> Config {
    if cfg!(miri) {
        return Config {
            failure_persistence: None,
            cases: 5,
            ..Config::default()
        };
    }
    Config {
        cases: 128,
        ..Config::default()
    }
}
