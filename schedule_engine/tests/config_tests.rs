//! Configuration loading through files and the environment.

mod support;

use std::io::Write;

use schedule_engine::config::CONFIG_ENV_VAR;
use schedule_engine::models::Instruction;
use schedule_engine::{AlignmentKind, Composer, EngineConfig, ErrorKind, ScheduleBlock};
use support::{d, delay, with_scoped_env};
use tempfile::NamedTempFile;

fn config_file(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

#[test]
fn test_from_file() {
    let file = config_file(
        r#"
[naming]
schedule_prefix = "prog"

[blocks]
default_alignment = "right"
"#,
    );

    let config = EngineConfig::from_file(file.path()).unwrap();
    assert_eq!(config.naming.schedule_prefix, "prog");
    assert_eq!(config.naming.block_prefix, "block");
    assert_eq!(config.default_alignment().unwrap(), AlignmentKind::Right);
}

#[test]
fn test_invalid_alignment_is_rejected() {
    let file = config_file("[blocks]\ndefault_alignment = \"diagonal\"\n");
    let err = EngineConfig::from_file(file.path()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Config);
    assert!(err.to_string().contains("diagonal"));
}

#[test]
fn test_environment_variable_selects_file() {
    let file = config_file(
        r#"
[naming]
schedule_prefix = "env"
block_prefix = "ctx"

[blocks]
default_alignment = "sequential"

[display]
max_instructions = 1
"#,
    );
    let path = file.path().to_string_lossy().into_owned();

    with_scoped_env(&[(CONFIG_ENV_VAR, Some(&path))], || {
        let composer = Composer::from_default_config().unwrap();
        assert_eq!(composer.config().display.max_instructions, 1);

        let sched = composer.schedule::<Instruction>();
        assert_eq!(sched.name(), "env0");

        let block: ScheduleBlock = composer
            .block()
            .append(delay(10, d(0)))
            .append(delay(10, d(1)));
        assert_eq!(block.name(), "ctx0");
        assert_eq!(block.alignment(), &AlignmentKind::Sequential);
        assert_eq!(block.duration().unwrap(), 20);
        assert_eq!(
            composer.render_block(&block),
            "ScheduleBlock(Delay(10, d0), ..., name=\"ctx0\", transform=AlignSequential())"
        );
    });
}

#[test]
fn test_missing_file_falls_back_to_defaults() {
    with_scoped_env(
        &[(CONFIG_ENV_VAR, Some("/nonexistent/schedule_engine.toml"))],
        || {
            assert_eq!(
                EngineConfig::from_default_location().unwrap_err().kind(),
                ErrorKind::Config
            );
            assert_eq!(EngineConfig::load_or_default(), EngineConfig::default());
        },
    );
}
