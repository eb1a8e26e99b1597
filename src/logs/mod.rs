//! Structured-ish logging setup. Grounded on the teacher's
//! `logs/logger.rs`: a custom `env_logger` formatter rather than the
//! library's default line format, respecting `NO_COLOR`.

use std::io::Write;

/// Installs the process-wide logger. Call once, before anything else logs.
pub fn configure_logger() {
    let mut builder = env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("info"),
    );

    let color = std::env::var_os("NO_COLOR").is_none();

    builder.format(move |buf, record| {
        let level = record.level();
        let level_str = if color {
            match level {
                log::Level::Error => "\x1b[31mERROR\x1b[0m".to_string(),
                log::Level::Warn => "\x1b[33mWARN \x1b[0m".to_string(),
                log::Level::Info => "\x1b[32mINFO \x1b[0m".to_string(),
                log::Level::Debug => "\x1b[36mDEBUG\x1b[0m".to_string(),
                log::Level::Trace => "\x1b[90mTRACE\x1b[0m".to_string(),
            }
        } else {
            format!("{level:<5}")
        };

        writeln!(
            buf,
            "{} {} {}: {}",
            chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.3f"),
            level_str,
            record.target(),
            record.args()
        )
    });

    builder.init();
}
