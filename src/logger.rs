use log::{LevelFilter, Log, Metadata, Record};

/// The environment variable that overrides the default log level.
///
/// Levels above the crate's compile-time ceiling (`log`'s `max_level_*`
/// feature) are lowered to that ceiling.
pub const ENV_VAR: &str = "CLICKBOARDS_LOG";

pub fn init() -> Result<(), log::SetLoggerError> {
    static LOGGER: Logger = Logger;

    log::set_logger(&LOGGER)?;
    log::set_max_level(max_level(std::env::var(ENV_VAR).ok().as_deref()));
    Ok(())
}

fn max_level(env: Option<&str>) -> LevelFilter {
    #[cfg(debug_assertions)]
    let default = LevelFilter::Debug;
    #[cfg(not(debug_assertions))]
    let default = LevelFilter::Info;

    match env.map(str::parse::<LevelFilter>) {
        Some(Ok(level)) if level > log::STATIC_MAX_LEVEL => {
            eprintln!(
                "[!] {ENV_VAR}={level} is above the compiled-in maximum, using {}",
                log::STATIC_MAX_LEVEL
            );
            log::STATIC_MAX_LEVEL
        }
        Some(Ok(level)) => level,
        Some(Err(_)) => {
            eprintln!("[!] invalid {ENV_VAR}, using {default}");
            default
        }
        None => default,
    }
}

#[derive(Debug)]
struct Logger;

impl Log for Logger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record<'_>) {
        static LEVEL_STRS: [&str; 5] = ["[x]", "[!]", "[i]", "[?]", "[.]"];
        let level = LEVEL_STRS[record.level() as usize - 1];
        println!("{level} {}: {}", record.target(), record.args());
    }

    fn flush(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_overrides_level() {
        assert_eq!(max_level(Some("debug")), LevelFilter::Debug);
        assert_eq!(max_level(Some("WARN")), LevelFilter::Warn);
        assert_eq!(max_level(Some("off")), LevelFilter::Off);
    }

    #[test]
    fn env_level_is_capped_at_compiled_maximum() {
        // trace records are compiled out, so asking for them gets debug
        assert_eq!(log::STATIC_MAX_LEVEL, LevelFilter::Debug);
        assert_eq!(max_level(Some("trace")), LevelFilter::Debug);
        assert!(max_level(Some("trace")) <= log::STATIC_MAX_LEVEL);
    }

    #[test]
    fn default_level() {
        let default = max_level(None);
        assert!(default == LevelFilter::Debug || default == LevelFilter::Info);
        assert_eq!(max_level(Some("loud")), default);
    }
}
