//! Console logging.
//!
//! A single compact `tracing-subscriber` fmt layer on stderr, so stdout
//! stays free for `gen-config` output. The level comes from the command
//! line only:
//!
//! | Flags | Level |
//! |-------|-------|
//! | `-q` | `error` |
//! | (none) | `info` |
//! | `-v` | `debug` |
//! | `-vv` | `trace` |

use tracing::level_filters::LevelFilter;

pub fn level(verbose: u8, quiet: bool) -> LevelFilter {
    if quiet {
        return LevelFilter::ERROR;
    }
    match verbose {
        0 => LevelFilter::INFO,
        1 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    }
}

/// Install the global subscriber. Calling it twice keeps the first one.
pub fn init(verbose: u8, quiet: bool) {
    let result = tracing_subscriber::fmt()
        .compact()
        .with_ansi(true)
        .with_target(verbose > 1)
        .with_max_level(level(verbose, quiet))
        .with_writer(std::io::stderr)
        .try_init();
    if let Err(e) = result {
        tracing::debug!("logger already initialized: {e}");
    }
}
