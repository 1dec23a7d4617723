//! Command-line interface for Qiraah
//!
//! Handles argument parsing and logging configuration.

use clap::Parser;
use log::LevelFilter;

/// Qiraah - Quran recitation player
#[derive(Parser, Debug)]
#[command(name = "qiraah")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Chapter (surah) to open
    #[arg(long, default_value = "1")]
    pub surah: String,

    /// Verse (ayah) to open
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
    pub ayah: u32,

    /// Reciter identifier (overrides the saved preference)
    #[arg(long)]
    pub reciter: Option<String>,

    /// Base URL serving `{reciter}/{surah}/{ayah}.mp3`
    #[arg(long)]
    pub audio_base_url: Option<String>,

    /// Increase logging verbosity
    /// -v = info, -vv = debug, -vvv = trace, -vvvv = all deps
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long)]
    pub quiet: bool,
}

impl Args {
    /// Get the log level filter based on verbosity flags
    pub fn log_level(&self) -> LevelFilter {
        if self.quiet {
            LevelFilter::Error
        } else {
            match self.verbose {
                0 => LevelFilter::Warn,
                1 => LevelFilter::Info,
                2 => LevelFilter::Debug,
                _ => LevelFilter::Trace,
            }
        }
    }
}

/// Initialize the logging system based on CLI arguments
pub fn init_logging(args: &Args) {
    let mut builder = env_logger::Builder::new();

    // Base level for all modules - keep at warn to suppress noisy deps
    builder.filter_level(LevelFilter::Warn);

    builder.filter_module("qiraah", args.log_level());

    // GUI, HTTP and decoder internals only at -vvvv
    if args.verbose >= 4 {
        builder.filter_module("gpui", args.log_level());
        builder.filter_module("reqwest", args.log_level());
        builder.filter_module("symphonia", args.log_level());
    }

    builder.format_timestamp_millis().init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let args = Args::try_parse_from(["qiraah"]).unwrap();
        assert_eq!(args.surah, "1");
        assert_eq!(args.ayah, 1);
        assert!(args.reciter.is_none());
        assert_eq!(args.log_level(), LevelFilter::Warn);
    }

    #[test]
    fn test_ayah_must_be_positive() {
        assert!(Args::try_parse_from(["qiraah", "--ayah", "0"]).is_err());
        let args = Args::try_parse_from(["qiraah", "--surah", "36", "--ayah", "12"]).unwrap();
        assert_eq!(args.surah, "36");
        assert_eq!(args.ayah, 12);
    }

    #[test]
    fn test_log_level() {
        let args = Args::try_parse_from(["qiraah", "-vv"]).unwrap();
        assert_eq!(args.log_level(), LevelFilter::Debug);
        let args = Args::try_parse_from(["qiraah", "-vv", "-q"]).unwrap();
        assert_eq!(args.log_level(), LevelFilter::Error);
    }
}
