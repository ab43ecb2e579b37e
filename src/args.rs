use clap::Parser;
use std::path::PathBuf;

use snapwatch::config;

#[derive(Parser, Debug)]
#[command(name = "snapwatch")]
#[command(author = "Snapwatch Team")]
#[command(version)]
#[command(about = "Save a PNG snapshot whenever the selected monitor changes", long_about = None)]
pub struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "snapwatch.toml")]
    pub config: PathBuf,

    /// X display (defaults to $DISPLAY)
    #[arg(short, long)]
    pub display: Option<String>,

    /// 1-based monitor index to capture
    #[arg(short, long)]
    pub target: Option<usize>,

    /// Delay between captures in milliseconds
    #[arg(long)]
    pub interval_ms: Option<u64>,

    /// Snapshot directory
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Print the available monitors and exit
    #[arg(long, action)]
    pub list_targets: bool,

    /// Wait for a `start` command instead of capturing immediately
    #[arg(long, action)]
    pub no_autostart: bool,

    /// Disable MIT-SHM grabs
    #[arg(long, action)]
    pub no_shm: bool,

    /// Verbose logging
    #[arg(short, long, action)]
    pub verbose: bool,
}

impl Args {
    pub fn load_config(&self) -> Result<config::Config, config::ConfigError> {
        config::Config::load(&self.config)
    }

    /// Apply command line overrides on top of the file configuration
    pub fn apply_overrides(&self, config: &mut config::Config) {
        if let Some(ref display) = self.display {
            config.x11.display = Some(display.clone());
        }
        if let Some(target) = self.target {
            config.capture.target = target;
        }
        if let Some(interval_ms) = self.interval_ms {
            config.capture.interval_ms = interval_ms;
        }
        if let Some(ref dir) = self.output_dir {
            config.storage.directory = dir.clone();
        }
        if self.no_autostart {
            config.capture.autostart = false;
        }
        if self.no_shm {
            config.x11.use_shm = false;
        }
        if self.verbose {
            config.logging.level = "debug".to_string();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overrides_replace_file_values() {
        let args = Args::parse_from([
            "snapwatch",
            "--target",
            "2",
            "--interval-ms",
            "250",
            "--output-dir",
            "/tmp/shots",
            "--no-autostart",
            "-v",
        ]);
        let mut cfg = config::Config::default();
        args.apply_overrides(&mut cfg);

        assert_eq!(cfg.capture.target, 2);
        assert_eq!(cfg.capture.interval_ms, 250);
        assert_eq!(cfg.storage.directory, PathBuf::from("/tmp/shots"));
        assert!(!cfg.capture.autostart);
        assert_eq!(cfg.logging.level, "debug");
    }

    #[test]
    fn no_flags_keep_file_values() {
        let args = Args::parse_from(["snapwatch"]);
        let mut cfg = config::Config::default();
        cfg.capture.target = 3;
        args.apply_overrides(&mut cfg);
        assert_eq!(cfg.capture.target, 3);
        assert!(cfg.capture.autostart);
    }
}
