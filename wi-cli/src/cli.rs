use std::path::PathBuf;

use clap::Parser;

#[derive(Debug, Parser, Clone)]
#[command(name = "wi")]
#[command(about = "Terminal editor with out-of-process plugins")]
pub struct Cli {
    /// Read this configuration file instead of looking up wi.toml.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Override the log file path.
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Don't load any plugin.
    #[arg(long)]
    pub no_plugins: bool,

    /// Command line to run once the UI is up, e.g. `-c "alert hello"`.
    /// May be repeated.
    #[arg(short = 'c', long = "command")]
    pub commands: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_flags() {
        let cli = Cli::parse_from([
            "wi",
            "--no-plugins",
            "-c",
            "alert hi",
            "--command",
            "window_log",
            "--config",
            "/tmp/wi.toml",
        ]);
        assert!(cli.no_plugins);
        assert_eq!(cli.commands, vec!["alert hi", "window_log"]);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/wi.toml")));
        assert!(cli.log_file.is_none());
    }
}
