//! Command line: `highway web --conf <file> [--policy <file>] [--menu <file>]`.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "highway")]
#[command(about = "Admin console server with policy-based access control")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Start the web server
    Web(WebArgs),
}

#[derive(Debug, Clone, Args)]
pub struct WebArgs {
    /// Config file (.toml, .yaml, .yml or .json)
    #[arg(short, long, default_value = "configs/config.toml")]
    pub conf: PathBuf,

    /// Default policy file; overrides enforcement.default_policy_file
    #[arg(long)]
    pub policy: Option<PathBuf>,

    /// Menu seed file; overrides menu.data and enables menu seeding
    #[arg(long)]
    pub menu: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn web_subcommand_parses() {
        let cli = Cli::try_parse_from([
            "highway", "web", "--conf", "a.yaml", "--policy", "p.toml", "--menu", "m.yaml",
        ])
        .unwrap();
        let Command::Web(args) = cli.command;
        assert_eq!(args.conf, PathBuf::from("a.yaml"));
        assert_eq!(args.policy, Some(PathBuf::from("p.toml")));
        assert_eq!(args.menu, Some(PathBuf::from("m.yaml")));
    }

    #[test]
    fn conf_has_default() {
        let cli = Cli::try_parse_from(["highway", "web"]).unwrap();
        let Command::Web(args) = cli.command;
        assert_eq!(args.conf, PathBuf::from("configs/config.toml"));
        assert!(args.policy.is_none());
    }
}
