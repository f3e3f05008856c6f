//! 命令行参数（clap derive）

use std::path::PathBuf;

use clap::Parser;

/// 旅行规划团队：研究员、规划师、写作者与校验者轮流协作，产出波斯语行程简报
#[derive(Parser, Debug)]
#[command(name = "travel-team")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Specify alternate configuration file
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Override team.max_messages
    #[arg(long, value_name = "N")]
    pub max_messages: Option<usize>,

    /// Save the transcript as JSON to this file
    #[arg(long, value_name = "PATH")]
    pub save: Option<PathBuf>,

    /// Continue a run saved with --save; a request, if given, is appended as a new user message
    #[arg(long, value_name = "PATH")]
    pub resume: Option<PathBuf>,

    /// Use offline mock agents (no API keys needed)
    #[arg(long)]
    pub mock: bool,

    /// Set log level (error, warn, info, debug, trace)
    #[arg(long, value_name = "LEVEL")]
    pub log: Option<String>,

    /// The travel request, e.g. "3 days in Isfahan, mid budget"
    #[arg(required_unless_present = "resume", num_args = 1..)]
    pub request: Vec<String>,
}

impl Cli {
    pub fn request_text(&self) -> String {
        self.request.join(" ")
    }

    /// 续跑时可以不带请求
    pub fn has_request(&self) -> bool {
        !self.request_text().trim().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_flags_and_request() {
        let cli = Cli::parse_from([
            "travel-team",
            "--mock",
            "--max-messages",
            "5",
            "two",
            "days",
            "in",
            "Yazd",
        ]);
        assert!(cli.mock);
        assert_eq!(cli.max_messages, Some(5));
        assert_eq!(cli.request_text(), "two days in Yazd");
        assert!(cli.save.is_none());
    }

    #[test]
    fn test_request_is_required() {
        assert!(Cli::try_parse_from(["travel-team", "--mock"]).is_err());
    }

    #[test]
    fn test_resume_without_request() {
        let cli = Cli::parse_from(["travel-team", "--resume", "runs/last.json"]);
        assert_eq!(cli.resume, Some(PathBuf::from("runs/last.json")));
        assert!(!cli.has_request());
    }
}
