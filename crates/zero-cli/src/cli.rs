use std::path::PathBuf;

use clap::Parser;
use zero_ai::WireFormat;

/// zero-chat: streaming tool-augmented chat on stdin/stdout.
///
/// Each non-empty stdin line is one user turn; the turn's thinking steps are
/// written to stdout as they are produced.
#[derive(Parser, Debug)]
#[command(name = "zero-chat", version, about)]
pub struct Args {
    /// Config file path override.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Conversation session to append turns to (random when omitted).
    #[arg(short, long)]
    pub session: Option<String>,

    /// Step framing on stdout: ndjson or sse.
    #[arg(short, long, default_value = "ndjson")]
    pub format: WireFormat,

    /// Log level override (trace, debug, info, warn, error).
    #[arg(long)]
    pub log_level: Option<String>,
}

pub fn parse() -> Args {
    Args::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let args = Args::parse_from(["zero-chat"]);
        assert!(args.config.is_none());
        assert!(args.session.is_none());
        assert_eq!(args.format, WireFormat::Ndjson);
    }

    #[test]
    fn sse_and_session() {
        let args = Args::parse_from(["zero-chat", "--format", "sse", "-s", "abc"]);
        assert_eq!(args.format, WireFormat::Sse);
        assert_eq!(args.session.as_deref(), Some("abc"));
    }

    #[test]
    fn unknown_format_is_rejected() {
        assert!(Args::try_parse_from(["zero-chat", "--format", "xml"]).is_err());
    }
}
