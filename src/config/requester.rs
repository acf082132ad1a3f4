// --- Command-Line Arguments Struct ---
// Request fields for the manual requester binary. Broker topology names
// come from the environment (crate::config::Settings) so the requester and
// the worker always agree on them.
use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Object name of the document in the store bucket (e.g., bookA.pdf)
    #[arg(short, long)]
    pub file_name: String,

    /// Identifier echoed back in the response (random if omitted)
    #[arg(short, long)]
    pub test_id: Option<String>,

    /// First page of the range to generate questions from
    #[arg(short, long, default_value_t = 1)]
    pub start_page: u32,

    /// Last page of the range (clamped to the document length by the worker)
    #[arg(short, long, default_value_t = 5)]
    pub end_page: u32,

    /// Number of questions to request
    #[arg(short = 'n', long, default_value_t = 2)]
    pub question_count: u32,

    /// Seconds to wait for the response before giving up
    #[arg(long, default_value_t = 300)]
    pub timeout_secs: u64,
}
