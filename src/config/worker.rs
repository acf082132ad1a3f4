// --- Command-Line Arguments Struct ---
// Moved out of src/bin/worker.rs to make it accessible by library tests.
// All broker/store/backend settings come from the environment (see
// crate::config::Settings); these flags cover operational overrides only.
use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Override the status/metrics HTTP port (defaults to STATUS_PORT)
    #[arg(long)]
    pub status_port: Option<u16>,

    /// Validate the environment configuration and exit
    #[arg(long)]
    pub validate_config: bool,
}
