//! Command-line argument parsing for SleepCycle

/// Parsed command line arguments
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Args {
    pub validate: bool,
    pub help: bool,
    /// Compute wake times for this timestamp and exit instead of serving
    pub now: Option<String>,
}

pub fn parse_args() -> Args {
    parse_args_from(std::env::args())
}

/// Parse from an explicit argument list (first item is the program name)
pub fn parse_args_from<I>(args: I) -> Args
where
    I: IntoIterator<Item = String>,
{
    let mut result = Args::default();
    let mut args = args.into_iter().skip(1);

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--validate" => result.validate = true,
            "--help" | "-h" => result.help = true,
            "--now" => {
                // A missing value still selects one-shot mode so the validator reports it
                result.now = Some(args.next().unwrap_or_default());
            }
            other => {
                if let Some(value) = other.strip_prefix("--now=") {
                    result.now = Some(value.to_string());
                }
            }
        }
    }

    result
}

pub fn print_help() {
    println!("SleepCycle - Wake Time Calculator\n");
    println!("USAGE:");
    println!("    sleepcycle [OPTIONS]\n");
    println!("OPTIONS:");
    println!("    --now TIMESTAMP     Print wake times for TIMESTAMP (e.g. 2026-01-25T22:43:00-06:00) and exit");
    println!("    --validate          Validate configuration and exit");
    println!("    --help, -h          Show this help message\n");
    println!("ENVIRONMENT:");
    println!("    SLEEPCYCLE_HOST         Bind address (default: 0.0.0.0)");
    println!("    SLEEPCYCLE_PORT         Bind port (default: 8787)");
    println!("    REQUEST_TIMEOUT_SECS    Per-request read timeout (default: 5)");
    println!("    MAX_BODY_BYTES          Largest accepted request body (default: 16384)");
}
