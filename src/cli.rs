use std::error::Error;

use clap::{Args, Parser, Subcommand};
use regexgen_rs::{
    CountBounds, DEFAULT_COUNT, DEFAULT_MAX_REPEAT, FlagInputs, InputModel, RegexGenerator,
    generate,
};
use serde_json::json;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "regexgen-rs",
    about = "Generate example strings for regular expressions",
    version
)]
pub struct Cli {
    /// Emit a JSON document instead of one sample per line.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print strings that match a pattern.
    Generate {
        /// Pattern to generate strings for.
        pattern: String,
        /// Number of strings; zero or less means the default.
        #[arg(short, long, default_value_t = DEFAULT_COUNT as i64, allow_negative_numbers = true)]
        count: i64,
        #[command(flatten)]
        flags: FlagArgs,
        /// Seed for reproducible output.
        #[arg(long)]
        seed: Option<u64>,
        /// Extra repetitions allowed for unbounded operators.
        #[arg(long, default_value_t = DEFAULT_MAX_REPEAT)]
        max_repeat: u32,
    },
    /// Run the HTTP endpoint.
    #[cfg(feature = "web")]
    Serve(ServeArgs),
}

#[derive(Args, Debug, Default)]
struct FlagArgs {
    /// Case-insensitive matching.
    #[arg(long)]
    fold_case: bool,
    /// Let negated classes like [^a-z] match newline.
    #[arg(long)]
    class_nl: bool,
    /// Let `.` match newline.
    #[arg(long)]
    dot_nl: bool,
    /// `^` and `$` only match at the beginning and end of text.
    #[arg(long)]
    one_line: bool,
    /// Swap greediness of repetition operators.
    #[arg(long)]
    non_greedy: bool,
    /// Allow Perl extensions such as `\d`, `(?:...)` and lazy repetition.
    #[arg(long)]
    perl_x: bool,
}

impl From<&FlagArgs> for FlagInputs {
    fn from(args: &FlagArgs) -> Self {
        FlagInputs {
            fold_case: args.fold_case,
            class_nl: args.class_nl,
            dot_nl: args.dot_nl,
            one_line: args.one_line,
            non_greedy: args.non_greedy,
            perl_x: args.perl_x,
        }
    }
}

#[cfg(feature = "web")]
#[derive(Args, Debug)]
struct ServeArgs {
    /// Address to bind.
    #[arg(long, default_value = "127.0.0.1")]
    addr: std::net::IpAddr,
    /// Port to listen on.
    #[arg(long, default_value_t = 8080)]
    port: u16,
    /// Optional ID to use for analytics tracking.
    #[arg(long)]
    analytics_id: Option<String>,
    /// Public base URL for suggestion links and the form; links are
    /// route-relative when omitted.
    #[arg(long)]
    base_url: Option<String>,
    #[arg(long, default_value_t = regexgen_rs::MIN_COUNT)]
    min_count: usize,
    #[arg(long, default_value_t = regexgen_rs::MAX_COUNT)]
    max_count: usize,
    #[arg(long, default_value_t = DEFAULT_COUNT)]
    default_count: usize,
    /// Extra repetitions allowed for unbounded operators.
    #[arg(long, default_value_t = DEFAULT_MAX_REPEAT)]
    max_repeat: u32,
}

pub fn run() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    init_tracing();
    match cli.command {
        Command::Generate {
            pattern,
            count,
            flags,
            seed,
            max_repeat,
        } => handle_generate(&pattern, count, &flags, seed, max_repeat, cli.json),
        #[cfg(feature = "web")]
        Command::Serve(args) => handle_serve(args),
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("regexgen_rs=info,tower_http=info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn handle_generate(
    pattern: &str,
    count: i64,
    flags: &FlagArgs,
    seed: Option<u64>,
    max_repeat: u32,
    as_json: bool,
) -> Result<(), Box<dyn Error>> {
    if pattern.is_empty() {
        return Err("Pattern cannot be empty".into());
    }
    let count = CountBounds::default().sanitize(count);
    let mut generator = RegexGenerator::new(max_repeat);
    if let Some(seed) = seed {
        generator = generator.with_seed(seed);
    }
    let input = InputModel {
        pattern: pattern.to_string(),
        count: i64::try_from(count)?,
        flags: FlagInputs::from(flags),
    };
    let results = generate(&generator, pattern, input.compile_flags(), count)?;

    if as_json {
        let payload = json!({
            "input": input,
            "results": results,
        });
        println!("{}", serde_json::to_string_pretty(&payload)?);
    } else {
        for result in &results {
            println!("{result}");
        }
    }
    Ok(())
}

#[cfg(feature = "web")]
fn web_config(args: ServeArgs) -> Result<regexgen_rs::web::WebConfig, Box<dyn Error>> {
    Ok(regexgen_rs::web::WebConfig {
        addr: std::net::SocketAddr::new(args.addr, args.port),
        base_url: args.base_url.unwrap_or_default(),
        analytics_id: args.analytics_id.filter(|id| !id.is_empty()),
        bounds: CountBounds::new(args.min_count, args.max_count, args.default_count)?,
        max_repeat: args.max_repeat,
    })
}

#[cfg(feature = "web")]
fn handle_serve(args: ServeArgs) -> Result<(), Box<dyn Error>> {
    let config = web_config(args)?;
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(regexgen_rs::web::serve(config))?;
    Ok(())
}
