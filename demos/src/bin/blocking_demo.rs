use clap::{Parser, ValueEnum};
use log::info;
use std::{io::Write, str::FromStr, time::Duration};

use loopline_codec::{Framing, DEFAULT_MAX_FRAME_LENGTH};
use loopline_demos::{blocking_side_effect, isolated_blocking, HarnessConfig, Reply};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Scenario {
    Both,
    SideEffect,
    Isolated,
}

#[derive(Parser)]
#[command(name = "Blocking Demo")]
#[command(version = "0.1.0")]
#[command(about = "Shows a blocking handler stalling its event loop, and the same handler isolated on its own loop", long_about = None)]
struct Cli {
    #[arg(short, long)]
    debug: bool,
    #[arg(long, default_value_t = format!("INFO"))]
    log_level: String,
    #[arg(long, value_enum, default_value_t = Scenario::Both)]
    scenario: Scenario,
    #[arg(long, default_value_t = 3000)]
    delay_ms: u64,
    #[arg(long, default_value_t = 10)]
    messages: usize,
    #[arg(long, default_value_t = 100)]
    poll_ms: u64,
    /// Use headerless frames of this many bytes instead of length-prefixed frames
    #[arg(long)]
    fixed_length: Option<usize>,
    #[arg(long)]
    echo: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let log_level = log::LevelFilter::from_str(&cli.log_level)?;
    if cli.debug {
        env_logger::Builder::new()
            .format(|buf, record| {
                writeln!(
                    buf,
                    "{}:{} [{}] {} - {}",
                    record.file().unwrap_or("unknown"),
                    record.line().unwrap_or(0),
                    record.level(),
                    chrono::Local::now().format("%H:%M:%S.%6f"),
                    record.args()
                )
            })
            .filter(None, log_level)
            .init();
    }

    let config = HarnessConfig {
        delay: Duration::from_millis(cli.delay_ms),
        messages: cli.messages,
        poll_window: Duration::from_millis(cli.poll_ms),
        framing: match cli.fixed_length {
            Some(frame_length) => Framing::FixedLength { frame_length },
            None => Framing::LengthField {
                max_frame_length: DEFAULT_MAX_FRAME_LENGTH,
            },
        },
        reply: if cli.echo {
            Reply::Echo
        } else {
            Reply::Fixed("RESP".to_owned())
        },
        ..Default::default()
    };
    info!("running with {:?}", config);

    if cli.scenario != Scenario::Isolated {
        println!("delay handler on the channel's own event loop:");
        report(&blocking_side_effect(&config)?);
    }
    if cli.scenario != Scenario::SideEffect {
        println!("delay handler on a dedicated event loop:");
        report(&isolated_blocking(&config)?);
    }

    Ok(())
}

fn report(observed: &[Option<String>]) {
    for (i, msg) in observed.iter().enumerate() {
        match msg {
            Some(msg) => println!("  poll {:>2}: {}", i + 1, msg),
            None => println!("  poll {:>2}: nothing", i + 1),
        }
    }
    let received = observed.iter().flatten().count();
    println!("  received {}/{}", received, observed.len());
}
