use clap::Parser;
use tracing_subscriber::EnvFilter;

use idgen::{CounterRegistry, IdGenerator};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Namespace prefix; the default namespace is used when omitted
    prefix: Option<String>,

    /// Number of ids to issue
    #[arg(short = 'n', long, default_value = "1")]
    count: usize,

    /// Print the last issued id instead of issuing a new one
    #[arg(long, conflicts_with_all = ["reset", "reset_all"])]
    current: bool,

    /// Rewind the namespace so the next id is 0
    #[arg(long, conflicts_with = "reset_all")]
    reset: bool,

    /// Rewind every namespace
    #[arg(long)]
    reset_all: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::from_default_env().add_directive("idgen=info".parse()?))
        .init();

    let args = Args::parse();

    match std::env::var("IDGEN_COUNTERS_PATH") {
        Ok(path) => {
            tracing::debug!("Using counters file {}", path);
            let registry = CounterRegistry::open(path)?;
            run(&registry, &args)
        }
        Err(_) => run(CounterRegistry::global()?, &args),
    }
}

fn run<G: IdGenerator>(
    generator: &G,
    args: &Args,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let prefix = args.prefix.as_deref();

    if args.reset_all {
        generator.reset_all()?;
        tracing::info!("Reset all namespaces");
    } else if args.reset {
        match prefix {
            Some(p) => generator.reset_prefixed(p)?,
            None => generator.reset()?,
        }
        tracing::info!(prefix = ?prefix, "Reset namespace");
    } else if args.current {
        let value = match prefix {
            Some(p) => generator.current_prefixed(p)?,
            None => generator.current()?,
        };
        println!("{}", value);
    } else {
        for _ in 0..args.count {
            match prefix {
                Some(p) => println!("{}", generator.next_prefixed(p)?),
                None => println!("{}", generator.next()?),
            }
        }
    }

    Ok(())
}
