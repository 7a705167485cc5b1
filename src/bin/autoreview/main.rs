mod display;

use autoreview::{Command, GitHub, collect_stats, parse_args, run_review};
use display::{display_review_outcome, display_stats, display_stats_json};

fn handle_clap_help_version(clap_err: &clap::Error) -> ! {
    use clap::error::ErrorKind;
    match clap_err.kind() {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
            print!("{clap_err}");
            std::process::exit(0);
        }
        _ => {
            eprint!("{clap_err}");
            std::process::exit(2);
        }
    }
}

fn init_tracing() {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let command = match parse_args(std::env::args_os()) {
        Ok(command) => command,
        Err(err) => {
            if let Some(clap_err) = err.downcast_ref::<clap::Error>() {
                handle_clap_help_version(clap_err);
            } else {
                return Err(err);
            }
        }
    };

    let forge = GitHub::connect()?;
    let mut stdout = std::io::stdout();

    match command {
        Command::Review(request) => {
            let outcome = run_review(&request, &forge).await?;
            display_review_outcome(&outcome, &mut stdout)?;
        }
        Command::Stats(request) => {
            let stats = collect_stats(&request, &forge).await?;
            if request.json {
                display_stats_json(&stats, &mut stdout)?;
            } else {
                display_stats(&stats, request.truncate_titles, &mut stdout)?;
            }
        }
    }

    Ok(())
}
