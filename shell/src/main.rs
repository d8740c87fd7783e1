use anyhow::Context;
use argh::FromArgs;
use myshell::Interpreter;
use tracing_subscriber::EnvFilter;

#[derive(FromArgs)]
/// A line-oriented shell with pipes and background jobs.
struct Args {
    #[argh(option, short = 'c')]
    /// run a single line and exit with its status.
    command: Option<String>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let args: Args = argh::from_env();
    let mut shell = Interpreter::new().context("cannot start the shell")?;

    match args.command {
        Some(line) => {
            let code = match shell.run_line(&line, &mut std::io::stdout()) {
                Ok(code) => code,
                Err(err) => {
                    eprintln!("myshell: {}", err);
                    1
                }
            };
            std::process::exit(code);
        }
        None => shell.repl().context("line editor failed")?,
    }
    Ok(())
}
