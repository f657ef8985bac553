use args::{Args, Command, ServeArgs};
use clap::Parser;

mod args;
mod logger;
mod quit;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    logger::init(&args)?;

    let result = match &args.command {
        Command::Serve(serve_args) => serve(serve_args).await,
        Command::Quit(quit_args) => quit::run(quit_args).await,
    };

    if let Err(e) = result {
        log::error!("{e}");
        std::process::exit(1);
    }

    Ok(())
}

async fn serve(args: &ServeArgs) -> anyhow::Result<()> {
    let config = args.config()?;
    let report = server::serve(config).await?;

    log::debug!("Shutdown triggered by {} finished: {report:?}", report.trigger);

    Ok(())
}
