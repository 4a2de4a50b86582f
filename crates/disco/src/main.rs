mod cli;

use clap::Parser;

use cli::{report, Args, OpContext};

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let ctx = match OpContext::new(&args) {
        Ok(ctx) => ctx,
        Err(e) => {
            report(&e);
            std::process::exit(1);
        }
    };

    if let Err(e) = disco::logging::init(&ctx.log_level) {
        eprintln!("Error: failed to initialize logging: {}", e);
        std::process::exit(1);
    }

    match args.command.execute(&ctx).await {
        Ok(output) => {
            if let Err(e) = output.write(&mut std::io::stdout().lock()) {
                eprintln!("Error: failed writing output: {}", e);
                std::process::exit(1);
            }
        }
        Err(e) => {
            report(&e);
            std::process::exit(1);
        }
    }
}
