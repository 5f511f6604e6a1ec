mod cli;

use std::{
    fs::File,
    io::{self, Write},
};

use clap::Parser;

/// Log sink writing every record to stderr and to a file.
struct Tee<W> {
    file: W,
    console: io::Stderr,
}

impl<W: Write> Write for Tee<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file.write_all(buf)?;
        self.console.write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()?;
        self.console.flush()
    }
}

fn init_logging(log_file: Option<&std::path::Path>) -> io::Result<()> {
    let mut builder = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if let Some(path) = log_file {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        builder.target(env_logger::Target::Pipe(Box::new(Tee {
            file: File::create(path)?,
            console: io::stderr(),
        })));
    }
    builder.init();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // A missing .env is fine, credentials may come from the environment
    dotenvy::dotenv().ok();

    let cli = cli::Cli::parse();
    init_logging(cli.log_file.as_deref())?;

    cli::run(cli).await?;
    Ok(())
}
