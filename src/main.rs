use std::path::PathBuf;

use clap::Parser;
use tokio::io::AsyncBufReadExt;
use tokio::sync::mpsc;

use database_operate::models::{DatabaseSettings, Settings};
use database_operate::{db, render, AppState, ChannelSession, Dispatcher, Error, Reply, Session};

/// Run the database commands against stdin, one message per line
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the JSON configuration file
    #[arg(short, long, default_value = "database-operate.json")]
    config: PathBuf,

    /// Use this SQLite database file instead of the configured backend
    #[arg(long)]
    sqlite: Option<PathBuf>,

    /// Directory rendered pages are written to
    #[arg(long)]
    output_dir: Option<PathBuf>,
}

fn print_reply(reply: &Reply) {
    match reply {
        Reply::Text(text) => println!("{}", text),
        Reply::Image(image) => println!("[{}] {}", image.content_type, image.path.display()),
    }
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let mut settings = Settings::load(&cli.config)?;
    if let Some(path) = cli.sqlite {
        settings.database = DatabaseSettings::Sqlite { path };
    }
    if let Some(dir) = cli.output_dir {
        settings.render.set_output_dir(dir);
    }

    let database = db::open(&settings.database).await?;
    let renderer = render::open(&settings.render);
    let root = settings.command.root.clone();
    let dispatcher = Dispatcher::new(AppState::new(database, renderer, settings.command));

    let (input_tx, input_rx) = mpsc::channel::<String>(16);
    let (output_tx, mut output_rx) = mpsc::channel::<Reply>(16);

    tokio::spawn(async move {
        let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    if input_tx.send(line).await.is_err() {
                        break;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    log::error!("Failed to read stdin: {}", e);
                    break;
                }
            }
        }
    });

    let printer = tokio::spawn(async move {
        while let Some(reply) = output_rx.recv().await {
            print_reply(&reply);
        }
    });

    log::info!("Ready, type `{}` for help", root);

    let mut session = ChannelSession::new(input_rx, output_tx);
    while let Some(line) = session.next_message().await {
        match dispatcher.handle(&line, &mut session).await {
            Ok(Some(reply)) => session.send(reply).await?,
            Ok(None) => log::debug!("Ignoring message not addressed to {}", root),
            Err(e) => log::error!("{}", e),
        }
    }

    drop(session);
    if let Err(e) = printer.await {
        log::warn!("Output task failed: {}", e);
    }

    Ok(())
}
