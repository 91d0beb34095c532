use anyhow::{bail, Context};
use log::LevelFilter;
use serialfs::{
    config::{BaudRate, Config, Options, SerialConfig},
    human_size, Session,
};
use std::env;

const USAGE: &str = "usage: client <port> <baud> <command> [args]

commands:
    storage
    ls [path]
    mkdir <path>
    rm <path>
    rmdir <path>
    rmtree <path>
    mv <from> <to>
    get <remote> <local>
    put <local> <remote>";

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    env_logger::builder()
        .filter_level(LevelFilter::Info)
        .parse_default_env()
        .init();

    let args: Vec<String> = env::args().skip(1).collect();
    let [port, baud, command, rest @ ..] = args.as_slice() else {
        bail!(USAGE);
    };

    let baud = BaudRate::try_from(baud.parse::<u32>().context("baud rate")?)?;
    let config = Config {
        serial: SerialConfig::new(port.as_str(), baud),
        options: Options::default(),
    };

    let session = Session::connect(&config).await?;
    let arg = |idx: usize| rest.get(idx).map(String::as_str).context(USAGE);

    match command.as_str() {
        "storage" => {
            let stats = session.storage().await?;
            println!(
                "total {}, used {}, free {}",
                human_size(stats.total_bytes),
                human_size(stats.used_bytes()),
                human_size(stats.free_bytes)
            );
        }
        "ls" => {
            let path = arg(0).unwrap_or("/");
            let listing = session.list(path).await?;
            for entry in &listing.entries {
                match entry.size() {
                    Some(size) => println!("{:>12}  {}", human_size(size), entry.name()),
                    None => println!("{:>12}  {}/", "<dir>", entry.name()),
                }
            }
            if !listing.complete {
                println!("(listing may be incomplete)");
            }
        }
        "mkdir" => println!("{:?}", session.create_dir(arg(0)?).await?.lines),
        "rm" => println!("{:?}", session.remove_file(arg(0)?).await?.lines),
        "rmdir" => println!("{:?}", session.remove_dir(arg(0)?).await?.lines),
        "rmtree" => {
            let report = session.remove_dir_all(arg(0)?).await?;
            for failure in &report.failures {
                println!("{} {}: {}", failure.command, failure.path, failure.reason);
            }
            println!(
                "{} files and {} directories removed",
                report.files_deleted, report.dirs_removed
            );
        }
        "mv" => println!("{:?}", session.rename(arg(0)?, arg(1)?).await?.lines),
        "get" => {
            let data = session
                .download(arg(0)?, |p| {
                    println!("{:.0}%", p.fraction() * 100.0);
                })
                .await?;
            std::fs::write(arg(1)?, &data)?;
            println!("{} written", human_size(data.len() as u64));
        }
        "put" => {
            let data = std::fs::read(arg(0)?)?;
            let response = session
                .upload(arg(1)?, &data[..], data.len() as u64, |p| {
                    println!("{:.0}%", p.fraction() * 100.0);
                })
                .await?;
            println!("{:?}", response.lines);
        }
        other => bail!("unknown command {other:?}\n{USAGE}"),
    }

    session.close().await;
    Ok(())
}
