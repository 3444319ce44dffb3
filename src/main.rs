use clap::{crate_version, App, AppSettings, Arg, ArgMatches, SubCommand};
use scriptorium::build::build_site;
use scriptorium::config::Config;
use scriptorium::fsops::LocalFs;
use scriptorium::scaffold::create_post;
use scriptorium::watch::watch;
use std::error::Error;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let matches = App::new("scriptorium")
        .version(crate_version!())
        .about("Builds a static blog from Markdown posts")
        .setting(AppSettings::VersionlessSubcommands)
        .arg(
            Arg::with_name("config")
                .long("config")
                .short("c")
                .value_name("DIR")
                .takes_value(true)
                .help("Directory to search (with its parents) for config.yaml"),
        )
        .subcommand(SubCommand::with_name("build").about("Builds the site (the default)"))
        .subcommand(
            SubCommand::with_name("new")
                .about("Creates a new draft post")
                .arg(
                    Arg::with_name("title")
                        .required(true)
                        .multiple(true)
                        .help("The post title"),
                ),
        )
        .subcommand(SubCommand::with_name("watch").about("Rebuilds the site on every change"))
        .get_matches();

    if let Err(err) = run(&matches) {
        eprintln!("Error: {}", err);
        let mut source = err.source();
        while let Some(cause) = source {
            eprintln!("  caused by: {}", cause);
            source = cause.source();
        }
        std::process::exit(1);
    }
}

fn run(matches: &ArgMatches) -> Result<(), Box<dyn Error>> {
    let dir = match matches.value_of("config") {
        Some(dir) => PathBuf::from(dir),
        None => std::env::current_dir()?,
    };
    let config = Config::from_directory(&dir)?;

    match matches.subcommand() {
        ("new", Some(sub)) => {
            let title = sub
                .values_of("title")
                .map(|words| words.collect::<Vec<_>>().join(" "))
                .unwrap_or_default();
            let today = chrono::Local::now().date_naive();
            let path = create_post(&LocalFs, &title, &config.content_dir, today)?;
            info!(path = %path.display(), "created post");
        }
        ("watch", _) => watch(&config)?,
        _ => {
            build_site(&config)?;
        }
    }
    Ok(())
}
