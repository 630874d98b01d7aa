//! mogfs command-line client

use anyhow::Context;
use clap::{value_parser, Arg, ArgAction, Command};
use mogfs_client::Client;
use tracing::debug;
use tracing_subscriber::EnvFilter;

mod commands;
mod settings;

use settings::Settings;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let matches = cli().get_matches();
    init_tracing(matches.get_flag("log-json"));

    let settings = Settings::from_matches(&matches)?;
    debug!(trackers = ?settings.trackers, "resolved settings");

    let client = Client::new(settings.client_config())
        .await
        .context("Failed to set up tracker client")?;

    let output = commands::run(&client, &settings, &matches).await?;
    output.print()?;

    Ok(())
}

/// Logs go to stderr so command output on stdout stays clean
fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn key_arg() -> Arg {
    Arg::new("key").value_name("KEY").help("Key within the domain").required(true)
}

pub(crate) fn cli() -> Command {
    Command::new("mogfs")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Command-line client for a mogfs tracker")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("trackers")
                .long("trackers")
                .short('t')
                .value_name("HOST:PORT,...")
                .help("Tracker addresses, comma separated")
                .value_delimiter(',')
                .action(ArgAction::Append)
                .global(true),
        )
        .arg(
            Arg::new("timeout")
                .long("timeout")
                .value_name("SECS")
                .help("Overall deadline for each tracker request")
                .value_parser(value_parser!(u64))
                .global(true),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .short('c')
                .value_name("PATH")
                .help("JSON settings file")
                .global(true),
        )
        .arg(
            Arg::new("domain")
                .long("domain")
                .short('d')
                .value_name("NAME")
                .help("Domain for key and class commands")
                .global(true),
        )
        .arg(
            Arg::new("log-json")
                .long("log-json")
                .help("Emit logs as JSON")
                .action(ArgAction::SetTrue)
                .global(true),
        )
        .subcommand(Command::new("noop").about("Check that a tracker answers"))
        .subcommand(Command::new("domains").about("List domains and their classes"))
        .subcommand(Command::new("hosts").about("List storage hosts"))
        .subcommand(Command::new("devices").about("List storage devices"))
        .subcommand(
            Command::new("create-domain")
                .about("Create a domain")
                .arg(Arg::new("name").value_name("NAME").required(true)),
        )
        .subcommand(
            Command::new("delete-domain")
                .about("Delete an empty domain")
                .arg(Arg::new("name").value_name("NAME").required(true)),
        )
        .subcommand(
            Command::new("create-class")
                .about("Create a class in the domain")
                .arg(Arg::new("class").value_name("CLASS").required(true))
                .arg(
                    Arg::new("mindevcount")
                        .long("mindevcount")
                        .value_name("N")
                        .help("Minimum number of replicas")
                        .value_parser(value_parser!(u32))
                        .default_value("2"),
                ),
        )
        .subcommand(
            Command::new("delete-class")
                .about("Delete a class from the domain")
                .arg(Arg::new("class").value_name("CLASS").required(true)),
        )
        .subcommand(
            Command::new("put")
                .about("Store a file under a key")
                .arg(key_arg())
                .arg(
                    Arg::new("file")
                        .value_name("FILE")
                        .help("File to upload, or - for stdin")
                        .required(true),
                )
                .arg(Arg::new("class").long("class").value_name("CLASS"))
                .arg(
                    Arg::new("content-type")
                        .long("content-type")
                        .value_name("MIME")
                        .default_value("application/octet-stream"),
                ),
        )
        .subcommand(
            Command::new("get")
                .about("Fetch a key's contents")
                .arg(key_arg())
                .arg(
                    Arg::new("output")
                        .long("output")
                        .short('o')
                        .value_name("PATH")
                        .help("Write to a file instead of stdout"),
                ),
        )
        .subcommand(Command::new("paths").about("List replica URLs of a key").arg(key_arg()))
        .subcommand(Command::new("info").about("Show a key's metadata").arg(key_arg()))
        .subcommand(Command::new("delete").about("Delete a key").arg(key_arg()))
        .subcommand(
            Command::new("rename")
                .about("Rename a key")
                .arg(key_arg())
                .arg(Arg::new("to").value_name("NEW_KEY").required(true)),
        )
        .subcommand(
            Command::new("list-keys")
                .about("List keys in the domain")
                .arg(Arg::new("prefix").long("prefix").value_name("PREFIX"))
                .arg(Arg::new("after").long("after").value_name("KEY"))
                .arg(
                    Arg::new("limit")
                        .long("limit")
                        .value_name("N")
                        .value_parser(value_parser!(u32)),
                ),
        )
        .subcommand(
            Command::new("list-fids")
                .about("List file ids in a range")
                .arg(Arg::new("from").value_name("FROM").value_parser(value_parser!(u64)).required(true))
                .arg(Arg::new("to").value_name("TO").value_parser(value_parser!(u64)).required(true)),
        )
}
