//! Subcommand dispatch

use std::io::Write;

use anyhow::{bail, Context, Result};
use bytes::Bytes;
use clap::ArgMatches;
use mogfs_client::{Client, DomainHandle, KeyHandle};
use serde::Serialize;
use tracing::info;

use crate::settings::Settings;

/// What a command leaves on stdout
#[derive(Debug)]
pub enum Output {
    Json(serde_json::Value),
    Raw(Bytes),
    Nothing,
}

impl Output {
    pub fn print(&self) -> Result<()> {
        let mut stdout = std::io::stdout().lock();
        match self {
            Output::Json(value) => writeln!(stdout, "{}", serde_json::to_string_pretty(value)?)?,
            Output::Raw(bytes) => stdout.write_all(bytes)?,
            Output::Nothing => {}
        }
        stdout.flush()?;
        Ok(())
    }
}

fn json<T: Serialize>(value: T) -> Result<Output> {
    Ok(Output::Json(serde_json::to_value(value)?))
}

fn arg<'a>(args: &'a ArgMatches, name: &str) -> Result<&'a str> {
    args.get_one::<String>(name)
        .map(String::as_str)
        .with_context(|| format!("Missing argument {}", name))
}

fn domain_handle(client: &Client, settings: &Settings) -> Result<DomainHandle> {
    Ok(client.domain(settings.domain()?)?)
}

fn key_handle(client: &Client, settings: &Settings, args: &ArgMatches) -> Result<KeyHandle> {
    Ok(domain_handle(client, settings)?.key(arg(args, "key")?)?)
}

pub async fn run(client: &Client, settings: &Settings, matches: &ArgMatches) -> Result<Output> {
    let Some((name, args)) = matches.subcommand() else {
        bail!("No command given");
    };

    match name {
        "noop" => {
            client.noop().await?;
            Ok(Output::Nothing)
        }
        "domains" => json(client.get_domains().await?),
        "hosts" => json(client.get_hosts().await?),
        "devices" => json(client.get_devices().await?),
        "create-domain" => {
            client.domain(arg(args, "name")?)?.create().await?;
            Ok(Output::Nothing)
        }
        "delete-domain" => {
            client.domain(arg(args, "name")?)?.delete().await?;
            Ok(Output::Nothing)
        }
        "create-class" => {
            let mindevcount = args.get_one::<u32>("mindevcount").copied().unwrap_or(2);
            domain_handle(client, settings)?
                .create_class(arg(args, "class")?, mindevcount)
                .await?;
            Ok(Output::Nothing)
        }
        "delete-class" => {
            domain_handle(client, settings)?
                .delete_class(arg(args, "class")?)
                .await?;
            Ok(Output::Nothing)
        }
        "put" => {
            let mut key = key_handle(client, settings, args)?;
            if let Some(class) = args.get_one::<String>("class") {
                key = key.with_class(class);
            }
            let content_type = arg(args, "content-type")?;

            let stored = match arg(args, "file")? {
                "-" => key.store(tokio::io::stdin(), content_type).await?,
                path => key
                    .store_file(path, content_type)
                    .await
                    .with_context(|| format!("Failed to store {}", path))?,
            };
            info!(key = %key.key(), fid = stored.fid, size = stored.size, "stored");
            json(stored)
        }
        "get" => {
            let key = key_handle(client, settings, args)?;
            let body = key.fetch().await?;
            match args.get_one::<String>("output") {
                Some(path) => {
                    tokio::fs::write(path, &body)
                        .await
                        .with_context(|| format!("Failed to write {}", path))?;
                    info!(key = %key.key(), size = body.len(), path = %path, "fetched");
                    Ok(Output::Nothing)
                }
                None => Ok(Output::Raw(body)),
            }
        }
        "paths" => json(key_handle(client, settings, args)?.paths().await?),
        "info" => json(key_handle(client, settings, args)?.file_info().await?),
        "delete" => {
            key_handle(client, settings, args)?.delete().await?;
            Ok(Output::Nothing)
        }
        "rename" => {
            let renamed = key_handle(client, settings, args)?.rename(arg(args, "to")?).await?;
            json(serde_json::json!({ "key": renamed.key() }))
        }
        "list-keys" => {
            let page = domain_handle(client, settings)?
                .list_keys(
                    args.get_one::<String>("prefix").map(String::as_str),
                    args.get_one::<String>("after").map(String::as_str),
                    args.get_one::<u32>("limit").copied(),
                )
                .await?;
            json(page)
        }
        "list-fids" => {
            let from = *args.get_one::<u64>("from").context("Missing argument from")?;
            let to = *args.get_one::<u64>("to").context("Missing argument to")?;
            json(client.list_fids(from, to).await?)
        }
        other => bail!("Unknown command {}", other),
    }
}
