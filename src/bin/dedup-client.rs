use anyhow::{Context, Result};
use clap::{App, Arg, SubCommand};
use dedupe_store::client::{ApiClient, ClientEngine};
use std::path::Path;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let matches = App::new("dedup-client")
        .about("Client for the content-addressed deduplicating file storage service")
        .arg(
            Arg::with_name("server")
                .long("server")
                .takes_value(true)
                .default_value("http://127.0.0.1:8080")
                .global(true),
        )
        .arg(Arg::with_name("token").long("token").takes_value(true).global(true))
        .subcommand(
            SubCommand::with_name("signup")
                .arg(Arg::with_name("username").required(true))
                .arg(Arg::with_name("password").required(true)),
        )
        .subcommand(
            SubCommand::with_name("login")
                .arg(Arg::with_name("username").required(true))
                .arg(Arg::with_name("password").required(true)),
        )
        .subcommand(SubCommand::with_name("refresh").arg(Arg::with_name("refresh_token").required(true)))
        .subcommand(SubCommand::with_name("upload").arg(Arg::with_name("filepath").required(true)))
        .subcommand(
            SubCommand::with_name("download")
                .arg(Arg::with_name("filehash").required(true))
                .arg(Arg::with_name("outdir").short("o").takes_value(true).default_value("."))
                .arg(Arg::with_name("name").short("n").takes_value(true)),
        )
        .get_matches();

    let server_url = matches.value_of("server").unwrap().to_string();

    match matches.subcommand() {
        ("signup", Some(sub)) => {
            let client = ApiClient::new(server_url);
            let pair = client
                .signup(sub.value_of("username").unwrap(), sub.value_of("password").unwrap())
                .await?;
            println!("access_token: {}", pair.access_token);
            println!("refresh_token: {}", pair.refresh_token);
        }
        ("login", Some(sub)) => {
            let client = ApiClient::new(server_url);
            let pair = client
                .login(sub.value_of("username").unwrap(), sub.value_of("password").unwrap())
                .await?;
            println!("access_token: {}", pair.access_token);
            println!("refresh_token: {}", pair.refresh_token);
        }
        ("refresh", Some(sub)) => {
            let client = ApiClient::with_tokens(
                server_url,
                String::new(),
                Some(sub.value_of("refresh_token").unwrap().to_string()),
            );
            let access_token = client.refresh().await?;
            println!("access_token: {}", access_token);
        }
        ("upload", Some(sub)) => {
            let token = matches.value_of("token").map(str::to_string).context(
                "upload requires --token (an access token from signup/login)",
            )?;
            let client = ApiClient::with_tokens(server_url, token, None);
            let engine = ClientEngine::new(client);
            let path = Path::new(sub.value_of("filepath").unwrap());
            let outcome = engine.upload_file(path).await?;
            if outcome.already_present {
                println!("already stored: {}", outcome.file_digest);
            } else {
                println!("uploaded: {}", outcome.file_digest);
                for mismatched in &outcome.mismatched_chunks {
                    eprintln!("warning: hash mismatch reported for chunk {}", mismatched);
                }
            }
        }
        ("download", Some(sub)) => {
            let token = matches.value_of("token").map(str::to_string).context(
                "download requires --token (an access token from signup/login)",
            )?;
            let client = ApiClient::with_tokens(server_url, token, None);
            let engine = ClientEngine::new(client);
            let file_hash = sub.value_of("filehash").unwrap();
            let out_dir = Path::new(sub.value_of("outdir").unwrap());
            let name = sub.value_of("name").unwrap_or(file_hash);
            let path = engine.download_file(file_hash, out_dir, name).await?;
            println!("downloaded to {}", path.display());
        }
        _ => {
            eprintln!("no subcommand given; see --help");
            std::process::exit(1);
        }
    }

    Ok(())
}
