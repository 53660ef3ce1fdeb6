use anyhow::Result;
use clap::{App, Arg};
use dedupe_store::config::Config;
use dedupe_store::server;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let matches = App::new("dedup-server")
        .about("Content-addressed deduplicating file storage server")
        .arg(Arg::with_name("storage-dir").long("storage-dir").takes_value(true))
        .arg(Arg::with_name("bind-addr").long("bind-addr").takes_value(true))
        .arg(Arg::with_name("port").long("port").takes_value(true))
        .arg(Arg::with_name("jwt-secret").long("jwt-secret").takes_value(true))
        .arg(Arg::with_name("access-ttl-min").long("access-ttl-min").takes_value(true))
        .arg(Arg::with_name("refresh-ttl-hour").long("refresh-ttl-hour").takes_value(true))
        .get_matches();

    let config = Config::from_args_and_env(&matches)?;
    server::run(config).await
}
