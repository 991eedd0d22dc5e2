use std::{net::Ipv4Addr, path::PathBuf, time::Duration};

use anyhow::{bail, Context};
use clap::{Args, Subcommand};
use serde::Serialize;
use sampctl_core::{
    config::RconOptions, FavouriteList, FavouriteListError, NewFavourite, QueryClient, RconClient,
    ServerInfo, ServerSnapshot,
};

use crate::config::RootConfig;

/// Default port of addresses given without one.
const DEFAULT_PORT: u32 = 7777;

/// Command line settings that take precedence over the configuration file.
#[derive(Args)]
pub struct Overrides {
    /// Server host name or IP address.
    #[arg(short = 'H', long, global = true)]
    pub host: Option<String>,
    /// Server port.
    #[arg(short, long, global = true)]
    pub port: Option<u16>,
    /// Reply timeout of queries and RCON calls, in milliseconds.
    #[arg(short, long, global = true, value_name = "MS")]
    pub timeout: Option<u64>,
    /// Print results as JSON.
    #[arg(long, global = true)]
    pub json: bool,
}

#[derive(Subcommand)]
pub enum Command {
    /// Show server information.
    Info,
    /// List server rules.
    Rules,
    /// List connected players.
    Players {
        /// Include player ids and pings.
        #[arg(short, long)]
        detailed: bool,
    },
    /// Show information, rules and players at once.
    Server,
    /// Measure the round trip of an information query.
    Ping,
    /// Run a remote console command and print its reply.
    Rcon {
        /// Console password.
        #[arg(long)]
        password: Option<String>,
        /// Command to run.
        #[arg(required = true, num_args = 1..)]
        command: Vec<String>,
    },
    /// Manage a favourites file.
    Favourites {
        /// Favourites file, usually USERDATA.DAT.
        #[arg(short, long, value_name = "FILE")]
        file: Option<PathBuf>,
        #[command(subcommand)]
        action: FavouritesAction,
    },
}

#[derive(Subcommand)]
pub enum FavouritesAction {
    /// List favourite servers.
    List,
    /// Add a server, given as ip[:port].
    Add {
        address: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        password: Option<String>,
        #[arg(long)]
        rcon_password: Option<String>,
    },
    /// Remove a server, given as ip[:port].
    Remove { address: String },
}

impl Overrides {
    /// Applies command line settings on top of `config`.
    pub fn apply(&self, mut config: RootConfig) -> RootConfig {
        if let Some(host) = &self.host {
            match host.parse::<Ipv4Addr>() {
                Ok(ip) => {
                    config.query.ip = Some(ip);
                    config.query.host = None;
                }
                Err(_) => {
                    config.query.ip = None;
                    config.query.host = Some(host.clone());
                }
            }
        }
        if let Some(port) = self.port {
            config.query.port = port;
            if let Some(rcon) = config.rcon.as_mut() {
                rcon.port = port;
            }
        }
        if let Some(timeout) = self.timeout() {
            config.query.timeout = timeout;
            if let Some(rcon) = config.rcon.as_mut() {
                rcon.timeout = timeout;
            }
        }
        config
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout.map(Duration::from_millis)
    }
}

/// Runs a command.
///
/// ## Arguments
///
/// * `command` - Command to run
/// * `config` - Effective configuration
/// * `overrides` - Command line settings, already applied to `config`
pub async fn execute(
    command: Command,
    config: RootConfig,
    overrides: &Overrides,
) -> anyhow::Result<()> {
    let json = overrides.json;
    let query = QueryClient::new(config.query.clone());
    match command {
        Command::Info => print(&query.server_info().await?, json, print_info),
        Command::Rules => print(&query.server_rules().await?, json, |rules| {
            for rule in rules {
                println!("{:<12} {}", rule.name, rule.value);
            }
        }),
        Command::Players { detailed: false } => {
            print(&query.server_players().await?, json, |players| {
                for player in players {
                    println!("{:<24} {:>8}", player.name, player.score);
                }
            })
        }
        Command::Players { detailed: true } => {
            print(&query.server_players_detailed().await?, json, |players| {
                for player in players {
                    println!(
                        "{:>3} {:<24} {:>8} {:>5}ms",
                        player.id, player.name, player.score, player.ping
                    );
                }
            })
        }
        Command::Server => print(&query.server().await?, json, print_snapshot),
        Command::Ping => {
            let elapsed = query.ping().await?;
            print(&(elapsed.as_millis() as u64), json, |millis| {
                println!("{} ms", millis)
            })
        }
        Command::Rcon { password, command } => {
            let options = rcon_options(&config, &query, password, overrides.timeout()).await?;
            let mut client = RconClient::new(options);
            client.connect().await?;
            let reply = client.call(&command.join(" ")).await;
            client.disconnect();
            print(&reply?, json, |text| println!("{}", text))
        }
        Command::Favourites { file, action } => {
            let path = file
                .or(config.favourites)
                .context("no favourites file given")?;
            favourites(path, action, json).await?
        }
    }
    Ok(())
}

/// Works out the remote console to talk to.
///
/// Without an `[rcon]` section, the console of the query target is used.
async fn rcon_options(
    config: &RootConfig,
    query: &QueryClient,
    password: Option<String>,
    timeout: Option<Duration>,
) -> anyhow::Result<RconOptions> {
    let mut options = match config.rcon.clone() {
        Some(options) => options,
        None => {
            let Some(password) = password.clone() else {
                bail!("no RCON password given");
            };
            RconOptions::new(query.resolve().await?, query.options().port, password)
        }
    };
    if let Some(password) = password {
        options.password = password;
    }
    if let Some(timeout) = timeout {
        options.timeout = timeout;
    }
    Ok(options)
}

async fn favourites(path: PathBuf, action: FavouritesAction, json: bool) -> anyhow::Result<()> {
    let mut list = match FavouriteList::load(&path).await {
        Ok(list) => list,
        Err(FavouriteListError::Io(err))
            if err.kind() == std::io::ErrorKind::NotFound
                && !matches!(action, FavouritesAction::List) =>
        {
            log::info!("Creating {}", path.to_string_lossy());
            FavouriteList::new()
        }
        Err(err) => return Err(err.into()),
    };
    match action {
        FavouritesAction::List => {
            print(&list.servers(), json, |servers| {
                for server in servers.iter() {
                    println!("{}:{} {}", server.ip, server.port, server.name);
                }
            });
            return Ok(());
        }
        FavouritesAction::Add {
            address,
            name,
            password,
            rcon_password,
        } => {
            let (ip, port) = parse_address(&address)?;
            let server = list.add(NewFavourite {
                ip,
                port,
                name,
                password,
                rcon_password,
            })?;
            log::info!("Added {}:{} ({})", server.ip, server.port, server.name);
        }
        FavouritesAction::Remove { address } => {
            let (ip, port) = parse_address(&address)?;
            if list.remove(&ip, port).is_none() {
                bail!("{}:{} is not a favourite", ip, port);
            }
            log::info!("Removed {}:{}", ip, port);
        }
    }
    list.save(&path).await?;
    Ok(())
}

/// Splits `ip[:port]`.
fn parse_address(address: &str) -> anyhow::Result<(String, u32)> {
    match address.rsplit_once(':') {
        Some((ip, port)) => {
            let port = port
                .parse()
                .with_context(|| format!("invalid port in {}", address))?;
            Ok((ip.to_owned(), port))
        }
        None => Ok((address.to_owned(), DEFAULT_PORT)),
    }
}

fn print<T: Serialize + ?Sized>(value: &T, json: bool, human: impl FnOnce(&T)) {
    if !json {
        human(value);
        return;
    }
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{}", text),
        Err(err) => log::error!("Could not serialize result: {}", err),
    }
}

fn print_info(info: &ServerInfo) {
    println!("{}", info.server_name);
    println!("  mode     {}", info.game_mode_name);
    println!("  language {}", info.language);
    println!("  players  {}/{}", info.players, info.max_players);
    println!("  password {}", if info.closed { "yes" } else { "no" });
}

fn print_snapshot(snapshot: &ServerSnapshot) {
    print_info(&snapshot.info);
    for rule in &snapshot.rules {
        println!("  {:<8} {}", rule.name, rule.value);
    }
    for player in &snapshot.players {
        println!("  - {} ({})", player.name, player.score);
    }
}
