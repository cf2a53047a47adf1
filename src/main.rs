use anyhow::{anyhow, Result};
use clap::{value_parser, Arg, ArgMatches, Command};
use etherscan_client::{
    config::Config,
    etherscan::{Client, PageQuery, SortOrder, TransactionKind},
};
use serde::Serialize;
use serde_json::json;
use std::collections::{BTreeMap, HashMap};
use tracing::{error, info};

fn page_args() -> [Arg; 5] {
    [
        Arg::new("start-block")
            .long("start-block")
            .value_name("BLOCK")
            .value_parser(value_parser!(u64))
            .help("First block of the range (default 0)"),
        Arg::new("end-block")
            .long("end-block")
            .value_name("BLOCK")
            .value_parser(value_parser!(u64))
            .help("Last block of the range (default 999999999)"),
        Arg::new("page")
            .long("page")
            .value_parser(value_parser!(u32))
            .help("Page number (default 1)"),
        Arg::new("limit")
            .long("limit")
            .value_parser(value_parser!(u32))
            .help("Records per page (default 1000)"),
        Arg::new("sort")
            .long("sort")
            .value_parser(["asc", "desc"])
            .help("Sort order by block number (default asc)"),
    ]
}

fn page_query(matches: &ArgMatches) -> Result<PageQuery> {
    let defaults = PageQuery::default();
    let sort = match matches.get_one::<String>("sort") {
        Some(sort) => sort.parse::<SortOrder>()?,
        None => defaults.sort,
    };

    Ok(PageQuery {
        start_block: matches
            .get_one::<u64>("start-block")
            .copied()
            .unwrap_or(defaults.start_block),
        end_block: matches
            .get_one::<u64>("end-block")
            .copied()
            .unwrap_or(defaults.end_block),
        page: matches.get_one::<u32>("page").copied().unwrap_or(defaults.page),
        limit: matches.get_one::<u32>("limit").copied().unwrap_or(defaults.limit),
        sort,
    })
}

fn cli() -> Command {
    Command::new("etherscan-client")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Query the etherscan.io API")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .global(true)
                .help("Path to configuration file"),
        )
        .arg(
            Arg::new("network")
                .short('n')
                .long("network")
                .value_name("NETWORK")
                .global(true)
                .help("Network to query (mainnet, ropsten, kovan, rinkeby)"),
        )
        .arg(
            Arg::new("api-key")
                .short('k')
                .long("api-key")
                .value_name("KEY")
                .global(true)
                .help("Etherscan API key"),
        )
        .arg(
            Arg::new("generate-config")
                .long("generate-config")
                .help("Generate a sample configuration file and exit")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("config-path")
                .long("config-path")
                .help("Print the default configuration file path and exit")
                .action(clap::ArgAction::SetTrue),
        )
        .subcommand(Command::new("price").about("Last ETH price in BTC and USD"))
        .subcommand(Command::new("supply").about("Total ETH supply in wei"))
        .subcommand(
            Command::new("balance")
                .about("ETH balance of one or more addresses in wei")
                .arg(Arg::new("address").required(true).num_args(1..)),
        )
        .subcommand(
            Command::new("txs")
                .about("Transactions of an address")
                .arg(Arg::new("address").required(true))
                .arg(
                    Arg::new("type")
                        .short('t')
                        .long("type")
                        .default_value("normal")
                        .help("Transaction type: normal or internal"),
                )
                .args(page_args()),
        )
        .subcommand(
            Command::new("internal-txs")
                .about("Internal transactions of an address")
                .arg(Arg::new("address").required(true))
                .args(page_args()),
        )
        .subcommand(
            Command::new("token-txs")
                .about("ERC-20 transfers of a token contract and/or an address")
                .arg(Arg::new("contract").long("contract").value_name("ADDRESS"))
                .arg(Arg::new("address").long("address").value_name("ADDRESS"))
                .args(page_args()),
        )
        .subcommand(Command::new("gas-price").about("Current gas price in wei"))
        .subcommand(Command::new("block-number").about("Number of the latest block"))
        .subcommand(
            Command::new("block")
                .about("Block by number, with full transactions")
                .arg(
                    Arg::new("number")
                        .required(true)
                        .value_parser(value_parser!(u64)),
                ),
        )
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn required<'a>(matches: &'a ArgMatches, name: &str) -> Result<&'a String> {
    matches
        .get_one::<String>(name)
        .ok_or_else(|| anyhow!("Missing argument <{}>", name))
}

async fn run_command(client: &Client, name: &str, matches: &ArgMatches) -> Result<()> {
    match name {
        "price" => print_json(&client.get_eth_price().await?),
        "supply" => {
            let supply = client.get_eth_supply().await?;
            print_json(&json!({ "supply": supply.to_string() }))
        }
        "balance" => {
            let addresses: Vec<&String> = matches
                .get_many::<String>("address")
                .map(|values| values.collect())
                .unwrap_or_default();

            let balances = if let [address] = addresses.as_slice() {
                HashMap::from([(address.to_string(), client.get_eth_balance(address).await?)])
            } else {
                client.get_eth_balances(&addresses).await?
            };

            let balances: BTreeMap<String, String> = balances
                .into_iter()
                .map(|(address, balance)| (address, balance.to_string()))
                .collect();
            print_json(&balances)
        }
        "txs" => {
            let kind: TransactionKind = required(matches, "type")?.parse()?;
            let transactions = client
                .get_transactions_by_address(
                    required(matches, "address")?,
                    kind,
                    &page_query(matches)?,
                )
                .await?;
            print_json(&transactions)
        }
        "internal-txs" => {
            let transactions = client
                .get_internal_transactions(required(matches, "address")?, &page_query(matches)?)
                .await?;
            print_json(&transactions)
        }
        "token-txs" => {
            let transactions = client
                .get_token_transactions(
                    matches.get_one::<String>("contract").map(String::as_str),
                    matches.get_one::<String>("address").map(String::as_str),
                    &page_query(matches)?,
                )
                .await?;
            print_json(&transactions)
        }
        "gas-price" => {
            let gas_price = client.get_gas_price().await?;
            print_json(&json!({ "gas_price": gas_price.to_string() }))
        }
        "block-number" => print_json(&json!({ "block_number": client.get_block_number().await? })),
        "block" => {
            let number = matches
                .get_one::<u64>("number")
                .copied()
                .ok_or_else(|| anyhow!("Missing argument <number>"))?;
            print_json(&client.get_block_by_number(number).await?)
        }
        other => Err(anyhow!("Unknown command '{}'", other)),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so that stdout stays valid JSON
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let mut command = cli();
    let matches = command.clone().get_matches();

    // Handle special commands first
    if matches.get_flag("generate-config") {
        println!("{}", Config::generate_sample());
        return Ok(());
    }

    if matches.get_flag("config-path") {
        match Config::default_config_path() {
            Ok(path) => {
                println!("{}", path.display());
                return Ok(());
            }
            Err(e) => {
                error!("Could not determine default config path: {}", e);
                return Err(e);
            }
        }
    }

    let Some((name, sub_matches)) = matches.subcommand() else {
        command.print_help()?;
        return Ok(());
    };

    // Global flags are propagated down to the subcommand
    let config_path = sub_matches.get_one::<String>("config").map(|s| s.as_str());
    let mut config = Config::load_or_default(config_path).await;

    // Override with command line arguments
    if let Some(network) = sub_matches.get_one::<String>("network") {
        config.network = network.parse()?;
    }

    if let Some(api_key) = sub_matches.get_one::<String>("api-key") {
        config.api_key = Some(api_key.clone());
    }

    info!("Using network: {}", config.network);

    let client = config.client()?;

    if let Err(e) = run_command(&client, name, sub_matches).await {
        error!("{} failed: {}", name, e);
        return Err(e);
    }

    Ok(())
}
