use std::time::Duration;

use distributed_cache::client::ApiClient;
use distributed_cache::protocol::api::ApiCode;

fn print_usage(program: &str) {
    eprintln!("Usage: {} <api-addr> set <key> [<value>]", program);
    eprintln!("       {} <api-addr> get <key>", program);
    eprintln!("       {} <api-addr> status", program);
    eprintln!();
    eprintln!("Setting an empty (or omitted) value deletes the key.");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|arg| arg == "--help") {
        print_usage(&args[0]);
        return Ok(());
    }
    if args.len() < 3 {
        print_usage(&args[0]);
        std::process::exit(1);
    }

    let addr = &args[1];
    let deadline = Duration::from_secs(10);
    let client = ApiClient::connect(addr, deadline).await?;

    match args[2].as_str() {
        "set" => {
            let Some(key) = args.get(3) else {
                print_usage(&args[0]);
                std::process::exit(1);
            };
            let value = args.get(4).map(String::as_str).unwrap_or("");
            match client.set(key, value).await? {
                ApiCode::NoError => println!("OK"),
                ApiCode::TooBig => {
                    eprintln!("error: entry is too big for the cache");
                    std::process::exit(1);
                }
                ApiCode::Timeout => {
                    eprintln!("error: timeout, some owners did not confirm");
                    std::process::exit(1);
                }
                other => {
                    eprintln!("error: {:?}", other);
                    std::process::exit(1);
                }
            }
        }
        "get" => {
            let Some(key) = args.get(3) else {
                print_usage(&args[0]);
                std::process::exit(1);
            };
            match client.get(key).await? {
                Some(value) => println!("{}", value),
                None => {
                    eprintln!("(not found)");
                    std::process::exit(1);
                }
            }
        }
        "status" => {
            let status = client.status().await?;
            println!("node:    {}", status.node_id);
            println!("others:  {}", status.other_ids.join(", "));
            println!("keys:    {}", status.keys);
            println!("used:    {} chars", status.used_chars);
        }
        other => {
            eprintln!("Unknown command: {}", other);
            print_usage(&args[0]);
            std::process::exit(1);
        }
    }

    Ok(())
}
