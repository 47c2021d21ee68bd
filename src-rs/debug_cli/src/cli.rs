use std::env;
use std::path::PathBuf;
use std::time::Duration;

use downloader_client_rs::helpers::{env_bool, parse_on_off};
use downloader_client_rs::ClientConfig;

use crate::models::ConsoleConfig;

pub fn parse_config() -> ConsoleConfig {
    let mut cfg = ConsoleConfig {
        client: ClientConfig::from_env(),
        debug: env_bool("DOWNLOADER_DEBUG", false),
    };

    let args: Vec<String> = env::args().collect();
    let mut idx = 1;
    while idx < args.len() {
        match args[idx].as_str() {
            "--base" => {
                if let Some(value) = args.get(idx + 1) {
                    cfg.client.base_url = value.clone();
                    idx += 1;
                }
            }
            "--history" => {
                if let Some(value) = args.get(idx + 1) {
                    cfg.client.history_path = Some(PathBuf::from(value));
                    idx += 1;
                }
            }
            "--poll-ms" => {
                if let Some(value) = args.get(idx + 1) {
                    if let Ok(parsed) = value.parse::<u64>() {
                        cfg.client.poll_interval = Duration::from_millis(parsed);
                    }
                    idx += 1;
                }
            }
            "--debug" => match args.get(idx + 1).map(|value| parse_on_off(value)) {
                Some(Some(flag)) => {
                    cfg.debug = flag;
                    idx += 1;
                }
                _ => cfg.debug = true,
            },
            _ => {}
        }
        idx += 1;
    }

    cfg
}
