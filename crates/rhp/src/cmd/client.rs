use std::time::Duration;

use rhp_exchange::{CancellationToken, Client, ClientConfig};
use rhp_transport::UdpTransport;

use crate::cmd::{install_ctrlc_handler, ClientArgs};
use crate::exit::{exchange_error, CliError, CliResult, USAGE};

/// Defaults, then the config file, then flags.
pub fn load_config(args: &ClientArgs) -> CliResult<ClientConfig> {
    let mut config = match &args.config {
        Some(path) => ClientConfig::from_json_file(path)
            .map_err(|err| exchange_error("failed loading config", err))?,
        None => ClientConfig::default(),
    };

    if let Some(server) = &args.server {
        config.server = server.clone();
    }
    if let Some(timeout) = &args.timeout {
        config.exchange.receive_timeout = parse_duration(timeout)?;
    }
    if let Some(attempts) = args.attempts {
        config.exchange.max_attempts = attempts;
    }
    if let Some(port) = args.control_port {
        config.control_port = port;
    }
    if let Some(port) = args.message_port {
        config.message_port = port;
    }

    config
        .validate()
        .map_err(|err| exchange_error("invalid configuration", err))?;
    Ok(config)
}

/// Connect to the configured server; Ctrl-C cancels the running exchange.
pub fn connect(config: ClientConfig) -> CliResult<Client<UdpTransport>> {
    let cancel = CancellationToken::new();
    install_ctrlc_handler(cancel.clone())?;
    let client = Client::connect(config).map_err(|err| exchange_error("connect failed", err))?;
    Ok(client.with_cancellation(cancel))
}

pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, millis) = match input.strip_suffix("ms") {
        Some(number) => (number, true),
        None => (input.strip_suffix('s').unwrap_or(input), false),
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;
    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    Ok(if millis {
        Duration::from_millis(value)
    } else {
        Duration::from_secs(value)
    })
}
