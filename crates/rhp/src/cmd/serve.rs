use std::time::Duration;

use rhp_exchange::{serve, CancellationToken, Responder, ResponderConfig};
use rhp_transport::{resolve, UdpServer};
use tracing::info;

use crate::cmd::{install_ctrlc_handler, ServeArgs};
use crate::exit::{exchange_error, transport_error, CliResult, SUCCESS};
use crate::output::{print_listening, print_served, OutputFormat};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

pub fn run(args: ServeArgs, format: OutputFormat) -> CliResult<i32> {
    let local = resolve(&args.bind).map_err(|err| transport_error("invalid bind address", err))?;
    let server = UdpServer::bind(local).map_err(|err| transport_error("bind failed", err))?;
    let addr = server
        .local_addr()
        .map_err(|err| transport_error("bind failed", err))?;

    let cancel = CancellationToken::new();
    install_ctrlc_handler(cancel.clone())?;

    let mut responder = Responder::new(responder_config(&args));
    info!(%addr, corrupt = args.corrupt, "responder listening");
    print_listening(addr, format);

    let replies = serve(&server, &mut responder, &cancel, POLL_INTERVAL, args.count)
        .map_err(|err| exchange_error("serve failed", err))?;

    print_served(replies, format);
    Ok(SUCCESS)
}

fn responder_config(args: &ServeArgs) -> ResponderConfig {
    let defaults = ResponderConfig::default();
    ResponderConfig {
        port_id: args.port_id.unwrap_or(defaults.port_id),
        control_reply: args.reply.clone().unwrap_or(defaults.control_reply),
        message: args.message.clone().unwrap_or(defaults.message),
        id: args.id.unwrap_or(defaults.id),
        corrupt_replies: args.corrupt,
    }
}
