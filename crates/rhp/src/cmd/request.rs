use rhp_exchange::SessionStep;

use crate::cmd::client::{connect, load_config};
use crate::cmd::{finish, RequestArgs, RequestKind};
use crate::exit::{exchange_error, CliResult};
use crate::output::{ExchangeReport, OutputFormat};

pub fn run(args: RequestArgs, format: OutputFormat) -> CliResult<i32> {
    let config = load_config(&args.client)?;
    let src = args.src.unwrap_or(config.src_port);
    let dst = args.dst.unwrap_or(config.dst_port);
    let mut client = connect(config)?;

    let (step, outcome) = match args.kind {
        RequestKind::Message => (
            SessionStep::MessageRequest,
            client.request_message(src, dst),
        ),
        RequestKind::Id => (SessionStep::IdRequest, client.request_id(src, dst)),
    };
    let outcome = outcome.map_err(|err| exchange_error("rhmp exchange failed", err))?;

    finish(&[ExchangeReport::new(step, &outcome)], format)
}
