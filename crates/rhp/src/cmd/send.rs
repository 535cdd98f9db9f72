use rhp_exchange::SessionStep;

use crate::cmd::client::{connect, load_config};
use crate::cmd::{finish, SendArgs};
use crate::exit::{exchange_error, CliResult};
use crate::output::{ExchangeReport, OutputFormat};

pub fn run(args: SendArgs, format: OutputFormat) -> CliResult<i32> {
    let config = load_config(&args.client)?;
    let mut client = connect(config)?;

    let outcome = client
        .send_control(&args.text)
        .map_err(|err| exchange_error("control exchange failed", err))?;

    finish(&[ExchangeReport::new(SessionStep::Control, &outcome)], format)
}
