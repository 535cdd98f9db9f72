use rhp_exchange::run_session;

use crate::cmd::client::{connect, load_config};
use crate::cmd::{finish, SessionArgs};
use crate::exit::{exchange_error, CliResult};
use crate::output::{ExchangeReport, OutputFormat};

pub fn run(args: SessionArgs, format: OutputFormat) -> CliResult<i32> {
    let mut config = load_config(&args.client)?;
    if let Some(greeting) = args.greeting {
        config.greeting = greeting;
    }
    if let Some(src) = args.src {
        config.src_port = src;
    }
    if let Some(dst) = args.dst {
        config.dst_port = dst;
    }

    let mut client = connect(config)?;
    let steps = run_session(&mut client).map_err(|err| exchange_error("session failed", err))?;

    let reports: Vec<ExchangeReport> = steps.iter().map(ExchangeReport::from).collect();
    finish(&reports, format)
}
