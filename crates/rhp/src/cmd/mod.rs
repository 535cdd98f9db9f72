use std::path::PathBuf;

use clap::{Args, Subcommand, ValueEnum};
use rhp_exchange::CancellationToken;

use crate::exit::{CliError, CliResult, INTERNAL, SUCCESS, TIMEOUT};
use crate::output::{print_reports, ExchangeReport, OutputFormat};

pub mod client;
pub mod request;
pub mod send;
pub mod serve;
pub mod session;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Send a Control frame and print the verified reply.
    Send(SendArgs),
    /// Send an embedded RHMP request and print the verified reply.
    Request(RequestArgs),
    /// Run the greeting, message and ID exchanges in order.
    Session(SessionArgs),
    /// Answer RHP requests on a local UDP socket.
    Serve(ServeArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Send(args) => send::run(args, format),
        Command::Request(args) => request::run(args, format),
        Command::Session(args) => session::run(args, format),
        Command::Serve(args) => serve::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

/// Connection and retry options shared by the client commands.
#[derive(Args, Debug, Default)]
pub struct ClientArgs {
    /// Server address (host:port).
    #[arg(long, env = "RHP_SERVER")]
    pub server: Option<String>,
    /// JSON client configuration; flags override its values.
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,
    /// Receive timeout per attempt (e.g. 2s, 500ms).
    #[arg(long)]
    pub timeout: Option<String>,
    /// Receive attempts per exchange.
    #[arg(long)]
    pub attempts: Option<u32>,
    /// RHP port ID used for Control frames.
    #[arg(long)]
    pub control_port: Option<u16>,
    /// RHP port ID used for frames carrying RHMP messages.
    #[arg(long)]
    pub message_port: Option<u16>,
}

#[derive(Args, Debug)]
pub struct SendArgs {
    /// Control text to send.
    #[arg(default_value = "hello")]
    pub text: String,
    #[command(flatten)]
    pub client: ClientArgs,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum RequestKind {
    /// Ask for the destination's message text.
    Message,
    /// Ask for the destination's identifier.
    Id,
}

#[derive(Args, Debug)]
pub struct RequestArgs {
    /// What to ask for.
    #[arg(value_enum)]
    pub kind: RequestKind,
    /// RHMP source port (14 bits).
    #[arg(long)]
    pub src: Option<u16>,
    /// RHMP destination port (14 bits).
    #[arg(long)]
    pub dst: Option<u16>,
    #[command(flatten)]
    pub client: ClientArgs,
}

#[derive(Args, Debug)]
pub struct SessionArgs {
    /// Control text for the first exchange.
    #[arg(long)]
    pub greeting: Option<String>,
    /// RHMP source port for the message and ID requests.
    #[arg(long)]
    pub src: Option<u16>,
    /// RHMP destination port for the message and ID requests.
    #[arg(long)]
    pub dst: Option<u16>,
    #[command(flatten)]
    pub client: ClientArgs,
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Local address to bind (host:port). Port 0 picks a free port.
    #[arg(long, default_value = "127.0.0.1:1874")]
    pub bind: String,
    /// RHP port ID stamped on replies.
    #[arg(long)]
    pub port_id: Option<u16>,
    /// Text of Control replies.
    #[arg(long)]
    pub reply: Option<String>,
    /// Text of MessageResponse replies.
    #[arg(long)]
    pub message: Option<String>,
    /// Identifier carried by IdResponse replies.
    #[arg(long)]
    pub id: Option<u32>,
    /// Break the checksum of the first N replies.
    #[arg(long, default_value = "0")]
    pub corrupt: u32,
    /// Exit after sending N replies.
    #[arg(long)]
    pub count: Option<usize>,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// Print the reports; exhaustion of any exchange exits with [`TIMEOUT`].
pub(crate) fn finish(reports: &[ExchangeReport], format: OutputFormat) -> CliResult<i32> {
    print_reports(reports, format);
    if reports.iter().all(|report| report.success) {
        Ok(SUCCESS)
    } else {
        Ok(TIMEOUT)
    }
}

pub(crate) fn install_ctrlc_handler(cancel: CancellationToken) -> CliResult<()> {
    ctrlc::set_handler(move || cancel.cancel()).map_err(|err| {
        CliError::new(INTERNAL, format!("signal handler setup failed: {err}"))
    })
}
