use std::io::{IsTerminal, Write};
use std::net::SocketAddr;

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use rhp_exchange::{ExchangeOutcome, SessionStep, StepReport};
use rhp_frame::{InnerMessage, MessageBody, RhpFrame};
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

/// One finished exchange as shown to the user.
#[derive(Debug, Serialize)]
pub struct ExchangeReport {
    pub step: &'static str,
    pub success: bool,
    pub attempts: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply: Option<FrameReport>,
    #[serde(skip)]
    raw_payload: Vec<u8>,
}

impl ExchangeReport {
    pub fn new(step: SessionStep, outcome: &ExchangeOutcome) -> Self {
        let frame = outcome.frame();
        Self {
            step: step.name(),
            success: outcome.is_success(),
            attempts: outcome.attempts(),
            reply: frame.map(FrameReport::from),
            raw_payload: frame.map(|f| f.raw_payload.to_vec()).unwrap_or_default(),
        }
    }
}

impl From<&StepReport> for ExchangeReport {
    fn from(report: &StepReport) -> Self {
        Self::new(report.step, &report.outcome)
    }
}

/// Every header and payload field of a received frame.
#[derive(Debug, Serialize)]
pub struct FrameReport {
    pub version: u8,
    pub frame_type: &'static str,
    pub port_id: u16,
    pub length: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<MessageReport>,
    pub checksum: String,
    pub wire_bytes: usize,
    pub declared_bytes: usize,
}

impl From<&RhpFrame> for FrameReport {
    fn from(frame: &RhpFrame) -> Self {
        Self {
            version: frame.version,
            frame_type: frame.frame_type().name(),
            port_id: frame.port_id,
            length: frame.length,
            text: frame.control_text(),
            message: frame.message().map(MessageReport::from),
            checksum: format!("0x{:04X}", frame.checksum),
            wire_bytes: frame.wire_len(),
            declared_bytes: frame.declared_len(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MessageReport {
    pub msg_type: &'static str,
    pub src_port: u16,
    pub dst_port: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl From<&InnerMessage> for MessageReport {
    fn from(message: &InnerMessage) -> Self {
        let id = match message.body {
            MessageBody::IdResponse(id) => Some(id),
            _ => None,
        };
        Self {
            msg_type: message.msg_type().name(),
            src_port: message.src_port,
            dst_port: message.dst_port,
            id,
            text: message.text(),
        }
    }
}

pub fn print_reports(reports: &[ExchangeReport], format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            for report in reports {
                println!(
                    "{}",
                    serde_json::to_string(report).unwrap_or_else(|_| "{}".to_string())
                );
            }
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec![
                    "STEP", "RESULT", "ATTEMPTS", "TYPE", "PORT", "LEN", "CONTENT", "CHECKSUM",
                    "BYTES",
                ]);
            for report in reports {
                table.add_row(table_row(report));
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            for report in reports {
                println!("{}", pretty_line(report));
            }
        }
        OutputFormat::Raw => {
            for report in reports {
                print_raw(&report.raw_payload);
            }
        }
    }
}

pub fn print_listening(addr: SocketAddr, format: OutputFormat) {
    match format {
        OutputFormat::Json => println!("{}", serde_json::json!({ "listening": addr.to_string() })),
        _ => println!("listening on {addr}"),
    }
}

pub fn print_served(replies: usize, format: OutputFormat) {
    match format {
        OutputFormat::Json => println!("{}", serde_json::json!({ "replies": replies })),
        _ => println!("sent {replies} replies"),
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

fn result_label(report: &ExchangeReport) -> &'static str {
    if report.success {
        "ok"
    } else {
        "exhausted"
    }
}

fn table_row(report: &ExchangeReport) -> Vec<String> {
    let mut row = vec![
        report.step.to_string(),
        result_label(report).to_string(),
        report.attempts.to_string(),
    ];
    match &report.reply {
        Some(frame) => row.extend([
            frame.frame_type.to_string(),
            frame.port_id.to_string(),
            frame.length.to_string(),
            content(frame),
            frame.checksum.clone(),
            format!("{} ({} declared)", frame.wire_bytes, frame.declared_bytes),
        ]),
        None => row.extend(std::iter::repeat_n(String::from("-"), 6)),
    }
    row
}

fn pretty_line(report: &ExchangeReport) -> String {
    let head = format!(
        "{}: {} after {} attempt(s)",
        report.step,
        result_label(report),
        report.attempts
    );
    match &report.reply {
        Some(frame) => format!(
            "{head} version={} type={} port={} length={} {} checksum={} bytes={} declared={}",
            frame.version,
            frame.frame_type,
            frame.port_id,
            frame.length,
            content(frame),
            frame.checksum,
            frame.wire_bytes,
            frame.declared_bytes
        ),
        None => head,
    }
}

fn content(frame: &FrameReport) -> String {
    if let Some(text) = &frame.text {
        return format!("text={text:?}");
    }
    match &frame.message {
        Some(message) => {
            let mut out = format!(
                "{} src={} dst={}",
                message.msg_type, message.src_port, message.dst_port
            );
            if let Some(id) = message.id {
                out.push_str(&format!(" id={id}"));
            }
            if let Some(text) = &message.text {
                out.push_str(&format!(" text={text:?}"));
            }
            out
        }
        None => String::new(),
    }
}
