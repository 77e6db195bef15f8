use nxtlink_frame::Wait;
use nxtlink_session::Connection;
use nxtlink_transport::brick::{PRODUCT_NXT, VENDOR_LEGO};
use rusb::UsbContext;
use serde::Serialize;

use crate::cmd::ProbeArgs;
use crate::exit::{CliResult, FAILURE, SUCCESS};
use crate::output::OutputFormat;

#[derive(Clone, Copy, Debug, Serialize)]
#[serde(rename_all = "lowercase")]
enum CheckStatus {
    Pass,
    Fail,
    Skip,
}

#[derive(Debug, Serialize)]
struct CheckResult {
    name: String,
    status: CheckStatus,
    detail: String,
}

#[derive(Debug, Serialize)]
struct ProbeOutput {
    checks: Vec<CheckResult>,
    overall: &'static str,
}

pub fn run(args: ProbeArgs, format: OutputFormat, wait: Wait) -> CliResult<i32> {
    let checks = vec![
        usb_stack_check(),
        brick_visible_check(),
        handshake_check(&args, wait),
    ];

    let has_fail = checks.iter().any(|c| matches!(c.status, CheckStatus::Fail));
    let overall = if has_fail { "fail" } else { "pass" };

    let output = ProbeOutput { checks, overall };
    print_probe(&output, format);

    if has_fail {
        Ok(FAILURE)
    } else {
        Ok(SUCCESS)
    }
}

fn usb_stack_check() -> CheckResult {
    let name = "usb_stack".to_string();
    let libusb = rusb::version();
    match rusb::Context::new() {
        Ok(_) => CheckResult {
            name,
            status: CheckStatus::Pass,
            detail: format!(
                "libusb {}.{}.{} initialised",
                libusb.major(),
                libusb.minor(),
                libusb.micro()
            ),
        },
        Err(err) => CheckResult {
            name,
            status: CheckStatus::Fail,
            detail: format!("libusb context failed: {err}"),
        },
    }
}

fn brick_visible_check() -> CheckResult {
    let name = "brick_visible".to_string();
    let context = match rusb::Context::new() {
        Ok(context) => context,
        Err(err) => {
            return CheckResult {
                name,
                status: CheckStatus::Fail,
                detail: format!("libusb context failed: {err}"),
            }
        }
    };
    let devices = match context.devices() {
        Ok(devices) => devices,
        Err(err) => {
            return CheckResult {
                name,
                status: CheckStatus::Fail,
                detail: format!("bus enumeration failed: {err}"),
            }
        }
    };

    for device in devices.iter() {
        let descriptor = match device.device_descriptor() {
            Ok(descriptor) => descriptor,
            Err(_) => continue,
        };
        if descriptor.vendor_id() == VENDOR_LEGO && descriptor.product_id() == PRODUCT_NXT {
            return CheckResult {
                name,
                status: CheckStatus::Pass,
                detail: format!(
                    "NXT at bus {:03} address {:03}",
                    device.bus_number(),
                    device.address()
                ),
            };
        }
    }

    CheckResult {
        name,
        status: CheckStatus::Fail,
        detail: format!("no NXT on the bus (vendor {VENDOR_LEGO:#06x} product {PRODUCT_NXT:#06x})"),
    }
}

fn handshake_check(args: &ProbeArgs, wait: Wait) -> CheckResult {
    let name = "packet_mode".to_string();
    if !args.handshake {
        return CheckResult {
            name,
            status: CheckStatus::Skip,
            detail: "pass --handshake to test a full open/close round trip".to_string(),
        };
    }

    let mut conn = Connection::new();
    conn.set_wait(wait);
    match conn.open() {
        Ok(_) => {
            conn.close();
            CheckResult {
                name,
                status: CheckStatus::Pass,
                detail: "handshake and shutdown completed".to_string(),
            }
        }
        Err(err) => CheckResult {
            name,
            status: CheckStatus::Fail,
            detail: format!("open failed: {err}"),
        },
    }
}

fn print_probe(output: &ProbeOutput, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string(output).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table | OutputFormat::Pretty => {
            println!("nxtlink probe\n");
            for check in &output.checks {
                println!(
                    "  [{:>4}] {:<16} {}",
                    status_text(check.status),
                    check.name,
                    check.detail
                );
            }
            if output.overall == "pass" {
                println!("\n  Result: all checks passed");
            } else {
                println!("\n  Result: one or more checks failed");
            }
        }
        OutputFormat::Raw => {
            println!("{}", output.overall);
        }
    }
}

fn status_text(status: CheckStatus) -> &'static str {
    match status {
        CheckStatus::Pass => "PASS",
        CheckStatus::Fail => "FAIL",
        CheckStatus::Skip => "SKIP",
    }
}
