use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use nxtlink_frame::{LinkError, Message, Wait};
use nxtlink_session::Connection;
use tracing::info;

use crate::cmd::ListenArgs;
use crate::exit::{link_error, CliError, CliResult, INTERNAL, SUCCESS};
use crate::output::{print_message, OutputFormat};

pub fn run(args: ListenArgs, format: OutputFormat, wait: Wait) -> CliResult<i32> {
    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let mut conn = Connection::new();
    conn.set_wait(wait);
    conn.open().map_err(|err| link_error("open failed", err))?;

    let mut printed = 0usize;

    while running.load(Ordering::SeqCst) {
        match conn.receive() {
            Ok(Message::Data(payload)) => {
                printed = printed.saturating_add(1);
                print_message(&payload, printed, format);
                if let Some(count) = args.count {
                    if printed >= count {
                        break;
                    }
                }
            }
            Ok(Message::Exit) => {
                info!(received = printed, "peer ended the conversation");
                break;
            }
            // An idle poll under the bounded policy; keep waiting.
            Err(LinkError::Timeout { transferred: 0 }) => continue,
            Err(err) => return Err(link_error("receive failed", err)),
        }
    }

    conn.close();
    Ok(SUCCESS)
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
