// SPDX-License-Identifier: MIT

//! Interactive line-based chat loop

use std::fmt::Display;
use std::future::Future;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

const EXIT_COMMANDS: [&str; 3] = ["quit", "exit", "bye"];

/// `quit`, `exit` or `bye`, ignoring case and surrounding whitespace
pub fn is_exit_command(line: &str) -> bool {
    let line = line.trim();
    EXIT_COMMANDS.iter().any(|cmd| line.eq_ignore_ascii_case(cmd))
}

/// Read one turn per line and write the reply of `respond`
///
/// The loop ends on an exit command or end of input. A failing turn is
/// reported and the loop continues.
pub async fn run_chat_loop<R, W, F, Fut, E>(
    input: R,
    mut output: W,
    mut respond: F,
) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
    F: FnMut(String) -> Fut,
    Fut: Future<Output = Result<String, E>>,
    E: Display,
{
    let mut lines = input.lines();
    output
        .write_all(b"Type your message, or quit/exit/bye to leave\n")
        .await?;

    loop {
        output.write_all(b"User: ").await?;
        output.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        if is_exit_command(&line) {
            output.write_all(b"Goodbye!\n").await?;
            break;
        }
        let turn = line.trim().to_string();
        if turn.is_empty() {
            continue;
        }

        match respond(turn.clone()).await {
            Ok(reply) => {
                output
                    .write_all(format!("Assistant: {reply}\n").as_bytes())
                    .await?
            }
            Err(e) => {
                log::error!("Chat turn failed: {}", e);
                output
                    .write_all(format!("'{turn}' failed: {e}\n").as_bytes())
                    .await?
            }
        }
    }

    output.flush().await
}
