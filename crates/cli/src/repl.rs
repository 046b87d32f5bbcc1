//! Interactive query loop

use dgrep_core::{Query, EXIT_COMMAND};
use dgrep_engine::Engine;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

pub const PROMPT: &str = "Enter grep command:\n$ ";

/// Read queries line by line until `exit` or end of input, printing a report
/// for each. Invalid input is reported and the loop carries on.
pub async fn run<R, W>(engine: &Engine, input: R, mut output: W) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = input.lines();
    loop {
        output.write_all(PROMPT.as_bytes()).await?;
        output.flush().await?;

        let Some(line) = lines.next_line().await? else {
            tracing::debug!("End of input");
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == EXIT_COMMAND {
            break;
        }

        match Query::parse(line) {
            Ok(query) => {
                let report = engine.execute(&query).await;
                output.write_all(report.to_string().as_bytes()).await?;
            }
            Err(e) => {
                output.write_all(format!("{e}\n").as_bytes()).await?;
            }
        }
    }
    output.flush().await
}
