use crate::protocol::{JsonRpcError, JsonRpcResponse};
use crate::server::McpServer;
use serde_json::Value;
use ssyk_core::SsykResult;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, info, warn};

/// Serve MCP over the process's stdin/stdout until stdin closes.
///
/// Logs must not go to stdout while this runs.
pub async fn serve_stdio(server: Arc<McpServer>) -> SsykResult<()> {
    info!("MCP server listening on stdio");
    serve_lines(
        &server,
        BufReader::new(tokio::io::stdin()),
        tokio::io::stdout(),
    )
    .await
}

/// Newline-delimited JSON-RPC loop over any reader/writer pair.
pub async fn serve_lines<R, W>(server: &McpServer, mut reader: R, mut writer: W) -> SsykResult<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buf = Vec::new();
    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf).await? == 0 {
            break;
        }

        let response = match std::str::from_utf8(&buf) {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                server.handle_message(line).await
            }
            Err(e) => {
                warn!(error = %e, "Non UTF-8 line on stdin");
                Some(JsonRpcResponse::failure(
                    Value::Null,
                    JsonRpcError::parse_error(e),
                ))
            }
        };

        if let Some(response) = response {
            let mut out = serde_json::to_string(&response)?;
            out.push('\n');
            writer.write_all(out.as_bytes()).await?;
            writer.flush().await?;
        }
    }

    debug!("stdin closed, stopping stdio transport");
    Ok(())
}
