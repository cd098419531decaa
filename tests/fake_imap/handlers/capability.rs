//! CAPABILITY: the extensions this server instance advertises.

use crate::fake_imap::io::respond;
use tokio::io::{AsyncRead, AsyncWrite, BufReader};

pub async fn handle_capability<S: AsyncRead + AsyncWrite + Unpin>(
    tag: &str,
    capabilities: &[String],
    stream: &mut BufReader<S>,
) {
    let mut line = "* CAPABILITY IMAP4rev1".to_string();
    for cap in capabilities {
        line.push(' ');
        line.push_str(cap);
    }
    line.push_str("\r\n");

    respond(stream, &[line], &format!("{tag} OK CAPABILITY completed\r\n")).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake_imap::io::capture;

    #[tokio::test]
    async fn lists_extensions() {
        let caps = vec!["MOVE".to_string(), "UIDPLUS".to_string()];
        let output = capture(async |s| handle_capability("A0", &caps, s).await).await;
        assert_eq!(
            output,
            "* CAPABILITY IMAP4rev1 MOVE UIDPLUS\r\nA0 OK CAPABILITY completed\r\n"
        );
    }

    #[tokio::test]
    async fn bare_server() {
        let output = capture(async |s| handle_capability("A0", &[], s).await).await;
        assert!(output.starts_with("* CAPABILITY IMAP4rev1\r\n"));
    }
}
