use crate::core::Prompt;
use std::io::{self, BufRead, Write};
use tracing::warn;

/// Asks yes/no questions on the controlling terminal. Anything other than an
/// explicit yes is a no.
#[derive(Clone, Debug, Default)]
pub struct TerminalPrompt;

#[async_trait::async_trait]
impl Prompt for TerminalPrompt {
    async fn confirm(&self, message: &str) -> bool {
        let message = message.to_string();
        let answer = tokio::task::spawn_blocking(move || {
            ask(&message, &mut io::stdin().lock(), &mut io::stdout().lock())
        })
        .await;
        match answer {
            Ok(Ok(yes)) => yes,
            Ok(Err(error)) => {
                warn!(%error, "Failed to read answer");
                false
            }
            Err(error) => {
                warn!(%error, "Prompt task failed");
                false
            }
        }
    }
}

fn ask(message: &str, input: &mut impl BufRead, output: &mut impl Write) -> io::Result<bool> {
    write!(output, "{message} [y/N] ")?;
    output.flush()?;

    let mut line = String::new();
    input.read_line(&mut line)?;
    Ok(matches!(
        line.trim().to_ascii_lowercase().as_str(),
        "y" | "yes"
    ))
}
