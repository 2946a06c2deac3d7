use anyhow::{Context, bail};
use mediqa_rig::rag::GeneratedAnswer;
use mediqa_server::handler::response::GENERIC_MESSAGE;

use crate::TRACING_TARGET_CLIENT;
use crate::config::AskArgs;

/// Prints the server's answer to one question.
pub async fn ask(args: &AskArgs) -> anyhow::Result<()> {
    let answer = fetch_answer(&args.api_url, &args.question).await?;
    println!("{answer}");
    Ok(())
}

/// Calls `GET {api_url}/generate` and returns the first generated text.
///
/// Any non-200 answer fails with the generic message.
pub async fn fetch_answer(api_url: &str, question: &str) -> anyhow::Result<String> {
    let url = format!("{}/generate", api_url.trim_end_matches('/'));

    let response = reqwest::Client::new()
        .get(&url)
        .query(&[("question", question)])
        .send()
        .await
        .with_context(|| format!("failed to reach {url}"))?;

    let status = response.status();
    if !status.is_success() {
        tracing::warn!(
            target: TRACING_TARGET_CLIENT,
            status = status.as_u16(),
            "API answered with an error"
        );
        bail!(GENERIC_MESSAGE);
    }

    let batches: Vec<Vec<GeneratedAnswer>> = response
        .json()
        .await
        .context("malformed API response")?;

    batches
        .into_iter()
        .next()
        .and_then(|batch| batch.into_iter().next())
        .map(|answer| answer.generated_text)
        .context("API response holds no answer")
}
