//! Two-agent collaboration: A analyses the task, B builds on A's output.

use claude_agent::{ClaudeClient, CompletionRequest, TokenUsage};
use serde::Serialize;

use crate::agents::AgentLoader;
use crate::error::Result;
use crate::types::Agent;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CollaborationResult {
    pub agent_a: Agent,
    pub agent_b: Agent,
    pub agent_a_output: String,
    pub agent_b_output: String,
    /// The single reply sent to the user.
    pub combined: String,
    /// Sum over both invocations.
    pub usage: TokenUsage,
    /// Model reported by the first invocation.
    pub model: String,
}

pub fn first_prompt(agent_b: Agent, task: &str) -> String {
    format!(
        "You are collaborating with the @{agent_b} agent. Your task: {task}\n\nProvide your analysis, recommendations, or output. The @{agent_b} agent will build on your work, so be thorough and specific."
    )
}

pub fn second_prompt(agent_a: Agent, task: &str, agent_a_output: &str) -> String {
    format!(
        "You are collaborating with the @{agent_a} agent on this task: \"{task}\"\n\nHere's what @{agent_a} provided:\n\n---\n{agent_a_output}\n---\n\nNow, based on @{agent_a}'s analysis, provide your specialized contribution. Build on their work and deliver the final output."
    )
}

pub fn combine(agent_a: Agent, agent_b: Agent, a_output: &str, b_output: &str) -> String {
    format!(
        "🤝 **Collaboration: @{agent_a} + @{agent_b}**\n\n**@{agent_a}'s Analysis:**\n{a_output}\n\n---\n\n**@{agent_b}'s Contribution:**\n{b_output}"
    )
}

/// Run A then B. A failure before B is invoked returns immediately, so a
/// failed first call never costs a second one.
pub async fn run(
    loader: &AgentLoader,
    claude: &ClaudeClient,
    agent_a: Agent,
    agent_b: Agent,
    task: &str,
) -> Result<CollaborationResult> {
    tracing::info!(%agent_a, %agent_b, "collaboration started");

    let profile_a = loader.load(agent_a).await?;
    let first = claude
        .complete(CompletionRequest::new(
            profile_a.instructions,
            first_prompt(agent_b, task),
        ))
        .await?;
    tracing::info!(agent = %agent_a, tokens = first.usage.total(), "collaboration step 1 complete");

    let profile_b = loader.load(agent_b).await?;
    let second = claude
        .complete(CompletionRequest::new(
            profile_b.instructions,
            second_prompt(agent_a, task, &first.text),
        ))
        .await?;
    tracing::info!(agent = %agent_b, tokens = second.usage.total(), "collaboration step 2 complete");

    let usage = first.usage + second.usage;
    tracing::info!(%agent_a, %agent_b, tokens = usage.total(), "collaboration complete");

    Ok(CollaborationResult {
        agent_a,
        agent_b,
        combined: combine(agent_a, agent_b, &first.text, &second.text),
        agent_a_output: first.text,
        agent_b_output: second.text,
        usage,
        model: first.model,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ContentConfig;
    use crate::content::ContentStore;
    use crate::error::CockpitError;
    use claude_agent::ClientConfig;
    use mockito::{Matcher, Server};

    fn instructions(name: &str) -> String {
        format!("# {name}\n\n## Role\n{}", "You help founders ship. ".repeat(10))
    }

    fn reply(text: &str, input: u64, output: u64) -> String {
        serde_json::json!({
            "id": "msg",
            "type": "message",
            "role": "assistant",
            "model": "claude-sonnet-4-5-20250929",
            "content": [{"type": "text", "text": text}],
            "usage": {"input_tokens": input, "output_tokens": output}
        })
        .to_string()
    }

    fn clients(server: &Server) -> (AgentLoader, ClaudeClient) {
        let content = ContentStore::new(&ContentConfig {
            base_url: Some(server.url()),
            agent_cache_ttl_secs: 0,
            ..ContentConfig::default()
        })
        .unwrap();
        let mut config = ClientConfig::new("sk-ant-test");
        config.base_url = server.url();
        (AgentLoader::new(content), ClaudeClient::new(config).unwrap())
    }

    #[test]
    fn prompts_reference_the_partner() {
        let p = first_prompt(Agent::Growth, "launch PropIQ");
        assert!(p.starts_with("You are collaborating with the @growth agent. Your task: launch PropIQ"));
        let p = second_prompt(Agent::Publicist, "launch PropIQ", "Plan A");
        assert!(p.contains("Here's what @publicist provided:\n\n---\nPlan A\n---"));
    }

    #[tokio::test]
    async fn b_sees_a_output_and_usage_is_summed() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/agents/publicist.md")
            .with_body(instructions("Publicist"))
            .create_async()
            .await;
        server
            .mock("GET", "/agents/growth-hacker.md")
            .with_body(instructions("Growth"))
            .create_async()
            .await;
        let first = server
            .mock("POST", "/v1/messages")
            .match_body(Matcher::Regex("Your task: launch".into()))
            .with_body(reply("Headline draft", 100, 50))
            .expect(1)
            .create_async()
            .await;
        let second = server
            .mock("POST", "/v1/messages")
            .match_body(Matcher::Regex("Headline draft".into()))
            .with_body(reply("Viral plan", 200, 80))
            .expect(1)
            .create_async()
            .await;

        let (loader, claude) = clients(&server);
        let result = run(&loader, &claude, Agent::Publicist, Agent::Growth, "launch")
            .await
            .unwrap();

        first.assert_async().await;
        second.assert_async().await;
        assert_eq!(result.agent_a_output, "Headline draft");
        assert_eq!(result.agent_b_output, "Viral plan");
        assert_eq!(result.usage.input_tokens, 300);
        assert_eq!(result.usage.output_tokens, 130);
        assert!(result
            .combined
            .starts_with("🤝 **Collaboration: @publicist + @growth**"));
        assert!(result.combined.contains("**@growth's Contribution:**\nViral plan"));
    }

    #[tokio::test]
    async fn first_failure_skips_second_call() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/agents/strategist.md")
            .with_body(instructions("Strategist"))
            .create_async()
            .await;
        let calls = server
            .mock("POST", "/v1/messages")
            .with_status(529)
            .with_body(r#"{"type":"error"}"#)
            .expect(1)
            .create_async()
            .await;

        let (loader, claude) = clients(&server);
        let err = run(&loader, &claude, Agent::Strategist, Agent::Content, "plan")
            .await
            .unwrap_err();
        assert!(matches!(err, CockpitError::Claude(_)));
        calls.assert_async().await;
    }
}
