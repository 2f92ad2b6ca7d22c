//! One inbound message, end to end:
//!
//! ```text
//! normalise -> authorize -> route -> dispatch -> remember -> respond -> log
//! ```
//!
//! Validation failures become friendly replies. Model and upstream failures
//! become the generic apology and skip memory and metrics. Delivery failures
//! are logged and reported through [`Outcome::delivered`].

use std::sync::Arc;

use chrono::Utc;
use claude_agent::{ClaudeClient, CompletionRequest, TokenUsage};

use crate::admin;
use crate::agents::AgentLoader;
use crate::auth::{AuthDecision, Authorization, Authorizer, TeamAccess};
use crate::collaboration;
use crate::config::{Config, Credentials};
use crate::content::ContentStore;
use crate::context::{self, BusinessState};
use crate::error::{CockpitError, Result};
use crate::memory::MemoryStore;
use crate::quick_action::{self, QuickActionCatalog, QuickActionPlan};
use crate::responder;
use crate::router;
use crate::special;
use crate::store::KvStore;
use crate::transcribe::Transcriber;
use crate::types::{Agent, IncomingMessage, MessageKind, Outcome, OutcomeKind, ParsedCommand};
use crate::usage::{month_of, MetricsEvent, MetricsLogger};
use crate::whatsapp::WhatsAppClient;

pub const GREETING_PROMPT: &str = "The user just activated you. Greet them warmly and ask how you can help them today. Keep it brief (2-3 sentences).";

/// Run a blocking store call off the async runtime.
async fn blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| CockpitError::Store(format!("task join error: {e}")))?
}

/// A model-backed exchange awaiting memory and metrics bookkeeping.
#[derive(Debug)]
struct Exchange {
    /// `None` for collaborations.
    agent: Option<Agent>,
    query: String,
    reply: String,
    model: String,
    usage: TokenUsage,
    depth: usize,
    /// Greetings and collaborations are not stored in conversation memory.
    remember: bool,
}

#[derive(Debug)]
struct Dispatched {
    outcome: Outcome,
    exchange: Option<Exchange>,
}

impl Dispatched {
    fn reply(kind: OutcomeKind, text: impl Into<String>) -> Self {
        Self {
            outcome: Outcome::reply(kind, text),
            exchange: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Pipeline {
    config: Arc<Config>,
    content: ContentStore,
    agents: AgentLoader,
    memory: MemoryStore,
    authorizer: Authorizer,
    metrics: MetricsLogger,
    claude: Option<ClaudeClient>,
    credentials: Arc<Credentials>,
    whatsapp: WhatsAppClient,
    transcriber: Transcriber,
}

impl Pipeline {
    pub fn new(config: Config, credentials: Credentials, kv: KvStore) -> Result<Self> {
        let credentials = Arc::new(credentials);
        let content = ContentStore::new(&config.content)?;
        let claude = match credentials.claude_api_key() {
            Ok(key) => Some(ClaudeClient::new(config.claude.client_config(key))?),
            Err(_) => {
                tracing::warn!("CLAUDE_API_KEY not set; agent replies will report a configuration error");
                None
            }
        };
        Ok(Self {
            agents: AgentLoader::new(content.clone()),
            memory: MemoryStore::new(kv.clone(), config.memory.max_entries),
            authorizer: Authorizer::new(kv.clone(), config.auth.fail_open),
            metrics: MetricsLogger::new(kv, config.pricing.clone()),
            whatsapp: WhatsAppClient::new(&config.whatsapp, credentials.clone())?,
            transcriber: Transcriber::new(&config.transcription, credentials.clone())?,
            content,
            claude,
            credentials,
            config: Arc::new(config),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub fn memory(&self) -> &MemoryStore {
        &self.memory
    }

    pub fn metrics(&self) -> &MetricsLogger {
        &self.metrics
    }

    pub fn content(&self) -> &ContentStore {
        &self.content
    }

    fn claude(&self) -> Result<&ClaudeClient> {
        self.claude.as_ref().ok_or(CockpitError::ConfigurationMissing {
            setting: "Claude API key",
            env: "CLAUDE_API_KEY",
        })
    }

    /// Process one message and deliver whatever reply it produces.
    ///
    /// Returns `Err` only when authorization itself could not be decided.
    pub async fn handle(&self, message: IncomingMessage) -> Result<Outcome> {
        let user = message.from.clone();
        tracing::info!(
            user = %user,
            message_id = %message.id,
            message_type = message.message_type(),
            "message received"
        );

        let Some(text) = self.normalize(&message).await else {
            return Ok(Outcome::ignored());
        };
        let month = month_of(message.received_at);

        let access = self.team_access().await;
        let decision = {
            let authorizer = self.authorizer.clone();
            let user = user.clone();
            let access = access.clone();
            let month = month.clone();
            blocking(move || authorizer.check(&user, access.as_ref(), &month)).await?
        };
        let auth = match decision {
            AuthDecision::Allowed(auth) => auth,
            AuthDecision::Denied(denial) => {
                let outcome = Outcome::reply(OutcomeKind::Denied, denial.message());
                return Ok(self.respond(&user, outcome).await);
            }
        };

        let dispatched = match self.dispatch(&user, &text, &auth, access, &month).await {
            Ok(dispatched) => dispatched,
            Err(e) => Dispatched {
                outcome: failure(&user, &e),
                exchange: None,
            },
        };

        if let Some(exchange) = &dispatched.exchange {
            self.remember(&user, exchange).await;
        }
        let outcome = self.respond(&user, dispatched.outcome).await;
        if let Some(exchange) = dispatched.exchange {
            self.log_metrics(&user, exchange, outcome.delivered, &text).await;
        }

        tracing::info!(
            user = %user,
            kind = ?outcome.kind,
            agent = outcome.agent.map(|a| a.as_str()),
            delivered = outcome.delivered,
            "message handled"
        );
        Ok(outcome)
    }

    /// Text to route, or `None` when the message is dropped silently.
    async fn normalize(&self, message: &IncomingMessage) -> Option<String> {
        match &message.kind {
            MessageKind::Text { body } => {
                let text = body.trim();
                if text.is_empty() {
                    tracing::debug!(user = %message.from, "empty message dropped");
                    return None;
                }
                Some(text.to_string())
            }
            MessageKind::Audio { media_id } => {
                if !self.config.transcription.enabled {
                    tracing::info!(user = %message.from, "voice message dropped: transcription disabled");
                    return None;
                }
                match self.transcribe(media_id).await {
                    Ok(text) => Some(text),
                    Err(e) => {
                        tracing::warn!(user = %message.from, error = %e, "voice message dropped: transcription failed");
                        None
                    }
                }
            }
            MessageKind::Unsupported { message_type } => {
                tracing::info!(user = %message.from, message_type = %message_type, "unsupported message type dropped");
                None
            }
        }
    }

    async fn transcribe(&self, media_id: &str) -> Result<String> {
        let media = self.whatsapp.download_media(media_id).await?;
        self.transcriber.transcribe(media).await
    }

    async fn team_access(&self) -> Option<TeamAccess> {
        match TeamAccess::load(&self.content).await {
            Ok(Some(access)) => Some(access),
            Ok(None) => {
                tracing::warn!("team access file not found");
                None
            }
            Err(e) => {
                tracing::warn!(error = %e, "team access unavailable");
                None
            }
        }
    }

    async fn dispatch(
        &self,
        user: &str,
        text: &str,
        auth: &Authorization,
        access: Option<TeamAccess>,
        month: &str,
    ) -> Result<Dispatched> {
        let user = user.to_string();
        let catalog = if text.starts_with('/') {
            QuickActionCatalog::load(&self.content).await
        } else {
            None
        };

        let command = router::route(text, catalog.as_ref())?;
        tracing::debug!(user = %user, command = ?command, "message routed");

        match command {
            ParsedCommand::Special { command } => {
                let memory = self.memory.clone();
                let reply = blocking(move || special::handle(command, &user, &memory)).await?;
                Ok(Dispatched::reply(OutcomeKind::Special, reply))
            }
            ParsedCommand::Admin { subcommand } => {
                let metrics = self.metrics.clone();
                let member = auth.user.clone();
                let month = month.to_string();
                let reply = blocking(move || {
                    admin::handle(&subcommand, &member, access.as_ref(), &metrics, &month)
                })
                .await?;
                Ok(Dispatched::reply(OutcomeKind::Admin, reply))
            }
            ParsedCommand::QuickAction { name, input, help } => {
                let catalog = catalog.ok_or_else(|| CockpitError::QuickActionNotFound {
                    name: name.clone(),
                    available: Vec::new(),
                })?;
                match quick_action::resolve(&catalog, &name, &input, help)? {
                    QuickActionPlan::Help(text) => {
                        Ok(Dispatched::reply(OutcomeKind::QuickActionHelp, text))
                    }
                    QuickActionPlan::NeedsInput(text) => {
                        Ok(Dispatched::reply(OutcomeKind::QuickActionPrompt, text))
                    }
                    QuickActionPlan::Agent { agent, prompt } => {
                        tracing::info!(user = %user, action = %name, %agent, "quick action");
                        self.ask(&user, agent, prompt).await
                    }
                    QuickActionPlan::Collaboration {
                        agent_a,
                        agent_b,
                        task,
                    } => {
                        tracing::info!(user = %user, action = %name, "quick action collaboration");
                        self.collaborate(agent_a, agent_b, task).await
                    }
                }
            }
            ParsedCommand::Collaboration {
                agent_a,
                agent_b,
                task,
            } => self.collaborate(agent_a, agent_b, task).await,
            ParsedCommand::AgentQuery { agent, query } => {
                let agent = match agent {
                    Some(name) => name.parse::<Agent>()?,
                    None => {
                        let memory = self.memory.clone();
                        let user = user.clone();
                        blocking(move || memory.last_active(&user))
                            .await?
                            .unwrap_or_default()
                    }
                };
                if query.is_empty() {
                    self.greet(agent).await
                } else {
                    self.ask(&user, agent, query).await
                }
            }
        }
    }

    /// Agent instructions with business context appended.
    async fn system_prompt(&self, agent: Agent) -> Result<String> {
        let profile = self.agents.load(agent).await?;
        let state = BusinessState::load(&self.content).await;
        Ok(context::inject(
            &profile.instructions,
            state.as_ref(),
            Utc::now().date_naive(),
        ))
    }

    async fn ask(&self, user: &str, agent: Agent, query: String) -> Result<Dispatched> {
        let claude = self.claude()?;
        let system = self.system_prompt(agent).await?;
        let history = {
            let memory = self.memory.clone();
            let user = user.to_string();
            blocking(move || memory.get(&user, agent)).await?
        };
        let depth = history.len();

        let completion = claude
            .complete(CompletionRequest::new(system, query.clone()).with_history(history))
            .await?;

        Ok(Dispatched {
            outcome: Outcome::reply(OutcomeKind::AgentReply, completion.text.clone())
                .with_agent(agent)
                .with_usage(completion.usage),
            exchange: Some(Exchange {
                agent: Some(agent),
                query,
                reply: completion.text,
                model: completion.model,
                usage: completion.usage,
                depth,
                remember: true,
            }),
        })
    }

    async fn greet(&self, agent: Agent) -> Result<Dispatched> {
        let claude = self.claude()?;
        let system = self.system_prompt(agent).await?;
        let completion = claude
            .complete(
                CompletionRequest::new(system, GREETING_PROMPT)
                    .with_max_tokens(self.config.claude.greeting_max_tokens),
            )
            .await?;

        Ok(Dispatched {
            outcome: Outcome::reply(OutcomeKind::Greeting, completion.text.clone())
                .with_agent(agent)
                .with_usage(completion.usage),
            exchange: Some(Exchange {
                agent: Some(agent),
                query: String::new(),
                reply: completion.text,
                model: completion.model,
                usage: completion.usage,
                depth: 0,
                remember: false,
            }),
        })
    }

    async fn collaborate(&self, agent_a: Agent, agent_b: Agent, task: String) -> Result<Dispatched> {
        let claude = self.claude()?;
        let result = collaboration::run(&self.agents, claude, agent_a, agent_b, &task).await?;
        Ok(Dispatched {
            outcome: Outcome::reply(OutcomeKind::Collaboration, result.combined.clone())
                .with_usage(result.usage),
            exchange: Some(Exchange {
                agent: None,
                query: task,
                reply: result.combined,
                model: result.model,
                usage: result.usage,
                depth: 0,
                remember: false,
            }),
        })
    }

    /// Point the user at the agent that answered and store the untruncated
    /// exchange. Failures are logged; the reply still goes out.
    async fn remember(&self, user: &str, exchange: &Exchange) {
        let Some(agent) = exchange.agent else {
            return;
        };

        let memory = self.memory.clone();
        let user_owned = user.to_string();
        if let Err(e) = blocking(move || memory.set_last_active(&user_owned, agent)).await {
            tracing::error!(user, %agent, error = %e, "failed to update last active agent");
        }

        if !exchange.remember {
            return;
        }
        let memory = self.memory.clone();
        let user_owned = user.to_string();
        let query = exchange.query.clone();
        let reply = exchange.reply.clone();
        if let Err(e) =
            blocking(move || memory.append(&user_owned, agent, &query, &reply).map(|_| ())).await
        {
            tracing::error!(user, %agent, error = %e, "failed to update conversation memory");
        }
    }

    async fn respond(&self, user: &str, mut outcome: Outcome) -> Outcome {
        if let Some(reply) = &outcome.reply {
            outcome.delivered = responder::deliver(&self.whatsapp, user, reply).await;
        }
        outcome
    }

    async fn log_metrics(&self, user: &str, exchange: Exchange, delivered: bool, text: &str) {
        let event = MetricsEvent {
            user: user.to_string(),
            agent: exchange.agent,
            usage: exchange.usage,
            model: exchange.model,
            query_len: text.chars().count(),
            reply_len: exchange.reply.chars().count(),
            conversation_depth: exchange.depth,
            delivered,
            at: Utc::now(),
        };
        let metrics = self.metrics.clone();
        if let Err(e) = blocking(move || metrics.record(&event).map(|_| ())).await {
            tracing::error!(user, error = %e, "failed to record metrics");
        }
    }
}

/// The reply for a failed dispatch, or a silent drop.
fn failure(user: &str, e: &CockpitError) -> Outcome {
    match e.user_reply() {
        None => {
            tracing::debug!(user, error = %e, "message dropped");
            Outcome::ignored()
        }
        Some(text) if e.is_validation() => {
            tracing::info!(user, error = %e, "request rejected");
            Outcome::reply(OutcomeKind::Rejected, text)
        }
        Some(text) => {
            tracing::error!(user, error = %e, "request failed");
            Outcome::reply(OutcomeKind::Failed, text)
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
