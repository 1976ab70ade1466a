//! Conversation orchestrator: executes one chat turn.
//!
//! A turn moves through `Routing -> Loading -> Prompting -> Persisting`.
//! The user message is persisted before the completion call, so a failed or
//! cancelled completion leaves the user message in the log with no AI reply.
//!
//! Concurrent turns on one conversation are rejected: the in-process
//! `TurnGuard` catches them up front, and the message log's version check
//! catches anything that slips past it (e.g., another process).

use std::time::Duration;

use chrono::Utc;
use parley_types::conversation::{
    ChatTurnRequest, ChatTurnResponse, Conversation, ConversationHistory, Message, MessageRole,
};
use parley_types::error::{AuthError, TurnError};
use parley_types::identity::Identity;
use parley_types::llm::{CompletionMessage, CompletionRequest, CompletionResponse, LlmError};
use parley_types::persona::{Persona, PersonaId};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, info_span, warn};
use uuid::Uuid;

use crate::chat::guard::{TurnGuard, TurnPermit};
use crate::chat::prompt::build_system_prompt;
use crate::llm::client::CompletionClient;
use crate::repository::conversation::{ConversationRepository, MessageLog};
use crate::repository::persona::PersonaRepository;

/// Default upper bound on a single completion call.
pub const DEFAULT_COMPLETION_TIMEOUT: Duration = Duration::from_secs(60);

/// Which conversation a turn targets. Decided once, before any loading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Route {
    Continue(Uuid),
    Create(PersonaId),
}

impl Route {
    /// `conversation_id` always wins over `persona_id`.
    fn from_request(request: &ChatTurnRequest) -> Result<Self, TurnError> {
        match (request.conversation_id, request.persona_id) {
            (Some(id), _) => Ok(Route::Continue(id)),
            (None, Some(persona_id)) => Ok(Route::Create(persona_id)),
            (None, None) => Err(TurnError::Validation(
                "either conversation_id or persona_id is required".to_string(),
            )),
        }
    }
}

/// State held for the duration of one turn.
struct LoadedTurn {
    _permit: TurnPermit,
    conversation: Conversation,
    persona: Persona,
    history: Vec<Message>,
}

/// Executes chat turns against a persona, its conversation, and the
/// completion client.
///
/// Generic over the repository and client traits so parley-core never
/// depends on parley-infra.
pub struct ConversationOrchestrator<P, C, M, L>
where
    P: PersonaRepository,
    C: ConversationRepository,
    M: MessageLog,
    L: CompletionClient,
{
    personas: P,
    conversations: C,
    messages: M,
    client: L,
    guard: TurnGuard,
    completion_timeout: Duration,
}

impl<P, C, M, L> ConversationOrchestrator<P, C, M, L>
where
    P: PersonaRepository,
    C: ConversationRepository,
    M: MessageLog,
    L: CompletionClient,
{
    pub fn new(personas: P, conversations: C, messages: M, client: L) -> Self {
        Self {
            personas,
            conversations,
            messages,
            client,
            guard: TurnGuard::new(),
            completion_timeout: DEFAULT_COMPLETION_TIMEOUT,
        }
    }

    /// Override the completion timeout.
    pub fn with_completion_timeout(mut self, timeout: Duration) -> Self {
        self.completion_timeout = timeout;
        self
    }

    /// Run one chat turn for the caller.
    ///
    /// Returns the conversation id (new or existing) and the completion text.
    /// Cancelling `cancel` while the completion is in flight fails the turn
    /// with `TurnError::Cancelled`; the user message stays persisted.
    pub async fn run_turn(
        &self,
        identity: Option<&Identity>,
        request: ChatTurnRequest,
        cancel: &CancellationToken,
    ) -> Result<ChatTurnResponse, TurnError> {
        let identity = identity.ok_or(AuthError::Unauthenticated)?;

        if request.message.trim().is_empty() {
            return Err(TurnError::Validation("message must not be empty".to_string()));
        }

        // Routing
        let route = Route::from_request(&request)?;
        debug!(?route, user_id = %identity.user_id, "routing chat turn");

        // Loading
        let LoadedTurn {
            _permit,
            mut conversation,
            persona,
            mut history,
        } = match route {
            Route::Continue(id) => self.load_existing(identity, id).await?,
            Route::Create(persona_id) => self.start_new(identity, persona_id).await?,
        };

        self.append(&mut conversation, &mut history, MessageRole::User, request.message)
            .await?;

        // Prompting
        let completion_request = CompletionRequest {
            system: build_system_prompt(&persona),
            messages: history.iter().map(CompletionMessage::from).collect(),
        };

        let completion = match self
            .complete(&completion_request, &persona, &conversation, cancel)
            .await
        {
            Ok(completion) => completion,
            Err(e) => {
                warn!(
                    conversation_id = %conversation.id,
                    error = %e,
                    "chat turn failed during completion, user message kept"
                );
                return Err(e);
            }
        };

        if cancel.is_cancelled() {
            return Err(TurnError::Cancelled);
        }

        // Persisting
        self.append(
            &mut conversation,
            &mut history,
            MessageRole::Ai,
            completion.content.clone(),
        )
        .await?;

        info!(
            conversation_id = %conversation.id,
            persona_id = %persona.id,
            messages = history.len(),
            input_tokens = completion.usage.input_tokens,
            output_tokens = completion.usage.output_tokens,
            "chat turn completed"
        );

        Ok(ChatTurnResponse {
            conversation_id: conversation.id,
            response: completion.content,
        })
    }

    /// Fetch a conversation and its ordered messages. Caller must own it.
    pub async fn get_conversation(
        &self,
        identity: Option<&Identity>,
        id: &Uuid,
    ) -> Result<ConversationHistory, TurnError> {
        let identity = identity.ok_or(AuthError::Unauthenticated)?;
        let conversation = self.owned_conversation(identity, id).await?;
        let messages = self.messages.list_ordered(id).await?;
        Ok(ConversationHistory {
            conversation,
            messages,
        })
    }

    /// Conversations owned by the caller, most recent activity first.
    pub async fn list_conversations(
        &self,
        identity: Option<&Identity>,
    ) -> Result<Vec<Conversation>, TurnError> {
        let identity = identity.ok_or(AuthError::Unauthenticated)?;
        Ok(self.conversations.list_by_owner(&identity.user_id).await?)
    }

    async fn owned_conversation(
        &self,
        identity: &Identity,
        id: &Uuid,
    ) -> Result<Conversation, TurnError> {
        let conversation = self
            .conversations
            .get(id)
            .await?
            .ok_or(TurnError::ConversationNotFound)?;

        if conversation.owner_id != identity.user_id {
            return Err(AuthError::Forbidden(format!(
                "conversation {id} belongs to another user"
            ))
            .into());
        }
        Ok(conversation)
    }

    async fn load_existing(&self, identity: &Identity, id: Uuid) -> Result<LoadedTurn, TurnError> {
        let conversation = self.owned_conversation(identity, &id).await?;

        let permit = self.guard.acquire(id).inspect_err(|_| {
            warn!(conversation_id = %id, "rejected concurrent turn");
        })?;

        // The persona always comes from the conversation, never the request.
        let persona = self
            .personas
            .get_by_id(&conversation.persona_id)
            .await?
            .ok_or(TurnError::PersonaNotFound)?;

        let history = self.messages.list_ordered(&id).await?;

        Ok(LoadedTurn {
            _permit: permit,
            conversation,
            persona,
            history,
        })
    }

    async fn start_new(
        &self,
        identity: &Identity,
        persona_id: PersonaId,
    ) -> Result<LoadedTurn, TurnError> {
        let persona = self
            .personas
            .get_by_id(&persona_id)
            .await?
            .ok_or(TurnError::PersonaNotFound)?;

        let conversation = self
            .conversations
            .create(&Conversation::start(persona.id, identity.user_id, Utc::now()))
            .await?;
        let permit = self.guard.acquire(conversation.id)?;

        info!(
            conversation_id = %conversation.id,
            persona_id = %persona.id,
            "conversation started"
        );

        Ok(LoadedTurn {
            _permit: permit,
            conversation,
            persona,
            history: Vec::new(),
        })
    }

    /// Append a message, keeping timestamps non-decreasing within the
    /// conversation and advancing the local version.
    async fn append(
        &self,
        conversation: &mut Conversation,
        history: &mut Vec<Message>,
        role: MessageRole,
        content: String,
    ) -> Result<(), TurnError> {
        let timestamp = Utc::now().max(conversation.last_message_at);
        let message = Message::new(conversation.id, role, content, timestamp);

        let version = self
            .messages
            .append(&message, conversation.version)
            .await
            .inspect_err(|e| {
                warn!(conversation_id = %conversation.id, role = %role, error = %e, "append failed");
            })?;

        conversation.version = version;
        conversation.last_message_at = timestamp;
        history.push(message);
        Ok(())
    }

    async fn complete(
        &self,
        request: &CompletionRequest,
        persona: &Persona,
        conversation: &Conversation,
        cancel: &CancellationToken,
    ) -> Result<CompletionResponse, TurnError> {
        let span = info_span!(
            "gen_ai.complete",
            gen_ai.operation.name = "chat",
            gen_ai.system = self.client.name(),
            gen_ai.request.model = self.client.model(),
            gen_ai.request.messages = request.messages.len(),
            persona.id = %persona.id,
            conversation.id = %conversation.id,
        );

        let call = tokio::time::timeout(self.completion_timeout, self.client.complete(request))
            .instrument(span);

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(TurnError::Cancelled),
            result = call => match result {
                Ok(Ok(response)) => Ok(response),
                Ok(Err(e)) => Err(TurnError::Upstream(e)),
                Err(_) => Err(TurnError::Upstream(LlmError::Timeout(
                    self.completion_timeout.as_secs(),
                ))),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::{HashMap, VecDeque};
    use std::sync::{Arc, Mutex};

    use parley_types::error::RepositoryError;
    use parley_types::llm::Usage;

    use crate::service::persona::tests::MemoryPersonaRepo;

    // --- Mocks ---

    #[derive(Default)]
    struct ConversationState {
        conversations: HashMap<Uuid, Conversation>,
        messages: Vec<Message>,
    }

    /// In-memory conversation rows plus message log, sharing one state.
    #[derive(Clone, Default)]
    struct MemoryConversations {
        state: Arc<Mutex<ConversationState>>,
    }

    impl ConversationRepository for MemoryConversations {
        async fn create(&self, conversation: &Conversation) -> Result<Conversation, RepositoryError> {
            self.state
                .lock()
                .unwrap()
                .conversations
                .insert(conversation.id, conversation.clone());
            Ok(conversation.clone())
        }

        async fn get(&self, id: &Uuid) -> Result<Option<Conversation>, RepositoryError> {
            Ok(self.state.lock().unwrap().conversations.get(id).cloned())
        }

        async fn list_by_owner(&self, owner_id: &Uuid) -> Result<Vec<Conversation>, RepositoryError> {
            let mut owned: Vec<_> = self
                .state
                .lock()
                .unwrap()
                .conversations
                .values()
                .filter(|c| c.owner_id == *owner_id)
                .cloned()
                .collect();
            owned.sort_by(|a, b| b.last_message_at.cmp(&a.last_message_at));
            Ok(owned)
        }
    }

    impl MessageLog for MemoryConversations {
        async fn append(&self, message: &Message, expected_version: i64) -> Result<i64, RepositoryError> {
            let mut state = self.state.lock().unwrap();
            let conversation = state
                .conversations
                .get_mut(&message.conversation_id)
                .ok_or(RepositoryError::NotFound)?;
            if conversation.version != expected_version {
                return Err(RepositoryError::Conflict(format!(
                    "expected version {expected_version}, found {}",
                    conversation.version
                )));
            }
            conversation.version += 1;
            conversation.last_message_at = message.timestamp;
            let version = conversation.version;
            state.messages.push(message.clone());
            Ok(version)
        }

        async fn list_ordered(&self, conversation_id: &Uuid) -> Result<Vec<Message>, RepositoryError> {
            // Stable sort keeps insertion order for equal timestamps.
            let mut messages: Vec<_> = self
                .state
                .lock()
                .unwrap()
                .messages
                .iter()
                .filter(|m| m.conversation_id == *conversation_id)
                .cloned()
                .collect();
            messages.sort_by_key(|m| m.timestamp);
            Ok(messages)
        }

        async fn count(&self, conversation_id: &Uuid) -> Result<u64, RepositoryError> {
            Ok(self
                .state
                .lock()
                .unwrap()
                .messages
                .iter()
                .filter(|m| m.conversation_id == *conversation_id)
                .count() as u64)
        }
    }

    /// Completion client that replays scripted replies and records requests.
    #[derive(Default)]
    struct ScriptedClient {
        replies: Mutex<VecDeque<Result<String, LlmError>>>,
        requests: Mutex<Vec<CompletionRequest>>,
        delay: Option<Duration>,
    }

    impl ScriptedClient {
        fn replying(replies: Vec<Result<String, LlmError>>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                ..Default::default()
            }
        }

        fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = Some(delay);
            self
        }

        fn recorded(&self) -> Vec<CompletionRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    impl CompletionClient for ScriptedClient {
        fn name(&self) -> &str {
            "scripted"
        }

        fn model(&self) -> &str {
            "scripted-model"
        }

        async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse, LlmError> {
            self.requests.lock().unwrap().push(request.clone());
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            let reply = self
                .replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok("default reply".to_string()))?;
            Ok(CompletionResponse {
                id: "msg_test".to_string(),
                content: reply,
                model: "scripted-model".to_string(),
                stop_reason: Some("end_turn".to_string()),
                usage: Usage::default(),
            })
        }
    }

    type TestOrchestrator =
        ConversationOrchestrator<MemoryPersonaRepo, MemoryConversations, MemoryConversations, ScriptedClient>;

    struct Fixture {
        orchestrator: TestOrchestrator,
        store: MemoryConversations,
        persona: Persona,
        owner: Identity,
    }

    fn identity(name: &str) -> Identity {
        Identity {
            user_id: Uuid::now_v7(),
            username: name.to_string(),
            email: format!("{}@example.com", name.to_lowercase()),
        }
    }

    fn fixture(client: ScriptedClient) -> Fixture {
        let owner = identity("Ada");
        let persona = Persona {
            id: PersonaId::new(),
            name: "Tech Guru".to_string(),
            description: "Knows everything about technology".to_string(),
            creator_id: owner.user_id,
            created_at: Utc::now(),
        };
        let personas = MemoryPersonaRepo::default();
        personas.personas.lock().unwrap().push(persona.clone());

        let store = MemoryConversations::default();
        let orchestrator =
            ConversationOrchestrator::new(personas, store.clone(), store.clone(), client);
        Fixture {
            orchestrator,
            store,
            persona,
            owner,
        }
    }

    fn create_request(persona_id: PersonaId, message: &str) -> ChatTurnRequest {
        ChatTurnRequest {
            conversation_id: None,
            persona_id: Some(persona_id),
            message: message.to_string(),
        }
    }

    fn continue_request(conversation_id: Uuid, message: &str) -> ChatTurnRequest {
        ChatTurnRequest {
            conversation_id: Some(conversation_id),
            persona_id: None,
            message: message.to_string(),
        }
    }

    // --- Create mode ---

    #[tokio::test]
    async fn test_first_turn_creates_conversation() {
        let fx = fixture(ScriptedClient::replying(vec![Ok("LLMs everywhere.".to_string())]));
        let cancel = CancellationToken::new();
        let start = Utc::now();

        let response = fx
            .orchestrator
            .run_turn(
                Some(&fx.owner),
                create_request(fx.persona.id, "What's new in AI?"),
                &cancel,
            )
            .await
            .unwrap();
        assert_eq!(response.response, "LLMs everywhere.");

        let history = fx
            .orchestrator
            .get_conversation(Some(&fx.owner), &response.conversation_id)
            .await
            .unwrap();
        assert_eq!(history.conversation.persona_id, fx.persona.id);
        assert_eq!(history.conversation.owner_id, fx.owner.user_id);
        assert_eq!(history.messages.len(), 2);
        assert_eq!(history.messages[0].role, MessageRole::User);
        assert_eq!(history.messages[0].content, "What's new in AI?");
        assert_eq!(history.messages[1].role, MessageRole::Ai);
        assert_eq!(history.messages[1].content, "LLMs everywhere.");
        assert_eq!(
            history.conversation.last_message_at,
            history.messages[1].timestamp
        );
        assert!(history.messages[0].timestamp >= start);
        assert!(history.messages[1].timestamp >= history.messages[0].timestamp);

        let requests = fx.orchestrator.client.recorded();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].system.contains("Tech Guru"));
        assert!(requests[0].system.contains("Knows everything about technology"));
        assert_eq!(
            requests[0].messages,
            vec![CompletionMessage {
                role: MessageRole::User,
                content: "What's new in AI?".to_string(),
            }]
        );
    }

    #[tokio::test]
    async fn test_unknown_persona_creates_nothing() {
        let fx = fixture(ScriptedClient::default());
        let err = fx
            .orchestrator
            .run_turn(
                Some(&fx.owner),
                create_request(PersonaId::new(), "hello"),
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, TurnError::PersonaNotFound));

        let state = fx.store.state.lock().unwrap();
        assert!(state.conversations.is_empty());
        assert!(state.messages.is_empty());
        drop(state);
        assert!(fx.orchestrator.client.recorded().is_empty());
    }

    // --- Continue mode ---

    #[tokio::test]
    async fn test_continue_sends_full_history() {
        let fx = fixture(ScriptedClient::replying(vec![
            Ok("first".to_string()),
            Ok("second".to_string()),
        ]));
        let cancel = CancellationToken::new();

        let first = fx
            .orchestrator
            .run_turn(Some(&fx.owner), create_request(fx.persona.id, "one"), &cancel)
            .await
            .unwrap();
        let second = fx
            .orchestrator
            .run_turn(
                Some(&fx.owner),
                continue_request(first.conversation_id, "two"),
                &cancel,
            )
            .await
            .unwrap();
        assert_eq!(second.conversation_id, first.conversation_id);
        assert_eq!(second.response, "second");

        let requests = fx.orchestrator.client.recorded();
        let roles: Vec<_> = requests[1].messages.iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![MessageRole::User, MessageRole::Ai, MessageRole::User]);
        let contents: Vec<_> = requests[1].messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["one", "first", "two"]);

        let count = fx
            .orchestrator
            .messages
            .count(&first.conversation_id)
            .await
            .unwrap();
        assert_eq!(count, 4);
        assert_eq!(fx.store.state.lock().unwrap().conversations.len(), 1);
    }

    #[tokio::test]
    async fn test_conversation_id_wins_over_persona_id() {
        let fx = fixture(ScriptedClient::default());
        let cancel = CancellationToken::new();
        let first = fx
            .orchestrator
            .run_turn(Some(&fx.owner), create_request(fx.persona.id, "hi"), &cancel)
            .await
            .unwrap();

        let request = ChatTurnRequest {
            conversation_id: Some(first.conversation_id),
            persona_id: Some(PersonaId::new()),
            message: "again".to_string(),
        };
        let response = fx
            .orchestrator
            .run_turn(Some(&fx.owner), request, &cancel)
            .await
            .unwrap();
        assert_eq!(response.conversation_id, first.conversation_id);

        let requests = fx.orchestrator.client.recorded();
        assert!(requests[1].system.contains("Tech Guru"));
    }

    #[tokio::test]
    async fn test_unknown_conversation_creates_nothing() {
        let fx = fixture(ScriptedClient::default());
        let err = fx
            .orchestrator
            .run_turn(
                Some(&fx.owner),
                continue_request(Uuid::now_v7(), "hello"),
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, TurnError::ConversationNotFound));
        assert!(fx.store.state.lock().unwrap().messages.is_empty());
    }

    #[tokio::test]
    async fn test_non_owner_cannot_continue_or_read() {
        let fx = fixture(ScriptedClient::default());
        let cancel = CancellationToken::new();
        let first = fx
            .orchestrator
            .run_turn(Some(&fx.owner), create_request(fx.persona.id, "hi"), &cancel)
            .await
            .unwrap();

        let intruder = identity("Mallory");
        let err = fx
            .orchestrator
            .run_turn(
                Some(&intruder),
                continue_request(first.conversation_id, "let me in"),
                &cancel,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, TurnError::Auth(AuthError::Forbidden(_))));

        let err = fx
            .orchestrator
            .get_conversation(Some(&intruder), &first.conversation_id)
            .await
            .unwrap_err();
        assert!(matches!(err, TurnError::Auth(AuthError::Forbidden(_))));

        assert!(
            fx.orchestrator
                .list_conversations(Some(&intruder))
                .await
                .unwrap()
                .is_empty()
        );
        assert_eq!(fx.store.state.lock().unwrap().messages.len(), 2);
    }

    #[tokio::test]
    async fn test_non_owner_rejected_during_owner_turn() {
        let fx = fixture(ScriptedClient::default().with_delay(Duration::from_millis(100)));
        let cancel = CancellationToken::new();
        let first = fx
            .orchestrator
            .run_turn(Some(&fx.owner), create_request(fx.persona.id, "hi"), &cancel)
            .await
            .unwrap();

        let intruder = identity("Mallory");
        let (owner_turn, intruder_turn) = tokio::join!(
            fx.orchestrator.run_turn(
                Some(&fx.owner),
                continue_request(first.conversation_id, "still mine"),
                &cancel,
            ),
            async {
                tokio::time::sleep(Duration::from_millis(20)).await;
                fx.orchestrator.run_turn(
                    Some(&intruder),
                    continue_request(first.conversation_id, "let me in"),
                    &cancel,
                )
                .await
            },
        );
        assert!(owner_turn.is_ok());
        assert!(matches!(
            intruder_turn,
            Err(TurnError::Auth(AuthError::Forbidden(_)))
        ));
        assert_eq!(fx.store.state.lock().unwrap().messages.len(), 4);
    }

    // --- Validation ---

    #[tokio::test]
    async fn test_request_validation() {
        let fx = fixture(ScriptedClient::default());
        let cancel = CancellationToken::new();

        let err = fx
            .orchestrator
            .run_turn(None, create_request(fx.persona.id, "hi"), &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, TurnError::Auth(AuthError::Unauthenticated)));

        let err = fx
            .orchestrator
            .run_turn(Some(&fx.owner), create_request(fx.persona.id, "  \n "), &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, TurnError::Validation(_)));

        let err = fx
            .orchestrator
            .run_turn(
                Some(&fx.owner),
                ChatTurnRequest {
                    message: "hi".to_string(),
                    ..Default::default()
                },
                &cancel,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, TurnError::Validation(_)));
        assert!(fx.store.state.lock().unwrap().conversations.is_empty());
    }

    // --- Failure paths ---

    #[tokio::test]
    async fn test_upstream_failure_keeps_user_message() {
        let fx = fixture(ScriptedClient::replying(vec![Err(LlmError::Provider {
            message: "503 Service Unavailable".to_string(),
        })]));

        let err = fx
            .orchestrator
            .run_turn(
                Some(&fx.owner),
                create_request(fx.persona.id, "hello?"),
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, TurnError::Upstream(LlmError::Provider { .. })));

        let state = fx.store.state.lock().unwrap();
        assert_eq!(state.conversations.len(), 1);
        assert_eq!(state.messages.len(), 1);
        assert_eq!(state.messages[0].role, MessageRole::User);
    }

    #[tokio::test]
    async fn test_completion_timeout() {
        let fx = fixture(ScriptedClient::default().with_delay(Duration::from_secs(5)));
        let orchestrator = fx
            .orchestrator
            .with_completion_timeout(Duration::from_millis(20));

        let err = orchestrator
            .run_turn(
                Some(&fx.owner),
                create_request(fx.persona.id, "slow"),
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, TurnError::Upstream(LlmError::Timeout(_))));
        assert_eq!(fx.store.state.lock().unwrap().messages.len(), 1);
    }

    #[tokio::test]
    async fn test_cancelled_turn_keeps_user_message() {
        let fx = fixture(ScriptedClient::default().with_delay(Duration::from_secs(5)));
        let cancel = CancellationToken::new();

        let turn = fx.orchestrator.run_turn(
            Some(&fx.owner),
            create_request(fx.persona.id, "never mind"),
            &cancel,
        );
        let canceller = async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            cancel.cancel();
        };
        let (result, ()) = tokio::join!(turn, canceller);

        assert!(matches!(result, Err(TurnError::Cancelled)));
        let state = fx.store.state.lock().unwrap();
        assert_eq!(state.messages.len(), 1);
        assert_eq!(state.messages[0].role, MessageRole::User);
    }

    // --- Concurrency ---

    #[tokio::test]
    async fn test_concurrent_turn_is_rejected() {
        let fx = fixture(ScriptedClient::default().with_delay(Duration::from_millis(50)));
        let cancel = CancellationToken::new();
        let first = fx
            .orchestrator
            .run_turn(Some(&fx.owner), create_request(fx.persona.id, "start"), &cancel)
            .await
            .unwrap();

        let (a, b) = tokio::join!(
            fx.orchestrator.run_turn(
                Some(&fx.owner),
                continue_request(first.conversation_id, "a"),
                &cancel,
            ),
            fx.orchestrator.run_turn(
                Some(&fx.owner),
                continue_request(first.conversation_id, "b"),
                &cancel,
            ),
        );
        assert!(a.is_ok());
        assert!(matches!(b, Err(TurnError::Conflict(_))));

        // Guard released after the winning turn finished.
        assert!(
            fx.orchestrator
                .run_turn(
                    Some(&fx.owner),
                    continue_request(first.conversation_id, "c"),
                    &cancel,
                )
                .await
                .is_ok()
        );
        assert_eq!(fx.store.state.lock().unwrap().messages.len(), 6);
    }

    #[tokio::test]
    async fn test_stale_version_is_conflict() {
        let fx = fixture(ScriptedClient::default());
        let cancel = CancellationToken::new();
        let first = fx
            .orchestrator
            .run_turn(Some(&fx.owner), create_request(fx.persona.id, "start"), &cancel)
            .await
            .unwrap();

        let stale = Message::new(
            first.conversation_id,
            MessageRole::User,
            "late".to_string(),
            Utc::now(),
        );
        let err = fx.store.append(&stale, 0).await.unwrap_err();
        let err: TurnError = err.into();
        assert!(matches!(err, TurnError::Conflict(_)));
    }

    // --- Ordering and listing ---

    #[tokio::test]
    async fn test_timestamps_are_non_decreasing() {
        let fx = fixture(ScriptedClient::default());
        let cancel = CancellationToken::new();
        let first = fx
            .orchestrator
            .run_turn(Some(&fx.owner), create_request(fx.persona.id, "1"), &cancel)
            .await
            .unwrap();

        // Push last_message_at into the future to simulate clock skew.
        let skewed = Utc::now() + chrono::Duration::minutes(5);
        fx.store
            .state
            .lock()
            .unwrap()
            .conversations
            .get_mut(&first.conversation_id)
            .unwrap()
            .last_message_at = skewed;

        fx.orchestrator
            .run_turn(
                Some(&fx.owner),
                continue_request(first.conversation_id, "2"),
                &cancel,
            )
            .await
            .unwrap();

        let history = fx
            .orchestrator
            .get_conversation(Some(&fx.owner), &first.conversation_id)
            .await
            .unwrap();
        assert_eq!(history.messages.len(), 4);
        assert!(
            history
                .messages
                .windows(2)
                .all(|w| w[0].timestamp <= w[1].timestamp)
        );
        assert!(history.messages[2].timestamp >= skewed);
        assert_eq!(history.messages[2].content, "2");
    }

    #[tokio::test]
    async fn test_list_conversations_most_recent_first() {
        let fx = fixture(ScriptedClient::default());
        let cancel = CancellationToken::new();
        let older = fx
            .orchestrator
            .run_turn(Some(&fx.owner), create_request(fx.persona.id, "a"), &cancel)
            .await
            .unwrap();
        let newer = fx
            .orchestrator
            .run_turn(Some(&fx.owner), create_request(fx.persona.id, "b"), &cancel)
            .await
            .unwrap();
        fx.orchestrator
            .run_turn(
                Some(&fx.owner),
                continue_request(older.conversation_id, "c"),
                &cancel,
            )
            .await
            .unwrap();

        let listed: Vec<_> = fx
            .orchestrator
            .list_conversations(Some(&fx.owner))
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.id)
            .collect();
        assert_eq!(listed, vec![older.conversation_id, newer.conversation_id]);
    }
}
