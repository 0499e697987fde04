use crate::{
    actions::ActionDescriptor,
    conversation::{ActionCall, ConversationTurn, Role},
    error::TransportError,
};
use async_openai::{
    Client,
    config::OpenAIConfig,
    types::{
        ChatCompletionMessageToolCall, ChatCompletionRequestAssistantMessageArgs,
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestToolMessageArgs, ChatCompletionRequestUserMessageArgs,
        ChatCompletionTool, ChatCompletionToolArgs, ChatCompletionToolChoiceOption,
        ChatCompletionToolType, CreateChatCompletionRequestArgs, CreateChatCompletionResponse,
        FunctionCall, FunctionObjectArgs,
    },
};
use async_trait::async_trait;
use tracing::debug;

/// How the reasoning service may pick actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ToolChoice {
    /// The service decides whether to call actions at all.
    #[default]
    Auto,
}

/// Everything the reasoning service needs to choose the next actions.
#[derive(Debug, Clone)]
pub struct DispatchRequest {
    pub model: String,
    pub turns: Vec<ConversationTurn>,
    pub actions: Vec<ActionDescriptor>,
    pub tool_choice: ToolChoice,
}

/// The service's answer to one request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchResult {
    pub reply: Option<String>,
    pub calls: Vec<ActionCall>,
}

impl DispatchResult {
    /// True when the answer carries neither text nor actions.
    pub fn is_empty(&self) -> bool {
        self.calls.is_empty() && self.reply.as_deref().is_none_or(str::is_empty)
    }
}

/// A reasoning backend able to map a conversation onto vehicle actions.
#[async_trait]
pub trait ReasoningClient: Send + Sync {
    async fn send(&self, request: &DispatchRequest) -> Result<DispatchResult, TransportError>;
}

/// An implementation of `ReasoningClient` for any OpenAI-compatible
/// chat-completions API with function calling.
pub struct OpenAICompatibleClient {
    client: Client<OpenAIConfig>,
}

impl OpenAICompatibleClient {
    /// Creates a new client for an OpenAI-compatible service.
    ///
    /// # Arguments
    ///
    /// * `config` - The configuration for the OpenAI client, including API key and base URL.
    pub fn new(config: OpenAIConfig) -> Self {
        Self {
            client: Client::with_config(config),
        }
    }
}

#[async_trait]
impl ReasoningClient for OpenAICompatibleClient {
    async fn send(&self, request: &DispatchRequest) -> Result<DispatchResult, TransportError> {
        let messages = request
            .turns
            .iter()
            .map(to_chat_message)
            .collect::<Result<Vec<_>, _>>()?;
        let tools = request
            .actions
            .iter()
            .map(to_chat_tool)
            .collect::<Result<Vec<_>, _>>()?;
        let tool_choice = match request.tool_choice {
            ToolChoice::Auto => ChatCompletionToolChoiceOption::Auto,
        };

        let chat_request = CreateChatCompletionRequestArgs::default()
            .model(&request.model)
            .messages(messages)
            .tools(tools)
            .tool_choice(tool_choice)
            .build()?;

        let response: CreateChatCompletionResponse =
            self.client.chat().create(chat_request).await?;
        debug!(choices = response.choices.len(), "Chat completion received");
        from_chat_response(response)
    }
}

fn to_chat_message(turn: &ConversationTurn) -> Result<ChatCompletionRequestMessage, TransportError> {
    let message = match turn.role {
        Role::System => ChatCompletionRequestSystemMessageArgs::default()
            .content(turn.content.clone())
            .build()?
            .into(),
        Role::User => ChatCompletionRequestUserMessageArgs::default()
            .content(turn.content.clone())
            .build()?
            .into(),
        Role::Assistant => {
            let mut args = ChatCompletionRequestAssistantMessageArgs::default();
            if !turn.content.is_empty() {
                args.content(turn.content.clone());
            }
            if !turn.actions.is_empty() {
                args.tool_calls(turn.actions.iter().map(to_tool_call).collect::<Vec<_>>());
            }
            args.build()?.into()
        }
        Role::Tool => ChatCompletionRequestToolMessageArgs::default()
            .tool_call_id(turn.call_id.clone().unwrap_or_default())
            .content(turn.content.clone())
            .build()?
            .into(),
    };
    Ok(message)
}

fn to_tool_call(call: &ActionCall) -> ChatCompletionMessageToolCall {
    ChatCompletionMessageToolCall {
        id: call.call_id.clone(),
        r#type: ChatCompletionToolType::Function,
        function: FunctionCall {
            name: call.action.clone(),
            arguments: "{}".to_string(),
        },
    }
}

fn to_chat_tool(action: &ActionDescriptor) -> Result<ChatCompletionTool, TransportError> {
    Ok(ChatCompletionToolArgs::default()
        .function(
            FunctionObjectArgs::default()
                .name(action.name.clone())
                .description(action.description.clone())
                .parameters(action.parameters.clone())
                .build()?,
        )
        .build()?)
}

fn from_chat_response(
    response: CreateChatCompletionResponse,
) -> Result<DispatchResult, TransportError> {
    let message = response
        .choices
        .into_iter()
        .next()
        .ok_or(TransportError::EmptyResponse)?
        .message;

    let calls = message
        .tool_calls
        .unwrap_or_default()
        .into_iter()
        .map(|call| ActionCall {
            call_id: call.id,
            action: call.function.name,
        })
        .collect();

    Ok(DispatchResult {
        reply: message.content.filter(|text| !text.is_empty()),
        calls,
    })
}
