use std::path::PathBuf;

use clap::{ArgAction, Parser};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use serenity_llm::{
    DEFAULT_GATEWAY_MODEL, DEFAULT_PROVIDER_ID, DEFAULT_REQUEST_TIMEOUT, GROQ_PROVIDER_ID,
    MessageGateway, OPENAI_PROVIDER_ID, ProviderConfig, create_provider, find_model,
    selectable_models,
};
use snafu::{ResultExt, Snafu};

use crate::chat::{
    ChatSession, Conversation, ConversationId, Message, MessageStatus, Role, SendOutcome,
    SubmitRejection,
};
use crate::settings::{PREFERENCE_KEYS, Preferences, SaveOutcome, SettingsDraft, SettingsStore};

pub const WELCOME_TITLE: &str = "Welcome to Serenity";
pub const WELCOME_BODY: &str =
    "Start a conversation with the AI assistant. Your messages will appear here.";
pub const THINKING_INDICATOR: &str = "Thinking...";

const HELP_TEXT: &str = "\
/new              start a new conversation
/list             list conversations
/switch N         select conversation N
/delete N         delete conversation N
/show             print the current conversation
/model [ID]       show or change the model
/settings         show the settings draft
/set KEY VALUE    edit a setting in the draft
/save             write the settings draft to disk
/help             show this help
/quit             exit
End a line with '\\' to continue the message on the next line.";

#[derive(Debug, Parser)]
#[command(name = "serenity")]
#[command(about = "Serenity - a supportive chat companion in the terminal")]
#[command(version)]
pub struct Cli {
    /// Model id sent with each request
    #[arg(long, value_name = "ID")]
    pub model: Option<String>,

    /// Provider backend (groq or openai)
    #[arg(long, value_name = "ID", default_value = DEFAULT_PROVIDER_ID)]
    pub provider: String,

    /// Settings file to use instead of the per-user default
    #[arg(long, value_name = "PATH")]
    pub settings: Option<PathBuf>,

    /// Use saved model, temperature, max tokens and system prompt for requests
    #[arg(long, action = ArgAction::SetTrue)]
    pub apply_preferences: bool,

    /// Log debug output to stderr
    #[arg(short, long, action = ArgAction::SetTrue)]
    pub verbose: bool,
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum AppError {
    #[snafu(display("line editor failed on `{stage}`: {source}"))]
    Readline {
        stage: &'static str,
        source: ReadlineError,
    },
}

/// Environment variable holding the API key for a provider.
pub fn api_key_env_var(provider_id: &str) -> Option<&'static str> {
    match provider_id {
        GROQ_PROVIDER_ID => Some("GROQ_API_KEY"),
        OPENAI_PROVIDER_ID | "rig-openai" => Some("OPENAI_API_KEY"),
        _ => None,
    }
}

/// Environment variable overriding the endpoint for a provider.
pub fn base_url_env_var(provider_id: &str) -> Option<&'static str> {
    match provider_id {
        GROQ_PROVIDER_ID => Some("GROQ_BASE_URL"),
        OPENAI_PROVIDER_ID | "rig-openai" => Some("OPENAI_BASE_URL"),
        _ => None,
    }
}

/// Resolves the credential at runtime: the saved `apiKey` wins, then the provider's
/// environment variable. `None` means no key is available anywhere.
pub fn resolve_provider_config<F>(
    provider_id: &str,
    preferences: &Preferences,
    env: F,
) -> Option<ProviderConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let provider_id = normalize_provider_id(provider_id);
    let env_value = |name: Option<&str>| {
        name.and_then(&env)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    };
    let env_base_url = env_value(base_url_env_var(&provider_id)).unwrap_or_default();

    if let Some(mut config) = preferences.to_provider_config(&provider_id) {
        if config.endpoint.is_empty() {
            config.endpoint = env_base_url;
        }
        return Some(config);
    }

    let api_key = env_value(api_key_env_var(&provider_id))?;
    Some(ProviderConfig::new(provider_id, api_key, env_base_url))
}

/// Model for the session: the explicit flag, then the saved model when preferences
/// are applied, then the gateway default.
pub fn session_model_id(cli: &Cli, preferences: &Preferences) -> String {
    if let Some(model) = cli.model.as_deref().map(str::trim)
        && !model.is_empty()
    {
        return model.to_string();
    }

    if cli.apply_preferences {
        return preferences.model.clone();
    }

    DEFAULT_GATEWAY_MODEL.to_string()
}

/// Gateway for the session. A missing or rejected credential yields a gateway whose
/// calls fail, so the chat still runs and shows the fallback reply.
pub fn build_gateway(cli: &Cli, preferences: &Preferences) -> MessageGateway {
    let provider_id = normalize_provider_id(&cli.provider);
    let gateway = match resolve_provider_config(&provider_id, preferences, |name| {
        std::env::var(name).ok()
    }) {
        None => {
            let hint = api_key_env_var(&provider_id).unwrap_or("apiKey");
            tracing::error!(provider_id = %provider_id, "no API key configured");
            MessageGateway::unconfigured(format!(
                "no API key for provider '{provider_id}': set {hint} or save apiKey in settings"
            ))
        }
        Some(config) => match create_provider(config) {
            Ok(provider) => MessageGateway::new(provider),
            Err(error) => {
                tracing::error!(provider_id = %provider_id, error = %error, "failed to create provider");
                MessageGateway::unconfigured(error.to_string())
            }
        },
    };

    if cli.apply_preferences {
        gateway
            .with_options(preferences.gateway_options(DEFAULT_REQUEST_TIMEOUT))
            .with_extra_instruction(&preferences.system_prompt)
    } else {
        gateway
    }
}

fn normalize_provider_id(provider_id: &str) -> String {
    let trimmed = provider_id.trim();
    if trimmed.is_empty() {
        DEFAULT_PROVIDER_ID.to_string()
    } else {
        trimmed.to_ascii_lowercase()
    }
}

/// REPL command, recognised only on lines starting with `/`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    New,
    List,
    Switch(usize),
    Delete(usize),
    Show,
    Model(Option<String>),
    Settings,
    Set { key: String, value: String },
    Save,
    Help,
    Quit,
    Invalid(String),
}

impl Command {
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        let rest = line.strip_prefix('/')?;
        let (name, argument) = match rest.split_once(char::is_whitespace) {
            Some((name, argument)) => (name, argument.trim()),
            None => (rest, ""),
        };

        let command = match name {
            "new" => Self::New,
            "list" => Self::List,
            "switch" => parse_index(argument).map_or_else(
                || Self::Invalid("usage: /switch N".to_string()),
                Self::Switch,
            ),
            "delete" => parse_index(argument).map_or_else(
                || Self::Invalid("usage: /delete N".to_string()),
                Self::Delete,
            ),
            "show" => Self::Show,
            "model" => Self::Model((!argument.is_empty()).then(|| argument.to_string())),
            "settings" => Self::Settings,
            "set" => match argument.split_once(char::is_whitespace) {
                Some((key, value)) => Self::Set {
                    key: key.to_string(),
                    value: value.trim().to_string(),
                },
                None if !argument.is_empty() => Self::Set {
                    key: argument.to_string(),
                    value: String::new(),
                },
                None => Self::Invalid("usage: /set KEY VALUE".to_string()),
            },
            "save" => Self::Save,
            "help" => Self::Help,
            "quit" | "exit" => Self::Quit,
            other => Self::Invalid(format!("unknown command '/{other}', try /help")),
        };
        Some(command)
    }
}

fn parse_index(argument: &str) -> Option<usize> {
    argument.parse::<usize>().ok().filter(|index| *index > 0)
}

/// Splits a trailing `\` off a line; the flag stands in for the line-break modifier.
pub fn split_continuation(line: &str) -> (&str, bool) {
    match line.strip_suffix('\\') {
        Some(text) => (text, true),
        None => (line, false),
    }
}

/// What the REPL does with one line read from the terminal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineAction {
    Command(Command),
    /// The line was added to the message being composed.
    Compose,
    /// The composed message should be sent.
    Submit,
    /// Nothing worth sending was typed; the buffer was reset.
    Ignore,
}

/// Routes one line. Commands are only recognised while nothing is being composed,
/// so a `/` inside a multi-line message stays text.
pub fn route_line(session: &mut ChatSession, line: &str) -> LineAction {
    if session.input().is_blank()
        && let Some(command) = Command::parse(line)
    {
        session.input_mut().clear();
        return LineAction::Command(command);
    }

    let (text, shift) = split_continuation(line);
    session.input_mut().insert_str(text);
    if shift {
        session.input_mut().press_enter(true);
        return LineAction::Compose;
    }

    if session.input().is_blank() {
        session.input_mut().clear();
        return LineAction::Ignore;
    }
    LineAction::Submit
}

/// Drops text a rejected send left behind so the next line starts fresh.
fn clear_after_rejection(session: &mut ChatSession, outcome: &SendOutcome) {
    if let SendOutcome::Rejected(rejection) = outcome {
        tracing::debug!(?rejection, "clearing input after rejected send");
        session.input_mut().clear();
    }
}

pub fn render_message(message: &Message) -> String {
    let speaker = match message.role {
        Role::User => "you",
        Role::Assistant => "serenity",
    };
    match message.status {
        MessageStatus::Done => format!("{speaker}: {}", message.content),
        MessageStatus::Failed(kind) => format!("{speaker}: {} [{kind}]", message.content),
    }
}

pub fn render_conversation(conversation: &Conversation) -> String {
    if conversation.is_empty() {
        return format!("{WELCOME_TITLE}\n{WELCOME_BODY}");
    }

    conversation
        .messages
        .iter()
        .map(render_message)
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn render_conversation_list(session: &ChatSession) -> String {
    let store = session.store();
    if store.is_empty() {
        return "no conversations, use /new".to_string();
    }

    store
        .conversations()
        .iter()
        .enumerate()
        .map(|(index, conversation)| {
            let marker = if store.current_id() == Some(conversation.id) {
                '*'
            } else {
                ' '
            };
            format!(
                "{marker} {}. {} ({} messages)",
                index + 1,
                conversation.title,
                conversation.messages.len()
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn render_model_list(current: &str) -> String {
    selectable_models()
        .into_iter()
        .map(|model| {
            let marker = if model.id == current { '*' } else { ' ' };
            match model.description {
                Some(description) => {
                    format!("{marker} {} ({}) - {description}", model.id, model.name)
                }
                None => format!("{marker} {} ({})", model.id, model.name),
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn render_preferences(preferences: &Preferences) -> String {
    PREFERENCE_KEYS
        .iter()
        .map(|key| {
            let value = preferences.get(key).unwrap_or_default();
            let value = if *key == "apiKey" {
                mask_secret(&value)
            } else {
                value
            };
            format!("{key} = {value}")
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Shows only the last four characters of a secret.
pub fn mask_secret(value: &str) -> String {
    let count = value.chars().count();
    if count == 0 {
        return "(not set)".to_string();
    }
    if count <= 4 {
        return "*".repeat(count);
    }

    let tail = value.chars().skip(count - 4).collect::<String>();
    format!("{}{tail}", "*".repeat(count - 4))
}

fn render_outcome(session: &ChatSession, outcome: SendOutcome) -> Option<String> {
    match outcome {
        SendOutcome::Replied {
            conversation_id, ..
        }
        | SendOutcome::Failed {
            conversation_id, ..
        } => last_message_line(session, conversation_id),
        SendOutcome::ConversationGone { conversation_id } => Some(format!(
            "(reply dropped: conversation {conversation_id} was deleted)"
        )),
        SendOutcome::Stale { .. } => None,
        SendOutcome::Rejected(SubmitRejection::EmptyInput) => None,
        SendOutcome::Rejected(SubmitRejection::RequestInFlight) => {
            Some("(a reply is still pending)".to_string())
        }
        SendOutcome::Rejected(SubmitRejection::NoActiveConversation) => {
            Some("(no conversation selected, use /new)".to_string())
        }
    }
}

fn last_message_line(session: &ChatSession, conversation_id: ConversationId) -> Option<String> {
    let conversation = session.store().get(conversation_id)?;
    let line = render_message(conversation.last_message()?);

    if session.store().current_id() == Some(conversation_id) {
        Some(line)
    } else {
        Some(format!("[{}] {line}", conversation.title))
    }
}

fn conversation_at(session: &ChatSession, index: usize) -> Option<ConversationId> {
    session
        .store()
        .conversations()
        .get(index.checked_sub(1)?)
        .map(|conversation| conversation.id)
}

enum Flow {
    Continue,
    Quit,
}

fn handle_command(
    command: Command,
    session: &mut ChatSession,
    settings: &SettingsStore,
    draft: &mut SettingsDraft,
) -> Flow {
    match command {
        Command::New => {
            session.create_conversation();
            print_current(session);
        }
        Command::List => println!("{}", render_conversation_list(session)),
        Command::Switch(index) => match conversation_at(session, index) {
            Some(id) if session.select_conversation(id) => print_current(session),
            _ => println!("(no conversation {index})"),
        },
        Command::Delete(index) => match conversation_at(session, index) {
            Some(id) if session.remove_conversation(id) => {
                println!("{}", render_conversation_list(session));
            }
            _ => println!("(no conversation {index})"),
        },
        Command::Show => print_current(session),
        Command::Model(None) => println!("{}", render_model_list(session.model_id())),
        Command::Model(Some(model_id)) => {
            match find_model(&model_id) {
                Some(model) => println!("model set to {} ({})", model.name, model.id),
                None => println!("model set to {model_id} (not in the catalog, sent as typed)"),
            }
            session.set_model_id(model_id);
        }
        Command::Settings => {
            println!("{}", render_preferences(draft.preferences()));
            if draft.has_unsaved_changes(settings) {
                println!("(unsaved changes, use /save)");
            }
        }
        Command::Set { key, value } => match draft.set(&key, &value) {
            Ok(()) => println!("{key} = {}", draft.preferences().get(&key).unwrap_or_default()),
            Err(error) => println!("({error})"),
        },
        Command::Save => match draft.save(settings) {
            Ok(SaveOutcome::Written) => {
                println!("settings saved to {}", settings.path().display())
            }
            Ok(SaveOutcome::Unchanged) => println!("settings unchanged, nothing to save"),
            Err(error) => {
                tracing::warn!(error = %error, "failed to save settings");
                println!("(settings not saved: {error})");
            }
        },
        Command::Help => println!("{HELP_TEXT}"),
        Command::Quit => return Flow::Quit,
        Command::Invalid(message) => println!("({message})"),
    }
    Flow::Continue
}

fn print_current(session: &ChatSession) {
    match session.current_conversation() {
        Some(conversation) => {
            println!("--- {} ---", conversation.title);
            println!("{}", render_conversation(conversation));
        }
        None => println!("(no conversation selected, use /new)"),
    }
}

/// Runs the interactive chat until `/quit` or end of input.
pub async fn run(cli: Cli) -> Result<(), AppError> {
    let settings = match &cli.settings {
        Some(path) => SettingsStore::new(path.clone()),
        None => SettingsStore::load(),
    };
    let preferences = settings.settings();
    let gateway = build_gateway(&cli, &preferences);
    let model_id = session_model_id(&cli, &preferences);
    tracing::info!(
        model_id = %model_id,
        provider = gateway.provider_name().unwrap_or("unconfigured"),
        apply_preferences = cli.apply_preferences,
        "starting chat session"
    );

    let mut session = ChatSession::new(gateway, model_id);
    let mut draft = SettingsDraft::from_store(&settings);
    let mut editor = DefaultEditor::new().context(ReadlineSnafu {
        stage: "create-line-editor",
    })?;

    print_current(&session);
    println!("(type /help for commands)");

    loop {
        let prompt = if session.input().is_blank() {
            "> "
        } else {
            ". "
        };

        let line = match editor.readline(prompt) {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) => {
                session.input_mut().clear();
                continue;
            }
            Err(ReadlineError::Eof) => break,
            Err(source) => {
                return Err(AppError::Readline {
                    stage: "read-line",
                    source,
                });
            }
        };

        match route_line(&mut session, &line) {
            LineAction::Command(command) => {
                let _ = editor.add_history_entry(line.as_str());
                match handle_command(command, &mut session, &settings, &mut draft) {
                    Flow::Continue => continue,
                    Flow::Quit => break,
                }
            }
            LineAction::Compose | LineAction::Ignore => continue,
            LineAction::Submit => {}
        }

        if session.can_submit() {
            let _ = editor.add_history_entry(session.input().text());
            println!("{THINKING_INDICATOR}");
        }

        let outcome = tokio::select! {
            outcome = session.press_enter(false) => outcome,
            _ = tokio::signal::ctrl_c() => {
                println!("(request cancelled)");
                None
            }
        };

        if let Some(outcome) = outcome {
            clear_after_rejection(&mut session, &outcome);
            if let Some(line) = render_outcome(&session, outcome) {
                println!("{line}");
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use serenity_llm::FailureKind;

    use super::*;
    use crate::chat::MessageId;

    fn cli(args: &[&str]) -> Cli {
        Cli::parse_from(std::iter::once("serenity").chain(args.iter().copied()))
    }

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let values = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect::<HashMap<_, _>>();
        move |name: &str| values.get(name).cloned()
    }

    #[test]
    fn cli_defaults_to_groq_without_preferences() {
        let cli = cli(&[]);
        assert_eq!(cli.provider, "groq");
        assert!(cli.model.is_none());
        assert!(!cli.apply_preferences);
        assert_eq!(
            session_model_id(&cli, &Preferences::default()),
            DEFAULT_GATEWAY_MODEL
        );
    }

    #[test]
    fn saved_model_is_used_only_when_preferences_are_applied() {
        let mut preferences = Preferences::default();
        preferences.set("model", "gpt-4").unwrap();

        assert_eq!(
            session_model_id(&cli(&["--apply-preferences"]), &preferences),
            "gpt-4"
        );
        assert_eq!(
            session_model_id(&cli(&["--apply-preferences", "--model", "x"]), &preferences),
            "x"
        );
        assert_eq!(session_model_id(&cli(&[]), &preferences), DEFAULT_GATEWAY_MODEL);
    }

    #[test]
    fn saved_api_key_wins_over_environment() {
        let mut preferences = Preferences::default();
        preferences.set("apiKey", "from-settings").unwrap();

        let config = resolve_provider_config(
            "groq",
            &preferences,
            env_of(&[("GROQ_API_KEY", "from-env"), ("GROQ_BASE_URL", "http://proxy/v1")]),
        )
        .unwrap();

        assert_eq!(config.api_key, "from-settings");
        assert_eq!(config.endpoint, "http://proxy/v1");
    }

    #[test]
    fn environment_supplies_key_per_provider() {
        let preferences = Preferences::default();
        let env = env_of(&[("GROQ_API_KEY", "g"), ("OPENAI_API_KEY", "o")]);

        assert_eq!(
            resolve_provider_config("groq", &preferences, &env).unwrap().api_key,
            "g"
        );
        let openai = resolve_provider_config("OpenAI", &preferences, &env).unwrap();
        assert_eq!(openai.api_key, "o");
        assert_eq!(openai.provider_id, "openai");
        assert!(openai.endpoint.is_empty());
    }

    #[test]
    fn missing_key_resolves_to_none() {
        let env = env_of(&[("GROQ_API_KEY", "   ")]);
        assert!(resolve_provider_config("groq", &Preferences::default(), env).is_none());
        assert!(resolve_provider_config("mystery", &Preferences::default(), env_of(&[])).is_none());
    }

    #[test]
    fn applied_preferences_extend_instruction_and_options() {
        let mut preferences = Preferences::default();
        preferences.set("apiKey", "k").unwrap();
        preferences.set("systemPrompt", "Answer briefly.").unwrap();
        preferences.set("temperature", "0.2").unwrap();

        let plain = build_gateway(&cli(&[]), &preferences);
        assert!(!plain.instruction().contains("Answer briefly."));
        assert_eq!(plain.options().temperature, None);

        let applied = build_gateway(&cli(&["--apply-preferences"]), &preferences);
        assert!(applied.instruction().ends_with("Answer briefly."));
        assert_eq!(applied.options().temperature, Some(0.2));
        assert_eq!(applied.options().max_tokens, Some(2000));
    }

    #[test]
    fn commands_parse_with_arguments() {
        assert_eq!(Command::parse("/new"), Some(Command::New));
        assert_eq!(Command::parse("  /switch 2 "), Some(Command::Switch(2)));
        assert!(matches!(Command::parse("/delete 0"), Some(Command::Invalid(_))));
        assert_eq!(
            Command::parse("/set systemPrompt Be kind and brief"),
            Some(Command::Set {
                key: "systemPrompt".to_string(),
                value: "Be kind and brief".to_string(),
            })
        );
        assert_eq!(Command::parse("/model"), Some(Command::Model(None)));
        assert_eq!(
            Command::parse("/model gpt-4"),
            Some(Command::Model(Some("gpt-4".to_string())))
        );
        assert!(matches!(Command::parse("/bogus"), Some(Command::Invalid(_))));
        assert_eq!(Command::parse("hello /new"), None);
    }

    #[test]
    fn trailing_backslash_continues_the_message() {
        assert_eq!(split_continuation("first line\\"), ("first line", true));
        assert_eq!(split_continuation("done"), ("done", false));
    }

    #[test]
    fn empty_conversation_renders_welcome() {
        let conversation = Conversation::new(ConversationId::new(1));
        let rendered = render_conversation(&conversation);
        assert!(rendered.starts_with(WELCOME_TITLE));
    }

    #[test]
    fn failed_reply_is_marked() {
        let message = Message::assistant_failed(MessageId::new(2), "Sorry", FailureKind::Timeout);
        assert_eq!(render_message(&message), "serenity: Sorry [timeout]");
        assert_eq!(
            render_message(&Message::user(MessageId::new(1), "hi")),
            "you: hi"
        );
    }

    #[test]
    fn secrets_are_masked_except_tail() {
        assert_eq!(mask_secret(""), "(not set)");
        assert_eq!(mask_secret("abc"), "***");
        assert_eq!(mask_secret("sk-123456"), "*****3456");
    }

    #[test]
    fn list_marks_current_conversation() {
        let mut session = ChatSession::new(MessageGateway::unconfigured("test"), "m");
        session.create_conversation();

        let listing = render_conversation_list(&session);
        let lines = listing.lines().collect::<Vec<_>>();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("  1."));
        assert!(lines[1].starts_with("* 2."));
    }

    #[test]
    fn whitespace_line_is_dropped_and_commands_still_work() {
        let mut session = ChatSession::new(MessageGateway::unconfigured("test"), "m");

        assert_eq!(route_line(&mut session, "   "), LineAction::Ignore);
        assert!(session.input().text().is_empty());

        assert_eq!(
            route_line(&mut session, "/quit"),
            LineAction::Command(Command::Quit)
        );
        assert!(session.current_conversation().unwrap().is_empty());
    }

    #[test]
    fn blank_continuation_does_not_block_commands() {
        let mut session = ChatSession::new(MessageGateway::unconfigured("test"), "m");

        assert_eq!(route_line(&mut session, "  \\"), LineAction::Compose);
        assert_eq!(
            route_line(&mut session, "/delete 1"),
            LineAction::Command(Command::Delete(1))
        );
        assert!(session.input().text().is_empty());
    }

    #[test]
    fn slash_inside_a_composed_message_is_text() {
        let mut session = ChatSession::new(MessageGateway::unconfigured("test"), "m");

        assert_eq!(route_line(&mut session, "first line\\"), LineAction::Compose);
        assert_eq!(route_line(&mut session, "/quit"), LineAction::Submit);
        assert_eq!(session.input().text(), "first line\n/quit");
    }

    #[tokio::test]
    async fn rejected_send_leaves_an_empty_buffer() {
        let mut session = ChatSession::new(MessageGateway::unconfigured("test"), "m");
        let only = session.store().current_id().unwrap();
        session.remove_conversation(only);

        assert_eq!(route_line(&mut session, "hello"), LineAction::Submit);
        let outcome = session.press_enter(false).await.unwrap();
        assert_eq!(
            outcome,
            SendOutcome::Rejected(SubmitRejection::NoActiveConversation)
        );

        clear_after_rejection(&mut session, &outcome);
        assert!(session.input().text().is_empty());
        assert_eq!(route_line(&mut session, "/new"), LineAction::Command(Command::New));
    }

    #[test]
    fn model_list_marks_current_model() {
        let listing = render_model_list(DEFAULT_GATEWAY_MODEL);
        let current = listing
            .lines()
            .filter(|line| line.starts_with('*'))
            .collect::<Vec<_>>();
        assert_eq!(current.len(), 1);
        assert!(current[0].contains(DEFAULT_GATEWAY_MODEL));
        assert!(listing.contains("gpt-4o (GPT-4o)"));
    }
}
