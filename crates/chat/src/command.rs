//! Command descriptors, groups, and the request/reply types they work on.

use std::{future::Future, path::PathBuf, sync::Arc};

use {futures::future::BoxFuture, motifini_subscribe::Subscriber};

use crate::Result;

/// Permission tier of a command group.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Level {
    None,
    #[default]
    User,
    Mod,
    Admin,
    Owner,
}

/// One inbound command line.
#[derive(Debug, Clone)]
pub struct Request {
    /// Channel the message came in on, e.g. `telegram`.
    pub api: String,
    /// Short id used to correlate logs and artifact file names.
    pub id: String,
    pub subscriber: Arc<Subscriber>,
    /// Whitespace-separated words of the message.
    pub tokens: Vec<String>,
    /// Sender address as reported by the channel.
    pub from: String,
}

impl Request {
    /// Short random id for correlating a request's logs and files.
    pub fn new_id() -> String {
        let mut id = uuid::Uuid::new_v4().simple().to_string();
        id.truncate(8);
        id
    }

    /// The command word, as typed.
    pub fn command(&self) -> &str {
        self.tokens.first().map(String::as_str).unwrap_or_default()
    }

    pub fn arg(&self, index: usize) -> Option<&str> {
        self.tokens.get(index + 1).map(String::as_str)
    }

    /// Arguments from `index` onward, joined with single spaces.
    pub fn rest(&self, index: usize) -> String {
        self.tokens.iter().skip(index + 1).cloned().collect::<Vec<_>>().join(" ")
    }

    /// Number of arguments after the command word.
    pub fn arg_count(&self) -> usize {
        self.tokens.len().saturating_sub(1)
    }
}

/// What goes back to the requester: text and/or files to attach.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reply {
    pub text: String,
    pub files: Vec<PathBuf>,
    /// Whether any command matched the request.
    pub found: bool,
}

impl Reply {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    pub fn with_files(text: impl Into<String>, files: Vec<PathBuf>) -> Self {
        Self {
            text: text.into(),
            files,
            found: false,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty() && self.files.is_empty()
    }
}

pub type Handler = Arc<dyn Fn(Request) -> BoxFuture<'static, Result<Reply>> + Send + Sync>;

/// Wrap an async function or closure as a [`Handler`].
pub fn handler<F, Fut>(f: F) -> Handler
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Reply>> + Send + 'static,
{
    Arc::new(move |req| Box::pin(f(req)))
}

/// A chat command and how to invoke it.
#[derive(Clone)]
pub struct Command {
    /// Case-insensitive names. The first one is shown in help.
    pub aliases: Vec<&'static str>,
    pub usage: &'static str,
    pub description: &'static str,
    pub handler: Handler,
    /// Save the state file after the handler succeeds.
    pub persist: bool,
}

impl Command {
    pub fn new(aliases: &[&'static str], handler: Handler) -> Self {
        Self {
            aliases: aliases.to_vec(),
            usage: "",
            description: "",
            handler,
            persist: false,
        }
    }

    #[must_use]
    pub fn usage(mut self, usage: &'static str) -> Self {
        self.usage = usage;
        self
    }

    #[must_use]
    pub fn description(mut self, description: &'static str) -> Self {
        self.description = description;
        self
    }

    #[must_use]
    pub fn persist(mut self) -> Self {
        self.persist = true;
        self
    }

    pub fn name(&self) -> &str {
        self.aliases.first().copied().unwrap_or_default()
    }

    pub fn has_alias(&self, alias: &str) -> bool {
        self.aliases.iter().any(|a| a.eq_ignore_ascii_case(alias))
    }

    fn synopsis(&self) -> String {
        if self.usage.is_empty() {
            self.name().to_string()
        } else {
            format!("{} {}", self.name(), self.usage)
        }
    }
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Command")
            .field("aliases", &self.aliases)
            .field("usage", &self.usage)
            .field("persist", &self.persist)
            .finish_non_exhaustive()
    }
}

/// A titled, permission-tiered list of commands.
#[derive(Debug, Clone)]
pub struct CommandGroup {
    pub title: String,
    pub level: Level,
    pub commands: Vec<Command>,
}

impl CommandGroup {
    pub fn new(title: impl Into<String>, level: Level, commands: Vec<Command>) -> Self {
        Self {
            title: title.into(),
            level,
            commands,
        }
    }

    /// Find a command by any of its aliases.
    pub fn get(&self, alias: &str) -> Option<&Command> {
        self.commands.iter().find(|c| c.has_alias(alias))
    }

    /// Whether `subscriber` may use this group.
    pub fn permits(&self, subscriber: &Subscriber) -> bool {
        self.level <= Level::User || subscriber.is_admin()
    }

    /// One line per command.
    pub fn summary(&self) -> String {
        let mut msg = format!("\n* {} Commands *\n", self.title);
        for cmd in &self.commands {
            msg.push_str(&cmd.synopsis());
            msg.push('\n');
        }
        msg
    }

    /// Full help for one command, or `None` if this group does not have it.
    pub fn detail(&self, alias: &str) -> Option<String> {
        let cmd = self.get(alias)?;
        Some(format!(
            "* {} Usage: {}\nDetail: {}\nAlias: {}\n",
            self.title,
            cmd.synopsis(),
            cmd.description,
            cmd.aliases.join(", ")
        ))
    }
}
