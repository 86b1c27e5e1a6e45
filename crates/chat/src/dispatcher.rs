//! Route command lines to the command groups a subscriber may use.

use std::sync::{Arc, Mutex, MutexGuard};

use {
    motifini_subscribe::SubscriptionStore,
    tokio::task::JoinHandle,
    tracing::{debug, info, warn},
};

use crate::{
    command::{CommandGroup, Reply, Request},
    commands::{admin_commands, user_commands},
    context::ChatContext,
};

const HELP_TRAILER: &str = "Use 'help <cmd>' for more.";

/// Runs the state file write on the blocking pool.
pub(crate) async fn save_state(store: Arc<SubscriptionStore>) -> motifini_subscribe::Result<()> {
    tokio::task::spawn_blocking(move || store.save())
        .await
        .map_err(|e| motifini_subscribe::Error::Io(std::io::Error::other(e)))?
}

/// Holds the command groups and the store they operate on.
#[derive(Debug)]
pub struct Dispatcher {
    store: Arc<SubscriptionStore>,
    groups: Vec<CommandGroup>,
    /// Background saves not yet known to be finished.
    pending: Mutex<Vec<JoinHandle<()>>>,
}

impl Dispatcher {
    /// Dispatcher with the built-in User and Admin groups.
    pub fn new(ctx: Arc<ChatContext>) -> Self {
        Self::with_groups(ctx, Vec::new())
    }

    /// Built-in groups first, then `extra` in order.
    pub fn with_groups(ctx: Arc<ChatContext>, extra: Vec<CommandGroup>) -> Self {
        let mut groups = vec![user_commands(&ctx), admin_commands(&ctx)];
        groups.extend(extra);
        Self {
            store: ctx.store.clone(),
            groups,
            pending: Mutex::new(Vec::new()),
        }
    }

    pub fn store(&self) -> &Arc<SubscriptionStore> {
        &self.store
    }

    pub fn groups(&self) -> &[CommandGroup] {
        &self.groups
    }

    /// Handle one raw chat message from `from` on `api`.
    ///
    /// Unknown senders are added to the store. The first one ever seen
    /// becomes an admin.
    pub async fn handle_message(&self, api: &str, from: &str, text: &str) -> Reply {
        let (subscriber, created) = self.store.get_or_create_subscriber(api, from);
        if created {
            info!(
                api,
                contact = from,
                admin = subscriber.is_admin(),
                "new subscriber"
            );
        }

        let req = Request {
            api: api.to_string(),
            id: Request::new_id(),
            subscriber,
            tokens: text.split_whitespace().map(str::to_string).collect(),
            from: from.to_string(),
        };
        self.run(req, created).await
    }

    /// Run every permitted command matching the request's first word.
    ///
    /// The reply does not wait for the state file. A save is started in
    /// the background when a persisting command succeeded.
    pub async fn dispatch(&self, req: Request) -> Reply {
        self.run(req, false).await
    }

    /// Wait for every background save started so far.
    pub async fn flush(&self) {
        let pending = std::mem::take(&mut *self.pending());
        for handle in pending {
            if let Err(e) = handle.await {
                warn!(error = %e, "background save did not complete");
            }
        }
    }

    async fn run(&self, req: Request, mut save: bool) -> Reply {
        let reply = self.execute(&req, &mut save).await;
        if save {
            self.spawn_save(&req);
        }
        reply
    }

    async fn execute(&self, req: &Request, save: &mut bool) -> Reply {
        if req.subscriber.is_ignored() || req.tokens.is_empty() {
            return Reply::default();
        }

        let cmd = req.command().to_string();
        if cmd.eq_ignore_ascii_case("help") {
            return self.help(req);
        }

        let mut reply = Reply::default();
        for group in self.groups.iter().filter(|g| g.permits(&req.subscriber)) {
            let Some(command) = group.get(&cmd) else {
                continue;
            };
            reply.found = true;
            debug!(request_id = %req.id, group = %group.title, command = command.name(), "running command");

            match (command.handler)(req.clone()).await {
                Ok(out) => {
                    *save |= command.persist;
                    reply.text.push_str(&out.text);
                    reply.files.extend(out.files);
                },
                Err(e) => {
                    warn!(request_id = %req.id, command = command.name(), error = %e, "command failed");
                    let help = group.detail(command.name()).unwrap_or_default();
                    reply
                        .text
                        .push_str(&format!("ERROR: {e}\n{}\n{help}\n", e.detail()));
                },
            }
        }

        if !reply.found && req.subscriber.is_admin() {
            reply.text = format!("Command not found: {cmd}");
        }
        reply
    }

    fn spawn_save(&self, req: &Request) {
        let store = self.store.clone();
        let request_id = req.id.clone();
        let handle = tokio::spawn(async move {
            match save_state(store).await {
                Ok(()) => debug!(request_id = %request_id, "state saved"),
                Err(e) => warn!(request_id = %request_id, error = %e, "failed to save state"),
            }
        });

        let mut pending = self.pending();
        pending.retain(|h| !h.is_finished());
        pending.push(handle);
    }

    fn pending(&self) -> MutexGuard<'_, Vec<JoinHandle<()>>> {
        self.pending.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// `help` alone lists every permitted group; `help <cmd>` shows detail.
    pub fn help(&self, req: &Request) -> Reply {
        let permitted = self.groups.iter().filter(|g| g.permits(&req.subscriber));

        let Some(topic) = req.arg(0) else {
            let mut text: String = permitted.map(CommandGroup::summary).collect();
            text.push('\n');
            text.push_str(HELP_TRAILER);
            return Reply {
                text,
                files: Vec::new(),
                found: true,
            };
        };

        let text: String = permitted.filter_map(|g| g.detail(topic)).collect();
        if text.is_empty() {
            return Reply::text(format!("Command not found: {topic}"));
        }
        Reply {
            text,
            files: Vec::new(),
            found: true,
        }
    }
}
