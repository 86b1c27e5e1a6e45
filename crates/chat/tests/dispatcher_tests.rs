#![allow(clippy::unwrap_used, clippy::expect_used)]
use std::{
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
    time::Duration,
};

use {
    async_trait::async_trait,
    motifini_chat::{
        ChatContext, Command, CommandError, CommandGroup, Capture, Dispatcher, Level, Notification, Notifier,
        Outbound, Reply, Request, StaticCameras, handler,
    },
    motifini_subscribe::{ManualClock, Rules, Subscriber, SubscriptionStore},
    tempfile::TempDir,
};

/// Writes a placeholder file, or fails for cameras listed in `broken`.
#[derive(Default)]
struct FakeCapture {
    broken: Vec<String>,
}

#[async_trait]
impl Capture for FakeCapture {
    async fn save_picture(&self, camera: &str, path: &Path) -> anyhow::Result<()> {
        if self.broken.iter().any(|b| b == camera) {
            anyhow::bail!("lens cap on");
        }
        std::fs::write(path, b"jpeg")?;
        Ok(())
    }

    async fn save_video(&self, camera: &str, path: &Path) -> anyhow::Result<()> {
        if self.broken.iter().any(|b| b == camera) {
            anyhow::bail!("lens cap on");
        }
        std::fs::write(path, b"mp4")?;
        Ok(())
    }
}

struct Fixture {
    tmp: TempDir,
    clock: Arc<ManualClock>,
    store: Arc<SubscriptionStore>,
    ctx: Arc<ChatContext>,
    dispatcher: Dispatcher,
}

impl Fixture {
    fn new() -> Self {
        Self::with_capture(FakeCapture::default())
    }

    fn with_capture(capture: FakeCapture) -> Self {
        let tmp = TempDir::new().unwrap();
        let clock = Arc::new(ManualClock::default());
        let store = Arc::new(
            SubscriptionStore::open_with_clock(tmp.path().join("state.json"), clock.clone())
                .unwrap(),
        );
        store.upsert_event(
            "doorbell",
            Rules::from([("description".to_string(), "front door".to_string())]),
        );
        let cameras = StaticCameras::new(vec!["Porch".to_string(), "Garage".to_string()]);
        let ctx = Arc::new(ChatContext::new(
            store.clone(),
            Arc::new(cameras),
            Arc::new(capture),
            tmp.path(),
        ));
        let dispatcher = Dispatcher::new(ctx.clone());
        Self {
            tmp,
            clock,
            store,
            ctx,
            dispatcher,
        }
    }

    fn state_path(&self) -> PathBuf {
        self.tmp.path().join("state.json")
    }

    /// Registers alice (the first sender, so an admin) and bob.
    async fn with_users(self) -> Self {
        self.send("alice", "events").await;
        self.send("bob", "events").await;
        self
    }

    /// Sends `text` and waits for the state file to catch up.
    async fn send(&self, from: &str, text: &str) -> Reply {
        let reply = self.dispatcher.handle_message("console", from, text).await;
        self.dispatcher.flush().await;
        reply
    }
}

#[tokio::test]
async fn first_sender_becomes_admin() {
    let fx = Fixture::new().with_users().await;
    let alice = fx.store.get_subscriber("console", "alice").unwrap();
    let bob = fx.store.get_subscriber("console", "bob").unwrap();
    assert!(alice.is_admin());
    assert!(!bob.is_admin());

    let reopened = SubscriptionStore::open(fx.state_path()).unwrap();
    assert_eq!(reopened.subscriber_count(), 2);
}

#[tokio::test]
async fn unknown_command_is_only_reported_to_admins() {
    let fx = Fixture::new().with_users().await;

    let reply = fx.send("bob", "bogus").await;
    assert!(reply.is_empty());
    assert!(!reply.found);

    let reply = fx.send("alice", "bogus").await;
    assert_eq!(reply.text, "Command not found: bogus");
}

#[tokio::test]
async fn empty_message_gets_no_reply() {
    let fx = Fixture::new().with_users().await;
    assert!(fx.send("alice", "   ").await.is_empty());
}

#[tokio::test]
async fn help_hides_admin_group_from_users() {
    let fx = Fixture::new().with_users().await;

    let user_help = fx.send("bob", "help").await.text;
    assert!(user_help.contains("* User Commands *"));
    assert!(user_help.contains("sub <camera|event>\n"));
    assert!(!user_help.contains("* Admin Commands *"));
    assert!(user_help.ends_with("Use 'help <cmd>' for more."));

    let admin_help = fx.send("alice", "HELP").await.text;
    assert!(admin_help.contains("* Admin Commands *"));
    assert!(admin_help.contains("addevent <name> [description]\n"));
}

#[tokio::test]
async fn help_for_one_command() {
    let fx = Fixture::new().with_users().await;

    assert_eq!(
        fx.send("bob", "help subscribe").await.text,
        "* User Usage: sub <camera|event>\nDetail: Enables notifications from <camera> or \
         <event>.\nAlias: sub, subscribe\n"
    );
    assert_eq!(
        fx.send("bob", "help ignore").await.text,
        "Command not found: ignore"
    );
    // Both groups define `subs`.
    let both = fx.send("alice", "help subs").await.text;
    assert!(both.starts_with("* User Usage: subs\n"));
    assert!(both.contains("* Admin Usage: subs [subscriber]\n"));
}

#[tokio::test]
async fn handler_errors_are_rendered_with_usage() {
    let fx = Fixture::new().with_users().await;
    assert_eq!(
        fx.send("bob", "sub").await.text,
        "ERROR: invalid command usage\nmust provide an event or camera name to subscribe\n* User \
         Usage: sub <camera|event>\nDetail: Enables notifications from <camera> or \
         <event>.\nAlias: sub, subscribe\n\n"
    );

    let reply = fx.send("bob", "sub yard").await;
    assert!(reply.found);
    assert!(reply.text.contains("Event or Camera not found: yard"));
}

#[tokio::test]
async fn subscribe_to_events_and_cameras() {
    let fx = Fixture::new().with_users().await;

    assert_eq!(
        fx.send("bob", "sub doorbell").await.text,
        "You've been subscribed to event: doorbell\nYou have 1 event subscriptions."
    );
    assert_eq!(
        fx.send("bob", "subscribe porch").await.text,
        "You've been subscribed to camera: Porch\nYou have 2 event subscriptions."
    );
    assert_eq!(
        fx.send("bob", "sub Porch").await.text,
        "You're already subscribed to camera: Porch\nYou have 2 event subscriptions."
    );
    assert!(!fx.store.event_exists("Porch"));

    let reopened = SubscriptionStore::open(fx.state_path()).unwrap();
    let bob = reopened.get_subscriber("console", "bob").unwrap();
    assert!(bob.is_subscribed("doorbell"));
    assert!(bob.is_subscribed("Porch"));

    assert_eq!(
        fx.send("bob", "unsub PORCH").await.text,
        "You've been unsubscribed from: Porch\nYou have 1 event subscriptions."
    );
    assert_eq!(
        fx.send("bob", "unsub *").await.text,
        "You've been unsubscribed from all events."
    );
    assert_eq!(
        fx.store
            .get_subscriber("console", "bob")
            .unwrap()
            .subscription_count(),
        0
    );
}

#[tokio::test]
async fn stop_and_resume_notifications() {
    let fx = Fixture::new().with_users().await;
    fx.send("bob", "sub doorbell").await;
    assert_eq!(fx.store.eligible_subscribers("doorbell", &[]).len(), 1);

    assert_eq!(
        fx.send("bob", "stop 5 doorbell").await.text,
        "Notifications from 'doorbell' paused for at least 5 minutes."
    );
    assert!(fx.store.eligible_subscribers("doorbell", &[]).is_empty());
    assert!(fx.send("bob", "subs").await.text.contains("1: doorbell, paused 5m0s"));

    fx.clock.advance(Duration::from_secs(6 * 60));
    assert_eq!(fx.store.eligible_subscribers("doorbell", &[]).len(), 1);

    assert_eq!(
        fx.send("bob", "pause").await.text,
        "Notifications paused for at least 10 minutes."
    );
    assert!(fx.store.eligible_subscribers("doorbell", &[]).is_empty());

    assert_eq!(
        fx.send("bob", "quit 0").await.text,
        "Notifications are no longer paused."
    );
    assert_eq!(fx.store.eligible_subscribers("doorbell", &[]).len(), 1);

    assert!(
        fx.send("bob", "stop soon")
            .await
            .text
            .contains("Unable to parse into a number: soon")
    );
}

#[tokio::test]
async fn delay_is_shown_in_subscriptions() {
    let fx = Fixture::new().with_users().await;
    fx.send("bob", "sub doorbell").await;

    assert_eq!(
        fx.send("bob", "delay 90 DOORBELL").await.text,
        "Set repeat delay for 'doorbell' to 1m30s"
    );
    assert_eq!(
        fx.send("bob", "delay 90 porch").await.text,
        "You are not subscribed to: porch"
    );
    assert!(fx.send("bob", "subs").await.text.contains("1: doorbell, delay: 1m30s"));
}

#[tokio::test]
async fn admin_replies_accumulate_across_groups() {
    let fx = Fixture::new().with_users().await;
    let text = fx.send("alice", "subs").await.text;
    assert!(text.starts_with("Your Subscriptions:\n(none)\n"));
    assert!(text.contains("There are 2 total subscribers:"));
    assert!(text.contains("\n1: (console) alice, admin (0 subscriptions)"));
    assert!(text.contains("\n2: (console) bob (0 subscriptions)"));

    // With an argument only the admin group answers.
    fx.send("bob", "sub doorbell").await;
    assert_eq!(
        fx.send("alice", "subs bob").await.text,
        "bob has 1 subscriptions:\n1: doorbell"
    );
    assert_eq!(
        fx.send("alice", "subs carol").await.text,
        "Subscriber does not exist: carol"
    );
}

#[tokio::test]
async fn ignored_subscribers_are_silenced() {
    let fx = Fixture::new().with_users().await;

    assert_eq!(
        fx.send("alice", "ignore bob").await.text,
        "Subscriber 'bob' ignored."
    );
    assert!(fx.send("bob", "help").await.is_empty());
    assert!(fx.send("alice", "ignores").await.text.contains("bob, ignored"));

    fx.send("alice", "unignore bob").await;
    assert!(!fx.send("bob", "help").await.is_empty());

    let reply = fx.send("alice", "ignore").await;
    assert!(reply.text.contains("must provide exactly one subscriber"));
    let reply = fx.send("alice", "ignore carol").await;
    assert!(reply.text.contains("subscriber not found: carol (console)"));
}

#[tokio::test]
async fn admin_grants_persist() {
    let fx = Fixture::new().with_users().await;

    fx.send("alice", "admin bob").await;
    assert_eq!(fx.store.admin_count(), 2);
    let reopened = SubscriptionStore::open(fx.state_path()).unwrap();
    assert!(reopened.get_subscriber("console", "bob").unwrap().is_admin());

    fx.send("bob", "unadmin alice").await;
    assert!(!fx.store.get_subscriber("console", "alice").unwrap().is_admin());
    assert!(fx.send("alice", "admins").await.text.starts_with("There are 1 admins:"));
}

#[tokio::test]
async fn event_registry_commands() {
    let fx = Fixture::new().with_users().await;

    assert_eq!(
        fx.send("alice", "addevent garage-door side entrance").await.text,
        "Event 'garage-door' added."
    );
    assert_eq!(
        fx.store.event_rule("garage-door", "description").as_deref(),
        Some("side entrance")
    );
    assert!(
        fx.send("bob", "events")
            .await
            .text
            .contains("garage-door - side entrance")
    );

    fx.send("bob", "sub garage-door").await;
    assert_eq!(
        fx.send("alice", "rmevent garage-door").await.text,
        "Event 'garage-door' removed along with 1 subscriptions."
    );
    assert!(
        fx.send("alice", "rmevent garage-door")
            .await
            .text
            .starts_with("ERROR: event not found: garage-door\n")
    );
    // Users cannot reach admin commands.
    assert!(fx.send("bob", "addevent sneaky").await.is_empty());
    assert!(!fx.store.event_exists("sneaky"));
}

#[tokio::test]
async fn pictures_from_every_camera() {
    let fx = Fixture::with_capture(FakeCapture {
        broken: vec!["Garage".to_string()],
    })
    .with_users()
    .await;

    let reply = fx.send("bob", "pics").await;
    assert_eq!(reply.files.len(), 1);
    let file = &reply.files[0];
    assert!(file.exists());
    let name = file.file_name().unwrap().to_string_lossy().into_owned();
    assert!(name.starts_with("chat_command_"));
    assert!(name.ends_with("_Porch.jpg"));
    assert!(reply.text.contains("Error Getting 'Garage' Picture: lens cap on"));

    let reply = fx.send("bob", "vid porch").await;
    assert_eq!(reply.files.len(), 1);
    assert!(reply.files[0].to_string_lossy().ends_with("_Porch.mp4"));

    let reply = fx.send("bob", "pics yard").await;
    assert!(reply.files.is_empty());
    assert!(reply.text.contains("Unknown Camera: yard"));
}

#[tokio::test]
async fn extra_groups_follow_permissions() {
    let fx = Fixture::new().with_users().await;
    let ops = CommandGroup::new("Ops", Level::Mod, vec![
        Command::new(
            &["ping"],
            handler(|req| async move {
                Ok::<_, CommandError>(Reply::text(format!("pong {}", req.from)))
            }),
        )
        .description("Replies with pong."),
    ]);
    let dispatcher = Dispatcher::with_groups(fx.ctx.clone(), vec![ops]);
    assert_eq!(dispatcher.groups().len(), 3);

    let reply = dispatcher.handle_message("console", "alice", "ping").await;
    assert_eq!(reply.text, "pong alice");
    let reply = dispatcher.handle_message("console", "bob", "ping").await;
    assert!(reply.is_empty());
}

/// A User-level group whose persisting `touch` command registers `event`.
fn touch_group(store: &Arc<SubscriptionStore>, title: &str, event: &'static str) -> CommandGroup {
    let store = store.clone();
    CommandGroup::new(title, Level::User, vec![
        Command::new(
            &["touch"],
            handler(move |_req| {
                let store = store.clone();
                async move {
                    store.upsert_event(event, Rules::new());
                    Ok::<_, CommandError>(Reply::text(format!("touched {event}\n")))
                }
            }),
        )
        .persist(),
    ])
}

fn request(subscriber: Arc<Subscriber>, text: &str) -> Request {
    Request {
        api: "console".into(),
        id: Request::new_id(),
        from: subscriber.contact().to_string(),
        subscriber,
        tokens: text.split_whitespace().map(str::to_string).collect(),
    }
}

#[tokio::test]
async fn failed_persisting_command_does_not_save() {
    let fx = Fixture::new();
    let alice = fx.store.create_or_update_subscriber("console", "alice", true, false);
    let before = std::fs::read(fx.state_path()).unwrap();

    let store = fx.store.clone();
    let broken = CommandGroup::new("Broken", Level::User, vec![
        Command::new(
            &["explode"],
            handler(move |_req| {
                let store = store.clone();
                async move {
                    store.upsert_event("ghost", Rules::new());
                    Err::<Reply, _>(CommandError::bad_usage("boom"))
                }
            }),
        )
        .persist(),
    ]);
    let dispatcher = Dispatcher::with_groups(fx.ctx.clone(), vec![broken]);

    let reply = dispatcher.dispatch(request(alice, "explode")).await;
    dispatcher.flush().await;
    assert!(reply.text.starts_with("ERROR: "));
    assert!(fx.store.event_exists("ghost"));

    assert_eq!(std::fs::read(fx.state_path()).unwrap(), before);
    assert!(!fx.tmp.path().join("state.json.bak").exists());
}

#[tokio::test]
async fn persisting_groups_share_one_save() {
    let fx = Fixture::new();
    let alice = fx.store.create_or_update_subscriber("console", "alice", true, false);
    let before = std::fs::read(fx.state_path()).unwrap();

    let dispatcher = Dispatcher::with_groups(fx.ctx.clone(), vec![
        touch_group(&fx.store, "First", "first"),
        touch_group(&fx.store, "Second", "second"),
    ]);
    let reply = dispatcher.dispatch(request(alice, "touch")).await;
    dispatcher.flush().await;
    assert_eq!(reply.text, "touched first\ntouched second\n");

    let reopened = SubscriptionStore::open(fx.state_path()).unwrap();
    assert!(reopened.event_exists("first"));
    assert!(reopened.event_exists("second"));
    // A second write would have rotated the first one into the backup.
    assert_eq!(std::fs::read(fx.tmp.path().join("state.json.bak")).unwrap(), before);
}

#[tokio::test]
async fn reply_does_not_wait_for_save() {
    let fx = Fixture::new();
    let alice = fx.store.create_or_update_subscriber("console", "alice", true, false);
    let before = std::fs::read(fx.state_path()).unwrap();

    let reply = fx.dispatcher.dispatch(request(alice, "addevent porch_motion")).await;
    assert!(reply.found);
    // The single-threaded test runtime has not polled the save yet.
    assert_eq!(std::fs::read(fx.state_path()).unwrap(), before);

    fx.dispatcher.flush().await;
    let reopened = SubscriptionStore::open(fx.state_path()).unwrap();
    assert!(reopened.event_exists("porch_motion"));
}

#[derive(Default)]
struct RecordingOutbound {
    sent: Mutex<Vec<(String, Notification)>>,
    failing: Vec<String>,
}

impl RecordingOutbound {
    fn contacts(&self) -> Vec<String> {
        let mut contacts: Vec<_> = self
            .sent
            .lock()
            .unwrap()
            .iter()
            .map(|(c, _)| c.clone())
            .collect();
        contacts.sort();
        contacts
    }
}

#[async_trait]
impl Outbound for RecordingOutbound {
    async fn send(&self, subscriber: &Subscriber, notification: &Notification) -> anyhow::Result<()> {
        if self.failing.iter().any(|c| c == subscriber.contact()) {
            anyhow::bail!("channel down");
        }
        self.sent
            .lock()
            .unwrap()
            .push((subscriber.contact().to_string(), notification.clone()));
        Ok(())
    }
}

#[tokio::test]
async fn notifier_attaches_camera_picture_and_pauses() {
    let fx = Fixture::new();
    for contact in ["alice", "bob"] {
        let sub = fx
            .store
            .create_or_update_subscriber("telegram", contact, false, false);
        sub.subscribe("Porch").unwrap();
    }
    let outbound = Arc::new(RecordingOutbound::default());
    let notifier = Notifier::new(fx.ctx.clone(), outbound.clone(), Vec::new());

    assert_eq!(notifier.notify("Porch", "motion on the porch").await, 2);
    assert_eq!(outbound.contacts(), ["alice", "bob"]);
    {
        let sent = outbound.sent.lock().unwrap();
        let file = sent[0].1.file.as_ref().unwrap();
        assert!(file.exists());
        assert!(
            file.file_name()
                .unwrap()
                .to_string_lossy()
                .starts_with("motifini_camera_motion_")
        );
        assert_eq!(sent[0].1.text, "motion on the porch");
    }

    // Default repeat delay is 60 seconds.
    assert!(notifier.recipients("Porch").is_empty());
    fx.clock.advance(Duration::from_secs(61));
    assert_eq!(notifier.recipients("Porch").len(), 2);

    fx.store
        .get_subscriber("telegram", "bob")
        .unwrap()
        .set_delay("Porch", Duration::from_secs(300))
        .unwrap();
    notifier.notify("Porch", "again").await;
    fx.clock.advance(Duration::from_secs(61));
    let recipients = notifier.recipients("Porch");
    assert_eq!(recipients.len(), 1);
    assert_eq!(recipients[0].contact(), "alice");
}

#[tokio::test]
async fn notifier_filters_apis_and_survives_failures() {
    let fx = Fixture::new();
    fx.store
        .create_or_update_subscriber("telegram", "alice", false, false)
        .subscribe("doorbell")
        .unwrap();
    fx.store
        .create_or_update_subscriber("imessage", "bob", false, false)
        .subscribe("doorbell")
        .unwrap();
    fx.store
        .create_or_update_subscriber("telegram", "carol", false, false)
        .subscribe("doorbell")
        .unwrap();

    let outbound = Arc::new(RecordingOutbound {
        failing: vec!["carol".to_string()],
        ..Default::default()
    });
    let notifier = Notifier::new(fx.ctx.clone(), outbound.clone(), vec!["tele".to_string()])
        .with_default_delay(Duration::from_secs(10));

    assert_eq!(notifier.notify("doorbell", "ding").await, 1);
    assert_eq!(outbound.contacts(), ["alice"]);
    // Not a camera, so nothing attached.
    assert!(outbound.sent.lock().unwrap()[0].1.file.is_none());

    // carol failed but is paused like everyone else notified.
    assert!(notifier.recipients("doorbell").is_empty());
    fx.clock.advance(Duration::from_secs(11));
    assert_eq!(notifier.recipients("doorbell").len(), 2);
    assert_eq!(notifier.notify("nothing-subscribed", "x").await, 0);
}
