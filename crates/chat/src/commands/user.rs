use std::{fmt::Write, path::Path, sync::Arc, time::Duration};

use {futures::future::join_all, motifini_subscribe::Error as StoreError, tracing::warn};

use super::{bind, format_duration, subscription_lines};
use crate::{
    CommandError, Result,
    command::{Command, CommandGroup, Level, Reply, Request},
    context::ChatContext,
};

/// Pause length when `stop` is sent without a number.
const DEFAULT_PAUSE_MINUTES: u64 = 10;

/// Commands every subscriber can use.
pub fn user_commands(ctx: &Arc<ChatContext>) -> CommandGroup {
    CommandGroup::new("User", Level::User, vec![
        Command::new(&["cams", "cam", "cameras"], bind(ctx, cameras))
            .description("Displays all available cameras by name."),
        Command::new(&["events"], bind(ctx, events)).description("Displays all available events."),
        Command::new(&["subs", "subscriptions"], bind(ctx, subscriptions))
            .description("Shows your subscriptions."),
        Command::new(&["sub", "subscribe"], bind(ctx, subscribe))
            .usage("<camera|event>")
            .description("Enables notifications from <camera> or <event>.")
            .persist(),
        Command::new(&["unsub", "unsubscribe"], bind(ctx, unsubscribe))
            .usage("<camera|event|*>")
            .description(
                "Stops notifications from <camera>, or <event> or everything if '*' is passed.",
            )
            .persist(),
        Command::new(&["stop", "quit", "pause"], bind(ctx, stop))
            .usage("[mins] [camera|event]")
            .description(
                "Stops all notifications for 10 minutes or [mins] on everything or [camera|event]. \
                 Use 0 to resume.",
            )
            .persist(),
        Command::new(&["pics", "pic", "pictures"], bind(ctx, pictures))
            .usage("[camera]")
            .description("Sends pictures from all cameras, or from [camera]."),
        Command::new(&["vid", "vids", "video"], bind(ctx, videos))
            .usage("[camera]")
            .description("Sends video from all cameras, or from [camera]."),
        Command::new(&["delay"], bind(ctx, delay))
            .usage("<seconds> <camera|event>")
            .description(
                "The default delay between notifications from an event is 60 seconds. \
                 You can adjust that per event using this command.",
            )
            .persist(),
    ])
}

async fn cameras(ctx: Arc<ChatContext>, _req: Request) -> Result<Reply> {
    let names = ctx.cameras.names();
    let mut msg = format!("There are {} cameras:\n", names.len());
    for (i, name) in names.iter().enumerate() {
        let _ = writeln!(msg, "{}: {name}", i + 1);
    }
    Ok(Reply::text(msg))
}

async fn events(ctx: Arc<ChatContext>, _req: Request) -> Result<Reply> {
    let events = ctx.store.events();
    let mut msg = format!("There are {} events:\n", events.len());
    for (i, (name, rules)) in events.iter().enumerate() {
        let description = rules.get("description").map(String::as_str).unwrap_or("");
        let _ = writeln!(msg, "{}: {name} - {description}", i + 1);
    }
    Ok(Reply::text(msg))
}

async fn subscriptions(_ctx: Arc<ChatContext>, req: Request) -> Result<Reply> {
    // Admins asking about someone else are answered by the admin group.
    if req.subscriber.is_admin() && req.arg_count() > 0 {
        return Ok(Reply::default());
    }

    let mut msg = format!("Your Subscriptions:{}\n", subscription_lines(&req.subscriber));
    if req.subscriber.subscription_count() == 0 {
        msg.push_str("(none)\n");
    }
    Ok(Reply::text(msg))
}

fn count_line(req: &Request) -> String {
    format!(
        "\nYou have {} event subscriptions.",
        req.subscriber.subscription_count()
    )
}

async fn subscribe(ctx: Arc<ChatContext>, req: Request) -> Result<Reply> {
    if req.arg_count() == 0 {
        return Err(CommandError::bad_usage(
            "must provide an event or camera name to subscribe",
        ));
    }

    // Event names are checked first; cameras are never added to the registry.
    let name = req.rest(0);
    let (kind, event, subscribed) = match ctx.store.subscribe_to_event(&req.subscriber, &name) {
        Err(StoreError::EventNotFound { .. }) => match ctx.cameras.by_name(&name) {
            Some(camera) => {
                let subscribed = req.subscriber.subscribe(&camera);
                ("camera", camera, subscribed)
            },
            None => {
                return Err(CommandError::bad_usage(format!(
                    "Event or Camera not found: {name}"
                )));
            },
        },
        subscribed => ("event", name, subscribed),
    };

    let mut msg = match subscribed {
        Ok(()) => format!("You've been subscribed to {kind}: {event}"),
        Err(StoreError::EventExists { .. }) => {
            format!("You're already subscribed to {kind}: {event}")
        },
        Err(e) => return Err(e.into()),
    };
    msg.push_str(&count_line(&req));
    Ok(Reply::text(msg))
}

async fn unsubscribe(_ctx: Arc<ChatContext>, req: Request) -> Result<Reply> {
    if req.arg_count() == 0 {
        return Err(CommandError::bad_usage(
            "must provide an event or camera name to unsubscribe",
        ));
    }

    let query = req.rest(0);
    if query == "*" {
        req.subscriber.unsubscribe_all();
        return Ok(Reply::text("You've been unsubscribed from all events."));
    }

    let mut msg = match req.subscriber.subscription_name(&query) {
        None => format!("You're not subscribed to: {query}"),
        Some(event) => {
            req.subscriber.unsubscribe(&event)?;
            format!("You've been unsubscribed from: {event}")
        },
    };
    msg.push_str(&count_line(&req));
    Ok(Reply::text(msg))
}

fn parse_number(raw: &str) -> Result<u64> {
    raw.parse()
        .map_err(|_| CommandError::bad_usage(format!("Unable to parse into a number: {raw}")))
}

async fn stop(_ctx: Arc<ChatContext>, req: Request) -> Result<Reply> {
    let minutes = match req.arg(0) {
        Some(raw) => parse_number(raw)?,
        None => DEFAULT_PAUSE_MINUTES,
    };
    let duration = Duration::from_secs(minutes.saturating_mul(60));

    if req.arg_count() > 1 {
        let query = req.rest(1);
        let event = req.subscriber.subscription_name(&query).unwrap_or(query);
        let msg = match req.subscriber.pause(&event, duration) {
            Ok(()) if minutes == 0 => format!("Notifications from '{event}' are no longer paused."),
            Ok(()) => {
                format!("Notifications from '{event}' paused for at least {minutes} minutes.")
            },
            Err(e) if e.is_not_found() => format!("You're not subscribed to: {event}"),
            Err(e) => return Err(e.into()),
        };
        return Ok(Reply::text(msg));
    }

    req.subscriber.pause_all(duration);
    let msg = if minutes == 0 {
        "Notifications are no longer paused.".to_string()
    } else {
        format!("Notifications paused for at least {minutes} minutes.")
    };
    Ok(Reply::text(msg))
}

async fn delay(_ctx: Arc<ChatContext>, req: Request) -> Result<Reply> {
    if req.arg_count() < 2 {
        return Err(CommandError::bad_usage(
            "must provide <seconds> as a number and the event or camera name",
        ));
    }
    let secs = parse_number(req.arg(0).unwrap_or_default())?;

    let query = req.rest(1);
    let Some(event) = req.subscriber.subscription_name(&query) else {
        return Ok(Reply::text(format!("You are not subscribed to: {query}")));
    };

    let delay = Duration::from_secs(secs);
    req.subscriber.set_delay(&event, delay)?;
    Ok(Reply::text(format!(
        "Set repeat delay for '{event}' to {}",
        format_duration(delay)
    )))
}

#[derive(Debug, Clone, Copy)]
enum Media {
    Picture,
    Video,
}

impl Media {
    fn extension(self) -> &'static str {
        match self {
            Self::Picture => "jpg",
            Self::Video => "mp4",
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::Picture => "Picture",
            Self::Video => "Video",
        }
    }

    async fn save(self, ctx: &ChatContext, camera: &str, path: &Path) -> anyhow::Result<()> {
        match self {
            Self::Picture => ctx.capture.save_picture(camera, path).await,
            Self::Video => ctx.capture.save_video(camera, path).await,
        }
    }
}

async fn pictures(ctx: Arc<ChatContext>, req: Request) -> Result<Reply> {
    send_media(&ctx, &req, Media::Picture).await
}

async fn videos(ctx: Arc<ChatContext>, req: Request) -> Result<Reply> {
    send_media(&ctx, &req, Media::Video).await
}

/// Capture from one named camera, or from all of them concurrently.
async fn send_media(ctx: &ChatContext, req: &Request, media: Media) -> Result<Reply> {
    let cameras = if req.arg_count() > 0 {
        let name = req.rest(0);
        match ctx.cameras.by_name(&name) {
            Some(camera) => vec![camera],
            None => return Err(CommandError::bad_usage(format!("Unknown Camera: {name}"))),
        }
    } else {
        ctx.cameras.names()
    };

    let captures = cameras.iter().map(|camera| {
        let path = ctx.artifact_path("chat_command", &req.id, camera, media.extension());
        async move {
            let result = media.save(ctx, camera, &path).await;
            (camera, path, result)
        }
    });

    let mut msg = String::new();
    let mut files = Vec::new();
    for (camera, path, result) in join_all(captures).await {
        match result {
            Ok(()) => files.push(path),
            Err(e) => {
                warn!(request_id = %req.id, camera = %camera, error = %e, "capture failed");
                let _ = writeln!(msg, "Error Getting '{camera}' {}: {e:#}", media.label());
            },
        }
    }
    Ok(Reply::with_files(msg, files))
}
