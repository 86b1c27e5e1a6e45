use std::{sync::Arc, time::Duration};

use motifini_subscribe::{Error as StoreError, Rules, Subscriber};

use super::{bind, flags, subscriber_line, subscription_lines};
use crate::{
    CommandError, Result,
    command::{Command, CommandGroup, Level, Reply, Request},
    context::ChatContext,
    dispatcher::save_state,
};

const PUBLIC_IP_URL: &str = "https://ifconfig.me";
const PUBLIC_IP_TIMEOUT: Duration = Duration::from_secs(5);

/// Commands only admins can see or run.
pub fn admin_commands(ctx: &Arc<ChatContext>) -> CommandGroup {
    CommandGroup::new("Admin", Level::Admin, vec![
        Command::new(&["ip"], bind(ctx, public_ip)).description("Returns public IP from ifconfig.me."),
        Command::new(&["save"], bind(ctx, save)).description("Saves subscriber data to a file."),
        Command::new(&["subs", "subscribers"], bind(ctx, subscribers))
            .usage("[subscriber]")
            .description("Displays all subscribers, or one subscriber's subscriptions."),
        Command::new(&["ignores"], bind(ctx, ignores)).description("Displays all ignored subscribers."),
        Command::new(&["ignore"], bind(ctx, ignore))
            .usage("<subscriber>")
            .description("Ignores a subscriber.")
            .persist(),
        Command::new(&["unignore"], bind(ctx, unignore))
            .usage("<subscriber>")
            .description("Removes a subscriber's ignore.")
            .persist(),
        Command::new(&["admins"], bind(ctx, admins))
            .description("Displays all administrative subscribers."),
        Command::new(&["admin"], bind(ctx, admin))
            .usage("<subscriber>")
            .description("Gives a subscriber administrative access.")
            .persist(),
        Command::new(&["unadmin"], bind(ctx, unadmin))
            .usage("<subscriber>")
            .description("Removes a subscriber's administrative access.")
            .persist(),
        Command::new(&["addevent"], bind(ctx, add_event))
            .usage("<name> [description]")
            .description("Adds an event, or updates its description.")
            .persist(),
        Command::new(&["rmevent"], bind(ctx, remove_event))
            .usage("<name>")
            .description("Removes an event and every subscription to it.")
            .persist(),
    ])
}

/// Look a contact up on the requester's API first, then on any API as long
/// as the contact is unambiguous.
fn find_target(
    ctx: &ChatContext,
    req: &Request,
    contact: &str,
) -> motifini_subscribe::Result<Arc<Subscriber>> {
    if let Ok(sub) = ctx.store.get_subscriber(&req.api, contact) {
        return Ok(sub);
    }
    let mut matches = ctx.store.find_by_contact(contact);
    match matches.pop() {
        Some(sub) if matches.is_empty() => Ok(sub),
        _ => Err(StoreError::subscriber_not_found(&req.api, contact)),
    }
}

/// The single `<subscriber>` argument of a mutating admin command.
fn target(ctx: &ChatContext, req: &Request) -> Result<Arc<Subscriber>> {
    if req.arg_count() != 1 {
        return Err(CommandError::bad_usage("must provide exactly one subscriber"));
    }
    Ok(find_target(ctx, req, req.arg(0).unwrap_or_default())?)
}

fn listing(title: String, subs: &[Arc<Subscriber>]) -> Reply {
    let mut msg = title;
    for (i, sub) in subs.iter().enumerate() {
        msg.push_str(&subscriber_line(i, sub));
    }
    Reply::text(msg)
}

async fn public_ip(ctx: Arc<ChatContext>, _req: Request) -> Result<Reply> {
    let body = ctx
        .http
        .get(PUBLIC_IP_URL)
        .timeout(PUBLIC_IP_TIMEOUT)
        .send()
        .await?
        .error_for_status()?
        .text()
        .await?;
    Ok(Reply::text(format!("Public IP: {}", body.trim())))
}

async fn save(ctx: Arc<ChatContext>, _req: Request) -> Result<Reply> {
    save_state(ctx.store.clone()).await?;
    Ok(Reply::text("Saved"))
}

async fn subscribers(ctx: Arc<ChatContext>, req: Request) -> Result<Reply> {
    if req.arg_count() == 0 {
        let all = ctx.store.all();
        return Ok(listing(
            format!("There are {} total subscribers:", all.len()),
            &all,
        ));
    }

    let contact = req.rest(0);
    let Ok(sub) = find_target(&ctx, &req, &contact) else {
        return Ok(Reply::text(format!("Subscriber does not exist: {contact}")));
    };

    let count = sub.subscription_count();
    if count == 0 {
        return Ok(Reply::text(format!("{contact} has no subscriptions.")));
    }
    Ok(Reply::text(format!(
        "{}{} has {count} subscriptions:{}",
        sub.contact(),
        flags(&sub),
        subscription_lines(&sub)
    )))
}

async fn ignores(ctx: Arc<ChatContext>, _req: Request) -> Result<Reply> {
    let ignored = ctx.store.ignored();
    Ok(listing(
        format!("There are {} ignored subscribers:", ignored.len()),
        &ignored,
    ))
}

async fn admins(ctx: Arc<ChatContext>, _req: Request) -> Result<Reply> {
    let admins = ctx.store.admins();
    Ok(listing(format!("There are {} admins:", admins.len()), &admins))
}

async fn ignore(ctx: Arc<ChatContext>, req: Request) -> Result<Reply> {
    let sub = target(&ctx, &req)?;
    sub.ignore();
    Ok(Reply::text(format!("Subscriber '{}' ignored.", sub.contact())))
}

async fn unignore(ctx: Arc<ChatContext>, req: Request) -> Result<Reply> {
    let sub = target(&ctx, &req)?;
    sub.set_ignored(false);
    Ok(Reply::text(format!(
        "Subscriber '{}' no longer ignored.",
        sub.contact()
    )))
}

async fn admin(ctx: Arc<ChatContext>, req: Request) -> Result<Reply> {
    let sub = target(&ctx, &req)?;
    sub.set_admin(true);
    Ok(Reply::text(format!(
        "Subscriber '{}' updated with admin privileges.",
        sub.contact()
    )))
}

async fn unadmin(ctx: Arc<ChatContext>, req: Request) -> Result<Reply> {
    let sub = target(&ctx, &req)?;
    sub.set_admin(false);
    Ok(Reply::text(format!(
        "Subscriber '{}' updated without admin privileges.",
        sub.contact()
    )))
}

async fn add_event(ctx: Arc<ChatContext>, req: Request) -> Result<Reply> {
    let Some(name) = req.arg(0) else {
        return Err(CommandError::bad_usage("must provide an event name"));
    };

    let description = req.rest(1);
    let mut rules = Rules::new();
    if !description.is_empty() {
        rules.insert("description".to_string(), description);
    }

    let msg = if ctx.store.upsert_event(name, rules) {
        format!("Event '{name}' added.")
    } else {
        format!("Event '{name}' updated.")
    };
    Ok(Reply::text(msg))
}

async fn remove_event(ctx: Arc<ChatContext>, req: Request) -> Result<Reply> {
    if req.arg_count() == 0 {
        return Err(CommandError::bad_usage("must provide an event name"));
    }
    let name = req.rest(0);
    if !ctx.store.event_exists(&name) {
        return Err(StoreError::event_not_found(name).into());
    }

    let removed = ctx.store.remove_event(&name);
    Ok(Reply::text(format!(
        "Event '{name}' removed along with {removed} subscriptions."
    )))
}
