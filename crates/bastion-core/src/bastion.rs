use std::{
    collections::HashMap,
    sync::{Arc, OnceLock},
};

use tokio::{
    sync::{mpsc, Semaphore},
    task::JoinHandle,
};
use tracing::{debug, error, info};

use crate::{
    chat::{
        port::ChatBackend,
        types::{GatewayEvent, InboundMessage, MessagePayload, ReadyInfo},
    },
    config::Config,
    domain::{ChannelId, MessageRef, UserId},
    errors::Error,
    member::{DiscordMember, MemberResolver},
    request::Request,
    router::{Dispatched, Router},
    Result,
};

#[derive(Clone, Debug)]
pub struct BastionSettings {
    /// Prefix that marks a message as a command.
    pub instigator: String,
    /// Upper bound on handlers running at once (`None` = unbounded).
    pub max_concurrent_commands: Option<usize>,
}

impl From<&Config> for BastionSettings {
    fn from(cfg: &Config) -> Self {
        Self {
            instigator: cfg.instigator.clone(),
            max_concurrent_commands: cfg.max_concurrent_commands,
        }
    }
}

/// How one supervised dispatch ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DispatchOutcome {
    Handled { path: String },
    NoMatch,
    Failed { error: String },
    Panicked,
}

/// Owns the chat connection: gates inbound traffic, dispatches commands
/// through the router and exposes send/member helpers for code outside the
/// request path (webhook-triggered posts).
pub struct Bastion {
    settings: BastionSettings,
    router: Arc<Router>,
    chat: Arc<dyn ChatBackend>,
    members: Arc<MemberResolver>,
    bot_id: OnceLock<UserId>,
    limiter: Option<Arc<Semaphore>>,
}

impl Bastion {
    pub fn new(settings: BastionSettings, router: Router, chat: Arc<dyn ChatBackend>) -> Self {
        let limiter = settings
            .max_concurrent_commands
            .map(|n| Arc::new(Semaphore::new(n)));

        Self {
            members: Arc::new(MemberResolver::new(chat.clone())),
            settings,
            router: Arc::new(router),
            chat,
            bot_id: OnceLock::new(),
            limiter,
        }
    }

    pub fn instigator(&self) -> &str {
        &self.settings.instigator
    }

    pub fn bot_id(&self) -> Option<UserId> {
        self.bot_id.get().copied()
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    /// Consume the gateway event stream until it closes.
    ///
    /// `on_connect` runs once, on the first `Ready`. A closed stream means the
    /// connection is gone; there is no reconnect here.
    pub async fn run<F>(&self, mut events: mpsc::Receiver<GatewayEvent>, on_connect: F) -> Result<()>
    where
        F: FnOnce(&ReadyInfo),
    {
        let mut on_connect = Some(on_connect);

        while let Some(event) = events.recv().await {
            match event {
                GatewayEvent::Ready(ready) => {
                    let _ = self.bot_id.set(ready.bot_id);
                    info!(bot = %ready.bot_name, bot_id = %ready.bot_id, "chat connection ready");
                    if let Some(cb) = on_connect.take() {
                        cb(&ready);
                    }
                }
                GatewayEvent::Message(msg) => {
                    let _ = self.on_message(msg);
                }
            }
        }

        Err(Error::Disconnected)
    }

    /// Filter one inbound message and, if it is a command, dispatch it on its
    /// own task. Returns the supervising task handle for dispatched messages.
    pub fn on_message(&self, msg: InboundMessage) -> Option<JoinHandle<DispatchOutcome>> {
        if msg.author.bot || Some(msg.author.id) == self.bot_id() {
            return None;
        }

        let text = msg
            .content
            .strip_prefix(self.settings.instigator.as_str())?
            .to_string();

        debug!(author = %msg.author.id, content = %msg.content, "command message");

        let req = Request::new(msg, text, self.chat.clone(), self.members.clone());
        Some(tokio::spawn(supervise(
            self.router.clone(),
            req,
            self.limiter.clone(),
        )))
    }

    pub async fn get_member(&self, id: UserId) -> Result<DiscordMember> {
        self.members.get_member(id).await
    }

    /// id → display name for many members; one failure fails the batch.
    pub async fn nicknames_map(&self, ids: &[UserId]) -> Result<HashMap<UserId, String>> {
        self.members.nicknames_map(ids).await
    }

    /// Send to a channel known to the connection's channel cache.
    ///
    /// Unlike member lookups there is no fetch fallback.
    pub async fn send_to(
        &self,
        channel: ChannelId,
        payload: impl Into<MessagePayload>,
    ) -> Result<MessageRef> {
        if !self.chat.has_channel(channel) {
            return Err(Error::ChannelNotFound(format!(
                "Can't get channel with id {channel}"
            )));
        }
        let payload = payload.into();
        debug!(channel = %channel, preview = payload.preview(), "sending to channel");
        self.chat.send_message(channel, payload).await
    }
}

async fn supervise(
    router: Arc<Router>,
    req: Request,
    limiter: Option<Arc<Semaphore>>,
) -> DispatchOutcome {
    let _permit = match limiter {
        Some(sem) => sem.acquire_owned().await.ok(),
        None => None,
    };

    let author = req.author().id;
    let content = req.content().to_string();
    let task = tokio::spawn(async move { router.dispatch(req).await });

    match task.await {
        Ok(Ok(Dispatched::Handled { path })) => DispatchOutcome::Handled { path },
        Ok(Ok(Dispatched::NoMatch)) => DispatchOutcome::NoMatch,
        Ok(Err(e)) => {
            debug!(author = %author, content = %content, error = %e, "command failed");
            DispatchOutcome::Failed {
                error: e.to_string(),
            }
        }
        Err(e) => {
            error!(author = %author, content = %content, error = %e, "command handler panicked");
            DispatchOutcome::Panicked
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::atomic::{AtomicUsize, Ordering},
        time::Duration,
    };

    use super::*;
    use crate::testing::{message, FakeChat};

    fn settings(limit: Option<usize>) -> BastionSettings {
        BastionSettings {
            instigator: "!".to_string(),
            max_concurrent_commands: limit,
        }
    }

    fn counting_router(hits: &Arc<AtomicUsize>) -> Router {
        let mut router = Router::new();
        let hits = hits.clone();
        router
            .register("fit", move |req: Request| {
                let hits = hits.clone();
                async move {
                    hits.fetch_add(1, Ordering::SeqCst);
                    req.reply(format!("fit:{}", req.remainder())).await?;
                    Ok::<(), Error>(())
                }
            })
            .unwrap();
        router
    }

    #[tokio::test]
    async fn instigated_message_is_dispatched() {
        let chat = Arc::new(FakeChat::new());
        let hits = Arc::new(AtomicUsize::new(0));
        let bastion = Bastion::new(settings(None), counting_router(&hits), chat.clone());

        let outcome = bastion
            .on_message(message(1, "!fit profile"))
            .unwrap()
            .await
            .unwrap();

        assert_eq!(
            outcome,
            DispatchOutcome::Handled {
                path: "fit".to_string()
            }
        );
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(chat.sent_texts(), vec!["fit:profile".to_string()]);
    }

    #[tokio::test]
    async fn unknown_and_unprefixed_messages_do_nothing() {
        let chat = Arc::new(FakeChat::new());
        let hits = Arc::new(AtomicUsize::new(0));
        let bastion = Bastion::new(settings(None), counting_router(&hits), chat.clone());

        assert!(bastion.on_message(message(1, "fit profile")).is_none());
        let outcome = bastion
            .on_message(message(1, "!unknown foo"))
            .unwrap()
            .await
            .unwrap();

        assert_eq!(outcome, DispatchOutcome::NoMatch);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        assert!(chat.sent().is_empty());
    }

    #[tokio::test]
    async fn own_and_bot_messages_are_dropped() {
        let chat = Arc::new(FakeChat::new());
        let hits = Arc::new(AtomicUsize::new(0));
        let bastion = Bastion::new(settings(None), counting_router(&hits), chat.clone());

        let (tx, rx) = mpsc::channel(8);
        tx.send(GatewayEvent::Ready(ReadyInfo {
            bot_id: UserId(999),
            bot_name: "bastion".to_string(),
        }))
        .await
        .unwrap();
        drop(tx);
        let _ = bastion.run(rx, |_| {}).await;

        assert!(bastion.on_message(message(999, "!fit profile")).is_none());

        let mut other_bot = message(5, "!fit profile");
        other_bot.author.bot = true;
        assert!(bastion.on_message(other_bot).is_none());

        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn run_calls_on_connect_once_and_reports_disconnect() {
        let chat = Arc::new(FakeChat::new());
        let hits = Arc::new(AtomicUsize::new(0));
        let bastion = Bastion::new(settings(None), counting_router(&hits), chat.clone());

        let (tx, rx) = mpsc::channel(8);
        for _ in 0..2 {
            tx.send(GatewayEvent::Ready(ReadyInfo {
                bot_id: UserId(999),
                bot_name: "bastion".to_string(),
            }))
            .await
            .unwrap();
        }
        drop(tx);

        let mut connects = 0;
        let err = bastion.run(rx, |_| connects += 1).await.unwrap_err();
        assert!(matches!(err, Error::Disconnected));
        assert_eq!(connects, 1);
        assert_eq!(bastion.bot_id(), Some(UserId(999)));
    }

    #[tokio::test]
    async fn panicking_handler_does_not_affect_others() {
        let chat = Arc::new(FakeChat::new());
        let hits = Arc::new(AtomicUsize::new(0));
        let mut router = counting_router(&hits);
        async fn boom(_req: Request) -> Result<()> {
            panic!("handler bug")
        }
        router.register("boom", boom).unwrap();
        router
            .register("fail", |_req: Request| async {
                Err::<(), _>(Error::NotConnected("no strava".to_string()))
            })
            .unwrap();
        let bastion = Bastion::new(settings(None), router, chat.clone());

        let boom = bastion.on_message(message(1, "!boom")).unwrap().await.unwrap();
        assert_eq!(boom, DispatchOutcome::Panicked);

        let fail = bastion.on_message(message(1, "!fail")).unwrap().await.unwrap();
        assert!(matches!(fail, DispatchOutcome::Failed { .. }));

        let ok = bastion
            .on_message(message(1, "!fit again"))
            .unwrap()
            .await
            .unwrap();
        assert!(matches!(ok, DispatchOutcome::Handled { .. }));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn concurrency_limit_is_respected() {
        let chat = Arc::new(FakeChat::new());
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let mut router = Router::new();
        {
            let running = running.clone();
            let peak = peak.clone();
            router
                .register("slow", move |_req: Request| {
                    let running = running.clone();
                    let peak = peak.clone();
                    async move {
                        let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                        peak.fetch_max(now, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(20)).await;
                        running.fetch_sub(1, Ordering::SeqCst);
                        Ok::<(), Error>(())
                    }
                })
                .unwrap();
        }
        let bastion = Bastion::new(settings(Some(2)), router, chat);

        let handles: Vec<_> = (0..6)
            .map(|_| bastion.on_message(message(1, "!slow")).unwrap())
            .collect();
        for h in handles {
            assert!(matches!(h.await.unwrap(), DispatchOutcome::Handled { .. }));
        }
        assert!(peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn send_to_requires_cached_channel() {
        let chat = Arc::new(FakeChat::new());
        chat.add_channel(42);
        let bastion = Bastion::new(settings(None), Router::new(), chat.clone());

        bastion.send_to(ChannelId(42), "hello").await.unwrap();
        let err = bastion.send_to(ChannelId(43), "hello").await.unwrap_err();
        assert!(matches!(err, Error::ChannelNotFound(_)));
        assert_eq!(chat.sent().len(), 1);
    }

    #[tokio::test]
    async fn get_member_is_consistent_between_fetch_and_cache() {
        let chat = Arc::new(FakeChat::new());
        chat.add_member(3, "three", Some("Trois"), None);
        let bastion = Bastion::new(settings(None), Router::new(), chat.clone());

        let fresh = bastion.get_member(UserId(3)).await.unwrap();
        let cached = bastion.get_member(UserId(3)).await.unwrap();
        assert_eq!(fresh, cached);

        let map = bastion.nicknames_map(&[UserId(3)]).await.unwrap();
        assert_eq!(map[&UserId(3)], "Trois");
    }
}
