use tracing::debug;

use crate::{
    errors::Error,
    fit::{
        auth::connect_token,
        embeds::{leaderboard_embed, profile_embed},
        user::fit_score_leaderboard,
        workout::ActivitySummary,
        FitContext,
    },
    request::Request,
    router::Router,
    Result,
};

const LOADING: &str = "Loading leaderboard...";

/// Register `fit profile`, `fit leaderboard` and `fit auth`.
pub fn register(router: &mut Router, ctx: FitContext) -> Result<()> {
    let fit = router.sub_router("fit")?;

    let c = ctx.clone();
    fit.register("profile", move |req: Request| {
        let c = c.clone();
        async move { profile(&c, req).await }
    })?;

    let c = ctx.clone();
    fit.register("leaderboard", move |req: Request| {
        let c = c.clone();
        async move { leaderboard(&c, req).await }
    })?;

    fit.register("auth", move |req: Request| {
        let c = ctx.clone();
        async move { auth(&c, req).await }
    })?;

    Ok(())
}

pub async fn profile(ctx: &FitContext, req: Request) -> Result<()> {
    let id = req.author().id;
    let Some(user) = ctx.users.find_user(id).await? else {
        req.reply(format!(
            "You have not set up your account with the bot. Use `{}fit auth` to get started!",
            ctx.instigator
        ))
        .await?;
        return Ok(());
    };

    let (member, logs) = tokio::try_join!(req.get_member(None), ctx.workouts.logs_for_user(id))?;
    let summary = ActivitySummary::from_logs(&logs);
    req.reply(profile_embed(&member, &user.profile(), &summary))
        .await?;
    Ok(())
}

pub async fn leaderboard(ctx: &FitContext, req: Request) -> Result<()> {
    let entries = fit_score_leaderboard(&ctx.users.all_users().await?);
    if entries.is_empty() {
        req.reply("Nobody has a fit score :(").await?;
        return Ok(());
    }

    let loading = req.reply(LOADING).await?;
    let posted = async {
        let ids: Vec<_> = entries.iter().map(|e| e.user_id).collect();
        let nicknames = req.nicknames(&ids).await?;
        req.reply(leaderboard_embed(&entries, &nicknames)).await?;
        Ok::<(), Error>(())
    }
    .await;
    // The placeholder goes away whether or not the embed made it.
    let deleted = req.delete(loading).await;
    posted?;
    deleted
}

pub async fn auth(ctx: &FitContext, req: Request) -> Result<()> {
    let id = req.author().id;
    let (record, password) = ctx.auth.get_or_create(id).await?;
    if record.is_connected() {
        req.reply("Your Strava account is already connected!")
            .await?;
        return Ok(());
    }

    let password = match password {
        Some(p) => p,
        None => ctx.auth.reset_password(id).await?,
    };
    let url = ctx.strava.authorize_url(&connect_token(id, &password));
    debug!(user_id = %id, "sending strava connect link");

    req.reply_direct(format!(
        "Connect your Strava account to start earning exp: {url}"
    ))
    .await?;
    req.reply("Check your DMs").await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        chat::{port::ChatBackend, types::MessagePayload},
        domain::{StravaId, UserId},
        fit::{
            store::{AuthRepository, MemoryStore, UserRepository},
            user::User,
        },
        member::MemberResolver,
        testing::{message, FakeChat, FakeStrava},
    };

    struct Harness {
        chat: Arc<FakeChat>,
        store: Arc<MemoryStore>,
        router: Router,
    }

    fn harness() -> Harness {
        let chat = Arc::new(FakeChat::new());
        let store = Arc::new(MemoryStore::new());
        let ctx = FitContext::from_store(store.clone(), Arc::new(FakeStrava::new()), "!");
        let mut router = Router::new();
        register(&mut router, ctx).unwrap();
        Harness { chat, store, router }
    }

    impl Harness {
        async fn run(&self, author: u64, text: &str) {
            self.try_run(author, text).await.unwrap();
        }

        async fn try_run(&self, author: u64, text: &str) -> Result<()> {
            let backend: Arc<dyn ChatBackend> = self.chat.clone();
            let req = Request::new(
                message(author, &format!("!{text}")),
                text,
                backend.clone(),
                Arc::new(MemberResolver::new(backend)),
            );
            self.router.dispatch(req).await.map(|_| ())
        }
    }

    #[tokio::test]
    async fn profile_without_account_points_at_auth() {
        let h = harness();
        h.run(5, "fit profile").await;
        assert_eq!(
            h.chat.sent_texts(),
            vec![
                "You have not set up your account with the bot. Use `!fit auth` to get started!"
                    .to_string()
            ]
        );
    }

    #[tokio::test]
    async fn profile_replies_embed() {
        let h = harness();
        h.chat.add_member(5, "five", Some("Fiver"), None);
        h.store.save_user(&User::new(UserId(5))).await.unwrap();

        h.run(5, "fit profile").await;
        let sent = h.chat.sent();
        assert_eq!(sent.len(), 1);
        match &sent[0].1 {
            MessagePayload::Embed(e) => {
                assert_eq!(e.title.as_deref(), Some("Fiver's profile"));
            }
            other => panic!("expected embed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn empty_leaderboard() {
        let h = harness();
        h.store.save_user(&User::new(UserId(5))).await.unwrap();
        h.run(5, "fit leaderboard").await;
        assert_eq!(h.chat.sent_texts(), vec!["Nobody has a fit score :(".to_string()]);
        assert!(h.chat.deleted().is_empty());
    }

    #[tokio::test]
    async fn leaderboard_cleans_up_placeholder_when_member_is_gone() {
        let h = harness();
        let mut user = User::new(UserId(5));
        user.fit_score = 10.0;
        h.store.save_user(&user).await.unwrap();

        let err = h.try_run(5, "fit leaderboard").await.unwrap_err();
        assert!(matches!(err, Error::MissingUser(_)));
        assert_eq!(h.chat.sent_texts(), vec![LOADING.to_string()]);
        let deleted = h.chat.deleted();
        assert_eq!(deleted.len(), 1);
        assert_eq!(deleted[0].channel_id, h.chat.sent()[0].0);
    }

    #[tokio::test]
    async fn leaderboard_replaces_placeholder() {
        let h = harness();
        h.chat.add_member(5, "five", Some("Fiver"), None);
        let mut user = User::new(UserId(5));
        user.fit_score = 40.0;
        h.store.save_user(&user).await.unwrap();

        h.run(5, "fit leaderboard").await;
        let sent = h.chat.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].1, MessagePayload::from(LOADING));
        assert!(matches!(&sent[1].1, MessagePayload::Embed(_)));
        let deleted = h.chat.deleted();
        assert_eq!(deleted.len(), 1);
        assert_eq!(deleted[0].channel_id, sent[0].0);
    }

    #[tokio::test]
    async fn auth_dms_link_with_token() {
        let h = harness();
        h.run(5, "fit auth").await;

        assert_eq!(h.chat.sent_texts(), vec!["Check your DMs".to_string()]);
        let direct = h.chat.direct();
        assert_eq!(direct.len(), 1);
        assert_eq!(direct[0].0, UserId(5));
        let MessagePayload::Text(text) = &direct[0].1 else {
            panic!("expected text DM");
        };
        let token = text.rsplit("state=").next().unwrap();
        let (id, password) = crate::fit::auth::parse_token(token).unwrap();
        assert_eq!(id, UserId(5));
        assert!(h.store.get_authorized(id, password).await.is_ok());

        // Asking again rotates the password and sends a fresh link.
        h.run(5, "fit auth").await;
        assert_eq!(h.chat.direct().len(), 2);
        assert!(h.store.get_authorized(id, password).await.is_err());
    }

    #[tokio::test]
    async fn auth_when_connected() {
        let h = harness();
        let (mut record, _) = h.store.get_or_create(UserId(5)).await.unwrap();
        record.link_to_strava(StravaId::from("1"), "r");
        h.store.save_auth(&record).await.unwrap();

        h.run(5, "fit auth").await;
        assert_eq!(
            h.chat.sent_texts(),
            vec!["Your Strava account is already connected!".to_string()]
        );
        assert!(h.chat.direct().is_empty());
    }
}
