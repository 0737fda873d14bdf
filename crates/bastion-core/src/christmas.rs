use chrono::{Datelike, NaiveDate, Utc};

use crate::{request::Request, router::Router, Result};

pub fn register(router: &mut Router) -> Result<()> {
    router.register("christmas", christmas)
}

async fn christmas(req: Request) -> Result<()> {
    req.reply(christmas_message(Utc::now().date_naive())).await?;
    Ok(())
}

/// Days from `today` until the next 25 December (0 on the day).
pub fn days_until_christmas(today: NaiveDate) -> i64 {
    let this_year = NaiveDate::from_ymd_opt(today.year(), 12, 25);
    let next = match this_year {
        Some(d) if d >= today => d,
        _ => NaiveDate::from_ymd_opt(today.year() + 1, 12, 25).unwrap_or(today),
    };
    (next - today).num_days()
}

pub fn christmas_message(today: NaiveDate) -> String {
    let msg = match days_until_christmas(today) {
        0 => "!!TODAY IS CHRISTMAS!!".to_string(),
        1 => "ONLY 1 DAY UNTIL CHRISTMAS!!".to_string(),
        n => format!("ONLY {n} DAYS UNTIL CHRISTMAS!!"),
    };
    festivize(&msg)
}

fn festivize(msg: &str) -> String {
    format!("🎄☃️☃️🎄🎁 {msg} 🎁🎄☃️☃️🎄")
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        chat::port::ChatBackend,
        member::MemberResolver,
        testing::{message, FakeChat},
    };

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn counts_down_and_wraps_after_christmas() {
        assert_eq!(days_until_christmas(date(2024, 12, 25)), 0);
        assert_eq!(days_until_christmas(date(2024, 12, 24)), 1);
        assert_eq!(days_until_christmas(date(2024, 12, 1)), 24);
        assert_eq!(days_until_christmas(date(2024, 12, 26)), 364);
    }

    #[test]
    fn messages() {
        assert_eq!(
            christmas_message(date(2024, 12, 25)),
            "🎄☃️☃️🎄🎁 !!TODAY IS CHRISTMAS!! 🎁🎄☃️☃️🎄"
        );
        assert_eq!(
            christmas_message(date(2024, 12, 24)),
            "🎄☃️☃️🎄🎁 ONLY 1 DAY UNTIL CHRISTMAS!! 🎁🎄☃️☃️🎄"
        );
        assert_eq!(
            christmas_message(date(2024, 12, 15)),
            "🎄☃️☃️🎄🎁 ONLY 10 DAYS UNTIL CHRISTMAS!! 🎁🎄☃️☃️🎄"
        );
    }

    #[tokio::test]
    async fn command_replies_once() {
        let chat = Arc::new(FakeChat::new());
        let backend: Arc<dyn ChatBackend> = chat.clone();
        let mut router = Router::new();
        register(&mut router).unwrap();

        let req = Request::new(
            message(1, "!christmas"),
            "christmas",
            backend.clone(),
            Arc::new(MemberResolver::new(backend)),
        );
        router.dispatch(req).await.unwrap();

        let texts = chat.sent_texts();
        assert_eq!(texts.len(), 1);
        assert!(texts[0].contains("CHRISTMAS"));
    }
}
