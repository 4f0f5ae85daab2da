//! End-to-end tests for the lead bot.
//!
//! Each test builds a `LeadBot` over a recording gateway, a JSON lead file in
//! a temp dir, and an in-memory session store, then drives it with inbound
//! events exactly as the gateway would.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;
use tokio::net::TcpListener;

use lead_intake::bot::{BotDeps, LeadBot};
use lead_intake::channels::{
    ChatUser, InboundEvent, InboundPayload, Keyboard, OutgoingMessage, RecordingSink,
};
use lead_intake::dialog::BTN_CANCEL;
use lead_intake::error::StoreError;
use lead_intake::health::{HEALTH_BODY, health_routes};
use lead_intake::leads::{JsonFileLeadStore, Lead, LeadFields, LeadStatus, LeadStore, OperatorId};
use lead_intake::menu::{BTN_ABOUT, BTN_LEAVE_REQUEST, BTN_PRICES};
use lead_intake::notify::OperatorRoster;
use lead_intake::session::{FormStep, InMemorySessionStore, SessionStore};

const OPERATORS: [OperatorId; 2] = [100, 200];

const ANSWERS: [&str; 6] = [
    "Ivan",
    "+79991234567",
    "SMM",
    "Coffee shop with 3 locations",
    "50k-100k",
    "Telegram",
];

/// Lead store whose appends can be switched to fail.
struct FlakyStore {
    inner: JsonFileLeadStore,
    failing: AtomicBool,
}

impl FlakyStore {
    fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl LeadStore for FlakyStore {
    async fn append(&self, fields: LeadFields) -> Result<Lead, StoreError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Io {
                path: self.inner.path().display().to_string(),
                source: std::io::Error::other("disk full"),
            });
        }
        self.inner.append(fields).await
    }

    async fn count(&self) -> Result<usize, StoreError> {
        self.inner.count().await
    }

    async fn count_by_status(&self, status: LeadStatus) -> Result<usize, StoreError> {
        self.inner.count_by_status(status).await
    }

    async fn set_status(
        &self,
        id: u64,
        status: LeadStatus,
        claimed_by: Option<OperatorId>,
    ) -> Result<bool, StoreError> {
        self.inner.set_status(id, status, claimed_by).await
    }

    async fn get(&self, id: u64) -> Result<Option<Lead>, StoreError> {
        self.inner.get(id).await
    }

    async fn list(&self) -> Result<Vec<Lead>, StoreError> {
        self.inner.list().await
    }
}

struct Fixture {
    bot: Arc<LeadBot>,
    gateway: Arc<RecordingSink>,
    sessions: Arc<InMemorySessionStore>,
    leads: Arc<FlakyStore>,
    dir: TempDir,
}

fn fixture() -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let gateway = Arc::new(RecordingSink::new());
    let sessions = Arc::new(InMemorySessionStore::new());
    let leads = Arc::new(FlakyStore {
        inner: JsonFileLeadStore::new(dir.path().join("leads.json")),
        failing: AtomicBool::new(false),
    });
    let deps = BotDeps {
        sessions: Arc::clone(&sessions) as Arc<dyn SessionStore>,
        leads: Arc::clone(&leads) as Arc<dyn LeadStore>,
        roster: Arc::new(OperatorRoster::new(OPERATORS)),
        manager_username: "@sales_manager".to_string(),
    };
    let bot = Arc::new(LeadBot::new(Arc::clone(&gateway), deps));
    Fixture {
        bot,
        gateway,
        sessions,
        leads,
        dir,
    }
}

fn customer(id: i64) -> ChatUser {
    ChatUser::new(id, "Ivan Petrov").with_username("ivan_k")
}

fn text_event(user: &ChatUser, text: &str) -> InboundEvent {
    InboundEvent::text("test", user.id, user.clone(), text)
}

fn callback_event(operator: OperatorId, id: &str, data: &str) -> InboundEvent {
    InboundEvent {
        channel: "test".into(),
        chat_id: operator,
        user: ChatUser::new(operator, "Operator"),
        payload: InboundPayload::Callback {
            id: id.into(),
            data: data.into(),
        },
    }
}

impl Fixture {
    async fn say(&self, user: &ChatUser, text: &str) -> OutgoingMessage {
        self.bot.handle_event(text_event(user, text)).await;
        self.last_to(user.id)
    }

    fn last_to(&self, chat_id: i64) -> OutgoingMessage {
        self.gateway
            .sent_to(chat_id)
            .pop()
            .expect("no message was sent to this chat")
    }

    async fn step(&self, user_id: i64) -> Option<FormStep> {
        self.sessions.get(user_id).await.map(|s| s.step)
    }

    async fn fill_form(&self, user: &ChatUser) -> OutgoingMessage {
        self.say(user, BTN_LEAVE_REQUEST).await;
        let mut reply = None;
        for answer in ANSWERS {
            reply = Some(self.say(user, answer).await);
        }
        reply.unwrap()
    }

    /// Leads as stored on disk, read through a fresh store.
    async fn stored_leads(&self) -> Vec<Lead> {
        JsonFileLeadStore::new(self.dir.path().join("leads.json"))
            .list()
            .await
            .unwrap()
    }
}

#[tokio::test]
async fn full_dialog_creates_lead_and_notifies_every_operator() {
    let f = fixture();
    let ivan = customer(77);

    let welcome = f.say(&ivan, "/start").await;
    assert!(welcome.text.contains("Welcome"));
    for operator in OPERATORS {
        assert!(f.gateway.sent_to(operator)[0].text.contains("New user"));
    }

    let first = f.say(&ivan, BTN_LEAVE_REQUEST).await;
    assert!(first.text.contains("Step 1 of 6"));
    assert_eq!(f.step(77).await, Some(FormStep::Name));

    let mut last = first;
    for (i, answer) in ANSWERS.iter().enumerate() {
        last = f.say(&ivan, answer).await;
        if i + 1 < ANSWERS.len() {
            assert!(last.text.contains(&format!("Step {} of 6", i + 2)), "{}", last.text);
        }
    }
    assert!(last.text.contains("request #1"));
    assert_eq!(f.step(77).await, None);

    let leads = f.stored_leads().await;
    assert_eq!(leads.len(), 1);
    let lead = &leads[0];
    assert_eq!(lead.id, 1);
    assert_eq!(lead.user_id, 77);
    assert_eq!(lead.name, "Ivan");
    assert_eq!(lead.phone, "+79991234567");
    assert_eq!(lead.service, "SMM");
    assert_eq!(lead.business, "Coffee shop with 3 locations");
    assert_eq!(lead.budget, "50k-100k");
    assert_eq!(lead.contact_preference, "Telegram");
    assert_eq!(lead.status, LeadStatus::New);
    assert!(lead.claimed_by.is_none());

    for operator in OPERATORS {
        let notice = f.last_to(operator);
        assert!(notice.text.contains("New lead #1"));
        match notice.keyboard {
            Some(Keyboard::Inline(rows)) => assert_eq!(rows[0][0].callback_data, "claim:1"),
            other => panic!("expected claim button, got {other:?}"),
        }
    }
}

#[tokio::test]
async fn run_finishes_queued_submissions_before_returning() {
    let f = fixture();
    let ivan = customer(77);

    f.gateway.push_inbound(text_event(&ivan, BTN_LEAVE_REQUEST));
    for answer in ANSWERS {
        f.gateway.push_inbound(text_event(&ivan, answer));
    }
    // Slow deliveries keep the worker busy after the stream has ended.
    f.gateway.delay_sends(Duration::from_millis(20));

    Arc::clone(&f.bot).run().await.unwrap();

    assert_eq!(f.stored_leads().await.len(), 1);
    assert_eq!(f.step(77).await, None);
    for operator in OPERATORS {
        assert!(f.last_to(operator).text.contains("New lead #1"));
    }
    assert!(f.last_to(77).text.contains("request #1"));
}

#[tokio::test]
async fn answers_keep_surrounding_whitespace() {
    let f = fixture();
    let user = customer(6);
    f.say(&user, BTN_LEAVE_REQUEST).await;

    let reply = f.say(&user, " Ivan ").await;
    assert!(reply.text.contains("Step 2 of 6"));
    let session = f.sessions.get(6).await.unwrap();
    assert_eq!(session.draft.get(FormStep::Name), Some(" Ivan "));

    let reply = f.say(&user, " +79991234567").await;
    assert!(reply.text.contains("valid phone number"));
    assert_eq!(f.step(6).await, Some(FormStep::Phone));
}

#[tokio::test]
async fn name_needs_two_characters() {
    let f = fixture();
    let user = customer(5);
    f.say(&user, BTN_LEAVE_REQUEST).await;

    let reply = f.say(&user, "A").await;
    assert!(reply.text.contains("at least 2 characters"));
    assert_eq!(f.step(5).await, Some(FormStep::Name));

    let reply = f.say(&user, "Al").await;
    assert!(reply.text.contains("Step 2 of 6"));
    let session = f.sessions.get(5).await.unwrap();
    assert_eq!(session.draft.get(FormStep::Name), Some("Al"));
}

#[tokio::test]
async fn invalid_phone_is_rejected_and_contact_card_accepted() {
    let f = fixture();
    let user = customer(5);
    f.say(&user, BTN_LEAVE_REQUEST).await;
    f.say(&user, "Ivan").await;

    let reply = f.say(&user, "call me maybe").await;
    assert!(reply.text.contains("valid phone number"));
    assert_eq!(f.step(5).await, Some(FormStep::Phone));

    f.bot
        .handle_event(InboundEvent {
            channel: "test".into(),
            chat_id: 5,
            user: user.clone(),
            payload: InboundPayload::Contact {
                phone: "79991234567".into(),
            },
        })
        .await;
    assert_eq!(f.step(5).await, Some(FormStep::Service));
    let session = f.sessions.get(5).await.unwrap();
    assert_eq!(session.draft.get(FormStep::Phone), Some("79991234567"));
}

#[tokio::test]
async fn cancel_then_restart_begins_with_empty_draft() {
    let f = fixture();
    let user = customer(5);
    f.say(&user, BTN_LEAVE_REQUEST).await;
    for answer in &ANSWERS[..3] {
        f.say(&user, answer).await;
    }
    assert_eq!(f.step(5).await, Some(FormStep::Business));

    let reply = f.say(&user, BTN_CANCEL).await;
    assert!(reply.text.contains("cancelled"));
    assert_eq!(f.step(5).await, None);

    let reply = f.say(&user, "/cancel").await;
    assert!(reply.text.contains("no active request"));

    f.say(&user, "/request").await;
    let session = f.sessions.get(5).await.unwrap();
    assert_eq!(session.step, FormStep::Name);
    assert!(session.draft.is_empty());
    assert!(f.stored_leads().await.is_empty());
}

#[tokio::test]
async fn back_returns_to_previous_step_keeping_answers() {
    let f = fixture();
    let user = customer(5);
    f.say(&user, BTN_LEAVE_REQUEST).await;
    for answer in &ANSWERS[..4] {
        f.say(&user, answer).await;
    }
    assert_eq!(f.step(5).await, Some(FormStep::Budget));

    let reply = f.say(&user, "🔙 Back").await;
    assert!(reply.text.contains("Step 4 of 6"));
    let session = f.sessions.get(5).await.unwrap();
    assert_eq!(session.step, FormStep::Business);
    assert_eq!(session.draft.get(FormStep::Business), Some("Coffee shop with 3 locations"));

    f.say(&user, "A family bakery downtown").await;
    f.say(&user, "200k+").await;
    f.say(&user, "Phone call").await;
    let leads = f.stored_leads().await;
    assert_eq!(leads[0].business, "A family bakery downtown");
    assert_eq!(leads[0].budget, "200k+");
}

#[tokio::test]
async fn failed_write_keeps_session_and_retry_succeeds() {
    let f = fixture();
    let user = customer(5);
    f.say(&user, BTN_LEAVE_REQUEST).await;
    for answer in &ANSWERS[..5] {
        f.say(&user, answer).await;
    }

    f.leads.set_failing(true);
    let reply = f.say(&user, "Telegram").await;
    assert!(reply.text.contains("could not save"));

    let session = f.sessions.get(5).await.unwrap();
    assert_eq!(session.step, FormStep::ContactPreference);
    assert_eq!(session.draft.len(), 5);
    assert_eq!(session.draft.get(FormStep::Budget), Some("50k-100k"));
    assert!(f.stored_leads().await.is_empty());
    for operator in OPERATORS {
        assert!(f.gateway.sent_to(operator).is_empty());
    }

    f.leads.set_failing(false);
    let reply = f.say(&user, "Telegram").await;
    assert!(reply.text.contains("request #1"));
    assert_eq!(f.step(5).await, None);
    assert_eq!(f.stored_leads().await.len(), 1);
    assert_eq!(f.gateway.sent_to(100).len(), 1);
}

#[tokio::test]
async fn unreachable_operator_does_not_block_submission() {
    let f = fixture();
    f.gateway.fail_for(100);
    let user = customer(5);

    let reply = f.fill_form(&user).await;
    assert!(reply.text.contains("request #1"));
    assert_eq!(f.stored_leads().await.len(), 1);
    assert!(f.gateway.sent_to(100).is_empty());
    assert!(f.last_to(200).text.contains("New lead #1"));
}

#[tokio::test]
async fn first_claim_wins_and_customer_is_told() {
    let f = fixture();
    let user = customer(5);
    f.fill_form(&user).await;

    f.bot.handle_event(callback_event(100, "cb-1", "claim:1")).await;
    f.bot.handle_event(callback_event(200, "cb-2", "claim:1")).await;
    f.bot.handle_event(callback_event(555, "cb-3", "claim:1")).await;
    f.bot.handle_event(callback_event(100, "cb-4", "claim:42")).await;

    let answered = f.gateway.answered();
    assert_eq!(answered.len(), 4);
    assert_eq!(answered[0], ("cb-1".to_string(), "Lead #1 is yours".to_string()));
    assert!(answered[1].1.contains("already taken"));
    assert!(answered[2].1.contains("not allowed"));
    assert!(answered[3].1.contains("not found"));

    assert!(f.last_to(5).text.contains("now with a manager"));
    assert!(f.last_to(100).text.contains("You took lead #1"));

    let lead = &f.stored_leads().await[0];
    assert_eq!(lead.status, LeadStatus::Claimed);
    assert_eq!(lead.claimed_by, Some(100));
    assert!(lead.claimed_at.is_some());
}

#[tokio::test]
async fn concurrent_customers_get_distinct_ids() {
    let f = fixture();
    let users: Vec<ChatUser> = (1..=5).map(|i| customer(1000 + i)).collect();

    let handles: Vec<_> = users
        .iter()
        .cloned()
        .map(|user| {
            let bot = Arc::clone(&f.bot);
            tokio::spawn(async move {
                bot.handle_event(text_event(&user, BTN_LEAVE_REQUEST)).await;
                for answer in ANSWERS {
                    bot.handle_event(text_event(&user, answer)).await;
                }
            })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap();
    }

    let leads = f.stored_leads().await;
    let mut ids: Vec<u64> = leads.iter().map(|l| l.id).collect();
    ids.sort();
    assert_eq!(ids, vec![1, 2, 3, 4, 5]);
    let mut owners: Vec<i64> = leads.iter().map(|l| l.user_id).collect();
    owners.sort();
    assert_eq!(owners, vec![1001, 1002, 1003, 1004, 1005]);
}

#[tokio::test]
async fn reference_commands_do_not_interrupt_the_form() {
    let f = fixture();
    let user = customer(5);
    f.say(&user, BTN_LEAVE_REQUEST).await;
    f.say(&user, "Ivan").await;

    let reply = f.say(&user, "/contact").await;
    assert!(reply.text.contains("@sales_manager"));
    assert_eq!(f.step(5).await, Some(FormStep::Phone));

    let reply = f.say(&user, "/start").await;
    assert!(reply.text.contains("Welcome"));
    assert_eq!(f.step(5).await, None);
}

#[tokio::test]
async fn menu_buttons_mid_form_are_not_taken_as_answers() {
    let f = fixture();
    let user = customer(5);
    f.say(&user, BTN_LEAVE_REQUEST).await;

    let reply = f.say(&user, BTN_ABOUT).await;
    assert!(reply.text.contains("About us"));
    let session = f.sessions.get(5).await.unwrap();
    assert_eq!(session.step, FormStep::Name);
    assert_eq!(session.draft.get(FormStep::Name), None);

    f.say(&user, "Ivan").await;
    f.say(&user, BTN_PRICES).await;
    assert_eq!(f.step(5).await, Some(FormStep::Phone));
    let reply = f.say(&user, "+79991234567").await;
    assert!(reply.text.contains("Step 3 of 6"));
}

#[tokio::test]
async fn keyword_messages_are_forwarded_outside_the_form() {
    let f = fixture();
    let user = customer(5);

    let reply = f.say(&user, "I need help with ads").await;
    assert!(reply.text.contains("has been received"));
    for operator in OPERATORS {
        assert!(f.last_to(operator).text.contains("I need help with ads"));
    }
    assert!(f.stored_leads().await.is_empty());
}

#[tokio::test]
async fn health_endpoint_serves_over_tcp() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        axum::serve(listener, health_routes()).await.unwrap();
    });
    tokio::time::sleep(Duration::from_millis(50)).await;

    let body = reqwest::get(format!("http://127.0.0.1:{port}/ping"))
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert_eq!(body, HEALTH_BODY);
}
