//! DialogController: drives one user at a time through the lead form.
//!
//! Each user's session moves Name → Phone → Service → Business → Budget →
//! ContactPreference. The last accepted answer appends a lead, notifies the
//! operators, and only then clears the session, so a failed write leaves the
//! user on the last step with everything they typed.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};

use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, error, info, warn};

use super::input::DialogInput;
use super::prompts;
use super::validate::validate;
use crate::channels::{ChatUser, OutgoingMessage};
use crate::error::{DialogError, ValidationError};
use crate::leads::{Lead, LeadFields, LeadStore};
use crate::notify::{FanOutReport, NotificationEvent, Notifier};
use crate::session::{FormStep, SessionStore, UserId, UserSession};

/// What happened to one input, with the reply for the user.
#[derive(Debug, Clone)]
pub enum DialogOutcome {
    /// The user has no session; the input belongs to the menu.
    NotInForm,
    /// The form started or moved to another step.
    Prompt(OutgoingMessage),
    /// The answer failed validation; the session is unchanged.
    Rejected {
        error: ValidationError,
        reply: OutgoingMessage,
    },
    /// The session was dropped at the user's request.
    Cancelled(OutgoingMessage),
    /// A lead was stored and operators were notified.
    Submitted {
        lead: Lead,
        report: FanOutReport,
        reply: OutgoingMessage,
    },
    /// The lead could not be stored; the session stays on the last step.
    SubmitFailed(OutgoingMessage),
    /// The session was inconsistent and has been discarded.
    Reset(OutgoingMessage),
}

impl DialogOutcome {
    pub fn reply(&self) -> Option<&OutgoingMessage> {
        match self {
            Self::NotInForm => None,
            Self::Prompt(reply)
            | Self::Cancelled(reply)
            | Self::SubmitFailed(reply)
            | Self::Reset(reply)
            | Self::Rejected { reply, .. }
            | Self::Submitted { reply, .. } => Some(reply),
        }
    }

    pub fn into_reply(self) -> Option<OutgoingMessage> {
        match self {
            Self::NotInForm => None,
            Self::Prompt(reply)
            | Self::Cancelled(reply)
            | Self::SubmitFailed(reply)
            | Self::Reset(reply)
            | Self::Rejected { reply, .. }
            | Self::Submitted { reply, .. } => Some(reply),
        }
    }
}

/// Per-user async locks, dropped again once nobody holds or waits on them.
#[derive(Default)]
struct UserLocks {
    locks: StdMutex<HashMap<UserId, Arc<Mutex<()>>>>,
}

impl UserLocks {
    fn entry(&self, user_id: UserId) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        Arc::clone(locks.entry(user_id).or_default())
    }

    async fn acquire(&self, user_id: UserId) -> OwnedMutexGuard<()> {
        self.entry(user_id).lock_owned().await
    }

    /// Forget the lock of `user_id` if only the map still references it.
    fn release(&self, user_id: UserId) {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(lock) = locks.get(&user_id) {
            if Arc::strong_count(lock) == 1 {
                locks.remove(&user_id);
            }
        }
    }

    #[cfg(test)]
    fn tracked(&self) -> usize {
        self.locks.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

/// Runs the form for every user.
///
/// Inputs of one user are applied strictly one after another; different
/// users never wait on each other.
pub struct DialogController {
    sessions: Arc<dyn SessionStore>,
    leads: Arc<dyn LeadStore>,
    notifier: Arc<Notifier>,
    locks: UserLocks,
}

impl DialogController {
    pub fn new(
        sessions: Arc<dyn SessionStore>,
        leads: Arc<dyn LeadStore>,
        notifier: Arc<Notifier>,
    ) -> Self {
        Self {
            sessions,
            leads,
            notifier,
            locks: UserLocks::default(),
        }
    }

    /// Whether `user_id` is currently filling in the form.
    pub async fn is_in_form(&self, user_id: UserId) -> bool {
        self.sessions.get(user_id).await.is_some()
    }

    /// Start the form from the first step, discarding any previous draft.
    pub async fn start_form(&self, user_id: UserId) -> DialogOutcome {
        let guard = self.locks.acquire(user_id).await;
        let outcome = self.start_locked(user_id).await;
        drop(guard);
        self.locks.release(user_id);
        outcome
    }

    /// Drop the user's session without a reply. Returns whether one existed.
    pub async fn abandon(&self, user_id: UserId) -> bool {
        let guard = self.locks.acquire(user_id).await;
        let existed = self.sessions.get(user_id).await.is_some();
        if existed {
            self.sessions.clear(user_id).await;
            info!(user_id, "Form abandoned");
        }
        drop(guard);
        self.locks.release(user_id);
        existed
    }

    /// Apply one input from `user`.
    pub async fn handle(&self, user: &ChatUser, input: DialogInput) -> DialogOutcome {
        let guard = self.locks.acquire(user.id).await;
        let outcome = self.handle_locked(user, input).await;
        drop(guard);
        self.locks.release(user.id);
        outcome
    }

    async fn start_locked(&self, user_id: UserId) -> DialogOutcome {
        if self.sessions.get(user_id).await.is_some() {
            debug!(user_id, "Restarting form, previous draft discarded");
        }
        self.sessions.set(UserSession::start(user_id)).await;
        info!(user_id, "Form started");
        DialogOutcome::Prompt(prompts::form_started())
    }

    async fn handle_locked(&self, user: &ChatUser, input: DialogInput) -> DialogOutcome {
        let mut session = match (&input, self.sessions.get(user.id).await) {
            (DialogInput::Start, _) => return self.start_locked(user.id).await,
            (_, None) => return DialogOutcome::NotInForm,
            (_, Some(session)) => session,
        };

        if let Err(e) = session.check_invariant() {
            return self.reset(user.id, e).await;
        }

        match input {
            DialogInput::Cancel => {
                self.sessions.clear(user.id).await;
                info!(user_id = user.id, step = %session.step, "Form cancelled");
                DialogOutcome::Cancelled(prompts::cancelled())
            }
            DialogInput::Back => match session.retreat() {
                Some(step) => {
                    debug!(user_id = user.id, step = %step, "Form moved back");
                    self.sessions.set(session).await;
                    DialogOutcome::Prompt(prompts::step_prompt(step))
                }
                None => {
                    self.sessions.clear(user.id).await;
                    info!(user_id = user.id, "Form left from the first step");
                    DialogOutcome::Cancelled(prompts::left_form())
                }
            },
            DialogInput::Start | DialogInput::Text(_) | DialogInput::Contact { .. } => {
                let step = session.step;
                let value = match validate(step, &input) {
                    Ok(value) => value,
                    Err(error) => {
                        debug!(user_id = user.id, step = %step, %error, "Answer rejected");
                        return DialogOutcome::Rejected {
                            reply: prompts::rejected(step, &error),
                            error,
                        };
                    }
                };

                match session.advance(value) {
                    Some(next) => {
                        debug!(user_id = user.id, from = %step, to = %next, "Form advanced");
                        self.sessions.set(session).await;
                        DialogOutcome::Prompt(prompts::step_accepted(step, next))
                    }
                    None => self.finalize(user, session).await,
                }
            }
        }
    }

    /// Store the completed form, notify operators, then clear the session.
    ///
    /// `completed` carries the final answer, but the stored session is only
    /// touched once the lead exists.
    async fn finalize(&self, user: &ChatUser, completed: UserSession) -> DialogOutcome {
        let fields = match lead_fields(user, &completed) {
            Ok(fields) => fields,
            Err(e) => return self.reset(user.id, e).await,
        };

        let lead = match self.leads.append(fields).await {
            Ok(lead) => lead,
            Err(e) => {
                error!(user_id = user.id, error = %e, "Failed to store lead; session kept for retry");
                return DialogOutcome::SubmitFailed(prompts::submit_failed());
            }
        };

        info!(lead_id = lead.id, user_id = user.id, "Lead submitted");
        let report = self
            .notifier
            .notify_operators(&NotificationEvent::NewLead { lead: lead.clone() })
            .await;
        if !report.failed.is_empty() {
            warn!(
                lead_id = lead.id,
                failed = report.failed.len(),
                "Some operators were not notified about the lead"
            );
        }

        self.sessions.clear(user.id).await;
        DialogOutcome::Submitted {
            reply: prompts::submitted(&lead),
            lead,
            report,
        }
    }

    async fn reset(&self, user_id: UserId, e: DialogError) -> DialogOutcome {
        error!(user_id, error = %e, "Inconsistent session, resetting");
        self.sessions.clear(user_id).await;
        DialogOutcome::Reset(prompts::session_reset())
    }

    #[cfg(test)]
    fn tracked_locks(&self) -> usize {
        self.locks.tracked()
    }
}

fn lead_fields(user: &ChatUser, session: &UserSession) -> Result<LeadFields, DialogError> {
    let field = |step: FormStep| {
        session
            .draft
            .get(step)
            .map(str::to_string)
            .ok_or(DialogError::IncompleteDraft {
                user_id: session.user_id,
                step: session.step,
                field: step.field_name(),
            })
    };

    Ok(LeadFields {
        user_id: user.id,
        username: user.username.clone(),
        name: field(FormStep::Name)?,
        phone: field(FormStep::Phone)?,
        service: field(FormStep::Service)?,
        business: field(FormStep::Business)?,
        budget: field(FormStep::Budget)?,
        contact_preference: field(FormStep::ContactPreference)?,
    })
}
