use std::sync::{Mutex, MutexGuard};

use serde::{Deserialize, Serialize};

use crate::events::{self, ToastKind};

use super::{
    contract::{ApiClient, FlowNotices, FormSlot, Notice, CONTACT},
    AnalysisError,
};

const CONTACT_NOTICES: FlowNotices =
    FlowNotices::new("Something went wrong. Please try again later.")
        .rate_limited(Notice::warning("Too Many requests for today"));

/// What the user has typed into the contact form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactDraft {
    pub name: String,
    pub email: String,
    pub message: String,
}

impl ContactDraft {
    pub fn subject(&self) -> String {
        format!("Message from {} at Sentiment Sense Contact", self.name)
    }

    fn validate(&self) -> Result<(), AnalysisError> {
        if [&self.name, &self.email, &self.message]
            .iter()
            .any(|field| field.trim().is_empty())
        {
            return Err(AnalysisError::validation("All fields are required."));
        }
        Ok(())
    }
}

#[derive(Serialize)]
struct ContactRequest<'a> {
    subject: String,
    email: &'a str,
    body: &'a str,
}

pub struct ContactForm {
    api: ApiClient,
    slot: FormSlot,
    draft: Mutex<ContactDraft>,
}

impl ContactForm {
    pub fn new(api: ApiClient) -> Self {
        Self {
            slot: FormSlot::new("contact", api.events_handle()),
            draft: Mutex::new(ContactDraft::default()),
            api,
        }
    }

    pub fn draft(&self) -> ContactDraft {
        self.lock().clone()
    }

    pub fn set_draft(&self, draft: ContactDraft) {
        *self.lock() = draft;
    }

    /// Sends the current draft. Only a successful send clears it; a rate
    /// limit or any other failure leaves the typed values in place.
    pub async fn submit(&self) -> Result<(), AnalysisError> {
        let draft = self.draft();
        self.slot
            .submit(&CONTACT_NOTICES, async {
                draft.validate()?;
                self.api
                    .post_bytes(&CONTACT, &ContactRequest {
                        subject: draft.subject(),
                        email: &draft.email,
                        body: &draft.message,
                    })
                    .await?;
                Ok(())
            })
            .await?;

        {
            let mut current = self.lock();
            if *current == draft {
                *current = ContactDraft::default();
            }
        }
        events::toast(
            self.api.events(),
            "Message sent successfully! You will receive an auto-reply shortly.",
            ToastKind::Success,
        );
        Ok(())
    }

    pub async fn send(&self, draft: ContactDraft) -> Result<(), AnalysisError> {
        self.set_draft(draft);
        self.submit().await
    }

    fn lock(&self) -> MutexGuard<'_, ContactDraft> {
        match self.draft.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subject_names_the_sender() {
        let draft = ContactDraft {
            name: "Ada".into(),
            email: "ada@example.com".into(),
            message: "Hi".into(),
        };
        assert_eq!(draft.subject(), "Message from Ada at Sentiment Sense Contact");
        assert!(draft.validate().is_ok());
    }

    #[test]
    fn blank_field_is_rejected() {
        let draft = ContactDraft {
            name: "Ada".into(),
            email: " ".into(),
            message: "Hi".into(),
        };
        assert!(matches!(draft.validate(), Err(AnalysisError::Validation(_))));
    }
}
