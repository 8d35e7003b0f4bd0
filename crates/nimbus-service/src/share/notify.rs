//! Notification mails sent on behalf of the share provider.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::{Map, Value, json};
use tracing::{debug, error};

use nimbus_core::config::mail::MailConfig;
use nimbus_core::result::AppResult;
use nimbus_database::traits::UserBackend;
use nimbus_entity::share::{Share, ShareType};
use nimbus_entity::user::User;

use crate::l10n::{L10nFactory, Translator};
use crate::mail::template::escape_html;
use crate::mail::{EmailTemplate, MailMessage, Mailbox, Mailer};

/// Composes and sends share notification mails.
#[derive(Debug, Clone)]
pub struct ShareNotifier {
    users: Arc<dyn UserBackend>,
    mailer: Arc<dyn Mailer>,
    l10n: L10nFactory,
    mail: MailConfig,
    public_url: String,
}

impl ShareNotifier {
    pub fn new(
        users: Arc<dyn UserBackend>,
        mailer: Arc<dyn Mailer>,
        l10n: L10nFactory,
        mail: MailConfig,
        public_url: impl Into<String>,
    ) -> Self {
        Self {
            users,
            mailer,
            l10n,
            mail,
            public_url: public_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Absolute link accepting a share.
    pub fn accept_link(&self, full_id: &str) -> String {
        format!(
            "{}/index.php/apps/files_sharing/accept/{full_id}",
            self.public_url
        )
    }

    /// Absolute link opening a file in the web interface.
    pub fn show_file_link(&self, file_id: i64) -> String {
        format!("{}/index.php/f/{file_id}", self.public_url)
    }

    /// Notify the recipient of a new user share. Returns whether a mail was
    /// sent; failures are logged, never raised.
    pub async fn send_mail_notification(&self, share: &Share, filename: &str) -> bool {
        match self.try_send_mail_notification(share, filename).await {
            Ok(sent) => sent,
            Err(e) => {
                error!(error = %e, "Share notification mail could not be sent");
                false
            }
        }
    }

    async fn try_send_mail_notification(&self, share: &Share, filename: &str) -> AppResult<bool> {
        if !self.mail.enabled {
            debug!("Notification mails are disabled");
            return Ok(false);
        }
        let recipient = share.shared_with.clone().unwrap_or_default();
        let Some(user) = self.users.get(&recipient).await? else {
            debug!(recipient = %recipient, "Share notification not sent, user could not be found");
            return Ok(false);
        };
        if share.share_type != ShareType::User {
            return Ok(false);
        }
        let Some(email) = user.email.clone().filter(|e| !e.is_empty()) else {
            debug!(recipient = %recipient, "Share notification not sent, email address is not set");
            return Ok(false);
        };

        let l = self.l10n.get("lib", &self.l10n.user_language(&user));
        let link = self.accept_link(&share.full_id()?);
        self.send_user_share_mail(
            l.as_ref(),
            filename,
            &link,
            &share.shared_by,
            &email,
            share.expiration,
            &share.note,
        )
        .await?;
        debug!(
            email = %email,
            share_id = ?share.id(),
            "Sent share notification"
        );
        Ok(true)
    }

    /// Mail one recipient about a share created for them.
    #[allow(clippy::too_many_arguments)]
    pub async fn send_user_share_mail(
        &self,
        l: &dyn Translator,
        filename: &str,
        link: &str,
        initiator: &str,
        share_with: &str,
        expiration: Option<DateTime<Utc>>,
        note: &str,
    ) -> AppResult<()> {
        let initiator_user = self.users.get(initiator).await?;
        let initiator_name = display_name(initiator_user.as_ref(), initiator);

        let mut data = Map::new();
        data.insert("filename".into(), json!(filename));
        data.insert("link".into(), json!(link));
        data.insert("initiator".into(), json!(initiator_name));
        data.insert(
            "expiration".into(),
            expiration.map_or(Value::Null, |e| json!(e.to_rfc3339())),
        );
        data.insert("shareWith".into(), json!(share_with));

        let mut template = EmailTemplate::new(
            "files_sharing.RecipientNotification",
            &self.mail.instance_name,
            data,
        );
        let heading = l.t("%1$s shared %2$s with you", &[initiator_name.as_str(), filename]);
        template
            .set_subject(heading.clone())
            .add_header()
            .add_heading(heading, None);
        if !note.is_empty() {
            template.add_body_text(escape_html(note), note);
        }
        template.add_body_button(l.t("Open %s", &[filename]), link);

        let mut message = MailMessage::new();
        message.to = vec![Mailbox::new(share_with)];
        message.from = Some(self.sender(l, &initiator_name));
        self.sign(&mut message, &mut template, initiator_user.as_ref(), &initiator_name);
        message.use_template(&template);

        let failed = self.mailer.send(&message).await?;
        if !failed.is_empty() {
            error!(
                recipients = %failed.join(", "),
                "Share notification mail could not be sent"
            );
        }
        Ok(())
    }

    /// Mail a share note to its recipients, one message per language.
    ///
    /// A language with a single recipient addresses them directly; larger
    /// batches use blind copies.
    pub async fn send_note(
        &self,
        recipients: &[User],
        share: &Share,
        filename: &str,
        file_id: i64,
    ) -> AppResult<()> {
        if !self.mail.enabled {
            return Ok(());
        }

        let mut by_language: BTreeMap<String, BTreeMap<String, String>> = BTreeMap::new();
        for recipient in recipients {
            match recipient.email.as_deref().filter(|e| !e.is_empty()) {
                Some(email) => {
                    by_language
                        .entry(self.l10n.user_language(recipient))
                        .or_default()
                        .insert(
                            email.to_string(),
                            recipient.display_name_or_uid().to_string(),
                        );
                }
                None => debug!(uid = %recipient.uid, "Skipping note recipient without email"),
            }
        }
        if by_language.is_empty() {
            return Ok(());
        }

        let initiator_user = self.users.get(&share.shared_by).await?;
        let initiator_name = display_name(initiator_user.as_ref(), &share.shared_by);
        let link = self.show_file_link(file_id);

        for (language, to_list) in by_language {
            let l = self.l10n.get("lib", &language);
            let plain_heading = l.t(
                "%1$s shared %2$s with you and wants to add:",
                &[initiator_name.as_str(), filename],
            );
            let html_heading = l.t(
                "%1$s shared %2$s with you and wants to add",
                &[initiator_name.as_str(), filename],
            );

            let mut template =
                EmailTemplate::new("defaultShareProvider.sendNote", &self.mail.instance_name, Map::new());
            template
                .set_subject(l.t(
                    "%s added a note to a file shared with you",
                    &[initiator_name.as_str()],
                ))
                .add_header()
                .add_heading(html_heading, Some(plain_heading))
                .add_body_text(escape_html(&share.note), share.note.clone())
                .add_body_button(l.t("Open %s", &[filename]), link.clone());

            let mut message = MailMessage::new();
            message.from = Some(self.sender(l.as_ref(), &initiator_name));
            self.sign(&mut message, &mut template, initiator_user.as_ref(), &initiator_name);

            let mailboxes: Vec<Mailbox> = to_list
                .into_iter()
                .map(|(email, name)| Mailbox::named(email, name))
                .collect();
            if mailboxes.len() == 1 {
                message.to = mailboxes;
            } else {
                message.bcc = mailboxes;
            }
            message.use_template(&template);

            let failed = self.mailer.send(&message).await?;
            if !failed.is_empty() {
                error!(
                    language = %language,
                    recipients = %failed.join(", "),
                    "Share note mail could not be sent"
                );
            }
        }
        Ok(())
    }

    fn sender(&self, l: &dyn Translator, initiator_name: &str) -> Mailbox {
        Mailbox::named(
            &self.mail.from_address,
            l.t("%1$s via %2$s", &[initiator_name, self.mail.instance_name.as_str()]),
        )
    }

    /// Reply-to the initiator when they have an address, and pick the footer
    /// accordingly.
    fn sign(
        &self,
        message: &mut MailMessage,
        template: &mut EmailTemplate,
        initiator: Option<&User>,
        initiator_name: &str,
    ) {
        match initiator.and_then(|u| u.email.as_deref()) {
            Some(email) => {
                message.reply_to = Some(Mailbox::named(email, initiator_name));
                let footer = if self.mail.slogan.is_empty() {
                    self.mail.instance_name.clone()
                } else {
                    format!("{} - {}", self.mail.instance_name, self.mail.slogan)
                };
                template.add_footer(Some(footer));
            }
            None => {
                template.add_footer(None);
            }
        }
    }
}

fn display_name(user: Option<&User>, fallback: &str) -> String {
    user.map(|u| u.display_name_or_uid().to_string())
        .unwrap_or_else(|| fallback.to_string())
}
