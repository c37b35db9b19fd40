use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::campaigns::{CampaignInvitation, CampaignRepository, CampaignView};
use crate::html::html_escape;
use crate::jobs::{Job, JobExecutor, JobKind, JobResult, JobStore};

use super::MailError;
use super::mailer::Mailer;
use super::message::{MailMessage, MessageId};
use super::outbox::MailOutbox;

/// Path segment of invitation links: `<public url>/i/<token>`.
pub const INVITATION_PATH: &str = "/i/";

/// Payload of a `mail.campaign_invitation` job. Only the outbox id, so the
/// job (and everything that logs it) never sees the link.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MailPayload {
    pub message_id: MessageId,
}

/// Renders campaign invitations and queues them for delivery.
pub struct InvitationMailer {
    public_url: Option<String>,
    outbox: Arc<MailOutbox>,
    jobs: Arc<dyn JobStore>,
    campaigns: Arc<CampaignRepository>,
}

impl InvitationMailer {
    pub fn new(
        public_url: Option<String>,
        outbox: Arc<MailOutbox>,
        jobs: Arc<dyn JobStore>,
        campaigns: Arc<CampaignRepository>,
    ) -> Self {
        let public_url = public_url
            .map(|u| u.trim().trim_end_matches('/').to_string())
            .filter(|u| !u.is_empty());
        Self {
            public_url,
            outbox,
            jobs,
            campaigns,
        }
    }

    pub fn invitation_url(&self, invitation: &CampaignInvitation) -> Result<String, MailError> {
        let base = self
            .public_url
            .as_deref()
            .ok_or(MailError::MissingConfig("APP_PUBLIC_URL"))?;
        Ok(format!("{base}{INVITATION_PATH}{}", invitation.token.expose()))
    }

    pub fn render(
        &self,
        view: CampaignView<'_>,
        invitation: &CampaignInvitation,
    ) -> Result<MailMessage, MailError> {
        let company = view.company.ok_or(MailError::MissingRelation("campaign.company"))?;
        if company.id != view.campaign.tenant_id {
            return Err(MailError::MissingRelation("campaign.company"));
        }
        if invitation.campaign_id != view.campaign.id {
            return Err(MailError::MissingRelation("invitation.campaign"));
        }

        let url = self.invitation_url(invitation)?;
        let subject = format!("Invitation to participate: {}", company.name);
        let text = format!(
            "{company} invites you to take part in \"{campaign}\".\n\n\
             Open the questionnaire: {url}\n\n\
             This link is personal. Please do not forward it.\n",
            company = company.name,
            campaign = view.campaign.name,
        );
        let html = format!(
            "<p>{company} invites you to take part in <strong>{campaign}</strong>.</p>\
             <p><a href=\"{url}\">Open the questionnaire</a></p>\
             <p>This link is personal. Please do not forward it.</p>",
            company = html_escape(&company.name),
            campaign = html_escape(&view.campaign.name),
            url = html_escape(&url),
        );

        Ok(MailMessage {
            id: MessageId::new(),
            tenant_id: view.campaign.tenant_id,
            to: invitation.email.clone(),
            subject,
            html,
            text,
        })
    }

    /// Render, store in the outbox and queue delivery. Returns as soon as
    /// the job is queued; delivery happens on the job executor.
    pub fn send(
        &self,
        view: CampaignView<'_>,
        invitation: &CampaignInvitation,
    ) -> Result<MessageId, MailError> {
        let message = self.render(view, invitation)?;
        let tenant_id = message.tenant_id;
        let message_id = self.outbox.put(message)?;

        let payload = serde_json::to_value(MailPayload { message_id })
            .map_err(|e| MailError::Enqueue(e.to_string()))?;
        let job = Job::new(tenant_id, JobKind::campaign_invitation_mail(), payload);
        if let Err(e) = self.jobs.enqueue(job) {
            self.outbox.remove(message_id)?;
            return Err(MailError::Enqueue(e.to_string()));
        }

        self.campaigns
            .mark_invitation_emailed(tenant_id, invitation.id)
            .map_err(|e| MailError::Outbox(e.to_string()))?;

        info!(
            tenant_id = %tenant_id,
            invitation_id = %invitation.id,
            message_id = %message_id,
            "invitation mail queued"
        );
        Ok(message_id)
    }
}

/// Handler for `mail.campaign_invitation` jobs.
pub struct MailDelivery {
    outbox: Arc<MailOutbox>,
    mailer: Arc<dyn Mailer>,
}

impl MailDelivery {
    pub fn new(outbox: Arc<MailOutbox>, mailer: Arc<dyn Mailer>) -> Self {
        Self { outbox, mailer }
    }

    pub fn register<S: JobStore>(self: Arc<Self>, executor: &mut JobExecutor<S>) {
        executor.register_handler(JobKind::CAMPAIGN_INVITATION_MAIL, move |job| {
            self.deliver(job)
        });
    }

    pub fn deliver(&self, job: &Job) -> JobResult {
        match self.try_deliver(job) {
            Ok(()) => JobResult::Success,
            Err(e) => JobResult::Failure(e.to_string()),
        }
    }

    fn try_deliver(&self, job: &Job) -> Result<(), MailError> {
        let payload: MailPayload = serde_json::from_value(job.payload.clone())
            .map_err(|e| MailError::Outbox(format!("invalid payload: {e}")))?;

        let Some(message) = self.outbox.get(job.tenant_id, payload.message_id)? else {
            warn!(message_id = %payload.message_id, "outbox message vanished");
            return Err(MailError::Outbox(format!(
                "message {} not in outbox",
                payload.message_id
            )));
        };

        self.mailer.deliver(&message)?;
        self.outbox.remove(message.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use reskill_core::{EmailAddress, TenantId};

    use crate::campaigns::{Campaign, InvitationStatus, NewCampaign};
    use crate::jobs::InMemoryJobStore;
    use crate::tenancy::Company;

    #[derive(Default)]
    struct Recording(Mutex<Vec<MailMessage>>);

    impl Mailer for Recording {
        fn deliver(&self, message: &MailMessage) -> Result<(), MailError> {
            self.0.lock().unwrap().push(message.clone());
            Ok(())
        }
    }

    struct Failing;

    impl Mailer for Failing {
        fn deliver(&self, _message: &MailMessage) -> Result<(), MailError> {
            Err(MailError::Transport("connection refused".into()))
        }
    }

    const TENANT: TenantId = TenantId::new(7);

    struct Fixture {
        campaigns: Arc<CampaignRepository>,
        outbox: Arc<MailOutbox>,
        jobs: Arc<InMemoryJobStore>,
        campaign: Campaign,
        invitation: CampaignInvitation,
        company: Company,
    }

    fn fixture() -> Fixture {
        let campaigns = Arc::new(CampaignRepository::new());
        let campaign = campaigns
            .create_campaign(TENANT, NewCampaign { name: "Q3 <Skills>".into(), code: None })
            .unwrap();
        let invitation = campaigns
            .create_invitation(TENANT, campaign.id, EmailAddress::parse("ann@acme.io").unwrap())
            .unwrap();
        Fixture {
            campaigns,
            outbox: Arc::new(MailOutbox::new()),
            jobs: InMemoryJobStore::arc(),
            campaign,
            invitation,
            company: Company { id: TENANT, name: "Acme & Co".into() },
        }
    }

    fn mailer(f: &Fixture, url: Option<&str>) -> InvitationMailer {
        InvitationMailer::new(
            url.map(str::to_string),
            f.outbox.clone(),
            f.jobs.clone(),
            f.campaigns.clone(),
        )
    }

    #[test]
    fn renders_subject_and_link() {
        let f = fixture();
        let view = CampaignView { campaign: &f.campaign, company: Some(&f.company) };

        let message = mailer(&f, Some("https://app.test/")).render(view, &f.invitation).unwrap();

        assert_eq!(message.subject, "Invitation to participate: Acme & Co");
        let link = format!("https://app.test/i/{}", f.invitation.token.expose());
        assert!(message.text.contains(&link));
        assert!(message.html.contains(&link));
        assert!(message.html.contains("Acme &amp; Co"));
        assert!(message.html.contains("Q3 &lt;Skills&gt;"));
        assert!(!format!("{message:?}").contains(f.invitation.token.expose()));
    }

    #[test]
    fn missing_company_fails_loudly() {
        let f = fixture();
        let view = CampaignView { campaign: &f.campaign, company: None };
        assert_eq!(
            mailer(&f, Some("https://app.test")).send(view, &f.invitation),
            Err(MailError::MissingRelation("campaign.company"))
        );
        assert!(f.outbox.is_empty().unwrap());
    }

    #[test]
    fn missing_public_url_fails_without_leaking_the_token() {
        let f = fixture();
        let view = CampaignView { campaign: &f.campaign, company: Some(&f.company) };
        let err = mailer(&f, None).send(view, &f.invitation).unwrap_err();
        assert_eq!(err, MailError::MissingConfig("APP_PUBLIC_URL"));
        assert!(!err.to_string().contains(f.invitation.token.expose()));
    }

    #[test]
    fn send_queues_a_job_that_carries_only_the_message_id() {
        let f = fixture();
        let view = CampaignView { campaign: &f.campaign, company: Some(&f.company) };

        let id = mailer(&f, Some("https://app.test")).send(view, &f.invitation).unwrap();

        let jobs: Vec<_> = f
            .jobs
            .queued(TENANT)
            .unwrap()
            .into_iter()
            .filter(|j| j.name() == JobKind::CAMPAIGN_INVITATION_MAIL)
            .collect();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].payload, serde_json::json!({ "message_id": id }));
        let invitation = f.campaigns.get_invitation(TENANT, f.invitation.id).unwrap().unwrap();
        assert_eq!(invitation.status, InvitationStatus::Emailed);
    }

    #[test]
    fn delivery_job_sends_and_clears_the_outbox() {
        let f = fixture();
        let view = CampaignView { campaign: &f.campaign, company: Some(&f.company) };
        mailer(&f, Some("https://app.test")).send(view, &f.invitation).unwrap();

        let recording = Arc::new(Recording::default());
        let mut executor = JobExecutor::new(f.jobs.clone());
        Arc::new(MailDelivery::new(f.outbox.clone(), recording.clone())).register(&mut executor);
        executor.drain(Some(TENANT)).unwrap();

        let sent = recording.0.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to.as_str(), "ann@acme.io");
        assert!(f.outbox.is_empty().unwrap());
    }

    #[test]
    fn transport_failure_keeps_the_message_for_retry() {
        let f = fixture();
        let view = CampaignView { campaign: &f.campaign, company: Some(&f.company) };
        mailer(&f, Some("https://app.test")).send(view, &f.invitation).unwrap();

        let delivery = MailDelivery::new(f.outbox.clone(), Arc::new(Failing));
        let job = f.jobs.claim_next(Some(TENANT)).unwrap().unwrap();
        assert!(matches!(delivery.deliver(&job), JobResult::Failure(_)));
        assert_eq!(f.outbox.len().unwrap(), 1);
    }
}
