//! Submission to analysis, end to end, on the in-memory stack.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::json;

use reskill_core::{EmailAddress, TenantId};
use reskill_events::{DevelopmentEventLogger, DomainEvent, EventDispatcher, QuestionnaireResponseSubmitted};
use reskill_infra::jobs::{InMemoryJobStore, JobExecutor, ProcessingFailureLogger, SlowJobLogger};
use reskill_infra::mail::{InvitationMailer, LogMailer, MailDelivery, MailOutbox};
use reskill_infra::{
    CampaignRepository, CampaignView, CompanyDirectory, InvitationStatus, NewCampaign,
    ProcessingJobs, ProcessingResults, QuestionnaireResponse, ResponseRepository, ResponseStatus,
    listener_table,
};
use reskill_processing::LocalProcessor;

const TENANT: TenantId = TenantId::new(7);

#[test]
fn invitation_to_analyzed_response() {
    let companies = CompanyDirectory::new();
    let company = companies.register(TENANT, "Acme").unwrap();
    let campaigns = Arc::new(CampaignRepository::new());
    let responses = Arc::new(ResponseRepository::new());
    let results = Arc::new(ProcessingResults::new());
    let outbox = Arc::new(MailOutbox::new());
    let jobs = InMemoryJobStore::arc();

    let dispatcher = Arc::new(
        EventDispatcher::new(listener_table(
            responses.clone(),
            campaigns.clone(),
            results.clone(),
            jobs.clone(),
        ))
        .with_observer(Arc::new(DevelopmentEventLogger)),
    );

    let mut executor = JobExecutor::new(jobs.clone());
    Arc::new(ProcessingJobs::new(
        responses.clone(),
        results,
        Arc::new(LocalProcessor),
        Arc::new(LocalProcessor),
        dispatcher.clone(),
    ))
    .register(&mut executor);
    Arc::new(MailDelivery::new(outbox.clone(), Arc::new(LogMailer))).register(&mut executor);
    executor.register_observer(Arc::new(ProcessingFailureLogger::default()));
    executor.register_observer(Arc::new(SlowJobLogger::new(Duration::from_secs(300))));

    let campaign = campaigns
        .create_campaign(TENANT, NewCampaign { name: "Spring".into(), code: None })
        .unwrap();
    let invitation = campaigns
        .create_invitation(TENANT, campaign.id, EmailAddress::parse("r@acme.io").unwrap())
        .unwrap();

    InvitationMailer::new(
        Some("https://app.test".into()),
        outbox.clone(),
        jobs.clone(),
        campaigns.clone(),
    )
    .send(
        CampaignView { campaign: &campaign, company: Some(&company) },
        &invitation,
    )
    .unwrap();

    let response = QuestionnaireResponse::new(
        TENANT,
        campaign.id,
        invitation.id,
        json!({"q1": "yes", "q2": "no"}),
        Some("https://cdn.test/answer.ogg".into()),
    )
    .unwrap();
    let response_id = response.id;
    responses.insert(response).unwrap();

    dispatcher
        .dispatch(&DomainEvent::from(QuestionnaireResponseSubmitted {
            tenant_id: TENANT,
            campaign_id: campaign.id,
            invitation_id: invitation.id,
            response_id,
            occurred_at: Utc::now(),
            metadata: None,
        }))
        .unwrap();

    let outcomes = executor.drain(Some(TENANT)).unwrap();
    // mail, transcription, analysis
    assert_eq!(outcomes.len(), 3);
    assert!(outbox.is_empty().unwrap());

    let stored = responses.get(TENANT, response_id).unwrap().unwrap();
    assert_eq!(stored.status, ResponseStatus::Analyzed);
    assert_eq!(stored.analysis.unwrap().score, 1.0);

    let invitation = campaigns.get_invitation(TENANT, invitation.id).unwrap().unwrap();
    assert_eq!(invitation.status, InvitationStatus::Consumed);
}
