//! Service wiring: stores, guards, the event dispatcher and the job executor.

use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use reskill_auth::{
    AdminIdentity, AdminRealm, AuthError, CompanyIdentity, CompanyRealm, IdentityStore,
    InMemoryIdentityStore, InMemorySessionStore, SessionGuard, hash_password,
};
use reskill_core::EmailAddress;
use reskill_events::{DevelopmentEventLogger, EventDispatcher};
use reskill_infra::jobs::{
    InMemoryJobStore, JobExecutor, ProcessingFailureLogger, SlowJobLogger,
};
use reskill_infra::mail::{
    InvitationMailer, LogMailer, MailDelivery, MailError, MailOutbox, Mailer, SmtpMailer,
};
use reskill_infra::{
    CampaignRepository, CompanyDirectory, ProcessingJobs, ProcessingResults, ResponseRepository,
    listener_table,
};
use reskill_processing::LocalProcessor;

use crate::config::{AdminSeed, AppConfig};

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("mail transport: {0}")]
    Mail(#[from] MailError),

    #[error("admin seed: {0}")]
    Seed(String),

    #[error(transparent)]
    Auth(#[from] AuthError),
}

pub type JobRunner = JobExecutor<Arc<InMemoryJobStore>>;

pub struct AppServices {
    pub config: AppConfig,

    pub admin: SessionGuard<AdminRealm>,
    pub company: SessionGuard<CompanyRealm>,
    pub admin_identities: Arc<InMemoryIdentityStore<AdminIdentity>>,
    pub company_identities: Arc<InMemoryIdentityStore<CompanyIdentity>>,

    pub companies: Arc<CompanyDirectory>,
    pub campaigns: Arc<CampaignRepository>,
    pub responses: Arc<ResponseRepository>,
    pub results: Arc<ProcessingResults>,

    pub jobs: Arc<InMemoryJobStore>,
    pub outbox: Arc<MailOutbox>,
    pub invitations: InvitationMailer,
    pub dispatcher: Arc<EventDispatcher>,
    pub executor: Arc<JobRunner>,
}

pub fn build_services(config: AppConfig) -> Result<AppServices, BootstrapError> {
    let admin_identities: Arc<InMemoryIdentityStore<AdminIdentity>> =
        Arc::new(InMemoryIdentityStore::new());
    let company_identities: Arc<InMemoryIdentityStore<CompanyIdentity>> =
        Arc::new(InMemoryIdentityStore::new());

    // One session store per realm.
    let admin: SessionGuard<AdminRealm> = SessionGuard::new(
        admin_identities.clone(),
        Arc::new(InMemorySessionStore::with_guest_ttl(config.lifetimes.session)),
        config.lifetimes,
    );
    let company: SessionGuard<CompanyRealm> = SessionGuard::new(
        company_identities.clone(),
        Arc::new(InMemorySessionStore::with_guest_ttl(config.lifetimes.session)),
        config.lifetimes,
    );

    let companies = Arc::new(CompanyDirectory::new());
    let campaigns = Arc::new(CampaignRepository::new());
    let responses = Arc::new(ResponseRepository::new());
    let results = Arc::new(ProcessingResults::new());
    let jobs = InMemoryJobStore::arc();
    let outbox = Arc::new(MailOutbox::new());

    let mut dispatcher = EventDispatcher::new(listener_table(
        responses.clone(),
        campaigns.clone(),
        results.clone(),
        jobs.clone(),
    ));
    if config.env.mirrors_events() {
        dispatcher = dispatcher.with_observer(Arc::new(DevelopmentEventLogger));
    }
    let dispatcher = Arc::new(dispatcher);

    let mailer: Arc<dyn Mailer> = match &config.smtp {
        Some(smtp) => Arc::new(SmtpMailer::new(smtp)?),
        None => {
            info!("MAIL_HOST not set; mail is logged instead of sent");
            Arc::new(LogMailer)
        }
    };

    let mut executor = JobExecutor::new(jobs.clone());
    Arc::new(ProcessingJobs::new(
        responses.clone(),
        results.clone(),
        Arc::new(LocalProcessor),
        Arc::new(LocalProcessor),
        dispatcher.clone(),
    ))
    .register(&mut executor);
    Arc::new(MailDelivery::new(outbox.clone(), mailer)).register(&mut executor);
    executor.register_observer(Arc::new(ProcessingFailureLogger::new(
        config.processing_job_marker.clone(),
    )));
    executor.register_observer(Arc::new(SlowJobLogger::new(config.slow_job_threshold)));

    let invitations = InvitationMailer::new(
        config.public_url.clone(),
        outbox.clone(),
        jobs.clone(),
        campaigns.clone(),
    );

    if let Some(seed) = &config.admin_seed {
        seed_admin(admin_identities.as_ref(), seed)?;
    }

    Ok(AppServices {
        config,
        admin,
        company,
        admin_identities,
        company_identities,
        companies,
        campaigns,
        responses,
        results,
        jobs,
        outbox,
        invitations,
        dispatcher,
        executor: Arc::new(executor),
    })
}

/// Create the configured administrator unless that email already exists.
fn seed_admin(
    store: &dyn IdentityStore<AdminIdentity>,
    seed: &AdminSeed,
) -> Result<(), BootstrapError> {
    let email = EmailAddress::parse(&seed.email).map_err(|e| BootstrapError::Seed(e.to_string()))?;
    if store.find_by_email(&email)?.is_some() {
        return Ok(());
    }
    let hash = hash_password(&seed.password)?;
    store.insert(AdminIdentity::new(seed.name.clone(), email, hash))?;
    info!(email = %seed.email, "seeded administrator");
    Ok(())
}
