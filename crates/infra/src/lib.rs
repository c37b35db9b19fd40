//! Infrastructure: tenant-isolated stores, campaigns, responses, the job
//! subsystem, invitation mail and the primary event listeners.

pub mod campaigns;
pub mod error;
pub mod html;
pub mod jobs;
pub mod listeners;
pub mod mail;
pub mod processing_jobs;
pub mod responses;
pub mod results;
pub mod store;
pub mod tenancy;

pub use campaigns::{
    Campaign, CampaignInvitation, CampaignRepository, CampaignView, InvitationStatus,
    InvitationToken, NewCampaign,
};
pub use error::RepositoryError;
pub use listeners::listener_table;
pub use processing_jobs::ProcessingJobs;
pub use responses::{QuestionnaireResponse, ResponseRepository, ResponseStatus};
pub use results::ProcessingResults;
pub use tenancy::{Company, CompanyDirectory};
