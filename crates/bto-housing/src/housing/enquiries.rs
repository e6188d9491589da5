use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::clock::{Clock, IdSequence};
use super::domain::{Enquiry, EnquiryId, EnquiryReply, Nric, Person, ProjectName, Role};
use super::error::{HousingError, NotFoundError, StateError, ValidationError};
use super::locks::LockTable;
use super::repository::Repositories;

/// Optional criteria for [`EnquiryBoard::list`]; `None` matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnquiryFilter {
    pub project: Option<ProjectName>,
    pub author: Option<Nric>,
    pub answered: Option<bool>,
}

impl EnquiryFilter {
    fn matches(&self, enquiry: &Enquiry) -> bool {
        self.project.as_ref().map_or(true, |project| *project == enquiry.project)
            && self.author.as_ref().map_or(true, |author| *author == enquiry.author)
            && self.answered.map_or(true, |answered| answered == enquiry.is_answered())
    }
}

/// Questions raised about projects and the staff replies to them.
///
/// Every write runs under the author's person lock, so an edit and a reply to the same
/// enquiry cannot interleave.
pub struct EnquiryBoard {
    repos: Repositories,
    locks: Arc<LockTable>,
    clock: Arc<dyn Clock>,
    ids: IdSequence,
}

impl EnquiryBoard {
    pub(crate) fn new(repos: Repositories, locks: Arc<LockTable>, clock: Arc<dyn Clock>) -> Self {
        let board = Self {
            repos,
            locks,
            clock,
            ids: IdSequence::new("enq"),
        };
        if let Err(err) = board.resume_ids() {
            warn!(error = %err, "enquiry ids not seeded from storage");
        }
        board
    }

    pub(crate) fn resume_ids(&self) -> Result<(), HousingError> {
        for enquiry in self.repos.enquiries.list()? {
            self.ids.observe(enquiry.id.as_str());
        }
        Ok(())
    }

    pub fn submit(
        &self,
        author: &Nric,
        project: &ProjectName,
        message: &str,
    ) -> Result<Enquiry, HousingError> {
        let message = non_empty(message, "enquiry message")?;
        self.locks.people.with(author, || {
            self.fetch_person(author)?;
            if self.repos.projects.fetch(project)?.is_none() {
                return Err(NotFoundError::Project(project.clone()).into());
            }

            let now = self.clock.now();
            let enquiry = Enquiry {
                id: EnquiryId::new(self.ids.next_id()),
                author: author.clone(),
                project: project.clone(),
                message,
                reply: None,
                created_at: now,
                updated_at: now,
            };
            let stored = self.repos.enquiries.insert(enquiry)?;
            info!(enquiry_id = %stored.id, author = %author, %project, "enquiry submitted");
            Ok(stored)
        })
    }

    /// Replaces the text of an unanswered enquiry. Only its author may edit it.
    pub fn edit(&self, enquiry_id: &EnquiryId, author: &Nric, message: &str) -> Result<Enquiry, HousingError> {
        let message = non_empty(message, "enquiry message")?;
        self.locks.people.with(author, || {
            let mut enquiry = self.fetch_enquiry(enquiry_id)?;
            ensure_author(&enquiry, author)?;
            if enquiry.is_answered() {
                return Err(StateError::EnquiryAnswered(enquiry_id.clone()).into());
            }
            enquiry.message = message;
            enquiry.updated_at = self.clock.now();
            self.repos.enquiries.update(enquiry.clone())?;
            info!(%enquiry_id, author = %author, "enquiry edited");
            Ok(enquiry)
        })
    }

    /// Removes an enquiry, answered or not. Only its author may remove it.
    pub fn delete(&self, enquiry_id: &EnquiryId, author: &Nric) -> Result<Enquiry, HousingError> {
        self.locks.people.with(author, || {
            let enquiry = self.fetch_enquiry(enquiry_id)?;
            ensure_author(&enquiry, author)?;
            let removed = self.repos.enquiries.delete(enquiry_id)?;
            info!(%enquiry_id, author = %author, "enquiry deleted");
            Ok(removed)
        })
    }

    /// Answers an enquiry on behalf of the project's manager or one of its officers.
    pub fn reply(
        &self,
        enquiry_id: &EnquiryId,
        responder: &Nric,
        message: &str,
    ) -> Result<Enquiry, HousingError> {
        let message = non_empty(message, "reply")?;
        let author = self.fetch_enquiry(enquiry_id)?.author;
        let staff = self.fetch_person(responder)?;

        self.locks.people.with(&author, || {
            let mut enquiry = self.fetch_enquiry(enquiry_id)?;
            if !may_reply(&staff, &enquiry.project) {
                return Err(ValidationError::CannotReply {
                    responder: responder.clone(),
                    project: enquiry.project.clone(),
                }
                .into());
            }
            if enquiry.is_answered() {
                return Err(StateError::EnquiryAnswered(enquiry_id.clone()).into());
            }

            let now = self.clock.now();
            enquiry.reply = Some(EnquiryReply {
                responder: responder.clone(),
                message,
                replied_at: now,
            });
            enquiry.updated_at = now;
            self.repos.enquiries.update(enquiry.clone())?;
            info!(%enquiry_id, responder = %responder, project = %enquiry.project, "enquiry answered");
            Ok(enquiry)
        })
    }

    pub fn get(&self, enquiry_id: &EnquiryId) -> Result<Enquiry, HousingError> {
        self.fetch_enquiry(enquiry_id)
    }

    /// Enquiries matching `filter`, oldest first.
    pub fn list(&self, filter: &EnquiryFilter) -> Result<Vec<Enquiry>, HousingError> {
        let mut enquiries: Vec<Enquiry> = self
            .repos
            .enquiries
            .list()?
            .into_iter()
            .filter(|enquiry| filter.matches(enquiry))
            .collect();
        enquiries.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        debug!(count = enquiries.len(), "listing enquiries");
        Ok(enquiries)
    }

    fn fetch_person(&self, nric: &Nric) -> Result<Person, HousingError> {
        self.repos
            .people
            .fetch(nric)?
            .ok_or_else(|| NotFoundError::Person(nric.clone()).into())
    }

    fn fetch_enquiry(&self, enquiry_id: &EnquiryId) -> Result<Enquiry, HousingError> {
        self.repos
            .enquiries
            .fetch(enquiry_id)?
            .ok_or_else(|| NotFoundError::Enquiry(enquiry_id.clone()).into())
    }
}

fn may_reply(staff: &Person, project: &ProjectName) -> bool {
    match &staff.role {
        Role::Manager(profile) => profile.managed_projects.contains(project),
        Role::Officer(profile) => profile.handling_project.as_ref() == Some(project),
        Role::Applicant(_) | Role::Admin => false,
    }
}

fn ensure_author(enquiry: &Enquiry, nric: &Nric) -> Result<(), HousingError> {
    if enquiry.author != *nric {
        return Err(ValidationError::NotEnquiryAuthor {
            enquiry: enquiry.id.clone(),
            nric: nric.clone(),
        }
        .into());
    }
    Ok(())
}

fn non_empty(text: &str, field: &'static str) -> Result<String, HousingError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyField(field).into());
    }
    Ok(trimmed.to_string())
}
