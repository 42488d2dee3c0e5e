use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use folio_core::FolioResult;

use crate::validation::{normalize_optional, require, require_email, require_if_present, Validate};

/// A portfolio project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: u64,
    pub title: String,
    pub description: String,
    /// Free-form, comma separated.
    pub tech_stack: String,
    pub image_url: Option<String>,
    pub demo_link: Option<String>,
    pub github_link: Option<String>,
    pub featured: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProject {
    pub title: String,
    pub description: String,
    pub tech_stack: String,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub demo_link: Option<String>,
    #[serde(default)]
    pub github_link: Option<String>,
    #[serde(default)]
    pub featured: bool,
}

/// Partial update; absent fields are left alone.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProjectPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub tech_stack: Option<String>,
    pub image_url: Option<String>,
    pub demo_link: Option<String>,
    pub github_link: Option<String>,
    pub featured: Option<bool>,
}

impl Project {
    pub(crate) fn from_new(id: u64, new: NewProject, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            title: new.title.trim().to_string(),
            description: new.description.trim().to_string(),
            tech_stack: new.tech_stack.trim().to_string(),
            image_url: normalize_optional(new.image_url),
            demo_link: normalize_optional(new.demo_link),
            github_link: normalize_optional(new.github_link),
            featured: new.featured,
            created_at,
        }
    }

    pub(crate) fn apply(&mut self, patch: ProjectPatch) {
        if let Some(title) = patch.title {
            self.title = title.trim().to_string();
        }
        if let Some(description) = patch.description {
            self.description = description.trim().to_string();
        }
        if let Some(tech_stack) = patch.tech_stack {
            self.tech_stack = tech_stack.trim().to_string();
        }
        if patch.image_url.is_some() {
            self.image_url = normalize_optional(patch.image_url);
        }
        if patch.demo_link.is_some() {
            self.demo_link = normalize_optional(patch.demo_link);
        }
        if patch.github_link.is_some() {
            self.github_link = normalize_optional(patch.github_link);
        }
        if let Some(featured) = patch.featured {
            self.featured = featured;
        }
    }
}

impl Validate for NewProject {
    fn validate(&self) -> FolioResult<()> {
        require("title", &self.title)?;
        require("description", &self.description)?;
        require("techStack", &self.tech_stack)
    }
}

impl Validate for ProjectPatch {
    fn validate(&self) -> FolioResult<()> {
        require_if_present("title", self.title.as_deref())?;
        require_if_present("description", self.description.as_deref())?;
        require_if_present("techStack", self.tech_stack.as_deref())
    }
}

/// A certificate or course credential.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Certificate {
    pub id: u64,
    pub title: String,
    pub issuer: String,
    /// As displayed, e.g. "March 2024".
    pub date: String,
    pub credential_url: Option<String>,
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCertificate {
    pub title: String,
    pub issuer: String,
    pub date: String,
    #[serde(default)]
    pub credential_url: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CertificatePatch {
    pub title: Option<String>,
    pub issuer: Option<String>,
    pub date: Option<String>,
    pub credential_url: Option<String>,
    pub image_url: Option<String>,
}

impl Certificate {
    pub(crate) fn from_new(id: u64, new: NewCertificate, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            title: new.title.trim().to_string(),
            issuer: new.issuer.trim().to_string(),
            date: new.date.trim().to_string(),
            credential_url: normalize_optional(new.credential_url),
            image_url: normalize_optional(new.image_url),
            created_at,
        }
    }

    pub(crate) fn apply(&mut self, patch: CertificatePatch) {
        if let Some(title) = patch.title {
            self.title = title.trim().to_string();
        }
        if let Some(issuer) = patch.issuer {
            self.issuer = issuer.trim().to_string();
        }
        if let Some(date) = patch.date {
            self.date = date.trim().to_string();
        }
        if patch.credential_url.is_some() {
            self.credential_url = normalize_optional(patch.credential_url);
        }
        if patch.image_url.is_some() {
            self.image_url = normalize_optional(patch.image_url);
        }
    }
}

impl Validate for NewCertificate {
    fn validate(&self) -> FolioResult<()> {
        require("title", &self.title)?;
        require("issuer", &self.issuer)?;
        require("date", &self.date)
    }
}

impl Validate for CertificatePatch {
    fn validate(&self) -> FolioResult<()> {
        require_if_present("title", self.title.as_deref())?;
        require_if_present("issuer", self.issuer.as_deref())?;
        require_if_present("date", self.date.as_deref())
    }
}

/// A contact-form submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: u64,
    pub name: String,
    pub email: String,
    pub subject: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
    pub read: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMessage {
    pub name: String,
    pub email: String,
    pub subject: String,
    pub message: String,
}

impl Message {
    pub(crate) fn from_new(id: u64, new: NewMessage, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            name: new.name.trim().to_string(),
            email: new.email.trim().to_string(),
            subject: new.subject.trim().to_string(),
            message: new.message.trim().to_string(),
            created_at,
            read: false,
        }
    }
}

impl Validate for NewMessage {
    fn validate(&self) -> FolioResult<()> {
        require("name", &self.name)?;
        require_email("email", &self.email)?;
        require("subject", &self.subject)?;
        require("message", &self.message)
    }
}
