use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize};

use folio_core::{FolioError, FolioResult, StoreConfig};

use crate::entities::{
    Certificate, CertificatePatch, Message, NewCertificate, NewMessage, NewProject, Project,
    ProjectPatch,
};
use crate::validation::Validate;

/// Persistence seam for the API. Lists come back oldest first.
pub trait Storage: Send + Sync {
    fn projects(&self) -> Vec<Project>;
    fn featured_projects(&self) -> Vec<Project>;
    fn project(&self, id: u64) -> FolioResult<Project>;
    fn create_project(&mut self, new: NewProject) -> FolioResult<Project>;
    fn update_project(&mut self, id: u64, patch: ProjectPatch) -> FolioResult<Project>;
    fn delete_project(&mut self, id: u64) -> FolioResult<()>;

    fn certificates(&self) -> Vec<Certificate>;
    fn certificate(&self, id: u64) -> FolioResult<Certificate>;
    fn create_certificate(&mut self, new: NewCertificate) -> FolioResult<Certificate>;
    fn update_certificate(&mut self, id: u64, patch: CertificatePatch) -> FolioResult<Certificate>;
    fn delete_certificate(&mut self, id: u64) -> FolioResult<()>;

    fn messages(&self) -> Vec<Message>;
    fn message(&self, id: u64) -> FolioResult<Message>;
    fn create_message(&mut self, new: NewMessage) -> FolioResult<Message>;
    fn mark_message_read(&mut self, id: u64) -> FolioResult<()>;
    fn delete_message(&mut self, id: u64) -> FolioResult<()>;

    fn stats(&self) -> StoreStats;
}

/// Entity counts, reported by the health endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct StoreStats {
    pub projects: usize,
    pub featured: usize,
    pub certificates: usize,
    pub messages: usize,
    pub unread: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct NextIds {
    project: u64,
    certificate: u64,
    message: u64,
}

impl Default for NextIds {
    fn default() -> Self {
        Self {
            project: 1,
            certificate: 1,
            message: 1,
        }
    }
}

/// On-disk layout of the snapshot file.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct Snapshot {
    projects: Vec<Project>,
    certificates: Vec<Certificate>,
    messages: Vec<Message>,
    next_ids: NextIds,
}

/// Everything the snapshot holds.
#[derive(Debug, Clone, Default)]
struct Tables {
    projects: BTreeMap<u64, Project>,
    certificates: BTreeMap<u64, Certificate>,
    messages: BTreeMap<u64, Message>,
    next_ids: NextIds,
}

/// In-memory store, optionally mirrored to a JSON file.
///
/// A mutation only becomes visible once its snapshot is on disk; a failed
/// write leaves the store as it was.
#[derive(Debug, Default)]
pub struct MemStorage {
    tables: Tables,
    snapshot_path: Option<PathBuf>,
}

impl MemStorage {
    /// An empty store that lives only in memory.
    pub fn new() -> Self {
        Self::default()
    }

    /// A store mirrored to `path`, loading it first if it exists.
    pub fn open(path: impl Into<PathBuf>) -> FolioResult<Self> {
        let path = path.into();
        let mut store = Self {
            snapshot_path: Some(path.clone()),
            ..Self::default()
        };
        if !path.exists() {
            tracing::info!("no snapshot at {}, starting empty", path.display());
            return Ok(store);
        }

        let raw = std::fs::read_to_string(&path)?;
        let snapshot: Snapshot = serde_json::from_str(&raw)
            .map_err(|e| FolioError::Storage(format!("failed to parse {}: {}", path.display(), e)))?;

        let projects: BTreeMap<_, _> = snapshot.projects.into_iter().map(|p| (p.id, p)).collect();
        let certificates: BTreeMap<_, _> = snapshot.certificates.into_iter().map(|c| (c.id, c)).collect();
        let messages: BTreeMap<_, _> = snapshot.messages.into_iter().map(|m| (m.id, m)).collect();
        // Never hand out an id already in the file, whatever the counters say.
        let next_ids = NextIds {
            project: snapshot.next_ids.project.max(next_after(&projects)),
            certificate: snapshot.next_ids.certificate.max(next_after(&certificates)),
            message: snapshot.next_ids.message.max(next_after(&messages)),
        };
        store.tables = Tables {
            projects,
            certificates,
            messages,
            next_ids,
        };

        tracing::info!(
            "loaded snapshot {}: {} projects, {} certificates, {} messages",
            path.display(),
            store.tables.projects.len(),
            store.tables.certificates.len(),
            store.tables.messages.len()
        );
        Ok(store)
    }

    /// Build the store described by the `[store]` config section.
    pub fn from_config(config: &StoreConfig) -> FolioResult<Self> {
        let mut store = match &config.data_file {
            Some(path) => Self::open(path)?,
            None => Self::new(),
        };
        if config.seed_sample_data {
            store.seed_sample_data()?;
        }
        Ok(store)
    }

    /// Insert the sample projects when there are no projects yet.
    /// Returns how many were added.
    pub fn seed_sample_data(&mut self) -> FolioResult<usize> {
        if !self.tables.projects.is_empty() {
            return Ok(0);
        }
        let count = self.commit(|tables| {
            let samples = sample_projects();
            let count = samples.len();
            for sample in samples {
                tables.insert_project(sample)?;
            }
            Ok(count)
        })?;
        tracing::info!("seeded {} sample projects", count);
        Ok(count)
    }

    pub fn snapshot_path(&self) -> Option<&Path> {
        self.snapshot_path.as_deref()
    }

    /// Apply `change` to a copy of the tables and keep it only if it persists.
    fn commit<T>(&mut self, change: impl FnOnce(&mut Tables) -> FolioResult<T>) -> FolioResult<T> {
        let mut next = self.tables.clone();
        let out = change(&mut next)?;
        self.persist(&next)?;
        self.tables = next;
        Ok(out)
    }

    fn persist(&self, tables: &Tables) -> FolioResult<()> {
        let Some(path) = &self.snapshot_path else {
            return Ok(());
        };
        let snapshot = Snapshot {
            projects: tables.projects.values().cloned().collect(),
            certificates: tables.certificates.values().cloned().collect(),
            messages: tables.messages.values().cloned().collect(),
            next_ids: tables.next_ids,
        };
        let raw = serde_json::to_string_pretty(&snapshot)?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        // Write-then-rename so a crash never leaves a half-written snapshot.
        let tmp = path.with_extension("json.tmp");
        if let Err(e) = std::fs::write(&tmp, raw) {
            tracing::error!("failed to write snapshot {}: {}", tmp.display(), e);
            return Err(e.into());
        }
        std::fs::rename(&tmp, path)?;
        tracing::debug!("wrote snapshot {}", path.display());
        Ok(())
    }
}

impl Tables {
    fn insert_project(&mut self, new: NewProject) -> FolioResult<Project> {
        new.validate()?;
        let id = self.next_ids.project;
        self.next_ids.project += 1;
        let project = Project::from_new(id, new, Utc::now());
        self.projects.insert(id, project.clone());
        Ok(project)
    }
}

impl Storage for MemStorage {
    fn projects(&self) -> Vec<Project> {
        oldest_first(self.tables.projects.values().cloned().collect(), |p| (p.created_at, p.id))
    }

    fn featured_projects(&self) -> Vec<Project> {
        let featured = self.tables.projects.values().filter(|p| p.featured).cloned().collect();
        oldest_first(featured, |p| (p.created_at, p.id))
    }

    fn project(&self, id: u64) -> FolioResult<Project> {
        self.tables
            .projects
            .get(&id)
            .cloned()
            .ok_or_else(|| FolioError::not_found("project", id))
    }

    fn create_project(&mut self, new: NewProject) -> FolioResult<Project> {
        let project = self.commit(|tables| tables.insert_project(new))?;
        tracing::info!("created project {} '{}'", project.id, project.title);
        Ok(project)
    }

    fn update_project(&mut self, id: u64, patch: ProjectPatch) -> FolioResult<Project> {
        patch.validate()?;
        self.commit(|tables| {
            let project = tables
                .projects
                .get_mut(&id)
                .ok_or_else(|| FolioError::not_found("project", id))?;
            project.apply(patch);
            Ok(project.clone())
        })
    }

    fn delete_project(&mut self, id: u64) -> FolioResult<()> {
        self.commit(|tables| {
            tables
                .projects
                .remove(&id)
                .map(|_| ())
                .ok_or_else(|| FolioError::not_found("project", id))
        })?;
        tracing::info!("deleted project {}", id);
        Ok(())
    }

    fn certificates(&self) -> Vec<Certificate> {
        oldest_first(self.tables.certificates.values().cloned().collect(), |c| (c.created_at, c.id))
    }

    fn certificate(&self, id: u64) -> FolioResult<Certificate> {
        self.tables
            .certificates
            .get(&id)
            .cloned()
            .ok_or_else(|| FolioError::not_found("certificate", id))
    }

    fn create_certificate(&mut self, new: NewCertificate) -> FolioResult<Certificate> {
        new.validate()?;
        let certificate = self.commit(|tables| {
            let id = tables.next_ids.certificate;
            tables.next_ids.certificate += 1;
            let certificate = Certificate::from_new(id, new, Utc::now());
            tables.certificates.insert(id, certificate.clone());
            Ok(certificate)
        })?;
        tracing::info!("created certificate {} '{}'", certificate.id, certificate.title);
        Ok(certificate)
    }

    fn update_certificate(&mut self, id: u64, patch: CertificatePatch) -> FolioResult<Certificate> {
        patch.validate()?;
        self.commit(|tables| {
            let certificate = tables
                .certificates
                .get_mut(&id)
                .ok_or_else(|| FolioError::not_found("certificate", id))?;
            certificate.apply(patch);
            Ok(certificate.clone())
        })
    }

    fn delete_certificate(&mut self, id: u64) -> FolioResult<()> {
        self.commit(|tables| {
            tables
                .certificates
                .remove(&id)
                .map(|_| ())
                .ok_or_else(|| FolioError::not_found("certificate", id))
        })?;
        tracing::info!("deleted certificate {}", id);
        Ok(())
    }

    fn messages(&self) -> Vec<Message> {
        oldest_first(self.tables.messages.values().cloned().collect(), |m| (m.created_at, m.id))
    }

    fn message(&self, id: u64) -> FolioResult<Message> {
        self.tables
            .messages
            .get(&id)
            .cloned()
            .ok_or_else(|| FolioError::not_found("message", id))
    }

    fn create_message(&mut self, new: NewMessage) -> FolioResult<Message> {
        new.validate()?;
        let message = self.commit(|tables| {
            let id = tables.next_ids.message;
            tables.next_ids.message += 1;
            let message = Message::from_new(id, new, Utc::now());
            tables.messages.insert(id, message.clone());
            Ok(message)
        })?;
        tracing::info!("received message {} from {}", message.id, message.email);
        Ok(message)
    }

    fn mark_message_read(&mut self, id: u64) -> FolioResult<()> {
        if self.message(id)?.read {
            return Ok(());
        }
        self.commit(|tables| {
            if let Some(message) = tables.messages.get_mut(&id) {
                message.read = true;
            }
            Ok(())
        })
    }

    fn delete_message(&mut self, id: u64) -> FolioResult<()> {
        self.commit(|tables| {
            tables
                .messages
                .remove(&id)
                .map(|_| ())
                .ok_or_else(|| FolioError::not_found("message", id))
        })
    }

    fn stats(&self) -> StoreStats {
        let tables = &self.tables;
        StoreStats {
            projects: tables.projects.len(),
            featured: tables.projects.values().filter(|p| p.featured).count(),
            certificates: tables.certificates.len(),
            messages: tables.messages.len(),
            unread: tables.messages.values().filter(|m| !m.read).count(),
        }
    }
}

fn next_after<T>(map: &BTreeMap<u64, T>) -> u64 {
    map.keys().next_back().map_or(1, |id| id + 1)
}

fn oldest_first<T, K: Ord>(mut items: Vec<T>, key: impl Fn(&T) -> K) -> Vec<T> {
    items.sort_by_key(|item| key(item));
    items
}

fn sample_projects() -> Vec<NewProject> {
    vec![
        NewProject {
            title: "KKNotesV2".into(),
            description: "A premium resource hub for KTU Computer Science Engineering study materials featuring high-quality notes and curated video tutorials.".into(),
            tech_stack: "JavaScript, HTML, CSS".into(),
            image_url: None,
            demo_link: Some("https://kknotes.vercel.app".into()),
            github_link: Some("https://github.com/ChristopherJoshy/KKNotes".into()),
            featured: true,
        },
        NewProject {
            title: "MaestraMind".into(),
            description: "An AI-powered adaptive learning web application that transforms study notes into personalized learning experiences using Google's Gemini API.".into(),
            tech_stack: "JavaScript, HTML/CSS, Firebase, Gemini API".into(),
            image_url: None,
            demo_link: Some("https://maestramind.vercel.app".into()),
            github_link: Some("https://github.com/ChristopherJoshy/MaestraMind".into()),
            featured: true,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn project(title: &str, featured: bool) -> NewProject {
        NewProject {
            title: title.into(),
            description: format!("{title} description"),
            tech_stack: "Rust".into(),
            featured,
            ..Default::default()
        }
    }

    fn message(email: &str) -> NewMessage {
        NewMessage {
            name: "Ada".into(),
            email: email.into(),
            subject: "Hi".into(),
            message: "Hello there".into(),
        }
    }

    #[test]
    fn test_ids_are_per_kind_and_sequential() {
        let mut store = MemStorage::new();
        assert_eq!(store.create_project(project("a", false)).unwrap().id, 1);
        assert_eq!(store.create_project(project("b", false)).unwrap().id, 2);
        let cert = store
            .create_certificate(NewCertificate {
                title: "Rust".into(),
                issuer: "Ferris U".into(),
                date: "2024".into(),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(cert.id, 1);
    }

    #[test]
    fn test_deleted_ids_are_not_reused() {
        let mut store = MemStorage::new();
        store.create_project(project("a", false)).unwrap();
        store.delete_project(1).unwrap();
        assert_eq!(store.create_project(project("b", false)).unwrap().id, 2);
    }

    #[test]
    fn test_featured_filter() {
        let mut store = MemStorage::new();
        store.create_project(project("a", true)).unwrap();
        store.create_project(project("b", false)).unwrap();
        store.create_project(project("c", true)).unwrap();
        let titles: Vec<_> = store.featured_projects().into_iter().map(|p| p.title).collect();
        assert_eq!(titles, vec!["a", "c"]);
        assert_eq!(store.stats().featured, 2);
    }

    #[test]
    fn test_missing_entities_are_not_found() {
        let mut store = MemStorage::new();
        assert!(matches!(store.project(9), Err(FolioError::NotFound { kind: "project", id: 9 })));
        assert!(store.update_certificate(1, CertificatePatch::default()).is_err());
        assert!(store.delete_message(3).is_err());
        assert!(store.mark_message_read(3).is_err());
    }

    #[test]
    fn test_invalid_input_is_rejected_without_side_effects() {
        let mut store = MemStorage::new();
        assert!(matches!(
            store.create_message(message("not-an-email")),
            Err(FolioError::Validation(_))
        ));
        assert!(store.messages().is_empty());
        assert_eq!(store.create_message(message("a@b.c")).unwrap().id, 1);
    }

    #[test]
    fn test_mark_read_updates_stats() {
        let mut store = MemStorage::new();
        store.create_message(message("a@b.c")).unwrap();
        store.create_message(message("d@e.f")).unwrap();
        store.mark_message_read(1).unwrap();
        store.mark_message_read(1).unwrap();
        let stats = store.stats();
        assert_eq!(stats.messages, 2);
        assert_eq!(stats.unread, 1);
        assert!(store.message(1).unwrap().read);
    }

    #[test]
    fn test_seed_only_when_empty() {
        let mut store = MemStorage::new();
        assert_eq!(store.seed_sample_data().unwrap(), 2);
        assert_eq!(store.seed_sample_data().unwrap(), 0);
        let titles: Vec<_> = store.projects().into_iter().map(|p| p.title).collect();
        assert_eq!(titles, vec!["KKNotesV2", "MaestraMind"]);
        assert!(store.projects().iter().all(|p| p.featured && p.image_url.is_none()));
    }

    #[test]
    fn test_update_project_partial() {
        let mut store = MemStorage::new();
        store.create_project(project("a", false)).unwrap();
        let updated = store
            .update_project(
                1,
                ProjectPatch {
                    featured: Some(true),
                    ..Default::default()
                },
            )
            .unwrap();
        assert!(updated.featured);
        assert_eq!(updated.title, "a");
        assert!(store
            .update_project(
                1,
                ProjectPatch {
                    title: Some("".into()),
                    ..Default::default()
                }
            )
            .is_err());
    }
}
